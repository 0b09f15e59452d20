use std::{
	collections::VecDeque,
	io::{self, Read, Write},
};

use serde::Serialize;
use tracing::trace;

use crate::{BackupInfo, Frame, StreamError};

const MAGIC: &[u8; 7] = b"sdmbkp1";

/// Upper bound for a single encoded frame. Anything bigger is treated as a corrupt delimiter.
pub const MAX_FRAME_LEN: u64 = 64 * 1024 * 1024;

/// Where an archive pass writes its output.
pub trait FrameSink {
	fn write_header(&mut self, info: &BackupInfo) -> Result<(), StreamError>;

	fn write_frame(&mut self, frame: &Frame) -> Result<(), StreamError>;
}

/// Where a restore pass reads its input from. Frames are consumed strictly in order.
pub trait FrameSource {
	fn read_header(&mut self) -> Result<BackupInfo, StreamError>;

	/// Returns `Ok(None)` once the stream ended cleanly between two frames.
	fn read_frame(&mut self) -> Result<Option<Frame>, StreamError>;
}

/// Writes the header and then each frame as a `u32` little endian length followed by the
/// MessagePack encoded body.
#[derive(Debug)]
pub struct FrameWriter<W: Write> {
	inner: W,
	header_written: bool,
	frames_written: usize,
}

impl<W: Write> FrameWriter<W> {
	pub const fn new(inner: W) -> Self {
		Self {
			inner,
			header_written: false,
			frames_written: 0,
		}
	}

	#[must_use]
	pub const fn frames_written(&self) -> usize {
		self.frames_written
	}

	/// Flushes and hands back the underlying writer.
	pub fn finish(mut self) -> Result<W, StreamError> {
		self.inner.flush()?;
		Ok(self.inner)
	}

	fn write_delimited(&mut self, value: &impl Serialize) -> Result<(), StreamError> {
		let bytes = rmp_serde::to_vec_named(value)?;

		let len = u32::try_from(bytes.len())
			.ok()
			.filter(|len| u64::from(*len) <= MAX_FRAME_LEN)
			.ok_or(StreamError::InvalidByteLengthDelimiter(bytes.len() as u64))?;

		self.inner.write_all(&len.to_le_bytes())?;
		self.inner.write_all(&bytes)?;

		Ok(())
	}
}

impl<W: Write> FrameSink for FrameWriter<W> {
	fn write_header(&mut self, info: &BackupInfo) -> Result<(), StreamError> {
		if self.header_written {
			return Err(StreamError::HeaderAlreadyWritten);
		}

		self.inner.write_all(MAGIC)?;
		self.write_delimited(info)?;
		self.header_written = true;

		Ok(())
	}

	fn write_frame(&mut self, frame: &Frame) -> Result<(), StreamError> {
		if !self.header_written {
			return Err(StreamError::HeaderNotProcessed);
		}

		self.write_delimited(frame)?;
		self.frames_written += 1;

		trace!(frames_written = self.frames_written, "Wrote frame;");

		Ok(())
	}
}

#[derive(Debug)]
pub struct FrameReader<R: Read> {
	inner: R,
	header_read: bool,
	frames_read: usize,
}

impl<R: Read> FrameReader<R> {
	pub const fn new(inner: R) -> Self {
		Self {
			inner,
			header_read: false,
			frames_read: 0,
		}
	}

	#[must_use]
	pub const fn frames_read(&self) -> usize {
		self.frames_read
	}

	/// Reads one length delimited body without decoding it.
	fn read_delimited(&mut self) -> Result<Option<Vec<u8>>, StreamError> {
		let mut len_buf = [0u8; 4];
		let mut filled = 0;

		// A clean EOF is only acceptable before the first byte of a delimiter.
		while filled < len_buf.len() {
			match self.inner.read(&mut len_buf[filled..]) {
				Ok(0) if filled == 0 => return Ok(None),
				Ok(0) => return Err(StreamError::Truncated),
				Ok(n) => filled += n,
				Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
				Err(e) => return Err(e.into()),
			}
		}

		let len = u32::from_le_bytes(len_buf);
		if len == 0 || u64::from(len) > MAX_FRAME_LEN {
			return Err(StreamError::InvalidByteLengthDelimiter(u64::from(len)));
		}

		let mut body = vec![0u8; len as usize];
		self.inner.read_exact(&mut body).map_err(|e| {
			if e.kind() == io::ErrorKind::UnexpectedEof {
				StreamError::Truncated
			} else {
				e.into()
			}
		})?;

		Ok(Some(body))
	}
}

impl<R: Read> FrameSource for FrameReader<R> {
	fn read_header(&mut self) -> Result<BackupInfo, StreamError> {
		let mut magic = [0u8; MAGIC.len()];
		self.inner.read_exact(&mut magic).map_err(|e| {
			if e.kind() == io::ErrorKind::UnexpectedEof {
				StreamError::MalformedHeader
			} else {
				e.into()
			}
		})?;

		if &magic != MAGIC {
			return Err(StreamError::MalformedHeader);
		}

		let body = self.read_delimited()?.ok_or(StreamError::MissingHeader)?;
		let info = rmp_serde::from_slice(&body)?;
		self.header_read = true;

		Ok(info)
	}

	fn read_frame(&mut self) -> Result<Option<Frame>, StreamError> {
		if !self.header_read {
			return Err(StreamError::HeaderNotProcessed);
		}

		let Some(body) = self.read_delimited()? else {
			return Ok(None);
		};

		let index = self.frames_read;
		self.frames_read += 1;

		rmp_serde::from_slice(&body)
			.map(Some)
			.map_err(|source| StreamError::UndecodableFrame { index, source })
	}
}

/// In memory sink and source, mostly useful for tests and for piping an archive pass straight
/// into a restore pass.
#[derive(Debug, Default, Clone)]
pub struct MemoryStream {
	pub header: Option<BackupInfo>,
	pub frames: VecDeque<Frame>,
	header_read: bool,
}

impl MemoryStream {
	#[must_use]
	pub fn new(header: BackupInfo, frames: impl IntoIterator<Item = Frame>) -> Self {
		Self {
			header: Some(header),
			frames: frames.into_iter().collect(),
			header_read: false,
		}
	}
}

impl FrameSink for MemoryStream {
	fn write_header(&mut self, info: &BackupInfo) -> Result<(), StreamError> {
		if self.header.is_some() {
			return Err(StreamError::HeaderAlreadyWritten);
		}

		self.header = Some(info.clone());

		Ok(())
	}

	fn write_frame(&mut self, frame: &Frame) -> Result<(), StreamError> {
		if self.header.is_none() {
			return Err(StreamError::HeaderNotProcessed);
		}

		self.frames.push_back(frame.clone());

		Ok(())
	}
}

impl FrameSource for MemoryStream {
	fn read_header(&mut self) -> Result<BackupInfo, StreamError> {
		let header = self.header.clone().ok_or(StreamError::MissingHeader)?;
		self.header_read = true;

		Ok(header)
	}

	fn read_frame(&mut self) -> Result<Option<Frame>, StreamError> {
		if !self.header_read {
			return Err(StreamError::HeaderNotProcessed);
		}

		Ok(self.frames.pop_front())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Chat, Destination, Recipient, SelfRecipient};

	fn sample_frames() -> Vec<Frame> {
		vec![
			Recipient {
				id: 1,
				destination: Some(Destination::SelfRecipient(SelfRecipient {})),
			}
			.into(),
			Chat {
				id: 1,
				recipient_id: 1,
				..Default::default()
			}
			.into(),
		]
	}

	fn encode(frames: &[Frame]) -> Vec<u8> {
		let mut writer = FrameWriter::new(Vec::new());
		writer.write_header(&BackupInfo::new(1_700_000_000_000)).unwrap();
		for frame in frames {
			writer.write_frame(frame).unwrap();
		}
		assert_eq!(writer.frames_written(), frames.len());

		writer.finish().unwrap()
	}

	#[test]
	fn reads_back_frames_in_order() {
		let frames = sample_frames();
		let bytes = encode(&frames);

		let mut reader = FrameReader::new(bytes.as_slice());
		let info = reader.read_header().unwrap();
		assert_eq!(info.version, crate::SUPPORTED_BACKUP_VERSION);
		assert_eq!(info.backup_time_ms, 1_700_000_000_000);

		let mut decoded = vec![];
		while let Some(frame) = reader.read_frame().unwrap() {
			decoded.push(frame);
		}

		assert_eq!(decoded, frames);
		assert_eq!(reader.frames_read(), 2);
	}

	#[test]
	fn truncated_frame_is_an_error() {
		let bytes = encode(&sample_frames());

		let mut reader = FrameReader::new(&bytes[..bytes.len() - 3]);
		reader.read_header().unwrap();
		reader.read_frame().unwrap();

		assert!(matches!(reader.read_frame(), Err(StreamError::Truncated)));
	}

	#[test]
	fn truncated_delimiter_is_an_error() {
		let mut bytes = encode(&[]);
		bytes.extend_from_slice(&[3, 0]);

		let mut reader = FrameReader::new(bytes.as_slice());
		reader.read_header().unwrap();

		assert!(matches!(reader.read_frame(), Err(StreamError::Truncated)));
	}

	#[test]
	fn undecodable_frame_does_not_desync_the_stream() {
		let frames = sample_frames();
		let mut writer = FrameWriter::new(Vec::new());
		writer.write_header(&BackupInfo::new(1_700_000_000_000)).unwrap();
		writer.write_frame(&frames[0]).unwrap();
		let mut bytes = writer.finish().unwrap();

		// A well delimited body that isn't a frame.
		let garbage = rmp_serde::to_vec_named(&"not a frame").unwrap();
		bytes.extend_from_slice(&u32::try_from(garbage.len()).unwrap().to_le_bytes());
		bytes.extend_from_slice(&garbage);

		let mut writer = FrameWriter {
			inner: bytes,
			header_written: true,
			frames_written: 0,
		};
		writer.write_frame(&frames[1]).unwrap();
		let bytes = writer.finish().unwrap();

		let mut reader = FrameReader::new(bytes.as_slice());
		reader.read_header().unwrap();

		assert_eq!(reader.read_frame().unwrap(), Some(frames[0].clone()));
		let err = reader.read_frame().unwrap_err();
		assert!(err.is_frame_local());
		assert!(matches!(err, StreamError::UndecodableFrame { index: 1, .. }));
		assert_eq!(reader.read_frame().unwrap(), Some(frames[1].clone()));
		assert_eq!(reader.read_frame().unwrap(), None);
	}

	#[test]
	fn rejects_foreign_files() {
		let mut reader = FrameReader::new(&b"sdbkp1 but not a message backup"[..]);
		assert!(matches!(
			reader.read_header(),
			Err(StreamError::MalformedHeader)
		));

		let mut reader = FrameReader::new(&b"sd"[..]);
		assert!(matches!(
			reader.read_header(),
			Err(StreamError::MalformedHeader)
		));
	}

	#[test]
	fn oversized_delimiter_is_rejected() {
		let mut bytes = encode(&[]);
		bytes.extend_from_slice(&u32::MAX.to_le_bytes());

		let mut reader = FrameReader::new(bytes.as_slice());
		reader.read_header().unwrap();

		assert!(matches!(
			reader.read_frame(),
			Err(StreamError::InvalidByteLengthDelimiter(len)) if len == u64::from(u32::MAX)
		));
	}

	#[test]
	fn frames_require_a_header() {
		let mut writer = FrameWriter::new(Vec::new());
		assert!(matches!(
			writer.write_frame(&Frame::default()),
			Err(StreamError::HeaderNotProcessed)
		));

		let mut stream = MemoryStream::default();
		assert!(matches!(
			stream.read_header(),
			Err(StreamError::MissingHeader)
		));
	}
}
