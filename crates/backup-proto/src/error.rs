use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
	#[error("frame serialization error: {0}")]
	Serialization(#[from] rmp_serde::encode::Error),
	#[error("frame deserialization error: {0}")]
	Deserialization(#[from] rmp_serde::decode::Error),
	#[error("malformed backup header")]
	MalformedHeader,
	#[error("backup stream has no header")]
	MissingHeader,
	#[error("backup header was already written")]
	HeaderAlreadyWritten,
	#[error("tried to access frames before the backup header")]
	HeaderNotProcessed,
	#[error("invalid byte length delimiter: {0}")]
	InvalidByteLengthDelimiter(u64),
	#[error("stream ended in the middle of a frame")]
	Truncated,
	#[error("frame {index} could not be decoded: {source}")]
	UndecodableFrame {
		index: usize,
		#[source]
		source: rmp_serde::decode::Error,
	},
}

impl StreamError {
	/// Errors confined to a single frame; the stream is still positioned at the next delimiter.
	#[must_use]
	pub const fn is_frame_local(&self) -> bool {
		matches!(self, Self::UndecodableFrame { .. })
	}
}
