use sd_backup_proto::{
	BackupInfo, ChatItem, ChatItemType, ChatUpdate, ChatUpdateMessage, Contact, Destination, Frame,
	FrameReader, FrameSink, FrameSource, FrameWriter, Recipient, StreamError,
	ThreadMergeChatUpdate,
};

use std::{
	fs::File,
	io::{BufReader, BufWriter},
};

use tempfile::tempdir;

fn frames() -> Vec<Frame> {
	vec![
		Recipient {
			id: 2,
			destination: Some(Destination::Contact(Contact {
				aci: Some(vec![7; 16]),
				e164: Some(15_555_550_123),
				..Default::default()
			})),
		}
		.into(),
		ChatItem {
			chat_id: 1,
			author_id: 2,
			date_sent: 1_234,
			item: Some(ChatItemType::UpdateMessage(ChatUpdateMessage {
				update: Some(ChatUpdate::ThreadMerge(ThreadMergeChatUpdate {
					previous_e164: Some(15_555_550_123),
				})),
			})),
			..Default::default()
		}
		.into(),
		Frame::default(),
	]
}

#[test]
fn file_backed_stream() {
	let dir = tempdir().unwrap();
	let path = dir.path().join("backup.sdmbkp");

	let info = BackupInfo::new(42);
	let mut writer = FrameWriter::new(BufWriter::new(File::create(&path).unwrap()));
	writer.write_header(&info).unwrap();
	for frame in frames() {
		writer.write_frame(&frame).unwrap();
	}
	writer.finish().unwrap();

	let mut reader = FrameReader::new(BufReader::new(File::open(&path).unwrap()));
	assert_eq!(reader.read_header().unwrap(), info);

	let mut read = vec![];
	while let Some(frame) = reader.read_frame().unwrap() {
		read.push(frame);
	}

	// Frames without an item survive the trip; it is up to the reader to reject them.
	assert_eq!(read, frames());
}

#[test]
fn header_cannot_be_written_twice() {
	let mut writer = FrameWriter::new(Vec::new());
	writer.write_header(&BackupInfo::new(1)).unwrap();

	assert!(matches!(
		writer.write_header(&BackupInfo::new(2)),
		Err(StreamError::HeaderAlreadyWritten)
	));
}

#[test]
fn reading_frames_before_header_fails() {
	let mut bytes = Vec::new();
	let mut writer = FrameWriter::new(&mut bytes);
	writer.write_header(&BackupInfo::new(1)).unwrap();
	writer.write_frame(&frames()[0]).unwrap();

	let mut reader = FrameReader::new(bytes.as_slice());
	assert!(matches!(
		reader.read_frame(),
		Err(StreamError::HeaderNotProcessed)
	));
}
