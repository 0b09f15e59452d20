use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Chat, ChatItem, Recipient};

/// For future versioning we can bump this and match on it in the reader.
pub const SUPPORTED_BACKUP_VERSION: u64 = 1;

/// First entry of every backup stream.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BackupInfo {
	pub version: u64,
	pub backup_time_ms: u64,
	pub backup_id: Uuid,
}

impl BackupInfo {
	#[must_use]
	pub fn new(backup_time_ms: u64) -> Self {
		Self {
			version: SUPPORTED_BACKUP_VERSION,
			backup_time_ms,
			backup_id: Uuid::new_v4(),
		}
	}
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct Frame {
	#[serde(default)]
	pub item: Option<FrameItem>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, strum_macros::IntoStaticStr)]
pub enum FrameItem {
	Recipient(Recipient),
	Chat(Chat),
	ChatItem(ChatItem),
}

impl FrameItem {
	#[must_use]
	pub fn kind(&self) -> &'static str {
		self.into()
	}
}

impl From<Recipient> for Frame {
	fn from(recipient: Recipient) -> Self {
		Self {
			item: Some(FrameItem::Recipient(recipient)),
		}
	}
}

impl From<Chat> for Frame {
	fn from(chat: Chat) -> Self {
		Self {
			item: Some(FrameItem::Chat(chat)),
		}
	}
}

impl From<ChatItem> for Frame {
	fn from(chat_item: ChatItem) -> Self {
		Self {
			item: Some(FrameItem::ChatItem(chat_item)),
		}
	}
}
