use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Handle for an addressable actor, only meaningful inside the backup stream that defines it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecipientId(pub u64);

/// Reserved for the account running the backup; every other recipient is assigned above it.
pub const LOCAL_RECIPIENT_ID: RecipientId = RecipientId(1);

impl fmt::Display for RecipientId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChatId(pub u64);

impl fmt::Display for ChatId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Chat items have no id of their own on the wire; the chat plus the sent timestamp is as close
/// as we get.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatItemId {
	pub chat_id: ChatId,
	pub date_sent: u64,
}

impl fmt::Display for ChatItemId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.chat_id, self.date_sent)
	}
}

impl From<&sd_backup_proto::ChatItem> for ChatItemId {
	fn from(item: &sd_backup_proto::ChatItem) -> Self {
		Self {
			chat_id: ChatId(item.chat_id),
			date_sent: item.date_sent,
		}
	}
}

/// Local primary key of a thread. Not stable across devices, never written to a backup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadUniqueId(pub String);

impl ThreadUniqueId {
	#[must_use]
	pub fn random() -> Self {
		Self(Uuid::new_v4().to_string())
	}
}

impl fmt::Display for ThreadUniqueId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Local primary key of an interaction (message or info message).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InteractionUniqueId(pub String);

impl InteractionUniqueId {
	#[must_use]
	pub fn random() -> Self {
		Self(Uuid::new_v4().to_string())
	}
}

impl fmt::Display for InteractionUniqueId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Stands in for frames that carry nothing we could identify them by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmptyFrameId;

/// Anything that can show up as the subject of a frame error in the logs.
pub trait LoggableId: fmt::Debug {
	fn type_log_string(&self) -> &'static str;

	fn id_log_string(&self) -> String;
}

impl LoggableId for RecipientId {
	fn type_log_string(&self) -> &'static str {
		"RecipientId"
	}

	fn id_log_string(&self) -> String {
		self.0.to_string()
	}
}

impl LoggableId for ChatId {
	fn type_log_string(&self) -> &'static str {
		"ChatId"
	}

	fn id_log_string(&self) -> String {
		self.0.to_string()
	}
}

impl LoggableId for ChatItemId {
	fn type_log_string(&self) -> &'static str {
		"ChatItemId"
	}

	fn id_log_string(&self) -> String {
		self.to_string()
	}
}

impl LoggableId for ThreadUniqueId {
	fn type_log_string(&self) -> &'static str {
		"ThreadUniqueId"
	}

	fn id_log_string(&self) -> String {
		self.0.clone()
	}
}

impl LoggableId for InteractionUniqueId {
	fn type_log_string(&self) -> &'static str {
		"InteractionUniqueId"
	}

	fn id_log_string(&self) -> String {
		self.0.clone()
	}
}

impl LoggableId for EmptyFrameId {
	fn type_log_string(&self) -> &'static str {
		"EmptyFrame"
	}

	fn id_log_string(&self) -> String {
		String::new()
	}
}
