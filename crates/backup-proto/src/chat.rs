use serde::{Deserialize, Serialize};

/// A conversation with one recipient (contact, group, self or the release notes channel).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct Chat {
	pub id: u64,
	pub recipient_id: u64,
	#[serde(default)]
	pub archived: bool,
	#[serde(default)]
	pub pinned_order: Option<u32>,
	#[serde(default)]
	pub expiration_timer_ms: Option<u64>,
	#[serde(default)]
	pub mute_until_ms: Option<u64>,
	#[serde(default)]
	pub marked_unread: bool,
}
