use serde::{Deserialize, Serialize};

/// An addressable actor. `id` is only meaningful inside the stream that defines it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Recipient {
	pub id: u64,
	#[serde(default)]
	pub destination: Option<Destination>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, strum_macros::IntoStaticStr)]
pub enum Destination {
	Contact(Contact),
	Group(Group),
	DistributionList(DistributionListItem),
	SelfRecipient(SelfRecipient),
	ReleaseNotes(ReleaseNotes),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct Contact {
	/// 16 bytes, big endian uuid.
	#[serde(default)]
	pub aci: Option<Vec<u8>>,
	/// 16 bytes, big endian uuid.
	#[serde(default)]
	pub pni: Option<Vec<u8>>,
	/// Digits of the phone number, without the leading `+`.
	#[serde(default)]
	pub e164: Option<u64>,
	#[serde(default)]
	pub profile_given_name: Option<String>,
	#[serde(default)]
	pub profile_family_name: Option<String>,
	#[serde(default)]
	pub blocked: bool,
	#[serde(default)]
	pub registered: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct Group {
	pub group_id: Vec<u8>,
	#[serde(default)]
	pub whitelisted: bool,
	#[serde(default)]
	pub title: Option<String>,
	#[serde(default)]
	pub hide_story: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DistributionListItem {
	/// 16 bytes, big endian uuid.
	pub distribution_id: Vec<u8>,
	#[serde(default)]
	pub item: Option<DistributionListItemKind>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum DistributionListItemKind {
	DeletionTimestamp(u64),
	DistributionList(DistributionList),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct DistributionList {
	pub name: String,
	#[serde(default)]
	pub allow_replies: bool,
	#[serde(default)]
	pub privacy_mode: PrivacyMode,
	#[serde(default)]
	pub member_recipient_ids: Vec<u64>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PrivacyMode {
	OnlyWith,
	AllExcept,
	All,
	#[default]
	#[serde(other)]
	Unknown,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct SelfRecipient {}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct ReleaseNotes {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn privacy_modes_from_newer_backups_decode_as_unknown() {
		let bytes = rmp_serde::to_vec_named(&"OnlyWithFriendsOfFriends").unwrap();

		assert_eq!(
			rmp_serde::from_slice::<PrivacyMode>(&bytes).unwrap(),
			PrivacyMode::Unknown
		);
	}
}
