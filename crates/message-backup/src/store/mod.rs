//! The local relational store, as seen by the backup engine.
//!
//! The engine never manages transactions itself: passes receive a [`ReadTx`] or a [`WriteTx`]
//! from a [`Database`] and every restored entity is written with a single insert call.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
	attachment::{Attachment, AttachmentReference},
	error::MissingFieldError,
	identifiers::{ContactAddress, DistributionId, GroupId},
	ids::{InteractionUniqueId, ThreadUniqueId},
};

mod memory;

pub use memory::MemoryDatabase;

pub type RowId = i64;

#[derive(Error, Debug)]
pub enum StoreError {
	#[error("unique constraint violated: {0}")]
	Constraint(String),
	#[error("{entity} {id} not found")]
	NotFound { entity: &'static str, id: String },
	#[error("no open savepoint")]
	NoSavepoint,
	#[error("store lock poisoned")]
	Poisoned,
	#[error(transparent)]
	MissingField(#[from] MissingFieldError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecipient {
	pub row_id: Option<RowId>,
	pub address: ContactAddress,
	pub profile_given_name: Option<String>,
	pub profile_family_name: Option<String>,
	pub blocked: bool,
	pub registered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
	pub row_id: Option<RowId>,
	pub group_id: GroupId,
	pub title: Option<String>,
	pub whitelisted: bool,
	pub hide_story: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StoryPrivacyMode {
	/// Everyone except the members.
	#[default]
	BlockList,
	/// Only the members.
	AllowList,
	/// Every contact, members are ignored.
	AllSignalConnections,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionListRecord {
	pub row_id: Option<RowId>,
	pub distribution_id: DistributionId,
	pub name: String,
	pub allow_replies: bool,
	pub privacy_mode: StoryPrivacyMode,
	pub members: Vec<ContactAddress>,
	/// Set when the list was deleted; deleted lists are kept around so other devices learn
	/// about the deletion.
	pub deleted_at_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadKind {
	/// One to one thread. Threads with the local address are "note to self".
	Contact(ContactAddress),
	Group(GroupId),
	ReleaseNotes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
	pub row_id: Option<RowId>,
	pub unique_id: ThreadUniqueId,
	pub kind: ThreadKind,
	pub archived: bool,
	pub marked_unread: bool,
	pub muted_until_ms: Option<u64>,
	pub pinned_order: Option<u32>,
	pub expire_timer_ms: Option<u64>,
}

impl Thread {
	#[must_use]
	pub fn new(kind: ThreadKind) -> Self {
		Self {
			row_id: None,
			unique_id: ThreadUniqueId::random(),
			kind,
			archived: false,
			marked_unread: false,
			muted_until_ms: None,
			pinned_order: None,
			expire_timer_ms: None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
	pub row_id: Option<RowId>,
	pub unique_id: InteractionUniqueId,
	pub thread_unique_id: ThreadUniqueId,
	/// When the interaction was sent, by its author's clock.
	pub timestamp: u64,
	pub expire_started_at_ms: Option<u64>,
	pub expires_in_ms: Option<u64>,
	pub kind: InteractionKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionKind {
	Incoming(IncomingMessage),
	Outgoing(OutgoingMessage),
	Info(InfoMessage),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
	pub author: Option<ContactAddress>,
	pub received_at_ms: u64,
	pub server_sent_at_ms: Option<u64>,
	pub read: bool,
	pub sealed_sender: bool,
	pub content: MessageContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
	pub recipient_states: Vec<OutgoingRecipientState>,
	pub content: MessageContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutgoingMessageStatus {
	Pending,
	Sent,
	Delivered,
	Read,
	Viewed,
	Skipped,
	Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingRecipientState {
	pub address: ContactAddress,
	pub status: OutgoingMessageStatus,
	pub updated_at_ms: u64,
}

/// Everything a message carries besides its direction. Attachments live in their own table and
/// are found through [`AttachmentReference`]s owned by the message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
	pub body: Option<String>,
	pub quoted_message: Option<QuotedMessage>,
	pub link_preview: Option<LinkPreview>,
	pub reactions: Vec<Reaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
	pub author: ContactAddress,
	pub emoji: String,
	pub sent_at_ms: u64,
	pub sort_order: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotedMessage {
	/// Sent timestamp of the message being replied to, if it was known.
	pub original_timestamp: Option<u64>,
	pub author: ContactAddress,
	pub body: Option<String>,
	pub attachment_info: Option<QuotedAttachmentInfo>,
	pub is_gift_badge: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotedAttachmentInfo {
	pub content_type: Option<String>,
	pub source_filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPreview {
	pub url: String,
	pub title: Option<String>,
	pub description: Option<String>,
	pub date_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoMessage {
	pub kind: InfoMessageKind,
	/// Who caused the event, `None` for the local user.
	pub author: Option<ContactAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InfoMessageKind {
	/// Two threads with the same contact were merged. Old rows may predate the phone number.
	ThreadMerge { phone_number: Option<String> },
	/// The contact's session moved from their phone number to their account id.
	SessionSwitchover { phone_number: Option<String> },
	DisappearingMessagesUpdate { expires_in_secs: u32 },
	ProfileChange { old_name: String, new_name: String },
	ContactJoinedSignal,
	IdentityChanged,
	SessionEnded,
	ChatSessionRefresh,
	/// Pre-rendered text of a group update from before updates were modeled.
	LegacyGroupUpdate { custom_message: String },
	SyncedThread,
	UnsupportedMessage,
}

impl fmt::Display for ThreadKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Contact(address) => write!(f, "Contact{address}"),
			Self::Group(group_id) => write!(f, "Group[{group_id}]"),
			Self::ReleaseNotes => f.write_str("ReleaseNotes"),
		}
	}
}

/// Fully hydrated reads.
pub trait ReadTx {
	fn contacts(&self) -> Result<Vec<ContactRecipient>, StoreError>;

	fn groups(&self) -> Result<Vec<GroupRecord>, StoreError>;

	fn distribution_lists(&self) -> Result<Vec<DistributionListRecord>, StoreError>;

	fn threads(&self) -> Result<Vec<Thread>, StoreError>;

	fn thread(&self, unique_id: &ThreadUniqueId) -> Result<Option<Thread>, StoreError>;

	/// Interactions of one thread, oldest first.
	fn interactions(&self, thread_unique_id: &ThreadUniqueId)
		-> Result<Vec<Interaction>, StoreError>;

	/// The message with the given sent timestamp in a thread, if any.
	fn find_message_by_timestamp(
		&self,
		thread_unique_id: &ThreadUniqueId,
		timestamp: u64,
	) -> Result<Option<Interaction>, StoreError>;

	/// References owned by the given message, in insertion order.
	fn attachment_references(
		&self,
		message_row_id: RowId,
	) -> Result<Vec<AttachmentReference>, StoreError>;

	fn attachment(&self, row_id: RowId) -> Result<Option<Attachment>, StoreError>;
}

/// Single entity writes. Each insert returns the new row id.
pub trait WriteTx: ReadTx {
	fn insert_contact(&mut self, contact: ContactRecipient) -> Result<RowId, StoreError>;

	fn insert_group(&mut self, group: GroupRecord) -> Result<RowId, StoreError>;

	fn insert_distribution_list(
		&mut self,
		list: DistributionListRecord,
	) -> Result<RowId, StoreError>;

	fn insert_thread(&mut self, thread: Thread) -> Result<RowId, StoreError>;

	fn insert_interaction(&mut self, interaction: Interaction) -> Result<RowId, StoreError>;

	fn insert_attachment(&mut self, attachment: Attachment) -> Result<RowId, StoreError>;

	fn insert_attachment_reference(
		&mut self,
		reference: AttachmentReference,
	) -> Result<(), StoreError>;

	/// Marks a point the transaction can be rolled back to. Savepoints nest.
	fn savepoint(&mut self) -> Result<(), StoreError>;

	/// Discards everything written since the innermost savepoint and closes it.
	fn rollback_to_savepoint(&mut self) -> Result<(), StoreError>;

	/// Keeps everything written since the innermost savepoint and closes it.
	fn release_savepoint(&mut self) -> Result<(), StoreError>;
}

pub trait Database: Send + Sync + fmt::Debug + 'static {
	fn read<T, E: From<StoreError>>(
		&self,
		f: impl FnOnce(&dyn ReadTx) -> Result<T, E>,
	) -> Result<T, E>;

	/// Commits when `f` returns `Ok`, discards every write otherwise.
	fn write<T, E: From<StoreError>>(
		&self,
		f: impl FnOnce(&mut dyn WriteTx) -> Result<T, E>,
	) -> Result<T, E>;
}
