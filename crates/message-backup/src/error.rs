use sd_backup_proto::StreamError;

use std::{fmt, panic::Location, path::Path};

use thiserror::Error;

use crate::{
	context::ArchivingAddress,
	ids::{ChatId, LoggableId, RecipientId, ThreadUniqueId},
	store::{RowId, StoreError},
};

/// Errors that stop a whole pass.
#[derive(Error, Debug)]
pub enum Error {
	#[error(transparent)]
	Stream(#[from] StreamError),
	#[error(transparent)]
	Store(#[from] StoreError),
	#[error(transparent)]
	FileIO(#[from] FileIOError),
	#[error("unsupported backup version: found {found}, supported {supported}")]
	UnsupportedVersion { found: u64, supported: u64 },
	#[error("{count} frame error(s) during the {stage} stage and frame errors are fatal")]
	FrameErrors { stage: &'static str, count: usize },
	#[error("backup task panicked or was cancelled: {0}")]
	Join(#[from] tokio::task::JoinError),
}

/// Raised by archivers when the archive pass itself can no longer continue.
#[derive(Error, Debug)]
pub enum FatalArchivingError {
	#[error("failed to read from the local store: {0}")]
	Store(#[from] StoreError),
	#[error("failed to write frame: {0}")]
	Sink(#[from] StreamError),
}

impl From<FatalArchivingError> for Error {
	fn from(e: FatalArchivingError) -> Self {
		match e {
			FatalArchivingError::Store(e) => Self::Store(e),
			FatalArchivingError::Sink(e) => Self::Stream(e),
		}
	}
}

/// File I/O error that includes the path that caused the error
#[derive(Error, Debug)]
#[error("file I/O error: {source}; path: '{}'", .path.display())]
pub struct FileIOError {
	pub path: Box<Path>,
	#[source]
	pub source: std::io::Error,
}

impl<P: AsRef<Path>> From<(P, std::io::Error)> for FileIOError {
	fn from((path, source): (P, std::io::Error)) -> Self {
		Self {
			path: path.as_ref().into(),
			source,
		}
	}
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("missing field {0}")]
pub struct MissingFieldError(&'static str);

impl MissingFieldError {
	#[must_use]
	pub const fn new(value: &'static str) -> Self {
		Self(value)
	}

	#[must_use]
	pub const fn field(&self) -> &'static str {
		self.0
	}
}

pub trait OptionalField: Sized {
	type Out;

	fn transform(self) -> Option<Self::Out>;
}

impl<T> OptionalField for Option<T> {
	type Out = T;

	fn transform(self) -> Option<T> {
		self
	}
}

impl<'a, T> OptionalField for &'a Option<T> {
	type Out = &'a T;

	fn transform(self) -> Option<Self::Out> {
		self.as_ref()
	}
}

pub fn maybe_missing<T: OptionalField>(
	data: T,
	field: &'static str,
) -> Result<T::Out, MissingFieldError> {
	data.transform().ok_or(MissingFieldError(field))
}

/// A frame read off the wire is structurally unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq, strum_macros::IntoStaticStr)]
pub enum InvalidProtoDataError {
	#[error("missing field {0}")]
	MissingField(&'static str),
	#[error("frame has no item")]
	FrameMissingItem,
	#[error("frame could not be decoded")]
	UndecodableFrame,
	#[error("recipient id 0 is reserved")]
	RecipientIdNotSet,
	#[error("recipient id {0} was already defined")]
	DuplicateRecipientId(RecipientId),
	#[error("chat id 0 is reserved")]
	ChatIdNotSet,
	#[error("chat id {0} was already defined")]
	DuplicateChatId(ChatId),
	#[error("invalid aci")]
	InvalidAci,
	#[error("invalid pni")]
	InvalidPni,
	#[error("invalid e164")]
	InvalidE164,
	#[error("contact has no aci, pni or e164")]
	ContactWithoutIdentifiers,
	#[error("contact shares an identifier with an earlier contact or the local user")]
	DuplicateContact,
	#[error("group was already defined")]
	DuplicateGroup,
	#[error("distribution list was already defined")]
	DuplicateDistributionList,
	#[error("recipient {0} already has a chat")]
	DuplicateChatRecipient(RecipientId),
	#[error("recipient {0} is not a contact")]
	RecipientNotContact(RecipientId),
	#[error("invalid group id")]
	InvalidGroupId,
	#[error("invalid distribution id")]
	InvalidDistributionId,
	#[error("distribution list member {0} is not a contact")]
	DistributionListMemberNotContact(RecipientId),
	#[error("unknown distribution list privacy mode")]
	UnknownPrivacyMode,
	#[error("unknown delivery status")]
	UnknownDeliveryStatus,
	#[error("chats can't belong to distribution lists")]
	ChatRecipientNotSupported,
	#[error("incoming message author is not a contact")]
	IncomingMessageNotFromContact,
	#[error("outgoing message author is not the local user")]
	OutgoingMessageNotFromLocalUser,
	#[error("standard message has no direction")]
	DirectionlessStandardMessage,
	#[error("standard message has no text, attachments or long text")]
	EmptyStandardMessage,
	#[error("thread merge update in a chat that isn't with a contact")]
	ThreadMergeUpdateNotFromContact,
	#[error("session switchover update in a chat that isn't with a contact")]
	SessionSwitchoverUpdateNotFromContact,
	#[error("profile change update not authored by a contact")]
	ProfileChangeNotFromContact,
	#[error("profile change update with an empty name")]
	EmptyProfileName,
	#[error("unrecognized simple chat update")]
	UnrecognizedSimpleUpdate,
	#[error("invalid expiration timer: {0}ms")]
	InvalidExpirationTimer(u64),
	#[error("invalid attachment locator")]
	InvalidAttachmentLocator,
}

impl From<MissingFieldError> for InvalidProtoDataError {
	fn from(MissingFieldError(field): MissingFieldError) -> Self {
		Self::MissingField(field)
	}
}

#[derive(Error, Debug, Clone, PartialEq, Eq, strum_macros::IntoStaticStr)]
pub enum IdentifierNotFound {
	#[error("recipient id {0} was never defined")]
	RecipientId(RecipientId),
	#[error("chat id {0} was never defined")]
	ChatId(ChatId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq, strum_macros::IntoStaticStr)]
pub enum LinkPreviewError {
	#[error("link previews are disabled")]
	FeatureDisabled,
	#[error("invalid link preview")]
	InvalidPreview,
	#[error("link preview url does not appear in the message body")]
	NotInBody,
}

#[derive(Error, Debug, Clone, PartialEq, Eq, strum_macros::IntoStaticStr)]
pub enum RestoreFrameErrorKind {
	#[error("invalid proto data: {0}")]
	InvalidProtoData(#[from] InvalidProtoDataError),
	#[error("identifier not found: {0}")]
	IdentifierNotFound(#[from] IdentifierNotFound),
	#[error("chat {0} has no local thread")]
	ReferencedChatThreadNotFound(ChatId),
	#[error("link preview: {0}")]
	LinkPreview(#[from] LinkPreviewError),
}

impl From<MissingFieldError> for RestoreFrameErrorKind {
	fn from(e: MissingFieldError) -> Self {
		Self::InvalidProtoData(e.into())
	}
}

impl RestoreFrameErrorKind {
	/// Outer and inner variant names, used to group identical errors in logs.
	#[must_use]
	pub fn log_label(&self) -> String {
		let outer: &'static str = self.into();
		let inner: &'static str = match self {
			Self::InvalidProtoData(e) => e.into(),
			Self::IdentifierNotFound(e) => e.into(),
			Self::LinkPreview(e) => e.into(),
			Self::ReferencedChatThreadNotFound(_) => return outer.to_string(),
		};

		format!("{outer}.{inner}")
	}
}

#[derive(Error, Debug, Clone, PartialEq, Eq, strum_macros::IntoStaticStr)]
pub enum ArchiveFrameErrorKind {
	#[error("referenced recipient {0} has no recipient id")]
	ReferencedRecipientIdMissing(ArchivingAddress),
	#[error("referenced thread {0} has no chat id")]
	ReferencedThreadIdMissing(ThreadUniqueId),
	#[error("thread merge update outside of a contact thread")]
	ThreadMergeUpdateMissingAuthor,
	#[error("session switchover update outside of a contact thread")]
	SessionSwitchoverUpdateMissingAuthor,
	#[error("recipient {0} was already assigned an id")]
	DuplicateRecipient(ArchivingAddress),
	#[error("attachment {0} is referenced but does not exist")]
	AttachmentMissing(RowId),
	#[error("invalid local data: {0}")]
	InvalidLocalData(#[from] MissingFieldError),
}

impl ArchiveFrameErrorKind {
	#[must_use]
	pub fn log_label(&self) -> String {
		<&'static str>::from(self).to_string()
	}
}

/// One recoverable failure while restoring a single frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreFrameError<Id> {
	pub kind: RestoreFrameErrorKind,
	pub id: Id,
	pub location: &'static Location<'static>,
}

impl<Id: LoggableId> RestoreFrameError<Id> {
	#[track_caller]
	pub fn new(kind: impl Into<RestoreFrameErrorKind>, id: Id) -> Self {
		Self {
			kind: kind.into(),
			id,
			location: Location::caller(),
		}
	}
}

impl<Id: LoggableId> fmt::Display for RestoreFrameError<Id> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} {}: {} ({})",
			self.id.type_log_string(),
			self.id.id_log_string(),
			self.kind,
			self.location
		)
	}
}

/// One recoverable failure while archiving a single local entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFrameError<Id> {
	pub kind: ArchiveFrameErrorKind,
	pub id: Id,
	pub location: &'static Location<'static>,
}

impl<Id: LoggableId> ArchiveFrameError<Id> {
	#[track_caller]
	pub fn new(kind: impl Into<ArchiveFrameErrorKind>, id: Id) -> Self {
		Self {
			kind: kind.into(),
			id,
			location: Location::caller(),
		}
	}
}

impl<Id: LoggableId> fmt::Display for ArchiveFrameError<Id> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} {}: {} ({})",
			self.id.type_log_string(),
			self.id.id_log_string(),
			self.kind,
			self.location
		)
	}
}
