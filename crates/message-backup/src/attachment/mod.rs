//! Attachments are content addressed blobs; everything that shows one does so through an
//! [`AttachmentReference`], which ties the blob to exactly one owner and carries whatever the
//! sender claimed about it.

use serde::{Deserialize, Serialize};

use crate::store::RowId;

mod link_preview;
mod quoted_reply;

pub use link_preview::{
	BackupLinkPreviewBuilder, BackupLinkPreviewDataSource, LinkPreviewAttachmentBuilder,
	LinkPreviewBuilder, LinkPreviewDraft, LinkPreviewImage, LinkPreviewManager, OwnedLinkPreview,
	PendingLinkPreviewImage,
};
pub use quoted_reply::{
	create_quoted_reply_reference, resolve_quoted_reply_source, NoThumbnailTranscoder,
	QuotedReplyAttachmentDataSource, ThumbnailTranscoder, TranscodedThumbnail,
};

/// Where the encrypted bytes of an attachment can be downloaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitTierInfo {
	pub cdn_key: String,
	pub cdn_number: u32,
	pub upload_timestamp_ms: Option<u64>,
	pub encryption_key: Vec<u8>,
	pub digest: Vec<u8>,
	pub unencrypted_byte_count: u32,
}

/// Decrypted bytes available on this device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
	pub content_hash: Vec<u8>,
	pub unencrypted_byte_count: u32,
	pub local_relative_path: String,
}

/// One attachment blob. An attachment with neither transit tier nor stream info can never be
/// downloaded and is only kept so its owner still renders a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
	pub row_id: Option<RowId>,
	pub mime_type: String,
	pub transit_tier: Option<TransitTierInfo>,
	pub stream: Option<StreamInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderingFlag {
	#[default]
	Default,
	VoiceMessage,
	Borderless,
	ShouldLoop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSize {
	pub width: u32,
	pub height: u32,
}

/// Everything that can own an attachment reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum_macros::IntoStaticStr)]
pub enum AttachmentOwner {
	MessageBody {
		message_row_id: RowId,
		order_in_message: u32,
		rendering_flag: RenderingFlag,
		caption: Option<String>,
	},
	/// Body text too long to be sent inline.
	OversizeText { message_row_id: RowId },
	LinkPreview { message_row_id: RowId },
	/// Thumbnail shown inside a quoted reply.
	QuotedReply { message_row_id: RowId },
	Sticker {
		message_row_id: RowId,
		pack_id: Vec<u8>,
		sticker_id: u32,
	},
	ContactAvatar { message_row_id: RowId },
	StoryMedia {
		story_message_row_id: RowId,
		caption: Option<String>,
	},
	StoryLinkPreview { story_message_row_id: RowId },
	ThreadWallpaper { thread_row_id: RowId },
	GlobalWallpaper,
}

impl AttachmentOwner {
	/// The message this owner belongs to, for owners that belong to messages at all.
	#[must_use]
	pub const fn message_row_id(&self) -> Option<RowId> {
		match self {
			Self::MessageBody { message_row_id, .. }
			| Self::OversizeText { message_row_id }
			| Self::LinkPreview { message_row_id }
			| Self::QuotedReply { message_row_id }
			| Self::Sticker { message_row_id, .. }
			| Self::ContactAvatar { message_row_id } => Some(*message_row_id),
			Self::StoryMedia { .. }
			| Self::StoryLinkPreview { .. }
			| Self::ThreadWallpaper { .. }
			| Self::GlobalWallpaper => None,
		}
	}

	#[must_use]
	pub fn kind(&self) -> &'static str {
		self.into()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentReference {
	pub attachment_row_id: RowId,
	pub owner: AttachmentOwner,
	/// Unverified, as claimed by the sender.
	pub source_filename: Option<String>,
	/// Unverified, as claimed by the sender.
	pub source_unencrypted_byte_count: Option<u32>,
	/// Unverified, as claimed by the sender.
	pub source_media_size: Option<MediaSize>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn only_message_owners_have_a_message() {
		let owners = [
			AttachmentOwner::MessageBody {
				message_row_id: 1,
				order_in_message: 0,
				rendering_flag: RenderingFlag::Default,
				caption: None,
			},
			AttachmentOwner::OversizeText { message_row_id: 1 },
			AttachmentOwner::LinkPreview { message_row_id: 1 },
			AttachmentOwner::QuotedReply { message_row_id: 1 },
			AttachmentOwner::Sticker {
				message_row_id: 1,
				pack_id: vec![1],
				sticker_id: 2,
			},
			AttachmentOwner::ContactAvatar { message_row_id: 1 },
			AttachmentOwner::StoryMedia {
				story_message_row_id: 1,
				caption: None,
			},
			AttachmentOwner::StoryLinkPreview {
				story_message_row_id: 1,
			},
			AttachmentOwner::ThreadWallpaper { thread_row_id: 1 },
			AttachmentOwner::GlobalWallpaper,
		];

		let message_owned = owners
			.iter()
			.filter(|owner| owner.message_row_id() == Some(1))
			.map(AttachmentOwner::kind)
			.collect::<Vec<_>>();

		assert_eq!(
			message_owned,
			[
				"MessageBody",
				"OversizeText",
				"LinkPreview",
				"QuotedReply",
				"Sticker",
				"ContactAvatar"
			]
		);
	}
}
