use std::fmt;

use tracing::debug;

use crate::store::{RowId, StoreError, WriteTx};

use super::{Attachment, AttachmentOwner, AttachmentReference, MediaSize, StreamInfo};

/// Turns an attachment that is available locally into a small, independent thumbnail.
pub trait ThumbnailTranscoder: Send + Sync + fmt::Debug {
	/// `None` when the original can't be transcoded (not an image, bytes not local, etc).
	fn transcode_thumbnail(&self, original: &Attachment) -> Option<TranscodedThumbnail>;
}

/// For hosts that can't produce thumbnails; quoted replies then reuse the original attachment.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoThumbnailTranscoder;

impl ThumbnailTranscoder for NoThumbnailTranscoder {
	fn transcode_thumbnail(&self, _original: &Attachment) -> Option<TranscodedThumbnail> {
		None
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodedThumbnail {
	pub mime_type: String,
	pub stream: StreamInfo,
}

/// How the thumbnail of a quoted reply gets its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotedReplyAttachmentDataSource {
	/// A freshly transcoded copy that doesn't depend on the original.
	PendingAttachment {
		thumbnail: TranscodedThumbnail,
		source_filename: Option<String>,
	},
	/// Shares the original attachment's content, copying its descriptive metadata.
	OriginalAttachment {
		original_attachment_row_id: RowId,
		source_filename: Option<String>,
		source_media_size: Option<MediaSize>,
	},
	/// Only what the sender told us; the content has to be fetched before it can be shown.
	Pointer {
		attachment: Attachment,
		source_filename: Option<String>,
		source_media_size: Option<MediaSize>,
	},
}

/// Picks where a quoted reply thumbnail comes from: a transcoded copy of the original if one can
/// be made, the original itself otherwise, and the sender's pointer only when there is no local
/// original at all.
pub fn resolve_quoted_reply_source(
	original: Option<(&AttachmentReference, &Attachment)>,
	pointer: Option<Attachment>,
	pointer_filename: Option<String>,
	transcoder: &dyn ThumbnailTranscoder,
) -> Option<QuotedReplyAttachmentDataSource> {
	if let Some((reference, attachment)) = original {
		let transcoded = attachment
			.stream
			.as_ref()
			.and_then(|_| transcoder.transcode_thumbnail(attachment));

		return Some(match (transcoded, attachment.row_id) {
			(Some(thumbnail), _) => QuotedReplyAttachmentDataSource::PendingAttachment {
				thumbnail,
				source_filename: reference.source_filename.clone(),
			},
			(None, Some(original_attachment_row_id)) => {
				QuotedReplyAttachmentDataSource::OriginalAttachment {
					original_attachment_row_id,
					source_filename: reference.source_filename.clone(),
					source_media_size: reference.source_media_size,
				}
			}
			(None, None) => {
				debug!("Original attachment of a quoted reply was never stored, using pointer;");
				return pointer.map(|attachment| QuotedReplyAttachmentDataSource::Pointer {
					attachment,
					source_filename: pointer_filename,
					source_media_size: None,
				});
			}
		});
	}

	pointer.map(|attachment| QuotedReplyAttachmentDataSource::Pointer {
		attachment,
		source_filename: pointer_filename,
		source_media_size: None,
	})
}

/// Writes the thumbnail reference of a quoted reply owned by `message_row_id`.
pub fn create_quoted_reply_reference(
	source: QuotedReplyAttachmentDataSource,
	message_row_id: RowId,
	tx: &mut dyn WriteTx,
) -> Result<(), StoreError> {
	let owner = AttachmentOwner::QuotedReply { message_row_id };

	let reference = match source {
		QuotedReplyAttachmentDataSource::PendingAttachment {
			thumbnail,
			source_filename,
		} => {
			let byte_count = thumbnail.stream.unencrypted_byte_count;
			let attachment_row_id = tx.insert_attachment(Attachment {
				row_id: None,
				mime_type: thumbnail.mime_type,
				transit_tier: None,
				stream: Some(thumbnail.stream),
			})?;

			AttachmentReference {
				attachment_row_id,
				owner,
				source_filename,
				source_unencrypted_byte_count: Some(byte_count),
				source_media_size: None,
			}
		}
		QuotedReplyAttachmentDataSource::OriginalAttachment {
			original_attachment_row_id,
			source_filename,
			source_media_size,
		} => AttachmentReference {
			attachment_row_id: original_attachment_row_id,
			owner,
			source_filename,
			source_unencrypted_byte_count: None,
			source_media_size,
		},
		QuotedReplyAttachmentDataSource::Pointer {
			attachment,
			source_filename,
			source_media_size,
		} => {
			let byte_count = attachment
				.transit_tier
				.as_ref()
				.map(|transit_tier| transit_tier.unencrypted_byte_count);
			let attachment_row_id = tx.insert_attachment(attachment)?;

			AttachmentReference {
				attachment_row_id,
				owner,
				source_filename,
				source_unencrypted_byte_count: byte_count,
				source_media_size,
			}
		}
	};

	tx.insert_attachment_reference(reference)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		attachment::{RenderingFlag, TransitTierInfo},
		store::{Database, MemoryDatabase},
	};

	#[derive(Debug)]
	struct FixedTranscoder(bool);

	impl ThumbnailTranscoder for FixedTranscoder {
		fn transcode_thumbnail(&self, original: &Attachment) -> Option<TranscodedThumbnail> {
			self.0.then(|| TranscodedThumbnail {
				mime_type: "image/jpeg".to_string(),
				stream: StreamInfo {
					content_hash: vec![9],
					unencrypted_byte_count: 10,
					local_relative_path: format!("thumbs/{}", original.mime_type),
				},
			})
		}
	}

	fn original() -> (AttachmentReference, Attachment) {
		(
			AttachmentReference {
				attachment_row_id: 7,
				owner: AttachmentOwner::MessageBody {
					message_row_id: 3,
					order_in_message: 0,
					rendering_flag: RenderingFlag::Default,
					caption: None,
				},
				source_filename: Some("cat.png".to_string()),
				source_unencrypted_byte_count: Some(1000),
				source_media_size: Some(MediaSize {
					width: 10,
					height: 20,
				}),
			},
			Attachment {
				row_id: Some(7),
				mime_type: "image/png".to_string(),
				transit_tier: None,
				stream: Some(StreamInfo {
					content_hash: vec![1],
					unencrypted_byte_count: 1000,
					local_relative_path: "cat.png".to_string(),
				}),
			},
		)
	}

	fn pointer() -> Attachment {
		Attachment {
			row_id: None,
			mime_type: "image/png".to_string(),
			transit_tier: Some(TransitTierInfo {
				cdn_key: "key".to_string(),
				cdn_number: 3,
				upload_timestamp_ms: None,
				encryption_key: vec![1; 64],
				digest: vec![2; 32],
				unencrypted_byte_count: 1000,
			}),
			stream: None,
		}
	}

	#[test]
	fn transcoded_copy_wins() {
		let (reference, attachment) = original();

		let source = resolve_quoted_reply_source(
			Some((&reference, &attachment)),
			Some(pointer()),
			None,
			&FixedTranscoder(true),
		);

		assert!(matches!(
			source,
			Some(QuotedReplyAttachmentDataSource::PendingAttachment { .. })
		));
	}

	#[test]
	fn original_is_used_when_transcoding_fails() {
		let (reference, attachment) = original();

		let source = resolve_quoted_reply_source(
			Some((&reference, &attachment)),
			Some(pointer()),
			None,
			&FixedTranscoder(false),
		);

		assert_eq!(
			source,
			Some(QuotedReplyAttachmentDataSource::OriginalAttachment {
				original_attachment_row_id: 7,
				source_filename: Some("cat.png".to_string()),
				source_media_size: Some(MediaSize {
					width: 10,
					height: 20
				}),
			})
		);
	}

	#[test]
	fn pointer_only_without_original() {
		let source = resolve_quoted_reply_source(
			None,
			Some(pointer()),
			Some("cat.png".to_string()),
			&FixedTranscoder(true),
		);
		assert!(matches!(
			source,
			Some(QuotedReplyAttachmentDataSource::Pointer { .. })
		));

		assert_eq!(
			resolve_quoted_reply_source(None, None, None, &FixedTranscoder(true)),
			None
		);
	}

	#[test]
	fn original_reference_shares_content() {
		let db = MemoryDatabase::new();

		db.write(|tx| {
			let row_id = tx.insert_attachment(original().1)?;
			create_quoted_reply_reference(
				QuotedReplyAttachmentDataSource::OriginalAttachment {
					original_attachment_row_id: row_id,
					source_filename: None,
					source_media_size: None,
				},
				42,
				tx,
			)?;

			let references = tx.attachment_references(42)?;
			assert_eq!(references.len(), 1);
			assert_eq!(references[0].attachment_row_id, row_id);
			assert_eq!(
				references[0].owner,
				AttachmentOwner::QuotedReply { message_row_id: 42 }
			);

			Ok::<_, StoreError>(())
		})
		.unwrap();
	}
}
