use sd_backup_proto::{AttachmentFlag, AttachmentLocator, FilePointer, Locator, MessageAttachment};

use tracing::debug;

use crate::{
	attachment::{
		Attachment, AttachmentOwner, AttachmentReference, MediaSize, RenderingFlag, TransitTierInfo,
	},
	error::{
		maybe_missing, ArchiveFrameError, ArchiveFrameErrorKind, InvalidProtoDataError,
		RestoreFrameError,
	},
	ids::{ChatItemId, InteractionUniqueId},
	result::{ArchiveInteractionResult, RestoreFrameResult},
	store::{ReadTx, RowId, StoreError, WriteTx},
};

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Attachments owned by one message, already converted to their wire form.
#[derive(Debug, Default)]
pub struct ArchivedAttachments {
	pub body: Vec<MessageAttachment>,
	pub long_text: Option<FilePointer>,
	pub link_preview_image: Option<FilePointer>,
	pub quoted_thumbnail: Option<MessageAttachment>,
}

/// Converts between attachments in the store and [`FilePointer`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageAttachmentArchiver;

impl MessageAttachmentArchiver {
	#[must_use]
	pub fn archive_file_pointer(
		reference: &AttachmentReference,
		attachment: &Attachment,
	) -> FilePointer {
		let locator = attachment.transit_tier.as_ref().map_or(Locator::Invalid, |tier| {
			Locator::Attachment(AttachmentLocator {
				cdn_key: tier.cdn_key.clone(),
				cdn_number: tier.cdn_number,
				upload_timestamp: tier.upload_timestamp_ms,
				key: tier.encryption_key.clone(),
				digest: tier.digest.clone(),
				size: tier.unencrypted_byte_count,
			})
		});

		let caption = match &reference.owner {
			AttachmentOwner::MessageBody { caption, .. }
			| AttachmentOwner::StoryMedia { caption, .. } => caption.clone(),
			_ => None,
		};

		FilePointer {
			content_type: Some(attachment.mime_type.clone()).filter(|mime| !mime.is_empty()),
			file_name: reference.source_filename.clone(),
			width: reference.source_media_size.map(|size| size.width),
			height: reference.source_media_size.map(|size| size.height),
			caption,
			locator: Some(locator),
		}
	}

	#[must_use]
	pub fn archive_message_attachment(
		reference: &AttachmentReference,
		attachment: &Attachment,
	) -> MessageAttachment {
		let flag = match &reference.owner {
			AttachmentOwner::MessageBody { rendering_flag, .. } => match rendering_flag {
				RenderingFlag::Default => AttachmentFlag::None,
				RenderingFlag::VoiceMessage => AttachmentFlag::VoiceMessage,
				RenderingFlag::Borderless => AttachmentFlag::Borderless,
				RenderingFlag::ShouldLoop => AttachmentFlag::Gif,
			},
			_ => AttachmentFlag::None,
		};

		MessageAttachment {
			pointer: Some(Self::archive_file_pointer(reference, attachment)),
			flag,
			was_downloaded: attachment.stream.is_some(),
		}
	}

	/// Gathers every attachment owned by the message at `message_row_id`. References to
	/// attachments that no longer exist are dropped as partial errors.
	pub fn archive_attachments<Tx: ReadTx + ?Sized>(
		message_row_id: RowId,
		interaction_id: &InteractionUniqueId,
		tx: &Tx,
	) -> Result<ArchiveInteractionResult<ArchivedAttachments>, StoreError> {
		let mut partial_errors = vec![];
		let mut archived = ArchivedAttachments::default();
		let mut body = vec![];

		for reference in tx.attachment_references(message_row_id)? {
			let Some(attachment) = tx.attachment(reference.attachment_row_id)? else {
				partial_errors.push(ArchiveFrameError::new(
					ArchiveFrameErrorKind::AttachmentMissing(reference.attachment_row_id),
					interaction_id.clone(),
				));
				continue;
			};

			match &reference.owner {
				AttachmentOwner::MessageBody {
					order_in_message, ..
				} => body.push((
					*order_in_message,
					Self::archive_message_attachment(&reference, &attachment),
				)),
				AttachmentOwner::OversizeText { .. } => {
					archived.long_text = Some(Self::archive_file_pointer(&reference, &attachment));
				}
				AttachmentOwner::LinkPreview { .. } => {
					archived.link_preview_image =
						Some(Self::archive_file_pointer(&reference, &attachment));
				}
				AttachmentOwner::QuotedReply { .. } => {
					archived.quoted_thumbnail =
						Some(Self::archive_message_attachment(&reference, &attachment));
				}
				owner => {
					debug!(
						owner = owner.kind(),
						%message_row_id,
						"Skipping attachment owner that has no place in a standard message;"
					);
				}
			}
		}

		body.sort_by_key(|(order, _)| *order);
		archived.body = body.into_iter().map(|(_, attachment)| attachment).collect();

		Ok(ArchiveInteractionResult::with_partial_errors(
			archived,
			partial_errors,
		))
	}

	/// Builds a not yet downloaded attachment out of a pointer.
	pub fn attachment_from_pointer(
		pointer: &FilePointer,
	) -> Result<Attachment, InvalidProtoDataError> {
		let locator = maybe_missing(&pointer.locator, "locator")?;

		let transit_tier = match locator {
			Locator::Attachment(locator) => {
				if locator.cdn_key.is_empty() || locator.key.is_empty() || locator.digest.is_empty()
				{
					return Err(InvalidProtoDataError::InvalidAttachmentLocator);
				}

				Some(TransitTierInfo {
					cdn_key: locator.cdn_key.clone(),
					cdn_number: locator.cdn_number,
					upload_timestamp_ms: locator.upload_timestamp.filter(|ts| *ts != 0),
					encryption_key: locator.key.clone(),
					digest: locator.digest.clone(),
					unencrypted_byte_count: locator.size,
				})
			}
			Locator::Invalid => None,
		};

		Ok(Attachment {
			row_id: None,
			mime_type: pointer
				.content_type
				.clone()
				.filter(|mime| !mime.is_empty())
				.unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
			transit_tier,
			stream: None,
		})
	}

	#[must_use]
	pub fn media_size(pointer: &FilePointer) -> Option<MediaSize> {
		match (pointer.width, pointer.height) {
			(Some(width), Some(height)) if width > 0 && height > 0 => {
				Some(MediaSize { width, height })
			}
			_ => None,
		}
	}

	/// Writes the attachment described by `pointer` and a reference from `owner` to it.
	/// Invalid pointers write nothing.
	pub fn restore_file_pointer(
		pointer: &FilePointer,
		owner: AttachmentOwner,
		tx: &mut dyn WriteTx,
	) -> Result<Result<(), InvalidProtoDataError>, StoreError> {
		let attachment = match Self::attachment_from_pointer(pointer) {
			Ok(attachment) => attachment,
			Err(e) => return Ok(Err(e)),
		};

		let source_unencrypted_byte_count = attachment
			.transit_tier
			.as_ref()
			.map(|tier| tier.unencrypted_byte_count);
		let attachment_row_id = tx.insert_attachment(attachment)?;

		tx.insert_attachment_reference(AttachmentReference {
			attachment_row_id,
			owner,
			source_filename: pointer.file_name.clone(),
			source_unencrypted_byte_count,
			source_media_size: Self::media_size(pointer),
		})?;

		Ok(Ok(()))
	}

	/// Restores the body attachments of a message, keeping their order. Broken attachments are
	/// dropped as partial errors, the message itself is kept.
	pub fn restore_body_attachments(
		attachments: &[MessageAttachment],
		message_row_id: RowId,
		chat_item_id: ChatItemId,
		tx: &mut dyn WriteTx,
	) -> Result<RestoreFrameResult<(), ChatItemId>, StoreError> {
		let mut partial_errors = vec![];

		for (order_in_message, attachment) in (0_u32..).zip(attachments) {
			let pointer = match maybe_missing(&attachment.pointer, "pointer") {
				Ok(pointer) => pointer,
				Err(e) => {
					partial_errors.push(RestoreFrameError::new(e, chat_item_id));
					continue;
				}
			};

			let rendering_flag = match attachment.flag {
				AttachmentFlag::None => RenderingFlag::Default,
				AttachmentFlag::VoiceMessage => RenderingFlag::VoiceMessage,
				AttachmentFlag::Borderless => RenderingFlag::Borderless,
				AttachmentFlag::Gif => RenderingFlag::ShouldLoop,
			};

			let owner = AttachmentOwner::MessageBody {
				message_row_id,
				order_in_message,
				rendering_flag,
				caption: pointer.caption.clone(),
			};

			if let Err(e) = Self::restore_file_pointer(pointer, owner, tx)? {
				partial_errors.push(RestoreFrameError::new(e, chat_item_id));
			}
		}

		Ok(RestoreFrameResult::with_partial_errors((), partial_errors))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::{Database, MemoryDatabase};

	fn pointer() -> FilePointer {
		FilePointer {
			content_type: Some("image/png".to_string()),
			file_name: Some("cat.png".to_string()),
			width: Some(640),
			height: Some(480),
			caption: Some("a cat".to_string()),
			locator: Some(Locator::Attachment(AttachmentLocator {
				cdn_key: "abc".to_string(),
				cdn_number: 3,
				upload_timestamp: Some(1_700_000_000_000),
				key: vec![1; 64],
				digest: vec![2; 32],
				size: 1234,
			})),
		}
	}

	#[test]
	fn pointer_without_locator_is_rejected() {
		let pointer = FilePointer {
			locator: None,
			..pointer()
		};

		assert_eq!(
			MessageAttachmentArchiver::attachment_from_pointer(&pointer),
			Err(InvalidProtoDataError::MissingField("locator"))
		);
	}

	#[test]
	fn invalid_locator_keeps_metadata_only() {
		let attachment = MessageAttachmentArchiver::attachment_from_pointer(&FilePointer {
			content_type: None,
			locator: Some(Locator::Invalid),
			..pointer()
		})
		.unwrap();

		assert_eq!(attachment.mime_type, DEFAULT_MIME_TYPE);
		assert!(attachment.transit_tier.is_none());
	}

	#[test]
	fn body_attachments_keep_order_and_flags() {
		let db = MemoryDatabase::new();
		let id = ChatItemId {
			chat_id: crate::ids::ChatId(1),
			date_sent: 100,
		};

		let attachments = vec![
			MessageAttachment {
				pointer: Some(pointer()),
				flag: AttachmentFlag::Gif,
				was_downloaded: false,
			},
			MessageAttachment {
				pointer: None,
				flag: AttachmentFlag::None,
				was_downloaded: false,
			},
			MessageAttachment {
				pointer: Some(FilePointer {
					file_name: Some("dog.png".to_string()),
					..pointer()
				}),
				flag: AttachmentFlag::VoiceMessage,
				was_downloaded: false,
			},
		];

		let archived = db
			.write(|tx| {
				let result =
					MessageAttachmentArchiver::restore_body_attachments(&attachments, 10, id, tx)?;
				assert!(matches!(result, RestoreFrameResult::PartialRestore((), errors) if errors.len() == 1));

				MessageAttachmentArchiver::archive_attachments(
					10,
					&InteractionUniqueId("m".to_string()),
					&*tx,
				)
			})
			.unwrap();

		let ArchiveInteractionResult::Success(archived) = archived else {
			panic!("expected every stored attachment to archive");
		};

		let names = archived
			.body
			.iter()
			.map(|attachment| {
				(
					attachment.flag,
					attachment
						.pointer
						.as_ref()
						.and_then(|pointer| pointer.file_name.clone()),
				)
			})
			.collect::<Vec<_>>();

		assert_eq!(
			names,
			vec![
				(AttachmentFlag::Gif, Some("cat.png".to_string())),
				(AttachmentFlag::VoiceMessage, Some("dog.png".to_string())),
			]
		);
		assert_eq!(
			archived.body[0].pointer.as_ref().and_then(|p| p.caption.as_deref()),
			Some("a cat")
		);
	}
}
