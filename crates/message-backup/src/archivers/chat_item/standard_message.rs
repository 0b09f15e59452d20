use sd_backup_proto::{
	ChatItem, ChatItemType, DeliveryStatus, DirectionalDetails, IncomingMessageDetails,
	OutgoingMessageDetails, Quote, QuoteType, QuotedAttachment, SendStatus, StandardMessage, Text,
};

use std::sync::Arc;

use tracing::debug;

use crate::{
	archivers::{ArchivedAttachments, MessageAttachmentArchiver},
	attachment::{
		create_quoted_reply_reference, resolve_quoted_reply_source, Attachment, AttachmentOwner,
		AttachmentReference, BackupLinkPreviewBuilder, LinkPreviewDraft, LinkPreviewManager,
		QuotedReplyAttachmentDataSource, ThumbnailTranscoder,
	},
	context::{
		ArchivingAddress, ChatArchivingContext, ChatThread, RecipientRestoringContext,
		RestoringAddress,
	},
	error::{
		maybe_missing, ArchiveFrameError, ArchiveFrameErrorKind, IdentifierNotFound,
		InvalidProtoDataError, LinkPreviewError, MissingFieldError, RestoreFrameError,
	},
	identifiers::ContactAddress,
	ids::{ChatItemId, RecipientId, LOCAL_RECIPIENT_ID},
	result::{bubble_up, ArchiveInteractionResult, InteractionArchiveError, RestoreFrameResult},
	store::{
		IncomingMessage, Interaction, InteractionKind, MessageContent, OutgoingMessage,
		OutgoingMessageStatus, OutgoingRecipientState, QuotedAttachmentInfo, QuotedMessage, Reaction,
		ReadTx, StoreError, WriteTx,
	},
};

use super::{restored_interaction, ChatItemDetails};

type RestoreError = RestoreFrameError<ChatItemId>;

/// Who a restored message came from, checked before anything is written.
enum Direction<'a> {
	Incoming(ContactAddress, &'a IncomingMessageDetails),
	Outgoing(Vec<OutgoingRecipientState>),
}

/// Incoming and outgoing messages with text, attachments, quotes, link previews and reactions.
#[derive(Debug)]
pub struct StandardMessageArchiver {
	link_previews: LinkPreviewManager<BackupLinkPreviewBuilder>,
	transcoder: Arc<dyn ThumbnailTranscoder>,
}

impl StandardMessageArchiver {
	#[must_use]
	pub fn new(link_previews_enabled: bool, transcoder: Arc<dyn ThumbnailTranscoder>) -> Self {
		Self {
			link_previews: LinkPreviewManager::new(BackupLinkPreviewBuilder, link_previews_enabled),
			transcoder,
		}
	}

	pub fn archive_incoming(
		&self,
		interaction: &Interaction,
		message: &IncomingMessage,
		context: &ChatArchivingContext,
		tx: &dyn ReadTx,
	) -> Result<ArchiveInteractionResult<ChatItemDetails>, StoreError> {
		let id = &interaction.unique_id;

		let author = match maybe_missing(&message.author, "author") {
			Ok(author) => author,
			Err(e) => return Ok(ArchiveInteractionResult::failure(e, id)),
		};

		let address = ArchivingAddress::Contact(author.clone());
		let Some(author) = context.recipient_context().lookup(&address) else {
			return Ok(ArchiveInteractionResult::failure(
				ArchiveFrameErrorKind::ReferencedRecipientIdMissing(address),
				id,
			));
		};

		let mut partial_errors = vec![];
		let standard_message = bubble_up!(
			self.archive_content(interaction, &message.content, context, tx)?,
			&mut partial_errors
		);

		Ok(ArchiveInteractionResult::with_partial_errors(
			ChatItemDetails {
				author,
				directional_details: DirectionalDetails::Incoming(IncomingMessageDetails {
					date_received: message.received_at_ms,
					date_server_sent: message.server_sent_at_ms,
					read: message.read,
					sealed_sender: message.sealed_sender,
				}),
				item: ChatItemType::StandardMessage(standard_message),
			},
			partial_errors,
		))
	}

	pub fn archive_outgoing(
		&self,
		interaction: &Interaction,
		message: &OutgoingMessage,
		context: &ChatArchivingContext,
		tx: &dyn ReadTx,
	) -> Result<ArchiveInteractionResult<ChatItemDetails>, StoreError> {
		let id = &interaction.unique_id;
		let mut partial_errors = vec![];

		let mut send_status = Vec::with_capacity(message.recipient_states.len());
		for state in &message.recipient_states {
			let address = ArchivingAddress::Contact(state.address.clone());
			let Some(recipient_id) = context.recipient_context().lookup(&address) else {
				partial_errors.push(ArchiveFrameError::new(
					ArchiveFrameErrorKind::ReferencedRecipientIdMissing(address),
					id.clone(),
				));
				continue;
			};

			send_status.push(SendStatus {
				recipient_id: recipient_id.0,
				timestamp: state.updated_at_ms,
				status: match state.status {
					OutgoingMessageStatus::Pending => DeliveryStatus::Pending,
					OutgoingMessageStatus::Sent => DeliveryStatus::Sent,
					OutgoingMessageStatus::Delivered => DeliveryStatus::Delivered,
					OutgoingMessageStatus::Read => DeliveryStatus::Read,
					OutgoingMessageStatus::Viewed => DeliveryStatus::Viewed,
					OutgoingMessageStatus::Skipped => DeliveryStatus::Skipped,
					OutgoingMessageStatus::Failed => DeliveryStatus::Failed,
				},
			});
		}

		let standard_message = bubble_up!(
			self.archive_content(interaction, &message.content, context, tx)?,
			&mut partial_errors
		);

		Ok(ArchiveInteractionResult::with_partial_errors(
			ChatItemDetails {
				author: LOCAL_RECIPIENT_ID,
				directional_details: DirectionalDetails::Outgoing(OutgoingMessageDetails {
					send_status,
				}),
				item: ChatItemType::StandardMessage(standard_message),
			},
			partial_errors,
		))
	}

	fn archive_content(
		&self,
		interaction: &Interaction,
		content: &MessageContent,
		context: &ChatArchivingContext,
		tx: &dyn ReadTx,
	) -> Result<ArchiveInteractionResult<StandardMessage>, StoreError> {
		let id = &interaction.unique_id;
		let recipients = context.recipient_context();

		let row_id = match maybe_missing(interaction.row_id, "row_id") {
			Ok(row_id) => row_id,
			Err(e) => return Ok(ArchiveInteractionResult::failure(e, id)),
		};

		let mut partial_errors: Vec<InteractionArchiveError> = vec![];

		let ArchivedAttachments {
			body: attachments,
			long_text,
			link_preview_image,
			quoted_thumbnail,
		} = bubble_up!(
			MessageAttachmentArchiver::archive_attachments(row_id, id, tx)?,
			&mut partial_errors
		);

		let text = content
			.body
			.clone()
			.filter(|body| !body.is_empty())
			.map(|body| Text { body });

		if text.is_none() && attachments.is_empty() && long_text.is_none() {
			partial_errors.push(ArchiveFrameError::new(
				MissingFieldError::new("body"),
				id.clone(),
			));
			return Ok(ArchiveInteractionResult::MessageFailure(partial_errors));
		}

		let quote = if let Some(quoted) = &content.quoted_message {
			let address = ArchivingAddress::Contact(quoted.author.clone());
			let Some(author_id) = recipients.lookup(&address) else {
				partial_errors.push(ArchiveFrameError::new(
					ArchiveFrameErrorKind::ReferencedRecipientIdMissing(address),
					id.clone(),
				));
				return Ok(ArchiveInteractionResult::MessageFailure(partial_errors));
			};

			let attachments = match (&quoted.attachment_info, quoted_thumbnail) {
				(None, None) => vec![],
				(info, thumbnail) => vec![QuotedAttachment {
					content_type: info.as_ref().and_then(|info| info.content_type.clone()),
					file_name: info.as_ref().and_then(|info| info.source_filename.clone()),
					thumbnail,
				}],
			};

			Some(Quote {
				target_sent_timestamp: quoted.original_timestamp,
				author_id: author_id.0,
				text: quoted.body.clone(),
				attachments,
				kind: if quoted.is_gift_badge {
					QuoteType::GiftBadge
				} else {
					QuoteType::Normal
				},
			})
		} else {
			None
		};

		let link_preview = content
			.link_preview
			.iter()
			.map(|preview| sd_backup_proto::LinkPreview {
				url: preview.url.clone(),
				title: preview.title.clone(),
				image: link_preview_image.clone(),
				description: preview.description.clone(),
				date: preview.date_ms,
			})
			.collect();

		let mut reactions = Vec::with_capacity(content.reactions.len());
		for reaction in &content.reactions {
			let address = ArchivingAddress::Contact(reaction.author.clone());
			let Some(author_id) = recipients.lookup(&address) else {
				partial_errors.push(ArchiveFrameError::new(
					ArchiveFrameErrorKind::ReferencedRecipientIdMissing(address),
					id.clone(),
				));
				continue;
			};

			reactions.push(sd_backup_proto::Reaction {
				emoji: reaction.emoji.clone(),
				author_id: author_id.0,
				sent_timestamp: reaction.sent_at_ms,
				sort_order: reaction.sort_order,
			});
		}

		Ok(ArchiveInteractionResult::with_partial_errors(
			StandardMessage {
				quote,
				text,
				attachments,
				link_preview,
				long_text,
				reactions,
			},
			partial_errors,
		))
	}

	/// Everything that can fail the frame is checked before the first write.
	pub fn restore(
		&self,
		message: &StandardMessage,
		chat_item: &ChatItem,
		author: &RestoringAddress,
		thread: &ChatThread,
		recipients: &RecipientRestoringContext,
		tx: &mut dyn WriteTx,
	) -> Result<RestoreFrameResult<(), ChatItemId>, StoreError> {
		let id = ChatItemId::from(chat_item);
		let mut partial_errors = vec![];

		let directional_details =
			match maybe_missing(&chat_item.directional_details, "directional_details") {
				Ok(directional_details) => directional_details,
				Err(e) => return Ok(RestoreFrameResult::failure(e, id)),
			};

		let body = message
			.text
			.as_ref()
			.map(|text| text.body.clone())
			.filter(|body| !body.is_empty());

		if body.is_none() && message.attachments.is_empty() && message.long_text.is_none() {
			return Ok(RestoreFrameResult::failure(
				InvalidProtoDataError::EmptyStandardMessage,
				id,
			));
		}

		let direction = match directional_details {
			DirectionalDetails::Incoming(details) => {
				let RestoringAddress::Contact(author) = author else {
					return Ok(RestoreFrameResult::failure(
						InvalidProtoDataError::IncomingMessageNotFromContact,
						id,
					));
				};

				Direction::Incoming(author.clone(), details)
			}
			DirectionalDetails::Outgoing(details) => {
				if *author != RestoringAddress::LocalAddress {
					return Ok(RestoreFrameResult::failure(
						InvalidProtoDataError::OutgoingMessageNotFromLocalUser,
						id,
					));
				}

				let mut recipient_states = Vec::with_capacity(details.send_status.len());
				for status in &details.send_status {
					match restore_send_status(status, recipients, id) {
						Ok(state) => recipient_states.push(state),
						Err(e) => partial_errors.push(e),
					}
				}

				Direction::Outgoing(recipient_states)
			}
			DirectionalDetails::Directionless => {
				return Ok(RestoreFrameResult::failure(
					InvalidProtoDataError::DirectionlessStandardMessage,
					id,
				));
			}
		};

		let mut reactions = Vec::with_capacity(message.reactions.len());
		for reaction in &message.reactions {
			match resolve_contact(recipients, RecipientId(reaction.author_id), id) {
				Ok(author) => reactions.push(Reaction {
					author,
					emoji: reaction.emoji.clone(),
					sent_at_ms: reaction.sent_timestamp,
					sort_order: reaction.sort_order,
				}),
				Err(e) => partial_errors.push(e),
			}
		}

		let (quoted_message, quote_source) = match &message.quote {
			Some(quote) => self
				.restore_quote(quote, thread, recipients, id, &mut partial_errors, &*tx)?
				.map_or((None, None), |(quoted, source)| (Some(quoted), source)),
			None => (None, None),
		};

		let link_preview_source = message.link_preview.first().and_then(|preview| {
			let draft = LinkPreviewDraft {
				url: preview.url.clone(),
				title: preview.title.clone(),
				description: preview.description.clone(),
				date_ms: preview.date,
			};

			match self.link_previews.validate_and_build_data_source(
				draft,
				preview.image.clone(),
				body.as_deref(),
			) {
				Ok(data_source) => Some(data_source),
				Err(LinkPreviewError::FeatureDisabled) => {
					debug!(%id, "Dropping link preview, link previews are disabled;");
					None
				}
				Err(e) => {
					partial_errors.push(RestoreFrameError::new(e, id));
					None
				}
			}
		});

		// Writes start here.

		let link_preview = match link_preview_source {
			Some(data_source) => Some(self.link_previews.create_link_preview(data_source, tx)?),
			None => None,
		};

		let content = MessageContent {
			body,
			quoted_message,
			link_preview: link_preview.as_ref().map(|owned| owned.preview.clone()),
			reactions,
		};

		let kind = match direction {
			Direction::Incoming(author, details) => InteractionKind::Incoming(IncomingMessage {
				author: Some(author),
				received_at_ms: details.date_received,
				server_sent_at_ms: details.date_server_sent.filter(|ms| *ms != 0),
				read: details.read,
				sealed_sender: details.sealed_sender,
				content,
			}),
			Direction::Outgoing(recipient_states) => InteractionKind::Outgoing(OutgoingMessage {
				recipient_states,
				content,
			}),
		};

		let message_row_id = tx.insert_interaction(restored_interaction(chat_item, thread, kind))?;

		if let Some(link_preview) = link_preview {
			link_preview.finalize(message_row_id, tx)?;
		}

		bubble_up!(
			MessageAttachmentArchiver::restore_body_attachments(
				&message.attachments,
				message_row_id,
				id,
				tx
			)?,
			&mut partial_errors
		);

		if let Some(long_text) = &message.long_text {
			if let Err(e) = MessageAttachmentArchiver::restore_file_pointer(
				long_text,
				AttachmentOwner::OversizeText { message_row_id },
				tx,
			)? {
				partial_errors.push(RestoreFrameError::new(e, id));
			}
		}

		if let Some(source) = quote_source {
			create_quoted_reply_reference(source, message_row_id, tx)?;
		}

		Ok(RestoreFrameResult::with_partial_errors((), partial_errors))
	}

	/// An unresolvable quote author drops the quote, not the message.
	fn restore_quote(
		&self,
		quote: &Quote,
		thread: &ChatThread,
		recipients: &RecipientRestoringContext,
		id: ChatItemId,
		partial_errors: &mut Vec<RestoreError>,
		tx: &dyn WriteTx,
	) -> Result<Option<(QuotedMessage, Option<QuotedReplyAttachmentDataSource>)>, StoreError> {
		let author = match resolve_contact(recipients, RecipientId(quote.author_id), id) {
			Ok(author) => author,
			Err(e) => {
				partial_errors.push(e);
				return Ok(None);
			}
		};

		let original_timestamp = quote.target_sent_timestamp.filter(|ts| *ts != 0);

		let (attachment_info, source) = match quote.attachments.first() {
			None => (None, None),
			Some(quoted_attachment) => {
				let original = match original_timestamp {
					Some(timestamp) => find_original_attachment(thread, timestamp, tx)?,
					None => None,
				};

				let pointer = quoted_attachment
					.thumbnail
					.as_ref()
					.and_then(|thumbnail| thumbnail.pointer.as_ref())
					.and_then(|pointer| {
						MessageAttachmentArchiver::attachment_from_pointer(pointer)
							.map_err(|e| partial_errors.push(RestoreFrameError::new(e, id)))
							.ok()
					});

				let source = resolve_quoted_reply_source(
					original
						.as_ref()
						.map(|(reference, attachment)| (reference, attachment)),
					pointer,
					quoted_attachment.file_name.clone(),
					&*self.transcoder,
				);

				(
					Some(QuotedAttachmentInfo {
						content_type: quoted_attachment.content_type.clone(),
						source_filename: quoted_attachment.file_name.clone(),
					}),
					source,
				)
			}
		};

		Ok(Some((
			QuotedMessage {
				original_timestamp,
				author,
				body: quote.text.clone().filter(|text| !text.is_empty()),
				attachment_info,
				is_gift_badge: quote.kind == QuoteType::GiftBadge,
			},
			source,
		)))
	}
}

/// The first body attachment of the message a quote points at, if that message is here.
fn find_original_attachment(
	thread: &ChatThread,
	timestamp: u64,
	tx: &dyn WriteTx,
) -> Result<Option<(AttachmentReference, Attachment)>, StoreError> {
	let Some(message_row_id) = tx
		.find_message_by_timestamp(&thread.thread_unique_id, timestamp)?
		.and_then(|message| message.row_id)
	else {
		return Ok(None);
	};

	let Some(reference) = tx
		.attachment_references(message_row_id)?
		.into_iter()
		.filter_map(|reference| match reference.owner {
			AttachmentOwner::MessageBody {
				order_in_message, ..
			} => Some((order_in_message, reference)),
			_ => None,
		})
		.min_by_key(|(order, _)| *order)
		.map(|(_, reference)| reference)
	else {
		return Ok(None);
	};

	Ok(tx
		.attachment(reference.attachment_row_id)?
		.map(|attachment| (reference, attachment)))
}

fn resolve_contact(
	recipients: &RecipientRestoringContext,
	recipient_id: RecipientId,
	id: ChatItemId,
) -> Result<ContactAddress, RestoreError> {
	if recipients.get(recipient_id).is_none() {
		return Err(RestoreFrameError::new(
			IdentifierNotFound::RecipientId(recipient_id),
			id,
		));
	}

	recipients.contact_address(recipient_id).ok_or_else(|| {
		RestoreFrameError::new(InvalidProtoDataError::RecipientNotContact(recipient_id), id)
	})
}

fn restore_send_status(
	status: &SendStatus,
	recipients: &RecipientRestoringContext,
	id: ChatItemId,
) -> Result<OutgoingRecipientState, RestoreError> {
	let address = resolve_contact(recipients, RecipientId(status.recipient_id), id)?;

	let delivery_status = match status.status {
		DeliveryStatus::Unknown => {
			return Err(RestoreFrameError::new(
				InvalidProtoDataError::UnknownDeliveryStatus,
				id,
			))
		}
		DeliveryStatus::Pending => OutgoingMessageStatus::Pending,
		DeliveryStatus::Sent => OutgoingMessageStatus::Sent,
		DeliveryStatus::Delivered => OutgoingMessageStatus::Delivered,
		DeliveryStatus::Read => OutgoingMessageStatus::Read,
		DeliveryStatus::Viewed => OutgoingMessageStatus::Viewed,
		DeliveryStatus::Skipped => OutgoingMessageStatus::Skipped,
		DeliveryStatus::Failed => OutgoingMessageStatus::Failed,
	};

	Ok(OutgoingRecipientState {
		address,
		status: delivery_status,
		updated_at_ms: status.timestamp,
	})
}
