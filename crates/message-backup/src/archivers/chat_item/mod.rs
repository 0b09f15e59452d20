use sd_backup_proto::{ChatItem, ChatItemType, DirectionalDetails, FrameSink};

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::{
	attachment::ThumbnailTranscoder,
	context::{ArchivingAddress, ChatArchivingContext, ChatRestoringContext, ChatThread},
	error::{
		maybe_missing, ArchiveFrameErrorKind, FatalArchivingError, IdentifierNotFound,
		RestoreFrameErrorKind,
	},
	identifiers::ContactAddress,
	ids::{ChatId, ChatItemId, InteractionUniqueId, RecipientId, LOCAL_RECIPIENT_ID},
	report::PassReport,
	result::{ArchiveInteractionResult, RestoreFrameResult},
	store::{Interaction, InteractionKind, ReadTx, StoreError, Thread, WriteTx},
};

use super::write_frame;

mod standard_message;
mod update_message;

pub use standard_message::StandardMessageArchiver;
pub use update_message::{
	ChatUpdateMessageArchiver, ExpirationTimerChatUpdateArchiver, ProfileChangeChatUpdateArchiver,
	SessionSwitchoverChatUpdateArchiver, SimpleChatUpdateArchiver, ThreadMergeChatUpdateArchiver,
};

/// What an interaction archiver produces; [`ChatItemArchiver`] wraps it into a [`ChatItem`].
#[derive(Debug)]
pub struct ChatItemDetails {
	pub author: RecipientId,
	pub directional_details: DirectionalDetails,
	pub item: ChatItemType,
}

/// Interactions of every archived thread.
#[derive(Debug)]
pub struct ChatItemArchiver {
	standard_message: StandardMessageArchiver,
	update_message: ChatUpdateMessageArchiver,
}

impl ChatItemArchiver {
	#[must_use]
	pub fn new(link_previews_enabled: bool, transcoder: Arc<dyn ThumbnailTranscoder>) -> Self {
		Self {
			standard_message: StandardMessageArchiver::new(link_previews_enabled, transcoder),
			update_message: ChatUpdateMessageArchiver::default(),
		}
	}

	#[instrument(skip_all)]
	pub fn archive_interactions(
		&self,
		sink: &mut dyn FrameSink,
		context: &ChatArchivingContext,
		tx: &dyn ReadTx,
		report: &mut PassReport,
	) -> Result<(), FatalArchivingError> {
		for thread in tx.threads()? {
			let Some(chat_id) = context.get(&thread.unique_id) else {
				debug!(
					thread_unique_id = %thread.unique_id,
					"Skipping interactions of a thread that has no chat;"
				);
				continue;
			};

			for interaction in tx.interactions(&thread.unique_id)? {
				let (chat_item, outcome) = self
					.archive_interaction(&interaction, &thread, chat_id, context, tx)?
					.into_parts();

				if let Some(chat_item) = chat_item {
					write_frame(sink, chat_item)?;
				}
				report.record(outcome);
			}
		}

		Ok(())
	}

	fn archive_interaction(
		&self,
		interaction: &Interaction,
		thread: &Thread,
		chat_id: ChatId,
		context: &ChatArchivingContext,
		tx: &dyn ReadTx,
	) -> Result<ArchiveInteractionResult<ChatItem>, StoreError> {
		let details = match &interaction.kind {
			InteractionKind::Incoming(message) => {
				self.standard_message
					.archive_incoming(interaction, message, context, tx)?
			}
			InteractionKind::Outgoing(message) => {
				self.standard_message
					.archive_outgoing(interaction, message, context, tx)?
			}
			InteractionKind::Info(info) => {
				self.update_message
					.archive(interaction, info, thread, context)
			}
		};

		Ok(details.map(|details| ChatItem {
			chat_id: chat_id.0,
			author_id: details.author.0,
			date_sent: interaction.timestamp,
			expire_start_date: interaction.expire_started_at_ms,
			expires_in_ms: interaction.expires_in_ms,
			sms: false,
			directional_details: Some(details.directional_details),
			item: Some(details.item),
		}))
	}

	pub fn restore(
		&self,
		chat_item: &ChatItem,
		context: &ChatRestoringContext,
		tx: &mut dyn WriteTx,
	) -> Result<RestoreFrameResult<(), ChatItemId>, StoreError> {
		let id = ChatItemId::from(chat_item);

		let Some(thread) = context.get(id.chat_id) else {
			return Ok(RestoreFrameResult::failure(
				IdentifierNotFound::ChatId(id.chat_id),
				id,
			));
		};

		let author_id = RecipientId(chat_item.author_id);
		let recipients = context.recipient_context();
		let Some(author) = recipients.get(author_id) else {
			return Ok(RestoreFrameResult::failure(
				IdentifierNotFound::RecipientId(author_id),
				id,
			));
		};

		let item = match maybe_missing(&chat_item.item, "item") {
			Ok(item) => item,
			Err(e) => return Ok(RestoreFrameResult::failure(e, id)),
		};

		if tx.thread(&thread.thread_unique_id)?.is_none() {
			return Ok(RestoreFrameResult::failure(
				RestoreFrameErrorKind::ReferencedChatThreadNotFound(id.chat_id),
				id,
			));
		}

		match item {
			ChatItemType::StandardMessage(message) => self
				.standard_message
				.restore(message, chat_item, author, thread, recipients, tx),
			ChatItemType::UpdateMessage(update) => self
				.update_message
				.restore(update, chat_item, author, thread, tx),
		}
	}
}

/// Author id of an info message, whose author is the local user when unset.
fn info_message_author(
	author: Option<&ContactAddress>,
	interaction_id: &InteractionUniqueId,
	context: &ChatArchivingContext,
) -> Result<RecipientId, ArchiveInteractionResult<ChatItemDetails>> {
	let Some(author) = author else {
		return Ok(LOCAL_RECIPIENT_ID);
	};

	let address = ArchivingAddress::Contact(author.clone());

	context
		.recipient_context()
		.lookup(&address)
		.ok_or_else(|| {
			ArchiveInteractionResult::failure(
				ArchiveFrameErrorKind::ReferencedRecipientIdMissing(address),
				interaction_id,
			)
		})
}

/// A fresh interaction of the thread behind `thread`, timed like `chat_item`.
fn restored_interaction(
	chat_item: &ChatItem,
	thread: &ChatThread,
	kind: InteractionKind,
) -> Interaction {
	Interaction {
		row_id: None,
		unique_id: InteractionUniqueId::random(),
		thread_unique_id: thread.thread_unique_id.clone(),
		timestamp: chat_item.date_sent,
		expire_started_at_ms: chat_item.expire_start_date.filter(|ms| *ms != 0),
		expires_in_ms: chat_item.expires_in_ms.filter(|ms| *ms != 0),
		kind,
	}
}
