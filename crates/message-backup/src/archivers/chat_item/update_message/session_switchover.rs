use sd_backup_proto::{
	ChatItem, ChatItemType, ChatUpdate, ChatUpdateMessage, DirectionalDetails,
	SessionSwitchoverChatUpdate,
};

use crate::{
	context::{ArchivingAddress, ChatArchivingContext, ChatThread, RestoringAddress},
	error::{maybe_missing, ArchiveFrameErrorKind, InvalidProtoDataError},
	identifiers::E164,
	ids::ChatItemId,
	result::{
		ArchiveInteractionResult, LegacyInfoMessageType, RestoreFrameResult, SkippableChatUpdate,
	},
	store::{InfoMessageKind, Interaction, StoreError, Thread, ThreadKind, WriteTx},
};

use super::{super::ChatItemDetails, info_author, insert_info_message};

/// "Your safety number with this contact changed", with the number the session belonged to.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionSwitchoverChatUpdateArchiver;

impl SessionSwitchoverChatUpdateArchiver {
	pub fn archive(
		&self,
		interaction: &Interaction,
		phone_number: Option<&str>,
		thread: &Thread,
		context: &ChatArchivingContext,
	) -> ArchiveInteractionResult<ChatItemDetails> {
		let Some(e164) = phone_number.and_then(E164::parse) else {
			return ArchiveInteractionResult::SkippableChatUpdate(
				SkippableChatUpdate::LegacyInfoMessage(
					LegacyInfoMessageType::SessionSwitchoverWithoutPhoneNumber,
				),
			);
		};

		let ThreadKind::Contact(address) = &thread.kind else {
			return ArchiveInteractionResult::failure(
				ArchiveFrameErrorKind::SessionSwitchoverUpdateMissingAuthor,
				&interaction.unique_id,
			);
		};

		let address = ArchivingAddress::Contact(address.clone());
		let Some(author) = context.recipient_context().lookup(&address) else {
			return ArchiveInteractionResult::failure(
				ArchiveFrameErrorKind::ReferencedRecipientIdMissing(address),
				&interaction.unique_id,
			);
		};

		ArchiveInteractionResult::Success(ChatItemDetails {
			author,
			directional_details: DirectionalDetails::Directionless,
			item: ChatItemType::UpdateMessage(ChatUpdateMessage {
				update: Some(ChatUpdate::SessionSwitchover(SessionSwitchoverChatUpdate {
					e164: Some(e164.to_u64()),
				})),
			}),
		})
	}

	pub fn restore(
		&self,
		update: &SessionSwitchoverChatUpdate,
		chat_item: &ChatItem,
		author: &RestoringAddress,
		thread: &ChatThread,
		tx: &mut dyn WriteTx,
	) -> Result<RestoreFrameResult<(), ChatItemId>, StoreError> {
		let id = ChatItemId::from(chat_item);

		let e164 = match maybe_missing(update.e164.filter(|e164| *e164 != 0), "e164") {
			Ok(e164) => e164,
			Err(e) => return Ok(RestoreFrameResult::failure(e, id)),
		};

		let Some(e164) = E164::from_u64(e164) else {
			return Ok(RestoreFrameResult::failure(
				InvalidProtoDataError::InvalidE164,
				id,
			));
		};

		if !matches!(thread.kind, ThreadKind::Contact(_))
			|| !matches!(author, RestoringAddress::Contact(_))
		{
			return Ok(RestoreFrameResult::failure(
				InvalidProtoDataError::SessionSwitchoverUpdateNotFromContact,
				id,
			));
		}

		insert_info_message(
			chat_item,
			thread,
			InfoMessageKind::SessionSwitchover {
				phone_number: Some(e164.as_str().to_string()),
			},
			info_author(author),
			tx,
		)?;

		Ok(RestoreFrameResult::Success(()))
	}
}
