use sd_backup_proto::{
	ChatItem, ChatItemType, ChatUpdate, ChatUpdateMessage, DirectionalDetails,
	ExpirationTimerChatUpdate,
};

use crate::{
	context::{ChatArchivingContext, ChatThread, RestoringAddress},
	error::InvalidProtoDataError,
	identifiers::ContactAddress,
	ids::ChatItemId,
	result::{ArchiveInteractionResult, RestoreFrameResult},
	store::{InfoMessageKind, Interaction, StoreError, WriteTx},
};

use super::{
	super::{info_message_author, ChatItemDetails},
	info_author, insert_info_message,
};

/// Disappearing message timer changes. Stored in seconds, archived in milliseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpirationTimerChatUpdateArchiver;

impl ExpirationTimerChatUpdateArchiver {
	pub fn archive(
		&self,
		interaction: &Interaction,
		expires_in_secs: u32,
		author: Option<&ContactAddress>,
		context: &ChatArchivingContext,
	) -> ArchiveInteractionResult<ChatItemDetails> {
		let author = match info_message_author(author, &interaction.unique_id, context) {
			Ok(author) => author,
			Err(failure) => return failure,
		};

		ArchiveInteractionResult::Success(ChatItemDetails {
			author,
			directional_details: DirectionalDetails::Directionless,
			item: ChatItemType::UpdateMessage(ChatUpdateMessage {
				update: Some(ChatUpdate::ExpirationTimerChange(ExpirationTimerChatUpdate {
					expires_in_ms: u64::from(expires_in_secs) * 1000,
				})),
			}),
		})
	}

	pub fn restore(
		&self,
		update: &ExpirationTimerChatUpdate,
		chat_item: &ChatItem,
		author: &RestoringAddress,
		thread: &ChatThread,
		tx: &mut dyn WriteTx,
	) -> Result<RestoreFrameResult<(), ChatItemId>, StoreError> {
		let Some(expires_in_secs) = expires_in_secs(update.expires_in_ms) else {
			return Ok(RestoreFrameResult::failure(
				InvalidProtoDataError::InvalidExpirationTimer(update.expires_in_ms),
				ChatItemId::from(chat_item),
			));
		};

		insert_info_message(
			chat_item,
			thread,
			InfoMessageKind::DisappearingMessagesUpdate { expires_in_secs },
			info_author(author),
			tx,
		)?;

		Ok(RestoreFrameResult::Success(()))
	}
}

/// Whole seconds that fit the stored timer, zero meaning off.
fn expires_in_secs(expires_in_ms: u64) -> Option<u32> {
	if expires_in_ms % 1000 != 0 {
		return None;
	}

	u32::try_from(expires_in_ms / 1000).ok()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn timer_must_be_whole_seconds() {
		assert_eq!(expires_in_secs(0), Some(0));
		assert_eq!(expires_in_secs(86_400_000), Some(86_400));
		assert_eq!(expires_in_secs(1_500), None);
		assert_eq!(expires_in_secs((u64::from(u32::MAX) + 1) * 1000), None);
	}
}
