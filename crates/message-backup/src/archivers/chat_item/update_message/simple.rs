use sd_backup_proto::{
	ChatItem, ChatItemType, ChatUpdate, ChatUpdateMessage, DirectionalDetails, SimpleChatUpdate,
	SimpleChatUpdateType,
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

/// Updates that carry nothing but their type.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleChatUpdateArchiver;

impl SimpleChatUpdateArchiver {
	pub fn archive(
		&self,
		interaction: &Interaction,
		kind: SimpleChatUpdateType,
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
				update: Some(ChatUpdate::SimpleUpdate(SimpleChatUpdate { kind })),
			}),
		})
	}

	pub fn restore(
		&self,
		update: &SimpleChatUpdate,
		chat_item: &ChatItem,
		author: &RestoringAddress,
		thread: &ChatThread,
		tx: &mut dyn WriteTx,
	) -> Result<RestoreFrameResult<(), ChatItemId>, StoreError> {
		let kind = match update.kind {
			SimpleChatUpdateType::Unknown => {
				return Ok(RestoreFrameResult::failure(
					InvalidProtoDataError::UnrecognizedSimpleUpdate,
					ChatItemId::from(chat_item),
				))
			}
			SimpleChatUpdateType::JoinedSignal => InfoMessageKind::ContactJoinedSignal,
			SimpleChatUpdateType::IdentityUpdate => InfoMessageKind::IdentityChanged,
			SimpleChatUpdateType::EndSession => InfoMessageKind::SessionEnded,
			SimpleChatUpdateType::ChatSessionRefresh => InfoMessageKind::ChatSessionRefresh,
		};

		insert_info_message(chat_item, thread, kind, info_author(author), tx)?;

		Ok(RestoreFrameResult::Success(()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		context::{ArchivingAddress, RecipientArchivingContext},
		error::ArchiveFrameErrorKind,
		identifiers::{Aci, LocalIdentifiers, E164},
		ids::{InteractionUniqueId, ThreadUniqueId, LOCAL_RECIPIENT_ID},
		store::{InfoMessage, InteractionKind},
	};

	use uuid::Uuid;

	fn info_interaction(author: Option<ContactAddress>) -> Interaction {
		Interaction {
			row_id: Some(7),
			unique_id: InteractionUniqueId::random(),
			thread_unique_id: ThreadUniqueId::random(),
			timestamp: 5_000,
			expire_started_at_ms: None,
			expires_in_ms: None,
			kind: InteractionKind::Info(InfoMessage {
				kind: InfoMessageKind::IdentityChanged,
				author,
			}),
		}
	}

	#[test]
	fn unauthored_updates_belong_to_the_local_user() {
		let local = LocalIdentifiers::new(
			Aci::from_uuid(Uuid::new_v4()),
			None,
			E164::parse("+15555550100").unwrap(),
		);
		let context = ChatArchivingContext::new(RecipientArchivingContext::new(local));

		let result = SimpleChatUpdateArchiver.archive(
			&info_interaction(None),
			SimpleChatUpdateType::EndSession,
			None,
			&context,
		);
		let ArchiveInteractionResult::Success(details) = result else {
			panic!("expected success");
		};
		assert_eq!(details.author, LOCAL_RECIPIENT_ID);
		assert_eq!(details.directional_details, DirectionalDetails::Directionless);

		let stranger = ContactAddress::from_aci(Aci::from_uuid(Uuid::new_v4()));
		let interaction = info_interaction(Some(stranger.clone()));
		let result = SimpleChatUpdateArchiver.archive(
			&interaction,
			SimpleChatUpdateType::IdentityUpdate,
			Some(&stranger),
			&context,
		);
		let ArchiveInteractionResult::MessageFailure(errors) = result else {
			panic!("expected a failure");
		};
		assert_eq!(
			errors[0].kind,
			ArchiveFrameErrorKind::ReferencedRecipientIdMissing(ArchivingAddress::Contact(stranger))
		);
	}
}
