use sd_backup_proto::{
	ChatItem, ChatItemType, ChatUpdate, ChatUpdateMessage, DirectionalDetails,
	ProfileChangeChatUpdate,
};

use crate::{
	context::{ArchivingAddress, ChatArchivingContext, ChatThread, RestoringAddress},
	error::{maybe_missing, ArchiveFrameErrorKind, InvalidProtoDataError},
	identifiers::ContactAddress,
	ids::ChatItemId,
	result::{ArchiveInteractionResult, RestoreFrameResult},
	store::{InfoMessageKind, Interaction, StoreError, WriteTx},
};

use super::{super::ChatItemDetails, insert_info_message};

/// A contact changed their profile name. Only contacts have profiles, so the author is required.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileChangeChatUpdateArchiver;

impl ProfileChangeChatUpdateArchiver {
	pub fn archive(
		&self,
		interaction: &Interaction,
		old_name: &str,
		new_name: &str,
		author: Option<&ContactAddress>,
		context: &ChatArchivingContext,
	) -> ArchiveInteractionResult<ChatItemDetails> {
		let author = match maybe_missing(author, "author") {
			Ok(author) => author,
			Err(e) => return ArchiveInteractionResult::failure(e, &interaction.unique_id),
		};

		let address = ArchivingAddress::Contact(author.clone());
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
				update: Some(ChatUpdate::ProfileChange(ProfileChangeChatUpdate {
					previous_name: old_name.to_string(),
					new_name: new_name.to_string(),
				})),
			}),
		})
	}

	pub fn restore(
		&self,
		update: &ProfileChangeChatUpdate,
		chat_item: &ChatItem,
		author: &RestoringAddress,
		thread: &ChatThread,
		tx: &mut dyn WriteTx,
	) -> Result<RestoreFrameResult<(), ChatItemId>, StoreError> {
		let id = ChatItemId::from(chat_item);

		let RestoringAddress::Contact(address) = author else {
			return Ok(RestoreFrameResult::failure(
				InvalidProtoDataError::ProfileChangeNotFromContact,
				id,
			));
		};

		if update.previous_name.is_empty() || update.new_name.is_empty() {
			return Ok(RestoreFrameResult::failure(
				InvalidProtoDataError::EmptyProfileName,
				id,
			));
		}

		insert_info_message(
			chat_item,
			thread,
			InfoMessageKind::ProfileChange {
				old_name: update.previous_name.clone(),
				new_name: update.new_name.clone(),
			},
			Some(address.clone()),
			tx,
		)?;

		Ok(RestoreFrameResult::Success(()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		error::RestoreFrameErrorKind,
		identifiers::Aci,
		ids::ThreadUniqueId,
		store::{Database, MemoryDatabase, ThreadKind},
	};

	use uuid::Uuid;

	#[test]
	fn profile_changes_need_both_names() {
		let db = MemoryDatabase::new();
		let contact = ContactAddress::from_aci(Aci::from_uuid(Uuid::new_v4()));
		let chat_thread = ChatThread {
			thread_unique_id: ThreadUniqueId::random(),
			kind: ThreadKind::Contact(contact.clone()),
		};
		let chat_item = ChatItem {
			chat_id: 1,
			author_id: 2,
			date_sent: 9_000,
			..ChatItem::default()
		};

		db.write(|tx| {
			let result = ProfileChangeChatUpdateArchiver.restore(
				&ProfileChangeChatUpdate {
					previous_name: String::new(),
					new_name: "Alice".to_string(),
				},
				&chat_item,
				&RestoringAddress::Contact(contact.clone()),
				&chat_thread,
				tx,
			)?;
			let RestoreFrameResult::Failure(errors) = result else {
				panic!("expected a failure");
			};
			assert_eq!(
				errors[0].kind,
				RestoreFrameErrorKind::InvalidProtoData(InvalidProtoDataError::EmptyProfileName)
			);

			let result = ProfileChangeChatUpdateArchiver.restore(
				&ProfileChangeChatUpdate {
					previous_name: "Al".to_string(),
					new_name: "Alice".to_string(),
				},
				&chat_item,
				&RestoringAddress::LocalAddress,
				&chat_thread,
				tx,
			)?;
			assert!(matches!(result, RestoreFrameResult::Failure(_)));

			assert!(tx.interactions(&chat_thread.thread_unique_id)?.is_empty());

			Ok::<_, StoreError>(())
		})
		.unwrap();
	}
}
