use sd_backup_proto::{
	ChatItem, ChatItemType, ChatUpdate, ChatUpdateMessage, DirectionalDetails,
	ThreadMergeChatUpdate,
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

/// "Your messages with this contact were merged", authored by the contact of the thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadMergeChatUpdateArchiver;

impl ThreadMergeChatUpdateArchiver {
	pub fn archive(
		&self,
		interaction: &Interaction,
		phone_number: Option<&str>,
		thread: &Thread,
		context: &ChatArchivingContext,
	) -> ArchiveInteractionResult<ChatItemDetails> {
		// Rows written before the phone number was stored can't be rendered anywhere else.
		let Some(previous_e164) = phone_number.and_then(E164::parse) else {
			return ArchiveInteractionResult::SkippableChatUpdate(
				SkippableChatUpdate::LegacyInfoMessage(
					LegacyInfoMessageType::ThreadMergeWithoutPhoneNumber,
				),
			);
		};

		let ThreadKind::Contact(address) = &thread.kind else {
			return ArchiveInteractionResult::failure(
				ArchiveFrameErrorKind::ThreadMergeUpdateMissingAuthor,
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
				update: Some(ChatUpdate::ThreadMerge(ThreadMergeChatUpdate {
					previous_e164: Some(previous_e164.to_u64()),
				})),
			}),
		})
	}

	pub fn restore(
		&self,
		update: &ThreadMergeChatUpdate,
		chat_item: &ChatItem,
		author: &RestoringAddress,
		thread: &ChatThread,
		tx: &mut dyn WriteTx,
	) -> Result<RestoreFrameResult<(), ChatItemId>, StoreError> {
		let id = ChatItemId::from(chat_item);

		// Zero is how an unset number arrives on the wire.
		let previous_e164 = update.previous_e164.filter(|e164| *e164 != 0);
		let previous_e164 = match maybe_missing(previous_e164, "previous_e164") {
			Ok(previous_e164) => previous_e164,
			Err(e) => return Ok(RestoreFrameResult::failure(e, id)),
		};

		let Some(previous_e164) = E164::from_u64(previous_e164) else {
			return Ok(RestoreFrameResult::failure(
				InvalidProtoDataError::InvalidE164,
				id,
			));
		};

		if !matches!(thread.kind, ThreadKind::Contact(_))
			|| !matches!(author, RestoringAddress::Contact(_))
		{
			return Ok(RestoreFrameResult::failure(
				InvalidProtoDataError::ThreadMergeUpdateNotFromContact,
				id,
			));
		}

		insert_info_message(
			chat_item,
			thread,
			InfoMessageKind::ThreadMerge {
				phone_number: Some(previous_e164.as_str().to_string()),
			},
			info_author(author),
			tx,
		)?;

		Ok(RestoreFrameResult::Success(()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		context::RecipientArchivingContext,
		error::RestoreFrameErrorKind,
		identifiers::{Aci, ContactAddress, LocalIdentifiers},
		ids::{ChatId, InteractionUniqueId, ThreadUniqueId},
		store::{Database, MemoryDatabase},
	};

	use uuid::Uuid;

	fn local() -> LocalIdentifiers {
		LocalIdentifiers::new(
			Aci::from_uuid(Uuid::new_v4()),
			None,
			E164::parse("+15555550100").unwrap(),
		)
	}

	fn interaction(thread: &Thread) -> Interaction {
		Interaction {
			row_id: Some(1),
			unique_id: InteractionUniqueId::random(),
			thread_unique_id: thread.unique_id.clone(),
			timestamp: 1_000,
			expire_started_at_ms: None,
			expires_in_ms: None,
			kind: crate::store::InteractionKind::Info(crate::store::InfoMessage {
				kind: InfoMessageKind::ThreadMerge { phone_number: None },
				author: None,
			}),
		}
	}

	#[test]
	fn missing_phone_number_is_skipped() {
		let contact = ContactAddress::from_aci(Aci::from_uuid(Uuid::new_v4()));
		let thread = Thread::new(ThreadKind::Contact(contact));
		let context = ChatArchivingContext::new(RecipientArchivingContext::new(local()));

		for phone_number in [None, Some("not a number")] {
			let result = ThreadMergeChatUpdateArchiver.archive(
				&interaction(&thread),
				phone_number,
				&thread,
				&context,
			);

			assert!(matches!(
				result,
				ArchiveInteractionResult::SkippableChatUpdate(SkippableChatUpdate::LegacyInfoMessage(
					LegacyInfoMessageType::ThreadMergeWithoutPhoneNumber
				))
			));
		}
	}

	#[test]
	fn merge_outside_contact_thread_fails() {
		let thread = Thread::new(ThreadKind::ReleaseNotes);
		let context = ChatArchivingContext::new(RecipientArchivingContext::new(local()));
		let interaction = interaction(&thread);

		let result = ThreadMergeChatUpdateArchiver.archive(
			&interaction,
			Some("+15555550123"),
			&thread,
			&context,
		);

		let ArchiveInteractionResult::MessageFailure(errors) = result else {
			panic!("expected a failure");
		};
		assert_eq!(
			errors[0].kind,
			ArchiveFrameErrorKind::ThreadMergeUpdateMissingAuthor
		);
		assert_eq!(errors[0].id, interaction.unique_id);
	}

	#[test]
	fn restore_requires_previous_phone_number() {
		let contact = ContactAddress::from_aci(Aci::from_uuid(Uuid::new_v4()));
		let db = MemoryDatabase::new();
		let chat_thread = ChatThread {
			thread_unique_id: ThreadUniqueId::random(),
			kind: ThreadKind::Contact(contact.clone()),
		};
		let chat_item = ChatItem {
			chat_id: 1,
			author_id: 2,
			date_sent: 1_000,
			..ChatItem::default()
		};

		db.write(|tx| {
			tx.insert_thread(Thread {
				unique_id: chat_thread.thread_unique_id.clone(),
				..Thread::new(chat_thread.kind.clone())
			})?;

			let result = ThreadMergeChatUpdateArchiver.restore(
				&ThreadMergeChatUpdate {
					previous_e164: None,
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
				RestoreFrameErrorKind::InvalidProtoData(InvalidProtoDataError::MissingField(
					"previous_e164"
				))
			);
			assert_eq!(
				errors[0].id,
				ChatItemId {
					chat_id: ChatId(1),
					date_sent: 1_000
				}
			);
			assert!(tx.interactions(&chat_thread.thread_unique_id)?.is_empty());

			let result = ThreadMergeChatUpdateArchiver.restore(
				&ThreadMergeChatUpdate {
					previous_e164: Some(15_555_550_123),
				},
				&chat_item,
				&RestoringAddress::Contact(contact.clone()),
				&chat_thread,
				tx,
			)?;
			assert!(matches!(result, RestoreFrameResult::Success(())));

			let interactions = tx.interactions(&chat_thread.thread_unique_id)?;
			assert_eq!(interactions.len(), 1);
			assert_eq!(interactions[0].timestamp, 1_000);
			assert_eq!(
				interactions[0].kind,
				crate::store::InteractionKind::Info(crate::store::InfoMessage {
					kind: InfoMessageKind::ThreadMerge {
						phone_number: Some("+15555550123".to_string())
					},
					author: Some(contact.clone()),
				})
			);

			Ok::<_, StoreError>(())
		})
		.unwrap();
	}
}
