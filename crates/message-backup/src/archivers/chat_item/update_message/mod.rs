use sd_backup_proto::{ChatItem, ChatUpdate, ChatUpdateMessage, SimpleChatUpdateType};

use crate::{
	context::{ChatArchivingContext, ChatThread, RestoringAddress},
	error::maybe_missing,
	identifiers::ContactAddress,
	ids::ChatItemId,
	result::{
		ArchiveInteractionResult, LegacyInfoMessageType, RestoreFrameResult, SkippableChatUpdate,
	},
	store::{
		InfoMessage, InfoMessageKind, Interaction, InteractionKind, StoreError, Thread, WriteTx,
	},
};

use super::{restored_interaction, ChatItemDetails};

mod expiration_timer;
mod profile_change;
mod session_switchover;
mod simple;
mod thread_merge;

pub use expiration_timer::ExpirationTimerChatUpdateArchiver;
pub use profile_change::ProfileChangeChatUpdateArchiver;
pub use session_switchover::SessionSwitchoverChatUpdateArchiver;
pub use simple::SimpleChatUpdateArchiver;
pub use thread_merge::ThreadMergeChatUpdateArchiver;

/// Info messages, each kind handled by its own archiver.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatUpdateMessageArchiver {
	thread_merge: ThreadMergeChatUpdateArchiver,
	session_switchover: SessionSwitchoverChatUpdateArchiver,
	simple: SimpleChatUpdateArchiver,
	expiration_timer: ExpirationTimerChatUpdateArchiver,
	profile_change: ProfileChangeChatUpdateArchiver,
}

impl ChatUpdateMessageArchiver {
	pub fn archive(
		&self,
		interaction: &Interaction,
		info: &InfoMessage,
		thread: &Thread,
		context: &ChatArchivingContext,
	) -> ArchiveInteractionResult<ChatItemDetails> {
		let author = info.author.as_ref();

		match &info.kind {
			InfoMessageKind::ThreadMerge { phone_number } => {
				self.thread_merge
					.archive(interaction, phone_number.as_deref(), thread, context)
			}
			InfoMessageKind::SessionSwitchover { phone_number } => self
				.session_switchover
				.archive(interaction, phone_number.as_deref(), thread, context),
			InfoMessageKind::DisappearingMessagesUpdate { expires_in_secs } => self
				.expiration_timer
				.archive(interaction, *expires_in_secs, author, context),
			InfoMessageKind::ProfileChange { old_name, new_name } => self
				.profile_change
				.archive(interaction, old_name, new_name, author, context),
			InfoMessageKind::ContactJoinedSignal => self.simple.archive(
				interaction,
				SimpleChatUpdateType::JoinedSignal,
				author,
				context,
			),
			InfoMessageKind::IdentityChanged => self.simple.archive(
				interaction,
				SimpleChatUpdateType::IdentityUpdate,
				author,
				context,
			),
			InfoMessageKind::SessionEnded => self.simple.archive(
				interaction,
				SimpleChatUpdateType::EndSession,
				author,
				context,
			),
			InfoMessageKind::ChatSessionRefresh => self.simple.archive(
				interaction,
				SimpleChatUpdateType::ChatSessionRefresh,
				author,
				context,
			),
			InfoMessageKind::LegacyGroupUpdate { .. } => {
				ArchiveInteractionResult::SkippableChatUpdate(SkippableChatUpdate::LegacyGroupUpdate)
			}
			InfoMessageKind::SyncedThread => ArchiveInteractionResult::SkippableChatUpdate(
				SkippableChatUpdate::LegacyInfoMessage(LegacyInfoMessageType::SyncedThread),
			),
			InfoMessageKind::UnsupportedMessage => ArchiveInteractionResult::SkippableChatUpdate(
				SkippableChatUpdate::LegacyInfoMessage(LegacyInfoMessageType::UnsupportedMessage),
			),
		}
	}

	pub fn restore(
		&self,
		update: &ChatUpdateMessage,
		chat_item: &ChatItem,
		author: &RestoringAddress,
		thread: &ChatThread,
		tx: &mut dyn WriteTx,
	) -> Result<RestoreFrameResult<(), ChatItemId>, StoreError> {
		let update = match maybe_missing(&update.update, "update") {
			Ok(update) => update,
			Err(e) => return Ok(RestoreFrameResult::failure(e, ChatItemId::from(chat_item))),
		};

		match update {
			ChatUpdate::ThreadMerge(update) => {
				self.thread_merge
					.restore(update, chat_item, author, thread, tx)
			}
			ChatUpdate::SessionSwitchover(update) => self
				.session_switchover
				.restore(update, chat_item, author, thread, tx),
			ChatUpdate::SimpleUpdate(update) => {
				self.simple.restore(update, chat_item, author, thread, tx)
			}
			ChatUpdate::ExpirationTimerChange(update) => self
				.expiration_timer
				.restore(update, chat_item, author, thread, tx),
			ChatUpdate::ProfileChange(update) => self
				.profile_change
				.restore(update, chat_item, author, thread, tx),
		}
	}
}

/// Info messages keep contact authors; anything else, the local user included, becomes `None`.
fn info_author(author: &RestoringAddress) -> Option<ContactAddress> {
	match author {
		RestoringAddress::Contact(address) => Some(address.clone()),
		RestoringAddress::LocalAddress
		| RestoringAddress::ReleaseNotesChannel
		| RestoringAddress::Group(_)
		| RestoringAddress::DistributionList(_) => None,
	}
}

fn insert_info_message(
	chat_item: &ChatItem,
	thread: &ChatThread,
	kind: InfoMessageKind,
	author: Option<ContactAddress>,
	tx: &mut dyn WriteTx,
) -> Result<(), StoreError> {
	tx.insert_interaction(restored_interaction(
		chat_item,
		thread,
		InteractionKind::Info(InfoMessage { kind, author }),
	))
	.map(|_| ())
}
