use sd_backup_proto::{Chat, FrameSink};

use tracing::instrument;

use crate::{
	context::{
		ArchivingAddress, ChatArchivingContext, ChatRestoringContext, ChatThread, RestoringAddress,
	},
	error::{
		ArchiveFrameError, ArchiveFrameErrorKind, FatalArchivingError, IdentifierNotFound,
		InvalidProtoDataError,
	},
	ids::{ChatId, RecipientId, ThreadUniqueId, LOCAL_RECIPIENT_ID},
	report::{FrameOutcome, PassReport},
	result::RestoreFrameResult,
	store::{ReadTx, StoreError, Thread, ThreadKind, WriteTx},
};

use super::write_frame;

/// Threads. A thread becomes a chat once its recipient has an id.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatArchiver;

impl ChatArchiver {
	#[instrument(skip_all)]
	pub fn archive_chats(
		&self,
		sink: &mut dyn FrameSink,
		context: &mut ChatArchivingContext,
		tx: &dyn ReadTx,
		report: &mut PassReport,
	) -> Result<(), FatalArchivingError> {
		for thread in tx.threads()? {
			match Self::archive_thread(&thread, context) {
				Ok(chat) => {
					write_frame(sink, chat)?;
					report.record(FrameOutcome::Success);
				}
				Err(e) => report.record_archive_failure(e),
			}
		}

		Ok(())
	}

	fn archive_thread(
		thread: &Thread,
		context: &mut ChatArchivingContext,
	) -> Result<Chat, ArchiveFrameError<ThreadUniqueId>> {
		let recipients = context.recipient_context();

		let recipient_id = match &thread.kind {
			ThreadKind::Contact(address) if recipients.local_identifiers().contains(address) => {
				Some(LOCAL_RECIPIENT_ID)
			}
			ThreadKind::Contact(address) => {
				recipients.lookup(&ArchivingAddress::Contact(address.clone()))
			}
			ThreadKind::Group(group_id) => {
				recipients.lookup(&ArchivingAddress::Group(group_id.clone()))
			}
			ThreadKind::ReleaseNotes => recipients.lookup(&ArchivingAddress::ReleaseNotesChannel),
		};

		let Some(recipient_id) = recipient_id else {
			let address = match &thread.kind {
				ThreadKind::Contact(address) => ArchivingAddress::Contact(address.clone()),
				ThreadKind::Group(group_id) => ArchivingAddress::Group(group_id.clone()),
				ThreadKind::ReleaseNotes => ArchivingAddress::ReleaseNotesChannel,
			};

			return Err(ArchiveFrameError::new(
				ArchiveFrameErrorKind::ReferencedRecipientIdMissing(address),
				thread.unique_id.clone(),
			));
		};

		let id = context.assign(&thread.unique_id);

		Ok(Chat {
			id: id.0,
			recipient_id: recipient_id.0,
			archived: thread.archived,
			pinned_order: thread.pinned_order,
			expiration_timer_ms: thread.expire_timer_ms,
			mute_until_ms: thread.muted_until_ms,
			marked_unread: thread.marked_unread,
		})
	}

	pub fn restore(
		&self,
		chat: &Chat,
		context: &mut ChatRestoringContext,
		tx: &mut dyn WriteTx,
	) -> Result<RestoreFrameResult<(), ChatId>, StoreError> {
		let id = ChatId(chat.id);
		let recipient_id = RecipientId(chat.recipient_id);
		let recipients = context.recipient_context();

		let kind = match recipients.get(recipient_id) {
			None => {
				return Ok(RestoreFrameResult::failure(
					IdentifierNotFound::RecipientId(recipient_id),
					id,
				))
			}
			Some(RestoringAddress::LocalAddress) => {
				ThreadKind::Contact(recipients.local_identifiers().address())
			}
			Some(RestoringAddress::Contact(address)) => ThreadKind::Contact(address.clone()),
			Some(RestoringAddress::Group(group_id)) => ThreadKind::Group(group_id.clone()),
			Some(RestoringAddress::ReleaseNotesChannel) => ThreadKind::ReleaseNotes,
			Some(RestoringAddress::DistributionList(_)) => {
				return Ok(RestoreFrameResult::failure(
					InvalidProtoDataError::ChatRecipientNotSupported,
					id,
				))
			}
		};

		let thread = Thread {
			archived: chat.archived,
			marked_unread: chat.marked_unread,
			muted_until_ms: chat.mute_until_ms.filter(|ms| *ms != 0),
			pinned_order: chat.pinned_order.filter(|order| *order != 0),
			expire_timer_ms: chat.expiration_timer_ms.filter(|ms| *ms != 0),
			..Thread::new(kind.clone())
		};

		if let Err(e) = context.define(
			id,
			recipient_id,
			ChatThread {
				thread_unique_id: thread.unique_id.clone(),
				kind,
			},
		) {
			return Ok(RestoreFrameResult::failure(e, id));
		}

		tx.insert_thread(thread)?;

		Ok(RestoreFrameResult::Success(()))
	}
}
