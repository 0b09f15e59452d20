use sd_backup_proto::{Destination, FrameSink, Recipient, ReleaseNotes, SelfRecipient};

use tracing::instrument;

use crate::{
	context::{
		ArchivingAddress, RecipientArchivingContext, RecipientRestoringContext, RestoringAddress,
	},
	error::{maybe_missing, FatalArchivingError},
	ids::{RecipientId, LOCAL_RECIPIENT_ID},
	report::{FrameOutcome, PassReport},
	result::RestoreFrameResult,
	store::{ReadTx, StoreError, WriteTx},
};

use super::write_frame;

mod contact;
mod distribution_list;
mod group;

pub use contact::ContactRecipientArchiver;
pub use distribution_list::DistributionListRecipientArchiver;
pub use group::GroupRecipientArchiver;

/// Archives and restores one kind of [`Destination`].
pub trait RecipientDestinationArchiver {
	type Destination;

	/// Writes a frame for every local entity of this kind, assigning recipient ids as it goes.
	fn archive_recipients(
		&self,
		sink: &mut dyn FrameSink,
		context: &mut RecipientArchivingContext,
		tx: &dyn ReadTx,
		report: &mut PassReport,
	) -> Result<(), FatalArchivingError>;

	/// Restores a single destination. On failure nothing is defined and nothing is written.
	fn restore(
		&self,
		id: RecipientId,
		destination: &Self::Destination,
		context: &mut RecipientRestoringContext,
		tx: &mut dyn WriteTx,
	) -> Result<RestoreFrameResult<(), RecipientId>, StoreError>;
}

/// The local account. Always archived first, under [`LOCAL_RECIPIENT_ID`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRecipientArchiver;

impl RecipientDestinationArchiver for LocalRecipientArchiver {
	type Destination = SelfRecipient;

	fn archive_recipients(
		&self,
		sink: &mut dyn FrameSink,
		_context: &mut RecipientArchivingContext,
		_tx: &dyn ReadTx,
		report: &mut PassReport,
	) -> Result<(), FatalArchivingError> {
		write_frame(
			sink,
			Recipient {
				id: LOCAL_RECIPIENT_ID.0,
				destination: Some(Destination::SelfRecipient(SelfRecipient {})),
			},
		)?;
		report.record(FrameOutcome::Success);

		Ok(())
	}

	fn restore(
		&self,
		id: RecipientId,
		_destination: &SelfRecipient,
		context: &mut RecipientRestoringContext,
		_tx: &mut dyn WriteTx,
	) -> Result<RestoreFrameResult<(), RecipientId>, StoreError> {
		Ok(match context.define(id, RestoringAddress::LocalAddress) {
			Ok(()) => RestoreFrameResult::Success(()),
			Err(e) => RestoreFrameResult::failure(e, id),
		})
	}
}

/// The release notes channel. It has no local row, so it is always archived.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReleaseNotesRecipientArchiver;

impl RecipientDestinationArchiver for ReleaseNotesRecipientArchiver {
	type Destination = ReleaseNotes;

	fn archive_recipients(
		&self,
		sink: &mut dyn FrameSink,
		context: &mut RecipientArchivingContext,
		_tx: &dyn ReadTx,
		report: &mut PassReport,
	) -> Result<(), FatalArchivingError> {
		let id = context.assign(&ArchivingAddress::ReleaseNotesChannel);

		write_frame(
			sink,
			Recipient {
				id: id.0,
				destination: Some(Destination::ReleaseNotes(ReleaseNotes {})),
			},
		)?;
		report.record(FrameOutcome::Success);

		Ok(())
	}

	fn restore(
		&self,
		id: RecipientId,
		_destination: &ReleaseNotes,
		context: &mut RecipientRestoringContext,
		_tx: &mut dyn WriteTx,
	) -> Result<RestoreFrameResult<(), RecipientId>, StoreError> {
		Ok(match context.define(id, RestoringAddress::ReleaseNotesChannel) {
			Ok(()) => RestoreFrameResult::Success(()),
			Err(e) => RestoreFrameResult::failure(e, id),
		})
	}
}

/// Archives every recipient, one destination kind after the other, and routes restored
/// recipients to the archiver of their destination.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecipientArchiver {
	local: LocalRecipientArchiver,
	release_notes: ReleaseNotesRecipientArchiver,
	contacts: ContactRecipientArchiver,
	groups: GroupRecipientArchiver,
	distribution_lists: DistributionListRecipientArchiver,
}

impl RecipientArchiver {
	#[instrument(skip_all)]
	pub fn archive_recipients(
		&self,
		sink: &mut dyn FrameSink,
		context: &mut RecipientArchivingContext,
		tx: &dyn ReadTx,
		report: &mut PassReport,
	) -> Result<(), FatalArchivingError> {
		self.local.archive_recipients(sink, context, tx, report)?;
		self.release_notes
			.archive_recipients(sink, context, tx, report)?;
		self.contacts.archive_recipients(sink, context, tx, report)?;
		self.groups.archive_recipients(sink, context, tx, report)?;
		self.distribution_lists
			.archive_recipients(sink, context, tx, report)
	}

	pub fn restore(
		&self,
		recipient: &Recipient,
		context: &mut RecipientRestoringContext,
		tx: &mut dyn WriteTx,
	) -> Result<RestoreFrameResult<(), RecipientId>, StoreError> {
		let id = RecipientId(recipient.id);

		let destination = match maybe_missing(&recipient.destination, "destination") {
			Ok(destination) => destination,
			Err(e) => return Ok(RestoreFrameResult::failure(e, id)),
		};

		match destination {
			Destination::SelfRecipient(local) => self.local.restore(id, local, context, tx),
			Destination::ReleaseNotes(release_notes) => {
				self.release_notes.restore(id, release_notes, context, tx)
			}
			Destination::Contact(contact) => self.contacts.restore(id, contact, context, tx),
			Destination::Group(group) => self.groups.restore(id, group, context, tx),
			Destination::DistributionList(list) => {
				self.distribution_lists.restore(id, list, context, tx)
			}
		}
	}
}
