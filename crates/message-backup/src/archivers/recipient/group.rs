use sd_backup_proto::{Destination, FrameSink, Group, Recipient};

use crate::{
	context::{
		ArchivingAddress, RecipientArchivingContext, RecipientRestoringContext, RestoringAddress,
	},
	error::{ArchiveFrameError, ArchiveFrameErrorKind, FatalArchivingError, InvalidProtoDataError},
	identifiers::GroupId,
	ids::RecipientId,
	report::{FrameOutcome, PassReport},
	result::RestoreFrameResult,
	store::{GroupRecord, ReadTx, StoreError, WriteTx},
};

use super::{super::write_frame, RecipientDestinationArchiver};

#[derive(Debug, Clone, Copy, Default)]
pub struct GroupRecipientArchiver;

impl RecipientDestinationArchiver for GroupRecipientArchiver {
	type Destination = Group;

	fn archive_recipients(
		&self,
		sink: &mut dyn FrameSink,
		context: &mut RecipientArchivingContext,
		tx: &dyn ReadTx,
		report: &mut PassReport,
	) -> Result<(), FatalArchivingError> {
		for group in tx.groups()? {
			let address = ArchivingAddress::Group(group.group_id.clone());

			if context.lookup(&address).is_some() {
				report.record_archive_failure(ArchiveFrameError::new(
					ArchiveFrameErrorKind::DuplicateRecipient(address.clone()),
					address,
				));
				continue;
			}

			let id = context.assign(&address);

			write_frame(
				sink,
				Recipient {
					id: id.0,
					destination: Some(Destination::Group(Group {
						group_id: group.group_id.as_bytes().to_vec(),
						whitelisted: group.whitelisted,
						title: group.title,
						hide_story: group.hide_story,
					})),
				},
			)?;
			report.record(FrameOutcome::Success);
		}

		Ok(())
	}

	fn restore(
		&self,
		id: RecipientId,
		group: &Group,
		context: &mut RecipientRestoringContext,
		tx: &mut dyn WriteTx,
	) -> Result<RestoreFrameResult<(), RecipientId>, StoreError> {
		let Some(group_id) = GroupId::new(group.group_id.clone()) else {
			return Ok(RestoreFrameResult::failure(
				InvalidProtoDataError::InvalidGroupId,
				id,
			));
		};

		if let Err(e) = context.define(id, RestoringAddress::Group(group_id.clone())) {
			return Ok(RestoreFrameResult::failure(e, id));
		}

		tx.insert_group(GroupRecord {
			row_id: None,
			group_id,
			title: group.title.clone().filter(|title| !title.is_empty()),
			whitelisted: group.whitelisted,
			hide_story: group.hide_story,
		})?;

		Ok(RestoreFrameResult::Success(()))
	}
}
