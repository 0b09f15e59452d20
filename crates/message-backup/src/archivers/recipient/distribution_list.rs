use sd_backup_proto::{
	Destination, DistributionList, DistributionListItem, DistributionListItemKind, FrameSink,
	PrivacyMode, Recipient,
};

use tracing::debug;

use crate::{
	context::{
		ArchivingAddress, RecipientArchivingContext, RecipientRestoringContext, RestoringAddress,
	},
	error::{
		maybe_missing, ArchiveFrameError, ArchiveFrameErrorKind, FatalArchivingError,
		IdentifierNotFound, InvalidProtoDataError, RestoreFrameError,
	},
	identifiers::DistributionId,
	ids::RecipientId,
	report::{FrameErrorRecord, FrameOutcome, PassReport},
	result::RestoreFrameResult,
	store::{DistributionListRecord, ReadTx, StoreError, StoryPrivacyMode, WriteTx},
};

use super::{super::write_frame, RecipientDestinationArchiver};

/// Story distribution lists, including deleted ones so other devices learn about the deletion.
#[derive(Debug, Clone, Copy, Default)]
pub struct DistributionListRecipientArchiver;

impl DistributionListRecipientArchiver {
	const fn archive_privacy_mode(mode: StoryPrivacyMode) -> PrivacyMode {
		match mode {
			StoryPrivacyMode::BlockList => PrivacyMode::AllExcept,
			StoryPrivacyMode::AllowList => PrivacyMode::OnlyWith,
			StoryPrivacyMode::AllSignalConnections => PrivacyMode::All,
		}
	}

	const fn restore_privacy_mode(mode: PrivacyMode) -> Option<StoryPrivacyMode> {
		match mode {
			PrivacyMode::AllExcept => Some(StoryPrivacyMode::BlockList),
			PrivacyMode::OnlyWith => Some(StoryPrivacyMode::AllowList),
			PrivacyMode::All => Some(StoryPrivacyMode::AllSignalConnections),
			PrivacyMode::Unknown => None,
		}
	}
}

impl RecipientDestinationArchiver for DistributionListRecipientArchiver {
	type Destination = DistributionListItem;

	fn archive_recipients(
		&self,
		sink: &mut dyn FrameSink,
		context: &mut RecipientArchivingContext,
		tx: &dyn ReadTx,
		report: &mut PassReport,
	) -> Result<(), FatalArchivingError> {
		for list in tx.distribution_lists()? {
			let address = ArchivingAddress::DistributionList(list.distribution_id);

			if context.lookup(&address).is_some() {
				report.record_archive_failure(ArchiveFrameError::new(
					ArchiveFrameErrorKind::DuplicateRecipient(address.clone()),
					address,
				));
				continue;
			}

			let mut partial_errors = vec![];

			let item = if let Some(deleted_at_ms) = list.deleted_at_ms {
				DistributionListItemKind::DeletionTimestamp(deleted_at_ms)
			} else {
				let member_recipient_ids = list
					.members
					.iter()
					.filter_map(|member| {
						let member = ArchivingAddress::Contact(member.clone());
						let id = context.lookup(&member);
						if id.is_none() {
							partial_errors.push(FrameErrorRecord::from(ArchiveFrameError::new(
								ArchiveFrameErrorKind::ReferencedRecipientIdMissing(member),
								address.clone(),
							)));
						}
						id.map(|id| id.0)
					})
					.collect();

				DistributionListItemKind::DistributionList(DistributionList {
					name: list.name.clone(),
					allow_replies: list.allow_replies,
					privacy_mode: Self::archive_privacy_mode(list.privacy_mode),
					member_recipient_ids,
				})
			};

			let id = context.assign(&address);

			write_frame(
				sink,
				Recipient {
					id: id.0,
					destination: Some(Destination::DistributionList(DistributionListItem {
						distribution_id: list.distribution_id.to_bytes(),
						item: Some(item),
					})),
				},
			)?;

			report.record(if partial_errors.is_empty() {
				FrameOutcome::Success
			} else {
				FrameOutcome::PartialSuccess(partial_errors)
			});
		}

		Ok(())
	}

	fn restore(
		&self,
		id: RecipientId,
		item: &DistributionListItem,
		context: &mut RecipientRestoringContext,
		tx: &mut dyn WriteTx,
	) -> Result<RestoreFrameResult<(), RecipientId>, StoreError> {
		let Some(distribution_id) = DistributionId::from_bytes(&item.distribution_id) else {
			return Ok(RestoreFrameResult::failure(
				InvalidProtoDataError::InvalidDistributionId,
				id,
			));
		};

		let kind = match maybe_missing(&item.item, "item") {
			Ok(kind) => kind,
			Err(e) => return Ok(RestoreFrameResult::failure(e, id)),
		};

		let mut partial_errors = vec![];

		let record = match kind {
			DistributionListItemKind::DeletionTimestamp(deleted_at_ms) => DistributionListRecord {
				row_id: None,
				distribution_id,
				name: String::new(),
				allow_replies: false,
				privacy_mode: StoryPrivacyMode::default(),
				members: vec![],
				deleted_at_ms: Some(*deleted_at_ms),
			},
			DistributionListItemKind::DistributionList(list) => {
				let Some(privacy_mode) = Self::restore_privacy_mode(list.privacy_mode) else {
					return Ok(RestoreFrameResult::failure(
						InvalidProtoDataError::UnknownPrivacyMode,
						id,
					));
				};

				let members = list
					.member_recipient_ids
					.iter()
					.map(|member_id| RecipientId(*member_id))
					.filter_map(|member_id| {
						if context.get(member_id).is_none() {
							partial_errors.push(RestoreFrameError::new(
								IdentifierNotFound::RecipientId(member_id),
								id,
							));
							return None;
						}

						// The local account is a valid member, it is archived like any contact.
						let address = context.contact_address(member_id);
						if address.is_none() {
							partial_errors.push(RestoreFrameError::new(
								InvalidProtoDataError::DistributionListMemberNotContact(member_id),
								id,
							));
						}
						address
					})
					.collect();

				DistributionListRecord {
					row_id: None,
					distribution_id,
					name: list.name.clone(),
					allow_replies: list.allow_replies,
					privacy_mode,
					members,
					deleted_at_ms: None,
				}
			}
		};

		if let Err(e) = context.define(id, RestoringAddress::DistributionList(distribution_id)) {
			return Ok(RestoreFrameResult::failure(e, id));
		}

		if distribution_id.is_my_story() {
			debug!(%id, "Restoring the default story distribution list;");
		}

		tx.insert_distribution_list(record)?;

		Ok(RestoreFrameResult::with_partial_errors((), partial_errors))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		identifiers::{Aci, ContactAddress, LocalIdentifiers, E164},
		store::{Database, MemoryDatabase},
	};

	use uuid::Uuid;

	#[test]
	fn members_must_be_known_contacts() {
		let local = LocalIdentifiers::new(
			Aci::from_uuid(Uuid::new_v4()),
			None,
			E164::parse("+15555550100").unwrap(),
		);
		let member = ContactAddress::from_aci(Aci::from_uuid(Uuid::new_v4()));

		let mut context = RecipientRestoringContext::new(local.clone());
		context
			.define(RecipientId(1), RestoringAddress::LocalAddress)
			.unwrap();
		context
			.define(RecipientId(2), RestoringAddress::ReleaseNotesChannel)
			.unwrap();
		context
			.define(RecipientId(3), RestoringAddress::Contact(member.clone()))
			.unwrap();

		let item = DistributionListItem {
			distribution_id: Uuid::new_v4().as_bytes().to_vec(),
			item: Some(DistributionListItemKind::DistributionList(DistributionList {
				name: "Close friends".to_string(),
				allow_replies: true,
				privacy_mode: PrivacyMode::OnlyWith,
				member_recipient_ids: vec![1, 2, 3, 9],
			})),
		};

		let db = MemoryDatabase::new();
		db.write(|tx| {
			let result =
				DistributionListRecipientArchiver.restore(RecipientId(4), &item, &mut context, tx)?;

			let RestoreFrameResult::PartialRestore((), errors) = result else {
				panic!("expected a partial restore");
			};
			assert_eq!(errors.len(), 2);

			let lists = tx.distribution_lists()?;
			assert_eq!(lists.len(), 1);
			assert_eq!(lists[0].members, vec![local.address(), member.clone()]);
			assert_eq!(lists[0].privacy_mode, StoryPrivacyMode::AllowList);

			Ok::<_, StoreError>(())
		})
		.unwrap();
	}

	#[test]
	fn unknown_privacy_mode_fails() {
		let mut context = RecipientRestoringContext::new(LocalIdentifiers::new(
			Aci::from_uuid(Uuid::new_v4()),
			None,
			E164::parse("+15555550100").unwrap(),
		));

		let item = DistributionListItem {
			distribution_id: Uuid::new_v4().as_bytes().to_vec(),
			item: Some(DistributionListItemKind::DistributionList(
				DistributionList::default(),
			)),
		};

		let db = MemoryDatabase::new();
		db.write(|tx| {
			let result =
				DistributionListRecipientArchiver.restore(RecipientId(2), &item, &mut context, tx)?;
			assert!(matches!(result, RestoreFrameResult::Failure(_)));
			assert!(tx.distribution_lists()?.is_empty());
			Ok::<_, StoreError>(())
		})
		.unwrap();

		assert_eq!(context.get(RecipientId(2)), None);
	}

	#[test]
	fn local_account_is_archived_as_a_member() {
		let local = LocalIdentifiers::new(
			Aci::from_uuid(Uuid::new_v4()),
			None,
			E164::parse("+15555550100").unwrap(),
		);
		let distribution_id = DistributionId::from_bytes(Uuid::new_v4().as_bytes()).unwrap();

		let db = MemoryDatabase::new();
		db.write(|tx| {
			tx.insert_distribution_list(DistributionListRecord {
				row_id: None,
				distribution_id,
				name: "Family".to_string(),
				allow_replies: true,
				privacy_mode: StoryPrivacyMode::AllowList,
				members: vec![local.address()],
				deleted_at_ms: None,
			})
		})
		.unwrap();

		let mut sink = sd_backup_proto::MemoryStream::new(sd_backup_proto::BackupInfo::new(0), []);
		let mut context = RecipientArchivingContext::new(local);
		let mut report = PassReport::default();
		db.read(|tx| {
			DistributionListRecipientArchiver.archive_recipients(
				&mut sink,
				&mut context,
				tx,
				&mut report,
			)
		})
		.unwrap();

		assert!(report.is_clean());
		let Some(sd_backup_proto::FrameItem::Recipient(Recipient {
			destination: Some(Destination::DistributionList(list)),
			..
		})) = &sink.frames[0].item
		else {
			panic!("expected a distribution list frame");
		};
		let Some(DistributionListItemKind::DistributionList(list)) = &list.item else {
			panic!("expected a live distribution list");
		};
		assert_eq!(list.member_recipient_ids, vec![crate::ids::LOCAL_RECIPIENT_ID.0]);
	}
}
