use sd_backup_proto::{Contact, Destination, FrameSink, Recipient};

use tracing::debug;

use crate::{
	context::{
		ArchivingAddress, RecipientArchivingContext, RecipientRestoringContext, RestoringAddress,
	},
	error::{ArchiveFrameError, ArchiveFrameErrorKind, FatalArchivingError, InvalidProtoDataError},
	identifiers::{Aci, ContactAddress, Pni, E164},
	ids::RecipientId,
	report::{FrameOutcome, PassReport},
	result::RestoreFrameResult,
	store::{ContactRecipient, ReadTx, StoreError, WriteTx},
};

use super::{super::write_frame, RecipientDestinationArchiver};

#[derive(Debug, Clone, Copy, Default)]
pub struct ContactRecipientArchiver;

impl ContactRecipientArchiver {
	fn archive_contact(contact: &ContactRecipient, id: RecipientId) -> Recipient {
		let address = &contact.address;

		Recipient {
			id: id.0,
			destination: Some(Destination::Contact(Contact {
				aci: address.aci().map(|aci| aci.to_bytes()),
				pni: address.pni().map(|pni| pni.to_bytes()),
				e164: address.e164().map(E164::to_u64),
				profile_given_name: contact.profile_given_name.clone(),
				profile_family_name: contact.profile_family_name.clone(),
				blocked: contact.blocked,
				registered: contact.registered,
			})),
		}
	}

	fn parse_address(contact: &Contact) -> Result<ContactAddress, InvalidProtoDataError> {
		let aci = contact
			.aci
			.as_deref()
			.map(|bytes| Aci::from_bytes(bytes).ok_or(InvalidProtoDataError::InvalidAci))
			.transpose()?;

		let pni = contact
			.pni
			.as_deref()
			.map(|bytes| Pni::from_bytes(bytes).ok_or(InvalidProtoDataError::InvalidPni))
			.transpose()?;

		// Zero is how an unset phone number looks on the wire.
		let e164 = contact
			.e164
			.filter(|e164| *e164 != 0)
			.map(|e164| E164::from_u64(e164).ok_or(InvalidProtoDataError::InvalidE164))
			.transpose()?;

		ContactAddress::new(aci, pni, e164).ok_or(InvalidProtoDataError::ContactWithoutIdentifiers)
	}
}

impl RecipientDestinationArchiver for ContactRecipientArchiver {
	type Destination = Contact;

	fn archive_recipients(
		&self,
		sink: &mut dyn FrameSink,
		context: &mut RecipientArchivingContext,
		tx: &dyn ReadTx,
		report: &mut PassReport,
	) -> Result<(), FatalArchivingError> {
		for contact in tx.contacts()? {
			if context.local_identifiers().contains(&contact.address) {
				debug!(address = %contact.address, "Skipping contact row of the local user;");
				continue;
			}

			let address = ArchivingAddress::Contact(contact.address.clone());

			if context.lookup(&address).is_some() {
				report.record_archive_failure(ArchiveFrameError::new(
					ArchiveFrameErrorKind::DuplicateRecipient(address.clone()),
					address,
				));
				continue;
			}

			let id = context.assign(&address);
			write_frame(sink, Self::archive_contact(&contact, id))?;
			report.record(FrameOutcome::Success);
		}

		Ok(())
	}

	fn restore(
		&self,
		id: RecipientId,
		contact: &Contact,
		context: &mut RecipientRestoringContext,
		tx: &mut dyn WriteTx,
	) -> Result<RestoreFrameResult<(), RecipientId>, StoreError> {
		let address = match Self::parse_address(contact) {
			Ok(address) => address,
			Err(e) => return Ok(RestoreFrameResult::failure(e, id)),
		};

		if let Err(e) = context.define(id, RestoringAddress::Contact(address.clone())) {
			return Ok(RestoreFrameResult::failure(e, id));
		}

		tx.insert_contact(ContactRecipient {
			row_id: None,
			address,
			profile_given_name: contact.profile_given_name.clone(),
			profile_family_name: contact.profile_family_name.clone(),
			blocked: contact.blocked,
			registered: contact.registered,
		})?;

		Ok(RestoreFrameResult::Success(()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		error::RestoreFrameErrorKind,
		identifiers::LocalIdentifiers,
		store::{Database, MemoryDatabase},
	};

	use sd_backup_proto::{BackupInfo, MemoryStream};
	use uuid::Uuid;

	fn local() -> LocalIdentifiers {
		LocalIdentifiers::new(
			Aci::from_uuid(Uuid::new_v4()),
			None,
			E164::parse("+15555550100").unwrap(),
		)
	}

	#[test]
	fn invalid_identifiers_fail_the_frame() {
		let db = MemoryDatabase::new();
		let mut context = RecipientRestoringContext::new(local());

		let cases = [
			(
				Contact {
					aci: Some(vec![1, 2, 3]),
					..Contact::default()
				},
				InvalidProtoDataError::InvalidAci,
			),
			(
				Contact {
					e164: Some(0),
					..Contact::default()
				},
				InvalidProtoDataError::ContactWithoutIdentifiers,
			),
			(Contact::default(), InvalidProtoDataError::ContactWithoutIdentifiers),
		];

		db.write(|tx| {
			for (i, (contact, expected)) in (2..).zip(cases) {
				let RestoreFrameResult::Failure(errors) =
					ContactRecipientArchiver.restore(RecipientId(i), &contact, &mut context, tx)?
				else {
					panic!("expected a failure");
				};

				assert_eq!(
					errors[0].kind,
					RestoreFrameErrorKind::InvalidProtoData(expected)
				);
				assert_eq!(context.get(RecipientId(i)), None);
			}

			assert!(tx.contacts()?.is_empty());
			Ok::<_, StoreError>(())
		})
		.unwrap();
	}

	#[test]
	fn local_user_row_is_not_archived() {
		let local = local();
		let db = MemoryDatabase::new();

		db.write(|tx| {
			for address in [
				local.address(),
				ContactAddress::from_aci(Aci::from_uuid(Uuid::new_v4())),
			] {
				tx.insert_contact(ContactRecipient {
					row_id: None,
					address,
					profile_given_name: None,
					profile_family_name: None,
					blocked: false,
					registered: true,
				})?;
			}
			Ok::<_, StoreError>(())
		})
		.unwrap();

		let mut sink = MemoryStream::default();
		sink.write_header(&BackupInfo::new(0)).unwrap();
		let mut context = RecipientArchivingContext::new(local);
		let mut report = PassReport::default();

		db.read(|tx| {
			ContactRecipientArchiver.archive_recipients(&mut sink, &mut context, tx, &mut report)
		})
		.unwrap();

		assert_eq!(sink.frames.len(), 1);
		assert_eq!(report.successes, 1);
	}
}
