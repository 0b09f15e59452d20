use std::sync::Mutex;

use tracing::trace;

use crate::{
	attachment::{Attachment, AttachmentReference},
	ids::ThreadUniqueId,
};

use super::{
	ContactRecipient, Database, DistributionListRecord, GroupRecord, Interaction, InteractionKind,
	ReadTx, RowId, StoreError, Thread, ThreadKind, WriteTx,
};

#[derive(Debug, Default, Clone)]
struct Tables {
	last_row_id: RowId,
	contacts: Vec<ContactRecipient>,
	groups: Vec<GroupRecord>,
	distribution_lists: Vec<DistributionListRecord>,
	threads: Vec<Thread>,
	interactions: Vec<Interaction>,
	attachments: Vec<Attachment>,
	attachment_references: Vec<AttachmentReference>,
}

impl Tables {
	fn next_row_id(&mut self) -> RowId {
		self.last_row_id += 1;
		self.last_row_id
	}
}

#[derive(Debug, Default)]
struct MemoryTx {
	tables: Tables,
	savepoints: Vec<Tables>,
}

/// Store that lives entirely in memory. Write transactions work on a copy of the tables that
/// replaces the committed tables on success, savepoints are snapshots of that copy.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
	tables: Mutex<Tables>,
}

impl MemoryDatabase {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}
}

impl Database for MemoryDatabase {
	fn read<T, E: From<StoreError>>(
		&self,
		f: impl FnOnce(&dyn ReadTx) -> Result<T, E>,
	) -> Result<T, E> {
		let tables = self.tables.lock().map_err(|_| StoreError::Poisoned)?;

		let tx = MemoryTx {
			tables: tables.clone(),
			savepoints: vec![],
		};

		f(&tx)
	}

	fn write<T, E: From<StoreError>>(
		&self,
		f: impl FnOnce(&mut dyn WriteTx) -> Result<T, E>,
	) -> Result<T, E> {
		let mut tables = self.tables.lock().map_err(|_| StoreError::Poisoned)?;

		let mut tx = MemoryTx {
			tables: tables.clone(),
			savepoints: vec![],
		};

		let out = f(&mut tx)?;

		trace!(last_row_id = tx.tables.last_row_id, "Committing write transaction;");
		*tables = tx.tables;

		Ok(out)
	}
}

impl ReadTx for MemoryTx {
	fn contacts(&self) -> Result<Vec<ContactRecipient>, StoreError> {
		Ok(self.tables.contacts.clone())
	}

	fn groups(&self) -> Result<Vec<GroupRecord>, StoreError> {
		Ok(self.tables.groups.clone())
	}

	fn distribution_lists(&self) -> Result<Vec<DistributionListRecord>, StoreError> {
		Ok(self.tables.distribution_lists.clone())
	}

	fn threads(&self) -> Result<Vec<Thread>, StoreError> {
		Ok(self.tables.threads.clone())
	}

	fn thread(&self, unique_id: &ThreadUniqueId) -> Result<Option<Thread>, StoreError> {
		Ok(self
			.tables
			.threads
			.iter()
			.find(|thread| &thread.unique_id == unique_id)
			.cloned())
	}

	fn interactions(
		&self,
		thread_unique_id: &ThreadUniqueId,
	) -> Result<Vec<Interaction>, StoreError> {
		let mut interactions = self
			.tables
			.interactions
			.iter()
			.filter(|interaction| &interaction.thread_unique_id == thread_unique_id)
			.cloned()
			.collect::<Vec<_>>();

		// Stable, so insertion order breaks ties.
		interactions.sort_by_key(|interaction| interaction.timestamp);

		Ok(interactions)
	}

	fn find_message_by_timestamp(
		&self,
		thread_unique_id: &ThreadUniqueId,
		timestamp: u64,
	) -> Result<Option<Interaction>, StoreError> {
		Ok(self
			.tables
			.interactions
			.iter()
			.find(|interaction| {
				&interaction.thread_unique_id == thread_unique_id
					&& interaction.timestamp == timestamp
					&& !matches!(interaction.kind, InteractionKind::Info(_))
			})
			.cloned())
	}

	fn attachment_references(
		&self,
		message_row_id: RowId,
	) -> Result<Vec<AttachmentReference>, StoreError> {
		Ok(self
			.tables
			.attachment_references
			.iter()
			.filter(|reference| reference.owner.message_row_id() == Some(message_row_id))
			.cloned()
			.collect())
	}

	fn attachment(&self, row_id: RowId) -> Result<Option<Attachment>, StoreError> {
		Ok(self
			.tables
			.attachments
			.iter()
			.find(|attachment| attachment.row_id == Some(row_id))
			.cloned())
	}
}

impl WriteTx for MemoryTx {
	fn insert_contact(&mut self, mut contact: ContactRecipient) -> Result<RowId, StoreError> {
		if self
			.tables
			.contacts
			.iter()
			.any(|existing| existing.address.overlaps(&contact.address))
		{
			return Err(StoreError::Constraint(format!(
				"contact {} already exists",
				contact.address
			)));
		}

		let row_id = self.tables.next_row_id();
		contact.row_id = Some(row_id);
		self.tables.contacts.push(contact);

		Ok(row_id)
	}

	fn insert_group(&mut self, mut group: GroupRecord) -> Result<RowId, StoreError> {
		if self
			.tables
			.groups
			.iter()
			.any(|existing| existing.group_id == group.group_id)
		{
			return Err(StoreError::Constraint(format!(
				"group {} already exists",
				group.group_id
			)));
		}

		let row_id = self.tables.next_row_id();
		group.row_id = Some(row_id);
		self.tables.groups.push(group);

		Ok(row_id)
	}

	fn insert_distribution_list(
		&mut self,
		mut list: DistributionListRecord,
	) -> Result<RowId, StoreError> {
		if self
			.tables
			.distribution_lists
			.iter()
			.any(|existing| existing.distribution_id == list.distribution_id)
		{
			return Err(StoreError::Constraint(format!(
				"distribution list {} already exists",
				list.distribution_id
			)));
		}

		let row_id = self.tables.next_row_id();
		list.row_id = Some(row_id);
		self.tables.distribution_lists.push(list);

		Ok(row_id)
	}

	fn insert_thread(&mut self, mut thread: Thread) -> Result<RowId, StoreError> {
		let duplicate = self.tables.threads.iter().any(|existing| {
			existing.unique_id == thread.unique_id
				|| match (&existing.kind, &thread.kind) {
					(ThreadKind::Contact(a), ThreadKind::Contact(b)) => a.overlaps(b),
					(ThreadKind::Group(a), ThreadKind::Group(b)) => a == b,
					(ThreadKind::ReleaseNotes, ThreadKind::ReleaseNotes) => true,
					_ => false,
				}
		});

		if duplicate {
			return Err(StoreError::Constraint(format!(
				"thread for {} already exists",
				thread.kind
			)));
		}

		let row_id = self.tables.next_row_id();
		thread.row_id = Some(row_id);
		self.tables.threads.push(thread);

		Ok(row_id)
	}

	fn insert_interaction(&mut self, mut interaction: Interaction) -> Result<RowId, StoreError> {
		if !self
			.tables
			.threads
			.iter()
			.any(|thread| thread.unique_id == interaction.thread_unique_id)
		{
			return Err(StoreError::NotFound {
				entity: "thread",
				id: interaction.thread_unique_id.0,
			});
		}

		if self
			.tables
			.interactions
			.iter()
			.any(|existing| existing.unique_id == interaction.unique_id)
		{
			return Err(StoreError::Constraint(format!(
				"interaction {} already exists",
				interaction.unique_id
			)));
		}

		let row_id = self.tables.next_row_id();
		interaction.row_id = Some(row_id);
		self.tables.interactions.push(interaction);

		Ok(row_id)
	}

	fn insert_attachment(&mut self, mut attachment: Attachment) -> Result<RowId, StoreError> {
		let row_id = self.tables.next_row_id();
		attachment.row_id = Some(row_id);
		self.tables.attachments.push(attachment);

		Ok(row_id)
	}

	fn insert_attachment_reference(
		&mut self,
		reference: AttachmentReference,
	) -> Result<(), StoreError> {
		if self.attachment(reference.attachment_row_id)?.is_none() {
			return Err(StoreError::NotFound {
				entity: "attachment",
				id: reference.attachment_row_id.to_string(),
			});
		}

		self.tables.attachment_references.push(reference);

		Ok(())
	}

	fn savepoint(&mut self) -> Result<(), StoreError> {
		self.savepoints.push(self.tables.clone());

		Ok(())
	}

	fn rollback_to_savepoint(&mut self) -> Result<(), StoreError> {
		self.tables = self.savepoints.pop().ok_or(StoreError::NoSavepoint)?;

		Ok(())
	}

	fn release_savepoint(&mut self) -> Result<(), StoreError> {
		self.savepoints
			.pop()
			.map(|_| ())
			.ok_or(StoreError::NoSavepoint)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::identifiers::{Aci, ContactAddress};

	use uuid::Uuid;

	fn contact() -> ContactRecipient {
		ContactRecipient {
			row_id: None,
			address: ContactAddress::from_aci(Aci::from_uuid(Uuid::new_v4())),
			profile_given_name: Some("Alice".to_string()),
			profile_family_name: None,
			blocked: false,
			registered: true,
		}
	}

	#[test]
	fn failed_write_is_discarded() {
		let db = MemoryDatabase::new();

		let res = db.write(|tx| {
			tx.insert_contact(contact())?;
			Err::<(), _>(StoreError::Poisoned)
		});
		assert!(res.is_err());

		assert!(db.read(|tx| tx.contacts()).unwrap().is_empty());
	}

	#[test]
	fn rollback_to_savepoint_keeps_earlier_writes() {
		let db = MemoryDatabase::new();

		db.write(|tx| {
			tx.insert_contact(contact())?;

			tx.savepoint()?;
			tx.insert_contact(contact())?;
			tx.rollback_to_savepoint()?;

			tx.savepoint()?;
			tx.insert_thread(Thread::new(ThreadKind::ReleaseNotes))?;
			tx.release_savepoint()?;

			Ok::<_, StoreError>(())
		})
		.unwrap();

		db.read(|tx| {
			assert_eq!(tx.contacts()?.len(), 1);
			assert_eq!(tx.threads()?.len(), 1);
			Ok::<_, StoreError>(())
		})
		.unwrap();
	}

	#[test]
	fn duplicate_contacts_are_rejected() {
		let db = MemoryDatabase::new();
		let alice = contact();

		let res = db.write(|tx| {
			tx.insert_contact(alice.clone())?;
			tx.insert_contact(alice)
		});

		assert!(matches!(res, Err(StoreError::Constraint(_))));
	}
}
