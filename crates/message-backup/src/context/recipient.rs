use std::{
	collections::{HashMap, HashSet},
	fmt,
};

use serde::Serialize;
use tracing::trace;

use crate::{
	error::InvalidProtoDataError,
	identifiers::{Aci, ContactAddress, DistributionId, E164, GroupId, LocalIdentifiers, Pni},
	ids::{LoggableId, RecipientId, LOCAL_RECIPIENT_ID},
};

/// What a recipient id stands for while archiving.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ArchivingAddress {
	ReleaseNotesChannel,
	Contact(ContactAddress),
	Group(GroupId),
	DistributionList(DistributionId),
}

impl fmt::Display for ArchivingAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::ReleaseNotesChannel => f.write_str("ReleaseNotesChannel"),
			Self::Contact(address) => write!(f, "Contact{address}"),
			Self::Group(group_id) => write!(f, "Group[{group_id}]"),
			Self::DistributionList(distribution_id) => {
				write!(f, "DistributionList[{distribution_id}]")
			}
		}
	}
}

impl LoggableId for ArchivingAddress {
	fn type_log_string(&self) -> &'static str {
		match self {
			Self::ReleaseNotesChannel => "ReleaseNotesChannel",
			Self::Contact(_) => "ContactAddress",
			Self::Group(_) => "GroupId",
			Self::DistributionList(_) => "DistributionId",
		}
	}

	fn id_log_string(&self) -> String {
		self.to_string()
	}
}

/// What a recipient id stands for while restoring. The local account is an explicit case since
/// frames authored by it resolve differently from frames authored by contacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoringAddress {
	LocalAddress,
	ReleaseNotesChannel,
	Contact(ContactAddress),
	Group(GroupId),
	DistributionList(DistributionId),
}

/// Hands out recipient ids during an archive pass.
///
/// Contacts are indexed under every identifier they are known by, so one contact reached through
/// different identifiers always resolves to the same id. Lookups walk the identifiers in a single
/// fixed order, aci then e164 then pni, stopping at the first one that is mapped.
#[derive(Debug)]
pub struct RecipientArchivingContext {
	local_identifiers: LocalIdentifiers,
	current_recipient_id: RecipientId,
	release_notes_id: Option<RecipientId>,
	group_ids: HashMap<GroupId, RecipientId>,
	distribution_ids: HashMap<DistributionId, RecipientId>,
	contact_aci_map: HashMap<Aci, RecipientId>,
	contact_e164_map: HashMap<E164, RecipientId>,
	contact_pni_map: HashMap<Pni, RecipientId>,
}

impl RecipientArchivingContext {
	#[must_use]
	pub fn new(local_identifiers: LocalIdentifiers) -> Self {
		let mut contact_aci_map = HashMap::new();
		let mut contact_e164_map = HashMap::new();
		let mut contact_pni_map = HashMap::new();

		contact_aci_map.insert(local_identifiers.aci, LOCAL_RECIPIENT_ID);
		contact_e164_map.insert(local_identifiers.phone_number.clone(), LOCAL_RECIPIENT_ID);
		if let Some(pni) = local_identifiers.pni {
			contact_pni_map.insert(pni, LOCAL_RECIPIENT_ID);
		}

		Self {
			local_identifiers,
			current_recipient_id: LOCAL_RECIPIENT_ID,
			release_notes_id: None,
			group_ids: HashMap::new(),
			distribution_ids: HashMap::new(),
			contact_aci_map,
			contact_e164_map,
			contact_pni_map,
		}
	}

	#[must_use]
	pub const fn local_identifiers(&self) -> &LocalIdentifiers {
		&self.local_identifiers
	}

	#[must_use]
	pub const fn local_recipient_id(&self) -> RecipientId {
		LOCAL_RECIPIENT_ID
	}

	/// Allocates the next id and records it for every identifier of `address`.
	///
	/// Callers must only assign an address once; use [`Self::lookup`] first when in doubt.
	pub fn assign(&mut self, address: &ArchivingAddress) -> RecipientId {
		self.current_recipient_id = RecipientId(self.current_recipient_id.0 + 1);
		let id = self.current_recipient_id;

		match address {
			ArchivingAddress::ReleaseNotesChannel => self.release_notes_id = Some(id),
			ArchivingAddress::Group(group_id) => {
				self.group_ids.insert(group_id.clone(), id);
			}
			ArchivingAddress::DistributionList(distribution_id) => {
				self.distribution_ids.insert(*distribution_id, id);
			}
			ArchivingAddress::Contact(contact) => {
				if let Some(aci) = contact.aci() {
					self.contact_aci_map.insert(aci, id);
				}
				if let Some(e164) = contact.e164() {
					self.contact_e164_map.insert(e164.clone(), id);
				}
				if let Some(pni) = contact.pni() {
					self.contact_pni_map.insert(pni, id);
				}
			}
		}

		trace!(%id, %address, "Assigned recipient id;");

		id
	}

	#[must_use]
	pub fn lookup(&self, address: &ArchivingAddress) -> Option<RecipientId> {
		match address {
			ArchivingAddress::ReleaseNotesChannel => self.release_notes_id,
			ArchivingAddress::Group(group_id) => self.group_ids.get(group_id).copied(),
			ArchivingAddress::DistributionList(distribution_id) => {
				self.distribution_ids.get(distribution_id).copied()
			}
			ArchivingAddress::Contact(contact) => contact
				.aci()
				.and_then(|aci| self.contact_aci_map.get(&aci))
				.or_else(|| {
					contact
						.e164()
						.and_then(|e164| self.contact_e164_map.get(e164))
				})
				.or_else(|| {
					contact
						.pni()
						.and_then(|pni| self.contact_pni_map.get(&pni))
				})
				.copied(),
		}
	}
}

/// Maps recipient ids read off the wire back to addresses during a restore pass.
///
/// Also remembers every identifier already defined, so two frames can never describe the same
/// contact, group or distribution list.
#[derive(Debug)]
pub struct RecipientRestoringContext {
	local_identifiers: LocalIdentifiers,
	map: HashMap<RecipientId, RestoringAddress>,
	seen_acis: HashSet<Aci>,
	seen_pnis: HashSet<Pni>,
	seen_e164s: HashSet<E164>,
	seen_groups: HashSet<GroupId>,
	seen_distribution_ids: HashSet<DistributionId>,
}

impl RecipientRestoringContext {
	#[must_use]
	pub fn new(local_identifiers: LocalIdentifiers) -> Self {
		let seen_acis = HashSet::from([local_identifiers.aci]);
		let seen_pnis = local_identifiers.pni.into_iter().collect();
		let seen_e164s = HashSet::from([local_identifiers.phone_number.clone()]);

		Self {
			local_identifiers,
			map: HashMap::new(),
			seen_acis,
			seen_pnis,
			seen_e164s,
			seen_groups: HashSet::new(),
			seen_distribution_ids: HashSet::new(),
		}
	}

	#[must_use]
	pub const fn local_identifiers(&self) -> &LocalIdentifiers {
		&self.local_identifiers
	}

	/// Ids are defined once, in stream order, and never redefined.
	pub fn define(
		&mut self,
		id: RecipientId,
		address: RestoringAddress,
	) -> Result<(), InvalidProtoDataError> {
		if id.0 == 0 {
			return Err(InvalidProtoDataError::RecipientIdNotSet);
		}

		if self.map.contains_key(&id) {
			return Err(InvalidProtoDataError::DuplicateRecipientId(id));
		}

		self.claim(&address)?;

		trace!(%id, ?address, "Defined recipient id;");
		self.map.insert(id, address);

		Ok(())
	}

	fn claim(&mut self, address: &RestoringAddress) -> Result<(), InvalidProtoDataError> {
		match address {
			RestoringAddress::LocalAddress | RestoringAddress::ReleaseNotesChannel => Ok(()),
			RestoringAddress::Contact(contact) => {
				let taken = contact.aci().is_some_and(|aci| self.seen_acis.contains(&aci))
					|| contact.pni().is_some_and(|pni| self.seen_pnis.contains(&pni))
					|| contact
						.e164()
						.is_some_and(|e164| self.seen_e164s.contains(e164));
				if taken {
					return Err(InvalidProtoDataError::DuplicateContact);
				}

				self.seen_acis.extend(contact.aci());
				self.seen_pnis.extend(contact.pni());
				self.seen_e164s.extend(contact.e164().cloned());

				Ok(())
			}
			RestoringAddress::Group(group_id) => {
				if self.seen_groups.insert(group_id.clone()) {
					Ok(())
				} else {
					Err(InvalidProtoDataError::DuplicateGroup)
				}
			}
			RestoringAddress::DistributionList(distribution_id) => {
				if self.seen_distribution_ids.insert(*distribution_id) {
					Ok(())
				} else {
					Err(InvalidProtoDataError::DuplicateDistributionList)
				}
			}
		}
	}

	#[must_use]
	pub fn get(&self, id: RecipientId) -> Option<&RestoringAddress> {
		self.map.get(&id)
	}

	/// Resolves `id` to a contact address, treating the local account as a contact too.
	#[must_use]
	pub fn contact_address(&self, id: RecipientId) -> Option<ContactAddress> {
		match self.get(id)? {
			RestoringAddress::LocalAddress => Some(self.local_identifiers.address()),
			RestoringAddress::Contact(address) => Some(address.clone()),
			RestoringAddress::ReleaseNotesChannel
			| RestoringAddress::Group(_)
			| RestoringAddress::DistributionList(_) => None,
		}
	}
}
