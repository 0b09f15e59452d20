#![allow(dead_code)]

use sd_backup_proto::{
	Chat, ChatItem, ChatItemType, ChatUpdate, ChatUpdateMessage, Contact, Destination,
	DirectionalDetails, Frame, Group, Recipient, SelfRecipient, ThreadMergeChatUpdate,
};
use sd_message_backup::{
	attachment::NoThumbnailTranscoder,
	identifiers::{Aci, LocalIdentifiers, E164},
	store::{Interaction, MemoryDatabase, ReadTx, StoreError, Thread, ThreadKind},
	DateProvider, MessageBackupConfig, MessageBackupManager,
};

use std::sync::Arc;

use uuid::Uuid;

pub const BACKUP_TIME_MS: u64 = 1_700_000_000_000;

#[derive(Debug)]
pub struct FixedDate;

impl DateProvider for FixedDate {
	fn now_ms(&self) -> u64 {
		BACKUP_TIME_MS
	}
}

pub fn local_identifiers() -> LocalIdentifiers {
	LocalIdentifiers::new(
		Aci::from_uuid(Uuid::from_u128(0x0100)),
		None,
		E164::parse("+15555550100").unwrap(),
	)
}

pub fn aci(n: u128) -> Aci {
	Aci::from_uuid(Uuid::from_u128(n))
}

pub fn manager(
	db: Arc<MemoryDatabase>,
	config: MessageBackupConfig,
) -> MessageBackupManager<MemoryDatabase> {
	MessageBackupManager::new(db, config, Arc::new(FixedDate), Arc::new(NoThumbnailTranscoder))
}

pub fn self_recipient(id: u64) -> Frame {
	Recipient {
		id,
		destination: Some(Destination::SelfRecipient(SelfRecipient {})),
	}
	.into()
}

pub fn contact(id: u64, aci: Aci) -> Frame {
	Recipient {
		id,
		destination: Some(Destination::Contact(Contact {
			aci: Some(aci.to_bytes()),
			registered: true,
			..Default::default()
		})),
	}
	.into()
}

pub fn group(id: u64, group_id: &[u8]) -> Frame {
	Recipient {
		id,
		destination: Some(Destination::Group(Group {
			group_id: group_id.to_vec(),
			title: Some("Hiking".to_string()),
			..Default::default()
		})),
	}
	.into()
}

pub fn chat(id: u64, recipient_id: u64) -> Frame {
	Chat {
		id,
		recipient_id,
		..Default::default()
	}
	.into()
}

pub fn thread_merge(
	chat_id: u64,
	author_id: u64,
	date_sent: u64,
	previous_e164: Option<u64>,
) -> Frame {
	ChatItem {
		chat_id,
		author_id,
		date_sent,
		directional_details: Some(DirectionalDetails::Directionless),
		item: Some(ChatItemType::UpdateMessage(ChatUpdateMessage {
			update: Some(ChatUpdate::ThreadMerge(ThreadMergeChatUpdate { previous_e164 })),
		})),
		..Default::default()
	}
	.into()
}

/// Every thread of the store with its interactions.
pub fn threads_with_interactions(
	tx: &dyn ReadTx,
) -> Result<Vec<(Thread, Vec<Interaction>)>, StoreError> {
	tx.threads()?
		.into_iter()
		.map(|thread| {
			let interactions = tx.interactions(&thread.unique_id)?;
			Ok((thread, interactions))
		})
		.collect()
}

pub fn contact_thread(
	threads: &[(Thread, Vec<Interaction>)],
	aci: Aci,
) -> Option<&(Thread, Vec<Interaction>)> {
	threads.iter().find(|(thread, _)| {
		matches!(&thread.kind, ThreadKind::Contact(address) if address.aci() == Some(aci))
	})
}
