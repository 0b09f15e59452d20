use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::{
	error::InvalidProtoDataError,
	ids::{ChatId, RecipientId, ThreadUniqueId},
	store::ThreadKind,
};

use super::{RecipientArchivingContext, RecipientRestoringContext};

/// Chat ids for an archive pass. Wraps the recipient context, which is complete by the time chats
/// are archived.
#[derive(Debug)]
pub struct ChatArchivingContext {
	recipient_context: RecipientArchivingContext,
	current_chat_id: ChatId,
	map: HashMap<ThreadUniqueId, ChatId>,
}

impl ChatArchivingContext {
	#[must_use]
	pub fn new(recipient_context: RecipientArchivingContext) -> Self {
		Self {
			recipient_context,
			current_chat_id: ChatId(0),
			map: HashMap::new(),
		}
	}

	#[must_use]
	pub const fn recipient_context(&self) -> &RecipientArchivingContext {
		&self.recipient_context
	}

	pub fn assign(&mut self, thread_unique_id: &ThreadUniqueId) -> ChatId {
		self.current_chat_id = ChatId(self.current_chat_id.0 + 1);
		self.map.insert(thread_unique_id.clone(), self.current_chat_id);

		self.current_chat_id
	}

	#[must_use]
	pub fn get(&self, thread_unique_id: &ThreadUniqueId) -> Option<ChatId> {
		self.map.get(thread_unique_id).copied()
	}
}

/// The local thread a restored chat id points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatThread {
	pub thread_unique_id: ThreadUniqueId,
	pub kind: ThreadKind,
}

/// Chat ids read off the wire during a restore pass. Owns the recipient context, since chats and
/// chat items resolve recipients too.
#[derive(Debug)]
pub struct ChatRestoringContext {
	recipient_context: RecipientRestoringContext,
	map: HashMap<ChatId, ChatThread>,
	recipients_with_chats: HashSet<RecipientId>,
}

impl ChatRestoringContext {
	#[must_use]
	pub fn new(recipient_context: RecipientRestoringContext) -> Self {
		Self {
			recipient_context,
			map: HashMap::new(),
			recipients_with_chats: HashSet::new(),
		}
	}

	#[must_use]
	pub const fn recipient_context(&self) -> &RecipientRestoringContext {
		&self.recipient_context
	}

	pub fn recipient_context_mut(&mut self) -> &mut RecipientRestoringContext {
		&mut self.recipient_context
	}

	/// A recipient has at most one chat, and chat ids are never redefined.
	pub fn define(
		&mut self,
		id: ChatId,
		recipient_id: RecipientId,
		thread: ChatThread,
	) -> Result<(), InvalidProtoDataError> {
		if id.0 == 0 {
			return Err(InvalidProtoDataError::ChatIdNotSet);
		}

		if self.map.contains_key(&id) {
			return Err(InvalidProtoDataError::DuplicateChatId(id));
		}

		if !self.recipients_with_chats.insert(recipient_id) {
			return Err(InvalidProtoDataError::DuplicateChatRecipient(recipient_id));
		}

		trace!(%id, thread_unique_id = %thread.thread_unique_id, "Defined chat id;");
		self.map.insert(id, thread);

		Ok(())
	}

	#[must_use]
	pub fn get(&self, id: ChatId) -> Option<&ChatThread> {
		self.map.get(&id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::identifiers::{Aci, LocalIdentifiers, E164};

	use uuid::Uuid;

	fn thread() -> ChatThread {
		ChatThread {
			thread_unique_id: ThreadUniqueId::random(),
			kind: ThreadKind::ReleaseNotes,
		}
	}

	#[test]
	fn chats_are_defined_once_per_recipient() {
		let mut context = ChatRestoringContext::new(RecipientRestoringContext::new(
			LocalIdentifiers::new(
				Aci::from_uuid(Uuid::new_v4()),
				None,
				E164::parse("+15555550100").unwrap(),
			),
		));

		assert_eq!(
			context.define(ChatId(0), RecipientId(2), thread()),
			Err(InvalidProtoDataError::ChatIdNotSet)
		);

		context.define(ChatId(1), RecipientId(2), thread()).unwrap();

		assert_eq!(
			context.define(ChatId(1), RecipientId(3), thread()),
			Err(InvalidProtoDataError::DuplicateChatId(ChatId(1)))
		);
		assert_eq!(
			context.define(ChatId(2), RecipientId(2), thread()),
			Err(InvalidProtoDataError::DuplicateChatRecipient(RecipientId(2)))
		);
		assert!(context.get(ChatId(2)).is_none());
	}

	#[test]
	fn archived_chat_ids_start_at_one() {
		let mut context = ChatArchivingContext::new(RecipientArchivingContext::new(
			LocalIdentifiers::new(
				Aci::from_uuid(Uuid::new_v4()),
				None,
				E164::parse("+15555550100").unwrap(),
			),
		));

		let first = ThreadUniqueId::random();
		let second = ThreadUniqueId::random();

		assert_eq!(context.assign(&first), ChatId(1));
		assert_eq!(context.assign(&second), ChatId(2));
		assert_eq!(context.get(&first), Some(ChatId(1)));
		assert_eq!(context.get(&ThreadUniqueId::random()), None);
	}
}
