//! Per pass state used to resolve cross references between frames. Contexts are created at the
//! start of one pass, filled while it runs and dropped with it; nothing here is ever persisted.

mod chat;
mod recipient;

pub use chat::{ChatArchivingContext, ChatRestoringContext, ChatThread};
pub use recipient::{
	ArchivingAddress, RecipientArchivingContext, RecipientRestoringContext, RestoringAddress,
};
