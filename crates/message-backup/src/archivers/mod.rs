//! Per entity converters between the local store and backup frames.
//!
//! Archivers never abort a pass on bad local data: they record a frame error and move on. Only
//! store reads and sink writes are fatal.

use sd_backup_proto::{Frame, FrameSink};

use crate::error::FatalArchivingError;

mod attachment;
mod chat;
mod chat_item;
mod recipient;

pub use attachment::{ArchivedAttachments, MessageAttachmentArchiver};
pub use chat::ChatArchiver;
pub use chat_item::{
	ChatItemArchiver, ChatItemDetails, ChatUpdateMessageArchiver, ExpirationTimerChatUpdateArchiver,
	ProfileChangeChatUpdateArchiver, SessionSwitchoverChatUpdateArchiver, SimpleChatUpdateArchiver,
	StandardMessageArchiver, ThreadMergeChatUpdateArchiver,
};
pub use recipient::{
	ContactRecipientArchiver, DistributionListRecipientArchiver, GroupRecipientArchiver,
	LocalRecipientArchiver, RecipientArchiver, RecipientDestinationArchiver,
	ReleaseNotesRecipientArchiver,
};

fn write_frame(
	sink: &mut dyn FrameSink,
	frame: impl Into<Frame>,
) -> Result<(), FatalArchivingError> {
	sink.write_frame(&frame.into()).map_err(Into::into)
}
