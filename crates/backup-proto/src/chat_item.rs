use serde::{Deserialize, Serialize};

/// One entry of a chat's history.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct ChatItem {
	pub chat_id: u64,
	pub author_id: u64,
	pub date_sent: u64,
	#[serde(default)]
	pub expire_start_date: Option<u64>,
	#[serde(default)]
	pub expires_in_ms: Option<u64>,
	#[serde(default)]
	pub sms: bool,
	#[serde(default)]
	pub directional_details: Option<DirectionalDetails>,
	#[serde(default)]
	pub item: Option<ChatItemType>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum DirectionalDetails {
	Incoming(IncomingMessageDetails),
	Outgoing(OutgoingMessageDetails),
	Directionless,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct IncomingMessageDetails {
	pub date_received: u64,
	#[serde(default)]
	pub date_server_sent: Option<u64>,
	#[serde(default)]
	pub read: bool,
	#[serde(default)]
	pub sealed_sender: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct OutgoingMessageDetails {
	#[serde(default)]
	pub send_status: Vec<SendStatus>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SendStatus {
	pub recipient_id: u64,
	#[serde(default)]
	pub timestamp: u64,
	pub status: DeliveryStatus,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DeliveryStatus {
	Pending,
	Sent,
	Delivered,
	Read,
	Viewed,
	Skipped,
	Failed,
	#[default]
	#[serde(other)]
	Unknown,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, strum_macros::IntoStaticStr)]
pub enum ChatItemType {
	StandardMessage(StandardMessage),
	UpdateMessage(ChatUpdateMessage),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct StandardMessage {
	#[serde(default)]
	pub quote: Option<Quote>,
	#[serde(default)]
	pub text: Option<Text>,
	#[serde(default)]
	pub attachments: Vec<MessageAttachment>,
	#[serde(default)]
	pub link_preview: Vec<LinkPreview>,
	/// Body that did not fit in `text`.
	#[serde(default)]
	pub long_text: Option<FilePointer>,
	#[serde(default)]
	pub reactions: Vec<Reaction>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct Text {
	pub body: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct Quote {
	#[serde(default)]
	pub target_sent_timestamp: Option<u64>,
	pub author_id: u64,
	#[serde(default)]
	pub text: Option<String>,
	#[serde(default)]
	pub attachments: Vec<QuotedAttachment>,
	#[serde(default)]
	pub kind: QuoteType,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum QuoteType {
	Normal,
	GiftBadge,
	#[default]
	#[serde(other)]
	Unknown,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct QuotedAttachment {
	#[serde(default)]
	pub content_type: Option<String>,
	#[serde(default)]
	pub file_name: Option<String>,
	#[serde(default)]
	pub thumbnail: Option<MessageAttachment>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct MessageAttachment {
	#[serde(default)]
	pub pointer: Option<FilePointer>,
	#[serde(default)]
	pub flag: AttachmentFlag,
	#[serde(default)]
	pub was_downloaded: bool,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AttachmentFlag {
	#[default]
	None,
	VoiceMessage,
	Borderless,
	Gif,
}

/// Sender supplied description of an attachment and where its encrypted bytes live.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct FilePointer {
	#[serde(default)]
	pub content_type: Option<String>,
	#[serde(default)]
	pub file_name: Option<String>,
	#[serde(default)]
	pub width: Option<u32>,
	#[serde(default)]
	pub height: Option<u32>,
	#[serde(default)]
	pub caption: Option<String>,
	#[serde(default)]
	pub locator: Option<Locator>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum Locator {
	Attachment(AttachmentLocator),
	/// The attachment was never downloadable (expired, failed upload, etc).
	Invalid,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct AttachmentLocator {
	pub cdn_key: String,
	pub cdn_number: u32,
	#[serde(default)]
	pub upload_timestamp: Option<u64>,
	pub key: Vec<u8>,
	pub digest: Vec<u8>,
	pub size: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct LinkPreview {
	pub url: String,
	#[serde(default)]
	pub title: Option<String>,
	#[serde(default)]
	pub image: Option<FilePointer>,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub date: Option<u64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct Reaction {
	pub emoji: String,
	pub author_id: u64,
	pub sent_timestamp: u64,
	#[serde(default)]
	pub sort_order: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct ChatUpdateMessage {
	#[serde(default)]
	pub update: Option<ChatUpdate>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, strum_macros::IntoStaticStr)]
pub enum ChatUpdate {
	SimpleUpdate(SimpleChatUpdate),
	ExpirationTimerChange(ExpirationTimerChatUpdate),
	ProfileChange(ProfileChangeChatUpdate),
	ThreadMerge(ThreadMergeChatUpdate),
	SessionSwitchover(SessionSwitchoverChatUpdate),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct SimpleChatUpdate {
	#[serde(default)]
	pub kind: SimpleChatUpdateType,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SimpleChatUpdateType {
	JoinedSignal,
	IdentityUpdate,
	EndSession,
	ChatSessionRefresh,
	#[default]
	#[serde(other)]
	Unknown,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct ExpirationTimerChatUpdate {
	/// Zero means disappearing messages were turned off.
	#[serde(default)]
	pub expires_in_ms: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct ProfileChangeChatUpdate {
	pub previous_name: String,
	pub new_name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct ThreadMergeChatUpdate {
	#[serde(default)]
	pub previous_e164: Option<u64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct SessionSwitchoverChatUpdate {
	#[serde(default)]
	pub e164: Option<u64>,
}
