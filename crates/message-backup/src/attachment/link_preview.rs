use sd_backup_proto::FilePointer;

use tracing::debug;

use crate::{
	archivers::MessageAttachmentArchiver,
	error::LinkPreviewError,
	store::{LinkPreview, RowId, StoreError, WriteTx},
};

use super::{Attachment, AttachmentOwner, AttachmentReference, MediaSize, StreamInfo};

/// Link preview as received, before it was validated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkPreviewDraft {
	pub url: String,
	pub title: Option<String>,
	pub description: Option<String>,
	pub date_ms: Option<u64>,
}

impl LinkPreviewDraft {
	fn normalized(self) -> Self {
		fn trimmed(value: Option<String>) -> Option<String> {
			value
				.map(|value| value.trim().to_string())
				.filter(|value| !value.is_empty())
		}

		let title = trimmed(self.title);
		// A description that only repeats the title adds nothing.
		let description =
			trimmed(self.description).filter(|description| Some(description) != title.as_ref());

		Self {
			url: self.url.trim().to_string(),
			title,
			description,
			date_ms: self.date_ms.filter(|date| *date != 0),
		}
	}
}

/// Image already on this device, e.g. one we fetched and transcoded ourselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPreviewImage {
	pub mime_type: String,
	pub stream: StreamInfo,
	pub size: Option<MediaSize>,
}

/// An image attachment that was written but still needs its owning message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLinkPreviewImage {
	pub attachment_row_id: RowId,
	pub source_filename: Option<String>,
	pub source_unencrypted_byte_count: Option<u32>,
	pub source_media_size: Option<MediaSize>,
}

/// A link preview ready to be stored with its message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedLinkPreview {
	pub preview: LinkPreview,
	pub image: Option<PendingLinkPreviewImage>,
}

impl OwnedLinkPreview {
	/// Hands the image, if any, to the message once that message has a row id.
	pub fn finalize(
		self,
		message_row_id: RowId,
		tx: &mut dyn WriteTx,
	) -> Result<LinkPreview, StoreError> {
		if let Some(image) = self.image {
			tx.insert_attachment_reference(AttachmentReference {
				attachment_row_id: image.attachment_row_id,
				owner: AttachmentOwner::LinkPreview { message_row_id },
				source_filename: image.source_filename,
				source_unencrypted_byte_count: image.source_unencrypted_byte_count,
				source_media_size: image.source_media_size,
			})?;
		}

		Ok(self.preview)
	}
}

/// One strategy for producing the image of a link preview.
pub trait LinkPreviewBuilder {
	type Image;
	type DataSource;

	fn build_data_source(&self, draft: LinkPreviewDraft, image: Option<Self::Image>)
		-> Self::DataSource;

	fn create_link_preview(
		&self,
		data_source: Self::DataSource,
		tx: &mut dyn WriteTx,
	) -> Result<OwnedLinkPreview, StoreError>;
}

/// Builds previews whose image is already available locally.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkPreviewAttachmentBuilder;

impl LinkPreviewBuilder for LinkPreviewAttachmentBuilder {
	type Image = LinkPreviewImage;
	type DataSource = (LinkPreviewDraft, Option<LinkPreviewImage>);

	fn build_data_source(
		&self,
		draft: LinkPreviewDraft,
		image: Option<LinkPreviewImage>,
	) -> Self::DataSource {
		let image = image.filter(|image| {
			let is_image = image.mime_type.starts_with("image/");
			if !is_image {
				debug!(mime_type = %image.mime_type, "Dropping non image link preview attachment;");
			}
			is_image
		});

		(draft, image)
	}

	fn create_link_preview(
		&self,
		(draft, image): Self::DataSource,
		tx: &mut dyn WriteTx,
	) -> Result<OwnedLinkPreview, StoreError> {
		let image = image
			.map(|image| {
				let source_unencrypted_byte_count = Some(image.stream.unencrypted_byte_count);
				tx.insert_attachment(Attachment {
					row_id: None,
					mime_type: image.mime_type,
					transit_tier: None,
					stream: Some(image.stream),
				})
				.map(|attachment_row_id| PendingLinkPreviewImage {
					attachment_row_id,
					source_filename: None,
					source_unencrypted_byte_count,
					source_media_size: image.size,
				})
			})
			.transpose()?;

		Ok(OwnedLinkPreview {
			preview: draft.into(),
			image,
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupLinkPreviewDataSource {
	pub draft: LinkPreviewDraft,
	pub image: Option<(Attachment, Option<String>, Option<MediaSize>)>,
}

/// Builds previews restored from a backup, whose image is only a pointer to be fetched later.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackupLinkPreviewBuilder;

impl LinkPreviewBuilder for BackupLinkPreviewBuilder {
	type Image = FilePointer;
	type DataSource = BackupLinkPreviewDataSource;

	fn build_data_source(
		&self,
		draft: LinkPreviewDraft,
		image: Option<FilePointer>,
	) -> Self::DataSource {
		let image = image.and_then(|pointer| {
			MessageAttachmentArchiver::attachment_from_pointer(&pointer)
				.map_err(|e| debug!(?e, "Dropping invalid link preview image;"))
				.ok()
				.map(|attachment| {
					(
						attachment,
						pointer.file_name.clone(),
						MessageAttachmentArchiver::media_size(&pointer),
					)
				})
		});

		BackupLinkPreviewDataSource { draft, image }
	}

	fn create_link_preview(
		&self,
		BackupLinkPreviewDataSource { draft, image }: Self::DataSource,
		tx: &mut dyn WriteTx,
	) -> Result<OwnedLinkPreview, StoreError> {
		let image = image
			.map(|(attachment, source_filename, source_media_size)| {
				let source_unencrypted_byte_count = attachment
					.transit_tier
					.as_ref()
					.map(|transit_tier| transit_tier.unencrypted_byte_count);

				tx.insert_attachment(attachment)
					.map(|attachment_row_id| PendingLinkPreviewImage {
						attachment_row_id,
						source_filename,
						source_unencrypted_byte_count,
						source_media_size,
					})
			})
			.transpose()?;

		Ok(OwnedLinkPreview {
			preview: draft.into(),
			image,
		})
	}
}

impl From<LinkPreviewDraft> for LinkPreview {
	fn from(draft: LinkPreviewDraft) -> Self {
		Self {
			url: draft.url,
			title: draft.title,
			description: draft.description,
			date_ms: draft.date_ms,
		}
	}
}

/// Validates incoming link previews and builds them with any [`LinkPreviewBuilder`].
#[derive(Debug, Clone)]
pub struct LinkPreviewManager<B> {
	builder: B,
	enabled: bool,
}

impl<B: LinkPreviewBuilder> LinkPreviewManager<B> {
	pub const fn new(builder: B, enabled: bool) -> Self {
		Self { builder, enabled }
	}

	/// Previews are only kept for https urls that actually appear in the message they came with.
	pub fn validate_and_build_data_source(
		&self,
		draft: LinkPreviewDraft,
		image: Option<B::Image>,
		message_body: Option<&str>,
	) -> Result<B::DataSource, LinkPreviewError> {
		if !self.enabled {
			return Err(LinkPreviewError::FeatureDisabled);
		}

		let draft = draft.normalized();

		if !is_valid_preview_url(&draft.url) {
			return Err(LinkPreviewError::InvalidPreview);
		}

		if !message_body.is_some_and(|body| body.contains(&draft.url)) {
			return Err(LinkPreviewError::NotInBody);
		}

		Ok(self.builder.build_data_source(draft, image))
	}

	pub fn create_link_preview(
		&self,
		data_source: B::DataSource,
		tx: &mut dyn WriteTx,
	) -> Result<OwnedLinkPreview, StoreError> {
		self.builder.create_link_preview(data_source, tx)
	}
}

fn is_valid_preview_url(url: &str) -> bool {
	url.strip_prefix("https://")
		.is_some_and(|rest| !rest.is_empty() && !rest.chars().any(char::is_whitespace))
}
