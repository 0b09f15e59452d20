//! Drives whole archive and restore passes: archivers run in dependency order on export, frames
//! are dispatched in arrival order on import.

use sd_backup_proto::{
	BackupInfo, Frame, FrameItem, FrameReader, FrameSink, FrameSource, FrameWriter,
	SUPPORTED_BACKUP_VERSION,
};

use std::{
	fmt,
	fs::File,
	io::{BufReader, BufWriter},
	path::Path,
	sync::Arc,
	time::{SystemTime, UNIX_EPOCH},
};

use tokio::task::spawn_blocking;
use tracing::{error, info, instrument, warn, Span};

use crate::{
	archivers::{ChatArchiver, ChatItemArchiver, RecipientArchiver},
	attachment::ThumbnailTranscoder,
	config::MessageBackupConfig,
	context::{
		ChatArchivingContext, ChatRestoringContext, RecipientArchivingContext,
		RecipientRestoringContext,
	},
	error::{Error, FileIOError, InvalidProtoDataError},
	identifiers::LocalIdentifiers,
	ids::EmptyFrameId,
	report::{FrameOutcome, PassReport},
	result::RestoreFrameResult,
	store::{Database, ReadTx, StoreError, WriteTx},
};

/// Source of the backup timestamp written into every header.
pub trait DateProvider: Send + Sync + fmt::Debug {
	fn now_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDateProvider;

impl DateProvider for SystemDateProvider {
	fn now_ms(&self) -> u64 {
		SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map_or(0, |elapsed| {
				u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
			})
	}
}

#[derive(Debug)]
pub struct MessageBackupManager<DB: Database> {
	db: Arc<DB>,
	config: MessageBackupConfig,
	date_provider: Arc<dyn DateProvider>,
	recipient_archiver: RecipientArchiver,
	chat_archiver: ChatArchiver,
	chat_item_archiver: ChatItemArchiver,
}

impl<DB: Database> MessageBackupManager<DB> {
	pub fn new(
		db: Arc<DB>,
		config: MessageBackupConfig,
		date_provider: Arc<dyn DateProvider>,
		transcoder: Arc<dyn ThumbnailTranscoder>,
	) -> Self {
		let chat_item_archiver = ChatItemArchiver::new(config.link_previews_enabled, transcoder);

		Self {
			db,
			config,
			date_provider,
			recipient_archiver: RecipientArchiver::default(),
			chat_archiver: ChatArchiver,
			chat_item_archiver,
		}
	}

	#[must_use]
	pub const fn config(&self) -> &MessageBackupConfig {
		&self.config
	}

	/// Writes the header and then every recipient, chat and chat item of the store to `sink`.
	#[instrument(skip_all)]
	pub fn export_backup(
		&self,
		sink: &mut dyn FrameSink,
		local_identifiers: &LocalIdentifiers,
	) -> Result<PassReport, Error> {
		let info = BackupInfo::new(self.date_provider.now_ms());
		sink.write_header(&info)?;

		info!(
			backup_id = %info.backup_id,
			backup_time_ms = info.backup_time_ms,
			"Archiving backup;"
		);

		let report = self
			.db
			.read(|tx| self.archive_entities(sink, local_identifiers, tx))?;

		report.log_frame_errors(self.config.max_logged_ids_per_error);

		Ok(report)
	}

	fn archive_entities(
		&self,
		sink: &mut dyn FrameSink,
		local_identifiers: &LocalIdentifiers,
		tx: &dyn ReadTx,
	) -> Result<PassReport, Error> {
		let mut report = PassReport::default();

		let mut recipient_context = RecipientArchivingContext::new(local_identifiers.clone());
		self.recipient_archiver
			.archive_recipients(sink, &mut recipient_context, tx, &mut report)?;
		self.check_stage("recipients", &report)?;

		let mut chat_context = ChatArchivingContext::new(recipient_context);
		self.chat_archiver
			.archive_chats(sink, &mut chat_context, tx, &mut report)?;
		self.check_stage("chats", &report)?;

		self.chat_item_archiver
			.archive_interactions(sink, &chat_context, tx, &mut report)?;
		self.check_stage("chat items", &report)?;

		Ok(report)
	}

	/// Restores every frame of `source` into the store.
	///
	/// Each frame is restored atomically: a frame that fails leaves nothing behind, while frames
	/// restored before a fatal error stay committed.
	#[instrument(skip_all)]
	pub fn import_backup(
		&self,
		source: &mut dyn FrameSource,
		local_identifiers: &LocalIdentifiers,
	) -> Result<PassReport, Error> {
		let info = source.read_header()?;
		if info.version != SUPPORTED_BACKUP_VERSION {
			return Err(Error::UnsupportedVersion {
				found: info.version,
				supported: SUPPORTED_BACKUP_VERSION,
			});
		}

		info!(
			backup_id = %info.backup_id,
			backup_time_ms = info.backup_time_ms,
			"Restoring backup;"
		);

		let (report, fatal) = self
			.db
			.write(|tx| self.restore_frames(source, local_identifiers, tx))?;

		report.log_frame_errors(self.config.max_logged_ids_per_error);

		if let Some(e) = fatal {
			error!(?e, frames_restored = report.frames_processed, "Restore stopped;");
			return Err(e);
		}

		Ok(report)
	}

	fn restore_frames(
		&self,
		source: &mut dyn FrameSource,
		local_identifiers: &LocalIdentifiers,
		tx: &mut dyn WriteTx,
	) -> Result<(PassReport, Option<Error>), StoreError> {
		let mut context =
			ChatRestoringContext::new(RecipientRestoringContext::new(local_identifiers.clone()));
		let mut report = PassReport::default();

		loop {
			let frame = match source.read_frame() {
				Ok(Some(frame)) => frame,
				Ok(None) => break,
				Err(e) if e.is_frame_local() => {
					warn!(?e, "Skipping undecodable frame;");
					report.record(
						RestoreFrameResult::<(), _>::failure(
							InvalidProtoDataError::UndecodableFrame,
							EmptyFrameId,
						)
						.into_outcome(),
					);

					if self.config.fail_on_frame_errors {
						let count = report.failure_count();
						return Ok((report, Some(Error::FrameErrors { stage: "Frame", count })));
					}

					continue;
				}
				Err(e) => return Ok((report, Some(e.into()))),
			};

			tx.savepoint()?;

			let outcome = match self.restore_frame(&frame, &mut context, tx) {
				Ok(outcome) => outcome,
				Err(e) => {
					tx.rollback_to_savepoint()?;
					return Ok((report, Some(e.into())));
				}
			};

			let failed = outcome.is_failure();
			if failed {
				tx.rollback_to_savepoint()?;
			} else {
				tx.release_savepoint()?;
			}
			report.record(outcome);

			if failed && self.config.fail_on_frame_errors {
				let stage = frame.item.as_ref().map_or("Frame", FrameItem::kind);
				let count = report.failure_count();
				return Ok((report, Some(Error::FrameErrors { stage, count })));
			}
		}

		Ok((report, None))
	}

	fn restore_frame(
		&self,
		frame: &Frame,
		context: &mut ChatRestoringContext,
		tx: &mut dyn WriteTx,
	) -> Result<FrameOutcome, StoreError> {
		let Some(item) = &frame.item else {
			return Ok(RestoreFrameResult::<(), _>::failure(
				InvalidProtoDataError::FrameMissingItem,
				EmptyFrameId,
			)
			.into_outcome());
		};

		Ok(match item {
			FrameItem::Recipient(recipient) => self
				.recipient_archiver
				.restore(recipient, context.recipient_context_mut(), tx)?
				.into_outcome(),
			FrameItem::Chat(chat) => self.chat_archiver.restore(chat, context, tx)?.into_outcome(),
			FrameItem::ChatItem(chat_item) => self
				.chat_item_archiver
				.restore(chat_item, context, tx)?
				.into_outcome(),
		})
	}

	fn check_stage(&self, stage: &'static str, report: &PassReport) -> Result<(), Error> {
		if !self.config.fail_on_frame_errors || report.failure_count() == 0 {
			return Ok(());
		}

		report.log_frame_errors(self.config.max_logged_ids_per_error);

		Err(Error::FrameErrors {
			stage,
			count: report.failure_count(),
		})
	}

	/// Exports into a plaintext backup file at `path`, off the async runtime.
	pub async fn export_plaintext_backup(
		self: Arc<Self>,
		path: impl AsRef<Path>,
		local_identifiers: LocalIdentifiers,
	) -> Result<PassReport, Error> {
		let path = path.as_ref().to_path_buf();
		let span = Span::current();

		spawn_blocking(move || {
			span.in_scope(|| -> Result<PassReport, Error> {
				let file = File::create(&path).map_err(|e| FileIOError::from((&path, e)))?;
				let mut writer = FrameWriter::new(BufWriter::new(file));

				let report = self.export_backup(&mut writer, &local_identifiers)?;
				writer.finish()?;

				info!(path = %path.display(), "Backup written;");

				Ok(report)
			})
		})
		.await?
	}

	/// Imports the plaintext backup file at `path`, off the async runtime.
	pub async fn import_plaintext_backup(
		self: Arc<Self>,
		path: impl AsRef<Path>,
		local_identifiers: LocalIdentifiers,
	) -> Result<PassReport, Error> {
		let path = path.as_ref().to_path_buf();
		let span = Span::current();

		spawn_blocking(move || {
			span.in_scope(|| -> Result<PassReport, Error> {
				let file = File::open(&path).map_err(|e| FileIOError::from((&path, e)))?;
				let mut reader = FrameReader::new(BufReader::new(file));

				self.import_backup(&mut reader, &local_identifiers)
			})
		})
		.await?
	}
}
