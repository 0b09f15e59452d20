use std::collections::BTreeMap;

use itertools::Itertools;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
	error::{ArchiveFrameError, RestoreFrameError},
	ids::LoggableId,
	result::SkippableChatUpdate,
};

/// Type erased frame error, kept for the pass report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameErrorRecord {
	pub id_type: &'static str,
	pub id: String,
	/// Variant path of the error, identical errors share it.
	pub kind: String,
	pub message: String,
	pub file: &'static str,
	pub line: u32,
}

impl<Id: LoggableId> From<RestoreFrameError<Id>> for FrameErrorRecord {
	fn from(error: RestoreFrameError<Id>) -> Self {
		Self {
			id_type: error.id.type_log_string(),
			id: error.id.id_log_string(),
			kind: error.kind.log_label(),
			message: error.kind.to_string(),
			file: error.location.file(),
			line: error.location.line(),
		}
	}
}

impl<Id: LoggableId> From<ArchiveFrameError<Id>> for FrameErrorRecord {
	fn from(error: ArchiveFrameError<Id>) -> Self {
		Self {
			id_type: error.id.type_log_string(),
			id: error.id.id_log_string(),
			kind: error.kind.log_label(),
			message: error.kind.to_string(),
			file: error.location.file(),
			line: error.location.line(),
		}
	}
}

/// What happened to a single frame or local entity.
#[derive(Debug)]
pub enum FrameOutcome {
	Success,
	PartialSuccess(Vec<FrameErrorRecord>),
	Skipped(SkippableChatUpdate),
	Failure(Vec<FrameErrorRecord>),
}

impl FrameOutcome {
	#[must_use]
	pub const fn is_failure(&self) -> bool {
		matches!(self, Self::Failure(_))
	}
}

/// Aggregated outcome of one archive or restore pass.
#[derive(Debug, Default, Clone, Serialize)]
pub struct PassReport {
	pub frames_processed: usize,
	pub successes: usize,
	pub partial_successes: usize,
	pub failures: usize,
	pub skipped: BTreeMap<String, usize>,
	pub errors: Vec<FrameErrorRecord>,
}

impl PassReport {
	pub fn record(&mut self, outcome: FrameOutcome) {
		self.frames_processed += 1;

		match outcome {
			FrameOutcome::Success => self.successes += 1,
			FrameOutcome::PartialSuccess(errors) => {
				self.partial_successes += 1;
				self.errors.extend(errors);
			}
			FrameOutcome::Skipped(reason) => {
				*self.skipped.entry(reason.log_label()).or_default() += 1;
			}
			FrameOutcome::Failure(errors) => {
				self.failures += 1;
				self.errors.extend(errors);
			}
		}
	}

	pub fn record_archive_failure<Id: LoggableId>(&mut self, error: ArchiveFrameError<Id>) {
		self.record(FrameOutcome::Failure(vec![error.into()]));
	}

	pub fn record_restore_failure<Id: LoggableId>(&mut self, error: RestoreFrameError<Id>) {
		self.record(FrameOutcome::Failure(vec![error.into()]));
	}

	/// Frames or entities that produced nothing.
	#[must_use]
	pub const fn failure_count(&self) -> usize {
		self.failures
	}

	#[must_use]
	pub fn skip_count(&self) -> usize {
		self.skipped.values().sum()
	}

	#[must_use]
	pub fn is_clean(&self) -> bool {
		self.failures == 0 && self.errors.is_empty()
	}

	/// Logs every distinct kind of error once, with how often it happened and the first few ids
	/// it happened for.
	pub fn log_frame_errors(&self, max_logged_ids: usize) {
		info!(
			frames_processed = self.frames_processed,
			successes = self.successes,
			partial_successes = self.partial_successes,
			failures = self.failures,
			skipped = self.skip_count(),
			"Backup pass finished;"
		);

		for ((kind, id_type), errors) in self
			.errors
			.iter()
			.into_group_map_by(|error| (error.kind.as_str(), error.id_type))
			.into_iter()
			.sorted_by_key(|(key, _)| *key)
		{
			let ids = errors
				.iter()
				.take(max_logged_ids)
				.map(|error| error.id.as_str())
				.join(", ");

			warn!(
				%kind,
				count = errors.len(),
				example = %errors[0].message,
				location = %format!("{}:{}", errors[0].file, errors[0].line),
				"Frame errors; {id_type}s: [{ids}]"
			);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		error::{IdentifierNotFound, InvalidProtoDataError},
		ids::{ChatId, RecipientId},
		result::LegacyInfoMessageType,
	};

	use tracing_test::traced_test;

	#[test]
	#[traced_test]
	fn identical_errors_are_logged_once() {
		let mut report = PassReport::default();

		for chat in 1..=10 {
			report.record_restore_failure(RestoreFrameError::new(
				IdentifierNotFound::RecipientId(RecipientId(99)),
				ChatId(chat),
			));
		}
		report.record_restore_failure(RestoreFrameError::new(
			InvalidProtoDataError::ChatIdNotSet,
			ChatId(0),
		));
		report.record(FrameOutcome::Skipped(SkippableChatUpdate::LegacyInfoMessage(
			LegacyInfoMessageType::SyncedThread,
		)));
		report.record(FrameOutcome::Success);

		assert_eq!(report.frames_processed, 13);
		assert_eq!(report.failure_count(), 11);
		assert_eq!(report.skip_count(), 1);
		assert!(!report.is_clean());

		report.log_frame_errors(3);

		assert!(logs_contain("IdentifierNotFound.RecipientId"));
		assert!(logs_contain("ChatIds: [1, 2, 3]"));
		assert!(logs_contain("InvalidProtoData.ChatIdNotSet"));
	}
}
