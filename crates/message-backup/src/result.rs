use std::ops::ControlFlow;

use crate::{
	error::{ArchiveFrameError, RestoreFrameError, RestoreFrameErrorKind},
	ids::{InteractionUniqueId, LoggableId},
	report::FrameOutcome,
};

/// Known obsolete local states that are dropped from backups on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::IntoStaticStr)]
pub enum SkippableChatUpdate {
	LegacyInfoMessage(LegacyInfoMessageType),
	/// Group updates from before updates were modeled, stored only as rendered text.
	LegacyGroupUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::IntoStaticStr)]
pub enum LegacyInfoMessageType {
	ThreadMergeWithoutPhoneNumber,
	SessionSwitchoverWithoutPhoneNumber,
	SyncedThread,
	UnsupportedMessage,
}

impl SkippableChatUpdate {
	#[must_use]
	pub fn log_label(&self) -> String {
		match self {
			Self::LegacyInfoMessage(kind) => {
				format!("LegacyInfoMessage.{}", <&'static str>::from(kind))
			}
			Self::LegacyGroupUpdate => "LegacyGroupUpdate".to_string(),
		}
	}
}

pub type InteractionArchiveError = ArchiveFrameError<InteractionUniqueId>;

/// Outcome of archiving one interaction.
#[derive(Debug)]
pub enum ArchiveInteractionResult<T> {
	Success(T),
	/// The frame can be written, but parts of it were dropped.
	PartialFailure(T, Vec<InteractionArchiveError>),
	SkippableChatUpdate(SkippableChatUpdate),
	MessageFailure(Vec<InteractionArchiveError>),
}

impl<T> ArchiveInteractionResult<T> {
	#[track_caller]
	pub fn failure(
		kind: impl Into<crate::error::ArchiveFrameErrorKind>,
		id: &InteractionUniqueId,
	) -> Self {
		Self::MessageFailure(vec![ArchiveFrameError::new(kind, id.clone())])
	}

	#[must_use]
	pub fn with_partial_errors(value: T, errors: Vec<InteractionArchiveError>) -> Self {
		if errors.is_empty() {
			Self::Success(value)
		} else {
			Self::PartialFailure(value, errors)
		}
	}

	/// Moves partial errors into `partial_errors` and yields the value, or stops with a result
	/// that carries every error collected so far.
	pub fn bubble_up<U>(
		self,
		partial_errors: &mut Vec<InteractionArchiveError>,
	) -> ControlFlow<ArchiveInteractionResult<U>, T> {
		match self {
			Self::Success(value) => ControlFlow::Continue(value),
			Self::PartialFailure(value, errors) => {
				partial_errors.extend(errors);
				ControlFlow::Continue(value)
			}
			Self::SkippableChatUpdate(reason) => {
				ControlFlow::Break(ArchiveInteractionResult::SkippableChatUpdate(reason))
			}
			Self::MessageFailure(errors) => {
				partial_errors.extend(errors);
				ControlFlow::Break(ArchiveInteractionResult::MessageFailure(std::mem::take(
					partial_errors,
				)))
			}
		}
	}

	pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ArchiveInteractionResult<U> {
		match self {
			Self::Success(value) => ArchiveInteractionResult::Success(f(value)),
			Self::PartialFailure(value, errors) => {
				ArchiveInteractionResult::PartialFailure(f(value), errors)
			}
			Self::SkippableChatUpdate(reason) => {
				ArchiveInteractionResult::SkippableChatUpdate(reason)
			}
			Self::MessageFailure(errors) => ArchiveInteractionResult::MessageFailure(errors),
		}
	}

	/// Splits into the value to write, if any, and what to record for it.
	pub fn into_parts(self) -> (Option<T>, FrameOutcome) {
		match self {
			Self::Success(value) => (Some(value), FrameOutcome::Success),
			Self::PartialFailure(value, errors) => (
				Some(value),
				FrameOutcome::PartialSuccess(errors.into_iter().map(Into::into).collect()),
			),
			Self::SkippableChatUpdate(reason) => (None, FrameOutcome::Skipped(reason)),
			Self::MessageFailure(errors) => (
				None,
				FrameOutcome::Failure(errors.into_iter().map(Into::into).collect()),
			),
		}
	}
}

/// Outcome of restoring one frame.
#[derive(Debug)]
pub enum RestoreFrameResult<T, Id> {
	Success(T),
	/// The local entity was written, but parts of the frame were dropped.
	PartialRestore(T, Vec<RestoreFrameError<Id>>),
	/// Nothing was written for this frame.
	Failure(Vec<RestoreFrameError<Id>>),
}

impl<T, Id: LoggableId> RestoreFrameResult<T, Id> {
	#[track_caller]
	pub fn failure(kind: impl Into<RestoreFrameErrorKind>, id: Id) -> Self {
		Self::Failure(vec![RestoreFrameError::new(kind, id)])
	}

	#[must_use]
	pub fn with_partial_errors(value: T, errors: Vec<RestoreFrameError<Id>>) -> Self {
		if errors.is_empty() {
			Self::Success(value)
		} else {
			Self::PartialRestore(value, errors)
		}
	}

	pub fn bubble_up<U>(
		self,
		partial_errors: &mut Vec<RestoreFrameError<Id>>,
	) -> ControlFlow<RestoreFrameResult<U, Id>, T> {
		match self {
			Self::Success(value) => ControlFlow::Continue(value),
			Self::PartialRestore(value, errors) => {
				partial_errors.extend(errors);
				ControlFlow::Continue(value)
			}
			Self::Failure(errors) => {
				partial_errors.extend(errors);
				ControlFlow::Break(RestoreFrameResult::Failure(std::mem::take(partial_errors)))
			}
		}
	}

	pub fn into_outcome(self) -> FrameOutcome {
		match self {
			Self::Success(_) => FrameOutcome::Success,
			Self::PartialRestore(_, errors) => {
				FrameOutcome::PartialSuccess(errors.into_iter().map(Into::into).collect())
			}
			Self::Failure(errors) => {
				FrameOutcome::Failure(errors.into_iter().map(Into::into).collect())
			}
		}
	}
}

/// Unwraps an [`ArchiveInteractionResult`] or a [`RestoreFrameResult`], collecting partial
/// errors. Skips and failures return early as `Ok(result)`.
macro_rules! bubble_up {
	($result:expr, $partial_errors:expr) => {
		match $result.bubble_up($partial_errors) {
			::std::ops::ControlFlow::Continue(value) => value,
			::std::ops::ControlFlow::Break(result) => return Ok(result),
		}
	};
}

pub(crate) use bubble_up;

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		error::{ArchiveFrameErrorKind, IdentifierNotFound, MissingFieldError},
		ids::{ChatId, RecipientId},
	};

	fn archive_error() -> InteractionArchiveError {
		ArchiveFrameError::new(
			ArchiveFrameErrorKind::InvalidLocalData(MissingFieldError::new("row_id")),
			InteractionUniqueId("a".to_string()),
		)
	}

	fn partial_then_fail() -> Result<ArchiveInteractionResult<u32>, ()> {
		let mut partial_errors = vec![];

		let value = bubble_up!(
			ArchiveInteractionResult::PartialFailure(1_u32, vec![archive_error()]),
			&mut partial_errors
		);
		assert_eq!(value, 1);

		bubble_up!(
			ArchiveInteractionResult::<()>::MessageFailure(vec![archive_error()]),
			&mut partial_errors
		);

		Ok(ArchiveInteractionResult::Success(value))
	}

	#[test]
	fn failure_carries_earlier_partial_errors() {
		let Ok(ArchiveInteractionResult::MessageFailure(errors)) = partial_then_fail() else {
			panic!("expected a failure");
		};

		assert_eq!(errors.len(), 2);
	}

	#[test]
	fn partial_restore_only_with_errors() {
		let ok = RestoreFrameResult::<_, ChatId>::with_partial_errors((), vec![]);
		assert!(matches!(ok, RestoreFrameResult::Success(())));

		let partial = RestoreFrameResult::with_partial_errors(
			(),
			vec![RestoreFrameError::new(
				IdentifierNotFound::RecipientId(RecipientId(9)),
				ChatId(1),
			)],
		);
		assert!(matches!(
			partial.into_outcome(),
			FrameOutcome::PartialSuccess(errors) if errors.len() == 1
		));
	}
}
