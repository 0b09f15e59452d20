#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

//! Wire format of a message backup.
//!
//! A backup is a linear sequence of [`Frame`]s preceded by a [`BackupInfo`] header. Every frame
//! carries exactly one entity; entities reference each other only through ids that were defined
//! by an earlier frame of the same stream.

mod chat;
mod chat_item;
mod error;
mod frame;
mod recipient;
mod stream;

pub use chat::*;
pub use chat_item::*;
pub use error::StreamError;
pub use frame::*;
pub use recipient::*;
pub use stream::{FrameReader, FrameSink, FrameSource, FrameWriter, MemoryStream, MAX_FRAME_LEN};
