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

//! Archive and restore engine for message backups.
//!
//! An archive pass walks the local store in dependency order (recipients, then chats, then chat
//! items) and writes one frame per entity, replacing local primary keys with ids that are only
//! meaningful inside the stream. A restore pass reads those frames back in order, resolving every
//! id against the frames that came before it.
//!
//! Entities that can't be converted never stop a pass; they are recorded in a [`PassReport`].

pub mod archivers;
pub mod attachment;
pub mod config;
pub mod context;
pub mod error;
pub mod identifiers;
pub mod ids;
pub mod manager;
pub mod report;
pub mod result;
pub mod store;

pub use config::MessageBackupConfig;
pub use error::{Error, FatalArchivingError, FileIOError};
pub use identifiers::{Aci, ContactAddress, DistributionId, GroupId, LocalIdentifiers, Pni, E164};
pub use ids::{ChatId, ChatItemId, RecipientId, LOCAL_RECIPIENT_ID};
pub use manager::{DateProvider, MessageBackupManager, SystemDateProvider};
pub use report::{FrameErrorRecord, FrameOutcome, PassReport};
