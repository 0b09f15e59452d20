//! Settings of the backup engine, persisted next to the data they apply to.

use std::{
	fs,
	path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const CONFIG_FILE_NAME: &str = "message_backup.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBackupConfig {
	/// Config schema version
	pub version: u32,

	/// Turns every message failure into a fatal error at the end of the stage that produced it.
	#[serde(default)]
	pub fail_on_frame_errors: bool,

	/// When off, link previews are dropped on both passes.
	#[serde(default = "default_true")]
	pub link_previews_enabled: bool,

	/// How many offending ids are logged for each distinct frame error.
	#[serde(default = "default_max_logged_ids")]
	pub max_logged_ids_per_error: usize,

	#[serde(skip)]
	data_dir: PathBuf,
}

const fn default_true() -> bool {
	true
}

const fn default_max_logged_ids() -> usize {
	5
}

impl Default for MessageBackupConfig {
	fn default() -> Self {
		Self::default_with_dir(PathBuf::new())
	}
}

impl MessageBackupConfig {
	#[must_use]
	pub const fn target_version() -> u32 {
		1
	}

	#[must_use]
	pub fn default_with_dir(data_dir: PathBuf) -> Self {
		Self {
			version: Self::target_version(),
			fail_on_frame_errors: false,
			link_previews_enabled: default_true(),
			max_logged_ids_per_error: default_max_logged_ids(),
			data_dir,
		}
	}

	/// Loads the config stored in `data_dir`, writing the defaults there if there is none yet.
	pub fn load_from(data_dir: impl AsRef<Path>) -> Result<Self> {
		let data_dir = data_dir.as_ref();
		let config_path = data_dir.join(CONFIG_FILE_NAME);

		if !config_path.exists() {
			warn!(path = %config_path.display(), "No config found, creating default;");
			let config = Self::default_with_dir(data_dir.to_path_buf());
			config.save()?;
			return Ok(config);
		}

		info!(path = %config_path.display(), "Loading config;");
		let json = fs::read_to_string(&config_path)
			.with_context(|| format!("failed to read '{}'", config_path.display()))?;
		let mut config = serde_json::from_str::<Self>(&json)
			.with_context(|| format!("failed to parse '{}'", config_path.display()))?;
		config.data_dir = data_dir.to_path_buf();

		if config.version < Self::target_version() {
			info!(
				from = config.version,
				to = Self::target_version(),
				"Migrating config;"
			);
			config.migrate()?;
			config.save()?;
		}

		Ok(config)
	}

	pub fn save(&self) -> Result<()> {
		fs::create_dir_all(&self.data_dir)?;

		let config_path = self.data_dir.join(CONFIG_FILE_NAME);
		fs::write(&config_path, serde_json::to_string_pretty(self)?)
			.with_context(|| format!("failed to write '{}'", config_path.display()))?;

		Ok(())
	}

	#[must_use]
	pub fn data_dir(&self) -> &Path {
		&self.data_dir
	}

	fn migrate(&mut self) -> Result<()> {
		match self.version {
			0 => {
				// v0 had no strictness setting and always logged every id.
				self.fail_on_frame_errors = false;
				self.max_logged_ids_per_error = default_max_logged_ids();
				self.version = 1;
			}
			v if v >= Self::target_version() => {}
			v => bail!("unknown config version: {v}"),
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use tempfile::tempdir;

	#[test]
	fn creates_defaults_and_reads_them_back() {
		let dir = tempdir().unwrap();

		let created = MessageBackupConfig::load_from(dir.path()).unwrap();
		assert!(dir.path().join(CONFIG_FILE_NAME).exists());
		assert!(!created.fail_on_frame_errors);
		assert!(created.link_previews_enabled);
		assert_eq!(created.max_logged_ids_per_error, 5);

		let mut strict = created;
		strict.fail_on_frame_errors = true;
		strict.save().unwrap();

		let loaded = MessageBackupConfig::load_from(dir.path()).unwrap();
		assert!(loaded.fail_on_frame_errors);
		assert_eq!(loaded.data_dir(), dir.path());
	}

	#[test]
	fn old_configs_are_migrated() {
		let dir = tempdir().unwrap();
		fs::write(
			dir.path().join(CONFIG_FILE_NAME),
			r#"{ "version": 0, "max_logged_ids_per_error": 1000 }"#,
		)
		.unwrap();

		let config = MessageBackupConfig::load_from(dir.path()).unwrap();
		assert_eq!(config.version, MessageBackupConfig::target_version());
		assert_eq!(config.max_logged_ids_per_error, 5);
		assert!(config.link_previews_enabled);

		let json = fs::read_to_string(dir.path().join(CONFIG_FILE_NAME)).unwrap();
		assert!(json.contains("\"version\": 1"));
	}
}
