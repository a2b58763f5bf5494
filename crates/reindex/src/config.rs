//! Tunables for the ledger, the claim coordinator and the worker loop

use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::{ConfigError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReindexConfig {
	/// SeaORM connection url for the entry store
	pub database_url: String,

	/// Maximum number of entries a worker claims at once
	pub batch_size: u64,

	/// Lease duration in seconds
	pub lease_duration: u64,

	/// How long a worker sleeps after an empty claim or a store error, in milliseconds
	pub idle_backoff: u64,
}

impl ReindexConfig {
	pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();

		if path.exists() {
			info!(path = %path.display(), "Loading reindex config");
			let json = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
			Ok(serde_json::from_str(&json).map_err(|e| ConfigError::parse(path, e))?)
		} else {
			warn!(path = %path.display(), "No reindex config found, creating default");
			let config = Self::default();
			config.save(path)?;
			Ok(config)
		}
	}

	pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
		let path = path.as_ref();

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
		}

		let json = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
		fs::write(path, json).map_err(|e| ConfigError::io(path, e))?;

		Ok(())
	}

	#[must_use]
	pub const fn lease(&self) -> Duration {
		Duration::from_secs(self.lease_duration)
	}

	#[must_use]
	pub const fn backoff(&self) -> Duration {
		Duration::from_millis(self.idle_backoff)
	}
}

impl Default for ReindexConfig {
	fn default() -> Self {
		Self {
			database_url: "sqlite://entries.db?mode=rwc".to_string(),
			batch_size: 100,
			lease_duration: 300,
			idle_backoff: 5_000,
		}
	}
}

#[cfg(test)]
mod tests {
	use tempfile::tempdir;

	use super::*;

	#[test]
	fn creates_default_then_reads_it_back() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("nested").join("reindex.json");

		let created = ReindexConfig::load_from(&path).unwrap();
		assert!(path.exists());
		assert_eq!(created, ReindexConfig::default());

		let custom = ReindexConfig {
			batch_size: 7,
			..created
		};
		custom.save(&path).unwrap();

		assert_eq!(ReindexConfig::load_from(&path).unwrap(), custom);
	}

	#[test]
	fn missing_keys_take_defaults() {
		let config: ReindexConfig = serde_json::from_str(r#"{ "lease_duration": 30 }"#).unwrap();

		assert_eq!(config.lease(), Duration::from_secs(30));
		assert_eq!(config.batch_size, 100);
		assert_eq!(config.backoff(), Duration::from_secs(5));
	}

	#[test]
	fn broken_file_is_a_parse_error() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("reindex.json");
		fs::write(&path, "{ not json").unwrap();

		assert!(matches!(
			ReindexConfig::load_from(&path),
			Err(crate::Error::Config(ConfigError::Parse { .. }))
		));
	}
}
