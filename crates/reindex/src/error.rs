use std::path::Path;

use thiserror::Error;

use super::entry::EntryId;

#[derive(Debug, Error)]
pub enum Error {
	#[error("entry not found: <id='{0}'>")]
	NotFound(EntryId),

	/// Any failure talking to the backing store. Nothing here retries; calling
	/// the operation again later is always safe.
	#[error("entry store unavailable: {0}")]
	StoreUnavailable(#[from] sea_orm::DbErr),

	#[error(transparent)]
	Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to access config file <path='{}'>: {source}", .path.display())]
	Io {
		path: Box<Path>,
		#[source]
		source: std::io::Error,
	},
	#[error("failed to parse config file <path='{}'>: {source}", .path.display())]
	Parse {
		path: Box<Path>,
		#[source]
		source: serde_json::Error,
	},
	#[error("failed to serialize config: {0}")]
	Serialize(#[source] serde_json::Error),
}

impl ConfigError {
	pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
		Self::Io {
			path: path.as_ref().into(),
			source,
		}
	}

	pub(crate) fn parse(path: impl AsRef<Path>, source: serde_json::Error) -> Self {
		Self::Parse {
			path: path.as_ref().into(),
			source,
		}
	}
}
