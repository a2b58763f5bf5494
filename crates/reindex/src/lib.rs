//!
//! # Reindex
//!
//! Tracks entries that need periodic reindexing and lets any number of independent
//! worker processes claim batches of them without double processing, and without
//! losing entries to workers that crash halfway through.
//!
//! Two pieces share one [`EntryStore`]:
//! - The [`Ledger`], which producers feed with observations. Every save widens the
//!   entry's first/last seen watermarks, replaces its fields and re-arms the
//!   "needs indexing" marker, dropping any lease the entry carried;
//! - The [`Coordinator`], which workers use to lease batches of entries that need
//!   indexing, and to release them once indexed. A lease that is never released
//!   simply expires and the entries become claimable again;
//!
//! The [`Worker`] loop wires a [`Coordinator`] to your own [`Indexer`].
//!
//! ## Basic example
//!
//! ```
//! use sd_reindex::{Coordinator, Ledger, MemoryStore, Observation, SystemClock};
//!
//! use std::{sync::Arc, time::Duration};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sd_reindex::Error> {
//!     let store = Arc::new(MemoryStore::new());
//!     let ledger = Ledger::new(Arc::clone(&store), SystemClock);
//!     let coordinator = Coordinator::new(store, SystemClock);
//!
//!     ledger.initialize().await?;
//!     ledger
//!         .save(Observation::new("photo.jpg", serde_json::json!({ "size": 1024 })))
//!         .await?;
//!
//!     let claim = coordinator.claim(10, Duration::from_secs(30)).await?;
//!     assert_eq!(claim.len(), 1);
//!
//!     assert_eq!(coordinator.release(claim.job_id).await?, 1);
//!
//!     Ok(())
//! }
//! ```

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

mod clock;
mod config;
mod coordinator;
mod entry;
mod error;
mod ledger;
mod store;
mod worker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ReindexConfig;
pub use coordinator::{Claim, Coordinator};
pub use entry::{Entry, EntryId, JobId, LeaseState, LeaseStats, Observation, Timestamp};
pub use error::{ConfigError, Error, Result};
pub use ledger::Ledger;
pub use store::{EntryStore, MemoryStore, SqliteStore};
pub use worker::{Indexer, Outcome, Worker};
