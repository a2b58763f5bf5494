//! Backing store contract shared by the ledger and the claim coordinator.
//!
//! Every method is one round trip to the store and each document is updated
//! atomically on its own. Nothing here spans documents transactionally.

use std::sync::Arc;

use async_trait::async_trait;

use super::{
	entry::{Entry, EntryId, JobId, LeaseStats, Observation, Timestamp},
	error::Result,
};

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait EntryStore: Send + Sync + 'static {
	/// Creates lookup structures. Safe to call any number of times.
	async fn initialize(&self) -> Result<()>;

	/// Inserts new entries and merges into existing ones, per document atomically.
	///
	/// See [`Entry::merge`] for the merge rules every implementation follows.
	async fn upsert(&self, observations: Vec<Observation>, now: Timestamp) -> Result<()>;

	/// Point reads; ids that don't exist are skipped.
	async fn find(&self, ids: &[EntryId]) -> Result<Vec<Entry>>;

	/// Tags up to `count` claimable entries with `job_id` in a single conditional
	/// update and returns how many were tagged.
	///
	/// Eligibility is evaluated per document at apply time, never from an earlier read.
	async fn assign_lease(
		&self,
		job_id: JobId,
		count: u64,
		now: Timestamp,
		timeout: Timestamp,
	) -> Result<u64>;

	async fn find_by_job(&self, job_id: JobId) -> Result<Vec<Entry>>;

	/// Clears the requirement and lease fields on entries still tagged with `job_id`.
	async fn clear_lease(&self, job_id: JobId) -> Result<u64>;

	/// Moves the timeout of unexpired leases held by `job_id` to `timeout`.
	async fn extend_lease(&self, job_id: JobId, now: Timestamp, timeout: Timestamp)
		-> Result<u64>;

	async fn count_states(&self, now: Timestamp) -> Result<LeaseStats>;
}

#[async_trait]
impl<S: EntryStore + ?Sized> EntryStore for Arc<S> {
	async fn initialize(&self) -> Result<()> {
		(**self).initialize().await
	}

	async fn upsert(&self, observations: Vec<Observation>, now: Timestamp) -> Result<()> {
		(**self).upsert(observations, now).await
	}

	async fn find(&self, ids: &[EntryId]) -> Result<Vec<Entry>> {
		(**self).find(ids).await
	}

	async fn assign_lease(
		&self,
		job_id: JobId,
		count: u64,
		now: Timestamp,
		timeout: Timestamp,
	) -> Result<u64> {
		(**self).assign_lease(job_id, count, now, timeout).await
	}

	async fn find_by_job(&self, job_id: JobId) -> Result<Vec<Entry>> {
		(**self).find_by_job(job_id).await
	}

	async fn clear_lease(&self, job_id: JobId) -> Result<u64> {
		(**self).clear_lease(job_id).await
	}

	async fn extend_lease(
		&self,
		job_id: JobId,
		now: Timestamp,
		timeout: Timestamp,
	) -> Result<u64> {
		(**self).extend_lease(job_id, now, timeout).await
	}

	async fn count_states(&self, now: Timestamp) -> Result<LeaseStats> {
		(**self).count_states(now).await
	}
}
