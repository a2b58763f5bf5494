use std::collections::{hash_map::Entry as MapEntry, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
	entry::{Entry, EntryId, JobId, LeaseStats, Observation, Timestamp},
	error::Result,
};

use super::EntryStore;

/// Process local store. One lock guards every document, which makes each
/// call trivially atomic; good for tests and for embedding in a single process.
#[derive(Debug, Default)]
pub struct MemoryStore {
	entries: Mutex<HashMap<EntryId, Entry>>,
}

impl MemoryStore {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl EntryStore for MemoryStore {
	async fn initialize(&self) -> Result<()> {
		Ok(())
	}

	async fn upsert(&self, observations: Vec<Observation>, now: Timestamp) -> Result<()> {
		let mut entries = self.entries.lock().await;

		for observation in observations {
			match entries.entry(observation.id.clone()) {
				MapEntry::Occupied(mut occupied) => occupied.get_mut().merge(observation, now),
				MapEntry::Vacant(vacant) => {
					vacant.insert(Entry::observed(observation, now));
				}
			}
		}

		Ok(())
	}

	async fn find(&self, ids: &[EntryId]) -> Result<Vec<Entry>> {
		let entries = self.entries.lock().await;

		Ok(ids.iter().filter_map(|id| entries.get(id).cloned()).collect())
	}

	async fn assign_lease(
		&self,
		job_id: JobId,
		count: u64,
		now: Timestamp,
		timeout: Timestamp,
	) -> Result<u64> {
		let mut entries = self.entries.lock().await;

		let mut assigned = 0;
		for entry in entries
			.values_mut()
			.filter(|entry| entry.is_claimable(now))
			.take(usize::try_from(count).unwrap_or(usize::MAX))
		{
			entry.lease(job_id, timeout);
			assigned += 1;
		}

		Ok(assigned)
	}

	async fn find_by_job(&self, job_id: JobId) -> Result<Vec<Entry>> {
		Ok(self
			.entries
			.lock()
			.await
			.values()
			.filter(|entry| entry.is_held_by(job_id))
			.cloned()
			.collect())
	}

	async fn clear_lease(&self, job_id: JobId) -> Result<u64> {
		let mut entries = self.entries.lock().await;

		let mut cleared = 0;
		for entry in entries.values_mut().filter(|entry| entry.is_held_by(job_id)) {
			entry.finish();
			cleared += 1;
		}

		Ok(cleared)
	}

	async fn extend_lease(
		&self,
		job_id: JobId,
		now: Timestamp,
		timeout: Timestamp,
	) -> Result<u64> {
		let mut entries = self.entries.lock().await;

		let mut extended = 0;
		for entry in entries
			.values_mut()
			.filter(|entry| entry.is_held_by(job_id) && !entry.is_claimable(now))
		{
			entry.lease(job_id, timeout);
			extended += 1;
		}

		Ok(extended)
	}

	async fn count_states(&self, now: Timestamp) -> Result<LeaseStats> {
		let entries = self.entries.lock().await;

		let mut stats = LeaseStats::default();
		for entry in entries.values() {
			stats.record(entry.lease_state(now));
		}

		Ok(stats)
	}
}
