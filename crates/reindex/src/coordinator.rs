use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use super::{
	clock::Clock,
	entry::{Entry, JobId, LeaseStats},
	error::Result,
	store::EntryStore,
};

/// A batch of entries leased to one job.
///
/// An empty batch is not a failure, it just means nothing was claimable right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
	pub job_id: JobId,
	pub entries: Vec<Entry>,
}

impl Claim {
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.entries.len()
	}
}

/// Hands out exclusive, time bounded leases over entries that need indexing.
///
/// Losing a race for an entry is silent: the loser simply doesn't get it back.
/// Leases are never failed explicitly, a worker that dies just lets them expire.
#[derive(Debug, Clone)]
pub struct Coordinator<S, C> {
	store: S,
	clock: C,
}

impl<S: EntryStore, C: Clock> Coordinator<S, C> {
	pub const fn new(store: S, clock: C) -> Self {
		Self { store, clock }
	}

	#[instrument(skip(self), err)]
	pub async fn claim(&self, count: u64, lease_duration: Duration) -> Result<Claim> {
		let job_id = JobId::new();

		if count == 0 {
			return Ok(Claim {
				job_id,
				entries: vec![],
			});
		}

		let now = self.clock.now();
		let timeout = now + lease_duration;

		let assigned = self
			.store
			.assign_lease(job_id, count, now, timeout)
			.await?;

		// Read back rather than trusting `assigned`, a concurrent save may have
		// already taken some of these away from us
		let entries = self.store.find_by_job(job_id).await?;

		debug!(
			%job_id,
			assigned,
			claimed = entries.len(),
			%timeout,
			"Claimed entries for indexing"
		);

		Ok(Claim { job_id, entries })
	}

	/// Marks every entry still held by `job_id` as indexed. Releasing twice, or
	/// after the lease was lost, just touches fewer entries.
	#[instrument(skip(self), fields(%job_id), err)]
	pub async fn release(&self, job_id: JobId) -> Result<u64> {
		let released = self.store.clear_lease(job_id).await?;

		if released == 0 {
			trace!(%job_id, "Nothing left to release");
		} else {
			debug!(%job_id, released, "Released indexing lease");
		}

		Ok(released)
	}

	/// Pushes the timeout of a still valid lease to `now + lease_duration`.
	///
	/// Expired leases are not revived since they may already belong to someone else.
	#[instrument(skip(self), fields(%job_id), err)]
	pub async fn renew(&self, job_id: JobId, lease_duration: Duration) -> Result<u64> {
		let now = self.clock.now();

		let renewed = self
			.store
			.extend_lease(job_id, now, now + lease_duration)
			.await?;

		trace!(%job_id, renewed, "Renewed indexing lease");

		Ok(renewed)
	}

	pub async fn stats(&self) -> Result<LeaseStats> {
		self.store.count_states(self.clock.now()).await
	}
}
