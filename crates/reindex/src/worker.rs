//! Consumer side of the claim protocol: claim a batch, index it, release it.

use std::{error::Error as StdError, time::Duration};

use async_trait::async_trait;
use tokio::{sync::watch, time::sleep};
use tracing::{debug, error, info, instrument, warn};

use super::{
	clock::Clock,
	config::ReindexConfig,
	coordinator::{Claim, Coordinator},
	entry::JobId,
	error::Result,
	store::EntryStore,
};

/// Does the actual indexing work for a claimed batch.
///
/// Side effects must be safe to repeat: a batch whose lease expires before it
/// is released will be handed out again.
#[async_trait]
pub trait Indexer: Send + Sync + 'static {
	type Error: StdError + Send + Sync + 'static;

	async fn index(&self, claim: &Claim) -> std::result::Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
	/// Nothing was claimable.
	Idle,
	Indexed { job_id: JobId, count: usize },
	/// The indexer failed; the lease is left to expire.
	Failed { job_id: JobId, count: usize },
}

pub struct Worker<S, C, I> {
	coordinator: Coordinator<S, C>,
	indexer: I,
	batch_size: u64,
	lease_duration: Duration,
	idle_backoff: Duration,
}

impl<S: EntryStore, C: Clock, I: Indexer> Worker<S, C, I> {
	pub fn new(coordinator: Coordinator<S, C>, indexer: I, config: &ReindexConfig) -> Self {
		Self {
			coordinator,
			indexer,
			batch_size: config.batch_size,
			lease_duration: config.lease(),
			idle_backoff: config.backoff(),
		}
	}

	pub const fn indexer(&self) -> &I {
		&self.indexer
	}

	#[instrument(skip(self), err)]
	pub async fn run_once(&self) -> Result<Outcome> {
		let claim = self
			.coordinator
			.claim(self.batch_size, self.lease_duration)
			.await?;

		if claim.is_empty() {
			return Ok(Outcome::Idle);
		}

		let job_id = claim.job_id;
		let count = claim.len();

		if let Err(e) = self.indexer.index(&claim).await {
			warn!(%job_id, count, ?e, "Indexer failed, leaving lease to expire");
			return Ok(Outcome::Failed { job_id, count });
		}

		let released = self.coordinator.release(job_id).await?;
		if usize::try_from(released).unwrap_or(usize::MAX) < count {
			// Some entries were re-observed while we worked, they stay pending
			debug!(%job_id, count, released, "Part of the batch was re-armed during indexing");
		}

		Ok(Outcome::Indexed { job_id, count })
	}

	/// Keeps processing batches until `shutdown` flips to `true` or its sender is dropped.
	pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
		info!(
			batch_size = self.batch_size,
			lease_duration = ?self.lease_duration,
			"Reindex worker started"
		);

		loop {
			// A dropped sender never flips the value, only `has_changed` reports it
			if shutdown.has_changed().is_err() {
				break;
			}

			let stop = *shutdown.borrow_and_update();
			if stop {
				break;
			}

			let back_off = match self.run_once().await {
				Ok(Outcome::Indexed { .. }) => false,
				Ok(Outcome::Idle | Outcome::Failed { .. }) => true,
				Err(e) => {
					error!(?e, "Reindex worker iteration failed");
					true
				}
			};

			if back_off {
				debug!(backoff = ?self.idle_backoff, "Backing off");
				tokio::select! {
					() = sleep(self.idle_backoff) => {}
					res = shutdown.changed() => {
						if res.is_err() {
							break;
						}
					}
				}
			}
		}

		info!("Reindex worker stopped");
	}
}
