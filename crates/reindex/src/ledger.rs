use tracing::{debug, instrument};

use super::{
	clock::Clock,
	entry::{Entry, EntryId, Observation},
	error::{Error, Result},
	store::EntryStore,
};

/// Records entry observations and keeps their watermarks and indexing marker right.
///
/// Every save re-requires indexing and drops whatever lease the entry carried,
/// even if the descriptive fields didn't change.
#[derive(Debug, Clone)]
pub struct Ledger<S, C> {
	store: S,
	clock: C,
}

impl<S: EntryStore, C: Clock> Ledger<S, C> {
	pub const fn new(store: S, clock: C) -> Self {
		Self { store, clock }
	}

	pub async fn initialize(&self) -> Result<()> {
		self.store.initialize().await
	}

	pub async fn save(&self, observation: Observation) -> Result<()> {
		self.save_many(vec![observation]).await
	}

	#[instrument(skip_all, fields(count = observations.len()), err)]
	pub async fn save_many(&self, observations: Vec<Observation>) -> Result<()> {
		if observations.is_empty() {
			return Ok(());
		}

		let now = self.clock.now();
		let count = observations.len();

		self.store.upsert(observations, now).await?;

		debug!(count, %now, "Saved entry observations");

		Ok(())
	}

	pub async fn load(&self, id: &str) -> Result<Entry> {
		self.store
			.find(&[id.to_string()])
			.await?
			.pop()
			.ok_or_else(|| Error::NotFound(id.to_string()))
	}

	/// Missing ids are left out of the result.
	pub async fn load_many(&self, ids: &[EntryId]) -> Result<Vec<Entry>> {
		self.store.find(ids).await
	}
}
