#![allow(dead_code)]

use sd_reindex::{
	Coordinator, EntryStore, Ledger, ManualClock, MemoryStore, SqliteStore, Timestamp,
};

use std::{sync::Arc, time::Duration};

use tempfile::TempDir;

pub type DynStore = Arc<dyn EntryStore>;

pub struct Harness {
	pub backend: &'static str,
	pub store: DynStore,
	pub clock: ManualClock,
	pub ledger: Ledger<DynStore, ManualClock>,
	pub coordinator: Coordinator<DynStore, ManualClock>,
	_data_dir: Option<TempDir>,
}

impl Harness {
	async fn new(backend: &'static str, store: DynStore, data_dir: Option<TempDir>) -> Self {
		let clock = ManualClock::starting_at(Timestamp::from_millis(0));
		let ledger = Ledger::new(Arc::clone(&store), clock.clone());
		let coordinator = Coordinator::new(Arc::clone(&store), clock.clone());

		ledger.initialize().await.unwrap();

		Self {
			backend,
			store,
			clock,
			ledger,
			coordinator,
			_data_dir: data_dir,
		}
	}

	pub async fn memory() -> Self {
		Self::new("memory", Arc::new(MemoryStore::new()), None).await
	}

	pub async fn sqlite() -> Self {
		let data_dir = tempfile::tempdir().unwrap();
		let store = SqliteStore::open(data_dir.path().join("entries.db"))
			.await
			.unwrap();

		Self::new("sqlite", Arc::new(store), Some(data_dir)).await
	}

	/// One harness per store implementation.
	pub async fn all() -> Vec<Self> {
		vec![Self::memory().await, Self::sqlite().await]
	}

	pub fn at_secs(&self, secs: u64) {
		self.clock
			.set(Timestamp::from_millis(0) + Duration::from_secs(secs));
	}
}

pub fn secs(secs: u64) -> Timestamp {
	Timestamp::from_millis(0) + Duration::from_secs(secs)
}
