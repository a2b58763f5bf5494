use sd_reindex::{
	Claim, Coordinator, Indexer, JobId, LeaseState, Ledger, ManualClock, MemoryStore,
	Observation, Outcome, ReindexConfig, Timestamp, Worker,
};

use std::{
	sync::{
		atomic::{AtomicBool, AtomicUsize, Ordering},
		Arc, Mutex,
	},
	time::Duration,
};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::{sync::watch, time::timeout};
use tracing_test::traced_test;

#[derive(Debug, thiserror::Error)]
#[error("sample indexing failure")]
struct SampleError;

#[derive(Default)]
struct RecordingIndexer {
	fail: AtomicBool,
	batches: Mutex<Vec<(JobId, Vec<String>)>>,
}

impl RecordingIndexer {
	fn indexed(&self) -> Vec<String> {
		self.batches
			.lock()
			.unwrap()
			.iter()
			.flat_map(|(_, ids)| ids.clone())
			.collect()
	}
}

#[async_trait]
impl Indexer for RecordingIndexer {
	type Error = SampleError;

	async fn index(&self, claim: &Claim) -> Result<(), SampleError> {
		if self.fail.load(Ordering::SeqCst) {
			return Err(SampleError);
		}

		self.batches.lock().unwrap().push((
			claim.job_id,
			claim.entries.iter().map(|entry| entry.id.clone()).collect(),
		));

		Ok(())
	}
}

type SampleWorker = Worker<Arc<MemoryStore>, ManualClock, RecordingIndexer>;

fn setup(batch_size: u64) -> (Ledger<Arc<MemoryStore>, ManualClock>, ManualClock, SampleWorker) {
	let store = Arc::new(MemoryStore::new());
	let clock = ManualClock::starting_at(Timestamp::from_millis(0));

	let config = ReindexConfig {
		batch_size,
		lease_duration: 30,
		idle_backoff: 10,
		..Default::default()
	};

	let worker = Worker::new(
		Coordinator::new(Arc::clone(&store), clock.clone()),
		RecordingIndexer::default(),
		&config,
	);

	(Ledger::new(store, clock.clone()), clock, worker)
}

async fn seed(ledger: &Ledger<Arc<MemoryStore>, ManualClock>, count: usize) {
	ledger
		.save_many(
			(0..count)
				.map(|i| Observation::new(format!("entry-{i}"), json!({ "i": i })))
				.collect(),
		)
		.await
		.unwrap();
}

#[tokio::test]
#[traced_test]
async fn idle_when_nothing_to_do() {
	let (_ledger, _clock, worker) = setup(10);

	assert_eq!(worker.run_once().await.unwrap(), Outcome::Idle);
	assert!(worker.indexer().indexed().is_empty());
}

#[tokio::test]
#[traced_test]
async fn indexes_and_releases_in_batches() {
	let (ledger, _clock, worker) = setup(2);
	seed(&ledger, 3).await;

	let Outcome::Indexed { count, .. } = worker.run_once().await.unwrap() else {
		panic!("expected a processed batch");
	};
	assert_eq!(count, 2);

	let Outcome::Indexed { count, .. } = worker.run_once().await.unwrap() else {
		panic!("expected a processed batch");
	};
	assert_eq!(count, 1);

	assert_eq!(worker.run_once().await.unwrap(), Outcome::Idle);

	let mut indexed = worker.indexer().indexed();
	indexed.sort();
	assert_eq!(indexed, vec!["entry-0", "entry-1", "entry-2"]);

	for entry in ledger
		.load_many(&indexed)
		.await
		.unwrap()
	{
		assert_eq!(entry.lease_state(Timestamp::from_millis(0)), LeaseState::Idle);
	}
}

#[tokio::test]
#[traced_test]
async fn failed_batches_are_left_to_expire() {
	let (ledger, clock, worker) = setup(10);
	seed(&ledger, 2).await;

	worker.indexer().fail.store(true, Ordering::SeqCst);

	let Outcome::Failed { count, job_id } = worker.run_once().await.unwrap() else {
		panic!("expected a failed batch");
	};
	assert_eq!(count, 2);

	let entry = ledger.load("entry-0").await.unwrap();
	assert!(entry.is_held_by(job_id));

	// Still leased, nothing to pick up
	worker.indexer().fail.store(false, Ordering::SeqCst);
	assert_eq!(worker.run_once().await.unwrap(), Outcome::Idle);

	clock.advance(Duration::from_secs(30));

	let Outcome::Indexed { job_id: retry, count, .. } = worker.run_once().await.unwrap() else {
		panic!("expected the expired batch to be retried");
	};
	assert_ne!(retry, job_id);
	assert_eq!(count, 2);
}

#[tokio::test]
#[traced_test]
async fn run_drains_then_stops_on_shutdown() {
	let (ledger, _clock, worker) = setup(4);
	seed(&ledger, 10).await;

	let worker = Arc::new(worker);
	let (shutdown_tx, shutdown_rx) = watch::channel(false);

	let handle = tokio::spawn({
		let worker = Arc::clone(&worker);
		async move { worker.run(shutdown_rx).await }
	});

	timeout(Duration::from_secs(5), async {
		while worker.indexer().indexed().len() < 10 {
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
	})
	.await
	.unwrap();

	shutdown_tx.send(true).unwrap();
	timeout(Duration::from_secs(5), handle)
		.await
		.unwrap()
		.unwrap();

	assert_eq!(worker.indexer().indexed().len(), 10);
}

#[tokio::test]
#[traced_test]
async fn run_stops_when_shutdown_sender_is_dropped() {
	let (_ledger, _clock, worker) = setup(4);
	let (shutdown_tx, shutdown_rx) = watch::channel(false);

	let handle = tokio::spawn(async move { worker.run(shutdown_rx).await });

	drop(shutdown_tx);
	timeout(Duration::from_secs(5), handle)
		.await
		.unwrap()
		.unwrap();
}

/// Observes every entry again as soon as it is indexed, so there is always work.
struct RearmingIndexer {
	ledger: Ledger<Arc<MemoryStore>, ManualClock>,
	batches: AtomicUsize,
}

#[async_trait]
impl Indexer for RearmingIndexer {
	type Error = sd_reindex::Error;

	async fn index(&self, claim: &Claim) -> Result<(), Self::Error> {
		self.ledger
			.save_many(
				claim
					.entries
					.iter()
					.map(|entry| Observation::new(entry.id.clone(), entry.fields.clone()))
					.collect(),
			)
			.await?;

		self.batches.fetch_add(1, Ordering::SeqCst);

		Ok(())
	}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[traced_test]
async fn run_stops_when_shutdown_sender_is_dropped_while_busy() {
	let store = Arc::new(MemoryStore::new());
	let clock = ManualClock::starting_at(Timestamp::from_millis(0));
	let ledger = Ledger::new(Arc::clone(&store), clock.clone());
	seed(&ledger, 4).await;

	let worker = Arc::new(Worker::new(
		Coordinator::new(Arc::clone(&store), clock.clone()),
		RearmingIndexer {
			ledger,
			batches: AtomicUsize::new(0),
		},
		&ReindexConfig {
			batch_size: 2,
			lease_duration: 30,
			idle_backoff: 60_000,
			..Default::default()
		},
	));
	let (shutdown_tx, shutdown_rx) = watch::channel(false);

	let handle = tokio::spawn({
		let worker = Arc::clone(&worker);
		async move { worker.run(shutdown_rx).await }
	});

	timeout(Duration::from_secs(5), async {
		while worker.indexer().batches.load(Ordering::SeqCst) < 10 {
			tokio::time::sleep(Duration::from_millis(1)).await;
		}
	})
	.await
	.unwrap();

	drop(shutdown_tx);
	timeout(Duration::from_secs(5), handle)
		.await
		.unwrap()
		.unwrap();
}
