use std::{
	sync::{
		atomic::{AtomicI64, Ordering},
		Arc,
	},
	time::Duration,
};

use chrono::Utc;

use super::entry::Timestamp;

/// Source of "now" for lease arithmetic.
pub trait Clock: Send + Sync + 'static {
	fn now(&self) -> Timestamp;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
	fn now(&self) -> Timestamp {
		(**self).now()
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> Timestamp {
		Timestamp::from_millis(Utc::now().timestamp_millis())
	}
}

/// A clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
	millis: Arc<AtomicI64>,
}

impl ManualClock {
	#[must_use]
	pub fn starting_at(at: Timestamp) -> Self {
		Self {
			millis: Arc::new(AtomicI64::new(at.as_millis())),
		}
	}

	pub fn set(&self, at: Timestamp) {
		self.millis.store(at.as_millis(), Ordering::SeqCst);
	}

	pub fn advance(&self, by: Duration) {
		let by = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
		// Saturates like `Timestamp + Duration`; the closure never declines so this can't fail
		let _ = self
			.millis
			.try_update(Ordering::SeqCst, Ordering::SeqCst, |millis| {
				Some(millis.saturating_add(by))
			});
	}
}

impl Clock for ManualClock {
	fn now(&self) -> Timestamp {
		Timestamp::from_millis(self.millis.load(Ordering::SeqCst))
	}
}
