use std::{fmt, ops::Add, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Externally assigned, immutable identifier of an entry.
pub type EntryId = String;

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
	#[must_use]
	pub const fn from_millis(millis: i64) -> Self {
		Self(millis)
	}

	#[must_use]
	pub const fn as_millis(self) -> i64 {
		self.0
	}
}

impl Add<Duration> for Timestamp {
	type Output = Self;

	fn add(self, rhs: Duration) -> Self {
		Self(
			self.0
				.saturating_add(i64::try_from(rhs.as_millis()).unwrap_or(i64::MAX)),
		)
	}
}

impl fmt::Display for Timestamp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}ms", self.0)
	}
}

/// Opaque lease token handed to a worker on claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
	/// Random v4 uuid, so concurrently claiming workers never need to agree on ids.
	#[must_use]
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for JobId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for JobId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

/// A single observation of an entry, as reported by a producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
	pub id: EntryId,
	pub fields: Value,
	pub first_seen: Option<Timestamp>,
	pub last_seen: Option<Timestamp>,
}

impl Observation {
	pub fn new(id: impl Into<EntryId>, fields: Value) -> Self {
		Self {
			id: id.into(),
			fields,
			first_seen: None,
			last_seen: None,
		}
	}

	#[must_use]
	pub fn seen_between(mut self, first_seen: Timestamp, last_seen: Timestamp) -> Self {
		self.first_seen = Some(first_seen);
		self.last_seen = Some(last_seen);
		self
	}

	#[must_use]
	pub fn seen_at(self, at: Timestamp) -> Self {
		self.seen_between(at, at)
	}

	/// Watermarks for this observation, falling back to `now` and never inverted.
	#[must_use]
	pub fn watermarks(&self, now: Timestamp) -> (Timestamp, Timestamp) {
		let first = self.first_seen.or(self.last_seen).unwrap_or(now);
		let last = self.last_seen.or(self.first_seen).unwrap_or(now);

		(first.min(last), first.max(last))
	}
}

/// Where an entry sits in the claim protocol at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeaseState {
	Idle,
	Pending,
	Leased,
	Expired,
}

impl LeaseState {
	#[must_use]
	pub const fn is_claimable(self) -> bool {
		matches!(self, Self::Pending | Self::Expired)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
	pub id: EntryId,
	pub first_seen: Timestamp,
	pub last_seen: Timestamp,
	pub index_required_since: Option<Timestamp>,
	pub index_job: Option<JobId>,
	pub index_job_timeout: Option<Timestamp>,
	pub fields: Value,
}

impl Entry {
	/// Record created by the first observation of an id.
	#[must_use]
	pub fn observed(observation: Observation, now: Timestamp) -> Self {
		let (first_seen, last_seen) = observation.watermarks(now);

		Self {
			id: observation.id,
			first_seen,
			last_seen,
			index_required_since: Some(now),
			index_job: None,
			index_job_timeout: None,
			fields: observation.fields,
		}
	}

	/// Folds a later observation of the same id into this record.
	///
	/// Watermarks widen, fields are replaced wholesale, indexing is re-required
	/// and any outstanding lease is dropped since the content it covered is gone.
	pub fn merge(&mut self, observation: Observation, now: Timestamp) {
		let (first_seen, last_seen) = observation.watermarks(now);

		self.first_seen = self.first_seen.min(first_seen);
		self.last_seen = self.last_seen.max(last_seen);
		self.fields = observation.fields;
		self.index_required_since = Some(now);
		self.index_job = None;
		self.index_job_timeout = None;
	}

	#[must_use]
	pub fn lease_state(&self, now: Timestamp) -> LeaseState {
		match (self.index_required_since, self.index_job_timeout) {
			(None, _) => LeaseState::Idle,
			(Some(_), None) => LeaseState::Pending,
			(Some(_), Some(timeout)) if timeout <= now => LeaseState::Expired,
			(Some(_), Some(_)) => LeaseState::Leased,
		}
	}

	#[must_use]
	pub fn is_claimable(&self, now: Timestamp) -> bool {
		self.lease_state(now).is_claimable()
	}

	#[must_use]
	pub fn is_held_by(&self, job_id: JobId) -> bool {
		self.index_job == Some(job_id)
	}

	pub(crate) fn lease(&mut self, job_id: JobId, timeout: Timestamp) {
		self.index_job = Some(job_id);
		self.index_job_timeout = Some(timeout);
	}

	pub(crate) fn finish(&mut self) {
		self.index_required_since = None;
		self.index_job = None;
		self.index_job_timeout = None;
	}
}

/// Number of entries in each [`LeaseState`] at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseStats {
	pub idle: u64,
	pub pending: u64,
	pub leased: u64,
	pub expired: u64,
}

impl LeaseStats {
	pub fn record(&mut self, state: LeaseState) {
		match state {
			LeaseState::Idle => self.idle += 1,
			LeaseState::Pending => self.pending += 1,
			LeaseState::Leased => self.leased += 1,
			LeaseState::Expired => self.expired += 1,
		}
	}

	#[must_use]
	pub const fn claimable(&self) -> u64 {
		self.pending + self.expired
	}

	#[must_use]
	pub const fn total(&self) -> u64 {
		self.idle + self.pending + self.leased + self.expired
	}
}
