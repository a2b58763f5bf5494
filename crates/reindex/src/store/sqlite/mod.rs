//! Entry store on SQLite through SeaORM
//!
//! Each operation is a single SQL statement, so SQLite's statement atomicity is
//! all the isolation the claim protocol needs.

use std::{path::Path, time::Duration};

use async_trait::async_trait;
use sea_orm::{
	sea_query::{Expr, OnConflict, Query},
	ColumnTrait, Condition, ConnectOptions, Database, DatabaseConnection, DbErr, EntityTrait,
	PaginatorTrait, QueryFilter,
};
use sea_orm_migration::MigratorTrait;
use tracing::{info, instrument, trace};
use uuid::Uuid;

use crate::{
	config::ReindexConfig,
	entry::{Entry, EntryId, JobId, LeaseStats, Observation, Timestamp},
	error::Result,
};

use super::EntryStore;

mod entity;
mod migration;

use entity::{ActiveModel, Column, Entity};

/// Rows per insert and ids per lookup, keeps us well under SQLite's bound parameter limit.
const CHUNK_SIZE: usize = 1_000;

pub struct SqliteStore {
	conn: DatabaseConnection,
}

impl SqliteStore {
	/// Opens (creating if needed) a database file at `path`.
	pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();

		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)
				.map_err(|e| DbErr::Custom(format!("Failed to create directory: {e}")))?;
		}

		Self::connect(format!("sqlite://{}?mode=rwc", path.display())).await
	}

	pub async fn connect(url: impl Into<String>) -> Result<Self> {
		let url = url.into();

		let mut opt = ConnectOptions::new(url.clone());
		if url.contains(":memory:") {
			// Every pooled connection would otherwise get its own empty database
			opt.max_connections(1).min_connections(1);
		} else {
			opt.max_connections(10)
				.min_connections(1)
				.connect_timeout(Duration::from_secs(8))
				.idle_timeout(Duration::from_secs(8));
		}
		opt.sqlx_logging(false);

		let conn = Database::connect(opt).await?;

		info!(%url, "Connected to entry store");

		Ok(Self { conn })
	}

	/// Connects to `database_url` and brings the schema up to date.
	pub async fn from_config(config: &ReindexConfig) -> Result<Self> {
		let store = Self::connect(config.database_url.as_str()).await?;
		store.initialize().await?;
		Ok(store)
	}

	#[must_use]
	pub const fn from_connection(conn: DatabaseConnection) -> Self {
		Self { conn }
	}

	#[must_use]
	pub const fn conn(&self) -> &DatabaseConnection {
		&self.conn
	}

	fn claimable(now: Timestamp) -> Condition {
		Condition::all()
			.add(Column::IndexRequiredSince.is_not_null())
			.add(
				Condition::any()
					.add(Column::IndexJob.is_null())
					.add(Column::IndexJobTimeout.lte(now.as_millis())),
			)
	}
}

#[async_trait]
impl EntryStore for SqliteStore {
	async fn initialize(&self) -> Result<()> {
		migration::Migrator::up(&self.conn, None).await?;
		info!("Entry store migrations completed successfully");
		Ok(())
	}

	#[instrument(skip_all, fields(count = observations.len(), %now), err)]
	async fn upsert(&self, observations: Vec<Observation>, now: Timestamp) -> Result<()> {
		// Merge happens inside the statement so racing writers can't lose each other's watermarks
		let on_conflict = OnConflict::column(Column::Id)
			.value(
				Column::FirstSeen,
				Expr::cust(r#"MIN("entries"."first_seen", "excluded"."first_seen")"#),
			)
			.value(
				Column::LastSeen,
				Expr::cust(r#"MAX("entries"."last_seen", "excluded"."last_seen")"#),
			)
			.update_columns([
				Column::Fields,
				Column::IndexRequiredSince,
				Column::IndexJob,
				Column::IndexJobTimeout,
			])
			.to_owned();

		let mut observations = observations.into_iter().peekable();
		while observations.peek().is_some() {
			let models = observations
				.by_ref()
				.take(CHUNK_SIZE)
				.map(|observation| ActiveModel::from(Entry::observed(observation, now)))
				.collect::<Vec<_>>();

			let written = Entity::insert_many(models)
				.on_conflict(on_conflict.clone())
				.exec_without_returning(&self.conn)
				.await?;

			trace!(written, "Upserted entries chunk");
		}

		Ok(())
	}

	async fn find(&self, ids: &[EntryId]) -> Result<Vec<Entry>> {
		let mut entries = Vec::with_capacity(ids.len());

		for chunk in ids.chunks(CHUNK_SIZE) {
			entries.extend(
				Entity::find()
					.filter(Column::Id.is_in(chunk.iter().cloned()))
					.all(&self.conn)
					.await?
					.into_iter()
					.map(Entry::from),
			);
		}

		Ok(entries)
	}

	#[instrument(skip(self), fields(%job_id, %now, %timeout), err)]
	async fn assign_lease(
		&self,
		job_id: JobId,
		count: u64,
		now: Timestamp,
		timeout: Timestamp,
	) -> Result<u64> {
		let candidates = Query::select()
			.column(Column::Id)
			.from(Entity)
			.cond_where(Self::claimable(now))
			.limit(count)
			.to_owned();

		// The predicate is repeated on the outer update, it's what every row is
		// checked against when the write lands
		let res = Entity::update_many()
			.col_expr(Column::IndexJob, Expr::value(job_id.0))
			.col_expr(Column::IndexJobTimeout, Expr::value(timeout.as_millis()))
			.filter(Column::Id.in_subquery(candidates))
			.filter(Self::claimable(now))
			.exec(&self.conn)
			.await?;

		Ok(res.rows_affected)
	}

	async fn find_by_job(&self, job_id: JobId) -> Result<Vec<Entry>> {
		Ok(Entity::find()
			.filter(Column::IndexJob.eq(job_id.0))
			.all(&self.conn)
			.await?
			.into_iter()
			.map(Entry::from)
			.collect())
	}

	#[instrument(skip(self), fields(%job_id), err)]
	async fn clear_lease(&self, job_id: JobId) -> Result<u64> {
		let res = Entity::update_many()
			.col_expr(Column::IndexRequiredSince, Expr::value(None::<i64>))
			.col_expr(Column::IndexJob, Expr::value(None::<Uuid>))
			.col_expr(Column::IndexJobTimeout, Expr::value(None::<i64>))
			.filter(Column::IndexJob.eq(job_id.0))
			.exec(&self.conn)
			.await?;

		Ok(res.rows_affected)
	}

	#[instrument(skip(self), fields(%job_id, %now, %timeout), err)]
	async fn extend_lease(
		&self,
		job_id: JobId,
		now: Timestamp,
		timeout: Timestamp,
	) -> Result<u64> {
		let res = Entity::update_many()
			.col_expr(Column::IndexJobTimeout, Expr::value(timeout.as_millis()))
			.filter(Column::IndexJob.eq(job_id.0))
			.filter(Column::IndexRequiredSince.is_not_null())
			.filter(Column::IndexJobTimeout.gt(now.as_millis()))
			.exec(&self.conn)
			.await?;

		Ok(res.rows_affected)
	}

	async fn count_states(&self, now: Timestamp) -> Result<LeaseStats> {
		// Four independent counts, not a snapshot
		let required = Column::IndexRequiredSince.is_not_null();

		let idle = Entity::find()
			.filter(Column::IndexRequiredSince.is_null())
			.count(&self.conn)
			.await?;

		let pending = Entity::find()
			.filter(required.clone())
			.filter(Column::IndexJobTimeout.is_null())
			.count(&self.conn)
			.await?;

		let leased = Entity::find()
			.filter(required.clone())
			.filter(Column::IndexJobTimeout.gt(now.as_millis()))
			.count(&self.conn)
			.await?;

		let expired = Entity::find()
			.filter(required)
			.filter(Column::IndexJobTimeout.lte(now.as_millis()))
			.count(&self.conn)
			.await?;

		Ok(LeaseStats {
			idle,
			pending,
			leased,
			expired,
		})
	}
}
