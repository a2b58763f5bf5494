//! Entry entity

use sea_orm::{entity::prelude::*, Set};
use serde::{Deserialize, Serialize};

use crate::entry::{Entry, JobId, Timestamp};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "entries")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub id: String,
	#[sea_orm(indexed)]
	pub first_seen: i64,
	#[sea_orm(indexed)]
	pub last_seen: i64,
	#[sea_orm(indexed, nullable)]
	pub index_required_since: Option<i64>,
	#[sea_orm(indexed, nullable)]
	pub index_job: Option<Uuid>,
	#[sea_orm(indexed, nullable)]
	pub index_job_timeout: Option<i64>,
	#[sea_orm(column_type = "Json")]
	pub fields: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Entry {
	fn from(model: Model) -> Self {
		Self {
			id: model.id,
			first_seen: Timestamp::from_millis(model.first_seen),
			last_seen: Timestamp::from_millis(model.last_seen),
			index_required_since: model.index_required_since.map(Timestamp::from_millis),
			index_job: model.index_job.map(JobId),
			index_job_timeout: model.index_job_timeout.map(Timestamp::from_millis),
			fields: model.fields,
		}
	}
}

impl From<Entry> for ActiveModel {
	fn from(entry: Entry) -> Self {
		Self {
			id: Set(entry.id),
			first_seen: Set(entry.first_seen.as_millis()),
			last_seen: Set(entry.last_seen.as_millis()),
			index_required_since: Set(entry.index_required_since.map(Timestamp::as_millis)),
			index_job: Set(entry.index_job.map(|JobId(id)| id)),
			index_job_timeout: Set(entry.index_job_timeout.map(Timestamp::as_millis)),
			fields: Set(entry.fields),
		}
	}
}
