//! Entries table plus the lookups the claim predicate runs on

use sea_orm_migration::{prelude::*, sea_orm::ConnectionTrait};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
	async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.create_table(
				Table::create()
					.table(Entries::Table)
					.if_not_exists()
					.col(ColumnDef::new(Entries::Id).text().not_null().primary_key())
					.col(ColumnDef::new(Entries::FirstSeen).big_integer().not_null())
					.col(ColumnDef::new(Entries::LastSeen).big_integer().not_null())
					.col(ColumnDef::new(Entries::IndexRequiredSince).big_integer())
					.col(ColumnDef::new(Entries::IndexJob).uuid())
					.col(ColumnDef::new(Entries::IndexJobTimeout).big_integer())
					.col(ColumnDef::new(Entries::Fields).json().not_null())
					.to_owned(),
			)
			.await?;

		for (name, column) in [
			("idx_entries_first_seen", Entries::FirstSeen),
			("idx_entries_last_seen", Entries::LastSeen),
		] {
			manager
				.create_index(
					Index::create()
						.name(name)
						.table(Entries::Table)
						.col(column)
						.if_not_exists()
						.to_owned(),
				)
				.await?;
		}

		// Partial indexes, most entries are idle and never carry these fields
		let db = manager.get_connection();
		for (name, column) in [
			("idx_entries_index_required_since", "index_required_since"),
			("idx_entries_index_job_timeout", "index_job_timeout"),
			("idx_entries_index_job", "index_job"),
		] {
			db.execute_unprepared(&format!(
				"CREATE INDEX IF NOT EXISTS \"{name}\" ON \"entries\" (\"{column}\") \
				 WHERE \"{column}\" IS NOT NULL"
			))
			.await?;
		}

		Ok(())
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.drop_table(Table::drop().table(Entries::Table).to_owned())
			.await
	}
}

#[derive(DeriveIden)]
enum Entries {
	Table,
	Id,
	FirstSeen,
	LastSeen,
	IndexRequiredSince,
	IndexJob,
	IndexJobTimeout,
	Fields,
}
