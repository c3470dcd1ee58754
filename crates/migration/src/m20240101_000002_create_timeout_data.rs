//! Create `timeout_data` table.
//! Pending deferred work items, owned by an endpoint and due at `time`.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TimeoutData::Table)
                    .if_not_exists()
                    .col(uuid(TimeoutData::Id).primary_key())
                    .col(string_len(TimeoutData::Endpoint, 450).not_null())
                    .col(string_len(TimeoutData::Destination, 1024).not_null())
                    .col(uuid_null(TimeoutData::SagaId))
                    .col(blob(TimeoutData::State).not_null())
                    .col(timestamp_with_time_zone(TimeoutData::Time).not_null())
                    .col(text(TimeoutData::Headers).not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(TimeoutData::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum TimeoutData {
    Table,
    Id,
    Endpoint,
    Destination,
    SagaId,
    State,
    Time,
    Headers,
}
