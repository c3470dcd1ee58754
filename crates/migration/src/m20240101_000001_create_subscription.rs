//! Create `subscription` table.
//! One row per (subscriber endpoint, message type) pair; the composite
//! primary key keeps the registry duplicate free.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Subscription::Table)
                    .if_not_exists()
                    .col(string_len(Subscription::SubscriberEndpoint, 450).not_null())
                    .col(string_len(Subscription::MessageType, 450).not_null())
                    .col(timestamp_with_time_zone(Subscription::CreatedAt).not_null())
                    .primary_key(
                        Index::create()
                            .name("pk_subscription")
                            .col(Subscription::SubscriberEndpoint)
                            .col(Subscription::MessageType),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Subscription::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Subscription {
    Table,
    SubscriberEndpoint,
    MessageType,
    CreatedAt,
}
