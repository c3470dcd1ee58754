use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Subscription: lookup of subscribers by message type
        manager
            .create_index(
                Index::create()
                    .name("idx_subscription_message_type")
                    .table(Subscription::Table)
                    .col(Subscription::MessageType)
                    .to_owned(),
            )
            .await?;

        // TimeoutData: chunk queries filter on endpoint and range over time
        manager
            .create_index(
                Index::create()
                    .name("idx_timeout_endpoint_time")
                    .table(TimeoutData::Table)
                    .col(TimeoutData::Endpoint)
                    .col(TimeoutData::Time)
                    .to_owned(),
            )
            .await?;

        // TimeoutData: bulk cancellation by saga
        manager
            .create_index(
                Index::create()
                    .name("idx_timeout_saga")
                    .table(TimeoutData::Table)
                    .col(TimeoutData::SagaId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_subscription_message_type").table(Subscription::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_timeout_endpoint_time").table(TimeoutData::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_timeout_saga").table(TimeoutData::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Subscription { Table, MessageType }

#[derive(DeriveIden)]
enum TimeoutData { Table, SagaId, Endpoint, Time }
