//! Migrator for the subscription and timeout tables.
//! Saga tables belong to the host's saga types and are not created here.
//! Indexes are applied last.
pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_subscription;
mod m20240101_000002_create_timeout_data;
mod m20240101_000003_add_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_subscription::Migration),
            Box::new(m20240101_000002_create_timeout_data::Migration),
            // Indexes should always be applied last
            Box::new(m20240101_000003_add_indexes::Migration),
        ]
    }
}
