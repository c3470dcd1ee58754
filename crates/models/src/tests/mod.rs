

use migration::MigratorTrait;
use sea_orm::DatabaseConnection;

/// Fresh private in-memory database with the schema applied, so every
/// test starts empty.
pub(crate) async fn setup_test_db() -> anyhow::Result<DatabaseConnection> {
    let db = crate::db::connect_in_memory().await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}
