#![cfg(test)]
use migration::MigratorTrait;
use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait, Schema};

/// Fresh in-memory database with the migrations applied.
pub async fn get_db() -> Result<DatabaseConnection, anyhow::Error> {
    common::utils::logging::init_logging_for_tests();
    let db = models::db::connect_in_memory().await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

/// Like [`get_db`], plus the tables of the test saga types.
pub async fn get_db_with_sagas() -> Result<DatabaseConnection, anyhow::Error> {
    let db = get_db().await?;
    create_table(&db, order_saga::Entity).await?;
    create_table(&db, refund_saga::Entity).await?;
    Ok(db)
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<(), anyhow::Error> {
    let backend = db.get_database_backend();
    let mut stmt = Schema::new(backend).create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(backend.build(&stmt)).await?;
    Ok(())
}

pub mod order_saga {
    use sea_orm::entity::prelude::*;

    use crate::saga::{SagaData, SagaSet};

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "order_saga")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub originator: String,
        pub original_message_id: String,
        pub customer_id: String,
        pub order_total: i64,
        pub status: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter)]
    pub enum Relation {}

    impl RelationTrait for Relation {
        fn def(&self) -> RelationDef { panic!("no relations defined here") }
    }

    impl ActiveModelBehavior for ActiveModel {}

    impl SagaData for Model {
        fn id(&self) -> Uuid { self.id }
    }

    impl SagaSet for Entity {
        type Entity = Entity;
        type Data = Model;
        type Active = ActiveModel;
        const TYPE_TAG: &'static str = "order_saga";
        fn id_column() -> Column { Column::Id }
    }

    pub fn sample(customer_id: &str) -> Model {
        Model {
            id: Uuid::new_v4(),
            originator: "orders@host".into(),
            original_message_id: Uuid::new_v4().to_string(),
            customer_id: customer_id.into(),
            order_total: 100,
            status: "placed".into(),
        }
    }
}

/// Has a table but is left out of most registries.
pub mod refund_saga {
    use sea_orm::entity::prelude::*;

    use crate::saga::{SagaData, SagaSet};

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "refund_saga")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub reason: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter)]
    pub enum Relation {}

    impl RelationTrait for Relation {
        fn def(&self) -> RelationDef { panic!("no relations defined here") }
    }

    impl ActiveModelBehavior for ActiveModel {}

    impl SagaData for Model {
        fn id(&self) -> Uuid { self.id }
    }

    impl SagaSet for Entity {
        type Entity = Entity;
        type Data = Model;
        type Active = ActiveModel;
        const TYPE_TAG: &'static str = "refund_saga";
        fn id_column() -> Column { Column::Id }
    }

    pub fn sample() -> Model {
        Model { id: Uuid::new_v4(), reason: "damaged".into() }
    }
}
