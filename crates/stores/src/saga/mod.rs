//! Saga state storage.
//!
//! Each saga type is a sea-orm entity with its own table. A type becomes
//! storable by implementing [`SagaSet`] and being registered in a
//! [`SagaRegistry`]; every [`SagaStore`] operation dispatches through that
//! registry and fails with `UnsupportedType` for unregistered types.

mod registry;
mod store;

pub use registry::{SagaRegistry, SagaSetHandle};
pub use store::SagaStore;

use sea_orm::{ActiveModelBehavior, ActiveModelTrait, EntityTrait, IntoActiveModel};
use uuid::Uuid;

/// Persisted state of one saga instance.
pub trait SagaData: Clone + Send + Sync + 'static {
    fn id(&self) -> Uuid;
}

/// Binds a saga data type to the entity set that stores it.
///
/// ```ignore
/// impl SagaSet for order_saga::Entity {
///     type Entity = order_saga::Entity;
///     type Data = order_saga::Model;
///     type Active = order_saga::ActiveModel;
///     const TYPE_TAG: &'static str = "order_saga";
///     fn id_column() -> order_saga::Column { order_saga::Column::Id }
/// }
/// ```
pub trait SagaSet: Send + Sync + 'static {
    type Entity: EntityTrait<Model = Self::Data>;
    type Data: SagaData + IntoActiveModel<Self::Active>;
    type Active: ActiveModelTrait<Entity = Self::Entity> + ActiveModelBehavior + Send + Sync + 'static;

    /// Identifies the saga schema in logs and errors.
    const TYPE_TAG: &'static str;

    /// Primary key column holding [`SagaData::id`].
    fn id_column() -> <Self::Entity as EntityTrait>::Column;
}
