use std::sync::Arc;

use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, Value};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{SagaData, SagaRegistry, SagaSet};
use crate::errors::PersistenceError;
use crate::session::Session;

/// Keyed storage for saga state, generic over registered saga types.
#[derive(Clone, Debug)]
pub struct SagaStore {
    session: Session,
    registry: Arc<SagaRegistry>,
}

impl SagaStore {
    pub fn new(session: Session, registry: Arc<SagaRegistry>) -> Self {
        Self { session, registry }
    }

    pub fn registry(&self) -> &SagaRegistry { &self.registry }

    /// Insert a new saga instance. Duplicate ids are left to the primary key.
    #[instrument(skip_all, fields(saga_type = S::TYPE_TAG, saga_id = %saga.id()))]
    pub async fn save<S: SagaSet>(&self, saga: &S::Data) -> Result<(), PersistenceError> {
        self.registry.handle::<S>()?;
        require_id(saga.id())?;

        let active: S::Active = saga.clone().into_active_model();
        let txn = self.session.begin(None).await?;
        S::Entity::insert(active.reset_all()).exec_without_returning(&txn).await?;
        txn.commit().await?;
        debug!("saga_saved");
        Ok(())
    }

    /// Fetch by id; `None` when no such instance exists.
    #[instrument(skip(self), fields(saga_type = S::TYPE_TAG))]
    pub async fn get<S: SagaSet>(&self, id: Uuid) -> Result<Option<S::Data>, PersistenceError> {
        self.registry.handle::<S>()?;
        require_id(id)?;

        let txn = self.session.begin(None).await?;
        let found = S::Entity::find().filter(S::id_column().eq(id)).one(&txn).await?;
        txn.commit().await?;
        Ok(found)
    }

    /// First instance whose `property` equals `value`.
    ///
    /// `property` may be the column name or the field variant name; the
    /// column was resolved when the type was registered.
    #[instrument(skip(self, value), fields(saga_type = S::TYPE_TAG))]
    pub async fn find_by<S, V>(&self, property: &str, value: V) -> Result<Option<S::Data>, PersistenceError>
    where
        S: SagaSet,
        V: Into<Value> + Send,
    {
        let handle = self.registry.handle::<S>()?;
        if property.trim().is_empty() {
            return Err(PersistenceError::invalid("property name required"));
        }
        let column = handle
            .column(property)
            .ok_or_else(|| PersistenceError::invalid(format!("{} has no property '{property}'", S::TYPE_TAG)))?;

        let txn = self.session.begin(None).await?;
        let found = S::Entity::find().filter(column.eq(value)).one(&txn).await?;
        txn.commit().await?;
        Ok(found)
    }

    /// Overwrite every field of an existing instance. Last writer wins.
    #[instrument(skip_all, fields(saga_type = S::TYPE_TAG, saga_id = %saga.id()))]
    pub async fn update<S: SagaSet>(&self, saga: &S::Data) -> Result<(), PersistenceError> {
        self.registry.handle::<S>()?;
        let id = saga.id();
        require_id(id)?;

        let txn = self.session.begin(None).await?;
        let existing = S::Entity::find().filter(S::id_column().eq(id)).one(&txn).await?;
        if existing.is_none() {
            return Err(PersistenceError::NotFound(format!("could not find saga with id {id}")));
        }

        let active: S::Active = saga.clone().into_active_model();
        let res = S::Entity::update_many()
            .set(active.reset_all())
            .filter(S::id_column().eq(id))
            .exec(&txn)
            .await?;
        if res.rows_affected == 0 {
            return Err(PersistenceError::ConcurrencyConflict(format!("saga {id} was removed during update")));
        }
        txn.commit().await?;
        debug!("saga_updated");
        Ok(())
    }

    /// Delete the instance. Deleting an already removed instance succeeds.
    #[instrument(skip_all, fields(saga_type = S::TYPE_TAG, saga_id = %saga.id()))]
    pub async fn complete<S: SagaSet>(&self, saga: &S::Data) -> Result<(), PersistenceError> {
        self.registry.handle::<S>()?;
        require_id(saga.id())?;

        let txn = self.session.begin(None).await?;
        let res = S::Entity::delete_many().filter(S::id_column().eq(saga.id())).exec(&txn).await?;
        txn.commit().await?;
        if res.rows_affected == 0 {
            debug!("saga_already_completed");
        } else {
            debug!("saga_completed");
        }
        Ok(())
    }
}

fn require_id(id: Uuid) -> Result<(), PersistenceError> {
    if id.is_nil() {
        return Err(PersistenceError::invalid("saga id cannot be empty"));
    }
    Ok(())
}
