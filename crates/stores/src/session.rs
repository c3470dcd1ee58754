//! Units of work handed to the stores.
//!
//! A [`Session`] is either *dedicated* (a pooled connection; every store
//! operation opens and commits its own transaction) or *shared* (the ambient
//! transaction of a [`UnitOfWork`]; store operations run in savepoints and
//! only become durable when the unit of work commits).

use std::sync::Arc;

use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, IsolationLevel, TransactionTrait};
use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::errors::PersistenceError;

#[derive(Clone, Debug)]
pub enum Session {
    Dedicated(DatabaseConnection),
    Shared(Arc<DatabaseTransaction>),
}

impl Session {
    /// Open the transaction one store operation runs in.
    ///
    /// For a shared session this is a savepoint, so `isolation` is whatever
    /// the enclosing unit of work was opened with.
    pub(crate) async fn begin(&self, isolation: Option<IsolationLevel>) -> Result<DatabaseTransaction, DbErr> {
        match self {
            Session::Dedicated(db) => db.begin_with_config(isolation, None).await,
            Session::Shared(txn) => txn.begin().await,
        }
    }

    pub fn is_shared(&self) -> bool { matches!(self, Session::Shared(_)) }
}

/// Ambient transaction scoped to the processing of one inbound message.
///
/// Stores built from [`UnitOfWork::session`] hold a reference to it; drop
/// them before calling [`UnitOfWork::commit`]. All stores sharing one unit
/// of work run on a single connection, so drive them one operation at a
/// time: savepoints of concurrent operations would interleave.
#[derive(Debug)]
pub struct UnitOfWork {
    id: Uuid,
    txn: Arc<DatabaseTransaction>,
}

/// A commit or rollback that did not go through.
///
/// When sessions were still live the unit of work comes back untouched, so
/// the caller can drop them and try again.
#[derive(Debug, Error)]
#[error("unit of work {id} could not finish")]
pub struct UnitOfWorkError {
    pub id: Uuid,
    #[source]
    pub error: PersistenceError,
    pub unit_of_work: Option<UnitOfWork>,
}

impl UnitOfWorkError {
    pub fn into_unit_of_work(self) -> Option<UnitOfWork> { self.unit_of_work }
}

impl UnitOfWork {
    pub fn id(&self) -> Uuid { self.id }

    pub fn session(&self) -> Session { Session::Shared(Arc::clone(&self.txn)) }

    /// Take the transaction out, or hand `self` back if a session still
    /// references it.
    fn release(self) -> Result<DatabaseTransaction, UnitOfWorkError> {
        let id = self.id;
        Arc::try_unwrap(self.txn).map_err(|txn| {
            warn!(unit_of_work = %id, live_sessions = Arc::strong_count(&txn) - 1, "unit_of_work_in_use");
            UnitOfWorkError { id, error: PersistenceError::SessionInUse, unit_of_work: Some(UnitOfWork { id, txn }) }
        })
    }

    #[instrument(skip(self), fields(unit_of_work = %self.id))]
    pub async fn commit(self) -> Result<(), UnitOfWorkError> {
        let id = self.id;
        let txn = self.release()?;
        txn.commit()
            .await
            .map_err(|e| UnitOfWorkError { id, error: e.into(), unit_of_work: None })?;
        debug!("unit_of_work_committed");
        Ok(())
    }

    #[instrument(skip(self), fields(unit_of_work = %self.id))]
    pub async fn rollback(self) -> Result<(), UnitOfWorkError> {
        let id = self.id;
        let txn = self.release()?;
        txn.rollback()
            .await
            .map_err(|e| UnitOfWorkError { id, error: e.into(), unit_of_work: None })?;
        debug!("unit_of_work_rolled_back");
        Ok(())
    }
}

/// Hands each store the session it should use.
#[derive(Clone, Debug)]
pub struct SessionProvider {
    db: DatabaseConnection,
}

impl SessionProvider {
    pub fn new(db: DatabaseConnection) -> Self { Self { db } }

    pub fn connection(&self) -> &DatabaseConnection { &self.db }

    /// Reuse the ambient unit of work when one is in scope, otherwise hand
    /// out a dedicated session.
    pub fn session(&self, scope: Option<&UnitOfWork>) -> Session {
        match scope {
            Some(uow) => uow.session(),
            None => self.dedicated(),
        }
    }

    pub fn dedicated(&self) -> Session { Session::Dedicated(self.db.clone()) }

    pub fn saga_session(&self, scope: Option<&UnitOfWork>) -> Session { self.session(scope) }

    pub fn subscription_session(&self, scope: Option<&UnitOfWork>) -> Session { self.session(scope) }

    /// Timeout claims must commit on their own, so this never joins an
    /// ambient unit of work.
    pub fn timeout_session(&self) -> Session { self.dedicated() }

    /// Open an ambient read-committed transaction.
    #[instrument(skip(self))]
    pub async fn begin_unit_of_work(&self) -> Result<UnitOfWork, PersistenceError> {
        let txn = self.db.begin_with_config(Some(IsolationLevel::ReadCommitted), None).await?;
        let uow = UnitOfWork { id: Uuid::new_v4(), txn: Arc::new(txn) };
        debug!(unit_of_work = %uow.id, "unit_of_work_started");
        Ok(uow)
    }
}
