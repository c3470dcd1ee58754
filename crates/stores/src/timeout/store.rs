use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use models::timeout_data;
use sea_orm::{
    ColumnTrait, DatabaseTransaction, EntityTrait, IsolationLevel, QueryFilter, QueryOrder, QuerySelect, Set,
};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{headers, DueTimeout, TimeoutChunk, TimeoutData, TimeoutPersistence};
use crate::errors::PersistenceError;
use crate::session::Session;

/// Poll delay when the endpoint has no future timeouts.
pub const DEFAULT_IDLE_POLL_SECS: i64 = 600;

/// SeaORM-backed timeout store.
#[derive(Clone, Debug)]
pub struct SeaOrmTimeoutStore {
    session: Session,
    endpoint_name: String,
    idle_poll: Duration,
}

impl SeaOrmTimeoutStore {
    pub fn new(session: Session) -> Self {
        Self { session, endpoint_name: String::new(), idle_poll: Duration::seconds(DEFAULT_IDLE_POLL_SECS) }
    }

    pub fn from_config(session: Session, cfg: &configs::TimeoutConfig) -> Self {
        let idle_poll = Duration::from_std(std::time::Duration::from_secs(cfg.idle_poll_secs))
            .unwrap_or_else(|_| Duration::seconds(DEFAULT_IDLE_POLL_SECS));
        Self::new(session).with_endpoint_name(cfg.endpoint_name.clone()).with_idle_poll(idle_poll)
    }

    pub fn with_endpoint_name(mut self, name: impl Into<String>) -> Self {
        self.endpoint_name = name.into();
        self
    }

    pub fn with_idle_poll(mut self, idle_poll: Duration) -> Self {
        self.idle_poll = idle_poll;
        self
    }

    pub fn idle_poll(&self) -> Duration { self.idle_poll }

    async fn begin(&self) -> Result<DatabaseTransaction, PersistenceError> {
        Ok(self.session.begin(Some(IsolationLevel::ReadCommitted)).await?)
    }
}

/// Roll back and hand back the original failure.
async fn abort(txn: DatabaseTransaction, err: impl Into<PersistenceError>) -> PersistenceError {
    let err = err.into();
    if let Err(rb) = txn.rollback().await {
        warn!(error = %rb, original = %err, "timeout_rollback_failed");
    }
    err
}

fn to_timeout_data(row: timeout_data::Model) -> Result<TimeoutData, PersistenceError> {
    Ok(TimeoutData {
        id: Some(row.id),
        destination: row.destination.parse()?,
        saga_id: row.saga_id,
        state: row.state,
        time: row.time,
        headers: headers::from_flat_string(&row.headers)?,
        owning_timeout_manager: row.endpoint,
    })
}

#[async_trait]
impl TimeoutPersistence for SeaOrmTimeoutStore {
    fn endpoint_name(&self) -> &str { &self.endpoint_name }

    fn set_endpoint_name(&mut self, name: String) { self.endpoint_name = name; }

    #[instrument(skip_all, fields(saga_id = ?timeout.saga_id, due = %timeout.time))]
    async fn add(&self, timeout: TimeoutData) -> Result<Uuid, PersistenceError> {
        timeout.destination.validate()?;
        let endpoint = if timeout.owning_timeout_manager.trim().is_empty() {
            self.endpoint_name.clone()
        } else {
            timeout.owning_timeout_manager.clone()
        };
        if endpoint.trim().is_empty() {
            return Err(PersistenceError::invalid("timeout has no owning endpoint and no endpoint name is set"));
        }

        let id = Uuid::now_v7();
        let row = timeout_data::ActiveModel {
            id: Set(id),
            endpoint: Set(endpoint.clone()),
            destination: Set(timeout.destination.to_string()),
            saga_id: Set(timeout.saga_id.filter(|s| !s.is_nil())),
            state: Set(timeout.state),
            time: Set(timeout.time),
            headers: Set(headers::to_flat_string(&timeout.headers)?),
        };

        let txn = self.begin().await?;
        if let Err(e) = timeout_data::Entity::insert(row).exec_without_returning(&txn).await {
            return Err(abort(txn, e).await);
        }
        txn.commit().await?;
        debug!(timeout_id = %id, %endpoint, "timeout_added");
        Ok(id)
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint_name))]
    async fn next_chunk(&self, start_slice: DateTime<Utc>) -> Result<TimeoutChunk, PersistenceError> {
        if self.endpoint_name.trim().is_empty() {
            return Err(PersistenceError::invalid("endpoint name must be set before polling"));
        }
        let now = Utc::now();

        let txn = self.begin().await?;
        let due: Vec<(Uuid, DateTime<Utc>)> = timeout_data::Entity::find()
            .select_only()
            .column(timeout_data::Column::Id)
            .column(timeout_data::Column::Time)
            .filter(timeout_data::Column::Endpoint.eq(self.endpoint_name.as_str()))
            .filter(timeout_data::Column::Time.gte(start_slice))
            .filter(timeout_data::Column::Time.lte(now))
            .order_by_asc(timeout_data::Column::Time)
            .order_by_asc(timeout_data::Column::Id)
            .into_tuple()
            .all(&txn)
            .await?;

        let next: Option<DateTime<Utc>> = timeout_data::Entity::find()
            .select_only()
            .column(timeout_data::Column::Time)
            .filter(timeout_data::Column::Endpoint.eq(self.endpoint_name.as_str()))
            .filter(timeout_data::Column::Time.gt(now))
            .order_by_asc(timeout_data::Column::Time)
            .limit(1)
            .into_tuple()
            .one(&txn)
            .await?;
        txn.commit().await?;

        let next_poll_time = next.unwrap_or_else(|| now + self.idle_poll);
        let due: Vec<DueTimeout> = due.into_iter().map(|(id, time)| DueTimeout { id, time }).collect();
        debug!(count = due.len(), %next_poll_time, "timeout_chunk");
        Ok(TimeoutChunk { due, next_poll_time })
    }

    #[instrument(skip(self))]
    async fn try_remove(&self, id: Uuid) -> Result<Option<TimeoutData>, PersistenceError> {
        let txn = self.begin().await?;
        let row = match timeout_data::Entity::find_by_id(id).one(&txn).await {
            Ok(Some(row)) => row,
            Ok(None) => {
                txn.rollback().await?;
                debug!("timeout_absent");
                return Ok(None);
            }
            Err(e) => return Err(abort(txn, e).await),
        };

        let data = match to_timeout_data(row) {
            Ok(data) => data,
            Err(e) => return Err(abort(txn, e).await),
        };
        let res = match timeout_data::Entity::delete_by_id(id).exec(&txn).await {
            Ok(res) => res,
            Err(e) => return Err(abort(txn, e).await),
        };
        if res.rows_affected == 0 {
            // another claimer deleted it between our read and delete
            let conflict = PersistenceError::ConcurrencyConflict(format!("timeout {id} was claimed concurrently"));
            return Err(abort(txn, conflict).await);
        }
        txn.commit().await?;
        debug!("timeout_claimed");
        Ok(Some(data))
    }

    #[instrument(skip(self))]
    async fn remove_timeouts_by(&self, saga_id: Uuid) -> Result<u64, PersistenceError> {
        if saga_id.is_nil() {
            return Err(PersistenceError::invalid("saga id cannot be empty"));
        }

        let txn = self.begin().await?;
        let res = match timeout_data::Entity::delete_many()
            .filter(timeout_data::Column::SagaId.eq(saga_id))
            .exec(&txn)
            .await
        {
            Ok(res) => res,
            Err(e) => return Err(abort(txn, e).await),
        };
        txn.commit().await?;
        debug!(count = res.rows_affected, "saga_timeouts_removed");
        Ok(res.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::session::SessionProvider;
    use crate::test_support::get_db;
    use sea_orm::{ConnectionTrait, DatabaseConnection, PaginatorTrait};

    const ENDPOINT: &str = "billing";

    async fn store() -> anyhow::Result<(SeaOrmTimeoutStore, DatabaseConnection)> {
        let db = get_db().await?;
        let store = SeaOrmTimeoutStore::new(SessionProvider::new(db.clone()).timeout_session())
            .with_endpoint_name(ENDPOINT);
        Ok((store, db))
    }

    fn timeout_at(time: DateTime<Utc>) -> TimeoutData {
        TimeoutData::new(Address::new("orders", "host"), time)
    }

    #[tokio::test]
    async fn added_timeout_is_in_next_chunk() -> anyhow::Result<()> {
        let (store, _) = store().await?;
        let added = Utc::now();
        let id = store.add(timeout_at(added)).await?;

        let chunk = store.next_chunk(added - Duration::seconds(1)).await?;
        assert_eq!(chunk.due.iter().map(|d| d.id).collect::<Vec<_>>(), vec![id]);
        Ok(())
    }

    #[tokio::test]
    async fn chunk_is_sorted_by_due_time() -> anyhow::Result<()> {
        let (store, _) = store().await?;
        let now = Utc::now();
        let mid = store.add(timeout_at(now - Duration::seconds(20))).await?;
        let late = store.add(timeout_at(now - Duration::seconds(10))).await?;
        let early = store.add(timeout_at(now - Duration::seconds(30))).await?;

        let chunk = store.next_chunk(now - Duration::minutes(1)).await?;
        assert_eq!(chunk.due.iter().map(|d| d.id).collect::<Vec<_>>(), vec![early, mid, late]);
        assert!(chunk.due.windows(2).all(|w| w[0].time <= w[1].time));
        Ok(())
    }

    #[tokio::test]
    async fn chunk_respects_window_and_endpoint() -> anyhow::Result<()> {
        let (store, _) = store().await?;
        let now = Utc::now();
        let inside = store.add(timeout_at(now - Duration::seconds(5))).await?;
        store.add(timeout_at(now - Duration::hours(1))).await?;
        store.add(timeout_at(now - Duration::seconds(5)).owned_by("shipping")).await?;

        let chunk = store.next_chunk(now - Duration::minutes(1)).await?;
        assert_eq!(chunk.due.iter().map(|d| d.id).collect::<Vec<_>>(), vec![inside]);
        Ok(())
    }

    #[tokio::test]
    async fn idle_endpoint_polls_again_in_ten_minutes() -> anyhow::Result<()> {
        let (store, _) = store().await?;
        // a future timeout of another endpoint does not count
        store.add(timeout_at(Utc::now() + Duration::minutes(1)).owned_by("shipping")).await?;

        let before = Utc::now();
        let chunk = store.next_chunk(before - Duration::minutes(1)).await?;
        let after = Utc::now();

        assert!(chunk.due.is_empty());
        assert!(chunk.next_poll_time >= before + Duration::minutes(10));
        assert!(chunk.next_poll_time <= after + Duration::minutes(10));
        Ok(())
    }

    #[tokio::test]
    async fn next_poll_is_earliest_future_timeout() -> anyhow::Result<()> {
        let (store, _) = store().await?;
        let soon = Utc::now() + Duration::minutes(2);
        store.add(timeout_at(soon + Duration::minutes(3))).await?;
        store.add(timeout_at(soon)).await?;

        let chunk = store.next_chunk(Utc::now() - Duration::minutes(1)).await?;
        assert!(chunk.due.is_empty());
        assert!((chunk.next_poll_time - soon).num_milliseconds().abs() <= 1);
        Ok(())
    }

    #[tokio::test]
    async fn idle_interval_comes_from_config() -> anyhow::Result<()> {
        let db = get_db().await?;
        let cfg = configs::TimeoutConfig { endpoint_name: ENDPOINT.into(), idle_poll_secs: 30 };
        let store = SeaOrmTimeoutStore::from_config(SessionProvider::new(db).timeout_session(), &cfg);
        assert_eq!(store.endpoint_name(), ENDPOINT);

        let before = Utc::now();
        let chunk = store.next_chunk(before).await?;
        assert!(chunk.next_poll_time >= before + Duration::seconds(30));
        assert!(chunk.next_poll_time < before + Duration::minutes(1));
        Ok(())
    }

    #[tokio::test]
    async fn try_remove_claims_exactly_once() -> anyhow::Result<()> {
        let (store, db) = store().await?;
        let saga_id = Uuid::new_v4();
        let due = Utc::now();
        let id = store
            .add(
                timeout_at(due)
                    .with_saga(saga_id)
                    .with_state(b"reminder".to_vec())
                    .with_header("NServiceBus.RelatedTo", "abc")
                    .with_header("Priority", "high"),
            )
            .await?;

        let claimed = store.try_remove(id).await?.expect("first claim");
        assert_eq!(claimed.id, Some(id));
        assert_eq!(claimed.destination, Address::new("orders", "host"));
        assert_eq!(claimed.saga_id, Some(saga_id));
        assert_eq!(claimed.state, b"reminder".to_vec());
        assert_eq!(claimed.headers.get("Priority").map(String::as_str), Some("high"));
        assert_eq!(claimed.headers.len(), 2);
        assert_eq!(claimed.owning_timeout_manager, ENDPOINT);
        assert!((claimed.time - due).num_milliseconds().abs() <= 1);

        assert!(store.try_remove(id).await?.is_none());
        assert_eq!(timeout_data::Entity::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_claims_hand_out_one_payload() -> anyhow::Result<()> {
        let (store, _) = store().await?;
        let id = store.add(timeout_at(Utc::now())).await?;

        let other = store.clone();
        let (a, b) = tokio::join!(store.try_remove(id), other.try_remove(id));
        let winners = [a, b].into_iter().filter(|r| matches!(r, Ok(Some(_)))).count();
        assert_eq!(winners, 1);
        Ok(())
    }

    #[tokio::test]
    async fn try_remove_unknown_id_is_none() -> anyhow::Result<()> {
        let (store, _) = store().await?;
        assert!(store.try_remove(Uuid::now_v7()).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn remove_by_saga_leaves_others() -> anyhow::Result<()> {
        let (store, _) = store().await?;
        let saga = Uuid::new_v4();
        let now = Utc::now();
        store.add(timeout_at(now).with_saga(saga)).await?;
        store.add(timeout_at(now + Duration::minutes(5)).with_saga(saga)).await?;
        let other_saga = store.add(timeout_at(now).with_saga(Uuid::new_v4())).await?;
        let uncorrelated = store.add(timeout_at(now)).await?;

        assert_eq!(store.remove_timeouts_by(saga).await?, 2);

        let chunk = store.next_chunk(now - Duration::minutes(1)).await?;
        let mut left: Vec<_> = chunk.due.iter().map(|d| d.id).collect();
        left.sort();
        let mut expected = vec![other_saga, uncorrelated];
        expected.sort();
        assert_eq!(left, expected);
        assert!(chunk.next_poll_time > now + Duration::minutes(9));
        Ok(())
    }

    #[tokio::test]
    async fn nil_saga_id_is_invalid() -> anyhow::Result<()> {
        let (store, _) = store().await?;
        let err = store.remove_timeouts_by(Uuid::nil()).await.unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidArgument(_)));
        Ok(())
    }

    #[tokio::test]
    async fn owner_and_destination_are_required() -> anyhow::Result<()> {
        let db = get_db().await?;
        let mut store = SeaOrmTimeoutStore::new(SessionProvider::new(db).timeout_session());

        let no_owner = store.add(timeout_at(Utc::now())).await.unwrap_err();
        assert!(matches!(no_owner, PersistenceError::InvalidArgument(_)));
        let no_endpoint = store.next_chunk(Utc::now()).await.unwrap_err();
        assert!(matches!(no_endpoint, PersistenceError::InvalidArgument(_)));

        store.set_endpoint_name(ENDPOINT.to_string());
        let no_destination = store
            .add(TimeoutData::new(Address::new("", ""), Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(no_destination, PersistenceError::InvalidArgument(_)));
        Ok(())
    }

    async fn reject_writes(db: &DatabaseConnection, on: &str) -> anyhow::Result<()> {
        db.execute_unprepared(&format!(
            "CREATE TRIGGER reject_{on} BEFORE {on} ON timeout_data BEGIN SELECT RAISE(ABORT, 'rejected'); END"
        ))
        .await?;
        Ok(())
    }

    async fn allow_writes(db: &DatabaseConnection, on: &str) -> anyhow::Result<()> {
        db.execute_unprepared(&format!("DROP TRIGGER reject_{on}")).await?;
        Ok(())
    }

    #[tokio::test]
    async fn failed_add_rolls_back_and_surfaces_driver_error() -> anyhow::Result<()> {
        let (store, db) = store().await?;
        reject_writes(&db, "INSERT").await?;

        let err = store.add(timeout_at(Utc::now())).await.unwrap_err();
        assert!(matches!(err, PersistenceError::BackingStore(_)), "{err:?}");

        allow_writes(&db, "INSERT").await?;
        assert_eq!(timeout_data::Entity::find().count(&db).await?, 0);
        store.add(timeout_at(Utc::now())).await?;
        Ok(())
    }

    #[tokio::test]
    async fn failed_claim_keeps_the_timeout() -> anyhow::Result<()> {
        let (store, db) = store().await?;
        let id = store.add(timeout_at(Utc::now())).await?;
        reject_writes(&db, "DELETE").await?;

        let err = store.try_remove(id).await.unwrap_err();
        assert!(matches!(err, PersistenceError::BackingStore(_)), "{err:?}");

        allow_writes(&db, "DELETE").await?;
        assert!(store.try_remove(id).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn failed_cancellation_keeps_saga_timeouts() -> anyhow::Result<()> {
        let (store, db) = store().await?;
        let saga = Uuid::new_v4();
        store.add(timeout_at(Utc::now()).with_saga(saga)).await?;
        store.add(timeout_at(Utc::now()).with_saga(saga)).await?;
        reject_writes(&db, "DELETE").await?;

        let err = store.remove_timeouts_by(saga).await.unwrap_err();
        assert!(matches!(err, PersistenceError::BackingStore(_)), "{err:?}");

        allow_writes(&db, "DELETE").await?;
        assert_eq!(timeout_data::Entity::find().count(&db).await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn undecodable_row_is_not_claimed() -> anyhow::Result<()> {
        let (store, db) = store().await?;
        let id = store.add(timeout_at(Utc::now())).await?;
        db.execute_unprepared("UPDATE timeout_data SET headers = 'not json'").await?;

        let err = store.try_remove(id).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Serialization(_)), "{err:?}");
        assert_eq!(timeout_data::Entity::find().count(&db).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn ids_sort_by_creation() -> anyhow::Result<()> {
        let (store, _) = store().await?;
        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(store.add(timeout_at(Utc::now())).await?);
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        assert!(ids.iter().all(|id| id.get_version_num() == 7));
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        Ok(())
    }
}
