//! Deferred work items that fire at a future instant.
//!
//! The host polls [`TimeoutPersistence::next_chunk`], sleeps until the
//! returned `next_poll_time`, and claims each due item with
//! [`TimeoutPersistence::try_remove`].

pub mod headers;
mod store;

pub use store::SeaOrmTimeoutStore;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::address::Address;
use crate::errors::PersistenceError;

/// A deferred work item as handed to and returned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeoutData {
    /// Assigned by the store on `add`.
    pub id: Option<Uuid>,
    pub destination: Address,
    /// Saga this timeout belongs to, if any.
    pub saga_id: Option<Uuid>,
    pub state: Vec<u8>,
    pub time: DateTime<Utc>,
    pub headers: HashMap<String, String>,
    /// Endpoint that owns the timeout; empty means the store's endpoint.
    pub owning_timeout_manager: String,
}

impl TimeoutData {
    pub fn new(destination: Address, time: DateTime<Utc>) -> Self {
        Self {
            id: None,
            destination,
            saga_id: None,
            state: Vec::new(),
            time,
            headers: HashMap::new(),
            owning_timeout_manager: String::new(),
        }
    }

    pub fn with_saga(mut self, saga_id: Uuid) -> Self {
        self.saga_id = Some(saga_id);
        self
    }

    pub fn with_state(mut self, state: impl Into<Vec<u8>>) -> Self {
        self.state = state.into();
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn owned_by(mut self, endpoint: impl Into<String>) -> Self {
        self.owning_timeout_manager = endpoint.into();
        self
    }
}

/// Id and due time of one due timeout; the payload comes from `try_remove`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueTimeout {
    pub id: Uuid,
    pub time: DateTime<Utc>,
}

/// Result of one polling query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutChunk {
    /// Due timeouts ordered by due time, earliest first.
    pub due: Vec<DueTimeout>,
    /// When to poll next: the earliest future timeout, or the idle fallback.
    pub next_poll_time: DateTime<Utc>,
}

#[async_trait]
pub trait TimeoutPersistence: Send + Sync {
    /// Endpoint all chunk queries are scoped to.
    fn endpoint_name(&self) -> &str;

    fn set_endpoint_name(&mut self, name: String);

    /// Store a new timeout and return its generated id.
    async fn add(&self, timeout: TimeoutData) -> Result<Uuid, PersistenceError>;

    /// Timeouts of this endpoint due in `[start_slice, now]`, plus the next
    /// poll time.
    async fn next_chunk(&self, start_slice: DateTime<Utc>) -> Result<TimeoutChunk, PersistenceError>;

    /// Claim a timeout: fetch and delete it in one transaction. `None` when
    /// it no longer exists.
    async fn try_remove(&self, id: Uuid) -> Result<Option<TimeoutData>, PersistenceError>;

    /// Cancel every timeout of a saga; returns how many were removed.
    async fn remove_timeouts_by(&self, saga_id: Uuid) -> Result<u64, PersistenceError>;
}
