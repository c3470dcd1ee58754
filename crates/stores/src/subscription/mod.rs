//! Registry of which endpoints subscribe to which message types.

mod store;

pub use store::SeaOrmSubscriptionStore;

use async_trait::async_trait;

use crate::address::{Address, MessageType};
use crate::errors::PersistenceError;

/// Set-like subscription registry consumed by the message bus host.
#[async_trait]
pub trait SubscriptionStorage: Send + Sync {
    /// Lifecycle hook called before first use.
    async fn init(&self) -> Result<(), PersistenceError>;

    /// Subscribe `client` to every distinct type in `message_types`.
    ///
    /// If any of the types is already subscribed the call stops there and
    /// persists nothing from this batch.
    async fn subscribe(&self, client: &Address, message_types: &[MessageType]) -> Result<(), PersistenceError>;

    /// Remove the subscriptions of `client` to `message_types`, if any.
    async fn unsubscribe(&self, client: &Address, message_types: &[MessageType]) -> Result<(), PersistenceError>;

    /// Distinct subscribers of any of `message_types`, in no particular order.
    async fn subscriber_addresses_for_message(&self, message_types: &[MessageType]) -> Result<Vec<Address>, PersistenceError>;
}
