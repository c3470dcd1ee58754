//! Durable state for a message bus host: saga instances, the subscription
//! registry and scheduled timeouts, all on top of sea-orm.

pub mod address;
pub mod errors;
pub mod saga;
pub mod session;
pub mod subscription;
pub mod timeout;

#[cfg(test)]
pub mod test_support;

pub use address::{Address, MessageType};
pub use errors::PersistenceError;
pub use saga::{SagaData, SagaRegistry, SagaSet, SagaStore};
pub use session::{Session, SessionProvider, UnitOfWork, UnitOfWorkError};
pub use subscription::{SeaOrmSubscriptionStore, SubscriptionStorage};
pub use timeout::{DueTimeout, SeaOrmTimeoutStore, TimeoutChunk, TimeoutData, TimeoutPersistence};
