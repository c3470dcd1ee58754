use std::collections::HashSet;

use async_trait::async_trait;
use models::subscription;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QuerySelect};
use tracing::{debug, instrument};

use super::SubscriptionStorage;
use crate::address::{Address, MessageType};
use crate::errors::PersistenceError;
use crate::session::Session;

/// SeaORM-backed subscription registry.
#[derive(Clone, Debug)]
pub struct SeaOrmSubscriptionStore {
    session: Session,
}

impl SeaOrmSubscriptionStore {
    pub fn new(session: Session) -> Self { Self { session } }
}

fn client_endpoint(client: &Address) -> Result<String, PersistenceError> {
    client.validate()?;
    Ok(client.to_string())
}

/// Canonical strings of `message_types`, duplicates dropped, input order kept.
fn distinct_type_strings(message_types: &[MessageType]) -> Vec<String> {
    let mut seen = HashSet::new();
    message_types
        .iter()
        .map(ToString::to_string)
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

#[async_trait]
impl SubscriptionStorage for SeaOrmSubscriptionStore {
    async fn init(&self) -> Result<(), PersistenceError> {
        debug!("subscription_storage_init");
        Ok(())
    }

    #[instrument(skip_all, fields(client = %client, requested = message_types.len()))]
    async fn subscribe(&self, client: &Address, message_types: &[MessageType]) -> Result<(), PersistenceError> {
        let endpoint = client_endpoint(client)?;
        let types = distinct_type_strings(message_types);
        if types.is_empty() {
            return Ok(());
        }

        let txn = self.session.begin(None).await?;
        let existing: HashSet<String> = subscription::Entity::find()
            .select_only()
            .column(subscription::Column::MessageType)
            .filter(subscription::Column::SubscriberEndpoint.eq(endpoint.as_str()))
            .filter(subscription::Column::MessageType.is_in(types.clone()))
            .into_tuple::<String>()
            .all(&txn)
            .await?
            .into_iter()
            .collect();

        let mut pending = Vec::with_capacity(types.len());
        for message_type in &types {
            if existing.contains(message_type) {
                // dropping `txn` rolls back; nothing from this batch is kept
                debug!(%message_type, "subscription_exists_batch_abandoned");
                return Ok(());
            }
            pending.push(subscription::new_active(&endpoint, message_type)?);
        }

        let count = pending.len();
        subscription::Entity::insert_many(pending).exec_without_returning(&txn).await?;
        txn.commit().await?;
        debug!(count, "subscribed");
        Ok(())
    }

    #[instrument(skip_all, fields(client = %client, requested = message_types.len()))]
    async fn unsubscribe(&self, client: &Address, message_types: &[MessageType]) -> Result<(), PersistenceError> {
        let endpoint = client_endpoint(client)?;
        let types = distinct_type_strings(message_types);
        if types.is_empty() {
            return Ok(());
        }

        let txn = self.session.begin(None).await?;
        let res = subscription::Entity::delete_many()
            .filter(subscription::Column::SubscriberEndpoint.eq(endpoint.as_str()))
            .filter(subscription::Column::MessageType.is_in(types))
            .exec(&txn)
            .await?;
        txn.commit().await?;
        debug!(count = res.rows_affected, "unsubscribed");
        Ok(())
    }

    #[instrument(skip_all, fields(requested = message_types.len()))]
    async fn subscriber_addresses_for_message(&self, message_types: &[MessageType]) -> Result<Vec<Address>, PersistenceError> {
        let types = distinct_type_strings(message_types);
        if types.is_empty() {
            return Ok(Vec::new());
        }

        let txn = self.session.begin(None).await?;
        let endpoints: Vec<String> = subscription::Entity::find()
            .select_only()
            .column(subscription::Column::SubscriberEndpoint)
            .distinct()
            .filter(subscription::Column::MessageType.is_in(types))
            .into_tuple::<String>()
            .all(&txn)
            .await?;
        txn.commit().await?;

        let mut seen = HashSet::new();
        let mut addresses = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let address: Address = endpoint.parse()?;
            if seen.insert(address.clone()) {
                addresses.push(address);
            }
        }
        debug!(count = addresses.len(), "subscribers_resolved");
        Ok(addresses)
    }
}
