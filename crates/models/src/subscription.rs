use sea_orm::{entity::prelude::*, Set};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors;

/// Column width shared by both key columns.
pub const MAX_KEY_LEN: usize = 450;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscription")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub subscriber_endpoint: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub message_type: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef { panic!("no relations defined here") }
}

impl ActiveModelBehavior for ActiveModel {}

fn validate_key(field: &str, value: &str) -> Result<(), errors::ModelError> {
    if value.trim().is_empty() {
        return Err(errors::ModelError::Validation(format!("{field} required")));
    }
    if value.len() > MAX_KEY_LEN {
        return Err(errors::ModelError::Validation(format!("{field} longer than {MAX_KEY_LEN} bytes")));
    }
    Ok(())
}

/// Build a validated, not yet persisted subscription row.
pub fn new_active(subscriber_endpoint: &str, message_type: &str) -> Result<ActiveModel, errors::ModelError> {
    validate_key("subscriber_endpoint", subscriber_endpoint)?;
    validate_key("message_type", message_type)?;
    Ok(ActiveModel {
        subscriber_endpoint: Set(subscriber_endpoint.to_string()),
        message_type: Set(message_type.to_string()),
        created_at: Set(Utc::now().into()),
    })
}
