use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "timeout_data")]
pub struct Model {
    /// Time-sortable (v7) id assigned on insert.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Owning endpoint; chunk queries are scoped to it.
    pub endpoint: String,
    /// Canonical address to notify once due.
    pub destination: String,
    pub saga_id: Option<Uuid>,
    pub state: Vec<u8>,
    pub time: DateTimeUtc,
    /// Headers as a flat JSON object string.
    #[sea_orm(column_type = "Text")]
    pub headers: String,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef { panic!("no relations defined here") }
}

impl ActiveModelBehavior for ActiveModel {}
