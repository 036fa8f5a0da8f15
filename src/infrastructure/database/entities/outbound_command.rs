//! Outbound command entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "outbound_commands")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub uid: String,

    pub station_id: String,

    #[sea_orm(nullable)]
    pub connector_id: Option<i32>,

    #[sea_orm(nullable)]
    pub tag_id: Option<String>,

    pub command_type: String,

    /// Request payload as JSON text
    #[sea_orm(column_type = "Text")]
    pub payload: String,

    /// Queued, Sent, Completed, Failed, Cancelled
    pub status: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub result: Option<String>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
