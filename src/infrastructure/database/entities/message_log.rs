//! Message log entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "message_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub log_time: DateTimeUtc,
    pub station_id: String,

    #[sea_orm(nullable)]
    pub connector_id: Option<i32>,

    pub message: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub result: Option<String>,

    #[sea_orm(nullable)]
    pub error_code: Option<String>,

    /// "in" or "out"
    pub direction: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
