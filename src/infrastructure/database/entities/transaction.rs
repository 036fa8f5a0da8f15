//! Transaction entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub station_id: String,
    pub connector_id: i32,

    /// OCPP 2.0.1 transactionId
    #[sea_orm(nullable)]
    pub device_uid: Option<String>,

    pub start_tag_pk: i32,
    pub start_tag_id: String,
    pub start_time: DateTimeUtc,
    /// kWh
    pub meter_start: f64,

    #[sea_orm(nullable)]
    pub stop_tag_pk: Option<i32>,
    #[sea_orm(nullable)]
    pub stop_tag_id: Option<String>,
    #[sea_orm(nullable)]
    pub stop_time: Option<DateTimeUtc>,
    /// kWh
    #[sea_orm(nullable)]
    pub meter_stop: Option<f64>,

    /// Reason for stopping: EmergencyStop, EVDisconnected, HardReset, Local,
    /// Other, PowerLoss, Reboot, Remote, SoftReset, UnlockCommand, DeAuthorized
    #[sea_orm(nullable)]
    pub stop_reason: Option<String>,

    /// Started, Completed, Terminated
    pub status: String,

    /// JSON array of the sampled values sent with the stop
    #[sea_orm(column_type = "Text", nullable)]
    pub transaction_data: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::station::Entity",
        from = "Column::StationId",
        to = "super::station::Column::StationId"
    )]
    Station,
}

impl Related<super::station::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Station.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
