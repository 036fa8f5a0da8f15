//! Connector entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "connectors")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub station_id: String,

    /// Connector number on the station (1, 2, etc.)
    pub connector_id: i32,

    #[sea_orm(nullable)]
    pub name: Option<String>,

    /// Status string as reported by the station
    #[sea_orm(nullable)]
    pub last_status: Option<String>,
    #[sea_orm(nullable)]
    pub last_status_time: Option<DateTimeUtc>,

    /// kWh
    #[sea_orm(nullable)]
    pub last_meter: Option<f64>,
    #[sea_orm(nullable)]
    pub last_meter_time: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub error_code: Option<String>,
    #[sea_orm(nullable)]
    pub info: Option<String>,
    #[sea_orm(nullable)]
    pub vendor_id: Option<String>,
    #[sea_orm(nullable)]
    pub vendor_error_code: Option<String>,
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
