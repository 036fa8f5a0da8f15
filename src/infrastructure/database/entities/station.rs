//! Station entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "stations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub station_id: String,

    #[sea_orm(nullable)]
    pub name: Option<String>,
    #[sea_orm(nullable)]
    pub username: Option<String>,
    /// Plain text or bcrypt hash
    #[sea_orm(nullable)]
    pub password: Option<String>,
    #[sea_orm(nullable)]
    pub client_cert_thumbprint: Option<String>,

    #[sea_orm(nullable)]
    pub vendor: Option<String>,
    #[sea_orm(nullable)]
    pub model: Option<String>,
    #[sea_orm(nullable)]
    pub charge_point_serial: Option<String>,
    #[sea_orm(nullable)]
    pub charge_box_serial: Option<String>,
    #[sea_orm(nullable)]
    pub firmware_version: Option<String>,
    #[sea_orm(nullable)]
    pub iccid: Option<String>,
    #[sea_orm(nullable)]
    pub imsi: Option<String>,
    #[sea_orm(nullable)]
    pub meter_type: Option<String>,
    #[sea_orm(nullable)]
    pub meter_serial: Option<String>,

    #[sea_orm(nullable)]
    pub clock_time: Option<DateTimeUtc>,
    #[sea_orm(nullable)]
    pub heartbeat_interval: Option<i32>,
    #[sea_orm(nullable)]
    pub last_seen: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::connector::Entity")]
    Connectors,
}

impl Related<super::connector::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Connectors.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
