//! Access grant entity: one tag on one station

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "access_grants")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub tag_pk: i32,
    pub station_id: String,

    pub status: String,

    #[sea_orm(nullable)]
    pub expiry: Option<DateTimeUtc>,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::charge_tag::Entity",
        from = "Column::TagPk",
        to = "super::charge_tag::Column::Id"
    )]
    ChargeTag,
}

impl Related<super::charge_tag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChargeTag.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
