//! Create charge_tags and access_grants tables

use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_stations::Stations;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ChargeTags::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ChargeTags::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ChargeTags::TagId)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(ChargeTags::Name).string())
                    .col(ColumnDef::new(ChargeTags::ParentTagId).string())
                    .col(ColumnDef::new(ChargeTags::Expiry).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(ChargeTags::Status)
                            .string()
                            .not_null()
                            .default("Accepted"),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AccessGrants::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AccessGrants::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AccessGrants::TagPk).integer().not_null())
                    .col(ColumnDef::new(AccessGrants::StationId).string().not_null())
                    .col(
                        ColumnDef::new(AccessGrants::Status)
                            .string()
                            .not_null()
                            .default("Accepted"),
                    )
                    .col(ColumnDef::new(AccessGrants::Expiry).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(AccessGrants::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_access_grants_tag")
                            .from(AccessGrants::Table, AccessGrants::TagPk)
                            .to(ChargeTags::Table, ChargeTags::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_access_grants_station")
                            .from(AccessGrants::Table, AccessGrants::StationId)
                            .to(Stations::Table, Stations::StationId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_access_grants_tag_station")
                    .table(AccessGrants::Table)
                    .col(AccessGrants::TagPk)
                    .col(AccessGrants::StationId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AccessGrants::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ChargeTags::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum ChargeTags {
    Table,
    Id,
    TagId,
    Name,
    ParentTagId,
    Expiry,
    Status,
}

#[derive(Iden)]
pub enum AccessGrants {
    Table,
    Id,
    TagPk,
    StationId,
    Status,
    Expiry,
    UpdatedAt,
}
