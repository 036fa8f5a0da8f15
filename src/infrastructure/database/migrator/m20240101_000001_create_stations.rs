//! Create stations and connectors tables

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Stations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Stations::StationId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Stations::Name).string())
                    .col(ColumnDef::new(Stations::Username).string())
                    .col(ColumnDef::new(Stations::Password).string())
                    .col(ColumnDef::new(Stations::ClientCertThumbprint).string())
                    .col(ColumnDef::new(Stations::Vendor).string())
                    .col(ColumnDef::new(Stations::Model).string())
                    .col(ColumnDef::new(Stations::ChargePointSerial).string())
                    .col(ColumnDef::new(Stations::ChargeBoxSerial).string())
                    .col(ColumnDef::new(Stations::FirmwareVersion).string())
                    .col(ColumnDef::new(Stations::Iccid).string())
                    .col(ColumnDef::new(Stations::Imsi).string())
                    .col(ColumnDef::new(Stations::MeterType).string())
                    .col(ColumnDef::new(Stations::MeterSerial).string())
                    .col(ColumnDef::new(Stations::ClockTime).timestamp_with_time_zone())
                    .col(ColumnDef::new(Stations::HeartbeatInterval).integer())
                    .col(ColumnDef::new(Stations::LastSeen).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Connectors::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Connectors::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Connectors::StationId).string().not_null())
                    .col(ColumnDef::new(Connectors::ConnectorId).integer().not_null())
                    .col(ColumnDef::new(Connectors::Name).string())
                    .col(ColumnDef::new(Connectors::LastStatus).string())
                    .col(ColumnDef::new(Connectors::LastStatusTime).timestamp_with_time_zone())
                    .col(ColumnDef::new(Connectors::LastMeter).double())
                    .col(ColumnDef::new(Connectors::LastMeterTime).timestamp_with_time_zone())
                    .col(ColumnDef::new(Connectors::ErrorCode).string())
                    .col(ColumnDef::new(Connectors::Info).string())
                    .col(ColumnDef::new(Connectors::VendorId).string())
                    .col(ColumnDef::new(Connectors::VendorErrorCode).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_connectors_station")
                            .from(Connectors::Table, Connectors::StationId)
                            .to(Stations::Table, Stations::StationId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One row per (station, connector number)
        manager
            .create_index(
                Index::create()
                    .name("idx_connectors_station_connector")
                    .table(Connectors::Table)
                    .col(Connectors::StationId)
                    .col(Connectors::ConnectorId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Connectors::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Stations::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Stations {
    Table,
    StationId,
    Name,
    Username,
    Password,
    ClientCertThumbprint,
    Vendor,
    Model,
    ChargePointSerial,
    ChargeBoxSerial,
    FirmwareVersion,
    Iccid,
    Imsi,
    MeterType,
    MeterSerial,
    ClockTime,
    HeartbeatInterval,
    LastSeen,
}

#[derive(Iden)]
pub enum Connectors {
    Table,
    Id,
    StationId,
    ConnectorId,
    Name,
    LastStatus,
    LastStatusTime,
    LastMeter,
    LastMeterTime,
    ErrorCode,
    Info,
    VendorId,
    VendorErrorCode,
}
