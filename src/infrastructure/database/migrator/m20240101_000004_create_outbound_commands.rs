//! Create outbound_commands and message_log tables

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OutboundCommands::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OutboundCommands::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OutboundCommands::Uid)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(OutboundCommands::StationId).string().not_null())
                    .col(ColumnDef::new(OutboundCommands::ConnectorId).integer())
                    .col(ColumnDef::new(OutboundCommands::TagId).string())
                    .col(ColumnDef::new(OutboundCommands::CommandType).string().not_null())
                    .col(ColumnDef::new(OutboundCommands::Payload).text().not_null())
                    .col(
                        ColumnDef::new(OutboundCommands::Status)
                            .string()
                            .not_null()
                            .default("Queued"),
                    )
                    .col(ColumnDef::new(OutboundCommands::Result).text())
                    .col(
                        ColumnDef::new(OutboundCommands::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OutboundCommands::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_outbound_commands_station_status")
                    .table(OutboundCommands::Table)
                    .col(OutboundCommands::StationId)
                    .col(OutboundCommands::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MessageLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MessageLog::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(MessageLog::LogTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MessageLog::StationId).string().not_null())
                    .col(ColumnDef::new(MessageLog::ConnectorId).integer())
                    .col(ColumnDef::new(MessageLog::Message).string().not_null())
                    .col(ColumnDef::new(MessageLog::Result).text())
                    .col(ColumnDef::new(MessageLog::ErrorCode).string())
                    .col(ColumnDef::new(MessageLog::Direction).string().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MessageLog::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OutboundCommands::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum OutboundCommands {
    Table,
    Id,
    Uid,
    StationId,
    ConnectorId,
    TagId,
    CommandType,
    Payload,
    Status,
    Result,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum MessageLog {
    Table,
    Id,
    LogTime,
    StationId,
    ConnectorId,
    Message,
    Result,
    ErrorCode,
    Direction,
}
