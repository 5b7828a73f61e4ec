//! Create repairs and battery_status_logs tables

use sea_orm_migration::prelude::*;

use super::m20240101_000004_create_batteries::Batteries;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Repairs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Repairs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Repairs::BatteryId).integer().not_null())
                    .col(
                        ColumnDef::new(Repairs::StartAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Repairs::EndAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Repairs::Description).text().not_null().default(""))
                    .col(
                        ColumnDef::new(Repairs::Cost)
                            .decimal_len(12, 2)
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_repairs_battery")
                            .from(Repairs::Table, Repairs::BatteryId)
                            .to(Batteries::Table, Batteries::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BatteryStatusLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BatteryStatusLogs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BatteryStatusLogs::BatteryId).integer().not_null())
                    .col(ColumnDef::new(BatteryStatusLogs::Kind).string_len(20).not_null())
                    .col(
                        ColumnDef::new(BatteryStatusLogs::StartAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BatteryStatusLogs::EndAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(BatteryStatusLogs::RentalId).integer())
                    .col(ColumnDef::new(BatteryStatusLogs::RepairId).integer())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_status_logs_battery")
                            .from(BatteryStatusLogs::Table, BatteryStatusLogs::BatteryId)
                            .to(Batteries::Table, Batteries::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_status_logs_battery_start")
                    .table(BatteryStatusLogs::Table)
                    .col(BatteryStatusLogs::BatteryId)
                    .col(BatteryStatusLogs::StartAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BatteryStatusLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Repairs::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Repairs {
    Table,
    Id,
    BatteryId,
    StartAt,
    EndAt,
    Description,
    Cost,
}

#[derive(Iden)]
pub enum BatteryStatusLogs {
    Table,
    Id,
    BatteryId,
    Kind,
    StartAt,
    EndAt,
    RentalId,
    RepairId,
}
