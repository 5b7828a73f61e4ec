//! Create rentals and rental_battery_assignments tables

use sea_orm_migration::prelude::*;

use super::m20240101_000002_create_cities::Cities;
use super::m20240101_000003_create_clients::Clients;
use super::m20240101_000004_create_batteries::Batteries;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Rentals::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Rentals::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Rentals::ClientId).integer().not_null())
                    .col(
                        ColumnDef::new(Rentals::StartAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Rentals::EndAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Rentals::WeeklyRate).decimal_len(12, 2).not_null())
                    .col(
                        ColumnDef::new(Rentals::DepositAmount)
                            .decimal_len(12, 2)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Rentals::Status)
                            .string_len(20)
                            .not_null()
                            .default("active"),
                    )
                    .col(ColumnDef::new(Rentals::ParentId).integer())
                    .col(ColumnDef::new(Rentals::RootId).integer())
                    .col(ColumnDef::new(Rentals::Version).integer().not_null().default(1))
                    .col(ColumnDef::new(Rentals::ContractCode).string().not_null())
                    .col(ColumnDef::new(Rentals::CityId).integer())
                    .col(
                        ColumnDef::new(Rentals::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rentals_client")
                            .from(Rentals::Table, Rentals::ClientId)
                            .to(Clients::Table, Clients::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rentals_city")
                            .from(Rentals::Table, Rentals::CityId)
                            .to(Cities::Table, Cities::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // One row per (group, version)
        manager
            .create_index(
                Index::create()
                    .name("idx_rentals_root_version")
                    .table(Rentals::Table)
                    .col(Rentals::RootId)
                    .col(Rentals::Version)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_rentals_status")
                    .table(Rentals::Table)
                    .col(Rentals::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RentalBatteryAssignments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RentalBatteryAssignments::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RentalBatteryAssignments::RentalId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RentalBatteryAssignments::BatteryId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RentalBatteryAssignments::StartAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RentalBatteryAssignments::EndAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(RentalBatteryAssignments::EndReason).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_assignments_rental")
                            .from(RentalBatteryAssignments::Table, RentalBatteryAssignments::RentalId)
                            .to(Rentals::Table, Rentals::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_assignments_battery")
                            .from(RentalBatteryAssignments::Table, RentalBatteryAssignments::BatteryId)
                            .to(Batteries::Table, Batteries::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_assignments_battery")
                    .table(RentalBatteryAssignments::Table)
                    .col(RentalBatteryAssignments::BatteryId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_assignments_rental")
                    .table(RentalBatteryAssignments::Table)
                    .col(RentalBatteryAssignments::RentalId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RentalBatteryAssignments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Rentals::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Rentals {
    Table,
    Id,
    ClientId,
    StartAt,
    EndAt,
    WeeklyRate,
    DepositAmount,
    Status,
    ParentId,
    RootId,
    Version,
    ContractCode,
    CityId,
    CreatedAt,
}

#[derive(Iden)]
pub enum RentalBatteryAssignments {
    Table,
    Id,
    RentalId,
    BatteryId,
    StartAt,
    EndAt,
    EndReason,
}
