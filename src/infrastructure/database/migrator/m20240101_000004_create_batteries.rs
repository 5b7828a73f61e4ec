//! Create batteries table

use sea_orm_migration::prelude::*;

use super::m20240101_000002_create_cities::Cities;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Batteries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Batteries::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Batteries::ShortCode)
                            .string_len(32)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Batteries::SerialNumber)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Batteries::CostPrice)
                            .decimal_len(12, 2)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Batteries::Status)
                            .string_len(20)
                            .not_null()
                            .default("available"),
                    )
                    .col(ColumnDef::new(Batteries::CityId).integer())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_batteries_city")
                            .from(Batteries::Table, Batteries::CityId)
                            .to(Cities::Table, Cities::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_batteries_status")
                    .table(Batteries::Table)
                    .col(Batteries::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Batteries::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Batteries {
    Table,
    Id,
    ShortCode,
    SerialNumber,
    CostPrice,
    Status,
    CityId,
}
