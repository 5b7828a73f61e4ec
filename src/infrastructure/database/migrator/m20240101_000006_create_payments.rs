//! Create payments table

use sea_orm_migration::prelude::*;

use super::m20240101_000005_create_rentals::Rentals;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Payments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Payments::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Payments::RentalId).integer().not_null())
                    .col(ColumnDef::new(Payments::Amount).decimal_len(12, 2).not_null())
                    .col(ColumnDef::new(Payments::Date).date().not_null())
                    .col(ColumnDef::new(Payments::PaymentType).string_len(20).not_null())
                    .col(
                        ColumnDef::new(Payments::Method)
                            .string_len(20)
                            .not_null()
                            .default("cash"),
                    )
                    .col(ColumnDef::new(Payments::Note).text().not_null().default(""))
                    .col(ColumnDef::new(Payments::CreatedBy).integer())
                    .col(ColumnDef::new(Payments::CityId).integer())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payments_rental")
                            .from(Payments::Table, Payments::RentalId)
                            .to(Rentals::Table, Rentals::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payments_rental_type")
                    .table(Payments::Table)
                    .col(Payments::RentalId)
                    .col(Payments::PaymentType)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payments_date")
                    .table(Payments::Table)
                    .col(Payments::Date)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Payments::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Payments {
    Table,
    Id,
    RentalId,
    Amount,
    Date,
    PaymentType,
    Method,
    Note,
    CreatedBy,
    CityId,
}
