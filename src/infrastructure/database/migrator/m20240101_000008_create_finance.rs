//! Create finance tables: partners, partner cities, transfers, expenses

use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_users::Users;
use super::m20240101_000002_create_cities::Cities;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FinancePartners::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FinancePartners::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(FinancePartners::UserId)
                            .integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(FinancePartners::Role).string_len(20).not_null())
                    .col(ColumnDef::new(FinancePartners::CityId).integer())
                    .col(
                        ColumnDef::new(FinancePartners::RewardPercent)
                            .decimal_len(5, 2)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(FinancePartners::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_finance_partners_user")
                            .from(FinancePartners::Table, FinancePartners::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_finance_partners_city")
                            .from(FinancePartners::Table, FinancePartners::CityId)
                            .to(Cities::Table, Cities::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FinancePartnerCities::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(FinancePartnerCities::PartnerId).integer().not_null())
                    .col(ColumnDef::new(FinancePartnerCities::CityId).integer().not_null())
                    .primary_key(
                        Index::create()
                            .col(FinancePartnerCities::PartnerId)
                            .col(FinancePartnerCities::CityId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_partner_cities_partner")
                            .from(FinancePartnerCities::Table, FinancePartnerCities::PartnerId)
                            .to(FinancePartners::Table, FinancePartners::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_partner_cities_city")
                            .from(FinancePartnerCities::Table, FinancePartnerCities::CityId)
                            .to(Cities::Table, Cities::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MoneyTransfers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MoneyTransfers::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MoneyTransfers::FromPartnerId).integer().not_null())
                    .col(ColumnDef::new(MoneyTransfers::ToPartnerId).integer().not_null())
                    .col(ColumnDef::new(MoneyTransfers::Amount).decimal_len(12, 2).not_null())
                    .col(ColumnDef::new(MoneyTransfers::Date).date().not_null())
                    .col(
                        ColumnDef::new(MoneyTransfers::Purpose)
                            .string_len(32)
                            .not_null()
                            .default("other"),
                    )
                    .col(
                        ColumnDef::new(MoneyTransfers::UseCollected)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transfers_from")
                            .from(MoneyTransfers::Table, MoneyTransfers::FromPartnerId)
                            .to(FinancePartners::Table, FinancePartners::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transfers_to")
                            .from(MoneyTransfers::Table, MoneyTransfers::ToPartnerId)
                            .to(FinancePartners::Table, FinancePartners::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ExpenseCategories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ExpenseCategories::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ExpenseCategories::Name)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Expenses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Expenses::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Expenses::Amount).decimal_len(12, 2).not_null())
                    .col(ColumnDef::new(Expenses::Date).date().not_null())
                    .col(ColumnDef::new(Expenses::CategoryId).integer())
                    .col(
                        ColumnDef::new(Expenses::PaymentType)
                            .string_len(20)
                            .not_null()
                            .default("purchase"),
                    )
                    .col(ColumnDef::new(Expenses::PaidByPartnerId).integer())
                    .col(ColumnDef::new(Expenses::Note).text().not_null().default(""))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_expenses_category")
                            .from(Expenses::Table, Expenses::CategoryId)
                            .to(ExpenseCategories::Table, ExpenseCategories::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_expenses_partner")
                            .from(Expenses::Table, Expenses::PaidByPartnerId)
                            .to(FinancePartners::Table, FinancePartners::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Expenses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ExpenseCategories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MoneyTransfers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FinancePartnerCities::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FinancePartners::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum FinancePartners {
    Table,
    Id,
    UserId,
    Role,
    CityId,
    RewardPercent,
    Active,
}

#[derive(Iden)]
pub enum FinancePartnerCities {
    Table,
    PartnerId,
    CityId,
}

#[derive(Iden)]
pub enum MoneyTransfers {
    Table,
    Id,
    FromPartnerId,
    ToPartnerId,
    Amount,
    Date,
    Purpose,
    UseCollected,
}

#[derive(Iden)]
pub enum ExpenseCategories {
    Table,
    Id,
    Name,
}

#[derive(Iden)]
pub enum Expenses {
    Table,
    Id,
    Amount,
    Date,
    CategoryId,
    PaymentType,
    PaidByPartnerId,
    Note,
}
