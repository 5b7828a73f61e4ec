//! Create clients table

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
                    .table(Clients::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Clients::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Clients::Name).string().not_null())
                    .col(ColumnDef::new(Clients::Phone).string().not_null().default(""))
                    .col(ColumnDef::new(Clients::Note).text().not_null().default(""))
                    .col(ColumnDef::new(Clients::CityId).integer())
                    .col(
                        ColumnDef::new(Clients::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_clients_city")
                            .from(Clients::Table, Clients::CityId)
                            .to(Cities::Table, Cities::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_clients_city")
                    .table(Clients::Table)
                    .col(Clients::CityId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Clients::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Clients {
    Table,
    Id,
    Name,
    Phone,
    Note,
    CityId,
    CreatedAt,
}
