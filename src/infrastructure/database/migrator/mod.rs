//! Database migrations module

pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_users;
mod m20240101_000002_create_cities;
mod m20240101_000003_create_clients;
mod m20240101_000004_create_batteries;
mod m20240101_000005_create_rentals;
mod m20240101_000006_create_payments;
mod m20240101_000007_create_repairs_and_status_logs;
mod m20240101_000008_create_finance;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_users::Migration),
            Box::new(m20240101_000002_create_cities::Migration),
            Box::new(m20240101_000003_create_clients::Migration),
            Box::new(m20240101_000004_create_batteries::Migration),
            Box::new(m20240101_000005_create_rentals::Migration),
            Box::new(m20240101_000006_create_payments::Migration),
            Box::new(m20240101_000007_create_repairs_and_status_logs::Migration),
            Box::new(m20240101_000008_create_finance::Migration),
        ]
    }
}
