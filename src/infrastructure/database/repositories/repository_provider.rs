//! SeaORM implementation of RepositoryProvider

use sea_orm::DatabaseConnection;

use crate::domain::battery::{BatteryRepository, StatusLogRepository};
use crate::domain::city::CityRepository;
use crate::domain::client::ClientRepository;
use crate::domain::finance::FinanceRepository;
use crate::domain::payment::PaymentRepository;
use crate::domain::rental::{AssignmentRepository, RentalRepository};
use crate::domain::repair::RepairRepository;
use crate::domain::repositories::RepositoryProvider;
use crate::domain::user::UserRepository;

use super::battery_repository::{SeaOrmBatteryRepository, SeaOrmStatusLogRepository};
use super::city_repository::SeaOrmCityRepository;
use super::client_repository::SeaOrmClientRepository;
use super::finance_repository::SeaOrmFinanceRepository;
use super::payment_repository::SeaOrmPaymentRepository;
use super::rental_repository::{SeaOrmAssignmentRepository, SeaOrmRentalRepository};
use super::repair_repository::SeaOrmRepairRepository;
use super::user_repository::SeaOrmUserRepository;

/// Unified repository provider backed by SeaORM.
///
/// Holds one connection pool and exposes per-aggregate repository accessors.
///
/// ```ignore
/// let repos = SeaOrmRepositoryProvider::new(db.clone());
/// let groups = repos.rentals().groups_by_root_ids(&[42]).await?;
/// let open = repos.repairs().open_repairs(&CityScope::Unrestricted).await?;
/// ```
pub struct SeaOrmRepositoryProvider {
    cities: SeaOrmCityRepository,
    clients: SeaOrmClientRepository,
    batteries: SeaOrmBatteryRepository,
    status_log: SeaOrmStatusLogRepository,
    rentals: SeaOrmRentalRepository,
    assignments: SeaOrmAssignmentRepository,
    payments: SeaOrmPaymentRepository,
    repairs: SeaOrmRepairRepository,
    finance: SeaOrmFinanceRepository,
    users: SeaOrmUserRepository,
}

impl SeaOrmRepositoryProvider {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            cities: SeaOrmCityRepository::new(db.clone()),
            clients: SeaOrmClientRepository::new(db.clone()),
            batteries: SeaOrmBatteryRepository::new(db.clone()),
            status_log: SeaOrmStatusLogRepository::new(db.clone()),
            rentals: SeaOrmRentalRepository::new(db.clone()),
            assignments: SeaOrmAssignmentRepository::new(db.clone()),
            payments: SeaOrmPaymentRepository::new(db.clone()),
            repairs: SeaOrmRepairRepository::new(db.clone()),
            finance: SeaOrmFinanceRepository::new(db.clone()),
            users: SeaOrmUserRepository::new(db),
        }
    }
}

impl RepositoryProvider for SeaOrmRepositoryProvider {
    fn cities(&self) -> &dyn CityRepository {
        &self.cities
    }

    fn clients(&self) -> &dyn ClientRepository {
        &self.clients
    }

    fn batteries(&self) -> &dyn BatteryRepository {
        &self.batteries
    }

    fn status_log(&self) -> &dyn StatusLogRepository {
        &self.status_log
    }

    fn rentals(&self) -> &dyn RentalRepository {
        &self.rentals
    }

    fn assignments(&self) -> &dyn AssignmentRepository {
        &self.assignments
    }

    fn payments(&self) -> &dyn PaymentRepository {
        &self.payments
    }

    fn repairs(&self) -> &dyn RepairRepository {
        &self.repairs
    }

    fn finance(&self) -> &dyn FinanceRepository {
        &self.finance
    }

    fn users(&self) -> &dyn UserRepository {
        &self.users
    }
}
