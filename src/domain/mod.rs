pub mod access;
pub mod battery;
pub mod city;
pub mod client;
pub mod finance;
pub mod payment;
pub mod rental;
pub mod repair;
pub mod repositories;
pub mod user;

// Re-export commonly used types
pub use access::{CityPath, CityScope, EntityKind, Principal};
pub use battery::{Battery, BatteryFilter, BatteryStatus, LogSource, StatusLogEntry};
pub use city::City;
pub use client::Client;
pub use finance::{FinancePartner, MoneyTransfer, PartnerRole, TransferPurpose};
pub use payment::{Payment, PaymentFilter, PaymentMethod, PaymentType};
pub use rental::{Assignment, Rental, RentalGroup, RentalStatus, RentalVersion, ScopedAssignment};
pub use repair::Repair;
pub use repositories::{DomainResult, RepositoryProvider};
pub use user::User;

// Re-export DomainError from shared for convenience
pub use crate::shared::errors::DomainError;
