//! Rental aggregate
//!
//! Contract versions, battery assignments and group-level types.

pub mod model;
pub mod repository;

pub use model::{
    daily_rate, default_contract_code, validate_interval, Assignment, NewAssignment, NewRental,
    NewVersion, Rental, RentalGroup, RentalStatus, RentalVersion,
};
pub use repository::{AssignmentRepository, RentalRepository, ScopedAssignment};
