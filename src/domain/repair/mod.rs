//! Repair aggregate

pub mod model;
pub mod repository;

pub use model::{NewRepair, Repair};
pub use repository::RepairRepository;
