//! # Battery rental back office
//!
//! Billing, dashboards, settlement and battery status reconciliation for a
//! battery rental business operating in several cities.
//!
//! ## Architecture
//!
//! - **domain**: entities, city scoping and repository traits
//! - **application**: read engines, scoped catalog, write services and the
//!   [`BackOffice`] facade
//! - **infrastructure**: SeaORM store, migrations and the in-memory store
//! - **runtime**: process bootstrap shared by the binaries

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod runtime;
pub mod shared;

pub use application::BackOffice;
pub use config::{config_path, default_config_path, AppConfig};
pub use infrastructure::{init_database, DatabaseConfig, SeaOrmRepositoryProvider};
pub use runtime::{init_tracing, Runtime};
