//! Application layer
//!
//! Read engines (billing, dashboard, settlement, reconciliation), the scoped
//! catalog, write services and the facade tying them together.

pub mod back_office;
pub mod billing;
pub mod catalog;
pub mod context;
pub mod dashboard;
pub mod reconcile;
pub mod services;
pub mod settlement;

#[cfg(test)]
mod fixtures;

pub use back_office::BackOffice;
pub use billing::{BalanceEngine, GroupBalance, GroupStatement};
pub use catalog::Catalog;
pub use context::{RequestContext, ScopeResolver};
pub use dashboard::{CityAnalyticsEngine, DashboardAggregator};
pub use reconcile::{ReconcileReport, StatusReconciler};
pub use services::{PartnerService, PaymentService, RentalService, RepairService, SyncOutcome};
pub use settlement::{SettlementEngine, SettlementRow};
