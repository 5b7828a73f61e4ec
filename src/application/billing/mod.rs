//! Billing: assignment clipping, charges and balances

pub mod assignments;
pub mod balance;
pub mod charges;

pub use assignments::{clip, clipped_assignments, ClippedAssignment};
pub use balance::{
    balances_of, group_deposit, group_paid, summarize, BalanceEngine, GroupBalance,
    GroupStatement, BALANCE_PAYMENT_TYPES,
};
pub use charges::{group_charges, version_breakdown, VersionCharges};
