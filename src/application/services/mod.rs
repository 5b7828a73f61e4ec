//! Write services
//!
//! Each service call checks scope first, then writes through the
//! repositories and keeps the battery status log in step.

mod partners;
mod payments;
mod rentals;
mod repairs;

pub use partners::{PartnerService, SyncOutcome};
pub use payments::{PaymentInput, PaymentService};
pub use rentals::{RentalService, END_REASON_RETURNED, END_REASON_UPGRADE};
pub use repairs::RepairService;
