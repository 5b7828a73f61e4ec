//! Battery aggregate
//!
//! Battery entity, its derived status and the append-only status log.

pub mod model;
pub mod repository;
pub mod status_log;

pub use model::{Battery, BatteryFilter, BatteryStatus, NewBattery};
pub use repository::{BatteryRepository, StatusLogRepository};
pub use status_log::{LogSource, StatusLogEntry};
