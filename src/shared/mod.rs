pub mod errors;
pub mod time;

pub use errors::*;
pub use time::{month_start, previous_month_start, Calendar, ANCHOR_HOUR};
