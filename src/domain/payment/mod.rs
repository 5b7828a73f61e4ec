//! Payment aggregate

pub mod model;
pub mod repository;

pub use model::{NewPayment, Payment, PaymentFilter, PaymentMethod, PaymentType};
pub use repository::PaymentRepository;
