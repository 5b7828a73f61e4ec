//! City aggregate

pub mod model;
pub mod repository;

pub use model::{City, NewCity};
pub use repository::CityRepository;
