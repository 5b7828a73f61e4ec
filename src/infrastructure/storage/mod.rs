//! In-process entity store

mod memory;

pub use memory::InMemoryStore;
