//! Access aggregate
//!
//! City scope, entity kinds and the acting principal.

pub mod scope;

pub use scope::{CityPath, CityScope, EntityKind};

/// Authenticated user acting on the back-office.
///
/// Authentication is done upstream; the core only needs identity and the
/// superuser flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i32,
    pub username: String,
    pub is_superuser: bool,
}

impl Principal {
    pub fn new(user_id: i32, username: impl Into<String>, is_superuser: bool) -> Self {
        Self {
            user_id,
            username: username.into(),
            is_superuser,
        }
    }
}
