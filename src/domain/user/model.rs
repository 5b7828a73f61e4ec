use chrono::{DateTime, Utc};

use crate::domain::access::Principal;

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub is_superuser: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn principal(&self) -> Principal {
        Principal::new(self.id, self.username.clone(), self.is_superuser)
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub is_superuser: bool,
}
