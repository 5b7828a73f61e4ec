//! Client domain entity

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct Client {
    pub id: i32,
    pub name: String,
    pub phone: String,
    pub note: String,
    pub city_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewClient {
    pub name: String,
    pub phone: String,
    pub note: String,
    pub city_id: Option<i32>,
}
