//! Dashboard and city analytics

pub mod aggregator;
pub mod city_analytics;
pub mod dto;

pub use aggregator::DashboardAggregator;
pub use city_analytics::CityAnalyticsEngine;
pub use dto::*;
