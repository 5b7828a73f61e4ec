//! Battery domain entity

use std::fmt;

use rust_decimal::Decimal;

use crate::domain::access::CityScope;

/// Canonical battery status. Derived by the status reconciler, never
/// edited directly by user operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BatteryStatus {
    Available,
    Rented,
    Service,
    Sold,
}

impl BatteryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Rented => "rented",
            Self::Service => "service",
            Self::Sold => "sold",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "available" => Some(Self::Available),
            "rented" => Some(Self::Rented),
            "service" => Some(Self::Service),
            "sold" => Some(Self::Sold),
            _ => None,
        }
    }
}

impl Default for BatteryStatus {
    fn default() -> Self {
        Self::Available
    }
}

impl fmt::Display for BatteryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Battery {
    pub id: i32,
    /// Unique label printed on the battery.
    pub short_code: String,
    pub serial_number: String,
    pub cost_price: Decimal,
    /// Stored status; may drift from the derived one until reconciled.
    pub status: BatteryStatus,
    pub city_id: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct NewBattery {
    pub short_code: String,
    pub serial_number: String,
    pub cost_price: Decimal,
    pub status: BatteryStatus,
    pub city_id: Option<i32>,
}

/// Battery listing filter.
#[derive(Debug, Clone)]
pub struct BatteryFilter {
    pub scope: CityScope,
    pub ids: Option<Vec<i32>>,
    pub statuses: Option<Vec<BatteryStatus>>,
}

impl BatteryFilter {
    pub fn scoped(scope: CityScope) -> Self {
        Self {
            scope,
            ids: None,
            statuses: None,
        }
    }

    pub fn matches(&self, battery: &Battery) -> bool {
        self.scope.allows(battery.city_id)
            && self.ids.as_ref().map_or(true, |ids| ids.contains(&battery.id))
            && self
                .statuses
                .as_ref()
                .map_or(true, |s| s.contains(&battery.status))
    }
}
