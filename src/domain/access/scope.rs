//! City scope and entity-kind routing

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Set of cities a principal may read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CityScope {
    /// Superuser: no filter.
    Unrestricted,
    /// Moderator: exactly one city.
    Single(i32),
    /// Owner: one or more cities.
    Multi(BTreeSet<i32>),
    /// Non-superuser without any city. Matches nothing.
    Empty,
}

impl CityScope {
    /// Build an owner scope; an empty set yields [`CityScope::Empty`].
    pub fn multi(cities: impl IntoIterator<Item = i32>) -> Self {
        let cities: BTreeSet<i32> = cities.into_iter().collect();
        if cities.is_empty() {
            CityScope::Empty
        } else {
            CityScope::Multi(cities)
        }
    }

    pub fn allows(&self, city_id: Option<i32>) -> bool {
        match self {
            CityScope::Unrestricted => true,
            CityScope::Single(id) => city_id == Some(*id),
            CityScope::Multi(ids) => city_id.map_or(false, |c| ids.contains(&c)),
            CityScope::Empty => false,
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, CityScope::Unrestricted)
    }

    pub fn matches_nothing(&self) -> bool {
        matches!(self, CityScope::Empty)
    }

    /// Explicit city list, or `None` when unrestricted.
    pub fn city_ids(&self) -> Option<Vec<i32>> {
        match self {
            CityScope::Unrestricted => None,
            CityScope::Single(id) => Some(vec![*id]),
            CityScope::Multi(ids) => Some(ids.iter().copied().collect()),
            CityScope::Empty => Some(Vec::new()),
        }
    }
}

/// Kinds of entities a principal can list or open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    City,
    Client,
    Battery,
    Rental,
    Assignment,
    Payment,
    Repair,
    StatusLog,
    FinancePartner,
    MoneyTransfer,
    Expense,
    Dashboard,
}

impl EntityKind {
    pub const ALL: [EntityKind; 12] = [
        EntityKind::City,
        EntityKind::Client,
        EntityKind::Battery,
        EntityKind::Rental,
        EntityKind::Assignment,
        EntityKind::Payment,
        EntityKind::Repair,
        EntityKind::StatusLog,
        EntityKind::FinancePartner,
        EntityKind::MoneyTransfer,
        EntityKind::Expense,
        EntityKind::Dashboard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::City => "city",
            Self::Client => "client",
            Self::Battery => "battery",
            Self::Rental => "rental",
            Self::Assignment => "assignment",
            Self::Payment => "payment",
            Self::Repair => "repair",
            Self::StatusLog => "status_log",
            Self::FinancePartner => "finance_partner",
            Self::MoneyTransfer => "money_transfer",
            Self::Expense => "expense",
            Self::Dashboard => "dashboard",
        }
    }

    /// Where the city of this kind of entity is found.
    pub fn city_path(&self) -> CityPath {
        match self {
            Self::Assignment => CityPath::Via(EntityKind::Rental),
            Self::Repair | Self::StatusLog => CityPath::Via(EntityKind::Battery),
            Self::MoneyTransfer | Self::Expense => CityPath::Via(EntityKind::FinancePartner),
            _ => CityPath::Own,
        }
    }

    /// Whitelist applied to moderators when nothing is configured.
    pub fn moderator_default() -> BTreeSet<EntityKind> {
        [
            EntityKind::Rental,
            EntityKind::Client,
            EntityKind::Payment,
            EntityKind::Dashboard,
        ]
        .into_iter()
        .collect()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown entity kind '{}'", s))
    }
}

/// Field path from an entity to its city, at most one hop deep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CityPath {
    /// The entity carries its own `city` column.
    Own,
    /// The city lives on the referenced entity (`assignment → rental → city`).
    Via(EntityKind),
}

impl CityPath {
    pub fn field_path(&self) -> String {
        match self {
            CityPath::Own => "city".to_string(),
            CityPath::Via(kind) => format!("{}.city", kind.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_of_nothing_is_empty() {
        assert_eq!(CityScope::multi(Vec::new()), CityScope::Empty);
    }

    #[test]
    fn allows_by_variant() {
        assert!(CityScope::Unrestricted.allows(None));
        assert!(CityScope::Single(1).allows(Some(1)));
        assert!(!CityScope::Single(1).allows(Some(2)));
        assert!(!CityScope::Single(1).allows(None));
        let owner = CityScope::multi([1, 3]);
        assert!(owner.allows(Some(3)));
        assert!(!owner.allows(Some(2)));
        assert!(!CityScope::Empty.allows(Some(1)));
    }

    #[test]
    fn city_paths() {
        assert_eq!(EntityKind::Assignment.city_path().field_path(), "rental.city");
        assert_eq!(EntityKind::Repair.city_path().field_path(), "battery.city");
        assert_eq!(EntityKind::Client.city_path(), CityPath::Own);
    }

    #[test]
    fn entity_kind_parses() {
        assert_eq!("status_log".parse::<EntityKind>().unwrap(), EntityKind::StatusLog);
        assert!("spaceship".parse::<EntityKind>().is_err());
    }
}
