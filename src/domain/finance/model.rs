//! Finance domain entities

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::access::CityScope;
use crate::shared::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartnerRole {
    /// Cash-collecting agent tied to one city.
    Moderator,
    /// Operator of one or more cities.
    Owner,
}

impl PartnerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Moderator => "moderator",
            Self::Owner => "owner",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "moderator" => Some(Self::Moderator),
            "owner" => Some(Self::Owner),
            _ => None,
        }
    }
}

impl fmt::Display for PartnerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinancePartner {
    pub id: i32,
    pub user_id: i32,
    pub role: PartnerRole,
    pub city_id: Option<i32>,
    /// Additional cities, owners only.
    pub cities: BTreeSet<i32>,
    pub reward_percent: Decimal,
    pub active: bool,
}

impl FinancePartner {
    /// `city ∪ cities`.
    pub fn all_cities(&self) -> BTreeSet<i32> {
        let mut all = self.cities.clone();
        all.extend(self.city_id);
        all
    }

    /// Scope granted by this partner record.
    pub fn scope(&self) -> CityScope {
        match self.role {
            PartnerRole::Moderator => self.city_id.map_or(CityScope::Empty, CityScope::Single),
            PartnerRole::Owner => CityScope::multi(self.all_cities()),
        }
    }

    /// Whether any of the partner's cities falls inside `scope`.
    pub fn in_scope(&self, scope: &CityScope) -> bool {
        scope.is_unrestricted() || self.all_cities().into_iter().any(|c| scope.allows(Some(c)))
    }

    /// Whether the partner sees a city through its own or extra cities.
    pub fn covers_city(&self, city_id: Option<i32>) -> bool {
        city_id.map_or(false, |c| self.city_id == Some(c) || self.cities.contains(&c))
    }
}

#[derive(Debug, Clone)]
pub struct NewFinancePartner {
    pub user_id: i32,
    pub role: PartnerRole,
    pub city_id: Option<i32>,
    pub cities: BTreeSet<i32>,
    pub reward_percent: Decimal,
}

impl NewFinancePartner {
    pub fn validate(&self) -> DomainResult<()> {
        match self.role {
            PartnerRole::Moderator if !self.cities.is_empty() => Err(DomainError::Validation(
                "a moderator is bound to exactly one city".to_string(),
            )),
            PartnerRole::Owner if self.city_id.is_none() && self.cities.is_empty() => Err(
                DomainError::Validation("an owner needs at least one city".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PartnerFilter {
    pub scope: CityScope,
    pub role: Option<PartnerRole>,
    pub active_only: bool,
}

impl PartnerFilter {
    pub fn active_moderators(scope: CityScope) -> Self {
        Self {
            scope,
            role: Some(PartnerRole::Moderator),
            active_only: true,
        }
    }

    pub fn matches(&self, p: &FinancePartner) -> bool {
        p.in_scope(&self.scope)
            && self.role.map_or(true, |r| r == p.role)
            && (!self.active_only || p.active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferPurpose {
    ModeratorToOwner,
    OwnerToOwner,
    OwnerToModerator,
    Other,
}

impl TransferPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModeratorToOwner => "moderator_to_owner",
            Self::OwnerToOwner => "owner_to_owner",
            Self::OwnerToModerator => "owner_to_moderator",
            Self::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "moderator_to_owner" => Some(Self::ModeratorToOwner),
            "owner_to_owner" => Some(Self::OwnerToOwner),
            "owner_to_moderator" => Some(Self::OwnerToModerator),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoneyTransfer {
    pub id: i32,
    pub from_partner_id: i32,
    pub to_partner_id: i32,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub purpose: TransferPurpose,
    /// Paid out of cash the sender collected from clients.
    pub use_collected: bool,
}

#[derive(Debug, Clone)]
pub struct NewMoneyTransfer {
    pub from_partner_id: i32,
    pub to_partner_id: i32,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub purpose: TransferPurpose,
    pub use_collected: bool,
}

impl NewMoneyTransfer {
    pub fn validate(&self) -> DomainResult<()> {
        if self.amount <= Decimal::ZERO {
            return Err(DomainError::Validation(format!(
                "transfer amount must be positive (got {})",
                self.amount
            )));
        }
        if self.from_partner_id == self.to_partner_id {
            return Err(DomainError::Validation(
                "transfer sender and receiver must differ".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransferFilter {
    pub from_partner_ids: Option<Vec<i32>>,
    pub since: Option<NaiveDate>,
    pub purpose: Option<TransferPurpose>,
    pub use_collected_only: bool,
}

impl TransferFilter {
    pub fn matches(&self, t: &MoneyTransfer) -> bool {
        self.from_partner_ids
            .as_ref()
            .map_or(true, |ids| ids.contains(&t.from_partner_id))
            && self.since.map_or(true, |since| t.date >= since)
            && self.purpose.map_or(true, |p| p == t.purpose)
            && (!self.use_collected_only || t.use_collected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseCategory {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpensePaymentType {
    Purchase,
    Deposit,
    Personal,
}

impl ExpensePaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Deposit => "deposit",
            Self::Personal => "personal",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "purchase" => Some(Self::Purchase),
            "deposit" => Some(Self::Deposit),
            "personal" => Some(Self::Personal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expense {
    pub id: i32,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub category_id: Option<i32>,
    pub payment_type: ExpensePaymentType,
    pub paid_by_partner_id: Option<i32>,
    pub note: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExpenseFilter {
    pub paid_by_partner_ids: Option<Vec<i32>>,
    pub since: Option<NaiveDate>,
}

impl ExpenseFilter {
    pub fn matches(&self, e: &Expense) -> bool {
        self.paid_by_partner_ids.as_ref().map_or(true, |ids| {
            e.paid_by_partner_id.map_or(false, |p| ids.contains(&p))
        }) && self.since.map_or(true, |since| e.date >= since)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn partner(role: PartnerRole, city: Option<i32>, cities: &[i32]) -> FinancePartner {
        FinancePartner {
            id: 1,
            user_id: 1,
            role,
            city_id: city,
            cities: cities.iter().copied().collect(),
            reward_percent: dec!(10),
            active: true,
        }
    }

    #[test]
    fn moderator_scope_is_single() {
        assert_eq!(partner(PartnerRole::Moderator, Some(4), &[]).scope(), CityScope::Single(4));
        assert_eq!(partner(PartnerRole::Moderator, None, &[]).scope(), CityScope::Empty);
    }

    #[test]
    fn owner_scope_unions_cities() {
        let owner = partner(PartnerRole::Owner, Some(1), &[2, 3]);
        assert_eq!(owner.scope(), CityScope::multi([1, 2, 3]));
        assert_eq!(partner(PartnerRole::Owner, None, &[]).scope(), CityScope::Empty);
    }

    #[test]
    fn moderator_with_extra_cities_rejected() {
        let new = NewFinancePartner {
            user_id: 1,
            role: PartnerRole::Moderator,
            city_id: Some(1),
            cities: [2].into_iter().collect(),
            reward_percent: Decimal::ZERO,
        };
        assert!(new.validate().is_err());
    }

    #[test]
    fn transfer_filter_narrows() {
        let t = MoneyTransfer {
            id: 1,
            from_partner_id: 5,
            to_partner_id: 6,
            amount: dec!(100),
            date: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            purpose: TransferPurpose::ModeratorToOwner,
            use_collected: false,
        };
        let filter = TransferFilter {
            from_partner_ids: Some(vec![5]),
            since: NaiveDate::from_ymd_opt(2025, 1, 1),
            purpose: Some(TransferPurpose::ModeratorToOwner),
            use_collected_only: true,
        };
        assert!(!filter.matches(&t));
        assert!(TransferFilter::default().matches(&t));
    }
}
