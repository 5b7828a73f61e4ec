//! Payment domain entity

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::access::CityScope;
use crate::shared::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentType {
    Rent,
    Deposit,
    ReturnDeposit,
    Adjustment,
    /// Battery sold to the client.
    Sold,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rent => "rent",
            Self::Deposit => "deposit",
            Self::ReturnDeposit => "return_deposit",
            Self::Adjustment => "adjustment",
            Self::Sold => "sold",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "rent" => Some(Self::Rent),
            "deposit" => Some(Self::Deposit),
            "return_deposit" => Some(Self::ReturnDeposit),
            "adjustment" => Some(Self::Adjustment),
            "sold" => Some(Self::Sold),
            _ => None,
        }
    }

    /// Types that put cash in the collector's hands.
    pub const COLLECTED: [PaymentType; 2] = [PaymentType::Rent, PaymentType::Sold];

    pub fn is_collected_cash(&self) -> bool {
        matches!(self, Self::Rent | Self::Sold)
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentMethod {
    Cash,
    Blik,
    Revolut,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Blik => "blik",
            Self::Revolut => "revolut",
            Self::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "cash" => Some(Self::Cash),
            "blik" => Some(Self::Blik),
            "revolut" => Some(Self::Revolut),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl Default for PaymentMethod {
    fn default() -> Self {
        Self::Cash
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    pub id: i32,
    /// Always the group root once persisted.
    pub rental_id: i32,
    /// Signed amount; only adjustments may be negative.
    pub amount: Decimal,
    pub date: NaiveDate,
    pub payment_type: PaymentType,
    pub method: PaymentMethod,
    pub note: String,
    /// User who recorded the payment.
    pub created_by: Option<i32>,
    pub city_id: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    /// Any version of the group; re-parented to the root on write.
    pub rental_id: i32,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub payment_type: PaymentType,
    pub method: PaymentMethod,
    pub note: String,
    pub created_by: Option<i32>,
    /// Defaults to the rental's city.
    pub city_id: Option<i32>,
}

impl NewPayment {
    pub fn validate(&self) -> DomainResult<()> {
        if self.amount.is_sign_negative()
            && !self.amount.is_zero()
            && self.payment_type != PaymentType::Adjustment
        {
            return Err(DomainError::Validation(format!(
                "negative amount {} is only allowed for adjustments",
                self.amount
            )));
        }
        Ok(())
    }
}

/// Payment listing filter. Every field narrows the result.
#[derive(Debug, Clone)]
pub struct PaymentFilter {
    pub scope: CityScope,
    pub types: Option<Vec<PaymentType>>,
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound.
    pub to: Option<NaiveDate>,
    pub created_by: Option<Vec<i32>>,
    pub root_ids: Option<Vec<i32>>,
}

impl PaymentFilter {
    pub fn scoped(scope: CityScope) -> Self {
        Self {
            scope,
            types: None,
            from: None,
            to: None,
            created_by: None,
            root_ids: None,
        }
    }

    pub fn with_types(mut self, types: &[PaymentType]) -> Self {
        self.types = Some(types.to_vec());
        self
    }

    pub fn between(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn matches(&self, p: &Payment) -> bool {
        self.scope.allows(p.city_id)
            && self.types.as_ref().map_or(true, |t| t.contains(&p.payment_type))
            && self.from.map_or(true, |from| p.date >= from)
            && self.to.map_or(true, |to| p.date <= to)
            && self
                .created_by
                .as_ref()
                .map_or(true, |users| p.created_by.map_or(false, |u| users.contains(&u)))
            && self.root_ids.as_ref().map_or(true, |r| r.contains(&p.rental_id))
    }
}
