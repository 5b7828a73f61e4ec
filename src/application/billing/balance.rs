//! Balance engine
//!
//! `balance = charges − paid`. A positive balance means the client owes
//! money; the sign is never inverted here.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use super::charges::{group_charges, version_breakdown, VersionCharges};
use crate::application::context::RequestContext;
use crate::domain::access::EntityKind;
use crate::domain::payment::{Payment, PaymentType};
use crate::domain::rental::RentalGroup;
use crate::domain::{DomainError, DomainResult, RepositoryProvider};
use crate::shared::Calendar;

/// Payment types the balance engine reads.
pub const BALANCE_PAYMENT_TYPES: [PaymentType; 3] = [
    PaymentType::Rent,
    PaymentType::Deposit,
    PaymentType::ReturnDeposit,
];

/// Money position of one rental group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupBalance {
    pub root_id: i32,
    pub charges: Decimal,
    pub paid: Decimal,
    pub deposit: Decimal,
    pub balance: Decimal,
}

/// Balance plus the per-version audit rows.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStatement {
    pub contract_code: String,
    pub client_id: i32,
    pub totals: GroupBalance,
    pub versions: Vec<VersionCharges>,
}

/// `Σ rent`.
pub fn group_paid(payments: &[Payment]) -> Decimal {
    sum_of(payments, PaymentType::Rent)
}

/// `Σ deposit − Σ return_deposit`.
pub fn group_deposit(payments: &[Payment]) -> Decimal {
    sum_of(payments, PaymentType::Deposit) - sum_of(payments, PaymentType::ReturnDeposit)
}

fn sum_of(payments: &[Payment], payment_type: PaymentType) -> Decimal {
    payments
        .iter()
        .filter(|p| p.payment_type == payment_type)
        .map(|p| p.amount)
        .sum()
}

/// Pure balance of a preloaded group and its payments.
pub fn summarize(
    group: &RentalGroup,
    payments: &[Payment],
    calendar: &Calendar,
    until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> GroupBalance {
    let charges = group_charges(group, calendar, until, now);
    let paid = group_paid(payments);
    GroupBalance {
        root_id: group.root_id,
        charges,
        paid,
        deposit: group_deposit(payments),
        balance: charges - paid,
    }
}

/// Reads groups and their payments and turns them into balances.
pub struct BalanceEngine {
    repos: Arc<dyn RepositoryProvider>,
    calendar: Calendar,
}

impl BalanceEngine {
    pub fn new(repos: Arc<dyn RepositoryProvider>, calendar: Calendar) -> Self {
        Self { repos, calendar }
    }

    /// Balance of the group holding `rental_id` (any version of it).
    ///
    /// Rentals outside the request scope are reported as not found.
    pub async fn group_balance(
        &self,
        ctx: &RequestContext,
        rental_id: i32,
        until: Option<DateTime<Utc>>,
    ) -> DomainResult<Decimal> {
        Ok(self.statement(ctx, rental_id, until).await?.totals.balance)
    }

    pub async fn statement(
        &self,
        ctx: &RequestContext,
        rental_id: i32,
        until: Option<DateTime<Utc>>,
    ) -> DomainResult<GroupStatement> {
        ctx.ensure_detail(EntityKind::Rental)?;
        let rental = self
            .repos
            .rentals()
            .find_by_id(rental_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Rental", rental_id))?;
        ctx.ensure_visible("Rental", rental_id, rental.city_id)?;

        let root = rental.root();
        let group = self
            .repos
            .rentals()
            .groups_by_root_ids(&[root])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::not_found("Rental", root))?;
        let mut payments = self
            .repos
            .payments()
            .grouped_by_root(&[root], Some(&BALANCE_PAYMENT_TYPES[..]), None)
            .await?;
        let payments = payments.remove(&root).unwrap_or_default();

        let totals = summarize(&group, &payments, &self.calendar, until, ctx.now());
        let versions = version_breakdown(&group, &self.calendar, until, ctx.now());
        for row in versions.iter().filter(|r| r.charged != r.charged_by_anchor) {
            debug!(
                rental_id = row.rental_id,
                charged = %row.charged,
                charged_by_anchor = %row.charged_by_anchor,
                "Day-counting rules disagree for version"
            );
        }
        debug!(
            root_id = root,
            charges = %totals.charges,
            paid = %totals.paid,
            balance = %totals.balance,
            "Group balance computed"
        );
        Ok(GroupStatement {
            contract_code: group.contract_code().to_string(),
            client_id: group.client_id(),
            versions,
            totals,
        })
    }

    /// Balances of many groups in two store calls.
    ///
    /// Callers are expected to pass roots they already scoped.
    pub async fn balances(
        &self,
        root_ids: &[i32],
        until: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DomainResult<HashMap<i32, GroupBalance>> {
        if root_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let groups = self.repos.rentals().groups_by_root_ids(root_ids).await?;
        let payments = self
            .repos
            .payments()
            .grouped_by_root(root_ids, Some(&BALANCE_PAYMENT_TYPES[..]), None)
            .await?;
        Ok(balances_of(&groups, &payments, &self.calendar, until, now))
    }
}

/// Pure batch form of [`summarize`].
pub fn balances_of(
    groups: &[RentalGroup],
    payments: &HashMap<i32, Vec<Payment>>,
    calendar: &Calendar,
    until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> HashMap<i32, GroupBalance> {
    groups
        .iter()
        .map(|group| {
            let paid = payments
                .get(&group.root_id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            (group.root_id, summarize(group, paid, calendar, until, now))
        })
        .collect()
}
