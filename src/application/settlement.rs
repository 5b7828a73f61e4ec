//! Settlement engine
//!
//! Running ledger of cash each active moderator collected against what they
//! passed on to owners since the cutoff. Debt may go negative when a
//! moderator over-remits. Reward policy is left to the caller; the partner's
//! `reward_percent` is only exposed.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::application::context::RequestContext;
use crate::domain::access::EntityKind;
use crate::domain::finance::{PartnerFilter, TransferFilter, TransferPurpose};
use crate::domain::payment::{PaymentFilter, PaymentType};
use crate::domain::{DomainResult, RepositoryProvider};
use crate::shared::Calendar;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementRow {
    pub partner_id: i32,
    pub user_id: i32,
    pub username: String,
    pub city_id: Option<i32>,
    pub reward_percent: Decimal,
    pub collected: Decimal,
    pub transferred: Decimal,
    pub debt: Decimal,
    pub collected_last_week: Decimal,
}

pub struct SettlementEngine {
    repos: Arc<dyn RepositoryProvider>,
    calendar: Calendar,
}

impl SettlementEngine {
    pub fn new(repos: Arc<dyn RepositoryProvider>, calendar: Calendar) -> Self {
        Self { repos, calendar }
    }

    /// One row per active moderator in scope, highest debt first.
    ///
    /// `cutoff = None` settles over all history.
    pub async fn settle(
        &self,
        ctx: &RequestContext,
        cutoff: Option<NaiveDate>,
    ) -> DomainResult<Vec<SettlementRow>> {
        let Some(scope) = ctx.list_scope(EntityKind::FinancePartner) else {
            return Ok(Vec::new());
        };

        let moderators = self
            .repos
            .finance()
            .partners(&PartnerFilter::active_moderators(scope.clone()))
            .await?;
        if moderators.is_empty() {
            return Ok(Vec::new());
        }
        let user_ids: Vec<i32> = moderators.iter().map(|m| m.user_id).collect();
        let partner_ids: Vec<i32> = moderators.iter().map(|m| m.id).collect();

        let usernames: HashMap<i32, String> = self
            .repos
            .users()
            .find_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect();

        let mut payment_filter = PaymentFilter::scoped(scope.clone())
            .with_types(&PaymentType::COLLECTED)
            .between(cutoff, None);
        payment_filter.created_by = Some(user_ids);
        let payments = self.repos.payments().list(&payment_filter).await?;

        let transfers = self
            .repos
            .finance()
            .transfers(&TransferFilter {
                from_partner_ids: Some(partner_ids),
                since: cutoff,
                purpose: Some(TransferPurpose::ModeratorToOwner),
                use_collected_only: true,
            })
            .await?;

        let today = self.calendar.local_date(ctx.now());
        let (week_start, week_end) = self.calendar.last_completed_week(today);

        let mut collected: HashMap<i32, Decimal> = HashMap::new();
        let mut last_week: HashMap<i32, Decimal> = HashMap::new();
        for p in &payments {
            let Some(user) = p.created_by else { continue };
            *collected.entry(user).or_default() += p.amount;
            if p.date >= week_start && p.date <= week_end {
                *last_week.entry(user).or_default() += p.amount;
            }
        }
        let mut transferred: HashMap<i32, Decimal> = HashMap::new();
        for t in &transfers {
            *transferred.entry(t.from_partner_id).or_default() += t.amount;
        }

        let mut rows: Vec<SettlementRow> = moderators
            .into_iter()
            .map(|m| {
                let collected = collected.get(&m.user_id).copied().unwrap_or_default();
                let transferred = transferred.get(&m.id).copied().unwrap_or_default();
                SettlementRow {
                    partner_id: m.id,
                    user_id: m.user_id,
                    username: usernames.get(&m.user_id).cloned().unwrap_or_default(),
                    city_id: m.city_id,
                    reward_percent: m.reward_percent,
                    collected,
                    transferred,
                    debt: collected - transferred,
                    collected_last_week: last_week.get(&m.user_id).copied().unwrap_or_default(),
                }
            })
            .collect();
        rows.sort_by(|a, b| b.debt.cmp(&a.debt).then_with(|| a.username.cmp(&b.username)));

        debug!(
            moderators = rows.len(),
            cutoff = ?cutoff,
            "Settlement computed"
        );
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::application::fixtures::{date, Fixture};
    use crate::domain::access::{CityScope, Principal};
    use crate::domain::finance::{FinanceRepository, NewMoneyTransfer};

    fn owner_ctx(fx: &Fixture, city: i32) -> RequestContext {
        RequestContext::new(
            Principal::new(900, "owner", false),
            fx.at(3, 12, 12, 0),
            CityScope::Single(city),
            false,
            EntityKind::moderator_default(),
        )
    }

    #[tokio::test]
    async fn moderator_debt_after_cutoff() {
        let fx = Fixture::new();
        let poznan = fx.city("Poznań", "POZ").await;
        let owner_user = fx.user("owner", false).await;
        let owner = fx.owner(&owner_user, &[poznan.id]).await;
        let mod_user = fx.user("marek", false).await;
        let moderator = fx.moderator(&mod_user, poznan.id).await;
        let client = fx.client("Ada", Some(poznan.id)).await;
        let rental = fx.rental(&client, fx.at(1, 1, 0, 0), None, dec!(700)).await;

        // Before the cutoff: ignored.
        fx.pay(rental.id, dec!(999), date(1, 15), PaymentType::Rent, Some(mod_user.id)).await;
        for (day, amount) in [(3, dec!(400)), (4, dec!(500)), (5, dec!(600))] {
            fx.pay(rental.id, amount, date(3, day), PaymentType::Rent, Some(mod_user.id)).await;
        }
        // Deposits are not collected cash.
        fx.pay(rental.id, dec!(300), date(3, 5), PaymentType::Deposit, Some(mod_user.id)).await;
        fx.store
            .insert_transfer(NewMoneyTransfer {
                from_partner_id: moderator.id,
                to_partner_id: owner.id,
                amount: dec!(1000),
                date: date(3, 6),
                purpose: TransferPurpose::ModeratorToOwner,
                use_collected: true,
            })
            .await
            .unwrap();

        let engine = SettlementEngine::new(fx.repos(), fx.calendar);
        let rows = engine
            .settle(&owner_ctx(&fx, poznan.id), Some(date(3, 1)))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.username, "marek");
        assert_eq!(row.collected, dec!(1500));
        assert_eq!(row.transferred, dec!(1000));
        assert_eq!(row.debt, dec!(500));
        // Now is Wednesday 2025-03-12; last completed week is 03-03..03-09.
        assert_eq!(row.collected_last_week, dec!(1500));
    }

    #[tokio::test]
    async fn over_remitting_goes_negative() {
        let fx = Fixture::new();
        let city = fx.city("Gdańsk", "GDN").await;
        let owner_user = fx.user("olga", false).await;
        let owner = fx.owner(&owner_user, &[city.id]).await;
        let mod_user = fx.user("mira", false).await;
        let moderator = fx.moderator(&mod_user, city.id).await;
        fx.store
            .insert_transfer(NewMoneyTransfer {
                from_partner_id: moderator.id,
                to_partner_id: owner.id,
                amount: dec!(200),
                date: date(3, 2),
                purpose: TransferPurpose::ModeratorToOwner,
                use_collected: true,
            })
            .await
            .unwrap();

        let rows = SettlementEngine::new(fx.repos(), fx.calendar)
            .settle(&owner_ctx(&fx, city.id), None)
            .await
            .unwrap();
        assert_eq!(rows[0].debt, dec!(-200));
    }

    #[tokio::test]
    async fn moderators_outside_scope_are_skipped() {
        let fx = Fixture::new();
        let a = fx.city("Łódź", "LDZ").await;
        let b = fx.city("Lublin", "LUB").await;
        let user = fx.user("max", false).await;
        fx.moderator(&user, b.id).await;
        let rows = SettlementEngine::new(fx.repos(), fx.calendar)
            .settle(&owner_ctx(&fx, a.id), None)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn moderator_without_partner_whitelist_sees_nothing() {
        let fx = Fixture::new();
        let city = fx.city("Opole", "OPO").await;
        let user = fx.user("mod", false).await;
        fx.moderator(&user, city.id).await;
        let ctx = RequestContext::new(
            user.principal(),
            fx.at(3, 12, 0, 0),
            CityScope::Single(city.id),
            true,
            EntityKind::moderator_default(),
        );
        let rows = SettlementEngine::new(fx.repos(), fx.calendar)
            .settle(&ctx, None)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }
}
