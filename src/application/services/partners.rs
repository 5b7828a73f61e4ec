//! Finance partner service
//!
//! Operator-side management of moderators and the money transfers between
//! partners.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::application::context::RequestContext;
use crate::domain::access::EntityKind;
use crate::domain::finance::{
    FinancePartner, MoneyTransfer, NewFinancePartner, NewMoneyTransfer, PartnerRole,
};
use crate::domain::{DomainError, DomainResult, RepositoryProvider};

/// Result of [`PartnerService::sync_moderator`].
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Created(FinancePartner),
    Reactivated(FinancePartner),
    Unchanged(FinancePartner),
}

impl SyncOutcome {
    pub fn partner(&self) -> &FinancePartner {
        match self {
            Self::Created(p) | Self::Reactivated(p) | Self::Unchanged(p) => p,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::Reactivated(_) => "reactivated",
            Self::Unchanged(_) => "unchanged",
        }
    }
}

pub struct PartnerService {
    repos: Arc<dyn RepositoryProvider>,
}

impl PartnerService {
    pub fn new(repos: Arc<dyn RepositoryProvider>) -> Self {
        Self { repos }
    }

    /// Ensure `username` has an active moderator partner record.
    ///
    /// Idempotent. A new record needs `city_id`; an existing one keeps its
    /// city.
    pub async fn sync_moderator(
        &self,
        username: &str,
        city_id: Option<i32>,
    ) -> DomainResult<SyncOutcome> {
        let user = self
            .repos
            .users()
            .find_by_username(username)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "User",
                field: "username",
                value: username.to_string(),
            })?;

        let finance = self.repos.finance();
        if let Some(existing) = finance.partner_by_user(user.id).await? {
            if city_id.is_some() && city_id != existing.city_id {
                warn!(
                    username,
                    current = ?existing.city_id,
                    requested = ?city_id,
                    "Moderator keeps its current city"
                );
            }
            if existing.active && existing.role == PartnerRole::Moderator {
                return Ok(SyncOutcome::Unchanged(existing));
            }
            if existing.role == PartnerRole::Owner {
                warn!(username, partner_id = existing.id, "Converting owner to moderator");
            }
            let partner = finance.activate_moderator(existing.id).await?;
            info!(username, partner_id = partner.id, "Moderator reactivated");
            return Ok(SyncOutcome::Reactivated(partner));
        }

        let city_id = city_id.ok_or_else(|| {
            DomainError::Validation(format!("a city is required to create moderator {}", username))
        })?;
        if self.repos.cities().find_by_id(city_id).await?.is_none() {
            return Err(DomainError::Validation(format!("unknown city {}", city_id)));
        }
        let partner = finance
            .insert_partner(NewFinancePartner {
                user_id: user.id,
                role: PartnerRole::Moderator,
                city_id: Some(city_id),
                cities: Default::default(),
                reward_percent: Decimal::ZERO,
            })
            .await?;
        info!(username, partner_id = partner.id, city_id, "Moderator created");
        Ok(SyncOutcome::Created(partner))
    }

    /// Record a transfer sent by a partner inside the caller's scope.
    pub async fn record_transfer(
        &self,
        ctx: &RequestContext,
        transfer: NewMoneyTransfer,
    ) -> DomainResult<MoneyTransfer> {
        ctx.ensure_detail(EntityKind::MoneyTransfer)?;
        transfer.validate()?;
        let finance = self.repos.finance();
        let sender = finance
            .partner_by_id(transfer.from_partner_id)
            .await?
            .ok_or_else(|| DomainError::not_found("FinancePartner", transfer.from_partner_id))?;
        if !sender.in_scope(ctx.scope()) {
            return Err(DomainError::not_found("FinancePartner", sender.id));
        }
        let saved = finance.insert_transfer(transfer).await?;
        info!(
            transfer_id = saved.id,
            from = saved.from_partner_id,
            to = saved.to_partner_id,
            amount = %saved.amount,
            purpose = saved.purpose.as_str(),
            "Transfer recorded"
        );
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::application::fixtures::{date, Fixture};
    use crate::domain::access::{CityScope, Principal};
    use crate::domain::finance::{FinanceRepository, TransferPurpose};

    #[tokio::test]
    async fn sync_is_idempotent() {
        let fx = Fixture::new();
        let city = fx.city("Kraków", "KRK").await;
        fx.user("anna", false).await;
        let service = PartnerService::new(fx.repos());

        let first = service.sync_moderator("anna", Some(city.id)).await.unwrap();
        assert_eq!(first.label(), "created");
        assert_eq!(first.partner().city_id, Some(city.id));

        let second = service.sync_moderator("anna", None).await.unwrap();
        assert_eq!(second, SyncOutcome::Unchanged(first.partner().clone()));
    }

    #[tokio::test]
    async fn sync_requires_known_user_and_city() {
        let fx = Fixture::new();
        fx.user("anna", false).await;
        let service = PartnerService::new(fx.repos());

        assert!(matches!(
            service.sync_moderator("ghost", Some(1)).await,
            Err(DomainError::NotFound { .. })
        ));
        assert!(matches!(
            service.sync_moderator("anna", None).await,
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            service.sync_moderator("anna", Some(999)).await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn sync_converts_owner() {
        let fx = Fixture::new();
        let city = fx.city("Gdańsk", "GDN").await;
        let user = fx.user("piotr", false).await;
        fx.owner(&user, &[city.id]).await;

        let outcome = PartnerService::new(fx.repos())
            .sync_moderator("piotr", None)
            .await
            .unwrap();
        assert_eq!(outcome.label(), "reactivated");
        assert_eq!(outcome.partner().role, PartnerRole::Moderator);
        assert!(outcome.partner().active);
        assert_eq!(outcome.partner().city_id, Some(city.id));
    }

    #[tokio::test]
    async fn transfer_sender_must_be_in_scope() {
        let fx = Fixture::new();
        let krk = fx.city("Kraków", "KRK").await;
        let gdn = fx.city("Gdańsk", "GDN").await;
        let moderator = fx.moderator(&fx.user("anna", false).await, gdn.id).await;
        let owner_user = fx.user("olga", false).await;
        let owner = fx.owner(&owner_user, &[krk.id, gdn.id]).await;
        let service = PartnerService::new(fx.repos());
        let transfer = NewMoneyTransfer {
            from_partner_id: moderator.id,
            to_partner_id: owner.id,
            amount: dec!(500),
            date: date(3, 10),
            purpose: TransferPurpose::ModeratorToOwner,
            use_collected: true,
        };

        let krakow_only = RequestContext::new(
            owner_user.principal(),
            fx.at(3, 10, 12, 0),
            CityScope::Single(krk.id),
            false,
            EntityKind::moderator_default(),
        );
        assert!(matches!(
            service.record_transfer(&krakow_only, transfer.clone()).await,
            Err(DomainError::NotFound { .. })
        ));

        let ctx = RequestContext::new(
            Principal::new(owner_user.id, "olga", false),
            fx.at(3, 10, 12, 0),
            owner.scope(),
            false,
            EntityKind::moderator_default(),
        );
        let saved = service.record_transfer(&ctx, transfer).await.unwrap();
        let stored = fx.store.transfers(&Default::default()).await.unwrap();
        assert_eq!(stored, vec![saved]);
    }
}
