//! Request context
//!
//! Built once per request: the pinned `now`, the resolved city scope and the
//! moderator whitelist. Every engine call takes it by reference; nothing in
//! it is cached beyond the request.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::access::{CityScope, EntityKind, Principal};
use crate::domain::finance::PartnerRole;
use crate::domain::{DomainError, DomainResult, RepositoryProvider};

#[derive(Debug, Clone)]
pub struct RequestContext {
    principal: Principal,
    now: DateTime<Utc>,
    scope: CityScope,
    is_moderator: bool,
    moderator_allowed: BTreeSet<EntityKind>,
}

impl RequestContext {
    pub fn new(
        principal: Principal,
        now: DateTime<Utc>,
        scope: CityScope,
        is_moderator: bool,
        moderator_allowed: BTreeSet<EntityKind>,
    ) -> Self {
        Self {
            principal,
            now,
            scope,
            is_moderator,
            moderator_allowed,
        }
    }

    /// Unrestricted context for operator commands (CLI, batch jobs).
    pub fn system(now: DateTime<Utc>) -> Self {
        Self::new(
            Principal::new(0, "system", true),
            now,
            CityScope::Unrestricted,
            false,
            EntityKind::moderator_default(),
        )
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn scope(&self) -> &CityScope {
        &self.scope
    }

    pub fn is_moderator(&self) -> bool {
        self.is_moderator
    }

    pub fn is_superuser(&self) -> bool {
        self.principal.is_superuser
    }

    /// Whether listings of `kind` may return anything at all.
    pub fn can_list(&self, kind: EntityKind) -> bool {
        !self.scope.matches_nothing() && (!self.is_moderator || self.moderator_allowed.contains(&kind))
    }

    /// Scope to list `kind` with, or `None` when the listing must be empty.
    pub fn list_scope(&self, kind: EntityKind) -> Option<&CityScope> {
        self.can_list(kind).then_some(&self.scope)
    }

    /// Refuse detail fetches of kinds outside the moderator whitelist, and
    /// any detail fetch for a principal without cities.
    pub fn ensure_detail(&self, kind: EntityKind) -> DomainResult<()> {
        if self.scope.matches_nothing() {
            return Err(DomainError::ScopeDenied(format!(
                "user {} has no city",
                self.principal.username
            )));
        }
        if self.is_moderator && !self.moderator_allowed.contains(&kind) {
            return Err(DomainError::ScopeDenied(format!(
                "moderators may not open {}",
                kind
            )));
        }
        Ok(())
    }

    /// `NotFound` unless `city_id` is inside the scope.
    pub fn ensure_visible(&self, entity: &'static str, id: i32, city_id: Option<i32>) -> DomainResult<()> {
        if self.scope.allows(city_id) {
            Ok(())
        } else {
            Err(DomainError::not_found(entity, id))
        }
    }
}

/// Turns a principal into a [`RequestContext`].
pub struct ScopeResolver<'a> {
    repos: &'a dyn RepositoryProvider,
    moderator_allowed: &'a BTreeSet<EntityKind>,
}

impl<'a> ScopeResolver<'a> {
    pub fn new(repos: &'a dyn RepositoryProvider, moderator_allowed: &'a BTreeSet<EntityKind>) -> Self {
        Self {
            repos,
            moderator_allowed,
        }
    }

    /// Superusers are unrestricted; everyone else gets the cities of their
    /// active finance partner record, or nothing.
    pub async fn resolve(&self, principal: Principal, now: DateTime<Utc>) -> DomainResult<RequestContext> {
        if principal.is_superuser {
            return Ok(RequestContext::new(
                principal,
                now,
                CityScope::Unrestricted,
                false,
                self.moderator_allowed.clone(),
            ));
        }

        let partner = self
            .repos
            .finance()
            .partner_by_user(principal.user_id)
            .await?
            .filter(|p| p.active);
        let (scope, is_moderator) = match &partner {
            Some(p) => (p.scope(), p.role == PartnerRole::Moderator),
            None => (CityScope::Empty, false),
        };
        debug!(
            user_id = principal.user_id,
            ?scope,
            is_moderator,
            "Scope resolved"
        );
        Ok(RequestContext::new(
            principal,
            now,
            scope,
            is_moderator,
            self.moderator_allowed.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::domain::finance::{FinanceRepository, NewFinancePartner};
    use crate::infrastructure::storage::InMemoryStore;

    fn whitelist() -> BTreeSet<EntityKind> {
        EntityKind::moderator_default()
    }

    #[tokio::test]
    async fn superuser_is_unrestricted() {
        let store = InMemoryStore::new();
        let allowed = whitelist();
        let ctx = ScopeResolver::new(&store, &allowed)
            .resolve(Principal::new(1, "root", true), Utc::now())
            .await
            .unwrap();
        assert!(ctx.scope().is_unrestricted());
        assert!(ctx.can_list(EntityKind::Battery));
    }

    #[tokio::test]
    async fn user_without_partner_sees_nothing() {
        let store = InMemoryStore::new();
        let allowed = whitelist();
        let ctx = ScopeResolver::new(&store, &allowed)
            .resolve(Principal::new(7, "nobody", false), Utc::now())
            .await
            .unwrap();
        assert!(ctx.scope().matches_nothing());
        assert!(!ctx.can_list(EntityKind::Rental));
        assert!(matches!(
            ctx.ensure_detail(EntityKind::Rental),
            Err(DomainError::ScopeDenied(_))
        ));
    }

    #[tokio::test]
    async fn moderator_limited_to_whitelist() {
        let store = InMemoryStore::new();
        store
            .insert_partner(NewFinancePartner {
                user_id: 3,
                role: PartnerRole::Moderator,
                city_id: Some(10),
                cities: BTreeSet::new(),
                reward_percent: dec!(10),
            })
            .await
            .unwrap();
        let allowed = whitelist();
        let ctx = ScopeResolver::new(&store, &allowed)
            .resolve(Principal::new(3, "mod", false), Utc::now())
            .await
            .unwrap();
        assert_eq!(ctx.scope(), &CityScope::Single(10));
        assert!(ctx.is_moderator());
        assert!(ctx.can_list(EntityKind::Payment));
        assert!(!ctx.can_list(EntityKind::Battery));
        assert!(ctx.ensure_detail(EntityKind::Repair).is_err());
        assert!(ctx.ensure_visible("Rental", 1, Some(11)).is_err());
    }
}
