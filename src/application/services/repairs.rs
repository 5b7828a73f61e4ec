//! Repair service

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::application::context::RequestContext;
use crate::domain::access::EntityKind;
use crate::domain::battery::LogSource;
use crate::domain::repair::{NewRepair, Repair};
use crate::domain::{DomainError, DomainResult, RepositoryProvider};

pub struct RepairService {
    repos: Arc<dyn RepositoryProvider>,
}

impl RepairService {
    pub fn new(repos: Arc<dyn RepositoryProvider>) -> Self {
        Self { repos }
    }

    /// Open a repair and log the battery as in service.
    pub async fn open(&self, ctx: &RequestContext, repair: NewRepair) -> DomainResult<Repair> {
        ctx.ensure_detail(EntityKind::Repair)?;
        let battery = self
            .repos
            .batteries()
            .find_by_id(repair.battery_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Battery", repair.battery_id))?;
        ctx.ensure_visible("Battery", battery.id, battery.city_id)?;

        let repair = self.repos.repairs().insert(repair).await?;
        self.repos
            .status_log()
            .upsert(
                repair.battery_id,
                LogSource::Repair(repair.id),
                repair.start_at,
                repair.end_at,
            )
            .await?;
        info!(repair_id = repair.id, short_code = %battery.short_code, "Repair opened");
        Ok(repair)
    }

    /// Close a repair and end its status log row.
    pub async fn close(
        &self,
        ctx: &RequestContext,
        repair_id: i32,
        end_at: DateTime<Utc>,
    ) -> DomainResult<Repair> {
        ctx.ensure_detail(EntityKind::Repair)?;
        let repair = self
            .repos
            .repairs()
            .find_by_id(repair_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Repair", repair_id))?;
        let battery = self
            .repos
            .batteries()
            .find_by_id(repair.battery_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Battery", repair.battery_id))?;
        ctx.ensure_visible("Repair", repair.id, battery.city_id)?;

        let closed = self.repos.repairs().close(repair.id, end_at).await?;
        self.repos
            .status_log()
            .close(
                closed.battery_id,
                LogSource::Repair(closed.id),
                closed.start_at,
                end_at,
            )
            .await?;
        info!(repair_id, short_code = %battery.short_code, "Repair closed");
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::application::fixtures::Fixture;
    use crate::domain::access::{CityScope, Principal};
    use crate::domain::battery::{BatteryStatus, StatusLogRepository};

    #[tokio::test]
    async fn repair_lifecycle_mirrors_status_log() {
        let fx = Fixture::new();
        let battery = fx.battery("B1", None).await;
        let service = RepairService::new(fx.repos());
        let ctx = RequestContext::system(fx.at(3, 1, 0, 0));

        let repair = service
            .open(
                &ctx,
                NewRepair {
                    battery_id: battery.id,
                    start_at: fx.at(3, 1, 9, 0),
                    end_at: None,
                    description: "BMS reset".into(),
                    cost: dec!(25),
                },
            )
            .await
            .unwrap();
        let log = StatusLogRepository::list(&*fx.store, Some(battery.id), &CityScope::Unrestricted)
            .await
            .unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind, BatteryStatus::Service);
        assert_eq!(log[0].repair_id, Some(repair.id));

        let end = fx.at(3, 3, 9, 0);
        service.close(&ctx, repair.id, end).await.unwrap();
        let log = StatusLogRepository::list(&*fx.store, Some(battery.id), &CityScope::Unrestricted)
            .await
            .unwrap();
        assert_eq!(log[0].end_at, Some(end));
    }

    #[tokio::test]
    async fn moderators_may_not_open_repairs() {
        let fx = Fixture::new();
        let city = fx.city("Poznań", "POZ").await;
        let battery = fx.battery("B1", Some(city.id)).await;
        let ctx = RequestContext::new(
            Principal::new(3, "mod", false),
            fx.at(3, 1, 0, 0),
            CityScope::Single(city.id),
            true,
            EntityKind::moderator_default(),
        );
        let err = RepairService::new(fx.repos())
            .open(
                &ctx,
                NewRepair {
                    battery_id: battery.id,
                    start_at: fx.at(3, 1, 9, 0),
                    end_at: None,
                    description: String::new(),
                    cost: dec!(0),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ScopeDenied(_)));
    }
}
