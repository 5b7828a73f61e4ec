//! Status reconciler
//!
//! Battery status is derived, never edited by hand:
//!
//! 1. covered right now by an assignment of an active version → `rented`
//! 2. otherwise an open repair → `service`
//! 3. otherwise stored `sold` stays `sold`
//! 4. otherwise `available`
//!
//! The batch compares derived with stored status and issues one targeted
//! update per target status. Running it again on the same snapshot changes
//! nothing.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::domain::access::CityScope;
use crate::domain::battery::{Battery, BatteryFilter, BatteryStatus};
use crate::domain::rental::ScopedAssignment;
use crate::domain::repair::Repair;
use crate::domain::{DomainResult, RepositoryProvider};

/// Derived status of one battery.
pub fn derive_status(stored: BatteryStatus, rented: bool, in_service: bool) -> BatteryStatus {
    if rented {
        BatteryStatus::Rented
    } else if in_service {
        BatteryStatus::Service
    } else if stored == BatteryStatus::Sold {
        BatteryStatus::Sold
    } else {
        BatteryStatus::Available
    }
}

/// Derived status of every battery in `batteries`, keyed by battery id.
pub fn derive_statuses(
    batteries: &[Battery],
    assignments: &[ScopedAssignment],
    open_repairs: &[Repair],
    now: DateTime<Utc>,
) -> HashMap<i32, BatteryStatus> {
    let rented: HashSet<i32> = assignments
        .iter()
        .filter(|s| s.rental.is_active() && s.assignment.covers(now))
        .map(|s| s.assignment.battery_id)
        .collect();
    let in_service: HashSet<i32> = open_repairs
        .iter()
        .filter(|r| r.is_open())
        .map(|r| r.battery_id)
        .collect();
    batteries
        .iter()
        .map(|b| {
            let status = derive_status(b.status, rented.contains(&b.id), in_service.contains(&b.id));
            (b.id, status)
        })
        .collect()
}

/// Short codes changed by one reconciliation run, by target status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub fixed_to_rented: Vec<String>,
    pub fixed_to_service: Vec<String>,
    pub fixed_to_available: Vec<String>,
    pub dry_run: bool,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> usize {
        self.fixed_to_rented.len() + self.fixed_to_service.len() + self.fixed_to_available.len()
    }

    /// Non-empty groups in a stable order.
    pub fn groups(&self) -> Vec<(BatteryStatus, &[String])> {
        [
            (BatteryStatus::Rented, self.fixed_to_rented.as_slice()),
            (BatteryStatus::Service, self.fixed_to_service.as_slice()),
            (BatteryStatus::Available, self.fixed_to_available.as_slice()),
        ]
        .into_iter()
        .filter(|(_, codes)| !codes.is_empty())
        .collect()
    }
}

pub struct StatusReconciler {
    repos: Arc<dyn RepositoryProvider>,
}

impl StatusReconciler {
    pub fn new(repos: Arc<dyn RepositoryProvider>) -> Self {
        Self { repos }
    }

    /// Bring stored statuses of batteries in `scope` in line with their
    /// derived status. With `dry_run` the report is computed but nothing is
    /// written.
    pub async fn run(
        &self,
        scope: &CityScope,
        now: DateTime<Utc>,
        dry_run: bool,
    ) -> DomainResult<ReconcileReport> {
        let batteries = self
            .repos
            .batteries()
            .list(&BatteryFilter::scoped(scope.clone()))
            .await?;
        if batteries.is_empty() {
            return Ok(ReconcileReport {
                dry_run,
                ..ReconcileReport::default()
            });
        }
        // A battery can sit under a rental or repair recorded in another
        // city, so these two reads are not narrowed to the scope.
        let assignments = self
            .repos
            .assignments()
            .active_at(now, &CityScope::Unrestricted)
            .await?;
        let repairs = self
            .repos
            .repairs()
            .open_repairs(&CityScope::Unrestricted)
            .await?;
        let derived = derive_statuses(&batteries, &assignments, &repairs, now);

        let mut fixes: BTreeMap<BatteryStatus, Vec<&Battery>> = BTreeMap::new();
        for battery in &batteries {
            let Some(&target) = derived.get(&battery.id) else {
                continue;
            };
            if target != battery.status {
                warn!(
                    battery_id = battery.id,
                    short_code = %battery.short_code,
                    stored = %battery.status,
                    derived = %target,
                    "Battery status drifted"
                );
                fixes.entry(target).or_default().push(battery);
            }
        }

        let mut report = ReconcileReport {
            dry_run,
            ..ReconcileReport::default()
        };
        for (target, fixed) in fixes {
            let ids: Vec<i32> = fixed.iter().map(|b| b.id).collect();
            let mut codes: Vec<String> = fixed.iter().map(|b| b.short_code.clone()).collect();
            codes.sort();
            if !dry_run {
                self.repos.batteries().set_status(&ids, target).await?;
                metrics::counter!("battery_status_fixes_total", "status" => target.as_str())
                    .increment(ids.len() as u64);
            }
            match target {
                BatteryStatus::Rented => report.fixed_to_rented = codes,
                BatteryStatus::Service => report.fixed_to_service = codes,
                BatteryStatus::Available => report.fixed_to_available = codes,
                // Derivation only yields `sold` for batteries already stored as sold.
                BatteryStatus::Sold => {}
            }
        }

        info!(
            rented = report.fixed_to_rented.len(),
            service = report.fixed_to_service.len(),
            available = report.fixed_to_available.len(),
            dry_run,
            "Battery status reconciliation finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::application::fixtures::Fixture;
    use crate::domain::battery::BatteryRepository;
    use crate::domain::rental::{NewVersion, RentalRepository};
    use crate::domain::repair::{NewRepair, RepairRepository};

    #[test]
    fn derivation_order() {
        use BatteryStatus::*;
        assert_eq!(derive_status(Sold, true, true), Rented);
        assert_eq!(derive_status(Available, false, true), Service);
        assert_eq!(derive_status(Sold, false, false), Sold);
        assert_eq!(derive_status(Rented, false, false), Available);
    }

    #[tokio::test]
    async fn fixes_drift_once() {
        let fx = Fixture::new();
        let client = fx.client("Ada", None).await;
        let battery = fx.battery("B-17", None).await;
        let start = fx.at(3, 1, 9, 0);
        let rental = fx.rental(&client, start, None, dec!(700)).await;
        fx.assign(rental.id, battery.id, start, None).await;
        fx.store.force_battery_status(battery.id, BatteryStatus::Available);

        let reconciler = StatusReconciler::new(fx.repos());
        let now = fx.at(3, 5, 12, 0);
        let first = reconciler.run(&CityScope::Unrestricted, now, false).await.unwrap();
        assert_eq!(first.fixed_to_rented, vec!["B-17".to_string()]);
        assert_eq!(first.total(), 1);

        let stored = BatteryRepository::find_by_id(&*fx.store, battery.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, BatteryStatus::Rented);

        let second = reconciler.run(&CityScope::Unrestricted, now, false).await.unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn report_groups_skip_empty_targets() {
        let report = ReconcileReport {
            fixed_to_available: vec!["B-1".to_string()],
            ..ReconcileReport::default()
        };
        let groups = report.groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].0, BatteryStatus::Available);
        assert!(ReconcileReport::default().groups().is_empty());
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let fx = Fixture::new();
        let battery = fx.battery("B-2", None).await;
        fx.store.force_battery_status(battery.id, BatteryStatus::Rented);
        let reconciler = StatusReconciler::new(fx.repos());
        let now = fx.at(3, 5, 12, 0);

        let report = reconciler.run(&CityScope::Unrestricted, now, true).await.unwrap();
        assert!(report.dry_run);
        assert_eq!(report.fixed_to_available, vec!["B-2".to_string()]);
        let again = reconciler.run(&CityScope::Unrestricted, now, true).await.unwrap();
        assert_eq!(again.fixed_to_available, report.fixed_to_available);
    }

    #[tokio::test]
    async fn open_repair_wins_over_available_and_sold_is_terminal() {
        let fx = Fixture::new();
        let repaired = fx.battery("R-1", None).await;
        let sold = fx.battery("S-1", None).await;
        fx.store.force_battery_status(sold.id, BatteryStatus::Sold);
        RepairRepository::insert(
            &*fx.store,
            NewRepair {
                battery_id: repaired.id,
                start_at: fx.at(3, 1, 0, 0),
                end_at: None,
                description: "cell swap".into(),
                cost: dec!(40),
            },
        )
        .await
        .unwrap();

        let report = StatusReconciler::new(fx.repos())
            .run(&CityScope::Unrestricted, fx.at(3, 2, 0, 0), false)
            .await
            .unwrap();
        assert_eq!(report.fixed_to_service, vec!["R-1".to_string()]);
        assert!(report.fixed_to_available.is_empty());
    }

    #[tokio::test]
    async fn modified_version_does_not_rent() {
        let fx = Fixture::new();
        let client = fx.client("Bo", None).await;
        let battery = fx.battery("B-9", None).await;
        let start = fx.at(3, 1, 9, 0);
        let rental = fx.rental(&client, start, None, dec!(700)).await;
        fx.assign(rental.id, battery.id, start, None).await;
        fx.store
            .create_successor(
                rental.id,
                NewVersion {
                    start_at: fx.at(3, 3, 9, 0),
                    end_at: None,
                    weekly_rate: dec!(700),
                    deposit_amount: dec!(0),
                },
            )
            .await
            .unwrap();
        fx.store.force_battery_status(battery.id, BatteryStatus::Rented);

        let report = StatusReconciler::new(fx.repos())
            .run(&CityScope::Unrestricted, fx.at(3, 5, 0, 0), false)
            .await
            .unwrap();
        assert_eq!(report.fixed_to_available, vec!["B-9".to_string()]);
    }

    #[tokio::test]
    async fn scope_limits_batteries() {
        let fx = Fixture::new();
        let a = fx.city("Poznań", "POZ").await;
        let b = fx.city("Kraków", "KRK").await;
        let here = fx.battery("P-1", Some(a.id)).await;
        let there = fx.battery("K-1", Some(b.id)).await;
        fx.store.force_battery_status(here.id, BatteryStatus::Rented);
        fx.store.force_battery_status(there.id, BatteryStatus::Rented);

        let report = StatusReconciler::new(fx.repos())
            .run(&CityScope::Single(a.id), fx.at(3, 5, 0, 0), false)
            .await
            .unwrap();
        assert_eq!(report.fixed_to_available, vec!["P-1".to_string()]);
    }
}
