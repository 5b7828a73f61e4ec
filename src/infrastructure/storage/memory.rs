//! In-memory entity store for development and testing
//!
//! Implements every repository trait on one struct. Each trait call counts
//! as one store query, which lets tests put a budget on how many round trips
//! an engine makes.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;

use crate::domain::access::CityScope;
use crate::domain::battery::{
    Battery, BatteryFilter, BatteryRepository, BatteryStatus, LogSource, NewBattery,
    StatusLogEntry, StatusLogRepository,
};
use crate::domain::city::{City, CityRepository, NewCity};
use crate::domain::client::{Client, ClientRepository, NewClient};
use crate::domain::finance::{
    Expense, ExpenseFilter, FinancePartner, FinanceRepository, MoneyTransfer, NewFinancePartner,
    NewMoneyTransfer, PartnerFilter, PartnerRole, TransferFilter,
};
use crate::domain::payment::{NewPayment, Payment, PaymentFilter, PaymentRepository, PaymentType};
use crate::domain::rental::{
    default_contract_code, validate_interval, Assignment, AssignmentRepository, NewAssignment,
    NewRental, NewVersion, Rental, RentalGroup, RentalRepository, RentalStatus, RentalVersion,
    ScopedAssignment,
};
use crate::domain::repair::{NewRepair, Repair, RepairRepository};
use crate::domain::user::{NewUser, User, UserRepository};
use crate::domain::{DomainError, DomainResult, RepositoryProvider};

/// In-memory store backed by concurrent maps.
pub struct InMemoryStore {
    cities: DashMap<i32, City>,
    clients: DashMap<i32, Client>,
    batteries: DashMap<i32, Battery>,
    status_log: DashMap<i32, StatusLogEntry>,
    rentals: DashMap<i32, Rental>,
    assignments: DashMap<i32, Assignment>,
    payments: DashMap<i32, Payment>,
    repairs: DashMap<i32, Repair>,
    partners: DashMap<i32, FinancePartner>,
    transfers: DashMap<i32, MoneyTransfer>,
    expenses: DashMap<i32, Expense>,
    users: DashMap<i32, User>,
    id_counter: AtomicI32,
    queries: AtomicUsize,
    /// Serialises multi-row writes the way a database transaction would.
    write_lock: Mutex<()>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            cities: DashMap::new(),
            clients: DashMap::new(),
            batteries: DashMap::new(),
            status_log: DashMap::new(),
            rentals: DashMap::new(),
            assignments: DashMap::new(),
            payments: DashMap::new(),
            repairs: DashMap::new(),
            partners: DashMap::new(),
            transfers: DashMap::new(),
            expenses: DashMap::new(),
            users: DashMap::new(),
            id_counter: AtomicI32::new(1),
            queries: AtomicUsize::new(0),
            write_lock: Mutex::new(()),
        }
    }

    /// Number of store calls served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn reset_query_count(&self) {
        self.queries.store(0, Ordering::SeqCst);
    }

    /// Overwrite a stored battery status without going through the
    /// reconciler. Used to simulate drift.
    pub fn force_battery_status(&self, battery_id: i32, status: BatteryStatus) {
        if let Some(mut b) = self.batteries.get_mut(&battery_id) {
            b.status = status;
        }
    }

    /// Insert a rental row verbatim (e.g. a legacy row without root).
    pub fn insert_rental_raw(&self, rental: Rental) {
        self.id_counter.fetch_max(rental.id + 1, Ordering::SeqCst);
        self.rentals.insert(rental.id, rental);
    }

    pub fn insert_expense(&self, mut expense: Expense) -> Expense {
        expense.id = self.next_id();
        self.expenses.insert(expense.id, expense.clone());
        expense
    }

    fn next_id(&self) -> i32 {
        self.id_counter.fetch_add(1, Ordering::SeqCst)
    }

    fn tick(&self) {
        self.queries.fetch_add(1, Ordering::SeqCst);
    }

    fn lock(&self) -> DomainResult<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| DomainError::Store("in-memory write lock poisoned".to_string()))
    }

    fn rental_city(&self, rental_id: i32) -> Option<i32> {
        self.rentals.get(&rental_id).and_then(|r| r.city_id)
    }

    fn battery_city(&self, battery_id: i32) -> Option<i32> {
        self.batteries.get(&battery_id).and_then(|b| b.city_id)
    }

    fn scoped_assignments<F>(&self, scope: &CityScope, keep: F) -> Vec<ScopedAssignment>
    where
        F: Fn(&Assignment, &Rental) -> bool,
    {
        let mut out: Vec<ScopedAssignment> = self
            .assignments
            .iter()
            .filter_map(|a| {
                let rental = self.rentals.get(&a.rental_id)?.clone();
                (scope.allows(rental.city_id) && keep(a.value(), &rental)).then(|| {
                    ScopedAssignment {
                        assignment: a.value().clone(),
                        rental,
                    }
                })
            })
            .collect();
        out.sort_by_key(|s| s.assignment.id);
        out
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted_by_id<T: Clone, F: Fn(&T) -> i32>(items: impl Iterator<Item = T>, id: F) -> Vec<T> {
    let mut v: Vec<T> = items.collect();
    v.sort_by_key(|x| id(x));
    v
}

// ── Cities & clients ────────────────────────────────────────────

#[async_trait]
impl CityRepository for InMemoryStore {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<City>> {
        self.tick();
        Ok(self.cities.get(&id).map(|c| c.clone()))
    }

    async fn find_by_code(&self, code: &str) -> DomainResult<Option<City>> {
        self.tick();
        Ok(self
            .cities
            .iter()
            .find(|c| c.code == code)
            .map(|c| c.value().clone()))
    }

    async fn list(&self, scope: &CityScope) -> DomainResult<Vec<City>> {
        self.tick();
        let mut cities: Vec<City> = self
            .cities
            .iter()
            .filter(|c| scope.allows(Some(c.id)))
            .map(|c| c.value().clone())
            .collect();
        cities.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(cities)
    }

    async fn insert(&self, city: NewCity) -> DomainResult<City> {
        self.tick();
        let _guard = self.lock()?;
        if self
            .cities
            .iter()
            .any(|c| c.code == city.code || c.name == city.name)
        {
            return Err(DomainError::Validation(format!(
                "city {} ({}) already exists",
                city.name, city.code
            )));
        }
        let city = City {
            id: self.next_id(),
            name: city.name,
            code: city.code,
            active: true,
        };
        self.cities.insert(city.id, city.clone());
        Ok(city)
    }
}

#[async_trait]
impl ClientRepository for InMemoryStore {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Client>> {
        self.tick();
        Ok(self.clients.get(&id).map(|c| c.clone()))
    }

    async fn find_by_ids(&self, ids: &[i32]) -> DomainResult<Vec<Client>> {
        self.tick();
        Ok(sorted_by_id(
            ids.iter().filter_map(|id| self.clients.get(id).map(|c| c.clone())),
            |c| c.id,
        ))
    }

    async fn list(&self, scope: &CityScope) -> DomainResult<Vec<Client>> {
        self.tick();
        Ok(sorted_by_id(
            self.clients
                .iter()
                .filter(|c| scope.allows(c.city_id))
                .map(|c| c.value().clone()),
            |c| c.id,
        ))
    }

    async fn insert(&self, client: NewClient) -> DomainResult<Client> {
        self.tick();
        let client = Client {
            id: self.next_id(),
            name: client.name,
            phone: client.phone,
            note: client.note,
            city_id: client.city_id,
            created_at: Utc::now(),
        };
        self.clients.insert(client.id, client.clone());
        Ok(client)
    }
}

// ── Batteries & status log ──────────────────────────────────────

#[async_trait]
impl BatteryRepository for InMemoryStore {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Battery>> {
        self.tick();
        Ok(self.batteries.get(&id).map(|b| b.clone()))
    }

    async fn find_by_short_code(&self, short_code: &str) -> DomainResult<Option<Battery>> {
        self.tick();
        Ok(self
            .batteries
            .iter()
            .find(|b| b.short_code == short_code)
            .map(|b| b.value().clone()))
    }

    async fn list(&self, filter: &BatteryFilter) -> DomainResult<Vec<Battery>> {
        self.tick();
        let mut batteries: Vec<Battery> = self
            .batteries
            .iter()
            .filter(|b| filter.matches(b.value()))
            .map(|b| b.value().clone())
            .collect();
        batteries.sort_by(|a, b| a.short_code.cmp(&b.short_code));
        Ok(batteries)
    }

    async fn insert(&self, battery: NewBattery) -> DomainResult<Battery> {
        self.tick();
        let _guard = self.lock()?;
        if self
            .batteries
            .iter()
            .any(|b| b.short_code == battery.short_code)
        {
            return Err(DomainError::Validation(format!(
                "battery short_code {} already exists",
                battery.short_code
            )));
        }
        let battery = Battery {
            id: self.next_id(),
            short_code: battery.short_code,
            serial_number: battery.serial_number,
            cost_price: battery.cost_price,
            status: battery.status,
            city_id: battery.city_id,
        };
        self.batteries.insert(battery.id, battery.clone());
        Ok(battery)
    }

    async fn set_status(&self, ids: &[i32], status: BatteryStatus) -> DomainResult<u64> {
        self.tick();
        let mut affected = 0;
        for id in ids {
            if let Some(mut b) = self.batteries.get_mut(id) {
                b.status = status;
                affected += 1;
            }
        }
        Ok(affected)
    }
}

#[async_trait]
impl StatusLogRepository for InMemoryStore {
    async fn upsert(
        &self,
        battery_id: i32,
        source: LogSource,
        start_at: DateTime<Utc>,
        end_at: Option<DateTime<Utc>>,
    ) -> DomainResult<StatusLogEntry> {
        self.tick();
        let _guard = self.lock()?;
        if let Some(existing) = self
            .status_log
            .iter()
            .find(|e| e.matches(battery_id, source, start_at))
        {
            return Ok(existing.value().clone());
        }
        let entry = StatusLogEntry {
            id: self.next_id(),
            battery_id,
            kind: source.kind(),
            start_at,
            end_at,
            rental_id: source.rental_id(),
            repair_id: source.repair_id(),
        };
        self.status_log.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn close(
        &self,
        battery_id: i32,
        source: LogSource,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> DomainResult<u64> {
        self.tick();
        let mut affected = 0;
        for mut e in self.status_log.iter_mut() {
            if e.matches(battery_id, source, start_at) {
                e.end_at = Some(end_at);
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn remove(
        &self,
        battery_id: i32,
        source: LogSource,
        start_at: DateTime<Utc>,
    ) -> DomainResult<u64> {
        self.tick();
        let ids: Vec<i32> = self
            .status_log
            .iter()
            .filter(|e| e.matches(battery_id, source, start_at))
            .map(|e| e.id)
            .collect();
        for id in &ids {
            self.status_log.remove(id);
        }
        Ok(ids.len() as u64)
    }

    async fn list(&self, battery_id: Option<i32>, scope: &CityScope) -> DomainResult<Vec<StatusLogEntry>> {
        self.tick();
        let mut entries: Vec<StatusLogEntry> = self
            .status_log
            .iter()
            .filter(|e| battery_id.map_or(true, |b| e.battery_id == b))
            .filter(|e| scope.allows(self.battery_city(e.battery_id)))
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by_key(|e| (e.start_at, e.id));
        Ok(entries)
    }
}

// ── Rentals & assignments ───────────────────────────────────────

#[async_trait]
impl RentalRepository for InMemoryStore {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Rental>> {
        self.tick();
        Ok(self.rentals.get(&id).map(|r| r.clone()))
    }

    async fn groups_by_root_ids(&self, root_ids: &[i32]) -> DomainResult<Vec<RentalGroup>> {
        self.tick();
        let mut by_root: BTreeMap<i32, Vec<RentalVersion>> = BTreeMap::new();
        for r in self.rentals.iter().filter(|r| root_ids.contains(&r.root())) {
            let mut assignments: Vec<Assignment> = self
                .assignments
                .iter()
                .filter(|a| a.rental_id == r.id)
                .map(|a| a.value().clone())
                .collect();
            assignments.sort_by_key(|a| (a.start_at, a.id));
            by_root.entry(r.root()).or_default().push(RentalVersion {
                rental: r.value().clone(),
                assignments,
            });
        }
        by_root
            .into_iter()
            .map(|(root, versions)| RentalGroup::new(root, versions))
            .collect()
    }

    async fn active(&self, scope: &CityScope) -> DomainResult<Vec<Rental>> {
        self.tick();
        Ok(sorted_by_id(
            self.rentals
                .iter()
                .filter(|r| r.is_active() && scope.allows(r.city_id))
                .map(|r| r.value().clone()),
            |r| r.id,
        ))
    }

    async fn list(&self, scope: &CityScope) -> DomainResult<Vec<Rental>> {
        self.tick();
        Ok(sorted_by_id(
            self.rentals
                .iter()
                .filter(|r| scope.allows(r.city_id))
                .map(|r| r.value().clone()),
            |r| r.id,
        ))
    }

    async fn create(&self, rental: NewRental) -> DomainResult<Rental> {
        self.tick();
        rental.validate()?;
        let id = self.next_id();
        let rental = Rental {
            id,
            client_id: rental.client_id,
            start_at: rental.start_at,
            end_at: rental.end_at,
            weekly_rate: rental.weekly_rate,
            deposit_amount: rental.deposit_amount,
            status: RentalStatus::Active,
            parent_id: None,
            root_id: Some(id),
            version: 1,
            contract_code: rental
                .contract_code
                .unwrap_or_else(|| default_contract_code(id)),
            city_id: rental.city_id,
            created_at: Utc::now(),
        };
        self.rentals.insert(id, rental.clone());
        Ok(rental)
    }

    async fn create_successor(&self, previous_id: i32, version: NewVersion) -> DomainResult<Rental> {
        self.tick();
        version.validate()?;
        let _guard = self.lock()?;
        let previous = self
            .rentals
            .get(&previous_id)
            .map(|r| r.clone())
            .ok_or_else(|| DomainError::not_found("Rental", previous_id))?;
        if previous.status == RentalStatus::Closed {
            return Err(DomainError::Validation(format!(
                "rental {} is closed and cannot be superseded",
                previous_id
            )));
        }
        if version.start_at <= previous.start_at {
            return Err(DomainError::Validation(
                "successor must start after the version it supersedes".to_string(),
            ));
        }
        let root = previous.root();
        let next_version = self
            .rentals
            .iter()
            .filter(|r| r.root() == root)
            .map(|r| r.version)
            .max()
            .unwrap_or(0)
            + 1;

        for mut r in self.rentals.iter_mut() {
            if r.root() == root && r.status == RentalStatus::Active {
                r.status = RentalStatus::Modified;
                if r.end_at.map_or(true, |end| end > version.start_at) {
                    r.end_at = Some(version.start_at);
                }
            }
        }

        let id = self.next_id();
        let rental = Rental {
            id,
            client_id: previous.client_id,
            start_at: version.start_at,
            end_at: version.end_at,
            weekly_rate: version.weekly_rate,
            deposit_amount: version.deposit_amount,
            status: RentalStatus::Active,
            parent_id: Some(previous.id),
            root_id: Some(root),
            version: next_version,
            contract_code: previous.contract_code.clone(),
            city_id: previous.city_id,
            created_at: Utc::now(),
        };
        self.rentals.insert(id, rental.clone());
        Ok(rental)
    }

    async fn close(&self, id: i32, end_at: DateTime<Utc>) -> DomainResult<Rental> {
        self.tick();
        let mut r = self
            .rentals
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("Rental", id))?;
        validate_interval(r.start_at, Some(end_at))?;
        r.status = RentalStatus::Closed;
        r.end_at = Some(end_at);
        Ok(r.clone())
    }

    async fn backfill_roots(&self) -> DomainResult<u64> {
        self.tick();
        let mut fixed = 0;
        for mut r in self.rentals.iter_mut() {
            if r.root_id.is_none() {
                r.root_id = Some(r.id);
                fixed += 1;
            }
        }
        Ok(fixed)
    }
}

#[async_trait]
impl AssignmentRepository for InMemoryStore {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Assignment>> {
        self.tick();
        Ok(self.assignments.get(&id).map(|a| a.clone()))
    }

    async fn active_at(&self, now: DateTime<Utc>, scope: &CityScope) -> DomainResult<Vec<ScopedAssignment>> {
        self.tick();
        Ok(self.scoped_assignments(scope, |a, _| a.covers(now)))
    }

    async fn intersecting(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        scope: &CityScope,
    ) -> DomainResult<Vec<ScopedAssignment>> {
        self.tick();
        Ok(self.scoped_assignments(scope, |a, r| {
            a.overlaps(from, Some(to)) && r.start_at < to && r.end_at.map_or(true, |e| e > from)
        }))
    }

    async fn list(&self, scope: &CityScope) -> DomainResult<Vec<Assignment>> {
        self.tick();
        Ok(self
            .scoped_assignments(scope, |_, _| true)
            .into_iter()
            .map(|s| s.assignment)
            .collect())
    }

    async fn clashes(
        &self,
        battery_ids: &[i32],
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> DomainResult<Vec<ScopedAssignment>> {
        self.tick();
        Ok(self.scoped_assignments(&CityScope::Unrestricted, |a, r| {
            battery_ids.contains(&a.battery_id) && a.overlaps(start, end) && r.is_active()
        }))
    }

    async fn open(&self, assignment: NewAssignment) -> DomainResult<Assignment> {
        self.tick();
        assignment.validate()?;
        let _guard = self.lock()?;
        if !self.rentals.contains_key(&assignment.rental_id) {
            return Err(DomainError::not_found("Rental", assignment.rental_id));
        }
        if !self.batteries.contains_key(&assignment.battery_id) {
            return Err(DomainError::not_found("Battery", assignment.battery_id));
        }
        let clash = self.assignments.iter().find(|a| {
            a.battery_id == assignment.battery_id
                && a.overlaps(assignment.start_at, assignment.end_at)
                && self
                    .rentals
                    .get(&a.rental_id)
                    .map_or(false, |r| r.is_active())
        });
        if let Some(clash) = clash {
            return Err(DomainError::Validation(format!(
                "battery {} is already assigned by assignment {}",
                assignment.battery_id, clash.id
            )));
        }
        let assignment = Assignment {
            id: self.next_id(),
            rental_id: assignment.rental_id,
            battery_id: assignment.battery_id,
            start_at: assignment.start_at,
            end_at: assignment.end_at,
            end_reason: None,
        };
        self.assignments.insert(assignment.id, assignment.clone());
        Ok(assignment)
    }

    async fn close(
        &self,
        id: i32,
        end_at: DateTime<Utc>,
        reason: Option<String>,
    ) -> DomainResult<Assignment> {
        self.tick();
        let mut a = self
            .assignments
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("Assignment", id))?;
        validate_interval(a.start_at, Some(end_at))?;
        a.end_at = Some(end_at);
        a.end_reason = reason;
        Ok(a.clone())
    }

    async fn delete(&self, id: i32) -> DomainResult<Assignment> {
        self.tick();
        self.assignments
            .remove(&id)
            .map(|(_, a)| a)
            .ok_or_else(|| DomainError::not_found("Assignment", id))
    }
}

// ── Payments & repairs ──────────────────────────────────────────

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Payment>> {
        self.tick();
        Ok(self.payments.get(&id).map(|p| p.clone()))
    }

    async fn create(&self, payment: NewPayment) -> DomainResult<Payment> {
        self.tick();
        payment.validate()?;
        let _guard = self.lock()?;
        let rental = self
            .rentals
            .get(&payment.rental_id)
            .map(|r| r.clone())
            .ok_or_else(|| DomainError::not_found("Rental", payment.rental_id))?;
        let payment = Payment {
            id: self.next_id(),
            rental_id: rental.root(),
            amount: payment.amount,
            date: payment.date,
            payment_type: payment.payment_type,
            method: payment.method,
            note: payment.note,
            created_by: payment.created_by,
            city_id: payment.city_id.or(rental.city_id),
        };
        self.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn reassign(&self, payment_id: i32, rental_id: i32) -> DomainResult<Payment> {
        self.tick();
        let (root, city_id) = self
            .rentals
            .get(&rental_id)
            .map(|r| (r.root(), r.city_id))
            .ok_or_else(|| DomainError::not_found("Rental", rental_id))?;
        let mut p = self
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| DomainError::not_found("Payment", payment_id))?;
        p.rental_id = root;
        p.city_id = city_id;
        Ok(p.clone())
    }

    async fn grouped_by_root(
        &self,
        root_ids: &[i32],
        types: Option<&[PaymentType]>,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> DomainResult<HashMap<i32, Vec<Payment>>> {
        self.tick();
        let mut grouped: HashMap<i32, Vec<Payment>> = HashMap::new();
        for p in self.payments.iter() {
            let keep = root_ids.contains(&p.rental_id)
                && types.map_or(true, |t| t.contains(&p.payment_type))
                && range.map_or(true, |(from, to)| p.date >= from && p.date <= to);
            if keep {
                grouped.entry(p.rental_id).or_default().push(p.value().clone());
            }
        }
        for payments in grouped.values_mut() {
            payments.sort_by_key(|p| (p.date, p.id));
        }
        Ok(grouped)
    }

    async fn list(&self, filter: &PaymentFilter) -> DomainResult<Vec<Payment>> {
        self.tick();
        let mut payments: Vec<Payment> = self
            .payments
            .iter()
            .filter(|p| filter.matches(p.value()))
            .map(|p| p.value().clone())
            .collect();
        payments.sort_by_key(|p| (p.date, p.id));
        Ok(payments)
    }
}

#[async_trait]
impl RepairRepository for InMemoryStore {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Repair>> {
        self.tick();
        Ok(self.repairs.get(&id).map(|r| r.clone()))
    }

    async fn open_repairs(&self, scope: &CityScope) -> DomainResult<Vec<Repair>> {
        self.tick();
        Ok(sorted_by_id(
            self.repairs
                .iter()
                .filter(|r| r.is_open() && scope.allows(self.battery_city(r.battery_id)))
                .map(|r| r.value().clone()),
            |r| r.id,
        ))
    }

    async fn list(&self, scope: &CityScope) -> DomainResult<Vec<Repair>> {
        self.tick();
        Ok(sorted_by_id(
            self.repairs
                .iter()
                .filter(|r| scope.allows(self.battery_city(r.battery_id)))
                .map(|r| r.value().clone()),
            |r| r.id,
        ))
    }

    async fn insert(&self, repair: NewRepair) -> DomainResult<Repair> {
        self.tick();
        repair.validate()?;
        if !self.batteries.contains_key(&repair.battery_id) {
            return Err(DomainError::not_found("Battery", repair.battery_id));
        }
        let repair = Repair {
            id: self.next_id(),
            battery_id: repair.battery_id,
            start_at: repair.start_at,
            end_at: repair.end_at,
            description: repair.description,
            cost: repair.cost,
        };
        self.repairs.insert(repair.id, repair.clone());
        Ok(repair)
    }

    async fn close(&self, id: i32, end_at: DateTime<Utc>) -> DomainResult<Repair> {
        self.tick();
        let mut r = self
            .repairs
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("Repair", id))?;
        validate_interval(r.start_at, Some(end_at))?;
        r.end_at = Some(end_at);
        Ok(r.clone())
    }
}

// ── Finance & users ─────────────────────────────────────────────

#[async_trait]
impl FinanceRepository for InMemoryStore {
    async fn partner_by_id(&self, id: i32) -> DomainResult<Option<FinancePartner>> {
        self.tick();
        Ok(self.partners.get(&id).map(|p| p.clone()))
    }

    async fn partner_by_user(&self, user_id: i32) -> DomainResult<Option<FinancePartner>> {
        self.tick();
        Ok(self
            .partners
            .iter()
            .find(|p| p.user_id == user_id)
            .map(|p| p.value().clone()))
    }

    async fn partners(&self, filter: &PartnerFilter) -> DomainResult<Vec<FinancePartner>> {
        self.tick();
        Ok(sorted_by_id(
            self.partners
                .iter()
                .filter(|p| filter.matches(p.value()))
                .map(|p| p.value().clone()),
            |p| p.id,
        ))
    }

    async fn insert_partner(&self, partner: NewFinancePartner) -> DomainResult<FinancePartner> {
        self.tick();
        partner.validate()?;
        let _guard = self.lock()?;
        if self.partners.iter().any(|p| p.user_id == partner.user_id) {
            return Err(DomainError::Validation(format!(
                "user {} already has a finance partner",
                partner.user_id
            )));
        }
        let partner = FinancePartner {
            id: self.next_id(),
            user_id: partner.user_id,
            role: partner.role,
            city_id: partner.city_id,
            cities: partner.cities,
            reward_percent: partner.reward_percent,
            active: true,
        };
        self.partners.insert(partner.id, partner.clone());
        Ok(partner)
    }

    async fn activate_moderator(&self, partner_id: i32) -> DomainResult<FinancePartner> {
        self.tick();
        let mut p = self
            .partners
            .get_mut(&partner_id)
            .ok_or_else(|| DomainError::not_found("FinancePartner", partner_id))?;
        p.role = PartnerRole::Moderator;
        p.active = true;
        p.cities.clear();
        Ok(p.clone())
    }

    async fn transfers(&self, filter: &TransferFilter) -> DomainResult<Vec<MoneyTransfer>> {
        self.tick();
        let mut transfers: Vec<MoneyTransfer> = self
            .transfers
            .iter()
            .filter(|t| filter.matches(t.value()))
            .map(|t| t.value().clone())
            .collect();
        transfers.sort_by_key(|t| (t.date, t.id));
        Ok(transfers)
    }

    async fn insert_transfer(&self, transfer: NewMoneyTransfer) -> DomainResult<MoneyTransfer> {
        self.tick();
        transfer.validate()?;
        for id in [transfer.from_partner_id, transfer.to_partner_id] {
            if !self.partners.contains_key(&id) {
                return Err(DomainError::not_found("FinancePartner", id));
            }
        }
        let transfer = MoneyTransfer {
            id: self.next_id(),
            from_partner_id: transfer.from_partner_id,
            to_partner_id: transfer.to_partner_id,
            amount: transfer.amount,
            date: transfer.date,
            purpose: transfer.purpose,
            use_collected: transfer.use_collected,
        };
        self.transfers.insert(transfer.id, transfer.clone());
        Ok(transfer)
    }

    async fn expenses(&self, filter: &ExpenseFilter) -> DomainResult<Vec<Expense>> {
        self.tick();
        let mut expenses: Vec<Expense> = self
            .expenses
            .iter()
            .filter(|e| filter.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();
        expenses.sort_by_key(|e| (e.date, e.id));
        Ok(expenses)
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<User>> {
        self.tick();
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_username(&self, username: &str) -> DomainResult<Option<User>> {
        self.tick();
        Ok(self
            .users
            .iter()
            .find(|u| u.username == username)
            .map(|u| u.value().clone()))
    }

    async fn find_by_ids(&self, ids: &[i32]) -> DomainResult<Vec<User>> {
        self.tick();
        Ok(sorted_by_id(
            ids.iter().filter_map(|id| self.users.get(id).map(|u| u.clone())),
            |u| u.id,
        ))
    }

    async fn insert(&self, user: NewUser) -> DomainResult<User> {
        self.tick();
        let _guard = self.lock()?;
        if self.users.iter().any(|u| u.username == user.username) {
            return Err(DomainError::Validation(format!(
                "username {} already exists",
                user.username
            )));
        }
        let user = User {
            id: self.next_id(),
            username: user.username,
            is_superuser: user.is_superuser,
            is_active: true,
            created_at: Utc::now(),
        };
        self.users.insert(user.id, user.clone());
        Ok(user)
    }
}

impl RepositoryProvider for InMemoryStore {
    fn cities(&self) -> &dyn CityRepository {
        self
    }

    fn clients(&self) -> &dyn ClientRepository {
        self
    }

    fn batteries(&self) -> &dyn BatteryRepository {
        self
    }

    fn status_log(&self) -> &dyn StatusLogRepository {
        self
    }

    fn rentals(&self) -> &dyn RentalRepository {
        self
    }

    fn assignments(&self) -> &dyn AssignmentRepository {
        self
    }

    fn payments(&self) -> &dyn PaymentRepository {
        self
    }

    fn repairs(&self) -> &dyn RepairRepository {
        self
    }

    fn finance(&self) -> &dyn FinanceRepository {
        self
    }

    fn users(&self) -> &dyn UserRepository {
        self
    }
}
