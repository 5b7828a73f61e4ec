//! Seeding helpers for engine tests

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;

use crate::domain::battery::{Battery, BatteryRepository, BatteryStatus, NewBattery};
use crate::domain::city::{City, CityRepository, NewCity};
use crate::domain::client::{Client, ClientRepository, NewClient};
use crate::domain::finance::{FinancePartner, FinanceRepository, NewFinancePartner, PartnerRole};
use crate::domain::payment::{NewPayment, Payment, PaymentMethod, PaymentRepository, PaymentType};
use crate::domain::rental::{
    Assignment, AssignmentRepository, NewAssignment, NewRental, Rental, RentalRepository,
};
use crate::domain::user::{NewUser, User, UserRepository};
use crate::domain::RepositoryProvider;
use crate::infrastructure::storage::InMemoryStore;
use crate::shared::Calendar;

pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub calendar: Calendar,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            calendar: Calendar::default(),
        }
    }

    pub fn repos(&self) -> Arc<dyn RepositoryProvider> {
        self.store.clone()
    }

    /// Local wall-clock instant in 2025.
    pub fn at(&self, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        self.calendar.at_local(
            date(month, day),
            NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
        )
    }

    pub async fn city(&self, name: &str, code: &str) -> City {
        CityRepository::insert(&*self.store, NewCity::new(name, code))
            .await
            .unwrap()
    }

    pub async fn client(&self, name: &str, city: Option<i32>) -> Client {
        ClientRepository::insert(
            &*self.store,
            NewClient {
                name: name.to_string(),
                city_id: city,
                ..NewClient::default()
            },
        )
        .await
        .unwrap()
    }

    pub async fn battery(&self, code: &str, city: Option<i32>) -> Battery {
        BatteryRepository::insert(
            &*self.store,
            NewBattery {
                short_code: code.to_string(),
                serial_number: format!("SN-{}", code),
                cost_price: Decimal::from(1000),
                status: BatteryStatus::Available,
                city_id: city,
            },
        )
        .await
        .unwrap()
    }

    pub async fn rental(
        &self,
        client: &Client,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        weekly_rate: Decimal,
    ) -> Rental {
        RentalRepository::create(
            &*self.store,
            NewRental {
                client_id: client.id,
                start_at: start,
                end_at: end,
                weekly_rate,
                deposit_amount: Decimal::ZERO,
                contract_code: None,
                city_id: client.city_id,
            },
        )
        .await
        .unwrap()
    }

    pub async fn assign(
        &self,
        rental_id: i32,
        battery_id: i32,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Assignment {
        AssignmentRepository::open(
            &*self.store,
            NewAssignment {
                rental_id,
                battery_id,
                start_at: start,
                end_at: end,
            },
        )
        .await
        .unwrap()
    }

    pub async fn pay(
        &self,
        rental_id: i32,
        amount: Decimal,
        on: NaiveDate,
        payment_type: PaymentType,
        created_by: Option<i32>,
    ) -> Payment {
        PaymentRepository::create(
            &*self.store,
            NewPayment {
                rental_id,
                amount,
                date: on,
                payment_type,
                method: PaymentMethod::Cash,
                note: String::new(),
                created_by,
                city_id: None,
            },
        )
        .await
        .unwrap()
    }

    pub async fn user(&self, username: &str, is_superuser: bool) -> User {
        UserRepository::insert(
            &*self.store,
            NewUser {
                username: username.to_string(),
                is_superuser,
            },
        )
        .await
        .unwrap()
    }

    pub async fn moderator(&self, user: &User, city: i32) -> FinancePartner {
        self.store
            .insert_partner(NewFinancePartner {
                user_id: user.id,
                role: PartnerRole::Moderator,
                city_id: Some(city),
                cities: Default::default(),
                reward_percent: Decimal::from(10),
            })
            .await
            .unwrap()
    }

    pub async fn owner(&self, user: &User, cities: &[i32]) -> FinancePartner {
        self.store
            .insert_partner(NewFinancePartner {
                user_id: user.id,
                role: PartnerRole::Owner,
                city_id: cities.first().copied(),
                cities: cities.iter().skip(1).copied().collect(),
                reward_percent: Decimal::ZERO,
            })
            .await
            .unwrap()
    }
}

pub fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, month, day).unwrap()
}
