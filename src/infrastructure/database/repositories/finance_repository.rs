//! SeaORM implementation of FinanceRepository

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use sea_orm::sea_query::Query;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};

use super::{bad_value, db_err};
use crate::domain::access::CityScope;
use crate::domain::finance::{
    Expense, ExpenseFilter, ExpensePaymentType, FinancePartner, FinanceRepository, MoneyTransfer,
    NewFinancePartner, NewMoneyTransfer, PartnerFilter, PartnerRole, TransferFilter,
    TransferPurpose,
};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::{
    expense, finance_partner, finance_partner_city, money_transfer,
};

pub struct SeaOrmFinanceRepository {
    db: DatabaseConnection,
}

impl SeaOrmFinanceRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Load the extra cities of the given partners in one query.
    async fn attach_cities(
        &self,
        models: Vec<finance_partner::Model>,
    ) -> DomainResult<Vec<FinancePartner>> {
        let ids: Vec<i32> = models.iter().map(|m| m.id).collect();
        let mut cities: HashMap<i32, BTreeSet<i32>> = HashMap::new();
        for row in finance_partner_city::Entity::find()
            .filter(finance_partner_city::Column::PartnerId.is_in(ids))
            .all(&self.db)
            .await
            .map_err(db_err)?
        {
            cities.entry(row.partner_id).or_default().insert(row.city_id);
        }
        Ok(models
            .into_iter()
            .map(|m| {
                let extra = cities.remove(&m.id).unwrap_or_default();
                partner_to_domain(m, extra)
            })
            .collect())
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn role_to_entity(role: PartnerRole) -> finance_partner::PartnerRole {
    match role {
        PartnerRole::Moderator => finance_partner::PartnerRole::Moderator,
        PartnerRole::Owner => finance_partner::PartnerRole::Owner,
    }
}

fn entity_to_role(role: finance_partner::PartnerRole) -> PartnerRole {
    match role {
        finance_partner::PartnerRole::Moderator => PartnerRole::Moderator,
        finance_partner::PartnerRole::Owner => PartnerRole::Owner,
    }
}

fn partner_to_domain(m: finance_partner::Model, cities: BTreeSet<i32>) -> FinancePartner {
    FinancePartner {
        id: m.id,
        user_id: m.user_id,
        role: entity_to_role(m.role),
        city_id: m.city_id,
        cities,
        reward_percent: m.reward_percent,
        active: m.active,
    }
}

fn transfer_to_domain(m: money_transfer::Model) -> DomainResult<MoneyTransfer> {
    Ok(MoneyTransfer {
        id: m.id,
        from_partner_id: m.from_partner_id,
        to_partner_id: m.to_partner_id,
        amount: m.amount,
        date: m.date,
        purpose: TransferPurpose::from_str(&m.purpose)
            .ok_or_else(|| bad_value("purpose", &m.purpose))?,
        use_collected: m.use_collected,
    })
}

fn expense_to_domain(m: expense::Model) -> DomainResult<Expense> {
    Ok(Expense {
        id: m.id,
        amount: m.amount,
        date: m.date,
        category_id: m.category_id,
        payment_type: ExpensePaymentType::from_str(&m.payment_type)
            .ok_or_else(|| bad_value("payment_type", &m.payment_type))?,
        paid_by_partner_id: m.paid_by_partner_id,
        note: m.note,
    })
}

/// Partners whose own city or any extra city lies in `scope`.
fn partner_scope(scope: &CityScope) -> Condition {
    match scope.city_ids() {
        None => Condition::all(),
        Some(ids) => Condition::any()
            .add(finance_partner::Column::CityId.is_in(ids.clone()))
            .add(
                finance_partner::Column::Id.in_subquery(
                    Query::select()
                        .column(finance_partner_city::Column::PartnerId)
                        .from(finance_partner_city::Entity)
                        .and_where(finance_partner_city::Column::CityId.is_in(ids))
                        .to_owned(),
                ),
            ),
    }
}

// ── FinanceRepository impl ──────────────────────────────────────

#[async_trait]
impl FinanceRepository for SeaOrmFinanceRepository {
    async fn partner_by_id(&self, id: i32) -> DomainResult<Option<FinancePartner>> {
        let model = finance_partner::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        match model {
            Some(m) => Ok(self.attach_cities(vec![m]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn partner_by_user(&self, user_id: i32) -> DomainResult<Option<FinancePartner>> {
        let model = finance_partner::Entity::find()
            .filter(finance_partner::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        match model {
            Some(m) => Ok(self.attach_cities(vec![m]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn partners(&self, filter: &PartnerFilter) -> DomainResult<Vec<FinancePartner>> {
        let mut query = finance_partner::Entity::find().filter(partner_scope(&filter.scope));
        if let Some(role) = filter.role {
            query = query.filter(finance_partner::Column::Role.eq(role_to_entity(role)));
        }
        if filter.active_only {
            query = query.filter(finance_partner::Column::Active.eq(true));
        }
        let models = query
            .order_by_asc(finance_partner::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        self.attach_cities(models).await
    }

    async fn insert_partner(&self, p: NewFinancePartner) -> DomainResult<FinancePartner> {
        p.validate()?;
        let txn = self.db.begin().await.map_err(db_err)?;

        let model = finance_partner::ActiveModel {
            user_id: Set(p.user_id),
            role: Set(role_to_entity(p.role)),
            city_id: Set(p.city_id),
            reward_percent: Set(p.reward_percent),
            active: Set(true),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(db_err)?;

        for city_id in &p.cities {
            finance_partner_city::ActiveModel {
                partner_id: Set(model.id),
                city_id: Set(*city_id),
            }
            .insert(&txn)
            .await
            .map_err(db_err)?;
        }

        txn.commit().await.map_err(db_err)?;
        Ok(partner_to_domain(model, p.cities))
    }

    async fn activate_moderator(&self, partner_id: i32) -> DomainResult<FinancePartner> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let existing = finance_partner::Entity::find_by_id(partner_id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::not_found("FinancePartner", partner_id))?;
        let mut active = existing.into_active_model();
        active.role = Set(finance_partner::PartnerRole::Moderator);
        active.active = Set(true);
        let model = active.update(&txn).await.map_err(db_err)?;

        finance_partner_city::Entity::delete_many()
            .filter(finance_partner_city::Column::PartnerId.eq(partner_id))
            .exec(&txn)
            .await
            .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;
        Ok(partner_to_domain(model, BTreeSet::new()))
    }

    async fn transfers(&self, filter: &TransferFilter) -> DomainResult<Vec<MoneyTransfer>> {
        let mut query = money_transfer::Entity::find();
        if let Some(ids) = &filter.from_partner_ids {
            query = query.filter(money_transfer::Column::FromPartnerId.is_in(ids.clone()));
        }
        if let Some(since) = filter.since {
            query = query.filter(money_transfer::Column::Date.gte(since));
        }
        if let Some(purpose) = filter.purpose {
            query = query.filter(money_transfer::Column::Purpose.eq(purpose.as_str()));
        }
        if filter.use_collected_only {
            query = query.filter(money_transfer::Column::UseCollected.eq(true));
        }
        query
            .order_by_asc(money_transfer::Column::Date)
            .order_by_asc(money_transfer::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(transfer_to_domain)
            .collect()
    }

    async fn insert_transfer(&self, t: NewMoneyTransfer) -> DomainResult<MoneyTransfer> {
        t.validate()?;
        let model = money_transfer::ActiveModel {
            from_partner_id: Set(t.from_partner_id),
            to_partner_id: Set(t.to_partner_id),
            amount: Set(t.amount),
            date: Set(t.date),
            purpose: Set(t.purpose.as_str().to_string()),
            use_collected: Set(t.use_collected),
            ..Default::default()
        };
        let model = model.insert(&self.db).await.map_err(db_err)?;
        transfer_to_domain(model)
    }

    async fn expenses(&self, filter: &ExpenseFilter) -> DomainResult<Vec<Expense>> {
        let mut query = expense::Entity::find();
        if let Some(ids) = &filter.paid_by_partner_ids {
            query = query.filter(expense::Column::PaidByPartnerId.is_in(ids.clone()));
        }
        if let Some(since) = filter.since {
            query = query.filter(expense::Column::Date.gte(since));
        }
        query
            .order_by_asc(expense::Column::Date)
            .order_by_asc(expense::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(expense_to_domain)
            .collect()
    }
}
