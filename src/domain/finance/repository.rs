//! Finance repository interface

use async_trait::async_trait;

use super::model::{
    Expense, ExpenseFilter, FinancePartner, MoneyTransfer, NewFinancePartner, NewMoneyTransfer,
    PartnerFilter, TransferFilter,
};
use crate::domain::DomainResult;

#[async_trait]
pub trait FinanceRepository: Send + Sync {
    async fn partner_by_id(&self, id: i32) -> DomainResult<Option<FinancePartner>>;
    async fn partner_by_user(&self, user_id: i32) -> DomainResult<Option<FinancePartner>>;
    async fn partners(&self, filter: &PartnerFilter) -> DomainResult<Vec<FinancePartner>>;
    async fn insert_partner(&self, partner: NewFinancePartner) -> DomainResult<FinancePartner>;
    /// Make an existing partner an active moderator, keeping its city.
    async fn activate_moderator(&self, partner_id: i32) -> DomainResult<FinancePartner>;

    async fn transfers(&self, filter: &TransferFilter) -> DomainResult<Vec<MoneyTransfer>>;
    async fn insert_transfer(&self, transfer: NewMoneyTransfer) -> DomainResult<MoneyTransfer>;

    async fn expenses(&self, filter: &ExpenseFilter) -> DomainResult<Vec<Expense>>;
}
