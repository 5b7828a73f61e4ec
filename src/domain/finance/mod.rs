//! Finance aggregate
//!
//! Partners (moderators and owners), money transfers between them and
//! expenses.

pub mod model;
pub mod repository;

pub use model::{
    Expense, ExpenseCategory, ExpenseFilter, ExpensePaymentType, FinancePartner, MoneyTransfer,
    NewFinancePartner, NewMoneyTransfer, PartnerFilter, PartnerRole, TransferFilter,
    TransferPurpose,
};
pub use repository::FinanceRepository;
