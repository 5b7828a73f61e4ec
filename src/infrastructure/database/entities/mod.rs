//! Database entities module

pub mod battery;
pub mod battery_status_log;
pub mod city;
pub mod client;
pub mod expense;
pub mod expense_category;
pub mod finance_partner;
pub mod finance_partner_city;
pub mod money_transfer;
pub mod payment;
pub mod rental;
pub mod rental_battery_assignment;
pub mod repair;
pub mod user;

pub use battery::Entity as Battery;
pub use battery_status_log::Entity as BatteryStatusLog;
pub use city::Entity as City;
pub use client::Entity as Client;
pub use expense::Entity as Expense;
pub use expense_category::Entity as ExpenseCategory;
pub use finance_partner::Entity as FinancePartner;
pub use finance_partner_city::Entity as FinancePartnerCity;
pub use money_transfer::Entity as MoneyTransfer;
pub use payment::Entity as Payment;
pub use rental::Entity as Rental;
pub use rental_battery_assignment::Entity as RentalBatteryAssignment;
pub use repair::Entity as Repair;
pub use user::Entity as User;
