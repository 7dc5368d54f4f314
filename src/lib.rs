//! Shared group expenses: who paid what, who owes whom, and the fewest
//! payments that square everyone up.
//!
//! The ledger engine ([`split`], [`balance`], [`settlement`], [`filter`],
//! [`report`]) works on plain [`Group`] snapshots and never performs I/O.
//! [`repository`], [`server`] and [`settings`] host it as an HTTP service.
pub mod balance;
pub mod error;
pub mod export;
pub mod filter;
pub mod report;
pub mod repository;
pub mod schemas;
pub mod server;
pub mod settings;
pub mod settlement;
pub mod split;

pub use balance::{compute_balance_from_expenses, compute_balance_from_group, Balance, Balances};
pub use error::LedgerError;
pub use filter::{filter_expenses, ExpenseFilter};
pub use report::Report;
pub use schemas::{
    AppData, Category, Expense, ExpenseDraft, Group, GroupDetails, Member, MemberId, NewMember,
    Split, SplitPolicy,
};
pub use settlement::{optimize_settlements, settlements_for_group, Settlement};
