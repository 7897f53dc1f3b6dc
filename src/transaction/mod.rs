//! Transaction management for the finance tracker.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and `TransactionBuilder` for creating transactions
//! - Database functions for storing, querying, and managing transactions
//! - The JSON endpoints for transaction CRUD

mod core;
mod create_endpoint;
mod delete_endpoint;
mod list_endpoint;
mod query;
mod update_endpoint;

pub use self::core::{
    Frequency, Transaction, TransactionBuilder, TransactionKind, count_transactions,
    create_transaction, get_transaction,
};
pub use create_endpoint::create_transaction_endpoint;
pub use delete_endpoint::delete_transaction_endpoint;
pub use list_endpoint::list_transactions_endpoint;
pub use update_endpoint::update_transaction_endpoint;

pub(crate) use self::core::{TRANSACTION_COLUMNS, create_transaction_table, map_transaction_row};
