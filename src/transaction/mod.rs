//! Recording transactions and serving them over the REST API.

mod core;
mod create_endpoint;
mod list_endpoint;
mod summary;

pub use core::{
    Transaction, TransactionBuilder, count_transactions, create_transaction,
    create_transaction_table, get_all_transactions, get_transaction,
};
pub use create_endpoint::{CreateTransaction, TransactionState, create_transaction_endpoint};
pub use list_endpoint::list_transactions_endpoint;
pub use summary::{Summary, get_user_summary};
