//! Defines the core data models and database queries for transactions.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    category::CategoryId,
    database_id::{TransactionId, UserId},
};

// ============================================================================
// MODELS
// ============================================================================

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// Whether the money was spent or earned is decided by the category, not by
/// the sign of `amount`.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The amount of money spent or earned in this transaction.
    pub amount: f64,
    /// A text description of what the transaction was for.
    pub description: Option<String>,
    /// The ID of the category the transaction belongs to.
    pub category_id: CategoryId,
    /// The messaging platform ID of the user who recorded the transaction.
    pub user_id: UserId,
    /// When the transaction was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(amount: f64, category_id: CategoryId, user_id: UserId) -> TransactionBuilder {
        TransactionBuilder {
            amount,
            description: None,
            category_id,
            user_id,
        }
    }
}

/// A builder for creating [Transaction] instances.
///
/// The ID and timestamps are assigned by [create_transaction].
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// The monetary amount of the transaction.
    pub amount: f64,

    /// An optional human-readable description, e.g. "Продукты".
    ///
    /// Empty or whitespace-only descriptions are stored as `None`.
    pub description: Option<String>,

    /// The category of the transaction. Must refer to an existing category.
    pub category_id: CategoryId,

    /// The user the transaction belongs to.
    pub user_id: UserId,
}

impl TransactionBuilder {
    /// Set the description for the transaction.
    pub fn description(mut self, description: Option<&str>) -> Self {
        self.description = description
            .map(str::trim)
            .filter(|description| !description.is_empty())
            .map(str::to_owned);
        self
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create a new transaction in the database from a builder.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the amount is NaN or infinite,
/// - [Error::InvalidCategory] if the category ID does not refer to a real category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    if !builder.amount.is_finite() {
        return Err(Error::InvalidAmount(builder.amount.to_string()));
    }

    let now = OffsetDateTime::now_utc();

    let transaction = connection
        .prepare(
            "INSERT INTO transactions (amount, description, category_id, user_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             RETURNING id, amount, description, category_id, user_id, created_at",
        )?
        .query_row(
            (
                builder.amount,
                builder.description,
                builder.category_id,
                builder.user_id,
                now,
            ),
            map_transaction_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::InvalidCategory(builder.category_id),
            error => error.into(),
        })?;

    Ok(transaction)
}

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "SELECT id, amount, description, category_id, user_id, created_at
             FROM transactions WHERE id = :id",
        )?
        .query_row(&[(":id", &id)], map_transaction_row)?;

    Ok(transaction)
}

/// Retrieve every transaction in the database ordered by ID.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn get_all_transactions(connection: &Connection) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(
            "SELECT id, amount, description, category_id, user_id, created_at
             FROM transactions ORDER BY id ASC",
        )?
        .query_map([], map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(|error| error.into()))
        .collect()
}

/// Get the total number of transactions in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_transactions(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM transactions;", [], |row| {
            row.get(0)
        })
        .map_err(|error| error.into())
}

/// Create the transaction table in the database.
///
/// The category table must exist first.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            amount REAL NOT NULL,
            description TEXT,
            category_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(category_id) REFERENCES categories(id) ON UPDATE CASCADE ON DELETE RESTRICT
        );

        CREATE INDEX IF NOT EXISTS idx_transactions_user_id ON transactions(user_id);",
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let id = row.get(0)?;
    let amount = row.get(1)?;
    let description = row.get(2)?;
    let category_id = row.get(3)?;
    let user_id = row.get(4)?;
    let created_at = row.get(5)?;

    Ok(Transaction {
        id,
        amount,
        description,
        category_id,
        user_id,
        created_at,
    })
}

// ============================================================================
// TESTS
// ============================================================================
