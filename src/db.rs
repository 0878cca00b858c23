//! Opens and initializes the application's SQLite database.

use std::path::Path;

use rusqlite::Connection;

use crate::{Error, category::create_category_table, transaction::create_transaction_table};

/// Prefix accepted in front of `DATABASE_URL` values.
const SQLITE_URL_PREFIX: &str = "sqlite://";

/// Convert a database URL such as `sqlite://finance.db` into a file path.
///
/// Plain paths are returned unchanged.
pub fn database_path(database_url: &str) -> &Path {
    Path::new(
        database_url
            .strip_prefix(SQLITE_URL_PREFIX)
            .unwrap_or(database_url),
    )
}

/// Open a connection to the database at `database_url` with foreign key
/// enforcement turned on.
///
/// # Errors
/// Returns an [Error::SqlError] if the file cannot be opened.
pub fn open(database_url: &str) -> Result<Connection, Error> {
    let connection = Connection::open(database_path(database_url))?;
    enable_foreign_keys(&connection)?;

    Ok(connection)
}

/// Create the tables for the domain models if they do not exist yet.
///
/// Also turns on foreign key enforcement for `connection`, which SQLite leaves
/// off by default.
///
/// # Errors
/// Returns an [Error::SqlError] if any of the tables cannot be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    enable_foreign_keys(connection)?;

    let transaction = rusqlite::Transaction::new_unchecked(
        connection,
        rusqlite::TransactionBehavior::Exclusive,
    )?;

    create_category_table(&transaction)?;
    create_transaction_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

fn enable_foreign_keys(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch("PRAGMA foreign_keys = ON;")
}
