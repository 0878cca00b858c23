//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{Error, database_id::UserId, db::initialize};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The database connection used by the API.
    ///
    /// The chat bot opens its own connection, this one is never shared with it.
    pub db_connection: Arc<Mutex<Connection>>,

    /// The user ID recorded on transactions created through the API when the
    /// request does not name one.
    pub api_user_id: UserId,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_connection: Connection, api_user_id: UserId) -> Result<Self, Error> {
        initialize(&db_connection)?;

        Ok(Self {
            db_connection: Arc::new(Mutex::new(db_connection)),
            api_user_id,
        })
    }
}
