//! Defines the endpoint for creating a new transaction.
use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    category::CategoryId,
    database_id::UserId,
    transaction::{Transaction, core::create_transaction},
};

/// The state needed to get or create a transaction.
#[derive(Debug, Clone)]
pub struct TransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The user ID to record when the request body does not specify one.
    pub api_user_id: UserId,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            api_user_id: state.api_user_id,
        }
    }
}

/// The JSON body for creating a transaction.
#[derive(Debug, Deserialize)]
pub struct CreateTransaction {
    /// The value of the transaction.
    pub amount: f64,
    /// Text detailing the transaction.
    #[serde(default)]
    pub description: Option<String>,
    /// The category the transaction belongs to.
    pub category_id: CategoryId,
    /// The user to record the transaction for, defaults to the configured API user.
    #[serde(default)]
    pub user_id: Option<UserId>,
}

/// A route handler for creating a new transaction, responds with the stored transaction.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    Json(body): Json<CreateTransaction>,
) -> Response {
    let user_id = body.user_id.unwrap_or(state.api_user_id);
    let builder = Transaction::build(body.amount, body.category_id, user_id)
        .description(body.description.as_deref());

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match create_transaction(builder, &connection) {
        Ok(transaction) => {
            tracing::info!(
                "Created transaction {} for user {}",
                transaction.id,
                transaction.user_id
            );
            Json(transaction).into_response()
        }
        Err(error) => {
            tracing::error!("could not create transaction: {error}");
            error.into_response()
        }
    }
}
