//! Defines the endpoint for listing every transaction.

use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};

use crate::{
    Error,
    transaction::{core::get_all_transactions, create_endpoint::TransactionState},
};

/// A route handler that responds with all transactions as a JSON array.
pub async fn list_transactions_endpoint(State(state): State<TransactionState>) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match get_all_transactions(&connection) {
        Ok(transactions) => Json(transactions).into_response(),
        Err(error) => {
            tracing::error!("could not get transactions: {error}");
            error.into_response()
        }
    }
}
