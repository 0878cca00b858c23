//! Application router configuration.

use axum::{
    Router, middleware,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::{
    AppState, Error, endpoints,
    logging::logging_middleware,
    transaction::{create_transaction_endpoint, list_transactions_endpoint},
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            endpoints::TRANSACTIONS,
            get(list_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS_NO_SLASH,
            get(list_transactions_endpoint).post(create_transaction_endpoint),
        )
        .fallback(get_404_not_found)
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

async fn get_404_not_found() -> Response {
    Error::NotFound.into_response()
}
