//! A Telegram bot for recording personal income and expenses.
//!
//! Users pick a category from the bot's menus and send an amount with an
//! optional description. Totals are reported per user in chat. A small JSON
//! API lists and creates transactions in the same SQLite database.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod app_state;
pub mod bot;
pub mod category;
mod config;
pub mod conversation;
mod database_id;
pub mod db;
mod endpoints;
mod logging;
mod routing;
pub mod transaction;

#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use config::Config;
pub use database_id::{ChatId, DatabaseId, TransactionId, UserId};
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use routing::build_router;

use crate::category::CategoryId;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!("failed to install terminate signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// Run the HTTP server and the chat bot until one of them stops.
///
/// If the server stops first its result is returned as is. If the bot stops
/// first, for example on Ctrl+C, the server behind `handle` is told to shut down
/// and is awaited so in-flight requests can finish.
///
/// # Errors
/// Returns the error the server stopped with.
pub async fn run_until_stopped<S, B>(
    server: S,
    bot: B,
    handle: Handle<SocketAddr>,
) -> std::io::Result<()>
where
    S: Future<Output = std::io::Result<()>>,
    B: Future<Output = ()>,
{
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return result,
        () = bot => tracing::info!("Chat bot stopped, shutting down the HTTP server"),
    }

    handle.graceful_shutdown(Some(Duration::from_secs(1)));
    server.await
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The category ID used to create a transaction did not match a category.
    #[error("category {0} does not exist")]
    InvalidCategory(CategoryId),

    /// A category with the same name already exists.
    #[error("the category \"{0}\" already exists")]
    DuplicateCategoryName(String),

    /// An empty string was used to create a category name.
    #[error("category name cannot be empty")]
    EmptyCategoryName,

    /// A category type other than `income` or `expense`.
    #[error("\"{0}\" is not a valid category type, expected \"income\" or \"expense\"")]
    InvalidCategoryKind(String),

    /// An inline button payload that is not of the form `cat_<type>_<id>`.
    #[error("\"{0}\" is not a valid category button")]
    InvalidCategoryToken(String),

    /// The amount of a transaction is not a finite number.
    #[error("\"{0}\" is not a valid amount")]
    InvalidAmount(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// The chat platform rejected a message.
    #[error("could not send message: {0}")]
    MessagingError(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::InvalidCategory(_)
            | Error::InvalidAmount(_)
            | Error::InvalidCategoryKind(_)
            | Error::EmptyCategoryName => StatusCode::UNPROCESSABLE_ENTITY,
            Error::DuplicateCategoryName(_) => StatusCode::CONFLICT,
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "Internal server error" })),
                )
                    .into_response();
            }
        };

        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
