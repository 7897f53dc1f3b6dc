//! Fintrack is a personal finance tracker: users log income and expense
//! transactions, mark them as recurring, and the server keeps each recurring
//! series materialized up to date.
//!
//! This library provides a JSON REST API. Authentication is handled by an
//! upstream layer which forwards the owner's identity with each request; the
//! server verifies the owner and scopes every operation to them.

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
mod auth_middleware;
mod database_id;
mod db;
pub mod endpoints;
mod logging;
mod overview;
mod recurring;
mod routing;
mod transaction;
mod user;

pub use app_state::AppState;
pub use db::initialize as initialize_db;
pub use logging::logging_middleware;
pub use recurring::{
    DateRange, ReconcileSummary, RecurringStore, SqliteRecurringStore, reconcile,
};
pub use routing::build_router;
pub use transaction::{
    Frequency, Transaction, TransactionBuilder, TransactionKind, count_transactions,
    create_transaction, get_transaction,
};
pub use user::{User, UserId, create_user, get_user_by_id};

/// An async task that waits for either the ctrl+c or terminate signal,
/// whichever comes first, and then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
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

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The request did not carry a valid owner identity.
    ///
    /// The owner header is either missing, not an integer, or does not refer
    /// to a registered user. No work is attempted for such requests.
    #[error("missing or invalid owner identity")]
    InvalidOwner,

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// A string could not be parsed as a transaction kind.
    #[error("\"{0}\" is not a valid transaction kind")]
    InvalidKind(String),

    /// A string could not be parsed as a recurring frequency, or a recurring
    /// transaction was submitted without one.
    #[error("invalid recurring frequency: {0}")]
    InvalidFrequency(String),

    /// A month query parameter was not a valid `YYYY-MM` string.
    #[error("\"{0}\" is not a valid month, expected YYYY-MM")]
    InvalidMonth(String),

    /// Tried to update a transaction that does not exist or belongs to
    /// another user.
    #[error("tried to update a transaction that is not in the database")]
    UpdateMissingTransaction,

    /// Tried to delete a transaction that does not exist or belongs to
    /// another user.
    #[error("tried to delete a transaction that is not in the database")]
    DeleteMissingTransaction,

    /// A recurring occurrence already exists for this owner, descriptive
    /// fields and date.
    ///
    /// The unique index over recurring rows rejects a second row for the
    /// same occurrence day, so concurrent reconcile calls cannot double up.
    #[error("a recurring occurrence already exists for this date")]
    DuplicateOccurrence,

    /// The specified email already belongs to a registered user.
    #[error("the email address is already registered")]
    DuplicateEmail,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("transaction") =>
            {
                Error::DuplicateOccurrence
            }
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
        let status_code = match self {
            Error::InvalidOwner => StatusCode::UNAUTHORIZED,
            Error::NotFound
            | Error::UpdateMissingTransaction
            | Error::DeleteMissingTransaction => StatusCode::NOT_FOUND,
            Error::InvalidKind(_)
            | Error::InvalidFrequency(_)
            | Error::InvalidMonth(_)
            | Error::DuplicateOccurrence
            | Error::DuplicateEmail => StatusCode::BAD_REQUEST,
            // Any errors that are not handled above are not intended to be
            // shown to the client.
            Error::SqlError(_) => {
                tracing::error!("An unexpected error occurred: {}", self);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal server error" })),
                )
                    .into_response();
            }
        };

        (status_code, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod error_tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use crate::Error;

    #[test]
    fn query_returned_no_rows_maps_to_not_found() {
        let error: Error = rusqlite::Error::QueryReturnedNoRows.into();

        assert_eq!(error, Error::NotFound);
    }

    #[test]
    fn invalid_owner_maps_to_unauthorized() {
        let response = Error::InvalidOwner.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn sql_error_does_not_leak_details() {
        let response = Error::SqlError(rusqlite::Error::InvalidQuery).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
