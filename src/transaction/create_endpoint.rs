//! Defines the endpoint for creating a new transaction.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::IntoResponse,
};
use rusqlite::Connection;
use serde::Deserialize;
use time::Date;

use crate::{AppState, Error, user::UserId};

use super::core::{Frequency, Transaction, TransactionKind, create_transaction};

/// The state needed to create a transaction.
#[derive(Debug, Clone)]
pub struct CreateTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for creating a transaction.
///
/// The owner is taken from the authenticated request identity, never from
/// the body.
#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    /// Whether this transaction is income or an expense.
    pub kind: TransactionKind,
    /// The value of the transaction in dollars.
    pub amount: f64,
    /// The date when the transaction occurred.
    pub date: Date,
    /// Who the money went to or came from.
    #[serde(default)]
    pub vendor: Option<String>,
    /// The category of the transaction, e.g. "Groceries", "Rent".
    #[serde(default)]
    pub category: Option<String>,
    /// Text detailing the transaction.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether this transaction repeats on a regular schedule.
    #[serde(default)]
    pub recurring: bool,
    /// How often the transaction repeats. Required when `recurring` is set.
    #[serde(default)]
    pub frequency: Option<Frequency>,
}

/// A route handler for creating a new transaction.
///
/// # Panics
/// Panics if the lock for the database connection is already held by the same
/// thread.
pub async fn create_transaction_endpoint(
    State(state): State<CreateTransactionState>,
    Extension(user_id): Extension<UserId>,
    Json(request): Json<CreateTransactionRequest>,
) -> impl IntoResponse {
    let mut builder = Transaction::build(user_id, request.kind, request.amount, request.date)
        .vendor(request.vendor)
        .category(request.category)
        .description(request.description);

    if request.recurring {
        let Some(frequency) = request.frequency else {
            return Error::InvalidFrequency(
                "a recurring transaction requires a frequency".to_owned(),
            )
            .into_response();
        };
        builder = builder.recurring(frequency);
    }

    let connection = state.db_connection.lock().unwrap();

    match create_transaction(builder, &connection) {
        Ok(transaction) => (StatusCode::CREATED, Json(transaction)).into_response(),
        Err(error) => error.into_response(),
    }
}
