//! Defines the endpoint for updating a transaction.
//!
//! Updates are how users pause, resume and retune recurring series: the
//! request body carries the full editable field set including the recurring
//! flag, frequency and paused flag. The engine-managed checkpoint is never
//! touched by an update.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    response::IntoResponse,
};
use rusqlite::{Connection, named_params};
use serde::Deserialize;
use time::Date;

use crate::{AppState, Error, database_id::TransactionId, user::UserId};

use super::core::{
    Frequency, TRANSACTION_COLUMNS, Transaction, TransactionKind, map_transaction_row,
};

/// The state needed to update a transaction.
#[derive(Debug, Clone)]
pub struct UpdateTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for UpdateTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for updating a transaction.
#[derive(Debug, Deserialize)]
pub struct UpdateTransactionRequest {
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
    /// Whether occurrence generation for this series is paused.
    #[serde(default)]
    pub recurring_paused: bool,
}

/// A route handler for updating a transaction owned by the requester.
///
/// # Panics
/// Panics if the lock for the database connection is already held by the same
/// thread.
pub async fn update_transaction_endpoint(
    State(state): State<UpdateTransactionState>,
    Extension(user_id): Extension<UserId>,
    Path(transaction_id): Path<TransactionId>,
    Json(mut request): Json<UpdateTransactionRequest>,
) -> impl IntoResponse {
    if request.recurring && request.frequency.is_none() {
        return Error::InvalidFrequency("a recurring transaction requires a frequency".to_owned())
            .into_response();
    }
    if !request.recurring {
        request.frequency = None;
        request.recurring_paused = false;
    }

    let connection = state.db_connection.lock().unwrap();

    match update_transaction(transaction_id, user_id, &request, &connection) {
        Ok(transaction) => Json(transaction).into_response(),
        Err(error) => error.into_response(),
    }
}

fn update_transaction(
    id: TransactionId,
    user_id: UserId,
    request: &UpdateTransactionRequest,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "UPDATE \"transaction\" SET \
             kind = :kind, \
             vendor = :vendor, \
             category = :category, \
             description = :description, \
             amount = :amount, \
             date = :date, \
             recurring = :recurring, \
             frequency = :frequency, \
             recurring_paused = :recurring_paused \
             WHERE id = :id AND user_id = :user_id
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            named_params! {
                ":kind": request.kind,
                ":vendor": request.vendor,
                ":category": request.category,
                ":description": request.description,
                ":amount": request.amount,
                ":date": request.date,
                ":recurring": request.recurring,
                ":frequency": request.frequency,
                ":recurring_paused": request.recurring_paused,
                ":id": id,
                ":user_id": user_id.as_i64(),
            },
            map_transaction_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::UpdateMissingTransaction,
            error => error.into(),
        })
}
