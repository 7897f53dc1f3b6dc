//! Defines the endpoint for listing an owner's transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Query, State},
    response::IntoResponse,
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState,
    recurring::{month_bounds, parse_month},
    user::UserId,
};

use super::{
    core::TransactionKind,
    query::{TransactionFilter, get_transactions_for_user},
};

/// The state needed to list transactions.
#[derive(Debug, Clone)]
pub struct ListTransactionsState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ListTransactionsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The query parameters for listing transactions.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionListQuery {
    /// Only return transactions of this kind.
    pub kind: Option<TransactionKind>,
    /// Only return transactions within this calendar month, e.g. "2024-03".
    pub month: Option<String>,
}

/// A route handler that returns the owner's transactions, newest first.
///
/// # Panics
/// Panics if the lock for the database connection is already held by the same
/// thread.
pub async fn list_transactions_endpoint(
    State(state): State<ListTransactionsState>,
    Extension(user_id): Extension<UserId>,
    Query(query): Query<TransactionListQuery>,
) -> impl IntoResponse {
    let month = match &query.month {
        Some(text) => match parse_month(text) {
            Ok((year, month)) => Some(month_bounds(year, month)),
            Err(error) => return error.into_response(),
        },
        None => None,
    };

    let filter = TransactionFilter {
        kind: query.kind,
        month,
    };

    let connection = state.db_connection.lock().unwrap();

    match get_transactions_for_user(user_id, &filter, &connection) {
        Ok(transactions) => Json(transactions).into_response(),
        Err(error) => error.into_response(),
    }
}
