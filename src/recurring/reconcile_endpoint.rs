//! Defines the endpoint for catching up recurring transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use rusqlite::Connection;
use serde::Deserialize;
use time::{Date, OffsetDateTime};

use crate::{AppState, user::UserId};

use super::{engine::reconcile, store::SqliteRecurringStore};

/// The state needed to reconcile recurring transactions.
#[derive(Debug, Clone)]
pub struct ReconcileState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ReconcileState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The query parameters for the reconcile endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ReconcileQuery {
    /// Generate occurrences due up to and including this date. Defaults to
    /// the current UTC date.
    pub as_of: Option<Date>,
}

/// A route handler that materializes the owner's missed recurring
/// occurrences and reports how many were generated and skipped.
///
/// The wall clock is only read here, at the edge; the engine itself takes
/// `as_of` explicitly so its behavior is deterministic.
///
/// # Panics
/// Panics if the lock for the database connection is already held by the same
/// thread.
pub async fn reconcile_endpoint(
    State(state): State<ReconcileState>,
    Extension(user_id): Extension<UserId>,
    Query(query): Query<ReconcileQuery>,
) -> impl IntoResponse {
    let as_of = query
        .as_of
        .unwrap_or_else(|| OffsetDateTime::now_utc().date());

    let connection = state.db_connection.lock().unwrap();
    let mut store = SqliteRecurringStore::new(&connection);

    match reconcile(&mut store, user_id, as_of) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(error) => error.into_response(),
    }
}
