//! Defines the endpoint for the monthly income and expense summary.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Query, State},
    response::IntoResponse,
};
use rusqlite::{Connection, named_params};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    recurring::{DateRange, month_bounds, parse_month},
    user::UserId,
};

/// The state needed to compute the overview.
#[derive(Debug, Clone)]
pub struct OverviewState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for OverviewState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The query parameters for the overview endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct OverviewQuery {
    /// The calendar month to summarize, e.g. "2024-03". Defaults to the
    /// current UTC month.
    pub month: Option<String>,
}

/// The owner's totals for one calendar month.
#[derive(Debug, PartialEq, Serialize)]
pub struct Overview {
    /// Total income for the month.
    pub income: f64,
    /// Total expenses for the month.
    pub expenses: f64,
    /// Income minus expenses.
    pub savings: f64,
}

/// A route handler that returns the owner's income, expenses and net savings
/// for a calendar month.
///
/// # Panics
/// Panics if the lock for the database connection is already held by the same
/// thread.
pub async fn get_overview_endpoint(
    State(state): State<OverviewState>,
    Extension(user_id): Extension<UserId>,
    Query(query): Query<OverviewQuery>,
) -> impl IntoResponse {
    let (year, month) = match &query.month {
        Some(text) => match parse_month(text) {
            Ok(parsed) => parsed,
            Err(error) => return error.into_response(),
        },
        None => {
            let today = OffsetDateTime::now_utc().date();
            (today.year(), today.month())
        }
    };

    let connection = state.db_connection.lock().unwrap();

    match get_month_totals(user_id, month_bounds(year, month), &connection) {
        Ok(overview) => Json(overview).into_response(),
        Err(error) => error.into_response(),
    }
}

fn get_month_totals(
    user_id: UserId,
    range: DateRange,
    connection: &Connection,
) -> Result<Overview, Error> {
    let (income, expenses) = connection
        .prepare(
            "SELECT \
             COALESCE(SUM(CASE WHEN kind = 'income' THEN amount ELSE 0 END), 0.0), \
             COALESCE(SUM(CASE WHEN kind = 'expense' THEN amount ELSE 0 END), 0.0) \
             FROM \"transaction\" \
             WHERE user_id = :user_id AND date BETWEEN :start AND :end",
        )?
        .query_row(
            named_params! {
                ":user_id": user_id.as_i64(),
                ":start": range.start,
                ":end": range.end,
            },
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

    Ok(Overview {
        income,
        expenses,
        savings: income - expenses,
    })
}

#[cfg(test)]
mod overview_tests {
    use rusqlite::Connection;
    use time::{Month, macros::date};

    use crate::{
        db::initialize,
        recurring::month_bounds,
        transaction::{Transaction, TransactionKind, create_transaction},
        user::{UserId, create_user},
    };

    use super::{Overview, get_month_totals};

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        create_user("test@test.com", &conn).unwrap();
        create_user("other@test.com", &conn).unwrap();
        conn
    }

    fn seed_transactions(conn: &Connection) {
        for (user, kind, amount, date) in [
            (1, TransactionKind::Income, 2500.0, date!(2024 - 03 - 01)),
            (1, TransactionKind::Expense, 40.0, date!(2024 - 03 - 14)),
            (1, TransactionKind::Expense, 60.0, date!(2024 - 03 - 31)),
            // Outside the month and outside the owner.
            (1, TransactionKind::Expense, 999.0, date!(2024 - 04 - 01)),
            (2, TransactionKind::Expense, 5.0, date!(2024 - 03 - 14)),
        ] {
            create_transaction(
                Transaction::build(UserId::new(user), kind, amount, date),
                conn,
            )
            .unwrap();
        }
    }

    #[test]
    fn totals_cover_only_the_owners_month() {
        let conn = get_test_connection();
        seed_transactions(&conn);

        let overview =
            get_month_totals(UserId::new(1), month_bounds(2024, Month::March), &conn).unwrap();

        assert_eq!(
            overview,
            Overview {
                income: 2500.0,
                expenses: 100.0,
                savings: 2400.0,
            }
        );
    }

    #[test]
    fn empty_month_reports_zero_totals() {
        let conn = get_test_connection();
        seed_transactions(&conn);

        let overview =
            get_month_totals(UserId::new(1), month_bounds(2023, Month::March), &conn).unwrap();

        assert_eq!(
            overview,
            Overview {
                income: 0.0,
                expenses: 0.0,
                savings: 0.0,
            }
        );
    }
}
