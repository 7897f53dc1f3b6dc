//! Database query helpers for listing transactions.

use rusqlite::{Connection, named_params};

use crate::{Error, recurring::DateRange, user::UserId};

use super::core::{TRANSACTION_COLUMNS, Transaction, TransactionKind, map_transaction_row};

/// Narrows which of an owner's transactions are returned.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TransactionFilter {
    /// Only include transactions of this kind.
    pub(crate) kind: Option<TransactionKind>,
    /// Only include transactions dated within this calendar month.
    pub(crate) month: Option<DateRange>,
}

/// Get the transactions owned by `user_id` that match `filter`, newest
/// first.
///
/// # Errors
/// Returns [Error::SqlError] if the query fails.
pub(crate) fn get_transactions_for_user(
    user_id: UserId,
    filter: &TransactionFilter,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    // Sort by date, and then ID to keep transaction order stable after
    // updates.
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" \
             WHERE user_id = :user_id \
             AND (:kind IS NULL OR kind = :kind) \
             AND (:start IS NULL OR date BETWEEN :start AND :end) \
             ORDER BY date DESC, id ASC"
        ))?
        .query_map(
            named_params! {
                ":user_id": user_id.as_i64(),
                ":kind": filter.kind,
                ":start": filter.month.map(|range| range.start),
                ":end": filter.month.map(|range| range.end),
            },
            map_transaction_row,
        )?
        .map(|row_result| row_result.map_err(Error::SqlError))
        .collect()
}

#[cfg(test)]
mod query_tests {
    use rusqlite::Connection;
    use time::{Month, macros::date};

    use crate::{
        db::initialize,
        recurring::month_bounds,
        transaction::{Transaction, TransactionKind, create_transaction},
        user::{UserId, create_user},
    };

    use super::{TransactionFilter, get_transactions_for_user};

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
            (1, TransactionKind::Expense, 15.5, date!(2024 - 04 - 02)),
            (2, TransactionKind::Expense, 99.0, date!(2024 - 03 - 14)),
        ] {
            create_transaction(
                Transaction::build(UserId::new(user), kind, amount, date),
                conn,
            )
            .unwrap();
        }
    }

    #[test]
    fn returns_only_the_owners_transactions_newest_first() {
        let conn = get_test_connection();
        seed_transactions(&conn);

        let got =
            get_transactions_for_user(UserId::new(1), &TransactionFilter::default(), &conn)
                .unwrap();

        assert_eq!(got.len(), 3);
        assert_eq!(got[0].date, date!(2024 - 04 - 02));
        assert_eq!(got[2].date, date!(2024 - 03 - 01));
        assert!(got.iter().all(|transaction| transaction.user_id == UserId::new(1)));
    }

    #[test]
    fn filters_by_kind() {
        let conn = get_test_connection();
        seed_transactions(&conn);

        let filter = TransactionFilter {
            kind: Some(TransactionKind::Income),
            month: None,
        };
        let got = get_transactions_for_user(UserId::new(1), &filter, &conn).unwrap();

        assert_eq!(got.len(), 1);
        assert_eq!(got[0].amount, 2500.0);
    }

    #[test]
    fn filters_by_month() {
        let conn = get_test_connection();
        seed_transactions(&conn);

        let filter = TransactionFilter {
            kind: None,
            month: Some(month_bounds(2024, Month::March)),
        };
        let got = get_transactions_for_user(UserId::new(1), &filter, &conn).unwrap();

        assert_eq!(got.len(), 2);
        assert!(got.iter().all(|transaction| {
            transaction.date >= date!(2024 - 03 - 01) && transaction.date <= date!(2024 - 03 - 31)
        }));
    }

    #[test]
    fn combines_kind_and_month_filters() {
        let conn = get_test_connection();
        seed_transactions(&conn);

        let filter = TransactionFilter {
            kind: Some(TransactionKind::Expense),
            month: Some(month_bounds(2024, Month::March)),
        };
        let got = get_transactions_for_user(UserId::new(1), &filter, &conn).unwrap();

        assert_eq!(got.len(), 1);
        assert_eq!(got[0].amount, 40.0);
    }
}
