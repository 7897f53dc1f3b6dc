//! The storage interface consumed by the recurrence engine.
//!
//! The engine only ever touches transactions through [RecurringStore], so it
//! can be exercised against fakes in tests. [SqliteRecurringStore] is the
//! implementation used by the HTTP layer.

use rusqlite::{Connection, named_params};
use time::Date;

use crate::{
    Error,
    database_id::TransactionId,
    transaction::{TRANSACTION_COLUMNS, Transaction, TransactionBuilder, map_transaction_row},
    user::UserId,
};

use super::date_math::DateRange;

/// Reads and writes the transactions involved in recurring catch-up
/// generation.
pub trait RecurringStore {
    /// Load every active recurring template owned by `user_id`.
    ///
    /// A template is any transaction with the recurring flag set and one of
    /// the supported frequencies. Generated occurrences carry both, so they
    /// act as templates on later calls, exactly like rows the user flagged
    /// by hand.
    fn find_recurring_templates(&self, user_id: UserId) -> Result<Vec<Transaction>, Error>;

    /// Report whether an occurrence of `template`'s series already exists
    /// within the date window.
    ///
    /// A row matches when its owner, kind, amount, category and description
    /// equal the template's and its date falls inside `window` (inclusive).
    /// The window tolerates drift in how existing rows were stored: a
    /// time-of-day component or a month-end clamp cannot hide an existing
    /// occurrence.
    fn occurrence_exists(&self, template: &Transaction, window: DateRange) -> Result<bool, Error>;

    /// Insert the staged occurrences.
    fn insert_occurrences(&mut self, occurrences: &[TransactionBuilder]) -> Result<(), Error>;

    /// Record the new checkpoint date for each template.
    fn update_checkpoints(&mut self, checkpoints: &[(TransactionId, Date)]) -> Result<(), Error>;
}

/// A [RecurringStore] backed by the application's SQLite database.
pub struct SqliteRecurringStore<'conn> {
    connection: &'conn Connection,
}

impl<'conn> SqliteRecurringStore<'conn> {
    /// Create a store over an open database connection.
    pub fn new(connection: &'conn Connection) -> Self {
        Self { connection }
    }
}

impl RecurringStore for SqliteRecurringStore<'_> {
    fn find_recurring_templates(&self, user_id: UserId) -> Result<Vec<Transaction>, Error> {
        self.connection
            .prepare(&format!(
                "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" \
                 WHERE user_id = :user_id \
                 AND recurring = 1 \
                 AND frequency IN ('monthly', 'quarterly', 'yearly') \
                 ORDER BY id ASC"
            ))?
            .query_map(
                named_params! { ":user_id": user_id.as_i64() },
                map_transaction_row,
            )?
            .map(|row_result| row_result.map_err(Error::SqlError))
            .collect()
    }

    fn occurrence_exists(&self, template: &Transaction, window: DateRange) -> Result<bool, Error> {
        // `IS` rather than `=` so unset category/description still match, and
        // `date(date)` so rows stored with a time-of-day component compare by
        // their calendar day.
        self.connection
            .prepare(
                "SELECT EXISTS (
                    SELECT 1 FROM \"transaction\"
                    WHERE user_id = :user_id
                    AND recurring = 1
                    AND kind = :kind
                    AND amount = :amount
                    AND category IS :category
                    AND description IS :description
                    AND date(date) BETWEEN :start AND :end
                )",
            )?
            .query_row(
                named_params! {
                    ":user_id": template.user_id.as_i64(),
                    ":kind": template.kind,
                    ":amount": template.amount,
                    ":category": template.category,
                    ":description": template.description,
                    ":start": window.start,
                    ":end": window.end,
                },
                |row| row.get(0),
            )
            .map_err(|error| error.into())
    }

    fn insert_occurrences(&mut self, occurrences: &[TransactionBuilder]) -> Result<(), Error> {
        let mut statement = self.connection.prepare(
            "INSERT INTO \"transaction\" \
             (user_id, kind, vendor, category, description, amount, date, recurring, frequency)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;

        for occurrence in occurrences {
            statement.execute((
                occurrence.user_id.as_i64(),
                occurrence.kind,
                &occurrence.vendor,
                &occurrence.category,
                &occurrence.description,
                occurrence.amount,
                occurrence.date,
                occurrence.recurring,
                occurrence.frequency,
            ))?;
        }

        Ok(())
    }

    fn update_checkpoints(&mut self, checkpoints: &[(TransactionId, Date)]) -> Result<(), Error> {
        let mut statement = self.connection.prepare(
            "UPDATE \"transaction\" SET last_generated = :checkpoint WHERE id = :id",
        )?;

        for (id, checkpoint) in checkpoints {
            statement.execute(named_params! { ":checkpoint": checkpoint, ":id": id })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod sqlite_store_tests {
    use rusqlite::Connection;
    use time::{Month, macros::date};

    use crate::{
        db::initialize,
        recurring::month_bounds,
        transaction::{Frequency, Transaction, TransactionKind, create_transaction},
        user::{UserId, create_user},
    };

    use super::{RecurringStore, SqliteRecurringStore};

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        create_user("test@test.com", &conn).unwrap();
        conn
    }

    fn create_template(conn: &Connection) -> Transaction {
        create_transaction(
            Transaction::build(
                UserId::new(1),
                TransactionKind::Expense,
                12.99,
                date!(2024 - 01 - 15),
            )
            .category(Some("Entertainment".to_owned()))
            .recurring(Frequency::Monthly),
            conn,
        )
        .unwrap()
    }

    #[test]
    fn find_returns_only_recurring_rows_with_supported_frequencies() {
        let conn = get_test_connection();
        let template = create_template(&conn);
        // A plain transaction and a recurring row without a frequency should
        // both be ignored.
        create_transaction(
            Transaction::build(
                UserId::new(1),
                TransactionKind::Expense,
                5.0,
                date!(2024 - 01 - 16),
            ),
            &conn,
        )
        .unwrap();
        conn.execute(
            "INSERT INTO \"transaction\" (user_id, kind, amount, date, recurring)
             VALUES (1, 'expense', 7.5, '2024-01-17', 1)",
            (),
        )
        .unwrap();

        let store = SqliteRecurringStore::new(&conn);
        let templates = store.find_recurring_templates(UserId::new(1)).unwrap();

        assert_eq!(templates, vec![template]);
    }

    #[test]
    fn find_is_scoped_to_the_owner() {
        let conn = get_test_connection();
        create_user("other@test.com", &conn).unwrap();
        create_template(&conn);

        let store = SqliteRecurringStore::new(&conn);
        let templates = store.find_recurring_templates(UserId::new(2)).unwrap();

        assert!(templates.is_empty());
    }

    #[test]
    fn occurrence_exists_tolerates_stored_time_of_day() {
        let conn = get_test_connection();
        let template = create_template(&conn);
        // Simulate a row written with sub-day drift in its stored date.
        conn.execute(
            "INSERT INTO \"transaction\" (user_id, kind, category, amount, date, recurring)
             VALUES (1, 'expense', 'Entertainment', 12.99, '2024-02-15T09:30:00', 1)",
            (),
        )
        .unwrap();

        let store = SqliteRecurringStore::new(&conn);

        assert!(
            store
                .occurrence_exists(&template, month_bounds(2024, Month::February))
                .unwrap()
        );
        assert!(
            !store
                .occurrence_exists(&template, month_bounds(2024, Month::March))
                .unwrap()
        );
    }

    #[test]
    fn occurrence_exists_matches_anywhere_in_the_window() {
        let conn = get_test_connection();
        let template = create_transaction(
            Transaction::build(
                UserId::new(1),
                TransactionKind::Expense,
                1200.0,
                date!(2024 - 01 - 31),
            )
            .description(Some("Rent".to_owned()))
            .recurring(Frequency::Monthly),
            &conn,
        )
        .unwrap();
        // The clamped February occurrence sits on the 29th, not the 31st.
        conn.execute(
            "INSERT INTO \"transaction\" (user_id, kind, description, amount, date, recurring)
             VALUES (1, 'expense', 'Rent', 1200.0, '2024-02-29', 1)",
            (),
        )
        .unwrap();

        let store = SqliteRecurringStore::new(&conn);

        assert!(
            store
                .occurrence_exists(&template, month_bounds(2024, Month::February))
                .unwrap()
        );
    }

    #[test]
    fn occurrence_exists_requires_matching_descriptive_fields() {
        let conn = get_test_connection();
        let template = create_template(&conn);

        let mut different_amount = template.clone();
        different_amount.amount = 13.99;
        let mut different_category = template.clone();
        different_category.category = Some("Subscriptions".to_owned());

        let store = SqliteRecurringStore::new(&conn);
        let window = month_bounds(2024, Month::January);

        assert!(store.occurrence_exists(&template, window).unwrap());
        assert!(!store.occurrence_exists(&different_amount, window).unwrap());
        assert!(
            !store
                .occurrence_exists(&different_category, window)
                .unwrap()
        );
    }

    #[test]
    fn insert_occurrences_copies_recurring_fields() {
        let conn = get_test_connection();
        let template = create_template(&conn);
        let occurrence = Transaction::build(
            template.user_id,
            template.kind,
            template.amount,
            date!(2024 - 02 - 15),
        )
        .category(template.category.clone())
        .recurring(Frequency::Monthly);

        let mut store = SqliteRecurringStore::new(&conn);
        store.insert_occurrences(&[occurrence]).unwrap();

        let templates = store.find_recurring_templates(UserId::new(1)).unwrap();
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[1].date, date!(2024 - 02 - 15));
        assert!(templates[1].recurring);
        assert_eq!(templates[1].frequency, Some(Frequency::Monthly));
        assert_eq!(templates[1].last_generated, None);
    }

    #[test]
    fn update_checkpoints_sets_last_generated() {
        let conn = get_test_connection();
        let template = create_template(&conn);

        let mut store = SqliteRecurringStore::new(&conn);
        store
            .update_checkpoints(&[(template.id, date!(2024 - 04 - 15))])
            .unwrap();

        let templates = store.find_recurring_templates(UserId::new(1)).unwrap();
        assert_eq!(templates[0].last_generated, Some(date!(2024 - 04 - 15)));
    }
}
