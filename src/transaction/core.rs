//! Defines the core data models and database queries for transactions.

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    database_id::TransactionId,
    user::UserId,
};

// ============================================================================
// MODELS
// ============================================================================

/// Whether a transaction records money earned or money spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money flowing in, e.g. wages.
    Income,
    /// Money flowing out, e.g. rent.
    Expense,
}

impl TransactionKind {
    /// The kind as the lowercase string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            other => Err(Error::InvalidKind(other.to_owned())),
        }
    }
}

impl ToSql for TransactionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for TransactionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|_| FromSqlError::InvalidType)
    }
}

/// How often a recurring transaction happens.
///
/// Only meaningful on transactions with the recurring flag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// A calendar month of variable length.
    Monthly,
    /// A calendar quarter, i.e. three calendar months.
    Quarterly,
    /// A calendar year, i.e. twelve calendar months.
    Yearly,
}

impl Frequency {
    /// The number of calendar months between occurrences.
    pub fn step_months(&self) -> u8 {
        match self {
            Frequency::Monthly => 1,
            Frequency::Quarterly => 3,
            Frequency::Yearly => 12,
        }
    }

    /// The frequency as the lowercase string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Yearly => "yearly",
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "monthly" => Ok(Frequency::Monthly),
            "quarterly" => Ok(Frequency::Quarterly),
            "yearly" => Ok(Frequency::Yearly),
            other => Err(Error::InvalidFrequency(other.to_owned())),
        }
    }
}

impl ToSql for Frequency {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for Frequency {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|_| FromSqlError::InvalidType)
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// A transaction with the recurring flag set acts as the template for a
/// recurring series: the recurrence engine materializes a copy of it for
/// each due date, and `last_generated` records the most recent occurrence
/// date confirmed to exist.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The ID of the user that owns this transaction.
    pub user_id: UserId,
    /// Whether this transaction is income or an expense.
    pub kind: TransactionKind,
    /// Who the money went to or came from.
    pub vendor: Option<String>,
    /// The category of the transaction, e.g. "Groceries", "Rent".
    pub category: Option<String>,
    /// A text description of what the transaction was for.
    pub description: Option<String>,
    /// The amount of money spent or earned in this transaction.
    pub amount: f64,
    /// When the transaction happened.
    pub date: Date,
    /// Whether this transaction repeats on a regular schedule.
    pub recurring: bool,
    /// How often the transaction repeats. Only set on recurring transactions.
    pub frequency: Option<Frequency>,
    /// When set, the recurrence engine does not generate occurrences for this
    /// series until the user resumes it.
    pub recurring_paused: bool,
    /// The date of the most recent occurrence the recurrence engine has
    /// confirmed exists. Unset until the engine first advances the series.
    pub last_generated: Option<Date>,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(
        user_id: UserId,
        kind: TransactionKind,
        amount: f64,
        date: Date,
    ) -> TransactionBuilder {
        TransactionBuilder {
            user_id,
            kind,
            amount,
            date,
            vendor: None,
            category: None,
            description: None,
            recurring: false,
            frequency: None,
        }
    }
}

/// A builder for creating [Transaction] instances.
///
/// Descriptive fields default to `None` and the transaction defaults to
/// non-recurring. Pass the finished builder to [create_transaction] to
/// insert the row, or to the recurrence engine's store for generated
/// occurrences.
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// The ID of the user that owns this transaction.
    pub user_id: UserId,
    /// Whether this transaction is income or an expense.
    pub kind: TransactionKind,
    /// The monetary amount of the transaction.
    pub amount: f64,
    /// The date when the transaction occurred.
    pub date: Date,
    /// Who the money went to or came from.
    pub vendor: Option<String>,
    /// The category of the transaction, e.g. "Groceries", "Rent".
    pub category: Option<String>,
    /// A text description of what the transaction was for.
    pub description: Option<String>,
    /// Whether this transaction repeats on a regular schedule.
    pub recurring: bool,
    /// How often the transaction repeats.
    pub frequency: Option<Frequency>,
}

impl TransactionBuilder {
    /// Set the vendor for the transaction.
    pub fn vendor(mut self, vendor: Option<String>) -> Self {
        self.vendor = vendor;
        self
    }

    /// Set the category for the transaction.
    pub fn category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    /// Set the description for the transaction.
    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Mark the transaction as recurring with the given frequency.
    pub fn recurring(mut self, frequency: Frequency) -> Self {
        self.recurring = true;
        self.frequency = Some(frequency);
        self
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// The column list shared by the queries in this module, in the order
/// expected by [map_transaction_row].
pub(crate) const TRANSACTION_COLUMNS: &str = "id, user_id, kind, vendor, category, description, \
     amount, date, recurring, frequency, recurring_paused, last_generated";

/// Create a new transaction in the database from a builder.
///
/// # Errors
/// This function will return a:
/// - [Error::DuplicateOccurrence] if an identical recurring row already
///   exists for the same date,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "INSERT INTO \"transaction\" \
             (user_id, kind, vendor, category, description, amount, date, recurring, frequency)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                builder.user_id.as_i64(),
                builder.kind,
                builder.vendor,
                builder.category,
                builder.description,
                builder.amount,
                builder.date,
                builder.recurring,
                builder.frequency,
            ),
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Retrieve a transaction owned by `user_id` from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction owned by
///   `user_id`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_transaction(
    id: TransactionId,
    user_id: UserId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = :id AND user_id = :user_id"
        ))?
        .query_row(
            &[(":id", &id), (":user_id", &user_id.as_i64())],
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Get the total number of transactions in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is some SQL error.
pub fn count_transactions(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM \"transaction\";", [], |row| {
            row.get(0)
        })
        .map_err(|error| error.into())
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub(crate) fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                vendor TEXT,
                category TEXT,
                description TEXT,
                amount REAL NOT NULL,
                date TEXT NOT NULL,
                recurring INTEGER NOT NULL DEFAULT 0,
                frequency TEXT,
                recurring_paused INTEGER NOT NULL DEFAULT 0,
                last_generated TEXT,
                FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE
                )",
        (),
    )?;

    // Composite index used by the list and overview queries.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_date \
         ON \"transaction\"(user_id, date);",
        (),
    )?;

    // One recurring row per owner, descriptive fields and occurrence date.
    // The recurrence engine checks for duplicates before inserting; this
    // index closes the race between concurrent reconcile calls.
    connection.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_transaction_recurring_occurrence \
         ON \"transaction\"(user_id, kind, amount, category, description, date) \
         WHERE recurring = 1;",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
pub(crate) fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: UserId::new(row.get(1)?),
        kind: row.get(2)?,
        vendor: row.get(3)?,
        category: row.get(4)?,
        description: row.get(5)?,
        amount: row.get(6)?,
        date: row.get(7)?,
        recurring: row.get(8)?,
        frequency: row.get(9)?,
        recurring_paused: row.get(10)?,
        last_generated: row.get(11)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
