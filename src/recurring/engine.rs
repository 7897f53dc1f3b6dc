//! Catch-up generation of recurring transactions.
//!
//! Each call brings one owner's recurring series up to date as of a given
//! day: every due date between a template's checkpoint and `as_of` is
//! materialized exactly once, and the checkpoint advances to the last
//! confirmed occurrence. Calling again with the same `as_of` generates
//! nothing further.

use serde::Serialize;
use time::Date;

use crate::{
    Error,
    transaction::{Frequency, Transaction, TransactionBuilder},
    user::UserId,
};

use super::{
    date_math::{add_months, month_bounds},
    store::RecurringStore,
};

/// The maximum number of due dates probed per template per call.
///
/// A decade of monthly backlog. Bounds the work done when a checkpoint has
/// been corrupted to an ancient date; the remainder is generated by later
/// calls since the checkpoint still advances to the last materialized date.
pub const MAX_OCCURRENCES_PER_CALL: u32 = 120;

/// The counts reported by [reconcile].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    /// The number of occurrences inserted by this call.
    pub generated: u32,
    /// The number of due dates that already had a matching occurrence.
    pub skipped: u32,
}

/// Bring all of `user_id`'s recurring series up to date as of `as_of`.
///
/// For each active template the engine walks the series' due dates from the
/// template's checkpoint (or its own date if it has never generated),
/// inserts an occurrence for every due date that does not already have one,
/// and then records the new checkpoint. Paused templates are left
/// untouched. No occurrence is ever created after `as_of`.
///
/// A storage failure while reconciling one template is logged and that
/// template is skipped for this call, leaving its checkpoint unchanged so it
/// is retried next time; the other templates still proceed.
///
/// # Errors
/// Returns an error only if the templates themselves cannot be loaded.
pub fn reconcile<S: RecurringStore>(
    store: &mut S,
    user_id: UserId,
    as_of: Date,
) -> Result<ReconcileSummary, Error> {
    let templates = store.find_recurring_templates(user_id)?;

    let mut summary = ReconcileSummary::default();

    for template in &templates {
        match reconcile_template(store, template, as_of) {
            Ok(outcome) => {
                summary.generated += outcome.generated;
                summary.skipped += outcome.skipped;
            }
            Err(error) => {
                tracing::warn!(
                    "could not reconcile recurring transaction {}, leaving it for the next call: {error}",
                    template.id
                );
            }
        }
    }

    Ok(summary)
}

/// Materialize the missed occurrences of a single template.
///
/// Due dates sit on a grid anchored at the template's own date, so a
/// clamped month-end occurrence (e.g. February 29) does not drag later
/// occurrences off their usual day (March 31, April 30). Duplicates are
/// probed over the candidate's calendar month: the clamp never moves a date
/// out of its month, so the window recognizes an existing occurrence even
/// when it was stored on a clamped day or with a time-of-day component.
///
/// The checkpoint is only written after the staged inserts succeed, so it
/// can never advance past an occurrence that was not actually created.
fn reconcile_template<S: RecurringStore>(
    store: &mut S,
    template: &Transaction,
    as_of: Date,
) -> Result<ReconcileSummary, Error> {
    let mut outcome = ReconcileSummary::default();

    if template.recurring_paused {
        return Ok(outcome);
    }
    let Some(frequency) = template.frequency else {
        return Ok(outcome);
    };
    let step = frequency.step_months() as u32;

    let checkpoint = template.last_generated.unwrap_or(template.date);
    let mut cursor = checkpoint;
    let mut staged = Vec::new();

    for index in 1u32.. {
        let candidate = add_months(template.date, index * step);
        if candidate <= checkpoint {
            continue;
        }
        if candidate > as_of {
            break;
        }
        if outcome.generated + outcome.skipped >= MAX_OCCURRENCES_PER_CALL {
            tracing::warn!(
                "recurring transaction {} hit the limit of {MAX_OCCURRENCES_PER_CALL} \
                 occurrences per call, the remainder will be generated on the next call",
                template.id
            );
            break;
        }

        let window = month_bounds(candidate.year(), candidate.month());
        if store.occurrence_exists(template, window)? {
            outcome.skipped += 1;
        } else {
            staged.push(build_occurrence(template, candidate, frequency));
            outcome.generated += 1;
        }

        // The cursor advances over duplicates too, so the series always
        // progresses.
        cursor = candidate;
    }

    if !staged.is_empty() {
        store.insert_occurrences(&staged)?;
    }
    if cursor > checkpoint {
        store.update_checkpoints(&[(template.id, cursor)])?;
    }

    Ok(outcome)
}

/// Copy the template's descriptive fields onto a new occurrence dated `date`.
fn build_occurrence(
    template: &Transaction,
    date: Date,
    frequency: Frequency,
) -> TransactionBuilder {
    Transaction::build(template.user_id, template.kind, template.amount, date)
        .vendor(template.vendor.clone())
        .category(template.category.clone())
        .description(template.description.clone())
        .recurring(frequency)
}
