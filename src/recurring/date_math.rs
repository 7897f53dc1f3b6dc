//! Month-safe calendar arithmetic for the recurrence engine.
//!
//! Stepping a series forward by calendar months must tolerate months of
//! different lengths: the day-of-month is clamped to the last valid day of
//! the target month, never overflowed into the following month. Because the
//! engine always steps from the series' own start date, a clamped
//! occurrence (e.g. February 29) does not drag later occurrences off their
//! usual day.

use time::{Date, Month};

use crate::Error;

/// An inclusive range of dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    /// The first day of the range.
    pub start: Date,
    /// The last day of the range.
    pub end: Date,
}

/// Add `months` calendar months to `date`.
///
/// When the original day-of-month does not exist in the target month, the
/// result is clamped to the last day of that month, e.g. January 31 plus one
/// month is February 28 (or 29 in a leap year). The clamp applies the same
/// way for 1, 3 and 12 month steps, so probing for due occurrences and
/// recording checkpoints stay consistent across repeated calls.
pub(crate) fn add_months(date: Date, months: u32) -> Date {
    let months_from_january = month_number(date.month()) as i32 - 1 + months as i32;
    let year = date.year() + months_from_january / 12;
    let month = month_from_number((months_from_january % 12 + 1) as u8);
    let day = date.day().min(last_day_of_month(year, month));

    Date::from_calendar_date(year, month, day).expect("clamped day is valid for the target month")
}

/// The first and last day of the given calendar month.
pub(crate) fn month_bounds(year: i32, month: Month) -> DateRange {
    DateRange {
        start: Date::from_calendar_date(year, month, 1).expect("invalid month start date"),
        end: Date::from_calendar_date(year, month, last_day_of_month(year, month))
            .expect("invalid month end date"),
    }
}

/// Parse a `YYYY-MM` string such as "2024-04" into a year and month.
///
/// # Errors
/// Returns [Error::InvalidMonth] if the string is not of that form.
pub(crate) fn parse_month(text: &str) -> Result<(i32, Month), Error> {
    let invalid = || Error::InvalidMonth(text.to_owned());

    let (year_text, month_text) = text.split_once('-').ok_or_else(invalid)?;
    let year: i32 = year_text.parse().map_err(|_| invalid())?;
    let month: u8 = month_text.parse().map_err(|_| invalid())?;

    if !(1..=12).contains(&month) {
        return Err(invalid());
    }

    Ok((year, month_from_number(month)))
}

fn last_day_of_month(year: i32, month: Month) -> u8 {
    match month {
        Month::January
        | Month::March
        | Month::May
        | Month::July
        | Month::August
        | Month::October
        | Month::December => 31,
        Month::April | Month::June | Month::September | Month::November => 30,
        Month::February => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

fn month_number(month: Month) -> u8 {
    match month {
        Month::January => 1,
        Month::February => 2,
        Month::March => 3,
        Month::April => 4,
        Month::May => 5,
        Month::June => 6,
        Month::July => 7,
        Month::August => 8,
        Month::September => 9,
        Month::October => 10,
        Month::November => 11,
        Month::December => 12,
    }
}

fn month_from_number(month: u8) -> Month {
    match month {
        1 => Month::January,
        2 => Month::February,
        3 => Month::March,
        4 => Month::April,
        5 => Month::May,
        6 => Month::June,
        7 => Month::July,
        8 => Month::August,
        9 => Month::September,
        10 => Month::October,
        11 => Month::November,
        12 => Month::December,
        _ => panic!("invalid month number {month}"),
    }
}

#[cfg(test)]
mod date_math_tests {
    use time::{Month, macros::date};

    use crate::Error;

    use super::{add_months, month_bounds, parse_month};

    #[test]
    fn add_month_keeps_day_when_valid() {
        assert_eq!(add_months(date!(2024 - 08 - 15), 1), date!(2024 - 09 - 15));
    }

    #[test]
    fn add_month_clamps_to_end_of_february() {
        assert_eq!(add_months(date!(2024 - 01 - 31), 1), date!(2024 - 02 - 29));
        assert_eq!(add_months(date!(2023 - 01 - 31), 1), date!(2023 - 02 - 28));
    }

    #[test]
    fn clamping_does_not_stick_to_later_months() {
        // Stepping from the series start, the clamp only applies in months
        // that are actually short.
        assert_eq!(add_months(date!(2024 - 01 - 31), 2), date!(2024 - 03 - 31));
        assert_eq!(add_months(date!(2024 - 01 - 31), 3), date!(2024 - 04 - 30));
    }

    #[test]
    fn add_quarter_clamps_only_when_target_month_is_short() {
        assert_eq!(add_months(date!(2023 - 11 - 30), 3), date!(2024 - 02 - 29));
        assert_eq!(add_months(date!(2023 - 11 - 30), 6), date!(2024 - 05 - 30));
        assert_eq!(add_months(date!(2023 - 11 - 30), 9), date!(2024 - 08 - 30));
    }

    #[test]
    fn add_months_rolls_over_the_year() {
        assert_eq!(add_months(date!(2024 - 10 - 15), 3), date!(2025 - 01 - 15));
        assert_eq!(add_months(date!(2024 - 12 - 31), 1), date!(2025 - 01 - 31));
        assert_eq!(add_months(date!(2024 - 01 - 15), 25), date!(2026 - 02 - 15));
    }

    #[test]
    fn add_year_clamps_leap_day() {
        assert_eq!(add_months(date!(2024 - 02 - 29), 12), date!(2025 - 02 - 28));
    }

    #[test]
    fn month_bounds_cover_the_whole_month() {
        let bounds = month_bounds(2024, Month::February);

        assert_eq!(bounds.start, date!(2024 - 02 - 01));
        assert_eq!(bounds.end, date!(2024 - 02 - 29));
    }

    #[test]
    fn parse_month_accepts_year_month_strings() {
        assert_eq!(parse_month("2024-04").unwrap(), (2024, Month::April));
        assert_eq!(parse_month("2024-12").unwrap(), (2024, Month::December));
    }

    #[test]
    fn parse_month_rejects_malformed_strings() {
        for text in ["2024", "2024-13", "2024-00", "april", "2024-4-1"] {
            assert_eq!(
                parse_month(text),
                Err(Error::InvalidMonth(text.to_owned())),
                "expected {text:?} to be rejected"
            );
        }
    }
}
