//! Date arithmetic behind the age-based eligibility rules.
//!
//! Windows are inclusive on both ends and month/day aware: for an event on
//! 2024-09-17 the 18-year window starts at 2006-09-17, so a citizen born
//! 2006-09-18 is inside it and one born 2006-09-16 is not.

use chrono::{Datelike, NaiveDate};

/// The same calendar day `years` years earlier. Feb 29 collapses to Feb 28
/// when the target year is not a leap year.
pub fn years_before(date: NaiveDate, years: u32) -> NaiveDate {
    let target_year = date.year() - years as i32;
    date.with_year(target_year)
        .or_else(|| NaiveDate::from_ymd_opt(target_year, 2, 28))
        .unwrap_or(date)
}

/// Whole-years age on a date, or `None` for births after it.
pub fn age_on(birth: NaiveDate, on: NaiveDate) -> Option<u32> {
    if birth > on {
        return None;
    }
    let mut age = on.year() - birth.year();
    if (on.month(), on.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    u32::try_from(age).ok()
}

/// Inclusive membership in the `[reference - years, reference]` birth-date
/// window.
pub fn within_years(birth: NaiveDate, reference: NaiveDate, years: u32) -> bool {
    birth >= years_before(reference, years) && birth <= reference
}
