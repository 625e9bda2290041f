//! Expansion of recurrence rules into concrete dates.

use chrono::{Datelike, NaiveDate};

use crate::{RecurrenceRule, Window};

/// 1-indexed occurrence of the date's weekday within its month,
/// e.g. the third Tuesday of a month is occurrence 3.
pub fn occurrence_in_month(date: NaiveDate) -> u32 {
    (date.day() - 1) / 7 + 1
}

/// Whether a single date satisfies the rule and the window's day filter.
pub fn matches(rule: &RecurrenceRule, window: &Window, date: NaiveDate) -> bool {
    let weekday = date.weekday();
    if !rule.days.contains(&weekday) || !window.allows_day(weekday) {
        return false;
    }
    if rule.skips_month(date.month()) {
        return false;
    }
    rule.nth_occurrences.is_empty() || rule.nth_occurrences.contains(&occurrence_in_month(date))
}

/// Every date in the window matched by the rule, in ascending order.
///
/// A disabled rule or a rule without days yields nothing. Requesting an
/// occurrence a month does not have (a 5th Monday in a four-Monday month)
/// silently yields no date for that month.
pub fn expand(rule: &RecurrenceRule, window: &Window) -> Vec<NaiveDate> {
    if rule.disabled || rule.days.is_empty() {
        return Vec::new();
    }

    let dates: Vec<NaiveDate> = window
        .dates()
        .filter(|date| matches(rule, window, *date))
        .collect();

    tracing::debug!(
        "expanded {} dates between {} and {}",
        dates.len(),
        window.start_date(),
        window.end_date()
    );
    dates
}
