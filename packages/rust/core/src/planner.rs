//! Search window and month keywords for a run.

use chrono::{Datelike, Months, NaiveDate};

use eventfeed_shared::QueryPlan;

/// Months covered by the window, counting the current one.
const WINDOW_MONTHS: u32 = 2;

/// Plan the run for `today`.
///
/// The window is `[today, today + 2 months]`; when the target month is
/// shorter the end is clamped to its last day (Dec 31 + 2 months = Feb 28/29).
/// Keywords name the current month and the next two, rolling the year.
pub fn plan_queries(today: NaiveDate) -> QueryPlan {
    let window_end = today
        .checked_add_months(Months::new(WINDOW_MONTHS))
        .unwrap_or(NaiveDate::MAX);

    let keywords = (0..=WINDOW_MONTHS)
        .map(|offset| {
            let index = today.month0() + offset;
            let year = today.year() + (index / 12) as i32;
            let month = index % 12 + 1;
            format!("\"{year} {month}月\"")
        })
        .collect::<Vec<_>>()
        .join(" OR ");

    QueryPlan {
        window_start: today,
        window_end,
        keywords,
    }
}
