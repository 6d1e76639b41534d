//! US federal holiday calendar used to flag measurements and forecasts.

use chrono::{Datelike, Days, NaiveDate, Weekday};

/// Returns `true` if `date` is a US federal holiday or the observed day of one.
///
/// Fixed-date holidays on a Saturday are observed the Friday before, on a
/// Sunday the Monday after.
pub fn is_holiday(date: NaiveDate) -> bool {
    let year = date.year();

    let fixed = [(1, 1), (6, 19), (7, 4), (11, 11), (12, 25)];
    for (month, day) in fixed {
        let Some(actual) = NaiveDate::from_ymd_opt(year, month, day) else {
            continue;
        };
        if date == actual || observed(actual) == Some(date) {
            return true;
        }
    }

    // Next year's New Year's Day observed on Dec 31
    if let Some(next_new_year) = NaiveDate::from_ymd_opt(year + 1, 1, 1) {
        if observed(next_new_year) == Some(date) {
            return true;
        }
    }

    let floating = [
        (1, Weekday::Mon, 3),  // Martin Luther King Jr. Day
        (2, Weekday::Mon, 3),  // Presidents' Day
        (9, Weekday::Mon, 1),  // Labor Day
        (10, Weekday::Mon, 2), // Columbus Day
        (11, Weekday::Thu, 4), // Thanksgiving
    ];
    for (month, weekday, n) in floating {
        if NaiveDate::from_weekday_of_month_opt(year, month, weekday, n) == Some(date) {
            return true;
        }
    }

    last_weekday_of_month(year, 5, Weekday::Mon) == Some(date)
}

fn observed(date: NaiveDate) -> Option<NaiveDate> {
    match date.weekday() {
        Weekday::Sat => date.checked_sub_days(Days::new(1)),
        Weekday::Sun => date.checked_add_days(Days::new(1)),
        _ => None,
    }
}

fn last_weekday_of_month(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, 5)
        .or_else(|| NaiveDate::from_weekday_of_month_opt(year, month, weekday, 4))
}
