//! Day-string arithmetic for the report pages.
//!
//! Days travel through query strings as `YYYY-MM-DD`. Everything in here works on
//! [`NaiveDate`] once a string has been through [`clean_date`].

use chrono::{Datelike, NaiveDate, TimeDelta};

/// The day `n` days after `day`. `n` may be negative.
///
/// An offset that leaves the representable calendar returns `day` unchanged.
pub fn offset(day: NaiveDate, n: i64) -> NaiveDate {
    TimeDelta::try_days(n)
        .and_then(|delta| day.checked_add_signed(delta))
        .unwrap_or(day)
}

/// Same day of the previous month, wrapping the year at January.
pub fn month_prev(year: i32, month: u32, day: u32) -> (i32, u32, u32) {
    if month <= 1 {
        (year - 1, 12, day)
    } else {
        (year, month - 1, day)
    }
}

/// Same day of the next month, wrapping the year at December.
pub fn month_next(year: i32, month: u32, day: u32) -> (i32, u32, u32) {
    if month >= 12 {
        (year + 1, 1, day)
    } else {
        (year, month + 1, day)
    }
}

/// First and last day of a month.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let (next_year, next_month, _) = month_next(year, month, 1);
    let last = NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()?;
    Some((first, last))
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    month_bounds(year, month)
        .map(|(_, last)| last.day())
        .unwrap_or(0)
}

/// Best-effort parse of a user supplied day.
///
/// Leading non-digits are skipped and the first `%d-%d-%d` is read. Fields that are out
/// of range roll over like calendar arithmetic does, so `2014-13-01` is `2015-01-01` and
/// `2014-02-30` is `2014-03-02`. Missing month or day fields count as 1. Text without
/// any digits, or a result outside the calendar, gives `fallback`.
pub fn clean_date(text: &str, fallback: NaiveDate) -> NaiveDate {
    let Some(start) = text.find(|c: char| c.is_ascii_digit()) else {
        return fallback;
    };
    let mut fields = text[start..].splitn(3, '-').map(leading_int);

    let year = fields.next().flatten();
    let month = fields.next().flatten().unwrap_or(1);
    let day = fields.next().flatten().unwrap_or(1);

    year.and_then(|year| normalize(year, month, day))
        .unwrap_or(fallback)
}

fn leading_int(field: &str) -> Option<i64> {
    let digits: String = field.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn normalize(year: i64, month: i64, day: i64) -> Option<NaiveDate> {
    let months = year.checked_mul(12)?.checked_add(month - 1)?;
    let year = i32::try_from(months.div_euclid(12)).ok()?;
    let month = u32::try_from(months.rem_euclid(12) + 1).ok()?;
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    first.checked_add_signed(TimeDelta::try_days(day - 1)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn offset_round_trips() {
        let days = [ymd(2014, 1, 1), ymd(2016, 2, 29), ymd(1999, 12, 31), ymd(2024, 7, 15)];
        for day in days {
            for n in [-1000, -366, -31, -1, 0, 1, 28, 365, 4000] {
                assert_eq!(offset(offset(day, n), -n), day, "day {day} n {n}");
            }
        }
    }

    #[test]
    fn offset_crosses_month_and_leap_day() {
        assert_eq!(offset(ymd(2016, 2, 28), 1), ymd(2016, 2, 29));
        assert_eq!(offset(ymd(2015, 2, 28), 1), ymd(2015, 3, 1));
        assert_eq!(offset(ymd(2014, 1, 1), -1), ymd(2013, 12, 31));
    }

    #[test]
    fn offset_out_of_range_is_identity() {
        assert_eq!(offset(ymd(2014, 1, 1), i64::MAX), ymd(2014, 1, 1));
    }

    #[test]
    fn adjacent_months_wrap_the_year() {
        assert_eq!(month_prev(2014, 1, 15), (2013, 12, 15));
        assert_eq!(month_prev(2014, 6, 3), (2014, 5, 3));
        assert_eq!(month_next(2014, 12, 31), (2015, 1, 31));
        assert_eq!(month_next(2014, 2, 1), (2014, 3, 1));
    }

    #[test]
    fn month_boundaries() {
        assert_eq!(month_bounds(2016, 2), Some((ymd(2016, 2, 1), ymd(2016, 2, 29))));
        assert_eq!(month_bounds(2014, 12), Some((ymd(2014, 12, 1), ymd(2014, 12, 31))));
        assert_eq!(month_bounds(2014, 13), None);
        assert_eq!(days_in_month(2015, 2), 28);
        assert_eq!(days_in_month(2015, 4), 30);
    }

    #[test]
    fn clean_date_pads_and_skips_prefix() {
        let fallback = ymd(2000, 1, 1);
        assert_eq!(clean_date("2014-5-6", fallback), ymd(2014, 5, 6));
        assert_eq!(clean_date("date=2014-05-06", fallback), ymd(2014, 5, 6));
        assert_eq!(clean_date("  2014-05-06xyz", fallback), ymd(2014, 5, 6));
        assert_eq!(clean_date("2014-05-06", fallback).to_string(), "2014-05-06");
    }

    #[test]
    fn clean_date_rolls_over_out_of_range_fields() {
        let fallback = ymd(2000, 1, 1);
        assert_eq!(clean_date("2014-02-30", fallback), ymd(2014, 3, 2));
        assert_eq!(clean_date("2014-13-01", fallback), ymd(2015, 1, 1));
        assert_eq!(clean_date("2014-00-10", fallback), ymd(2013, 12, 10));
        assert_eq!(clean_date("2014", fallback), ymd(2014, 1, 1));
    }

    #[test]
    fn clean_date_without_digits_falls_back() {
        let fallback = ymd(2000, 1, 1);
        assert_eq!(clean_date("", fallback), fallback);
        assert_eq!(clean_date("yesterday", fallback), fallback);
        assert_eq!(clean_date("99999999999999999999-01-01", fallback), fallback);
    }
}
