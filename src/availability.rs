//! Which sources delivered a summary report on which day of a month.

use std::collections::HashMap;

use askama::Template;
use chrono::{Datelike, NaiveDate};

use crate::dates::offset;
use crate::records::{ReportCount, Sources};
use crate::sqlite::{Param, StatsDb, StatsTable};
use crate::sqlite_queries::COUNT_REPORTS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Missing,
    Present,
    /// More than one report for the same day.
    Count(i64),
}

impl Mark {
    fn from_count(count: i64) -> Self {
        match count {
            n if n <= 0 => Mark::Missing,
            1 => Mark::Present,
            n => Mark::Count(n),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AvailabilityRow {
    pub label: String,
    pub marks: Vec<Mark>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Availability {
    pub days: Vec<NaiveDate>,
    pub rows: Vec<AvailabilityRow>,
}

/// Days from `first` to `last`, inclusive.
fn days_between(first: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut day = first;
    while day <= last {
        days.push(day);
        let next = offset(day, 1);
        if next == day {
            break;
        }
        day = next;
    }
    days
}

/// Lays report counts out as one row per source and one column per day.
pub fn matrix_from_counts(
    sources: &Sources,
    first: NaiveDate,
    last: NaiveDate,
    counts: &[ReportCount],
) -> Availability {
    let days = days_between(first, last);
    let by_cell: HashMap<(&str, i64), i64> = counts
        .iter()
        .map(|c| ((c.start_day.as_str(), c.src), c.reports))
        .collect();

    let rows = sources
        .iter()
        .map(|source| AvailabilityRow {
            label: sources
                .label(source.id)
                .map(str::to_string)
                .unwrap_or_else(|| source.id.to_string()),
            marks: days
                .iter()
                .map(|day| {
                    let key = day.to_string();
                    Mark::from_count(by_cell.get(&(key.as_str(), source.id)).copied().unwrap_or(0))
                })
                .collect(),
        })
        .collect();

    Availability { days, rows }
}

/// Counts every source's reports between `first` and `last` in one query.
pub async fn build(
    db: &mut StatsDb,
    sources: &Sources,
    first: NaiveDate,
    last: NaiveDate,
) -> Availability {
    let counts: Vec<ReportCount> = db
        .fetch(
            StatsTable::Summary,
            COUNT_REPORTS,
            &[Param::from(first.to_string()), Param::from(last.to_string())],
        )
        .await;
    matrix_from_counts(sources, first, last, &counts)
}

struct DayHeader {
    number: u32,
    today: bool,
}

struct MarkCell {
    class: &'static str,
    text: String,
    today: bool,
}

struct MatrixRow<'a> {
    label: &'a str,
    cells: Vec<MarkCell>,
}

#[derive(Template)]
#[template(path = "availability.html")]
struct MatrixHtml<'a> {
    days: Vec<DayHeader>,
    rows: Vec<MatrixRow<'a>>,
}

/// HTML matrix with the column of `highlight` marked.
pub fn render(
    availability: &Availability,
    highlight: Option<NaiveDate>,
) -> askama::Result<String> {
    let is_today = |day: &NaiveDate| Some(*day) == highlight;
    let days: Vec<DayHeader> = availability
        .days
        .iter()
        .map(|day| DayHeader {
            number: day.day(),
            today: is_today(day),
        })
        .collect();
    let rows: Vec<MatrixRow> = availability
        .rows
        .iter()
        .map(|row| MatrixRow {
            label: &row.label,
            cells: availability
                .days
                .iter()
                .zip(&row.marks)
                .map(|(day, mark)| {
                    let (class, text) = match mark {
                        Mark::Missing => ("avail-no", "no".to_string()),
                        Mark::Present => ("avail-yes", "yes".to_string()),
                        Mark::Count(n) => ("avail-multi", n.to_string()),
                    };
                    MarkCell {
                        class,
                        text,
                        today: is_today(day),
                    }
                })
                .collect(),
        })
        .collect();

    MatrixHtml { days, rows }.render()
}

/// Tab separated matrix for the plain-text pages.
pub fn render_text(availability: &Availability) -> String {
    let mut lines = Vec::with_capacity(availability.rows.len() + 1);
    let header: Vec<String> = std::iter::once("DCID".to_string())
        .chain(availability.days.iter().map(|d| d.day().to_string()))
        .collect();
    lines.push(header.join("\t"));
    for row in &availability.rows {
        let fields: Vec<String> = std::iter::once(row.label.clone())
            .chain(row.marks.iter().map(|mark| match mark {
                Mark::Missing => "no".to_string(),
                Mark::Present => "yes".to_string(),
                Mark::Count(n) => n.to_string(),
            }))
            .collect();
        lines.push(fields.join("\t"));
    }
    let mut text = lines.join("\n");
    text.push('\n');
    text
}
