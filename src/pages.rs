//! The daily, monthly and per-network report pages.

use std::collections::BTreeSet;

use askama::Template;
use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::AppState;
use crate::argument_parsing::Config;
use crate::availability;
use crate::charts::{self, Chart};
use crate::dates::{clean_date, month_bounds, month_next, month_prev, offset};
use crate::error::ApiError;
use crate::records::{
    ClientIpRecord, MessageRecord, NetworkRecord, Record, RequestRecord, Source, Sources,
    SummaryRecord, UserIpRecord, UserRecord, VolumeRecord,
};
use crate::sanitize::{clean_code, clean_dcid_list};
use crate::sqlite::{Param, StatsDb, StatsTable};
use crate::sqlite_queries::{SELECT_DAY, SELECT_NETWORK_CODES, SELECT_NETWORK_RANGE, SELECT_RANGE};
use crate::table::{NETWORK_COLUMN, Options, Row, Table, TableFormat, render_table};

const SUMMARY_SUMS: &[&str] = &[
    "requests",
    "requests_with_errors",
    "error_count",
    "users",
    "total_lines",
    "total_size",
];
const REQUEST_SUMS: &[&str] = &["requests", "lines", "nodata", "errors", "size"];
const VOLUME_SUMS: &[&str] = &["requests", "lines", "errors", "size"];
const NETWORK_SUMS: &[&str] = &["requests", "lines", "nodata", "errors", "size"];
const MESSAGE_SUMS: &[&str] = &["count"];
const ACTIVITY_SUMS: &[&str] = &["requests", "lines", "errors", "size"];

/// Query parameters shared by all pages.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub date: Option<String>,
    pub dcid: Option<String>,
    pub code: Option<String>,
    pub showall: Option<String>,
    pub format: Option<String>,
}

impl PageQuery {
    /// Requested day; yesterday when absent.
    fn day(&self) -> NaiveDate {
        let yesterday = offset(Utc::now().date_naive(), -1);
        self.date
            .as_deref()
            .map(|text| clean_date(text, yesterday))
            .unwrap_or(yesterday)
    }

    fn dcids(&self) -> Vec<String> {
        self.dcid.as_deref().map(clean_dcid_list).unwrap_or_default()
    }

    fn showall(&self, config: &Config) -> bool {
        self.showall.is_some() && config.allow_showall
    }

    fn format(&self) -> TableFormat {
        match self.format.as_deref() {
            Some("text") | Some("txt") => TableFormat::Text,
            _ => TableFormat::Html,
        }
    }
}

pub struct Link {
    pub label: String,
    pub href: String,
    pub image: bool,
}

impl Link {
    fn to(label: impl Into<String>, href: String) -> Self {
        Self {
            label: label.into(),
            href,
            image: false,
        }
    }

    fn image(label: impl Into<String>, href: String) -> Self {
        Self {
            label: label.into(),
            href,
            image: true,
        }
    }
}

pub struct Section {
    pub title: String,
    pub body: String,
}

#[derive(Template)]
#[template(path = "report.html")]
pub struct ReportPage {
    pub title: String,
    pub nav: Vec<Link>,
    pub as_of: Option<String>,
    pub notices: Vec<String>,
    pub charts: Vec<Link>,
    pub sections: Vec<Section>,
}

impl ReportPage {
    fn new(title: String, db: &StatsDb, sections: Vec<Section>) -> Self {
        Self {
            title,
            nav: Vec::new(),
            as_of: db
                .modified()
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
            notices: db.notices().to_vec(),
            charts: Vec::new(),
            sections,
        }
    }

    fn respond(self, format: TableFormat) -> Response {
        match format {
            TableFormat::Html => self.into_response(),
            TableFormat::Text => {
                let mut text = format!("{}\n", self.title);
                for notice in &self.notices {
                    text.push_str(&format!("! {notice}\n"));
                }
                for section in &self.sections {
                    text.push_str(&format!("\n# {}\n{}", section.title, section.body));
                }
                ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text).into_response()
            }
        }
    }
}

/// Collects a page's rendered tables, restricted to the selected sources.
struct Sections<'a> {
    sources: &'a Sources,
    wanted: Option<Vec<i64>>,
    format: TableFormat,
    rendered: Vec<Section>,
}

impl<'a> Sections<'a> {
    fn new(sources: &'a Sources, dcids: &[String], format: TableFormat) -> Self {
        Self {
            sources,
            wanted: (!dcids.is_empty()).then(|| sources.ids_for(dcids)),
            format,
            rendered: Vec::new(),
        }
    }

    /// Whether rows of source `src` belong on the page.
    fn wants(&self, src: i64) -> bool {
        self.wanted.as_ref().is_none_or(|ids| ids.contains(&src))
    }

    fn table<R: Record>(&self, records: Vec<R>) -> Table {
        Table::from_records(records.into_iter().filter(|r| self.wants(r.src())))
    }

    fn push(&mut self, title: &str, table: &Table, options: &Options) -> Result<(), ApiError> {
        let body = render_table(self.format, self.sources, table, options)?;
        self.raw(title, body);
        Ok(())
    }

    /// One row per record.
    fn rows<R: Record>(
        &mut self,
        title: &str,
        records: Vec<R>,
        options: Options,
    ) -> Result<(), ApiError> {
        let table = self.table(records).hide("start_day");
        self.push(title, &table, &options)
    }

    /// Records grouped by `keys` with the summable columns added up.
    fn rolled<R: Record>(
        &mut self,
        title: &str,
        records: Vec<R>,
        keys: &[&str],
        options: Options,
    ) -> Result<(), ApiError> {
        let table = self.table(records).rollup(keys, &options.summable);
        self.push(title, &table, &options)
    }

    fn raw(&mut self, title: &str, body: String) {
        self.rendered.push(Section {
            title: title.to_string(),
            body,
        });
    }
}

fn page_link(path: &str, day: NaiveDate, dcids: &[String]) -> String {
    let mut href = format!("{path}?date={day}");
    if !dcids.is_empty() {
        href.push_str("&dcid=");
        href.push_str(&urlencoding::encode(&dcids.join(",")));
    }
    href
}

fn first_of(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

#[axum::debug_handler]
pub async fn daily(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let day = query.day();
    let dcids = query.dcids();
    let format = query.format();
    let showall = query.showall(&state.config);
    debug!(%day, ?dcids, showall, "daily report");

    let mut db = StatsDb::open(&state.config, day.year()).await?;
    let sources = db.sources().await;
    let params = [Param::from(day.to_string())];

    let mut sections = Sections::new(&sources, &dcids, format);
    sections.rows(
        "Sources",
        sources.iter().cloned().collect::<Vec<Source>>(),
        Options::default(),
    )?;
    sections.rows(
        "Summary",
        db.records::<SummaryRecord>(SELECT_DAY, &params).await,
        Options::summing(SUMMARY_SUMS),
    )?;
    sections.rows(
        "Request types",
        db.records::<RequestRecord>(SELECT_DAY, &params).await,
        Options::summing(REQUEST_SUMS),
    )?;
    sections.rows(
        "Volumes",
        db.records::<VolumeRecord>(SELECT_DAY, &params).await,
        Options::summing(VOLUME_SUMS),
    )?;
    sections.rows(
        "Networks",
        db.records::<NetworkRecord>(SELECT_DAY, &params).await,
        Options::summing(NETWORK_SUMS).linked(),
    )?;
    sections.rows(
        "Messages",
        db.records::<MessageRecord>(SELECT_DAY, &params).await,
        Options::summing(MESSAGE_SUMS),
    )?;

    if showall {
        if db.has_table(UserRecord::TABLE).await {
            sections.rows(
                "Users",
                db.records::<UserRecord>(SELECT_DAY, &params).await,
                Options::summing(ACTIVITY_SUMS),
            )?;
        }
        if db.has_table(UserIpRecord::TABLE).await {
            sections.rows(
                "User IPs",
                db.records::<UserIpRecord>(SELECT_DAY, &params).await,
                Options::summing(ACTIVITY_SUMS),
            )?;
        }
        if db.has_table(ClientIpRecord::TABLE).await {
            sections.rows(
                "Client IPs",
                db.records::<ClientIpRecord>(SELECT_DAY, &params).await,
                Options::summing(ACTIVITY_SUMS),
            )?;
        }
    }

    let sections = sections.rendered;
    let mut page = ReportPage::new(format!("Request statistics for {day}"), &db, sections);
    page.nav = vec![
        Link::to("Previous day", page_link("/daily", offset(day, -1), &dcids)),
        Link::to("Next day", page_link("/daily", offset(day, 1), &dcids)),
        Link::to("Month", page_link("/monthly", day, &dcids)),
        Link::to("Networks", page_link("/network", day, &[])),
    ];
    if let Some(href) = charts::find(&state.config, Chart::Year(day.year())).await {
        page.charts.push(Link::image(format!("Total for {}", day.year()), href));
    }
    Ok(page.respond(format))
}

#[axum::debug_handler]
pub async fn monthly(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let day = query.day();
    let dcids = query.dcids();
    let format = query.format();
    let (year, month) = (day.year(), day.month());
    let (first, last) = month_bounds(year, month).unwrap_or((day, day));
    debug!(year, month, ?dcids, "monthly report");

    let mut db = StatsDb::open(&state.config, year).await?;
    let sources = db.sources().await;
    let shown = if dcids.is_empty() {
        sources.clone()
    } else {
        sources.only(&sources.ids_for(&dcids))
    };
    let params = [Param::from(first.to_string()), Param::from(last.to_string())];

    let matrix = availability::build(&mut db, &shown, first, last).await;
    let mut sections = Sections::new(&sources, &dcids, format);
    let received = match format {
        TableFormat::Html => availability::render(&matrix, Some(day))?,
        TableFormat::Text => availability::render_text(&matrix),
    };
    sections.raw("Reports received", received);
    sections.rolled(
        "Summary by source",
        db.records::<SummaryRecord>(SELECT_RANGE, &params).await,
        &["src"],
        Options::summing(SUMMARY_SUMS),
    )?;
    sections.rolled(
        "Request types",
        db.records::<RequestRecord>(SELECT_RANGE, &params).await,
        &["type"],
        Options::summing(REQUEST_SUMS),
    )?;
    sections.rolled(
        "Volumes",
        db.records::<VolumeRecord>(SELECT_RANGE, &params).await,
        &["type"],
        Options::summing(VOLUME_SUMS),
    )?;
    sections.rolled(
        "Networks",
        db.records::<NetworkRecord>(SELECT_RANGE, &params).await,
        &[NETWORK_COLUMN],
        Options::summing(NETWORK_SUMS).linked(),
    )?;

    let sections = sections.rendered;
    let title = format!("Request statistics for {year}-{month:02}");
    let mut page = ReportPage::new(title, &db, sections);
    let (prev_year, prev_month, _) = month_prev(year, month, 1);
    let (next_year, next_month, _) = month_next(year, month, 1);
    if let Some(prev) = first_of(prev_year, prev_month) {
        page.nav.push(Link::to("Previous month", page_link("/monthly", prev, &dcids)));
    }
    if let Some(next) = first_of(next_year, next_month) {
        page.nav.push(Link::to("Next month", page_link("/monthly", next, &dcids)));
    }
    page.nav.push(Link::to("Day", page_link("/daily", day, &dcids)));

    if let Some(href) = charts::find(&state.config, Chart::Month(year, month)).await {
        page.charts.push(Link::image(format!("Total for {year}-{month:02}"), href));
    }
    if let Some(href) = charts::find(&state.config, Chart::MonthSummary(year, month)).await {
        page.charts.push(Link::to("Monthly summary (text)", href));
    }
    Ok(page.respond(format))
}

#[axum::debug_handler]
pub async fn network(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let day = query.day();
    let dcids = query.dcids();
    let format = query.format();
    let year = day.year();
    let code = match query.code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(raw) => Some(clean_code(raw).ok_or_else(|| ApiError::InvalidCode(raw.to_string()))?),
        None => None,
    };
    debug!(year, ?code, "network report");

    let first = first_of(year, 1).unwrap_or(day);
    let last = NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(day);
    let mut db = StatsDb::open(&state.config, year).await?;
    let sources = db.sources().await;
    let mut sections = Sections::new(&sources, &dcids, format);

    let title = match &code {
        None => {
            let pairs: Vec<(String, i64)> = db
                .fetch(
                    StatsTable::Network,
                    SELECT_NETWORK_CODES,
                    &[Param::from(first.to_string()), Param::from(last.to_string())],
                )
                .await;
            let codes: BTreeSet<String> = pairs
                .into_iter()
                .filter(|(_, src)| sections.wants(*src))
                .map(|(code, _)| code)
                .collect();
            let table = Table::new(&[NETWORK_COLUMN])
                .with_rows(codes.into_iter().map(|c| Row::new().with(NETWORK_COLUMN, c)));
            sections.push("Networks", &table, &Options::default().linked())?;
            format!("Networks in {year}")
        }
        Some(code) => {
            let params = [
                Param::from(code.as_str()),
                Param::from(first.to_string()),
                Param::from(last.to_string()),
            ];
            let records = db.records::<NetworkRecord>(SELECT_NETWORK_RANGE, &params).await;
            sections.rolled(
                "By month",
                records.clone(),
                &["month"],
                Options::summing(NETWORK_SUMS),
            )?;
            sections.rolled(
                "By source",
                records,
                &["src"],
                Options::summing(NETWORK_SUMS),
            )?;
            format!("Network {code} in {year}")
        }
    };

    let sections = sections.rendered;
    let mut page = ReportPage::new(title, &db, sections);
    let code_param = code
        .as_deref()
        .map(|c| format!("&code={}", urlencoding::encode(c)))
        .unwrap_or_default();
    for (label, target) in [("Previous year", year - 1), ("Next year", year + 1)] {
        if let Some(target) = first_of(target, 1) {
            let href = format!("{}{code_param}", page_link("/network", target, &dcids));
            page.nav.push(Link::to(label, href));
        }
    }
    if code.is_some() {
        page.nav.push(Link::to("All networks", page_link("/network", day, &dcids)));
    }
    if let Some(code) = &code {
        if let Some(href) = charts::find(&state.config, Chart::Network(code.clone(), year)).await {
            page.charts.push(Link::image(format!("Network {code} in {year}"), href));
        }
    }
    Ok(page.respond(format))
}
