//! One record type per statistics table.
//!
//! Counts are read through `CAST(.. AS INTEGER)` and sizes through `CAST(.. AS TEXT)`,
//! since the ingest job stores sizes as display strings like `"1.2 GiB"`.

use std::collections::BTreeMap;

use sqlx::{FromRow, sqlite::SqliteRow};

use crate::sqlite::StatsTable;
use crate::table::{Row, Table};

/// A typed row that can be shown through the generic table renderer.
pub trait Record: for<'r> FromRow<'r, SqliteRow> + Send + Unpin {
    const TABLE: StatsTable;
    /// Select list substituted for `{columns}`.
    const COLUMNS: &'static str;
    const HEADERS: &'static [&'static str];

    /// Source ID the row was reported by.
    fn src(&self) -> i64;

    fn into_row(self) -> Row;
}

impl Table {
    pub fn from_records<R: Record>(records: impl IntoIterator<Item = R>) -> Table {
        Table::new(R::HEADERS).with_rows(records.into_iter().map(Record::into_row))
    }
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Source {
    pub id: i64,
    pub host: String,
    pub port: Option<i64>,
    pub dcid: String,
    pub description: Option<String>,
}

impl Record for Source {
    const TABLE: StatsTable = StatsTable::Source;
    const COLUMNS: &'static str = "id, COALESCE(host, '') AS host, CAST(port AS INTEGER) AS port, \
         COALESCE(dcid, '') AS dcid, description";
    const HEADERS: &'static [&'static str] = &["id", "dcid", "host", "port", "description"];

    fn src(&self) -> i64 {
        self.id
    }

    fn into_row(self) -> Row {
        Row::new()
            .with("id", self.id)
            .with("dcid", self.dcid)
            .with("host", self.host)
            .with("port", self.port)
            .with("description", self.description)
    }
}

/// Registered sources by ID.
#[derive(Debug, Clone, Default)]
pub struct Sources(BTreeMap<i64, Source>);

impl Sources {
    /// Display label (the DCID) of a source ID.
    pub fn label(&self, id: i64) -> Option<&str> {
        self.0
            .get(&id)
            .map(|s| s.dcid.as_str())
            .filter(|dcid| !dcid.is_empty())
    }

    /// IDs of the sources whose DCID is in `dcids`. Matching ignores case.
    pub fn ids_for(&self, dcids: &[String]) -> Vec<i64> {
        self.0
            .values()
            .filter(|s| dcids.iter().any(|d| d.eq_ignore_ascii_case(&s.dcid)))
            .map(|s| s.id)
            .collect()
    }

    /// The subset with the given IDs.
    pub fn only(&self, ids: &[i64]) -> Sources {
        Sources(
            self.0
                .iter()
                .filter(|(id, _)| ids.contains(id))
                .map(|(id, source)| (*id, source.clone()))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Source>> for Sources {
    fn from(sources: Vec<Source>) -> Self {
        Sources(sources.into_iter().map(|s| (s.id, s)).collect())
    }
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct SummaryRecord {
    pub start_day: String,
    pub src: i64,
    pub requests: Option<i64>,
    pub requests_with_errors: Option<i64>,
    pub error_count: Option<i64>,
    pub users: Option<i64>,
    pub stations: Option<i64>,
    pub total_lines: Option<i64>,
    pub total_size: Option<String>,
}

impl Record for SummaryRecord {
    const TABLE: StatsTable = StatsTable::Summary;
    const COLUMNS: &'static str = "start_day, src, \
         CAST(requests AS INTEGER) AS requests, \
         CAST(requests_with_errors AS INTEGER) AS requests_with_errors, \
         CAST(error_count AS INTEGER) AS error_count, \
         CAST(users AS INTEGER) AS users, \
         CAST(stations AS INTEGER) AS stations, \
         CAST(total_lines AS INTEGER) AS total_lines, \
         CAST(total_size AS TEXT) AS total_size";
    const HEADERS: &'static [&'static str] = &[
        "start_day",
        "src",
        "requests",
        "requests_with_errors",
        "error_count",
        "users",
        "stations",
        "total_lines",
        "total_size",
    ];

    fn src(&self) -> i64 {
        self.src
    }

    fn into_row(self) -> Row {
        Row::new()
            .with("start_day", self.start_day)
            .with("src", self.src)
            .with("requests", self.requests)
            .with("requests_with_errors", self.requests_with_errors)
            .with("error_count", self.error_count)
            .with("users", self.users)
            .with("stations", self.stations)
            .with("total_lines", self.total_lines)
            .with("total_size", self.total_size)
    }
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct RequestRecord {
    pub start_day: String,
    pub src: i64,
    pub request_type: Option<String>,
    pub requests: Option<i64>,
    pub lines: Option<i64>,
    pub nodata: Option<i64>,
    pub errors: Option<i64>,
    pub size: Option<String>,
}

impl Record for RequestRecord {
    const TABLE: StatsTable = StatsTable::Request;
    const COLUMNS: &'static str = "start_day, src, type AS request_type, \
         CAST(requests AS INTEGER) AS requests, CAST(lines AS INTEGER) AS lines, \
         CAST(nodata AS INTEGER) AS nodata, CAST(errors AS INTEGER) AS errors, \
         CAST(size AS TEXT) AS size";
    const HEADERS: &'static [&'static str] = &[
        "start_day", "src", "type", "requests", "lines", "nodata", "errors", "size",
    ];

    fn src(&self) -> i64 {
        self.src
    }

    fn into_row(self) -> Row {
        Row::new()
            .with("start_day", self.start_day)
            .with("src", self.src)
            .with("type", self.request_type)
            .with("requests", self.requests)
            .with("lines", self.lines)
            .with("nodata", self.nodata)
            .with("errors", self.errors)
            .with("size", self.size)
    }
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct VolumeRecord {
    pub start_day: String,
    pub src: i64,
    pub volume_type: Option<String>,
    pub requests: Option<i64>,
    pub lines: Option<i64>,
    pub errors: Option<i64>,
    pub size: Option<String>,
}

impl Record for VolumeRecord {
    const TABLE: StatsTable = StatsTable::Volume;
    const COLUMNS: &'static str = "start_day, src, type AS volume_type, \
         CAST(requests AS INTEGER) AS requests, CAST(lines AS INTEGER) AS lines, \
         CAST(errors AS INTEGER) AS errors, CAST(size AS TEXT) AS size";
    const HEADERS: &'static [&'static str] =
        &["start_day", "src", "type", "requests", "lines", "errors", "size"];

    fn src(&self) -> i64 {
        self.src
    }

    fn into_row(self) -> Row {
        Row::new()
            .with("start_day", self.start_day)
            .with("src", self.src)
            .with("type", self.volume_type)
            .with("requests", self.requests)
            .with("lines", self.lines)
            .with("errors", self.errors)
            .with("size", self.size)
    }
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct NetworkRecord {
    pub start_day: String,
    pub src: i64,
    pub network_code: Option<String>,
    pub requests: Option<i64>,
    pub lines: Option<i64>,
    pub nodata: Option<i64>,
    pub errors: Option<i64>,
    pub size: Option<String>,
}

impl Record for NetworkRecord {
    const TABLE: StatsTable = StatsTable::Network;
    const COLUMNS: &'static str = "start_day, src, networkCode AS network_code, \
         CAST(requests AS INTEGER) AS requests, CAST(lines AS INTEGER) AS lines, \
         CAST(nodata AS INTEGER) AS nodata, CAST(errors AS INTEGER) AS errors, \
         CAST(size AS TEXT) AS size";
    const HEADERS: &'static [&'static str] = &[
        "start_day",
        "src",
        "networkCode",
        "requests",
        "lines",
        "nodata",
        "errors",
        "size",
    ];

    fn src(&self) -> i64 {
        self.src
    }

    fn into_row(self) -> Row {
        let month = self.start_day.get(..7).map(str::to_string);
        Row::new()
            .with("start_day", self.start_day)
            .with("month", month)
            .with("src", self.src)
            .with("networkCode", self.network_code)
            .with("requests", self.requests)
            .with("lines", self.lines)
            .with("nodata", self.nodata)
            .with("errors", self.errors)
            .with("size", self.size)
    }
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct MessageRecord {
    pub start_day: String,
    pub src: i64,
    pub message: Option<String>,
    pub count: Option<i64>,
}

impl Record for MessageRecord {
    const TABLE: StatsTable = StatsTable::Messages;
    const COLUMNS: &'static str =
        "start_day, src, message, CAST(count AS INTEGER) AS count";
    const HEADERS: &'static [&'static str] = &["start_day", "src", "message", "count"];

    fn src(&self) -> i64 {
        self.src
    }

    fn into_row(self) -> Row {
        Row::new()
            .with("start_day", self.start_day)
            .with("src", self.src)
            .with("message", self.message)
            .with("count", self.count)
    }
}

/// Per-user, per-user-IP and per-client-IP tables share one layout.
macro_rules! activity_record {
    ($name:ident, $table:expr, $column:literal, $header:literal) => {
        #[derive(Debug, Clone, PartialEq, FromRow)]
        pub struct $name {
            pub start_day: String,
            pub src: i64,
            pub who: Option<String>,
            pub requests: Option<i64>,
            pub lines: Option<i64>,
            pub errors: Option<i64>,
            pub size: Option<String>,
        }

        impl Record for $name {
            const TABLE: StatsTable = $table;
            const COLUMNS: &'static str = concat!(
                "start_day, src, ",
                $column,
                " AS who, CAST(requests AS INTEGER) AS requests, ",
                "CAST(lines AS INTEGER) AS lines, CAST(errors AS INTEGER) AS errors, ",
                "CAST(size AS TEXT) AS size"
            );
            const HEADERS: &'static [&'static str] =
                &["start_day", "src", $header, "requests", "lines", "errors", "size"];

            fn src(&self) -> i64 {
                self.src
            }

            fn into_row(self) -> Row {
                Row::new()
                    .with("start_day", self.start_day)
                    .with("src", self.src)
                    .with($header, self.who)
                    .with("requests", self.requests)
                    .with("lines", self.lines)
                    .with("errors", self.errors)
                    .with("size", self.size)
            }
        }
    };
}

activity_record!(UserRecord, StatsTable::User, "userID", "user");
activity_record!(UserIpRecord, StatsTable::UserIp, "userIP", "userIP");
activity_record!(ClientIpRecord, StatsTable::ClientIp, "clientIP", "clientIP");

/// Number of summary reports a source delivered for a day.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ReportCount {
    pub start_day: String,
    pub src: i64,
    pub reports: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    fn source(id: i64, dcid: &str) -> Source {
        Source {
            id,
            host: format!("host{id}"),
            port: None,
            dcid: dcid.to_string(),
            description: None,
        }
    }

    #[test]
    fn sources_map_ids_to_labels() {
        let sources = Sources::from(vec![source(1, "GFZ"), source(2, "ODC"), source(3, "")]);
        assert_eq!(sources.label(1), Some("GFZ"));
        assert_eq!(sources.label(3), None);
        assert_eq!(sources.label(9), None);
        assert_eq!(sources.ids_for(&["odc".to_string(), "NOA".to_string()]), vec![2]);
        assert_eq!(sources.len(), 3);
        assert_eq!(sources.only(&[2, 9]).len(), 1);
    }

    #[test]
    fn records_become_rows_under_their_headers() {
        let record = NetworkRecord {
            start_day: "2014-03-02".to_string(),
            src: 4,
            network_code: Some("GE".to_string()),
            requests: Some(10),
            lines: None,
            nodata: Some(0),
            errors: Some(1),
            size: Some("1.5 MiB".to_string()),
        };
        let table = Table::from_records(vec![record]);
        assert_eq!(table.headers, NetworkRecord::HEADERS);
        let row = &table.rows[0];
        assert_eq!(row.get("networkCode"), Some(&Cell::Text("GE".to_string())));
        assert_eq!(row.get("month"), Some(&Cell::Text("2014-03".to_string())));
        assert_eq!(row.get("lines"), Some(&Cell::Null));
    }

    #[test]
    fn activity_records_use_their_own_header() {
        assert_eq!(UserIpRecord::HEADERS[2], "userIP");
        assert!(UserRecord::COLUMNS.contains("userID AS who"));
        assert_eq!(ClientIpRecord::TABLE, StatsTable::ClientIp);
    }
}
