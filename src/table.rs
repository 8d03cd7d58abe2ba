//! Generic tables: rendering, column sums and roll-ups.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use askama::Template;

use crate::records::Sources;

/// Column holding the numeric source ID, shown as the source's DCID.
pub const SOURCE_COLUMN: &str = "src";
/// Column holding a network code, linked to the network page when requested.
pub const NETWORK_COLUMN: &str = "networkCode";

const MISSING: &str = "??";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Cell {
    Int(i64),
    Text(String),
    Null,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Int(n) => write!(f, "{n}"),
            Cell::Text(s) => f.write_str(s),
            Cell::Null => Ok(()),
        }
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::Int(n)
    }
}

impl From<i32> for Cell {
    fn from(n: i32) -> Self {
        Cell::Int(n.into())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}

/// One data row: column names to cells, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, Cell)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: impl Into<Cell>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: &str, value: impl Into<Cell>) {
        let value = value.into();
        match self.cells.iter_mut().find(|(name, _)| name == column) {
            Some((_, cell)) => *cell = value,
            None => self.cells.push((column.to_string(), value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cell)| cell)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new<S: AsRef<str>>(headers: &[S]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_rows(mut self, rows: impl IntoIterator<Item = Row>) -> Self {
        self.rows.extend(rows);
        self
    }

    /// Drops a column from the header list. Row data is left alone.
    pub fn hide(mut self, column: &str) -> Self {
        self.headers.retain(|h| h != column);
        self
    }

    /// Groups rows by the `keys` columns and sums `columns` within each group.
    ///
    /// The result has the key columns followed by the summed columns, in header order.
    /// Groups are ordered by key.
    pub fn rollup(&self, keys: &[&str], columns: &BTreeSet<String>) -> Table {
        let summed: Vec<&String> = self
            .headers
            .iter()
            .filter(|h| columns.contains(*h) && !keys.contains(&h.as_str()))
            .collect();

        let mut groups: BTreeMap<Vec<Cell>, Vec<Accumulator>> = BTreeMap::new();
        for row in &self.rows {
            let key = keys
                .iter()
                .map(|k| row.get(k).cloned().unwrap_or(Cell::Null))
                .collect();
            let sums = groups
                .entry(key)
                .or_insert_with(|| vec![Accumulator::default(); summed.len()]);
            for (sum, column) in sums.iter_mut().zip(&summed) {
                if let Some(cell) = row.get(column) {
                    sum.add(cell);
                }
            }
        }

        let headers: Vec<String> = keys
            .iter()
            .map(|k| k.to_string())
            .chain(summed.iter().map(|h| h.to_string()))
            .collect();
        let rows = groups.into_iter().map(|(key, sums)| {
            let mut row = Row::new();
            for (column, cell) in keys.iter().zip(key) {
                row.set(column, cell);
            }
            for (column, sum) in summed.iter().zip(sums) {
                row.set(column, sum.cell());
            }
            row
        });
        Table::new(&headers).with_rows(rows)
    }
}

/// Rendering options for [`render_table`].
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub summable: BTreeSet<String>,
    pub linkcodes: bool,
}

impl Options {
    pub fn summing(columns: &[&str]) -> Self {
        Self {
            summable: columns.iter().map(|c| c.to_string()).collect(),
            linkcodes: false,
        }
    }

    pub fn linked(mut self) -> Self {
        self.linkcodes = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableFormat {
    #[default]
    Html,
    Text,
}

/// Units recognised in byte-count cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteUnit {
    B,
    KiB,
    MiB,
    GiB,
}

impl ByteUnit {
    /// Longest suffix first, so `kiB` is tried before `B`.
    const BY_SUFFIX: [ByteUnit; 4] = [ByteUnit::GiB, ByteUnit::MiB, ByteUnit::KiB, ByteUnit::B];
    const ROUNDING: [ByteUnit; 3] = [ByteUnit::GiB, ByteUnit::MiB, ByteUnit::KiB];

    pub fn suffix(self) -> &'static str {
        match self {
            ByteUnit::B => "B",
            ByteUnit::KiB => "kiB",
            ByteUnit::MiB => "MiB",
            ByteUnit::GiB => "GiB",
        }
    }

    pub fn factor(self) -> u64 {
        match self {
            ByteUnit::B => 1,
            ByteUnit::KiB => 1 << 10,
            ByteUnit::MiB => 1 << 20,
            ByteUnit::GiB => 1 << 30,
        }
    }
}

/// Byte count of a display string such as `"1.5 kiB"`, if it carries a unit suffix.
pub fn parse_bytes(text: &str) -> Option<f64> {
    let text = text.trim();
    ByteUnit::BY_SUFFIX.iter().find_map(|unit| {
        let suffix = unit.suffix();
        let split = text.len().checked_sub(suffix.len())?;
        if !text.is_char_boundary(split) || !text[split..].eq_ignore_ascii_case(suffix) {
            return None;
        }
        let number: f64 = text[..split].trim().parse().ok()?;
        number
            .is_finite()
            .then(|| number * unit.factor() as f64)
    })
}

/// Formats a byte count with the largest unit it exceeds, e.g. 1536 as `1.5 kiB`.
pub fn bytes_rounded(value: f64) -> String {
    for unit in ByteUnit::ROUNDING {
        let factor = unit.factor() as f64;
        if value > factor {
            return format!("{} {}", trim_decimals(value / factor), unit.suffix());
        }
    }
    trim_decimals(value)
}

fn trim_decimals(value: f64) -> String {
    let text = format!("{value:.3}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Running total of one column.
#[derive(Debug, Clone, Default)]
struct Accumulator {
    total: f64,
    bytes: bool,
}

impl Accumulator {
    fn add(&mut self, cell: &Cell) {
        match cell {
            Cell::Int(n) => self.total += *n as f64,
            Cell::Text(text) => {
                if let Some(bytes) = parse_bytes(text) {
                    self.total += bytes;
                    self.bytes = true;
                } else if let Ok(n) = text.trim().parse::<f64>() {
                    if n.is_finite() {
                        self.total += n;
                    }
                }
            }
            Cell::Null => {}
        }
    }

    fn cell(&self) -> Cell {
        if self.bytes {
            Cell::Text(bytes_rounded(self.total))
        } else if self.total.fract() == 0.0 && self.total.abs() < i64::MAX as f64 {
            Cell::Int(self.total as i64)
        } else {
            Cell::Text(trim_decimals(self.total))
        }
    }
}

/// Totals of the requested columns that appear in the table's headers.
///
/// A column with at least one byte-suffixed cell is totalled in bytes and formatted
/// with [`bytes_rounded`]; plain numbers in the same column are taken as bytes.
pub fn sum_cols(table: &Table, columns: &BTreeSet<String>) -> BTreeMap<String, String> {
    columns
        .iter()
        .filter(|column| table.headers.contains(column))
        .map(|column| {
            let mut sum = Accumulator::default();
            for cell in table.rows.iter().filter_map(|row| row.get(column)) {
                sum.add(cell);
            }
            (column.clone(), sum.cell().to_string())
        })
        .collect()
}

/// Renders `table`, or nothing when it has no columns.
pub fn render_table(
    format: TableFormat,
    sources: &Sources,
    table: &Table,
    options: &Options,
) -> askama::Result<String> {
    if table.headers.is_empty() {
        return Ok(String::new());
    }
    let totals = (!options.summable.is_empty() && !table.rows.is_empty())
        .then(|| sum_cols(table, &options.summable));

    match format {
        TableFormat::Html => render_html(sources, table, options, totals.as_ref()),
        TableFormat::Text => Ok(render_text(sources, table, totals.as_ref())),
    }
}

fn display_cell(sources: &Sources, column: &str, cell: &Cell) -> String {
    match cell {
        Cell::Int(id) if column == SOURCE_COLUMN => sources
            .label(*id)
            .map(str::to_string)
            .unwrap_or_else(|| id.to_string()),
        cell => cell.to_string(),
    }
}

/// A cell as the table template shows it.
struct HtmlCell {
    text: String,
    num: bool,
    /// URL-encoded network code when the cell links to the network page.
    code: Option<String>,
}

#[derive(Template)]
#[template(path = "table.html")]
struct HtmlTable<'a> {
    headers: &'a [String],
    rows: Vec<Vec<HtmlCell>>,
    totals: Option<Vec<HtmlCell>>,
}

fn render_html(
    sources: &Sources,
    table: &Table,
    options: &Options,
    totals: Option<&BTreeMap<String, String>>,
) -> askama::Result<String> {
    let rows: Vec<Vec<HtmlCell>> = table
        .rows
        .iter()
        .map(|row| {
            table
                .headers
                .iter()
                .map(|header| {
                    let text = row
                        .get(header)
                        .map(|cell| display_cell(sources, header, cell))
                        .unwrap_or_else(|| MISSING.to_string());
                    let linked = options.linkcodes
                        && header == NETWORK_COLUMN
                        && row.get(header).is_some()
                        && !text.is_empty();
                    HtmlCell {
                        code: linked.then(|| urlencoding::encode(&text).into_owned()),
                        num: options.summable.contains(header),
                        text,
                    }
                })
                .collect()
        })
        .collect();

    let totals: Option<Vec<HtmlCell>> = totals.map(|totals| {
        table
            .headers
            .iter()
            .enumerate()
            .map(|(i, header)| match totals.get(header) {
                Some(total) => HtmlCell {
                    text: total.clone(),
                    num: true,
                    code: None,
                },
                None => HtmlCell {
                    text: if i == 0 { "Total".to_string() } else { String::new() },
                    num: false,
                    code: None,
                },
            })
            .collect()
    });

    HtmlTable {
        headers: &table.headers,
        rows,
        totals,
    }
    .render()
}

fn render_text(
    sources: &Sources,
    table: &Table,
    totals: Option<&BTreeMap<String, String>>,
) -> String {
    let mut lines = vec![table.headers.join("\t")];
    for row in &table.rows {
        let fields: Vec<String> = table
            .headers
            .iter()
            .map(|header| match row.get(header) {
                None => MISSING.to_string(),
                Some(cell) => display_cell(sources, header, cell),
            })
            .collect();
        lines.push(fields.join("\t"));
    }
    if let Some(totals) = totals {
        let fields: Vec<String> = table
            .headers
            .iter()
            .enumerate()
            .map(|(i, header)| match totals.get(header) {
                Some(total) => total.clone(),
                None if i == 0 => "Total".to_string(),
                None => String::new(),
            })
            .collect();
        lines.push(fields.join("\t"));
    }
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Source;

    fn sources() -> Sources {
        Sources::from(vec![Source {
            id: 1,
            host: "geofon.gfz-potsdam.de".to_string(),
            port: Some(18001),
            dcid: "GFZ".to_string(),
            description: None,
        }])
    }

    fn set(columns: &[&str]) -> BTreeSet<String> {
        columns.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn bytes_rounded_picks_largest_exceeded_unit() {
        assert_eq!(bytes_rounded(1536.0), "1.5 kiB");
        assert_eq!(bytes_rounded(500.0), "500");
        assert_eq!(bytes_rounded(1024.0), "1024");
        assert_eq!(bytes_rounded(3.0 * 1024.0 * 1024.0), "3 MiB");
        assert_eq!(bytes_rounded(1.25 * (1u64 << 30) as f64), "1.25 GiB");
        assert_eq!(bytes_rounded(0.0), "0");
    }

    #[test]
    fn parse_bytes_recognises_units() {
        assert_eq!(parse_bytes("1.5 kiB"), Some(1536.0));
        assert_eq!(parse_bytes("2MiB"), Some(2.0 * 1048576.0));
        assert_eq!(parse_bytes("1 gib"), Some(1073741824.0));
        assert_eq!(parse_bytes("500 B"), Some(500.0));
        assert_eq!(parse_bytes("1234"), None);
        assert_eq!(parse_bytes("GE"), None);
        assert_eq!(parse_bytes("1.5 XiB"), None);
    }

    #[test]
    fn sum_cols_normalises_mixed_byte_columns() {
        let table = Table::new(&["networkCode", "requests", "size"]).with_rows([
            Row::new().with("networkCode", "GE").with("requests", 3).with("size", "1 kiB"),
            Row::new().with("networkCode", "RO").with("requests", 4).with("size", "512"),
            Row::new().with("networkCode", "NL").with("requests", "5").with("size", Cell::Null),
        ]);
        let totals = sum_cols(&table, &set(&["requests", "size", "lines"]));
        assert_eq!(totals.get("requests").map(String::as_str), Some("12"));
        assert_eq!(totals.get("size").map(String::as_str), Some("1.5 kiB"));
        assert!(!totals.contains_key("lines"));
    }

    fn as_html(table: &Table, options: &Options) -> String {
        render_table(TableFormat::Html, &sources(), table, options).unwrap()
    }

    #[test]
    fn empty_rows_render_header_only() {
        let table = Table::new(&["src", "requests"]);
        let html = as_html(&table, &Options::summing(&["requests"]));
        assert!(html.contains("<th>src</th><th>requests</th>"));
        assert!(!html.contains("<td"));
        assert!(!html.contains("<tfoot>"));
    }

    #[test]
    fn no_headers_render_nothing() {
        assert!(as_html(&Table::default(), &Options::default()).is_empty());
    }

    #[test]
    fn rows_show_labels_links_and_totals() {
        let table = Table::new(&["src", "networkCode", "requests"]).with_rows([
            Row::new().with("src", 1).with("networkCode", "GE").with("requests", 2),
            Row::new().with("src", 7).with("networkCode", "RO").with("requests", 5),
        ]);
        let html = as_html(&table, &Options::summing(&["requests"]).linked());
        assert!(html.contains("<td>GFZ</td>"));
        assert!(html.contains("<td>7</td>"));
        assert!(html.contains("<a href=\"/network?code=GE\">GE</a>"));
        assert!(html.contains("<th>Total</th><th></th><th class=\"num\">7</th>"));
    }

    #[test]
    fn unlinked_codes_stay_plain() {
        let table = Table::new(&["networkCode"]).with_rows([Row::new().with("networkCode", "GE")]);
        let html = as_html(&table, &Options::default());
        assert!(html.contains("<td>GE</td>"));
        assert!(!html.contains("<a "));
    }

    #[test]
    fn missing_column_renders_placeholder() {
        let table = Table::new(&["src", "requests"]).with_rows([Row::new().with("src", 1)]);
        assert!(as_html(&table, &Options::default()).contains("<td>??</td>"));
    }

    #[test]
    fn cell_text_is_escaped() {
        let table = Table::new(&["message"])
            .with_rows([Row::new().with("message", "<script>alert('x')</script>")]);
        let html = as_html(&table, &Options::default());
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn text_format_is_tab_separated() {
        let table = Table::new(&["src", "size"]).with_rows([
            Row::new().with("src", 1).with("size", "2 MiB"),
            Row::new().with("src", 1).with("size", "1 MiB"),
        ]);
        let options = Options::summing(&["size"]);
        let text = render_table(TableFormat::Text, &sources(), &table, &options).unwrap();
        assert_eq!(text, "src\tsize\nGFZ\t2 MiB\nGFZ\t1 MiB\nTotal\t3 MiB\n");
    }

    #[test]
    fn rollup_groups_and_sums() {
        let row = |day: &str, src: i64, requests: i64, size: &str| {
            Row::new()
                .with("start_day", day)
                .with("src", src)
                .with("requests", requests)
                .with("size", size)
        };
        let table = Table::new(&["start_day", "src", "requests", "size"]).with_rows([
            row("2014-01-01", 2, 1, "1 kiB"),
            row("2014-01-02", 10, 2, "1 MiB"),
            row("2014-01-02", 2, 3, "1 kiB"),
        ]);
        let rolled = table.rollup(&["src"], &set(&["requests", "size"]));
        assert_eq!(rolled.headers, vec!["src", "requests", "size"]);
        assert_eq!(rolled.rows.len(), 2);
        assert_eq!(rolled.rows[0].get("src"), Some(&Cell::Int(2)));
        assert_eq!(rolled.rows[0].get("requests"), Some(&Cell::Int(4)));
        assert_eq!(rolled.rows[0].get("size"), Some(&Cell::from("2 kiB")));
        assert_eq!(rolled.rows[1].get("src"), Some(&Cell::Int(10)));
        assert_eq!(rolled.rows[1].get("size"), Some(&Cell::from("1024 kiB")));
    }

    #[test]
    fn hidden_columns_are_not_rendered() {
        let table = Table::new(&["start_day", "src"])
            .with_rows([Row::new().with("start_day", "2014-01-01").with("src", 1)])
            .hide("start_day");
        assert!(!as_html(&table, &Options::default()).contains("2014-01-01"));
    }
}
