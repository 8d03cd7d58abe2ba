//! Chart images and summary text files produced outside this service.

use std::fmt;

use crate::argument_parsing::Config;

/// URL prefix the data directory is served under.
pub const DATA_PREFIX: &str = "/data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chart {
    Year(i32),
    Month(i32, u32),
    MonthSummary(i32, u32),
    Network(String, i32),
}

impl fmt::Display for Chart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chart::Year(year) => write!(f, "total-{year}.svg"),
            Chart::Month(year, month) => write!(f, "total-{year}-{month:02}.svg"),
            Chart::MonthSummary(year, month) => write!(f, "total-{year}-{month:02}.txt"),
            Chart::Network(code, year) => write!(f, "net-{code}-{year}.svg"),
        }
    }
}

/// Link to `chart` if the file is on disk.
pub async fn find(config: &Config, chart: Chart) -> Option<String> {
    let name = chart.to_string();
    let present = tokio::fs::try_exists(config.data_dir.join(&name))
        .await
        .unwrap_or(false);
    present.then(|| format!("{DATA_PREFIX}/{}", urlencoding::encode(&name)))
}
