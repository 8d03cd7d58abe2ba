use std::path::Path;

use chrono::{DateTime, Utc};
use sqlx::{
    Connection, FromRow, SqliteConnection,
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqliteRow},
};
use tracing::{debug, warn};

use crate::argument_parsing::Config;
use crate::error::ApiError;
use crate::records::{Record, Source, Sources};
use crate::sqlite_queries::{CHECK_DATABASE, COUNT_TABLES, SELECT_SOURCES};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations_sq");

/// Tables of a yearly statistics database. Only these names are ever put into SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsTable {
    Source,
    Summary,
    Request,
    Volume,
    Network,
    Messages,
    User,
    UserIp,
    ClientIp,
}

impl StatsTable {
    pub fn name(self) -> &'static str {
        match self {
            StatsTable::Source => "ArcStatsSource",
            StatsTable::Summary => "ArcStatsSummary",
            StatsTable::Request => "ArcStatsRequest",
            StatsTable::Volume => "ArcStatsVolume",
            StatsTable::Network => "ArcStatsNetwork",
            StatsTable::Messages => "ArcStatsMessages",
            StatsTable::User => "ArcStatsUser",
            StatsTable::UserIp => "ArcStatsUserIP",
            StatsTable::ClientIp => "ArcStatsClientIP",
        }
    }

    fn render(self, template: &str) -> String {
        template.replace("{table}", self.name())
    }
}

/// A value bound to a positional `?N` parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Text(String),
    Int(i64),
}

impl From<&str> for Param {
    fn from(s: &str) -> Self {
        Param::Text(s.to_string())
    }
}

impl From<String> for Param {
    fn from(s: String) -> Self {
        Param::Text(s)
    }
}

impl From<i64> for Param {
    fn from(n: i64) -> Self {
        Param::Int(n)
    }
}

/// One page load's read-only connection to a yearly statistics database.
///
/// Failed queries do not abort the page: they are logged, kept as notices for display
/// and yield no rows.
pub struct StatsDb {
    conn: SqliteConnection,
    year: i32,
    modified: Option<DateTime<Utc>>,
    notices: Vec<String>,
}

impl StatsDb {
    pub async fn open(config: &Config, year: i32) -> Result<Self, ApiError> {
        let path = config.db_path(year);
        let unreadable = |source: sqlx::Error| ApiError::Open {
            path: path.display().to_string(),
            source,
        };
        match tokio::fs::try_exists(&path).await {
            Ok(true) => {}
            Ok(false) => return Err(ApiError::MissingDatabase { year }),
            Err(e) => return Err(unreadable(sqlx::Error::Io(e))),
        }
        let modified = tokio::fs::metadata(&path)
            .await
            .ok()
            .and_then(|meta| meta.modified().ok())
            .map(DateTime::<Utc>::from);

        let options = SqliteConnectOptions::new().filename(&path).read_only(true);
        let mut conn = SqliteConnection::connect_with(&options)
            .await
            .map_err(unreadable)?;
        // The file header is only read on first use.
        sqlx::query(CHECK_DATABASE)
            .execute(&mut conn)
            .await
            .map_err(unreadable)?;
        debug!(path = %path.display(), "opened statistics database");

        Ok(Self {
            conn,
            year,
            modified,
            notices: Vec::new(),
        })
    }

    /// Modification time of the database file when it was opened.
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    pub fn notices(&self) -> &[String] {
        &self.notices
    }

    pub async fn fetch<T>(&mut self, table: StatsTable, template: &str, params: &[Param]) -> Vec<T>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let sql = table.render(template);
        let mut query = sqlx::query_as::<_, T>(&sql);
        for param in params {
            query = match param {
                Param::Text(text) => query.bind(text.clone()),
                Param::Int(n) => query.bind(*n),
            };
        }
        match query.fetch_all(&mut self.conn).await {
            Ok(rows) => rows,
            Err(e) => {
                self.failed(table, e);
                Vec::new()
            }
        }
    }

    /// Like [`StatsDb::fetch`] for single-column queries, returning the bare values.
    pub async fn fetch_scalar<T>(
        &mut self,
        table: StatsTable,
        template: &str,
        params: &[Param],
    ) -> Vec<T>
    where
        T: Send + Unpin,
        (T,): for<'r> FromRow<'r, SqliteRow>,
    {
        let sql = table.render(template);
        let mut query = sqlx::query_scalar::<_, T>(&sql);
        for param in params {
            query = match param {
                Param::Text(text) => query.bind(text.clone()),
                Param::Int(n) => query.bind(*n),
            };
        }
        match query.fetch_all(&mut self.conn).await {
            Ok(values) => values,
            Err(e) => {
                self.failed(table, e);
                Vec::new()
            }
        }
    }

    /// Typed rows of `R`'s table, with `{columns}` filled from the record.
    pub async fn records<R: Record>(&mut self, template: &str, params: &[Param]) -> Vec<R> {
        let template = template.replace("{columns}", R::COLUMNS);
        self.fetch(R::TABLE, &template, params).await
    }

    /// Whether an optional table (users, user IPs, client IPs) exists in this year's file.
    pub async fn has_table(&mut self, table: StatsTable) -> bool {
        let counts: Vec<i64> = self
            .fetch_scalar(table, COUNT_TABLES, &[table.name().into()])
            .await;
        counts.first().is_some_and(|n| *n > 0)
    }

    pub async fn sources(&mut self) -> Sources {
        Sources::from(self.records::<Source>(SELECT_SOURCES, &[]).await)
    }

    fn failed(&mut self, table: StatsTable, e: sqlx::Error) {
        warn!(table = table.name(), year = self.year, error = %e, "query failed");
        self.notices
            .push(format!("Query on {} failed: {e}", table.name()));
    }
}

/// Creates (or completes) a yearly database with the reference schema.
pub async fn create_year_db(path: &Path) -> Result<(), ApiError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let mut conn = SqliteConnection::connect_with(&options)
        .await
        .map_err(|source| ApiError::Open {
            path: path.display().to_string(),
            source,
        })?;
    MIGRATOR.run(&mut conn).await?;
    conn.close().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_only_receive_known_table_names() {
        assert_eq!(
            StatsTable::Network.render("SELECT * FROM {table} WHERE src = ?1"),
            "SELECT * FROM ArcStatsNetwork WHERE src = ?1"
        );
        assert_eq!(StatsTable::UserIp.name(), "ArcStatsUserIP");
    }

    #[tokio::test]
    async fn missing_year_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::for_dirs(dir.path(), dir.path());
        let result = StatsDb::open(&config, 1999).await;
        assert!(matches!(result, Err(ApiError::MissingDatabase { year: 1999 })));
    }

    #[tokio::test]
    async fn corrupt_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::for_dirs(dir.path(), dir.path());
        std::fs::write(config.db_path(2014), "not a database\n".repeat(256)).unwrap();

        let result = StatsDb::open(&config, 2014).await;
        assert!(matches!(result, Err(ApiError::Open { .. })));
    }

    #[tokio::test]
    async fn unreadable_directory_is_not_a_missing_year() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("plain-file");
        std::fs::write(&not_a_dir, "x").unwrap();
        let config = Config::for_dirs(&not_a_dir, dir.path());

        let result = StatsDb::open(&config, 2014).await;
        assert!(matches!(result, Err(ApiError::Open { .. })));
    }

    #[tokio::test]
    async fn failed_queries_become_notices() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::for_dirs(dir.path(), dir.path());
        create_year_db(&config.db_path(2014)).await.unwrap();

        let mut db = StatsDb::open(&config, 2014).await.unwrap();
        assert!(db.modified().is_some());
        assert!(db.has_table(StatsTable::User).await);

        let rows: Vec<i64> = db
            .fetch_scalar(StatsTable::Summary, "SELECT nonsense FROM {table}", &[])
            .await;
        assert!(rows.is_empty());
        assert_eq!(db.notices().len(), 1);
        assert!(db.notices()[0].contains("ArcStatsSummary"));
    }
}
