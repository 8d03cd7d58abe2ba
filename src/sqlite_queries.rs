//! SQL templates. `{table}` is filled from [`crate::sqlite::StatsTable`] and `{columns}`
//! from a record's select list; everything else is bound positionally.

pub const SELECT_SOURCES: &str = "SELECT {columns} FROM {table} ORDER BY id";

pub const SELECT_DAY: &str = "
                SELECT {columns} FROM {table}
                WHERE start_day = ?1
                ORDER BY src
                ";

pub const SELECT_RANGE: &str = "
                SELECT {columns} FROM {table}
                WHERE start_day >= ?1 AND start_day <= ?2
                ORDER BY start_day, src
                ";

pub const SELECT_NETWORK_RANGE: &str = "
                SELECT {columns} FROM {table}
                WHERE networkCode = ?1 AND start_day >= ?2 AND start_day <= ?3
                ORDER BY start_day, src
                ";

pub const SELECT_NETWORK_CODES: &str = "
                SELECT DISTINCT networkCode, src FROM {table}
                WHERE start_day >= ?1 AND start_day <= ?2 AND networkCode IS NOT NULL
                ORDER BY networkCode, src
                ";

pub const COUNT_REPORTS: &str = "
                SELECT start_day, src, COUNT(*) AS reports FROM {table}
                WHERE start_day >= ?1 AND start_day <= ?2
                GROUP BY start_day, src
                ";

pub const CHECK_DATABASE: &str = "SELECT COUNT(*) FROM sqlite_master";

pub const COUNT_TABLES: &str =
    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1";
