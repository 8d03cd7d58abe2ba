use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

/// Web dashboard for the EIDA request log statistics databases
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Directory holding the reqlogstats-<year>.db files
    #[arg(short, long, env = "REQLOGSTATS_DB_DIR", default_value = "./var")]
    pub db_dir: PathBuf,

    /// Directory holding the pre-rendered charts and summary text files
    #[arg(short = 'c', long, env = "REQLOGSTATS_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Address to serve on
    #[arg(short, long, env = "REQLOGSTATS_LISTEN", default_value = "127.0.0.1:3000")]
    pub listen: SocketAddr,

    /// Honour the showall parameter (per-user and per-IP tables)
    #[arg(long, env = "REQLOGSTATS_ALLOW_SHOWALL", default_value_t = false)]
    pub allow_showall: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Serve the dashboard (default)
    Serve,
    /// Create an empty statistics database for a year
    InitDb {
        #[arg(short, long)]
        year: i32,
    },
}

/// Settings shared by every page.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_dir: PathBuf,
    pub data_dir: PathBuf,
    pub allow_showall: bool,
}

impl Config {
    pub fn for_dirs(db_dir: &Path, data_dir: &Path) -> Self {
        Self {
            db_dir: db_dir.to_path_buf(),
            data_dir: data_dir.to_path_buf(),
            allow_showall: false,
        }
    }

    pub fn db_path(&self, year: i32) -> PathBuf {
        self.db_dir.join(format!("reqlogstats-{year}.db"))
    }
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Self {
            db_dir: args.db_dir.clone(),
            data_dir: args.data_dir.clone(),
            allow_showall: args.allow_showall,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_subcommand() {
        let args = Args::try_parse_from(["reqlogstats-web", "init-db", "--year", "2015"]).unwrap();
        assert_eq!(args.command, Some(Command::InitDb { year: 2015 }));
        assert_eq!(args.listen, "127.0.0.1:3000".parse::<SocketAddr>().unwrap());

        let config = Config::from(&args);
        assert!(!config.allow_showall);
        assert_eq!(config.db_path(2015), PathBuf::from("./var/reqlogstats-2015.db"));
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "reqlogstats-web",
            "--db-dir",
            "/srv/reqlogstats/var",
            "--allow-showall",
        ])
        .unwrap();
        assert_eq!(args.command, None);
        let config = Config::from(&args);
        assert!(config.allow_showall);
        assert_eq!(
            config.db_path(2014),
            PathBuf::from("/srv/reqlogstats/var/reqlogstats-2014.db")
        );
    }

    #[test]
    fn serve_is_explicit_or_implied() {
        let args = Args::try_parse_from(["reqlogstats-web", "serve"]).unwrap();
        assert_eq!(args.command, Some(Command::Serve));
    }
}
