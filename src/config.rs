use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::{info, LevelFilter};

const DEFAULT_DB_FILE: &str = "coursebook.sqlite3";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Process configuration, read once at startup and handed to the app state.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: LevelFilter,
    pub busy_timeout: Duration,
    pub db_file_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LevelFilter::Info,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            db_file_name: DEFAULT_DB_FILE.to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let defaults = Self::default();
        Self {
            log_level: try_load("COURSEBOOKD_LOG", defaults.log_level),
            busy_timeout: Duration::from_millis(try_load(
                "COURSEBOOKD_BUSY_TIMEOUT_MS",
                DEFAULT_BUSY_TIMEOUT_MS,
            )),
            db_file_name: bare_file_name(try_load("COURSEBOOKD_DB_FILE", defaults.db_file_name)),
        }
    }
}

// Runs before the logger exists; complaints go straight to stderr.
fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().parse() {
            Ok(v) => v,
            Err(e) => {
                eprintln!("coursebookd: invalid {key} value {raw:?}: {e}; using default");
                default
            }
        },
        _ => default,
    }
}

// The database must stay inside the workspace directory.
fn bare_file_name(raw: String) -> String {
    let name = raw.trim();
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        eprintln!("coursebookd: COURSEBOOKD_DB_FILE {raw:?} is not a bare file name; using default");
        return DEFAULT_DB_FILE.to_string();
    }
    name.to_string()
}

impl Config {
    pub fn log_summary(&self) {
        info!(
            "config: log_level={} busy_timeout_ms={} db_file={}",
            self.log_level,
            self.busy_timeout.as_millis(),
            self.db_file_name
        );
    }
}
