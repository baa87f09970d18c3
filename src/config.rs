//! Connection profiles read from `.ini`-style files.
//!
//! ```ini
//! [default]
//! host = localhost
//! port = 3306
//! user = loader
//! password = secret
//! path = /var/lib/loads/default.db
//! ```
//!
//! The section name is the database name unless `database` is set. Missing
//! keys fall back to `localhost:3306` with user and password `none`.

use std::{
    collections::BTreeMap,
    env, fmt, fs,
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 3306;
pub const DEFAULT_SECTION: &str = "default";
pub const IN_MEMORY_PATH: &str = ":memory:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionProfile {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Database file; `:memory:` for a private in-memory database.
    pub path: PathBuf,
}

impl ConnectionProfile {
    /// Profile for an in-memory database, mostly useful in tests.
    pub fn in_memory(database: &str) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            user: "none".to_string(),
            password: "none".to_string(),
            database: database.to_string(),
            path: PathBuf::from(IN_MEMORY_PATH),
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.path == Path::new(IN_MEMORY_PATH)
    }

    /// `~/.config/database.ini`, or a relative `database.ini` without a home.
    pub fn default_config_path() -> PathBuf {
        env::var_os("HOME")
            .or_else(|| env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .map(|home| home.join(".config").join("database.ini"))
            .unwrap_or_else(|| PathBuf::from("database.ini"))
    }

    pub fn load(path: &Path, section: &str) -> Result<Self> {
        let config_error = |message: String| Error::Config {
            path: path.to_path_buf(),
            section: section.to_string(),
            message,
        };
        let text = fs::read_to_string(path).map_err(|err| config_error(err.to_string()))?;
        let sections = parse_ini(&text).map_err(config_error)?;
        let entries = sections
            .get(section)
            .ok_or_else(|| config_error(format!("no section [{section}]")))?;

        let value = |key: &str, default: &str| {
            entries
                .get(key)
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };
        let port = match entries.get("port") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|err| config_error(format!("invalid port '{raw}': {err}")))?,
            None => DEFAULT_PORT,
        };
        let path_value = match entries.get("path") {
            Some(raw) if raw == IN_MEMORY_PATH => PathBuf::from(raw),
            Some(raw) => relative_to(path, raw),
            None => relative_to(path, &format!("{section}.db")),
        };

        Ok(Self {
            host: value("host", DEFAULT_HOST),
            port,
            user: value("user", "none"),
            password: value("password", "none"),
            database: entries
                .get("database")
                .cloned()
                .unwrap_or_else(|| section.to_string()),
            path: path_value,
        })
    }
}

impl fmt::Display for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:***@{}:{}/{} ({})",
            self.user,
            self.host,
            self.port,
            self.database,
            self.path.display()
        )
    }
}

fn relative_to(config_path: &Path, value: &str) -> PathBuf {
    let candidate = PathBuf::from(value);
    if candidate.is_absolute() {
        return candidate;
    }
    match config_path.parent() {
        Some(dir) => dir.join(candidate),
        None => candidate,
    }
}

type Sections = BTreeMap<String, BTreeMap<String, String>>;

fn parse_ini(text: &str) -> std::result::Result<Sections, String> {
    let mut sections = Sections::new();
    let mut current: Option<String> = None;
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim().to_string();
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }
        let Some((key, value)) = line.split_once(['=', ':']) else {
            return Err(format!("line {}: expected 'key = value'", idx + 1));
        };
        let Some(section) = &current else {
            return Err(format!("line {}: key outside of any section", idx + 1));
        };
        sections
            .entry(section.clone())
            .or_default()
            .insert(key.trim().to_ascii_lowercase(), unquote(value.trim()).to_string());
    }
    Ok(sections)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}
