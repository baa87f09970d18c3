#![allow(dead_code)]

use std::cell::RefCell;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Once;

use csv2table::{ConnectionProfile, loader::Loader};
use log::{Level, LevelFilter, Log, Metadata, Record};
use rusqlite::Connection;
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes a `database.ini` whose `[section]` points at `loads.db` here.
    pub fn write_config(&self, section: &str) -> PathBuf {
        self.write(
            "database.ini",
            &format!("[{section}]\nhost = localhost\nuser = loader\npassword = secret\npath = loads.db\n"),
        )
    }

    pub fn db_path(&self) -> PathBuf {
        self.temp_dir.path().join("loads.db")
    }

    /// Opens the workspace database directly, bypassing the loader.
    pub fn open_db(&self) -> Connection {
        Connection::open(self.db_path()).expect("open workspace db")
    }
}

pub fn memory_loader() -> Loader {
    Loader::new(ConnectionProfile::in_memory("test")).expect("in-memory loader")
}

pub fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| {
        row.get(0)
    })
    .expect("count rows")
}

/// `(name, declared type)` pairs in column order.
pub fn table_info(conn: &Connection, table: &str) -> Vec<(String, String)> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info(\"{table}\")"))
        .expect("prepare table_info");
    stmt.query_map([], |row| Ok((row.get("name")?, row.get("type")?)))
        .expect("query table_info")
        .collect::<rusqlite::Result<Vec<_>>>()
        .expect("read table_info")
}

pub fn table_exists(conn: &Connection, table: &str) -> bool {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get::<_, i64>(0),
    )
    .expect("query sqlite_master")
        > 0
}

thread_local! {
    static CAPTURED: RefCell<Vec<(Level, String)>> = const { RefCell::new(Vec::new()) };
}

/// Records log lines per thread so parallel tests only see their own output.
struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        CAPTURED.with(|lines| {
            lines
                .borrow_mut()
                .push((record.level(), record.args().to_string()))
        });
    }

    fn flush(&self) {}
}

static CAPTURE_LOGGER: CaptureLogger = CaptureLogger;
static INSTALL_LOGGER: Once = Once::new();

/// Runs `f` and returns its result with the log lines it emitted.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, Vec<(Level, String)>) {
    INSTALL_LOGGER.call_once(|| {
        log::set_logger(&CAPTURE_LOGGER).expect("no other logger installed");
        log::set_max_level(LevelFilter::Trace);
    });
    CAPTURED.with(|lines| lines.borrow_mut().clear());
    let result = f();
    let lines = CAPTURED.with(|lines| lines.take());
    (result, lines)
}

/// Messages logged at `Warn`.
pub fn warnings(lines: &[(Level, String)]) -> Vec<&str> {
    lines
        .iter()
        .filter(|(level, _)| *level == Level::Warn)
        .map(|(_, message)| message.as_str())
        .collect()
}
