use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::settings::Settings;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Could not determine user data directory")]
    NoDataDir,

    #[error("Failed to create application data directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid settings: {0}")]
    Settings(#[from] serde_json::Error),
}

/// A book opened at least once
#[derive(Debug, Clone, PartialEq)]
pub struct BookRecord {
    pub path: PathBuf,
    pub total_pages: usize,
    pub last_page: usize,
    /// Unix timestamp of the last time the book was opened
    pub opened_at: i64,
}

/// The Library manages the SQLite database holding the reading history
/// and the display preferences.
pub struct Library {
    conn: Connection,
    db_path: PathBuf,
}

impl Library {
    /// Open (or create) the library in the user's data directory:
    /// - Linux: ~/.local/share/comic-reader/library.db
    /// - macOS: ~/Library/Application Support/comic-reader/library.db
    /// - Windows: %APPDATA%\comic-reader\library.db
    pub fn open_default() -> Result<Self, LibraryError> {
        let db_path = Self::default_db_path().ok_or(LibraryError::NoDataDir)?;
        Self::open(&db_path)
    }

    /// Open (or create) a library at a specific location
    pub fn open(db_path: &Path) -> Result<Self, LibraryError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        tracing::info!("Library opened at {}", db_path.display());

        let mut library = Library {
            conn,
            db_path: db_path.to_path_buf(),
        };
        library.init_schema()?;

        Ok(library)
    }

    /// Library living only in memory (nothing is persisted)
    pub fn open_in_memory() -> Result<Self, LibraryError> {
        let mut library = Library {
            conn: Connection::open_in_memory()?,
            db_path: PathBuf::from(":memory:"),
        };
        library.init_schema()?;

        Ok(library)
    }

    fn default_db_path() -> Option<PathBuf> {
        let mut path = dirs::data_dir().or_else(dirs::home_dir)?;

        path.push("comic-reader");
        path.push("library.db");
        Some(path)
    }

    /// Create all tables if they don't exist
    fn init_schema(&mut self) -> Result<(), LibraryError> {
        // Single row holding the display settings as JSON
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS preferences (
                id              INTEGER PRIMARY KEY CHECK (id = 1),
                settings_json   TEXT NOT NULL
            )",
            [],
        )?;

        // Reading position of every book opened so far
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS books (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                path            TEXT NOT NULL UNIQUE,
                total_pages     INTEGER NOT NULL DEFAULT 0,
                last_page       INTEGER NOT NULL DEFAULT 0,
                opened_at       INTEGER NOT NULL,
                open_order      INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        // Bumped on every open, timestamps tie for books opened in the same second
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_books_open_order
             ON books(open_order DESC)",
            [],
        )?;

        Ok(())
    }

    /// Saved settings, defaults if none were saved yet
    pub fn load_settings(&self) -> Result<Settings, LibraryError> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT settings_json FROM preferences WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Settings::from_json(&json)?),
            None => Ok(Settings::default()),
        }
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), LibraryError> {
        self.conn.execute(
            "INSERT INTO preferences (id, settings_json) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET settings_json = excluded.settings_json",
            params![settings.to_json()?],
        )?;
        Ok(())
    }

    /// Record that a book was just opened
    /// The saved reading position is kept
    pub fn record_open(&self, path: &Path, total_pages: usize) -> Result<(), LibraryError> {
        self.conn.execute(
            "INSERT INTO books (path, total_pages, last_page, opened_at, open_order)
             VALUES (?1, ?2, 0, ?3, (SELECT COALESCE(MAX(open_order), 0) + 1 FROM books))
             ON CONFLICT(path) DO UPDATE SET
                total_pages = excluded.total_pages,
                opened_at = excluded.opened_at,
                open_order = excluded.open_order",
            params![
                path.to_string_lossy(),
                to_sql_int(total_pages),
                Utc::now().timestamp(),
            ],
        )?;
        Ok(())
    }

    /// Save the reading position of a book
    pub fn save_progress(&self, path: &Path, page: usize) -> Result<(), LibraryError> {
        self.conn.execute(
            "UPDATE books SET last_page = ?1 WHERE path = ?2",
            params![to_sql_int(page), path.to_string_lossy()],
        )?;
        Ok(())
    }

    /// Saved reading position of a book, if it was opened before
    pub fn last_page(&self, path: &Path) -> Result<Option<usize>, LibraryError> {
        let page: Option<i64> = self
            .conn
            .query_row(
                "SELECT last_page FROM books WHERE path = ?1",
                params![path.to_string_lossy()],
                |row| row.get(0),
            )
            .optional()?;

        Ok(page.map(from_sql_int))
    }

    /// Most recently opened books first
    pub fn recent_books(&self, limit: usize) -> Result<Vec<BookRecord>, LibraryError> {
        let mut stmt = self.conn.prepare(
            "SELECT path, total_pages, last_page, opened_at FROM books
             ORDER BY open_order DESC
             LIMIT ?1",
        )?;

        let books = stmt
            .query_map(params![to_sql_int(limit)], |row| {
                Ok(BookRecord {
                    path: PathBuf::from(row.get::<_, String>(0)?),
                    total_pages: from_sql_int(row.get(1)?),
                    last_page: from_sql_int(row.get(2)?),
                    opened_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(books)
    }
}

fn to_sql_int(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_sql_int(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}

// Implement Debug for better error messages
impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("db_path", &self.db_path)
            .finish()
    }
}
