use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::version::checker::ReferenceStore;
use crate::version::error::CacheError;
use crate::version::types::CatalogEntry;

/// Schema migrations
/// Each version contains a list of SQL statements to execute
const MIGRATIONS: &[&[&str]] = &[
    // v1: workflow_status column
    &["ALTER TABLE applications ADD COLUMN workflow_status TEXT"],
];

const SELECT_COLUMNS: &str = "app_id, name, publisher, repository, latest_version, \
     latest_release_tag, workflow_status, updated_at";

/// SQLite-backed application catalog
pub struct Cache {
    conn: Mutex<Connection>,
}

impl Cache {
    pub fn new(db_path: &Path) -> Result<Self, CacheError> {
        info!("Initializing catalog database at {:?}", db_path);

        let conn = Connection::open(db_path)?;

        // Enable WAL mode for better concurrency
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        debug!("Database connection established");

        let cache = Self {
            conn: Mutex::new(conn),
        };

        cache.create_schema()?;
        info!("Catalog initialized successfully");

        Ok(cache)
    }

    /// Acquire database connection lock with proper error handling
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn.lock().map_err(|_| CacheError::LockPoisoned)
    }

    /// Get current timestamp in milliseconds since UNIX epoch
    pub fn current_timestamp_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn create_schema(&self) -> Result<(), CacheError> {
        debug!("Creating database schema");

        let conn = self.lock_conn()?;

        // Base table (without migration columns)
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS applications (
                app_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                publisher TEXT NOT NULL,
                repository TEXT NOT NULL,
                latest_version TEXT,
                latest_release_tag TEXT,
                updated_at INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_applications_repository ON applications(repository)",
            [],
        )?;

        Self::apply_migrations(&conn)?;

        debug!("Database schema created successfully");
        Ok(())
    }

    /// Apply pending migrations based on user_version pragma
    fn apply_migrations(conn: &Connection) -> Result<(), CacheError> {
        let current_version: i32 =
            conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        for (i, statements) in MIGRATIONS.iter().enumerate() {
            let version = (i + 1) as i32;
            if version > current_version {
                for sql in *statements {
                    match conn.execute(sql, []) {
                        Ok(_) => {}
                        Err(rusqlite::Error::SqliteFailure(_, Some(ref msg)))
                            if msg.contains("duplicate column name") =>
                        {
                            debug!("Column already exists, skipping: {}", sql);
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                debug!("Applied migration v{}", version);
            }
        }

        let target_version = MIGRATIONS.len() as i32;
        if target_version > current_version {
            conn.pragma_update(None, "user_version", target_version)?;
            debug!("Updated schema version to v{}", target_version);
        }

        Ok(())
    }

    fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<CatalogEntry> {
        Ok(CatalogEntry {
            app_id: row.get(0)?,
            name: row.get(1)?,
            publisher: row.get(2)?,
            repository: row.get(3)?,
            latest_version: row.get(4)?,
            latest_release_tag: row.get(5)?,
            workflow_status: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    /// Insert an application or update the existing row with the same id
    pub fn upsert_application(&self, entry: &CatalogEntry) -> Result<(), CacheError> {
        debug!(
            "Upserting {} ({}) latest={:?}",
            entry.app_id, entry.repository, entry.latest_version
        );

        let conn = self.lock_conn()?;
        conn.execute(
            r#"
            INSERT INTO applications (
                app_id, name, publisher, repository, latest_version,
                latest_release_tag, workflow_status, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(app_id) DO UPDATE SET
                name = excluded.name,
                publisher = excluded.publisher,
                repository = excluded.repository,
                latest_version = excluded.latest_version,
                latest_release_tag = excluded.latest_release_tag,
                workflow_status = excluded.workflow_status,
                updated_at = excluded.updated_at
            "#,
            (
                &entry.app_id,
                &entry.name,
                &entry.publisher,
                &entry.repository,
                &entry.latest_version,
                &entry.latest_release_tag,
                &entry.workflow_status,
                entry.updated_at,
            ),
        )?;

        Ok(())
    }

    pub fn get_application(&self, app_id: &str) -> Result<Option<CatalogEntry>, CacheError> {
        let conn = self.lock_conn()?;
        let entry = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM applications WHERE app_id = ?1"),
                [app_id],
                Self::entry_from_row,
            )
            .optional()?;

        Ok(entry)
    }

    /// All catalog entries, ordered by name
    pub fn list_applications(&self) -> Result<Vec<CatalogEntry>, CacheError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM applications ORDER BY name COLLATE NOCASE, app_id"
        ))?;

        let entries = stmt
            .query_map([], Self::entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Whether a repository was synced within the last `refresh_interval_ms`
    pub fn is_repository_fresh(
        &self,
        repository: &str,
        refresh_interval_ms: i64,
    ) -> Result<bool, CacheError> {
        let threshold = Self::current_timestamp_ms() - refresh_interval_ms;
        let conn = self.lock_conn()?;
        let fresh: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM applications WHERE repository = ?1 AND updated_at >= ?2)",
            (repository, threshold),
            |row| row.get(0),
        )?;

        Ok(fresh)
    }
}

impl ReferenceStore for Cache {
    fn get_latest_version(&self, app_id: &str) -> Result<Option<String>, CacheError> {
        let conn = self.lock_conn()?;
        let latest: Option<Option<String>> = conn
            .query_row(
                "SELECT latest_version FROM applications WHERE app_id = ?1",
                [app_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(latest.flatten())
    }
}
