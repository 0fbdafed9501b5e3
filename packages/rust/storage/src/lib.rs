//! libSQL crawl ledger.
//!
//! The [`Storage`] struct wraps a local libSQL database recording crawl runs
//! and the pages each run persisted. The loader uses it to recover the URL a
//! stored file was fetched from.
//!
//! **Access rules:**
//! - `docbot crawl`: read-write (sole writer) via [`Storage::open`]
//! - `docbot index`: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::Utc;
use docbot_shared::{DocBotError, PageEntry, Result};
use libsql::{Connection, Database, params};
use uuid::Uuid;

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// A crawl run as stored in the ledger.
#[derive(Debug, Clone)]
pub struct CrawlRun {
    pub id: String,
    pub seed_url: String,
    pub base_prefix: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub stats_json: Option<String>,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| DocBotError::io(parent, e))?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DocBotError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| DocBotError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DocBotError::Storage(format!(
                "ledger not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DocBotError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| DocBotError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    DocBotError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(DocBotError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Crawl run operations
    // -----------------------------------------------------------------------

    /// Open a new crawl run. Returns the generated run ID.
    pub async fn insert_crawl_run(&self, seed_url: &str, base_prefix: &str) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO crawl_runs (id, seed_url, base_prefix, started_at) VALUES (?1, ?2, ?3, ?4)",
                params![id.as_str(), seed_url, base_prefix, now.as_str()],
            )
            .await
            .map_err(|e| DocBotError::Storage(e.to_string()))?;
        Ok(id)
    }

    /// Close a crawl run with its summary stats.
    pub async fn finish_crawl_run(&self, run_id: &str, stats_json: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE crawl_runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, run_id],
            )
            .await
            .map_err(|e| DocBotError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Get a crawl run by ID.
    pub async fn get_crawl_run(&self, run_id: &str) -> Result<Option<CrawlRun>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, seed_url, base_prefix, started_at, finished_at, stats_json
                 FROM crawl_runs WHERE id = ?1",
                params![run_id],
            )
            .await
            .map_err(|e| DocBotError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(CrawlRun {
                id: row
                    .get::<String>(0)
                    .map_err(|e| DocBotError::Storage(e.to_string()))?,
                seed_url: row
                    .get::<String>(1)
                    .map_err(|e| DocBotError::Storage(e.to_string()))?,
                base_prefix: row
                    .get::<String>(2)
                    .map_err(|e| DocBotError::Storage(e.to_string()))?,
                started_at: row
                    .get::<String>(3)
                    .map_err(|e| DocBotError::Storage(e.to_string()))?,
                finished_at: row.get::<String>(4).ok(),
                stats_json: row.get::<String>(5).ok(),
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(DocBotError::Storage(e.to_string())),
        }
    }

    // -----------------------------------------------------------------------
    // Page operations
    // -----------------------------------------------------------------------

    /// Record a persisted page (insert or update on conflict by `run_id + url`).
    pub async fn record_page(&self, page: &PageEntry) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO pages (id, run_id, url, local_path, content_hash, fetched_at, status_code, content_len)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(run_id, url) DO UPDATE SET
                   local_path = excluded.local_path,
                   content_hash = excluded.content_hash,
                   fetched_at = excluded.fetched_at,
                   status_code = excluded.status_code,
                   content_len = excluded.content_len",
                params![
                    page.id.as_str(),
                    page.run_id.as_str(),
                    page.url.as_str(),
                    page.local_path.as_str(),
                    page.content_hash.as_str(),
                    page.fetched_at.to_rfc3339(),
                    page.status_code.map(i64::from),
                    page.content_len.map(|l| l as i64),
                ],
            )
            .await
            .map_err(|e| DocBotError::Storage(e.to_string()))?;
        Ok(())
    }

    /// List the pages persisted by one run, ordered by fetch time.
    pub async fn list_pages_by_run(&self, run_id: &str) -> Result<Vec<PageEntry>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, run_id, url, local_path, content_hash, fetched_at, status_code, content_len
                 FROM pages WHERE run_id = ?1 ORDER BY fetched_at, id",
                params![run_id],
            )
            .await
            .map_err(|e| DocBotError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_page_entry(&row)?);
        }
        Ok(results)
    }

    /// List every recorded page across all runs, oldest first.
    ///
    /// Later rows for the same `local_path` supersede earlier ones.
    pub async fn list_pages(&self) -> Result<Vec<PageEntry>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, run_id, url, local_path, content_hash, fetched_at, status_code, content_len
                 FROM pages ORDER BY fetched_at, id",
                params![],
            )
            .await
            .map_err(|e| DocBotError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_page_entry(&row)?);
        }
        Ok(results)
    }
}

/// Convert a database row to a [`PageEntry`].
fn row_to_page_entry(row: &libsql::Row) -> Result<PageEntry> {
    Ok(PageEntry {
        id: row
            .get::<String>(0)
            .map_err(|e| DocBotError::Storage(e.to_string()))?,
        run_id: row
            .get::<String>(1)
            .map_err(|e| DocBotError::Storage(e.to_string()))?,
        url: row
            .get::<String>(2)
            .map_err(|e| DocBotError::Storage(e.to_string()))?,
        local_path: row
            .get::<String>(3)
            .map_err(|e| DocBotError::Storage(e.to_string()))?,
        content_hash: row
            .get::<String>(4)
            .map_err(|e| DocBotError::Storage(e.to_string()))?,
        fetched_at: {
            let s: String = row
                .get(5)
                .map_err(|e| DocBotError::Storage(e.to_string()))?;
            chrono::DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .map_err(|e| DocBotError::Storage(format!("invalid date: {e}")))?
        },
        status_code: row.get::<i64>(6).ok().map(|v| v as u16),
        content_len: row.get::<i64>(7).ok().map(|v| v as usize),
    })
}
