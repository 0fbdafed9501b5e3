//! SQL migration definitions for the crawl ledger.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: crawl_runs, pages",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per crawl invocation
CREATE TABLE IF NOT EXISTS crawl_runs (
    id          TEXT PRIMARY KEY,
    seed_url    TEXT NOT NULL,
    base_prefix TEXT NOT NULL,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

-- Pages persisted by a crawl run
CREATE TABLE IF NOT EXISTS pages (
    id           TEXT PRIMARY KEY,
    run_id       TEXT NOT NULL REFERENCES crawl_runs(id) ON DELETE CASCADE,
    url          TEXT NOT NULL,
    local_path   TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    fetched_at   TEXT NOT NULL,
    status_code  INTEGER,
    content_len  INTEGER,
    UNIQUE(run_id, url)
);

CREATE INDEX IF NOT EXISTS idx_pages_run_id ON pages(run_id);
CREATE INDEX IF NOT EXISTS idx_pages_local_path ON pages(local_path);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
