//! SQLite database for report registrations, access lists, banned emails and audit rows

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;

/// One persisted record of a job's execution
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AuditRecord {
    pub id: Option<i64>,
    pub job_id: u64,
    pub user: String,
    pub report_name: String,
    pub customer_id: Option<String>,
    pub recipients: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        job_id: u64,
        user: impl Into<String>,
        report_name: impl Into<String>,
        recipients: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            job_id,
            user: user.into(),
            report_name: report_name.into(),
            customer_id: None,
            recipients: recipients.into(),
            message: message.into(),
            created_at: Utc::now(),
        }
    }

    pub fn with_customer_id(mut self, customer_id: Option<String>) -> Self {
        self.customer_id = customer_id;
        self
    }
}

/// A registered report class
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReportRegistration {
    pub id: i64,
    pub class_name: String,
    pub display_name: String,
}

/// SQLite-backed report database
pub struct ReportDb {
    conn: Arc<Mutex<Connection>>,
}

impl ReportDb {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
        "#)?;

        conn.execute_batch(r#"
            -- Report classes and their internal ids
            CREATE TABLE IF NOT EXISTS reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                class_name TEXT NOT NULL UNIQUE,
                display_name TEXT NOT NULL
            );

            -- Access-control entries; a report without entries is open to everyone
            CREATE TABLE IF NOT EXISTS report_access (
                report_id INTEGER NOT NULL,
                user_name TEXT NOT NULL COLLATE NOCASE,
                FOREIGN KEY (report_id) REFERENCES reports(id) ON DELETE CASCADE,
                UNIQUE(report_id, user_name)
            );

            CREATE INDEX IF NOT EXISTS idx_report_access_report_id ON report_access(report_id);

            -- Emails that must never receive report output (append-only)
            CREATE TABLE IF NOT EXISTS banned_emails (
                email TEXT PRIMARY KEY COLLATE NOCASE,
                added_at TEXT NOT NULL
            );

            -- One row per job for traceability outside log files
            CREATE TABLE IF NOT EXISTS job_audit (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id INTEGER NOT NULL,
                user_name TEXT NOT NULL,
                report_name TEXT NOT NULL,
                customer_id TEXT,
                recipients TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_job_audit_job_id ON job_audit(job_id);
            CREATE INDEX IF NOT EXISTS idx_job_audit_created_at ON job_audit(created_at);
        "#)?;

        tracing::info!("Database migrations complete");
        Ok(())
    }

    // ==================== Reports & access control ====================

    /// Register a report class, returning its internal id
    pub fn register_report(&self, class_name: &str, display_name: &str) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO reports (class_name, display_name) VALUES (?1, ?2)
             ON CONFLICT(class_name) DO UPDATE SET display_name = excluded.display_name",
            params![class_name, display_name],
        )?;
        let id = conn.query_row(
            "SELECT id FROM reports WHERE class_name = ?1",
            params![class_name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Internal id of a report class
    pub fn report_id(&self, class_name: &str) -> Result<Option<i64>> {
        let conn = self.conn.lock();
        let id = conn
            .query_row(
                "SELECT id FROM reports WHERE class_name = ?1",
                params![class_name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    pub fn list_reports(&self) -> Result<Vec<ReportRegistration>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, class_name, display_name FROM reports ORDER BY class_name")?;
        let rows = stmt.query_map([], |row| {
            Ok(ReportRegistration {
                id: row.get(0)?,
                class_name: row.get(1)?,
                display_name: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Add a user to a report's access list
    pub fn grant_access(&self, report_id: i64, user: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO report_access (report_id, user_name) VALUES (?1, ?2)",
            params![report_id, user],
        )?;
        Ok(())
    }

    /// Users allowed to run a report; empty means unrestricted
    pub fn access_entries(&self, report_id: i64) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT user_name FROM report_access WHERE report_id = ?1 ORDER BY user_name",
        )?;
        let rows = stmt.query_map(params![report_id], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    /// Whether `user` may run `class_name`.
    ///
    /// Unknown classes and reports without access entries are open to everyone.
    pub fn is_authorized(&self, class_name: &str, user: &str) -> Result<bool> {
        let Some(report_id) = self.report_id(class_name)? else {
            return Ok(true);
        };
        let entries = self.access_entries(report_id)?;
        if entries.is_empty() {
            return Ok(true);
        }
        Ok(entries.iter().any(|entry| entry.eq_ignore_ascii_case(user.trim())))
    }

    // ==================== Banned emails ====================

    /// Append an email to the banned list; false if already present
    pub fn add_banned_email(&self, email: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO banned_emails (email, added_at) VALUES (?1, ?2)",
            params![email.trim(), Utc::now()],
        )?;
        Ok(inserted > 0)
    }

    pub fn banned_emails(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT email FROM banned_emails ORDER BY email")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    // ==================== Audit ====================

    /// Persist an audit row, returning its id
    pub fn insert_audit(&self, record: &AuditRecord) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            r#"INSERT INTO job_audit
                (job_id, user_name, report_name, customer_id, recipients, message, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                record.job_id as i64,
                record.user,
                record.report_name,
                record.customer_id,
                record.recipients,
                record.message,
                record.created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent audit rows first
    pub fn recent_audit(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"SELECT id, job_id, user_name, report_name, customer_id, recipients, message, created_at
               FROM job_audit ORDER BY id DESC LIMIT ?1"#,
        )?;
        let rows = stmt.query_map(params![limit as i64], row_to_audit)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn audit_for_job(&self, job_id: u64) -> Result<Vec<AuditRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"SELECT id, job_id, user_name, report_name, customer_id, recipients, message, created_at
               FROM job_audit WHERE job_id = ?1 ORDER BY id"#,
        )?;
        let rows = stmt.query_map(params![job_id as i64], row_to_audit)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn row_to_audit(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditRecord> {
    Ok(AuditRecord {
        id: Some(row.get(0)?),
        job_id: row.get::<_, i64>(1)? as u64,
        user: row.get(2)?,
        report_name: row.get(3)?,
        customer_id: row.get(4)?,
        recipients: row.get(5)?,
        message: row.get(6)?,
        created_at: row.get(7)?,
    })
}
