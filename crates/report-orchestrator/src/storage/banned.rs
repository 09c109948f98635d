//! Banned recipient list and its sources

use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use super::ReportDb;
use crate::config::BannedListConfig;
use crate::error::Result;
use crate::types::Recipient;

/// Normalized set of banned emails
#[derive(Debug, Clone, Default)]
pub struct BannedList {
    emails: HashSet<String>,
}

impl BannedList {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            emails: emails
                .into_iter()
                .map(|e| normalize(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, email: &str) -> bool {
        self.emails.contains(&normalize(email))
    }

    /// Normalized emails, unordered
    pub fn emails(&self) -> Vec<String> {
        self.emails.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    /// Split recipients into (kept, removed), preserving order
    pub fn partition_recipients(&self, recipients: &[Recipient]) -> (Vec<Recipient>, Vec<Recipient>) {
        recipients
            .iter()
            .cloned()
            .partition(|r| !self.contains(&r.email))
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Where the banned list is read from; consulted fresh for every job
pub trait BannedListSource: Send + Sync {
    fn load(&self) -> Result<BannedList>;

    /// Append an email; false if it was already present
    fn append(&self, email: &str) -> Result<bool>;

    fn describe(&self) -> String;
}

impl BannedListSource for ReportDb {
    fn load(&self) -> Result<BannedList> {
        Ok(BannedList::new(self.banned_emails()?))
    }

    fn append(&self, email: &str) -> Result<bool> {
        self.add_banned_email(email)
    }

    fn describe(&self) -> String {
        "database table banned_emails".to_string()
    }
}

/// Operator-maintained text file: one email per line, `#` starts a comment
#[derive(Debug, Clone)]
pub struct FileBannedList {
    path: PathBuf,
}

impl FileBannedList {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BannedListSource for FileBannedList {
    fn load(&self) -> Result<BannedList> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Banned list {:?} not found, treating as empty", self.path);
                return Ok(BannedList::default());
            }
            Err(e) => return Err(e.into()),
        };
        Ok(BannedList::new(text.lines().map(|line| {
            line.split('#').next().unwrap_or_default()
        })))
    }

    fn append(&self, email: &str) -> Result<bool> {
        if self.load()?.contains(email) {
            return Ok(false);
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", email.trim())?;
        Ok(true)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// Build the configured source
pub fn banned_source(config: &BannedListConfig, db: Arc<ReportDb>) -> Arc<dyn BannedListSource> {
    match config {
        BannedListConfig::Database => db,
        BannedListConfig::File { path } => Arc::new(FileBannedList::new(path.clone())),
    }
}
