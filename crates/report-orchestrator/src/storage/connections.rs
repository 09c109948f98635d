//! Per-job data-source connections, opened on first use and closed in cleanup

use std::collections::HashMap;
use std::sync::Arc;

use rusqlite::Connection;

use crate::config::{DataSourceConfig, DataSourceKind};
use crate::error::{Error, Result};

/// Connections owned by one job
pub struct JobConnections {
    sources: Arc<HashMap<String, DataSourceConfig>>,
    open: HashMap<String, Connection>,
}

impl JobConnections {
    pub fn new(sources: Arc<HashMap<String, DataSourceConfig>>) -> Self {
        Self {
            sources,
            open: HashMap::new(),
        }
    }

    /// Borrow the named connection, opening it the first time
    pub fn get(&mut self, name: &str) -> Result<&Connection> {
        if !self.open.contains_key(name) {
            let source = self
                .sources
                .get(name)
                .ok_or_else(|| Error::Config(format!("unknown data source '{}'", name)))?;
            let conn = open_source(source)?;
            tracing::debug!("Opened data source '{}' at {:?}", name, source.path);
            self.open.insert(name.to_string(), conn);
        }
        self.open
            .get(name)
            .ok_or_else(|| Error::internal(format!("data source '{}' vanished", name)))
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Commit pending work and close every connection.
    ///
    /// Each connection is handled independently; failures are returned, not raised.
    pub fn close_all(&mut self) -> Vec<String> {
        let mut failures = Vec::new();
        for (name, conn) in self.open.drain() {
            if !conn.is_autocommit() {
                if let Err(e) = conn.execute_batch("COMMIT") {
                    failures.push(format!("commit on '{}' failed: {}", name, e));
                }
            }
            if let Err((_, e)) = conn.close() {
                failures.push(format!("closing '{}' failed: {}", name, e));
            }
        }
        failures
    }
}

impl Drop for JobConnections {
    fn drop(&mut self) {
        if !self.open.is_empty() {
            for failure in self.close_all() {
                tracing::warn!("{}", failure);
            }
        }
    }
}

fn open_source(source: &DataSourceConfig) -> Result<Connection> {
    match source.kind {
        DataSourceKind::Sqlite => {
            let conn = Connection::open(&source.path)?;
            if source.transactional {
                conn.execute_batch("BEGIN")?;
            }
            Ok(conn)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources(path: std::path::PathBuf, transactional: bool) -> Arc<HashMap<String, DataSourceConfig>> {
        let mut map = HashMap::new();
        map.insert(
            "main".to_string(),
            DataSourceConfig { kind: DataSourceKind::Sqlite, path, transactional },
        );
        Arc::new(map)
    }

    #[test]
    fn test_opens_lazily_and_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut connections = JobConnections::new(sources(dir.path().join("a.db"), false));
        assert_eq!(connections.open_count(), 0);

        connections.get("main").unwrap();
        connections.get("main").unwrap();
        assert_eq!(connections.open_count(), 1);
    }

    #[test]
    fn test_unknown_source_is_config_error() {
        let mut connections = JobConnections::new(Arc::new(HashMap::new()));
        assert!(matches!(connections.get("nope"), Err(Error::Config(_))));
    }

    #[test]
    fn test_close_commits_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.db");
        let mut connections = JobConnections::new(sources(path.clone(), true));

        let conn = connections.get("main").unwrap();
        assert!(!conn.is_autocommit());
        conn.execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1);").unwrap();

        assert!(connections.close_all().is_empty());
        assert_eq!(connections.open_count(), 0);

        let check = Connection::open(&path).unwrap();
        let count: i64 = check.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }
}
