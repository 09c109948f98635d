//! Generic export: one SQL statement written to a delimited text file
//!
//! Parameters: `dataSource` (configured data-source name), `sql`, and the
//! optional `fileName`, `delimiter`, `customerId`.

use std::path::PathBuf;
use rusqlite::types::ValueRef;

use super::{CancellationToken, Report, ReportContext};
use crate::error::{Error, Result};

const PROGRESS_EVERY: usize = 1000;

#[derive(Debug, Default)]
pub struct SqlExportReport {
    files: Vec<PathBuf>,
    customer_id: Option<String>,
}

impl SqlExportReport {
    /// Report-class key this report is registered under
    pub const CLASS: &'static str = "SqlExport";

    pub fn new() -> Self {
        Self::default()
    }
}

impl Report for SqlExportReport {
    fn name(&self) -> &str {
        "sql-export"
    }

    fn execute(&mut self, ctx: &mut ReportContext<'_>, cancel: &CancellationToken) -> Result<()> {
        let data_source = ctx
            .param("dataSource")
            .ok_or_else(|| Error::execution("missing parameter 'dataSource'"))?;
        let sql = ctx
            .param("sql")
            .ok_or_else(|| Error::execution("missing parameter 'sql'"))?;
        let delimiter = match ctx.param("delimiter") {
            Some("\\t") | Some("tab") => b'\t',
            Some(d) if d.len() == 1 => d.as_bytes()[0],
            Some(d) => return Err(Error::execution(format!("unsupported delimiter '{}'", d))),
            None => b',',
        };
        let file_name = ctx
            .param("fileName")
            .map(str::to_string)
            .unwrap_or_else(|| format!("export_{}.txt", ctx.job_id()));
        if file_name.contains('/') || file_name.contains('\\') {
            return Err(Error::execution(format!("fileName '{}' must not contain a path", file_name)));
        }

        self.customer_id = ctx.param("customerId").map(str::to_string);

        let path = ctx.output_dir().join(&file_name);
        let progress = ctx.progress();
        progress.set_action(format!("Querying {}", data_source));

        let conn = ctx.connection(data_source)?;
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();

        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(&path)?;
        writer.write_record(&columns)?;

        let mut rows = stmt.query([])?;
        let mut written = 0usize;
        let mut record = Vec::with_capacity(columns.len());
        while let Some(row) = rows.next()? {
            if cancel.is_cancelled() {
                tracing::info!("Export to {} cancelled after {} rows", file_name, written);
                writer.flush()?;
                self.files.push(path);
                return Ok(());
            }

            record.clear();
            for i in 0..columns.len() {
                record.push(match row.get_ref(i)? {
                    ValueRef::Null => String::new(),
                    ValueRef::Integer(v) => v.to_string(),
                    ValueRef::Real(v) => v.to_string(),
                    ValueRef::Text(v) => String::from_utf8_lossy(v).into_owned(),
                    ValueRef::Blob(v) => format!("<{} bytes>", v.len()),
                });
            }
            writer.write_record(&record)?;
            written += 1;

            if written % PROGRESS_EVERY == 0 {
                progress.set_action(format!("Wrote {} rows to {}", written, file_name));
            }
        }
        writer.flush()?;

        progress.set_action(format!("Wrote {} rows to {}", written, file_name));
        self.files.push(path);
        Ok(())
    }

    fn produced_files(&self) -> Vec<PathBuf> {
        self.files.clone()
    }

    fn customer_id(&self) -> Option<String> {
        self.customer_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DataSourceConfig, DataSourceKind};
    use crate::storage::JobConnections;
    use crate::types::{JobHandle, JobId, JobRequest, Param};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn param(name: &str, value: &str) -> Param {
        Param {
            name: name.to_string(),
            param_type: "string".to_string(),
            value: value.to_string(),
        }
    }

    fn warehouse(dir: &std::path::Path) -> JobConnections {
        let path = dir.join("warehouse.db");
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE sales (region TEXT, amount REAL);
             INSERT INTO sales VALUES ('EMEA', 10.5), ('APAC', 3.0);",
        )
        .unwrap();
        drop(conn);

        let mut sources = HashMap::new();
        sources.insert(
            "warehouse".to_string(),
            DataSourceConfig { kind: DataSourceKind::Sqlite, path, transactional: false },
        );
        JobConnections::new(Arc::new(sources))
    }

    #[test]
    fn test_exports_query_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut connections = warehouse(dir.path());
        let job = JobHandle::new(JobId(3), Duration::from_secs(60));
        let request = JobRequest {
            params: vec![
                param("dataSource", "warehouse"),
                param("sql", "SELECT region, amount FROM sales ORDER BY region"),
                param("fileName", "sales.txt"),
                param("delimiter", "|"),
                param("customerId", "C-42"),
            ],
            ..Default::default()
        };

        let mut report = SqlExportReport::new();
        let mut ctx = ReportContext::new(&job, &request, dir.path(), &mut connections);
        report.execute(&mut ctx, &CancellationToken::new()).unwrap();
        drop(ctx);
        assert!(connections.close_all().is_empty());

        let files = report.produced_files();
        assert_eq!(files, vec![dir.path().join("sales.txt")]);
        let text = std::fs::read_to_string(&files[0]).unwrap();
        assert_eq!(text, "region|amount\nAPAC|3\nEMEA|10.5\n");
        assert_eq!(report.customer_id().as_deref(), Some("C-42"));
    }

    #[test]
    fn test_missing_sql_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut connections = warehouse(dir.path());
        let job = JobHandle::new(JobId(4), Duration::from_secs(60));
        let request = JobRequest {
            params: vec![param("dataSource", "warehouse")],
            ..Default::default()
        };

        let mut report = SqlExportReport::new();
        let mut ctx = ReportContext::new(&job, &request, dir.path(), &mut connections);
        let err = report.execute(&mut ctx, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, Error::ReportExecution(_)));
        assert!(report.produced_files().is_empty());
    }

    #[test]
    fn test_cancelled_before_first_row_stops() {
        let dir = tempfile::tempdir().unwrap();
        let mut connections = warehouse(dir.path());
        let job = JobHandle::new(JobId(5), Duration::from_secs(60));
        let request = JobRequest {
            params: vec![param("dataSource", "warehouse"), param("sql", "SELECT * FROM sales")],
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut report = SqlExportReport::new();
        let mut ctx = ReportContext::new(&job, &request, dir.path(), &mut connections);
        report.execute(&mut ctx, &cancel).unwrap();

        let text = std::fs::read_to_string(&report.produced_files()[0]).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
