//! Status snapshots and the monitor's status report

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use super::job::{JobId, JobStatus};

/// Immutable view of one job's progress
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub job_id: JobId,
    pub report_class: String,
    pub report_name: String,
    pub user: String,
    pub status: JobStatus,
    pub current_action: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: u64,
    /// Declared max run time; advisory only
    pub max_run_time_secs: u64,
    pub files_produced: usize,
}

impl StatusSnapshot {
    /// Elapsed time as (hours, minutes, seconds)
    pub fn elapsed_hms(&self) -> (u64, u64, u64) {
        let secs = self.elapsed_secs;
        (secs / 3600, (secs % 3600) / 60, secs % 60)
    }

    pub fn max_run_time_hours(&self) -> f64 {
        self.max_run_time_secs as f64 / 3600.0
    }

    pub fn is_overdue(&self) -> bool {
        self.max_run_time_secs > 0 && self.elapsed_secs > self.max_run_time_secs
    }
}

/// Tabular summary of every active job
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub generated_at: DateTime<Utc>,
    pub ceiling: usize,
    pub active: usize,
    pub rows: Vec<StatusSnapshot>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Active jobs: {} of {} (at {})",
            self.active,
            self.ceiling,
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(
            f,
            "{:>6}  {:<24} {:<12} {:<10} {:>9} {:>7}  {}",
            "ID", "REPORT", "USER", "STATUS", "ELAPSED", "MAX(H)", "ACTION"
        )?;
        for row in &self.rows {
            let (h, m, s) = row.elapsed_hms();
            writeln!(
                f,
                "{:>6}  {:<24} {:<12} {:<10} {:>3}:{:02}:{:02} {:>7.2}  {}{}",
                row.job_id,
                row.report_name,
                row.user,
                row.status,
                h,
                m,
                s,
                row.max_run_time_hours(),
                row.current_action,
                if row.is_overdue() { " (overdue)" } else { "" }
            )?;
        }
        Ok(())
    }
}
