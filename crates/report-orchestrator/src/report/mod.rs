//! The contract every report implementation satisfies
//!
//! A report runs synchronously on its job's worker thread. It reads its
//! parameters and data-source connections from the [`ReportContext`], writes
//! zero or more files into the job's output directory, and polls the
//! [`CancellationToken`] between units of work.

mod alert;
mod factory;
mod sql_export;

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;

use crate::error::Result;
use crate::storage::JobConnections;
use crate::types::{JobHandle, JobId, JobRequest};

pub use alert::StandInAlertReport;
pub use tokio_util::sync::CancellationToken;
pub use factory::{ReportFactory, ResolvedReport};
pub use sql_export::SqlExportReport;

/// A pluggable report implementation
pub trait Report: Send {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Produce the report; return early once `cancel` is set
    fn execute(&mut self, ctx: &mut ReportContext<'_>, cancel: &CancellationToken) -> Result<()>;

    /// Files written by `execute`, in delivery order
    fn produced_files(&self) -> Vec<PathBuf>;

    /// Customer the run is billed to, recorded in the audit row
    fn customer_id(&self) -> Option<String> {
        None
    }

    /// Expected upper bound on run time; monitoring only
    fn max_run_time(&self) -> Option<Duration> {
        None
    }
}

/// Everything a report may touch while it runs
pub struct ReportContext<'a> {
    job: &'a JobHandle,
    request: &'a JobRequest,
    output_dir: &'a Path,
    connections: &'a mut JobConnections,
    alerts: Vec<String>,
}

impl<'a> ReportContext<'a> {
    pub fn new(
        job: &'a JobHandle,
        request: &'a JobRequest,
        output_dir: &'a Path,
        connections: &'a mut JobConnections,
    ) -> Self {
        Self {
            job,
            request,
            output_dir,
            connections,
            alerts: Vec::new(),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job.id()
    }

    /// Live job state, for progress updates while a connection is borrowed
    pub fn progress(&self) -> &'a JobHandle {
        self.job
    }

    pub fn request(&self) -> &'a JobRequest {
        self.request
    }

    pub fn param(&self, name: &str) -> Option<&'a str> {
        self.request.param(name)
    }

    /// Directory the report writes its files into
    pub fn output_dir(&self) -> &'a Path {
        self.output_dir
    }

    /// Open (on first use) and borrow a named data source
    pub fn connection(&mut self, name: &str) -> Result<&Connection> {
        self.connections.get(name)
    }

    /// Update the current-action text shown by the monitor
    pub fn set_action(&self, action: impl Into<String>) {
        self.job.set_action(action);
    }

    /// Ask the orchestrator to alert operators once the report returns
    pub fn raise_alert(&mut self, message: impl Into<String>) {
        self.alerts.push(message.into());
    }

    pub fn take_alerts(&mut self) -> Vec<String> {
        std::mem::take(&mut self.alerts)
    }
}
