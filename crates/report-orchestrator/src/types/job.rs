//! Job identity, lifecycle status and live job state

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::request::JobRequest;
use super::status::StatusSnapshot;
use crate::report::CancellationToken;

/// Monotonically increasing job identifier, never reused within a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Init,
    Parsed,
    Authorized,
    Executing,
    Completed,
    Aborted,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Aborted | JobStatus::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            JobStatus::Init => 0,
            JobStatus::Parsed => 1,
            JobStatus::Authorized => 2,
            JobStatus::Executing => 3,
            JobStatus::Completed | JobStatus::Aborted | JobStatus::Failed => 4,
        }
    }

    /// Whether the job may move from `self` to `next` on its own thread.
    /// ABORTED is never reached this way, see [`JobHandle::abort`].
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        !self.is_terminal() && next != JobStatus::Aborted && next.rank() > self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Init => "INIT",
            JobStatus::Parsed => "PARSED",
            JobStatus::Authorized => "AUTHORIZED",
            JobStatus::Executing => "EXECUTING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Aborted => "ABORTED",
            JobStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    report_class: String,
    report_name: String,
    user: String,
    max_run_time: Duration,
    current_action: String,
    errors: String,
    files: Vec<String>,
}

/// Live state of one job, shared between its processor thread and the monitor
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    started_at: DateTime<Utc>,
    started: Instant,
    cancel: CancellationToken,
    overdue_alerted: AtomicBool,
    state: Mutex<JobState>,
}

impl JobHandle {
    pub fn new(id: JobId, max_run_time: Duration) -> Self {
        Self {
            id,
            started_at: Utc::now(),
            started: Instant::now(),
            cancel: CancellationToken::new(),
            overdue_alerted: AtomicBool::new(false),
            state: Mutex::new(JobState {
                status: JobStatus::Init,
                report_class: String::new(),
                report_name: String::new(),
                user: String::new(),
                max_run_time,
                current_action: "Waiting to parse request".to_string(),
                errors: String::new(),
                files: Vec::new(),
            }),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn status(&self) -> JobStatus {
        self.state.lock().status
    }

    pub fn is_aborted(&self) -> bool {
        self.status() == JobStatus::Aborted
    }

    /// Token handed to the report implementation
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Move forward along the lifecycle; returns false when the move is not allowed
    pub fn advance(&self, next: JobStatus) -> bool {
        let mut state = self.state.lock();
        if state.status.can_advance_to(next) {
            tracing::debug!("Job {}: {} -> {}", self.id, state.status, next);
            state.status = next;
            true
        } else {
            false
        }
    }

    /// Force ABORTED from any non-terminal state and signal cancellation
    pub fn abort(&self) -> bool {
        let mut state = self.state.lock();
        if state.status.is_terminal() {
            return false;
        }
        state.status = JobStatus::Aborted;
        state.current_action = "Abort requested".to_string();
        drop(state);
        self.cancel.cancel();
        true
    }

    /// Settle on a terminal status; an abort that already happened wins
    pub fn finish(&self, outcome: JobStatus) -> JobStatus {
        let mut state = self.state.lock();
        if state.status != JobStatus::Aborted && state.status.can_advance_to(outcome) {
            state.status = outcome;
        }
        state.status
    }

    /// Record the identifying fields of a parsed request
    pub fn set_request(&self, request: &JobRequest) {
        let mut state = self.state.lock();
        state.report_class = request.report_class.clone();
        state.report_name = request.display_name().to_string();
        state.user = request.user.clone();
    }

    pub fn set_max_run_time(&self, max_run_time: Duration) {
        self.state.lock().max_run_time = max_run_time;
    }

    /// Update the current-action text shown in status tables
    pub fn set_action(&self, action: impl Into<String>) {
        self.state.lock().current_action = action.into();
    }

    /// Append a line to the accumulated error text
    pub fn append_error(&self, message: impl AsRef<str>) {
        let mut state = self.state.lock();
        if !state.errors.is_empty() {
            state.errors.push('\n');
        }
        state.errors.push_str(message.as_ref());
    }

    pub fn errors(&self) -> String {
        self.state.lock().errors.clone()
    }

    pub fn add_file(&self, file_name: impl Into<String>) {
        self.state.lock().files.push(file_name.into());
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Elapsed time exceeds the declared max run time
    pub fn is_overdue(&self) -> bool {
        let max = self.state.lock().max_run_time;
        !max.is_zero() && self.elapsed() > max
    }

    /// Returns true the first time it is called for this job
    pub fn mark_overdue_alerted(&self) -> bool {
        !self.overdue_alerted.swap(true, Ordering::SeqCst)
    }

    /// Point-in-time copy for status reporting
    pub fn snapshot(&self) -> StatusSnapshot {
        let state = self.state.lock();
        StatusSnapshot {
            job_id: self.id,
            report_class: state.report_class.clone(),
            report_name: state.report_name.clone(),
            user: state.user.clone(),
            status: state.status,
            current_action: state.current_action.clone(),
            started_at: self.started_at,
            elapsed_secs: self.started.elapsed().as_secs(),
            max_run_time_secs: state.max_run_time.as_secs(),
            files_produced: state.files.len(),
        }
    }
}
