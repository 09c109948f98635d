//! report-orchestrator: queued report runs with admission control and multi-channel delivery
//!
//! Report requests arrive as XML documents on an AMQP queue. Each one becomes a
//! job that is admitted under a concurrency ceiling, authorized against the
//! report database, filtered through the banned recipient list, executed by a
//! pluggable [`report::Report`] and delivered by email, FTP or HTTP callback.
//! A small axum server exposes job status, abort and the monitor lifecycle.

pub mod broker;
pub mod config;
pub mod delivery;
pub mod document;
pub mod error;
pub mod processing;
pub mod report;
pub mod server;
pub mod storage;
pub mod types;

pub use config::OrchestratorConfig;
pub use error::{Error, Result};
pub use processing::{JobMonitor, JobProcessor, JobServices, QueueListener};
pub use report::{Report, ReportContext, ReportFactory};
pub use server::ServerSupervisor;
pub use types::{JobId, JobRequest, JobStatus, Recipient};
