//! Core types for the report orchestrator

pub mod job;
pub mod request;
pub mod status;

pub use job::{JobHandle, JobId, JobStatus};
pub use request::{DeliveryFlags, FileTransferTarget, HttpNotifyTarget, JobRequest, Param, Recipient};
pub use status::{StatusReport, StatusSnapshot};
