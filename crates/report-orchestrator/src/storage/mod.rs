//! Persistence: the report database, banned list sources and per-job data sources

mod banned;
mod connections;
mod database;

pub use banned::{banned_source, BannedList, BannedListSource, FileBannedList};
pub use connections::JobConnections;
pub use database::{AuditRecord, ReportDb, ReportRegistration};
