//! Per-job state machine
//!
//! INIT -> PARSED -> AUTHORIZED -> EXECUTING -> {COMPLETED, ABORTED, FAILED},
//! followed by a cleanup phase that runs on every path: connections are
//! committed and closed, the job leaves the monitor's registry and its
//! admission slot is released.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::{notices, AdmissionSlot, JobServices};
use crate::delivery::{compress_file, transfer_mode_for, NotifyCall, OutgoingEmail};
use crate::document::parse_request;
use crate::error::{Error, Result};
use crate::report::ReportContext;
use crate::storage::{AuditRecord, JobConnections};
use crate::types::{DeliveryFlags, JobHandle, JobRequest, JobStatus, Recipient};

/// Request parameter overriding the declared max run time, in hours
const MAX_RUN_TIME_PARAM: &str = "maxRunTimeHours";

/// How the execute and deliver phases ended without an error
enum Finish {
    Delivered,
    Aborted,
}

/// Where one artifact ended up
enum Delivered {
    Attached(PathBuf),
    Remote(String),
}

/// Runs one job from raw request text to cleanup
pub struct JobProcessor {
    services: Arc<JobServices>,
    job: Arc<JobHandle>,
    raw: String,
    output_dir: PathBuf,
    connections: JobConnections,
    request: Option<JobRequest>,
    /// Distribution list once it has passed the banned filter
    recipients: Option<Vec<Recipient>>,
}

impl JobProcessor {
    /// Allocate a job id, prepare the job's output directory and register
    /// the job with the monitor.
    pub fn new(services: Arc<JobServices>, raw: String) -> Result<Self> {
        let id = services.monitor.next_job_id();
        let output_dir = services.config.jobs.work_dir.join(format!("job-{}", id));
        std::fs::create_dir_all(&output_dir)?;

        let job = Arc::new(JobHandle::new(id, services.config.jobs.default_max_run_time()));
        let connections = JobConnections::new(services.data_sources.clone());
        services.monitor.add_job(job.clone());

        Ok(Self {
            services,
            job,
            raw,
            output_dir,
            connections,
            request: None,
            recipients: None,
        })
    }

    pub fn job(&self) -> &Arc<JobHandle> {
        &self.job
    }

    /// Drive the job to a terminal status. Blocks the calling thread.
    pub fn run(mut self, slot: AdmissionSlot) -> JobStatus {
        let id = self.job.id();
        tracing::info!("Job {} started", id);

        let status = match catch_unwind(AssertUnwindSafe(|| self.process())) {
            Ok(status) => status,
            Err(_) => {
                tracing::error!("Job {} panicked", id);
                self.conclude(Error::internal("report processing panicked"))
            }
        };

        self.cleanup();
        drop(slot);
        tracing::info!("Job {} finished as {}", id, status);
        status
    }

    fn process(&mut self) -> JobStatus {
        let id = self.job.id();
        self.job.set_action("Parsing request");
        let request = match parse_request(&self.raw) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!("Job {}: {}", id, e);
                self.job.append_error(e.to_string());
                return self.job.finish(JobStatus::Failed);
            }
        };
        self.job.set_request(&request);
        self.job.advance(JobStatus::Parsed);
        tracing::info!(
            "Job {}: parsed request for '{}' by '{}' ({} recipient(s))",
            id,
            request.display_name(),
            request.user,
            request.recipients.len()
        );
        self.request = Some(request.clone());

        match self.run_phases(&request) {
            Ok(Finish::Delivered) => {
                let status = self.job.finish(JobStatus::Completed);
                if status == JobStatus::Aborted {
                    tracing::warn!("Job {}: abort arrived after delivery had finished", id);
                }
                status
            }
            Ok(Finish::Aborted) => self.conclude_aborted(),
            Err(e) => self.conclude(e),
        }
    }

    fn run_phases(&mut self, request: &JobRequest) -> Result<Finish> {
        self.authorize(request)?;
        let recipients = self.filter_recipients(request)?;
        let Some((files, flags)) = self.execute(request)? else {
            return Ok(Finish::Aborted);
        };
        if self.job.is_aborted() {
            return Ok(Finish::Aborted);
        }
        self.deliver(request, files, flags, &recipients)
    }

    fn authorize(&mut self, request: &JobRequest) -> Result<()> {
        self.job.set_action("Authorizing");
        if !self
            .services
            .database
            .is_authorized(&request.report_class, &request.user)?
        {
            let err = Error::AuthorizationDenied {
                user: request.user.clone(),
                report: request.report_class.clone(),
            };
            self.audit(request, None, &err.to_string());
            return Err(err);
        }
        self.job.advance(JobStatus::Authorized);
        Ok(())
    }

    /// All-or-nothing: one banned address stops the whole job
    fn filter_recipients(&mut self, request: &JobRequest) -> Result<Vec<Recipient>> {
        self.job.set_action("Checking distribution list");
        let banned = self.services.banned.load()?;
        let (kept, removed) = banned.partition_recipients(&request.recipients);

        if removed.is_empty() {
            self.recipients = Some(kept.clone());
            return Ok(kept);
        }

        tracing::warn!(
            "Job {}: {} banned recipient(s) in distribution list, not executing",
            self.job.id(),
            removed.len()
        );
        let notice = notices::banned_recipients(
            self.job.id(),
            request,
            &removed,
            &kept,
            &self.services.operators(),
        );
        self.send_admin(&notice);

        let err = Error::BannedRecipients {
            removed: removed.into_iter().map(|r| r.email).collect(),
        };
        self.audit(request, None, &err.to_string());
        Err(err)
    }

    /// Run the report; None when the job was aborted before it started
    fn execute(&mut self, request: &JobRequest) -> Result<Option<(Vec<PathBuf>, DeliveryFlags)>> {
        let id = self.job.id();
        let resolved = self.services.factory.resolve(&request.report_class);
        let flags = if resolved.is_stand_in() {
            tracing::warn!(
                "Job {}: {}, running stand-in alert",
                id,
                Error::ReportClassNotFound(request.report_class.clone())
            );
            DeliveryFlags::NONE
        } else {
            request.flags
        };
        let mut report = resolved.into_report();

        let max_run_time = report
            .max_run_time()
            .or_else(|| requested_max_run_time(request))
            .unwrap_or_else(|| self.services.config.jobs.default_max_run_time());
        self.job.set_max_run_time(max_run_time);

        if !self.job.advance(JobStatus::Executing) {
            tracing::info!("Job {}: not executing, status is {}", id, self.job.status());
            return Ok(None);
        }
        self.job.set_action(format!("Running {}", report.name()));
        tracing::info!("Job {}: executing {}", id, report.name());

        let cancel = self.job.cancellation_token().clone();
        let (result, alerts) = {
            let mut ctx = ReportContext::new(&self.job, request, &self.output_dir, &mut self.connections);
            let result = report.execute(&mut ctx, &cancel);
            (result, ctx.take_alerts())
        };

        let operators = self.services.operators();
        for alert in &alerts {
            self.send_admin(&notices::report_alert(id, request, alert, &operators));
        }

        let files = report.produced_files();
        for file in &files {
            self.job.add_file(file_name(file));
        }

        let message = match &result {
            Ok(()) => format!("Executed {} ({} file(s))", report.name(), files.len()),
            Err(e) => format!("Execution of {} failed: {}", report.name(), e),
        };
        self.audit(request, report.customer_id(), &message);

        result.map_err(|e| match e {
            Error::ReportExecution(_) => e,
            other => Error::execution(other.to_string()),
        })?;
        Ok(Some((files, flags)))
    }

    fn deliver(
        &mut self,
        request: &JobRequest,
        files: Vec<PathBuf>,
        flags: DeliveryFlags,
        recipients: &[Recipient],
    ) -> Result<Finish> {
        let id = self.job.id();
        let mut locations = Vec::new();
        let mut attachments = Vec::new();
        let mut failures = Vec::new();

        for file in files {
            if self.job.is_aborted() {
                return Ok(Finish::Aborted);
            }
            let name = file_name(&file);
            self.job.set_action(format!("Delivering {}", name));
            match self.deliver_artifact(request, &file, flags) {
                Ok(Delivered::Attached(path)) => attachments.push(path),
                Ok(Delivered::Remote(location)) => locations.push(location),
                Err(e) => {
                    tracing::error!("Job {}: delivery of {} failed: {}", id, name, e);
                    let line = format!("{}: {}", name, e);
                    self.job.append_error(&line);
                    failures.push(line);
                }
            }
        }

        if self.job.is_aborted() {
            return Ok(Finish::Aborted);
        }
        if !failures.is_empty() {
            return Err(Error::delivery(failures.join("; ")));
        }

        if recipients.is_empty() {
            tracing::info!("Job {}: no recipients remain, no mail sent", id);
        } else if flags.attachment && !attachments.is_empty() {
            self.job.set_action("Mailing attachments");
            self.services
                .mailer
                .send(&notices::with_attachments(id, request, attachments, recipients))?;
        } else if flags.confirm_email {
            self.job.set_action("Sending summary");
            self.services
                .mailer
                .send(&notices::summary(id, request, &locations, recipients))?;
        }
        Ok(Finish::Delivered)
    }

    fn deliver_artifact(&self, request: &JobRequest, file: &Path, flags: DeliveryFlags) -> Result<Delivered> {
        let path = if flags.zipped {
            compress_file(file)?
        } else {
            file.to_path_buf()
        };
        let name = file_name(&path);

        let delivered = if flags.attachment {
            Delivered::Attached(path.clone())
        } else if let Some(target) = &request.file_transfer {
            let mode = transfer_mode_for(&path, flags.zipped);
            Delivered::Remote(self.services.transfer.push(target, &path, mode)?)
        } else {
            Delivered::Remote(path.display().to_string())
        };

        if let Some(http) = &request.http_notify {
            let call = NotifyCall::for_artifact(http, &name, request.file_transfer.as_ref(), flags.zipped);
            self.services.notifier.notify(&call)?;
        }
        Ok(delivered)
    }

    /// Route an error to its terminal status and notifications
    fn conclude(&mut self, err: Error) -> JobStatus {
        let id = self.job.id();
        self.job.append_error(err.to_string());
        match err {
            Error::AuthorizationDenied { .. } => {
                tracing::warn!("Job {}: {}", id, err);
                self.job.finish(JobStatus::Failed)
            }
            Error::BannedRecipients { .. } => self.job.finish(JobStatus::Failed),
            _ if self.job.is_aborted() => self.conclude_aborted(),
            err => {
                tracing::error!("Job {} failed: {}", id, err);
                self.report_failure(&err.to_string());
                self.job.finish(JobStatus::Failed)
            }
        }
    }

    fn conclude_aborted(&mut self) -> JobStatus {
        let id = self.job.id();
        tracing::info!("Job {} aborted", id);
        if let Some(request) = &self.request {
            let mut to = self.recipients.clone().unwrap_or_default();
            to.extend(self.services.operators());
            let notice = notices::aborted(id, request, to);
            self.send_quietly(&notice);
        }
        self.job.finish(JobStatus::Aborted)
    }

    /// Operators get the detail; recipients that passed the filter get the generic text
    fn report_failure(&self, error: &str) {
        let id = self.job.id();
        let notice = notices::failure_detail(
            id,
            self.request.as_ref(),
            error,
            &self.job.errors(),
            &self.services.operators(),
        );
        self.send_admin(&notice);

        if let (Some(request), Some(recipients)) = (&self.request, &self.recipients) {
            if !recipients.is_empty() {
                let generic = notices::generic_failure(
                    request,
                    &self.services.config.mail.generic_failure_message,
                    recipients,
                );
                self.send_quietly(&generic);
            }
        }
    }

    fn send_admin(&self, email: &OutgoingEmail) {
        if email.to.is_empty() {
            tracing::warn!(
                "Job {}: no operators configured, dropping notice '{}'",
                self.job.id(),
                email.subject
            );
            return;
        }
        self.send_quietly(email);
    }

    /// Send without affecting the job outcome
    fn send_quietly(&self, email: &OutgoingEmail) {
        if let Err(e) = self.services.mailer.send(email) {
            tracing::error!("Job {}: mail '{}' not sent: {}", self.job.id(), email.subject, e);
            self.job.append_error(format!("mail '{}' not sent: {}", email.subject, e));
        }
    }

    fn audit(&self, request: &JobRequest, customer_id: Option<String>, message: &str) {
        let record = AuditRecord::new(
            self.job.id().0,
            request.user.clone(),
            request.display_name(),
            request.recipient_list(),
            message,
        )
        .with_customer_id(customer_id);
        if let Err(e) = self.services.database.insert_audit(&record) {
            tracing::error!("Job {}: audit row not written: {}", self.job.id(), e);
        }
    }

    fn cleanup(&mut self) {
        let id = self.job.id();
        for failure in self.connections.close_all() {
            tracing::warn!("Job {}: {}", id, failure);
            self.job.append_error(failure);
        }
        if self.services.monitor.remove_job(id).is_none() {
            tracing::warn!("Job {} was not in the registry at cleanup", id);
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn requested_max_run_time(request: &JobRequest) -> Option<Duration> {
    request
        .param(MAX_RUN_TIME_PARAM)
        .and_then(|h| h.trim().parse::<f64>().ok())
        .filter(|h| h.is_finite() && *h > 0.0)
        .map(|h| Duration::from_secs_f64(h * 3600.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::TransferMode;
    use crate::processing::testing::{request_xml, Harness, RequestSpec, ScriptedReport};
    use crate::report::ReportFactory;
    use std::sync::atomic::Ordering;

    fn factory_with(key: &str, report: ScriptedReport) -> ReportFactory {
        let mut factory = ReportFactory::new();
        factory.register(key, move || report.clone());
        factory
    }

    fn three_recipients() -> Vec<(&'static str, &'static str)> {
        vec![
            ("Bob", "bob@example.com"),
            ("Carol", "carol@example.com"),
            ("Dan", "dan@example.com"),
        ]
    }

    #[tokio::test]
    async fn test_two_file_example() {
        let report = ScriptedReport::producing(&["a.txt", "b.txt"]).with_customer("C-7");
        let harness = Harness::new(2, factory_with("X", report.clone()));

        let xml = request_xml(&RequestSpec {
            class: "X",
            recipients: three_recipients(),
            zipped: true,
            attachment: false,
            confirm: true,
            ftp: Some("ftp://files.example.com/out"),
            ..Default::default()
        });
        let (id, status) = harness.run(&xml).await;
        assert_eq!(status, JobStatus::Completed);
        assert_eq!(report.executions(), 1);

        let pushed = harness.transfer.pushed();
        assert_eq!(pushed.len(), 2);
        for (path, mode) in &pushed {
            assert_eq!(path.extension().and_then(|e| e.to_str()), Some("zip"));
            assert_eq!(*mode, TransferMode::Binary);
        }
        let out = harness.output_dir(id);
        assert!(!out.join("a.txt").exists());
        assert!(out.join("a.zip").exists());

        let sent = harness.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to.len(), 3);
        assert!(sent[0].body.contains("ftp://files.example.com/out/a.zip"));
        assert!(sent[0].body.contains("ftp://files.example.com/out/b.zip"));

        let audit = harness.database.audit_for_job(id.0).unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].customer_id.as_deref(), Some("C-7"));
        assert!(harness.services.monitor.get_job(id).is_none());
        assert_eq!(harness.services.monitor.active_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_envelope_never_executes() {
        let report = ScriptedReport::producing(&["a.txt"]);
        let harness = Harness::new(1, factory_with("X", report.clone()));

        let (id, status) = harness
            .run("<Request><ReportClass>X</ReportClass></Request>")
            .await;
        assert_eq!(status, JobStatus::Failed);
        assert_eq!(report.executions(), 0);
        assert!(harness.mailer.sent().is_empty());
        assert!(harness.database.audit_for_job(id.0).unwrap().is_empty());
        assert!(harness.services.monitor.get_job(id).is_none());
    }

    #[tokio::test]
    async fn test_banned_recipient_stops_job_with_one_notice() {
        let report = ScriptedReport::producing(&["a.txt"]);
        let harness = Harness::new(1, factory_with("X", report.clone()));
        harness.database.add_banned_email("CAROL@example.com").unwrap();

        let xml = request_xml(&RequestSpec {
            class: "X",
            recipients: three_recipients(),
            confirm: true,
            ..Default::default()
        });
        let (id, status) = harness.run(&xml).await;
        assert_eq!(status, JobStatus::Failed);
        assert_eq!(report.executions(), 0);

        let sent = harness.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, harness.services.operators());
        assert!(sent[0].body.contains("carol@example.com"));
        assert!(sent[0].body.contains("bob@example.com"));
        assert!(sent[0].body.contains("dan@example.com"));
        assert_eq!(harness.database.audit_for_job(id.0).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_class_runs_stand_in_with_flags_cleared() {
        let harness = Harness::new(1, ReportFactory::new());
        let xml = request_xml(&RequestSpec {
            class: "com.example.Missing",
            recipients: three_recipients(),
            zipped: true,
            attachment: true,
            confirm: true,
            ftp: Some("ftp://files.example.com/out"),
            ..Default::default()
        });
        let (_, status) = harness.run(&xml).await;
        assert_eq!(status, JobStatus::Completed);

        // only the operator alert; confirmEmail was forced off
        let sent = harness.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, harness.services.operators());
        assert!(sent[0].body.contains("com.example.Missing"));
        assert!(harness.transfer.pushed().is_empty());
    }

    #[tokio::test]
    async fn test_one_summary_regardless_of_file_count() {
        let report = ScriptedReport::producing(&["a.txt", "b.txt", "c.txt", "d.txt"]);
        let harness = Harness::new(1, factory_with("X", report));
        let xml = request_xml(&RequestSpec {
            class: "X",
            recipients: vec![("Bob", "bob@example.com")],
            confirm: true,
            ftp: Some("ftp://files.example.com/out"),
            ..Default::default()
        });
        let (_, status) = harness.run(&xml).await;
        assert_eq!(status, JobStatus::Completed);
        assert_eq!(harness.mailer.sent().len(), 1);

        let modes: Vec<TransferMode> = harness.transfer.pushed().into_iter().map(|(_, m)| m).collect();
        assert_eq!(modes, vec![TransferMode::Text; 4]);
    }

    #[tokio::test]
    async fn test_attachment_mode_sends_single_mail() {
        let report = ScriptedReport::producing(&["a.txt", "b.txt"]);
        let harness = Harness::new(1, factory_with("X", report));
        let xml = request_xml(&RequestSpec {
            class: "X",
            recipients: vec![("Bob", "bob@example.com")],
            attachment: true,
            confirm: true,
            ftp: Some("ftp://files.example.com/out"),
            ..Default::default()
        });
        let (_, status) = harness.run(&xml).await;
        assert_eq!(status, JobStatus::Completed);

        let sent = harness.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].attachments.len(), 2);
        assert!(harness.transfer.pushed().is_empty());
    }

    #[tokio::test]
    async fn test_http_notify_once_per_artifact() {
        let report = ScriptedReport::producing(&["a.txt", "b.txt"]);
        let harness = Harness::new(1, factory_with("X", report));
        let xml = request_xml(&RequestSpec {
            class: "X",
            recipients: vec![("Bob", "bob@example.com")],
            zipped: true,
            ftp: Some("ftp://files.example.com/out"),
            http: Some("http://hooks.example.com/done"),
            ..Default::default()
        });
        let (_, status) = harness.run(&xml).await;
        assert_eq!(status, JobStatus::Completed);

        let calls = harness.notifier.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].params[0], ("fileName".to_string(), "a.zip".to_string()));
        assert!(calls[0].params.contains(&("zipped".to_string(), "yes".to_string())));
        // confirmEmail not requested
        assert!(harness.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_execution_failure_hides_detail_from_recipients() {
        let report = ScriptedReport::failing("ORA-00942: table or view does not exist");
        let harness = Harness::new(1, factory_with("X", report));
        let xml = request_xml(&RequestSpec {
            class: "X",
            recipients: vec![("Bob", "bob@example.com")],
            confirm: true,
            ..Default::default()
        });
        let (_, status) = harness.run(&xml).await;
        assert_eq!(status, JobStatus::Failed);

        let sent = harness.mailer.sent();
        assert_eq!(sent.len(), 2);
        let ops = sent.iter().find(|m| m.to == harness.services.operators()).unwrap();
        assert!(ops.body.contains("ORA-00942"));
        let user = sent.iter().find(|m| m.to[0].email == "bob@example.com").unwrap();
        assert_eq!(user.body, harness.services.config.mail.generic_failure_message);
    }

    #[tokio::test]
    async fn test_delivery_failure_routes_to_generic_failure() {
        let report = ScriptedReport::producing(&["a.txt"]);
        let harness = Harness::new(1, factory_with("X", report));
        harness.transfer.fail_next();
        let xml = request_xml(&RequestSpec {
            class: "X",
            recipients: vec![("Bob", "bob@example.com")],
            confirm: true,
            ftp: Some("ftp://files.example.com/out"),
            ..Default::default()
        });
        let (_, status) = harness.run(&xml).await;
        assert_eq!(status, JobStatus::Failed);

        let sent = harness.mailer.sent();
        assert!(sent.iter().all(|m| !m.subject.contains("is ready")));
        assert!(sent
            .iter()
            .any(|m| m.body == harness.services.config.mail.generic_failure_message));
    }

    #[tokio::test]
    async fn test_authorization_denied_mails_nobody() {
        let report = ScriptedReport::producing(&["a.txt"]);
        let harness = Harness::new(1, factory_with("X", report.clone()));
        let report_id = harness.database.register_report("X", "Restricted").unwrap();
        harness.database.grant_access(report_id, "someone-else").unwrap();

        let xml = request_xml(&RequestSpec {
            class: "X",
            recipients: vec![("Bob", "bob@example.com")],
            confirm: true,
            ..Default::default()
        });
        let (id, status) = harness.run(&xml).await;
        assert_eq!(status, JobStatus::Failed);
        assert_eq!(report.executions(), 0);
        assert!(harness.mailer.sent().is_empty());
        assert_eq!(harness.database.audit_for_job(id.0).unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_abort_during_execute_sends_aborted_notice() {
        let report = ScriptedReport::producing(&["a.txt"]).waiting_for_cancel();
        let harness = Harness::new(1, factory_with("X", report.clone()));
        let xml = request_xml(&RequestSpec {
            class: "X",
            recipients: vec![("Bob", "bob@example.com")],
            confirm: true,
            ftp: Some("ftp://files.example.com/out"),
            ..Default::default()
        });

        let slot = harness.services.monitor.acquire_slot().await.unwrap();
        let processor = JobProcessor::new(harness.services.clone(), xml).unwrap();
        let job = processor.job().clone();
        let running = tokio::task::spawn_blocking(move || processor.run(slot));

        for _ in 0..500 {
            if job.status() == JobStatus::Executing {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        harness.services.monitor.abort_job(job.id()).unwrap();

        let status = running.await.unwrap();
        assert_eq!(status, JobStatus::Aborted);
        assert!(report.saw_cancel.load(Ordering::SeqCst));
        assert!(harness.transfer.pushed().is_empty());

        let sent = harness.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].subject.contains("aborted"));
        assert!(sent[0].to.iter().any(|r| r.email == "bob@example.com"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_abort_before_execute_never_runs_report() {
        let report = ScriptedReport::producing(&["a.txt"]);
        let harness = Harness::new(1, factory_with("X", report.clone()));
        let xml = request_xml(&RequestSpec {
            class: "X",
            recipients: vec![("Bob", "bob@example.com")],
            confirm: true,
            ..Default::default()
        });

        let slot = harness.services.monitor.acquire_slot().await.unwrap();
        let processor = JobProcessor::new(harness.services.clone(), xml).unwrap();
        let job = processor.job().clone();
        harness.services.monitor.abort_job(job.id()).unwrap();

        let status = tokio::task::spawn_blocking(move || processor.run(slot))
            .await
            .unwrap();
        assert_eq!(status, JobStatus::Aborted);
        assert_eq!(job.status(), JobStatus::Aborted);
        assert_eq!(report.executions(), 0);

        let sent = harness.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].subject.contains("aborted"));
    }

    #[tokio::test]
    async fn test_zipped_name_collision_fails_job() {
        // a.txt and a.csv both compress to a.zip
        let report = ScriptedReport::producing(&["a.txt", "a.csv"]);
        let harness = Harness::new(1, factory_with("X", report));
        let xml = request_xml(&RequestSpec {
            class: "X",
            recipients: vec![("Bob", "bob@example.com")],
            zipped: true,
            ftp: Some("ftp://files.example.com/out"),
            ..Default::default()
        });
        let (_, status) = harness.run(&xml).await;
        assert_eq!(status, JobStatus::Failed);
        assert_eq!(harness.transfer.pushed().len(), 1);
    }

    #[tokio::test]
    async fn test_declared_max_run_time_from_param() {
        let request = JobRequest {
            params: vec![crate::types::Param {
                name: MAX_RUN_TIME_PARAM.to_string(),
                param_type: "number".to_string(),
                value: "0.5".to_string(),
            }],
            ..Default::default()
        };
        assert_eq!(requested_max_run_time(&request), Some(Duration::from_secs(1800)));
        assert_eq!(requested_max_run_time(&JobRequest::default()), None);
    }
}
