//! Recording fakes and a scripted report for processing tests

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tempfile::TempDir;

use super::{JobProcessor, JobServices};
use crate::config::OrchestratorConfig;
use crate::delivery::{
    DeliveryChannels, FileTransfer, HttpNotifier, MailTransport, NotifyCall, OutgoingEmail, TransferMode,
};
use crate::error::{Error, Result};
use crate::report::{CancellationToken, Report, ReportContext, ReportFactory};
use crate::storage::ReportDb;
use crate::types::{FileTransferTarget, JobId, JobStatus};

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().clone()
    }
}

impl MailTransport for RecordingMailer {
    fn send(&self, email: &OutgoingEmail) -> Result<()> {
        self.sent.lock().push(email.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

#[derive(Default)]
pub struct RecordingTransfer {
    pushed: Mutex<Vec<(PathBuf, TransferMode)>>,
    fail_next: AtomicBool,
}

impl RecordingTransfer {
    pub fn pushed(&self) -> Vec<(PathBuf, TransferMode)> {
        self.pushed.lock().clone()
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl FileTransfer for RecordingTransfer {
    fn push(&self, target: &FileTransferTarget, local: &Path, mode: TransferMode) -> Result<String> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(Error::transfer("connection refused"));
        }
        self.pushed.lock().push((local.to_path_buf(), mode));
        let name = local.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        Ok(format!("{}/{}", target.url, name))
    }

    fn name(&self) -> &str {
        "recording"
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<NotifyCall>>,
}

impl RecordingNotifier {
    pub fn calls(&self) -> Vec<NotifyCall> {
        self.calls.lock().clone()
    }
}

impl HttpNotifier for RecordingNotifier {
    fn notify(&self, call: &NotifyCall) -> Result<()> {
        self.calls.lock().push(call.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Report whose behaviour is fixed by the test
#[derive(Clone, Default)]
pub struct ScriptedReport {
    files: Vec<String>,
    fail: Option<String>,
    wait_for_cancel: bool,
    customer_id: Option<String>,
    executions: Arc<AtomicUsize>,
    pub saw_cancel: Arc<AtomicBool>,
    written: Vec<PathBuf>,
}

impl ScriptedReport {
    pub fn producing(files: &[&str]) -> Self {
        Self {
            files: files.iter().map(|f| f.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn waiting_for_cancel(mut self) -> Self {
        self.wait_for_cancel = true;
        self
    }

    pub fn with_customer(mut self, customer_id: &str) -> Self {
        self.customer_id = Some(customer_id.to_string());
        self
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

impl Report for ScriptedReport {
    fn name(&self) -> &str {
        "scripted"
    }

    fn execute(&mut self, ctx: &mut ReportContext<'_>, cancel: &CancellationToken) -> Result<()> {
        self.executions.fetch_add(1, Ordering::SeqCst);

        if self.wait_for_cancel {
            let deadline = Instant::now() + Duration::from_secs(10);
            while !cancel.is_cancelled() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(5));
            }
            self.saw_cancel.store(cancel.is_cancelled(), Ordering::SeqCst);
            return Ok(());
        }
        if let Some(message) = &self.fail {
            return Err(Error::execution(message.clone()));
        }
        for name in &self.files {
            let path = ctx.output_dir().join(name);
            std::fs::write(&path, format!("contents of {}\n", name))?;
            self.written.push(path);
        }
        Ok(())
    }

    fn produced_files(&self) -> Vec<PathBuf> {
        self.written.clone()
    }

    fn customer_id(&self) -> Option<String> {
        self.customer_id.clone()
    }
}

/// Shape of a generated request document
#[derive(Default)]
pub struct RequestSpec {
    pub class: &'static str,
    pub recipients: Vec<(&'static str, &'static str)>,
    pub zipped: bool,
    pub attachment: bool,
    pub confirm: bool,
    pub ftp: Option<&'static str>,
    pub http: Option<&'static str>,
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

pub fn request_xml(spec: &RequestSpec) -> String {
    let mut xml = format!(
        "<ReportRequest confirmAlways=\"{}\"><Request zipped=\"{}\" attachment=\"{}\">\
         <ReportName>Test Report</ReportName><ReportClass>{}</ReportClass>\
         <User>alice</User><Password>pw</Password>",
        yes_no(spec.confirm),
        yes_no(spec.zipped),
        yes_no(spec.attachment),
        spec.class
    );
    for (name, email) in &spec.recipients {
        xml.push_str(&format!("<Recipient name=\"{}\" email=\"{}\"/>", name, email));
    }
    if let Some(url) = spec.ftp {
        xml.push_str(&format!(
            "<FtpTarget uid=\"ftpuser\" pwd=\"ftppass\"><FtpUrl>{}</FtpUrl></FtpTarget>",
            url
        ));
    }
    if let Some(url) = spec.http {
        xml.push_str(&format!("<HttpNotify url=\"{}\" method=\"GET\"/>", url));
    }
    xml.push_str("</Request></ReportRequest>");
    xml
}

/// Job services wired to recording fakes
pub struct Harness {
    pub services: Arc<JobServices>,
    pub database: Arc<ReportDb>,
    pub mailer: Arc<RecordingMailer>,
    pub transfer: Arc<RecordingTransfer>,
    pub notifier: Arc<RecordingNotifier>,
    _dir: TempDir,
}

impl Harness {
    pub fn new(ceiling: usize, factory: ReportFactory) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = OrchestratorConfig::default();
        config.admission.ceiling = ceiling;
        config.jobs.work_dir = dir.path().join("jobs");
        config.mail.operators = vec!["ops@example.com".to_string()];
        config.mail.generic_failure_message = "Your report could not be produced.".to_string();

        let database = Arc::new(ReportDb::in_memory().unwrap());
        let mailer = Arc::new(RecordingMailer::default());
        let transfer = Arc::new(RecordingTransfer::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let channels = DeliveryChannels {
            mailer: mailer.clone(),
            transfer: transfer.clone(),
            notifier: notifier.clone(),
        };
        let services = Arc::new(JobServices::new(config, database.clone(), factory, channels));

        Self {
            services,
            database,
            mailer,
            transfer,
            notifier,
            _dir: dir,
        }
    }

    /// Admit and run one job to completion
    pub async fn run(&self, xml: &str) -> (JobId, JobStatus) {
        let slot = self.services.monitor.acquire_slot().await.unwrap();
        let processor = JobProcessor::new(self.services.clone(), xml.to_string()).unwrap();
        let id = processor.job().id();
        let status = tokio::task::spawn_blocking(move || processor.run(slot))
            .await
            .unwrap();
        (id, status)
    }

    pub fn output_dir(&self, id: JobId) -> PathBuf {
        self.services.config.jobs.work_dir.join(format!("job-{}", id))
    }
}
