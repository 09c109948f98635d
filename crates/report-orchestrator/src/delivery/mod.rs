//! Output delivery channels
//!
//! Each channel is a trait so the processor can run against real transports
//! in the server and against recording fakes in tests. Every call here is
//! synchronous: delivery runs on the job's own worker thread.
//!
//! Implementations:
//! - `SmtpMailer`: mail through an SMTP relay
//! - `FtpTransfer`: artifact push to an `ftp://` location
//! - `ReqwestNotifier`: per-artifact HTTP callback

mod compress;
mod mail;
mod notify;
mod transfer;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;
use crate::types::{FileTransferTarget, HttpNotifyTarget, Recipient};

pub use compress::compress_file;
pub use mail::SmtpMailer;
pub use notify::ReqwestNotifier;
pub use transfer::FtpTransfer;

/// One outgoing message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutgoingEmail {
    pub to: Vec<Recipient>,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<PathBuf>,
}

/// Trait for sending mail
pub trait MailTransport: Send + Sync {
    fn send(&self, email: &OutgoingEmail) -> Result<()>;

    /// Transport name for logging
    fn name(&self) -> &str;
}

/// Transfer mode for a pushed artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Text,
    Binary,
}

/// Pick the transfer mode from the file extension and the compression flag
pub fn transfer_mode_for(path: &Path, zipped: bool) -> TransferMode {
    if zipped {
        return TransferMode::Binary;
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("txt" | "csv" | "dat" | "prn" | "tsv") => TransferMode::Text,
        _ => TransferMode::Binary,
    }
}

/// Trait for pushing artifacts to a remote location
pub trait FileTransfer: Send + Sync {
    /// Push `local` to `target`, returning the remote location
    fn push(&self, target: &FileTransferTarget, local: &Path, mode: TransferMode) -> Result<String>;

    fn name(&self) -> &str;
}

/// One HTTP notification call
#[derive(Debug, Clone, PartialEq)]
pub struct NotifyCall {
    pub url: String,
    pub method: String,
    pub params: Vec<(String, String)>,
}

impl NotifyCall {
    /// Call announcing one delivered artifact.
    ///
    /// Carries the file name, the web-service credentials when set, the
    /// transfer credentials when a transfer target exists, and `zipped=yes`
    /// for compressed artifacts.
    pub fn for_artifact(
        target: &HttpNotifyTarget,
        file_name: &str,
        transfer: Option<&FileTransferTarget>,
        zipped: bool,
    ) -> Self {
        let mut params = vec![("fileName".to_string(), file_name.to_string())];
        let mut push = |key: &str, value: &str| {
            if !value.is_empty() {
                params.push((key.to_string(), value.to_string()));
            }
        };
        push("uid", &target.uid);
        push("pwd", &target.pwd);
        push("accessKey", &target.access_key);
        if let Some(ftp) = transfer {
            push("ftpUid", &ftp.uid);
            push("ftpPwd", &ftp.pwd);
        }
        if zipped {
            push("zipped", "yes");
        }

        Self {
            url: target.url.clone(),
            method: if target.method.is_empty() {
                "GET".to_string()
            } else {
                target.method.to_ascii_uppercase()
            },
            params,
        }
    }
}

/// Trait for HTTP notifications
pub trait HttpNotifier: Send + Sync {
    fn notify(&self, call: &NotifyCall) -> Result<()>;

    fn name(&self) -> &str;
}

/// The three outbound channels a job delivers through
#[derive(Clone)]
pub struct DeliveryChannels {
    pub mailer: Arc<dyn MailTransport>,
    pub transfer: Arc<dyn FileTransfer>,
    pub notifier: Arc<dyn HttpNotifier>,
}
