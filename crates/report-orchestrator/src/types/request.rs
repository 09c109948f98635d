//! Request types decoded from a request document

use serde::{Deserialize, Serialize};
use std::fmt;

/// A report parameter; name, type and value are opaque to the orchestrator
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub param_type: String,
    pub value: String,
}

/// A distribution-list entry
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

impl Recipient {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Operator address used for administrative mail
    pub fn operator(email: impl Into<String>) -> Self {
        let email = email.into();
        Self {
            name: email.clone(),
            email,
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() || self.name == self.email {
            write!(f, "{}", self.email)
        } else {
            write!(f, "{} <{}>", self.name, self.email)
        }
    }
}

/// Remote location produced artifacts are pushed to
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileTransferTarget {
    pub url: String,
    pub uid: String,
    pub pwd: String,
}

impl fmt::Debug for FileTransferTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileTransferTarget")
            .field("url", &self.url)
            .field("uid", &self.uid)
            .field("pwd", &"***")
            .finish()
    }
}

/// Endpoint called once per delivered artifact
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpNotifyTarget {
    pub url: String,
    pub method: String,
    pub uid: String,
    pub pwd: String,
    pub access_key: String,
}

impl fmt::Debug for HttpNotifyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpNotifyTarget")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("uid", &self.uid)
            .finish_non_exhaustive()
    }
}

/// Delivery flags carried by the request
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryFlags {
    /// Compress every artifact before delivery
    pub zipped: bool,
    /// Mail artifacts as attachments instead of pushing them
    pub attachment: bool,
    /// Send recipients one summary mail after delivery
    pub confirm_email: bool,
}

impl DeliveryFlags {
    /// Flags forced when the stand-in alert report runs
    pub const NONE: DeliveryFlags = DeliveryFlags {
        zipped: false,
        attachment: false,
        confirm_email: false,
    };
}

/// One report-run request
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobRequest {
    /// Key the report implementation is resolved by
    pub report_class: String,
    /// Human-readable report name
    pub report_name: String,
    /// User the report runs for
    pub user: String,
    pub password: String,
    /// Ordered report parameters
    pub params: Vec<Param>,
    pub recipients: Vec<Recipient>,
    pub file_transfer: Option<FileTransferTarget>,
    pub http_notify: Option<HttpNotifyTarget>,
    pub flags: DeliveryFlags,
}

impl JobRequest {
    /// First parameter value with the given name
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    /// Name shown in mail and status tables
    pub fn display_name(&self) -> &str {
        if self.report_name.is_empty() {
            &self.report_class
        } else {
            &self.report_name
        }
    }

    /// Comma-separated recipient emails
    pub fn recipient_list(&self) -> String {
        self.recipients
            .iter()
            .map(|r| r.email.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Debug for JobRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRequest")
            .field("report_class", &self.report_class)
            .field("report_name", &self.report_name)
            .field("user", &self.user)
            .field("params", &self.params)
            .field("recipients", &self.recipients)
            .field("file_transfer", &self.file_transfer)
            .field("http_notify", &self.http_notify)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}
