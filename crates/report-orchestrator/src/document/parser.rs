//! Single-pass request document decoder
//!
//! The decoder walks the document one event at a time and keeps only the
//! request being built plus the text field currently open, so memory does not
//! grow with document size. Element names:
//!
//! ```xml
//! <ReportRequest confirmAlways="yes">
//!   <Request zipped="yes" attachment="no">
//!     <ReportName>Daily Sales</ReportName>
//!     <ReportClass>DailySales</ReportClass>
//!     <User>alice</User>
//!     <Password>secret</Password>
//!     <Param name="region" type="string" value="EMEA"/>
//!     <Recipient name="Bob" email="bob@example.com"/>
//!     <FtpTarget uid="ftpuser" pwd="ftppass"><FtpUrl>ftp://host/out</FtpUrl></FtpTarget>
//!     <HttpNotify url="https://hooks/x" method="POST" uid="u" pwd="p" accessKey="k"/>
//!   </Request>
//! </ReportRequest>
//! ```
//!
//! `ReportRequest`, `Request`, `Param`, `Recipient` and `FtpTarget` read their
//! attributes by position; the attribute names above are documentation only.
//! `HttpNotify` is the one element read by attribute name.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::types::{FileTransferTarget, HttpNotifyTarget, JobRequest, Param, Recipient};

const ENVELOPE: &[u8] = b"ReportRequest";
const REQUEST: &[u8] = b"Request";
const REPORT_NAME: &[u8] = b"ReportName";
const REPORT_CLASS: &[u8] = b"ReportClass";
const USER: &[u8] = b"User";
const PASSWORD: &[u8] = b"Password";
const PARAM: &[u8] = b"Param";
const RECIPIENT: &[u8] = b"Recipient";
const FTP_TARGET: &[u8] = b"FtpTarget";
const FTP_URL: &[u8] = b"FtpUrl";
const HTTP_NOTIFY: &[u8] = b"HttpNotify";

/// Elements whose text content is captured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextField {
    ReportName,
    ReportClass,
    User,
    Password,
    FtpUrl,
}

impl TextField {
    fn from_tag(name: &[u8]) -> Option<Self> {
        match name {
            REPORT_NAME => Some(Self::ReportName),
            REPORT_CLASS => Some(Self::ReportClass),
            USER => Some(Self::User),
            PASSWORD => Some(Self::Password),
            FTP_URL => Some(Self::FtpUrl),
            _ => None,
        }
    }
}

/// Parse a request document into a [`JobRequest`]
pub fn parse_request(xml: &str) -> Result<JobRequest> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut request = JobRequest::default();
    let mut seen_envelope = false;
    // element nesting depth, and the capture element open at a given depth
    let mut depth = 0usize;
    let mut open_text: Option<(TextField, usize)> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::document(format!("at byte {}: {}", reader.buffer_position(), e)))?;

        if let Event::Start(_) = &event {
            depth += 1;
        }

        match event {
            Event::Start(e) | Event::Empty(e) if !seen_envelope => {
                if e.local_name().as_ref() != ENVELOPE {
                    return Err(Error::document(format!(
                        "expected <ReportRequest> envelope, found <{}>",
                        String::from_utf8_lossy(e.local_name().as_ref())
                    )));
                }
                seen_envelope = true;
                request.flags.confirm_email = positional(&e, 0)?.as_deref().map(is_yes).unwrap_or(false);
            }
            Event::Text(_) | Event::CData(_) if !seen_envelope => {
                return Err(Error::document("content before <ReportRequest> envelope"));
            }
            Event::Start(e) => {
                if let Some(field) = TextField::from_tag(e.local_name().as_ref()) {
                    open_text = Some((field, depth));
                }
                apply_element(&mut request, &e)?;
            }
            Event::Empty(e) => {
                apply_element(&mut request, &e)?;
            }
            Event::End(_) => {
                if open_text.is_some_and(|(_, at)| at == depth) {
                    open_text = None;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Text(t) => {
                if let Some(field) = innermost_capture(open_text, depth) {
                    let text = t
                        .unescape()
                        .map_err(|e| Error::document(format!("bad text content: {}", e)))?;
                    append_text(&mut request, field, &text);
                }
            }
            Event::CData(c) => {
                if let Some(field) = innermost_capture(open_text, depth) {
                    let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                    append_text(&mut request, field, &text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_envelope {
        return Err(Error::document("missing <ReportRequest> envelope"));
    }

    Ok(request)
}

/// The capture field when it is the innermost open element
fn innermost_capture(open_text: Option<(TextField, usize)>, depth: usize) -> Option<TextField> {
    open_text.and_then(|(field, at)| (at == depth).then_some(field))
}

/// Apply an element's attributes to the request; unknown elements are ignored
fn apply_element(request: &mut JobRequest, e: &BytesStart<'_>) -> Result<()> {
    match e.local_name().as_ref() {
        ENVELOPE => {
            request.flags.confirm_email = positional(e, 0)?.as_deref().map(is_yes).unwrap_or(false);
        }
        REQUEST => {
            request.flags.zipped = positional(e, 0)?.as_deref().map(is_yes).unwrap_or(false);
            request.flags.attachment = positional(e, 1)?.as_deref().map(is_yes).unwrap_or(false);
        }
        PARAM => {
            request.params.push(Param {
                name: positional(e, 0)?.unwrap_or_default(),
                param_type: positional(e, 1)?.unwrap_or_default(),
                value: positional(e, 2)?.unwrap_or_default(),
            });
        }
        RECIPIENT => {
            request.recipients.push(Recipient {
                name: positional(e, 0)?.unwrap_or_default(),
                email: positional(e, 1)?.unwrap_or_default(),
            });
        }
        FTP_TARGET => {
            let target = request.file_transfer.get_or_insert_with(FileTransferTarget::default);
            target.uid = positional(e, 0)?.unwrap_or_default();
            target.pwd = positional(e, 1)?.unwrap_or_default();
        }
        HTTP_NOTIFY => {
            request.http_notify = Some(HttpNotifyTarget {
                url: named(e, b"url")?.unwrap_or_default(),
                method: named(e, b"method")?.unwrap_or_else(|| "GET".to_string()),
                uid: named(e, b"uid")?.unwrap_or_default(),
                pwd: named(e, b"pwd")?.unwrap_or_default(),
                access_key: named(e, b"accessKey")?.unwrap_or_default(),
            });
        }
        _ => {}
    }
    Ok(())
}

fn append_text(request: &mut JobRequest, field: TextField, text: &str) {
    let target = match field {
        TextField::ReportName => &mut request.report_name,
        TextField::ReportClass => &mut request.report_class,
        TextField::User => &mut request.user,
        TextField::Password => &mut request.password,
        TextField::FtpUrl => {
            &mut request
                .file_transfer
                .get_or_insert_with(FileTransferTarget::default)
                .url
        }
    };
    target.push_str(text);
}

/// Attribute value at `index`, regardless of its name
fn positional(e: &BytesStart<'_>, index: usize) -> Result<Option<String>> {
    match e.attributes().nth(index) {
        Some(attr) => {
            let attr = attr.map_err(|err| Error::document(format!("bad attribute: {}", err)))?;
            let value = attr
                .unescape_value()
                .map_err(|err| Error::document(format!("bad attribute value: {}", err)))?;
            Ok(Some(value.into_owned()))
        }
        None => Ok(None),
    }
}

/// Attribute value by name
fn named(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| Error::document(format!("bad attribute: {}", err)))?;
        if attr.key.local_name().as_ref() == key {
            let value = attr
                .unescape_value()
                .map_err(|err| Error::document(format!("bad attribute value: {}", err)))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn is_yes(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "yes" | "y" | "true" | "1"
    )
}
