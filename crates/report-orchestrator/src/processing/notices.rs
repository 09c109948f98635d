//! Mail built by the job processor and the overdue watchdog

use std::path::PathBuf;

use crate::delivery::OutgoingEmail;
use crate::types::{JobId, JobRequest, Recipient, StatusSnapshot};

fn list(recipients: &[Recipient]) -> String {
    if recipients.is_empty() {
        return "  (none)".to_string();
    }
    recipients
        .iter()
        .map(|r| format!("  {}", r))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Administrative notice for a request naming banned recipients
pub fn banned_recipients(
    job_id: JobId,
    request: &JobRequest,
    removed: &[Recipient],
    remaining: &[Recipient],
    operators: &[Recipient],
) -> OutgoingEmail {
    OutgoingEmail {
        to: operators.to_vec(),
        subject: format!("Job {}: banned recipients in '{}'", job_id, request.display_name()),
        body: format!(
            "Job {} for user '{}' was stopped before execution because its distribution list \
             contains banned addresses. The report was not run for any recipient.\n\n\
             Removed:\n{}\n\nRemaining:\n{}\n",
            job_id,
            request.user,
            list(removed),
            list(remaining),
        ),
        attachments: Vec::new(),
    }
}

/// Alert raised by a report while it ran
pub fn report_alert(job_id: JobId, request: &JobRequest, message: &str, operators: &[Recipient]) -> OutgoingEmail {
    OutgoingEmail {
        to: operators.to_vec(),
        subject: format!("Job {}: alert from '{}'", job_id, request.display_name()),
        body: message.to_string(),
        attachments: Vec::new(),
    }
}

/// The one confirmation mail a job sends its recipients
pub fn summary(job_id: JobId, request: &JobRequest, locations: &[String], recipients: &[Recipient]) -> OutgoingEmail {
    let delivered = if locations.is_empty() {
        "No files were produced.".to_string()
    } else {
        let lines: Vec<String> = locations.iter().map(|l| format!("  {}", l)).collect();
        format!("Delivered {} file(s):\n{}", locations.len(), lines.join("\n"))
    };
    OutgoingEmail {
        to: recipients.to_vec(),
        subject: format!("Report '{}' is ready", request.display_name()),
        body: format!("Job {} completed.\n\n{}\n", job_id, delivered),
        attachments: Vec::new(),
    }
}

/// Single mail carrying every artifact; stands in for the summary
pub fn with_attachments(
    job_id: JobId,
    request: &JobRequest,
    attachments: Vec<PathBuf>,
    recipients: &[Recipient],
) -> OutgoingEmail {
    let names: Vec<String> = attachments
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
        .map(|n| format!("  {}", n))
        .collect();
    OutgoingEmail {
        to: recipients.to_vec(),
        subject: format!("Report '{}' is ready", request.display_name()),
        body: format!("Job {} completed. Attached:\n{}\n", job_id, names.join("\n")),
        attachments,
    }
}

pub fn aborted(job_id: JobId, request: &JobRequest, to: Vec<Recipient>) -> OutgoingEmail {
    OutgoingEmail {
        to,
        subject: format!("Report '{}' was aborted", request.display_name()),
        body: format!(
            "Job {} for report '{}' was aborted before it finished. No further output will be delivered.\n",
            job_id,
            request.display_name()
        ),
        attachments: Vec::new(),
    }
}

/// Full failure detail, operators only
pub fn failure_detail(
    job_id: JobId,
    request: Option<&JobRequest>,
    error: &str,
    job_errors: &str,
    operators: &[Recipient],
) -> OutgoingEmail {
    let (report, user) = match request {
        Some(r) => (r.display_name().to_string(), r.user.clone()),
        None => ("(unparsed request)".to_string(), String::new()),
    };
    OutgoingEmail {
        to: operators.to_vec(),
        subject: format!("Job {} failed: {}", job_id, report),
        body: format!(
            "Job {} for report '{}' (user '{}') failed.\n\nError: {}\n\nAccumulated errors:\n{}\n",
            job_id,
            report,
            user,
            error,
            if job_errors.is_empty() { "(none)" } else { job_errors },
        ),
        attachments: Vec::new(),
    }
}

/// What recipients see when a job fails; never internal detail
pub fn generic_failure(request: &JobRequest, message: &str, recipients: &[Recipient]) -> OutgoingEmail {
    OutgoingEmail {
        to: recipients.to_vec(),
        subject: format!("Report '{}' could not be produced", request.display_name()),
        body: message.to_string(),
        attachments: Vec::new(),
    }
}

pub fn overdue(row: &StatusSnapshot, operators: &[Recipient]) -> OutgoingEmail {
    let (h, m, s) = row.elapsed_hms();
    OutgoingEmail {
        to: operators.to_vec(),
        subject: format!("Job {} is overdue: {}", row.job_id, row.report_name),
        body: format!(
            "Job {} ('{}' for user '{}') has run for {}:{:02}:{:02}, past its declared maximum of {:.2} hour(s).\n\
             Status: {}\nCurrent action: {}\n",
            row.job_id,
            row.report_name,
            row.user,
            h,
            m,
            s,
            row.max_run_time_hours(),
            row.status,
            row.current_action,
        ),
        attachments: Vec::new(),
    }
}
