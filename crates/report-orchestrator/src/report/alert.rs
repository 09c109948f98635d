//! Stand-in report run when a report class cannot be resolved

use std::path::PathBuf;

use super::{CancellationToken, Report, ReportContext};
use crate::error::Result;

/// Produces no files; tells operators which report class was missing
#[derive(Debug, Clone)]
pub struct StandInAlertReport {
    requested_class: String,
}

impl StandInAlertReport {
    pub fn new(requested_class: impl Into<String>) -> Self {
        Self {
            requested_class: requested_class.into(),
        }
    }

    pub fn requested_class(&self) -> &str {
        &self.requested_class
    }
}

impl Report for StandInAlertReport {
    fn name(&self) -> &str {
        "stand-in-alert"
    }

    fn execute(&mut self, ctx: &mut ReportContext<'_>, _cancel: &CancellationToken) -> Result<()> {
        ctx.set_action(format!("No implementation for '{}'", self.requested_class));

        let request = ctx.request();
        let params = request
            .params
            .iter()
            .map(|p| format!("  {} ({}) = {}", p.name, p.param_type, p.value))
            .collect::<Vec<_>>()
            .join("\n");

        let message = format!(
            "Job {} requested report class '{}' ({}) for user '{}', but no implementation is registered.\n\
             Recipients: {}\nParameters:\n{}",
            ctx.job_id(),
            self.requested_class,
            request.display_name(),
            request.user,
            request.recipient_list(),
            if params.is_empty() { "  (none)".to_string() } else { params },
        );
        ctx.raise_alert(message);
        Ok(())
    }

    fn produced_files(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}
