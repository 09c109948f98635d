//! Typed registry mapping report-class keys to constructors

use std::collections::HashMap;

use super::{Report, SqlExportReport, StandInAlertReport};

type ReportConstructor = Box<dyn Fn() -> Box<dyn Report> + Send + Sync>;

/// Outcome of resolving a report class
pub enum ResolvedReport {
    /// A registered implementation
    Registered(Box<dyn Report>),
    /// Nothing registered under the key; the alert stand-in runs instead
    StandIn(StandInAlertReport),
}

impl ResolvedReport {
    pub fn is_stand_in(&self) -> bool {
        matches!(self, ResolvedReport::StandIn(_))
    }

    pub fn into_report(self) -> Box<dyn Report> {
        match self {
            ResolvedReport::Registered(report) => report,
            ResolvedReport::StandIn(alert) => Box::new(alert),
        }
    }
}

/// Report implementations known to this process, populated at startup
#[derive(Default)]
pub struct ReportFactory {
    constructors: HashMap<String, ReportConstructor>,
}

impl ReportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory with the reports shipped in this crate
    pub fn with_builtin_reports() -> Self {
        let mut factory = Self::new();
        factory.register(SqlExportReport::CLASS, SqlExportReport::new);
        factory
    }

    /// Register a constructor under a report-class key, replacing any previous one
    pub fn register<F, R>(&mut self, key: impl Into<String>, constructor: F)
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: Report + 'static,
    {
        let key = key.into();
        tracing::debug!("Registering report class '{}'", key);
        self.constructors
            .insert(key, Box::new(move || Box::new(constructor()) as Box<dyn Report>));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.constructors.contains_key(key)
    }

    /// Registered keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.constructors.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Build a fresh report for `key`, or the stand-in alert when unknown
    pub fn resolve(&self, key: &str) -> ResolvedReport {
        match self.constructors.get(key.trim()) {
            Some(constructor) => ResolvedReport::Registered(constructor()),
            None => ResolvedReport::StandIn(StandInAlertReport::new(key)),
        }
    }
}
