//! Node status: failure counters and diagnostic reports.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification of a diagnostic report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    /// Irrecoverable hardware fault. Short-circuits the recycle decision.
    HardFail,
    /// Recoverable fault.
    SoftFail,
    Unspecified,
}

/// A diagnostic signal attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub report_type: ReportType,
    pub created_at: DateTime<Utc>,
    pub detail: String,
}

impl Report {
    pub fn new(
        id: impl Into<String>,
        report_type: ReportType,
        created_at: DateTime<Utc>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            report_type,
            created_at,
            detail: detail.into(),
        }
    }
}

/// The reports on a node, keyed by report id. Adding a report with an
/// existing id replaces it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reports(BTreeMap<String, Report>);

impl Reports {
    pub fn with_report(mut self, report: Report) -> Self {
        self.0.insert(report.id.clone(), report);
        self
    }

    pub fn get(&self, id: &str) -> Option<&Report> {
        self.0.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Report> {
        self.0.values()
    }

    pub fn has_hard_fail(&self) -> bool {
        self.iter()
            .any(|report| report.report_type == ReportType::HardFail)
    }
}

/// Operational status of a node. An immutable snapshot, replaced wholly on
/// each store write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub fail_count: u32,
    pub reports: Reports,
}

impl Status {
    pub fn with_fail_count(self, fail_count: u32) -> Self {
        Self { fail_count, ..self }
    }

    pub fn with_increased_fail_count(self) -> Self {
        Self {
            fail_count: self.fail_count + 1,
            ..self
        }
    }

    pub fn with_report(self, report: Report) -> Self {
        Self {
            reports: self.reports.with_report(report),
            ..self
        }
    }
}
