//! `nullcheck-report.json`
//!
//! CI tooling parses this file, so fields are only ever added. Removing or
//! renaming one bumps `ReportVersion::major`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::diagnostic::{Diagnostic, RuleCategory, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    pub major: u32,
    pub minor: u32,
}

impl ReportVersion {
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 1 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Counts over one `check` or `fix` run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Redundant checks reported
    pub total: usize,

    pub errors: usize,
    pub warnings: usize,
    pub info: usize,

    /// Diagnostics keyed by rule id
    #[serde(default)]
    pub by_rule: BTreeMap<String, usize>,

    /// Number of source files analyzed
    pub files_checked: usize,

    /// Number of files excluded (allowlist or generated code)
    pub files_skipped: usize,

    /// Number of files that could not be read or parsed
    pub files_failed: usize,

    /// Number of rewrites applied (fix runs only)
    pub fixes_applied: usize,
}

/// A file that could not be analyzed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    /// File path relative to project root
    pub file: String,

    /// Why the file was not analyzed
    pub reason: String,
}

/// Result of analyzing a set of C# files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub version: ReportVersion,

    /// RFC 3339, UTC
    pub timestamp: String,

    pub summary: ReportSummary,

    /// In file order, then by position
    pub diagnostics: Vec<Diagnostic>,

    /// Files that failed to load or parse
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FileFailure>,

    /// Settings the run used (nullable context, disabled rules)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<serde_json::Value>,
}

impl Report {
    pub fn new() -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            summary: ReportSummary::default(),
            diagnostics: Vec::new(),
            failures: Vec::new(),
            settings: None,
        }
    }

    pub fn from_diagnostics(diagnostics: Vec<Diagnostic>) -> Self {
        let mut report = Self::new();
        report.extend(diagnostics);
        report
    }

    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        let counter = match diagnostic.severity {
            Severity::Error => &mut self.summary.errors,
            Severity::Warn => &mut self.summary.warnings,
            Severity::Info => &mut self.summary.info,
        };
        *counter += 1;
        *self
            .summary
            .by_rule
            .entry(diagnostic.category.as_str().to_string())
            .or_default() += 1;

        self.summary.total += 1;
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.add_diagnostic(diagnostic);
        }
    }

    /// Record a file that could not be analyzed
    pub fn add_failure(&mut self, file: impl Into<String>, reason: impl Into<String>) {
        self.summary.files_failed += 1;
        self.failures.push(FileFailure {
            file: file.into(),
            reason: reason.into(),
        });
    }

    /// Any diagnostic at `error` severity fails the run
    pub fn has_errors(&self) -> bool {
        self.summary.errors > 0
    }

    pub fn count_by_category(&self, category: RuleCategory) -> usize {
        self.summary.by_rule.get(category.as_str()).copied().unwrap_or(0)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Render as markdown (for CI comments)
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str("# NullCheck Report\n\n");
        md.push_str(&format!("**Generated:** {}\n\n", self.timestamp));
        md.push_str(&format!("**Report Version:** {}\n\n", self.version));

        md.push_str("## Summary\n\n");
        md.push_str("| Metric | Count |\n");
        md.push_str("|--------|-------|\n");
        md.push_str(&format!("| Files checked | {} |\n", self.summary.files_checked));
        md.push_str(&format!("| Files skipped | {} |\n", self.summary.files_skipped));
        md.push_str(&format!("| Files failed | {} |\n", self.summary.files_failed));
        md.push_str(&format!("| Diagnostics | {} |\n", self.summary.total));
        md.push_str(&format!("| Errors | {} |\n", self.summary.errors));
        md.push_str(&format!("| Warnings | {} |\n", self.summary.warnings));
        if self.summary.fixes_applied > 0 {
            md.push_str(&format!("| Fixes applied | {} |\n", self.summary.fixes_applied));
        }
        for (rule, count) in &self.summary.by_rule {
            md.push_str(&format!("| `{}` | {} |\n", rule, count));
        }
        md.push('\n');

        if self.diagnostics.is_empty() && self.failures.is_empty() {
            md.push_str("No redundant null checks found.\n");
            return md;
        }

        if !self.diagnostics.is_empty() {
            md.push_str("## Diagnostics\n\n");
            md.push_str("| Severity | Rule | Location | Message |\n");
            md.push_str("|----------|------|----------|---------|\n");
            for diag in &self.diagnostics {
                let location = diag
                    .location
                    .as_ref()
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| diag.span.to_string());
                md.push_str(&format!(
                    "| {} | `{}` | {} | {} |\n",
                    diag.severity,
                    diag.category,
                    location,
                    diag.message().replace('|', "\\|"),
                ));
            }
            md.push('\n');
        }

        if !self.failures.is_empty() {
            md.push_str("## Failures\n\n");
            for failure in &self.failures {
                md.push_str(&format!("- `{}`: {}\n", failure.file, failure.reason));
            }
        }

        md
    }

    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}
