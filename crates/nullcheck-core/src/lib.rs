//! NullCheck Core
//!
//! Core domain model with stable, versioned types.
//! Never rename rule identifiers - they are part of the public API.

pub mod diagnostic;
pub mod nullability;
pub mod report;
pub mod config;

pub use diagnostic::{Diagnostic, RuleCategory, Severity, Location, TextSpan};
pub use nullability::{NullabilityFact, NullableContext};
pub use report::{Report, ReportVersion, ReportSummary, FileFailure};
pub use config::{Config, ConfigError, SeverityThreshold, RuleSettings, AllowlistRules};
