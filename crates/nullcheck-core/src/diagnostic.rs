//! Rule categories and diagnostic reporting
//!
//! IMPORTANT: Rule identifiers are stable.
//! NEVER rename or remove them - hosts use them for filtering and suppression.
//! Add new categories with new names only.

use serde::{Deserialize, Serialize};

/// Rule category registry
///
/// These identifiers are STABLE.
/// Do NOT rename or remove categories - only add new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RuleCategory {
    /// `x == null`, `x != null`, `x is null`, `x.Equals(null)`, `ReferenceEquals(x, null)`
    #[serde(rename = "REDUNDANT_NULL_CHECK")]
    NullCheck,

    /// `x ?? fallback`, `x ??= value`
    #[serde(rename = "REDUNDANT_NULL_COALESCE")]
    NullCoalesce,

    /// `x?.Member`, `x?[index]`
    #[serde(rename = "REDUNDANT_NULL_PROPAGATION")]
    NullPropagation,
}

impl RuleCategory {
    /// Every category, in identifier order
    pub const ALL: [RuleCategory; 3] = [
        RuleCategory::NullCheck,
        RuleCategory::NullCoalesce,
        RuleCategory::NullPropagation,
    ];

    /// Get the rule as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NullCheck => "REDUNDANT_NULL_CHECK",
            Self::NullCoalesce => "REDUNDANT_NULL_COALESCE",
            Self::NullPropagation => "REDUNDANT_NULL_PROPAGATION",
        }
    }

    /// Look a category up by its identifier (case-insensitive)
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(id.trim()))
    }

    /// Short title used in listings
    pub fn title(&self) -> &'static str {
        match self {
            Self::NullCheck => "Redundant null check",
            Self::NullCoalesce => "Redundant null-coalescing operator",
            Self::NullPropagation => "Redundant null-conditional operator",
        }
    }

    /// Longer description of what the rule reports
    pub fn description(&self) -> &'static str {
        match self {
            Self::NullCheck => {
                "The value is declared non-nullable, so comparing it with null always yields the same result"
            }
            Self::NullCoalesce => {
                "The left operand is declared non-nullable, so the fallback value is never used"
            }
            Self::NullPropagation => {
                "The receiver is declared non-nullable, so the null-conditional access never short-circuits"
            }
        }
    }

    /// Severity used when the configuration has no override
    pub fn default_severity(&self) -> Severity {
        Severity::Warn
    }

    /// Render the one-argument message template with the culprit text
    pub fn message(&self, culprit: &str) -> String {
        match self {
            Self::NullCheck => format!("'{}' is never null; the null check is redundant", culprit),
            Self::NullCoalesce => {
                format!("'{}' is never null; the null-coalescing fallback is dead code", culprit)
            }
            Self::NullPropagation => {
                format!("'{}' is never null; use '.' instead of '?.'", culprit)
            }
        }
    }
}

impl std::fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a rule is reported; `error` fails `nullcheck check`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Half-open byte range `[start, end)` in a source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
}

impl TextSpan {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {} after end {}", start, end);
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True if `other` lies entirely inside this span
    pub fn contains_span(&self, other: TextSpan) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// True if the two spans share at least one byte
    pub fn overlaps(&self, other: TextSpan) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl std::fmt::Display for TextSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// 1-indexed line/column range of a diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Path as the file was discovered
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl Location {
    /// An empty range at `line:column`
    pub fn new(file: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
            end_line: line,
            end_column: column,
        }
    }

    pub fn with_end(mut self, end_line: usize, end_column: usize) -> Self {
        self.end_line = end_line;
        self.end_column = end_column;
        self
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// One redundant null-check occurrence
///
/// Diagnostics are plain values: one per matched, eligible site, never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable rule category
    pub category: RuleCategory,

    pub severity: Severity,

    /// Span of the whole matched expression
    pub span: TextSpan,

    /// Source text of the checked operand
    pub culprit: String,

    /// File/line rendering of the span (filled in by the host)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Diagnostic {
    /// Create a diagnostic with the category's default severity
    pub fn new(category: RuleCategory, span: TextSpan, culprit: impl Into<String>) -> Self {
        Self {
            category,
            severity: category.default_severity(),
            span,
            culprit: culprit.into(),
            location: None,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Human-readable message
    pub fn message(&self) -> String {
        self.category.message(&self.culprit)
    }
}
