//! Nullability facts and nullable-context settings

use serde::{Deserialize, Serialize};

/// Static verdict on whether an expression can be null
///
/// Only `NotAnnotated` makes a null check redundant. `Annotated` and
/// `Unknown` must never produce a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullabilityFact {
    /// Declared non-nullable
    NotAnnotated,

    /// Declared nullable (`T?`)
    Annotated,

    /// Cannot determine nullability
    Unknown,
}

impl NullabilityFact {
    /// True only for operands that are provably non-null
    pub fn is_non_null(&self) -> bool {
        matches!(self, Self::NotAnnotated)
    }
}

impl std::fmt::Display for NullabilityFact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnnotated => write!(f, "not-annotated"),
            Self::Annotated => write!(f, "annotated"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Nullable annotation context (`#nullable enable|disable`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullableContext {
    /// Reference types without `?` are non-nullable
    Enable,

    /// Reference types are oblivious
    Disable,
}

impl Default for NullableContext {
    fn default() -> Self {
        Self::Disable
    }
}

impl NullableContext {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enable)
    }
}
