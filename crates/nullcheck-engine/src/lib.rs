//! NullCheck engine - redundant null-check detection and removal
//!
//! This crate implements the analysis on top of `nullcheck-syntax`:
//! - Shape matching for the recognized null-check forms
//! - Classification against a nullability oracle
//! - Rewriting single diagnostics and batch fixing whole files

pub mod classifier;
pub mod fix_all;
pub mod oracle;
pub mod rewriter;
pub mod shapes;

pub use classifier::{Cancelled, Classifier};
pub use fix_all::{fix_all, fix_all_with_config, FixOutcome};
pub use oracle::{FactTable, NullabilityOracle};
pub use rewriter::{RewriteError, Rewriter};
pub use shapes::{match_shape, CheckShape, Polarity};
