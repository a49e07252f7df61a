//! Batch fixing
//!
//! Every applied fix shifts positions, so diagnostics are recomputed on the
//! new snapshot after each step instead of being replayed.

use crate::classifier::Classifier;
use crate::oracle::NullabilityOracle;
use crate::rewriter::Rewriter;
use nullcheck_core::{Config, Diagnostic, RuleCategory, TextSpan};
use nullcheck_syntax::SyntaxNode;
use std::collections::HashSet;

/// Result of fixing one tree
#[derive(Debug, Clone)]
pub struct FixOutcome {
    pub root: SyntaxNode,

    /// Diagnostics that were fixed, in application order
    pub applied: Vec<Diagnostic>,

    /// Diagnostics still present in `root`
    pub skipped: Vec<Diagnostic>,

    /// Fix attempts made
    pub iterations: usize,
}

impl FixOutcome {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Fix every redundant check in `root` with default settings
///
/// `oracle_factory` is called once per snapshot.
pub fn fix_all<O, F>(root: SyntaxNode, oracle_factory: F) -> FixOutcome
where
    O: NullabilityOracle,
    F: FnMut(&SyntaxNode) -> O,
{
    fix_all_with_config(root, oracle_factory, &Config::default())
}

pub fn fix_all_with_config<O, F>(root: SyntaxNode, mut oracle_factory: F, config: &Config) -> FixOutcome
where
    O: NullabilityOracle,
    F: FnMut(&SyntaxNode) -> O,
{
    let rewriter = Rewriter::new();
    let mut root = root;
    let mut applied = Vec::new();
    // no-op fixes for the current snapshot
    let mut stale: HashSet<(TextSpan, RuleCategory, String)> = HashSet::new();
    let mut iterations = 0;

    let skipped = loop {
        let oracle = oracle_factory(&root);
        let diagnostics = Classifier::new(&oracle).with_config(config).classify(&root);

        if iterations >= config.max_fix_iterations {
            tracing::warn!(
                limit = config.max_fix_iterations,
                remaining = diagnostics.len(),
                "fix iteration limit reached"
            );
            break diagnostics;
        }

        let next = diagnostics
            .iter()
            .find(|d| !stale.contains(&(d.span, d.category, d.culprit.clone())))
            .cloned();
        let diagnostic = match next {
            Some(diagnostic) => diagnostic,
            None => break diagnostics,
        };
        iterations += 1;

        match rewriter.try_rewrite(&root, &diagnostic) {
            Ok(rewritten) if rewritten.full_text() != root.full_text() => {
                tracing::debug!(rule = diagnostic.category.as_str(), span = %diagnostic.span, "fix applied");
                root = rewritten;
                applied.push(diagnostic);
                stale.clear();
            }
            Ok(_) => {
                tracing::debug!(span = %diagnostic.span, "fix left the tree unchanged");
                stale.insert((diagnostic.span, diagnostic.category, diagnostic.culprit));
            }
            Err(err) => {
                tracing::debug!(span = %diagnostic.span, error = %err, "fix skipped");
                stale.insert((diagnostic.span, diagnostic.category, diagnostic.culprit));
            }
        }
    };

    tracing::info!(applied = applied.len(), skipped = skipped.len(), iterations, "batch fix finished");
    FixOutcome {
        root,
        applied,
        skipped,
        iterations,
    }
}
