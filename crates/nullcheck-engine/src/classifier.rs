//! Redundant null-check classification
//!
//! A read-only pass over one tree snapshot. Every node is matched against
//! the known shapes; a match whose operand the oracle reports as
//! `NotAnnotated` becomes one diagnostic.

use crate::oracle::NullabilityOracle;
use crate::shapes::{match_shape, CheckShape};
use nullcheck_core::{Config, Diagnostic, RuleSettings, SeverityThreshold};
use nullcheck_syntax::SyntaxNode;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("classification was cancelled")]
pub struct Cancelled;

/// Finds redundant null checks using a nullability oracle
pub struct Classifier<'a> {
    oracle: &'a dyn NullabilityOracle,
    severity: SeverityThreshold,
    rules: RuleSettings,
}

impl<'a> Classifier<'a> {
    pub fn new(oracle: &'a dyn NullabilityOracle) -> Self {
        Self {
            oracle,
            severity: SeverityThreshold::default(),
            rules: RuleSettings::default(),
        }
    }

    /// Apply severity overrides and disabled rules from `config`
    pub fn with_config(mut self, config: &Config) -> Self {
        self.severity = config.severity.clone();
        self.rules = config.rules.clone();
        self
    }

    /// Diagnostic for `node`, if it is an eligible redundant check
    pub fn check(&self, node: &SyntaxNode) -> Option<Diagnostic> {
        let shape = match_shape(node)?;
        self.diagnose(&shape)
    }

    fn diagnose(&self, shape: &CheckShape) -> Option<Diagnostic> {
        let category = shape.category();
        if !self.rules.is_enabled(category) {
            return None;
        }

        let fact = self.oracle.classify(shape.operand());
        if !fact.is_non_null() {
            tracing::trace!(operand = %shape.operand(), %fact, "operand may be null");
            return None;
        }

        let diagnostic = Diagnostic::new(category, shape.node().span(), shape.culprit())
            .with_severity(self.severity.get_severity(category));
        tracing::debug!(
            rule = category.as_str(),
            span = %diagnostic.span,
            culprit = %diagnostic.culprit,
            "redundant null check"
        );
        Some(diagnostic)
    }

    /// Walk the whole tree; output is sorted by position
    pub fn classify(&self, root: &SyntaxNode) -> Vec<Diagnostic> {
        let diagnostics = root.descendants().filter_map(|node| self.check(&node)).collect();
        finish(diagnostics)
    }

    /// Same result as [`Classifier::classify`], computed on the rayon pool
    pub fn classify_parallel(&self, root: &SyntaxNode) -> Vec<Diagnostic> {
        let nodes: Vec<SyntaxNode> = root.descendants().collect();
        let diagnostics = nodes.par_iter().filter_map(|node| self.check(node)).collect();
        finish(diagnostics)
    }

    /// Like [`Classifier::classify`], checking `cancel` between nodes
    pub fn classify_cancellable(&self, root: &SyntaxNode, cancel: &AtomicBool) -> Result<Vec<Diagnostic>, Cancelled> {
        let mut diagnostics = Vec::new();
        for node in root.descendants() {
            if cancel.load(Ordering::Relaxed) {
                tracing::debug!(found = diagnostics.len(), "classification cancelled");
                return Err(Cancelled);
            }
            diagnostics.extend(self.check(&node));
        }
        Ok(finish(diagnostics))
    }
}

fn finish(mut diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
    diagnostics.sort_by_key(|d| (d.span.start, d.category, d.span.end));
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::FactTable;
    use nullcheck_core::{NullabilityFact, RuleCategory, Severity};
    use nullcheck_syntax::parse;

    const SOURCE: &str = "var x = a == null;\nvar y = b ?? c;\nvar z = a?.Length;\n";

    fn oracle(root: &SyntaxNode) -> FactTable {
        FactTable::new()
            .with_identifier(root, "a", NullabilityFact::NotAnnotated)
            .with_identifier(root, "b", NullabilityFact::NotAnnotated)
    }

    #[test]
    fn flags_non_null_operands_in_order() {
        let root = parse(SOURCE).unwrap();
        let facts = oracle(&root);
        let diagnostics = Classifier::new(&facts).classify(&root);

        let summary: Vec<(RuleCategory, &str)> = diagnostics
            .iter()
            .map(|d| (d.category, d.culprit.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (RuleCategory::NullCheck, "a"),
                (RuleCategory::NullCoalesce, "b"),
                (RuleCategory::NullPropagation, "a"),
            ]
        );
        assert_eq!(&SOURCE[diagnostics[0].span.start..diagnostics[0].span.end], "a == null");
        assert_eq!(&SOURCE[diagnostics[2].span.start..diagnostics[2].span.end], "a?.Length");
    }

    #[test]
    fn nullable_and_unknown_are_never_flagged() {
        let root = parse(SOURCE).unwrap();
        let facts = FactTable::new()
            .with_identifier(&root, "a", NullabilityFact::Annotated)
            .with_identifier(&root, "b", NullabilityFact::Unknown);
        assert!(Classifier::new(&facts).classify(&root).is_empty());
    }

    #[test]
    fn classification_is_repeatable_and_parallel_agrees() {
        let root = parse(SOURCE).unwrap();
        let facts = oracle(&root);
        let classifier = Classifier::new(&facts);

        let first = classifier.classify(&root);
        assert_eq!(first, classifier.classify(&root));
        assert_eq!(first, classifier.classify_parallel(&root));
    }

    #[test]
    fn config_overrides_severity_and_disables_rules() {
        let root = parse(SOURCE).unwrap();
        let facts = oracle(&root);
        let mut config = Config::default();
        config.severity.set_override(RuleCategory::NullCheck, Severity::Error);
        config.rules.disabled.push("REDUNDANT_NULL_PROPAGATION".to_string());

        let diagnostics = Classifier::new(&facts).with_config(&config).classify(&root);
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].severity, Severity::Error);
        assert_eq!(diagnostics[1].severity, Severity::Warn);
        assert!(diagnostics.iter().all(|d| d.category != RuleCategory::NullPropagation));
    }

    #[test]
    fn cancellation_stops_the_walk() {
        let root = parse(SOURCE).unwrap();
        let facts = oracle(&root);
        let classifier = Classifier::new(&facts);

        let cancel = AtomicBool::new(true);
        assert_eq!(classifier.classify_cancellable(&root, &cancel), Err(Cancelled));

        cancel.store(false, Ordering::Relaxed);
        assert_eq!(classifier.classify_cancellable(&root, &cancel).unwrap().len(), 3);
    }
}
