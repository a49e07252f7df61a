//! Nullability oracles
//!
//! The classifier never inspects declarations itself. It asks an oracle,
//! which must give the same answer for the same node of the same snapshot.

use nullcheck_core::{NullabilityFact, TextSpan};
use nullcheck_syntax::{DeclaredNullability, SyntaxKind, SyntaxNode};
use std::collections::HashMap;

/// Source of nullability facts for expressions
pub trait NullabilityOracle: Sync {
    fn classify(&self, expression: &SyntaxNode) -> NullabilityFact;
}

impl NullabilityOracle for DeclaredNullability {
    fn classify(&self, expression: &SyntaxNode) -> NullabilityFact {
        self.fact(expression)
    }
}

/// Facts keyed by expression span
///
/// Parentheses are looked through when the span itself has no entry.
#[derive(Debug, Clone, Default)]
pub struct FactTable {
    facts: HashMap<TextSpan, NullabilityFact>,
}

impl FactTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, span: TextSpan, fact: NullabilityFact) {
        self.facts.insert(span, fact);
    }

    pub fn with(mut self, span: TextSpan, fact: NullabilityFact) -> Self {
        self.insert(span, fact);
        self
    }

    /// Assign `fact` to every identifier named `name` in `root`
    pub fn with_identifier(mut self, root: &SyntaxNode, name: &str, fact: NullabilityFact) -> Self {
        for node in root.descendants() {
            if node.kind() == SyntaxKind::IdentifierName && node.text() == name {
                self.insert(node.span(), fact);
            }
        }
        self
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

impl NullabilityOracle for FactTable {
    fn classify(&self, expression: &SyntaxNode) -> NullabilityFact {
        if let Some(fact) = self.facts.get(&expression.span()) {
            return *fact;
        }
        if expression.kind() == SyntaxKind::ParenthesizedExpression {
            if let Some(inner) = expression.child_nodes().next() {
                return self.classify(&inner);
            }
        }
        NullabilityFact::Unknown
    }
}
