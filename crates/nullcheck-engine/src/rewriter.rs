//! Removal of redundant null checks
//!
//! A rewrite takes a diagnostic produced for some snapshot, finds the
//! checked node again in `root` and returns a new root with the dead check
//! resolved. The input tree is never modified.
//!
//! What happens depends on the shape and on where the check sits:
//!
//! | Shape | Context | Result |
//! |---|---|---|
//! | boolean check | `if` condition | the `if` is removed or replaced by its surviving branch |
//! | boolean check | ternary condition | the ternary is replaced by its surviving branch |
//! | boolean check | anywhere else | the check becomes `true` or `false` |
//! | `x?.m` | | `x.m` |
//! | `x ?? y` | | `x` |
//! | `x ??= y` | expression statement | the statement is removed |
//! | `x ??= y` | nested | `x` |

use crate::shapes::{match_shape, CheckShape};
use nullcheck_core::{Diagnostic, RuleCategory, TextSpan};
use nullcheck_syntax::{
    line_indent, reindent, GreenElement, GreenNode, GreenToken, MutationError, PersistentTree, SyntaxKind,
    SyntaxNode, TokenKind, TreeMutation,
};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RewriteError {
    #[error("no node spans {span}")]
    NodeNotFound { span: TextSpan },

    #[error("node at {span} is no longer a {} site for '{culprit}'", .category.as_str())]
    ShapeMismatch {
        span: TextSpan,
        category: RuleCategory,
        culprit: String,
    },

    #[error("malformed tree: {0}")]
    Malformed(String),

    #[error(transparent)]
    Mutation(#[from] MutationError),
}

/// Applies fixes for diagnostics through a [`TreeMutation`]
#[derive(Debug, Clone, Default)]
pub struct Rewriter<M: TreeMutation = PersistentTree> {
    mutation: M,
}

impl Rewriter<PersistentTree> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<M: TreeMutation> Rewriter<M> {
    pub fn with_mutation(mutation: M) -> Self {
        Self { mutation }
    }

    /// Apply the fix for `diagnostic`, or return `root` unchanged if it cannot be applied
    pub fn rewrite(&self, root: &SyntaxNode, diagnostic: &Diagnostic) -> SyntaxNode {
        match self.try_rewrite(root, diagnostic) {
            Ok(rewritten) => rewritten,
            Err(err @ RewriteError::Malformed(_)) | Err(err @ RewriteError::Mutation(_)) => {
                tracing::warn!(span = %diagnostic.span, error = %err, "rewrite failed");
                root.clone()
            }
            Err(err) => {
                tracing::debug!(span = %diagnostic.span, error = %err, "stale diagnostic skipped");
                root.clone()
            }
        }
    }

    pub fn try_rewrite(&self, root: &SyntaxNode, diagnostic: &Diagnostic) -> Result<SyntaxNode, RewriteError> {
        let shape = locate(root, diagnostic)?;
        match &shape {
            CheckShape::ConditionalAccess {
                node,
                receiver,
                when_not_null,
            } => self.remove_conditional_access(node, receiver, when_not_null),
            CheckShape::Coalesce { node, left, .. } => Ok(self.mutation.replace(node, left.green().clone().into())?),
            CheckShape::CoalesceAssignment { node, target, .. } => self.remove_coalesce_assignment(node, target),
            _ => {
                let value = shape
                    .polarity()
                    .value()
                    .ok_or_else(|| RewriteError::Malformed("boolean check without a value".to_string()))?;
                self.resolve_boolean(shape.node(), value)
            }
        }
    }

    fn resolve_boolean(&self, check: &SyntaxNode, value: bool) -> Result<SyntaxNode, RewriteError> {
        let mut context = check.clone();
        let mut parent = context.parent();
        while let Some(node) = parent.clone().filter(|p| p.kind() == SyntaxKind::ParenthesizedExpression) {
            context = node;
            parent = context.parent();
        }

        if let Some(parent) = parent {
            let is_condition = parent.child_nodes().next().as_ref() == Some(&context);
            match parent.kind() {
                SyntaxKind::IfStatement if is_condition => return self.resolve_if(&parent, value),
                SyntaxKind::ConditionalExpression if is_condition => return self.resolve_ternary(&parent, value),
                _ => {}
            }
        }

        let keyword = if value { "true" } else { "false" };
        let kind = if value {
            SyntaxKind::TrueLiteral
        } else {
            SyntaxKind::FalseLiteral
        };
        let literal = GreenNode::new(
            kind,
            vec![GreenToken::new(TokenKind::Keyword, check.leading_trivia(), keyword).into()],
        );
        Ok(self.mutation.replace(check, literal.into())?)
    }

    fn resolve_if(&self, if_statement: &SyntaxNode, value: bool) -> Result<SyntaxNode, RewriteError> {
        let mut parts = if_statement.child_nodes().skip(1);
        let then_branch = parts
            .next()
            .ok_or_else(|| RewriteError::Malformed("if statement without a body".to_string()))?;
        let else_branch = if_statement
            .child_of_kind(SyntaxKind::ElseClause)
            .and_then(|clause| clause.child_nodes().next());

        let survivor = if value { Some(then_branch) } else { else_branch };
        match survivor {
            Some(branch) => self.replace_statement(if_statement, &branch),
            None => self.remove_statement(if_statement),
        }
    }

    fn resolve_ternary(&self, conditional: &SyntaxNode, value: bool) -> Result<SyntaxNode, RewriteError> {
        let branch = conditional
            .child_nodes()
            .nth(if value { 1 } else { 2 })
            .ok_or_else(|| RewriteError::Malformed("conditional expression without both branches".to_string()))?;
        let replacement = branch.green().with_leading_trivia(conditional.leading_trivia());
        Ok(self.mutation.replace(conditional, replacement.into())?)
    }

    /// Put `branch` where `statement` was
    fn replace_statement(&self, statement: &SyntaxNode, branch: &SyntaxNode) -> Result<SyntaxNode, RewriteError> {
        let in_list = statement.parent().map_or(false, |p| p.kind().is_statement_list());

        if branch.kind() == SyntaxKind::Block && in_list && !declares_locals(branch) {
            let inner: Vec<SyntaxNode> = branch.child_nodes().collect();
            let first = match inner.first() {
                Some(first) => first,
                None => return self.remove_statement(statement),
            };

            let target_indent = line_indent(statement);
            let source_indent = line_indent(first);
            let starts_own_line = first.leading_trivia().contains('\n');
            let hoisted = inner
                .iter()
                .enumerate()
                .map(|(index, node)| {
                    let mut green = if starts_own_line {
                        reindent(node.green(), &source_indent, &target_indent)
                    } else {
                        node.green().as_ref().clone()
                    };
                    if index == 0 {
                        green = green.with_leading_trivia(statement.leading_trivia());
                    }
                    GreenElement::Node(Arc::new(green))
                })
                .collect();
            return Ok(self.mutation.splice_children(statement, hoisted)?);
        }

        let replacement = branch.green().with_leading_trivia(statement.leading_trivia());
        Ok(self.mutation.replace(statement, replacement.into())?)
    }

    /// Delete `statement`, leaving `{ }` where a statement is required
    fn remove_statement(&self, statement: &SyntaxNode) -> Result<SyntaxNode, RewriteError> {
        let parent = statement
            .parent()
            .ok_or_else(|| RewriteError::Malformed("statement without a parent".to_string()))?;

        if parent.kind() == SyntaxKind::ElseClause {
            return Ok(self.mutation.remove(&parent)?);
        }
        if parent.kind().is_statement_list() {
            return self.remove_from_list(&parent, statement);
        }

        let empty = GreenNode::new(
            SyntaxKind::Block,
            vec![
                GreenToken::new(TokenKind::Punctuation, statement.leading_trivia(), "{").into(),
                GreenToken::new(TokenKind::Punctuation, " ", "}").into(),
            ],
        );
        Ok(self.mutation.replace(statement, empty.into())?)
    }

    /// Remove a list element; preprocessor lines in its trivia move to the next element
    fn remove_from_list(&self, list: &SyntaxNode, statement: &SyntaxNode) -> Result<SyntaxNode, RewriteError> {
        let directives = directive_lines(statement.leading_trivia());
        let index = statement.index_in_parent();
        let next = list.green().children().get(index + 1).cloned();

        match (directives.is_empty(), next) {
            (false, Some(next)) => {
                let carried = next.with_leading_trivia(&format!("{}{}", directives, next.leading_trivia()));
                let rebuilt = list.green().splice_child(index + 1, vec![carried]).splice_child(index, Vec::new());
                Ok(self.mutation.replace(list, Arc::new(rebuilt).into())?)
            }
            _ => Ok(self.mutation.remove(statement)?),
        }
    }

    fn remove_coalesce_assignment(&self, assignment: &SyntaxNode, target: &SyntaxNode) -> Result<SyntaxNode, RewriteError> {
        let parent = assignment
            .parent()
            .ok_or_else(|| RewriteError::Malformed("assignment without a parent".to_string()))?;

        match parent.kind() {
            SyntaxKind::ExpressionStatement => self.remove_statement(&parent),
            SyntaxKind::ForStatement => {
                // for-loop header: drop the expression together with one separator
                let children = parent.green().children();
                let index = assignment.index_in_parent();
                let is_comma = |i: usize| matches!(children.get(i), Some(GreenElement::Token(t)) if t.is_punct(","));
                let rebuilt = if is_comma(index + 1) {
                    parent.green().splice_child(index + 1, Vec::new()).splice_child(index, Vec::new())
                } else if index > 0 && is_comma(index - 1) {
                    parent.green().splice_child(index, Vec::new()).splice_child(index - 1, Vec::new())
                } else {
                    parent.green().splice_child(index, Vec::new())
                };
                Ok(self.mutation.replace(&parent, Arc::new(rebuilt).into())?)
            }
            _ => Ok(self.mutation.replace(assignment, target.green().clone().into())?),
        }
    }

    /// `x?.a.b` becomes `x.a.b`; only the first `?` of the chain goes
    fn remove_conditional_access(
        &self,
        access: &SyntaxNode,
        receiver: &SyntaxNode,
        when_not_null: &SyntaxNode,
    ) -> Result<SyntaxNode, RewriteError> {
        let question = access
            .child_token("?")
            .ok_or_else(|| RewriteError::Malformed("conditional access without '?'".to_string()))?;
        let receiver = GreenElement::Node(receiver.green().clone());
        let rebuilt = bind_receiver(when_not_null.green(), receiver, question.leading_trivia())
            .ok_or_else(|| RewriteError::Malformed("conditional access without a binding".to_string()))?;
        Ok(self.mutation.replace(access, Arc::new(rebuilt).into())?)
    }
}

/// Re-derive the shape a diagnostic was reported for
fn locate(root: &SyntaxNode, diagnostic: &Diagnostic) -> Result<CheckShape, RewriteError> {
    let candidates = root.covering_nodes(diagnostic.span);
    if candidates.is_empty() {
        return Err(RewriteError::NodeNotFound { span: diagnostic.span });
    }
    candidates
        .iter()
        .filter_map(match_shape)
        .find(|shape| shape.category() == diagnostic.category && shape.culprit() == diagnostic.culprit)
        .ok_or_else(|| RewriteError::ShapeMismatch {
            span: diagnostic.span,
            category: diagnostic.category,
            culprit: diagnostic.culprit.clone(),
        })
}

/// Replace the leftmost member or element binding below `green` by an
/// ordinary access on `receiver`
fn bind_receiver(green: &GreenNode, receiver: GreenElement, question_trivia: &str) -> Option<GreenNode> {
    let children = green.children();
    match green.kind() {
        SyntaxKind::MemberBindingExpression => {
            let dot = children.first()?;
            let dot = dot.with_leading_trivia(&format!("{}{}", question_trivia, dot.leading_trivia()));
            let mut parts = vec![receiver, dot];
            parts.extend(children.iter().skip(1).cloned());
            Some(GreenNode::new(SyntaxKind::MemberAccessExpression, parts))
        }
        SyntaxKind::ElementBindingExpression => {
            let arguments = children.first()?;
            let arguments = arguments.with_leading_trivia(&format!("{}{}", question_trivia, arguments.leading_trivia()));
            Some(GreenNode::new(SyntaxKind::ElementAccessExpression, vec![receiver, arguments]))
        }
        _ => {
            let first = children.first()?.as_node()?;
            let bound = bind_receiver(first, receiver, question_trivia)?;
            Some(green.splice_child(0, vec![GreenElement::Node(Arc::new(bound))]))
        }
    }
}

/// Whether splicing `block` into its parent could clash with outer names
fn declares_locals(block: &SyntaxNode) -> bool {
    block.child_nodes().any(|statement| match statement.kind() {
        SyntaxKind::LocalDeclarationStatement | SyntaxKind::LocalFunctionStatement => true,
        SyntaxKind::ExpressionStatement | SyntaxKind::ReturnStatement | SyntaxKind::ThrowStatement => statement
            .descendants()
            .any(|n| matches!(n.kind(), SyntaxKind::DeclarationExpression | SyntaxKind::DeclarationPattern | SyntaxKind::VarPattern)),
        _ => false,
    })
}

/// Preprocessor lines of `trivia`, each prefixed with a newline
fn directive_lines(trivia: &str) -> String {
    trivia
        .lines()
        .filter(|line| line.trim_start().starts_with('#'))
        .map(|line| format!("\n{}", line))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classifier;
    use crate::oracle::FactTable;
    use nullcheck_core::NullabilityFact;
    use nullcheck_syntax::parse;
    use pretty_assertions::assert_eq;

    /// Classify with `a` non-null and apply the first fix
    fn fix_first(source: &str) -> String {
        let root = parse(source).unwrap();
        let facts = FactTable::new().with_identifier(&root, "a", NullabilityFact::NotAnnotated);
        let diagnostics = Classifier::new(&facts).classify(&root);
        let first = diagnostics.first().expect("no diagnostic");
        Rewriter::new().try_rewrite(&root, first).unwrap().full_text()
    }

    #[test]
    fn literal_substitution_without_folding() {
        assert_eq!(fix_first("var x = b && a != null;"), "var x = b && true;");
        assert_eq!(fix_first("Use(a.Equals(null));"), "Use(false);");
        assert_eq!(fix_first("Use(ReferenceEquals(null, a) || b);"), "Use(false || b);");
    }

    #[test]
    fn if_without_else() {
        assert_eq!(fix_first("f();\nif (a == null) { g(); }\nh();\n"), "f();\nh();\n");
        assert_eq!(fix_first("if (a != null) g();\nh();\n"), "g();\nh();\n");
        assert_eq!(fix_first("if ((a is null)) return;\nh();\n"), "\nh();\n");
    }

    #[test]
    fn if_with_else() {
        let source = "f();\nif (a == null)\n{\n    g();\n}\nelse\n{\n    h();\n    i();\n}\n";
        assert_eq!(fix_first(source), "f();\nh();\ni();\n");

        let source = "f();\nif (a != null)\n{\n    g();\n}\nelse\n{\n    h();\n}\n";
        assert_eq!(fix_first(source), "f();\ng();\n");
    }

    #[test]
    fn else_if_chain_hoists_nested_if() {
        let source = "if (a == null) f(); else if (b) g(); else h();\n";
        assert_eq!(fix_first(source), "if (b) g(); else h();\n");
    }

    #[test]
    fn nested_if_without_else_leaves_empty_block() {
        let source = "while (b) if (a == null) f();\n";
        assert_eq!(fix_first(source), "while (b) { }\n");

        let source = "if (b) f(); else if (a == null) g();\n";
        assert_eq!(fix_first(source), "if (b) f();\n");
    }

    #[test]
    fn block_declaring_locals_stays_nested() {
        let source = "if (a != null)\n{\n    var n = 1;\n    f(n);\n}\n";
        assert_eq!(fix_first(source), "{\n    var n = 1;\n    f(n);\n}\n");
    }

    #[test]
    fn directives_survive_statement_removal() {
        let source = "f();\n#nullable enable\nif (a == null) g();\nh();\n";
        assert_eq!(fix_first(source), "f();\n#nullable enable\nh();\n");
    }

    #[test]
    fn ternary_keeps_surviving_branch() {
        assert_eq!(fix_first("var c = a != null ? 4 : 3;"), "var c = 4;");
        assert_eq!(fix_first("var c = (a == null) ? 4 : 3;"), "var c = 3;");
        assert_eq!(fix_first("var c = a != null && b ? 4 : 3;"), "var c = true && b ? 4 : 3;");
    }

    #[test]
    fn coalescing() {
        assert_eq!(fix_first("var c = a ?? b;"), "var c = a;");
        assert_eq!(fix_first("f();\na ??= b;\ng();"), "f();\ng();");
        assert_eq!(fix_first("var c = (a ??= b);"), "var c = (a);");
        assert_eq!(fix_first("for (var i = 0; i < 3; i++, a ??= b) { }"), "for (var i = 0; i < 3; i++) { }");
    }

    #[test]
    fn conditional_access_keeps_the_chain() {
        assert_eq!(fix_first("var l = a?.Length;"), "var l = a.Length;");
        assert_eq!(fix_first("var l = a?.Substring(0).Length;"), "var l = a.Substring(0).Length;");
        assert_eq!(fix_first("var l = a?.b?.c;"), "var l = a.b?.c;");
        assert_eq!(fix_first("var l = a?[0];"), "var l = a[0];");
        assert_eq!(fix_first("var l = a\n    ?.Trim();"), "var l = a\n    .Trim();");
    }

    #[test]
    fn interpolation_holes_are_rewritten() {
        assert_eq!(fix_first("var s = $\"{a?.Length}\";"), "var s = $\"{a.Length}\";");
        assert_eq!(fix_first("var s = $\"n={a ?? b}!\";"), "var s = $\"n={a}!\";");
    }

    #[test]
    fn labeled_statements_keep_an_empty_block() {
        assert_eq!(
            fix_first("class C { void M() { label: if (a == null) f(); goto label; } }"),
            "class C { void M() { label: { } goto label; } }"
        );
        assert_eq!(
            fix_first("class C { void M() { next: a ??= b; goto next; } }"),
            "class C { void M() { next: { } goto next; } }"
        );
    }

    #[test]
    fn stale_diagnostics_are_no_ops() {
        let root = parse("var x = a == null;").unwrap();
        let rewriter = Rewriter::new();

        let moved = Diagnostic::new(RuleCategory::NullCheck, TextSpan::new(0, 3), "a");
        assert!(matches!(rewriter.try_rewrite(&root, &moved), Err(RewriteError::ShapeMismatch { .. })));
        assert_eq!(rewriter.rewrite(&root, &moved).full_text(), root.full_text());

        let nowhere = Diagnostic::new(RuleCategory::NullCheck, TextSpan::new(9, 11), "a");
        assert_eq!(
            rewriter.try_rewrite(&root, &nowhere),
            Err(RewriteError::NodeNotFound { span: TextSpan::new(9, 11) })
        );

        let renamed = Diagnostic::new(RuleCategory::NullCheck, TextSpan::new(8, 17), "b");
        assert!(matches!(rewriter.try_rewrite(&root, &renamed), Err(RewriteError::ShapeMismatch { .. })));
    }

    /// Refuses every edit
    struct ReadOnly;

    impl TreeMutation for ReadOnly {
        fn splice_children(&self, _: &SyntaxNode, _: Vec<GreenElement>) -> Result<SyntaxNode, MutationError> {
            Err(MutationError::InvalidRootReplacement)
        }
    }

    #[test]
    fn mutation_failures_leave_the_tree_untouched() {
        let root = parse("var x = a ?? b;").unwrap();
        let facts = FactTable::new().with_identifier(&root, "a", NullabilityFact::NotAnnotated);
        let diagnostic = Classifier::new(&facts).classify(&root).remove(0);

        let rewriter = Rewriter::with_mutation(ReadOnly);
        assert!(matches!(rewriter.try_rewrite(&root, &diagnostic), Err(RewriteError::Mutation(_))));
        assert_eq!(rewriter.rewrite(&root, &diagnostic).full_text(), "var x = a ?? b;");
    }
}
