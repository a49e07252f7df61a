//! Pure tree edits
//!
//! Every operation returns a new root. Only the green nodes on the path from
//! the edited node to the root are rebuilt; all other subtrees are shared
//! with the previous snapshot.

use crate::tree::{GreenElement, GreenNode, SyntaxNode};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    #[error("cannot remove the root node")]
    RemoveRoot,

    #[error("the root can only be replaced by exactly one node")]
    InvalidRootReplacement,
}

/// Edit primitives the rewriter is written against
pub trait TreeMutation {
    /// Replace `target` with `replacement`
    fn replace(&self, target: &SyntaxNode, replacement: GreenElement) -> Result<SyntaxNode, MutationError> {
        self.splice_children(target, vec![replacement])
    }

    /// Remove `target` from its parent
    fn remove(&self, target: &SyntaxNode) -> Result<SyntaxNode, MutationError> {
        if target.parent().is_none() {
            return Err(MutationError::RemoveRoot);
        }
        self.splice_children(target, Vec::new())
    }

    /// Replace `target` by a run of sibling elements (possibly empty)
    fn splice_children(&self, target: &SyntaxNode, children: Vec<GreenElement>) -> Result<SyntaxNode, MutationError>;
}

/// Path-copying implementation over the green tree
#[derive(Debug, Clone, Copy, Default)]
pub struct PersistentTree;

impl TreeMutation for PersistentTree {
    fn splice_children(&self, target: &SyntaxNode, children: Vec<GreenElement>) -> Result<SyntaxNode, MutationError> {
        let parent = match target.parent() {
            Some(parent) => parent,
            None => {
                return match children.as_slice() {
                    [GreenElement::Node(green)] => Ok(SyntaxNode::new_root(green.clone())),
                    _ => Err(MutationError::InvalidRootReplacement),
                };
            }
        };

        let mut green = parent.green().splice_child(target.index_in_parent(), children);
        let mut current = parent;
        while let Some(parent) = current.parent() {
            let child = GreenElement::Node(Arc::new(green));
            green = parent.green().splice_child(current.index_in_parent(), vec![child]);
            current = parent;
        }
        Ok(SyntaxNode::new_root(Arc::new(green)))
    }
}

/// Indentation of the line `node` starts on, taken from its leading trivia
pub fn line_indent(node: &SyntaxNode) -> String {
    let trivia = node.leading_trivia();
    let last_line = trivia.rsplit('\n').next().unwrap_or("");
    last_line
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect()
}

/// Re-indent every line break inside `green` from `from` to `to`
///
/// Lines that do not start with `from` are left alone.
pub fn reindent(green: &GreenNode, from: &str, to: &str) -> GreenNode {
    if from == to {
        return green.clone();
    }
    green.map_trivia(&|trivia: &str| {
        let mut lines = trivia.split('\n');
        let mut out = lines.next().unwrap_or("").to_string();
        for line in lines {
            out.push('\n');
            match line.strip_prefix(from) {
                Some(rest) => {
                    out.push_str(to);
                    out.push_str(rest);
                }
                None => out.push_str(line),
            }
        }
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::tree::{GreenToken, SyntaxKind, TokenKind};
    use pretty_assertions::assert_eq;

    fn find(root: &SyntaxNode, kind: SyntaxKind) -> SyntaxNode {
        root.descendants().find(|n| n.kind() == kind).unwrap()
    }

    #[test]
    fn replace_rebuilds_path_only() {
        let root = parse("int a = 1;\nint b = x;\n").unwrap();
        let target = root
            .descendants()
            .find(|n| n.kind() == SyntaxKind::IdentifierName)
            .unwrap();
        let literal = GreenNode::new(
            SyntaxKind::NumericLiteral,
            vec![GreenToken::new(TokenKind::NumericLiteral, " ", "2").into()],
        );

        let updated = PersistentTree.replace(&target, literal.into()).unwrap();
        assert_eq!(updated.full_text(), "int a = 1;\nint b = 2;\n");

        // first statement is untouched and shared
        let before = root.child_nodes().next().unwrap();
        let after = updated.child_nodes().next().unwrap();
        assert!(Arc::ptr_eq(before.green(), after.green()));
        // the original snapshot is unchanged
        assert_eq!(root.full_text(), "int a = 1;\nint b = x;\n");
    }

    #[test]
    fn remove_and_splice() {
        let root = parse("a();\n{\n    b();\n    c();\n}\n").unwrap();
        let first = root.child_nodes().next().unwrap();
        let removed = PersistentTree.remove(&first).unwrap();
        assert_eq!(removed.full_text(), "\n{\n    b();\n    c();\n}\n");

        let block = find(&root, SyntaxKind::Block);
        let statements: Vec<GreenElement> = block
            .child_nodes()
            .map(|n| GreenElement::Node(n.green().clone()))
            .collect();
        let spliced = PersistentTree.splice_children(&block, statements).unwrap();
        assert_eq!(spliced.full_text(), "a();\n    b();\n    c();\n");
    }

    #[test]
    fn root_edits() {
        let root = parse("a();").unwrap();
        assert_eq!(PersistentTree.remove(&root), Err(MutationError::RemoveRoot));
        let replaced = PersistentTree
            .replace(&root, GreenElement::Node(root.green().clone()))
            .unwrap();
        assert_eq!(replaced.full_text(), "a();");
    }

    #[test]
    fn reindent_shifts_nested_lines() {
        let root = parse("if (x)\n{\n    a();\n    b();\n}\n").unwrap();
        let block = find(&root, SyntaxKind::Block);
        assert_eq!(line_indent(&block.child_nodes().next().unwrap()), "    ");

        let moved = reindent(block.green(), "    ", "");
        assert_eq!(moved.full_text(), "\n{\na();\nb();\n}");
    }
}
