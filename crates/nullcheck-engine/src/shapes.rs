//! Recognized null-check shapes
//!
//! Each shape is matched purely syntactically. Whether a match is worth a
//! diagnostic depends on the nullability of its operand, which is the
//! classifier's business.

use nullcheck_core::RuleCategory;
use nullcheck_syntax::{SyntaxKind, SyntaxNode};

/// Statically known outcome of a check on a non-null operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarity {
    /// The test always evaluates to `true`
    AlwaysTrue,

    /// The test always evaluates to `false`
    AlwaysFalse,

    /// Not a boolean test; the operator's null branch is dead
    DeadNullBranch,
}

impl Polarity {
    /// Boolean value of the test, if it is one
    pub fn value(&self) -> Option<bool> {
        match self {
            Self::AlwaysTrue => Some(true),
            Self::AlwaysFalse => Some(false),
            Self::DeadNullBranch => None,
        }
    }
}

/// A matched null check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckShape {
    /// `x == null`, `null != x`
    Equality {
        node: SyntaxNode,
        operand: SyntaxNode,
        negated: bool,
    },

    /// `x is null`
    IsNull { node: SyntaxNode, operand: SyntaxNode },

    /// `x.Equals(null)`
    EqualsNull { node: SyntaxNode, receiver: SyntaxNode },

    /// `ReferenceEquals(x, null)`, `object.ReferenceEquals(null, x)`
    ReferenceEquals { node: SyntaxNode, operand: SyntaxNode },

    /// `x?.Member`, `x?[index]`
    ConditionalAccess {
        node: SyntaxNode,
        receiver: SyntaxNode,
        when_not_null: SyntaxNode,
    },

    /// `x ?? fallback`
    Coalesce {
        node: SyntaxNode,
        left: SyntaxNode,
        fallback: SyntaxNode,
    },

    /// `x ??= value`
    CoalesceAssignment {
        node: SyntaxNode,
        target: SyntaxNode,
        value: SyntaxNode,
    },
}

impl CheckShape {
    /// The whole matched expression
    pub fn node(&self) -> &SyntaxNode {
        match self {
            Self::Equality { node, .. }
            | Self::IsNull { node, .. }
            | Self::EqualsNull { node, .. }
            | Self::ReferenceEquals { node, .. }
            | Self::ConditionalAccess { node, .. }
            | Self::Coalesce { node, .. }
            | Self::CoalesceAssignment { node, .. } => node,
        }
    }

    /// The expression whose nullability decides the check
    pub fn operand(&self) -> &SyntaxNode {
        match self {
            Self::Equality { operand, .. } | Self::IsNull { operand, .. } | Self::ReferenceEquals { operand, .. } => {
                operand
            }
            Self::EqualsNull { receiver, .. } | Self::ConditionalAccess { receiver, .. } => receiver,
            Self::Coalesce { left, .. } => left,
            Self::CoalesceAssignment { target, .. } => target,
        }
    }

    pub fn polarity(&self) -> Polarity {
        match self {
            Self::Equality { negated: true, .. } => Polarity::AlwaysTrue,
            Self::Equality { negated: false, .. }
            | Self::IsNull { .. }
            | Self::EqualsNull { .. }
            | Self::ReferenceEquals { .. } => Polarity::AlwaysFalse,
            Self::ConditionalAccess { .. } | Self::Coalesce { .. } | Self::CoalesceAssignment { .. } => {
                Polarity::DeadNullBranch
            }
        }
    }

    pub fn category(&self) -> RuleCategory {
        match self {
            Self::Equality { .. } | Self::IsNull { .. } | Self::EqualsNull { .. } | Self::ReferenceEquals { .. } => {
                RuleCategory::NullCheck
            }
            Self::ConditionalAccess { .. } => RuleCategory::NullPropagation,
            Self::Coalesce { .. } | Self::CoalesceAssignment { .. } => RuleCategory::NullCoalesce,
        }
    }

    /// Source text of the operand, as reported in diagnostics
    pub fn culprit(&self) -> String {
        self.operand().text()
    }
}

/// Match `node` against every shape; a node matches at most one
pub fn match_shape(node: &SyntaxNode) -> Option<CheckShape> {
    match node.kind() {
        SyntaxKind::BinaryExpression => match_binary(node),
        SyntaxKind::AssignmentExpression => match_coalesce_assignment(node),
        SyntaxKind::IsPatternExpression => match_is_null(node),
        SyntaxKind::InvocationExpression => match_invocation(node),
        SyntaxKind::ConditionalAccessExpression => match_conditional_access(node),
        _ => None,
    }
}

fn is_null_literal(node: &SyntaxNode) -> bool {
    node.kind() == SyntaxKind::NullLiteral
}

/// `[left, operator, right]`
fn binary_parts(node: &SyntaxNode) -> Option<(SyntaxNode, String, SyntaxNode)> {
    let mut operands = node.child_nodes();
    let left = operands.next()?;
    let right = operands.next()?;
    let operator = node.child_tokens().next()?;
    Some((left, operator.text().to_string(), right))
}

fn match_binary(node: &SyntaxNode) -> Option<CheckShape> {
    let (left, operator, right) = binary_parts(node)?;
    match operator.as_str() {
        "==" | "!=" => {
            let operand = match (is_null_literal(&left), is_null_literal(&right)) {
                (false, true) => left,
                (true, false) => right,
                _ => return None,
            };
            Some(CheckShape::Equality {
                node: node.clone(),
                operand,
                negated: operator == "!=",
            })
        }
        "??" => Some(CheckShape::Coalesce {
            node: node.clone(),
            left,
            fallback: right,
        }),
        _ => None,
    }
}

fn match_coalesce_assignment(node: &SyntaxNode) -> Option<CheckShape> {
    let (target, operator, value) = binary_parts(node)?;
    (operator == "??=").then(|| CheckShape::CoalesceAssignment {
        node: node.clone(),
        target,
        value,
    })
}

fn match_is_null(node: &SyntaxNode) -> Option<CheckShape> {
    let mut children = node.child_nodes();
    let operand = children.next()?;
    let pattern = children.next()?;
    if pattern.kind() != SyntaxKind::ConstantPattern {
        return None;
    }
    let constant = pattern.child_nodes().next()?;
    is_null_literal(&constant).then(|| CheckShape::IsNull {
        node: node.clone(),
        operand,
    })
}

/// Argument expressions, or `None` if any argument is named or passed by reference
fn plain_arguments(invocation: &SyntaxNode) -> Option<Vec<SyntaxNode>> {
    let list = invocation.child_of_kind(SyntaxKind::ArgumentList)?;
    list.child_nodes()
        .filter(|n| n.kind() == SyntaxKind::Argument)
        .map(|argument| {
            if argument.child_tokens().next().is_some() {
                return None;
            }
            let mut parts = argument.child_nodes();
            let expression = parts.next()?;
            parts.next().is_none().then_some(expression)
        })
        .collect()
}

/// Trailing simple name of the callee, if it has no type arguments
fn callee_name(callee: &SyntaxNode) -> Option<String> {
    let name = match callee.kind() {
        SyntaxKind::IdentifierName => callee.clone(),
        SyntaxKind::MemberAccessExpression => callee.child_nodes().nth(1)?,
        _ => return None,
    };
    (name.kind() == SyntaxKind::IdentifierName).then(|| name.text())
}

fn match_invocation(node: &SyntaxNode) -> Option<CheckShape> {
    let callee = node.child_nodes().next()?;
    let name = callee_name(&callee)?;
    let arguments = plain_arguments(node)?;

    match (name.as_str(), arguments.as_slice()) {
        ("Equals", [argument]) if callee.kind() == SyntaxKind::MemberAccessExpression => {
            if !is_null_literal(argument) {
                return None;
            }
            let receiver = callee.child_nodes().next()?;
            Some(CheckShape::EqualsNull {
                node: node.clone(),
                receiver,
            })
        }
        ("ReferenceEquals", [first, second]) => {
            let operand = match (is_null_literal(first), is_null_literal(second)) {
                (true, false) => second.clone(),
                (false, true) => first.clone(),
                _ => return None,
            };
            Some(CheckShape::ReferenceEquals {
                node: node.clone(),
                operand,
            })
        }
        _ => None,
    }
}

fn match_conditional_access(node: &SyntaxNode) -> Option<CheckShape> {
    let mut children = node.child_nodes();
    let receiver = children.next()?;
    let when_not_null = children.next()?;
    Some(CheckShape::ConditionalAccess {
        node: node.clone(),
        receiver,
        when_not_null,
    })
}
