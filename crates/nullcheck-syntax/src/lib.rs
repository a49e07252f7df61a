//! NullCheck Syntax
//!
//! Lossless C# syntax trees, a declaration binder that answers nullability
//! questions, and persistent tree edits.

pub mod binder;
pub mod line_index;
pub mod mutation;
pub mod parser;
pub mod source;
pub mod tree;

pub use binder::DeclaredNullability;
pub use line_index::LineIndex;
pub use mutation::{line_indent, reindent, MutationError, PersistentTree, TreeMutation};
pub use parser::{parse, ParseError};
pub use source::SourceFile;
pub use tree::{GreenElement, GreenNode, GreenToken, SyntaxElement, SyntaxKind, SyntaxNode, SyntaxToken, TokenKind};
