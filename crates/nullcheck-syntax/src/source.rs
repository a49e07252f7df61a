//! Parsed source files

use crate::line_index::LineIndex;
use crate::parser::{parse, ParseError};
use crate::tree::SyntaxNode;
use nullcheck_core::{Location, TextSpan};
use std::path::{Path, PathBuf};

const GENERATED_SUFFIXES: &[&str] = &[".g.cs", ".g.i.cs", ".designer.cs", ".generated.cs"];

/// A source file with its syntax tree
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
    pub root: SyntaxNode,
    line_index: LineIndex,
}

impl SourceFile {
    pub fn parse(path: impl Into<PathBuf>, text: impl Into<String>) -> Result<Self, ParseError> {
        let path = path.into();
        let text = text.into();
        let root = parse(&text)?;
        let line_index = LineIndex::new(&text);
        tracing::trace!(path = %path.display(), bytes = text.len(), "parsed source file");

        Ok(Self {
            path,
            text,
            root,
            line_index,
        })
    }

    /// Line/column rendering of `span`
    pub fn location(&self, span: TextSpan) -> Location {
        let (line, column) = self.line_index.line_col(span.start);
        let (end_line, end_column) = self.line_index.line_col(span.end);
        Location::new(self.path.display().to_string(), line, column).with_end(end_line, end_column)
    }

    /// Generated code is never analyzed
    pub fn is_generated(&self) -> bool {
        is_generated_path(&self.path) || has_generated_header(&self.text)
    }
}

/// `Foo.g.cs`, `Foo.designer.cs` and friends
pub fn is_generated_path(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name.to_ascii_lowercase(),
        None => return false,
    };
    GENERATED_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// `// <auto-generated>` marker in the comment block at the top of the file
pub fn has_generated_header(text: &str) -> bool {
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !(line.starts_with("//") || line.starts_with("/*") || line.starts_with('*')) {
            return false;
        }
        if line.contains("<auto-generated") {
            return true;
        }
    }
    false
}
