//! C# parsing
//!
//! tree-sitter-c-sharp recognizes the grammar; this module converts its
//! concrete syntax tree into the lossless green tree the rest of the crate
//! works on. Tokens are emitted in source order and each one takes the text
//! since the previous token as leading trivia, so comments and preprocessor
//! directives end up in trivia and the tree reproduces the source byte for
//! byte.
//!
//! Grammar nodes are mapped onto [`SyntaxKind`]s with Roslyn's child layout
//! (conditional access chains, `else` clauses, initializer clauses). A
//! construct without a dedicated kind becomes [`SyntaxKind::Other`] and its
//! children are still converted, so null checks nested inside it are found.

use crate::line_index::LineIndex;
use crate::tree::{GreenElement, GreenNode, GreenToken, SyntaxKind, SyntaxNode, TokenKind};
use std::iter;
use std::sync::Arc;
use tree_sitter::{Node, Parser};

/// Parse failure with the position of the offending token
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at line {line}, column {column}")]
pub struct ParseError {
    pub message: String,

    /// Byte offset into the source text
    pub offset: usize,

    /// 1-indexed
    pub line: usize,

    /// 1-indexed
    pub column: usize,
}

impl ParseError {
    pub fn at(text: &str, offset: usize, message: impl Into<String>) -> Self {
        let (line, column) = LineIndex::new(text).line_col(offset);
        Self {
            message: message.into(),
            offset,
            line,
            column,
        }
    }
}

/// Parse a whole source file into a `CompilationUnit`
pub fn parse(text: &str) -> Result<SyntaxNode, ParseError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_c_sharp::language())
        .map_err(|e| ParseError::at(text, 0, format!("failed to load the C# grammar: {}", e)))?;
    let tree = parser
        .parse(text, None)
        .ok_or_else(|| ParseError::at(text, 0, "parser returned no tree"))?;

    let root = tree.root_node();
    if root.has_error() {
        return Err(first_error(text, root));
    }

    let green = Converter::new(text).compilation_unit(root);
    Ok(SyntaxNode::new_root(Arc::new(green)))
}

/// The first error or missing node in document order
fn first_error(text: &str, root: Node<'_>) -> ParseError {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_missing() {
            return ParseError::at(text, node.start_byte(), format!("expected `{}`", node.kind()));
        }
        if node.is_error() {
            let found = text[node.byte_range()].lines().next().unwrap_or("").trim();
            return ParseError::at(text, node.start_byte(), format!("unexpected `{}`", found));
        }
        if node.has_error() {
            for i in (0..node.child_count()).rev() {
                if let Some(child) = node.child(i) {
                    stack.push(child);
                }
            }
        }
    }
    ParseError::at(text, 0, "syntax error")
}

const KEYWORDS: &[&str] = &[
    "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char", "checked",
    "class", "const", "continue", "decimal", "default", "delegate", "do", "double", "else",
    "enum", "event", "explicit", "extern", "false", "finally", "fixed", "float", "for",
    "foreach", "goto", "if", "implicit", "in", "int", "interface", "internal", "is", "lock",
    "long", "namespace", "new", "null", "object", "operator", "out", "override", "params",
    "private", "protected", "public", "readonly", "ref", "return", "sbyte", "sealed", "short",
    "sizeof", "stackalloc", "static", "string", "struct", "switch", "this", "throw", "true",
    "try", "typeof", "uint", "ulong", "unchecked", "unsafe", "ushort", "using", "virtual",
    "void", "volatile", "while",
];

/// Grammar kinds that only ever denote a type
const TYPE_KINDS: &[&str] = &[
    "predefined_type",
    "nullable_type",
    "array_type",
    "pointer_type",
    "tuple_type",
    "implicit_type",
    "ref_type",
    "function_pointer_type",
    "scoped_type",
];

const PATTERN_KINDS: &[&str] = &[
    "constant_pattern",
    "negated_pattern",
    "and_pattern",
    "or_pattern",
    "binary_pattern",
    "parenthesized_pattern",
    "relational_pattern",
    "declaration_pattern",
    "var_pattern",
    "recursive_pattern",
    "list_pattern",
    "type_pattern",
];

/// Parents whose leading identifiers declare names rather than use them
const DECLARING_PARENTS: &[&str] = &[
    "declaration_pattern",
    "var_pattern",
    "recursive_pattern",
    "declaration_expression",
    "parenthesized_variable_designation",
    "tuple_pattern",
    "labeled_statement",
    "catch_declaration",
    "variable_declarator",
    "parameter",
    "enum_member_declaration",
    "from_clause",
    "let_clause",
    "join_clause",
    "join_into_clause",
    "query_continuation",
];

const NAME_KINDS: &[&str] = &["identifier", "discard", "tuple_pattern", "parenthesized_variable_designation"];

/// Tokens after which a declaring parent holds expressions
const SEPARATORS: &[&str] = &["=", "in", "=>", ":"];

/// Parents where an anonymous `this` or `base` is a keyword, not an expression
const KEYWORD_THIS_PARENTS: &[&str] = &[
    "constructor_initializer",
    "indexer_declaration",
    "parameter",
    "parameter_list",
    "modifier",
    "parameter_modifier",
    "explicit_interface_specifier",
];

/// Expressions a conditional access never contains; `a?.b == c` compares
/// the whole access
const LIFTED_OUT_OF_ACCESS: &[SyntaxKind] = &[
    SyntaxKind::BinaryExpression,
    SyntaxKind::ConditionalExpression,
    SyntaxKind::IsPatternExpression,
    SyntaxKind::AsExpression,
    SyntaxKind::RangeExpression,
    SyntaxKind::SwitchExpression,
    SyntaxKind::WithExpression,
];

/// How a grammar node turns into green elements
#[derive(Debug, Clone, Copy)]
enum Shape {
    /// A node of this kind holding the converted children
    Node(SyntaxKind),
    /// A node of this kind holding one token for the whole grammar node
    Wrap(SyntaxKind),
    /// A node of this kind holding every leaf as a token
    Opaque(SyntaxKind),
    /// The converted children go straight into the parent
    Inline,
    /// Every leaf goes straight into the parent as a token
    Flatten,
}

fn shape(kind: &str) -> Option<Shape> {
    use SyntaxKind as K;

    let shape = match kind {
        "global_statement" | "declaration_list" | "modifier" | "parameter_modifier" | "assignment_operator"
        | "switch_body" | "with_initializer_expression" | "with_initializer" | "interpolation_alignment_clause" => {
            Shape::Inline
        }
        "enum_member_declaration_list"
        | "interpolation_format_clause"
        | "positional_pattern_clause"
        | "property_pattern_clause"
        | "subpattern"
        | "array_rank_specifier"
        | "name_colon"
        | "name_equals"
        | "explicit_interface_specifier" => Shape::Flatten,

        "attribute_list" | "global_attribute" | "global_attribute_list" => Shape::Opaque(K::AttributeList),
        "type_parameter_list" => Shape::Opaque(K::TypeParameterList),
        "base_list" => Shape::Opaque(K::BaseList),
        "type_parameter_constraints_clause" => Shape::Opaque(K::ConstraintClause),
        "using_directive" | "extern_alias_directive" => Shape::Opaque(K::UsingDirective),
        "list_pattern" => Shape::Opaque(K::RecursivePattern),
        "alias_qualified_name" => Shape::Opaque(K::Other),

        // Declarations
        "namespace_declaration" => Shape::Node(K::NamespaceDeclaration),
        "file_scoped_namespace_declaration" => Shape::Node(K::FileScopedNamespaceDeclaration),
        "class_declaration" | "struct_declaration" | "interface_declaration" | "record_declaration"
        | "record_struct_declaration" => Shape::Node(K::TypeDeclaration),
        "enum_declaration" => Shape::Node(K::EnumDeclaration),
        "delegate_declaration" => Shape::Node(K::DelegateDeclaration),
        "field_declaration" | "event_field_declaration" => Shape::Node(K::FieldDeclaration),
        "property_declaration" | "indexer_declaration" | "event_declaration" => Shape::Node(K::PropertyDeclaration),
        "accessor_list" => Shape::Node(K::AccessorList),
        "accessor_declaration" => Shape::Node(K::AccessorDeclaration),
        "method_declaration" | "operator_declaration" | "conversion_operator_declaration" => {
            Shape::Node(K::MethodDeclaration)
        }
        "constructor_declaration" | "destructor_declaration" => Shape::Node(K::ConstructorDeclaration),
        "constructor_initializer" => Shape::Node(K::ConstructorInitializer),
        "parameter_list" | "bracketed_parameter_list" => Shape::Node(K::ParameterList),
        "parameter" | "parameter_array" => Shape::Node(K::Parameter),
        "arrow_expression_clause" => Shape::Node(K::ArrowExpressionClause),
        "variable_declaration" => Shape::Node(K::VariableDeclaration),
        "variable_declarator" => Shape::Node(K::VariableDeclarator),
        "equals_value_clause" => Shape::Node(K::EqualsValueClause),

        // Statements
        "block" => Shape::Node(K::Block),
        "local_declaration_statement" => Shape::Node(K::LocalDeclarationStatement),
        "expression_statement" => Shape::Node(K::ExpressionStatement),
        "if_statement" => Shape::Node(K::IfStatement),
        "else_clause" => Shape::Node(K::ElseClause),
        "while_statement" => Shape::Node(K::WhileStatement),
        "do_statement" => Shape::Node(K::DoStatement),
        "for_statement" => Shape::Node(K::ForStatement),
        "foreach_statement" | "for_each_statement" => Shape::Node(K::ForEachStatement),
        "switch_statement" => Shape::Node(K::SwitchStatement),
        "switch_section" => Shape::Node(K::SwitchSection),
        "case_switch_label" | "case_pattern_switch_label" => Shape::Node(K::CaseSwitchLabel),
        "default_switch_label" => Shape::Node(K::DefaultSwitchLabel),
        "try_statement" => Shape::Node(K::TryStatement),
        "catch_clause" => Shape::Node(K::CatchClause),
        "catch_declaration" => Shape::Node(K::CatchDeclaration),
        "catch_filter_clause" | "when_clause" => Shape::Node(K::WhenClause),
        "finally_clause" => Shape::Node(K::FinallyClause),
        "using_statement" => Shape::Node(K::UsingStatement),
        "lock_statement" => Shape::Node(K::LockStatement),
        "local_function_statement" => Shape::Node(K::LocalFunctionStatement),
        "return_statement" => Shape::Node(K::ReturnStatement),
        "throw_statement" => Shape::Node(K::ThrowStatement),
        "yield_statement" => Shape::Node(K::YieldStatement),
        "break_statement" => Shape::Node(K::BreakStatement),
        "continue_statement" => Shape::Node(K::ContinueStatement),
        "empty_statement" => Shape::Node(K::EmptyStatement),
        "labeled_statement" => Shape::Node(K::LabeledStatement),
        "goto_statement" => Shape::Node(K::GotoStatement),
        "checked_statement" => Shape::Node(K::CheckedStatement),
        "unsafe_statement" => Shape::Node(K::UnsafeStatement),
        "fixed_statement" => Shape::Node(K::FixedStatement),

        // Expressions
        "null_literal" => Shape::Wrap(K::NullLiteral),
        "integer_literal" | "real_literal" => Shape::Wrap(K::NumericLiteral),
        "character_literal" => Shape::Wrap(K::CharLiteral),
        "string_literal" | "verbatim_string_literal" | "raw_string_literal" => Shape::Wrap(K::StringLiteral),
        "predefined_type" => Shape::Wrap(K::PredefinedType),
        "this_expression" | "this" => Shape::Wrap(K::ThisExpression),
        "base_expression" | "base" => Shape::Wrap(K::BaseExpression),
        "parenthesized_expression" => Shape::Node(K::ParenthesizedExpression),
        "tuple_expression" => Shape::Node(K::TupleExpression),
        "cast_expression" => Shape::Node(K::CastExpression),
        "binary_expression" => Shape::Node(K::BinaryExpression),
        "assignment_expression" | "simple_assignment_expression" => Shape::Node(K::AssignmentExpression),
        "conditional_expression" => Shape::Node(K::ConditionalExpression),
        "prefix_unary_expression" | "await_expression" | "ref_expression" => Shape::Node(K::PrefixUnaryExpression),
        "postfix_unary_expression" => Shape::Node(K::PostfixUnaryExpression),
        "member_access_expression" | "qualified_name" => Shape::Node(K::MemberAccessExpression),
        "invocation_expression" => Shape::Node(K::InvocationExpression),
        "element_access_expression" => Shape::Node(K::ElementAccessExpression),
        "argument_list" => Shape::Node(K::ArgumentList),
        "bracketed_argument_list" => Shape::Node(K::BracketedArgumentList),
        "argument" => Shape::Node(K::Argument),
        "declaration_expression" => Shape::Node(K::DeclarationExpression),
        "conditional_access_expression" => Shape::Node(K::ConditionalAccessExpression),
        "member_binding_expression" => Shape::Node(K::MemberBindingExpression),
        "element_binding_expression" => Shape::Node(K::ElementBindingExpression),
        "object_creation_expression"
        | "implicit_object_creation_expression"
        | "anonymous_object_creation_expression" => Shape::Node(K::ObjectCreationExpression),
        "array_creation_expression"
        | "implicit_array_creation_expression"
        | "stackalloc_expression"
        | "implicit_stackalloc_expression" => Shape::Node(K::ArrayCreationExpression),
        "initializer_expression" => Shape::Node(K::InitializerExpression),
        "collection_expression" => Shape::Node(K::CollectionExpression),
        "type_of_expression" => Shape::Node(K::TypeOfExpression),
        "anonymous_method_expression" => Shape::Node(K::AnonymousMethodExpression),
        "is_pattern_expression" => Shape::Node(K::IsPatternExpression),
        "as_expression" => Shape::Node(K::AsExpression),
        "throw_expression" => Shape::Node(K::ThrowExpression),
        "switch_expression" => Shape::Node(K::SwitchExpression),
        "switch_expression_arm" => Shape::Node(K::SwitchExpressionArm),
        "range_expression" => Shape::Node(K::RangeExpression),
        "with_expression" => Shape::Node(K::WithExpression),
        "interpolation" => Shape::Node(K::Interpolation),
        "query_expression" => Shape::Node(K::QueryExpression),
        "from_clause" | "where_clause" | "select_clause" | "order_by_clause" | "group_clause" | "join_clause"
        | "join_into_clause" | "let_clause" | "query_continuation" => Shape::Node(K::QueryClause),

        // Patterns
        "constant_pattern" => Shape::Node(K::ConstantPattern),
        "negated_pattern" => Shape::Node(K::NotPattern),
        "and_pattern" | "or_pattern" | "binary_pattern" => Shape::Node(K::BinaryPattern),
        "parenthesized_pattern" => Shape::Node(K::ParenthesizedPattern),
        "relational_pattern" => Shape::Node(K::RelationalPattern),
        "declaration_pattern" => Shape::Node(K::DeclarationPattern),
        "var_pattern" => Shape::Node(K::VarPattern),
        "recursive_pattern" => Shape::Node(K::RecursivePattern),

        _ => return None,
    };
    Some(shape)
}

/// What a child is in its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Token,
    /// Declared name: a bare token, or a designation node
    Name,
    Type,
    Pattern,
    /// Anything else, converted by its grammar kind
    Syntax,
}

/// A grammar child with its field name
#[derive(Clone, Copy)]
struct Child<'t> {
    node: Node<'t>,
    field: Option<&'static str>,
}

fn role_of(parent: &str, child: &Child<'_>, text: &str, seen: &[&str]) -> Role {
    let kind = child.node.kind();
    if !child.node.is_named() {
        let this_or_base = matches!(text, "this" | "base");
        return if this_or_base && !KEYWORD_THIS_PARENTS.contains(&parent) {
            Role::Syntax
        } else {
            Role::Token
        };
    }
    if is_pattern_slot(parent, kind, seen) {
        return Role::Pattern;
    }
    if matches!(child.field, Some("type") | Some("returns")) {
        return Role::Type;
    }
    if matches!(parent, "as_expression" | "is_expression") && seen.iter().any(|t| matches!(*t, "as" | "is")) {
        return Role::Type;
    }

    let simple_name_parent = matches!(parent, "member_access_expression" | "member_binding_expression" | "qualified_name");
    if child.field == Some("name") && !simple_name_parent {
        return Role::Name;
    }
    if parent == "foreach_statement" && child.field == Some("left") && NAME_KINDS.contains(&kind) {
        return Role::Name;
    }
    let before_separator = !seen.iter().any(|t| SEPARATORS.contains(t));
    if DECLARING_PARENTS.contains(&parent) && NAME_KINDS.contains(&kind) && before_separator {
        return Role::Name;
    }
    if TYPE_KINDS.contains(&kind) && !(kind == "predefined_type" && parent == "member_access_expression") {
        return Role::Type;
    }
    Role::Syntax
}

fn is_pattern_slot(parent: &str, kind: &str, seen: &[&str]) -> bool {
    if kind == "when_clause" {
        return false;
    }
    match parent {
        "is_pattern_expression" => seen.contains(&"is"),
        "negated_pattern" | "and_pattern" | "or_pattern" | "binary_pattern" | "parenthesized_pattern" => true,
        "switch_expression_arm" => !seen.iter().any(|t| matches!(*t, "=>" | "when")),
        "case_switch_label" | "case_pattern_switch_label" | "switch_section" => {
            seen.iter().rev().find(|t| matches!(**t, "case" | ":" | "when")) == Some(&"case")
        }
        _ => false,
    }
}

fn is_preprocessor(kind: &str) -> bool {
    kind.starts_with("preproc")
        || (kind.ends_with("_directive") && !matches!(kind, "using_directive" | "extern_alias_directive"))
}

/// Token kind from the token text
fn classify(text: &str) -> TokenKind {
    let mut chars = text.chars();
    let Some(first) = chars.next() else {
        return TokenKind::Punctuation;
    };
    let second = chars.next();
    match first {
        '0'..='9' => TokenKind::NumericLiteral,
        '.' if second.map_or(false, |c| c.is_ascii_digit()) => TokenKind::NumericLiteral,
        '"' => TokenKind::StringLiteral,
        '\'' => TokenKind::CharLiteral,
        '@' | '$' if text.contains('"') => TokenKind::StringLiteral,
        c if c.is_alphabetic() || c == '_' || c == '@' => {
            if KEYWORDS.contains(&text) {
                TokenKind::Keyword
            } else {
                TokenKind::Identifier
            }
        }
        _ => TokenKind::Punctuation,
    }
}

/// Grammar kinds that are a single token despite having children
fn literal_token_kind(kind: &str) -> Option<TokenKind> {
    match kind {
        "integer_literal" | "real_literal" => Some(TokenKind::NumericLiteral),
        "character_literal" => Some(TokenKind::CharLiteral),
        "string_literal" | "verbatim_string_literal" | "raw_string_literal" | "interpolated_string_expression" => {
            Some(TokenKind::StringLiteral)
        }
        _ => None,
    }
}

/// Builds green elements in source order
struct Converter<'s> {
    text: &'s str,
    /// End of the last emitted token
    offset: usize,
}

impl<'s> Converter<'s> {
    fn new(text: &'s str) -> Self {
        Self { text, offset: 0 }
    }

    fn compilation_unit(mut self, root: Node<'_>) -> GreenNode {
        let mut children = self.convert_children(root);

        // members after `namespace N;` belong to it
        let namespace = children
            .iter()
            .position(|c| node_kind(c) == Some(SyntaxKind::FileScopedNamespaceDeclaration));
        if let Some(index) = namespace {
            let members = children.split_off(index + 1);
            if let Some(declaration) = children[index].as_node() {
                let mut inner = declaration.children().to_vec();
                inner.extend(members);
                children[index] = GreenNode::new(SyntaxKind::FileScopedNamespaceDeclaration, inner).into();
            }
        }

        children.push(GreenToken::new(TokenKind::EndOfFile, &self.text[self.offset..], "").into());
        GreenNode::new(SyntaxKind::CompilationUnit, children)
    }

    /// Children of `node` with comments dropped and preprocessor directives
    /// dissolved; both end up as trivia
    fn children<'t>(&self, node: Node<'t>) -> Vec<Child<'t>> {
        let mut children = Vec::new();
        let mut cursor = node.walk();
        if !cursor.goto_first_child() {
            return children;
        }
        loop {
            let child = cursor.node();
            let kind = child.kind();
            if is_preprocessor(kind) {
                let content = self.children(child).into_iter().filter(|c| !self.on_directive_line(c.node));
                children.extend(content);
            } else if kind != "comment" {
                children.push(Child {
                    node: child,
                    field: cursor.field_name(),
                });
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
        children
    }

    fn on_directive_line(&self, node: Node<'_>) -> bool {
        let start = node.start_byte();
        let line_start = self.text[..start].rfind('\n').map_or(0, |i| i + 1);
        self.text[line_start..].trim_start().starts_with('#')
    }

    fn token_at(&mut self, start: usize, end: usize, kind: TokenKind) -> GreenElement {
        let start = start.max(self.offset);
        let end = end.max(start);
        let token = GreenToken::new(kind, &self.text[self.offset..start], &self.text[start..end]);
        self.offset = end;
        token.into()
    }

    /// One token spanning the whole of `node`
    fn leaf(&mut self, node: Node<'_>) -> GreenElement {
        let kind = literal_token_kind(node.kind()).unwrap_or_else(|| classify(&self.text[node.byte_range()]));
        self.token_at(node.start_byte(), node.end_byte(), kind)
    }

    fn wrap(&mut self, node: Node<'_>, kind: SyntaxKind) -> GreenElement {
        let token = self.leaf(node);
        GreenNode::new(kind, vec![token]).into()
    }

    /// Every leaf below `node`, as tokens
    fn flatten(&mut self, node: Node<'_>, out: &mut Vec<GreenElement>) {
        if node.child_count() == 0 || literal_token_kind(node.kind()).is_some() {
            if !node.byte_range().is_empty() {
                out.push(self.leaf(node));
            }
            return;
        }
        for child in self.children(node) {
            self.flatten(child.node, out);
        }
    }

    fn convert_children(&mut self, node: Node<'_>) -> Vec<GreenElement> {
        let parent = node.kind();
        let source = self.text;
        let mut seen: Vec<&str> = Vec::new();
        let mut out = Vec::new();
        for child in self.children(node) {
            let text = &source[child.node.byte_range()];
            let role = role_of(parent, &child, text, &seen);
            if !child.node.is_named() {
                seen.push(text);
            }
            self.convert(child.node, role, &mut out);
        }
        out
    }

    fn convert(&mut self, node: Node<'_>, role: Role, out: &mut Vec<GreenElement>) {
        match role {
            Role::Token => self.flatten(node, out),
            Role::Name => self.name(node, out),
            Role::Type => {
                let ty = self.type_node(node);
                out.push(ty);
            }
            Role::Pattern => self.pattern(node, out),
            Role::Syntax => self.syntax(node, out),
        }
    }

    fn name(&mut self, node: Node<'_>, out: &mut Vec<GreenElement>) {
        match node.kind() {
            "tuple_pattern" | "parenthesized_variable_designation" => {
                let mut children = Vec::new();
                for child in self.children(node) {
                    self.name(child.node, &mut children);
                }
                out.push(GreenNode::new(SyntaxKind::ParenthesizedDesignation, children).into());
            }
            _ => self.flatten(node, out),
        }
    }

    fn type_node(&mut self, node: Node<'_>) -> GreenElement {
        let mut children = Vec::new();
        self.type_parts(node, &mut children);
        GreenNode::new(SyntaxKind::Type, children).into()
    }

    /// Tokens of a type; type arguments and tuple elements keep their own
    /// `Type` nodes
    fn type_parts(&mut self, node: Node<'_>, out: &mut Vec<GreenElement>) {
        match node.kind() {
            "type_argument_list" => {
                let arguments = self.type_arguments(node);
                out.push(arguments);
            }
            "tuple_element" => {
                for child in self.children(node) {
                    if child.node.is_named() && child.field != Some("name") {
                        let ty = self.type_node(child.node);
                        out.push(ty);
                    } else {
                        self.flatten(child.node, out);
                    }
                }
            }
            _ if node.child_count() == 0 => self.flatten(node, out),
            _ => {
                for child in self.children(node) {
                    self.type_parts(child.node, out);
                }
            }
        }
    }

    fn type_arguments(&mut self, node: Node<'_>) -> GreenElement {
        let mut children = Vec::new();
        for child in self.children(node) {
            if child.node.is_named() {
                let ty = self.type_node(child.node);
                children.push(ty);
            } else {
                self.flatten(child.node, &mut children);
            }
        }
        GreenNode::new(SyntaxKind::TypeArgumentList, children).into()
    }

    fn pattern(&mut self, node: Node<'_>, out: &mut Vec<GreenElement>) {
        let kind = node.kind();
        if kind == "discard" {
            let discard = self.wrap(node, SyntaxKind::DiscardPattern);
            out.push(discard);
        } else if PATTERN_KINDS.contains(&kind) {
            self.syntax(node, out);
        } else if TYPE_KINDS.contains(&kind) {
            let ty = self.type_node(node);
            out.push(GreenNode::new(SyntaxKind::DeclarationPattern, vec![ty]).into());
        } else {
            let mut constant = Vec::new();
            self.syntax(node, &mut constant);
            out.push(GreenNode::new(SyntaxKind::ConstantPattern, constant).into());
        }
    }

    fn syntax(&mut self, node: Node<'_>, out: &mut Vec<GreenElement>) {
        let kind = node.kind();
        let element = match kind {
            "identifier" | "discard" | "implicit_parameter" => self.wrap(node, SyntaxKind::IdentifierName),
            "boolean_literal" => {
                let literal = if &self.text[node.byte_range()] == "true" {
                    SyntaxKind::TrueLiteral
                } else {
                    SyntaxKind::FalseLiteral
                };
                self.wrap(node, literal)
            }
            "default_expression" => {
                let children = self.convert_children(node);
                let literal = if children.len() == 1 {
                    SyntaxKind::DefaultLiteral
                } else {
                    SyntaxKind::DefaultExpression
                };
                GreenNode::new(literal, children).into()
            }
            "generic_name" => self.generic_name(node),
            "interpolated_string_expression" => self.interpolated_string(node),
            "lambda_expression" => self.lambda(node),
            "is_expression" => self.type_test(node),
            "type_pattern" => {
                let ty = self.type_node(node);
                GreenNode::new(SyntaxKind::DeclarationPattern, vec![ty]).into()
            }
            "tuple_pattern" | "parenthesized_variable_designation" => return self.name(node, out),
            _ => match shape(kind) {
                Some(Shape::Node(kind)) => {
                    let children = self.convert_children(node);
                    match finish(kind, children) {
                        Some(element) => element,
                        None => return,
                    }
                }
                Some(Shape::Wrap(kind)) => self.wrap(node, kind),
                Some(Shape::Opaque(kind)) => {
                    let mut children = Vec::new();
                    self.flatten(node, &mut children);
                    if children.is_empty() {
                        return;
                    }
                    GreenNode::new(kind, children).into()
                }
                Some(Shape::Inline) => {
                    let children = if node.child_count() == 0 {
                        let mut token = Vec::new();
                        self.flatten(node, &mut token);
                        token
                    } else {
                        self.convert_children(node)
                    };
                    out.extend(children);
                    return;
                }
                Some(Shape::Flatten) => return self.flatten(node, out),
                None if node.child_count() == 0 => return self.flatten(node, out),
                None => {
                    tracing::trace!(kind, "grammar node without a dedicated syntax kind");
                    let children = self.convert_children(node);
                    match finish(SyntaxKind::Other, children) {
                        Some(element) => element,
                        None => return,
                    }
                }
            },
        };
        out.push(element);
    }

    fn generic_name(&mut self, node: Node<'_>) -> GreenElement {
        let mut children = Vec::new();
        for child in self.children(node) {
            if child.node.kind() == "type_argument_list" {
                let arguments = self.type_arguments(child.node);
                children.push(arguments);
            } else {
                self.flatten(child.node, &mut children);
            }
        }
        GreenNode::new(SyntaxKind::GenericName, children).into()
    }

    /// Literal text between holes becomes one string token per run
    fn interpolated_string(&mut self, node: Node<'_>) -> GreenElement {
        let mut children = Vec::new();
        let mut run: Option<(usize, usize)> = None;
        for child in self.children(node) {
            if child.node.kind() == "interpolation" {
                if let Some((start, end)) = run.take() {
                    children.push(self.token_at(start, end, TokenKind::StringLiteral));
                }
                let hole = self.convert_children(child.node);
                children.push(GreenNode::new(SyntaxKind::Interpolation, hole).into());
            } else {
                let start = run.map_or(child.node.start_byte(), |(start, _)| start);
                run = Some((start, child.node.end_byte()));
            }
        }
        if let Some((start, end)) = run {
            children.push(self.token_at(start, end, TokenKind::StringLiteral));
        }
        GreenNode::new(SyntaxKind::InterpolatedStringExpression, children).into()
    }

    fn lambda(&mut self, node: Node<'_>) -> GreenElement {
        let source = self.text;
        let mut kind = SyntaxKind::ParenthesizedLambdaExpression;
        let mut children = Vec::new();
        let mut seen: Vec<&str> = Vec::new();
        for child in self.children(node) {
            let text = &source[child.node.byte_range()];
            let is_parameter = !seen.contains(&"=>");
            if is_parameter && child.field != Some("type") && matches!(child.node.kind(), "identifier" | "implicit_parameter") {
                let name = self.leaf(child.node);
                children.push(GreenNode::new(SyntaxKind::Parameter, vec![name]).into());
                kind = SyntaxKind::SimpleLambdaExpression;
                continue;
            }
            let role = role_of("lambda_expression", &child, text, &seen);
            if !child.node.is_named() {
                seen.push(text);
            }
            self.convert(child.node, role, &mut children);
        }
        GreenNode::new(kind, children).into()
    }

    /// `x is T`, shaped like the pattern form `x is T` with a type pattern
    fn type_test(&mut self, node: Node<'_>) -> GreenElement {
        let mut children = Vec::new();
        let mut after_is = false;
        for child in self.children(node) {
            if !child.node.is_named() {
                after_is = true;
                self.flatten(child.node, &mut children);
            } else if after_is {
                let ty = self.type_node(child.node);
                children.push(GreenNode::new(SyntaxKind::DeclarationPattern, vec![ty]).into());
            } else {
                self.syntax(child.node, &mut children);
            }
        }
        GreenNode::new(SyntaxKind::IsPatternExpression, children).into()
    }
}

fn node_kind(element: &GreenElement) -> Option<SyntaxKind> {
    element.as_node().map(|n| n.kind())
}

fn token_text(element: &GreenElement) -> Option<&str> {
    match element {
        GreenElement::Token(token) => Some(token.text()),
        GreenElement::Node(_) => None,
    }
}

/// Regroup children into the layout consumers expect
fn finish(kind: SyntaxKind, children: Vec<GreenElement>) -> Option<GreenElement> {
    if children.is_empty() {
        return None;
    }
    let children = match kind {
        SyntaxKind::IfStatement => group_else(children),
        SyntaxKind::VariableDeclarator | SyntaxKind::Parameter | SyntaxKind::PropertyDeclaration => {
            group_initializer(children)
        }
        SyntaxKind::SwitchStatement => parenthesize_governing(children),
        SyntaxKind::SwitchSection => group_labels(children),
        SyntaxKind::CaseSwitchLabel | SyntaxKind::SwitchExpressionArm => group_when(children),
        SyntaxKind::ObjectCreationExpression | SyntaxKind::WithExpression => group_braces(children),
        SyntaxKind::BinaryExpression => return Some(coalesce(children)),
        SyntaxKind::MemberAccessExpression | SyntaxKind::InvocationExpression | SyntaxKind::ElementAccessExpression => {
            return Some(chain(kind, children))
        }
        SyntaxKind::ConditionalAccessExpression => return Some(conditional_access(children)),
        _ => children,
    };
    Some(GreenNode::new(kind, children).into())
}

/// Replace `children[range]` with one node of `kind`
fn group(mut children: Vec<GreenElement>, range: std::ops::Range<usize>, kind: SyntaxKind) -> Vec<GreenElement> {
    let grouped: GreenElement = GreenNode::new(kind, children[range.clone()].to_vec()).into();
    children.splice(range, iter::once(grouped));
    children
}

fn group_else(children: Vec<GreenElement>) -> Vec<GreenElement> {
    match children.iter().position(|c| token_text(c) == Some("else")) {
        Some(i) if i + 1 < children.len() => {
            let end = children.len();
            group(children, i..end, SyntaxKind::ElseClause)
        }
        _ => children,
    }
}

/// `= value` becomes an `EqualsValueClause`
fn group_initializer(children: Vec<GreenElement>) -> Vec<GreenElement> {
    let equals = children
        .iter()
        .enumerate()
        .position(|(i, c)| token_text(c) == Some("=") && children.get(i + 1).map_or(false, |v| v.as_node().is_some()));
    match equals {
        Some(i) => group(children, i..i + 2, SyntaxKind::EqualsValueClause),
        None => children,
    }
}

/// `switch (value)` keeps its value in a `ParenthesizedExpression`
fn parenthesize_governing(children: Vec<GreenElement>) -> Vec<GreenElement> {
    let parenthesized = children.len() > 3
        && token_text(&children[1]) == Some("(")
        && children[2].as_node().is_some()
        && token_text(&children[3]) == Some(")");
    if parenthesized {
        group(children, 1..4, SyntaxKind::ParenthesizedExpression)
    } else {
        children
    }
}

/// `case p when c:` and `default:` become label nodes
fn group_labels(children: Vec<GreenElement>) -> Vec<GreenElement> {
    let mut grouped = Vec::new();
    let mut label: Option<(SyntaxKind, Vec<GreenElement>)> = None;
    for child in children {
        if let Some((kind, mut parts)) = label.take() {
            let closes = token_text(&child) == Some(":");
            parts.push(child);
            if closes {
                let parts = if kind == SyntaxKind::CaseSwitchLabel { group_when(parts) } else { parts };
                grouped.push(GreenNode::new(kind, parts).into());
            } else {
                label = Some((kind, parts));
            }
            continue;
        }
        let opens = match token_text(&child) {
            Some("case") => Some(SyntaxKind::CaseSwitchLabel),
            Some("default") => Some(SyntaxKind::DefaultSwitchLabel),
            _ => None,
        };
        match opens {
            Some(kind) => label = Some((kind, vec![child])),
            None => grouped.push(child),
        }
    }
    if let Some((kind, parts)) = label {
        grouped.push(GreenNode::new(kind, parts).into());
    }
    grouped
}

fn group_when(children: Vec<GreenElement>) -> Vec<GreenElement> {
    let when = children
        .iter()
        .enumerate()
        .position(|(i, c)| token_text(c) == Some("when") && children.get(i + 1).map_or(false, |v| v.as_node().is_some()));
    match when {
        Some(i) => group(children, i..i + 2, SyntaxKind::WhenClause),
        None => children,
    }
}

/// Bare `{ ... }` of anonymous objects and `with` become an initializer
fn group_braces(children: Vec<GreenElement>) -> Vec<GreenElement> {
    let open = children.iter().position(|c| token_text(c) == Some("{"));
    let close = children.iter().rposition(|c| token_text(c) == Some("}"));
    match (open, close) {
        (Some(open), Some(close)) if open < close => group(children, open..close + 1, SyntaxKind::InitializerExpression),
        _ => children,
    }
}

fn is_coalesce(node: &GreenNode) -> bool {
    node.kind() == SyntaxKind::BinaryExpression
        && node.children().len() == 3
        && token_text(&node.children()[1]) == Some("??")
}

/// `a ?? b ?? c` groups as `a ?? (b ?? c)`
fn coalesce(children: Vec<GreenElement>) -> GreenElement {
    let regroup = children.len() == 3
        && token_text(&children[1]) == Some("??")
        && children[0].as_node().map_or(false, |left| is_coalesce(left));
    if regroup {
        if let Some(left) = children[0].as_node() {
            let inner = left.children();
            let right = coalesce(vec![inner[2].clone(), children[1].clone(), children[2].clone()]);
            return coalesce(vec![inner[0].clone(), inner[1].clone(), right]);
        }
    }
    GreenNode::new(SyntaxKind::BinaryExpression, children).into()
}

/// Postfix access on a conditional access moves into its `WhenNotNull`
/// part: `a?.b.c` is `a ? (.b.c)`
fn chain(kind: SyntaxKind, mut children: Vec<GreenElement>) -> GreenElement {
    let access = children
        .first()
        .and_then(GreenElement::as_node)
        .filter(|n| n.kind() == SyntaxKind::ConditionalAccessExpression && n.children().len() == 3)
        .cloned();
    match access {
        Some(access) => {
            let parts = access.children();
            children[0] = parts[2].clone();
            let when_not_null = chain(kind, children);
            conditional_access(vec![parts[0].clone(), parts[1].clone(), when_not_null])
        }
        None => GreenNode::new(kind, children).into(),
    }
}

fn conditional_access(children: Vec<GreenElement>) -> GreenElement {
    let lifted = children
        .get(2)
        .and_then(GreenElement::as_node)
        .filter(|n| LIFTED_OUT_OF_ACCESS.contains(&n.kind()))
        .filter(|n| n.children().first().map_or(false, |c| c.as_node().is_some()))
        .cloned();
    if let (Some(outer), 3) = (lifted, children.len()) {
        let mut parts = outer.children().to_vec();
        parts[0] = conditional_access(vec![children[0].clone(), children[1].clone(), parts[0].clone()]);
        return GreenNode::new(outer.kind(), parts).into();
    }
    chain(SyntaxKind::ConditionalAccessExpression, children)
}
