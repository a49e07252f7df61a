//! Lossless, persistent syntax tree
//!
//! The tree has two layers:
//! - **Green** nodes and tokens are immutable, position-independent and
//!   shared through `Arc`. Every token owns its leading trivia, so the
//!   concatenated tokens reproduce the source byte for byte.
//! - **Red** [`SyntaxNode`]s are cheap cursors over green nodes that know
//!   their absolute offset and parent. They are created on demand.
//!
//! Editing a tree never mutates it: see [`crate::mutation`], which builds a
//! new root that shares every untouched green subtree with the old one.

use nullcheck_core::TextSpan;
use std::fmt;
use std::sync::Arc;

/// Token categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    Keyword,
    NumericLiteral,
    StringLiteral,
    CharLiteral,
    Punctuation,
    /// Zero-width token that carries the trailing trivia of the file
    EndOfFile,
}

/// Node categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    // Declarations
    CompilationUnit,
    UsingDirective,
    NamespaceDeclaration,
    FileScopedNamespaceDeclaration,
    TypeDeclaration,
    EnumDeclaration,
    DelegateDeclaration,
    AttributeList,
    TypeParameterList,
    BaseList,
    ConstraintClause,
    FieldDeclaration,
    PropertyDeclaration,
    AccessorList,
    AccessorDeclaration,
    MethodDeclaration,
    ConstructorDeclaration,
    ConstructorInitializer,
    ParameterList,
    Parameter,
    ArrowExpressionClause,
    Type,
    TypeArgumentList,
    VariableDeclaration,
    VariableDeclarator,
    EqualsValueClause,

    // Statements
    Block,
    LocalDeclarationStatement,
    ExpressionStatement,
    IfStatement,
    ElseClause,
    WhileStatement,
    DoStatement,
    ForStatement,
    ForEachStatement,
    SwitchStatement,
    SwitchSection,
    CaseSwitchLabel,
    DefaultSwitchLabel,
    TryStatement,
    CatchClause,
    CatchDeclaration,
    FinallyClause,
    UsingStatement,
    LockStatement,
    LocalFunctionStatement,
    ReturnStatement,
    ThrowStatement,
    YieldStatement,
    BreakStatement,
    ContinueStatement,
    EmptyStatement,
    LabeledStatement,
    GotoStatement,
    CheckedStatement,
    UnsafeStatement,
    FixedStatement,

    // Expressions
    NullLiteral,
    TrueLiteral,
    FalseLiteral,
    DefaultLiteral,
    NumericLiteral,
    StringLiteral,
    CharLiteral,
    IdentifierName,
    GenericName,
    PredefinedType,
    ThisExpression,
    BaseExpression,
    ParenthesizedExpression,
    TupleExpression,
    CastExpression,
    BinaryExpression,
    AssignmentExpression,
    ConditionalExpression,
    PrefixUnaryExpression,
    PostfixUnaryExpression,
    MemberAccessExpression,
    InvocationExpression,
    ElementAccessExpression,
    ArgumentList,
    BracketedArgumentList,
    Argument,
    DeclarationExpression,
    ConditionalAccessExpression,
    MemberBindingExpression,
    ElementBindingExpression,
    ObjectCreationExpression,
    ArrayCreationExpression,
    InitializerExpression,
    TypeOfExpression,
    DefaultExpression,
    SimpleLambdaExpression,
    ParenthesizedLambdaExpression,
    AnonymousMethodExpression,
    IsPatternExpression,
    AsExpression,
    ThrowExpression,
    SwitchExpression,
    SwitchExpressionArm,
    WhenClause,
    RangeExpression,
    WithExpression,
    CollectionExpression,
    ParenthesizedDesignation,
    InterpolatedStringExpression,
    /// `{expression,alignment:format}` hole of an interpolated string
    Interpolation,
    QueryExpression,
    QueryClause,

    // Patterns
    ConstantPattern,
    NotPattern,
    DeclarationPattern,
    VarPattern,
    DiscardPattern,
    RelationalPattern,
    BinaryPattern,
    ParenthesizedPattern,
    RecursivePattern,

    /// Construct without a dedicated kind; its children are still converted
    Other,
}

impl SyntaxKind {
    /// Kinds that can appear as an element of a statement list
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            Self::Block
                | Self::LocalDeclarationStatement
                | Self::ExpressionStatement
                | Self::IfStatement
                | Self::WhileStatement
                | Self::DoStatement
                | Self::ForStatement
                | Self::ForEachStatement
                | Self::SwitchStatement
                | Self::TryStatement
                | Self::UsingStatement
                | Self::LockStatement
                | Self::LocalFunctionStatement
                | Self::ReturnStatement
                | Self::ThrowStatement
                | Self::YieldStatement
                | Self::BreakStatement
                | Self::ContinueStatement
                | Self::EmptyStatement
                | Self::LabeledStatement
                | Self::GotoStatement
                | Self::CheckedStatement
                | Self::UnsafeStatement
                | Self::FixedStatement
        )
    }

    /// Kinds whose children form a statement list
    pub fn is_statement_list(&self) -> bool {
        matches!(self, Self::Block | Self::SwitchSection | Self::CompilationUnit)
    }

    pub fn is_lambda(&self) -> bool {
        matches!(
            self,
            Self::SimpleLambdaExpression
                | Self::ParenthesizedLambdaExpression
                | Self::AnonymousMethodExpression
        )
    }
}

/// Immutable token: kind, leading trivia and text
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GreenToken {
    kind: TokenKind,
    leading_trivia: String,
    text: String,
}

impl GreenToken {
    pub fn new(kind: TokenKind, leading_trivia: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind,
            leading_trivia: leading_trivia.into(),
            text: text.into(),
        }
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn leading_trivia(&self) -> &str {
        &self.leading_trivia
    }

    /// Trivia plus text
    pub fn width(&self) -> usize {
        self.leading_trivia.len() + self.text.len()
    }

    pub fn with_leading_trivia(&self, trivia: impl Into<String>) -> Self {
        Self {
            kind: self.kind,
            leading_trivia: trivia.into(),
            text: self.text.clone(),
        }
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == keyword
    }

    pub fn is_punct(&self, punct: &str) -> bool {
        self.kind == TokenKind::Punctuation && self.text == punct
    }
}

/// Child of a green node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GreenElement {
    Node(Arc<GreenNode>),
    Token(Arc<GreenToken>),
}

impl GreenElement {
    pub fn width(&self) -> usize {
        match self {
            Self::Node(node) => node.width(),
            Self::Token(token) => token.width(),
        }
    }

    pub fn first_token(&self) -> Option<&Arc<GreenToken>> {
        match self {
            Self::Node(node) => node.first_token(),
            Self::Token(token) => Some(token),
        }
    }

    pub fn leading_trivia(&self) -> &str {
        self.first_token().map(|t| t.leading_trivia()).unwrap_or("")
    }

    pub fn with_leading_trivia(&self, trivia: &str) -> GreenElement {
        match self {
            Self::Node(node) => Self::Node(Arc::new(node.with_leading_trivia(trivia))),
            Self::Token(token) => Self::Token(Arc::new(token.with_leading_trivia(trivia))),
        }
    }

    pub fn as_node(&self) -> Option<&Arc<GreenNode>> {
        match self {
            Self::Node(node) => Some(node),
            Self::Token(_) => None,
        }
    }

    fn write_to(&self, out: &mut String) {
        match self {
            Self::Node(node) => node.write_to(out),
            Self::Token(token) => {
                out.push_str(&token.leading_trivia);
                out.push_str(&token.text);
            }
        }
    }
}

impl From<GreenNode> for GreenElement {
    fn from(node: GreenNode) -> Self {
        Self::Node(Arc::new(node))
    }
}

impl From<Arc<GreenNode>> for GreenElement {
    fn from(node: Arc<GreenNode>) -> Self {
        Self::Node(node)
    }
}

impl From<GreenToken> for GreenElement {
    fn from(token: GreenToken) -> Self {
        Self::Token(Arc::new(token))
    }
}

impl From<Arc<GreenToken>> for GreenElement {
    fn from(token: Arc<GreenToken>) -> Self {
        Self::Token(token)
    }
}

/// Immutable interior node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GreenNode {
    kind: SyntaxKind,
    children: Vec<GreenElement>,
    width: usize,
}

impl GreenNode {
    pub fn new(kind: SyntaxKind, children: Vec<GreenElement>) -> Self {
        let width = children.iter().map(GreenElement::width).sum();
        Self { kind, children, width }
    }

    pub fn kind(&self) -> SyntaxKind {
        self.kind
    }

    pub fn children(&self) -> &[GreenElement] {
        &self.children
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn first_token(&self) -> Option<&Arc<GreenToken>> {
        self.children.iter().find_map(GreenElement::first_token)
    }

    pub fn leading_trivia(&self) -> &str {
        self.first_token().map(|t| t.leading_trivia()).unwrap_or("")
    }

    /// Full source text, leading trivia included
    pub fn full_text(&self) -> String {
        let mut out = String::with_capacity(self.width);
        self.write_to(&mut out);
        out
    }

    /// Copy of this node whose first token carries `trivia`
    pub fn with_leading_trivia(&self, trivia: &str) -> GreenNode {
        let mut children = self.children.clone();
        if let Some(index) = children.iter().position(|c| c.first_token().is_some()) {
            children[index] = children[index].with_leading_trivia(trivia);
        }
        GreenNode::new(self.kind, children)
    }

    /// Copy with the child at `index` replaced by `replacements` (possibly none)
    pub fn splice_child(&self, index: usize, replacements: Vec<GreenElement>) -> GreenNode {
        let mut children = Vec::with_capacity(self.children.len() + replacements.len());
        children.extend_from_slice(&self.children[..index]);
        children.extend(replacements);
        children.extend_from_slice(&self.children[index + 1..]);
        GreenNode::new(self.kind, children)
    }

    /// Copy with every token's trivia passed through `f`
    pub fn map_trivia(&self, f: &dyn Fn(&str) -> String) -> GreenNode {
        let children = self
            .children
            .iter()
            .map(|child| match child {
                GreenElement::Node(node) => GreenElement::Node(Arc::new(node.map_trivia(f))),
                GreenElement::Token(token) => {
                    GreenElement::Token(Arc::new(token.with_leading_trivia(f(token.leading_trivia()))))
                }
            })
            .collect();
        GreenNode::new(self.kind, children)
    }

    fn write_to(&self, out: &mut String) {
        for child in &self.children {
            child.write_to(out);
        }
    }
}

struct NodeData {
    green: Arc<GreenNode>,
    offset: usize,
    parent: Option<SyntaxNode>,
    index: usize,
}

/// Positioned cursor over a green node
#[derive(Clone)]
pub struct SyntaxNode(Arc<NodeData>);

impl SyntaxNode {
    /// Wrap a green node as the root of a tree
    pub fn new_root(green: Arc<GreenNode>) -> Self {
        Self(Arc::new(NodeData {
            green,
            offset: 0,
            parent: None,
            index: 0,
        }))
    }

    pub fn kind(&self) -> SyntaxKind {
        self.0.green.kind()
    }

    pub fn green(&self) -> &Arc<GreenNode> {
        &self.0.green
    }

    pub fn parent(&self) -> Option<SyntaxNode> {
        self.0.parent.clone()
    }

    /// Position among the parent's children (tokens included)
    pub fn index_in_parent(&self) -> usize {
        self.0.index
    }

    /// Parent, grandparent, ... up to the root
    pub fn ancestors(&self) -> impl Iterator<Item = SyntaxNode> {
        std::iter::successors(self.parent(), |node| node.parent())
    }

    pub fn root(&self) -> SyntaxNode {
        self.ancestors().last().unwrap_or_else(|| self.clone())
    }

    /// Span including the first token's leading trivia
    pub fn full_span(&self) -> TextSpan {
        TextSpan::new(self.0.offset, self.0.offset + self.0.green.width())
    }

    /// Span of the node's text, leading trivia excluded
    pub fn span(&self) -> TextSpan {
        let full = self.full_span();
        let start = (full.start + self.leading_trivia().len()).min(full.end);
        TextSpan::new(start, full.end)
    }

    pub fn leading_trivia(&self) -> &str {
        self.0.green.leading_trivia()
    }

    /// Source text without the leading trivia
    pub fn text(&self) -> String {
        let full = self.0.green.full_text();
        full[self.leading_trivia().len()..].to_string()
    }

    pub fn full_text(&self) -> String {
        self.0.green.full_text()
    }

    pub fn children(&self) -> Vec<SyntaxElement> {
        let mut offset = self.0.offset;
        let mut elements = Vec::with_capacity(self.0.green.children().len());
        for (index, child) in self.0.green.children().iter().enumerate() {
            let element = match child {
                GreenElement::Node(green) => SyntaxElement::Node(SyntaxNode(Arc::new(NodeData {
                    green: green.clone(),
                    offset,
                    parent: Some(self.clone()),
                    index,
                }))),
                GreenElement::Token(green) => SyntaxElement::Token(SyntaxToken {
                    green: green.clone(),
                    offset,
                    parent: self.clone(),
                    index,
                }),
            };
            offset += child.width();
            elements.push(element);
        }
        elements
    }

    pub fn child_nodes(&self) -> impl Iterator<Item = SyntaxNode> {
        self.children().into_iter().filter_map(SyntaxElement::into_node)
    }

    pub fn child_tokens(&self) -> impl Iterator<Item = SyntaxToken> {
        self.children().into_iter().filter_map(SyntaxElement::into_token)
    }

    /// First child node of the given kind
    pub fn child_of_kind(&self, kind: SyntaxKind) -> Option<SyntaxNode> {
        self.child_nodes().find(|n| n.kind() == kind)
    }

    /// First direct child token with the given text
    pub fn child_token(&self, text: &str) -> Option<SyntaxToken> {
        self.child_tokens().find(|t| t.text() == text)
    }

    pub fn first_token(&self) -> Option<SyntaxToken> {
        for child in self.children() {
            match child {
                SyntaxElement::Token(token) => return Some(token),
                SyntaxElement::Node(node) => {
                    if let Some(token) = node.first_token() {
                        return Some(token);
                    }
                }
            }
        }
        None
    }

    /// All tokens of this subtree, in source order
    pub fn tokens(&self) -> Vec<SyntaxToken> {
        let mut tokens = Vec::new();
        for child in self.children() {
            match child {
                SyntaxElement::Token(token) => tokens.push(token),
                SyntaxElement::Node(node) => tokens.extend(node.tokens()),
            }
        }
        tokens
    }

    /// This node and every node below it, in preorder
    pub fn descendants(&self) -> Descendants {
        Descendants {
            stack: vec![self.clone()],
        }
    }

    /// Nodes whose span equals `span`, outermost first
    pub fn covering_nodes(&self, span: TextSpan) -> Vec<SyntaxNode> {
        let mut found = Vec::new();
        let mut current = Some(self.clone());
        while let Some(node) = current {
            if node.span() == span {
                found.push(node.clone());
            }
            current = node
                .child_nodes()
                .find(|child| child.span().contains_span(span) && !child.full_span().is_empty());
        }
        found
    }

    /// Identity within one tree snapshot
    pub fn same_node(&self, other: &SyntaxNode) -> bool {
        self.0.offset == other.0.offset && Arc::ptr_eq(&self.0.green, &other.0.green)
    }
}

impl PartialEq for SyntaxNode {
    fn eq(&self, other: &Self) -> bool {
        self.same_node(other)
    }
}

impl Eq for SyntaxNode {}

impl fmt::Debug for SyntaxNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{}", self.kind(), self.span())
    }
}

impl fmt::Display for SyntaxNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text())
    }
}

/// Preorder iterator over a subtree
pub struct Descendants {
    stack: Vec<SyntaxNode>,
}

impl Iterator for Descendants {
    type Item = SyntaxNode;

    fn next(&mut self) -> Option<SyntaxNode> {
        let node = self.stack.pop()?;
        let mut children: Vec<SyntaxNode> = node.child_nodes().collect();
        children.reverse();
        self.stack.extend(children);
        Some(node)
    }
}

/// Positioned token
#[derive(Clone)]
pub struct SyntaxToken {
    green: Arc<GreenToken>,
    offset: usize,
    parent: SyntaxNode,
    index: usize,
}

impl SyntaxToken {
    pub fn kind(&self) -> TokenKind {
        self.green.kind()
    }

    pub fn text(&self) -> &str {
        self.green.text()
    }

    pub fn leading_trivia(&self) -> &str {
        self.green.leading_trivia()
    }

    pub fn green(&self) -> &Arc<GreenToken> {
        &self.green
    }

    pub fn parent(&self) -> &SyntaxNode {
        &self.parent
    }

    pub fn index_in_parent(&self) -> usize {
        self.index
    }

    /// Offset where the leading trivia starts
    pub fn full_start(&self) -> usize {
        self.offset
    }

    pub fn span(&self) -> TextSpan {
        let start = self.offset + self.green.leading_trivia().len();
        TextSpan::new(start, start + self.green.text().len())
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.green.is_keyword(keyword)
    }

    pub fn is_punct(&self, punct: &str) -> bool {
        self.green.is_punct(punct)
    }
}

impl fmt::Debug for SyntaxToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:?})@{}", self.kind(), self.text(), self.span())
    }
}

/// Either a node or a token
#[derive(Debug, Clone)]
pub enum SyntaxElement {
    Node(SyntaxNode),
    Token(SyntaxToken),
}

impl SyntaxElement {
    pub fn into_node(self) -> Option<SyntaxNode> {
        match self {
            Self::Node(node) => Some(node),
            Self::Token(_) => None,
        }
    }

    pub fn into_token(self) -> Option<SyntaxToken> {
        match self {
            Self::Node(_) => None,
            Self::Token(token) => Some(token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(kind: TokenKind, trivia: &str, text: &str) -> GreenElement {
        GreenToken::new(kind, trivia, text).into()
    }

    /// `a == null` wrapped in parentheses
    fn sample() -> SyntaxNode {
        let left = GreenNode::new(
            SyntaxKind::IdentifierName,
            vec![token(TokenKind::Identifier, "", "a")],
        );
        let right = GreenNode::new(
            SyntaxKind::NullLiteral,
            vec![token(TokenKind::Keyword, " ", "null")],
        );
        let binary = GreenNode::new(
            SyntaxKind::BinaryExpression,
            vec![left.into(), token(TokenKind::Punctuation, " ", "=="), right.into()],
        );
        let parens = GreenNode::new(
            SyntaxKind::ParenthesizedExpression,
            vec![
                token(TokenKind::Punctuation, "  ", "("),
                binary.into(),
                token(TokenKind::Punctuation, "", ")"),
            ],
        );
        SyntaxNode::new_root(Arc::new(parens))
    }

    #[test]
    fn spans_exclude_leading_trivia() {
        let root = sample();
        assert_eq!(root.full_span(), TextSpan::new(0, 13));
        assert_eq!(root.span(), TextSpan::new(2, 13));
        assert_eq!(root.text(), "(a == null)");
        assert_eq!(root.full_text(), "  (a == null)");

        let binary = root.child_of_kind(SyntaxKind::BinaryExpression).unwrap();
        assert_eq!(binary.span(), TextSpan::new(3, 12));
        assert_eq!(binary.text(), "a == null");
        assert_eq!(binary.parent().unwrap(), root);
    }

    #[test]
    fn descendants_are_preorder() {
        let kinds: Vec<_> = sample().descendants().map(|n| n.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                SyntaxKind::ParenthesizedExpression,
                SyntaxKind::BinaryExpression,
                SyntaxKind::IdentifierName,
                SyntaxKind::NullLiteral,
            ]
        );
    }

    #[test]
    fn covering_nodes_finds_exact_span() {
        let root = sample();
        let found = root.covering_nodes(TextSpan::new(3, 12));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind(), SyntaxKind::BinaryExpression);
        assert!(root.covering_nodes(TextSpan::new(3, 11)).is_empty());
    }

    #[test]
    fn leading_trivia_replacement_keeps_text() {
        let root = sample();
        let moved = root.green().with_leading_trivia("\n    ");
        assert_eq!(moved.full_text(), "\n    (a == null)");
        assert_eq!(moved.width(), root.green().width() + 3);
    }

    #[test]
    fn ancestors_reach_root() {
        let root = sample();
        let ident = root
            .descendants()
            .find(|n| n.kind() == SyntaxKind::IdentifierName)
            .unwrap();
        assert_eq!(ident.ancestors().count(), 2);
        assert_eq!(ident.root(), root);
    }
}
