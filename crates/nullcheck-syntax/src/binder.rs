//! Declared nullability of expressions
//!
//! Answers "can this expression's declared type hold null?" from the
//! declarations visible in the same file: locals, parameters, pattern and
//! `out var` designations, fields, properties and same-type methods.
//! Nothing here is flow-sensitive; `string? s` stays `Annotated` even after
//! an assignment of a non-null value.
//!
//! Whenever a name cannot be resolved unambiguously the answer is `Unknown`,
//! which never leads to a diagnostic.

use crate::tree::{SyntaxKind, SyntaxNode, SyntaxToken, TokenKind};
use lazy_static::lazy_static;
use nullcheck_core::{NullabilityFact, NullableContext};
use regex::Regex;

lazy_static! {
    static ref NULLABLE_DIRECTIVE: Regex =
        Regex::new(r"(?m)^[ \t]*#nullable[ \t]+(enable|disable|restore)(?:[ \t]+(annotations|warnings))?")
            .expect("valid #nullable regex");
}

const VALUE_TYPE_KEYWORDS: &[&str] = &[
    "bool", "byte", "char", "decimal", "double", "float", "int", "long", "sbyte", "short", "uint",
    "ulong", "ushort",
];

/// A name introduced by a declaration
#[derive(Debug, Clone)]
struct Binding {
    name: String,
    /// Declaring node, used for scope checks
    node: SyntaxNode,
    fact: NullabilityFact,
}

/// Declaration-based nullability facts for one tree snapshot
#[derive(Debug, Clone)]
pub struct DeclaredNullability {
    default_context: NullableContext,
    /// `(offset, context in effect from offset on)`, sorted by offset
    directives: Vec<(usize, NullableContext)>,
}

impl DeclaredNullability {
    pub fn new(root: &SyntaxNode, default_context: NullableContext) -> Self {
        let mut directives = Vec::new();
        for token in root.tokens() {
            let trivia = token.leading_trivia();
            if !trivia.contains("#nullable") {
                continue;
            }
            for captures in NULLABLE_DIRECTIVE.captures_iter(trivia) {
                let target = captures.get(2).map(|m| m.as_str());
                if target == Some("warnings") {
                    continue;
                }
                let context = match &captures[1] {
                    "enable" => NullableContext::Enable,
                    "disable" => NullableContext::Disable,
                    _ => default_context,
                };
                let offset = token.full_start() + captures.get(0).map_or(0, |m| m.start());
                directives.push((offset, context));
            }
        }
        tracing::debug!(directives = directives.len(), ?default_context, "scanned nullable directives");

        Self {
            default_context,
            directives,
        }
    }

    /// Annotation context in effect at `offset`
    pub fn context_at(&self, offset: usize) -> NullableContext {
        let index = self.directives.partition_point(|(start, _)| *start <= offset);
        if index == 0 {
            self.default_context
        } else {
            self.directives[index - 1].1
        }
    }

    /// Declared nullability of `expression`
    pub fn fact(&self, expression: &SyntaxNode) -> NullabilityFact {
        match expression.kind() {
            SyntaxKind::ParenthesizedExpression => expression
                .child_nodes()
                .next()
                .map_or(NullabilityFact::Unknown, |inner| self.fact(&inner)),
            SyntaxKind::IdentifierName => match identifier_text(expression) {
                Some(name) => self.lookup_name(expression, &name),
                None => NullabilityFact::Unknown,
            },
            SyntaxKind::MemberAccessExpression => self.this_member_fact(expression),
            SyntaxKind::InvocationExpression => self.invocation_fact(expression),
            SyntaxKind::CastExpression => expression
                .child_of_kind(SyntaxKind::Type)
                .map_or(NullabilityFact::Unknown, |ty| self.type_fact(&ty)),
            SyntaxKind::AsExpression | SyntaxKind::NullLiteral => NullabilityFact::Annotated,
            SyntaxKind::NumericLiteral
            | SyntaxKind::CharLiteral
            | SyntaxKind::TrueLiteral
            | SyntaxKind::FalseLiteral => NullabilityFact::NotAnnotated,
            SyntaxKind::StringLiteral
            | SyntaxKind::InterpolatedStringExpression
            | SyntaxKind::ThisExpression
            | SyntaxKind::ObjectCreationExpression
            | SyntaxKind::ArrayCreationExpression
            | SyntaxKind::TypeOfExpression => self.enabled_fact(expression.span().start),
            _ => NullabilityFact::Unknown,
        }
    }

    fn enabled_fact(&self, offset: usize) -> NullabilityFact {
        if self.context_at(offset).is_enabled() {
            NullabilityFact::NotAnnotated
        } else {
            NullabilityFact::Unknown
        }
    }

    /// Nullability a `Type` node declares
    pub fn type_fact(&self, ty: &SyntaxNode) -> NullabilityFact {
        let children = ty.children();
        let last_is_question = children
            .last()
            .and_then(|c| c.clone().into_token())
            .map_or(false, |t| t.is_punct("?"));
        if last_is_question {
            return NullabilityFact::Annotated;
        }

        let first = match ty.child_tokens().next() {
            Some(first) => first,
            None => return NullabilityFact::Unknown,
        };

        // pointers are outside nullable analysis
        if ty.child_tokens().any(|t| t.is_punct("*")) {
            return NullabilityFact::Unknown;
        }
        if first.is_punct("(") {
            // tuples are value types
            return NullabilityFact::NotAnnotated;
        }
        if children.len() == 1 {
            let is_value_keyword = first.kind() == TokenKind::Keyword && VALUE_TYPE_KEYWORDS.contains(&first.text());
            let is_native_int = first.kind() == TokenKind::Identifier && matches!(first.text(), "nint" | "nuint");
            if is_value_keyword || is_native_int {
                return NullabilityFact::NotAnnotated;
            }
            if first.kind() == TokenKind::Identifier {
                let name = normalize(first.text());
                if name == "var" || name == "dynamic" || self.is_type_parameter(ty, name) {
                    return NullabilityFact::Unknown;
                }
            }
        }

        self.enabled_fact(ty.span().start)
    }

    fn is_type_parameter(&self, ty: &SyntaxNode, name: &str) -> bool {
        ty.ancestors()
            .filter(|a| {
                matches!(
                    a.kind(),
                    SyntaxKind::TypeDeclaration | SyntaxKind::MethodDeclaration | SyntaxKind::LocalFunctionStatement
                )
            })
            .filter_map(|a| a.child_of_kind(SyntaxKind::TypeParameterList))
            .any(|list| {
                list.child_tokens()
                    .any(|t| t.kind() == TokenKind::Identifier && normalize(t.text()) == name)
            })
    }

    fn lookup_name(&self, use_site: &SyntaxNode, name: &str) -> NullabilityFact {
        let mut child = use_site.clone();
        for scope in use_site.ancestors() {
            let bindings = self.bindings_in_scope(&scope, &child, use_site);
            let facts: Vec<NullabilityFact> = bindings
                .iter()
                .filter(|b| b.name == name)
                .map(|b| b.fact)
                .collect();
            if !facts.is_empty() {
                return agree(&facts);
            }
            child = scope;
        }
        NullabilityFact::Unknown
    }

    /// Names `scope` makes visible to `use_site`, which lies inside `child`
    fn bindings_in_scope(&self, scope: &SyntaxNode, child: &SyntaxNode, use_site: &SyntaxNode) -> Vec<Binding> {
        match scope.kind() {
            SyntaxKind::SimpleLambdaExpression => scope
                .child_of_kind(SyntaxKind::Parameter)
                .into_iter()
                .flat_map(|p| self.parameter_binding(&p))
                .collect(),
            SyntaxKind::ParenthesizedLambdaExpression
            | SyntaxKind::AnonymousMethodExpression
            | SyntaxKind::MethodDeclaration
            | SyntaxKind::ConstructorDeclaration
            | SyntaxKind::LocalFunctionStatement => self.parameter_bindings(scope),
            SyntaxKind::PropertyDeclaration => self.parameter_bindings(scope),
            SyntaxKind::AccessorDeclaration => self.value_binding(scope),
            SyntaxKind::Block
            | SyntaxKind::SwitchSection
            | SyntaxKind::CompilationUnit
            | SyntaxKind::FileScopedNamespaceDeclaration => self.statement_list_bindings(scope, child, use_site),
            SyntaxKind::ForStatement | SyntaxKind::UsingStatement | SyntaxKind::FixedStatement => {
                let mut bindings: Vec<Binding> = scope
                    .child_of_kind(SyntaxKind::VariableDeclaration)
                    .map(|d| self.declarator_bindings(&d))
                    .unwrap_or_default();
                bindings.extend(self.designations_before(scope, use_site));
                bindings
            }
            SyntaxKind::ForEachStatement => self.foreach_bindings(scope),
            SyntaxKind::CatchClause => self.catch_bindings(scope),
            SyntaxKind::SwitchExpressionArm => self.designations_before(scope, use_site),
            SyntaxKind::TypeDeclaration => self.member_bindings(scope),
            _ => Vec::new(),
        }
    }

    fn parameter_binding(&self, parameter: &SyntaxNode) -> Option<Binding> {
        let name = parameter
            .child_tokens()
            .filter(|t| t.kind() == TokenKind::Identifier)
            .last()?;
        let fact = parameter
            .child_of_kind(SyntaxKind::Type)
            .map_or(NullabilityFact::Unknown, |ty| self.type_fact(&ty));
        Some(Binding {
            name: normalize(name.text()).to_string(),
            node: parameter.clone(),
            fact,
        })
    }

    fn parameter_bindings(&self, owner: &SyntaxNode) -> Vec<Binding> {
        owner
            .child_of_kind(SyntaxKind::ParameterList)
            .map(|list| {
                list.child_nodes()
                    .filter(|p| p.kind() == SyntaxKind::Parameter)
                    .filter_map(|p| self.parameter_binding(&p))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `value` inside `set` and `init` accessors
    fn value_binding(&self, accessor: &SyntaxNode) -> Vec<Binding> {
        let is_setter = accessor
            .child_tokens()
            .any(|t| t.kind() == TokenKind::Identifier && matches!(t.text(), "set" | "init"));
        if !is_setter {
            return Vec::new();
        }
        let property = accessor.parent().and_then(|list| list.parent());
        let fact = property
            .and_then(|p| p.child_of_kind(SyntaxKind::Type))
            .map_or(NullabilityFact::Unknown, |ty| self.type_fact(&ty));
        vec![Binding {
            name: "value".to_string(),
            node: accessor.clone(),
            fact,
        }]
    }

    fn declarator_bindings(&self, declaration: &SyntaxNode) -> Vec<Binding> {
        let fact = declaration
            .child_of_kind(SyntaxKind::Type)
            .map_or(NullabilityFact::Unknown, |ty| self.type_fact(&ty));
        declaration
            .child_nodes()
            .filter(|n| n.kind() == SyntaxKind::VariableDeclarator)
            .filter_map(|declarator| {
                let name = declarator.first_token()?;
                Some(Binding {
                    name: normalize(name.text()).to_string(),
                    node: declarator.clone(),
                    fact,
                })
            })
            .collect()
    }

    fn statement_list_bindings(&self, list: &SyntaxNode, child: &SyntaxNode, use_site: &SyntaxNode) -> Vec<Binding> {
        let mut bindings = Vec::new();

        for sibling in list.child_nodes() {
            if sibling.index_in_parent() >= child.index_in_parent() {
                break;
            }
            if let Some(declaration) = sibling.child_of_kind(SyntaxKind::VariableDeclaration) {
                if sibling.kind() == SyntaxKind::LocalDeclarationStatement {
                    bindings.extend(self.declarator_bindings(&declaration));
                }
            }
            if leaks_designations(sibling.kind()) {
                bindings.extend(
                    self.designations(&sibling)
                        .into_iter()
                        .filter(|b| !crosses_boundary(&b.node, &sibling, None)),
                );
            }
        }

        if child.kind() == SyntaxKind::LocalDeclarationStatement {
            if let Some(declaration) = child.child_of_kind(SyntaxKind::VariableDeclaration) {
                bindings.extend(
                    self.declarator_bindings(&declaration)
                        .into_iter()
                        .filter(|b| b.node.span().end <= use_site.span().start),
                );
            }
        }
        bindings.extend(self.designations_before(child, use_site));
        bindings
    }

    /// Designations inside `statement` that precede and are in scope at `use_site`
    fn designations_before(&self, statement: &SyntaxNode, use_site: &SyntaxNode) -> Vec<Binding> {
        self.designations(statement)
            .into_iter()
            .filter(|b| b.node.span().end <= use_site.span().start)
            .filter(|b| !crosses_boundary(&b.node, statement, Some(use_site)))
            .collect()
    }

    /// Pattern, `out var` and deconstruction designations below `node`
    fn designations(&self, node: &SyntaxNode) -> Vec<Binding> {
        let mut bindings = Vec::new();
        for candidate in node.descendants() {
            match candidate.kind() {
                SyntaxKind::DeclarationPattern | SyntaxKind::DeclarationExpression => {
                    let fact = candidate
                        .child_of_kind(SyntaxKind::Type)
                        .map_or(NullabilityFact::Unknown, |ty| self.type_fact(&ty));
                    if let Some(name) = candidate
                        .child_tokens()
                        .find(|t| t.kind() == TokenKind::Identifier)
                    {
                        bindings.push(Binding {
                            name: normalize(name.text()).to_string(),
                            node: candidate.clone(),
                            fact,
                        });
                    }
                    if let Some(designation) = candidate.child_of_kind(SyntaxKind::ParenthesizedDesignation) {
                        bindings.extend(unknown_bindings(&designation, &candidate));
                    }
                }
                SyntaxKind::VarPattern => {
                    bindings.extend(unknown_bindings(&candidate, &candidate));
                }
                SyntaxKind::RecursivePattern => {
                    let tokens: Vec<SyntaxToken> = candidate.child_tokens().collect();
                    if let [.., close, name] = tokens.as_slice() {
                        if name.kind() == TokenKind::Identifier && (close.is_punct("}") || close.is_punct(")")) {
                            bindings.push(Binding {
                                name: normalize(name.text()).to_string(),
                                node: candidate.clone(),
                                fact: NullabilityFact::Unknown,
                            });
                        }
                    }
                }
                _ => {}
            }
        }
        bindings
    }

    fn foreach_bindings(&self, statement: &SyntaxNode) -> Vec<Binding> {
        let ty = match statement.child_of_kind(SyntaxKind::Type) {
            Some(ty) => ty,
            None => return Vec::new(),
        };
        let fact = self.type_fact(&ty);
        let mut bindings: Vec<Binding> = statement
            .child_tokens()
            .filter(|t| t.index_in_parent() > ty.index_in_parent() && t.kind() == TokenKind::Identifier)
            .take(1)
            .map(|name| Binding {
                name: normalize(name.text()).to_string(),
                node: statement.clone(),
                fact,
            })
            .collect();
        if let Some(designation) = statement.child_of_kind(SyntaxKind::ParenthesizedDesignation) {
            bindings.extend(unknown_bindings(&designation, statement));
        }
        bindings
    }

    fn catch_bindings(&self, clause: &SyntaxNode) -> Vec<Binding> {
        let declaration = match clause.child_of_kind(SyntaxKind::CatchDeclaration) {
            Some(declaration) => declaration,
            None => return Vec::new(),
        };
        let fact = declaration
            .child_of_kind(SyntaxKind::Type)
            .map_or(NullabilityFact::Unknown, |ty| self.type_fact(&ty));
        declaration
            .child_tokens()
            .filter(|t| t.kind() == TokenKind::Identifier)
            .map(|name| Binding {
                name: normalize(name.text()).to_string(),
                node: declaration.clone(),
                fact,
            })
            .collect()
    }

    /// Fields, properties and primary constructor parameters of a type
    fn member_bindings(&self, type_declaration: &SyntaxNode) -> Vec<Binding> {
        let mut bindings = self.parameter_bindings(type_declaration);
        for member in type_declaration.child_nodes() {
            match member.kind() {
                SyntaxKind::FieldDeclaration => {
                    if let Some(declaration) = member.child_of_kind(SyntaxKind::VariableDeclaration) {
                        bindings.extend(self.declarator_bindings(&declaration));
                    }
                }
                SyntaxKind::PropertyDeclaration => {
                    if let Some((name, fact)) = self.named_member(&member) {
                        bindings.push(Binding {
                            name,
                            node: member.clone(),
                            fact,
                        });
                    }
                }
                _ => {}
            }
        }
        bindings
    }

    /// Name and declared type fact of a property or method
    fn named_member(&self, member: &SyntaxNode) -> Option<(String, NullabilityFact)> {
        let ty = member.child_of_kind(SyntaxKind::Type)?;
        let children = member.children();
        let type_index = ty.index_in_parent();
        let name = children
            .get(type_index + 1)
            .and_then(|c| c.clone().into_token())
            .filter(|t| t.kind() == TokenKind::Identifier)?;
        let is_explicit_implementation = children
            .get(type_index + 2)
            .and_then(|c| c.clone().into_token())
            .map_or(false, |t| t.is_punct("."));
        if is_explicit_implementation {
            return None;
        }
        Some((normalize(name.text()).to_string(), self.type_fact(&ty)))
    }

    /// `this.name`
    fn this_member_fact(&self, access: &SyntaxNode) -> NullabilityFact {
        let name = match this_member_name(access) {
            Some(name) => name,
            None => return NullabilityFact::Unknown,
        };
        let type_declaration = match access.ancestors().find(|a| a.kind() == SyntaxKind::TypeDeclaration) {
            Some(declaration) => declaration,
            None => return NullabilityFact::Unknown,
        };
        let facts: Vec<NullabilityFact> = self
            .member_bindings(&type_declaration)
            .into_iter()
            .filter(|b| b.name == name)
            .map(|b| b.fact)
            .collect();
        agree(&facts)
    }

    /// Return type of a call to a method or local function in scope
    fn invocation_fact(&self, invocation: &SyntaxNode) -> NullabilityFact {
        let callee = match invocation.child_nodes().next() {
            Some(callee) => callee,
            None => return NullabilityFact::Unknown,
        };
        let (name, local_allowed) = match callee.kind() {
            SyntaxKind::IdentifierName => match identifier_text(&callee) {
                Some(name) => (name, true),
                None => return NullabilityFact::Unknown,
            },
            SyntaxKind::MemberAccessExpression => match this_member_name(&callee) {
                Some(name) => (name, false),
                None => return NullabilityFact::Unknown,
            },
            _ => return NullabilityFact::Unknown,
        };

        if name == "nameof" && local_allowed {
            return self.enabled_fact(invocation.span().start);
        }

        if local_allowed {
            for scope in invocation.ancestors().filter(|a| a.kind().is_statement_list()) {
                let facts: Vec<NullabilityFact> = scope
                    .child_nodes()
                    .filter(|n| n.kind() == SyntaxKind::LocalFunctionStatement)
                    .filter_map(|f| self.named_member(&f))
                    .filter(|(candidate, _)| *candidate == name)
                    .map(|(_, fact)| fact)
                    .collect();
                if !facts.is_empty() {
                    return agree(&facts);
                }
            }
        }

        let type_declaration = match invocation.ancestors().find(|a| a.kind() == SyntaxKind::TypeDeclaration) {
            Some(declaration) => declaration,
            None => return NullabilityFact::Unknown,
        };
        let facts: Vec<NullabilityFact> = type_declaration
            .child_nodes()
            .filter(|n| n.kind() == SyntaxKind::MethodDeclaration)
            .filter_map(|m| self.named_member(&m))
            .filter(|(candidate, _)| *candidate == name)
            .map(|(_, fact)| fact)
            .collect();
        agree(&facts)
    }
}

fn normalize(name: &str) -> &str {
    name.strip_prefix('@').unwrap_or(name)
}

fn identifier_text(node: &SyntaxNode) -> Option<String> {
    let token = node.first_token()?;
    (token.kind() == TokenKind::Identifier).then(|| normalize(token.text()).to_string())
}

fn this_member_name(access: &SyntaxNode) -> Option<String> {
    let mut parts = access.child_nodes();
    let receiver = parts.next()?;
    let member = parts.next()?;
    if receiver.kind() != SyntaxKind::ThisExpression || member.kind() != SyntaxKind::IdentifierName {
        return None;
    }
    identifier_text(&member)
}

/// One fact if all candidates agree, `Unknown` otherwise
fn agree(facts: &[NullabilityFact]) -> NullabilityFact {
    match facts.first() {
        Some(first) if facts.iter().all(|f| f == first) => *first,
        _ => NullabilityFact::Unknown,
    }
}

fn unknown_bindings(designation: &SyntaxNode, owner: &SyntaxNode) -> Vec<Binding> {
    designation
        .tokens()
        .into_iter()
        .filter(|t| t.kind() == TokenKind::Identifier && t.text() != "var" && t.text() != "_")
        .map(|t| Binding {
            name: normalize(t.text()).to_string(),
            node: owner.clone(),
            fact: NullabilityFact::Unknown,
        })
        .collect()
}

/// Statements whose pattern variables stay in scope for later statements
fn leaks_designations(kind: SyntaxKind) -> bool {
    matches!(
        kind,
        SyntaxKind::ExpressionStatement
            | SyntaxKind::LocalDeclarationStatement
            | SyntaxKind::IfStatement
            | SyntaxKind::ReturnStatement
            | SyntaxKind::ThrowStatement
            | SyntaxKind::YieldStatement
            | SyntaxKind::CaseSwitchLabel
    )
}

fn is_scope_boundary(kind: SyntaxKind) -> bool {
    kind.is_statement()
        || kind.is_lambda()
        || matches!(
            kind,
            SyntaxKind::SwitchSection | SyntaxKind::SwitchExpressionArm | SyntaxKind::CatchClause
        )
}

/// Whether a scope boundary between `node` and `stop` hides `node` from
/// `use_site` (or from everything after `stop` when `use_site` is `None`)
fn crosses_boundary(node: &SyntaxNode, stop: &SyntaxNode, use_site: Option<&SyntaxNode>) -> bool {
    for ancestor in node.ancestors() {
        if ancestor == *stop {
            return false;
        }
        if !is_scope_boundary(ancestor.kind()) {
            continue;
        }
        let contains_use = use_site.map_or(false, |u| ancestor.span().contains_span(u.span()));
        if !contains_use {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn facts_of(source: &str, default_context: NullableContext) -> Vec<(String, NullabilityFact)> {
        let root = parse(source).unwrap();
        let binder = DeclaredNullability::new(&root, default_context);
        root.descendants()
            .filter(|n| n.kind() == SyntaxKind::BinaryExpression && n.child_token("==").is_some())
            .map(|n| {
                let operand = n.child_nodes().next().unwrap();
                (operand.text(), binder.fact(&operand))
            })
            .collect()
    }

    fn fact_of(source: &str) -> NullabilityFact {
        let facts = facts_of(source, NullableContext::Disable);
        assert_eq!(facts.len(), 1, "{:?}", facts);
        facts[0].1
    }

    #[test]
    fn directives_switch_context() {
        let source = "int x;\n#nullable enable\nint y;\n#nullable restore\nint z;\n#nullable disable warnings\n";
        let root = parse(source).unwrap();
        let binder = DeclaredNullability::new(&root, NullableContext::Disable);
        assert_eq!(binder.context_at(0), NullableContext::Disable);
        assert_eq!(binder.context_at(source.find("int y").unwrap()), NullableContext::Enable);
        assert_eq!(binder.context_at(source.find("int z").unwrap()), NullableContext::Disable);
        assert_eq!(binder.context_at(source.len()), NullableContext::Disable);
    }

    #[test]
    fn locals_follow_declared_type() {
        assert_eq!(
            fact_of("#nullable enable\nstring a = \"x\";\nvar b = a == null;"),
            NullabilityFact::NotAnnotated
        );
        assert_eq!(
            fact_of("#nullable enable\nstring? a = \"x\";\nvar b = a == null;"),
            NullabilityFact::Annotated
        );
        assert_eq!(
            fact_of("#nullable enable\nvar a = \"x\";\nvar b = a == null;"),
            NullabilityFact::Unknown
        );
        assert_eq!(fact_of("string a = \"x\";\nvar b = a == null;"), NullabilityFact::Unknown);
        assert_eq!(fact_of("int a = 1;\nvar b = a == null;"), NullabilityFact::NotAnnotated);
    }

    #[test]
    fn parameters_fields_and_properties() {
        let source = r#"#nullable enable
class C<T>
{
    private string _name = "";
    private string? _nick;
    public string Title { get; set; } = "";

    void M(string a, T t, object? o)
    {
        var r1 = a == null;
        var r2 = t == null;
        var r3 = o == null;
        var r4 = _name == null;
        var r5 = _nick == null;
        var r6 = this.Title == null;
        var r7 = Title == null;
    }
}
"#;
        let facts = facts_of(source, NullableContext::Disable);
        let expected = vec![
            ("a", NullabilityFact::NotAnnotated),
            ("t", NullabilityFact::Unknown),
            ("o", NullabilityFact::Annotated),
            ("_name", NullabilityFact::NotAnnotated),
            ("_nick", NullabilityFact::Annotated),
            ("this.Title", NullabilityFact::NotAnnotated),
            ("Title", NullabilityFact::NotAnnotated),
        ];
        let expected: Vec<(String, NullabilityFact)> =
            expected.into_iter().map(|(n, f)| (n.to_string(), f)).collect();
        assert_eq!(facts, expected);
    }

    #[test]
    fn lambda_parameters_shadow() {
        let source = "#nullable enable\nstring s = \"\";\nFunc<string?, bool> f = s => s == null;\n";
        assert_eq!(fact_of(source), NullabilityFact::Unknown);
    }

    #[test]
    fn pattern_designations_are_scoped() {
        let source = "#nullable enable\nobject o = \"\";\nif (o is string s && s == null) { }\n";
        assert_eq!(fact_of(source), NullabilityFact::NotAnnotated);

        let source = "#nullable enable\nvoid M(object o) { if (o is string s) { } var x = s == null; }\n";
        assert_eq!(fact_of(source), NullabilityFact::NotAnnotated);

        let source = "#nullable enable\nvoid M(object o) { while (o is string s) { } var x = s == null; }\n";
        assert_eq!(fact_of(source), NullabilityFact::Unknown);
    }

    #[test]
    fn foreach_catch_and_out_var() {
        let source = "#nullable enable\nforeach (string item in items) { var x = item == null; }\n";
        assert_eq!(fact_of(source), NullabilityFact::NotAnnotated);

        let source = "#nullable enable\ntry { } catch (Exception e) { var x = e == null; }\n";
        assert_eq!(fact_of(source), NullabilityFact::NotAnnotated);

        let source = "#nullable enable\nif (map.TryGetValue(k, out var v) && v == null) { }\n";
        assert_eq!(fact_of(source), NullabilityFact::Unknown);
    }

    #[test]
    fn setter_value_and_method_returns() {
        let source = r#"#nullable enable
class C
{
    string Name { get; set { var x = value == null; } }
}
"#;
        assert_eq!(fact_of(source), NullabilityFact::NotAnnotated);

        let source = r#"#nullable enable
class C
{
    string Make() => "";
    void M() { var x = Make() == null; }
}
"#;
        assert_eq!(fact_of(source), NullabilityFact::NotAnnotated);
    }

    #[test]
    fn literals_and_parentheses() {
        assert_eq!(fact_of("#nullable enable\nvar x = (\"a\") == null;"), NullabilityFact::NotAnnotated);
        assert_eq!(fact_of("var x = \"a\" == null;"), NullabilityFact::Unknown);
        assert_eq!(fact_of("#nullable enable\nvar x = Unknown() == null;"), NullabilityFact::Unknown);
        assert_eq!(fact_of("#nullable enable\nvar x = $\"{1}\" == null;"), NullabilityFact::NotAnnotated);
    }

    #[test]
    fn pointers_are_unknown() {
        let source = "#nullable enable\nclass C { unsafe void M(byte* p) { var x = p == null; } }\n";
        assert_eq!(fact_of(source), NullabilityFact::Unknown);
    }
}
