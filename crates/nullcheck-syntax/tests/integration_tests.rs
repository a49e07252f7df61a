//! Integration tests for parsing, binding and editing

use nullcheck_core::{NullabilityFact, NullableContext};
use nullcheck_syntax::{DeclaredNullability, PersistentTree, SourceFile, SyntaxKind, TreeMutation};
use pretty_assertions::assert_eq;

const SERVICE: &str = r#"// Customer lookups
using System;
using System.Collections.Generic;

#nullable enable

namespace Shop.Services;

public sealed class CustomerService : ICustomerService
{
    private readonly Dictionary<string, Customer> _cache = new();
    private readonly ILogger? _logger;

    public CustomerService(ILogger? logger)
    {
        _logger = logger;
    }

    public string Describe(Customer customer, string? nickname)
    {
        if (customer == null)
        {
            throw new ArgumentNullException(nameof(customer));
        }

        var name = nickname ?? customer.Name;
        _logger?.Log($"describing {name}");
        return customer?.Name + " (" + name + ")";
    }

    public bool TryFind(string id, out Customer? found)
    {
        return _cache.TryGetValue(id, out found);
    }
}
"#;

#[test]
fn parse_is_lossless() {
    let file = SourceFile::parse("CustomerService.cs", SERVICE).unwrap();
    assert_eq!(file.root.full_text(), SERVICE);
    assert_eq!(file.root.kind(), SyntaxKind::CompilationUnit);
    assert!(!file.is_generated());
}

#[test]
fn binder_answers_for_each_operand() {
    let file = SourceFile::parse("CustomerService.cs", SERVICE).unwrap();
    let binder = DeclaredNullability::new(&file.root, NullableContext::Disable);

    let fact_of = |text: &str| {
        let node = file
            .root
            .descendants()
            .find(|n| n.kind() == SyntaxKind::IdentifierName && n.text() == text)
            .unwrap();
        binder.fact(&node)
    };

    assert_eq!(fact_of("customer"), NullabilityFact::NotAnnotated);
    assert_eq!(fact_of("nickname"), NullabilityFact::Annotated);
    assert_eq!(fact_of("_logger"), NullabilityFact::Annotated);
    assert_eq!(fact_of("_cache"), NullabilityFact::NotAnnotated);
}

#[test]
fn disabled_context_is_unknown() {
    let source = SERVICE.replace("#nullable enable", "#nullable disable");
    let file = SourceFile::parse("CustomerService.cs", source).unwrap();
    let binder = DeclaredNullability::new(&file.root, NullableContext::Enable);

    let customer = file
        .root
        .descendants()
        .find(|n| n.kind() == SyntaxKind::IdentifierName && n.text() == "customer")
        .unwrap();
    assert_eq!(binder.fact(&customer), NullabilityFact::Unknown);
}

#[test]
fn edits_leave_the_original_intact() {
    let file = SourceFile::parse("CustomerService.cs", SERVICE).unwrap();
    let check = file
        .root
        .descendants()
        .find(|n| n.kind() == SyntaxKind::IfStatement)
        .unwrap();

    let edited = PersistentTree.remove(&check).unwrap();
    assert!(!edited.full_text().contains("ArgumentNullException"));
    assert_eq!(file.root.full_text(), SERVICE);
}
