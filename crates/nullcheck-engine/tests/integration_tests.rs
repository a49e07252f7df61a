//! End-to-end tests: parse, bind, classify and fix C# sources
//!
//! Sources mark the expected diagnostic span with `[|` and `|]`.

use nullcheck_core::{NullableContext, RuleCategory};
use nullcheck_engine::{fix_all, Classifier, Rewriter};
use nullcheck_syntax::{parse, DeclaredNullability, SyntaxNode};
use pretty_assertions::assert_eq;

/// Strip the span markers, returning the source and the marked range
fn unmark(marked: &str) -> (String, Option<(usize, usize)>) {
    match (marked.find("[|"), marked.find("|]")) {
        (Some(start), Some(end)) => {
            let source = format!("{}{}{}", &marked[..start], &marked[start + 2..end], &marked[end + 2..]);
            (source, Some((start, end - 2)))
        }
        _ => (marked.to_string(), None),
    }
}

fn binder(root: &SyntaxNode) -> DeclaredNullability {
    DeclaredNullability::new(root, NullableContext::Disable)
}

fn verify_no_diagnostics(source: &str) {
    let root = parse(source).unwrap();
    let facts = binder(&root);
    let diagnostics = Classifier::new(&facts).classify(&root);
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {:?}", diagnostics);
}

fn verify_fix(marked: &str, category: RuleCategory, culprit: &str, fixed: &str) {
    let (source, span) = unmark(marked);
    let (start, end) = span.expect("source has no span marker");

    let root = parse(&source).unwrap();
    let facts = binder(&root);
    let diagnostics = Classifier::new(&facts).classify(&root);
    assert_eq!(diagnostics.len(), 1, "diagnostics: {:?}", diagnostics);

    let diagnostic = &diagnostics[0];
    assert_eq!(diagnostic.category, category);
    assert_eq!(diagnostic.culprit, culprit);
    assert_eq!((diagnostic.span.start, diagnostic.span.end), (start, end));

    let rewritten = Rewriter::new().try_rewrite(&root, diagnostic).unwrap();
    assert_eq!(rewritten.full_text(), fixed);
}

#[test]
fn nullable_disabled() {
    verify_no_diagnostics(
        r#"
namespace ConsoleApplication1
{
    class TypeName
    {
        bool Test(string a) {
            if (a == null) {
                return false;
            }
            return true;
        }
    }
}"#,
    );
}

#[test]
fn nullable_type() {
    verify_no_diagnostics(
        r#"
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        bool Test(string? a) {
            if (a == null) {
                return false;
            }
            return true;
        }
    }
}"#,
    );
}

#[test]
fn if_null() {
    verify_fix(
        r#"
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        bool Test(string a) {
            if ([|a == null|]) {
                return false;
            }
            return true;
        }
    }
}"#,
        RuleCategory::NullCheck,
        "a",
        r#"
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        bool Test(string a) {
            return true;
        }
    }
}"#,
    );
}

#[test]
fn if_not_null_single_statement() {
    verify_fix(
        r#"
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        bool Test(string a) {
            if ([|a != null|]) {
                return false;
            }
            return true;
        }
    }
}"#,
        RuleCategory::NullCheck,
        "a",
        r#"
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        bool Test(string a) {
            return false;
            return true;
        }
    }
}"#,
    );
}

#[test]
fn if_not_null_several_statements() {
    verify_fix(
        r#"
using System;
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        bool Test(string a) {
            if ([|a != null|]) {
                Console.WriteLine(1);
                Console.WriteLine(2);

                return false;
            }
            return true;
        }
    }
}"#,
        RuleCategory::NullCheck,
        "a",
        r#"
using System;
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        bool Test(string a) {
            Console.WriteLine(1);
            Console.WriteLine(2);

            return false;
            return true;
        }
    }
}"#,
    );
}

#[test]
fn check_inside_condition_becomes_true() {
    verify_fix(
        r#"
using System;
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        bool Test(string a) {
            if (5 > 3 && [|a != null|]) {
                return false;
            }
            return true;
        }
    }
}"#,
        RuleCategory::NullCheck,
        "a",
        r#"
using System;
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        bool Test(string a) {
            if (5 > 3 && true) {
                return false;
            }
            return true;
        }
    }
}"#,
    );
}

#[test]
fn check_inside_condition_becomes_false() {
    verify_fix(
        r#"
using System;
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        bool Test(string a) {
            if ([|a == null|] && 5 > 3) {
                return false;
            }
            return true;
        }
    }
}"#,
        RuleCategory::NullCheck,
        "a",
        r#"
using System;
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        bool Test(string a) {
            if (false && 5 > 3) {
                return false;
            }
            return true;
        }
    }
}"#,
    );
}

#[test]
fn ternary_in_parentheses() {
    verify_fix(
        r#"
using System;
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        bool Test(string a) {
            return ([|a == null|] ? true : false);
        }
    }
}"#,
        RuleCategory::NullCheck,
        "a",
        r#"
using System;
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        bool Test(string a) {
            return (false);
        }
    }
}"#,
    );
}

#[test]
fn ternary_condition() {
    verify_fix(
        r#"
using System;
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        void Test(string a) {
            int c = [|a != null|] ? 4 : 3;
            return;
        }
    }
}"#,
        RuleCategory::NullCheck,
        "a",
        r#"
using System;
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        void Test(string a) {
            int c = 4;
            return;
        }
    }
}"#,
    );
}

#[test]
fn ternary_with_compound_condition() {
    verify_fix(
        r#"
using System;
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        void Test(string a) {
            int c = [|a != null|] && a.Length > 2 ? 4 : 3;
            return;
        }
    }
}"#,
        RuleCategory::NullCheck,
        "a",
        r#"
using System;
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        void Test(string a) {
            int c = true && a.Length > 2 ? 4 : 3;
            return;
        }
    }
}"#,
    );
}

#[test]
fn ternary_with_parenthesized_condition() {
    verify_fix(
        r#"
using System;
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        void Test(string a) {
            int c = ([|a != null|]) ? 4 : 3;
            return;
        }
    }
}"#,
        RuleCategory::NullCheck,
        "a",
        r#"
using System;
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        void Test(string a) {
            int c = 4;
            return;
        }
    }
}"#,
    );
}

#[test]
fn coalesce_operator() {
    verify_fix(
        r#"
using System;
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        void Test(string a) {
            string c = [|a ?? string.Empty|];
            return;
        }
    }
}"#,
        RuleCategory::NullCoalesce,
        "a",
        r#"
using System;
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        void Test(string a) {
            string c = a;
            return;
        }
    }
}"#,
    );
}

#[test]
fn coalesce_assignment() {
    verify_fix(
        r#"
using System;
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        void Test(string a) {
            [|a ??= string.Empty|];
            return;
        }
    }
}"#,
        RuleCategory::NullCoalesce,
        "a",
        r#"
using System;
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        void Test(string a) {
            return;
        }
    }
}"#,
    );
}

#[test]
fn equals_null_in_if() {
    verify_fix(
        r#"
using System;
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        bool Test(string a) {
            if ([|a.Equals(null)|]) {
                return false;
            }
            return true;
        }
    }
}"#,
        RuleCategory::NullCheck,
        "a",
        r#"
using System;
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        bool Test(string a) {
            return true;
        }
    }
}"#,
    );
}

#[test]
fn equals_null_in_compound_condition() {
    verify_fix(
        r#"
using System;
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        bool Test(string a) {
            if ([|a.Equals(null)|] || a.Length > 3) {
                return false;
            }
            return true;
        }
    }
}"#,
        RuleCategory::NullCheck,
        "a",
        r#"
using System;
#nullable enable

namespace ConsoleApplication1
{
    class TypeName
    {
        bool Test(string a) {
            if (false || a.Length > 3) {
                return false;
            }
            return true;
        }
    }
}"#,
    );
}

#[test]
fn conditional_access() {
    verify_fix(
        r#"
#nullable enable
class TypeName
{
    void Test(string a)
    {
        int? al = [|a?.Length|];
        var sl = a.Substring(0).Length;
    }
}
"#,
        RuleCategory::NullPropagation,
        "a",
        r#"
#nullable enable
class TypeName
{
    void Test(string a)
    {
        int? al = a.Length;
        var sl = a.Substring(0).Length;
    }
}
"#,
    );
}

#[test]
fn conditional_access_inside_interpolation() {
    verify_fix(
        "#nullable enable\nclass C\n{\n    void M(string s) { var x = $\"{[|s?.Length|]}\"; }\n}\n",
        RuleCategory::NullPropagation,
        "s",
        "#nullable enable\nclass C\n{\n    void M(string s) { var x = $\"{s.Length}\"; }\n}\n",
    );
}

#[test]
fn reference_equals_and_is_null() {
    verify_fix(
        r#"
#nullable enable
class TypeName
{
    bool Test(string a) => [|object.ReferenceEquals(null, a)|];
}
"#,
        RuleCategory::NullCheck,
        "a",
        r#"
#nullable enable
class TypeName
{
    bool Test(string a) => false;
}
"#,
    );

    verify_fix(
        r#"
#nullable enable
class TypeName
{
    bool Test(string a) => !([|a is null|]);
}
"#,
        RuleCategory::NullCheck,
        "a",
        r#"
#nullable enable
class TypeName
{
    bool Test(string a) => !(false);
}
"#,
    );
}

#[test]
fn fix_all_is_idempotent_and_preserves_unrelated_code() {
    let source = r#"
#nullable enable
class TypeName
{
    // unrelated
    private string? _cache;

    string Describe(string name, string? nick)
    {
        if (name == null)
        {
            return "";
        }
        var shown = nick ?? name ?? "anonymous";
        return shown?.Trim() + _cache;
    }
}
"#;
    let root = parse(source).unwrap();
    let outcome = fix_all(root, binder);

    let expected = r#"
#nullable enable
class TypeName
{
    // unrelated
    private string? _cache;

    string Describe(string name, string? nick)
    {
        var shown = nick ?? name;
        return shown?.Trim() + _cache;
    }
}
"#;
    assert_eq!(outcome.root.full_text(), expected);
    assert_eq!(outcome.applied.len(), 2);

    let again = fix_all(outcome.root.clone(), binder);
    assert!(!again.changed());
    assert_eq!(again.root.full_text(), expected);
}
