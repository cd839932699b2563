//! Root Rewrite Tests
//!
//! Tests for rewrite invariants:
//! - Rewriting twice equals rewriting once
//! - Only the outermost data-source argument is substituted
//! - Method identity and trailing arguments are preserved
//! - A rewritten tree evaluates like the same query over the source

use memquery::expr::{QueryRoot, SourceRef};
use memquery::provider::RootRewriter;
use memquery::{lambda, Expr, LocalQueryable, Method, ProviderContext, QueryProvider};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn rows() -> Vec<Value> {
    vec![
        json!({ "id": 1, "name": "a" }),
        json!({ "id": 2, "name": "b" }),
        json!({ "id": 3, "name": "c" }),
    ]
}

fn source() -> Expr {
    Expr::Source(SourceRef::new("users", rows()))
}

fn provider() -> QueryProvider<Value> {
    QueryProvider::new(
        LocalQueryable::from_values("users", rows()),
        ProviderContext::with_defaults(),
    )
}

/// Queries with a root in data-source position, built over `base`
fn queries_over(base: Expr) -> Vec<Expr> {
    vec![
        base.clone(),
        Expr::call(
            Method::Where,
            vec![base.clone(), lambda("x", |x| x.field("id").gt(1))],
        ),
        Expr::call(
            Method::Select,
            vec![base.clone(), lambda("x", |x| x.field("name"))],
        ),
        Expr::call(
            Method::OrderByDescending,
            vec![base.clone(), lambda("x", |x| x.field("id"))],
        ),
        Expr::call(Method::Take, vec![base.clone(), Expr::constant(2)]),
        Expr::call(Method::Count, vec![base.clone()]),
        Expr::call(
            Method::Any,
            vec![base.clone(), lambda("x", |x| x.field("name").equals("c"))],
        ),
        Expr::call(
            Method::Extension("AsNoTracking".to_string()),
            vec![base],
        ),
    ]
}

// =============================================================================
// Idempotence
// =============================================================================

/// rewrite(rewrite(e)) == rewrite(e)
#[test]
fn test_rewrite_is_idempotent() {
    let source = source();
    let rewriter = RootRewriter::new(&source);

    for query in queries_over(Expr::entity_root("users")) {
        let once = rewriter.rewrite(&query, None);
        let twice = rewriter.rewrite(&once, None);
        assert_eq!(once, twice, "not idempotent for {}", query);
    }
}

/// Trees already bound to a source pass through unchanged.
#[test]
fn test_bound_trees_unchanged() {
    let source = source();
    let rewriter = RootRewriter::new(&source);

    for query in queries_over(source.clone()) {
        assert_eq!(rewriter.rewrite(&query, None), query);
    }
}

// =============================================================================
// Correctness
// =============================================================================

/// Outermost call keeps its method and trailing arguments.
#[test]
fn test_method_and_trailing_arguments_preserved() {
    let source = source();
    let rewriter = RootRewriter::new(&source);
    let predicate = lambda("x", |x| x.field("id").equals(2));
    let query = Expr::call(
        Method::Where,
        vec![Expr::entity_root("users"), predicate.clone()],
    );

    let rewritten = rewriter.rewrite(&query, None);
    let call = rewritten.as_call().unwrap();
    assert_eq!(call.method, Method::Where);
    assert_eq!(call.args.len(), 2);
    assert_eq!(call.args[0], source);
    assert_eq!(call.args[1], predicate);
}

/// Executing over a root equals executing the same query over the source.
#[test]
fn test_rewrite_preserves_results() {
    let provider = provider();

    let over_root = queries_over(Expr::entity_root("users"));
    let over_source = queries_over(source());

    for (root_query, source_query) in over_root.iter().zip(over_source.iter()) {
        assert_eq!(
            provider.execute(root_query).unwrap(),
            provider.execute(source_query).unwrap(),
            "results differ for {}",
            root_query
        );
    }
}

/// Roots below the outermost call are left for the engine to reject.
#[test]
fn test_nested_root_rejected_as_unsupported() {
    let nested = Expr::call(
        Method::Count,
        vec![Expr::call(
            Method::Where,
            vec![
                Expr::entity_root("users"),
                lambda("x", |x| x.field("id").gt(1)),
            ],
        )],
    );

    let source = source();
    let rewritten = RootRewriter::new(&source).rewrite(&nested, None);
    assert_eq!(rewritten, nested);

    let err = provider().execute(&nested).unwrap_err();
    assert!(err.is_unsupported());
}

/// The rewrite target is the outermost source argument or a bare root.
#[test]
fn test_rewrite_target() {
    let root = Expr::entity_root("users");
    assert!(matches!(
        RootRewriter::target(&root),
        Some(QueryRoot::Entity { .. })
    ));

    let take = Expr::call(Method::Take, vec![root, Expr::constant(1)]);
    assert!(RootRewriter::target(&take).is_some());
    assert!(RootRewriter::target(&source()).is_none());
}
