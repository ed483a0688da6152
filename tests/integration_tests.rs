//! Integration tests for the complete LinkedQL pipeline
//!
//! These tests verify end-to-end functionality across crates:
//! - N-Quads / N-Triples → QuadStore
//! - Step tree → Compiler → Plan
//! - Plan → Executor → ResultStream → JSON-LD-like output
//!
//! Run with: cargo test --test integration_tests

use anyhow::Result;
use linkedql::{
    compile, compile_and_run, compile_and_run_with_config, ExecutionConfig, LinkedQlError,
    QueryResult, Step, Value, ValueFilter,
};
use linkedql_quadstore::{Quad, QuadStore};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use tempfile::tempdir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn collect(query: &Step, store: &QuadStore) -> Result<Vec<QueryResult>> {
    Ok(compile_and_run(query, store)?.collect::<linkedql::Result<Vec<_>>>()?)
}

fn value_set(results: &[QueryResult]) -> HashSet<Value> {
    results
        .iter()
        .filter_map(|r| r.as_value().cloned())
        .collect()
}

const PEOPLE_NQ: &str = r#"
<http://ex/alice> <http://ex/likes> <http://ex/bob> .
<http://ex/alice> <http://ex/name> "Alice" .
<http://ex/bob> <http://ex/name> "Bob" .
"#;

const NAME: &str = "http://ex/name";
const LIKES: &str = "http://ex/likes";

fn ex(local: &str) -> Value {
    Value::iri(format!("http://ex/{local}"))
}

// ============================================================================
// Scenarios over a single triple
// ============================================================================

#[test]
fn test_all_vertices_of_single_triple() -> Result<()> {
    init_tracing();
    let store = QuadStore::from_quads([Quad::iri("alice", "likes", "bob", "")]);

    let results = collect(&Step::all(), &store)?;
    let expected: HashSet<Value> = ["alice", "likes", "bob"].into_iter().map(Value::iri).collect();
    assert_eq!(results.len(), 3);
    assert_eq!(value_set(&results), expected);
    Ok(())
}

#[test]
fn test_visit_and_back() -> Result<()> {
    init_tracing();
    let store = QuadStore::from_quads([Quad::iri("alice", "likes", "bob", "")]);
    let visit = Step::vertex(vec![Value::iri("alice")]).visit(Step::iris(["likes"]));

    let forward = collect(&visit, &store)?;
    assert_eq!(value_set(&forward), HashSet::from([Value::iri("bob")]));

    let back = collect(&visit.back(), &store)?;
    assert_eq!(value_set(&back), HashSet::from([Value::iri("alice")]));
    Ok(())
}

#[test]
fn test_both_directions() -> Result<()> {
    init_tracing();
    let store = QuadStore::from_quads([
        Quad::iri("alice", "likes", "bob", ""),
        Quad::iri("bob", "likes", "dan", ""),
    ]);
    let query = Step::vertex(vec![Value::iri("bob")]).both(Step::iris(["likes"]));

    let results = collect(&query, &store)?;
    assert_eq!(
        value_set(&results),
        HashSet::from([Value::iri("alice"), Value::iri("dan")])
    );
    Ok(())
}

// ============================================================================
// Loaded data: joins and documents
// ============================================================================

#[test]
fn test_optional_over_loaded_nquads() -> Result<()> {
    init_tracing();
    let mut store = QuadStore::new();
    store.load_nquads(PEOPLE_NQ)?;

    let query = Step::all()
        .properties([NAME])
        .optional(Step::placeholder().properties([LIKES]))
        .select();
    let rows = collect(&query, &store)?;

    let json: Vec<_> = rows.iter().map(QueryResult::to_json).collect();
    assert_eq!(
        json,
        vec![
            json!({ NAME: "Alice", LIKES: { "@id": "http://ex/bob" } }),
            json!({ NAME: "Bob" }),
        ]
    );
    Ok(())
}

#[test]
fn test_documents_from_ntriples_file() -> Result<()> {
    init_tracing();
    let dir = tempdir()?;
    let path = dir.path().join("people.nt");
    std::fs::write(
        &path,
        format!("{PEOPLE_NQ}<http://ex/bob> <http://ex/likes> <http://ex/alice> .\n"),
    )?;

    let mut store = QuadStore::new();
    let added = store.load_path(&path)?;
    assert_eq!(added, 4);

    let query = Step::all().properties([NAME, LIKES]).documents();
    let docs: Vec<_> = collect(&query, &store)?
        .iter()
        .map(QueryResult::to_json)
        .collect();
    assert_eq!(
        docs,
        vec![
            json!({ "@id": "http://ex/alice", NAME: ["Alice"], LIKES: [{ "@id": "http://ex/bob" }] }),
            json!({ "@id": "http://ex/bob", NAME: ["Bob"], LIKES: [{ "@id": "http://ex/alice" }] }),
        ]
    );
    Ok(())
}

#[test]
fn test_where_with_tags_over_loaded_data() -> Result<()> {
    init_tracing();
    let mut store = QuadStore::new();
    store.load_nquads(PEOPLE_NQ)?;

    let query = Step::all()
        .tag("person")
        .where_(vec![
            Step::placeholder()
                .visit(Step::iris([LIKES]))
                .visit(Step::iris([NAME]))
                .tag("likesName"),
            Step::placeholder().visit(Step::iris([NAME])).tag("name"),
        ])
        .select_tags(["person", "likesName"]);
    let rows = collect(&query, &store)?;

    let expected = BTreeMap::from([
        ("person".to_string(), ex("alice")),
        ("likesName".to_string(), Value::string("Bob")),
    ]);
    assert_eq!(rows, vec![QueryResult::Tags(expected)]);
    Ok(())
}

// ============================================================================
// Configuration and errors
// ============================================================================

#[test]
fn test_max_results_from_json_config() -> Result<()> {
    init_tracing();
    let store = QuadStore::from_quads([
        Quad::iri("alice", "likes", "bob", ""),
        Quad::iri("bob", "likes", "dan", ""),
    ]);
    let config = ExecutionConfig::from_json_str(r#"{ "max_results": 2 }"#)?;

    let mut stream = compile_and_run_with_config(&Step::all(), &store, &config)?;
    assert!(stream.next().is_some());
    assert!(stream.next().is_some());
    assert!(stream.next().is_none());
    assert_eq!(stream.emitted(), 2);
    assert!(stream.error().is_none());
    Ok(())
}

#[test]
fn test_compile_time_errors_abort_before_running() {
    init_tracing();
    let config = ExecutionConfig::default();

    let nested = Step::all().select().count();
    assert!(matches!(
        compile(&nested, &config),
        Err(LinkedQlError::MalformedStep(_))
    ));

    let unbound = Step::all().visit(Step::iris(["likes"])).back_to("missing");
    assert!(matches!(
        compile(&unbound, &config),
        Err(LinkedQlError::UnresolvedTag(tag)) if tag == "missing"
    ));

    let bad_pattern = Step::all().filter(ValueFilter::regexp("(unclosed"));
    assert!(matches!(
        compile(&bad_pattern, &config),
        Err(LinkedQlError::MalformedStep(_))
    ));

    let blank_operand = Step::all().less_than(Value::blank("b"));
    assert!(matches!(
        compile(&blank_operand, &config),
        Err(LinkedQlError::TypeMismatch { .. })
    ));

    for empty in [
        Step::all().where_(vec![]),
        Step::all().union(vec![]),
        Step::all().properties(Vec::<&str>::new()),
        Step::all().has(Step::iris(["likes"]), vec![]),
        Step::entities([""]),
    ] {
        let err = compile(&empty, &config).expect_err("should be rejected");
        assert!(err.is_compile_time(), "{err}");
    }
}

#[test]
fn test_run_time_error_ends_stream_after_partial_results() {
    init_tracing();
    let store = QuadStore::from_quads([
        Quad::new(Value::iri("probe"), Value::iri("reading"), Value::int(-1)),
        Quad::new(Value::iri("probe"), Value::iri("reading"), Value::float(f64::NAN)),
        Quad::new(Value::iri("probe"), Value::iri("reading"), Value::int(-5)),
    ]);
    let query = Step::all().less_than(Value::int(0));

    let mut stream = compile_and_run(&query, &store).expect("query should compile");
    assert_eq!(stream.next(), Some(Ok(QueryResult::Value(Value::int(-1)))));
    assert!(matches!(
        stream.next(),
        Some(Err(LinkedQlError::TypeMismatch { .. }))
    ));
    assert!(stream.next().is_none());
    assert!(matches!(
        stream.error(),
        Some(LinkedQlError::TypeMismatch { .. })
    ));
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_queries_share_store() -> Result<()> {
    init_tracing();
    let mut store = QuadStore::new();
    store.load_nquads(PEOPLE_NQ)?;
    let query = Step::all().visit(Step::iris([NAME])).order();

    let results: Vec<Vec<QueryResult>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(|| collect(&query, &store)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("query thread panicked"))
            .collect::<Result<_>>()
    })?;

    let expected = vec![
        QueryResult::Value(Value::string("Alice")),
        QueryResult::Value(Value::string("Bob")),
    ];
    for result in results {
        assert_eq!(result, expected);
    }
    Ok(())
}
