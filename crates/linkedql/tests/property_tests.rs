use linkedql::*;
use linkedql_quadstore::Quad;
use proptest::prelude::*;
use std::collections::HashSet;

const MAX_NODES: usize = 8;
const REL_COUNT: usize = 3;
const MAX_EDGES: usize = 24;
const MAX_PICKS: usize = 12;

#[derive(Debug, Clone)]
struct GraphCase {
    edges: Vec<(usize, usize, usize)>, // (rel_idx, src_idx, dst_idx)
    picks: Vec<usize>,
    n: usize,
    k: usize,
}

fn graph_case_strategy() -> impl Strategy<Value = GraphCase> {
    (1usize..=MAX_NODES).prop_flat_map(|node_count| {
        (
            prop::collection::vec(
                (0usize..REL_COUNT, 0usize..node_count, 0usize..node_count),
                1..=MAX_EDGES,
            ),
            prop::collection::vec(0usize..node_count, 0..=MAX_PICKS),
            0usize..=MAX_PICKS,
            0usize..=MAX_PICKS,
        )
            .prop_map(|(edges, picks, n, k)| GraphCase { edges, picks, n, k })
    })
}

fn node(i: usize) -> Value {
    Value::iri(format!("n{i}"))
}

fn rel(i: usize) -> String {
    format!("r{i}")
}

fn build_store(case: &GraphCase) -> QuadStore {
    QuadStore::from_quads(
        case.edges
            .iter()
            .map(|(r, s, d)| Quad::new(node(*s), Value::iri(rel(*r)), node(*d))),
    )
}

fn run(store: &QuadStore, query: &Step) -> Vec<QueryResult> {
    compile_and_run(query, store)
        .expect("query should compile")
        .collect::<Result<Vec<_>>>()
        .expect("query should run")
}

fn run_values(store: &QuadStore, query: &Step) -> Vec<Value> {
    run(store, query)
        .into_iter()
        .map(|r| r.as_value().cloned().expect("value result"))
        .collect()
}

fn picks(case: &GraphCase) -> Step {
    Step::vertex(case.picks.iter().map(|i| node(*i)).collect())
}

/// Sources with at least one outgoing edge along `rel_idx`.
fn sources(case: &GraphCase, rel_idx: usize) -> HashSet<Value> {
    case.edges
        .iter()
        .filter(|(r, _, _)| *r == rel_idx)
        .map(|(_, s, _)| node(*s))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn unique_keeps_first_seen_order(case in graph_case_strategy()) {
        let store = build_store(&case);
        let input = run_values(&store, &picks(&case));
        let actual = run_values(&store, &picks(&case).unique());

        let mut seen = HashSet::new();
        let expected: Vec<Value> = input.into_iter().filter(|v| seen.insert(v.clone())).collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn order_is_sorted_permutation(case in graph_case_strategy()) {
        let store = build_store(&case);
        let mut input = run_values(&store, &Step::all());
        let actual = run_values(&store, &Step::all().order());

        prop_assert!(actual.windows(2).all(|w| w[0] <= w[1]));
        input.sort();
        prop_assert_eq!(actual, input);
    }

    #[test]
    fn limit_and_skip_partition(case in graph_case_strategy()) {
        let store = build_store(&case);
        let input = run_values(&store, &picks(&case));
        let head = run_values(&store, &picks(&case).limit(case.n));
        let tail = run_values(&store, &picks(&case).skip(case.n).limit(case.k));

        let mut joined = head;
        joined.extend(tail);
        let end = (case.n + case.k).min(input.len());
        prop_assert_eq!(joined, input[..end].to_vec());
    }

    #[test]
    fn where_keeps_rows_matching_every_branch(case in graph_case_strategy()) {
        let store = build_store(&case);
        let from = run_values(&store, &Step::all());
        let query = Step::all()
            .tag("s")
            .where_(vec![
                Step::placeholder().visit(Step::iris(["r0"])).tag("a"),
                Step::placeholder().visit(Step::iris(["r1"])).tag("b"),
            ])
            .select();
        let survivors: Vec<Value> = run(&store, &query)
            .iter()
            .map(|r| r.as_tags().expect("tag result")["s"].clone())
            .collect();

        let both: HashSet<Value> = sources(&case, 0)
            .intersection(&sources(&case, 1))
            .cloned()
            .collect();
        let expected: Vec<Value> = from.iter().filter(|v| both.contains(*v)).cloned().collect();
        prop_assert!(survivors.len() <= from.len());
        prop_assert_eq!(survivors, expected);
    }

    #[test]
    fn optional_preserves_rows(case in graph_case_strategy()) {
        let store = build_store(&case);
        let from = run_values(&store, &Step::all());
        let query = Step::all()
            .tag("s")
            .optional(Step::placeholder().visit(Step::iris(["r0"])).tag("a"))
            .select();
        let rows = run(&store, &query);
        prop_assert_eq!(rows.len(), from.len());

        let matched = sources(&case, 0);
        for (row, origin) in rows.iter().zip(&from) {
            let tags = row.as_tags().expect("tag result");
            prop_assert_eq!(&tags["s"], origin);
            prop_assert_eq!(tags.contains_key("a"), matched.contains(origin));
            if let Some(target) = tags.get("a") {
                let edge_exists = case.edges.iter().any(|(r, s, d)| {
                    *r == 0 && &node(*s) == origin && &node(*d) == target
                });
                prop_assert!(edge_exists);
            }
        }
    }

    #[test]
    fn optional_over_multi_valued_properties_preserves_rows(case in graph_case_strategy()) {
        let store = build_store(&case);
        let base = Step::all().properties(["r1"]);
        let from = run(&store, &base.clone().select());
        let rows = run(
            &store,
            &base.optional(Step::placeholder().properties(["r0", "r2"])).select(),
        );
        prop_assert_eq!(rows.len(), from.len());
        for (row, origin) in rows.iter().zip(&from) {
            let row = row.as_tags().expect("tag result");
            let origin = origin.as_tags().expect("tag result");
            prop_assert_eq!(&row["r1"], &origin["r1"]);
        }
    }

    #[test]
    fn select_whitelist_restricts_maps(case in graph_case_strategy()) {
        let store = build_store(&case);
        let base = Step::all().tag("liker").visit(Step::iris(["r0"])).tag("liked");
        let full = run(&store, &base.clone().select());
        let restricted = run(&store, &base.select_tags(["liker"]));

        prop_assert_eq!(full.len(), restricted.len());
        for (f, r) in full.iter().zip(&restricted) {
            let f = f.as_tags().expect("tag result");
            let r = r.as_tags().expect("tag result");
            prop_assert_eq!(r.len(), 1);
            prop_assert_eq!(&r["liker"], &f["liker"]);
        }
    }

    #[test]
    fn documents_group_by_subject_with_array_fields(case in graph_case_strategy()) {
        let store = build_store(&case);
        let docs = run(&store, &Step::all().properties(["r0", "r1"]).documents());

        let expected: HashSet<Value> = sources(&case, 0)
            .intersection(&sources(&case, 1))
            .cloned()
            .collect();
        let ids: Vec<Value> = docs
            .iter()
            .map(|d| d.as_document().expect("document result").id.clone())
            .collect();
        prop_assert_eq!(ids.len(), expected.len());
        prop_assert_eq!(ids.into_iter().collect::<HashSet<_>>(), expected);

        for doc in &docs {
            let json = doc.to_json();
            let object = json.as_object().expect("document object");
            for (field, value) in object {
                if field == "@id" {
                    prop_assert!(value.is_string());
                } else {
                    prop_assert!(value.as_array().is_some_and(|a| !a.is_empty()));
                }
            }
        }
    }
}
