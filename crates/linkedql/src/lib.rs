//! LinkedQL: composable query steps compiled into traversal plans.
//!
//! A query is a tree of [`Step`]s. Running one takes three passes:
//!
//! 1. **Compile** ([`compile`]): the step tree becomes an immutable [`Plan`],
//!    threading a persistent tag environment through nested branches.
//! 2. **Execute**: the plan is walked against any [`GraphStore`] as a lazy
//!    stream of rows (a position plus its tag bindings).
//! 3. **Materialize**: rows become values, tag maps or grouped documents,
//!    depending on the result shape at the query root.
//!
//! ```
//! use linkedql::{compile_and_run, Step, Value};
//! use linkedql_quadstore::{Quad, QuadStore};
//!
//! let store = QuadStore::from_quads([Quad::iri("alice", "likes", "bob", "")]);
//! let query = Step::vertex(vec![Value::iri("alice")]).visit(Step::iris(["likes"]));
//! let results: Vec<_> = compile_and_run(&query, &store)
//!     .unwrap()
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(results[0].as_value(), Some(&Value::iri("bob")));
//! ```

pub mod compile;
pub mod config;
pub mod env;
pub mod error;
pub mod exec;
pub mod filter;
pub mod materialize;
pub mod plan;
pub mod step;
pub mod value;

pub use compile::{CompiledQuery, Compiler};
pub use config::ExecutionConfig;
pub use env::Environment;
pub use error::{LinkedQlError, Result};
pub use exec::{Executor, NodeRef, Row, RowStream};
pub use linkedql_quadstore::{GraphStore, QuadStore};
pub use materialize::{Document, QueryResult, ResultStream, Shape};
pub use plan::{Plan, PlanNode};
pub use step::{Step, ValueFilter};
pub use value::{EntityIdentifier, Value};

impl CompiledQuery {
    /// Start executing against `store`. Nothing is read until the stream is
    /// pulled.
    pub fn run<'s>(&self, store: &'s dyn GraphStore, config: &ExecutionConfig) -> ResultStream<'s> {
        let exec = Executor::new(store);
        let rows = exec.run(&self.plan);
        ResultStream::new(exec, rows, &self.shape, config.max_results)
    }
}

/// Compile a query without running it.
pub fn compile(step: &Step, config: &ExecutionConfig) -> Result<CompiledQuery> {
    Compiler::new(config).compile_query(step)
}

/// Compile `step` and start running it against `store` with default settings.
///
/// Compile-time errors are returned here; run-time errors come out of the
/// stream.
pub fn compile_and_run<'s>(step: &Step, store: &'s dyn GraphStore) -> Result<ResultStream<'s>> {
    compile_and_run_with_config(step, store, &ExecutionConfig::default())
}

pub fn compile_and_run_with_config<'s>(
    step: &Step,
    store: &'s dyn GraphStore,
    config: &ExecutionConfig,
) -> Result<ResultStream<'s>> {
    Ok(compile(step, config)?.run(store, config))
}
