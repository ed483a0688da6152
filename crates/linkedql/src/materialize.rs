//! Turning row streams into caller-facing results.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::iter::FusedIterator;
use tracing::warn;

use crate::error::{LinkedQlError, Result};
use crate::exec::{deferred, Executor, NodeRef, Row, RowStream};
use crate::value::Value;

/// How the rows of a compiled query are reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// The position of each row.
    Values,
    /// Each row's tag map, optionally restricted to a whitelist.
    Tags(Option<Vec<String>>),
    /// The tag map of the first row only.
    First,
    /// One document per distinct position.
    Documents,
}

/// A JSON-LD-like document: a subject and the values bound to each field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub id: Value,
    pub properties: BTreeMap<String, Vec<Value>>,
}

impl Document {
    /// `{"@id": .., field: [values..]}`; fields are always arrays.
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        object.insert(
            "@id".to_string(),
            serde_json::Value::String(self.id.identifier()),
        );
        for (field, values) in &self.properties {
            let values = values.iter().map(Value::to_json_ld).collect();
            object.insert(field.clone(), serde_json::Value::Array(values));
        }
        serde_json::Value::Object(object)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryResult {
    Value(Value),
    Tags(BTreeMap<String, Value>),
    Document(Document),
}

impl QueryResult {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            QueryResult::Value(value) => value.to_json_ld(),
            QueryResult::Tags(tags) => serde_json::Value::Object(
                tags.iter()
                    .map(|(name, value)| (name.clone(), value.to_json_ld()))
                    .collect(),
            ),
            QueryResult::Document(doc) => doc.to_json(),
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            QueryResult::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_tags(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            QueryResult::Tags(tags) => Some(tags),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            QueryResult::Document(doc) => Some(doc),
            _ => None,
        }
    }
}

type ResultIter<'s> = Box<dyn Iterator<Item = Result<QueryResult>> + 's>;

/// Pull-based stream of query results.
///
/// The first error ends the stream: it is yielded once, kept for
/// [`ResultStream::error`], and every later call to `next` returns `None`.
pub struct ResultStream<'s> {
    inner: ResultIter<'s>,
    max_results: Option<usize>,
    emitted: usize,
    finished: bool,
    error: Option<LinkedQlError>,
}

impl<'s> ResultStream<'s> {
    pub(crate) fn new(
        exec: Executor<'s>,
        rows: RowStream<'s>,
        shape: &Shape,
        max_results: Option<usize>,
    ) -> Self {
        let inner: ResultIter<'s> = match shape {
            Shape::Values => Box::new(rows.map(move |row| {
                row.and_then(|row| exec.value(&row.node))
                    .map(QueryResult::Value)
            })),
            Shape::Tags(whitelist) => {
                let whitelist = whitelist.clone();
                Box::new(rows.map(move |row| {
                    row.and_then(|row| tag_values(&exec, &row, whitelist.as_deref()))
                        .map(QueryResult::Tags)
                }))
            }
            Shape::First => Box::new(
                rows.take(1)
                    .map(move |row| row.and_then(|row| tag_values(&exec, &row, None)))
                    .map(|tags| tags.map(QueryResult::Tags)),
            ),
            Shape::Documents => deferred(move || -> ResultIter<'s> {
                match documents(&exec, rows) {
                    Ok(docs) => Box::new(docs.into_iter().map(|d| Ok(QueryResult::Document(d)))),
                    Err(e) => Box::new(std::iter::once(Err(e))),
                }
            }),
        };
        Self {
            inner,
            max_results,
            emitted: 0,
            finished: false,
            error: None,
        }
    }

    /// The error that terminated the stream, if any.
    pub fn error(&self) -> Option<&LinkedQlError> {
        self.error.as_ref()
    }

    /// Number of results yielded so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }
}

impl Iterator for ResultStream<'_> {
    type Item = Result<QueryResult>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.max_results.is_some_and(|max| self.emitted >= max) {
            self.finished = true;
            return None;
        }
        match self.inner.next() {
            Some(Ok(result)) => {
                self.emitted += 1;
                Some(Ok(result))
            }
            Some(Err(e)) => {
                warn!(error = %e, emitted = self.emitted, "linkedql result stream failed");
                self.finished = true;
                self.error = Some(e.clone());
                Some(Err(e))
            }
            None => {
                self.finished = true;
                None
            }
        }
    }
}

impl FusedIterator for ResultStream<'_> {}

fn tag_values(
    exec: &Executor<'_>,
    row: &Row,
    whitelist: Option<&[String]>,
) -> Result<BTreeMap<String, Value>> {
    let mut out = BTreeMap::new();
    for (name, node) in &row.tags {
        if whitelist.is_some_and(|allowed| !allowed.contains(name)) {
            continue;
        }
        out.insert(name.clone(), exec.value(node)?);
    }
    Ok(out)
}

/// Group rows by position, in first-seen order. Field values are
/// deduplicated and keep their first-seen order.
fn documents(exec: &Executor<'_>, rows: RowStream<'_>) -> Result<Vec<Document>> {
    let mut index: HashMap<NodeRef, usize> = HashMap::new();
    let mut groups: Vec<(NodeRef, BTreeMap<String, Vec<Value>>)> = Vec::new();
    for row in rows {
        let row = row?;
        let slot = match index.get(&row.node) {
            Some(slot) => *slot,
            None => {
                index.insert(row.node.clone(), groups.len());
                groups.push((row.node.clone(), BTreeMap::new()));
                groups.len() - 1
            }
        };
        let fields = &mut groups[slot].1;
        for (name, node) in &row.tags {
            let value = exec.value(node)?;
            let values = fields.entry(name.clone()).or_default();
            if !values.contains(&value) {
                values.push(value);
            }
        }
    }
    groups
        .into_iter()
        .map(|(node, properties)| {
            Ok(Document {
                id: exec.value(&node)?,
                properties,
            })
        })
        .collect()
}
