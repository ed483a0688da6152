//! Plan execution over a [`GraphStore`].
//!
//! Every plan node becomes a lazy [`RowStream`]. Streaming operators pull one
//! upstream row at a time; pipeline breakers (`Order`, `Unique`, `Count`) and
//! operators that need a whole branch's node set up front (hops, `Has`,
//! `Intersect`, `Difference`) defer that work until the first pull.

use linkedql_quadstore::{EdgeDirection, GraphStore, NodeId};
use roaring::RoaringBitmap;
use std::collections::{BTreeMap, HashSet};
use std::iter;
use std::sync::Arc;
use tracing::debug;

use crate::error::{LinkedQlError, Result};
use crate::plan::{AnchorId, HopDirection, Plan, PlanNode};
use crate::value::Value;

pub type RowStream<'s> = Box<dyn Iterator<Item = Result<Row>> + 's>;

/// A traversal position: a stored node, or a value computed by the query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Stored(NodeId),
    Computed(Value),
}

impl NodeRef {
    fn stored(&self) -> Option<NodeId> {
        match self {
            NodeRef::Stored(id) => Some(*id),
            NodeRef::Computed(_) => None,
        }
    }
}

/// One result row: the current position, its tag bindings, and the positions
/// left behind by traversal hops (most recent last).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub node: NodeRef,
    pub tags: BTreeMap<String, NodeRef>,
    pub trail: Vec<NodeRef>,
}

impl Row {
    pub fn at(node: NodeRef) -> Self {
        Self {
            node,
            tags: BTreeMap::new(),
            trail: Vec::new(),
        }
    }

    /// The row after one hop to `node`.
    fn moved_to(&self, node: NodeRef) -> Self {
        let mut trail = self.trail.clone();
        trail.push(self.node.clone());
        Self {
            node,
            tags: self.tags.clone(),
            trail,
        }
    }

    fn tagged(&self, tag: &str, node: NodeRef) -> Self {
        let mut row = self.clone();
        row.tags.insert(tag.to_string(), node);
        row
    }
}

/// Anchored rows visible to a `Where` / `Optional` branch.
#[derive(Debug, Clone, Default)]
pub(crate) struct Scope {
    anchors: Vec<(AnchorId, Arc<Row>)>,
}

impl Scope {
    fn with_anchor(&self, id: AnchorId, row: Row) -> Self {
        let mut anchors = self.anchors.clone();
        anchors.push((id, Arc::new(row)));
        Self { anchors }
    }

    fn anchor(&self, id: AnchorId) -> Option<&Row> {
        self.anchors
            .iter()
            .rev()
            .find(|(anchor, _)| *anchor == id)
            .map(|(_, row)| row.as_ref())
    }
}

/// Runs `init` on the first pull and then yields from what it returned.
struct Deferred<'s, T> {
    init: Option<Box<dyn FnOnce() -> Box<dyn Iterator<Item = T> + 's> + 's>>,
    inner: Option<Box<dyn Iterator<Item = T> + 's>>,
}

impl<T> Iterator for Deferred<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if let Some(init) = self.init.take() {
            self.inner = Some(init());
        }
        self.inner.as_mut()?.next()
    }
}

pub(crate) fn deferred<'s, T: 's>(
    init: impl FnOnce() -> Box<dyn Iterator<Item = T> + 's> + 's,
) -> Box<dyn Iterator<Item = T> + 's> {
    Box::new(Deferred {
        init: Some(Box::new(init)),
        inner: None,
    })
}

fn once_err<'s>(err: LinkedQlError) -> RowStream<'s> {
    Box::new(iter::once(Err(err)))
}

fn from_rows<'s>(rows: Result<Vec<Row>>) -> RowStream<'s> {
    match rows {
        Ok(rows) => Box::new(rows.into_iter().map(Ok)),
        Err(e) => once_err(e),
    }
}

/// Replace each row with zero or more rows.
fn expand<'s, F>(upstream: RowStream<'s>, mut f: F) -> RowStream<'s>
where
    F: FnMut(Row) -> Result<Vec<Row>> + 's,
{
    Box::new(upstream.flat_map(move |row| match row.and_then(&mut f) {
        Ok(rows) => rows.into_iter().map(Ok).collect::<Vec<_>>(),
        Err(e) => vec![Err(e)],
    }))
}

/// Rewrite or drop each row.
fn map_rows<'s, F>(upstream: RowStream<'s>, mut f: F) -> RowStream<'s>
where
    F: FnMut(Row) -> Option<Row> + 's,
{
    Box::new(upstream.filter_map(move |row| match row {
        Ok(row) => f(row).map(Ok),
        Err(e) => Some(Err(e)),
    }))
}

/// Keep rows matching a fallible predicate.
fn keep<'s, F>(upstream: RowStream<'s>, mut pred: F) -> RowStream<'s>
where
    F: FnMut(&Row) -> Result<bool> + 's,
{
    Box::new(upstream.filter_map(move |row| match row {
        Ok(row) => match pred(&row) {
            Ok(true) => Some(Ok(row)),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        },
        Err(e) => Some(Err(e)),
    }))
}

#[derive(Clone, Copy)]
pub struct Executor<'s> {
    store: &'s dyn GraphStore,
}

impl<'s> Executor<'s> {
    pub fn new(store: &'s dyn GraphStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &'s dyn GraphStore {
        self.store
    }

    /// Lazy row stream for a root plan.
    pub fn run(&self, plan: &Plan) -> RowStream<'s> {
        debug!(nodes = self.store.node_count(), "executing linkedql plan");
        self.rows(plan, &Scope::default())
    }

    /// Resolve a position to its value.
    pub fn value(&self, node: &NodeRef) -> Result<Value> {
        match node {
            NodeRef::Stored(id) => Ok(self.store.value_of(*id)?),
            NodeRef::Computed(value) => Ok(value.clone()),
        }
    }

    fn lookup_all(&self, values: &[Value]) -> RoaringBitmap {
        values
            .iter()
            .filter_map(|value| self.store.lookup(value))
            .collect()
    }

    /// Stored node ids produced by `plan`, as a bitmap.
    fn node_set(&self, plan: &Plan, scope: &Scope) -> Result<RoaringBitmap> {
        let mut set = RoaringBitmap::new();
        for row in self.rows(plan, scope) {
            if let Some(id) = row?.node.stored() {
                set.insert(id);
            }
        }
        Ok(set)
    }

    /// Every position produced by `plan`, computed values included.
    fn positions(&self, plan: &Plan, scope: &Scope) -> Result<HashSet<NodeRef>> {
        self.rows(plan, scope).map(|row| row.map(|r| r.node)).collect()
    }

    fn rows(&self, plan: &Plan, scope: &Scope) -> RowStream<'s> {
        let exec = *self;
        match plan.node() {
            PlanNode::Fixed(values) => {
                let store = self.store;
                let values = values.clone();
                Box::new(
                    values
                        .into_iter()
                        .filter_map(move |value| store.lookup(&value))
                        .map(|id| Ok(Row::at(NodeRef::Stored(id)))),
                )
            }
            PlanNode::AllNodes => Box::new(
                self.store
                    .nodes()
                    .map(|id| Ok(Row::at(NodeRef::Stored(id)))),
            ),
            PlanNode::Anchor(id) => match scope.anchor(*id) {
                Some(row) => Box::new(iter::once(Ok(row.clone()))),
                None => once_err(LinkedQlError::malformed(format!(
                    "placeholder anchor #{id} used outside its branch"
                ))),
            },

            PlanNode::Hop {
                from,
                via,
                direction,
            } => {
                let upstream = self.rows(from, scope);
                let (via, scope, direction) = (via.clone(), scope.clone(), *direction);
                deferred(move || match exec.node_set(&via, &scope) {
                    Ok(predicates) => {
                        expand(upstream, move |row| exec.hop(&row, &predicates, direction))
                    }
                    Err(e) => once_err(e),
                })
            }
            PlanNode::PredicateNames { from, direction } => {
                let direction = *direction;
                expand(self.rows(from, scope), move |row| {
                    let Some(id) = row.node.stored() else {
                        return Ok(Vec::new());
                    };
                    let predicates = exec.store.predicates(id, direction)?;
                    Ok(predicates
                        .into_iter()
                        .map(|p| row.moved_to(NodeRef::Stored(p)))
                        .collect())
                })
            }
            PlanNode::Save {
                from,
                predicate,
                direction,
                tag,
            } => {
                let predicates = self.lookup_all(std::slice::from_ref(predicate));
                let (direction, tag) = (*direction, tag.clone());
                expand(self.rows(from, scope), move |row| {
                    let Some(id) = row.node.stored() else {
                        return Ok(Vec::new());
                    };
                    let targets = exec.store.neighbors(id, &predicates, direction)?;
                    Ok(targets
                        .into_iter()
                        .map(|t| row.tagged(&tag, NodeRef::Stored(t)))
                        .collect())
                })
            }
            PlanNode::SavePredicates {
                from,
                direction,
                tag,
            } => {
                let (direction, tag) = (*direction, tag.clone());
                expand(self.rows(from, scope), move |row| {
                    let Some(id) = row.node.stored() else {
                        return Ok(Vec::new());
                    };
                    let predicates = exec.store.predicates(id, direction)?;
                    Ok(predicates
                        .into_iter()
                        .map(|p| row.tagged(&tag, NodeRef::Stored(p)))
                        .collect())
                })
            }
            PlanNode::Has {
                from,
                via,
                values,
                direction,
            } => {
                let upstream = self.rows(from, scope);
                let targets = self.lookup_all(values);
                let (via, scope, direction) = (via.clone(), scope.clone(), *direction);
                deferred(move || match exec.node_set(&via, &scope) {
                    Ok(predicates) => keep(upstream, move |row| {
                        let Some(id) = row.node.stored() else {
                            return Ok(false);
                        };
                        let reached = exec.store.neighbors(id, &predicates, direction)?;
                        Ok(reached.into_iter().any(|n| targets.contains(n)))
                    }),
                    Err(e) => once_err(e),
                })
            }
            PlanNode::Is { from, values } => {
                let ids = self.lookup_all(values);
                let values = values.clone();
                keep(self.rows(from, scope), move |row| {
                    Ok(match &row.node {
                        NodeRef::Stored(id) => ids.contains(*id),
                        NodeRef::Computed(value) => values.contains(value),
                    })
                })
            }
            PlanNode::Match { from, matcher } => {
                let matcher = matcher.clone();
                keep(self.rows(from, scope), move |row| {
                    Ok(matcher.matches(&exec.value(&row.node)?))
                })
            }
            PlanNode::Compare { from, op, value } => {
                let (op, operand) = (*op, value.clone());
                keep(self.rows(from, scope), move |row| {
                    op.evaluate(&exec.value(&row.node)?, &operand)
                })
            }

            PlanNode::Back { from } => map_rows(self.rows(from, scope), |mut row| {
                row.node = row.trail.pop()?;
                Some(row)
            }),
            PlanNode::BackTo { from, tag } => {
                let tag = tag.clone();
                map_rows(self.rows(from, scope), move |mut row| {
                    row.node = row.tags.get(&tag)?.clone();
                    row.trail.clear();
                    Some(row)
                })
            }
            PlanNode::Tag { from, name } => {
                let name = name.clone();
                map_rows(self.rows(from, scope), move |mut row| {
                    row.tags.insert(name.clone(), row.node.clone());
                    Some(row)
                })
            }

            PlanNode::Union { from, branches } => {
                let streams: Vec<RowStream<'s>> = iter::once(from)
                    .chain(branches)
                    .map(|plan| self.rows(plan, scope))
                    .collect();
                let mut seen = HashSet::new();
                Box::new(streams.into_iter().flatten().filter(move |row| match row {
                    Ok(row) => seen.insert((row.node.clone(), row.tags.clone())),
                    Err(_) => true,
                }))
            }
            PlanNode::Intersect { from, branches } => {
                self.set_filter(from, branches, scope, true)
            }
            PlanNode::Difference { from, branches } => {
                self.set_filter(from, branches, scope, false)
            }

            PlanNode::Where {
                from,
                anchor,
                branches,
            } => {
                let (anchor, branches, scope) = (*anchor, branches.clone(), scope.clone());
                expand(self.rows(from, &scope), move |row| {
                    Ok(exec.join(row, anchor, &branches, &scope, false)?.into_iter().collect())
                })
            }
            PlanNode::Optional {
                from,
                anchor,
                branch,
            } => {
                let (anchor, branches, scope) = (*anchor, vec![branch.clone()], scope.clone());
                expand(self.rows(from, &scope), move |row| {
                    Ok(exec.join(row, anchor, &branches, &scope, true)?.into_iter().collect())
                })
            }

            PlanNode::Limit { from, limit } => Box::new(self.rows(from, scope).take(*limit)),
            PlanNode::Skip { from, offset } => {
                let mut remaining = *offset;
                Box::new(self.rows(from, scope).filter(move |row| {
                    if row.is_ok() && remaining > 0 {
                        remaining -= 1;
                        false
                    } else {
                        true
                    }
                }))
            }
            PlanNode::Unique { from } => {
                let upstream = self.rows(from, scope);
                deferred(move || {
                    let mut seen = HashSet::new();
                    from_rows(upstream.collect::<Result<Vec<_>>>().map(|rows| {
                        rows.into_iter()
                            .filter(|row| seen.insert(row.node.clone()))
                            .collect()
                    }))
                })
            }
            PlanNode::Order { from } => {
                let upstream = self.rows(from, scope);
                deferred(move || from_rows(exec.sorted(upstream)))
            }
            PlanNode::Count { from } => {
                let upstream = self.rows(from, scope);
                deferred(move || {
                    let mut count: i64 = 0;
                    for row in upstream {
                        if let Err(e) = row {
                            return once_err(e);
                        }
                        count += 1;
                    }
                    from_rows(Ok(vec![Row::at(NodeRef::Computed(Value::int(count)))]))
                })
            }
        }
    }

    fn hop(&self, row: &Row, predicates: &RoaringBitmap, direction: HopDirection) -> Result<Vec<Row>> {
        let Some(id) = row.node.stored() else {
            return Ok(Vec::new());
        };
        let directions: &[EdgeDirection] = match direction {
            HopDirection::Forward => &[EdgeDirection::Forward],
            HopDirection::Backward => &[EdgeDirection::Backward],
            HopDirection::Both => &[EdgeDirection::Backward, EdgeDirection::Forward],
        };
        let mut out = Vec::new();
        for dir in directions {
            for next in self.store.neighbors(id, predicates, *dir)? {
                out.push(row.moved_to(NodeRef::Stored(next)));
            }
        }
        Ok(out)
    }

    /// Keep `from` rows whose position is in every branch (`all`) or in none.
    fn set_filter(&self, from: &Plan, branches: &[Plan], scope: &Scope, all: bool) -> RowStream<'s> {
        let exec = *self;
        let upstream = self.rows(from, scope);
        let (branches, scope) = (branches.to_vec(), scope.clone());
        deferred(move || {
            let sets = match branches
                .iter()
                .map(|branch| exec.positions(branch, &scope))
                .collect::<Result<Vec<_>>>()
            {
                Ok(sets) => sets,
                Err(e) => return once_err(e),
            };
            keep(upstream, move |row| {
                Ok(if all {
                    sets.iter().all(|set| set.contains(&row.node))
                } else {
                    !sets.iter().any(|set| set.contains(&row.node))
                })
            })
        })
    }

    /// Re-anchor every branch at `row` and layer the first binding of each
    /// branch over the row's tags. A branch with no rows drops the row, or
    /// passes it through unchanged when `optional`.
    fn join(
        &self,
        row: Row,
        anchor: AnchorId,
        branches: &[Plan],
        scope: &Scope,
        optional: bool,
    ) -> Result<Option<Row>> {
        let inner = scope.with_anchor(anchor, row.clone());
        let mut tags = row.tags.clone();
        for branch in branches {
            match self.rows(branch, &inner).next().transpose()? {
                Some(matched) => tags.extend(matched.tags),
                None => return Ok(optional.then_some(row)),
            }
        }
        Ok(Some(Row { tags, ..row }))
    }

    /// Drain `upstream` and stable-sort it by the total value order.
    fn sorted(&self, upstream: RowStream<'s>) -> Result<Vec<Row>> {
        let mut keyed = Vec::new();
        for row in upstream {
            let row = row?;
            keyed.push((self.value(&row.node)?, row));
        }
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(keyed.into_iter().map(|(_, row)| row).collect())
    }
}
