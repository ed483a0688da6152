//! Compiled traversal plans.
//!
//! A [`Plan`] is an immutable expression tree over store primitives. Plans
//! share structure through `Arc`, so a branch point can hand the same origin
//! plan to every sibling without copying or mutating it.
//!
//! Tag taps (`Tag`, `Save`, `SavePredicates`) record bindings that travel
//! with each row. `Order`, `Unique` and `Count` are pipeline breakers: the
//! executor drains their upstream before yielding anything.

use linkedql_quadstore::EdgeDirection;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::filter::{CompareOp, TextMatcher};
use crate::value::Value;

/// Identifies the branch point a `Where` / `Optional` anchor replays.
pub type AnchorId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopDirection {
    Forward,
    Backward,
    /// Backward results followed by forward results.
    Both,
}

#[derive(Debug)]
pub enum PlanNode {
    /// Explicit values, in order, duplicates kept.
    Fixed(Vec<Value>),
    AllNodes,
    /// The origin row of the enclosing `Where` / `Optional` branch point.
    Anchor(AnchorId),
    Hop {
        from: Plan,
        via: Plan,
        direction: HopDirection,
    },
    PredicateNames {
        from: Plan,
        direction: EdgeDirection,
    },
    /// Bind the values of one property under `tag`; position unchanged.
    Save {
        from: Plan,
        predicate: Value,
        direction: EdgeDirection,
        tag: String,
    },
    SavePredicates {
        from: Plan,
        direction: EdgeDirection,
        tag: String,
    },
    Has {
        from: Plan,
        via: Plan,
        values: Vec<Value>,
        direction: EdgeDirection,
    },
    Is {
        from: Plan,
        values: Vec<Value>,
    },
    Match {
        from: Plan,
        matcher: TextMatcher,
    },
    Compare {
        from: Plan,
        op: CompareOp,
        value: Value,
    },
    Back {
        from: Plan,
    },
    BackTo {
        from: Plan,
        tag: String,
    },
    Tag {
        from: Plan,
        name: String,
    },
    Union {
        from: Plan,
        branches: Vec<Plan>,
    },
    Intersect {
        from: Plan,
        branches: Vec<Plan>,
    },
    Difference {
        from: Plan,
        branches: Vec<Plan>,
    },
    Where {
        from: Plan,
        anchor: AnchorId,
        branches: Vec<Plan>,
    },
    Optional {
        from: Plan,
        anchor: AnchorId,
        branch: Plan,
    },
    Limit {
        from: Plan,
        limit: usize,
    },
    Skip {
        from: Plan,
        offset: usize,
    },
    Unique {
        from: Plan,
    },
    Order {
        from: Plan,
    },
    Count {
        from: Plan,
    },
}

/// Whether a plan's rows are known to carry a traversal hop that `Back`
/// can undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HopState {
    Present,
    Absent,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct Plan(Arc<PlanNode>);

impl Plan {
    pub fn new(node: PlanNode) -> Self {
        Plan(Arc::new(node))
    }

    pub fn all_nodes() -> Self {
        Plan::new(PlanNode::AllNodes)
    }

    pub fn node(&self) -> &PlanNode {
        &self.0
    }

    pub fn ptr_eq(&self, other: &Plan) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// The row-origin input of this plan, if it has one.
    pub fn from(&self) -> Option<&Plan> {
        match self.node() {
            PlanNode::Fixed(_) | PlanNode::AllNodes | PlanNode::Anchor(_) => None,
            PlanNode::Hop { from, .. }
            | PlanNode::PredicateNames { from, .. }
            | PlanNode::Save { from, .. }
            | PlanNode::SavePredicates { from, .. }
            | PlanNode::Has { from, .. }
            | PlanNode::Is { from, .. }
            | PlanNode::Match { from, .. }
            | PlanNode::Compare { from, .. }
            | PlanNode::Back { from }
            | PlanNode::BackTo { from, .. }
            | PlanNode::Tag { from, .. }
            | PlanNode::Union { from, .. }
            | PlanNode::Intersect { from, .. }
            | PlanNode::Difference { from, .. }
            | PlanNode::Where { from, .. }
            | PlanNode::Optional { from, .. }
            | PlanNode::Limit { from, .. }
            | PlanNode::Skip { from, .. }
            | PlanNode::Unique { from }
            | PlanNode::Order { from }
            | PlanNode::Count { from } => Some(from),
        }
    }

    pub fn is_pipeline_breaker(&self) -> bool {
        matches!(
            self.node(),
            PlanNode::Order { .. } | PlanNode::Unique { .. } | PlanNode::Count { .. }
        )
    }

    pub(crate) fn hop_state(&self) -> HopState {
        match self.node() {
            PlanNode::Hop { .. } | PlanNode::PredicateNames { .. } => HopState::Present,
            PlanNode::Fixed(_)
            | PlanNode::AllNodes
            | PlanNode::Count { .. }
            | PlanNode::BackTo { .. } => HopState::Absent,
            PlanNode::Anchor(_) | PlanNode::Union { .. } | PlanNode::Back { .. } => {
                HopState::Unknown
            }
            _ => match self.from() {
                Some(from) => from.hop_state(),
                None => HopState::Absent,
            },
        }
    }

    /// Human-readable plan tree, one operator per line.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.explain_into(&mut out, 0);
        out
    }

    fn explain_into(&self, out: &mut String, depth: usize) {
        let pad = "  ".repeat(depth);
        let line = match self.node() {
            PlanNode::Fixed(values) => {
                let rendered: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                format!("fixed [{}]", rendered.join(", "))
            }
            PlanNode::AllNodes => "all nodes".to_string(),
            PlanNode::Anchor(id) => format!("anchor #{id}"),
            PlanNode::Hop { direction, .. } => format!("hop {direction:?}"),
            PlanNode::PredicateNames { direction, .. } => format!("predicates {direction:?}"),
            PlanNode::Save {
                predicate,
                direction,
                tag,
                ..
            } => format!("save {predicate} {direction:?} as {tag}"),
            PlanNode::SavePredicates { direction, tag, .. } => {
                format!("save predicates {direction:?} as {tag}")
            }
            PlanNode::Has {
                values, direction, ..
            } => format!("has {direction:?} in {} values", values.len()),
            PlanNode::Is { values, .. } => format!("is one of {} values", values.len()),
            PlanNode::Match { matcher, .. } => matcher.describe(),
            PlanNode::Compare { op, value, .. } => format!("{} {value}", op.name()),
            PlanNode::Back { .. } => "back".to_string(),
            PlanNode::BackTo { tag, .. } => format!("back to {tag}"),
            PlanNode::Tag { name, .. } => format!("tag {name}"),
            PlanNode::Union { .. } => "union".to_string(),
            PlanNode::Intersect { .. } => "intersect".to_string(),
            PlanNode::Difference { .. } => "difference".to_string(),
            PlanNode::Where { anchor, .. } => format!("where (anchor #{anchor})"),
            PlanNode::Optional { anchor, .. } => format!("optional (anchor #{anchor})"),
            PlanNode::Limit { limit, .. } => format!("limit {limit}"),
            PlanNode::Skip { offset, .. } => format!("skip {offset}"),
            PlanNode::Unique { .. } => "unique".to_string(),
            PlanNode::Order { .. } => "order".to_string(),
            PlanNode::Count { .. } => "count".to_string(),
        };
        let marker = if self.is_pipeline_breaker() { " [breaker]" } else { "" };
        let _ = writeln!(out, "{pad}{line}{marker}");

        if let Some(from) = self.from() {
            from.explain_into(out, depth + 1);
        }
        let side: Vec<(&str, &Plan)> = match self.node() {
            PlanNode::Hop { via, .. } | PlanNode::Has { via, .. } => vec![("via", via)],
            PlanNode::Union { branches, .. }
            | PlanNode::Intersect { branches, .. }
            | PlanNode::Difference { branches, .. }
            | PlanNode::Where { branches, .. } => {
                branches.iter().map(|b| ("branch", b)).collect()
            }
            PlanNode::Optional { branch, .. } => vec![("branch", branch)],
            _ => Vec::new(),
        };
        for (label, plan) in side {
            let _ = writeln!(out, "{pad}  {label}:");
            plan.explain_into(out, depth + 2);
        }
    }
}
