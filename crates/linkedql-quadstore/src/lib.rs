//! LinkedQL quad store: the graph a LinkedQL query walks.
//!
//! This crate provides:
//!
//! 1. **Value model** ([`Value`]): IRIs, blank nodes and literals, with the
//!    total and natural orderings the query layer relies on.
//! 2. **Value interning**: every distinct value is stored once and referenced
//!    by a `u32` [`NodeId`]; node order is first-seen order.
//! 3. **Store contract** ([`GraphStore`]): the narrow, object-safe surface the
//!    compiler consumes (select nodes, hop one edge, list predicates).
//! 4. **In-memory store** ([`QuadStore`]): subject/object indexes over a
//!    deduplicated quad list, with node sets kept as Roaring bitmaps.
//! 5. **Loading**: N-Quads / N-Triples via Sophia (see `nquads`).

mod nquads;
pub mod value;

use dashmap::DashMap;
use roaring::RoaringBitmap;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};

pub use nquads::RdfFormat;
pub use value::{NotOrderable, Value};

/// Interned node id. Ids are dense and assigned in first-seen order.
pub type NodeId = u32;

/// Direction of a single edge hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeDirection {
    /// subject → object
    Forward,
    /// object → subject
    Backward,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("unknown node id {0}")]
    UnknownNode(NodeId),
}

// ============================================================================
// Store Contract
// ============================================================================

/// The operations a graph store must expose to run compiled LinkedQL plans.
///
/// Set algebra, ordering and pagination are done by the query layer over
/// node ids; the store only has to enumerate, resolve and walk.
pub trait GraphStore {
    /// All nodes, in the store's natural iteration order.
    fn nodes(&self) -> Box<dyn Iterator<Item = NodeId> + '_>;

    fn node_count(&self) -> usize;

    /// Resolve a value to its node id, if the value occurs in the store.
    fn lookup(&self, value: &Value) -> Option<NodeId>;

    fn value_of(&self, node: NodeId) -> Result<Value, StoreError>;

    /// Nodes one hop away from `node` along any predicate in `predicates`.
    ///
    /// Results follow quad insertion order and are not deduplicated.
    fn neighbors(
        &self,
        node: NodeId,
        predicates: &RoaringBitmap,
        direction: EdgeDirection,
    ) -> Result<Vec<NodeId>, StoreError>;

    /// Distinct predicates on edges leaving (`Forward`) or entering
    /// (`Backward`) `node`, in first-seen order.
    fn predicates(&self, node: NodeId, direction: EdgeDirection)
        -> Result<Vec<NodeId>, StoreError>;
}

// ============================================================================
// Value Interning
// ============================================================================

/// Value interner: maps values to compact node ids.
pub struct ValueInterner {
    value_to_id: DashMap<Value, NodeId>,
    id_to_value: DashMap<NodeId, Value>,
    next_id: AtomicU32,
}

impl ValueInterner {
    pub fn new() -> Self {
        Self {
            value_to_id: DashMap::new(),
            id_to_value: DashMap::new(),
            next_id: AtomicU32::new(0),
        }
    }

    /// Intern a value, returning its id
    pub fn intern(&self, value: &Value) -> NodeId {
        if let Some(id) = self.value_to_id.get(value) {
            return *id;
        }
        *self.value_to_id.entry(value.clone()).or_insert_with(|| {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            self.id_to_value.insert(id, value.clone());
            id
        })
    }

    /// Look up an existing id without inserting.
    pub fn id_of(&self, value: &Value) -> Option<NodeId> {
        self.value_to_id.get(value).map(|id| *id)
    }

    pub fn lookup(&self, id: NodeId) -> Option<Value> {
        self.id_to_value.get(&id).map(|v| v.clone())
    }

    pub fn len(&self) -> usize {
        self.next_id.load(Ordering::SeqCst) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ValueInterner {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Quads
// ============================================================================

/// A (subject, predicate, object, optional label) fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Quad {
    pub subject: Value,
    pub predicate: Value,
    pub object: Value,
    pub label: Option<Value>,
}

impl Quad {
    pub fn new(subject: Value, predicate: Value, object: Value) -> Self {
        Self {
            subject,
            predicate,
            object,
            label: None,
        }
    }

    /// A quad whose four positions are all IRIs; an empty label means none.
    pub fn iri(subject: &str, predicate: &str, object: &str, label: &str) -> Self {
        Self {
            subject: Value::iri(subject),
            predicate: Value::iri(predicate),
            object: Value::iri(object),
            label: (!label.is_empty()).then(|| Value::iri(label)),
        }
    }

    pub fn with_label(mut self, label: Value) -> Self {
        self.label = Some(label);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct StoredQuad {
    subject: NodeId,
    predicate: NodeId,
    object: NodeId,
    label: Option<NodeId>,
}

// ============================================================================
// QuadStore
// ============================================================================

/// In-memory quad store with per-node edge indexes.
#[derive(Default)]
pub struct QuadStore {
    pub interner: ValueInterner,
    quads: Vec<StoredQuad>,
    quad_set: HashSet<StoredQuad>,
    /// subject -> quad ids
    forward_index: HashMap<NodeId, Vec<u32>>,
    /// object -> quad ids
    backward_index: HashMap<NodeId, Vec<u32>>,
    /// predicate -> quad ids
    predicate_index: HashMap<NodeId, RoaringBitmap>,
    nodes: RoaringBitmap,
}

impl QuadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_quads(quads: impl IntoIterator<Item = Quad>) -> Self {
        let mut store = Self::new();
        for quad in quads {
            store.add_quad(quad);
        }
        store
    }

    /// Number of distinct quads stored.
    pub fn len(&self) -> usize {
        self.quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    /// Add a quad. Returns `false` if an identical quad is already present.
    pub fn add_quad(&mut self, quad: Quad) -> bool {
        let stored = StoredQuad {
            subject: self.intern_node(&quad.subject),
            predicate: self.intern_node(&quad.predicate),
            object: self.intern_node(&quad.object),
            label: quad.label.as_ref().map(|l| self.intern_node(l)),
        };
        if !self.quad_set.insert(stored) {
            return false;
        }

        let id = self.quads.len() as u32;
        self.forward_index
            .entry(stored.subject)
            .or_insert_with(Vec::new)
            .push(id);
        self.backward_index
            .entry(stored.object)
            .or_insert_with(Vec::new)
            .push(id);
        self.predicate_index
            .entry(stored.predicate)
            .or_insert_with(RoaringBitmap::new)
            .insert(id);
        self.quads.push(stored);
        true
    }

    fn intern_node(&mut self, value: &Value) -> NodeId {
        let id = self.interner.intern(value);
        self.nodes.insert(id);
        id
    }

    /// Number of quads using `predicate`.
    pub fn predicate_count(&self, predicate: &Value) -> usize {
        self.interner
            .id_of(predicate)
            .and_then(|id| self.predicate_index.get(&id))
            .map(|ids| ids.len() as usize)
            .unwrap_or(0)
    }

    /// All stored quads, resolved back to values, in insertion order.
    pub fn quads(&self) -> impl Iterator<Item = Quad> + '_ {
        self.quads.iter().filter_map(|q| {
            Some(Quad {
                subject: self.interner.lookup(q.subject)?,
                predicate: self.interner.lookup(q.predicate)?,
                object: self.interner.lookup(q.object)?,
                label: match q.label {
                    Some(l) => Some(self.interner.lookup(l)?),
                    None => None,
                },
            })
        })
    }

    fn edges(
        &self,
        node: NodeId,
        direction: EdgeDirection,
    ) -> impl Iterator<Item = &StoredQuad> + '_ {
        let index = match direction {
            EdgeDirection::Forward => &self.forward_index,
            EdgeDirection::Backward => &self.backward_index,
        };
        index
            .get(&node)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|&id| self.quads.get(id as usize))
    }

    fn check_node(&self, node: NodeId) -> Result<(), StoreError> {
        if self.nodes.contains(node) {
            Ok(())
        } else {
            Err(StoreError::UnknownNode(node))
        }
    }
}

impl GraphStore for QuadStore {
    fn nodes(&self) -> Box<dyn Iterator<Item = NodeId> + '_> {
        Box::new(self.nodes.iter())
    }

    fn node_count(&self) -> usize {
        self.nodes.len() as usize
    }

    fn lookup(&self, value: &Value) -> Option<NodeId> {
        self.interner.id_of(value)
    }

    fn value_of(&self, node: NodeId) -> Result<Value, StoreError> {
        self.interner
            .lookup(node)
            .ok_or(StoreError::UnknownNode(node))
    }

    fn neighbors(
        &self,
        node: NodeId,
        predicates: &RoaringBitmap,
        direction: EdgeDirection,
    ) -> Result<Vec<NodeId>, StoreError> {
        self.check_node(node)?;
        Ok(self
            .edges(node, direction)
            .filter(|q| predicates.contains(q.predicate))
            .map(|q| match direction {
                EdgeDirection::Forward => q.object,
                EdgeDirection::Backward => q.subject,
            })
            .collect())
    }

    fn predicates(
        &self,
        node: NodeId,
        direction: EdgeDirection,
    ) -> Result<Vec<NodeId>, StoreError> {
        self.check_node(node)?;
        let mut seen = RoaringBitmap::new();
        let mut out = Vec::new();
        for q in self.edges(node, direction) {
            if seen.insert(q.predicate) {
                out.push(q.predicate);
            }
        }
        Ok(out)
    }
}
