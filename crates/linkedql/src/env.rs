//! Persistent tag/binding environment.
//!
//! Bindings form an `Arc`-linked association list: binding a tag prepends a
//! cell and shares the tail, so forking the environment for sibling branches
//! is O(1) and no branch can observe another branch's bindings. Lookups return
//! the most recent binding, which gives "last writer wins".

use std::collections::HashSet;
use std::sync::Arc;

use crate::plan::Plan;

#[derive(Debug)]
struct TagCell {
    name: String,
    plan: Plan,
    next: Option<Arc<TagCell>>,
}

#[derive(Debug, Clone)]
pub struct Environment {
    tags: Option<Arc<TagCell>>,
    placeholder: Plan,
}

impl Default for Environment {
    fn default() -> Self {
        Self::root()
    }
}

impl Environment {
    /// Empty environment whose placeholder selects every node.
    pub fn root() -> Self {
        Self {
            tags: None,
            placeholder: Plan::all_nodes(),
        }
    }

    pub fn placeholder(&self) -> &Plan {
        &self.placeholder
    }

    /// Same bindings, new placeholder.
    pub fn with_placeholder(&self, placeholder: Plan) -> Self {
        Self {
            tags: self.tags.clone(),
            placeholder,
        }
    }

    pub fn bind(&self, name: impl Into<String>, plan: Plan) -> Self {
        Self {
            tags: Some(Arc::new(TagCell {
                name: name.into(),
                plan,
                next: self.tags.clone(),
            })),
            placeholder: self.placeholder.clone(),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Plan> {
        self.cells().find(|cell| cell.name == name).map(|cell| &cell.plan)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Distinct bound names, oldest binding first.
    pub fn names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names: Vec<String> = self
            .cells()
            .filter(|cell| seen.insert(cell.name.as_str()))
            .map(|cell| cell.name.clone())
            .collect();
        names.reverse();
        names
    }

    /// Re-export every binding a branch made on top of `self`.
    pub fn merge_exports(&self, branch: &Environment) -> Environment {
        let mut merged = self.clone();
        for name in branch.names() {
            let Some(plan) = branch.lookup(&name) else {
                continue;
            };
            let unchanged = self.lookup(&name).is_some_and(|ours| ours.ptr_eq(plan));
            if !unchanged {
                merged = merged.bind(name, plan.clone());
            }
        }
        merged
    }

    fn cells(&self) -> impl Iterator<Item = &TagCell> {
        std::iter::successors(self.tags.as_deref(), |cell| cell.next.as_deref())
    }
}
