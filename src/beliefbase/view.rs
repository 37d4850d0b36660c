//! The view tree, held as an arena.
//!
//! Views are nodes addressed by [`ViewId`]; the arena owns every node, a
//! node's parent is stored as an id, and children are looked up by name.
//! There are no owning back-references and therefore no reference cycles.
//! Walking past the deepest defined path lands on the shared empty view,
//! which answers every query as empty and never errors.

use std::collections::HashMap;
use std::sync::Arc;

use crate::beliefbase::storage::{MemoryStorage, Storage};
use crate::literal::Literal;
use crate::path::Path;
use crate::trigger::Trigger;

/// Handle of a view node inside an arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(usize);

impl ViewId {
    /// The terminal empty view: every query on it is empty, every
    /// mutation a no-op.
    pub const EMPTY: Self = Self(usize::MAX);

    /// Returns true for the empty view.
    #[must_use]
    pub const fn is_empty_view(self) -> bool {
        self.0 == usize::MAX
    }
}

/// Creates the storage backing a freshly generated view.
pub type ViewGenerator<'a> = dyn Fn(&str) -> Arc<dyn Storage> + 'a;

struct ViewNode {
    name: String,
    parent: Option<ViewId>,
    children: HashMap<String, ViewId>,
    storage: Arc<dyn Storage>,
}

/// The belief-view tree of one agent.
pub struct ViewArena {
    nodes: Vec<ViewNode>,
}

impl ViewArena {
    /// Creates an arena whose root view is backed by the given storage.
    #[must_use]
    pub fn new(root_storage: Arc<dyn Storage>) -> Self {
        Self {
            nodes: vec![ViewNode {
                name: String::new(),
                parent: None,
                children: HashMap::new(),
                storage: root_storage,
            }],
        }
    }

    /// The root view.
    #[must_use]
    pub const fn root(&self) -> ViewId {
        ViewId(0)
    }

    /// Number of views, the root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// An arena always holds at least the root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, id: ViewId) -> Option<&ViewNode> {
        if id.is_empty_view() {
            return None;
        }
        self.nodes.get(id.0)
    }

    /// The local name of a view.
    #[must_use]
    pub fn name(&self, id: ViewId) -> Option<&str> {
        self.node(id).map(|n| n.name.as_str())
    }

    /// The parent of a view; the root and the empty view have none.
    #[must_use]
    pub fn parent(&self, id: ViewId) -> Option<ViewId> {
        self.node(id).and_then(|n| n.parent)
    }

    /// The full path of a view from the root.
    #[must_use]
    pub fn path(&self, id: ViewId) -> Path {
        let mut segments = Vec::new();
        let mut current = id;
        while let Some(node) = self.node(current) {
            if !node.name.is_empty() {
                segments.push(node.name.clone());
            }
            match node.parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        segments.reverse();
        Path::from_segments(segments)
    }

    /// Child views of a node.
    #[must_use]
    pub fn children(&self, id: ViewId) -> Vec<ViewId> {
        self.node(id)
            .map(|n| n.children.values().copied().collect())
            .unwrap_or_default()
    }

    /// Looks up a direct child by name.
    #[must_use]
    pub fn child(&self, id: ViewId, name: &str) -> Option<ViewId> {
        self.node(id).and_then(|n| n.children.get(name).copied())
    }

    /// Adds a child view backed by the given storage, returning its id.
    /// An existing child of the same name is returned unchanged.
    pub fn add_view(&mut self, parent: ViewId, name: &str, storage: Arc<dyn Storage>) -> ViewId {
        if self.node(parent).is_none() || name.is_empty() {
            return ViewId::EMPTY;
        }
        if let Some(existing) = self.child(parent, name) {
            return existing;
        }

        let id = ViewId(self.nodes.len());
        self.nodes.push(ViewNode {
            name: name.to_string(),
            parent: Some(parent),
            children: HashMap::new(),
            storage,
        });
        self.nodes[parent.0].children.insert(name.to_string(), id);
        id
    }

    /// Walks a path from a view, returning every intermediate view in
    /// order. Missing segments are created through the generator when one
    /// is supplied; without one the walk terminates on the empty view.
    pub fn walk(
        &mut self,
        from: ViewId,
        path: &Path,
        generator: Option<&ViewGenerator<'_>>,
    ) -> Vec<ViewId> {
        let mut visited = vec![from];
        let mut current = from;

        for segment in path.segments() {
            let next = match self.child(current, segment) {
                Some(child) => child,
                None => match generator {
                    Some(generate) => self.add_view(current, segment, generate(segment)),
                    None => ViewId::EMPTY,
                },
            };
            visited.push(next);
            if next.is_empty_view() {
                break;
            }
            current = next;
        }
        visited
    }

    /// Adds one literal to a view; exactly one add trigger per literal.
    pub fn add_literal(&mut self, id: ViewId, literal: Literal) -> Vec<Trigger> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        if node.storage.put_multi(&literal.functor().to_string(), literal.clone()) {
            vec![Trigger::add_belief(literal)]
        } else {
            Vec::new()
        }
    }

    /// Adds literals in bulk; one trigger per element, never one for the
    /// batch.
    pub fn add_literals(
        &mut self,
        id: ViewId,
        literals: impl IntoIterator<Item = Literal>,
    ) -> Vec<Trigger> {
        literals
            .into_iter()
            .flat_map(|l| self.add_literal(id, l))
            .collect()
    }

    /// Removes one literal from a view; exactly one delete trigger when
    /// something was removed.
    pub fn remove_literal(&mut self, id: ViewId, literal: &Literal) -> Vec<Trigger> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        if node
            .storage
            .remove_multi(&literal.functor().to_string(), literal)
        {
            vec![Trigger::delete_belief(literal.clone())]
        } else {
            Vec::new()
        }
    }

    /// Streams literals of a view and its subtree, optionally restricted
    /// to a functor sub-path and a negation flag.
    #[must_use]
    pub fn stream(
        &self,
        id: ViewId,
        path_filter: Option<&Path>,
        negated: Option<bool>,
    ) -> Vec<Literal> {
        let mut out = Vec::new();
        self.stream_into(id, path_filter, negated, &mut out);
        out
    }

    fn stream_into(
        &self,
        id: ViewId,
        path_filter: Option<&Path>,
        negated: Option<bool>,
        out: &mut Vec<Literal>,
    ) {
        let Some(node) = self.node(id) else {
            return;
        };

        for literal in node.storage.stream_multi() {
            let path_ok = path_filter.is_none_or(|p| literal.functor().starts_with(p));
            let negated_ok = negated.is_none_or(|n| literal.negated() == n);
            if path_ok && negated_ok {
                out.push(literal);
            }
        }
        for child in node.children.values() {
            self.stream_into(*child, path_filter, negated, out);
        }
    }

    /// Clears a view's storage and recursively its subtree.
    pub fn clear(&mut self, id: ViewId) {
        let Some(node) = self.node(id) else {
            return;
        };
        node.storage.clear();
        for child in self.children(id) {
            self.clear(child);
        }
    }

    /// Runs the per-cycle storage synchronization across the whole tree.
    ///
    /// Storages shared by several views are visited once per cycle; the
    /// arena deduplicates by storage identity on top of each storage's own
    /// re-entrancy guard.
    pub fn update(&mut self, cycle: u64) -> Vec<Trigger> {
        let mut seen: Vec<*const ()> = Vec::new();
        let mut triggers = Vec::new();

        for node in &self.nodes {
            let identity = Arc::as_ptr(&node.storage).cast::<()>();
            if seen.contains(&identity) {
                continue;
            }
            seen.push(identity);
            triggers.extend(node.storage.update(cycle));
        }
        triggers
    }

    /// Total number of literals in the subtree of a view.
    #[must_use]
    pub fn size(&self, id: ViewId) -> usize {
        let Some(node) = self.node(id) else {
            return 0;
        };
        node.storage.size()
            + node
                .children
                .values()
                .map(|child| self.size(*child))
                .sum::<usize>()
    }
}

impl Default for ViewArena {
    fn default() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }
}

impl std::fmt::Debug for ViewArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewArena")
            .field("views", &self.nodes.len())
            .finish()
    }
}
