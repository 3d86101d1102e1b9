//! Shape trie: an acceptor over shape nodes for lexical lookup.
//!
//! Transitions are guarded by the full content (type + feature structure) of
//! one shape node. Guards are interned, so insertion reuses an existing
//! transition whenever the next node is value-equal to a guard already
//! leaving the current state. Lookup is more permissive: a query node follows
//! every guard it unifies with, and optional query nodes may be skipped.
//!
//! # Performance
//!
//! - Insertion: O(m · e) where m is the shape length and e the out-degree
//! - Lookup: O(m · e) per surviving path; optional nodes branch the search
//! - Space: one state per distinct prefix

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::feature::FeatureStruct;
use crate::pattern::NodeFilter;
use crate::shape::{NodeId, NodeType, Shape};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Guard {
    node_type: NodeType,
    fs: FeatureStruct,
}

#[derive(Debug, Clone)]
struct AcceptInfo<T> {
    value: T,
    node_count: usize,
    order: usize,
}

#[derive(Debug, Clone)]
struct TrieState<T> {
    // (guard index, target state)
    edges: SmallVec<[(usize, usize); 4]>,
    accepts: Vec<AcceptInfo<T>>,
}

impl<T> TrieState<T> {
    fn new() -> Self {
        TrieState {
            edges: SmallVec::new(),
            accepts: Vec::new(),
        }
    }
}

/// A build-once, read-many acceptor mapping shapes to values.
///
/// # Examples
///
/// ```rust
/// use libmorpher::dictionary::ShapeTrie;
/// use libmorpher::feature::FeatureStruct;
/// use libmorpher::pattern::NodeFilter;
/// use libmorpher::shape::{NodeType, Shape};
///
/// let shape = |segs: &[&str]| {
///     let mut s = Shape::new();
///     for seg in segs {
///         s.push(NodeType::Segment, FeatureStruct::new().with("seg", seg));
///     }
///     s
/// };
///
/// let mut trie = ShapeTrie::new(NodeFilter::SEGMENTS);
/// trie.insert(&shape(&["k", "a", "t"]), "cat");
/// trie.insert(&shape(&["k", "a"]), "ka");
///
/// assert_eq!(trie.search_exact(&shape(&["k", "a", "t"])), vec![&"cat"]);
/// assert_eq!(trie.search(&shape(&["k", "a", "t", "s"])).len(), 2);
/// assert!(trie.search(&shape(&["t"])).is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct ShapeTrie<T> {
    states: Vec<TrieState<T>>,
    guards: Vec<Guard>,
    guard_index: FxHashMap<Guard, usize>,
    filter: NodeFilter,
    len: usize,
}

impl<T> ShapeTrie<T> {
    /// Empty trie indexing the nodes admitted by `filter`.
    pub fn new(filter: NodeFilter) -> Self {
        ShapeTrie {
            states: vec![TrieState::new()],
            guards: Vec::new(),
            guard_index: FxHashMap::default(),
            filter,
            len: 0,
        }
    }

    /// Number of inserted entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when nothing was inserted.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of states, root included.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    fn visible(&self, shape: &Shape) -> Vec<NodeId> {
        shape
            .iter()
            .filter(|&id| self.filter.admits(shape[id].node_type))
            .collect()
    }

    /// Insert a shape with its value.
    pub fn insert(&mut self, shape: &Shape, value: T) {
        let nodes = self.visible(shape);
        let mut state = 0;
        for &id in &nodes {
            let guard = Guard {
                node_type: shape[id].node_type,
                fs: shape[id].fs.clone(),
            };
            let guard_idx = match self.guard_index.get(&guard) {
                Some(&g) => g,
                None => {
                    let g = self.guards.len();
                    self.guards.push(guard.clone());
                    self.guard_index.insert(guard, g);
                    g
                }
            };
            state = match self.states[state]
                .edges
                .iter()
                .find(|(g, _)| *g == guard_idx)
            {
                Some(&(_, target)) => target,
                None => {
                    let target = self.states.len();
                    self.states.push(TrieState::new());
                    self.states[state].edges.push((guard_idx, target));
                    target
                }
            };
        }
        let order = self.len;
        self.states[state].accepts.push(AcceptInfo {
            value,
            node_count: nodes.len(),
            order,
        });
        self.len += 1;
    }

    /// Values of every inserted shape that is compatible with a prefix of
    /// `query` (the whole query included).
    pub fn search(&self, query: &Shape) -> Vec<&T> {
        self.run(query, false)
    }

    /// Values of every inserted shape compatible with the whole of `query`.
    pub fn search_exact(&self, query: &Shape) -> Vec<&T> {
        self.run(query, true)
    }

    fn run(&self, query: &Shape, exact: bool) -> Vec<&T> {
        let nodes = self.visible(query);
        let mut found: Vec<&AcceptInfo<T>> = Vec::new();
        let mut seen: Vec<(usize, usize)> = Vec::new();
        let mut stack = vec![(0usize, 0usize)];
        while let Some((state, pos)) = stack.pop() {
            if seen.contains(&(state, pos)) {
                continue;
            }
            seen.push((state, pos));

            let rest_optional = nodes[pos..].iter().all(|&id| query[id].optional);
            if !exact || rest_optional {
                for info in &self.states[state].accepts {
                    if !found.iter().any(|f| std::ptr::eq(*f, info)) {
                        found.push(info);
                    }
                }
            }

            let Some(&id) = nodes.get(pos) else {
                continue;
            };
            let node = &query[id];
            if node.optional {
                stack.push((state, pos + 1));
            }
            for &(g, target) in &self.states[state].edges {
                let guard = &self.guards[g];
                if guard.node_type == node.node_type && guard.fs.is_unifiable(&node.fs) {
                    stack.push((target, pos + 1));
                }
            }
        }
        found.sort_by_key(|info| (info.node_count, info.order));
        found.into_iter().map(|info| &info.value).collect()
    }
}
