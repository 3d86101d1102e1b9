//! Arena-backed phonetic shapes.
//!
//! A [`Shape`] is a doubly-linked sequence of [`ShapeNode`]s stored in a
//! `Vec`, always bracketed by a begin and an end anchor. Links are
//! [`NodeId`] indices into the arena, so a cloned shape keeps the same ids for
//! the same nodes: a match found on an input shape can be replayed on its
//! clone.
//!
//! Every live node carries a position tag. Tags grow strictly from the begin
//! anchor to the end anchor, which makes [`Shape::compare`] O(1). Insertion
//! takes the midpoint of the neighbouring tags and renumbers the whole shape
//! when the gap is exhausted.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Index, IndexMut};

use crate::error::{MorphError, Result};
use crate::feature::FeatureStruct;
use crate::language::AllomorphId;

/// Index of a node in its shape's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct NodeId(u32);

impl NodeId {
    /// Arena index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum NodeType {
    /// A phonetic segment
    Segment,
    /// A word or phrase boundary symbol
    Boundary,
    /// The begin or end anchor of a shape
    Anchor,
    /// An explicit morpheme boundary symbol
    MorphBoundary,
}

impl NodeType {
    /// Boundary-like types.
    #[inline]
    pub fn is_boundary(self) -> bool {
        matches!(self, NodeType::Boundary | NodeType::MorphBoundary)
    }
}

/// Which morph a node was realized by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct MorphTag {
    /// The allomorph that produced the node
    pub allomorph: AllomorphId,
    /// Per-word morph occurrence number
    pub morph_id: u32,
}

/// A single position in a shape.
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct ShapeNode {
    /// Node kind
    pub node_type: NodeType,
    /// Phonetic features
    pub fs: FeatureStruct,
    /// Placeholder that later stages may or may not realize
    pub optional: bool,
    /// Set once an iterative rewrite has produced or consumed the node
    pub searched: bool,
    /// Owning morph, if any
    pub morph: Option<MorphTag>,
    tag: u64,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

impl ShapeNode {
    /// A fresh, unlinked node.
    pub fn new(node_type: NodeType, fs: FeatureStruct) -> Self {
        ShapeNode {
            node_type,
            fs,
            optional: false,
            searched: false,
            morph: None,
            tag: 0,
            prev: None,
            next: None,
        }
    }

    /// Segment node with the given features.
    pub fn segment(fs: FeatureStruct) -> Self {
        Self::new(NodeType::Segment, fs)
    }

    /// Builder: mark optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Builder: attach a morph tag.
    pub fn with_morph(mut self, morph: Option<MorphTag>) -> Self {
        self.morph = morph;
        self
    }

    /// Position tag (only meaningful inside a shape).
    #[inline]
    pub fn tag(&self) -> u64 {
        self.tag
    }

    /// Copy of the node's content without links.
    pub fn detached(&self) -> ShapeNode {
        ShapeNode {
            node_type: self.node_type,
            fs: self.fs.clone(),
            optional: self.optional,
            searched: self.searched,
            morph: self.morph,
            tag: 0,
            prev: None,
            next: None,
        }
    }
}

/// Traversal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum Direction {
    /// Begin anchor towards end anchor
    #[default]
    LeftToRight,
    /// End anchor towards begin anchor
    RightToLeft,
}

impl Direction {
    /// The other direction.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::LeftToRight => Direction::RightToLeft,
            Direction::RightToLeft => Direction::LeftToRight,
        }
    }
}

const TAG_MAX: u64 = u64::MAX;

// ============================================================================
// Shape
// ============================================================================

/// An ordered node sequence owned by one word or allomorph.
///
/// Clones are always unfrozen, and any mutation unfreezes the shape it
/// touches.
///
/// # Examples
///
/// ```rust
/// use libmorpher::feature::FeatureStruct;
/// use libmorpher::shape::{NodeType, Shape};
///
/// let mut shape = Shape::new();
/// let a = shape.push(NodeType::Segment, FeatureStruct::new().with("seg", "a"));
/// let c = shape.push(NodeType::Segment, FeatureStruct::new().with("seg", "c"));
/// let b = shape.insert_after(a, libmorpher::shape::ShapeNode::segment(
///     FeatureStruct::new().with("seg", "b"),
/// ));
/// assert_eq!(shape.iter().collect::<Vec<_>>(), vec![a, b, c]);
/// assert!(shape.compare(a, c).is_lt());
/// ```
#[derive(Debug)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Shape {
    nodes: Vec<Option<ShapeNode>>,
    begin: NodeId,
    end: NodeId,
    len: usize,
    frozen: bool,
}

impl Clone for Shape {
    fn clone(&self) -> Self {
        Shape {
            nodes: self.nodes.clone(),
            begin: self.begin,
            end: self.end,
            len: self.len,
            frozen: false,
        }
    }
}

impl Default for Shape {
    fn default() -> Self {
        Self::new()
    }
}

impl Shape {
    /// An empty shape holding only its two anchors.
    pub fn new() -> Self {
        let mut begin = ShapeNode::new(NodeType::Anchor, FeatureStruct::new());
        let mut end = ShapeNode::new(NodeType::Anchor, FeatureStruct::new());
        begin.tag = 0;
        begin.next = Some(NodeId(1));
        end.tag = TAG_MAX;
        end.prev = Some(NodeId(0));
        Shape {
            nodes: vec![Some(begin), Some(end)],
            begin: NodeId(0),
            end: NodeId(1),
            len: 0,
            frozen: false,
        }
    }

    /// Begin anchor.
    #[inline]
    pub fn begin(&self) -> NodeId {
        self.begin
    }

    /// End anchor.
    #[inline]
    pub fn end(&self) -> NodeId {
        self.end
    }

    /// Number of non-anchor nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when only the anchors are present.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of segment nodes.
    pub fn segment_count(&self) -> usize {
        self.iter()
            .filter(|&id| self[id].node_type == NodeType::Segment)
            .count()
    }

    /// Freeze the shape.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    fn thaw(&mut self) {
        self.frozen = false;
    }

    /// Whether the shape is frozen.
    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Node lookup that tolerates removed ids.
    pub fn get(&self, id: NodeId) -> Option<&ShapeNode> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    /// True if `id` names a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Next node in shape order.
    #[inline]
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.next)
    }

    /// Previous node in shape order.
    #[inline]
    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.prev)
    }

    /// Neighbour in the given direction.
    pub fn step(&self, id: NodeId, dir: Direction) -> Option<NodeId> {
        match dir {
            Direction::LeftToRight => self.next(id),
            Direction::RightToLeft => self.prev(id),
        }
    }

    /// Order two nodes of this shape.
    #[inline]
    pub fn compare(&self, a: NodeId, b: NodeId) -> Ordering {
        self[a].tag.cmp(&self[b].tag)
    }

    /// Non-anchor nodes in order.
    pub fn iter(&self) -> ShapeIter<'_> {
        ShapeIter {
            shape: self,
            cur: self.next(self.begin),
            end: self.end,
        }
    }

    /// All nodes in order, anchors included.
    pub fn iter_all(&self) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::once(self.begin)
            .chain(self.iter())
            .chain(std::iter::once(self.end))
    }

    /// Nodes from `first` to `last` inclusive.
    pub fn range(&self, first: NodeId, last: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = Some(first);
        while let Some(id) = cur {
            out.push(id);
            if id == last {
                break;
            }
            cur = self.next(id);
        }
        out
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Append a node before the end anchor.
    pub fn push(&mut self, node_type: NodeType, fs: FeatureStruct) -> NodeId {
        let end = self.end;
        self.insert_before(end, ShapeNode::new(node_type, fs))
    }

    /// Append a copy of `node` before the end anchor.
    pub fn push_node(&mut self, node: ShapeNode) -> NodeId {
        let end = self.end;
        self.insert_before(end, node)
    }

    /// Insert `node` right after `at`.
    pub fn insert_after(&mut self, at: NodeId, node: ShapeNode) -> NodeId {
        let next = if at == self.end {
            self.end
        } else {
            self.next(at).unwrap_or(self.end)
        };
        let prev = if at == self.end {
            self.prev(self.end).unwrap_or(self.begin)
        } else {
            at
        };
        self.link_between(prev, next, node)
    }

    /// Insert `node` right before `at`.
    pub fn insert_before(&mut self, at: NodeId, node: ShapeNode) -> NodeId {
        let prev = if at == self.begin {
            self.begin
        } else {
            self.prev(at).unwrap_or(self.begin)
        };
        let next = if at == self.begin {
            self.next(self.begin).unwrap_or(self.end)
        } else {
            at
        };
        self.link_between(prev, next, node)
    }

    fn link_between(&mut self, prev: NodeId, next: NodeId, mut node: ShapeNode) -> NodeId {
        self.thaw();
        let id = NodeId(self.nodes.len() as u32);
        let (lo, hi) = (self[prev].tag, self[next].tag);
        node.prev = Some(prev);
        node.next = Some(next);
        node.tag = lo + (hi - lo) / 2;
        let needs_renumber = hi - lo < 2;
        self.nodes.push(Some(node));
        if let Some(p) = self.nodes[prev.index()].as_mut() {
            p.next = Some(id);
        }
        if let Some(n) = self.nodes[next.index()].as_mut() {
            n.prev = Some(id);
        }
        self.len += 1;
        if needs_renumber {
            self.renumber();
        }
        id
    }

    fn renumber(&mut self) {
        let order: Vec<NodeId> = self.iter_all().collect();
        let step = TAG_MAX / (order.len() as u64 + 1);
        let last = order.len() - 1;
        for (i, id) in order.into_iter().enumerate() {
            if let Some(node) = self.nodes[id.index()].as_mut() {
                node.tag = if i == last { TAG_MAX } else { step * i as u64 };
            }
        }
    }

    /// Unlink and drop a non-anchor node.
    pub fn remove(&mut self, id: NodeId) {
        self.thaw();
        if id == self.begin || id == self.end {
            return;
        }
        let Some(node) = self.nodes.get_mut(id.index()).and_then(Option::take) else {
            return;
        };
        if let Some(p) = node.prev.and_then(|p| self.nodes[p.index()].as_mut()) {
            p.next = node.next;
        }
        if let Some(n) = node.next.and_then(|n| self.nodes[n.index()].as_mut()) {
            n.prev = node.prev;
        }
        self.len -= 1;
    }

    /// Clear every searched flag.
    pub fn clear_searched(&mut self) {
        self.thaw();
        for node in self.nodes.iter_mut().flatten() {
            node.searched = false;
        }
    }

    /// Fail with [`MorphError::TooManySegments`] past `limit` nodes.
    pub fn check_len(&self, limit: usize) -> Result<()> {
        if self.len > limit {
            Err(MorphError::TooManySegments { limit })
        } else {
            Ok(())
        }
    }

    // ========================================================================
    // Morph spans
    // ========================================================================

    /// Morphs in surface order, one entry per morph occurrence.
    pub fn morphs(&self) -> Vec<MorphSpan> {
        let mut spans: Vec<MorphSpan> = Vec::new();
        for id in self.iter() {
            let Some(tag) = self[id].morph else {
                continue;
            };
            match spans.iter_mut().find(|s| s.tag.morph_id == tag.morph_id) {
                Some(span) => span.last = id,
                None => spans.push(MorphSpan {
                    tag,
                    first: id,
                    last: id,
                }),
            }
        }
        spans
    }

    /// Content snapshot used for equality and hashing.
    fn content(&self) -> impl Iterator<Item = (&NodeType, &FeatureStruct, bool)> {
        self.iter().map(move |id| {
            let n = &self[id];
            (&n.node_type, &n.fs, n.optional)
        })
    }
}

impl Index<NodeId> for Shape {
    type Output = ShapeNode;

    fn index(&self, id: NodeId) -> &ShapeNode {
        match &self.nodes[id.index()] {
            Some(node) => node,
            None => panic!("node {:?} was removed from the shape", id),
        }
    }
}

impl IndexMut<NodeId> for Shape {
    fn index_mut(&mut self, id: NodeId) -> &mut ShapeNode {
        self.thaw();
        match &mut self.nodes[id.index()] {
            Some(node) => node,
            None => panic!("node {:?} was removed from the shape", id),
        }
    }
}

impl PartialEq for Shape {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.content().eq(other.content())
    }
}

impl Eq for Shape {}

impl Hash for Shape {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len.hash(state);
        for (t, fs, opt) in self.content() {
            t.hash(state);
            fs.hash(state);
            opt.hash(state);
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", self[id].fs)?;
        }
        Ok(())
    }
}

/// First and last node of one morph occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MorphSpan {
    /// The morph
    pub tag: MorphTag,
    /// First node realized by the morph
    pub first: NodeId,
    /// Last node realized by the morph
    pub last: NodeId,
}

/// Iterator over the non-anchor nodes of a shape.
pub struct ShapeIter<'a> {
    shape: &'a Shape,
    cur: Option<NodeId>,
    end: NodeId,
}

impl<'a> Iterator for ShapeIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.cur?;
        if id == self.end {
            self.cur = None;
            return None;
        }
        self.cur = self.shape.next(id);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(name: &str) -> FeatureStruct {
        FeatureStruct::new().with("seg", name)
    }

    fn names(shape: &Shape) -> Vec<String> {
        shape
            .iter()
            .map(|id| shape[id].fs.symbols("seg").map(|s| s.to_string()).unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_push_insert_remove() {
        let mut shape = Shape::new();
        let a = shape.push(NodeType::Segment, seg("a"));
        let c = shape.push(NodeType::Segment, seg("c"));
        shape.insert_after(a, ShapeNode::segment(seg("b")));
        shape.insert_before(a, ShapeNode::segment(seg("z")));
        assert_eq!(names(&shape), vec!["z", "a", "b", "c"]);
        shape.remove(a);
        assert_eq!(names(&shape), vec!["z", "b", "c"]);
        assert_eq!(shape.len(), 3);
        assert_eq!(shape.next(c), Some(shape.end()));
    }

    #[test]
    fn test_tags_stay_ordered_under_many_insertions() {
        let mut shape = Shape::new();
        let first = shape.push(NodeType::Segment, seg("a"));
        let mut last = first;
        for _ in 0..200 {
            last = shape.insert_after(first, ShapeNode::segment(seg("x")));
        }
        let ids: Vec<NodeId> = shape.iter_all().collect();
        for pair in ids.windows(2) {
            assert!(shape.compare(pair[0], pair[1]).is_lt());
        }
        assert!(shape.compare(first, last).is_lt());
    }

    #[test]
    fn test_clone_keeps_ids_and_unfreezes() {
        let mut shape = Shape::new();
        let a = shape.push(NodeType::Segment, seg("a"));
        shape.freeze();
        let mut copy = shape.clone();
        assert!(!copy.is_frozen());
        copy[a].fs = seg("b");
        assert_eq!(names(&copy), vec!["b"]);
        assert_eq!(names(&shape), vec!["a"]);
        assert_ne!(shape, copy);
    }

    #[test]
    fn test_mutation_unfreezes() {
        let mut shape = Shape::new();
        let a = shape.push(NodeType::Segment, seg("a"));
        shape.freeze();
        shape[a].fs = seg("b");
        assert!(!shape.is_frozen());
        assert_eq!(names(&shape), vec!["b"]);

        shape.freeze();
        shape.remove(a);
        assert!(!shape.is_frozen());
        assert!(shape.is_empty());
    }

    #[test]
    fn test_equality_ignores_ids() {
        let mut x = Shape::new();
        x.push(NodeType::Segment, seg("a"));
        x.push(NodeType::Segment, seg("b"));
        let mut y = Shape::new();
        let b = y.push(NodeType::Segment, seg("b"));
        y.insert_before(b, ShapeNode::segment(seg("a")));
        assert_eq!(x, y);
    }

    #[test]
    fn test_check_len() {
        let mut shape = Shape::new();
        shape.push(NodeType::Segment, seg("a"));
        shape.push(NodeType::Segment, seg("a"));
        assert!(shape.check_len(2).is_ok());
        assert_eq!(
            shape.check_len(1),
            Err(MorphError::TooManySegments { limit: 1 })
        );
    }
}
