//! Backtracking pattern matcher.
//!
//! The shape is first projected onto the nodes admitted by the
//! [`NodeFilter`]; the pattern is then matched left to right over that
//! projection. The direction setting only controls the order in which start
//! positions are tried. Optional shape nodes may be consumed or skipped by any
//! constraint, and quantifiers are greedy: longer repetitions come first.

use std::ops::Range;

use smallvec::SmallVec;

use super::{Pattern, PatternNode};
use crate::feature::{Symbol, VariableBindings};
use crate::shape::{Direction, NodeId, NodeType, Shape};

/// Set of node types visible to a matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeFilter {
    segments: bool,
    boundaries: bool,
    anchors: bool,
}

impl NodeFilter {
    /// Segments, boundaries and anchors.
    pub const ALL: NodeFilter = NodeFilter {
        segments: true,
        boundaries: true,
        anchors: true,
    };

    /// Segments and anchors; boundaries are transparent.
    pub const SEGMENTS_AND_ANCHORS: NodeFilter = NodeFilter {
        segments: true,
        boundaries: false,
        anchors: true,
    };

    /// Segments only.
    pub const SEGMENTS: NodeFilter = NodeFilter {
        segments: true,
        boundaries: false,
        anchors: false,
    };

    /// Whether nodes of this type are visible.
    #[inline]
    pub fn admits(&self, node_type: NodeType) -> bool {
        match node_type {
            NodeType::Segment => self.segments,
            NodeType::Boundary | NodeType::MorphBoundary => self.boundaries,
            NodeType::Anchor => self.anchors,
        }
    }
}

/// Matcher configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatcherSettings {
    /// Visible node types
    pub filter: NodeFilter,
    /// Order in which start positions are tried
    pub direction: Direction,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        MatcherSettings {
            filter: NodeFilter::SEGMENTS_AND_ANCHORS,
            direction: Direction::LeftToRight,
        }
    }
}

/// A successful match.
#[derive(Debug, Clone)]
pub struct Match {
    seq: Vec<NodeId>,
    start: usize,
    end: usize,
    groups: SmallVec<[(Symbol, Range<usize>); 4]>,
    /// Variable bindings established by the match
    pub bindings: VariableBindings,
}

impl Match {
    /// Matched nodes (filtered view), including skipped optional nodes.
    pub fn nodes(&self) -> &[NodeId] {
        &self.seq[self.start..self.end]
    }

    /// First matched node.
    pub fn first(&self) -> Option<NodeId> {
        self.nodes().first().copied()
    }

    /// Last matched node.
    pub fn last(&self) -> Option<NodeId> {
        self.nodes().last().copied()
    }

    /// Visible node just before the match.
    pub fn before(&self) -> Option<NodeId> {
        self.start.checked_sub(1).map(|i| self.seq[i])
    }

    /// Visible node just after the match.
    pub fn after(&self) -> Option<NodeId> {
        self.seq.get(self.end).copied()
    }

    /// True if a group with this name was captured.
    pub fn has_group(&self, name: &str) -> bool {
        self.group_range(name).is_some()
    }

    /// Nodes captured by a group (filtered view).
    pub fn group(&self, name: &str) -> &[NodeId] {
        match self.group_range(name) {
            Some(r) => &self.seq[r],
            None => &[],
        }
    }

    /// First and last node of a non-empty group.
    pub fn group_span(&self, name: &str) -> Option<(NodeId, NodeId)> {
        let nodes = self.group(name);
        Some((*nodes.first()?, *nodes.last()?))
    }

    /// Visible node right before a group, even when the group is empty.
    pub fn group_before(&self, name: &str) -> Option<NodeId> {
        let r = self.group_range(name)?;
        r.start.checked_sub(1).map(|i| self.seq[i])
    }

    /// Visible node right after a group, even when the group is empty.
    pub fn group_after(&self, name: &str) -> Option<NodeId> {
        let r = self.group_range(name)?;
        self.seq.get(r.end).copied()
    }

    fn group_range(&self, name: &str) -> Option<Range<usize>> {
        self.groups
            .iter()
            .rev()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, r)| r.clone())
    }
}

#[derive(Clone)]
struct State {
    bindings: VariableBindings,
    groups: SmallVec<[(Symbol, Range<usize>); 4]>,
}

/// A compiled pattern plus its settings.
#[derive(Debug, Clone)]
pub struct Matcher {
    pattern: Pattern,
    settings: MatcherSettings,
}

impl Matcher {
    /// Create a matcher.
    pub fn new(pattern: Pattern, settings: MatcherSettings) -> Self {
        Matcher { pattern, settings }
    }

    /// The pattern.
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// The settings.
    pub fn settings(&self) -> &MatcherSettings {
        &self.settings
    }

    /// Visible nodes of a shape, in shape order.
    pub fn project(&self, shape: &Shape) -> Vec<NodeId> {
        shape
            .iter_all()
            .filter(|&id| self.settings.filter.admits(shape[id].node_type))
            .collect()
    }

    /// True if the pattern matches anywhere.
    pub fn is_match(&self, shape: &Shape) -> bool {
        self.first_match(shape).is_some()
    }

    /// First match in direction order.
    pub fn first_match(&self, shape: &Shape) -> Option<Match> {
        self.find_from(shape, None, &VariableBindings::new(), |_| true)
    }

    /// First (greedy) match at every start position, in direction order.
    pub fn all_matches(&self, shape: &Shape) -> Vec<Match> {
        let seq = self.project(shape);
        self.start_order(seq.len(), None, shape, &seq)
            .filter_map(|i| {
                self.matches_at(shape, &seq, i, &VariableBindings::new())
                    .into_iter()
                    .next()
            })
            .collect()
    }

    /// Every alternative match at every start position.
    pub fn every_match(&self, shape: &Shape) -> Vec<Match> {
        let seq = self.project(shape);
        self.start_order(seq.len(), None, shape, &seq)
            .flat_map(|i| self.matches_at(shape, &seq, i, &VariableBindings::new()))
            .collect()
    }

    /// First accepted match whose start lies at or beyond `from` in the
    /// matcher's direction, starting from `bindings`.
    pub fn find_from(
        &self,
        shape: &Shape,
        from: Option<NodeId>,
        bindings: &VariableBindings,
        mut accept: impl FnMut(&Match) -> bool,
    ) -> Option<Match> {
        let seq = self.project(shape);
        let starts: Vec<usize> = self.start_order(seq.len(), from, shape, &seq).collect();
        starts.into_iter().find_map(|i| {
            self.matches_at(shape, &seq, i, bindings)
                .into_iter()
                .find(|m| accept(m))
        })
    }

    /// Matches covering exactly `nodes` (a pre-projected sequence).
    pub fn match_exact(
        &self,
        shape: &Shape,
        seq: &[NodeId],
        bindings: &VariableBindings,
    ) -> Vec<Match> {
        self.matches_at(shape, seq, 0, bindings)
            .into_iter()
            .filter(|m| m.end == seq.len())
            .collect()
    }

    fn start_order<'s>(
        &self,
        len: usize,
        from: Option<NodeId>,
        shape: &'s Shape,
        seq: &'s [NodeId],
    ) -> Box<dyn Iterator<Item = usize> + 's> {
        match self.settings.direction {
            Direction::LeftToRight => {
                let lo = match from {
                    Some(f) => seq
                        .iter()
                        .position(|&id| shape.compare(id, f).is_ge())
                        .unwrap_or(len),
                    None => 0,
                };
                Box::new(lo..len)
            }
            Direction::RightToLeft => {
                let hi = match from {
                    Some(f) => seq
                        .iter()
                        .rposition(|&id| shape.compare(id, f).is_le())
                        .map_or(0, |i| i + 1),
                    None => len,
                };
                Box::new((0..hi).rev())
            }
        }
    }

    fn matches_at(
        &self,
        shape: &Shape,
        seq: &[NodeId],
        start: usize,
        bindings: &VariableBindings,
    ) -> Vec<Match> {
        let state = State {
            bindings: bindings.clone(),
            groups: SmallVec::new(),
        };
        self.match_seq(shape, seq, self.pattern.nodes(), start, state)
            .into_iter()
            .map(|(end, state)| Match {
                seq: seq.to_vec(),
                start,
                end,
                groups: state.groups,
                bindings: state.bindings,
            })
            .collect()
    }

    fn match_seq(
        &self,
        shape: &Shape,
        seq: &[NodeId],
        pattern: &[PatternNode],
        pos: usize,
        state: State,
    ) -> Vec<(usize, State)> {
        let Some((head, tail)) = pattern.split_first() else {
            return vec![(pos, state)];
        };
        let mut results = Vec::new();
        for (next, s) in self.match_node(shape, seq, head, pos, state) {
            results.extend(self.match_seq(shape, seq, tail, next, s));
        }
        results
    }

    fn match_node(
        &self,
        shape: &Shape,
        seq: &[NodeId],
        node: &PatternNode,
        pos: usize,
        state: State,
    ) -> Vec<(usize, State)> {
        match node {
            PatternNode::Constraint(c) => {
                let mut results = Vec::new();
                let mut p = pos;
                while let Some(&id) = seq.get(p) {
                    let shape_node = &shape[id];
                    let mut bindings = state.bindings.clone();
                    if c.matches(shape_node, &mut bindings) {
                        results.push((
                            p + 1,
                            State {
                                bindings,
                                groups: state.groups.clone(),
                            },
                        ));
                    }
                    if !shape_node.optional {
                        break;
                    }
                    p += 1;
                }
                results
            }
            PatternNode::Group { name, children } => self
                .match_seq(shape, seq, children, pos, state)
                .into_iter()
                .map(|(end, mut s)| {
                    s.groups.push((name.clone(), pos..end));
                    (end, s)
                })
                .collect(),
            PatternNode::Quantifier { min, max, child } => {
                self.match_repeat(shape, seq, child, *min, *max, 0, pos, state)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn match_repeat(
        &self,
        shape: &Shape,
        seq: &[NodeId],
        child: &PatternNode,
        min: usize,
        max: Option<usize>,
        count: usize,
        pos: usize,
        state: State,
    ) -> Vec<(usize, State)> {
        let mut results = Vec::new();
        if max.map_or(true, |m| count < m) {
            for (next, s) in self.match_node(shape, seq, child, pos, state.clone()) {
                if next > pos {
                    results.extend(self.match_repeat(
                        shape,
                        seq,
                        child,
                        min,
                        max,
                        count + 1,
                        next,
                        s,
                    ));
                }
            }
        }
        if count >= min {
            results.push((pos, state));
        }
        results
    }
}
