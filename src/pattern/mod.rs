//! Patterns over shapes.
//!
//! A [`Pattern`] is a sequence of [`PatternNode`]s: feature constraints on
//! single nodes, named capture groups, and bounded repetition. Patterns are
//! matched by a backtracking [`Matcher`] that unifies constraint features with
//! node features and threads alpha-variable bindings through the match.

mod matcher;

pub use matcher::{Match, Matcher, MatcherSettings, NodeFilter};

use std::fmt;

use crate::feature::{FeatureStruct, Symbol, VariableBindings};
use crate::shape::{NodeType, ShapeNode};

/// Node kinds a constraint can match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// Segment nodes
    Segment,
    /// Boundary and morph-boundary nodes
    Boundary,
    /// Begin/end anchors
    Anchor,
}

impl ConstraintKind {
    fn admits(self, node_type: NodeType) -> bool {
        match self {
            ConstraintKind::Segment => node_type == NodeType::Segment,
            ConstraintKind::Boundary => node_type.is_boundary(),
            ConstraintKind::Anchor => node_type == NodeType::Anchor,
        }
    }
}

/// A feature constraint on a single node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Constraint {
    /// Node kind
    pub kind: ConstraintKind,
    /// Features the node must unify with
    pub fs: FeatureStruct,
    /// Refuse nodes already marked searched
    pub unsearched: bool,
}

impl Constraint {
    /// Segment constraint.
    pub fn segment(fs: FeatureStruct) -> Self {
        Constraint {
            kind: ConstraintKind::Segment,
            fs,
            unsearched: false,
        }
    }

    /// Boundary constraint.
    pub fn boundary(fs: FeatureStruct) -> Self {
        Constraint {
            kind: ConstraintKind::Boundary,
            fs,
            unsearched: false,
        }
    }

    /// Anchor constraint.
    pub fn anchor() -> Self {
        Constraint {
            kind: ConstraintKind::Anchor,
            fs: FeatureStruct::new(),
            unsearched: false,
        }
    }

    /// Builder: require the node to be unsearched.
    pub fn unsearched(mut self) -> Self {
        self.unsearched = true;
        self
    }

    /// Test a node, extending `bindings` on success only.
    pub fn matches(&self, node: &ShapeNode, bindings: &mut VariableBindings) -> bool {
        if !self.kind.admits(node.node_type) {
            return false;
        }
        if self.unsearched && node.searched {
            return false;
        }
        self.fs.is_unifiable_with(&node.fs, bindings)
    }
}

/// One element of a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternNode {
    /// Matches exactly one node
    Constraint(Constraint),
    /// Named capture around a sub-pattern
    Group {
        /// Capture name
        name: Symbol,
        /// Captured sub-pattern
        children: Vec<PatternNode>,
    },
    /// `min..=max` repetitions of a sub-pattern (greedy)
    Quantifier {
        /// Minimum repetitions
        min: usize,
        /// Maximum repetitions, `None` for unbounded
        max: Option<usize>,
        /// Repeated sub-pattern
        child: Box<PatternNode>,
    },
}

impl PatternNode {
    /// Shorthand for a segment constraint.
    pub fn segment(fs: FeatureStruct) -> Self {
        PatternNode::Constraint(Constraint::segment(fs))
    }

    /// Shorthand for a boundary constraint.
    pub fn boundary(fs: FeatureStruct) -> Self {
        PatternNode::Constraint(Constraint::boundary(fs))
    }

    /// Shorthand for an anchor constraint.
    pub fn anchor() -> Self {
        PatternNode::Constraint(Constraint::anchor())
    }

    /// Shorthand for a named group.
    pub fn group(name: &str, children: Vec<PatternNode>) -> Self {
        PatternNode::Group {
            name: Symbol::from(name),
            children,
        }
    }

    /// `child*`
    pub fn zero_or_more(child: PatternNode) -> Self {
        PatternNode::Quantifier {
            min: 0,
            max: None,
            child: Box::new(child),
        }
    }

    /// `child+`
    pub fn one_or_more(child: PatternNode) -> Self {
        PatternNode::Quantifier {
            min: 1,
            max: None,
            child: Box::new(child),
        }
    }

    /// `child?`
    pub fn optional(child: PatternNode) -> Self {
        PatternNode::Quantifier {
            min: 0,
            max: Some(1),
            child: Box::new(child),
        }
    }

    /// True if the node consumes exactly one shape node.
    pub fn is_simple(&self) -> bool {
        matches!(self, PatternNode::Constraint(_))
    }

    fn visit_constraints<'a>(&'a self, out: &mut Vec<&'a Constraint>) {
        match self {
            PatternNode::Constraint(c) => out.push(c),
            PatternNode::Group { children, .. } => {
                children.iter().for_each(|c| c.visit_constraints(out))
            }
            PatternNode::Quantifier { child, .. } => child.visit_constraints(out),
        }
    }

    fn map_constraints(&self, f: &mut impl FnMut(&Constraint) -> Option<Constraint>) -> Option<Self> {
        match self {
            PatternNode::Constraint(c) => f(c).map(PatternNode::Constraint),
            PatternNode::Group { name, children } => Some(PatternNode::Group {
                name: name.clone(),
                children: children.iter().filter_map(|c| c.map_constraints(f)).collect(),
            }),
            PatternNode::Quantifier { min, max, child } => {
                child.map_constraints(f).map(|child| PatternNode::Quantifier {
                    min: *min,
                    max: *max,
                    child: Box::new(child),
                })
            }
        }
    }
}

/// A sequence of pattern nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Pattern {
    nodes: Vec<PatternNode>,
}

impl Pattern {
    /// Empty pattern (matches the empty span).
    pub fn new() -> Self {
        Self::default()
    }

    /// Pattern over the given nodes.
    pub fn from_nodes(nodes: Vec<PatternNode>) -> Self {
        Pattern { nodes }
    }

    /// Pattern of plain segment constraints.
    pub fn segments<I: IntoIterator<Item = FeatureStruct>>(fss: I) -> Self {
        Pattern {
            nodes: fss.into_iter().map(PatternNode::segment).collect(),
        }
    }

    /// Builder: append a node.
    pub fn then(mut self, node: PatternNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Append a node.
    pub fn push(&mut self, node: PatternNode) {
        self.nodes.push(node);
    }

    /// Append all nodes of another pattern.
    pub fn extend(&mut self, other: &Pattern) {
        self.nodes.extend(other.nodes.iter().cloned());
    }

    /// Top-level nodes.
    pub fn nodes(&self) -> &[PatternNode] {
        &self.nodes
    }

    /// Number of top-level nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True when every top-level node is a single constraint.
    pub fn is_simple(&self) -> bool {
        self.nodes.iter().all(PatternNode::is_simple)
    }

    /// All constraints in order, at any depth.
    pub fn constraints(&self) -> Vec<&Constraint> {
        let mut out = Vec::new();
        self.nodes.iter().for_each(|n| n.visit_constraints(&mut out));
        out
    }

    /// A copy without boundary constraints.
    pub fn without_boundaries(&self) -> Pattern {
        self.filter_constraints(|c| c.kind != ConstraintKind::Boundary)
    }

    /// A copy keeping only constraints accepted by `keep`.
    pub fn filter_constraints(&self, mut keep: impl FnMut(&Constraint) -> bool) -> Pattern {
        self.map(|c| keep(c).then(|| c.clone()))
    }

    /// A copy with every constraint rewritten (or dropped on `None`).
    pub fn map(&self, mut f: impl FnMut(&Constraint) -> Option<Constraint>) -> Pattern {
        Pattern {
            nodes: self
                .nodes
                .iter()
                .filter_map(|n| n.map_constraints(&mut f))
                .collect(),
        }
    }
}

impl fmt::Display for PatternNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternNode::Constraint(c) => match c.kind {
                ConstraintKind::Segment => write!(f, "{}", c.fs),
                ConstraintKind::Boundary => write!(f, "#{}", c.fs),
                ConstraintKind::Anchor => write!(f, "^"),
            },
            PatternNode::Group { name, children } => {
                write!(f, "({}:", name)?;
                for child in children {
                    write!(f, " {}", child)?;
                }
                write!(f, ")")
            }
            PatternNode::Quantifier { min, max, child } => match max {
                Some(max) => write!(f, "{}{{{},{}}}", child, min, max),
                None => write!(f, "{}{{{},}}", child, min),
            },
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", node)?;
        }
        Ok(())
    }
}
