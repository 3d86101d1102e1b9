//! Character definition tables: conversion between strings and shapes.

use rustc_hash::FxHashMap;

use crate::error::{MorphError, Result};
use crate::feature::FeatureStruct;
use crate::shape::{NodeType, Shape, ShapeNode};

/// One symbol of the writing system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterDefinition {
    /// Strings that denote the symbol; the first one is used for rendering
    pub representations: Vec<String>,
    /// Segment, boundary or morph boundary
    pub node_type: NodeType,
    /// Phonetic features
    pub fs: FeatureStruct,
}

/// Maps representation strings to feature bundles and back.
///
/// Segmentation is longest-match first with backtracking, so a table holding
/// both `t` and `ts` segments `tsa` as `ts a` but still accepts `tsta`.
///
/// # Examples
///
/// ```rust
/// use libmorpher::char_table::CharacterDefinitionTable;
/// use libmorpher::feature::FeatureStruct;
///
/// let mut table = CharacterDefinitionTable::new("ipa");
/// table.add_segment(&["k"], FeatureStruct::new().with("seg", "k"));
/// table.add_segment(&["a"], FeatureStruct::new().with("seg", "a"));
///
/// let shape = table.segment("kak").unwrap();
/// assert_eq!(shape.len(), 3);
/// assert_eq!(table.render(&shape), "kak");
/// assert!(table.segment("kax").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CharacterDefinitionTable {
    name: String,
    definitions: Vec<CharacterDefinition>,
    by_repr: FxHashMap<String, usize>,
    max_repr_len: usize,
}

impl CharacterDefinitionTable {
    /// Empty table.
    pub fn new(name: impl Into<String>) -> Self {
        CharacterDefinitionTable {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All definitions in insertion order.
    pub fn definitions(&self) -> &[CharacterDefinition] {
        &self.definitions
    }

    /// Define a segment.
    pub fn add_segment(&mut self, representations: &[&str], fs: FeatureStruct) {
        self.add(representations, NodeType::Segment, fs);
    }

    /// Define a boundary symbol.
    pub fn add_boundary(&mut self, representation: &str) {
        self.add(
            &[representation],
            NodeType::Boundary,
            FeatureStruct::new().with("bdry", representation),
        );
    }

    /// Define a morph boundary symbol.
    pub fn add_morph_boundary(&mut self, representation: &str) {
        self.add(
            &[representation],
            NodeType::MorphBoundary,
            FeatureStruct::new().with("bdry", representation),
        );
    }

    fn add(&mut self, representations: &[&str], node_type: NodeType, fs: FeatureStruct) {
        let index = self.definitions.len();
        for repr in representations {
            self.max_repr_len = self.max_repr_len.max(repr.chars().count());
            self.by_repr.insert((*repr).to_string(), index);
        }
        self.definitions.push(CharacterDefinition {
            representations: representations.iter().map(|r| r.to_string()).collect(),
            node_type,
            fs,
        });
    }

    /// Look up a definition by representation.
    pub fn get(&self, representation: &str) -> Option<&CharacterDefinition> {
        self.by_repr
            .get(representation)
            .map(|&i| &self.definitions[i])
    }

    /// Segment a string into a fresh shape.
    pub fn segment(&self, input: &str) -> Result<Shape> {
        let chars: Vec<(usize, char)> = input.char_indices().collect();
        let mut path = Vec::new();
        let mut furthest = 0;
        if !self.segment_from(input, &chars, 0, &mut path, &mut furthest) {
            return Err(MorphError::InvalidShape {
                input: input.to_string(),
                position: furthest,
            });
        }
        let mut shape = Shape::new();
        for index in path {
            let def = &self.definitions[index];
            shape.push_node(ShapeNode::new(def.node_type, def.fs.clone()));
        }
        Ok(shape)
    }

    fn segment_from(
        &self,
        input: &str,
        chars: &[(usize, char)],
        pos: usize,
        path: &mut Vec<usize>,
        furthest: &mut usize,
    ) -> bool {
        *furthest = (*furthest).max(pos);
        if pos == chars.len() {
            return true;
        }
        let max = self.max_repr_len.min(chars.len() - pos);
        for len in (1..=max).rev() {
            let start = chars[pos].0;
            let end = chars.get(pos + len).map_or(input.len(), |c| c.0);
            if let Some(&index) = self.by_repr.get(&input[start..end]) {
                path.push(index);
                if self.segment_from(input, chars, pos + len, path, furthest) {
                    return true;
                }
                path.pop();
            }
        }
        false
    }

    fn definition_for(&self, node: &ShapeNode) -> Option<&CharacterDefinition> {
        let same_type = || {
            self.definitions
                .iter()
                .filter(move |d| d.node_type == node.node_type)
        };
        same_type()
            .find(|d| d.fs == node.fs)
            .or_else(|| same_type().find(|d| node.fs.subsumes(&d.fs)))
            .or_else(|| same_type().find(|d| d.fs.is_unifiable(&node.fs)))
    }

    /// Render a shape's segments (boundaries are dropped).
    pub fn render(&self, shape: &Shape) -> String {
        self.render_with(shape, false)
    }

    /// Render a shape, optionally including boundary symbols.
    ///
    /// Nodes without a matching definition render as `?`.
    pub fn render_with(&self, shape: &Shape, include_boundaries: bool) -> String {
        let mut out = String::new();
        for id in shape.iter() {
            let node = &shape[id];
            if node.node_type.is_boundary() && !include_boundaries {
                continue;
            }
            match self.definition_for(node) {
                Some(def) => out.push_str(def.representations.first().map_or("?", String::as_str)),
                None => out.push('?'),
            }
        }
        out
    }

    /// True when `input` segments into the same segments as `shape`.
    pub fn is_match(&self, input: &str, shape: &Shape) -> bool {
        let Ok(expected) = self.segment(input) else {
            return false;
        };
        let segments = |s: &Shape| -> Vec<FeatureStruct> {
            s.iter()
                .filter(|&id| s[id].node_type == NodeType::Segment)
                .map(|id| s[id].fs.clone())
                .collect()
        };
        let (a, b) = (segments(&expected), segments(shape));
        a.len() == b.len() && a.iter().zip(&b).all(|(x, y)| x.is_unifiable(y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CharacterDefinitionTable {
        let mut t = CharacterDefinitionTable::new("test");
        t.add_segment(&["t"], FeatureStruct::new().with("seg", "t"));
        t.add_segment(&["s"], FeatureStruct::new().with("seg", "s"));
        t.add_segment(&["ts", "c"], FeatureStruct::new().with("seg", "ts"));
        t.add_segment(&["a"], FeatureStruct::new().with("seg", "a"));
        t.add_boundary("#");
        t
    }

    #[test]
    fn test_longest_match_with_backtracking() {
        let t = table();
        assert_eq!(t.segment("tsa").unwrap().len(), 2);
        assert_eq!(t.segment("ca").unwrap().len(), 2);
        assert_eq!(t.segment("tsta").unwrap().len(), 3);
    }

    #[test]
    fn test_invalid_shape_position() {
        let t = table();
        assert_eq!(
            t.segment("taxa"),
            Err(MorphError::InvalidShape {
                input: "taxa".to_string(),
                position: 2
            })
        );
    }

    #[test]
    fn test_render_uses_first_representation() {
        let t = table();
        let shape = t.segment("ca#t").unwrap();
        assert_eq!(t.render(&shape), "tsat");
        assert_eq!(t.render_with(&shape, true), "tsa#t");
    }

    #[test]
    fn test_is_match_ignores_boundaries() {
        let t = table();
        let shape = t.segment("ta#t").unwrap();
        assert!(t.is_match("tat", &shape));
        assert!(!t.is_match("ta", &shape));
        assert!(!t.is_match("q", &shape));
    }
}
