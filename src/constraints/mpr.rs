//! Morphological/phonological rule (MPR) features.
//!
//! MPR features are exception diacritics carried by words and lexical entries.
//! Rules and allomorphs require or exclude them, and affixes can add them to
//! their output. Features may belong to a [`MprFeatureGroup`], which decides
//! how a set of its members is matched and how output sets are combined.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// How grouped features in a requirement set are matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum MprFeatureGroupMatchType {
    /// Every grouped feature must be present
    All,
    /// At least one grouped feature must be present
    Any,
}

/// How grouped features are combined when an affix adds output features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum MprFeatureGroupOutput {
    /// Output members replace the group's previous members
    Overwrite,
    /// Output members are added to the previous ones
    Append,
}

/// A named group of MPR features.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct MprFeatureGroup {
    /// Group name
    pub name: String,
    /// Match policy
    pub match_type: MprFeatureGroupMatchType,
    /// Output policy
    pub output: MprFeatureGroupOutput,
}

impl MprFeatureGroup {
    /// Create a shared group handle.
    pub fn new(
        name: impl Into<String>,
        match_type: MprFeatureGroupMatchType,
        output: MprFeatureGroupOutput,
    ) -> Arc<Self> {
        Arc::new(MprFeatureGroup {
            name: name.into(),
            match_type,
            output,
        })
    }
}

/// An MPR feature; cheap to clone, compared by name.
#[derive(Debug, Clone)]
pub struct MprFeature {
    name: Arc<str>,
    group: Option<Arc<MprFeatureGroup>>,
}

impl MprFeature {
    /// Ungrouped feature.
    pub fn new(name: &str) -> Self {
        MprFeature {
            name: Arc::from(name),
            group: None,
        }
    }

    /// Feature belonging to `group`.
    pub fn grouped(name: &str, group: &Arc<MprFeatureGroup>) -> Self {
        MprFeature {
            name: Arc::from(name),
            group: Some(Arc::clone(group)),
        }
    }

    /// Feature name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning group.
    pub fn group(&self) -> Option<&Arc<MprFeatureGroup>> {
        self.group.as_ref()
    }

    fn in_group(&self, group: &Arc<MprFeatureGroup>) -> bool {
        self.group.as_ref().is_some_and(|g| Arc::ptr_eq(g, group))
    }
}

impl PartialEq for MprFeature {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for MprFeature {}

impl Hash for MprFeature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for MprFeature {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MprFeature {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name.cmp(&other.name)
    }
}

/// A set of MPR features.
///
/// # Examples
///
/// ```rust
/// use libmorpher::constraints::{
///     MprFeature, MprFeatureGroup, MprFeatureGroupMatchType, MprFeatureGroupOutput, MprFeatureSet,
/// };
///
/// let g = MprFeatureGroup::new("g", MprFeatureGroupMatchType::All, MprFeatureGroupOutput::Append);
/// let (a, b, c) = (
///     MprFeature::grouped("a", &g),
///     MprFeature::grouped("b", &g),
///     MprFeature::new("c"),
/// );
/// let required: MprFeatureSet = [a.clone(), b.clone()].into_iter().collect();
/// assert!(required.is_match(&[a.clone(), b, c.clone()].into_iter().collect()));
/// assert!(!required.is_match(&[a, c].into_iter().collect()));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MprFeatureSet {
    features: BTreeSet<MprFeature>,
}

impl MprFeatureSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a feature.
    pub fn insert(&mut self, feature: MprFeature) -> bool {
        self.features.insert(feature)
    }

    /// Membership by identity.
    pub fn contains(&self, feature: &MprFeature) -> bool {
        self.features.contains(feature)
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// True when empty.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Features in name order.
    pub fn iter(&self) -> impl Iterator<Item = &MprFeature> {
        self.features.iter()
    }

    fn groups(&self) -> Vec<&Arc<MprFeatureGroup>> {
        let mut groups: Vec<&Arc<MprFeatureGroup>> = Vec::new();
        for group in self.features.iter().filter_map(MprFeature::group) {
            if !groups.iter().any(|g| Arc::ptr_eq(g, group)) {
                groups.push(group);
            }
        }
        groups
    }

    /// Does `candidate` satisfy this requirement set?
    ///
    /// Each group applies its own match policy to its members in `self`;
    /// ungrouped features must all be present.
    pub fn is_match(&self, candidate: &MprFeatureSet) -> bool {
        let grouped_ok = self.groups().into_iter().all(|group| {
            let mut members = self.features.iter().filter(|f| f.in_group(group));
            match group.match_type {
                MprFeatureGroupMatchType::All => members.all(|f| candidate.contains(f)),
                MprFeatureGroupMatchType::Any => members.any(|f| candidate.contains(f)),
            }
        });
        grouped_ok
            && self
                .features
                .iter()
                .filter(|f| f.group.is_none())
                .all(|f| candidate.contains(f))
    }

    /// True when a non-empty exclusion set is matched by `candidate`.
    pub fn excludes(&self, candidate: &MprFeatureSet) -> bool {
        !self.is_empty() && self.is_match(candidate)
    }

    /// Merge `output` into this set.
    ///
    /// Members of an overwrite group that `output` mentions are dropped unless
    /// `output` grants them again.
    pub fn add_output(&mut self, output: &MprFeatureSet) {
        for group in output.groups() {
            if group.output == MprFeatureGroupOutput::Overwrite {
                self.features
                    .retain(|f| !f.in_group(group) || output.contains(f));
            }
        }
        self.features.extend(output.features.iter().cloned());
    }

    /// Union with another set.
    pub fn union_with(&mut self, other: &MprFeatureSet) {
        self.features.extend(other.features.iter().cloned());
    }
}

impl FromIterator<MprFeature> for MprFeatureSet {
    fn from_iter<I: IntoIterator<Item = MprFeature>>(iter: I) -> Self {
        MprFeatureSet {
            features: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for MprFeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, feat) in self.features.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", feat.name)?;
        }
        write!(f, "}}")
    }
}
