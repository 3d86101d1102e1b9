//! Stem names: allomorphs restricted to syntactic feature regions.

use std::fmt;

use crate::error::{MorphError, Result};
use crate::feature::FeatureStruct;

/// A named set of syntactic feature regions.
///
/// An allomorph carrying a stem name is only valid in words whose syntactic
/// features unify with one of the regions. Sibling allomorphs without that
/// stem name are blocked in the same regions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StemName {
    name: String,
    regions: Vec<FeatureStruct>,
}

impl StemName {
    /// Create a stem name; at least one region is required.
    pub fn new(name: impl Into<String>, regions: Vec<FeatureStruct>) -> Result<Self> {
        let name = name.into();
        if regions.is_empty() {
            return Err(MorphError::InvalidGrammar(format!(
                "stem name '{}' has no regions",
                name
            )));
        }
        Ok(StemName { name, regions })
    }

    /// Name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Regions.
    pub fn regions(&self) -> &[FeatureStruct] {
        &self.regions
    }

    /// True when `fs` falls into one of the regions.
    pub fn is_required_match(&self, fs: &FeatureStruct) -> bool {
        self.regions.iter().any(|r| r.is_unifiable(fs))
    }

    /// True when `fs` falls into a region of this stem name that `other` (the
    /// stem name of the allomorph actually used, if any) does not share.
    ///
    /// A match means the allomorph owning `self` should have been chosen
    /// instead, so the word is rejected.
    pub fn is_excluded_match(&self, fs: &FeatureStruct, other: Option<&StemName>) -> bool {
        self.regions
            .iter()
            .filter(|r| other.map_or(true, |o| !o.regions.contains(r)))
            .any(|r| r.is_unifiable(fs))
    }
}

impl fmt::Display for StemName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(tense: &str) -> FeatureStruct {
        FeatureStruct::new().with("tense", tense)
    }

    #[test]
    fn test_empty_regions_rejected() {
        assert!(matches!(
            StemName::new("s", Vec::new()),
            Err(MorphError::InvalidGrammar(_))
        ));
    }

    #[test]
    fn test_disjoint_regions_select_one_allomorph() {
        let past = StemName::new("past", vec![region("past")]).unwrap();
        let pres = StemName::new("pres", vec![region("pres")]).unwrap();
        let word = region("past");

        assert!(past.is_required_match(&word));
        assert!(!pres.is_required_match(&word));
        // an allomorph without a stem name is blocked by the past sibling
        assert!(past.is_excluded_match(&word, None));
        // the pres allomorph is not blocked by itself
        assert!(!pres.is_excluded_match(&word, Some(&past)));
    }

    #[test]
    fn test_shared_regions_do_not_exclude() {
        let a = StemName::new("a", vec![region("past"), region("fut")]).unwrap();
        let b = StemName::new("b", vec![region("past")]).unwrap();
        assert!(!a.is_excluded_match(&region("past"), Some(&b)));
        assert!(a.is_excluded_match(&region("fut"), Some(&b)));
    }
}
