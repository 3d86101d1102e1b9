//! Feature structures and the operations the rule engine needs on them.

use std::collections::BTreeMap;
use std::fmt;

use super::value::{FeatureValue, Symbol, SymbolSet, Variable, VariableBindings};
use crate::error::{MorphError, Result};

/// An ordered map from feature names to values.
///
/// Missing features are unconstrained. Two structures unify when every
/// feature they share has overlapping values.
///
/// # Examples
///
/// ```rust
/// use libmorpher::feature::{FeatureStruct, VariableBindings};
///
/// let voiced = FeatureStruct::new().with("cons", "+").with("voice", "+");
/// let stop = FeatureStruct::new().with("cons", "+").with("cont", "-");
///
/// let mut bindings = VariableBindings::new();
/// let both = voiced.unify(&stop, &mut bindings).unwrap();
/// assert_eq!(both.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct FeatureStruct {
    features: BTreeMap<Symbol, FeatureValue>,
}

impl FeatureStruct {
    /// The empty (unconstrained) structure.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set `feature` to a single symbol.
    pub fn with(mut self, feature: &str, symbol: &str) -> Self {
        self.set(feature, FeatureValue::Symbol(SymbolSet::single(symbol)));
        self
    }

    /// Builder: set `feature` to a disjunction of symbols.
    pub fn with_any(mut self, feature: &str, symbols: &[&str]) -> Self {
        self.set(
            feature,
            FeatureValue::Symbol(SymbolSet::of(symbols.iter().copied())),
        );
        self
    }

    /// Builder: set `feature` to anything except the given symbols.
    pub fn with_not(mut self, feature: &str, symbols: &[&str]) -> Self {
        self.set(
            feature,
            FeatureValue::Symbol(SymbolSet::not(symbols.iter().copied())),
        );
        self
    }

    /// Builder: bind `feature` to the alpha variable `name`.
    pub fn with_variable(mut self, feature: &str, name: &str, agree: bool) -> Self {
        self.set(
            feature,
            FeatureValue::Variable(Variable {
                name: Symbol::from(name),
                agree,
            }),
        );
        self
    }

    /// Builder: nest a feature structure under `feature`.
    pub fn with_complex(mut self, feature: &str, fs: FeatureStruct) -> Self {
        self.set(feature, FeatureValue::Complex(fs));
        self
    }

    /// Set a feature value, replacing any previous one.
    pub fn set(&mut self, feature: &str, value: FeatureValue) {
        self.features.insert(Symbol::from(feature), value);
    }

    /// Look up a feature value.
    pub fn get(&self, feature: &str) -> Option<&FeatureValue> {
        self.features.get(feature)
    }

    /// The symbol set of a symbolic feature.
    pub fn symbols(&self, feature: &str) -> Option<&SymbolSet> {
        match self.features.get(feature) {
            Some(FeatureValue::Symbol(s)) => Some(s),
            _ => None,
        }
    }

    /// Remove a feature, returning its value.
    pub fn remove(&mut self, feature: &str) -> Option<FeatureValue> {
        self.features.remove(feature)
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// True when no feature is constrained.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.features.iter().map(|(k, v)| (k.as_ref(), v))
    }

    /// True if any value is (or contains) a variable.
    pub fn has_variables(&self) -> bool {
        self.features.values().any(FeatureValue::has_variables)
    }

    // ========================================================================
    // Unification
    // ========================================================================

    /// Unify two structures, binding variables as needed.
    ///
    /// Returns `None` on a clash. `bindings` may have been extended even when
    /// unification fails; use [`is_unifiable_with`](Self::is_unifiable_with)
    /// when bindings must stay untouched on failure.
    pub fn unify(
        &self,
        other: &FeatureStruct,
        bindings: &mut VariableBindings,
    ) -> Option<FeatureStruct> {
        let mut result = self.clone();
        for (name, other_value) in &other.features {
            let merged = match self.features.get(name) {
                Some(value) => value.unify(other_value, bindings)?,
                None => other_value.clone(),
            };
            result.features.insert(name.clone(), merged);
        }
        Some(result)
    }

    /// True when the two structures unify without any prior bindings.
    pub fn is_unifiable(&self, other: &FeatureStruct) -> bool {
        self.unify(other, &mut VariableBindings::new()).is_some()
    }

    /// Unifiability check that only commits `bindings` on success.
    pub fn is_unifiable_with(&self, other: &FeatureStruct, bindings: &mut VariableBindings) -> bool {
        let mut trial = bindings.clone();
        if self.unify(other, &mut trial).is_some() {
            *bindings = trial;
            true
        } else {
            false
        }
    }

    /// Overwrite features with those of `other`, recursing into shared
    /// complex values.
    pub fn priority_union(&mut self, other: &FeatureStruct) {
        for (name, other_value) in &other.features {
            match (self.features.get_mut(name), other_value) {
                (Some(FeatureValue::Complex(mine)), FeatureValue::Complex(theirs)) => {
                    mine.priority_union(theirs);
                }
                _ => {
                    self.features.insert(name.clone(), other_value.clone());
                }
            }
        }
    }

    /// Replace every variable with its bound value.
    ///
    /// An unbound variable is an [`MorphError::UninstantiatedFeature`].
    pub fn instantiate(&self, bindings: &VariableBindings) -> Result<FeatureStruct> {
        let mut result = FeatureStruct::new();
        for (name, value) in &self.features {
            let resolved = match value {
                FeatureValue::Symbol(_) => value.clone(),
                FeatureValue::Variable(var) => FeatureValue::Symbol(
                    bindings
                        .resolve(var)
                        .ok_or_else(|| MorphError::UninstantiatedFeature {
                            feature: name.to_string(),
                        })?,
                ),
                FeatureValue::Complex(fs) => FeatureValue::Complex(fs.instantiate(bindings)?),
            };
            result.features.insert(name.clone(), resolved);
        }
        Ok(result)
    }

    /// Replace bound variables and drop unbound ones.
    pub fn instantiate_partial(&self, bindings: &VariableBindings) -> FeatureStruct {
        let mut result = FeatureStruct::new();
        for (name, value) in &self.features {
            let resolved = match value {
                FeatureValue::Symbol(_) => Some(value.clone()),
                FeatureValue::Variable(var) => bindings.resolve(var).map(FeatureValue::Symbol),
                FeatureValue::Complex(fs) => {
                    Some(FeatureValue::Complex(fs.instantiate_partial(bindings)))
                }
            };
            if let Some(resolved) = resolved {
                result.features.insert(name.clone(), resolved);
            }
        }
        result
    }

    /// A copy with every variable-valued feature removed.
    pub fn without_variables(&self) -> FeatureStruct {
        self.instantiate_partial(&VariableBindings::new())
    }

    /// Join: widen each feature of `self` to also admit `other`'s value.
    ///
    /// Features missing from `other` are left alone; features that cannot be
    /// joined symbolically become unconstrained.
    pub fn merge(&mut self, other: &FeatureStruct) {
        let mut unconstrained = Vec::new();
        for (name, mine) in self.features.iter_mut() {
            let Some(theirs) = other.features.get(name) else {
                continue;
            };
            match (mine, theirs) {
                (FeatureValue::Symbol(a), FeatureValue::Symbol(b)) => {
                    *a = a.union(b);
                    if a.is_any() {
                        unconstrained.push(name.clone());
                    }
                }
                (FeatureValue::Complex(a), FeatureValue::Complex(b)) => a.merge(b),
                (a, b) if a == b => {}
                _ => unconstrained.push(name.clone()),
            }
        }
        for name in unconstrained {
            self.features.remove(&name);
        }
    }

    /// De Morgan negation: every symbolic value is complemented, variables flip
    /// polarity and complex values are negated recursively.
    pub fn anti(&self) -> FeatureStruct {
        let features = self
            .features
            .iter()
            .map(|(name, value)| {
                let negated = match value {
                    FeatureValue::Symbol(s) => FeatureValue::Symbol(s.negation()),
                    FeatureValue::Variable(v) => FeatureValue::Variable(Variable {
                        name: v.name.clone(),
                        agree: !v.agree,
                    }),
                    FeatureValue::Complex(fs) => FeatureValue::Complex(fs.anti()),
                };
                (name.clone(), negated)
            })
            .collect();
        FeatureStruct { features }
    }

    /// True when every structure that satisfies `other` also satisfies `self`.
    pub fn subsumes(&self, other: &FeatureStruct) -> bool {
        self.features.iter().all(|(name, mine)| {
            match (mine, other.features.get(name)) {
                (FeatureValue::Symbol(a), Some(FeatureValue::Symbol(b))) => a.is_superset_of(b),
                (FeatureValue::Symbol(a), None) => a.is_any(),
                (FeatureValue::Complex(a), Some(FeatureValue::Complex(b))) => a.subsumes(b),
                (FeatureValue::Complex(a), None) => a.is_empty(),
                (FeatureValue::Variable(a), Some(FeatureValue::Variable(b))) => a == b,
                _ => false,
            }
        })
    }
}

impl fmt::Display for FeatureStruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, (name, value)) in self.features.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}:{}", name, value)?;
        }
        write!(f, "]")
    }
}

impl FromIterator<(Symbol, FeatureValue)> for FeatureStruct {
    fn from_iter<I: IntoIterator<Item = (Symbol, FeatureValue)>>(iter: I) -> Self {
        FeatureStruct {
            features: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(voice: &str) -> FeatureStruct {
        FeatureStruct::new().with("cons", "+").with("voice", voice)
    }

    #[test]
    fn test_unify_clash_and_success() {
        let mut b = VariableBindings::new();
        assert!(seg("+").unify(&seg("-"), &mut b).is_none());
        let fs = seg("+")
            .unify(&FeatureStruct::new().with("nasal", "-"), &mut b)
            .unwrap();
        assert_eq!(fs.len(), 3);
    }

    #[test]
    fn test_unify_binds_and_checks_variable() {
        let pattern = FeatureStruct::new().with_variable("voice", "a", true);
        let mut b = VariableBindings::new();
        assert!(pattern.unify(&seg("+"), &mut b).is_some());

        let agree = FeatureStruct::new().with_variable("voice", "a", true);
        assert!(agree.unify(&seg("-"), &mut b).is_none());
        let disagree = FeatureStruct::new().with_variable("voice", "a", false);
        assert!(disagree.unify(&seg("-"), &mut b.clone()).is_some());
    }

    #[test]
    fn test_is_unifiable_with_leaves_bindings_on_failure() {
        let pattern = FeatureStruct::new()
            .with_variable("voice", "a", true)
            .with("cons", "-");
        let mut b = VariableBindings::new();
        assert!(!pattern.is_unifiable_with(&seg("+"), &mut b));
        assert!(b.is_empty());
    }

    #[test]
    fn test_priority_union_overwrites() {
        let mut fs = seg("+").with_complex("agr", FeatureStruct::new().with("num", "sg"));
        fs.priority_union(
            &FeatureStruct::new()
                .with("voice", "-")
                .with_complex("agr", FeatureStruct::new().with("per", "3")),
        );
        assert_eq!(fs.symbols("voice"), Some(&SymbolSet::single("-")));
        match fs.get("agr") {
            Some(FeatureValue::Complex(agr)) => assert_eq!(agr.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_instantiate_reports_unbound_variable() {
        let fs = FeatureStruct::new().with_variable("voice", "a", true);
        let err = fs.instantiate(&VariableBindings::new()).unwrap_err();
        assert_eq!(
            err,
            MorphError::UninstantiatedFeature {
                feature: "voice".to_string()
            }
        );

        let mut b = VariableBindings::new();
        b.bind(Symbol::from("a"), SymbolSet::single("-"));
        assert_eq!(fs.instantiate(&b).unwrap(), FeatureStruct::new().with("voice", "-"));
    }

    #[test]
    fn test_merge_widens() {
        let mut fs = seg("+");
        fs.merge(&seg("-"));
        assert_eq!(fs.symbols("voice"), Some(&SymbolSet::of(["+", "-"])));
        assert_eq!(fs.symbols("cons"), Some(&SymbolSet::single("+")));

        let mut fs = FeatureStruct::new().with("voice", "+");
        fs.merge(&FeatureStruct::new().with_not("voice", &["-"]));
        // + joined with ¬- is ¬-, still a constraint
        assert!(fs.get("voice").is_some());
        fs.merge(&FeatureStruct::new().with("voice", "-"));
        assert!(fs.get("voice").is_none());
    }

    #[test]
    fn test_anti_and_subsumes() {
        let fs = seg("+");
        let anti = fs.anti();
        assert!(!fs.is_unifiable(&anti.clone().with("cons", "+")));
        assert!(FeatureStruct::new().subsumes(&fs));
        assert!(FeatureStruct::new().with("cons", "+").subsumes(&fs));
        assert!(!fs.subsumes(&FeatureStruct::new().with("cons", "+")));
    }

    #[test]
    fn test_display() {
        let fs = seg("+").with_variable("place", "p", false);
        assert_eq!(fs.to_string(), "[cons:+ place:-αp voice:+]");
    }
}
