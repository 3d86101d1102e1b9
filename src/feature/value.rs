//! Feature values: open-domain symbol sets and alpha variables.
//!
//! Symbol sets are disjunctions over an open symbol domain. A negated set
//! `¬{a, b}` stands for "any symbol except `a` or `b`", which lets negation
//! and intersection stay closed without knowing every symbol a feature can
//! take.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::FeatureStruct;

/// Interned-ish symbol and feature name.
pub type Symbol = Arc<str>;

// ============================================================================
// Symbol sets
// ============================================================================

/// A disjunction of symbols, optionally complemented.
///
/// # Examples
///
/// ```rust
/// use libmorpher::feature::SymbolSet;
///
/// let voiced = SymbolSet::single("+");
/// let either = SymbolSet::of(["+", "-"]);
/// assert!(voiced.overlaps(&either));
/// assert!(either.intersection(&voiced.negation()).contains("-"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct SymbolSet {
    symbols: BTreeSet<Symbol>,
    negated: bool,
}

impl SymbolSet {
    /// A set holding exactly the given symbols.
    pub fn of<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        SymbolSet {
            symbols: symbols.into_iter().map(|s| Symbol::from(s.as_ref())).collect(),
            negated: false,
        }
    }

    /// A set holding a single symbol.
    pub fn single(symbol: &str) -> Self {
        Self::of([symbol])
    }

    /// Every symbol except the given ones.
    pub fn not<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::of(symbols).negation()
    }

    /// The unconstrained set.
    pub fn any() -> Self {
        SymbolSet {
            symbols: BTreeSet::new(),
            negated: true,
        }
    }

    /// True when no symbol satisfies this set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.negated && self.symbols.is_empty()
    }

    /// True when every symbol satisfies this set.
    #[inline]
    pub fn is_any(&self) -> bool {
        self.negated && self.symbols.is_empty()
    }

    /// True for complemented sets.
    #[inline]
    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Explicitly listed symbols (the excluded ones when negated).
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(|s| s.as_ref())
    }

    /// Membership test.
    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol) != self.negated
    }

    /// Complement.
    pub fn negation(&self) -> Self {
        SymbolSet {
            symbols: self.symbols.clone(),
            negated: !self.negated,
        }
    }

    /// Set intersection.
    pub fn intersection(&self, other: &SymbolSet) -> Self {
        let (symbols, negated) = match (self.negated, other.negated) {
            (false, false) => (
                self.symbols.intersection(&other.symbols).cloned().collect(),
                false,
            ),
            (false, true) => (
                self.symbols.difference(&other.symbols).cloned().collect(),
                false,
            ),
            (true, false) => (
                other.symbols.difference(&self.symbols).cloned().collect(),
                false,
            ),
            (true, true) => (self.symbols.union(&other.symbols).cloned().collect(), true),
        };
        SymbolSet { symbols, negated }
    }

    /// Set union.
    pub fn union(&self, other: &SymbolSet) -> Self {
        let (symbols, negated) = match (self.negated, other.negated) {
            (false, false) => (self.symbols.union(&other.symbols).cloned().collect(), false),
            (false, true) => (
                other.symbols.difference(&self.symbols).cloned().collect(),
                true,
            ),
            (true, false) => (
                self.symbols.difference(&other.symbols).cloned().collect(),
                true,
            ),
            (true, true) => (
                self.symbols.intersection(&other.symbols).cloned().collect(),
                true,
            ),
        };
        SymbolSet { symbols, negated }
    }

    /// True when the two sets share at least one symbol.
    #[inline]
    pub fn overlaps(&self, other: &SymbolSet) -> bool {
        !self.intersection(other).is_empty()
    }

    /// True when every symbol of `other` is also in `self`.
    pub fn is_superset_of(&self, other: &SymbolSet) -> bool {
        other.intersection(&self.negation()).is_empty()
    }
}

impl fmt::Display for SymbolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "¬")?;
        }
        if self.symbols.len() == 1 && !self.negated {
            if let Some(s) = self.symbols.iter().next() {
                return write!(f, "{}", s);
            }
        }
        write!(f, "{{")?;
        for (i, s) in self.symbols.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", s)?;
        }
        write!(f, "}}")
    }
}

// ============================================================================
// Variables
// ============================================================================

/// An alpha variable such as `αvoice` (agree) or `-αvoice` (disagree).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Variable {
    /// Variable name, shared across all constraints of one pattern
    pub name: Symbol,
    /// `false` means the value must differ from the binding
    pub agree: bool,
}

/// Values bound to alpha variables during a match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableBindings {
    map: FxHashMap<Symbol, SymbolSet>,
}

impl VariableBindings {
    /// Empty bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// The value bound to `name`, if any.
    pub fn get(&self, name: &str) -> Option<&SymbolSet> {
        self.map.get(name)
    }

    /// Bind (or rebind) a variable.
    pub fn bind(&mut self, name: Symbol, value: SymbolSet) {
        self.map.insert(name, value);
    }

    /// Number of bound variables.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Unify a variable with a concrete value, binding it on first use.
    pub(crate) fn unify_variable(&mut self, var: &Variable, value: &SymbolSet) -> Option<SymbolSet> {
        match self.map.get(&var.name) {
            Some(bound) => {
                let expected = if var.agree {
                    bound.clone()
                } else {
                    bound.negation()
                };
                let result = value.intersection(&expected);
                (!result.is_empty()).then_some(result)
            }
            None => {
                if value.is_empty() {
                    return None;
                }
                let bound = if var.agree {
                    value.clone()
                } else {
                    value.negation()
                };
                self.map.insert(var.name.clone(), bound);
                Some(value.clone())
            }
        }
    }

    /// The concrete value a variable stands for, if bound.
    pub(crate) fn resolve(&self, var: &Variable) -> Option<SymbolSet> {
        self.map.get(&var.name).map(|bound| {
            if var.agree {
                bound.clone()
            } else {
                bound.negation()
            }
        })
    }
}

// ============================================================================
// Feature values
// ============================================================================

/// The value of one feature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum FeatureValue {
    /// Symbolic value (possibly a disjunction or complement)
    Symbol(SymbolSet),
    /// Alpha variable, resolved through [`VariableBindings`]
    Variable(Variable),
    /// Nested feature structure
    Complex(FeatureStruct),
}

impl FeatureValue {
    /// Unify two values. Variables on either side are resolved or bound.
    pub(crate) fn unify(
        &self,
        other: &FeatureValue,
        bindings: &mut VariableBindings,
    ) -> Option<FeatureValue> {
        match (self, other) {
            (FeatureValue::Symbol(a), FeatureValue::Symbol(b)) => {
                let result = a.intersection(b);
                (!result.is_empty()).then_some(FeatureValue::Symbol(result))
            }
            (FeatureValue::Variable(v), FeatureValue::Symbol(s))
            | (FeatureValue::Symbol(s), FeatureValue::Variable(v)) => bindings
                .unify_variable(v, s)
                .map(FeatureValue::Symbol),
            (FeatureValue::Variable(v), FeatureValue::Variable(w)) => {
                match (bindings.resolve(v), bindings.resolve(w)) {
                    (Some(a), Some(b)) => {
                        let result = a.intersection(&b);
                        (!result.is_empty()).then_some(FeatureValue::Symbol(result))
                    }
                    _ => Some(FeatureValue::Variable(v.clone())),
                }
            }
            (FeatureValue::Complex(a), FeatureValue::Complex(b)) => {
                a.unify(b, bindings).map(FeatureValue::Complex)
            }
            _ => None,
        }
    }

    /// True if the value mentions a variable anywhere.
    pub fn has_variables(&self) -> bool {
        match self {
            FeatureValue::Symbol(_) => false,
            FeatureValue::Variable(_) => true,
            FeatureValue::Complex(fs) => fs.has_variables(),
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Symbol(s) => write!(f, "{}", s),
            FeatureValue::Variable(v) => {
                if v.agree {
                    write!(f, "α{}", v.name)
                } else {
                    write!(f, "-α{}", v.name)
                }
            }
            FeatureValue::Complex(fs) => write!(f, "{}", fs),
        }
    }
}
