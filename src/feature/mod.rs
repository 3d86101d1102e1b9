//! Symbolic feature structures.
//!
//! Segments, natural classes, syntactic categories and pattern constraints are
//! all described by [`FeatureStruct`]s. Matching uses unification with alpha
//! variables ([`VariableBindings`]); analysis widens structures with
//! [`FeatureStruct::merge`]; complement constraints come from
//! [`FeatureStruct::anti`].

mod feature_struct;
mod value;

pub use feature_struct::FeatureStruct;
pub use value::{FeatureValue, Symbol, SymbolSet, Variable, VariableBindings};
