//! Shape dictionaries for lexical lookup.
//!
//! Analysis ends by looking up the underlying shapes it reconstructed. Each
//! stratum indexes its root allomorphs in a [`ShapeTrie`], which is built
//! once while the morpher compiles and only read afterwards.

mod shape_trie;

pub use shape_trie::ShapeTrie;
