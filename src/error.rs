//! Error types for synthesis, analysis, and grammar compilation.

use thiserror::Error;

/// Errors raised by the morphological engine.
///
/// `UninstantiatedFeature` and `TooManySegments` are derivation-local: the rule
/// that hits one drops the candidate it was building and keeps going with its
/// siblings. `InvalidShape` is reported to the caller of
/// [`Morpher::parse_word`](crate::morpher::Morpher::parse_word) when the surface
/// string cannot be segmented, and `InvalidGrammar` is reported while a
/// [`Morpher`](crate::morpher::Morpher) is being compiled.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MorphError {
    /// A string contains a symbol that no character definition covers.
    #[error("Invalid shape '{input}': unknown symbol at position {position}")]
    InvalidShape {
        /// The string that failed to segment
        input: String,
        /// Character offset of the first unsegmentable symbol
        position: usize,
    },

    /// An output or rewrite action needed a variable that was never bound.
    #[error("Variable for feature '{feature}' was never instantiated")]
    UninstantiatedFeature {
        /// The feature whose value came from the unbound variable
        feature: String,
    },

    /// A derived shape grew past the configured segment limit.
    #[error("Shape exceeds the maximum of {limit} segments")]
    TooManySegments {
        /// The configured limit
        limit: usize,
    },

    /// The grammar handed to the morpher is malformed.
    #[error("Invalid grammar: {0}")]
    InvalidGrammar(String),
}

/// A specialized `Result` type for engine operations.
pub type Result<T> = std::result::Result<T, MorphError>;
