//! Convenience re-exports of the crate's main types.

#[cfg(feature = "hugginface-hub")]
pub use tokenizers::FromPretrainedParameters;

pub use super::guide::Guide;
pub use super::index::Index;
pub use super::mask;
pub use super::primitives::{StateId, Token, TokenId};
pub use super::schema;
pub use super::vocabulary::Vocabulary;
