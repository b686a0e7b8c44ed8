//! Fundamental types shared by every layer of the crate.

/// Raw bytes of a vocabulary token.
pub type Token = Vec<u8>;

/// Token identifier.
pub type TokenId = u32;

/// Identifier of a DFA state inside an index.
pub type StateId = u32;
