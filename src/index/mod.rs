//! Mapping of vocabulary tokens to state transitions of a regular language.
//!
//! An [`Index`] is built once from a regular expression and a
//! [`Vocabulary`](crate::vocabulary::Vocabulary), is immutable afterwards,
//! and is shared read-only by every [`Guide`](crate::guide::Guide) derived
//! from it. Two representations exist behind one tagged type:
//!
//! - **standard** ([`Index::new`]): every row is precomputed eagerly, giving
//!   the cheapest possible per-step lookups;
//! - **compressed** ([`Index::compressed`]): rows are derived lazily from the
//!   retained DFA the first time a state is visited, which makes
//!   construction nearly free for patterns whose state space is much larger
//!   than any generation actually explores.
//!
//! Both variants expose the same contract and produce identical walks.

use bincode::{Decode, Encode};
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

use crate::prelude::*;
use crate::vocabulary::Vocabulary;
use crate::{Error, Result};

mod compressed;
mod standard;

pub use compressed::CompressedIndex;
pub use standard::StandardIndex;

const MAGIC: &[u8; 4] = b"TRIX";
const FORMAT_VERSION: u8 = 1;
const TAG_STANDARD: u8 = 0;
const TAG_COMPRESSED: u8 = 1;
const HEADER_LEN: usize = MAGIC.len() + 2;

/// Serialized form of the compressed variant: the DFA is a pure function of
/// the regex, so shipping the inputs reconstructs an equal index.
#[derive(Encode, Decode)]
struct CompressedPayload {
    regex: String,
    vocabulary: Vocabulary,
}

/// Token-level transition table of a regular language: which vocabulary
/// token may follow where, and which state it leads to.
///
/// ## Example
/// ```rust
/// # use tokenrail::Error;
/// use tokenrail::prelude::*;
/// use rustc_hash::FxHashMap as HashMap;
///
/// # fn main() -> Result<(), Error> {
/// let tokens: HashMap<String, Vec<TokenId>> =
///     HashMap::from_iter([("0".to_string(), vec![0]), ("1".to_string(), vec![1])]);
/// let vocabulary = Vocabulary::try_from((2, tokens))?;
/// let index = Index::new("[0-9]", &vocabulary)?;
///
/// let initial_state = index.initial_state();
/// assert!(!index.is_final_state(&initial_state));
///
/// let allowed = index.allowed_tokens(&initial_state).expect("Some allowed tokens");
/// assert_eq!(allowed.len(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Index {
    /// All rows materialized at construction.
    Standard(StandardIndex),
    /// Rows computed on first visit.
    Compressed(CompressedIndex),
}

impl Index {
    /// Builds an eager `Index` from a regular expression and vocabulary.
    pub fn new(regex: &str, vocabulary: &Vocabulary) -> Result<Self> {
        Ok(Self::Standard(StandardIndex::new(regex, vocabulary)?))
    }

    /// Builds a lazy `Index`; rows appear as states are visited.
    pub fn compressed(regex: &str, vocabulary: &Vocabulary) -> Result<Self> {
        Ok(Self::Compressed(CompressedIndex::new(regex, vocabulary)?))
    }

    /// State where processing begins.
    pub fn initial_state(&self) -> StateId {
        match self {
            Self::Standard(index) => index.initial_state(),
            Self::Compressed(index) => index.initial_state(),
        }
    }

    /// States accepting the input consumed so far.
    pub fn final_states(&self) -> &HashSet<StateId> {
        match self {
            Self::Standard(index) => index.final_states(),
            Self::Compressed(index) => index.final_states(),
        }
    }

    pub fn is_final_state(&self, state: &StateId) -> bool {
        match self {
            Self::Standard(index) => index.is_final_state(state),
            Self::Compressed(index) => index.is_final_state(state),
        }
    }

    /// Lists tokens allowed at `state`, or `None` if the state allows
    /// nothing. Order is unspecified but stable for a given index.
    pub fn allowed_tokens(&self, state: &StateId) -> Option<Vec<TokenId>> {
        match self {
            Self::Standard(index) => index.allowed_tokens(state),
            Self::Compressed(index) => index.allowed_tokens(state),
        }
    }

    /// State reached from `state` over `token_id`, or `None` if the token
    /// is forbidden there.
    pub fn next_state(&self, state: &StateId, token_id: &TokenId) -> Option<StateId> {
        match self {
            Self::Standard(index) => index.next_state(state, token_id),
            Self::Compressed(index) => index.next_state(state, token_id),
        }
    }

    /// Calls `f` for every token allowed at `state`; returns whether the
    /// state allowed anything. Avoids allocating on the per-step hot path.
    pub(crate) fn for_each_allowed(&self, state: &StateId, mut f: impl FnMut(TokenId)) -> bool {
        match self {
            Self::Standard(index) => match index.allowed_tokens_iter(state) {
                Some(token_ids) => {
                    for token_id in token_ids {
                        f(*token_id);
                    }
                    true
                }
                None => false,
            },
            Self::Compressed(index) => index.for_each_allowed(state, f),
        }
    }

    /// The full `state -> (token -> state)` mapping, for inspection. For the
    /// compressed variant this is a snapshot of the rows visited so far.
    pub fn transitions(&self) -> HashMap<StateId, HashMap<TokenId, StateId>> {
        match self {
            Self::Standard(index) => index.transitions().clone(),
            Self::Compressed(index) => index.transitions(),
        }
    }

    pub fn eos_token_id(&self) -> TokenId {
        match self {
            Self::Standard(index) => index.eos_token_id(),
            Self::Compressed(index) => index.eos_token_id(),
        }
    }

    /// Size of the token id space the index was built over, EOS included.
    pub fn vocab_size(&self) -> usize {
        match self {
            Self::Standard(index) => index.vocab_size(),
            Self::Compressed(index) => index.vocab_size(),
        }
    }

    /// Serializes the index into a self-describing, versioned byte stream.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let config = bincode::config::standard();
        let mut bytes = Vec::with_capacity(HEADER_LEN);
        bytes.extend_from_slice(MAGIC);
        bytes.push(FORMAT_VERSION);
        match self {
            Self::Standard(index) => {
                bytes.push(TAG_STANDARD);
                bytes.extend(bincode::encode_to_vec(index, config)?);
            }
            Self::Compressed(index) => {
                bytes.push(TAG_COMPRESSED);
                let payload = CompressedPayload {
                    regex: index.regex().to_string(),
                    vocabulary: index.vocabulary().clone(),
                };
                bytes.extend(bincode::encode_to_vec(payload, config)?);
            }
        }
        Ok(bytes)
    }

    /// Reconstructs an index serialized by [`Index::to_bytes`]. Unknown
    /// magic, versions or variant tags are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::MalformedIndexHeader);
        }
        let (header, payload) = bytes.split_at(HEADER_LEN);
        if &header[..MAGIC.len()] != MAGIC {
            return Err(Error::MalformedIndexHeader);
        }
        let version = header[MAGIC.len()];
        if version != FORMAT_VERSION {
            return Err(Error::UnsupportedIndexVersion(version));
        }
        let config = bincode::config::standard();
        match header[MAGIC.len() + 1] {
            TAG_STANDARD => {
                let (index, _) = bincode::decode_from_slice::<StandardIndex, _>(payload, config)?;
                Ok(Self::Standard(index))
            }
            TAG_COMPRESSED => {
                let (payload, _) =
                    bincode::decode_from_slice::<CompressedPayload, _>(payload, config)?;
                Self::compressed(&payload.regex, &payload.vocabulary)
            }
            tag => Err(Error::UnknownIndexVariant(tag)),
        }
    }
}

impl std::fmt::Display for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Index object with transitions:")?;
        for (state_id, token_ids) in self.transitions().iter() {
            writeln!(f, "{:?} -> {:#?}", state_id, token_ids)?;
        }
        Ok(())
    }
}
