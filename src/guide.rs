//! Stateful cursor over an [`Index`], one per in-flight generation.
//!
//! A `Guide` is a reference-counted handle to a shared index plus a single
//! current state, so creating and cloning one is cheap. Advancing a guide is
//! strictly sequential; two guides over the same index never interfere.

use std::sync::Arc;

use crate::index::Index;
use crate::mask;
use crate::primitives::{StateId, TokenId};
use crate::{Error, Result};

/// Guides a generation by walking an [`Index`] token by token.
///
/// ## Example
/// ```rust
/// # use tokenrail::Error;
/// use tokenrail::prelude::*;
/// use rustc_hash::FxHashMap as HashMap;
///
/// # fn main() -> Result<(), Error> {
/// let tokens: HashMap<String, Vec<TokenId>> =
///     HashMap::from_iter([("a".to_string(), vec![1]), ("b".to_string(), vec![2]), ("z".to_string(), vec![3])]);
/// let vocabulary = Vocabulary::try_from((4, tokens))?;
/// let index = Index::new("z[ab]z", &vocabulary)?;
///
/// let mut guide = Guide::new(index);
/// assert_eq!(guide.start_tokens(), vec![3]);
/// guide.advance(3)?;
/// guide.advance(1)?;
/// let last = guide.advance(3)?;
/// assert_eq!(last, vec![4]);
/// assert!(guide.is_finished());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Guide {
    index: Arc<Index>,
    state: StateId,
    finished: bool,
}

impl Guide {
    /// Creates a guide positioned at the index's initial state.
    pub fn new(index: impl Into<Arc<Index>>) -> Self {
        let index = index.into();
        let state = index.initial_state();
        Self {
            index,
            state,
            finished: false,
        }
    }

    /// The guide's current state.
    pub fn state(&self) -> StateId {
        self.state
    }

    /// The shared index the guide walks.
    pub fn index(&self) -> &Arc<Index> {
        &self.index
    }

    /// Tokens allowed at the index's initial state.
    pub fn start_tokens(&self) -> Vec<TokenId> {
        self.index
            .allowed_tokens(&self.index.initial_state())
            .unwrap_or_default()
    }

    /// Tokens allowed at the current state; only EOS once the guide has
    /// consumed it.
    pub fn current_tokens(&self) -> Vec<TokenId> {
        if self.finished {
            return vec![self.index.eos_token_id()];
        }
        self.index.allowed_tokens(&self.state).unwrap_or_default()
    }

    /// Consumes `token_id`, moves to the next state and returns the tokens
    /// allowed there. Fails with [`Error::NoNextState`] when the token is
    /// not allowed at the current state, leaving the guide untouched.
    pub fn advance(&mut self, token_id: TokenId) -> Result<Vec<TokenId>> {
        match self.index.next_state(&self.state, &token_id) {
            Some(next_state) => {
                self.state = next_state;
                if token_id == self.index.eos_token_id() {
                    self.finished = true;
                }
                Ok(self.current_tokens())
            }
            None => Err(Error::NoNextState),
        }
    }

    /// Whether the text generated so far is accepted, i.e. EOS is legal now
    /// or has already been consumed.
    pub fn is_finished(&self) -> bool {
        self.finished || self.index.is_final_state(&self.state)
    }

    /// Writes the current allowed-token set as a packed bitmask: 32-bit
    /// little-endian words, LSB-first, bit `i` set iff token id `i` is
    /// allowed. The whole buffer is overwritten.
    pub fn fill_mask(&self, mask: &mut [u32]) -> Result<()> {
        let required = self.index.vocab_size();
        let capacity = mask.len() * mask::MASK_WORD_BITS;
        if capacity < required {
            return Err(Error::MaskTooSmall { required, capacity });
        }
        mask.fill(0);
        if self.finished {
            mask::set_bit(mask, self.index.eos_token_id());
            return Ok(());
        }
        self.index
            .for_each_allowed(&self.state, |token_id| mask::set_bit(mask, token_id));
        Ok(())
    }

    /// Fused [`Guide::advance`] + [`Guide::fill_mask`]. On error the guide
    /// and the mask are left untouched.
    pub fn advance_with_mask(&mut self, token_id: TokenId, mask: &mut [u32]) -> Result<()> {
        match self.index.next_state(&self.state, &token_id) {
            Some(next_state) => {
                self.state = next_state;
                if token_id == self.index.eos_token_id() {
                    self.finished = true;
                }
                self.fill_mask(mask)
            }
            None => Err(Error::NoNextState),
        }
    }

    /// Writes the current bitmask into a raw buffer of
    /// `element_count * element_size` bytes, as handed over by a logit
    /// kernel. Only 4-byte elements are accepted; the pointer must be
    /// non-null and word-aligned. Exactly the whole buffer is written.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for writes of `element_count * element_size`
    /// bytes and must not be aliased for the duration of the call.
    pub unsafe fn write_mask_into(
        &self,
        ptr: *mut u8,
        element_count: usize,
        element_size: usize,
    ) -> Result<()> {
        if element_size != 4 {
            return Err(Error::UnsupportedMaskWordSize(element_size));
        }
        if ptr.is_null() || (ptr as usize) % 4 != 0 {
            return Err(Error::UnalignedMask);
        }
        let words = std::slice::from_raw_parts_mut(ptr.cast::<u32>(), element_count);
        self.fill_mask(words)
    }
}
