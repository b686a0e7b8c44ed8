//! Token byte-string to id mapping, built by hand or read out of a
//! pretrained tokenizer.

use bincode::{Decode, Encode};
use rustc_hash::FxHashMap as HashMap;
#[cfg(feature = "hugginface-hub")]
use tokenizers::{normalizers, NormalizerWrapper, Tokenizer};
#[cfg(feature = "hugginface-hub")]
use tracing::debug;

#[cfg(feature = "hugginface-hub")]
use locator::{HFLocator, Locator};
#[cfg(feature = "hugginface-hub")]
use processor::TokenProcessor;

use crate::prelude::*;
use crate::{Error, Result};

#[cfg(feature = "hugginface-hub")]
mod locator;
#[cfg(feature = "hugginface-hub")]
mod processor;

/// Mapping of token byte-strings to token ids, with a distinguished EOS id.
///
/// One byte-string may carry several ids: byte-fallback tokenizers spell
/// the same bytes both as plain text and as `<0xXX>` singletons. Token
/// bytes are arbitrary and need not be valid UTF-8. The EOS id never
/// appears inside the map itself.
///
/// ## Examples
///
/// ### Build a vocabulary by hand.
/// ```rust
/// use tokenrail::prelude::*;
///
/// let mut vocabulary = Vocabulary::new(100);
/// vocabulary.try_insert("if", 0).expect("New token inserted");
/// vocabulary.try_insert(b"\xFF".to_vec(), 1).expect("New token inserted");
///
/// assert_eq!(vocabulary.token_ids("if"), Some(&vec![0]));
/// assert_eq!(vocabulary.eos_token_id(), 100);
/// ```
#[cfg_attr(
    feature = "hugginface-hub",
    doc = r##"
### Load the vocabulary of a pretrained model.
```rust,no_run
use tokenrail::prelude::*;

let vocabulary = Vocabulary::from_pretrained("openai-community/gpt2", None);
```
"##
)]
#[derive(Clone, Debug, Default, PartialEq, Encode, Decode)]
pub struct Vocabulary {
    eos_token_id: TokenId,
    tokens: HashMap<Token, Vec<TokenId>>,
}

impl Vocabulary {
    /// Creates an empty vocabulary with the given EOS token id.
    pub fn new(eos_token_id: TokenId) -> Self {
        Self {
            eos_token_id,
            tokens: HashMap::default(),
        }
    }

    /// Loads the vocabulary of a pretrained model from the Hugging Face
    /// Hub and renders every token to the raw bytes the model emits for it.
    ///
    /// Special tokens other than EOS are dropped from the mapping; the
    /// tokenizer's own EOS id is preserved as this vocabulary's EOS.
    #[cfg(feature = "hugginface-hub")]
    pub fn from_pretrained(
        model: &str,
        parameters: Option<FromPretrainedParameters>,
    ) -> Result<Self> {
        Self::from_pretrained_with_locator::<HFLocator>(model, parameters)
    }

    #[doc(hidden)]
    #[inline(always)]
    #[cfg(feature = "hugginface-hub")]
    fn from_pretrained_with_locator<L: Locator>(
        model: &str,
        parameters: Option<FromPretrainedParameters>,
    ) -> Result<Self> {
        let unsupported = |reason: &str| Error::UnsupportedTokenizer {
            model: model.to_string(),
            reason: reason.to_string(),
        };

        let mut tokenizer = Tokenizer::from_pretrained(model, parameters.clone())
            .map_err(crate::error::TokenizersError)?;
        strip_prepend_normalizers(&mut tokenizer);

        let eos_token_id = L::locate_eos_token_id(model, &tokenizer, &parameters)
            .ok_or_else(|| unsupported("EOS token id"))?;
        let processor =
            TokenProcessor::new(&tokenizer).map_err(|_| unsupported("token processor"))?;

        // Added tokens carry literal text and bypass the decoder; special
        // markers must never become generable bytes. Everything else goes
        // through the family-specific byte rendering.
        let mut entries: Vec<(Token, TokenId)> = Vec::new();
        for (id, added) in tokenizer.get_added_tokens_decoder() {
            if !added.special && id != eos_token_id {
                entries.push((added.content.into_bytes(), id));
            }
        }
        for (text, id) in tokenizer.get_vocab(false) {
            if id != eos_token_id {
                entries.push((processor.process(&text)?, id));
            }
        }

        let mut vocabulary = Vocabulary::new(eos_token_id);
        for (bytes, id) in entries {
            // Tokenizers may list one surface twice, e.g. as both an added
            // and a base token.
            let known = vocabulary
                .token_ids(&bytes)
                .is_some_and(|ids| ids.contains(&id));
            if bytes.is_empty() || known {
                continue;
            }
            vocabulary.try_insert(bytes, id)?;
        }

        debug!(
            model,
            eos_token_id,
            tokens = vocabulary.tokens.len(),
            "loaded pretrained vocabulary"
        );
        Ok(vocabulary)
    }

    /// Returns all tokens with their token ids in the vocabulary.
    pub fn tokens(&self) -> &HashMap<Token, Vec<TokenId>> {
        &self.tokens
    }

    /// Returns all token ids of the provided token if present.
    pub fn token_ids(&self, token: impl AsRef<[u8]>) -> Option<&Vec<TokenId>> {
        self.tokens.get(token.as_ref())
    }

    /// The id of the end-of-sequence token.
    pub fn eos_token_id(&self) -> TokenId {
        self.eos_token_id
    }

    /// Inserts a token with the specified identifier.
    ///
    /// The EOS id, empty token bytes and ids already present under the same
    /// token are rejected.
    pub fn try_insert(&mut self, token: impl Into<Token>, id: TokenId) -> Result<(), Error> {
        if id == self.eos_token_id {
            return Err(Error::EosTokenDisallowed);
        }
        let token = token.into();
        if token.is_empty() {
            return Err(Error::EmptyTokenDisallowed);
        }
        let ids = self.tokens.entry(token).or_default();
        if ids.contains(&id) {
            return Err(Error::DuplicateTokenId(id));
        }
        ids.push(id);
        Ok(())
    }

    /// Removes a token and all its ids from the vocabulary.
    pub fn remove(&mut self, token: impl Into<Token>) {
        let token = token.into();
        self.tokens.remove(&token);
    }

    /// Size of the id space: highest referenced id plus one, EOS included.
    pub fn len(&self) -> usize {
        let max_token_id = self
            .tokens
            .values()
            .flatten()
            .copied()
            .fold(self.eos_token_id, TokenId::max);
        max_token_id as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Removes `Prepend` normalizers from a tokenizer.
///
/// Sentencepiece-family tokenizers prepend a space marker (`▁`) through a
/// normalizer; left in place, the marker would leak into the bytes of every
/// first token. Other normalizers are kept as they are.
#[cfg(feature = "hugginface-hub")]
fn strip_prepend_normalizers(tokenizer: &mut Tokenizer) {
    let Some(normalizer) = tokenizer.get_normalizer() else {
        return;
    };
    let replacement = match normalizer {
        NormalizerWrapper::Prepend(_) => None,
        NormalizerWrapper::Sequence(sequence) => {
            let steps: &[NormalizerWrapper] = sequence.as_ref();
            let kept: Vec<NormalizerWrapper> = steps
                .iter()
                .filter(|step| !matches!(step, NormalizerWrapper::Prepend(_)))
                .cloned()
                .collect();
            if kept.len() == steps.len() {
                // Nothing to strip, leave the tokenizer untouched.
                return;
            }
            Some(NormalizerWrapper::Sequence(normalizers::Sequence::new(
                kept,
            )))
        }
        _ => return,
    };
    tokenizer.with_normalizer(replacement);
}

impl std::fmt::Display for Vocabulary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Vocabulary(eos_token_id={}, {} tokens)",
            self.eos_token_id,
            self.tokens.len()
        )?;
        for (token, token_ids) in self.tokens.iter() {
            write!(f, "\n  b\"{}\" -> {:?}", token.escape_ascii(), token_ids)?;
        }
        Ok(())
    }
}

impl TryFrom<(TokenId, HashMap<Token, Vec<TokenId>>)> for Vocabulary {
    type Error = Error;

    fn try_from(values: (TokenId, HashMap<Token, Vec<TokenId>>)) -> Result<Self, Self::Error> {
        let (eos_token_id, tokens) = values;
        if tokens.is_empty() {
            return Err(Error::EmptyVocabulary);
        }
        if tokens.iter().any(|(_, ids)| ids.contains(&eos_token_id)) {
            return Err(Error::EosTokenDisallowed);
        }
        if tokens.keys().any(|token| token.is_empty()) {
            return Err(Error::EmptyTokenDisallowed);
        }
        Ok(Vocabulary {
            eos_token_id,
            tokens,
        })
    }
}

impl TryFrom<(TokenId, HashMap<String, Vec<TokenId>>)> for Vocabulary {
    type Error = Error;

    fn try_from(values: (TokenId, HashMap<String, Vec<TokenId>>)) -> Result<Self, Self::Error> {
        let (eos_token_id, tokens) = values;
        let tokens = tokens
            .into_iter()
            .map(|(token, ids)| (token.into_bytes(), ids))
            .collect::<HashMap<Token, Vec<TokenId>>>();
        Self::try_from((eos_token_id, tokens))
    }
}
