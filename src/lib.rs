//! # Tokenrail
//!
//! `tokenrail` constrains token-by-token generation from a language model so
//! that the produced text is guaranteed to match a regular expression, or a
//! regex derived from a JSON schema:
//!
//! - [`schema`] translates a JSON schema document into a regular expression
//! - [`index::Index`] combines a regular expression with a
//!   [`vocabulary::Vocabulary`] into a precomputed (or lazily computed)
//!   token-level transition table
//! - [`guide::Guide`] walks an `Index` one token per decoding step, listing
//!   the legal next tokens or writing them as a packed bitmask ([`mask`])
//!   for the logit-masking kernels
//!
//! An `Index` is expensive and shared read-only across threads; a `Guide` is
//! a cheap per-request cursor over it.
//!
//! ## Example
//!
//! ```rust
//! # use tokenrail::Error;
//! use tokenrail::prelude::*;
//! use rustc_hash::FxHashMap as HashMap;
//!
//! # fn main() -> Result<(), Error> {
//! // A regular expression, here derived from a JSON schema
//! let json_schema = r#"{
//!     "type": "object",
//!     "properties": {
//!         "answer": { "type": "integer" }
//!     },
//!     "required": ["answer"]
//! }"#;
//! let regex = schema::regex_from_str(json_schema, None, None)?;
//!
//! // A toy vocabulary; `Vocabulary::from_pretrained` loads a real one
//! let tokens: HashMap<String, Vec<TokenId>> = HashMap::from_iter([
//!     ("{\"answer\"".to_string(), vec![0]),
//!     (": ".to_string(), vec![1]),
//!     ("42".to_string(), vec![2]),
//!     ("}".to_string(), vec![3]),
//! ]);
//! let vocabulary = Vocabulary::try_from((4, tokens))?;
//!
//! // The index is built once and shared, guides are per request
//! let index = Index::new(&regex, &vocabulary)?;
//! let mut guide = Guide::new(index);
//!
//! let mut allowed = guide.start_tokens();
//! while !guide.is_finished() {
//!     // A sampler would pick among `allowed`, greedily closing here
//!     let token_id = *allowed.iter().max().expect("Some allowed tokens");
//!     allowed = guide.advance(token_id)?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Index variants
//!
//! [`index::Index::new`] materializes every transition row up front, which
//! can take a while for large vocabularies and complex patterns but makes
//! each decoding step a plain lookup. [`index::Index::compressed`] defers
//! row computation to the first visit of each state, which is the better
//! trade when generations only ever explore a sliver of the state space.

pub mod error;
pub mod guide;
pub mod index;
pub mod mask;
pub mod prelude;
pub mod primitives;
pub mod schema;
pub mod vocabulary;

mod automaton;

pub use error::{Error, Result, SchemaError};
