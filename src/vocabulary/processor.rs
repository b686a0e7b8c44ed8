//! Renders tokenizer vocabulary entries into raw token bytes.
//!
//! The strings a tokenizer reports from `get_vocab` are display forms, not
//! the bytes the model emits. Byte-level tokenizers (GPT-2 family) encode
//! each raw byte as a printable stand-in character; byte-fallback tokenizers
//! (Llama family) spell unknown bytes as `<0xXX>` singletons and mark spaces
//! with `▁`. Both forms are decoded here before tokens enter a `Vocabulary`.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap as HashMap;
use serde_json::Value;
use tokenizers::{DecoderWrapper, Tokenizer};

use crate::primitives::Token;
use crate::{Error, Result};

/// Inverse of the GPT-2 byte-to-unicode table: stand-in character -> raw byte.
static CHAR_TO_BYTE: Lazy<HashMap<char, u8>> = Lazy::new(|| {
    let mut byte_values: Vec<u32> = (u32::from('!')..=u32::from('~'))
        .chain(u32::from('¡')..=u32::from('¬'))
        .chain(u32::from('®')..=u32::from('ÿ'))
        .collect();
    let mut stand_ins = byte_values.clone();
    let mut offset = 0;
    for byte in 0..=u32::from(u8::MAX) {
        if !byte_values.contains(&byte) {
            byte_values.push(byte);
            stand_ins.push(256 + offset);
            offset += 1;
        }
    }
    byte_values
        .into_iter()
        .zip(stand_ins)
        .map(|(byte, point)| {
            let stand_in = char::from_u32(point).expect("Stand-in code point below 0x200");
            (stand_in, byte as u8)
        })
        .collect()
});

/// Decodes vocabulary strings of one tokenizer family into token bytes.
pub(crate) struct TokenProcessor {
    level: TokenProcessorLevel,
}

enum TokenProcessorLevel {
    /// GPT-2 style byte-level stand-in characters.
    Byte,
    /// Llama style `<0xXX>` singletons plus a space marker replacement.
    ByteFallback(Mods),
}

/// Replacement the byte-fallback decoder applies to plain tokens.
struct Mods {
    spacechar: String,
}

impl Default for Mods {
    fn default() -> Self {
        Self {
            spacechar: "▁".to_string(),
        }
    }
}

impl TokenProcessor {
    /// Determines the processing level from the tokenizer's decoder.
    pub(crate) fn new(tokenizer: &Tokenizer) -> Result<Self> {
        let decoder = tokenizer
            .get_decoder()
            .ok_or(Error::UnsupportedByTokenProcessor)?;
        match decoder {
            DecoderWrapper::ByteLevel(_) => Ok(Self {
                level: TokenProcessorLevel::Byte,
            }),
            DecoderWrapper::Sequence(_) => {
                // The inner decoder steps are only reachable through the
                // serialized form of the wrapper.
                let value = serde_json::to_value(decoder)
                    .map_err(|_| Error::DecoderUnpackingFailed)?;
                let steps = value
                    .get("decoders")
                    .and_then(Value::as_array)
                    .ok_or(Error::DecoderUnpackingFailed)?;

                let mut has_byte_fallback = false;
                let mut mods = Mods::default();
                for step in steps {
                    match step.get("type").and_then(Value::as_str) {
                        Some("ByteFallback") => has_byte_fallback = true,
                        Some("Replace") => {
                            if step.get("content").and_then(Value::as_str) == Some(" ") {
                                if let Some(pattern) =
                                    step.pointer("/pattern/String").and_then(Value::as_str)
                                {
                                    mods.spacechar = pattern.to_string();
                                }
                            }
                        }
                        _ => {}
                    }
                }

                if has_byte_fallback {
                    Ok(Self {
                        level: TokenProcessorLevel::ByteFallback(mods),
                    })
                } else {
                    Err(Error::UnsupportedByTokenProcessor)
                }
            }
            _ => Err(Error::UnsupportedByTokenProcessor),
        }
    }

    /// Renders one vocabulary string into the bytes the model emits for it.
    pub(crate) fn process(&self, token: &str) -> Result<Token> {
        match &self.level {
            TokenProcessorLevel::Byte => token
                .chars()
                .map(|c| {
                    CHAR_TO_BYTE
                        .get(&c)
                        .copied()
                        .ok_or(Error::ByteProcessorFailed)
                })
                .collect(),
            TokenProcessorLevel::ByteFallback(mods) => {
                if let Some(hex) = token.strip_prefix("<0x").and_then(|t| t.strip_suffix('>')) {
                    if hex.len() == 2 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
                        let byte = u8::from_str_radix(hex, 16)
                            .map_err(|_| Error::ByteFallbackProcessorFailed)?;
                        return Ok(vec![byte]);
                    }
                }
                Ok(token.replace(&mods.spacechar, " ").into_bytes())
            }
        }
    }
}
