use thiserror::Error;

pub type Result<T, E = crate::Error> = std::result::Result<T, E>;

/// Wrapper which restores `PartialEq` over the boxed error of `tokenizers`.
#[cfg(feature = "hugginface-hub")]
#[derive(Error, Debug)]
#[error("{0}")]
pub struct TokenizersError(pub tokenizers::Error);

#[cfg(feature = "hugginface-hub")]
impl PartialEq for TokenizersError {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_string() == other.0.to_string()
    }
}

#[derive(Error, Debug)]
pub enum Error {
    // Regex and DFA compilation.
    #[error("Failed to compile the regular expression into a DFA: {0}")]
    InvalidRegex(#[from] Box<regex_automata::dfa::dense::BuildError>),
    #[error("The DFA has no anchored universal start state")]
    NoUniversalStartState,
    #[error("No token of the vocabulary can continue a match of the pattern")]
    EmptyLanguage,

    // Vocabulary construction.
    #[error("EOS token should not be inserted into the vocabulary")]
    EosTokenDisallowed,
    #[error("Empty token bytes cannot be inserted into the vocabulary")]
    EmptyTokenDisallowed,
    #[error("Token id {0} is already present for these token bytes")]
    DuplicateTokenId(crate::primitives::TokenId),
    #[error("The vocabulary contains no tokens")]
    EmptyVocabulary,

    // Pretrained tokenizer loading.
    #[cfg(feature = "hugginface-hub")]
    #[error(transparent)]
    TokenizersError(#[from] TokenizersError),
    #[error("Unsupported tokenizer for {model}: {reason}")]
    UnsupportedTokenizer { model: String, reason: String },
    #[error("No token processor for this tokenizer family")]
    UnsupportedByTokenProcessor,
    #[error("Failed to unpack the tokenizer's decoder")]
    DecoderUnpackingFailed,
    #[error("Byte level token could not be rendered to raw bytes")]
    ByteProcessorFailed,
    #[error("Byte fallback token could not be rendered to raw bytes")]
    ByteFallbackProcessorFailed,

    // Guide runtime.
    #[error("No next state found for the current state")]
    NoNextState,

    // Mask buffers.
    #[error("Mask capacity ({capacity} bits) lower than required capacity ({required} bits)")]
    MaskTooSmall { required: usize, capacity: usize },
    #[error("Mask buffer is null or not aligned to the mask word size")]
    UnalignedMask,
    #[error("Unsupported mask word size of {0} bytes, only 4-byte words are written")]
    UnsupportedMaskWordSize(usize),

    // Index serialization.
    #[error("Bytes do not start with a serialized index header")]
    MalformedIndexHeader,
    #[error("Unsupported serialized index version {0}")]
    UnsupportedIndexVersion(u8),
    #[error("Unknown serialized index variant tag {0}")]
    UnknownIndexVariant(u8),
    #[error(transparent)]
    EncodeError(#[from] bincode::error::EncodeError),
    #[error(transparent)]
    DecodeError(#[from] bincode::error::DecodeError),

    // JSON schema translation.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Failures of the JSON schema to regular expression translation.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Schema document is not valid JSON: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error("Unsupported JSON Schema structure {0}, check it is valid and uses only supported constructs")]
    UnsupportedSchema(Box<serde_json::Value>),
    #[error("'properties' must be an object")]
    PropertiesNotFound,
    #[error("'allOf' must be an array")]
    AllOfMustBeAnArray,
    #[error("'anyOf' must be an array")]
    AnyOfMustBeAnArray,
    #[error("'oneOf' must be an array")]
    OneOfMustBeAnArray,
    #[error("'prefixItems' must be an array")]
    PrefixItemsMustBeAnArray,
    #[error("'enum' must be an array")]
    EnumMustBeAnArray,
    #[error("'const' key not found in object")]
    ConstKeyNotFound,
    #[error("'$ref' must be a string")]
    RefMustBeAString,
    #[error("Only references local to the document are supported, got: {0}")]
    ExternalReferencesNotSupported(Box<str>),
    #[error("Malformed reference: {0}")]
    InvalidReferenceFormat(Box<str>),
    #[error("Reference points at nothing: {0}")]
    InvalidReferencePath(Box<str>),
    #[error("Reference expansion budget of {0} exhausted")]
    RefRecursionLimitReached(usize),
    #[error("'type' must be a string")]
    TypeMustBeAString,
    #[error("Unsupported type: {0}")]
    UnsupportedType(Box<str>),
    #[error("Upper bound must not be lower than the matching lower bound")]
    MaxBoundError,
    #[error("String format {0} is not supported")]
    UnsupportedStringFormat(Box<str>),
}

impl SchemaError {
    pub fn is_recursion_limit(&self) -> bool {
        matches!(self, Self::RefRecursionLimitReached(_))
    }
}
