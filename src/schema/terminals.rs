//! Regular expression fragments for JSON terminals and string formats, the
//! building blocks of every schema translation.
//!
//! The format patterns are assembled from commented fragments rather than
//! written as opaque blobs; each recognizes the narrow shape language models
//! are expected to emit, not the full breadth of the corresponding RFC.

/// One JSON string character: anything unescaped except `"`, `\` and
/// control characters, or a short escape sequence.
pub static STRING_INNER: &str = r#"([^"\\\x00-\x1F\x7F-\x9F]|\\["\\/bfnrt])"#;

/// A complete JSON string literal, quotes included.
pub static STRING: &str = concat!(
    "\"",
    r#"([^"\\\x00-\x1F\x7F-\x9F]|\\["\\/bfnrt])*"#,
    "\"",
);

/// A JSON integer: optional sign, no leading zeros.
pub static INTEGER: &str = r"(-)?(0|[1-9][0-9]*)";

/// A JSON number per the grammar of RFC 8259 §6, except that the exponent
/// sign is mandatory to keep the language unambiguous for small models.
pub static NUMBER: &str = concat!(
    r"((-)?(0|[1-9][0-9]*))", // integer part
    r"(\.[0-9]+)?",           // fraction
    r"([eE][+-][0-9]+)?",     // exponent
);

pub static BOOLEAN: &str = r"(true|false)";
pub static NULL: &str = r"null";

/// Whitespace between JSON punctuation.
///
/// Deliberately a single optional space: letting the model choose arbitrary
/// whitespace runs invites pathological generations.
pub static WHITESPACE: &str = r"[ ]?";

/// The JSON instance types with a closed-form terminal regex.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum JsonType {
    String,
    Integer,
    Number,
    Boolean,
    Null,
}

impl JsonType {
    pub fn regex(self) -> &'static str {
        match self {
            JsonType::String => STRING,
            JsonType::Integer => INTEGER,
            JsonType::Number => NUMBER,
            JsonType::Boolean => BOOLEAN,
            JsonType::Null => NULL,
        }
    }
}

/// `YYYY-MM-DD`, month 01-12, day 01-31.
pub static DATE: &str = concat!(
    "\"",
    r"\d{4}",                     // year
    r"-(0[1-9]|1[0-2])",          // month
    r"-(0[1-9]|[12][0-9]|3[01])", // day
    "\"",
);

/// `HH:MM:SS` on a 24-hour clock, optional fractional seconds, optional
/// trailing `Z`.
pub static TIME: &str = concat!(
    "\"",
    r"([01][0-9]|2[0-3])", // hours
    r":[0-5][0-9]",        // minutes
    r":[0-5][0-9]",        // seconds
    r"(\.[0-9]+)?",        // fraction
    "Z?",
    "\"",
);

/// ISO 8601 date and time joined by `T`.
pub static DATE_TIME: &str = concat!(
    "\"",
    r"\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12][0-9]|3[01])", // date
    "T",
    r"([01][0-9]|2[0-3]):[0-5][0-9]:[0-5][0-9]",       // clock
    r"(\.[0-9]+)?",                                    // fraction
    "Z?",
    "\"",
);

/// Lowercase hexadecimal UUID in the 8-4-4-4-12 layout, any version.
pub static UUID: &str = concat!(
    "\"",
    r"[0-9a-f]{8}",
    r"(-[0-9a-f]{4}){3}",
    r"-[0-9a-f]{12}",
    "\"",
);

/// A practical URI shape: an http(s)/ftp URL or a URN. Matching the full
/// RFC 3986 grammar buys nothing for generation and bloats the DFA.
pub static URI: &str = concat!(
    "\"(",
    r#"(https?|ftp)://[^\s"]+"#,          // scheme://rest, no spaces or quotes
    "|",
    r#"urn:[a-z0-9][a-z0-9-]{0,31}:[^\s"]+"#, // urn:nid:nss
    ")\"",
);

/// A practical email shape: dotted local part at a dotted domain.
pub static EMAIL: &str = concat!(
    "\"",
    r"[a-z0-9._%+-]+",         // local part
    "@",
    r"[a-z0-9-]+(\.[a-z0-9-]+)+", // domain with at least one dot
    "\"",
);

/// Supported values of the string `format` keyword.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FormatType {
    DateTime,
    Date,
    Time,
    Uuid,
    Uri,
    Email,
}

impl FormatType {
    pub fn regex(self) -> &'static str {
        match self {
            FormatType::DateTime => DATE_TIME,
            FormatType::Date => DATE,
            FormatType::Time => TIME,
            FormatType::Uuid => UUID,
            FormatType::Uri => URI,
            FormatType::Email => EMAIL,
        }
    }

    pub fn from_name(name: &str) -> Option<FormatType> {
        match name {
            "date-time" => Some(FormatType::DateTime),
            "date" => Some(FormatType::Date),
            "time" => Some(FormatType::Time),
            "uuid" => Some(FormatType::Uuid),
            "uri" => Some(FormatType::Uri),
            "email" => Some(FormatType::Email),
            _ => None,
        }
    }
}
