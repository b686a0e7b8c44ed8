//! Generates a regular expression recognizing the JSON texts conforming to
//! a given JSON schema.
//!
//! The translation accepts a draft-04 through draft-07 subset. Per type:
//! `string` (`minLength`/`maxLength`, `pattern`, `format` with date-time,
//! date, time, uuid, uri and email), `integer` (`minDigits`/`maxDigits`),
//! `number` (digit bounds for the integer, fraction and exponent parts),
//! `array` (`items`, `prefixItems`, `minItems`/`maxItems`), `object`
//! (`properties` with `required`, `additionalProperties`,
//! `minProperties`/`maxProperties`), plus `enum`, `const`,
//! `allOf`/`anyOf`/`oneOf` and local `$ref` references. An empty schema
//! means unconstrained, allowing any JSON value.
//!
//! References are unrolled up to a bounded number of expansions (3 by
//! default): regex size grows exponentially with each level, so recursive
//! schemas past the bound are rejected rather than silently truncated. Only
//! local references are supported.
//!
//! Whitespace between JSON punctuation follows [`WHITESPACE`] unless a
//! custom pattern is supplied. Unsupported constructs surface as
//! [`SchemaError`](crate::error::SchemaError) values naming the construct.
//! The produced regex is always accepted by the index builder.

use serde_json::Value;

pub use terminals::*;

mod terminals;
mod translate;

use crate::Result;

/// Generates a regular expression string from a JSON schema string.
///
/// # Example
///
/// ```rust
/// # use tokenrail::Error;
/// use tokenrail::schema;
///
/// # fn main() -> Result<(), Error> {
/// let json_schema = r#"{
///     "type": "object",
///     "properties": {
///         "name": { "type": "string" },
///         "age": { "type": "integer" }
///     },
///     "required": ["name", "age"]
/// }"#;
/// let regex = schema::regex_from_str(json_schema, None, None)?;
/// # Ok(())
/// # }
/// ```
pub fn regex_from_str(
    json: &str,
    whitespace_pattern: Option<&str>,
    max_recursion_depth: Option<usize>,
) -> Result<String> {
    let json_value: Value = serde_json::from_str(json).map_err(crate::error::SchemaError::from)?;
    regex_from_value(&json_value, whitespace_pattern, max_recursion_depth)
}

/// Generates a regular expression string from an already parsed
/// `serde_json::Value` of a JSON schema.
pub fn regex_from_value(
    json: &Value,
    whitespace_pattern: Option<&str>,
    max_recursion_depth: Option<usize>,
) -> Result<String> {
    let mut translator = translate::Translator::new(json);
    if let Some(pattern) = whitespace_pattern {
        translator = translator.with_whitespace_pattern(pattern)
    }
    if let Some(depth) = max_recursion_depth {
        translator = translator.with_max_recursion_depth(depth)
    }
    Ok(translator.translate(json)?)
}

#[cfg(test)]
mod tests {
    use regex::Regex;

    use super::*;
    use crate::error::SchemaError;
    use crate::Error;

    fn translated(schema: &str) -> String {
        regex_from_str(schema, None, None).expect("To regex failed")
    }

    /// Checks the schema's language: every `accepted` text conforms, every
    /// `rejected` text does not. Patterns are anchored since generation
    /// matches the entire output.
    fn assert_language(schema: &str, accepted: &[&str], rejected: &[&str]) {
        let pattern = translated(schema);
        let re = Regex::new(&format!("^(?:{pattern})$")).expect("Regex failed");
        for text in accepted {
            assert!(
                re.is_match(text),
                "{text} should conform to {schema}, regex:\n{pattern}"
            );
        }
        for text in rejected {
            assert!(
                !re.is_match(text),
                "{text} should NOT conform to {schema}, regex:\n{pattern}"
            );
        }
    }

    #[test]
    fn scalar_types() {
        assert_language(
            r#"{"type": "integer"}"#,
            &["0", "-3", "1200"],
            &["007", "2.5", "x", ""],
        );
        assert_language(
            r#"{"type": "number"}"#,
            &["0", "-2.5", "6.02e+23", "17"],
            &["1e5", ".5", "01"],
        );
        assert_language(
            r#"{"type": "boolean"}"#,
            &["true", "false"],
            &["True", "1", "null"],
        );
        assert_language(r#"{"type": "null"}"#, &["null"], &["none", ""]);
        assert_language(
            r#"{"type": "string"}"#,
            &[r#""hi there""#, r#""esc \" aped""#, r#""""#],
            &["hi", r#""bad \x escape""#],
        );
    }

    #[test]
    fn integer_digit_bounds() {
        // Lead digit spelled outside the run, so bounds shift down by one.
        let schema = r#"{"type": "integer", "minDigits": 2, "maxDigits": 4}"#;
        assert_eq!(translated(schema), "(-)?(0|[1-9][0-9]{1,3})");
        // Zero stays legal under any bound, it has its own alternative.
        assert_language(schema, &["10", "9999", "-42", "0"], &["5", "10000"]);

        assert_language(
            r#"{"type": "integer", "minDigits": 3}"#,
            &["100", "123456"],
            &["99"],
        );
    }

    #[test]
    fn number_digit_bounds() {
        assert_language(
            r#"{"type": "number", "minDigitsFraction": 2, "maxDigitsFraction": 3}"#,
            &["3.14", "-0.125", "10"],
            &["3.1", "3.1415"],
        );
        assert_language(
            r#"{"type": "number", "minDigitsExponent": 2}"#,
            &["1e+05", "2.5E-123", "7"],
            &["1e+5"],
        );
        assert_language(
            r#"{"type": "number", "minDigitsInteger": 2, "maxDigitsInteger": 3}"#,
            &["25", "999.5", "0"],
            &["5", "1234"],
        );
    }

    #[test]
    fn string_refinements() {
        assert_language(
            r#"{"type": "string", "minLength": 2, "maxLength": 4}"#,
            &[r#""ab""#, r#""abcd""#],
            &[r#""a""#, r#""abcde""#, "ab"],
        );
        assert_language(
            r#"{"type": "string", "minLength": 3}"#,
            &[r#""abc""#, r#""abcdefgh""#],
            &[r#""ab""#],
        );
        // Anchors of a nested pattern are absorbed by full-match semantics.
        assert_language(
            r#"{"type": "string", "pattern": "^[0-9]{3}$"}"#,
            &[r#""123""#],
            &[r#""12""#, "123"],
        );
        assert_language(
            r#"{"type": "string", "format": "uuid"}"#,
            &[r#""123e4567-e89b-12d3-a456-426614174000""#],
            &[r#""123e4567-e89b-12d3-a456""#, "123e4567"],
        );
        assert_language(
            r#"{"type": "string", "format": "date-time"}"#,
            &[r#""2018-11-13T20:20:39Z""#, r#""2016-09-18T17:34:02.666Z""#],
            &[r#""2018-11-13 20:20:39""#, r#""2018-11-13""#],
        );
    }

    #[test]
    fn constants_and_enums() {
        // JSON-encode, then regex-escape.
        assert_eq!(translated(r#"{"const": "v1.0"}"#), r#""v1\.0""#);
        assert_language(r#"{"const": true}"#, &["true"], &["false"]);
        assert_language(r#"{"const": null}"#, &["null"], &[""]);

        assert_language(
            r#"{"enum": ["red", "green", 2]}"#,
            &[r#""red""#, r#""green""#, "2"],
            &[r#""blue""#, "3", "red"],
        );
        // Regex metacharacters in values never leak as operators.
        assert_language(r#"{"enum": [".*"]}"#, &[r#"".*""#], &[r#""ab""#]);
        // Composite values keep whitespace flexible inside.
        assert_language(
            r#"{"enum": [[1, 2], {"on": true}]}"#,
            &["[1,2]", "[ 1 , 2 ]", r#"{"on":true}"#, r#"{ "on" : true }"#],
            &["[2,1]", "[1]", r#"{"on":false}"#],
        );
    }

    #[test]
    fn arrays() {
        assert_language(
            r#"{"type": "array", "items": {"type": "integer"}}"#,
            &["[]", "[1]", "[1,2,3]", "[ 1 , 2 ]"],
            &["[1,]", "[", r#"["a"]"#],
        );
        assert_language(
            r#"{"type": "array", "items": {"type": "boolean"}, "minItems": 2}"#,
            &["[true,false]", "[true,true,true]"],
            &["[true]", "[]"],
        );
        assert_language(
            r#"{"type": "array", "items": {"type": "boolean"}, "maxItems": 2}"#,
            &["[]", "[true]", "[true,false]"],
            &["[true,true,true]"],
        );
        assert_language(
            r#"{"type": "array", "items": {"type": "boolean"}, "minItems": 1, "maxItems": 1}"#,
            &["[false]"],
            &["[]", "[true,true]"],
        );
        assert_language(
            r#"{"type": "array", "maxItems": 0}"#,
            &["[]", "[ ]"],
            &["[null]"],
        );
        // Without an item schema, any JSON value may appear.
        assert_language(
            r#"{"type": "array"}"#,
            &["[]", r#"[1,"a",null,true]"#, "[[true]]"],
            &["[1"],
        );
    }

    #[test]
    fn tuples() {
        assert_language(
            r#"{"prefixItems": [{"type": "integer"}, {"type": "string"}]}"#,
            &[r#"[1,"a"]"#, r#"[ 1 , "a" ]"#],
            &["[1]", r#"["a",1]"#, r#"[1,"a",2]"#],
        );
    }

    #[test]
    fn objects_with_required_properties() {
        let schema = r#"{
            "type": "object",
            "properties": {"id": {"type": "integer"}},
            "required": ["id"]
        }"#;
        assert_language(
            schema,
            &[r#"{"id":7}"#, r#"{ "id" : 7 }"#],
            &["{}", r#"{"id":"x"}"#, ""],
        );

        // Optional member after the last required one carries its comma.
        assert_language(
            r#"{
                "type": "object",
                "properties": {
                    "label": {"type": "string"},
                    "qty": {"type": "integer"}
                },
                "required": ["label"]
            }"#,
            &[
                r#"{"label":"bolt"}"#,
                r#"{"label":"bolt","qty":40}"#,
                r#"{ "label" : "bolt" , "qty" : 40 }"#,
            ],
            &[r#"{"qty":40}"#, "{}", r#"{"label":"bolt",}"#],
        );
    }

    #[test]
    fn objects_with_only_optional_properties() {
        let schema = r#"{
            "type": "object",
            "properties": {
                "a": {"type": "integer"},
                "b": {"type": "boolean"}
            }
        }"#;
        assert_language(
            schema,
            &[
                "{}",
                r#"{"a":1}"#,
                r#"{"b":true}"#,
                r#"{"a":1,"b":true}"#,
                r#"{"a":1, "b":true}"#,
            ],
            // Declaration order is fixed and dangling commas are illegal.
            &[r#"{"b":true,"a":1}"#, r#"{"a":1,}"#],
        );
    }

    #[test]
    fn objects_as_maps() {
        assert_language(
            r#"{"type": "object", "additionalProperties": {"type": "integer"}}"#,
            &["{}", r#"{"x":1}"#, r#"{"x":1, "y":2}"#],
            &[r#"{"x":"s"}"#, r#"{"x"}"#],
        );
        assert_language(
            r#"{"type": "object", "additionalProperties": false}"#,
            &["{}"],
            &[r#"{"x":1}"#],
        );
        // Property-count bounds apply to the map form.
        assert_language(
            r#"{
                "type": "object",
                "additionalProperties": {"type": "integer"},
                "minProperties": 2
            }"#,
            &[r#"{"a":1,"b":2}"#],
            &["{}", r#"{"a":1}"#],
        );
        assert_language(
            r#"{"type": "object", "maxProperties": 0}"#,
            &["{}", "{ }"],
            &[r#"{"a":1}"#],
        );
    }

    #[test]
    fn combinators() {
        assert_language(
            r#"{"anyOf": [{"type": "integer"}, {"type": "boolean"}]}"#,
            &["5", "true"],
            &[r#""5""#, "null"],
        );
        assert_language(
            r#"{"oneOf": [{"type": "string"}, {"type": "null"}]}"#,
            &[r#""x""#, "null"],
            &["5"],
        );
        // allOf concatenates the member languages.
        assert_language(
            r#"{"allOf": [{"const": "a"}, {"const": "b"}]}"#,
            &[r#""a""b""#],
            &[r#""a""#, r#""b""#],
        );
    }

    #[test]
    fn local_references() {
        assert_language(
            r##"{
                "definitions": {"port": {"type": "integer"}},
                "type": "object",
                "properties": {"port": {"$ref": "#/definitions/port"}},
                "required": ["port"]
            }"##,
            &[r#"{"port":8080}"#],
            &[r#"{"port":"http"}"#],
        );
        assert_language(
            r##"{
                "$defs": {"flag": {"type": "boolean"}},
                "type": "object",
                "properties": {"on": {"$ref": "#/$defs/flag"}},
                "required": ["on"]
            }"##,
            &[r#"{"on":true}"#],
            &[r#"{"on":1}"#],
        );
    }

    #[test]
    fn empty_schema_allows_any_json_value() {
        let pattern = translated("{}");
        let re = Regex::new(&format!("^(?:{pattern})$")).expect("Regex failed");
        for text in ["true", "null", "1.3", "42", r#""text""#, "[1,2]", r#"{"a":1}"#] {
            assert!(re.is_match(text), "{text} should be legal JSON here");
        }
    }

    #[test]
    fn custom_whitespace_pattern() {
        let schema = r#"{
            "type": "object",
            "properties": {"qty": {"type": "integer"}},
            "required": ["qty"]
        }"#;
        let pattern = regex_from_str(schema, Some(r"[\n ]*"), None).expect("To regex failed");
        let re = Regex::new(&format!("^(?:{pattern})$")).expect("Regex failed");
        assert!(re.is_match("{\n  \"qty\"\n:\n100\n}"));
    }

    #[test]
    fn recursive_reference_within_expansion_budget() {
        let schema = r##"{
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "children": {
                    "type": "array",
                    "items": {"$ref": "#"}
                }
            },
            "required": ["name"]
        }"##;
        let pattern = translated(schema);
        let re = Regex::new(&format!("^(?:{pattern})$")).expect("Regex failed");
        assert!(re.is_match(r#"{"name":"root"}"#));
        assert!(re.is_match(r#"{"name":"root","children":[{"name":"child"}]}"#));
    }

    #[test]
    fn unbounded_recursion_is_rejected() {
        // A self-referencing array has no optional property where the
        // unrolling could stop, so the expansion budget must fire.
        let schema = r##"{"type": "array", "items": {"$ref": "#"}}"##;
        match regex_from_str(schema, None, Some(1)) {
            Err(Error::Schema(SchemaError::RefRecursionLimitReached(1))) => {}
            _ => unreachable!(),
        }
    }

    #[test]
    fn unsupported_constructs_are_named() {
        match regex_from_str(r#"{"type": "tuple"}"#, None, None) {
            Err(Error::Schema(SchemaError::UnsupportedType(ty))) => {
                assert_eq!(&*ty, "tuple")
            }
            _ => unreachable!(),
        }
        match regex_from_str(r#"{"type": "string", "format": "ipv6"}"#, None, None) {
            Err(Error::Schema(SchemaError::UnsupportedStringFormat(format))) => {
                assert_eq!(&*format, "ipv6")
            }
            _ => unreachable!(),
        }
        match regex_from_str(
            r##"{"$ref": "http://elsewhere.test/schema.json#/definitions/x"}"##,
            None,
            None,
        ) {
            Err(Error::Schema(SchemaError::ExternalReferencesNotSupported(_))) => {}
            _ => unreachable!(),
        }
        match regex_from_str(r##"{"$ref": "#/definitions/missing"}"##, None, None) {
            Err(Error::Schema(SchemaError::InvalidReferencePath(_))) => {}
            _ => unreachable!(),
        }
        match regex_from_str(r#"{"minLength": 2}"#, None, None) {
            Err(Error::Schema(SchemaError::UnsupportedSchema(_))) => {}
            _ => unreachable!(),
        }
    }

    #[test]
    fn bounds_are_validated() {
        match regex_from_str(
            r#"{"type": "string", "minLength": 5, "maxLength": 3}"#,
            None,
            None,
        ) {
            Err(Error::Schema(SchemaError::MaxBoundError)) => {}
            _ => unreachable!(),
        }
        match regex_from_str(
            r#"{"type": "integer", "minDigits": 4, "maxDigits": 2}"#,
            None,
            None,
        ) {
            Err(Error::Schema(SchemaError::MaxBoundError)) => {}
            _ => unreachable!(),
        }
    }

    #[test]
    fn generated_regexes_compile_into_indexes() {
        use crate::index::Index;
        use crate::vocabulary::Vocabulary;

        let schema = r#"{
            "type": "object",
            "properties": {"age": {"type": "integer"}},
            "required": ["age"]
        }"#;
        let regex = translated(schema);

        let mut vocabulary = Vocabulary::new(9);
        for (token, token_id) in [
            ("{", 0),
            ("}", 1),
            ("\"age\"", 2),
            (":", 3),
            (" ", 4),
            ("4", 5),
            ("2", 6),
        ] {
            vocabulary
                .try_insert(token, token_id as u32)
                .expect("Insert failed");
        }
        let index = Index::new(&regex, &vocabulary).expect("Index failed");

        let mut state = index.initial_state();
        for token_id in [0, 4, 2, 3, 4, 5, 6, 1] {
            state = index
                .next_state(&state, &token_id)
                .expect("No next state");
        }
        assert!(index.is_final_state(&state));
    }
}
