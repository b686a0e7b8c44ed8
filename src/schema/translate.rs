//! Recursive translation of a JSON schema document into a regular
//! expression recognizing exactly the conforming JSON texts.
//!
//! Each schema node is classified by its dominant keyword and rendered
//! through a small set of regex combinators. Containers share one
//! comma-separation builder, unconstrained values recurse with an explicit
//! nesting budget, and `$ref` targets are resolved as JSON pointers.

use regex::escape;
use serde_json::Value;

use crate::error::SchemaError;
use crate::schema::terminals::{
    self, FormatType, JsonType, BOOLEAN, NULL, NUMBER, STRING, STRING_INNER,
};

type Result<T> = std::result::Result<T, SchemaError>;

// Each unrolled reference multiplies the regex size, and even simple
// referential schemas past four levels overflow the `regex` crate's
// compiled-size defaults. Three expansions keep recursive schemas usable.
const DEFAULT_MAX_REF_EXPANSIONS: usize = 3;

// Containers without an item schema admit any JSON value, which nests; the
// budget bounds how deep such values may stack.
const UNCONSTRAINED_NESTING: u64 = 2;

pub(crate) struct Translator<'a> {
    root: &'a Value,
    ws: &'a str,
    ref_expansions: usize,
    max_ref_expansions: usize,
}

/// `(pattern)?`
fn optional(pattern: &str) -> String {
    format!("({pattern})?")
}

/// `(first|second|...)`
fn any_of_patterns<I>(branches: I) -> String
where
    I: IntoIterator<Item = String>,
{
    let mut joined = String::from("(");
    for (i, branch) in branches.into_iter().enumerate() {
        if i > 0 {
            joined.push('|');
        }
        joined.push_str(&branch);
    }
    joined.push(')');
    joined
}

impl<'a> Translator<'a> {
    pub(crate) fn new(root: &'a Value) -> Self {
        Self {
            root,
            ws: terminals::WHITESPACE,
            ref_expansions: 0,
            max_ref_expansions: DEFAULT_MAX_REF_EXPANSIONS,
        }
    }

    pub(crate) fn with_whitespace_pattern(self, ws: &'a str) -> Self {
        Self { ws, ..self }
    }

    pub(crate) fn with_max_recursion_depth(self, max_ref_expansions: usize) -> Self {
        Self {
            max_ref_expansions,
            ..self
        }
    }

    /// Dispatches on the node's dominant keyword. Composition keywords and
    /// references take precedence over a bare `type`.
    pub(crate) fn translate(&mut self, node: &Value) -> Result<String> {
        let Value::Object(schema) = node else {
            return Err(SchemaError::UnsupportedSchema(Box::new(node.clone())));
        };
        if schema.is_empty() {
            // An empty schema is unconstrained.
            return Ok(self.unconstrained_value(UNCONSTRAINED_NESTING));
        }
        if schema.contains_key("properties") {
            return self.properties(schema);
        }
        if schema.contains_key("allOf") {
            let parts = self.translate_list(schema, "allOf", SchemaError::AllOfMustBeAnArray)?;
            return Ok(format!("({})", parts.concat()));
        }
        if schema.contains_key("anyOf") {
            let parts = self.translate_list(schema, "anyOf", SchemaError::AnyOfMustBeAnArray)?;
            return Ok(any_of_patterns(parts));
        }
        if schema.contains_key("oneOf") {
            let parts = self.translate_list(schema, "oneOf", SchemaError::OneOfMustBeAnArray)?;
            return Ok(any_of_patterns(
                parts.into_iter().map(|part| format!("(?:{part})")),
            ));
        }
        if schema.contains_key("prefixItems") {
            return self.tuple(schema);
        }
        if let Some(choices) = schema.get("enum") {
            let Value::Array(choices) = choices else {
                return Err(SchemaError::EnumMustBeAnArray);
            };
            let rendered = choices
                .iter()
                .map(|choice| self.literal(choice))
                .collect::<Result<Vec<_>>>()?;
            return Ok(any_of_patterns(rendered));
        }
        if schema.contains_key("const") {
            let value = schema.get("const").ok_or(SchemaError::ConstKeyNotFound)?;
            return self.literal(value);
        }
        if schema.contains_key("$ref") {
            return self.reference(schema);
        }
        match schema.get("type") {
            Some(ty) => {
                let name = ty.as_str().ok_or(SchemaError::TypeMustBeAString)?;
                self.typed(name, schema)
            }
            None => Err(SchemaError::UnsupportedSchema(Box::new(node.clone()))),
        }
    }

    /// Translates every element of the array under `key`.
    fn translate_list(
        &mut self,
        schema: &serde_json::Map<String, Value>,
        key: &str,
        not_an_array: SchemaError,
    ) -> Result<Vec<String>> {
        match schema.get(key) {
            Some(Value::Array(nodes)) => {
                nodes.iter().map(|node| self.translate(node)).collect()
            }
            _ => Err(not_an_array),
        }
    }

    // ---- scalar types -----------------------------------------------------

    fn typed(&mut self, name: &str, schema: &serde_json::Map<String, Value>) -> Result<String> {
        match name {
            "string" => self.string_type(schema),
            "integer" => self.integer_type(schema),
            "number" => self.number_type(schema),
            "boolean" => Ok(JsonType::Boolean.regex().to_string()),
            "null" => Ok(JsonType::Null.regex().to_string()),
            "array" => self.array_type(schema),
            "object" => self.object_type(schema),
            _ => Err(SchemaError::UnsupportedType(Box::from(name))),
        }
    }

    fn string_type(&mut self, schema: &serde_json::Map<String, Value>) -> Result<String> {
        let min_length = schema.get("minLength").and_then(Value::as_u64);
        let max_length = schema.get("maxLength").and_then(Value::as_u64);
        if min_length.is_some() || max_length.is_some() {
            if let (Some(lo), Some(hi)) = (min_length, max_length) {
                if hi < lo {
                    return Err(SchemaError::MaxBoundError);
                }
            }
            let run = match (min_length.unwrap_or(0), max_length) {
                (lo, Some(hi)) => format!("{{{lo},{hi}}}"),
                (lo, None) => format!("{{{lo},}}"),
            };
            return Ok(format!("\"{STRING_INNER}{run}\""));
        }

        if let Some(pattern) = schema.get("pattern").and_then(Value::as_str) {
            // The pattern constrains the content between the quotes;
            // anchors are implied by full-match semantics.
            let bare = pattern
                .strip_prefix('^')
                .and_then(|p| p.strip_suffix('$'))
                .unwrap_or(pattern);
            return Ok(format!("(\"{bare}\")"));
        }

        if let Some(format) = schema.get("format").and_then(Value::as_str) {
            return match FormatType::from_name(format) {
                Some(known) => Ok(known.regex().to_string()),
                None => Err(SchemaError::UnsupportedStringFormat(Box::from(format))),
            };
        }

        Ok(JsonType::String.regex().to_string())
    }

    fn integer_type(&mut self, schema: &serde_json::Map<String, Value>) -> Result<String> {
        let min = schema.get("minDigits").and_then(Value::as_u64);
        let max = schema.get("maxDigits").and_then(Value::as_u64);
        if min.is_none() && max.is_none() {
            return Ok(JsonType::Integer.regex().to_string());
        }
        // The nonzero lead digit is spelled outside the run.
        let run = digit_run(min, max, 1, "*")?;
        Ok(format!("(-)?(0|[1-9][0-9]{run})"))
    }

    fn number_type(&mut self, schema: &serde_json::Map<String, Value>) -> Result<String> {
        let bound = |key: &str| schema.get(key).and_then(Value::as_u64);
        let bounded = [
            "minDigitsInteger",
            "maxDigitsInteger",
            "minDigitsFraction",
            "maxDigitsFraction",
            "minDigitsExponent",
            "maxDigitsExponent",
        ]
        .iter()
        .any(|key| schema.contains_key(*key));
        if !bounded {
            return Ok(JsonType::Number.regex().to_string());
        }

        let whole = digit_run(bound("minDigitsInteger"), bound("maxDigitsInteger"), 1, "*")?;
        let fraction = digit_run(
            bound("minDigitsFraction"),
            bound("maxDigitsFraction"),
            0,
            "+",
        )?;
        let exponent = digit_run(
            bound("minDigitsExponent"),
            bound("maxDigitsExponent"),
            0,
            "+",
        )?;
        Ok(format!(
            r"((-)?(0|[1-9][0-9]{whole}))(\.[0-9]{fraction})?([eE][+-][0-9]{exponent})?"
        ))
    }

    // ---- literals ---------------------------------------------------------

    /// A literal JSON value, regex-escaped. Composite literals recurse so
    /// that whitespace stays flexible inside them.
    fn literal(&mut self, value: &Value) -> Result<String> {
        match value {
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
                let json_string = serde_json::to_string(value)?;
                Ok(escape(&json_string))
            }
            Value::Array(items) => {
                let rendered = items
                    .iter()
                    .map(|item| self.literal(item))
                    .collect::<Result<Vec<_>>>()?;
                Ok(self.bracketed(&rendered.join(&format!("{0},{0}", self.ws)), '[', ']'))
            }
            Value::Object(fields) => {
                let rendered = fields
                    .iter()
                    .map(|(name, field)| {
                        let field_regex = self.literal(field)?;
                        Ok(self.member(&escape(name), &field_regex))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(self.bracketed(&rendered.join(&format!("{0},{0}", self.ws)), '{', '}'))
            }
        }
    }

    // ---- containers -------------------------------------------------------

    /// `inner` surrounded by escaped brackets with the whitespace pattern
    /// inside them.
    fn bracketed(&self, inner: &str, open: char, close: char) -> String {
        if inner.is_empty() {
            return format!(r"\{open}{0}\{close}", self.ws);
        }
        format!(r"\{open}{0}{inner}{0}\{close}", self.ws)
    }

    /// `"name"<ws>:<ws>value` — one object member.
    fn member(&self, name_regex: &str, value_regex: &str) -> String {
        format!("\"{name_regex}\"{0}:{0}{value_regex}", self.ws)
    }

    /// A comma-separated run of `element`, `min`..=`max` occurrences, with
    /// the first element spelled outside the repetition. `max` must not be
    /// zero; the caller renders the empty container.
    fn comma_run(&self, element: &str, min: u64, max: Option<u64>) -> String {
        let rest = match max {
            Some(hi) => format!("{{{},{}}}", min.saturating_sub(1), hi.saturating_sub(1)),
            None => format!("{{{},}}", min.saturating_sub(1)),
        };
        let run = format!("(({element})({0},{0}({element})){rest})", self.ws);
        if min == 0 {
            format!("{run}?")
        } else {
            run
        }
    }

    fn array_type(&mut self, schema: &serde_json::Map<String, Value>) -> Result<String> {
        let min = schema
            .get("minItems")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let max = schema.get("maxItems").and_then(Value::as_u64);
        if max == Some(0) {
            return Ok(self.bracketed("", '[', ']'));
        }

        let element = match schema.get("items") {
            Some(items) => self.translate(items)?,
            None => self.unconstrained_value(UNCONSTRAINED_NESTING),
        };
        Ok(self.bracketed(&self.comma_run(&element, min, max), '[', ']'))
    }

    fn object_type(&mut self, schema: &serde_json::Map<String, Value>) -> Result<String> {
        let min = schema
            .get("minProperties")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let max = schema.get("maxProperties").and_then(Value::as_u64);
        if max == Some(0) {
            return Ok(self.bracketed("", '{', '}'));
        }

        let value = match schema.get("additionalProperties") {
            None | Some(Value::Bool(true)) => self.unconstrained_value(UNCONSTRAINED_NESTING),
            Some(Value::Bool(false)) => return Ok(self.bracketed("", '{', '}')),
            Some(value_schema) => self.translate(value_schema)?,
        };
        let pair = format!("{STRING}{0}:{0}{value}", self.ws);
        Ok(self.bracketed(&self.comma_run(&pair, min, max), '{', '}'))
    }

    /// Any JSON value, with containers allowed to nest `nesting` levels.
    fn unconstrained_value(&self, nesting: u64) -> String {
        let mut branches = vec![
            BOOLEAN.to_string(),
            NULL.to_string(),
            NUMBER.to_string(),
            STRING.to_string(),
        ];
        if nesting > 0 {
            let inner = self.unconstrained_value(nesting - 1);
            branches.push(self.bracketed(&self.comma_run(&inner, 0, None), '[', ']'));
            let pair = format!("{STRING}{0}:{0}{inner}", self.ws);
            branches.push(self.bracketed(&self.comma_run(&pair, 0, None), '{', '}'));
        }
        any_of_patterns(branches)
    }

    fn tuple(&mut self, schema: &serde_json::Map<String, Value>) -> Result<String> {
        let elements =
            self.translate_list(schema, "prefixItems", SchemaError::PrefixItemsMustBeAnArray)?;
        let inner = elements.join(&format!("{0},{0}", self.ws));
        Ok(self.bracketed(&inner, '[', ']'))
    }

    // ---- objects with declared properties ---------------------------------

    fn properties(&mut self, schema: &serde_json::Map<String, Value>) -> Result<String> {
        let declared = schema
            .get("properties")
            .and_then(Value::as_object)
            .ok_or(SchemaError::PropertiesNotFound)?;
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        // Members in declaration order; a member whose value overflows the
        // reference budget is dropped, closing the unrolling there.
        let mut members = Vec::with_capacity(declared.len());
        for (name, value_schema) in declared {
            let value_regex = match self.translate(value_schema) {
                Ok(regex) => regex,
                Err(e) if e.is_recursion_limit() => continue,
                Err(e) => return Err(e),
            };
            let member = format!("{0}{1}", self.ws, self.member(&escape(name), &value_regex));
            members.push((member, required.contains(&name.as_str())));
        }

        let last_required = members.iter().rposition(|(_, required)| *required);
        let inner = match last_required {
            Some(last) => self.members_with_anchor(&members, last),
            None => self.members_all_optional(&members),
        };
        Ok(format!(r"\{{{inner}{0}\}}", self.ws))
    }

    /// At least one member is required: everything before the last required
    /// member carries a trailing comma, everything after a leading one, and
    /// optional members wrap comma and all.
    fn members_with_anchor(&self, members: &[(String, bool)], last: usize) -> String {
        let mut inner = String::new();
        for (i, (member, required)) in members.iter().enumerate() {
            let piece = if i < last {
                format!("{member}{0},", self.ws)
            } else if i > last {
                format!("{0},{member}", self.ws)
            } else {
                member.clone()
            };
            inner += &if *required { piece } else { optional(&piece) };
        }
        inner
    }

    /// No member is required: any subset may appear, but commas still have
    /// to land between present members. Enumerate each member as the one
    /// guaranteed present, with its neighbors optional around it.
    fn members_all_optional(&self, members: &[(String, bool)]) -> String {
        let mut branches = Vec::with_capacity(members.len());
        for (anchor, (present, _)) in members.iter().enumerate() {
            let mut branch = String::new();
            for (earlier, _) in &members[..anchor] {
                branch += &optional(&format!("{earlier}{0},", self.ws));
            }
            branch += present;
            for (later, _) in &members[anchor + 1..] {
                branch += &optional(&format!("{0},{later}", self.ws));
            }
            branches.push(branch);
        }
        optional(&branches.join("|"))
    }

    // ---- references -------------------------------------------------------

    fn reference(&mut self, schema: &serde_json::Map<String, Value>) -> Result<String> {
        let ref_path = schema["$ref"]
            .as_str()
            .ok_or(SchemaError::RefMustBeAString)?;
        if self.ref_expansions >= self.max_ref_expansions {
            return Err(SchemaError::RefRecursionLimitReached(
                self.max_ref_expansions,
            ));
        }
        let target = self.resolve(ref_path)?;

        self.ref_expansions += 1;
        let result = self.translate(target);
        self.ref_expansions -= 1;
        result
    }

    /// Resolves a local `$ref` as a JSON pointer into the root document.
    fn resolve(&self, ref_path: &str) -> Result<&'a Value> {
        if ref_path.bytes().filter(|&b| b == b'#').count() > 1 {
            return Err(SchemaError::InvalidReferenceFormat(Box::from(ref_path)));
        }
        let (base, fragment) = match ref_path.split_once('#') {
            Some((base, fragment)) => (base, fragment),
            // A bare path is a fragment of the local document.
            None => ("", ref_path),
        };

        if !base.is_empty() {
            let own_id = self.root.get("$id").and_then(Value::as_str);
            if own_id != Some(base) {
                return Err(SchemaError::ExternalReferencesNotSupported(Box::from(
                    ref_path,
                )));
            }
        }
        if fragment.is_empty() {
            return Ok(self.root);
        }

        let pointer = if fragment.starts_with('/') {
            fragment.to_string()
        } else {
            format!("/{fragment}")
        };
        self.root
            .pointer(&pointer)
            .ok_or_else(|| SchemaError::InvalidReferencePath(Box::from(fragment)))
    }
}

/// Repetition suffix for a digit run whose bounds count the whole group's
/// digits, `spelled` of which are written outside the run. `free` is the
/// suffix when no bound is given.
fn digit_run(min: Option<u64>, max: Option<u64>, spelled: u64, free: &str) -> Result<String> {
    if let (Some(lo), Some(hi)) = (min, max) {
        if hi < lo {
            return Err(SchemaError::MaxBoundError);
        }
    }
    if min.is_none() && max.is_none() {
        return Ok(free.to_string());
    }
    let lo = min.map_or(0, |m| m.saturating_sub(spelled));
    Ok(match max {
        Some(hi) => format!("{{{lo},{}}}", hi.saturating_sub(spelled)),
        None => format!("{{{lo},}}"),
    })
}
