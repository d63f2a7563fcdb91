//! Structural and content validation of token list documents
//!
//! The validator walks an untrusted [`serde_json::Value`] and records every
//! rule it breaks as a [`Violation`] (JSON pointer + message). Independent
//! branches are always checked in full, so a single run reports every
//! problem in the document rather than the first one found.
//!
//! Two constraints are deliberately not enforced here: token `tags` are not
//! checked against the document's `tags` map, and `(chainId, address)` pairs
//! are not required to be unique.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

use crate::tokenlist::TokenList;

pub const MAX_TOKENS: usize = 10_000;
pub const MAX_KEYWORDS: usize = 20;
pub const MAX_LIST_TAGS: usize = 20;
pub const MAX_TOKEN_TAGS: usize = 10;
pub const MAX_EXTENSION_ENTRIES: usize = 10;
pub const MAX_EXTENSION_DEPTH: usize = 3;

static LIST_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_ ]+$").expect("built-in pattern"));
static KEYWORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_ ]+$").expect("built-in pattern"));
static TOKEN_MAP_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+_0x[a-fA-F0-9]{40}$").expect("built-in pattern"));
static ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[a-fA-F0-9]{40}$").expect("built-in pattern"));
static TOKEN_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \S]*$").expect("built-in pattern"));
static TOKEN_SYMBOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^$|\S$").expect("built-in pattern"));
static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("built-in pattern"));
static TAG_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ A-Za-z0-9_]+$").expect("built-in pattern"));
// `YYYY-MM-DDTHH:MM:SS[.fff]Z`, UTC only
static TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?Z$").expect("built-in pattern")
});
static TAG_DESCRIPTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ A-Za-z0-9_.,:\s]+$").expect("built-in pattern"));

const LIST_FIELDS: &[&str] = &[
    "name",
    "timestamp",
    "version",
    "tokens",
    "tokenMap",
    "keywords",
    "tags",
    "logoURI",
];
const TOKEN_FIELDS: &[&str] = &[
    "chainId",
    "address",
    "decimals",
    "name",
    "symbol",
    "logoURI",
    "tags",
    "extensions",
];
const VERSION_FIELDS: &[&str] = &["major", "minor", "patch"];
const TAG_FIELDS: &[&str] = &["name", "description"];

/// A single rule violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON pointer to the offending value (empty for the document root)
    pub path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Every violation found in one validation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violations(Vec<Violation>);

impl Violations {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    /// Violations reported for exactly this path.
    pub fn at<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a Violation> + 'a {
        self.0.iter().filter(move |v| v.path == path)
    }

}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  {v}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Violations {}

/// Validate an untrusted value and, if it passes, return the typed document.
pub fn validate(value: &Value) -> Result<TokenList, Violations> {
    let mut checker = Checker::default();
    checker.document(value);

    if !checker.violations.is_empty() {
        return Err(Violations(checker.violations));
    }

    let mut typed = value.clone();
    normalize_integers(&mut typed);
    serde_json::from_value(typed).map_err(|e| {
        Violations(vec![Violation {
            path: String::new(),
            message: format!("Document could not be decoded: {e}"),
        }])
    })
}

/// Rewrite integral floats (`6.0`) in integer fields as integers so the
/// typed decode accepts them.
fn normalize_integers(document: &mut Value) {
    fn fix(value: Option<&mut Value>) {
        let Some(value) = value.filter(|v| v.is_f64()) else {
            return;
        };
        if let Some(f) = value.as_f64() {
            if f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64 {
                *value = Value::from(f as u64);
            }
        }
    }

    fn fix_token(token: &mut Value) {
        fix(token.get_mut("chainId"));
        fix(token.get_mut("decimals"));
    }

    if let Some(version) = document.get_mut("version") {
        for field in VERSION_FIELDS {
            fix(version.get_mut(*field));
        }
    }
    if let Some(tokens) = document.get_mut("tokens").and_then(Value::as_array_mut) {
        tokens.iter_mut().for_each(fix_token);
    }
    if let Some(map) = document.get_mut("tokenMap").and_then(Value::as_object_mut) {
        map.values_mut().for_each(fix_token);
    }
}

/// Validate a single token value in isolation.
///
/// Paths in the returned violations are relative to the token.
pub fn validate_token(value: &Value) -> Result<(), Violations> {
    let mut checker = Checker::default();
    checker.token("", value);
    if checker.violations.is_empty() {
        Ok(())
    } else {
        Err(Violations(checker.violations))
    }
}

/// Returns true if `id` is a well-formed tag identifier.
pub fn is_tag_identifier(id: &str) -> bool {
    (1..=10).contains(&id.chars().count()) && IDENTIFIER_RE.is_match(id)
}

/// Check a tag definition's name and description, returning the violations.
pub fn validate_tag_definition(name: &str, description: &str) -> Result<(), Violations> {
    let mut checker = Checker::default();
    let value = serde_json::json!({ "name": name, "description": description });
    checker.tag_definition("", &value);
    if checker.violations.is_empty() {
        Ok(())
    } else {
        Err(Violations(checker.violations))
    }
}

fn join(path: &str, segment: &str) -> String {
    let escaped = segment.replace('~', "~0").replace('/', "~1");
    format!("{path}/{escaped}")
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Length and pattern rule for a string field
struct StrRule<'a> {
    min: Option<(usize, &'static str)>,
    max: Option<(usize, &'static str)>,
    pattern: Option<(&'a Regex, &'static str)>,
}

#[derive(Default)]
struct Checker {
    violations: Vec<Violation>,
}

impl Checker {
    fn push(&mut self, path: &str, message: impl Into<String>) {
        self.violations.push(Violation {
            path: path.to_string(),
            message: message.into(),
        });
    }

    fn object<'v>(&mut self, path: &str, value: &'v Value) -> Option<&'v Map<String, Value>> {
        match value.as_object() {
            Some(obj) => Some(obj),
            None => {
                self.push(path, format!("Expected object, received {}", type_name(value)));
                None
            }
        }
    }

    fn closed(&mut self, path: &str, obj: &Map<String, Value>, allowed: &[&str]) {
        for key in obj.keys() {
            if !allowed.contains(&key.as_str()) {
                self.push(path, format!("Unrecognized key: '{key}'"));
            }
        }
    }

    fn required<'v>(
        &mut self,
        path: &str,
        obj: &'v Map<String, Value>,
        key: &str,
    ) -> Option<&'v Value> {
        let value = obj.get(key);
        if value.is_none() {
            self.push(&join(path, key), "Required");
        }
        value
    }

    fn string<'v>(&mut self, path: &str, value: &'v Value, rule: &StrRule) -> Option<&'v str> {
        let Some(s) = value.as_str() else {
            self.push(path, format!("Expected string, received {}", type_name(value)));
            return None;
        };

        let len = s.chars().count();
        let mut ok = true;
        if let Some((min, message)) = rule.min {
            if len < min {
                self.push(path, message);
                ok = false;
            }
        }
        if let Some((max, message)) = rule.max {
            if len > max {
                self.push(path, message);
                ok = false;
            }
        }
        if let Some((re, message)) = rule.pattern {
            if !re.is_match(s) {
                self.push(path, message);
                ok = false;
            }
        }
        ok.then_some(s)
    }

    fn integer(
        &mut self,
        path: &str,
        value: &Value,
        min: (i128, &str),
        max: Option<(i128, &str)>,
    ) {
        let Some(n) = value.as_number() else {
            self.push(path, format!("Expected number, received {}", type_name(value)));
            return;
        };

        let int = n
            .as_u64()
            .map(i128::from)
            .or_else(|| n.as_i64().map(i128::from))
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i128));
        let Some(int) = int else {
            self.push(path, "Expected integer, received float");
            return;
        };

        if int < min.0 {
            self.push(path, min.1);
        }
        if let Some((max, message)) = max {
            if int > max {
                self.push(path, message);
            }
        }
    }

    fn url(&mut self, path: &str, value: &Value) {
        match value.as_str() {
            Some(s) if url::Url::parse(s).is_ok() => {}
            Some(_) => self.push(path, "Must be a valid URL"),
            None => self.push(path, format!("Expected string, received {}", type_name(value))),
        }
    }

    fn document(&mut self, value: &Value) {
        let Some(obj) = self.object("", value) else {
            return;
        };
        self.closed("", obj, LIST_FIELDS);

        if let Some(name) = self.required("", obj, "name") {
            self.string(
                "/name",
                name,
                &StrRule {
                    min: Some((1, "Name must be at least 1 character long")),
                    max: Some((30, "Name must be no more than 30 characters long")),
                    pattern: Some((
                        &LIST_NAME_RE,
                        "Name can only contain letters, numbers, underscores, and spaces",
                    )),
                },
            );
        }

        if let Some(timestamp) = self.required("", obj, "timestamp") {
            match timestamp.as_str() {
                Some(s)
                    if TIMESTAMP_RE.is_match(s)
                        && chrono::DateTime::parse_from_rfc3339(s).is_ok() => {}
                Some(_) => self.push(
                    "/timestamp",
                    "Timestamp must be a valid ISO 8601 date-time string",
                ),
                None => self.push(
                    "/timestamp",
                    format!("Expected string, received {}", type_name(timestamp)),
                ),
            }
        }

        if let Some(version) = self.required("", obj, "version") {
            self.version("/version", version);
        }

        if let Some(tokens) = self.required("", obj, "tokens") {
            self.tokens("/tokens", tokens);
        }

        if let Some(token_map) = obj.get("tokenMap") {
            self.token_map("/tokenMap", token_map);
        }

        if let Some(keywords) = obj.get("keywords") {
            self.keywords("/keywords", keywords);
        }

        if let Some(tags) = obj.get("tags") {
            self.tags("/tags", tags);
        }

        if let Some(logo) = obj.get("logoURI") {
            self.url("/logoURI", logo);
        }
    }

    fn version(&mut self, path: &str, value: &Value) {
        let Some(obj) = self.object(path, value) else {
            return;
        };
        self.closed(path, obj, VERSION_FIELDS);

        for field in VERSION_FIELDS {
            if let Some(part) = self.required(path, obj, field) {
                self.integer(
                    &join(path, field),
                    part,
                    (0, "Version numbers must be at least 0"),
                    None,
                );
            }
        }
    }

    fn tokens(&mut self, path: &str, value: &Value) {
        let Some(tokens) = value.as_array() else {
            self.push(path, format!("Expected array, received {}", type_name(value)));
            return;
        };

        if tokens.is_empty() {
            self.push(path, "At least one token is required");
        }
        if tokens.len() > MAX_TOKENS {
            self.push(path, "Maximum of 10,000 tokens allowed");
        }

        for (i, token) in tokens.iter().enumerate() {
            self.token(&join(path, &i.to_string()), token);
        }
    }

    fn token_map(&mut self, path: &str, value: &Value) {
        let Some(map) = self.object(path, value) else {
            return;
        };

        if map.is_empty() {
            self.push(path, "Token map must have at least one entry");
        }
        if map.len() > MAX_TOKENS {
            self.push(path, "Maximum of 10,000 token map entries allowed");
        }

        for (key, token) in map {
            let entry_path = join(path, key);
            if !TOKEN_MAP_KEY_RE.is_match(key) {
                self.push(
                    &entry_path,
                    "Token map key must be in format 'chainId_tokenAddress'",
                );
            }
            self.token(&entry_path, token);
        }
    }

    fn keywords(&mut self, path: &str, value: &Value) {
        let Some(keywords) = value.as_array() else {
            self.push(path, format!("Expected array, received {}", type_name(value)));
            return;
        };

        if keywords.len() > MAX_KEYWORDS {
            self.push(path, "Maximum of 20 keywords allowed");
        }

        let rule = StrRule {
            min: Some((1, "Keyword must be at least 1 character long")),
            max: Some((20, "Keyword must be no more than 20 characters long")),
            pattern: Some((
                &KEYWORD_RE,
                "Keyword can only contain letters, numbers, underscores, and spaces",
            )),
        };
        let mut seen = HashSet::new();
        let mut unique = true;
        for (i, keyword) in keywords.iter().enumerate() {
            self.string(&join(path, &i.to_string()), keyword, &rule);
            if let Some(s) = keyword.as_str() {
                unique &= seen.insert(s);
            }
        }
        if !unique {
            self.push(path, "Keywords must be unique");
        }
    }

    fn tags(&mut self, path: &str, value: &Value) {
        let Some(tags) = self.object(path, value) else {
            return;
        };

        if tags.len() > MAX_LIST_TAGS {
            self.push(path, "Maximum of 20 tags allowed");
        }

        for (id, definition) in tags {
            let entry_path = join(path, id);
            self.tag_identifier(&entry_path, id);
            self.tag_definition(&entry_path, definition);
        }
    }

    fn tag_identifier(&mut self, path: &str, id: &str) {
        let len = id.chars().count();
        if len < 1 {
            self.push(path, "Tag identifier must be at least 1 character long");
        }
        if len > 10 {
            self.push(path, "Tag identifier must be at most 10 characters long");
        }
        if !IDENTIFIER_RE.is_match(id) {
            self.push(
                path,
                "Tag identifier must only contain alphanumeric characters and underscores",
            );
        }
    }

    fn tag_definition(&mut self, path: &str, value: &Value) {
        let Some(obj) = self.object(path, value) else {
            return;
        };
        self.closed(path, obj, TAG_FIELDS);

        if let Some(name) = self.required(path, obj, "name") {
            self.string(
                &join(path, "name"),
                name,
                &StrRule {
                    min: Some((1, "Name must be at least 1 character long")),
                    max: Some((20, "Name must be no more than 20 characters long")),
                    pattern: Some((
                        &TAG_NAME_RE,
                        "Name can only contain letters, numbers, underscores, and spaces",
                    )),
                },
            );
        }

        if let Some(description) = self.required(path, obj, "description") {
            self.string(
                &join(path, "description"),
                description,
                &StrRule {
                    min: Some((1, "Description must be at least 1 character long")),
                    max: Some((200, "Description must be no more than 200 characters long")),
                    pattern: Some((
                        &TAG_DESCRIPTION_RE,
                        "Description can only contain letters, numbers, underscores, spaces, periods, commas, and colons",
                    )),
                },
            );
        }
    }

    fn token(&mut self, path: &str, value: &Value) {
        let Some(obj) = self.object(path, value) else {
            return;
        };
        self.closed(path, obj, TOKEN_FIELDS);

        if let Some(chain_id) = self.required(path, obj, "chainId") {
            self.integer(
                &join(path, "chainId"),
                chain_id,
                (1, "Chain ID must be at least 1"),
                None,
            );
        }

        if let Some(address) = self.required(path, obj, "address") {
            self.string(
                &join(path, "address"),
                address,
                &StrRule {
                    min: None,
                    max: None,
                    pattern: Some((
                        &ADDRESS_RE,
                        "Address must be a valid 40-character hexadecimal address prefixed with 0x",
                    )),
                },
            );
        }

        if let Some(decimals) = self.required(path, obj, "decimals") {
            self.integer(
                &join(path, "decimals"),
                decimals,
                (0, "Decimals must be at least 0"),
                Some((255, "Decimals must be no more than 255")),
            );
        }

        if let Some(name) = self.required(path, obj, "name") {
            self.string(
                &join(path, "name"),
                name,
                &StrRule {
                    min: None,
                    max: Some((60, "Name must be no more than 60 characters")),
                    pattern: Some((
                        &TOKEN_NAME_RE,
                        "Name must be either empty or contain non-whitespace characters",
                    )),
                },
            );
        }

        if let Some(symbol) = self.required(path, obj, "symbol") {
            self.string(
                &join(path, "symbol"),
                symbol,
                &StrRule {
                    min: None,
                    max: Some((20, "Symbol must be no more than 20 characters")),
                    pattern: Some((
                        &TOKEN_SYMBOL_RE,
                        "Symbol must be either empty or contain non-whitespace characters",
                    )),
                },
            );
        }

        if let Some(logo) = obj.get("logoURI") {
            self.url(&join(path, "logoURI"), logo);
        }

        if let Some(tags) = obj.get("tags") {
            let tags_path = join(path, "tags");
            match tags.as_array() {
                Some(tags) => {
                    if tags.len() > MAX_TOKEN_TAGS {
                        self.push(&tags_path, "Maximum of 10 tags allowed");
                    }
                    for (i, tag) in tags.iter().enumerate() {
                        let tag_path = join(&tags_path, &i.to_string());
                        match tag.as_str() {
                            Some(id) => self.tag_identifier(&tag_path, id),
                            None => self.push(
                                &tag_path,
                                format!("Expected string, received {}", type_name(tag)),
                            ),
                        }
                    }
                }
                None => self.push(
                    &tags_path,
                    format!("Expected array, received {}", type_name(tags)),
                ),
            }
        }

        if let Some(extensions) = obj.get("extensions") {
            self.extension_map(&join(path, "extensions"), extensions, 1);
        }
    }

    fn extension_map(&mut self, path: &str, value: &Value, depth: usize) {
        let Some(map) = self.object(path, value) else {
            return;
        };

        if map.len() > MAX_EXTENSION_ENTRIES {
            if depth == 1 {
                self.push(path, "ExtensionMap cannot have more than 10 properties");
            } else {
                self.push(path, "Object cannot have more than 10 properties");
            }
        }

        for (key, entry) in map {
            let entry_path = join(path, key);
            let len = key.chars().count();
            if len < 1 {
                self.push(&entry_path, "Extension identifier must be at least 1 character long");
            }
            if len > 40 {
                self.push(&entry_path, "Extension identifier must be at most 40 characters long");
            }
            if !IDENTIFIER_RE.is_match(key) {
                self.push(
                    &entry_path,
                    "Extension identifier must only contain alphanumeric characters and underscores",
                );
            }
            self.extension_value(&entry_path, entry, depth);
        }
    }

    fn extension_value(&mut self, path: &str, value: &Value, depth: usize) {
        match value {
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
            Value::String(s) => {
                let len = s.chars().count();
                if len < 1 {
                    self.push(path, "Extension value must be at least 1 character long");
                }
                if len > 42 {
                    self.push(path, "Extension value must be at most 42 characters long");
                }
            }
            Value::Object(_) if depth < MAX_EXTENSION_DEPTH => {
                self.extension_map(path, value, depth + 1);
            }
            Value::Object(_) => {
                self.push(path, "Extension values may not be nested more than 3 levels deep");
            }
            Value::Array(_) => {
                self.push(path, "Extension values must be a string, number, boolean, null or object");
            }
        }
    }
}
