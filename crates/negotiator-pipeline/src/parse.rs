//! Recovery of structured records from free-form generated text.
//!
//! Generated responses are expected to contain one JSON container, but may
//! wrap it in prose, cut it off mid-way or nest it unevenly. [`parse`] runs a
//! fixed sequence of steps:
//!
//! 1. locate the outermost container of the expected kind
//! 2. if it does not deserialize as found, balance its delimiters, truncating
//!    or appending closers
//! 3. deserialize into a generic JSON value
//! 4. validate the container kind, required keys and typed shape
//! 5. resolve cited knowledge chunks against the current state
//!
//! Any failure in steps 1-4 collapses to the schema's shape-valid fallback.
//! Step 5 only drops individual unresolved items. The caller never sees an
//! error, only a [`ParseReport`] describing what happened.
//!
//! Well-formed text is never balanced. Balancing counts delimiters without
//! regard to string literals, so a brace inside a quoted value of a malformed
//! response can cause lossy truncation.

use std::borrow::Cow;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use negotiator_types::DocumentChunk;

// ---------------------------------------------------------------------------
// Schema description
// ---------------------------------------------------------------------------

/// The top-level JSON container a schema expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Object,
    Array,
}

impl Container {
    fn delimiters(self) -> (u8, u8) {
        match self {
            Container::Object => (b'{', b'}'),
            Container::Array => (b'[', b']'),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Container::Object => "object",
            Container::Array => "array",
        }
    }
}

/// A record type that can be recovered from generated text.
pub trait ResponseSchema: Sized {
    /// Shape deserialized from the response before chunk references are resolved.
    type Wire: DeserializeOwned;

    const NAME: &'static str;
    const CONTAINER: Container;
    /// Keys that must appear on the object, or on every element of an array.
    const REQUIRED_KEYS: &'static [&'static str];
    /// For array schemas, the member holding the array when the response
    /// wraps it in an object.
    const WRAPPER_KEY: Option<&'static str> = None;

    /// Convert the wire shape, resolving chunk citations against `chunks`.
    /// Returns the record and the ids of citations that could not be resolved.
    fn resolve(wire: Self::Wire, chunks: &[Arc<DocumentChunk>]) -> (Self, Vec<String>);

    /// The shape-valid empty record used when recovery fails.
    fn fallback() -> Self;
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// How a parsed value was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ParseStatus {
    /// The response contained a well-formed container.
    Clean,
    /// The container was truncated or unbalanced and had to be repaired.
    Repaired,
    /// Recovery failed; the value is the schema's fallback.
    Fallback { reason: String },
}

impl ParseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseStatus::Clean => "clean",
            ParseStatus::Repaired => "repaired",
            ParseStatus::Fallback { .. } => "fallback",
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ParseStatus::Fallback { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ParseReport<T> {
    pub value: T,
    pub status: ParseStatus,
    /// Chunk ids cited by the response that were not in the current state.
    pub dropped_references: Vec<String>,
}

impl<T> ParseReport<T> {
    /// Status and dropped references as stage trace metrics.
    pub fn metrics(&self) -> serde_json::Map<String, Value> {
        let mut metrics = serde_json::Map::new();
        metrics.insert("parse_status".into(), self.status.as_str().into());
        if let ParseStatus::Fallback { reason } = &self.status {
            metrics.insert("parse_error".into(), reason.clone().into());
        }
        if !self.dropped_references.is_empty() {
            metrics.insert(
                "dropped_references".into(),
                self.dropped_references.clone().into(),
            );
        }
        metrics
    }
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
enum ParseFailure {
    #[error("no JSON {0} found in response")]
    NoContainer(&'static str),

    #[error("invalid JSON: {0}")]
    Syntax(#[source] serde_json::Error),

    #[error("expected a JSON {expected}, found {found}")]
    WrongContainer {
        expected: &'static str,
        found: &'static str,
    },

    #[error("missing required key '{key}'")]
    MissingKey { key: &'static str },

    #[error("missing required key '{key}' in element {index}")]
    MissingElementKey { key: &'static str, index: usize },

    #[error("unexpected shape: {0}")]
    Shape(#[source] serde_json::Error),
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

struct Located<'a> {
    text: &'a str,
    /// Opening delimiter through the end of the response.
    rest: &'a str,
    container: Container,
    truncated: bool,
}

/// First opening delimiter through the last closing delimiter after it.
/// Without a closer the remainder of the text is taken as truncated output.
fn locate_container(raw: &str, container: Container) -> Option<Located<'_>> {
    let (open, close) = container.delimiters();
    let start = raw.bytes().position(|b| b == open)?;
    let rest = &raw[start..];
    Some(match rest.bytes().rposition(|b| b == close) {
        Some(end) => Located {
            text: &rest[..=end],
            rest,
            container,
            truncated: false,
        },
        None => Located {
            text: rest,
            rest,
            container,
            truncated: true,
        },
    })
}

fn locate<T: ResponseSchema>(raw: &str) -> Result<Located<'_>, ParseFailure> {
    locate_container(raw, T::CONTAINER)
        .or_else(|| match (T::CONTAINER, T::WRAPPER_KEY) {
            (Container::Array, Some(_)) => locate_container(raw, Container::Object),
            _ => None,
        })
        .ok_or(ParseFailure::NoContainer(T::CONTAINER.as_str()))
}

/// Repair a located container so it can be deserialized.
///
/// Objects are truncated to the last point where the brace count returns to
/// zero, then given any closers still missing. Arrays count both bracket kinds
/// and, when never closed, are cut back to their last complete element.
pub fn balance(text: &str, container: Container) -> Cow<'_, str> {
    match container {
        Container::Object => balance_object(text),
        Container::Array => balance_array(text),
    }
}

fn balance_object(text: &str) -> Cow<'_, str> {
    let mut depth: i64 = 0;
    let mut last_zero = None;
    for (i, b) in text.bytes().enumerate() {
        if b == b'{' {
            depth += 1;
        } else if b == b'}' {
            depth -= 1;
            if depth == 0 {
                last_zero = Some(i + 1);
            }
        }
    }

    let kept = match last_zero {
        Some(end) => &text[..end],
        None => text,
    };
    close_missing(kept, Container::Object)
}

fn balance_array(text: &str) -> Cow<'_, str> {
    let mut depth: i64 = 0;
    let mut closed = None;
    let mut last_element = None;
    for (i, b) in text.bytes().enumerate() {
        match b {
            b'[' | b'{' => depth += 1,
            b']' | b'}' => {
                depth -= 1;
                match depth {
                    0 => closed = Some(i + 1),
                    1 => last_element = Some(i + 1),
                    _ => {}
                }
            }
            _ => {}
        }
    }

    match (closed, last_element) {
        (Some(end), _) => close_missing(&text[..end], Container::Array),
        (None, Some(end)) => Cow::Owned(format!("{}]", &text[..end])),
        (None, None) => close_missing(text, Container::Array),
    }
}

/// Append one closer for every unmatched opener of `container`'s kind.
fn close_missing(text: &str, container: Container) -> Cow<'_, str> {
    let (open, close) = container.delimiters();
    let opens = text.bytes().filter(|&b| b == open).count();
    let closes = text.bytes().filter(|&b| b == close).count();

    if opens > closes {
        let mut repaired = text.to_string();
        repaired.extend(std::iter::repeat(close as char).take(opens - closes));
        Cow::Owned(repaired)
    } else {
        Cow::Borrowed(text)
    }
}

fn deserialize(text: &str) -> Result<Value, ParseFailure> {
    serde_json::from_str(text).map_err(ParseFailure::Syntax)
}

fn validate<T: ResponseSchema>(value: Value) -> Result<T::Wire, ParseFailure> {
    let value = match (T::CONTAINER, value) {
        (Container::Object, Value::Object(map)) => {
            if let Some(&key) = T::REQUIRED_KEYS.iter().find(|k| !map.contains_key(**k)) {
                return Err(ParseFailure::MissingKey { key });
            }
            Value::Object(map)
        }
        (Container::Array, value) => {
            let items = unwrap_array::<T>(value)?;
            for (index, item) in items.iter().enumerate() {
                let missing = T::REQUIRED_KEYS
                    .iter()
                    .find(|k| item.get(**k).is_none());
                if let Some(&key) = missing {
                    return Err(ParseFailure::MissingElementKey { key, index });
                }
            }
            Value::Array(items)
        }
        (Container::Object, other) => {
            return Err(ParseFailure::WrongContainer {
                expected: "object",
                found: kind_of(&other),
            })
        }
    };
    serde_json::from_value(value).map_err(ParseFailure::Shape)
}

fn unwrap_array<T: ResponseSchema>(value: Value) -> Result<Vec<Value>, ParseFailure> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match T::WRAPPER_KEY.and_then(|k| map.remove(k)) {
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(ParseFailure::WrongContainer {
                expected: "array",
                found: kind_of(&other),
            }),
            None => Err(ParseFailure::WrongContainer {
                expected: "array",
                found: "object",
            }),
        },
        other => Err(ParseFailure::WrongContainer {
            expected: "array",
            found: kind_of(&other),
        }),
    }
}

fn recover<T: ResponseSchema>(raw: &str) -> Result<(T::Wire, bool), ParseFailure> {
    let located = locate::<T>(raw)?;
    if !located.truncated {
        if let Ok(value) = deserialize(located.text) {
            return Ok((validate::<T>(value)?, false));
        }
    }
    // The last `]` of a cut-off array may close a nested list, so arrays are
    // repaired from the whole tail.
    let source = match located.container {
        Container::Object => located.text,
        Container::Array => located.rest,
    };
    let balanced = balance(source, located.container);
    let repaired = located.truncated || balanced.len() != source.len();
    let value = deserialize(&balanced)?;
    Ok((validate::<T>(value)?, repaired))
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Recover a `T` from `raw`, citing chunks from `chunks`. Never fails.
pub fn parse<T: ResponseSchema>(raw: &str, chunks: &[Arc<DocumentChunk>]) -> ParseReport<T> {
    match recover::<T>(raw) {
        Ok((wire, repaired)) => {
            let (value, dropped_references) = T::resolve(wire, chunks);
            for chunk_id in &dropped_references {
                tracing::warn!(schema = T::NAME, chunk_id = %chunk_id, "dropping reference to unknown chunk");
            }
            if repaired {
                tracing::warn!(schema = T::NAME, "repaired malformed response");
            }
            ParseReport {
                value,
                status: if repaired {
                    ParseStatus::Repaired
                } else {
                    ParseStatus::Clean
                },
                dropped_references,
            }
        }
        Err(failure) => {
            let reason = failure.to_string();
            tracing::warn!(
                schema = T::NAME,
                reason = %reason,
                response_chars = raw.len(),
                "could not recover response, using empty record"
            );
            ParseReport {
                value: T::fallback(),
                status: ParseStatus::Fallback { reason },
                dropped_references: Vec::new(),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
