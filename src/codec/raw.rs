//! Syntactic layer of the value grammar.
//!
//! A [`RawValue`] is recognised purely from its leading punctuation or
//! quoting; no target type is needed. Conversion to native values happens
//! in [`super::FromRaw`].

use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;

use crate::error::{Result, SpecError};

/// Placeholder written when a replayed call had no usable return value.
pub const MISSING_VALUE: &str = "<missing_value>";

/// Literal used for absent values.
pub const NULL: &str = "null";

/// Canonical timestamp layout (`yyyy-MM-dd HH:mm:ss`).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Layout older specifications used for timestamps logged as call arguments.
pub const LEGACY_TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?|NaN|-?Infinity)$")
        .expect("number pattern is valid")
});

static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$").expect("timestamp pattern is valid")
});

static LEGACY_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{2}/\d{2}/\d{4} \d{2}:\d{2}:\d{2}$").expect("timestamp pattern is valid")
});

/// One value of the specification grammar, tagged by its syntax.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// `null`
    Null,
    /// `"text"` (content between the outer quotes).
    Str(String),
    /// `True` / `False`
    Bool(bool),
    /// Invariant-culture number text, kept verbatim.
    Number(String),
    /// `yyyy-MM-dd HH:mm:ss` (or the legacy `MM/dd/yyyy HH:mm:ss`).
    Timestamp(NaiveDateTime),
    /// `[v1,v2,...]`
    List(Vec<RawValue>),
    /// `{k1: v1, k2: v2}`
    Map(Vec<(RawValue, RawValue)>),
    /// `<id:NAME>`
    ObjectRef(String),
    /// `<unknown>` or `<unknown:TYPE>`
    Unknown(Option<String>),
    /// `<missing_value>`
    Missing,
    /// Unquoted text that matches no other variant.
    Bare(String),
}

impl RawValue {
    /// Parse the text of a single value.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Format`] for unterminated strings, unbalanced
    /// composites, malformed `<id:>` references and invalid timestamps.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        match text {
            NULL => return Ok(Self::Null),
            MISSING_VALUE => return Ok(Self::Missing),
            "True" => return Ok(Self::Bool(true)),
            "False" => return Ok(Self::Bool(false)),
            _ => {}
        }

        if let Some(rest) = text.strip_prefix('"') {
            let inner = rest
                .strip_suffix('"')
                .ok_or_else(|| SpecError::format(format!("unterminated string: {text}")))?;
            return Ok(Self::Str(inner.to_string()));
        }
        if let Some(rest) = text.strip_prefix('[') {
            let inner = rest
                .strip_suffix(']')
                .ok_or_else(|| SpecError::format(format!("list is missing its closing ']': {text}")))?;
            return split_top_level(inner, ",")?
                .into_iter()
                .map(Self::parse)
                .collect::<Result<Vec<_>>>()
                .map(Self::List);
        }
        if let Some(rest) = text.strip_prefix('{') {
            let inner = rest
                .strip_suffix('}')
                .ok_or_else(|| SpecError::format(format!("map is missing its closing '}}': {text}")))?;
            let mut pairs = Vec::new();
            for item in split_top_level(inner, ",")? {
                let (key, value) = split_pair(item)?;
                pairs.push((Self::parse(key)?, Self::parse(value)?));
            }
            return Ok(Self::Map(pairs));
        }
        if text.starts_with('<') {
            return parse_token(text);
        }
        if TIMESTAMP.is_match(text) {
            return parse_timestamp(text, TIMESTAMP_FORMAT);
        }
        if LEGACY_TIMESTAMP.is_match(text) {
            return parse_timestamp(text, LEGACY_TIMESTAMP_FORMAT);
        }
        if NUMBER.is_match(text) {
            return Ok(Self::Number(text.to_string()));
        }
        Ok(Self::Bare(text.to_string()))
    }

    /// Returns the first `<unknown...>` token inside this value, if any.
    #[must_use]
    pub fn find_unknown(&self) -> Option<String> {
        match self {
            Self::Unknown(_) => Some(self.to_string()),
            Self::List(items) => items.iter().find_map(Self::find_unknown),
            Self::Map(pairs) => pairs.iter().find_map(|(k, v)| k.find_unknown().or_else(|| v.find_unknown())),
            _ => None,
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str(NULL),
            Self::Str(s) => write!(f, "\"{s}\""),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Number(n) | Self::Bare(n) => f.write_str(n),
            Self::Timestamp(t) => write!(f, "{}", t.format(TIMESTAMP_FORMAT)),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(pairs) => {
                f.write_str("{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
            Self::ObjectRef(id) => write!(f, "<id:{id}>"),
            Self::Unknown(None) => f.write_str("<unknown>"),
            Self::Unknown(Some(ty)) => write!(f, "<unknown:{ty}>"),
            Self::Missing => f.write_str(MISSING_VALUE),
        }
    }
}

fn parse_token(text: &str) -> Result<RawValue> {
    if text == "<unknown>" {
        return Ok(RawValue::Unknown(None));
    }
    if let Some(ty) = text.strip_prefix("<unknown:").and_then(|t| t.strip_suffix('>')) {
        return Ok(RawValue::Unknown(Some(ty.to_string())));
    }
    if let Some(rest) = text.strip_prefix("<id:") {
        return match rest.strip_suffix('>') {
            Some(id) if !id.is_empty() && !id.contains(['<', '>']) => {
                Ok(RawValue::ObjectRef(id.to_string()))
            }
            _ => Err(SpecError::format(format!("malformed object reference: {text}"))),
        };
    }
    Err(SpecError::format(format!("unrecognised token: {text}")))
}

fn parse_timestamp(text: &str, layout: &str) -> Result<RawValue> {
    NaiveDateTime::parse_from_str(text, layout)
        .map(RawValue::Timestamp)
        .map_err(|e| SpecError::format(format!("invalid timestamp {text}: {e}")))
}

/// Byte offsets of `pat` occurrences outside quotes and nested delimiters.
fn top_level_matches(text: &str, pat: &str) -> Result<Vec<usize>> {
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut hits = Vec::new();
    for (idx, ch) in text.char_indices() {
        if in_quote {
            if ch == '"' {
                in_quote = false;
            }
            continue;
        }
        match ch {
            '"' => in_quote = true,
            '[' | '{' | '<' => depth += 1,
            ']' | '}' | '>' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| SpecError::format(format!("unbalanced '{ch}' in {text}")))?;
            }
            _ if depth == 0 && text[idx..].starts_with(pat) => hits.push(idx),
            _ => {}
        }
    }
    if in_quote || depth != 0 {
        return Err(SpecError::format(format!("unbalanced quotes or delimiters in {text}")));
    }
    Ok(hits)
}

/// Split on `sep` at nesting depth zero, trimming each part.
pub(crate) fn split_top_level<'t>(text: &'t str, sep: &str) -> Result<Vec<&'t str>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut parts = Vec::new();
    let mut start = 0;
    for hit in top_level_matches(text, sep)? {
        parts.push(text[start..hit].trim());
        start = hit + sep.len();
    }
    parts.push(text[start..].trim());
    Ok(parts)
}

fn split_pair(item: &str) -> Result<(&str, &str)> {
    let hit = top_level_matches(item, ": ")?
        .into_iter()
        .next()
        .ok_or_else(|| SpecError::format(format!("map entry has no 'key: value' separator: {item}")))?;
    Ok((item[..hit].trim(), item[hit + 2..].trim()))
}

/// Structural check applied to every value text when a specification is
/// parsed: unquoted `<unknown...>` tokens and malformed `<id:>` references
/// are rejected.
pub(crate) fn check_sentinels(text: &str) -> Result<()> {
    let mut in_quote = false;
    for (idx, ch) in text.char_indices() {
        if ch == '"' {
            in_quote = !in_quote;
            continue;
        }
        if in_quote || ch != '<' {
            continue;
        }
        let rest = &text[idx..];
        if rest.starts_with("<unknown") {
            let end = rest.find('>').map_or(rest.len(), |e| e + 1);
            return Err(SpecError::UnknownObject(rest[..end].to_string()));
        }
        if let Some(tail) = rest.strip_prefix("<id:") {
            match tail.find('>') {
                Some(end) if end > 0 && !tail[..end].contains('<') => {}
                _ => {
                    return Err(SpecError::format(format!("malformed object reference in {text}")));
                }
            }
        }
    }
    Ok(())
}
