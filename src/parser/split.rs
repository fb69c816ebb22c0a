// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Segment splitting for expression bodies
//!
//! Fast mode splits on raw separator characters and only strips surrounding quotes.
//! Safe mode tracks quotes, so separators inside `"..."` or `'...'` survive, and
//! processes the `\" \' \\ \n \t \r` escapes.

use super::error::{ParseError, ParseResult};
use super::ParseMode;
use crate::model::compare::{number_value, parse_numeric};
use serde_json::Value;

/// Split `input` on `separator` outside of quotes (safe) or everywhere (fast)
pub fn split_top_level(input: &str, separator: char, mode: ParseMode) -> ParseResult<Vec<String>> {
    if mode == ParseMode::Fast {
        return Ok(input.split(separator).map(str::to_string).collect());
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        match (quote, ch) {
            (Some(_), '\\') => {
                current.push(ch);
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            (Some(open), c) if c == open => {
                quote = None;
                current.push(c);
            }
            (None, '"' | '\'') => {
                quote = Some(ch);
                current.push(ch);
            }
            (None, c) if c == separator => parts.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    if quote.is_some() {
        return Err(ParseError::UnterminatedQuote {
            input: input.to_string(),
        });
    }
    parts.push(current);
    Ok(parts)
}

/// Split a segment at the first top-level `??`
pub fn split_default(segment: &str, mode: ParseMode) -> (String, Option<String>) {
    let position = match mode {
        ParseMode::Fast => segment.find("??"),
        ParseMode::Safe => find_unquoted(segment, "??"),
    };
    match position {
        Some(idx) => (
            segment[..idx].to_string(),
            Some(segment[idx + 2..].to_string()),
        ),
        None => (segment.to_string(), None),
    }
}

fn find_unquoted(haystack: &str, needle: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (idx, ch) in haystack.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, ch) {
            (Some(_), '\\') => escaped = true,
            (Some(open), c) if c == open => quote = None,
            (None, '"' | '\'') => quote = Some(ch),
            (None, _) if haystack[idx..].starts_with(needle) => return Some(idx),
            _ => {}
        }
    }
    None
}

/// Trim and strip one pair of matching quotes, unescaping in safe mode
///
/// Returns the text and whether it was quoted.
pub fn unquote(raw: &str, mode: ParseMode) -> (String, bool) {
    let trimmed = raw.trim();
    let bytes = trimmed.as_bytes();
    let quoted = bytes.len() >= 2
        && matches!(bytes[0], b'"' | b'\'')
        && bytes[bytes.len() - 1] == bytes[0];
    if !quoted {
        return (trimmed.to_string(), false);
    }
    let inner = &trimmed[1..trimmed.len() - 1];
    match mode {
        ParseMode::Fast => (inner.to_string(), true),
        ParseMode::Safe => (unescape(inner), true),
    }
}

fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other @ ('"' | '\'' | '\\')) => out.push(other),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Interpret a default literal
///
/// Quoted text stays a string; bare numbers, `true`, `false` and `null` become JSON
/// values; any other bare word is a string.
pub fn parse_literal(raw: &str, mode: ParseMode) -> Value {
    let (text, quoted) = unquote(raw, mode);
    if quoted {
        return Value::String(text);
    }
    match text.as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => {
            if let Ok(int) = text.parse::<i64>() {
                return Value::from(int);
            }
            match parse_numeric(&text) {
                Some(float) => number_value(float),
                None => Value::String(text),
            }
        }
    }
}
