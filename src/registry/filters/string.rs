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

//! String filters

use super::{filter_meta, int_arg};
use crate::registry::filter::Filter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

fn map_string(value: Value, f: impl FnOnce(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(f(&s)),
        other => other,
    }
}

fn trim_set(args: &[String]) -> Option<Vec<char>> {
    args.first()
        .filter(|chars| !chars.is_empty())
        .map(|chars| chars.chars().collect())
}

/// Strip whitespace (or the characters given as argument) from both ends
#[derive(Debug, Default)]
pub struct TrimFilter;

impl Filter for TrimFilter {
    filter_meta!("trim", [], "Strip whitespace from both ends");

    fn apply(&self, value: Value, args: &[String]) -> Value {
        let set = trim_set(args);
        map_string(value, |s| match &set {
            Some(chars) => s.trim_matches(chars.as_slice()).to_string(),
            None => s.trim().to_string(),
        })
    }
}

/// Strip from the start
#[derive(Debug, Default)]
pub struct LtrimFilter;

impl Filter for LtrimFilter {
    filter_meta!("ltrim", [], "Strip whitespace from the start");

    fn apply(&self, value: Value, args: &[String]) -> Value {
        let set = trim_set(args);
        map_string(value, |s| match &set {
            Some(chars) => s.trim_start_matches(chars.as_slice()).to_string(),
            None => s.trim_start().to_string(),
        })
    }
}

/// Strip from the end
#[derive(Debug, Default)]
pub struct RtrimFilter;

impl Filter for RtrimFilter {
    filter_meta!("rtrim", [], "Strip whitespace from the end");

    fn apply(&self, value: Value, args: &[String]) -> Value {
        let set = trim_set(args);
        map_string(value, |s| match &set {
            Some(chars) => s.trim_end_matches(chars.as_slice()).to_string(),
            None => s.trim_end().to_string(),
        })
    }
}

/// Uppercase a string
#[derive(Debug, Default)]
pub struct UpperFilter;

impl Filter for UpperFilter {
    filter_meta!("upper", ["uppercase", "strtoupper"], "Uppercase a string");

    fn apply(&self, value: Value, _args: &[String]) -> Value {
        map_string(value, str::to_uppercase)
    }
}

/// Lowercase a string
#[derive(Debug, Default)]
pub struct LowerFilter;

impl Filter for LowerFilter {
    filter_meta!("lower", ["lowercase", "strtolower"], "Lowercase a string");

    fn apply(&self, value: Value, _args: &[String]) -> Value {
        map_string(value, str::to_lowercase)
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Uppercase the first character
#[derive(Debug, Default)]
pub struct UcfirstFilter;

impl Filter for UcfirstFilter {
    filter_meta!("ucfirst", ["capitalize"], "Uppercase the first character");

    fn apply(&self, value: Value, _args: &[String]) -> Value {
        map_string(value, capitalize)
    }
}

/// Uppercase the first character of every word
#[derive(Debug, Default)]
pub struct UcwordsFilter;

impl Filter for UcwordsFilter {
    filter_meta!("ucwords", ["title"], "Uppercase the first character of each word");

    fn apply(&self, value: Value, _args: &[String]) -> Value {
        map_string(value, |s| {
            let mut out = String::with_capacity(s.len());
            let mut at_word_start = true;
            for ch in s.chars() {
                if at_word_start && !ch.is_whitespace() {
                    out.extend(ch.to_uppercase());
                } else {
                    out.push(ch);
                }
                at_word_start = ch.is_whitespace();
            }
            out
        })
    }
}

/// `substr:start[:length]` with negative offsets counted from the end
#[derive(Debug, Default)]
pub struct SubstrFilter;

impl SubstrFilter {
    fn slice(text: &str, start: i64, length: Option<i64>) -> String {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len() as i64;
        let begin = if start < 0 { len.saturating_add(start).max(0) } else { start.min(len) };
        let end = match length {
            None => len,
            Some(n) if n < 0 => len.saturating_add(n),
            Some(n) => begin.saturating_add(n).min(len),
        };
        if end <= begin {
            return String::new();
        }
        chars[begin as usize..end as usize].iter().collect()
    }
}

impl Filter for SubstrFilter {
    filter_meta!("substr", ["substring"], "Slice a string by character offsets");

    fn apply(&self, value: Value, args: &[String]) -> Value {
        let Some(start) = int_arg(args, 0) else {
            return value;
        };
        let length = int_arg(args, 1);
        map_string(value, |s| Self::slice(s, start, length))
    }
}

/// `replace:search:replacement`
#[derive(Debug, Default)]
pub struct ReplaceFilter;

impl Filter for ReplaceFilter {
    filter_meta!("replace", ["str_replace"], "Replace every occurrence of a substring");

    fn apply(&self, value: Value, args: &[String]) -> Value {
        let Some(search) = args.first().filter(|s| !s.is_empty()) else {
            return value;
        };
        let replacement = args.get(1).map_or("", String::as_str);
        map_string(value, |s| s.replace(search.as_str(), replacement))
    }
}

/// `split[:separator]` into a list (separator defaults to `,`)
#[derive(Debug, Default)]
pub struct SplitFilter;

impl Filter for SplitFilter {
    filter_meta!("split", ["explode"], "Split a string into a list");

    fn apply(&self, value: Value, args: &[String]) -> Value {
        let Value::String(text) = value else {
            return value;
        };
        let separator = args.first().map_or(",", String::as_str);
        if separator.is_empty() {
            return Value::Array(text.chars().map(|c| Value::String(c.to_string())).collect());
        }
        Value::Array(
            text.split(separator)
                .map(|part| Value::String(part.to_string()))
                .collect(),
        )
    }
}

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^\p{L}\p{N}]+").expect("valid slug pattern")
});

/// `slug[:separator]`: lowercase words joined by `-`
#[derive(Debug, Default)]
pub struct SlugFilter;

impl Filter for SlugFilter {
    filter_meta!("slug", ["slugify"], "URL-friendly lowercase slug");

    fn apply(&self, value: Value, args: &[String]) -> Value {
        let separator = args.first().map_or("-", String::as_str);
        map_string(value, |s| {
            let lowered = s.to_lowercase();
            NON_ALNUM
                .split(&lowered)
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(separator)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[rstest]
    #[case(&["0", "3"], "Hel")]
    #[case(&["-3"], "llo")]
    #[case(&["1", "-1"], "ell")]
    #[case(&["10"], "")]
    #[case(&["2", "100"], "llo")]
    #[case(&["1", "9223372036854775807"], "ello")]
    #[case(&["9223372036854775807", "9223372036854775807"], "")]
    #[case(&["-9223372036854775808"], "Hello")]
    #[case(&["-9223372036854775808", "2"], "He")]
    #[case(&["0", "-9223372036854775808"], "")]
    fn test_substr(#[case] raw: &[&str], #[case] expected: &str) {
        assert_eq!(SubstrFilter.apply(json!("Hello"), &args(raw)), json!(expected));
    }

    #[test]
    fn test_trim_variants() {
        assert_eq!(TrimFilter.apply(json!("  HELLO  "), &[]), json!("HELLO"));
        assert_eq!(TrimFilter.apply(json!("--x--"), &args(&["-"])), json!("x"));
        assert_eq!(LtrimFilter.apply(json!("  x "), &[]), json!("x "));
        assert_eq!(RtrimFilter.apply(json!("  x "), &[]), json!("  x"));
    }

    #[test]
    fn test_case_filters() {
        assert_eq!(UpperFilter.apply(json!("alice"), &[]), json!("ALICE"));
        assert_eq!(LowerFilter.apply(json!("ALICE"), &[]), json!("alice"));
        assert_eq!(UcfirstFilter.apply(json!("élan vital"), &[]), json!("Élan vital"));
        assert_eq!(UcwordsFilter.apply(json!("hello  big world"), &[]), json!("Hello  Big World"));
    }

    #[test]
    fn test_non_strings_pass_through() {
        assert_eq!(UpperFilter.apply(json!(42), &[]), json!(42));
        assert_eq!(SplitFilter.apply(json!(null), &[]), json!(null));
        assert_eq!(SubstrFilter.apply(json!([1]), &args(&["0"])), json!([1]));
    }

    #[test]
    fn test_replace_split_slug() {
        assert_eq!(
            ReplaceFilter.apply(json!("a-b-c"), &args(&["-", "+"])),
            json!("a+b+c")
        );
        assert_eq!(SplitFilter.apply(json!("a,b"), &[]), json!(["a", "b"]));
        assert_eq!(SplitFilter.apply(json!("a b"), &args(&[" "])), json!(["a", "b"]));
        assert_eq!(
            SlugFilter.apply(json!("  Hello, World! 2024 "), &[]),
            json!("hello-world-2024")
        );
    }
}
