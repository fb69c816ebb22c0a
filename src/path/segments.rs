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

//! Dot-path splitting and wildcard bookkeeping

/// Segment matching every key or index at its level
pub const WILDCARD: &str = "*";

/// Split a dot-path into segments (the empty path has no segments)
pub fn split_path(path: &str) -> Vec<&str> {
    if path.is_empty() {
        Vec::new()
    } else {
        path.split('.').collect()
    }
}

/// Whether any segment of the path is a wildcard
pub fn has_wildcard(path: &str) -> bool {
    path.split('.').any(|segment| segment == WILDCARD)
}

/// Number of wildcard segments in the path
pub fn wildcard_count(path: &str) -> usize {
    path.split('.').filter(|segment| *segment == WILDCARD).count()
}

/// Append a key to a dot-path prefix
pub fn join_path(prefix: &str, key: &str) -> String {
    match (prefix.is_empty(), key.is_empty()) {
        (true, _) => key.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{prefix}.{key}"),
    }
}

/// Path before the first wildcard segment (`users.*.email` gives `users`)
pub fn wildcard_prefix(path: &str) -> Option<&str> {
    if path == WILDCARD || path.starts_with("*.") {
        return Some("");
    }
    path.find(".*.")
        .or_else(|| path.strip_suffix(".*").map(|p| p.len()))
        .map(|idx| &path[..idx])
}

/// Path after the first wildcard segment (`users.*.email` gives `email`)
///
/// Returns an empty string when the wildcard is the last segment.
pub fn after_first_wildcard(path: &str) -> Option<&str> {
    let prefix = wildcard_prefix(path)?;
    let start = if prefix.is_empty() { 1 } else { prefix.len() + 2 };
    Some(path.get(start..).map_or("", |rest| rest.strip_prefix('.').unwrap_or(rest)))
}

/// Concrete segments found at the wildcard positions of `pattern`
///
/// `wildcard_indices("users.*.tags.*", "users.3.tags.1")` gives `["3", "1"]`.
pub fn wildcard_indices(pattern: &str, concrete: &str) -> Option<Vec<String>> {
    let pattern_segments = split_path(pattern);
    let concrete_segments = split_path(concrete);
    if concrete_segments.len() < pattern_segments.len() {
        return None;
    }
    let mut indices = Vec::new();
    for (expected, actual) in pattern_segments.iter().zip(&concrete_segments) {
        if *expected == WILDCARD {
            indices.push((*actual).to_string());
        } else if expected != actual {
            return None;
        }
    }
    Some(indices)
}

/// Replace wildcards in order with the given segments
///
/// Wildcards without a matching index are left in place.
pub fn substitute_wildcards<S: AsRef<str>>(pattern: &str, indices: &[S]) -> String {
    let mut next = indices.iter();
    pattern
        .split('.')
        .map(|segment| {
            if segment == WILDCARD {
                next.next().map_or(WILDCARD, |idx| idx.as_ref())
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Parse a canonical array index (`"0"`, `"17"`; not `"01"` or `"-1"`)
pub fn parse_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || (segment.len() > 1 && segment.starts_with('0')) {
        return None;
    }
    if !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_prefix() {
        assert_eq!(wildcard_prefix("users.*.email"), Some("users"));
        assert_eq!(wildcard_prefix("users.*"), Some("users"));
        assert_eq!(wildcard_prefix("*.email"), Some(""));
        assert_eq!(wildcard_prefix("a.b.*.c.*.d"), Some("a.b"));
        assert_eq!(wildcard_prefix("users.email"), None);
    }

    #[test]
    fn test_after_first_wildcard() {
        assert_eq!(after_first_wildcard("users.*.email"), Some("email"));
        assert_eq!(after_first_wildcard("users.*"), Some(""));
        assert_eq!(after_first_wildcard("*.a.b"), Some("a.b"));
        assert_eq!(after_first_wildcard("a.*.b.*.c"), Some("b.*.c"));
        assert_eq!(after_first_wildcard("plain"), None);
    }

    #[test]
    fn test_indices_and_substitution() {
        let indices = wildcard_indices("users.*.tags.*", "users.3.tags.1").unwrap();
        assert_eq!(indices, vec!["3", "1"]);
        assert_eq!(substitute_wildcards("out.*.t.*", &indices), "out.3.t.1");
        assert_eq!(substitute_wildcards("out.*.t.*", &["0"]), "out.0.t.*");
        assert!(wildcard_indices("users.*", "orders.1").is_none());
    }

    #[test]
    fn test_parse_index() {
        assert_eq!(parse_index("0"), Some(0));
        assert_eq!(parse_index("12"), Some(12));
        assert_eq!(parse_index("012"), None);
        assert_eq!(parse_index("-1"), None);
        assert_eq!(parse_index("+1"), None);
        assert_eq!(join_path("", "a"), "a");
        assert_eq!(join_path("a", "b"), "a.b");
    }
}
