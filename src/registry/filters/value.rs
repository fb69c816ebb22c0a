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

//! Scalar conversion and numeric filters

use super::{filter_meta, int_arg, numeric_arg};
use crate::model::compare::{as_number, display_string, number_value, truthy};
use crate::parser::ParseMode;
use crate::parser::split::parse_literal;
use crate::registry::filter::Filter;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use std::fmt::Write;

/// `default[:value]` replaces `null` and `""`
#[derive(Debug, Default)]
pub struct DefaultFilter;

impl Filter for DefaultFilter {
    filter_meta!("default", ["fallback"], "Replace null or empty string");

    fn apply(&self, value: Value, args: &[String]) -> Value {
        let empty = match &value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        };
        if !empty {
            return value;
        }
        args.first()
            .map_or(Value::String(String::new()), |raw| parse_literal(raw, ParseMode::Fast))
    }
}

/// `clamp:min:max` for numeric input
#[derive(Debug, Default)]
pub struct ClampFilter;

impl Filter for ClampFilter {
    filter_meta!("clamp", [], "Clamp a number into a range");

    fn apply(&self, value: Value, args: &[String]) -> Value {
        let (Some(n), Some(min), Some(max)) =
            (as_number(&value), numeric_arg(args, 0), numeric_arg(args, 1))
        else {
            return value;
        };
        if min > max {
            return value;
        }
        number_value(n.clamp(min, max))
    }
}

/// `between:min:max[:strict]` range test
#[derive(Debug, Default)]
pub struct BetweenFilter;

impl Filter for BetweenFilter {
    filter_meta!("between", ["in_range"], "Whether a number lies within a range");

    fn apply(&self, value: Value, args: &[String]) -> Value {
        let (Some(n), Some(min), Some(max)) =
            (as_number(&value), numeric_arg(args, 0), numeric_arg(args, 1))
        else {
            return Value::Bool(false);
        };
        let strict = args
            .get(2)
            .is_some_and(|flag| matches!(flag.trim(), "strict" | "true" | "1"));
        Value::Bool(if strict {
            n > min && n < max
        } else {
            n >= min && n <= max
        })
    }
}

/// Encode as JSON text
#[derive(Debug, Default)]
pub struct JsonFilter;

impl Filter for JsonFilter {
    filter_meta!("json", ["json_encode"], "Encode as JSON text");

    fn apply(&self, value: Value, _args: &[String]) -> Value {
        match serde_json::to_string(&value) {
            Ok(text) => Value::String(text),
            Err(_) => value,
        }
    }
}

/// Truncate to an integer
#[derive(Debug, Default)]
pub struct IntFilter;

impl Filter for IntFilter {
    filter_meta!("int", ["integer", "intval"], "Convert to an integer");

    fn apply(&self, value: Value, _args: &[String]) -> Value {
        match &value {
            Value::Null => Value::from(0),
            Value::Bool(b) => Value::from(i64::from(*b)),
            Value::Number(_) | Value::String(_) => {
                Value::from(as_number(&value).map_or(0, |n| n.trunc() as i64))
            }
            _ => value,
        }
    }
}

/// Convert to a float
#[derive(Debug, Default)]
pub struct FloatFilter;

impl Filter for FloatFilter {
    filter_meta!("float", ["floatval", "double"], "Convert to a float");

    fn apply(&self, value: Value, _args: &[String]) -> Value {
        let n = match &value {
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(_) | Value::String(_) => as_number(&value).unwrap_or(0.0),
            _ => return value,
        };
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

/// Truthiness as a boolean
#[derive(Debug, Default)]
pub struct BoolFilter;

impl Filter for BoolFilter {
    filter_meta!("bool", ["boolean", "boolval"], "Convert to a boolean");

    fn apply(&self, value: Value, _args: &[String]) -> Value {
        Value::Bool(truthy(&value))
    }
}

/// String form (lists and objects become JSON text)
#[derive(Debug, Default)]
pub struct StringFilter;

impl Filter for StringFilter {
    filter_meta!("string", ["str", "strval"], "Convert to a string");

    fn apply(&self, value: Value, _args: &[String]) -> Value {
        Value::String(display_string(&value))
    }
}

/// Absolute value
#[derive(Debug, Default)]
pub struct AbsFilter;

impl Filter for AbsFilter {
    filter_meta!("abs", [], "Absolute value");

    fn apply(&self, value: Value, _args: &[String]) -> Value {
        match &value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Value::from(i.saturating_abs()),
                None => n.as_f64().map_or(value.clone(), |f| number_value(f.abs())),
            },
            _ => value,
        }
    }
}

/// `round[:precision]` half away from zero
#[derive(Debug, Default)]
pub struct RoundFilter;

impl Filter for RoundFilter {
    filter_meta!("round", [], "Round to a number of decimals");

    fn apply(&self, value: Value, args: &[String]) -> Value {
        let Some(n) = as_number(&value) else {
            return value;
        };
        let precision = int_arg(args, 0).unwrap_or(0).clamp(-15, 15) as i32;
        let factor = 10f64.powi(precision);
        number_value((n * factor).round() / factor)
    }
}

/// `date[:format]` reformats RFC 3339, `YYYY-MM-DD[ HH:MM:SS]` or Unix timestamps
///
/// The format uses `strftime` specifiers and defaults to `%Y-%m-%d`.
#[derive(Debug, Default)]
pub struct DateFilter;

impl DateFilter {
    fn parse(value: &Value) -> Option<NaiveDateTime> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
                .map(|dt| dt.naive_utc()),
            Value::String(s) => {
                let s = s.trim();
                DateTime::parse_from_rfc3339(s)
                    .map(|dt| dt.naive_local())
                    .ok()
                    .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok())
                    .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok())
                    .or_else(|| {
                        NaiveDate::parse_from_str(s, "%Y-%m-%d")
                            .ok()
                            .and_then(|d| d.and_hms_opt(0, 0, 0))
                    })
            }
            _ => None,
        }
    }
}

impl Filter for DateFilter {
    filter_meta!("date", ["date_format"], "Reformat a date");

    fn apply(&self, value: Value, args: &[String]) -> Value {
        let Some(parsed) = Self::parse(&value) else {
            return value;
        };
        let format = args.first().map_or("%Y-%m-%d", String::as_str);
        let mut out = String::new();
        if write!(out, "{}", parsed.format(format)).is_err() {
            return value;
        }
        Value::String(out)
    }
}
