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

//! Template syntax errors

use thiserror::Error;

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Malformed template syntax
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// `{{` without a matching `}}`
    #[error("Unterminated expression '{input}': missing closing '}}}}'")]
    UnterminatedExpression {
        /// The offending input
        input: String,
    },

    /// `{{ }}` or `{{ | upper }}`
    #[error("Expression '{input}' has an empty path")]
    EmptyPath {
        /// The offending input
        input: String,
    },

    /// `{{ name | }}` or `{{ name | :x }}`
    #[error("Expression '{input}' contains an empty filter name")]
    EmptyFilterName {
        /// The offending input
        input: String,
    },

    /// Quote opened but never closed (safe mode only)
    #[error("Unterminated quote in '{input}'")]
    UnterminatedQuote {
        /// The offending input
        input: String,
    },
}
