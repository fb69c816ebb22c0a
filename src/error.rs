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

//! Error types for mapping, path access and template parsing

use crate::parser::ParseError;
use thiserror::Error;

/// Result type for mapper operations
pub type Result<T> = std::result::Result<T, MapperError>;

/// Errors surfaced to library consumers.
///
/// Only configuration-shaped problems are errors. Missing keys, type mismatches and
/// predicates that match nothing resolve to defaults or empty results instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MapperError {
    /// Traversal into a structure that cannot be traversed (e.g. a scalar root)
    #[error("Invalid path access at '{path}': {reason}")]
    InvalidPathAccess {
        /// Path that was being traversed
        path: String,
        /// Why the access is invalid
        reason: String,
    },

    /// Structural mapping-table error
    #[error("Invalid mapping configuration: {0}")]
    InvalidMappingConfiguration(String),

    /// Operator lookup by unknown name
    #[error("Operator '{0}' is not registered")]
    UnregisteredOperator(String),

    /// Filter lookup by unknown name
    #[error("Filter '{0}' is not registered")]
    UnregisteredFilter(String),

    /// Malformed template syntax
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// JSON text or typed conversion failure
    #[error("JSON error: {0}")]
    Json(String),
}

impl MapperError {
    /// Create an invalid path access error
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPathAccess {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid mapping configuration error
    pub fn invalid_mapping(message: impl Into<String>) -> Self {
        Self::InvalidMappingConfiguration(message.into())
    }

    /// Whether the error indicates a configuration problem rather than bad data
    pub fn is_configuration_error(&self) -> bool {
        !matches!(self, Self::InvalidPathAccess { .. } | Self::Json(_))
    }
}

impl From<serde_json::Error> for MapperError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
