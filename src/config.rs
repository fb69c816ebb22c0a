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

//! Mapper settings
//!
//! Settings are read once, when caches and default mapper instances are initialised.
//! Loading them from a file is left to the embedding application; every struct here
//! deserialises from the usual `{"cache": {"max_entries": 500}}` shaped JSON.

use crate::parser::ParseMode;
use serde::{Deserialize, Serialize};

/// Environment variable overriding [`CacheConfig::max_entries`]
pub const ENV_CACHE_MAX_ENTRIES: &str = "DATAMAP_CACHE_MAX_ENTRIES";

/// Environment variable toggling [`MapperConfig::performance_mode`]
pub const ENV_PERFORMANCE_MODE: &str = "DATAMAP_PERFORMANCE_MODE";

/// Default static marker key for literal mapping entries
pub const DEFAULT_STATIC_MARKER: &str = "__static__";

/// Configuration for parser and plan caches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries per cache (0 disables caching)
    pub max_entries: usize,
}

impl CacheConfig {
    /// Create a cache configuration with a custom bound
    pub fn new(max_entries: usize) -> Self {
        Self { max_entries }
    }

    /// Create a configuration optimized for high performance
    pub fn high_performance() -> Self {
        Self {
            max_entries: 10_000,
        }
    }

    /// Create a configuration optimized for low memory usage
    pub fn low_memory() -> Self {
        Self { max_entries: 100 }
    }

    /// Create a configuration with caching disabled
    pub fn disabled() -> Self {
        Self { max_entries: 0 }
    }

    /// Create a configuration for testing
    pub fn testing() -> Self {
        Self { max_entries: 16 }
    }

    /// Whether caching is enabled
    pub fn is_enabled(&self) -> bool {
        self.max_entries > 0
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_entries: 1_000 }
    }
}

/// Top-level settings object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Cache settings
    pub cache: CacheConfig,

    /// Use the fast (non-escaping) filter argument splitter
    pub performance_mode: bool,

    /// Key that marks a mapping entry as a literal
    pub static_marker: String,

    /// Skip writing `null` values
    pub skip_null: bool,

    /// Compact wildcard output to contiguous `0..n-1` keys
    pub reindex_wildcard: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            performance_mode: true,
            static_marker: DEFAULT_STATIC_MARKER.to_string(),
            skip_null: true,
            reindex_wildcard: false,
        }
    }
}

impl MapperConfig {
    /// Default settings with environment overrides applied
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `DATAMAP_*` environment overrides on top of these settings
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(|name| std::env::var(name).ok());
        self
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup(ENV_CACHE_MAX_ENTRIES) {
            match raw.trim().parse::<usize>() {
                Ok(max_entries) => self.cache.max_entries = max_entries,
                Err(_) => log::warn!("Ignoring invalid {ENV_CACHE_MAX_ENTRIES} value '{raw}'"),
            }
        }
        if let Some(raw) = lookup(ENV_PERFORMANCE_MODE) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.performance_mode = true,
                "0" | "false" | "no" | "off" => self.performance_mode = false,
                _ => log::warn!("Ignoring invalid {ENV_PERFORMANCE_MODE} value '{raw}'"),
            }
        }
    }

    /// Parse mode implied by the performance flag
    pub fn parse_mode(&self) -> ParseMode {
        if self.performance_mode {
            ParseMode::Fast
        } else {
            ParseMode::Safe
        }
    }

    /// Load settings from JSON text
    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
