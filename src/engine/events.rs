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

//! Optional diagnostics sink
//!
//! The engine reports degraded-but-not-failed situations (missing values, unresolved
//! aliases, alias cycles) to a sink when one is configured. Without a sink nothing is
//! built.

use parking_lot::Mutex;
use std::fmt;

/// A diagnostic emitted during a mapping run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingEvent {
    /// Source path resolved to nothing and no default was declared
    MissingValue {
        /// Target path of the entry
        target_path: String,
        /// Source path that was read
        source_path: String,
    },
    /// Alias reference to a target key that was not written
    UnresolvedAlias {
        /// Target path of the entry
        target_path: String,
        /// Referenced target key
        alias: String,
    },
    /// Alias dependencies form a cycle; the entries ran in declaration order
    AliasCycle {
        /// Target paths involved
        targets: Vec<String>,
    },
    /// A `null` result was not written
    SkippedNull {
        /// Target path of the entry
        target_path: String,
    },
}

impl fmt::Display for MappingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingEvent::MissingValue {
                target_path,
                source_path,
            } => write!(f, "'{source_path}' missing for '{target_path}'"),
            MappingEvent::UnresolvedAlias { target_path, alias } => {
                write!(f, "alias '@{alias}' unresolved for '{target_path}'")
            }
            MappingEvent::AliasCycle { targets } => {
                write!(f, "alias cycle between {}", targets.join(", "))
            }
            MappingEvent::SkippedNull { target_path } => {
                write!(f, "null skipped at '{target_path}'")
            }
        }
    }
}

/// Receiver of [`MappingEvent`]s
pub trait DiagnosticSink: Send + Sync {
    /// Handle one event
    fn notify(&self, event: &MappingEvent);
}

/// Sink forwarding events to the `log` facade at debug level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn notify(&self, event: &MappingEvent) {
        log::debug!("mapping: {event}");
    }
}

/// Sink keeping every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<MappingEvent>>,
}

impl RecordingSink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far
    pub fn events(&self) -> Vec<MappingEvent> {
        self.events.lock().clone()
    }

    /// Remove and return the received events
    pub fn take(&self) -> Vec<MappingEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl DiagnosticSink for RecordingSink {
    fn notify(&self, event: &MappingEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording() {
        let sink = RecordingSink::new();
        sink.notify(&MappingEvent::SkippedNull {
            target_path: "a".into(),
        });
        assert_eq!(sink.events().len(), 1);
        assert_eq!(sink.take().len(), 1);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_display() {
        let event = MappingEvent::AliasCycle {
            targets: vec!["a".into(), "b".into()],
        };
        assert_eq!(event.to_string(), "alias cycle between a, b");
    }
}
