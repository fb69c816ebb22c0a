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

//! Execution order for alias references
//!
//! An entry reading `{{ @key }}` depends on the entries writing `key` (or a path
//! above or below it). Entries are ordered topologically with declaration order as the
//! tie-break, so a table without aliases runs exactly as declared. A cycle cannot be
//! ordered: its entries run in declaration order after everything else and the
//! references that are still unwritten resolve to their default.

use crate::parser::{ExpressionParser, ItemTemplate, ParsedEntry, PlanEntry, PlanNode};
use std::collections::BTreeSet;

/// Entry order computed for one plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOrder {
    /// Indices into the plan entries
    pub order: Vec<usize>,
    /// Indices of entries caught in an alias cycle, in declaration order
    pub cyclic: Vec<usize>,
}

impl ExecutionOrder {
    /// Whether an alias cycle forced the declaration-order fallback
    pub fn has_cycle(&self) -> bool {
        !self.cyclic.is_empty()
    }
}

/// Target keys referenced through `@` by an entry
pub fn alias_dependencies(entry: &PlanEntry, expressions: &ExpressionParser) -> Vec<String> {
    let mut out = Vec::new();
    collect_node(&entry.node, expressions, &mut out);
    out.sort();
    out.dedup();
    out
}

fn collect_node(node: &PlanNode, expressions: &ExpressionParser, out: &mut Vec<String>) {
    match node {
        PlanNode::Entry(entry) => collect_entry(entry, out),
        PlanNode::Block(block) => {
            if let Some(alias) = block.collection_path.strip_prefix('@') {
                out.push(alias.to_string());
            }
            for directive in &block.operators {
                collect_config(&directive.config, expressions, out);
            }
            match &block.item {
                ItemTemplate::Entry(entry) => collect_entry(entry, out),
                ItemTemplate::Plan(entries) => {
                    for entry in entries {
                        collect_node(&entry.node, expressions, out);
                    }
                }
            }
        }
    }
}

fn collect_entry(entry: &ParsedEntry, out: &mut Vec<String>) {
    if let Some(alias) = entry.expression().and_then(|expr| expr.alias_key()) {
        out.push(alias.to_string());
    }
}

fn collect_config(
    config: &serde_json::Value,
    expressions: &ExpressionParser,
    out: &mut Vec<String>,
) {
    use serde_json::Value;
    match config {
        Value::String(text) => {
            if let Ok(Some(expr)) = expressions.parse(text) {
                if let Some(alias) = expr.alias_key() {
                    out.push(alias.to_string());
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_config(v, expressions, out)),
        Value::Object(map) => map.values().for_each(|v| collect_config(v, expressions, out)),
        _ => {}
    }
}

/// Whether writing `target` can produce the value read by `@alias`
fn produces(target: &str, alias: &str) -> bool {
    target == alias || is_dotted_prefix(target, alias) || is_dotted_prefix(alias, target)
}

fn is_dotted_prefix(prefix: &str, path: &str) -> bool {
    path.len() > prefix.len() && path.starts_with(prefix) && path.as_bytes()[prefix.len()] == b'.'
}

/// Order `entries` so alias producers run before their readers
pub fn execution_order(entries: &[PlanEntry], expressions: &ExpressionParser) -> ExecutionOrder {
    let n = entries.len();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut indegree = vec![0usize; n];
    let mut any_alias = false;

    for (reader, entry) in entries.iter().enumerate() {
        for alias in alias_dependencies(entry, expressions) {
            any_alias = true;
            for (producer, candidate) in entries.iter().enumerate() {
                if producer != reader && produces(&candidate.target_path, &alias) {
                    dependents[producer].push(reader);
                    indegree[reader] += 1;
                }
            }
        }
    }

    if !any_alias {
        return ExecutionOrder {
            order: (0..n).collect(),
            cyclic: Vec::new(),
        };
    }

    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &dependent in &dependents[next] {
            indegree[dependent] -= 1;
            if indegree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    let cyclic: Vec<usize> = (0..n).filter(|&i| indegree[i] > 0).collect();
    if !cyclic.is_empty() {
        log::warn!(
            "Alias cycle between {:?}, falling back to declaration order",
            cyclic
                .iter()
                .map(|&i| entries[i].target_path.as_str())
                .collect::<Vec<_>>()
        );
        order.extend(cyclic.iter().copied());
    }
    ExecutionOrder { order, cyclic }
}
