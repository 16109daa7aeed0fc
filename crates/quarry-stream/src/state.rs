//! Read sets, resolved state and mutation batches.
//!
//! State gates never touch persistence directly. They declare a [`ReadSet`]
//! up front, receive a [`ResolvedState`] snapshot of exactly that, and hand
//! back a [`MutationBatch`] recipe. Quarantining all I/O into the runner is
//! what makes snapshot/restore — and therefore transactions — deterministic.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use quarry_store_core::Hash;
use quarry_types::{Error, Result, Value};

use crate::event::Event;

//─────────────────────────────
//  ReadSet
//─────────────────────────────

/// Declaration of the refs and prefixes a state gate will read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadSet {
    /// Specific ref names.
    pub refs: Vec<String>,
    /// Prefix patterns, resolved to every matching name.
    pub prefixes: Vec<String>,
}

impl ReadSet {
    /// Empty read set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a specific ref name.
    pub fn with_ref(mut self, name: impl Into<String>) -> Self {
        self.refs.push(name.into());
        self
    }

    /// Add a prefix pattern.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    /// Merge another read set into this one.
    pub fn merge(&mut self, other: ReadSet) {
        self.refs.extend(other.refs);
        self.prefixes.extend(other.prefixes);
    }
}

//─────────────────────────────
//  Resolved state
//─────────────────────────────

/// What the runner resolved for a [`ReadSet`].
#[derive(Debug, Clone, Default)]
pub struct ResolvedState {
    /// Per-ref value; `None` records an absent ref.
    pub refs: HashMap<String, Option<Value>>,
    /// Per-prefix ordered mapping from name to value.
    pub prefixes: HashMap<String, IndexMap<String, Value>>,
}

impl ResolvedState {
    /// Value of a specific ref, if present.
    pub fn get_ref(&self, name: &str) -> Option<&Value> {
        self.refs.get(name).and_then(|v| v.as_ref())
    }

    /// Ordered name-to-value mapping under a prefix.
    ///
    /// Fails if the prefix was never declared; that is a gate bug, not a
    /// data condition.
    pub fn prefix(&self, prefix: &str) -> Result<&IndexMap<String, Value>> {
        self.prefixes
            .get(prefix)
            .ok_or_else(|| Error::Resolution(format!("prefix '{prefix}' was not declared")))
    }
}

//─────────────────────────────
//  MutationBatch
//─────────────────────────────

/// One content put, tagged with an informational kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Put {
    /// What the blob is (schema, row, index, …); informational only.
    pub kind: &'static str,
    /// The value to store.
    pub value: Value,
}

/// Where a ref-set points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RefTarget {
    /// Index into the batch's put list.
    Put(usize),
    /// A hash that already exists in the store.
    Hash(Hash),
}

/// One ref assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefSet {
    /// Ref name.
    pub name: String,
    /// What it points at.
    pub target: RefTarget,
}

/// Ordered mutation recipe: puts, then ref-sets, then ref-deletes, then
/// follow-up events. Puts precede refs so a ref never points at a missing
/// blob.
#[derive(Debug, Clone, Default)]
pub struct MutationBatch {
    /// Content puts, in order.
    pub puts: Vec<Put>,
    /// Ref assignments, resolved after all puts.
    pub ref_sets: Vec<RefSet>,
    /// Ref removals, applied last.
    pub ref_deletes: Vec<String>,
    /// Events to re-emit once persistence mutations complete.
    pub events: Vec<Event>,
}

impl MutationBatch {
    /// Batch with no mutations, only follow-up events.
    pub fn events(events: Vec<Event>) -> Self {
        Self { events, ..Self::default() }
    }

    /// Append a put and return its index for a [`RefTarget::Put`].
    pub fn put(&mut self, kind: &'static str, value: Value) -> usize {
        self.puts.push(Put { kind, value });
        self.puts.len() - 1
    }

    /// Point `name` at the put with the given index.
    pub fn set_ref_to_put(&mut self, name: impl Into<String>, put_index: usize) {
        self.ref_sets.push(RefSet { name: name.into(), target: RefTarget::Put(put_index) });
    }

    /// Point `name` at an existing hash.
    pub fn set_ref_to_hash(&mut self, name: impl Into<String>, hash: impl Into<Hash>) {
        self.ref_sets.push(RefSet { name: name.into(), target: RefTarget::Hash(hash.into()) });
    }

    /// Delete a ref.
    pub fn delete_ref(&mut self, name: impl Into<String>) {
        self.ref_deletes.push(name.into());
    }

    /// Append a follow-up event.
    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_indices_are_sequential() {
        let mut batch = MutationBatch::default();
        assert_eq!(batch.put("schema", Value::Null), 0);
        assert_eq!(batch.put("row", Value::Int(1)), 1);
        batch.set_ref_to_put("db/x", 1);
        assert_eq!(batch.ref_sets[0].target, RefTarget::Put(1));
    }

    #[test]
    fn undeclared_prefix_is_a_resolution_error() {
        let state = ResolvedState::default();
        assert!(matches!(state.prefix("db/"), Err(Error::Resolution(_))));
    }
}
