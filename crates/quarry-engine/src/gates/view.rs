//! View and trigger execute gates.
//!
//! Both are metadata: view queries are persisted verbatim for external
//! tooling, trigger bodies are persisted and never fired (execution is a
//! future extension).

use quarry_stream::{Event, MutationBatch, ReadSet, ResolvedState, StateGate};
use quarry_types::{to_value, Error, Result, TriggerDef, ViewDef};

use crate::paths;

pub(crate) struct ViewCreateGate;

impl StateGate for ViewCreateGate {
    fn signature(&self) -> &'static str {
        "view_create_execute"
    }

    fn reads(&self, event: &Event) -> Result<ReadSet> {
        let Event::ViewCreateExecute(stmt) = event else {
            return Ok(ReadSet::new());
        };
        Ok(ReadSet::new().with_ref(paths::view_ref(&stmt.name)))
    }

    fn apply(&self, event: &Event, state: &ResolvedState) -> Result<MutationBatch> {
        let Event::ViewCreateExecute(stmt) = event else {
            return Err(Error::Runtime("view_create_execute received a foreign event".into()));
        };
        let ref_name = paths::view_ref(&stmt.name);
        if state.get_ref(&ref_name).is_some() {
            return Err(Error::Schema(format!("view '{}' already exists", stmt.name)));
        }
        let def = ViewDef {
            name: stmt.name.clone(),
            query: stmt.query.clone(),
            columns: stmt.columns.clone(),
        };
        let mut batch = MutationBatch::default();
        let put = batch.put("view", to_value(&def)?);
        batch.set_ref_to_put(ref_name, put);
        batch.emit(Event::ViewCreated { name: stmt.name.clone() });
        Ok(batch)
    }
}

pub(crate) struct ViewDropGate;

impl StateGate for ViewDropGate {
    fn signature(&self) -> &'static str {
        "view_drop_execute"
    }

    fn reads(&self, event: &Event) -> Result<ReadSet> {
        let Event::ViewDropExecute(stmt) = event else {
            return Ok(ReadSet::new());
        };
        Ok(ReadSet::new().with_ref(paths::view_ref(&stmt.name)))
    }

    fn apply(&self, event: &Event, state: &ResolvedState) -> Result<MutationBatch> {
        let Event::ViewDropExecute(stmt) = event else {
            return Err(Error::Runtime("view_drop_execute received a foreign event".into()));
        };
        let ref_name = paths::view_ref(&stmt.name);
        if state.get_ref(&ref_name).is_none() {
            return Err(Error::Schema(format!("no such view '{}'", stmt.name)));
        }
        let mut batch = MutationBatch::default();
        batch.delete_ref(ref_name);
        batch.emit(Event::ViewDropped { name: stmt.name.clone() });
        Ok(batch)
    }
}

pub(crate) struct TriggerCreateGate;

impl StateGate for TriggerCreateGate {
    fn signature(&self) -> &'static str {
        "trigger_create_execute"
    }

    fn reads(&self, event: &Event) -> Result<ReadSet> {
        let Event::TriggerCreateExecute(stmt) = event else {
            return Ok(ReadSet::new());
        };
        Ok(ReadSet::new().with_ref(paths::trigger_ref(&stmt.name)))
    }

    fn apply(&self, event: &Event, state: &ResolvedState) -> Result<MutationBatch> {
        let Event::TriggerCreateExecute(stmt) = event else {
            return Err(Error::Runtime("trigger_create_execute received a foreign event".into()));
        };
        let ref_name = paths::trigger_ref(&stmt.name);
        if state.get_ref(&ref_name).is_some() {
            return Err(Error::Schema(format!("trigger '{}' already exists", stmt.name)));
        }
        let def = TriggerDef {
            name: stmt.name.clone(),
            table: stmt.table.clone(),
            timing: stmt.timing.clone(),
            event: stmt.event.clone(),
            body: stmt.body.clone(),
        };
        let mut batch = MutationBatch::default();
        let put = batch.put("trigger", to_value(&def)?);
        batch.set_ref_to_put(ref_name, put);
        batch.emit(Event::TriggerCreated { name: stmt.name.clone() });
        Ok(batch)
    }
}

pub(crate) struct TriggerDropGate;

impl StateGate for TriggerDropGate {
    fn signature(&self) -> &'static str {
        "trigger_drop_execute"
    }

    fn reads(&self, event: &Event) -> Result<ReadSet> {
        let Event::TriggerDropExecute(stmt) = event else {
            return Ok(ReadSet::new());
        };
        Ok(ReadSet::new().with_ref(paths::trigger_ref(&stmt.name)))
    }

    fn apply(&self, event: &Event, state: &ResolvedState) -> Result<MutationBatch> {
        let Event::TriggerDropExecute(stmt) = event else {
            return Err(Error::Runtime("trigger_drop_execute received a foreign event".into()));
        };
        let ref_name = paths::trigger_ref(&stmt.name);
        if state.get_ref(&ref_name).is_none() {
            return Err(Error::Schema(format!("no such trigger '{}'", stmt.name)));
        }
        let mut batch = MutationBatch::default();
        batch.delete_ref(ref_name);
        batch.emit(Event::TriggerDropped { name: stmt.name.clone() });
        Ok(batch)
    }
}
