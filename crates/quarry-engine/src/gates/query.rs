//! The query-plan execution gate.

use quarry_stream::{Event, MutationBatch, ReadSet, ResolvedState, StateGate};
use quarry_types::Result;

use crate::exec::{plan_read_set, run_plan};

/// State gate keyed to `query_plan`: declares the tables the pipeline
/// touches, executes it against the resolved snapshot, emits the result.
pub(crate) struct QueryPlanGate;

impl StateGate for QueryPlanGate {
    fn signature(&self) -> &'static str {
        "query_plan"
    }

    fn reads(&self, event: &Event) -> Result<ReadSet> {
        let Event::QueryPlan { plan } = event else {
            return Ok(ReadSet::new());
        };
        Ok(plan_read_set(plan))
    }

    fn apply(&self, event: &Event, state: &ResolvedState) -> Result<MutationBatch> {
        let Event::QueryPlan { plan } = event else {
            return Err(quarry_types::Error::Runtime(
                "query_plan gate received a foreign event".into(),
            ));
        };
        let output = run_plan(plan, state)?;
        Ok(MutationBatch::events(vec![Event::QueryResult {
            rows: output.rows,
            columns: output.columns,
        }]))
    }
}
