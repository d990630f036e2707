//! Per-branch update triggers and their reconciliation
//!
//! [`reconcile`] is the pure `(TriggerSet, TriggerOperation) -> TriggerSet`
//! step; [`TriggerRegistry`] runs it against a remote trigger store.

mod registry;
mod set;

pub use registry::TriggerRegistry;
pub use set::{
    reconcile, trigger_name, PipelineTarget, Trigger, TriggerOperation, TriggerSet,
    UpsertOutcome, UPDATE_REFERENCE_EVENT,
};
