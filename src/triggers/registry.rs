use crate::{
    backend::TriggerStore,
    error::{CollaboratorContext, Result},
};

use super::set::{reconcile, trigger_name, PipelineTarget, TriggerOperation, TriggerSet};

/// Applies branch trigger reconciliation against a remote [`TriggerStore`]
///
/// Every call reads the whole list, applies the change and writes the whole
/// list back. There is no locking or versioning: two callers racing on the
/// same repository can silently drop one of their changes.
pub struct TriggerRegistry<'a, S: TriggerStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: TriggerStore + ?Sized> TriggerRegistry<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Current trigger set for `repository`
    pub fn list(&self, repository: &str) -> Result<TriggerSet> {
        self.store
            .get_triggers(repository)
            .map(TriggerSet::from)
            .collaborator("getRepositoryTriggers")
    }

    /// Register (or replace) the update trigger for `branch`
    pub fn upsert(
        &self,
        repository: &str,
        branch: &str,
        destination: &str,
        target: &PipelineTarget,
    ) -> Result<TriggerSet> {
        tracing::info!("Putting updates trigger for branch {}", branch);
        self.apply(
            repository,
            TriggerOperation::upsert_branch(branch, destination, target),
        )
    }

    /// Drop the update trigger for `branch`; a missing trigger is not an error
    pub fn remove(&self, repository: &str, branch: &str) -> Result<TriggerSet> {
        tracing::info!("Popping updates trigger for branch {}", branch);
        let name = trigger_name(branch);
        let set = self.apply(repository, TriggerOperation::remove_branch(branch))?;
        if set.get(&name).is_some() {
            tracing::warn!("Trigger {} still present after removal (duplicate entry)", name);
        }
        Ok(set)
    }

    fn apply(&self, repository: &str, operation: TriggerOperation) -> Result<TriggerSet> {
        let current = self.list(repository)?;
        tracing::debug!("Got triggers: {:?}", current.names());

        let updated = reconcile(current, &operation);
        tracing::debug!("Updating triggers: {:?}", updated.names());

        self.store
            .put_triggers(repository, updated.as_slice())
            .collaborator("putRepositoryTriggers")?;
        Ok(updated)
    }
}
