use anyhow::Result;
use std::io::Write;

use branch_archiver::{backend::TriggerStore, triggers::PipelineTarget, TriggerRegistry, TriggerSet};

fn print_set<W: Write>(output: &mut W, set: &TriggerSet) -> Result<()> {
    for trigger in set.iter() {
        writeln!(
            output,
            "{}\t{}\t{}",
            trigger.name,
            trigger.destination_arn,
            trigger.branches.join(",")
        )?;
    }
    Ok(())
}

/// Handle triggers list
pub fn list<S: TriggerStore + ?Sized, W: Write>(
    store: &S,
    output: &mut W,
    repository: &str,
) -> Result<()> {
    let set = TriggerRegistry::new(store).list(repository)?;
    print_set(output, &set)
}

/// Handle triggers put: register the update trigger of one branch
pub fn put<S: TriggerStore + ?Sized, W: Write>(
    store: &S,
    output: &mut W,
    repository: &str,
    branch: &str,
    destination: &str,
    target: &PipelineTarget,
) -> Result<()> {
    let set = TriggerRegistry::new(store).upsert(repository, branch, destination, target)?;
    print_set(output, &set)
}

/// Handle triggers remove
pub fn remove<S: TriggerStore + ?Sized, W: Write>(
    store: &S,
    output: &mut W,
    repository: &str,
    branch: &str,
) -> Result<()> {
    let set = TriggerRegistry::new(store).remove(repository, branch)?;
    print_set(output, &set)
}
