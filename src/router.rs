//! Dispatch of reference-change events to the archiver and the trigger registry.

use serde::Serialize;

use crate::{
    archive::{ArchiveBuilder, Compression, ExtraMembers},
    backend::Backend,
    error::{CollaboratorContext, Error, Result},
    event::{Event, EventCustomData, EventRecord, RefAction, RefChange, Reference, SkipReason},
    repository::RepositoryRef,
    tree::DEFAULT_MAX_DEPTH,
    triggers::TriggerRegistry,
};

/// Extra archive member carrying the commit being built
pub const COMMIT_INFO_MEMBER: &str = "commit_info.json";

/// Knobs the router passes down to the archiver and classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterSettings {
    pub protected_branches: Vec<String>,
    pub artifact_prefix: String,
    pub compression: Compression,
    pub max_tree_depth: usize,
    pub show_progress: bool,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            protected_branches: vec!["master".to_string()],
            artifact_prefix: "artifacts".to_string(),
            compression: Compression::default(),
            max_tree_depth: DEFAULT_MAX_DEPTH,
            show_progress: false,
        }
    }
}

/// What became of one reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefOutcome {
    /// Archive uploaded and pipeline started; `trigger_registered` on create
    Published {
        repository: String,
        branch: String,
        key: String,
        execution_id: String,
        trigger_registered: bool,
    },
    TriggerRemoved {
        repository: String,
        branch: String,
    },
    Skipped {
        reference: String,
        reason: SkipReason,
    },
    /// The failure was logged and swallowed
    Failed {
        reference: Option<String>,
        error: String,
    },
}

impl std::fmt::Display for RefOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefOutcome::Published {
                repository,
                branch,
                key,
                execution_id,
                trigger_registered,
            } => {
                write!(
                    f,
                    "published {}:{} to {} (execution {})",
                    repository, branch, key, execution_id
                )?;
                if *trigger_registered {
                    write!(f, ", trigger registered")?;
                }
                Ok(())
            }
            RefOutcome::TriggerRemoved { repository, branch } => {
                write!(f, "removed trigger for {}:{}", repository, branch)
            }
            RefOutcome::Skipped { reference, reason } => {
                write!(f, "skipped {} ({})", reference, reason)
            }
            RefOutcome::Failed { reference, error } => match reference {
                Some(reference) => write!(f, "failed {}: {}", reference, error),
                None => write!(f, "failed: {}", error),
            },
        }
    }
}

/// Routes every reference of every record in an event
///
/// No failure escapes [`EventRouter::handle_event`] or [`EventRouter::route`]:
/// errors are logged and reported as [`RefOutcome::Failed`] so the event
/// source never sees a poison event.
pub struct EventRouter<'a, B: Backend + ?Sized> {
    backend: &'a B,
    settings: RouterSettings,
}

impl<'a, B: Backend + ?Sized> EventRouter<'a, B> {
    pub fn new(backend: &'a B, settings: RouterSettings) -> Self {
        Self { backend, settings }
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    /// Parse and route a JSON event
    pub fn handle_event(&self, json: &str) -> Vec<RefOutcome> {
        match Event::parse(json) {
            Ok(event) => self.route(&event),
            Err(e) => {
                tracing::error!("An error occurred when processing trigger event: {}", e);
                vec![RefOutcome::Failed {
                    reference: None,
                    error: e.to_string(),
                }]
            }
        }
    }

    pub fn route(&self, event: &Event) -> Vec<RefOutcome> {
        if event.records.is_empty() {
            tracing::warn!("Event carries no records");
        }

        let mut outcomes = Vec::new();
        for record in &event.records {
            let repository = match record.repository_name() {
                Ok(name) => name,
                Err(e) => {
                    tracing::error!("An error occurred when processing trigger event: {}", e);
                    outcomes.push(RefOutcome::Failed {
                        reference: None,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            match record.event_time() {
                Ok(Some(time)) => tracing::debug!(
                    "Event from {} at {} via {}",
                    repository,
                    time.to_rfc3339(),
                    record.event_trigger_name.as_deref().unwrap_or("unknown trigger")
                ),
                Ok(None) => {}
                Err(e) => tracing::warn!("Ignoring event time: {}", e),
            }

            for reference in &record.codecommit.references {
                let outcome = match self.route_reference(record, repository, reference) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::error!(
                            "An error occurred when processing {} on {}: {}",
                            reference.name,
                            repository,
                            e
                        );
                        RefOutcome::Failed {
                            reference: Some(reference.name.clone()),
                            error: e.to_string(),
                        }
                    }
                };
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    fn route_reference(
        &self,
        record: &EventRecord,
        repository: &str,
        reference: &Reference,
    ) -> Result<RefOutcome> {
        let (action, branch, commit) = match reference.classify(&self.settings.protected_branches) {
            RefChange::Branch {
                action,
                branch,
                commit,
            } => (action, branch, commit),
            RefChange::Skipped { reference, reason } => {
                tracing::info!("Skipping {}: {}", reference, reason);
                return Ok(RefOutcome::Skipped { reference, reason });
            }
        };
        tracing::debug!("Handling {} of {} on {}", action, branch, repository);

        match action {
            RefAction::Create => {
                let data = record.custom_data()?;
                let destination = data.pipeline_exec_function.as_deref().ok_or_else(|| {
                    Error::MalformedEvent(
                        "customData has no pipeline_exec_function for a created branch"
                            .to_string(),
                    )
                })?;

                TriggerRegistry::new(self.backend).upsert(
                    repository,
                    &branch,
                    destination,
                    &data.target(),
                )?;
                self.publish(repository, branch, &commit, &data, true)
            }
            RefAction::Update => {
                let data = record.custom_data()?;
                self.publish(repository, branch, &commit, &data, false)
            }
            RefAction::Delete => {
                TriggerRegistry::new(self.backend).remove(repository, &branch)?;
                Ok(RefOutcome::TriggerRemoved {
                    repository: repository.to_string(),
                    branch,
                })
            }
        }
    }

    /// Archive `commit`, upload it and start the pipeline
    fn publish(
        &self,
        repository: &str,
        branch: String,
        commit: &str,
        data: &EventCustomData,
        trigger_registered: bool,
    ) -> Result<RefOutcome> {
        tracing::info!("Getting and archiving repository content");

        let commit_info = self.commit_info(repository, &branch, commit)?;
        let mut extra = ExtraMembers::new();
        extra.insert(COMMIT_INFO_MEMBER, commit_info);

        let archive = ArchiveBuilder::new(self.backend)
            .with_compression(self.settings.compression)
            .with_max_depth(self.settings.max_tree_depth)
            .with_progress(self.settings.show_progress)
            .build(&RepositoryRef::new(repository, commit), &extra)?;

        let key = format!("{}/{}", self.settings.artifact_prefix, data.pipeline_name);
        self.backend
            .put_blob(&data.bucket, &key, archive.content())
            .collaborator("putBlob")?;

        tracing::info!("Starting pipeline execution");
        let execution_id = self
            .backend
            .start_pipeline(&data.pipeline_name)
            .collaborator("startPipeline")?;
        tracing::info!(
            "Started {} execution {}",
            data.pipeline_name,
            execution_id
        );

        Ok(RefOutcome::Published {
            repository: repository.to_string(),
            branch,
            key,
            execution_id,
            trigger_registered,
        })
    }

    /// Commit metadata tagged with its branch and repository, 4-space indented
    fn commit_info(&self, repository: &str, branch: &str, commit: &str) -> Result<Vec<u8>> {
        let mut info = self
            .backend
            .get_commit(repository, commit)
            .collaborator("getCommit")?;

        let fields = info
            .get_mut("commit")
            .and_then(serde_json::Value::as_object_mut)
            .ok_or_else(|| Error::Collaborator {
                operation: "getCommit",
                source: anyhow::anyhow!("response for {} has no commit object", commit),
            })?;
        fields.insert("branchName".to_string(), branch.into());
        fields.insert("RepositoryName".to_string(), repository.into());

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        info.serialize(&mut serializer)
            .map_err(std::io::Error::from)?;
        Ok(buf)
    }
}
