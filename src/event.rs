//! Reference-change notifications as delivered by repository triggers.

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

use crate::{
    error::{Error, Result},
    triggers::PipelineTarget,
};

/// Prefix of references that name a branch
pub const BRANCH_REF_PREFIX: &str = "refs/heads/";

const EVENT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// Top-level notification envelope
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

impl Event {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::MalformedEvent(e.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    #[serde(rename = "eventSourceARN")]
    pub event_source_arn: String,
    #[serde(default)]
    pub event_time: Option<String>,
    #[serde(default)]
    pub event_trigger_name: Option<String>,
    /// JSON document attached to the trigger that fired
    #[serde(default)]
    pub custom_data: Option<String>,
    pub codecommit: CodeCommitPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodeCommitPayload {
    #[serde(default)]
    pub references: Vec<Reference>,
}

/// One changed reference
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Reference {
    pub commit: String,
    #[serde(rename = "ref")]
    pub name: String,
    #[serde(default)]
    pub created: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl EventRecord {
    /// Repository name: the last `:` separated segment of the source ARN
    pub fn repository_name(&self) -> Result<&str> {
        match self.event_source_arn.rsplit(':').next() {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(Error::MalformedEvent(format!(
                "no repository name in eventSourceARN {:?}",
                self.event_source_arn
            ))),
        }
    }

    pub fn custom_data(&self) -> Result<EventCustomData> {
        let raw = self
            .custom_data
            .as_deref()
            .ok_or_else(|| Error::MalformedEvent("customData is missing".to_string()))?;
        serde_json::from_str(raw)
            .map_err(|e| Error::MalformedEvent(format!("customData is not valid: {}", e)))
    }

    pub fn event_time(&self) -> Result<Option<DateTime<FixedOffset>>> {
        self.event_time
            .as_deref()
            .map(|t| {
                DateTime::parse_from_str(t, EVENT_TIME_FORMAT)
                    .map_err(|e| Error::MalformedEvent(format!("eventTime {:?}: {}", t, e)))
            })
            .transpose()
    }
}

/// Payload configured on the trigger (or the lifecycle trigger) that fired
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventCustomData {
    /// Destination for the per-branch update trigger. Only needed on create.
    #[serde(default)]
    pub pipeline_exec_function: Option<String>,
    pub pipeline_name: String,
    pub bucket: String,
}

impl EventCustomData {
    pub fn target(&self) -> PipelineTarget {
        PipelineTarget {
            pipeline_name: self.pipeline_name.clone(),
            bucket: self.bucket.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefAction {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for RefAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RefAction::Create => "create",
            RefAction::Update => "update",
            RefAction::Delete => "delete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotABranch,
    EmptyBranch,
    Protected,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            SkipReason::NotABranch => "not a branch",
            SkipReason::EmptyBranch => "empty branch name",
            SkipReason::Protected => "protected branch",
        };
        f.write_str(reason)
    }
}

/// What a reference change asks the router to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefChange {
    Branch {
        action: RefAction,
        branch: String,
        commit: String,
    },
    Skipped {
        reference: String,
        reason: SkipReason,
    },
}

impl Reference {
    /// Classify against `protected` branch names. `deleted` wins over `created`.
    pub fn classify(&self, protected: &[String]) -> RefChange {
        let skipped = |reason| RefChange::Skipped {
            reference: self.name.clone(),
            reason,
        };

        let Some(branch) = self.name.strip_prefix(BRANCH_REF_PREFIX) else {
            return skipped(SkipReason::NotABranch);
        };
        if branch.is_empty() {
            return skipped(SkipReason::EmptyBranch);
        }
        if protected.iter().any(|p| p == branch) {
            return skipped(SkipReason::Protected);
        }

        let action = if self.deleted {
            RefAction::Delete
        } else if self.created {
            RefAction::Create
        } else {
            RefAction::Update
        };

        RefChange::Branch {
            action,
            branch: branch.to_string(),
            commit: self.commit.clone(),
        }
    }
}
