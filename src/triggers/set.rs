use serde::{Deserialize, Serialize};

/// Event a trigger subscribes to
pub const UPDATE_REFERENCE_EVENT: &str = "updateReference";

/// Name of the update trigger owned by `branch`
///
/// Slashes in `branch` are kept, so `feature/login` owns `trigger-feature/login-updates`.
pub fn trigger_name(branch: &str) -> String {
    format!("trigger-{}-updates", branch)
}

/// Where archives for a branch are published and which pipeline consumes them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineTarget {
    pub pipeline_name: String,
    pub bucket: String,
}

/// A server-side registration invoking `destination_arn` on branch updates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub name: String,
    pub destination_arn: String,
    /// Opaque JSON handed back to the destination with every event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<String>,
    #[serde(default)]
    pub branches: Vec<String>,
    #[serde(default)]
    pub events: Vec<String>,
}

impl Trigger {
    /// Build the update trigger for `branch`
    pub fn for_branch(branch: &str, destination: &str, target: &PipelineTarget) -> Self {
        let custom_data = serde_json::json!({
            "pipeline_name": target.pipeline_name,
            "bucket": target.bucket,
        });

        Self {
            name: trigger_name(branch),
            destination_arn: destination.to_string(),
            custom_data: Some(custom_data.to_string()),
            branches: vec![branch.to_string()],
            events: vec![UPDATE_REFERENCE_EVENT.to_string()],
        }
    }
}

/// Result of inserting a trigger into a set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
}

/// A repository's triggers, ordered, keyed by name
///
/// Lists read from the remote are kept verbatim, including any duplicate
/// names another writer may have left behind. [`TriggerSet::upsert`]
/// collapses duplicates; [`TriggerSet::remove_first`] does not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerSet {
    triggers: Vec<Trigger>,
}

impl TriggerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `trigger`, replacing any trigger with the same name.
    ///
    /// Every name keeps the position of its first occurrence and the value of
    /// its last, so a replaced trigger stays where it was and any pre-existing
    /// duplicates are collapsed. Other triggers are left untouched.
    pub fn upsert(&mut self, trigger: Trigger) -> UpsertOutcome {
        let outcome = if self.get(&trigger.name).is_some() {
            UpsertOutcome::Replaced
        } else {
            UpsertOutcome::Inserted
        };

        let mut merged: Vec<Trigger> = Vec::with_capacity(self.triggers.len() + 1);
        for candidate in self.triggers.drain(..).chain(std::iter::once(trigger)) {
            match merged.iter().position(|t| t.name == candidate.name) {
                Some(pos) => merged[pos] = candidate,
                None => merged.push(candidate),
            }
        }
        self.triggers = merged;

        outcome
    }

    /// Remove the first trigger named `name`, if any. Later duplicates stay.
    pub fn remove_first(&mut self, name: &str) -> Option<Trigger> {
        let pos = self.triggers.iter().position(|t| t.name == name)?;
        Some(self.triggers.remove(pos))
    }

    /// First trigger named `name`
    pub fn get(&self, name: &str) -> Option<&Trigger> {
        self.triggers.iter().find(|t| t.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trigger> {
        self.triggers.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.triggers.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn as_slice(&self) -> &[Trigger] {
        &self.triggers
    }

    pub fn into_vec(self) -> Vec<Trigger> {
        self.triggers
    }
}

impl From<Vec<Trigger>> for TriggerSet {
    fn from(triggers: Vec<Trigger>) -> Self {
        Self { triggers }
    }
}

/// A change to apply to a trigger set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOperation {
    Upsert(Trigger),
    Remove { name: String },
}

impl TriggerOperation {
    /// Upsert the update trigger for `branch`
    pub fn upsert_branch(branch: &str, destination: &str, target: &PipelineTarget) -> Self {
        TriggerOperation::Upsert(Trigger::for_branch(branch, destination, target))
    }

    /// Remove the update trigger for `branch`
    pub fn remove_branch(branch: &str) -> Self {
        TriggerOperation::Remove {
            name: trigger_name(branch),
        }
    }
}

/// Apply `operation` to `current`, with no I/O
pub fn reconcile(mut current: TriggerSet, operation: &TriggerOperation) -> TriggerSet {
    match operation {
        TriggerOperation::Upsert(trigger) => {
            current.upsert(trigger.clone());
        }
        TriggerOperation::Remove { name } => {
            current.remove_first(name);
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(pipeline: &str) -> PipelineTarget {
        PipelineTarget {
            pipeline_name: pipeline.to_string(),
            bucket: "artifacts-bucket".to_string(),
        }
    }

    fn trigger(branch: &str, destination: &str) -> Trigger {
        Trigger::for_branch(branch, destination, &target("pipe"))
    }

    #[test]
    fn test_trigger_name_format() {
        assert_eq!(trigger_name("feature-x"), "trigger-feature-x-updates");
    }

    #[test]
    fn test_for_branch_fields() {
        let t = Trigger::for_branch("dev", "arn:aws:lambda:fn", &target("build-dev"));

        assert_eq!(t.name, "trigger-dev-updates");
        assert_eq!(t.destination_arn, "arn:aws:lambda:fn");
        assert_eq!(t.branches, vec!["dev".to_string()]);
        assert_eq!(t.events, vec![UPDATE_REFERENCE_EVENT.to_string()]);

        let data: serde_json::Value =
            serde_json::from_str(t.custom_data.as_deref().unwrap()).unwrap();
        assert_eq!(data["pipeline_name"], "build-dev");
        assert_eq!(data["bucket"], "artifacts-bucket");
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut set = TriggerSet::from(vec![trigger("a", "arnA"), trigger("b", "arnB")]);

        let outcome = set.upsert(trigger("b", "arnX"));

        assert_eq!(outcome, UpsertOutcome::Replaced);
        assert_eq!(set.names(), vec!["trigger-a-updates", "trigger-b-updates"]);
        assert_eq!(set.get("trigger-b-updates").unwrap().destination_arn, "arnX");
        assert_eq!(set.get("trigger-a-updates").unwrap().destination_arn, "arnA");
    }

    #[test]
    fn test_upsert_twice_leaves_one_trigger_with_second_fields() {
        let mut set = TriggerSet::new();
        assert_eq!(set.upsert(trigger("x", "first")), UpsertOutcome::Inserted);
        assert_eq!(set.upsert(trigger("x", "second")), UpsertOutcome::Replaced);

        assert_eq!(set.len(), 1);
        assert_eq!(set.get("trigger-x-updates").unwrap().destination_arn, "second");
    }

    #[test]
    fn test_upsert_appends_new_names() {
        let mut set = TriggerSet::from(vec![trigger("a", "arnA")]);
        set.upsert(trigger("c", "arnC"));
        assert_eq!(set.names(), vec!["trigger-a-updates", "trigger-c-updates"]);
    }

    #[test]
    fn test_upsert_preserves_foreign_triggers() {
        let foreign = Trigger {
            name: "notify-slack".to_string(),
            destination_arn: "arn:aws:sns:topic".to_string(),
            custom_data: None,
            branches: vec![],
            events: vec!["all".to_string()],
        };
        let mut set = TriggerSet::from(vec![foreign.clone()]);
        set.upsert(trigger("a", "arnA"));

        assert_eq!(set.as_slice()[0], foreign);
    }

    #[test]
    fn test_upsert_collapses_existing_duplicates() {
        let mut set = TriggerSet::from(vec![
            trigger("a", "arnA1"),
            trigger("b", "arnB"),
            trigger("a", "arnA2"),
        ]);
        set.upsert(trigger("c", "arnC"));

        assert_eq!(
            set.names(),
            vec!["trigger-a-updates", "trigger-b-updates", "trigger-c-updates"]
        );
        assert_eq!(set.get("trigger-a-updates").unwrap().destination_arn, "arnA2");
    }

    #[test]
    fn test_remove_first_only() {
        let mut set = TriggerSet::from(vec![
            trigger("a", "arnA1"),
            trigger("b", "arnB"),
            trigger("a", "arnA2"),
        ]);

        let removed = set.remove_first("trigger-a-updates").unwrap();

        assert_eq!(removed.destination_arn, "arnA1");
        assert_eq!(set.names(), vec!["trigger-b-updates", "trigger-a-updates"]);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let original = TriggerSet::from(vec![trigger("a", "arnA")]);
        let after = reconcile(original.clone(), &TriggerOperation::remove_branch("zzz"));
        assert_eq!(after, original);
    }

    #[test]
    fn test_upsert_then_remove_round_trip() {
        let original = TriggerSet::from(vec![
            trigger("a", "arnA"),
            trigger("b", "arnB"),
            trigger("c", "arnC"),
        ]);

        let upserted = reconcile(
            original.clone(),
            &TriggerOperation::upsert_branch("feature-x", "arnF", &target("pipe")),
        );
        assert_eq!(upserted.len(), 4);

        let restored = reconcile(upserted, &TriggerOperation::remove_branch("feature-x"));
        assert_eq!(restored, original);
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let t = trigger("a", "arnA");
        let json = serde_json::to_value(&t).unwrap();

        assert_eq!(json["destinationArn"], "arnA");
        assert!(json.get("customData").is_some());
        assert!(json.get("destination_arn").is_none());
    }

    #[test]
    fn test_deserializes_remote_trigger_without_optional_fields() {
        let json = r#"{"name": "legacy", "destinationArn": "arn:x", "events": ["all"]}"#;
        let t: Trigger = serde_json::from_str(json).unwrap();

        assert_eq!(t.name, "legacy");
        assert!(t.custom_data.is_none());
        assert!(t.branches.is_empty());
    }
}
