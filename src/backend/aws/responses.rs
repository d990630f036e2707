//! JSON shapes of the `aws` CLI calls the backend makes.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::{repository::FileContent, triggers::Trigger};

/// `codecommit get-file`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFileResponse {
    pub file_path: String,
    /// Base64 as printed by the CLI
    pub file_content: String,
}

impl GetFileResponse {
    pub fn decode(self) -> Result<FileContent> {
        let content = STANDARD
            .decode(self.file_content.as_bytes())
            .with_context(|| format!("Failed to decode content of {}", self.file_path))?;
        Ok(FileContent {
            file_path: self.file_path,
            content,
        })
    }
}

/// `codecommit get-repository-triggers`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTriggersResponse {
    #[serde(default)]
    pub triggers: Vec<Trigger>,
}

/// Input document for `codecommit put-repository-triggers --cli-input-json`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PutTriggersRequest<'a> {
    pub repository_name: &'a str,
    pub triggers: &'a [Trigger],
}

/// `codepipeline start-pipeline-execution`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPipelineResponse {
    pub pipeline_execution_id: String,
}
