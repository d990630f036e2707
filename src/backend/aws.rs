mod cli;
mod responses;

use std::{
    ffi::{OsStr, OsString},
    io::Write,
};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

pub use cli::AwsCli;
use responses::{GetFileResponse, GetTriggersResponse, PutTriggersRequest, StartPipelineResponse};

use super::traits::{Backend, BlobStore, PipelineRunner, RepositorySource, TriggerStore};
use crate::{
    repository::{FileContent, FolderListing},
    triggers::Trigger,
};

/// CodeCommit, S3 and CodePipeline, driven through the `aws` CLI
pub struct AwsBackend {
    cli: AwsCli,
}

impl AwsBackend {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }

    /// Write `content` to a temporary file the CLI can read from
    fn stage(content: &[u8]) -> Result<NamedTempFile> {
        let mut temp_file =
            NamedTempFile::new().context("Failed to create temporary file for aws input")?;
        temp_file
            .write_all(content)
            .context("Failed to write content to temporary file")?;
        temp_file
            .flush()
            .context("Failed to flush temporary file")?;
        Ok(temp_file)
    }
}

impl RepositorySource for AwsBackend {
    fn list_folder(
        &self,
        repository: &str,
        specifier: &str,
        folder_path: &str,
    ) -> Result<FolderListing> {
        self.cli.run_json(
            "codecommit",
            "get-folder",
            [
                "--repository-name",
                repository,
                "--commit-specifier",
                specifier,
                "--folder-path",
                folder_path,
            ],
        )
    }

    fn get_file(&self, repository: &str, specifier: &str, file_path: &str) -> Result<FileContent> {
        let response: GetFileResponse = self.cli.run_json(
            "codecommit",
            "get-file",
            [
                "--repository-name",
                repository,
                "--commit-specifier",
                specifier,
                "--file-path",
                file_path,
            ],
        )?;
        response.decode()
    }

    fn get_commit(&self, repository: &str, commit_id: &str) -> Result<serde_json::Value> {
        self.cli.run_json(
            "codecommit",
            "get-commit",
            ["--repository-name", repository, "--commit-id", commit_id],
        )
    }
}

impl TriggerStore for AwsBackend {
    fn get_triggers(&self, repository: &str) -> Result<Vec<Trigger>> {
        let response: GetTriggersResponse = self.cli.run_json(
            "codecommit",
            "get-repository-triggers",
            ["--repository-name", repository],
        )?;
        Ok(response.triggers)
    }

    fn put_triggers(&self, repository: &str, triggers: &[Trigger]) -> Result<()> {
        let request = PutTriggersRequest {
            repository_name: repository,
            triggers,
        };
        let body = serde_json::to_vec(&request).context("Failed to serialize triggers")?;
        let input = Self::stage(&body)?;

        let mut input_arg = OsString::from("file://");
        input_arg.push(input.path());

        self.cli.run(
            "codecommit",
            "put-repository-triggers",
            [OsStr::new("--cli-input-json"), input_arg.as_os_str()],
        )?;
        Ok(())
    }
}

impl BlobStore for AwsBackend {
    fn put_blob(&self, bucket: &str, key: &str, content: &[u8]) -> Result<()> {
        let body = Self::stage(content)?;

        self.cli.run(
            "s3api",
            "put-object",
            [
                OsStr::new("--bucket"),
                OsStr::new(bucket),
                OsStr::new("--key"),
                OsStr::new(key),
                OsStr::new("--body"),
                body.path().as_os_str(),
            ],
        )?;

        tracing::info!("Uploaded {} bytes to s3://{}/{}", content.len(), bucket, key);
        Ok(())
    }
}

impl PipelineRunner for AwsBackend {
    fn start_pipeline(&self, name: &str) -> Result<String> {
        let response: StartPipelineResponse = self.cli.run_json(
            "codepipeline",
            "start-pipeline-execution",
            ["--name", name],
        )?;
        Ok(response.pipeline_execution_id)
    }
}

impl Backend for AwsBackend {
    fn initialize(&self) -> Result<()> {
        let version = self.cli.version()?;
        tracing::debug!("Using {}", version);
        Ok(())
    }
}
