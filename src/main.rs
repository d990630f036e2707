#![deny(clippy::mod_module_files)]
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Read};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

use branch_archiver::{
    backend::{
        AwsBackend, AwsCli, Backend, BlobStore, FilesystemBackend, PipelineRunner,
        RepositorySource, TriggerStore,
    },
    config::BackendKind,
    repository::{FileContent, FolderListing},
    triggers::{PipelineTarget, Trigger},
    Config,
};

#[derive(Parser)]
#[command(
    name = "branch-archiver",
    version,
    about = "Archive repository branches and manage their update triggers"
)]
struct Cli {
    /// Config file (default: ~/.config/branch-archiver/config.yaml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Route a reference-change event read from a file or stdin
    HandleEvent {
        /// Event JSON file (default: stdin)
        #[arg(long, value_name = "FILE")]
        event: Option<PathBuf>,
    },
    /// Build the archive of one repository tree
    Archive {
        #[arg(long)]
        repository: String,
        /// Branch name or commit id
        #[arg(long)]
        specifier: String,
        /// Output zip (default: a kept temporary file)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Additional member, may be repeated
        #[arg(long = "member", value_name = "NAME=PATH", value_parser = commands::archive::parse_member)]
        members: Vec<(String, PathBuf)>,
    },
    /// Inspect or change per-branch update triggers
    Triggers {
        #[command(subcommand)]
        command: TriggersCommand,
    },
}

#[derive(Subcommand)]
enum TriggersCommand {
    List {
        #[arg(long)]
        repository: String,
    },
    Put {
        #[arg(long)]
        repository: String,
        #[arg(long)]
        branch: String,
        /// Execution target invoked on branch updates
        #[arg(long)]
        destination: String,
        #[arg(long)]
        pipeline_name: String,
        #[arg(long)]
        bucket: String,
    },
    Remove {
        #[arg(long)]
        repository: String,
        #[arg(long)]
        branch: String,
    },
}

/// Wrapper enum for the configured backend
enum Backends {
    Aws(AwsBackend),
    Filesystem(FilesystemBackend),
}

// Implement the backend traits for Backends by delegating to inner types
impl RepositorySource for Backends {
    fn list_folder(
        &self,
        repository: &str,
        specifier: &str,
        folder_path: &str,
    ) -> Result<FolderListing> {
        match self {
            Backends::Aws(b) => b.list_folder(repository, specifier, folder_path),
            Backends::Filesystem(b) => b.list_folder(repository, specifier, folder_path),
        }
    }

    fn get_file(&self, repository: &str, specifier: &str, file_path: &str) -> Result<FileContent> {
        match self {
            Backends::Aws(b) => b.get_file(repository, specifier, file_path),
            Backends::Filesystem(b) => b.get_file(repository, specifier, file_path),
        }
    }

    fn get_commit(&self, repository: &str, commit_id: &str) -> Result<serde_json::Value> {
        match self {
            Backends::Aws(b) => b.get_commit(repository, commit_id),
            Backends::Filesystem(b) => b.get_commit(repository, commit_id),
        }
    }
}

impl TriggerStore for Backends {
    fn get_triggers(&self, repository: &str) -> Result<Vec<Trigger>> {
        match self {
            Backends::Aws(b) => b.get_triggers(repository),
            Backends::Filesystem(b) => b.get_triggers(repository),
        }
    }

    fn put_triggers(&self, repository: &str, triggers: &[Trigger]) -> Result<()> {
        match self {
            Backends::Aws(b) => b.put_triggers(repository, triggers),
            Backends::Filesystem(b) => b.put_triggers(repository, triggers),
        }
    }
}

impl BlobStore for Backends {
    fn put_blob(&self, bucket: &str, key: &str, content: &[u8]) -> Result<()> {
        match self {
            Backends::Aws(b) => b.put_blob(bucket, key, content),
            Backends::Filesystem(b) => b.put_blob(bucket, key, content),
        }
    }
}

impl PipelineRunner for Backends {
    fn start_pipeline(&self, name: &str) -> Result<String> {
        match self {
            Backends::Aws(b) => b.start_pipeline(name),
            Backends::Filesystem(b) => b.start_pipeline(name),
        }
    }
}

impl Backend for Backends {
    fn initialize(&self) -> Result<()> {
        match self {
            Backends::Aws(b) => b.initialize(),
            Backends::Filesystem(b) => b.initialize(),
        }
    }
}

fn open_backend(config: &Config) -> Result<Backends> {
    let backend = match config.backend {
        BackendKind::Aws => {
            tracing::debug!("Using aws backend via {:?}", config.aws.cli_path);
            Backends::Aws(AwsBackend::new(AwsCli::new(
                config.aws.cli_path.clone(),
                config.aws.region.clone(),
                config.aws.profile.clone(),
            )))
        }
        BackendKind::Filesystem => {
            let root = config.filesystem_root()?;
            tracing::debug!("Using filesystem backend at {:?}", root);
            Backends::Filesystem(FilesystemBackend::new(root)?)
        }
    };

    backend.initialize()?;
    Ok(backend)
}

fn init_tracing(default_filter: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .with_context(|| format!("Invalid log filter {:?}", default_filter))?,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    init_tracing(&config.log_filter)?;

    let backend = open_backend(&config)?;
    let mut stdout = io::stdout().lock();

    match cli.command {
        Command::HandleEvent { event } => {
            let settings = config.router_settings();
            match event {
                Some(path) => {
                    let mut file = std::fs::File::open(&path)
                        .with_context(|| format!("Failed to open event file {:?}", path))?;
                    commands::handle_event::handle(&backend, settings, &mut file, &mut stdout)?;
                }
                None => {
                    let mut stdin = io::stdin().lock();
                    commands::handle_event::handle(&backend, settings, &mut stdin, &mut stdout)?;
                }
            }
        }
        Command::Archive {
            repository,
            specifier,
            output,
            members,
        } => {
            commands::archive::handle(
                &backend,
                commands::archive::ArchiveOptions {
                    repository: &repository,
                    specifier: &specifier,
                    output: output.as_deref(),
                    members: &members,
                    compression: config.compression,
                    max_tree_depth: config.max_tree_depth,
                    show_progress: config.show_progress,
                },
                &mut stdout,
            )?;
        }
        Command::Triggers { command } => match command {
            TriggersCommand::List { repository } => {
                commands::triggers::list(&backend, &mut stdout, &repository)?;
            }
            TriggersCommand::Put {
                repository,
                branch,
                destination,
                pipeline_name,
                bucket,
            } => {
                let target = PipelineTarget {
                    pipeline_name,
                    bucket,
                };
                commands::triggers::put(
                    &backend,
                    &mut stdout,
                    &repository,
                    &branch,
                    &destination,
                    &target,
                )?;
            }
            TriggersCommand::Remove { repository, branch } => {
                commands::triggers::remove(&backend, &mut stdout, &repository, &branch)?;
            }
        },
    }

    Ok(())
}
