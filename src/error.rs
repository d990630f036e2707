use thiserror::Error;

/// Errors surfaced by the archiver core and the event router
#[derive(Debug, Error)]
pub enum Error {
    /// A remote call (listing, fetch, trigger read/write, blob write, pipeline start) failed
    #[error("{operation} failed: {source:#}")]
    Collaborator {
        operation: &'static str,
        source: anyhow::Error,
    },

    /// The inbound event did not have the expected shape
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// An operation was attempted on an archive that is already finalized
    #[error("Archive state error: {0}")]
    ArchiveState(String),

    /// Two members resolved to the same name inside one archive
    #[error("Duplicate archive member: {0}")]
    DuplicateMember(String),

    /// Folder nesting went past the configured guard
    #[error("Folder {path} exceeds the maximum tree depth of {limit}")]
    TreeTooDeep { path: String, limit: usize },

    /// The archive does not fit in the Zip32 format
    #[error("Archive limit exceeded: {0}")]
    ArchiveLimit(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Tags a collaborator failure with the operation that produced it
pub(crate) trait CollaboratorContext<T> {
    fn collaborator(self, operation: &'static str) -> Result<T>;
}

impl<T> CollaboratorContext<T> for anyhow::Result<T> {
    fn collaborator(self, operation: &'static str) -> Result<T> {
        self.map_err(|source| Error::Collaborator { operation, source })
    }
}
