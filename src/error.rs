use std::path::PathBuf;

use crate::Hash;

/// error type for checkpoint operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("ref not found: {0}")]
    RefNotFound(String),

    #[error("branch not found: {0}")]
    BranchNotFound(String),

    #[error("invalid ref name: {0}")]
    InvalidRef(String),

    #[error("symbolic ref cycle through {0}")]
    RefCycle(String),

    #[error("path not found in tree: {0}")]
    PathNotFound(String),

    #[error("object not found: {0}")]
    ObjectNotFound(Hash),

    #[error("no object matches prefix {0}")]
    UnknownPrefix(String),

    #[error("ambiguous hash prefix {prefix}: matches {candidates:?}")]
    AmbiguousHash {
        prefix: String,
        /// sample of up to 3 matching hashes
        candidates: Vec<Hash>,
    },

    #[error("corrupt object {hash}: {reason}")]
    CorruptObject { hash: Hash, reason: String },

    #[error("expected {expected} object at {hash}, found {actual}")]
    UnexpectedObjectKind {
        hash: Hash,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("{0} is not the latest checkpoint")]
    NotLatestCheckpoint(Hash),

    #[error("cannot delete {0}: it is the only checkpoint or has no parent")]
    CannotDeleteInitial(Hash),

    #[error("no checkpoints exist for this project")]
    NoCheckpoints,

    #[error("invalid tree entry name: {0}")]
    InvalidEntryName(String),

    #[error("invalid hash hex: {0}")]
    InvalidHashHex(String),

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// helper to wrap io errors with path context
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}
