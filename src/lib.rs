//! waypoint - per-project checkpoint engine
//!
//! a content-addressed snapshot store for project working directories:
//! capture the full file tree as immutable hashed objects (deduplicated,
//! gzip-compressed), then check out, diff, walk history and garbage
//! collect. local filesystem only, one logical writer per project.
//!
//! # Core concepts
//!
//! - **Blob**: content-addressed file bytes
//! - **Tree**: a directory snapshot, an ordered list of entries
//! - **Commit**: a checkpoint - one tree plus parents, author, timestamp
//! - **Ref**: a named pointer to a commit; `HEAD` marks the current one
//!
//! every object is addressed by SHA-256 over `"<kind> <len>\0" ‖ body`
//! and stored under `objects/<2hex>/<62hex>`.
//!
//! # Example usage
//!
//! ```no_run
//! use std::path::Path;
//! use waypoint::{CheckoutOptions, Config, Engine};
//!
//! let engine = Engine::new(Config::default());
//! let project = Path::new("/path/to/project");
//!
//! // snapshot the working directory
//! let hash = engine.create_checkpoint(project, Some("before refactor"), None).unwrap();
//!
//! // later: restore it (the current state is backed up first)
//! engine.checkout(project, &hash.to_hex(), CheckoutOptions::default()).unwrap();
//! ```

mod builder;
mod config;
mod engine;
mod error;
mod hash;
mod ignore;
mod object;
mod project;
mod refs;
mod retry;
mod store;

pub mod ops;

pub use builder::build_tree;
pub use config::{Config, HistoryMode};
pub use engine::Engine;
pub use error::{Error, Result};
pub use hash::{object_hash, Hash};
pub use ignore::IgnoreSet;
pub use object::{Commit, EntryKind, Object, ObjectKind, TreeEntry};
pub use ops::CheckoutOptions;
pub use project::Project;
pub use refs::{RefStore, BACKUPS_PREFIX, HEAD, HEADS_PREFIX};
pub use retry::{classify, with_retry, ErrorClass, RetryPolicy, Rollback};
pub use store::{ObjectStore, StoreStats};
