use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::project::Project;

/// how an error relates to retrying
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// expected to clear on its own; retry with backoff
    Transient,
    /// will not improve with retries
    Permanent,
    /// unclear; retried a bounded number of times
    Unknown,
}

/// classify an error for the retry loop
pub fn classify(error: &Error) -> ErrorClass {
    use std::io::ErrorKind;

    match error {
        Error::Io { source, .. } => match source.kind() {
            ErrorKind::WouldBlock
            | ErrorKind::TimedOut
            | ErrorKind::Interrupted
            | ErrorKind::ResourceBusy => ErrorClass::Transient,
            ErrorKind::StorageFull | ErrorKind::ReadOnlyFilesystem | ErrorKind::InvalidInput => {
                ErrorClass::Permanent
            }
            // a vanished parent directory or a permission hiccup may be a
            // race with an external process; bounded retries
            ErrorKind::NotFound | ErrorKind::PermissionDenied => ErrorClass::Unknown,
            _ => ErrorClass::Unknown,
        },

        Error::CorruptObject { .. }
        | Error::UnexpectedObjectKind { .. }
        | Error::RefCycle(_)
        | Error::InvalidRef(_)
        | Error::InvalidEntryName(_)
        | Error::InvalidHashHex(_)
        | Error::RefNotFound(_)
        | Error::BranchNotFound(_)
        | Error::ObjectNotFound(_)
        | Error::UnknownPrefix(_)
        | Error::AmbiguousHash { .. }
        | Error::PathNotFound(_)
        | Error::NotLatestCheckpoint(_)
        | Error::CannotDeleteInitial(_)
        | Error::NoCheckpoints
        | Error::Unsupported(_)
        | Error::Config(_)
        | Error::ConfigSerialize(_) => ErrorClass::Permanent,
    }
}

/// bounds for the retry loop
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// exponential backoff with jitter: half the window fixed, half random
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.max_delay);
        let half = exp / 2;
        half + rand::rng().random_range(Duration::ZERO..=half)
    }
}

/// run an operation, retrying transient and unknown failures with backoff
///
/// the closure must re-establish its own preconditions on each attempt
/// (callers pair it with [`Rollback`] so a failed attempt unwinds before
/// the next one starts).
pub fn with_retry<T>(
    policy: &RetryPolicy,
    op_name: &str,
    mut f: impl FnMut() -> Result<T>,
) -> Result<T> {
    let mut attempt = 0;
    loop {
        match f() {
            Ok(value) => return Ok(value),
            Err(error) => {
                let class = classify(&error);
                attempt += 1;
                if class == ErrorClass::Permanent || attempt >= policy.max_attempts {
                    return Err(error);
                }
                let delay = policy.delay_for(attempt - 1);
                warn!(
                    operation = op_name,
                    attempt,
                    ?class,
                    error = %error,
                    "retrying after {:?}",
                    delay
                );
                std::thread::sleep(delay);
            }
        }
    }
}

enum Compensation {
    /// delete an object that was newly written and is disposable
    DeleteObject(Hash),
    /// put a ref back to its previous contents, or remove it if it did
    /// not exist
    RestoreRef {
        name: String,
        previous: Option<String>,
    },
}

/// best-effort undo log for a mutating operation
///
/// each mutating step records its compensation before (or right after)
/// executing; on failure the log runs in reverse. tree building is not
/// compensated: orphan blobs and trees are harmless and the next gc
/// collects them.
#[derive(Default)]
pub struct Rollback {
    steps: Vec<Compensation>,
}

impl Rollback {
    pub fn new() -> Self {
        Self::default()
    }

    /// mark a freshly written object as disposable on failure
    pub fn record_object(&mut self, hash: Hash) {
        self.steps.push(Compensation::DeleteObject(hash));
    }

    /// snapshot a ref's previous contents (None = it did not exist)
    pub fn record_ref(&mut self, name: &str, previous: Option<String>) {
        self.steps.push(Compensation::RestoreRef {
            name: name.to_string(),
            previous,
        });
    }

    /// execute the log in reverse, logging failures instead of raising
    pub fn run(&self, project: &Project) {
        for step in self.steps.iter().rev() {
            let outcome = match step {
                Compensation::DeleteObject(hash) => project
                    .store()
                    .delete(hash)
                    .map_err(|e| format!("delete object {}: {}", hash.short(), e)),
                Compensation::RestoreRef { name, previous } => match previous {
                    Some(contents) => project
                        .refs()
                        .write_raw(name, contents)
                        .map_err(|e| format!("restore ref {}: {}", name, e)),
                    None => project
                        .refs()
                        .delete(name)
                        .map_err(|e| format!("remove ref {}: {}", name, e)),
                },
            };
            if let Err(message) = outcome {
                warn!(%message, "rollback step failed");
            }
        }
    }
}
