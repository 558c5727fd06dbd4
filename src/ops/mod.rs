//! checkpoint operations over a project's storage

mod checkout;
mod create;
mod delete;
mod diff;
mod gc;
mod history;
mod stats;

pub use checkout::{checkout, CheckoutOptions};
pub use create::create_checkpoint;
pub use delete::{delete_latest_checkpoint, reset_to_checkpoint};
pub use diff::{get_checkpoint_changes, Change, ChangeKind, Diff, DiffStats};
pub use gc::{garbage_collect, GcStats};
pub use history::{get_file_content, get_history, list_files, CommitInfo, FileInfo};
pub use stats::{optimize_storage, storage_stats};

pub(crate) use checkout::{backup_current_state, restore_tree};
pub(crate) use create::point_head_at;
