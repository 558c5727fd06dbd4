use std::collections::HashSet;

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::ops::gc::garbage_collect;
use crate::ops::history::get_history;
use crate::ops::{backup_current_state, point_head_at, restore_tree};
use crate::project::Project;
use crate::retry::Rollback;

/// remove the most recent checkpoint and return to its parent
///
/// guarded three ways: the target must be the tip of history, history
/// must hold at least two checkpoints, and the target must have a parent.
/// the working tree is backed up, HEAD moves to the parent, the parent's
/// tree is restored, the target commit object is deleted and gc sweeps
/// what became unreachable.
pub fn delete_latest_checkpoint(
    project: &Project,
    config: &Config,
    target: &Hash,
    rollback: &mut Rollback,
) -> Result<()> {
    let history = get_history(project, None)?;
    let latest = history.first().ok_or(Error::NoCheckpoints)?;

    if latest.hash != *target {
        return Err(Error::NotLatestCheckpoint(*target));
    }
    if history.len() < 2 || latest.parents.is_empty() {
        return Err(Error::CannotDeleteInitial(*target));
    }

    let (backup_ref, _) = backup_current_state(project, config, "before delete")?;
    debug!(backup = %backup_ref, "recorded pre-delete backup");

    let parent = latest.parents[0];
    let parent_commit = project.store().get_commit(&parent)?;

    point_head_at(project, &parent, rollback)?;
    restore_tree(project.store(), &parent_commit.tree, project.workdir(), true)?;

    if let Err(e) = project.store().delete(target) {
        warn!(hash = %target.short(), error = %e, "failed to delete checkpoint object");
    }

    garbage_collect(project)?;
    Ok(())
}

/// destructively truncate history back to a checkpoint
///
/// the working tree is backed up, HEAD moves to the target, the target's
/// tree is restored, and every commit reachable from the previous HEAD
/// that is not an ancestor of the target has its commit object deleted
/// explicitly. gc then removes the trees and blobs that lost their last
/// referent; anything shared with surviving checkpoints is retained by
/// reachability.
pub fn reset_to_checkpoint(
    project: &Project,
    config: &Config,
    target: &Hash,
    rollback: &mut Rollback,
) -> Result<()> {
    let target_commit = project.store().get_commit(target)?;
    let old_head = project.head_commit()?;

    let (backup_ref, _) = backup_current_state(project, config, "before reset")?;
    debug!(backup = %backup_ref, "recorded pre-reset backup");

    point_head_at(project, target, rollback)?;
    restore_tree(project.store(), &target_commit.tree, project.workdir(), true)?;

    if let Some(old_head) = old_head {
        let keep = reachable_commits(project, target);
        let doomed: Vec<Hash> = reachable_commits(project, &old_head)
            .into_iter()
            .filter(|hash| !keep.contains(hash))
            .collect();

        for hash in doomed {
            if let Err(e) = project.store().delete(&hash) {
                warn!(hash = %hash.short(), error = %e, "failed to delete truncated checkpoint");
            }
        }
    }

    garbage_collect(project)?;
    Ok(())
}

/// commit hashes reachable from a starting commit, tolerant of gaps
fn reachable_commits(project: &Project, start: &Hash) -> HashSet<Hash> {
    let mut seen = HashSet::new();
    let mut queue = vec![*start];

    while let Some(hash) = queue.pop() {
        if !seen.insert(hash) {
            continue;
        }
        match project.store().get_commit(&hash) {
            Ok(commit) => queue.extend(commit.parents),
            Err(e) => {
                debug!(hash = %hash.short(), error = %e, "commit walk hit a gap");
                seen.remove(&hash);
            }
        }
    }

    seen
}
