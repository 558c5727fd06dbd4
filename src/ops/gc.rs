use std::collections::{HashSet, VecDeque};
use std::fs;

use tracing::warn;

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::Object;
use crate::project::Project;
use crate::refs::{BACKUPS_PREFIX, HEAD, HEADS_PREFIX};

/// gc statistics
#[derive(Debug, Default, Clone)]
pub struct GcStats {
    pub objects_scanned: usize,
    pub objects_removed: usize,
    pub bytes_freed: u64,
}

/// remove every object unreachable from the refs
///
/// roots are the resolved HEAD plus every ref under `refs/heads/` and
/// `refs/backups/`. marking walks commit → tree + parents and tree →
/// entries; a dangling referent is logged and skipped, never fatal, so
/// gc stays idempotent and safe to run after explicit deletions.
pub fn garbage_collect(project: &Project) -> Result<GcStats> {
    let mut roots = Vec::new();

    match project.refs().resolve(HEAD) {
        Ok(hash) => roots.push(hash),
        Err(Error::RefNotFound(_)) => {}
        Err(e) => return Err(e),
    }

    for prefix in [HEADS_PREFIX, BACKUPS_PREFIX] {
        for (name, content) in project.refs().list_under(prefix)? {
            match Hash::from_hex(&content) {
                Ok(hash) => roots.push(hash),
                Err(_) => warn!(ref_name = %name, "skipping ref with non-hash contents"),
            }
        }
    }

    let reachable = mark(project, &roots);

    // sweep: everything listed but unmarked goes away
    let mut stats = GcStats::default();
    for hash in project.store().list()? {
        stats.objects_scanned += 1;
        if reachable.contains(&hash) {
            continue;
        }

        let size = fs::metadata(project.store().object_path(&hash))
            .map(|m| m.len())
            .unwrap_or(0);
        match project.store().delete(&hash) {
            Ok(()) => {
                stats.objects_removed += 1;
                stats.bytes_freed += size;
            }
            Err(e) => warn!(hash = %hash.short(), error = %e, "failed to sweep object"),
        }
    }

    Ok(stats)
}

/// collect every hash reachable from the given roots
fn mark(project: &Project, roots: &[Hash]) -> HashSet<Hash> {
    let mut reachable = HashSet::new();
    let mut queue: VecDeque<Hash> = roots.iter().copied().collect();

    while let Some(hash) = queue.pop_front() {
        if !reachable.insert(hash) {
            continue;
        }

        match project.store().get(&hash) {
            Ok(Object::Commit(commit)) => {
                queue.push_back(commit.tree);
                queue.extend(commit.parents);
            }
            Ok(Object::Tree(entries)) => {
                for entry in entries {
                    queue.push_back(entry.hash);
                }
            }
            Ok(Object::Blob(_)) => {}
            Err(e) => {
                // dangling pointer: referent was explicitly deleted, or
                // the object is unreadable; stop traversing, keep going
                warn!(hash = %hash.short(), error = %e, "skipping unreadable object during mark");
            }
        }
    }

    reachable
}
