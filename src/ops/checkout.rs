use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::builder::build_tree;
use crate::config::Config;
use crate::error::{Error, IoResultExt, Result};
use crate::hash::Hash;
use crate::ignore::IgnoreSet;
use crate::object::Commit;
use crate::project::Project;
use crate::refs::{BACKUPS_PREFIX, HEADS_PREFIX};
use crate::store::ObjectStore;

/// checkout options
#[derive(Clone, Debug)]
pub struct CheckoutOptions {
    /// back up the current working tree before overwriting it
    pub overwrite: bool,
    /// restore recorded file modes (no-op on non-unix platforms)
    pub preserve_permissions: bool,
}

impl Default for CheckoutOptions {
    fn default() -> Self {
        Self {
            overwrite: true,
            preserve_permissions: true,
        }
    }
}

/// materialize a checkpoint into the project working directory
///
/// this is a safe restore: tracked paths are written over, untracked
/// files in the working directory are never deleted. with `overwrite` a
/// backup checkpoint of the pre-checkout state is recorded under
/// `refs/backups/` first. HEAD ends symbolic when `rev` named a branch,
/// detached otherwise.
pub fn checkout(
    project: &Project,
    config: &Config,
    rev: &str,
    options: CheckoutOptions,
) -> Result<()> {
    let commit_hash = project.resolve_revision(rev)?;
    let commit = project.store().get_commit(&commit_hash)?;

    if options.overwrite {
        let (backup_ref, _) = backup_current_state(project, config, "before checkout")?;
        debug!(backup = %backup_ref, "recorded pre-checkout backup");
    }

    restore_tree(
        project.store(),
        &commit.tree,
        project.workdir(),
        options.preserve_permissions,
    )?;

    match branch_of_rev(project, rev)? {
        Some(branch) => project
            .refs()
            .set_head(&format!("{}/{}", HEADS_PREFIX, branch))?,
        None => project.refs().set_head(&commit_hash.to_hex())?,
    }

    Ok(())
}

/// branch a revision string resolves through, if any
fn branch_of_rev(project: &Project, rev: &str) -> Result<Option<String>> {
    if rev == "HEAD" {
        return project.refs().current_branch();
    }
    if let Some(branch) = rev.strip_prefix("refs/heads/") {
        return Ok(Some(branch.to_string()));
    }
    if project.refs().exists(&format!("{}/{}", HEADS_PREFIX, rev)) {
        return Ok(Some(rev.to_string()));
    }
    Ok(None)
}

/// snapshot the current working tree as a commit and record it under a
/// fresh `refs/backups/backup-<n>` ref; HEAD does not move
pub(crate) fn backup_current_state(
    project: &Project,
    config: &Config,
    reason: &str,
) -> Result<(String, Hash)> {
    let ignore = IgnoreSet::new(&config.ignore_patterns);
    let tree = build_tree(
        project.store(),
        project.workdir(),
        &ignore,
        config.max_file_size,
    )?;

    let parents = project.head_commit()?.into_iter().collect();
    let commit = Commit::new(
        tree,
        parents,
        &config.author,
        format!("automatic backup {}", reason),
    );
    let hash = project.store().put_commit(&commit)?;

    let name = next_backup_name(project)?;
    project.refs().update(&name, &hash)?;
    Ok((name, hash))
}

/// next unused monotonic backup ref name
fn next_backup_name(project: &Project) -> Result<String> {
    let mut counter = chrono::Utc::now().timestamp_millis();
    loop {
        let name = format!("{}/backup-{}", BACKUPS_PREFIX, counter);
        if !project.refs().exists(&name) {
            return Ok(name);
        }
        counter += 1;
    }
}

/// write a tree's files and directories into `dest` without touching
/// anything the tree does not mention
pub(crate) fn restore_tree(
    store: &ObjectStore,
    tree: &Hash,
    dest: &Path,
    preserve_permissions: bool,
) -> Result<()> {
    fs::create_dir_all(dest).with_path(dest)?;

    for entry in store.get_tree(tree)? {
        let path = dest.join(&entry.name);

        if entry.is_tree() {
            fs::create_dir_all(&path).with_path(&path)?;
            restore_tree(store, &entry.hash, &path, preserve_permissions)?;
            apply_mode(&path, entry.mode, preserve_permissions)?;
        } else {
            let content = store.get_blob(&entry.hash)?;
            write_file_atomic(&path, &content)?;
            apply_mode(&path, entry.mode, preserve_permissions)?;
        }
    }

    Ok(())
}

/// write file contents via a temp sibling + rename so readers never see
/// a half-written file
fn write_file_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4()));
    {
        let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
        tmp_file.write_all(content).with_path(&tmp_path)?;
    }
    if let Err(source) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(Error::Io {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32, preserve_permissions: bool) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if !preserve_permissions {
        return Ok(());
    }
    let perm = mode & 0o7777;
    if perm == 0 {
        return Ok(());
    }
    fs::set_permissions(path, fs::Permissions::from_mode(perm)).with_path(path)
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: u32, _preserve_permissions: bool) -> Result<()> {
    Ok(())
}
