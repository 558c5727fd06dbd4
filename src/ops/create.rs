use crate::builder::build_tree;
use crate::config::{Config, HistoryMode};
use crate::error::Result;
use crate::hash::Hash;
use crate::ignore::IgnoreSet;
use crate::object::Commit;
use crate::project::Project;
use crate::refs::{HEAD, HEADS_PREFIX};
use crate::retry::Rollback;

/// snapshot the project working directory as a new checkpoint
///
/// the working tree is captured into the object store, a commit is
/// written on top of the current HEAD (if any) and HEAD advances to it.
pub fn create_checkpoint(
    project: &Project,
    config: &Config,
    description: Option<&str>,
    author: Option<&str>,
    rollback: &mut Rollback,
) -> Result<Hash> {
    project.init()?;

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
        author.unwrap_or(&config.author),
        description.unwrap_or("checkpoint"),
    );

    let hash = project.store().put_commit(&commit)?;
    rollback.record_object(hash);

    advance_head(project, config.history, &hash, rollback)?;

    Ok(hash)
}

/// move HEAD onto a freshly created commit
///
/// with a symbolic HEAD the tracked branch is updated; a detached HEAD is
/// updated in place. on the very first checkpoint, branching mode creates
/// `refs/heads/main` and points HEAD at it symbolically, linear mode
/// leaves HEAD detached on the commit.
fn advance_head(
    project: &Project,
    mode: HistoryMode,
    hash: &Hash,
    rollback: &mut Rollback,
) -> Result<()> {
    let refs = project.refs();

    if let Some(branch) = refs.current_branch()? {
        let branch_ref = format!("{}/{}", HEADS_PREFIX, branch);
        rollback.record_ref(&branch_ref, refs.snapshot(&branch_ref)?);
        return refs.update(&branch_ref, hash);
    }

    if refs.exists(HEAD) {
        // detached head stays detached
        rollback.record_ref(HEAD, refs.snapshot(HEAD)?);
        return refs.update(HEAD, hash);
    }

    match mode {
        HistoryMode::Branching => {
            let main_ref = format!("{}/main", HEADS_PREFIX);
            rollback.record_ref(&main_ref, None);
            rollback.record_ref(HEAD, None);
            refs.update(&main_ref, hash)?;
            refs.set_head(&main_ref)
        }
        HistoryMode::Linear => {
            rollback.record_ref(HEAD, None);
            refs.update(HEAD, hash)
        }
    }
}

/// repoint HEAD (or the branch it tracks) at an existing commit; used by
/// delete-latest and reset
pub(crate) fn point_head_at(
    project: &Project,
    hash: &Hash,
    rollback: &mut Rollback,
) -> Result<()> {
    let refs = project.refs();

    if let Some(branch) = refs.current_branch()? {
        let branch_ref = format!("{}/{}", HEADS_PREFIX, branch);
        rollback.record_ref(&branch_ref, refs.snapshot(&branch_ref)?);
        refs.update(&branch_ref, hash)
    } else {
        rollback.record_ref(HEAD, refs.snapshot(HEAD)?);
        refs.update(HEAD, hash)
    }
}
