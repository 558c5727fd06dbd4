use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::Result;
use crate::hash::Hash;
use crate::object::TreeEntry;
use crate::ops::history::flatten_files;
use crate::project::Project;
use crate::store::ObjectStore;

/// kind of change between two snapshots
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
}

/// one changed path
#[derive(Clone, Debug)]
pub struct Change {
    pub kind: ChangeKind,
    /// path in the newer snapshot (for deletions, the old path)
    pub path: String,
    /// previous path, set for renames
    pub old_path: Option<String>,
    pub old_size: Option<u64>,
    pub new_size: Option<u64>,
}

/// aggregate counters over a diff
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub added: usize,
    pub modified: usize,
    pub deleted: usize,
    pub renamed: usize,
    /// bytes gained minus bytes lost across the change set
    pub net_size_change: i64,
}

/// changes introduced by a checkpoint relative to its first parent
#[derive(Clone, Debug)]
pub struct Diff {
    pub changes: Vec<Change>,
    pub stats: DiffStats,
    /// parent count of the commit; > 1 marks a merge diff
    pub parent_count: usize,
}

impl Diff {
    pub fn is_merge(&self) -> bool {
        self.parent_count > 1
    }
}

/// diff a checkpoint against its first parent
///
/// a commit without parents reports every file as added; merge commits
/// compare against parent[0] and carry their parent count.
pub fn get_checkpoint_changes(project: &Project, rev: &str) -> Result<Diff> {
    let commit_hash = project.resolve_revision(rev)?;
    let commit = project.store().get_commit(&commit_hash)?;

    let old_tree = match commit.parents.first() {
        Some(parent) => Some(project.store().get_commit(parent)?.tree),
        None => None,
    };

    let mut diff = diff_trees(project.store(), old_tree.as_ref(), &commit.tree)?;
    diff.parent_count = commit.parents.len();
    Ok(diff)
}

/// compare two trees file-by-file
///
/// rename detection pairs a deleted path with an added path carrying the
/// same blob hash; each blob hash drives at most one rename, and a
/// content-modified move stays a delete + add. directories themselves are
/// not reported, only the files under them.
pub fn diff_trees(
    store: &ObjectStore,
    old_tree: Option<&Hash>,
    new_tree: &Hash,
) -> Result<Diff> {
    let old_files = match old_tree {
        Some(tree) => flatten_to_map(store, tree)?,
        None => BTreeMap::new(),
    };
    let new_files = flatten_to_map(store, new_tree)?;

    let mut added: Vec<&String> = Vec::new();
    let mut modified = Vec::new();
    for (path, entry) in &new_files {
        match old_files.get(path) {
            None => added.push(path),
            Some(old_entry) if old_entry.hash != entry.hash => modified.push(path),
            Some(_) => {}
        }
    }

    let deleted: Vec<&String> = old_files
        .keys()
        .filter(|path| !new_files.contains_key(*path))
        .collect();

    // index added paths by blob hash for the rename pass
    let mut added_by_hash: HashMap<Hash, Vec<&String>> = HashMap::new();
    for &path in &added {
        added_by_hash.entry(new_files[path].hash).or_default().push(path);
    }

    let mut renames: Vec<(&String, &String)> = Vec::new(); // (old, new)
    let mut claimed_new: HashSet<&String> = HashSet::new();
    let mut used_hashes: HashSet<Hash> = HashSet::new();
    let mut still_deleted: Vec<&String> = Vec::new();

    for old_path in deleted {
        let hash = old_files[old_path].hash;
        if used_hashes.contains(&hash) {
            still_deleted.push(old_path);
            continue;
        }
        let target = added_by_hash
            .get(&hash)
            .and_then(|paths| paths.iter().copied().find(|p| !claimed_new.contains(*p)));
        match target {
            Some(new_path) => {
                claimed_new.insert(new_path);
                used_hashes.insert(hash);
                renames.push((old_path, new_path));
            }
            None => still_deleted.push(old_path),
        }
    }

    let mut changes = Vec::new();
    let mut stats = DiffStats::default();

    for path in added {
        if claimed_new.contains(&path) {
            continue;
        }
        let size = new_files[path].size;
        stats.added += 1;
        stats.net_size_change += size as i64;
        changes.push(Change {
            kind: ChangeKind::Added,
            path: path.clone(),
            old_path: None,
            old_size: None,
            new_size: Some(size),
        });
    }

    for path in modified {
        let old_size = old_files[path].size;
        let new_size = new_files[path].size;
        stats.modified += 1;
        stats.net_size_change += new_size as i64 - old_size as i64;
        changes.push(Change {
            kind: ChangeKind::Modified,
            path: path.clone(),
            old_path: None,
            old_size: Some(old_size),
            new_size: Some(new_size),
        });
    }

    for path in still_deleted {
        let size = old_files[path].size;
        stats.deleted += 1;
        stats.net_size_change -= size as i64;
        changes.push(Change {
            kind: ChangeKind::Deleted,
            path: path.clone(),
            old_path: None,
            old_size: Some(size),
            new_size: None,
        });
    }

    for (old_path, new_path) in renames {
        stats.renamed += 1;
        changes.push(Change {
            kind: ChangeKind::Renamed,
            path: new_path.clone(),
            old_path: Some(old_path.clone()),
            old_size: Some(old_files[old_path].size),
            new_size: Some(new_files[new_path].size),
        });
    }

    Ok(Diff {
        changes,
        stats,
        parent_count: if old_tree.is_some() { 1 } else { 0 },
    })
}

fn flatten_to_map(store: &ObjectStore, tree: &Hash) -> Result<BTreeMap<String, TreeEntry>> {
    let mut flat = Vec::new();
    flatten_files(store, tree, "", &mut flat)?;
    Ok(flat.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ops::create_checkpoint;
    use crate::retry::Rollback;
    use std::fs;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, Project, Config) {
        let dir = tempdir().unwrap();
        let workdir = dir.path().join("work");
        fs::create_dir(&workdir).unwrap();

        let mut config = Config::default();
        config.base_path = dir.path().join("base");

        let project = Project::open(&config, &workdir).unwrap();
        (dir, project, config)
    }

    fn create(project: &Project, config: &Config) -> Hash {
        create_checkpoint(project, config, None, None, &mut Rollback::new()).unwrap()
    }

    fn find<'a>(diff: &'a Diff, kind: ChangeKind, path: &str) -> Option<&'a Change> {
        diff.changes
            .iter()
            .find(|c| c.kind == kind && c.path == path)
    }

    #[test]
    fn test_initial_checkpoint_all_added() {
        let (dir, project, config) = setup();
        let work = dir.path().join("work");

        fs::write(work.join("a.txt"), "hello").unwrap();
        fs::create_dir(work.join("sub")).unwrap();
        fs::write(work.join("sub/b.txt"), "world").unwrap();
        let c1 = create(&project, &config);

        let diff = get_checkpoint_changes(&project, &c1.to_hex()).unwrap();

        assert_eq!(diff.parent_count, 0);
        assert!(!diff.is_merge());
        assert_eq!(diff.stats.added, 2);
        assert_eq!(diff.stats.net_size_change, 10);
        assert!(find(&diff, ChangeKind::Added, "a.txt").is_some());
        assert!(find(&diff, ChangeKind::Added, "sub/b.txt").is_some());
    }

    #[test]
    fn test_added_file() {
        let (dir, project, config) = setup();
        let work = dir.path().join("work");

        fs::write(work.join("a.txt"), "hello").unwrap();
        create(&project, &config);

        fs::write(work.join("copy.txt"), "hello").unwrap();
        let c2 = create(&project, &config);

        let diff = get_checkpoint_changes(&project, &c2.to_hex()).unwrap();

        assert_eq!(diff.stats.added, 1);
        assert_eq!(diff.stats.modified, 0);
        assert_eq!(diff.stats.deleted, 0);
        assert!(find(&diff, ChangeKind::Added, "copy.txt").is_some());
    }

    #[test]
    fn test_modified_file() {
        let (dir, project, config) = setup();
        let work = dir.path().join("work");

        fs::write(work.join("f.txt"), "short").unwrap();
        create(&project, &config);
        fs::write(work.join("f.txt"), "much longer now").unwrap();
        let c2 = create(&project, &config);

        let diff = get_checkpoint_changes(&project, &c2.to_hex()).unwrap();

        let change = find(&diff, ChangeKind::Modified, "f.txt").unwrap();
        assert_eq!(change.old_size, Some(5));
        assert_eq!(change.new_size, Some(15));
        assert_eq!(diff.stats.net_size_change, 10);
    }

    #[test]
    fn test_deleted_file() {
        let (dir, project, config) = setup();
        let work = dir.path().join("work");

        fs::write(work.join("gone.txt"), "bytes").unwrap();
        fs::write(work.join("stays.txt"), "other").unwrap();
        create(&project, &config);

        fs::remove_file(work.join("gone.txt")).unwrap();
        let c2 = create(&project, &config);

        let diff = get_checkpoint_changes(&project, &c2.to_hex()).unwrap();
        assert_eq!(diff.stats.deleted, 1);
        assert_eq!(diff.stats.net_size_change, -5);
        assert!(find(&diff, ChangeKind::Deleted, "gone.txt").is_some());
    }

    #[test]
    fn test_pure_rename() {
        let (dir, project, config) = setup();
        let work = dir.path().join("work");

        fs::write(work.join("a.txt"), "hello").unwrap();
        create(&project, &config);

        fs::rename(work.join("a.txt"), work.join("renamed.txt")).unwrap();
        let c2 = create(&project, &config);

        let diff = get_checkpoint_changes(&project, &c2.to_hex()).unwrap();

        assert_eq!(diff.stats.renamed, 1);
        assert_eq!(diff.stats.added, 0);
        assert_eq!(diff.stats.deleted, 0);

        let rename = find(&diff, ChangeKind::Renamed, "renamed.txt").unwrap();
        assert_eq!(rename.old_path.as_deref(), Some("a.txt"));
        assert_eq!(diff.stats.net_size_change, 0);
    }

    #[test]
    fn test_modify_and_rename_is_delete_plus_add() {
        let (dir, project, config) = setup();
        let work = dir.path().join("work");

        fs::write(work.join("a.txt"), "original").unwrap();
        create(&project, &config);

        fs::remove_file(work.join("a.txt")).unwrap();
        fs::write(work.join("moved.txt"), "changed content").unwrap();
        let c2 = create(&project, &config);

        let diff = get_checkpoint_changes(&project, &c2.to_hex()).unwrap();

        assert_eq!(diff.stats.renamed, 0);
        assert!(find(&diff, ChangeKind::Deleted, "a.txt").is_some());
        assert!(find(&diff, ChangeKind::Added, "moved.txt").is_some());
    }

    #[test]
    fn test_one_rename_per_blob_hash() {
        let (dir, project, config) = setup();
        let work = dir.path().join("work");

        // two identical files, both moved
        fs::write(work.join("one.txt"), "same").unwrap();
        fs::write(work.join("two.txt"), "same").unwrap();
        create(&project, &config);

        fs::rename(work.join("one.txt"), work.join("moved-one.txt")).unwrap();
        fs::rename(work.join("two.txt"), work.join("moved-two.txt")).unwrap();
        let c2 = create(&project, &config);

        let diff = get_checkpoint_changes(&project, &c2.to_hex()).unwrap();

        // one pair becomes a rename, the leftover pair stays add + delete
        assert_eq!(diff.stats.renamed, 1);
        assert_eq!(diff.stats.added, 1);
        assert_eq!(diff.stats.deleted, 1);
    }

    #[test]
    fn test_no_changes() {
        let (dir, project, config) = setup();
        fs::write(dir.path().join("work/f.txt"), "stable").unwrap();
        create(&project, &config);
        let c2 = create(&project, &config);

        let diff = get_checkpoint_changes(&project, &c2.to_hex()).unwrap();
        assert!(diff.changes.is_empty());
        assert_eq!(diff.stats, DiffStats::default());
    }

    #[test]
    fn test_rename_into_subdirectory() {
        let (dir, project, config) = setup();
        let work = dir.path().join("work");

        fs::write(work.join("top.txt"), "payload").unwrap();
        create(&project, &config);

        fs::create_dir(work.join("nested")).unwrap();
        fs::rename(work.join("top.txt"), work.join("nested/top.txt")).unwrap();
        let c2 = create(&project, &config);

        let diff = get_checkpoint_changes(&project, &c2.to_hex()).unwrap();
        let rename = find(&diff, ChangeKind::Renamed, "nested/top.txt").unwrap();
        assert_eq!(rename.old_path.as_deref(), Some("top.txt"));
    }
}
