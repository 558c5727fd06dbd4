use std::collections::{HashSet, VecDeque};

use tracing::warn;

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::TreeEntry;
use crate::project::Project;
use crate::refs::{HEAD, HEADS_PREFIX};
use crate::store::ObjectStore;

/// runaway-traversal bound for history walks
const TRAVERSAL_CAP: usize = 1000;

/// one commit as reported by [`get_history`]
#[derive(Clone, Debug)]
pub struct CommitInfo {
    pub hash: Hash,
    pub parents: Vec<Hash>,
    pub author: String,
    pub timestamp: String,
    pub message: String,
}

/// one path as reported by [`list_files`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileInfo {
    /// `/`-joined path relative to the snapshot root
    pub path: String,
    pub size: u64,
    pub is_directory: bool,
}

/// walk the commit graph from HEAD (or a named branch), newest first
///
/// unparseable or missing commits are skipped with a warning so one
/// corrupt object does not hide the rest of the history; a sanity cap
/// bounds the walk.
pub fn get_history(project: &Project, branch: Option<&str>) -> Result<Vec<CommitInfo>> {
    let start = match branch {
        Some(name) => {
            let branch_ref = format!("{}/{}", HEADS_PREFIX, name);
            match project.refs().resolve(&branch_ref) {
                Ok(hash) => Some(hash),
                Err(Error::RefNotFound(_)) => {
                    return Err(Error::BranchNotFound(name.to_string()))
                }
                Err(e) => return Err(e),
            }
        }
        None => match project.refs().resolve(HEAD) {
            Ok(hash) => Some(hash),
            Err(Error::RefNotFound(_)) => None,
            Err(e) => return Err(e),
        },
    };

    let Some(start) = start else {
        return Ok(Vec::new());
    };

    let mut entries = Vec::new();
    let mut queue = VecDeque::from([start]);
    let mut visited = HashSet::new();
    visited.insert(start);

    while let Some(hash) = queue.pop_front() {
        if entries.len() >= TRAVERSAL_CAP {
            warn!(cap = TRAVERSAL_CAP, "history traversal cap reached, truncating");
            break;
        }

        let commit = match project.store().get_commit(&hash) {
            Ok(commit) => commit,
            Err(e) => {
                warn!(hash = %hash.short(), error = %e, "skipping unreadable commit in history");
                continue;
            }
        };

        for parent in &commit.parents {
            if visited.insert(*parent) {
                queue.push_back(*parent);
            }
        }

        entries.push(CommitInfo {
            hash,
            parents: commit.parents,
            author: commit.author,
            timestamp: commit.timestamp,
            message: commit.message,
        });
    }

    // canonical RFC 3339 compares chronologically as a string; the sort is
    // stable so BFS order (newest first) breaks ties
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(entries)
}

/// flatten a checkpoint's tree into a path list
///
/// directories appear with `is_directory = true` and size 0, files with
/// their recorded size.
pub fn list_files(project: &Project, rev: &str) -> Result<Vec<FileInfo>> {
    let commit_hash = project.resolve_revision(rev)?;
    let commit = project.store().get_commit(&commit_hash)?;

    let mut files = Vec::new();
    flatten_tree(project.store(), &commit.tree, "", &mut files)?;
    Ok(files)
}

fn flatten_tree(
    store: &ObjectStore,
    tree: &Hash,
    prefix: &str,
    out: &mut Vec<FileInfo>,
) -> Result<()> {
    for entry in store.get_tree(tree)? {
        let path = join_path(prefix, &entry.name);

        if entry.is_tree() {
            out.push(FileInfo {
                path: path.clone(),
                size: 0,
                is_directory: true,
            });
            flatten_tree(store, &entry.hash, &path, out)?;
        } else {
            out.push(FileInfo {
                path,
                size: entry.size,
                is_directory: false,
            });
        }
    }
    Ok(())
}

/// read one file's bytes out of a checkpoint
pub fn get_file_content(project: &Project, rev: &str, path: &str) -> Result<Vec<u8>> {
    let commit_hash = project.resolve_revision(rev)?;
    let commit = project.store().get_commit(&commit_hash)?;

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Err(Error::PathNotFound(path.to_string()));
    }

    let mut tree = commit.tree;
    for (i, segment) in segments.iter().enumerate() {
        let entries = project.store().get_tree(&tree)?;
        let entry = entries
            .iter()
            .find(|e| e.name == *segment)
            .ok_or_else(|| Error::PathNotFound(path.to_string()))?;

        let last = i == segments.len() - 1;
        match (last, entry.is_tree()) {
            (true, false) => return project.store().get_blob(&entry.hash),
            (false, true) => tree = entry.hash,
            // a directory where a file was asked for, or vice versa
            _ => return Err(Error::PathNotFound(path.to_string())),
        }
    }
    unreachable!("segments is non-empty")
}

/// flatten a tree to its files only, as `(path, entry)` pairs; shared by
/// the diff pass
pub(crate) fn flatten_files(
    store: &ObjectStore,
    tree: &Hash,
    prefix: &str,
    out: &mut Vec<(String, TreeEntry)>,
) -> Result<()> {
    for entry in store.get_tree(tree)? {
        let path = join_path(prefix, &entry.name);
        if entry.is_tree() {
            flatten_files(store, &entry.hash, &path, out)?;
        } else {
            out.push((path, entry));
        }
    }
    Ok(())
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
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

    fn create(project: &Project, config: &Config, message: &str) -> Hash {
        create_checkpoint(project, config, Some(message), None, &mut Rollback::new()).unwrap()
    }

    #[test]
    fn test_history_empty_project() {
        let (_dir, project, _config) = setup();
        project.init().unwrap();
        assert!(get_history(&project, None).unwrap().is_empty());
    }

    #[test]
    fn test_history_order_and_parents() {
        let (dir, project, config) = setup();
        let work = dir.path().join("work");

        fs::write(work.join("f"), "1").unwrap();
        let c1 = create(&project, &config, "one");
        fs::write(work.join("f"), "2").unwrap();
        let c2 = create(&project, &config, "two");
        fs::write(work.join("f"), "3").unwrap();
        let c3 = create(&project, &config, "three");

        let history = get_history(&project, None).unwrap();
        let hashes: Vec<_> = history.iter().map(|c| c.hash).collect();
        assert_eq!(hashes, vec![c3, c2, c1]);
        assert_eq!(history[0].message, "three");
        assert_eq!(history[0].parents, vec![c2]);
        assert!(history[2].parents.is_empty());
    }

    #[test]
    fn test_history_by_branch() {
        let (dir, project, config) = setup();
        fs::write(dir.path().join("work/f"), "x").unwrap();
        let c1 = create(&project, &config, "on main");

        let history = get_history(&project, Some("main")).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].hash, c1);

        assert!(matches!(
            get_history(&project, Some("nonexistent")),
            Err(Error::BranchNotFound(_))
        ));
    }

    #[test]
    fn test_history_skips_corrupt_commit() {
        let (dir, project, config) = setup();
        let work = dir.path().join("work");

        fs::write(work.join("f"), "1").unwrap();
        let c1 = create(&project, &config, "one");
        fs::write(work.join("f"), "2").unwrap();
        let c2 = create(&project, &config, "two");

        // corrupt the parent commit on disk
        fs::write(project.store().object_path(&c1), b"not gzip").unwrap();

        let history = get_history(&project, None).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].hash, c2);
    }

    #[test]
    fn test_list_files() {
        let (dir, project, config) = setup();
        let work = dir.path().join("work");

        fs::write(work.join("a.txt"), "hello").unwrap();
        fs::create_dir(work.join("sub")).unwrap();
        fs::write(work.join("sub/b.txt"), "world").unwrap();
        let c1 = create(&project, &config, "files");

        let mut files = list_files(&project, &c1.to_hex()).unwrap();
        files.sort_by(|a, b| a.path.cmp(&b.path));

        assert_eq!(
            files,
            vec![
                FileInfo {
                    path: "a.txt".to_string(),
                    size: 5,
                    is_directory: false
                },
                FileInfo {
                    path: "sub".to_string(),
                    size: 0,
                    is_directory: true
                },
                FileInfo {
                    path: "sub/b.txt".to_string(),
                    size: 5,
                    is_directory: false
                },
            ]
        );
    }

    #[test]
    fn test_get_file_content() {
        let (dir, project, config) = setup();
        let work = dir.path().join("work");

        fs::create_dir(work.join("sub")).unwrap();
        fs::write(work.join("sub/b.txt"), "world").unwrap();
        let c1 = create(&project, &config, "content");

        let content = get_file_content(&project, &c1.to_hex(), "sub/b.txt").unwrap();
        assert_eq!(content, b"world");
    }

    #[test]
    fn test_get_file_content_missing_path() {
        let (dir, project, config) = setup();
        fs::write(dir.path().join("work/a.txt"), "x").unwrap();
        let c1 = create(&project, &config, "x");

        for missing in ["nope.txt", "a.txt/deeper", "sub/a.txt", ""] {
            assert!(matches!(
                get_file_content(&project, &c1.to_hex(), missing),
                Err(Error::PathNotFound(_))
            ));
        }
    }

    #[test]
    fn test_get_file_content_directory_path() {
        let (dir, project, config) = setup();
        let work = dir.path().join("work");
        fs::create_dir(work.join("sub")).unwrap();
        fs::write(work.join("sub/b.txt"), "x").unwrap();
        let c1 = create(&project, &config, "x");

        // asking for a directory is not a blob read
        assert!(matches!(
            get_file_content(&project, &c1.to_hex(), "sub"),
            Err(Error::PathNotFound(_))
        ));
    }

    #[test]
    fn test_get_file_content_by_short_hash() {
        let (dir, project, config) = setup();
        fs::write(dir.path().join("work/a.txt"), "short").unwrap();
        let c1 = create(&project, &config, "x");

        let content = get_file_content(&project, &c1.to_hex()[..12], "a.txt").unwrap();
        assert_eq!(content, b"short");
    }
}
