use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{Error, IoResultExt, Result};
use crate::hash::Hash;
use crate::ignore::IgnoreSet;
use crate::object::TreeEntry;
use crate::store::ObjectStore;

/// snapshot a working directory into the object store, returning the root
/// tree hash
///
/// entries are visited in sorted order so the emitted objects do not
/// depend on readdir order. symlinks and special files are skipped (only
/// regular files and directories are recorded), ignored paths are
/// filtered, and files over `max_file_size` are skipped with a warning.
/// directories that end up empty produce no tree object; the root tree is
/// always written, even when empty.
pub fn build_tree(
    store: &ObjectStore,
    root: &Path,
    ignore: &IgnoreSet,
    max_file_size: u64,
) -> Result<Hash> {
    let entries = collect_entries(store, root, "", ignore, max_file_size)?;
    store.put_tree(&entries)
}

fn collect_entries(
    store: &ObjectStore,
    dir: &Path,
    prefix: &str,
    ignore: &IgnoreSet,
    max_file_size: u64,
) -> Result<Vec<TreeEntry>> {
    let reader = match fs::read_dir(dir) {
        Ok(reader) => reader,
        // the scan root must be readable; anything deeper is skipped
        Err(e) if !prefix.is_empty() => {
            warn!(path = %dir.display(), error = %e, "skipping unreadable directory");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(Error::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut dir_entries: Vec<_> = reader
        .collect::<std::io::Result<Vec<_>>>()
        .with_path(dir)?;
    dir_entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut entries = Vec::new();

    for entry in dir_entries {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        let rel_path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}/{}", prefix, name)
        };

        let meta = fs::symlink_metadata(&path).with_path(&path)?;
        let file_type = meta.file_type();

        if file_type.is_symlink() {
            debug!(path = %rel_path, "skipping symlink");
            continue;
        }

        if file_type.is_dir() {
            if ignore.prunes_dir(&rel_path) {
                debug!(path = %rel_path, "ignored directory");
                continue;
            }

            let sub_entries = collect_entries(store, &path, &rel_path, ignore, max_file_size)?;
            // empty directories are not tracked
            if sub_entries.is_empty() {
                continue;
            }

            let sub_hash = store.put_tree(&sub_entries)?;
            entries.push(TreeEntry::tree(name, dir_mode(&meta), sub_hash));
        } else if file_type.is_file() {
            if ignore.is_ignored(&rel_path) {
                debug!(path = %rel_path, "ignored file");
                continue;
            }

            if meta.len() > max_file_size {
                warn!(
                    path = %rel_path,
                    size = meta.len(),
                    limit = max_file_size,
                    "skipping file over size limit"
                );
                continue;
            }

            let content = fs::read(&path).with_path(&path)?;
            let hash = store.put_blob(&content)?;
            entries.push(TreeEntry::blob(name, file_mode(&meta), hash, meta.len()));
        } else {
            // sockets, fifos, device nodes
            debug!(path = %rel_path, "skipping special file");
        }
    }

    Ok(entries)
}

#[cfg(unix)]
fn file_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    0o100000 | (meta.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn file_mode(_meta: &fs::Metadata) -> u32 {
    crate::object::MODE_FILE
}

#[cfg(unix)]
fn dir_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    crate::object::MODE_DIR | (meta.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn dir_mode(_meta: &fs::Metadata) -> u32 {
    crate::object::MODE_DIR_DEFAULT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;
    use flate2::Compression;
    use tempfile::tempdir;

    fn test_store(dir: &Path) -> ObjectStore {
        let store = ObjectStore::new(dir.join("objects"), Compression::new(6));
        store.init().unwrap();
        store
    }

    fn no_ignore() -> IgnoreSet {
        IgnoreSet::new::<&str>(&[])
    }

    #[test]
    fn test_single_file() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path());

        let source = dir.path().join("source");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("hello.txt"), "world").unwrap();

        let root = build_tree(&store, &source, &no_ignore(), u64::MAX).unwrap();
        let entries = store.get_tree(&root).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "hello.txt");
        assert_eq!(entries[0].size, 5);
        assert!(!entries[0].is_tree());
        assert_eq!(store.get_blob(&entries[0].hash).unwrap(), b"world");
    }

    #[test]
    fn test_nested_directories() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path());

        let source = dir.path().join("source");
        fs::create_dir_all(source.join("a/b")).unwrap();
        fs::write(source.join("a/b/deep.txt"), "deep").unwrap();
        fs::write(source.join("top.txt"), "top").unwrap();

        let root = build_tree(&store, &source, &no_ignore(), u64::MAX).unwrap();
        let entries = store.get_tree(&root).unwrap();
        assert_eq!(entries.len(), 2);

        let a = entries.iter().find(|e| e.name == "a").unwrap();
        assert!(a.is_tree());
        let sub = store.get_tree(&a.hash).unwrap();
        assert_eq!(sub.len(), 1);
        assert_eq!(sub[0].name, "b");
    }

    #[test]
    fn test_empty_root_tree() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path());

        let source = dir.path().join("source");
        fs::create_dir(&source).unwrap();

        let root = build_tree(&store, &source, &no_ignore(), u64::MAX).unwrap();
        assert!(store.get_tree(&root).unwrap().is_empty());
    }

    #[test]
    fn test_empty_directories_not_tracked() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path());

        let source = dir.path().join("source");
        fs::create_dir_all(source.join("empty/nested/chain")).unwrap();
        fs::write(source.join("file.txt"), "x").unwrap();

        let root = build_tree(&store, &source, &no_ignore(), u64::MAX).unwrap();
        let entries = store.get_tree(&root).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "file.txt");
    }

    #[test]
    fn test_directory_of_only_ignored_files_is_empty() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path());

        let source = dir.path().join("source");
        fs::create_dir_all(source.join("logs")).unwrap();
        fs::write(source.join("logs/app.log"), "noise").unwrap();
        fs::write(source.join("keep.txt"), "keep").unwrap();

        let ignore = IgnoreSet::new(&["*.log"]);
        let root = build_tree(&store, &source, &ignore, u64::MAX).unwrap();
        let entries = store.get_tree(&root).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "keep.txt");
    }

    #[test]
    fn test_ignored_directory_pruned() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path());

        let source = dir.path().join("source");
        fs::create_dir_all(source.join("node_modules/pkg")).unwrap();
        fs::write(source.join("node_modules/pkg/index.js"), "x").unwrap();
        fs::write(source.join("app.js"), "y").unwrap();

        let ignore = IgnoreSet::new(&["node_modules/**"]);
        let root = build_tree(&store, &source, &ignore, u64::MAX).unwrap();
        let entries = store.get_tree(&root).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "app.js");
    }

    #[test]
    fn test_size_cap_boundary() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path());

        let source = dir.path().join("source");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("at-limit.bin"), vec![0u8; 16]).unwrap();
        fs::write(source.join("over-limit.bin"), vec![0u8; 17]).unwrap();

        let root = build_tree(&store, &source, &no_ignore(), 16).unwrap();
        let entries = store.get_tree(&root).unwrap();

        // exactly at the limit is kept, one byte over is skipped
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "at-limit.bin");
        assert_eq!(entries[0].size, 16);
    }

    #[test]
    fn test_identical_content_shares_one_blob() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path());

        let source = dir.path().join("source");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("a.txt"), "same bytes").unwrap();
        fs::write(source.join("b.txt"), "same bytes").unwrap();

        build_tree(&store, &source, &no_ignore(), u64::MAX).unwrap();

        let blob_count = store
            .list()
            .unwrap()
            .into_iter()
            .filter(|h| matches!(store.get(h).unwrap(), Object::Blob(_)))
            .count();
        assert_eq!(blob_count, 1);
    }

    #[test]
    fn test_deterministic_root_hash() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path());

        let source = dir.path().join("source");
        fs::create_dir_all(source.join("sub")).unwrap();
        fs::write(source.join("sub/z.txt"), "z").unwrap();
        fs::write(source.join("a.txt"), "a").unwrap();

        let h1 = build_tree(&store, &source, &no_ignore(), u64::MAX).unwrap();
        let h2 = build_tree(&store, &source, &no_ignore(), u64::MAX).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_unicode_and_space_names() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path());

        let source = dir.path().join("source");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("hello world.txt"), "spaces").unwrap();
        fs::write(source.join("日本語.txt"), "unicode").unwrap();

        let root = build_tree(&store, &source, &no_ignore(), u64::MAX).unwrap();
        let entries = store.get_tree(&root).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"hello world.txt"));
        assert!(names.contains(&"日本語.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_skipped() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path());

        let source = dir.path().join("source");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("real.txt"), "real").unwrap();
        std::os::unix::fs::symlink("real.txt", source.join("link")).unwrap();

        let root = build_tree(&store, &source, &no_ignore(), u64::MAX).unwrap();
        let entries = store.get_tree(&root).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "real.txt");
    }

    #[cfg(unix)]
    #[test]
    fn test_file_mode_recorded() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = test_store(dir.path());

        let source = dir.path().join("source");
        fs::create_dir(&source).unwrap();
        let script = source.join("run.sh");
        fs::write(&script, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let root = build_tree(&store, &source, &no_ignore(), u64::MAX).unwrap();
        let entries = store.get_tree(&root).unwrap();
        assert_eq!(entries[0].mode, 0o100755);
    }
}
