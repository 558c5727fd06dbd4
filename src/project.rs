use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::refs::{RefStore, HEAD, HEADS_PREFIX};
use crate::store::ObjectStore;

/// handle to one project's checkpoint storage
///
/// the storage directory lives under the configured base path, named by
/// the first 16 hex chars of SHA-256 over the absolute project path, so
/// distinct projects never share state. the object store owns `objects/`,
/// the ref store owns `HEAD` and `refs/`.
pub struct Project {
    storage_dir: PathBuf,
    workdir: PathBuf,
    store: ObjectStore,
    refs: RefStore,
}

impl Project {
    /// open the storage handle for a project working directory
    pub fn open(config: &Config, project_path: &Path) -> Result<Self> {
        let workdir = std::path::absolute(project_path).map_err(|source| Error::Io {
            path: project_path.to_path_buf(),
            source,
        })?;
        let storage_dir = config.base_path.join(storage_dir_name(&workdir));

        let store = ObjectStore::new(storage_dir.join("objects"), config.compression());
        let refs = RefStore::new(&storage_dir);

        Ok(Self {
            storage_dir,
            workdir,
            store,
            refs,
        })
    }

    /// create the storage directory structure (idempotent)
    pub fn init(&self) -> Result<()> {
        self.store.init()?;
        self.refs.init()
    }

    /// true once the storage directory has been initialized
    pub fn is_initialized(&self) -> bool {
        self.storage_dir.join("objects").is_dir()
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// absolute path of the project working directory
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub fn refs(&self) -> &RefStore {
        &self.refs
    }

    /// commit HEAD points at, or None before the first checkpoint
    pub fn head_commit(&self) -> Result<Option<Hash>> {
        match self.refs.resolve(HEAD) {
            Ok(hash) => Ok(Some(hash)),
            Err(Error::RefNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// resolve a user-supplied revision to a commit hash
    ///
    /// accepted forms: `HEAD`, a branch name, a full ref path, a full
    /// 64-hex hash, or a 7..63-hex unique prefix.
    pub fn resolve_revision(&self, rev: &str) -> Result<Hash> {
        if rev == HEAD {
            return self.refs.resolve(HEAD);
        }

        if rev.starts_with("refs/") {
            return self.refs.resolve(rev);
        }

        let branch_ref = format!("{}/{}", HEADS_PREFIX, rev);
        if self.refs.exists(&branch_ref) {
            return self.refs.resolve(&branch_ref);
        }

        if rev.len() == 64 && is_hex(rev) {
            return Hash::from_hex(rev);
        }

        if (7..64).contains(&rev.len()) && is_hex(rev) {
            return self.resolve_prefix(rev);
        }

        Err(Error::RefNotFound(rev.to_string()))
    }

    /// resolve a short hash prefix against every stored object
    fn resolve_prefix(&self, prefix: &str) -> Result<Hash> {
        let mut matches: Vec<Hash> = self
            .store
            .list()?
            .into_iter()
            .filter(|h| h.matches_prefix(prefix))
            .collect();

        match matches.len() {
            0 => Err(Error::UnknownPrefix(prefix.to_string())),
            1 => Ok(matches.remove(0)),
            _ => {
                matches.sort();
                matches.truncate(3);
                Err(Error::AmbiguousHash {
                    prefix: prefix.to_string(),
                    candidates: matches,
                })
            }
        }
    }
}

/// storage directory name for a project: first 16 hex chars of
/// SHA-256 over the absolute path
pub fn storage_dir_name(absolute_path: &Path) -> String {
    let digest = Sha256::digest(absolute_path.to_string_lossy().as_bytes());
    hex::encode(digest)[..16].to_string()
}

fn is_hex(s: &str) -> bool {
    s.bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_project() -> (tempfile::TempDir, Project) {
        let dir = tempdir().unwrap();
        let workdir = dir.path().join("work");
        std::fs::create_dir(&workdir).unwrap();

        let mut config = Config::default();
        config.base_path = dir.path().join("base");

        let project = Project::open(&config, &workdir).unwrap();
        project.init().unwrap();
        (dir, project)
    }

    #[test]
    fn test_storage_dir_name_shape() {
        let name = storage_dir_name(Path::new("/some/project"));
        assert_eq!(name.len(), 16);
        assert!(name.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn test_distinct_projects_distinct_dirs() {
        assert_ne!(
            storage_dir_name(Path::new("/project/a")),
            storage_dir_name(Path::new("/project/b"))
        );
    }

    #[test]
    fn test_init_creates_layout() {
        let (_dir, project) = test_project();
        assert!(project.is_initialized());
        assert!(project.storage_dir().join("objects").is_dir());
        assert!(project.storage_dir().join("refs/heads").is_dir());
        assert!(project.storage_dir().join("refs/backups").is_dir());
    }

    #[test]
    fn test_head_commit_absent() {
        let (_dir, project) = test_project();
        assert_eq!(project.head_commit().unwrap(), None);
    }

    #[test]
    fn test_resolve_revision_head_and_branch() {
        let (_dir, project) = test_project();

        let hash = project.store().put_blob(b"x").unwrap();
        project.refs().update("refs/heads/main", &hash).unwrap();
        project.refs().set_head("refs/heads/main").unwrap();

        assert_eq!(project.resolve_revision("HEAD").unwrap(), hash);
        assert_eq!(project.resolve_revision("main").unwrap(), hash);
        assert_eq!(project.resolve_revision("refs/heads/main").unwrap(), hash);
    }

    #[test]
    fn test_resolve_revision_full_hash() {
        let (_dir, project) = test_project();
        let hash = project.store().put_blob(b"full").unwrap();
        assert_eq!(project.resolve_revision(&hash.to_hex()).unwrap(), hash);
    }

    #[test]
    fn test_resolve_revision_short_hash() {
        let (_dir, project) = test_project();
        let hash = project.store().put_blob(b"shorty").unwrap();

        let prefix = &hash.to_hex()[..8];
        assert_eq!(project.resolve_revision(prefix).unwrap(), hash);
    }

    #[test]
    fn test_resolve_revision_unknown_prefix() {
        let (_dir, project) = test_project();

        assert!(matches!(
            project.resolve_revision("0123456789abcd"),
            Err(Error::UnknownPrefix(_))
        ));
    }

    /// plant an object file with a chosen hash; listing only looks at
    /// path shape, so prefix resolution can be tested deterministically
    fn plant_object(project: &Project, hex: &str) -> Hash {
        let hash = Hash::from_hex(hex).unwrap();
        let path = project.store().object_path(&hash);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
        hash
    }

    #[test]
    fn test_resolve_revision_short_prefix_unique() {
        let (_dir, project) = test_project();
        let planted = plant_object(
            &project,
            "abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789",
        );
        plant_object(
            &project,
            "1111111111111111111111111111111111111111111111111111111111111111",
        );

        assert_eq!(project.resolve_revision("abcdef0").unwrap(), planted);
    }

    #[test]
    fn test_resolve_revision_ambiguous_prefix() {
        let (_dir, project) = test_project();
        plant_object(
            &project,
            "abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789",
        );
        plant_object(
            &project,
            "abcdef0999999999999999999999999999999999999999999999999999999999",
        );

        match project.resolve_revision("abcdef0") {
            Err(Error::AmbiguousHash { prefix, candidates }) => {
                assert_eq!(prefix, "abcdef0");
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("expected ambiguous, got {:?}", other.map(|h| h.to_hex())),
        }
    }

    #[test]
    fn test_resolve_revision_not_a_ref() {
        let (_dir, project) = test_project();
        assert!(matches!(
            project.resolve_revision("no-such-branch"),
            Err(Error::RefNotFound(_))
        ));
    }
}
