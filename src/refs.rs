use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::Hash;

/// the distinguished "current" ref
pub const HEAD: &str = "HEAD";
/// prefix for branch refs
pub const HEADS_PREFIX: &str = "refs/heads";
/// prefix for automatic pre-destructive-operation backups
pub const BACKUPS_PREFIX: &str = "refs/backups";

const SYMREF_PREFIX: &str = "ref: ";

/// mutable named pointers for one project: HEAD at the root, everything
/// else under `refs/`
///
/// a ref file holds either a 64-hex commit hash or `"ref: <path>"`
/// pointing at another ref. writes go through a temp sibling + rename.
pub struct RefStore {
    root: PathBuf,
}

impl RefStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// create the refs directories (idempotent)
    pub fn init(&self) -> Result<()> {
        for sub in [HEADS_PREFIX, BACKUPS_PREFIX] {
            let dir = self.root.join(sub);
            fs::create_dir_all(&dir).with_path(&dir)?;
        }
        Ok(())
    }

    fn ref_path(&self, name: &str) -> Result<PathBuf> {
        validate_ref_name(name)?;
        Ok(self.root.join(name))
    }

    /// whether a ref file exists
    pub fn exists(&self, name: &str) -> bool {
        self.ref_path(name).map(|p| p.exists()).unwrap_or(false)
    }

    /// read the raw (trimmed) contents of a ref file
    pub fn read_raw(&self, name: &str) -> Result<String> {
        let path = self.ref_path(name)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::RefNotFound(name.to_string())
            } else {
                Error::Io { path, source: e }
            }
        })?;
        Ok(content.trim().to_string())
    }

    /// resolve a ref to a commit hash, following `"ref: "` chains
    ///
    /// the chain is walked with a visited set so a symbolic loop fails
    /// with `RefCycle` instead of spinning.
    pub fn resolve(&self, name: &str) -> Result<Hash> {
        let mut visited = std::collections::HashSet::new();
        let mut current = name.to_string();

        loop {
            if !visited.insert(current.clone()) {
                return Err(Error::RefCycle(current));
            }
            let content = self.read_raw(&current)?;
            match content.strip_prefix(SYMREF_PREFIX) {
                Some(target) => current = target.trim().to_string(),
                None => return Hash::from_hex(&content),
            }
        }
    }

    /// point a ref directly at a commit hash (creates parent directories)
    pub fn update(&self, name: &str, hash: &Hash) -> Result<()> {
        self.write_contents(name, &format!("{}\n", hash.to_hex()))
    }

    /// set HEAD: a `refs/...` target becomes symbolic, anything else is
    /// parsed as a hash and written detached
    pub fn set_head(&self, target: &str) -> Result<()> {
        if target.starts_with("refs/") {
            self.write_contents(HEAD, &format!("{}{}\n", SYMREF_PREFIX, target))
        } else {
            let hash = Hash::from_hex(target)?;
            self.update(HEAD, &hash)
        }
    }

    /// the branch HEAD currently tracks, if it is symbolic
    pub fn current_branch(&self) -> Result<Option<String>> {
        match self.read_raw(HEAD) {
            Ok(content) => Ok(content
                .strip_prefix(SYMREF_PREFIX)
                .and_then(|target| target.trim().strip_prefix("refs/heads/"))
                .map(|branch| branch.to_string())),
            Err(Error::RefNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// raw contents of a ref if it exists; used for rollback snapshots
    pub(crate) fn snapshot(&self, name: &str) -> Result<Option<String>> {
        match self.read_raw(name) {
            Ok(content) => Ok(Some(content)),
            Err(Error::RefNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// restore raw contents captured by `snapshot`
    pub(crate) fn write_raw(&self, name: &str, contents: &str) -> Result<()> {
        self.write_contents(name, &format!("{}\n", contents.trim_end()))
    }

    /// list `(name, raw contents)` for every ref under a prefix
    pub fn list_under(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let dir = self.ref_path(prefix)?;
        let mut refs = Vec::new();
        if dir.exists() {
            self.collect_refs(&dir, prefix, &mut refs)?;
        }
        refs.sort();
        Ok(refs)
    }

    fn collect_refs(
        &self,
        dir: &PathBuf,
        prefix: &str,
        refs: &mut Vec<(String, String)>,
    ) -> Result<()> {
        for entry in fs::read_dir(dir).with_path(dir)? {
            let entry = entry.with_path(dir)?;
            let path = entry.path();
            let name = format!("{}/{}", prefix, entry.file_name().to_string_lossy());

            if path.is_dir() {
                self.collect_refs(&path, &name, refs)?;
            } else if path.is_file() {
                let content = fs::read_to_string(&path).with_path(&path)?;
                refs.push((name, content.trim().to_string()));
            }
        }
        Ok(())
    }

    /// list branches as `(name, commit hash)` pairs
    pub fn list_branches(&self) -> Result<Vec<(String, Hash)>> {
        let mut branches = Vec::new();
        for (name, content) in self.list_under(HEADS_PREFIX)? {
            let short = name
                .strip_prefix("refs/heads/")
                .unwrap_or(&name)
                .to_string();
            branches.push((short, Hash::from_hex(&content)?));
        }
        Ok(branches)
    }

    /// delete a branch ref
    pub fn delete_branch(&self, name: &str) -> Result<()> {
        let branch_ref = format!("{}/{}", HEADS_PREFIX, name);
        match self.delete(&branch_ref) {
            Err(Error::RefNotFound(_)) => Err(Error::BranchNotFound(name.to_string())),
            other => other,
        }
    }

    /// delete a ref file
    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.ref_path(name)?;
        fs::remove_file(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::RefNotFound(name.to_string())
            } else {
                Error::Io { path, source: e }
            }
        })
    }

    fn write_contents(&self, name: &str, contents: &str) -> Result<()> {
        let path = self.ref_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_path(parent)?;
        }

        // atomic write: temp sibling -> fsync -> rename
        let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4()));
        {
            let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
            tmp_file.write_all(contents.as_bytes()).with_path(&tmp_path)?;
            tmp_file.sync_all().with_path(&tmp_path)?;
        }
        if let Err(source) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(Error::Io { path, source });
        }
        Ok(())
    }
}

/// validate a ref name
fn validate_ref_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidRef("empty ref name".to_string()));
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(Error::InvalidRef(format!(
            "ref name cannot start or end with '/': {}",
            name
        )));
    }
    if name.contains("//") {
        return Err(Error::InvalidRef(format!(
            "ref name cannot contain '//': {}",
            name
        )));
    }
    if name.contains('\0') {
        return Err(Error::InvalidRef(format!(
            "ref name cannot contain null byte: {}",
            name
        )));
    }
    for component in name.split('/') {
        if component == "." || component == ".." {
            return Err(Error::InvalidRef(format!(
                "ref name cannot contain '.' or '..': {}",
                name
            )));
        }
    }
    Ok(())
}
