use std::path::Path;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::ops::{
    self, CheckoutOptions, CommitInfo, Diff, FileInfo, GcStats,
};
use crate::project::Project;
use crate::retry::{with_retry, RetryPolicy, Rollback};
use crate::store::StoreStats;

/// the caller-facing checkpoint engine
///
/// a plain value parameterized by configuration; every operation takes
/// the project working directory and opens that project's storage under
/// the configured base path. callers serialize overlapping mutations on
/// one project (single-writer contract); reads may run concurrently.
///
/// the write path (`create_checkpoint`, `delete_latest_checkpoint`,
/// `reset_to_checkpoint`) runs under bounded retry with a best-effort
/// compensation log; `checkout` is deliberately unwrapped, matching the
/// shipped behavior.
pub struct Engine {
    config: Config,
    retry: RetryPolicy,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(config: Config, retry: RetryPolicy) -> Self {
        Self { config, retry }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// open the storage handle for a project directory
    pub fn project(&self, project_path: &Path) -> Result<Project> {
        Project::open(&self.config, project_path)
    }

    /// snapshot the working directory as a new checkpoint and advance HEAD
    pub fn create_checkpoint(
        &self,
        project_path: &Path,
        description: Option<&str>,
        author: Option<&str>,
    ) -> Result<Hash> {
        let project = self.project(project_path)?;
        with_retry(&self.retry, "create_checkpoint", || {
            let mut rollback = Rollback::new();
            match ops::create_checkpoint(&project, &self.config, description, author, &mut rollback)
            {
                Ok(hash) => Ok(hash),
                Err(e) => {
                    rollback.run(&project);
                    Err(e)
                }
            }
        })
    }

    /// restore a checkpoint into the working directory
    pub fn checkout(
        &self,
        project_path: &Path,
        rev: &str,
        options: CheckoutOptions,
    ) -> Result<()> {
        let project = self.project(project_path)?;
        ops::checkout(&project, &self.config, rev, options)
    }

    /// checkpoint history, newest first
    pub fn get_history(
        &self,
        project_path: &Path,
        branch: Option<&str>,
    ) -> Result<Vec<CommitInfo>> {
        let project = self.project(project_path)?;
        ops::get_history(&project, branch)
    }

    /// flatten a checkpoint's tree into a path list
    pub fn list_files(&self, project_path: &Path, rev: &str) -> Result<Vec<FileInfo>> {
        let project = self.project(project_path)?;
        ops::list_files(&project, rev)
    }

    /// read one file's bytes out of a checkpoint
    pub fn get_file_content(
        &self,
        project_path: &Path,
        rev: &str,
        path: &str,
    ) -> Result<Vec<u8>> {
        let project = self.project(project_path)?;
        ops::get_file_content(&project, rev, path)
    }

    /// changes a checkpoint introduced relative to its first parent
    pub fn get_checkpoint_changes(&self, project_path: &Path, rev: &str) -> Result<Diff> {
        let project = self.project(project_path)?;
        ops::get_checkpoint_changes(&project, rev)
    }

    /// remove the most recent checkpoint and return to its parent
    pub fn delete_latest_checkpoint(&self, project_path: &Path, rev: &str) -> Result<()> {
        let project = self.project(project_path)?;
        let target = project.resolve_revision(rev)?;
        with_retry(&self.retry, "delete_latest_checkpoint", || {
            let mut rollback = Rollback::new();
            match ops::delete_latest_checkpoint(&project, &self.config, &target, &mut rollback) {
                Ok(()) => Ok(()),
                Err(e) => {
                    rollback.run(&project);
                    Err(e)
                }
            }
        })
    }

    /// destructively truncate history back to a checkpoint
    pub fn reset_to_checkpoint(&self, project_path: &Path, rev: &str) -> Result<()> {
        let project = self.project(project_path)?;
        let target = project.resolve_revision(rev)?;
        with_retry(&self.retry, "reset_to_checkpoint", || {
            let mut rollback = Rollback::new();
            match ops::reset_to_checkpoint(&project, &self.config, &target, &mut rollback) {
                Ok(()) => Ok(()),
                Err(e) => {
                    rollback.run(&project);
                    Err(e)
                }
            }
        })
    }

    /// remove objects unreachable from any ref
    pub fn garbage_collect(&self, project_path: &Path) -> Result<GcStats> {
        let project = self.project(project_path)?;
        ops::garbage_collect(&project)
    }

    /// aggregate object counts and sizes
    pub fn storage_stats(&self, project_path: &Path) -> Result<StoreStats> {
        let project = self.project(project_path)?;
        ops::storage_stats(&project)
    }

    /// reclaim space; currently identical to gc
    pub fn optimize_storage(&self, project_path: &Path) -> Result<GcStats> {
        let project = self.project(project_path)?;
        ops::optimize_storage(&project)
    }

    /// export a checkpoint to an archive; not implemented
    pub fn export_checkpoint(
        &self,
        _project_path: &Path,
        _rev: &str,
        _destination: &Path,
    ) -> Result<()> {
        Err(Error::Unsupported("export"))
    }

    /// import a checkpoint from an archive; not implemented
    pub fn import_checkpoint(&self, _project_path: &Path, _archive: &Path) -> Result<()> {
        Err(Error::Unsupported("import"))
    }
}
