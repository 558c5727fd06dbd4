//! storage statistics and maintenance

use crate::error::Result;
use crate::ops::gc::{garbage_collect, GcStats};
use crate::project::Project;
use crate::store::StoreStats;

/// aggregate object counts and sizes for a project's store
pub fn storage_stats(project: &Project) -> Result<StoreStats> {
    project.store().stats()
}

/// reclaim space; currently identical to [`garbage_collect`]
pub fn optimize_storage(project: &Project) -> Result<GcStats> {
    garbage_collect(project)
}
