use crate::apply::{apply_plan_with_cancel, ExecutionResult};
use crate::config::{app_paths, AppPaths};
use crate::error::RestoreError;
use crate::fs_ops::{FileSystem, StdFileSystem};
use crate::log_store::RenameLogStore;
use crate::metadata::MetadataProviders;
use crate::planner::{generate_plan, PlanOptions, RenamePlan};
use crate::restore::{restore_from_log, RestoreResult};
use anyhow::Result;

/// Binds the metadata providers, the filesystem and the rename log together.
///
/// One engine call owns the target tree and the log for its duration.
pub struct RenameEngine {
    providers: MetadataProviders,
    fs: Box<dyn FileSystem>,
    store: RenameLogStore,
}

impl RenameEngine {
    pub fn new(paths: &AppPaths) -> Self {
        Self {
            providers: MetadataProviders::default(),
            fs: Box::new(StdFileSystem),
            store: RenameLogStore::new(paths),
        }
    }

    pub fn from_default_paths() -> Result<Self> {
        Ok(Self::new(&app_paths()?))
    }

    pub fn with_providers(mut self, providers: MetadataProviders) -> Self {
        self.providers = providers;
        self
    }

    pub fn with_file_system(mut self, fs: Box<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn store(&self) -> &RenameLogStore {
        &self.store
    }

    pub fn plan(&self, options: &PlanOptions) -> Result<RenamePlan> {
        generate_plan(options, &self.providers)
    }

    /// Dry run: plans and reports, writes nothing.
    pub fn preview(&self, options: &PlanOptions) -> Result<ExecutionResult> {
        let plan = self.plan(options)?;
        Ok(ExecutionResult::preview_of(&plan))
    }

    pub fn rename(&self, options: &PlanOptions) -> Result<ExecutionResult> {
        self.rename_with_cancel(options, || false)
    }

    pub fn rename_with_cancel<F>(
        &self,
        options: &PlanOptions,
        is_cancelled: F,
    ) -> Result<ExecutionResult>
    where
        F: Fn() -> bool,
    {
        let plan = self.plan(options)?;
        apply_plan_with_cancel(&plan, self.fs.as_ref(), &self.store, is_cancelled)
    }

    pub fn run(&self, options: &PlanOptions, preview: bool) -> Result<ExecutionResult> {
        if preview {
            self.preview(options)
        } else {
            self.rename(options)
        }
    }

    pub fn restore(&self) -> Result<RestoreResult, RestoreError> {
        restore_from_log(&self.store, self.fs.as_ref())
    }
}
