//! Runs one engine operation on a background thread.
//!
//! The caller only blocks while the thread is spawned. Completion is delivered
//! to a callback and can also be awaited through [`JobHandle::wait`].

use crate::apply::ExecutionResult;
use crate::engine::RenameEngine;
use crate::planner::PlanOptions;
use crate::restore::RestoreResult;
use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone)]
pub enum RenameJob {
    Preview(PlanOptions),
    Rename(PlanOptions),
    Restore,
}

impl RenameJob {
    pub fn name(&self) -> &str {
        match self {
            RenameJob::Preview(_) => "preview",
            RenameJob::Rename(_) => "rename",
            RenameJob::Restore => "restore",
        }
    }
}

#[derive(Debug)]
pub enum JobOutput {
    Execution(ExecutionResult),
    Restore(RestoreResult),
}

pub type JobResult = Result<JobOutput>;

/// Checked before each entry's backup step; never interrupts a move.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct JobHandle {
    cancel: CancelToken,
    handle: JoinHandle<JobResult>,
}

impl JobHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn wait(self) -> JobResult {
        self.handle
            .join()
            .map_err(|_| anyhow!("バックグラウンド処理が異常終了しました"))?
    }
}

pub fn spawn_job<F>(engine: Arc<RenameEngine>, job: RenameJob, on_complete: F) -> Result<JobHandle>
where
    F: FnOnce(&JobResult) + Send + 'static,
{
    spawn_job_with_cancel(engine, job, CancelToken::new(), on_complete)
}

pub fn spawn_job_with_cancel<F>(
    engine: Arc<RenameEngine>,
    job: RenameJob,
    cancel: CancelToken,
    on_complete: F,
) -> Result<JobHandle>
where
    F: FnOnce(&JobResult) + Send + 'static,
{
    let name = job.name().to_string();
    let token = cancel.clone();
    let handle = thread::Builder::new()
        .name(format!("file-renamer-{name}"))
        .spawn(move || {
            debug!("ジョブ開始: {name}");
            let result = run_job(&engine, job, &token);
            info!("ジョブ終了: {name} (成功: {})", result.is_ok());
            on_complete(&result);
            result
        })
        .context("バックグラウンドスレッドを起動できませんでした")?;

    Ok(JobHandle { cancel, handle })
}

fn run_job(engine: &RenameEngine, job: RenameJob, cancel: &CancelToken) -> JobResult {
    match job {
        RenameJob::Preview(options) => engine.preview(&options).map(JobOutput::Execution),
        RenameJob::Rename(options) => engine
            .rename_with_cancel(&options, || cancel.is_cancelled())
            .map(JobOutput::Execution),
        RenameJob::Restore => Ok(JobOutput::Restore(engine.restore()?)),
    }
}
