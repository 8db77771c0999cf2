mod apply;
mod audio_reader;
mod config;
mod engine;
mod error;
mod exif_reader;
mod fs_ops;
mod job;
mod log_store;
mod metadata;
mod planner;
mod restore;
mod sanitize;
mod transform;

pub use apply::{
    apply_plan, apply_plan_with_cancel, backup_path_for, ExecutionResult, FailedEntry,
    BACKUP_SUFFIX,
};
pub use audio_reader::Id3MetadataProvider;
pub use config::{
    app_paths, load_config, load_config_from, save_config, save_config_to, AppConfig, AppPaths,
};
pub use engine::RenameEngine;
pub use error::{ConfigError, EngineError, FailureKind, FailureReason, RestoreError};
pub use exif_reader::ExifMetadataProvider;
pub use fs_ops::{FileSystem, StdFileSystem};
pub use job::{spawn_job, spawn_job_with_cancel, CancelToken, JobHandle, JobOutput, JobResult, RenameJob};
pub use log_store::{EngineLock, RenameLogStore};
pub use metadata::{MediaKind, MetadataMap, MetadataProvider, MetadataProviders};
pub use planner::{
    compile_pattern, generate_plan, parse_extension_list, validate_options, PlanOptions,
    PlannedRename, RenameEntry, RenamePlan, RenameStats,
};
pub use restore::{restore_from_log, RestoreResult};
pub use transform::{compute_new_base_name, resolve_base_name, NamingSource};
