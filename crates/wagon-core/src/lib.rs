#![deny(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod archive;
pub mod assemble;
pub mod commands;
pub mod config;
pub mod context;
pub mod create;
pub mod effects;
pub mod error;
mod fetch;
pub mod install;
pub mod outcome;
pub mod process;
pub mod show;
mod staging;
pub mod validate;

#[cfg(test)]
mod test_support;

/// Version recorded in every archive this build creates.
pub const WAGON_VERSION: &str = env!("CARGO_PKG_VERSION");

pub use archive::{detect_format, SystemArchiveCodec};
pub use assemble::{assemble, AssembleRequest, AssembledArchive};
pub use commands::{
    create_archive, get_archive_file, install_archive, list_archive_files, show_archive,
    validate_archive,
};
pub use config::{Config, EnvSnapshot};
pub use context::CommandContext;
pub use create::{create, CreateRequest, CreateSummary};
pub use effects::{Effects, SharedEffects, SystemEffects};
pub use error::{WagonError, WagonResult};
pub use fetch::OpenedArchive;
pub use install::{install, InstallRequest, InstallSummary};
pub use outcome::{CommandStatus, ExecutionOutcome};
pub use process::RunOutput;
pub use show::{get_file, list_files, show, GetFileRequest, ShowRequest};
pub use staging::StagingLayout;
pub use validate::{
    validate, ValidateRequest, ValidationFailure, ValidationLog, ValidationResult,
    ValidationStage,
};
