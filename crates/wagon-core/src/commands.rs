//! Command handlers: run one engine operation and shape its result for the CLI.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::context::CommandContext;
use crate::create::{create, CreateRequest};
use crate::install::{install, InstallRequest};
use crate::outcome::ExecutionOutcome;
use crate::show::{get_file, list_files, show, GetFileRequest, ShowRequest};
use crate::validate::{validate, ValidateRequest};

pub fn create_archive(ctx: &CommandContext, mut request: CreateRequest) -> ExecutionOutcome {
    request.scratch_dir = ctx.scratch_dir(request.scratch_dir.take());
    match create(&request, ctx.effects()) {
        Ok(summary) => {
            let archive = &summary.archive;
            ExecutionOutcome::success(
                format!(
                    "created {} ({} bytes)",
                    archive.path.display(),
                    archive.size
                ),
                json!({
                    "archive": archive.path.display().to_string(),
                    "size": archive.size,
                    "sha256": archive.sha256,
                    "metadata": to_details(&archive.metadata),
                    "kept_wheels": to_details(&summary.kept_wheels),
                    "validation": to_details(&summary.validation),
                }),
            )
        }
        Err(err) => ExecutionOutcome::from_error(&err),
    }
}

pub fn validate_archive(ctx: &CommandContext, mut request: ValidateRequest) -> ExecutionOutcome {
    request.scratch_dir = ctx.scratch_dir(request.scratch_dir.take());
    match validate(&request, ctx.effects()) {
        Ok(result) => {
            let details = to_details(&result);
            match &result.failure {
                None => ExecutionOutcome::success(
                    format!("validation passed for {}", result.package),
                    details,
                ),
                Some(failure) => ExecutionOutcome::user_error(
                    format!("[WG206] validation failed for {}: {failure}", result.package),
                    details,
                ),
            }
        }
        Err(err) => ExecutionOutcome::from_error(&err),
    }
}

pub fn install_archive(ctx: &CommandContext, mut request: InstallRequest) -> ExecutionOutcome {
    request.scratch_dir = ctx.scratch_dir(request.scratch_dir.take());
    match install(&request, ctx.effects()) {
        Ok(summary) => ExecutionOutcome::success(
            format!("installed {} {}", summary.package, summary.version),
            to_details(&summary),
        ),
        Err(err) => ExecutionOutcome::from_error(&err),
    }
}

pub fn show_archive(ctx: &CommandContext, mut request: ShowRequest) -> ExecutionOutcome {
    request.scratch_dir = ctx.scratch_dir(request.scratch_dir.take());
    match show(&request, ctx.effects()) {
        Ok(metadata) => match metadata.to_json() {
            Ok(rendered) => ExecutionOutcome::success(rendered, to_details(&metadata)),
            Err(err) => ExecutionOutcome::failure(
                format!("[WG230] serializing metadata: {err}"),
                Value::Null,
            ),
        },
        Err(err) => ExecutionOutcome::from_error(&err),
    }
}

pub fn list_archive_files(ctx: &CommandContext, mut request: ShowRequest) -> ExecutionOutcome {
    request.scratch_dir = ctx.scratch_dir(request.scratch_dir.take());
    match list_files(&request, ctx.effects()) {
        Ok(files) => {
            let message = if files.is_empty() {
                "There are no files.".to_string()
            } else {
                files.join("\n")
            };
            ExecutionOutcome::success(message, json!({ "files": files }))
        }
        Err(err) => ExecutionOutcome::from_error(&err),
    }
}

pub fn get_archive_file(ctx: &CommandContext, mut request: GetFileRequest) -> ExecutionOutcome {
    request.scratch_dir = ctx.scratch_dir(request.scratch_dir.take());
    match get_file(&request, ctx.effects()) {
        Ok(path) => ExecutionOutcome::success(
            format!("file was saved in: {}", path.display()),
            json!({ "filename": request.filename, "path": path.display().to_string() }),
        ),
        Err(err) => ExecutionOutcome::from_error(&err),
    }
}

fn to_details<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|err| {
        debug!(%err, "details are not representable as json");
        Value::Null
    })
}
