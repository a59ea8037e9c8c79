//! `create`: resolve a source, build its wheels, pack them, optionally validate.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{field, info, info_span};
use wagon_domain::{normalize_distribution, parse_wheel_filename, ArchiveFormat};

use crate::assemble::{assemble, AssembleRequest, AssembledArchive};
use crate::effects::{Effects, WheelBuildRequest};
use crate::error::{WagonError, WagonResult};
use crate::fetch::check_scheme;
use crate::staging::scratch_dir;
use crate::validate::{validate, ValidateRequest, ValidationResult};

const BUILD_PREFIX: &str = ".wagon-build-";

#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    pub source: String,
    pub requirement_files: Vec<String>,
    pub wheel_args: Vec<String>,
    /// One build per pip executable; the detected interpreter's pip when empty.
    pub pip_paths: Vec<PathBuf>,
    /// Distribution names whose wheels are recorded but not packed.
    pub exclude: Vec<String>,
    pub python_versions: Vec<String>,
    pub supported_platform: Option<String>,
    pub build_tag: Option<String>,
    /// Extra files stored under `files/` in the archive.
    pub add_files: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub format: ArchiveFormat,
    pub force: bool,
    /// Leave the build directory and its wheels on disk after packing.
    pub keep_wheels: bool,
    pub validate: bool,
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSummary {
    pub archive: AssembledArchive,
    /// Directory holding the built wheels when `keep_wheels` was requested.
    pub kept_wheels: Option<PathBuf>,
    pub validation: Option<ValidationResult>,
}

pub fn create(request: &CreateRequest, effects: &dyn Effects) -> WagonResult<CreateSummary> {
    let span = info_span!("create", source = %request.source, build = field::Empty);
    let _entered = span.enter();

    check_scheme(&request.source)?;
    let scratch = scratch_dir(request.scratch_dir.as_deref(), BUILD_PREFIX)?;
    span.record("build", field::display(scratch.path().display()));

    let resolved = effects
        .sources()
        .resolve(&request.source, scratch.path())
        .map_err(|err| WagonError::UnsupportedSource {
            spec: request.source.clone(),
            reason: format!("{err:#}"),
        })?;
    info!(name = %resolved.name, version = %resolved.version, "resolved source");

    let wheel_dir = scratch.path().join("wheels");
    fs::create_dir_all(&wheel_dir)
        .map_err(|err| WagonError::io(format!("creating {}", wheel_dir.display()), err))?;

    let pips: Vec<Option<&Path>> = if request.pip_paths.is_empty() {
        vec![None]
    } else {
        request.pip_paths.iter().map(|pip| Some(pip.as_path())).collect()
    };
    for pip in pips {
        let build = WheelBuildRequest {
            spec: &resolved.spec,
            requirement_files: &request.requirement_files,
            wheel_dir: &wheel_dir,
            wheel_args: &request.wheel_args,
            pip,
        };
        let output = effects
            .wheels()
            .build(&build)
            .map_err(|err| WagonError::BuildFailure {
                spec: resolved.spec.clone(),
                output: format!("{err:#}"),
            })?;
        if !output.succeeded() {
            return Err(WagonError::BuildFailure {
                spec: resolved.spec.clone(),
                output: output.combined(),
            });
        }
    }

    let (wheels, excluded_wheels) = partition_excluded(list_wheels(&wheel_dir)?, &request.exclude)?;
    info!(
        packed = wheels.len(),
        excluded = excluded_wheels.len(),
        "collected wheels"
    );

    let archive = assemble(
        &AssembleRequest {
            package_name: resolved.name,
            package_version: resolved.version,
            package_source: request.source.clone(),
            wheels,
            excluded_wheels,
            python_versions: request.python_versions.clone(),
            override_platform: request.supported_platform.clone(),
            build_tag: request.build_tag.clone(),
            files: request.add_files.clone(),
            destination_dir: request.output_dir.clone(),
            format: request.format,
            force: request.force,
            scratch_dir: request.scratch_dir.clone(),
        },
        effects,
    )?;
    let kept_wheels = if request.keep_wheels {
        let kept = scratch.keep().join("wheels");
        info!(wheels = %kept.display(), "kept build wheels");
        Some(kept)
    } else {
        drop(scratch);
        None
    };

    if !request.validate {
        return Ok(CreateSummary {
            archive,
            kept_wheels,
            validation: None,
        });
    }
    let validation = validate(
        &ValidateRequest {
            source: archive.path.display().to_string(),
            scratch_dir: request.scratch_dir.clone(),
            ..ValidateRequest::default()
        },
        effects,
    )?;
    if let Some(failure) = &validation.failure {
        return Err(WagonError::ValidationFailed {
            archive: archive.path.clone(),
            reasons: vec![failure.to_string()],
        });
    }
    Ok(CreateSummary {
        archive,
        kept_wheels,
        validation: Some(validation),
    })
}

fn list_wheels(dir: &Path) -> WagonResult<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).map_err(|err| WagonError::io(format!("reading {}", dir.display()), err))?;
    let mut wheels = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|err| WagonError::io(format!("reading {}", dir.display()), err))?
            .path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "whl") {
            wheels.push(path);
        }
    }
    wheels.sort();
    Ok(wheels)
}

/// Splits wheels into (packed, excluded file names) by normalized distribution name.
fn partition_excluded(
    wheels: Vec<PathBuf>,
    exclude: &[String],
) -> WagonResult<(Vec<PathBuf>, Vec<String>)> {
    let exclude: BTreeSet<String> = exclude
        .iter()
        .map(String::as_str)
        .map(normalize_distribution)
        .collect();
    let mut packed = Vec::new();
    let mut excluded = Vec::new();
    for wheel in wheels {
        let tag = parse_wheel_filename(&wheel.to_string_lossy())?;
        if exclude.contains(&tag.normalized_distribution()) {
            excluded.push(tag.filename);
        } else {
            packed.push(wheel);
        }
    }
    Ok((packed, excluded))
}
