use std::path::PathBuf;

use serde::Serialize;
use tracing::{field, info, info_span};
use wagon_domain::{host_platform, is_platform_supported};

use crate::effects::{venv_python, Effects, InstallInvocation};
use crate::error::{WagonError, WagonResult};
use crate::fetch::OpenedArchive;
use crate::process::RunOutput;

#[derive(Debug, Clone, Default)]
pub struct InstallRequest {
    pub source: String,
    /// Target environment; the detected interpreter's environment when unset.
    pub venv: Option<PathBuf>,
    pub requirement_files: Vec<String>,
    pub upgrade: bool,
    pub ignore_platform: bool,
    pub install_args: Vec<String>,
    pub scratch_dir: Option<PathBuf>,
    pub host_platform: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallSummary {
    pub package: String,
    pub version: String,
    pub python: String,
    pub output: RunOutput,
}

/// Installs an archive's package from its bundled wheels, without touching an index.
pub fn install(request: &InstallRequest, effects: &dyn Effects) -> WagonResult<InstallSummary> {
    let span = info_span!("install", source = %request.source, scratch = field::Empty);
    let _entered = span.enter();

    let opened = OpenedArchive::open(&request.source, request.scratch_dir.as_deref(), effects)?;
    span.record("scratch", field::display(opened.scratch_path().display()));
    let metadata = &opened.metadata;

    if !request.ignore_platform {
        let host = request.host_platform.clone().unwrap_or_else(host_platform);
        if !is_platform_supported(&metadata.supported_platform, &host) {
            return Err(WagonError::PlatformMismatch {
                supported: metadata.supported_platform.clone(),
                host,
            });
        }
    }

    let python = match &request.venv {
        Some(venv) => {
            let python = venv_python(venv);
            if !python.is_file() {
                return Err(WagonError::EnvironmentProvision {
                    path: venv.clone(),
                    reason: format!("no interpreter at {}", python.display()),
                });
            }
            python.to_string_lossy().to_string()
        }
        None => effects
            .python()
            .detect_interpreter()
            .map_err(|err| WagonError::EnvironmentProvision {
                path: PathBuf::from("."),
                reason: format!("{err:#}"),
            })?,
    };

    info!(package = %metadata.package_name, %python, "installing from bundled wheels");
    let wheels_dir = opened.wheels_dir();
    let output = effects
        .installer()
        .install(&InstallInvocation {
            python: &python,
            package: &metadata.package_name,
            wheels_dir: &wheels_dir,
            requirement_files: &request.requirement_files,
            upgrade: request.upgrade,
            extra_args: &request.install_args,
        })
        .map_err(|err| WagonError::InstallFailure {
            package: metadata.package_name.clone(),
            output: format!("{err:#}"),
        })?;
    if !output.succeeded() {
        return Err(WagonError::InstallFailure {
            package: metadata.package_name.clone(),
            output: output.combined(),
        });
    }
    Ok(InstallSummary {
        package: metadata.package_name.clone(),
        version: metadata.package_version.clone(),
        python,
        output,
    })
}
