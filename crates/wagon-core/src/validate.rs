//! Proves an archive installs by installing it into a throwaway environment.
//!
//! A run moves through `Fetched → Extracted → PlatformChecked → EnvironmentProvisioned →
//! InstallAttempted` and ends passed or failed. Whatever happens, the extraction directory and
//! the environment are removed before [`validate`] returns.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempDir;
use tracing::{debug, field, info, info_span, warn};
use wagon_domain::{host_platform, is_platform_supported, WHEELS_DIR};

use crate::effects::{Effects, InstallInvocation};
use crate::error::{WagonError, WagonResult};
use crate::fetch::{extract, fetch, missing_wheels, new_scratch};
use crate::staging::scratch_dir;

const VENV_PREFIX: &str = ".wagon-venv-";

#[derive(Debug, Clone, Default)]
pub struct ValidateRequest {
    pub source: String,
    pub ignore_platform: bool,
    pub upgrade: bool,
    pub install_args: Vec<String>,
    pub scratch_dir: Option<PathBuf>,
    /// Host platform to check against; the running host when unset.
    pub host_platform: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStage {
    Fetched,
    Extracted,
    PlatformChecked,
    EnvironmentProvisioned,
    InstallAttempted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationFailure {
    PlatformMismatch { supported: String, host: String },
    MissingWheels { wheels: Vec<String> },
    InstallFailure { output: String },
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlatformMismatch { supported, host } => {
                write!(f, "archive supports {supported} but the host is {host}")
            }
            Self::MissingWheels { wheels } => {
                write!(f, "missing from the archive: {}", wheels.join(", "))
            }
            Self::InstallFailure { output } => write!(f, "installation failed: {output}"),
        }
    }
}

/// Diagnostic lines of one validation run, mirrored into `tracing`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationLog {
    lines: Vec<String>,
}

impl ValidationLog {
    pub fn info(&mut self, line: impl Into<String>) {
        let line = line.into();
        info!(target: "wagon::validate", "{line}");
        self.lines.push(line);
    }

    pub fn warn(&mut self, line: impl Into<String>) {
        let line = line.into();
        warn!(target: "wagon::validate", "{line}");
        self.lines.push(line);
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub passed: bool,
    pub package: String,
    pub archive: PathBuf,
    pub log: ValidationLog,
    pub failure: Option<ValidationFailure>,
    /// Last state reached before the run ended.
    pub stage: ValidationStage,
}

/// A virtual environment that lives exactly as long as this guard.
struct EphemeralEnvironment {
    dir: TempDir,
    python: PathBuf,
}

impl EphemeralEnvironment {
    fn provision(parent: Option<&Path>, effects: &dyn Effects) -> WagonResult<Self> {
        let dir = scratch_dir(parent, VENV_PREFIX)?;
        let python = effects
            .environments()
            .provision(dir.path())
            .map_err(|err| WagonError::EnvironmentProvision {
                path: dir.path().to_path_buf(),
                reason: format!("{err:#}"),
            })?;
        Ok(Self { dir, python })
    }
}

impl Drop for EphemeralEnvironment {
    fn drop(&mut self) {
        debug!(path = %self.dir.path().display(), "removing ephemeral environment");
    }
}

struct Run {
    log: ValidationLog,
    stage: ValidationStage,
}

impl Run {
    fn reach(&mut self, stage: ValidationStage) {
        debug!(?stage, "validation stage reached");
        self.stage = stage;
    }

    fn finish(
        mut self,
        package: &str,
        archive: &Path,
        failure: Option<ValidationFailure>,
    ) -> ValidationResult {
        match &failure {
            None => self.log.info("Validation Passed!"),
            Some(reason) => {
                self.log.warn("Validation failed!");
                self.log.warn(reason.to_string());
            }
        }
        ValidationResult {
            passed: failure.is_none(),
            package: package.to_string(),
            archive: archive.to_path_buf(),
            log: self.log,
            failure,
            stage: self.stage,
        }
    }
}

/// Validates an archive by installing it offline into a fresh environment.
///
/// `Ok` carries a passed or failed verdict; `Err` means the run could not get that far
/// (unreadable source, corrupt archive, environment provisioning failure).
pub fn validate(request: &ValidateRequest, effects: &dyn Effects) -> WagonResult<ValidationResult> {
    let span = info_span!("validate", source = %request.source, scratch = field::Empty);
    let _entered = span.enter();

    let scratch = new_scratch(request.scratch_dir.as_deref())?;
    span.record("scratch", field::display(scratch.path().display()));
    let mut run = Run {
        log: ValidationLog::default(),
        stage: ValidationStage::Fetched,
    };
    run.log.info(format!("Validating {}", request.source));

    let archive = fetch(&request.source, scratch.path(), effects)?;
    run.reach(ValidationStage::Fetched);

    let (root, metadata) = extract(&archive, scratch.path(), effects)?;
    run.reach(ValidationStage::Extracted);
    let package = metadata.package_name.as_str();

    run.log.info("Verifying that all required files exist...");
    let missing = missing_wheels(&root, &metadata);
    if !missing.is_empty() {
        let failure = ValidationFailure::MissingWheels { wheels: missing };
        return Ok(run.finish(package, &archive, Some(failure)));
    }

    let host = request.host_platform.clone().unwrap_or_else(host_platform);
    let supported = metadata.supported_platform.as_str();
    if request.ignore_platform {
        run.log
            .info(format!("Skipping platform check ({supported} on {host})"));
    } else if !is_platform_supported(supported, &host) {
        run.reach(ValidationStage::PlatformChecked);
        let failure = ValidationFailure::PlatformMismatch {
            supported: supported.to_string(),
            host,
        };
        return Ok(run.finish(package, &archive, Some(failure)));
    }
    run.reach(ValidationStage::PlatformChecked);

    run.log.info("Testing package installation...");
    let environment = EphemeralEnvironment::provision(request.scratch_dir.as_deref(), effects)?;
    run.reach(ValidationStage::EnvironmentProvisioned);

    let python = environment.python.to_string_lossy().to_string();
    let wheels_dir = root.join(WHEELS_DIR);
    let output = effects
        .installer()
        .install(&InstallInvocation {
            python: &python,
            package,
            wheels_dir: &wheels_dir,
            requirement_files: &[],
            upgrade: request.upgrade,
            extra_args: &request.install_args,
        })
        .map_err(|err| WagonError::InstallFailure {
            package: package.to_string(),
            output: format!("{err:#}"),
        })?;
    run.reach(ValidationStage::InstallAttempted);
    drop(environment);

    let failure = (!output.succeeded()).then(|| ValidationFailure::InstallFailure {
        output: output.combined(),
    });
    Ok(run.finish(package, &archive, failure))
}
