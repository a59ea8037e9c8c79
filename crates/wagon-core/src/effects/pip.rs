use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use super::python::SystemPythonRuntime;
use super::{InstallInvocation, Installer, PythonRuntime, WheelBuildRequest, WheelBuilder};
use crate::process::{run_command, RunOutput};

pub struct PipWheelBuilder {
    python: Arc<SystemPythonRuntime>,
    capture_limit: usize,
}

impl PipWheelBuilder {
    #[must_use]
    pub fn new(python: Arc<SystemPythonRuntime>, capture_limit: usize) -> Self {
        Self {
            python,
            capture_limit,
        }
    }
}

impl WheelBuilder for PipWheelBuilder {
    fn build(&self, request: &WheelBuildRequest<'_>) -> Result<RunOutput> {
        let (program, prefix) = match request.pip {
            Some(pip) => (pip.display().to_string(), Vec::new()),
            None => (
                self.python.detect_interpreter()?,
                vec!["-m".to_string(), "pip".to_string()],
            ),
        };
        let cwd = Path::new(".");
        let mut output = RunOutput::default();
        if !request.requirement_files.is_empty() {
            info!(files = ?request.requirement_files, "building wheels for requirement files");
            let mut args = prefix.clone();
            args.extend(wheel_args(
                request.wheel_dir,
                request.wheel_args,
                request.requirement_files,
                None,
            ));
            output = run_command(&program, &args, &[], cwd, self.capture_limit)?;
            if !output.succeeded() {
                return Ok(output);
            }
        }
        info!(spec = request.spec, "building wheels");
        let mut args = prefix;
        args.extend(wheel_args(
            request.wheel_dir,
            request.wheel_args,
            &[],
            Some(request.spec),
        ));
        output.merge(run_command(&program, &args, &[], cwd, self.capture_limit)?);
        Ok(output)
    }
}

pub struct PipInstaller {
    capture_limit: usize,
}

impl PipInstaller {
    #[must_use]
    pub fn new(capture_limit: usize) -> Self {
        Self { capture_limit }
    }
}

impl Installer for PipInstaller {
    fn install(&self, invocation: &InstallInvocation<'_>) -> Result<RunOutput> {
        info!(package = invocation.package, python = invocation.python, "installing");
        let mut args = vec!["-m".to_string(), "pip".to_string()];
        args.extend(install_args(invocation));
        run_command(
            invocation.python,
            &args,
            &[],
            Path::new("."),
            self.capture_limit,
        )
    }
}

/// `wheel --wheel-dir D --find-links D [args] [-r req]... [spec]`
#[must_use]
pub fn wheel_args(
    wheel_dir: &Path,
    extra: &[String],
    requirement_files: &[String],
    spec: Option<&str>,
) -> Vec<String> {
    let dir = wheel_dir.display().to_string();
    let mut args = vec![
        "wheel".to_string(),
        "--wheel-dir".to_string(),
        dir.clone(),
        "--find-links".to_string(),
        dir,
    ];
    args.extend(extra.iter().cloned());
    for file in requirement_files {
        args.push("-r".to_string());
        args.push(file.clone());
    }
    if let Some(spec) = spec {
        args.push(spec.to_string());
    }
    args
}

/// `install [-r req]... package --no-index --find-links D --pre [--upgrade] [args]`
#[must_use]
pub fn install_args(invocation: &InstallInvocation<'_>) -> Vec<String> {
    let mut args = vec!["install".to_string()];
    for file in invocation.requirement_files {
        args.push("-r".to_string());
        args.push(file.clone());
    }
    args.extend([
        invocation.package.to_string(),
        "--no-index".to_string(),
        "--find-links".to_string(),
        invocation.wheels_dir.display().to_string(),
        "--pre".to_string(),
    ]);
    if invocation.upgrade {
        args.push("--upgrade".to_string());
    }
    args.extend(invocation.extra_args.iter().cloned());
    args
}
