use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::debug;

use super::python::{venv_python, SystemPythonRuntime};
use super::{EnvironmentProvisioner, PythonRuntime};
use crate::process::run_command;

/// Creates environments with `python -m venv`, pip included.
pub struct VenvProvisioner {
    python: Arc<SystemPythonRuntime>,
    capture_limit: usize,
}

impl VenvProvisioner {
    #[must_use]
    pub fn new(python: Arc<SystemPythonRuntime>, capture_limit: usize) -> Self {
        Self {
            python,
            capture_limit,
        }
    }
}

impl EnvironmentProvisioner for VenvProvisioner {
    fn provision(&self, root: &Path) -> Result<PathBuf> {
        let python = self.python.detect_interpreter()?;
        debug!(%python, root = %root.display(), "creating virtual environment");
        let output = run_command(
            &python,
            &[
                "-m".to_string(),
                "venv".to_string(),
                root.display().to_string(),
            ],
            &[],
            Path::new("."),
            self.capture_limit,
        )?;
        if !output.succeeded() {
            bail!(
                "`{python} -m venv` exited with {}: {}",
                output.code,
                output.combined()
            );
        }
        let interpreter = venv_python(root);
        if !interpreter.exists() {
            bail!(
                "virtual environment has no interpreter at {}",
                interpreter.display()
            );
        }
        Ok(interpreter)
    }
}
