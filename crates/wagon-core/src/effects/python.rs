use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use which::which;

use super::PythonRuntime;
use crate::process::run_command;

const TAG_SCRIPT: &str = "import sys; print('py{0}{1}'.format(*sys.version_info[:2]))";

pub struct SystemPythonRuntime {
    explicit: Option<String>,
    capture_limit: usize,
}

impl SystemPythonRuntime {
    #[must_use]
    pub fn new(explicit: Option<String>, capture_limit: usize) -> Self {
        Self {
            explicit,
            capture_limit,
        }
    }

    pub(crate) fn capture_limit(&self) -> usize {
        self.capture_limit
    }
}

impl PythonRuntime for SystemPythonRuntime {
    fn detect_interpreter(&self) -> Result<String> {
        if let Some(explicit) = &self.explicit {
            return Ok(explicit.clone());
        }

        for candidate in ["python3", "python"] {
            if let Ok(path) = which(candidate) {
                return path
                    .into_os_string()
                    .into_string()
                    .map_err(|_| anyhow!("non-utf8 path"));
            }
        }

        bail!("no python interpreter found; set WAGON_PYTHON")
    }

    fn python_tag(&self, python: &str) -> Result<String> {
        let output = run_command(
            python,
            &["-c".to_string(), TAG_SCRIPT.to_string()],
            &[],
            Path::new("."),
            self.capture_limit,
        )
        .with_context(|| format!("failed to probe python version via {python}"))?;
        if !output.succeeded() {
            bail!("python version probe failed: {}", output.stderr.trim());
        }
        let tag = output.stdout.trim();
        if !tag.starts_with("py") || tag.len() < 3 {
            bail!("unexpected python version probe output '{tag}'");
        }
        Ok(tag.to_string())
    }
}

/// Interpreter inside a virtual environment.
#[must_use]
pub fn venv_python(venv: &Path) -> PathBuf {
    if cfg!(windows) {
        venv.join("Scripts").join("python.exe")
    } else {
        venv.join("bin").join("python")
    }
}
