use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use serde_json::Value;
use wagon_domain::{ArchiveFormat, OsProperties};

use crate::archive::SystemArchiveCodec;
use crate::effects::{
    install_args, ArchiveCodec, Downloader, Effects, EnvironmentProvisioner, InstallInvocation,
    Installer, OsFingerprint, PythonRuntime, ResolvedSource, SourceResolver, WheelBuildRequest,
    WheelBuilder,
};
use crate::process::RunOutput;

/// In-memory collaborators that record how the engine drives them.
pub(crate) struct FakeEffects {
    pub python_tag: Option<String>,
    pub resolved: Option<ResolvedSource>,
    pub built_wheels: Vec<String>,
    pub build_code: i32,
    pub install_code: i32,
    pub install_output: String,
    pub provision_fails: bool,
    pub os: Option<OsProperties>,
    pub provisions: AtomicUsize,
    pub installs: Mutex<Vec<Vec<String>>>,
    pub builds: AtomicUsize,
    pub codec: SystemArchiveCodec,
}

impl Default for FakeEffects {
    fn default() -> Self {
        Self {
            python_tag: Some("py3".into()),
            resolved: None,
            built_wheels: Vec::new(),
            build_code: 0,
            install_code: 0,
            install_output: "Successfully installed".into(),
            provision_fails: false,
            os: None,
            provisions: AtomicUsize::new(0),
            installs: Mutex::new(Vec::new()),
            builds: AtomicUsize::new(0),
            codec: SystemArchiveCodec,
        }
    }
}

impl FakeEffects {
    pub fn provision_count(&self) -> usize {
        self.provisions.load(Ordering::SeqCst)
    }

    pub fn install_calls(&self) -> Vec<Vec<String>> {
        self.installs.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

impl PythonRuntime for FakeEffects {
    fn detect_interpreter(&self) -> Result<String> {
        Ok("python-fake".into())
    }

    fn python_tag(&self, _python: &str) -> Result<String> {
        self.python_tag
            .clone()
            .ok_or_else(|| anyhow!("no interpreter"))
    }
}

impl SourceResolver for FakeEffects {
    fn resolve(&self, source: &str, _scratch: &Path) -> Result<ResolvedSource> {
        self.resolved
            .clone()
            .ok_or_else(|| anyhow!("cannot resolve {source}"))
    }
}

impl WheelBuilder for FakeEffects {
    fn build(&self, request: &WheelBuildRequest<'_>) -> Result<RunOutput> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if self.build_code != 0 {
            return Ok(RunOutput {
                code: self.build_code,
                stdout: String::new(),
                stderr: "ERROR: No matching distribution found".into(),
            });
        }
        for name in &self.built_wheels {
            fs::write(request.wheel_dir.join(name), name.as_bytes())?;
        }
        Ok(RunOutput::default())
    }
}

impl Installer for FakeEffects {
    fn install(&self, invocation: &InstallInvocation<'_>) -> Result<RunOutput> {
        if let Ok(mut calls) = self.installs.lock() {
            let mut call = vec![invocation.python.to_string()];
            call.extend(install_args(invocation));
            calls.push(call);
        }
        Ok(RunOutput {
            code: self.install_code,
            stdout: self.install_output.clone(),
            stderr: String::new(),
        })
    }
}

impl EnvironmentProvisioner for FakeEffects {
    fn provision(&self, root: &Path) -> Result<PathBuf> {
        self.provisions.fetch_add(1, Ordering::SeqCst);
        if self.provision_fails {
            bail!("venv module unavailable");
        }
        let python = root.join("bin").join("python");
        fs::create_dir_all(root.join("bin"))?;
        fs::write(&python, b"")?;
        Ok(python)
    }
}

impl OsFingerprint for FakeEffects {
    fn fingerprint(&self) -> Result<Option<OsProperties>> {
        Ok(self.os.clone())
    }
}

impl ArchiveCodec for FakeEffects {
    fn pack(&self, root: &Path, out: &mut File, format: ArchiveFormat) -> Result<()> {
        self.codec.pack(root, out, format)
    }

    fn unpack(&self, archive: &Path, dest: &Path) -> Result<ArchiveFormat> {
        self.codec.unpack(archive, dest)
    }
}

impl Downloader for FakeEffects {
    fn download(&self, url: &str, _dest: &Path) -> Result<()> {
        bail!("offline: {url}")
    }

    fn fetch_json(&self, url: &str) -> Result<Value> {
        bail!("offline: {url}")
    }
}

impl Effects for FakeEffects {
    fn python(&self) -> &dyn PythonRuntime {
        self
    }

    fn sources(&self) -> &dyn SourceResolver {
        self
    }

    fn wheels(&self) -> &dyn WheelBuilder {
        self
    }

    fn installer(&self) -> &dyn Installer {
        self
    }

    fn environments(&self) -> &dyn EnvironmentProvisioner {
        self
    }

    fn os(&self) -> &dyn OsFingerprint {
        self
    }

    fn codec(&self) -> &dyn ArchiveCodec {
        self
    }

    fn downloader(&self) -> &dyn Downloader {
        self
    }
}

/// Writes placeholder wheel files into `dir`.
pub(crate) fn write_wheels(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    fs::create_dir_all(dir).unwrap();
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            fs::write(&path, name.as_bytes()).unwrap();
            path
        })
        .collect()
}

pub(crate) fn dir_is_empty(dir: &Path) -> bool {
    fs::read_dir(dir).map_or(true, |mut entries| entries.next().is_none())
}
