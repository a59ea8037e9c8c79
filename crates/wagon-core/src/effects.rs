use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use wagon_domain::{ArchiveFormat, OsProperties};

use crate::archive::SystemArchiveCodec;
use crate::config::Config;
use crate::process::RunOutput;

mod http;
mod os_release;
mod pip;
mod python;
mod source;
mod venv;

pub use http::HttpDownloader;
pub use os_release::{parse_os_release, OsReleaseFingerprint};
pub use pip::{install_args, wheel_args, PipInstaller, PipWheelBuilder};
pub use python::{venv_python, SystemPythonRuntime};
pub use source::SystemSourceResolver;
pub use venv::VenvProvisioner;

/// A pip-installable source together with the name and version it provides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub spec: String,
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone)]
pub struct WheelBuildRequest<'a> {
    pub spec: &'a str,
    pub requirement_files: &'a [String],
    pub wheel_dir: &'a Path,
    pub wheel_args: &'a [String],
    /// pip executable to use; `python -m pip` of the detected interpreter when unset.
    pub pip: Option<&'a Path>,
}

#[derive(Debug, Clone)]
pub struct InstallInvocation<'a> {
    pub python: &'a str,
    pub package: &'a str,
    pub wheels_dir: &'a Path,
    pub requirement_files: &'a [String],
    pub upgrade: bool,
    pub extra_args: &'a [String],
}

pub trait PythonRuntime: Send + Sync {
    fn detect_interpreter(&self) -> Result<String>;
    /// `py{major}{minor}` of the given interpreter.
    fn python_tag(&self, python: &str) -> Result<String>;
}

pub trait SourceResolver: Send + Sync {
    /// Turns a user source into something pip can build; `scratch` holds any download.
    fn resolve(&self, source: &str, scratch: &Path) -> Result<ResolvedSource>;
}

pub trait WheelBuilder: Send + Sync {
    /// Builds wheels into `request.wheel_dir`; a non-zero exit code is a build failure.
    fn build(&self, request: &WheelBuildRequest<'_>) -> Result<RunOutput>;
}

pub trait Installer: Send + Sync {
    fn install(&self, invocation: &InstallInvocation<'_>) -> Result<RunOutput>;
}

pub trait EnvironmentProvisioner: Send + Sync {
    /// Creates a fresh environment rooted at `root` and returns its interpreter.
    fn provision(&self, root: &Path) -> Result<PathBuf>;
}

pub trait OsFingerprint: Send + Sync {
    fn fingerprint(&self) -> Result<Option<OsProperties>>;
}

pub trait ArchiveCodec: Send + Sync {
    /// Writes every file under `root` into `out`, with paths relative to `root`.
    fn pack(&self, root: &Path, out: &mut File, format: ArchiveFormat) -> Result<()>;
    /// Extracts `archive` into `dest` and reports the detected format.
    fn unpack(&self, archive: &Path, dest: &Path) -> Result<ArchiveFormat>;
}

pub trait Downloader: Send + Sync {
    fn download(&self, url: &str, dest: &Path) -> Result<()>;
    fn fetch_json(&self, url: &str) -> Result<Value>;
}

pub trait Effects: Send + Sync {
    fn python(&self) -> &dyn PythonRuntime;
    fn sources(&self) -> &dyn SourceResolver;
    fn wheels(&self) -> &dyn WheelBuilder;
    fn installer(&self) -> &dyn Installer;
    fn environments(&self) -> &dyn EnvironmentProvisioner;
    fn os(&self) -> &dyn OsFingerprint;
    fn codec(&self) -> &dyn ArchiveCodec;
    fn downloader(&self) -> &dyn Downloader;
}

pub type SharedEffects = Arc<dyn Effects>;

pub struct SystemEffects {
    python: Arc<SystemPythonRuntime>,
    sources: Arc<SystemSourceResolver>,
    wheels: Arc<PipWheelBuilder>,
    installer: Arc<PipInstaller>,
    environments: Arc<VenvProvisioner>,
    os: Arc<OsReleaseFingerprint>,
    codec: Arc<SystemArchiveCodec>,
    downloader: Arc<HttpDownloader>,
}

impl SystemEffects {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let limit = config.process().max_capture_bytes;
        let python = Arc::new(SystemPythonRuntime::new(
            config.python().interpreter.clone(),
            limit,
        ));
        let codec = Arc::new(SystemArchiveCodec);
        let downloader = Arc::new(HttpDownloader::new(config.network().timeout));
        Self {
            sources: Arc::new(SystemSourceResolver::new(
                config.network().index_url.clone(),
                python.clone(),
                codec.clone(),
                downloader.clone(),
            )),
            wheels: Arc::new(PipWheelBuilder::new(python.clone(), limit)),
            installer: Arc::new(PipInstaller::new(limit)),
            environments: Arc::new(VenvProvisioner::new(python.clone(), limit)),
            os: Arc::new(OsReleaseFingerprint::default()),
            python,
            codec,
            downloader,
        }
    }
}

impl Default for SystemEffects {
    fn default() -> Self {
        Self::new(&Config::from_env())
    }
}

impl Effects for SystemEffects {
    fn python(&self) -> &dyn PythonRuntime {
        self.python.as_ref()
    }

    fn sources(&self) -> &dyn SourceResolver {
        self.sources.as_ref()
    }

    fn wheels(&self) -> &dyn WheelBuilder {
        self.wheels.as_ref()
    }

    fn installer(&self) -> &dyn Installer {
        self.installer.as_ref()
    }

    fn environments(&self) -> &dyn EnvironmentProvisioner {
        self.environments.as_ref()
    }

    fn os(&self) -> &dyn OsFingerprint {
        self.os.as_ref()
    }

    fn codec(&self) -> &dyn ArchiveCodec {
        self.codec.as_ref()
    }

    fn downloader(&self) -> &dyn Downloader {
        self.downloader.as_ref()
    }
}
