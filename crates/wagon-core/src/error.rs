use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use wagon_domain::DomainError;

/// Errors surfaced by the wagon engine.
#[derive(Debug, thiserror::Error)]
pub enum WagonError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("[WG200] platform unsupported for wagon (archive supports {supported}, host is {host})")]
    PlatformMismatch { supported: String, host: String },
    #[error("[WG201] {} is not a valid wagon: {reason}", .archive.display())]
    CorruptArchive { archive: PathBuf, reason: String },
    #[error("[WG202] source '{spec}' is not supported: {reason}")]
    UnsupportedSource { spec: String, reason: String },
    #[error("[WG203] source path {} does not exist", .path.display())]
    MissingSource { path: PathBuf },
    #[error("[WG204] destination archive already exists: {} (use --force to overwrite)", .path.display())]
    ArchiveExists { path: PathBuf },
    #[error("[WG205] {} has no file named '{filename}'", .archive.display())]
    MissingFile { archive: PathBuf, filename: String },
    #[error("[WG206] validation failed for {}", .archive.display())]
    ValidationFailed { archive: PathBuf, reasons: Vec<String> },
    #[error("[WG207] failed to build wheels for {spec}")]
    BuildFailure { spec: String, output: String },
    #[error("[WG208] could not install package {package}")]
    InstallFailure { package: String, output: String },
    #[error("[WG209] failed to provision environment at {}: {reason}", .path.display())]
    EnvironmentProvision { path: PathBuf, reason: String },
    #[error("[WG220] failed to fetch {location}: {reason}")]
    Fetch { location: String, reason: String },
    #[error("[WG230] {context}: {reason}")]
    Io { context: String, reason: String },
}

impl WagonError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Domain(err) => err.code(),
            Self::PlatformMismatch { .. } => "WG200",
            Self::CorruptArchive { .. } => "WG201",
            Self::UnsupportedSource { .. } => "WG202",
            Self::MissingSource { .. } => "WG203",
            Self::ArchiveExists { .. } => "WG204",
            Self::MissingFile { .. } => "WG205",
            Self::ValidationFailed { .. } => "WG206",
            Self::BuildFailure { .. } => "WG207",
            Self::InstallFailure { .. } => "WG208",
            Self::EnvironmentProvision { .. } => "WG209",
            Self::Fetch { .. } => "WG220",
            Self::Io { .. } => "WG230",
        }
    }

    /// User errors exit with status 1; everything else is an infrastructure failure.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Domain(_)
                | Self::PlatformMismatch { .. }
                | Self::CorruptArchive { .. }
                | Self::UnsupportedSource { .. }
                | Self::MissingSource { .. }
                | Self::ArchiveExists { .. }
                | Self::MissingFile { .. }
                | Self::ValidationFailed { .. }
        )
    }

    /// Structured fields for JSON output.
    #[must_use]
    pub fn details(&self) -> Value {
        let mut details = match self {
            Self::Domain(DomainError::MalformedWheelName { filename, reason }) => {
                json!({ "filename": filename, "reason": reason })
            }
            Self::Domain(DomainError::ConflictingPlatforms { platforms, wheels }) => {
                json!({ "platforms": platforms, "wheels": wheels })
            }
            Self::PlatformMismatch { supported, host } => {
                json!({ "supported_platform": supported, "host_platform": host })
            }
            Self::CorruptArchive { archive, reason } => {
                json!({ "archive": archive, "reason": reason })
            }
            Self::UnsupportedSource { spec, reason } => json!({ "source": spec, "reason": reason }),
            Self::MissingSource { path } => json!({ "source": path }),
            Self::ArchiveExists { path } => json!({
                "archive": path,
                "hint": "re-run with --force to overwrite the existing archive",
            }),
            Self::MissingFile { archive, filename } => json!({
                "archive": archive,
                "filename": filename,
                "hint": "run `wagon list-files` to see the stored files",
            }),
            Self::ValidationFailed { archive, reasons } => {
                json!({ "archive": archive, "reasons": reasons })
            }
            Self::BuildFailure { spec, output } => json!({ "source": spec, "output": output }),
            Self::InstallFailure { package, output } => {
                json!({ "package": package, "output": output })
            }
            Self::EnvironmentProvision { path, reason } => {
                json!({ "path": path, "reason": reason })
            }
            Self::Fetch { location, reason } => json!({ "location": location, "reason": reason }),
            Self::Io { context, reason } => json!({ "context": context, "reason": reason }),
        };
        if let Value::Object(map) = &mut details {
            map.insert("code".into(), Value::String(self.code().to_string()));
        }
        details
    }

    pub(crate) fn io(context: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::Io {
            context: context.into(),
            reason: format!("{err:#}"),
        }
    }

    pub(crate) fn corrupt(archive: &Path, reason: impl Into<String>) -> Self {
        Self::CorruptArchive {
            archive: archive.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub(crate) fn fetch(location: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::Fetch {
            location: location.into(),
            reason: format!("{err:#}"),
        }
    }
}

pub type WagonResult<T> = Result<T, WagonError>;
