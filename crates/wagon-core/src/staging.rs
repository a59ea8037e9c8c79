use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;
use wagon_domain::{PackageMetadata, FILES_DIR, METADATA_FILE_NAME, WHEELS_DIR};

use crate::error::{WagonError, WagonResult};

const STAGING_PREFIX: &str = ".wagon-staging-";

/// Creates a private scratch directory removed when the guard drops.
pub(crate) fn scratch_dir(parent: Option<&Path>, prefix: &str) -> WagonResult<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix);
    let dir = match parent {
        Some(parent) => {
            fs::create_dir_all(parent)
                .map_err(|err| WagonError::io(format!("creating {}", parent.display()), err))?;
            builder.tempdir_in(parent)
        }
        None => builder.tempdir(),
    };
    let dir = dir.map_err(|err| WagonError::io("creating scratch directory", err))?;
    debug!(path = %dir.path().display(), "created scratch directory");
    Ok(dir)
}

/// `wheels/*.whl`, optional `files/*` and the metadata file, laid out in a directory owned by one invocation.
#[derive(Debug)]
pub struct StagingLayout {
    dir: TempDir,
}

impl StagingLayout {
    pub fn create(parent: Option<&Path>) -> WagonResult<Self> {
        let dir = scratch_dir(parent, STAGING_PREFIX)?;
        let wheels = dir.path().join(WHEELS_DIR);
        fs::create_dir(&wheels)
            .map_err(|err| WagonError::io(format!("creating {}", wheels.display()), err))?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub fn wheels_dir(&self) -> PathBuf {
        self.root().join(WHEELS_DIR)
    }

    #[must_use]
    pub fn files_dir(&self) -> PathBuf {
        self.root().join(FILES_DIR)
    }

    /// Copies a wheel into `wheels/` and returns its file name.
    pub fn add_wheel(&self, wheel: &Path) -> WagonResult<String> {
        copy_by_name(wheel, &self.wheels_dir())
    }

    /// Copies an extra file into `files/`, creating the directory on first use.
    pub fn add_file(&self, file: &Path) -> WagonResult<String> {
        if !file.is_file() {
            return Err(WagonError::MissingSource {
                path: file.to_path_buf(),
            });
        }
        let dir = self.files_dir();
        fs::create_dir_all(&dir)
            .map_err(|err| WagonError::io(format!("creating {}", dir.display()), err))?;
        copy_by_name(file, &dir)
    }

    pub fn write_metadata(&self, metadata: &PackageMetadata) -> WagonResult<()> {
        let path = self.root().join(METADATA_FILE_NAME);
        let json = metadata
            .to_json()
            .map_err(|err| WagonError::io("serializing metadata", err))?;
        fs::write(&path, json)
            .map_err(|err| WagonError::io(format!("writing {}", path.display()), err))
    }

    /// Removes the staging tree, reporting failures that a plain drop would swallow.
    pub fn remove(self) -> WagonResult<()> {
        let path = self.root().to_path_buf();
        self.dir
            .close()
            .map_err(|err| WagonError::io(format!("removing {}", path.display()), err))
    }
}

fn copy_by_name(source: &Path, dir: &Path) -> WagonResult<String> {
    let filename = source
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            WagonError::io(
                format!("staging {}", source.display()),
                "path has no utf-8 file name",
            )
        })?
        .to_string();
    let dest = dir.join(&filename);
    fs::copy(source, &dest).map_err(|err| {
        WagonError::io(
            format!("copying {} to {}", source.display(), dest.display()),
            err,
        )
    })?;
    Ok(filename)
}
