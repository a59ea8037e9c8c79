use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, info_span};
use wagon_domain::{PackageMetadata, FILES_DIR};

use crate::effects::Effects;
use crate::error::{WagonError, WagonResult};
use crate::fetch::OpenedArchive;

#[derive(Debug, Clone, Default)]
pub struct ShowRequest {
    pub source: String,
    pub scratch_dir: Option<PathBuf>,
}

/// Reads the metadata record of an archive.
pub fn show(request: &ShowRequest, effects: &dyn Effects) -> WagonResult<PackageMetadata> {
    let _entered = info_span!("show", source = %request.source).entered();
    let opened = OpenedArchive::open(&request.source, request.scratch_dir.as_deref(), effects)?;
    Ok(opened.metadata.clone())
}

/// Names of the extra files recorded in an archive's metadata.
pub fn list_files(request: &ShowRequest, effects: &dyn Effects) -> WagonResult<Vec<String>> {
    let _entered = info_span!("list_files", source = %request.source).entered();
    let opened = OpenedArchive::open(&request.source, request.scratch_dir.as_deref(), effects)?;
    Ok(opened.metadata.files.clone())
}

#[derive(Debug, Clone, Default)]
pub struct GetFileRequest {
    pub source: String,
    pub filename: String,
    pub output_dir: PathBuf,
    pub scratch_dir: Option<PathBuf>,
}

/// Copies one stored file out of an archive and returns its absolute destination.
pub fn get_file(request: &GetFileRequest, effects: &dyn Effects) -> WagonResult<PathBuf> {
    let _entered = info_span!("get_file", source = %request.source, file = %request.filename)
        .entered();
    let opened = OpenedArchive::open(&request.source, request.scratch_dir.as_deref(), effects)?;
    let missing = || WagonError::MissingFile {
        archive: opened.archive.clone(),
        filename: request.filename.clone(),
    };
    // Stored names are bare file names.
    if Path::new(&request.filename).file_name() != Some(OsStr::new(&request.filename)) {
        return Err(missing());
    }
    let stored = opened.root.join(FILES_DIR).join(&request.filename);
    if !stored.is_file() {
        return Err(missing());
    }

    fs::create_dir_all(&request.output_dir).map_err(|err| {
        WagonError::io(format!("creating {}", request.output_dir.display()), err)
    })?;
    let dest = request.output_dir.join(&request.filename);
    fs::copy(&stored, &dest).map_err(|err| {
        WagonError::io(
            format!("copying {} to {}", stored.display(), dest.display()),
            err,
        )
    })?;
    let dest = fs::canonicalize(&dest)
        .map_err(|err| WagonError::io(format!("resolving {}", dest.display()), err))?;
    info!(file = %dest.display(), "file saved");
    Ok(dest)
}
