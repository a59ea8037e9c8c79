//! Getting an existing wagon onto local disk and opening its layout.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;
use url::Url;
use wagon_domain::{PackageMetadata, LEGACY_METADATA_FILE_NAME, METADATA_FILE_NAME, WHEELS_DIR};

use crate::effects::Effects;
use crate::error::{WagonError, WagonResult};
use crate::staging::scratch_dir;

const EXTRACT_PREFIX: &str = ".wagon-extract-";
const SUPPORTED_SCHEMES: [&str; 3] = ["file", "http", "https"];

/// Rejects URL schemes no downloader handles.
pub(crate) fn check_scheme(source: &str) -> WagonResult<Option<&str>> {
    match source.split_once("://") {
        Some((scheme, _)) if SUPPORTED_SCHEMES.contains(&scheme) => Ok(Some(scheme)),
        Some((scheme, _)) => Err(WagonError::UnsupportedSource {
            spec: source.to_string(),
            reason: format!("url type {scheme} is not supported"),
        }),
        None => Ok(None),
    }
}

/// Local path of `source`, downloading URLs into `scratch`.
pub(crate) fn fetch(source: &str, scratch: &Path, effects: &dyn Effects) -> WagonResult<PathBuf> {
    if check_scheme(source)?.is_some() {
        let filename = Url::parse(source)
            .ok()
            .and_then(|url| {
                url.path_segments()
                    .and_then(|mut segments| segments.next_back().map(ToString::to_string))
            })
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "archive".to_string());
        let download_dir = scratch.join("download");
        fs::create_dir_all(&download_dir).map_err(|err| {
            WagonError::io(format!("creating {}", download_dir.display()), err)
        })?;
        let dest = download_dir.join(filename);
        effects
            .downloader()
            .download(source, &dest)
            .map_err(|err| WagonError::fetch(source, err))?;
        return Ok(dest);
    }

    let path = PathBuf::from(source);
    if !path.exists() {
        return Err(WagonError::MissingSource { path });
    }
    Ok(path)
}

/// Unpacks `archive` (or takes an already-unpacked directory) and reads its metadata.
pub(crate) fn extract(
    archive: &Path,
    scratch: &Path,
    effects: &dyn Effects,
) -> WagonResult<(PathBuf, PackageMetadata)> {
    if archive.is_dir() {
        return locate_layout(archive, archive);
    }
    let dest = scratch.join("contents");
    fs::create_dir_all(&dest)
        .map_err(|err| WagonError::io(format!("creating {}", dest.display()), err))?;
    effects
        .codec()
        .unpack(archive, &dest)
        .map_err(|err| WagonError::corrupt(archive, format!("could not be extracted: {err:#}")))?;
    locate_layout(&dest, archive)
}

fn locate_layout(dir: &Path, archive: &Path) -> WagonResult<(PathBuf, PackageMetadata)> {
    let root = if metadata_path(dir).is_some() {
        dir.to_path_buf()
    } else {
        single_child_dir(dir).ok_or_else(|| {
            WagonError::corrupt(archive, format!("{METADATA_FILE_NAME} is missing"))
        })?
    };
    let metadata_file = metadata_path(&root).ok_or_else(|| {
        WagonError::corrupt(archive, format!("{METADATA_FILE_NAME} is missing"))
    })?;
    if !root.join(WHEELS_DIR).is_dir() {
        return Err(WagonError::corrupt(
            archive,
            format!("{WHEELS_DIR}/ directory is missing"),
        ));
    }
    let raw = fs::read_to_string(&metadata_file).map_err(|err| {
        WagonError::corrupt(archive, format!("unreadable metadata: {err}"))
    })?;
    let legacy = metadata_file.file_name() == Some(OsStr::new(LEGACY_METADATA_FILE_NAME));
    let parsed = if legacy {
        PackageMetadata::from_legacy_json(&raw)
    } else {
        PackageMetadata::from_json(&raw)
    };
    let metadata = parsed
        .map_err(|err| WagonError::corrupt(archive, format!("invalid metadata: {err}")))?;
    debug!(root = %root.display(), package = %metadata.package_name, "opened wagon");
    Ok((root, metadata))
}

fn metadata_path(dir: &Path) -> Option<PathBuf> {
    [METADATA_FILE_NAME, LEGACY_METADATA_FILE_NAME]
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

fn single_child_dir(dir: &Path) -> Option<PathBuf> {
    let mut entries = fs::read_dir(dir).ok()?;
    let only = entries.next()?.ok()?;
    if entries.next().is_some() || !only.file_type().ok()?.is_dir() {
        return None;
    }
    Some(only.path())
}

/// Wheels listed in the metadata that are absent from `wheels/`.
pub(crate) fn missing_wheels(root: &Path, metadata: &PackageMetadata) -> Vec<String> {
    let wheels = root.join(WHEELS_DIR);
    metadata
        .wheels
        .iter()
        .filter(|wheel| !wheels.join(wheel.as_str()).is_file())
        .cloned()
        .collect()
}

/// A wagon fetched and unpacked into a private scratch directory.
#[derive(Debug)]
pub struct OpenedArchive {
    scratch: TempDir,
    pub archive: PathBuf,
    pub root: PathBuf,
    pub metadata: PackageMetadata,
}

impl OpenedArchive {
    pub fn open(source: &str, parent: Option<&Path>, effects: &dyn Effects) -> WagonResult<Self> {
        let scratch = scratch_dir(parent, EXTRACT_PREFIX)?;
        let archive = fetch(source, scratch.path(), effects)?;
        let (root, metadata) = extract(&archive, scratch.path(), effects)?;
        Ok(Self {
            scratch,
            archive,
            root,
            metadata,
        })
    }

    #[must_use]
    pub fn wheels_dir(&self) -> PathBuf {
        self.root.join(WHEELS_DIR)
    }

    #[must_use]
    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }
}

pub(crate) fn new_scratch(parent: Option<&Path>) -> WagonResult<TempDir> {
    scratch_dir(parent, EXTRACT_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_check() {
        assert_eq!(check_scheme("https://x/a.tar.gz").unwrap(), Some("https"));
        assert_eq!(check_scheme("./a.tar.gz").unwrap(), None);
        let err = check_scheme("s3://bucket/a.tar.gz").unwrap_err();
        assert_eq!(err.code(), "WG202");
    }

    #[test]
    fn layout_accepts_single_wrapper_dir() {
        let dir = tempfile::tempdir().unwrap();
        let wrapper = dir.path().join("sample");
        fs::create_dir_all(wrapper.join(WHEELS_DIR)).unwrap();
        let metadata = r#"{
            "archive_name": "sample-1.0-py3-none-any.tar.gz",
            "created_by_wagon_version": "0.1.0",
            "excluded_wheels": [],
            "package_name": "sample",
            "package_source": "sample==1.0",
            "package_version": "1.0",
            "supported_platform": "any",
            "supported_python_versions": ["py3"],
            "wheels": ["sample-1.0-py3-none-any.whl"]
        }"#;
        fs::write(wrapper.join(LEGACY_METADATA_FILE_NAME), metadata).unwrap();

        let (root, parsed) = locate_layout(dir.path(), Path::new("a.tar.gz")).unwrap();
        assert_eq!(root, wrapper);
        assert_eq!(parsed.package_name, "sample");
        assert_eq!(missing_wheels(&root, &parsed), ["sample-1.0-py3-none-any.whl"]);
    }

    #[test]
    fn layout_without_metadata_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(WHEELS_DIR)).unwrap();
        let err = locate_layout(dir.path(), Path::new("a.tar.gz")).unwrap_err();
        assert!(matches!(err, WagonError::CorruptArchive { .. }));
    }

    #[test]
    fn layout_without_wheels_dir_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(METADATA_FILE_NAME), "{}").unwrap();
        let err = locate_layout(dir.path(), Path::new("a.tar.gz")).unwrap_err();
        assert!(err.to_string().contains("wheels/ directory is missing"));
    }

    #[test]
    fn unparsable_metadata_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(WHEELS_DIR)).unwrap();
        fs::write(dir.path().join(METADATA_FILE_NAME), "{\"package_name\": 1}").unwrap();
        let err = locate_layout(dir.path(), Path::new("a.tar.gz")).unwrap_err();
        assert!(err.to_string().contains("invalid metadata"));
    }

    #[test]
    fn package_json_must_carry_os_properties() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(WHEELS_DIR)).unwrap();
        let without_os = r#"{
            "archive_name": "sample-1.0-py3-none-any.tar.gz",
            "created_by_wagon_version": "0.1.0",
            "excluded_wheels": [],
            "package_name": "sample",
            "package_source": "sample==1.0",
            "package_version": "1.0",
            "supported_platform": "any",
            "supported_python_versions": ["py3"],
            "wheels": []
        }"#;
        fs::write(dir.path().join(METADATA_FILE_NAME), without_os).unwrap();
        let err = locate_layout(dir.path(), Path::new("a.tar.gz")).unwrap_err();
        assert_eq!(err.code(), "WG201");
        assert!(err.to_string().contains("build_server_os_properties"));

        let with_null = without_os.replacen(
            "\"wheels\": []",
            "\"wheels\": [], \"build_server_os_properties\": null",
            1,
        );
        fs::write(dir.path().join(METADATA_FILE_NAME), with_null).unwrap();
        let (_, parsed) = locate_layout(dir.path(), Path::new("a.tar.gz")).unwrap();
        assert_eq!(parsed.build_server_os_properties, None);
    }
}
