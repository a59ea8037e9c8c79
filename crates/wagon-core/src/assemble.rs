use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, field, info, info_span, warn};
use wagon_domain::{
    normalize_python_versions, parse_wheel_filename, resolve_platform, ArchiveFormat,
    MetadataParts, OsProperties, PackageMetadata, WheelTag, ALL_PLATFORMS_TAG,
};

use crate::archive::sha256_file;
use crate::effects::Effects;
use crate::error::{WagonError, WagonResult};
use crate::staging::StagingLayout;
use crate::WAGON_VERSION;

const FALLBACK_PYTHON_TAG: &str = "py3";

#[derive(Debug, Clone, Default)]
pub struct AssembleRequest {
    pub package_name: String,
    pub package_version: String,
    pub package_source: String,
    /// Wheels to pack.
    pub wheels: Vec<PathBuf>,
    /// File names recorded as excluded; never packed.
    pub excluded_wheels: Vec<String>,
    pub python_versions: Vec<String>,
    pub override_platform: Option<String>,
    /// Inserted after the version in the archive name.
    pub build_tag: Option<String>,
    /// Extra files stored under `files/`.
    pub files: Vec<PathBuf>,
    pub destination_dir: PathBuf,
    pub format: ArchiveFormat,
    pub force: bool,
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssembledArchive {
    pub path: PathBuf,
    pub metadata: PackageMetadata,
    pub size: u64,
    pub sha256: String,
}

/// Packs the wheels and a freshly built metadata record into one archive.
///
/// The staging directory is removed on every exit path.
pub fn assemble(request: &AssembleRequest, effects: &dyn Effects) -> WagonResult<AssembledArchive> {
    let span = info_span!(
        "assemble",
        package = %request.package_name,
        staging = field::Empty
    );
    let _entered = span.enter();

    let staging = StagingLayout::create(request.scratch_dir.as_deref())?;
    span.record("staging", field::display(staging.root().display()));
    let result = assemble_in(request, &staging, effects);
    if let Err(err) = staging.remove() {
        warn!(%err, "failed to remove staging directory");
    }
    result
}

fn assemble_in(
    request: &AssembleRequest,
    staging: &StagingLayout,
    effects: &dyn Effects,
) -> WagonResult<AssembledArchive> {
    let tags = request
        .wheels
        .iter()
        .map(|wheel| parse_wheel_filename(&wheel.to_string_lossy()))
        .collect::<Result<Vec<WheelTag>, _>>()?;
    let mut filenames = Vec::with_capacity(request.wheels.len());
    for wheel in &request.wheels {
        filenames.push(staging.add_wheel(wheel)?);
    }
    debug!(wheels = filenames.len(), "staged wheels");
    let mut files = Vec::with_capacity(request.files.len());
    for file in &request.files {
        files.push(staging.add_file(file)?);
    }
    if !files.is_empty() {
        debug!(files = files.len(), "staged extra files");
    }

    let platform = resolve_platform(&tags, request.override_platform.as_deref())?;
    info!(%platform, "resolved platform");

    let metadata = PackageMetadata::build(
        MetadataParts {
            package_name: request.package_name.clone(),
            package_version: request.package_version.clone(),
            package_source: request.package_source.clone(),
            wheels: filenames,
            excluded_wheels: request.excluded_wheels.clone(),
            os_properties: os_properties(&platform, effects),
            supported_platform: platform,
            python_versions: python_versions(&request.python_versions, effects),
            created_by_version: WAGON_VERSION.to_string(),
            build_tag: request.build_tag.clone(),
            files,
        },
        request.format,
    );

    let destination = request.destination_dir.join(&metadata.archive_name);
    if destination.exists() && !request.force {
        return Err(WagonError::ArchiveExists { path: destination });
    }
    fs::create_dir_all(&request.destination_dir).map_err(|err| {
        WagonError::io(
            format!("creating {}", request.destination_dir.display()),
            err,
        )
    })?;
    staging.write_metadata(&metadata)?;

    let (size, sha256) = write_archive(
        staging.root(),
        &destination,
        request.format,
        request.force,
        effects,
    )?;
    info!(archive = %destination.display(), size, "wagon created");
    Ok(AssembledArchive {
        path: destination,
        metadata,
        size,
        sha256,
    })
}

fn os_properties(platform: &str, effects: &dyn Effects) -> Option<OsProperties> {
    if !cfg!(target_os = "linux") || platform == ALL_PLATFORMS_TAG {
        return None;
    }
    match effects.os().fingerprint() {
        Ok(properties) => properties,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "could not detect linux distribution");
            None
        }
    }
}

fn python_versions(explicit: &[String], effects: &dyn Effects) -> BTreeSet<String> {
    let versions = normalize_python_versions(explicit);
    if !versions.is_empty() {
        return versions;
    }
    let probed = effects
        .python()
        .detect_interpreter()
        .and_then(|python| effects.python().python_tag(&python));
    match probed {
        Ok(tag) => BTreeSet::from([tag]),
        Err(err) => {
            debug!(error = %format!("{err:#}"), "python version probe failed; assuming py3");
            BTreeSet::from([FALLBACK_PYTHON_TAG.to_string()])
        }
    }
}

// The temp file must share a filesystem with `destination` for the final rename.
fn write_archive(
    root: &Path,
    destination: &Path,
    format: ArchiveFormat,
    force: bool,
    effects: &dyn Effects,
) -> WagonResult<(u64, String)> {
    let dir = destination
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".wagon-archive-")
        .tempfile_in(dir)
        .map_err(|err| WagonError::io(format!("creating temp file in {}", dir.display()), err))?;
    effects
        .codec()
        .pack(root, tmp.as_file_mut(), format)
        .map_err(|err| WagonError::io("compressing archive", err))?;
    tmp.as_file()
        .sync_all()
        .map_err(|err| WagonError::io("flushing archive", err))?;
    let size = tmp
        .as_file()
        .metadata()
        .map_err(|err| WagonError::io("inspecting archive", err))?
        .len();
    let sha256 =
        sha256_file(tmp.path()).map_err(|err| WagonError::io("hashing archive", err))?;

    let persisted = if force {
        tmp.persist(destination)
    } else {
        tmp.persist_noclobber(destination)
    };
    persisted.map_err(|err| {
        if err.error.kind() == io::ErrorKind::AlreadyExists {
            WagonError::ArchiveExists {
                path: destination.to_path_buf(),
            }
        } else {
            WagonError::io(format!("writing {}", destination.display()), err.error)
        }
    })?;
    Ok((size, sha256))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{dir_is_empty, write_wheels, FakeEffects};

    struct Fixture {
        wheels: tempfile::TempDir,
        out: tempfile::TempDir,
        scratch: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                wheels: tempfile::tempdir().unwrap(),
                out: tempfile::tempdir().unwrap(),
                scratch: tempfile::tempdir().unwrap(),
            }
        }

        fn request(&self, names: &[&str]) -> AssembleRequest {
            AssembleRequest {
                package_name: "sample".into(),
                package_version: "1.0".into(),
                package_source: "sample==1.0".into(),
                wheels: write_wheels(self.wheels.path(), names),
                excluded_wheels: Vec::new(),
                python_versions: Vec::new(),
                override_platform: None,
                build_tag: None,
                files: Vec::new(),
                destination_dir: self.out.path().to_path_buf(),
                format: ArchiveFormat::TarGz,
                force: false,
                scratch_dir: Some(self.scratch.path().to_path_buf()),
            }
        }
    }

    #[test]
    fn pure_python_package_end_to_end() {
        let fixture = Fixture::new();
        let request = fixture.request(&["sample-1.0-py3-none-any.whl", "dep-2.0-py3-none-any.whl"]);
        let effects = FakeEffects::default();

        let assembled = assemble(&request, &effects).unwrap();
        assert_eq!(
            assembled.path,
            fixture.out.path().join("sample-1.0-py3-none-any.tar.gz")
        );
        assert_eq!(assembled.metadata.supported_platform, "any");
        assert_eq!(
            assembled.metadata.wheels,
            ["dep-2.0-py3-none-any.whl", "sample-1.0-py3-none-any.whl"]
        );
        assert_eq!(assembled.metadata.build_server_os_properties, None);
        assert_eq!(assembled.metadata.created_by_version, WAGON_VERSION);
        assert!(assembled.path.is_file());
        assert_eq!(assembled.sha256.len(), 64);
        assert!(dir_is_empty(fixture.scratch.path()));
    }

    #[test]
    fn archive_contains_layout_at_root() {
        let fixture = Fixture::new();
        let mut request = fixture.request(&["sample-1.0-py3-none-any.whl"]);
        request.format = ArchiveFormat::Zip;
        let effects = FakeEffects::default();
        let assembled = assemble(&request, &effects).unwrap();
        assert!(assembled.path.to_string_lossy().ends_with(".zip"));

        let dest = tempfile::tempdir().unwrap();
        effects.codec().unpack(&assembled.path, dest.path()).unwrap();
        let raw = fs::read_to_string(dest.path().join("package.json")).unwrap();
        assert_eq!(PackageMetadata::from_json(&raw).unwrap(), assembled.metadata);
        assert!(dest
            .path()
            .join("wheels/sample-1.0-py3-none-any.whl")
            .is_file());
    }

    #[test]
    fn malformed_wheel_aborts_and_cleans_up() {
        let fixture = Fixture::new();
        let request = fixture.request(&["sample-1.0-py3-none-any.whl", "broken-1.0.whl"]);
        let err = assemble(&request, &FakeEffects::default()).unwrap_err();
        assert_eq!(err.code(), "WG210");
        assert!(dir_is_empty(fixture.scratch.path()));
        assert!(dir_is_empty(fixture.out.path()));
    }

    #[test]
    fn conflicting_platforms_abort_and_clean_up() {
        let fixture = Fixture::new();
        let request = fixture.request(&[
            "a-1.0-cp310-cp310-win32.whl",
            "b-1.0-cp310-cp310-linux_x86_64.whl",
        ]);
        let err = assemble(&request, &FakeEffects::default()).unwrap_err();
        match err {
            WagonError::Domain(wagon_domain::DomainError::ConflictingPlatforms {
                wheels, ..
            }) => assert_eq!(
                wheels,
                [
                    "a-1.0-cp310-cp310-win32.whl",
                    "b-1.0-cp310-cp310-linux_x86_64.whl"
                ]
            ),
            other => panic!("unexpected error {other}"),
        }
        assert!(dir_is_empty(fixture.scratch.path()));
    }

    #[test]
    fn override_platform_names_the_archive() {
        let fixture = Fixture::new();
        let mut request = fixture.request(&["a-1.0-py3-none-any.whl"]);
        request.override_platform = Some("linux_aarch64".into());
        request.python_versions = vec!["3".into(), "2".into()];
        let assembled = assemble(&request, &FakeEffects::default()).unwrap();
        assert_eq!(
            assembled.metadata.archive_name,
            "sample-1.0-py2.py3-none-linux_aarch64.tar.gz"
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn linux_specific_archives_record_os_properties() {
        let fixture = Fixture::new();
        let request = fixture.request(&["native-1.0-cp310-cp310-manylinux2014_x86_64.whl"]);
        let effects = FakeEffects {
            os: Some(OsProperties::new("ubuntu", "jammy", "22.04")),
            ..FakeEffects::default()
        };
        let assembled = assemble(&request, &effects).unwrap();
        assert_eq!(assembled.metadata.supported_platform, "linux_x86_64");
        assert_eq!(
            assembled.metadata.build_server_os_properties,
            Some(OsProperties::new("ubuntu", "jammy", "22.04"))
        );
    }

    #[test]
    fn python_version_falls_back_to_py3() {
        let fixture = Fixture::new();
        let request = fixture.request(&["a-1.0-py3-none-any.whl"]);
        let effects = FakeEffects {
            python_tag: None,
            ..FakeEffects::default()
        };
        let assembled = assemble(&request, &effects).unwrap();
        assert_eq!(
            assembled.metadata.supported_python_versions,
            BTreeSet::from(["py3".to_string()])
        );

        let fixture = Fixture::new();
        let request = fixture.request(&["a-1.0-py3-none-any.whl"]);
        let effects = FakeEffects {
            python_tag: Some("py311".into()),
            ..FakeEffects::default()
        };
        let assembled = assemble(&request, &effects).unwrap();
        assert_eq!(
            assembled.metadata.archive_name,
            "sample-1.0-py311-none-any.tar.gz"
        );
    }

    #[test]
    fn existing_archive_requires_force() {
        let fixture = Fixture::new();
        let request = fixture.request(&["sample-1.0-py3-none-any.whl"]);
        let effects = FakeEffects::default();
        let first = assemble(&request, &effects).unwrap();
        let original = fs::read(&first.path).unwrap();

        let err = assemble(&request, &effects).unwrap_err();
        assert!(matches!(err, WagonError::ArchiveExists { .. }));
        assert_eq!(fs::read(&first.path).unwrap(), original);
        assert!(dir_is_empty(fixture.scratch.path()));

        let mut forced = request.clone();
        forced.force = true;
        forced.excluded_wheels = vec!["skipped-1.0-py3-none-any.whl".into()];
        let second = assemble(&forced, &effects).unwrap();
        assert_eq!(second.path, first.path);
        assert_eq!(
            second.metadata.excluded_wheels,
            ["skipped-1.0-py3-none-any.whl"]
        );
        let leftovers: Vec<_> = fs::read_dir(fixture.out.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn wheel_order_does_not_change_the_archive() {
        let names = [
            "sample-1.0-py3-none-any.whl",
            "native-1.0-cp310-cp310-manylinux1_x86_64.whl",
            "dep-2.0-py3-none-any.whl",
        ];
        let mut reversed = names;
        reversed.reverse();
        let effects = FakeEffects::default();

        let first = Fixture::new();
        let forward = assemble(&first.request(&names), &effects).unwrap();
        let second = Fixture::new();
        let backward = assemble(&second.request(&reversed), &effects).unwrap();

        assert_eq!(forward.metadata.archive_name, backward.metadata.archive_name);
        assert_eq!(
            forward.metadata.to_json().unwrap(),
            backward.metadata.to_json().unwrap()
        );
        assert_eq!(forward.metadata.supported_platform, "linux_x86_64");
    }

    #[test]
    fn build_tag_and_extra_files_are_packed() {
        let fixture = Fixture::new();
        let extras = tempfile::tempdir().unwrap();
        let notes = extras.path().join("notes.txt");
        fs::write(&notes, b"read me").unwrap();
        let mut request = fixture.request(&["sample-1.0-py3-none-any.whl"]);
        request.build_tag = Some("3".into());
        request.files = vec![notes];

        let effects = FakeEffects::default();
        let assembled = assemble(&request, &effects).unwrap();
        assert_eq!(
            assembled.metadata.archive_name,
            "sample-1.0-3-py3-none-any.tar.gz"
        );
        assert_eq!(assembled.metadata.package_build_tag.as_deref(), Some("3"));
        assert_eq!(assembled.metadata.files, ["notes.txt"]);

        let dest = tempfile::tempdir().unwrap();
        effects.codec().unpack(&assembled.path, dest.path()).unwrap();
        assert_eq!(
            fs::read(dest.path().join("files/notes.txt")).unwrap(),
            b"read me"
        );
    }

    #[test]
    fn missing_extra_file_aborts_and_cleans_up() {
        let fixture = Fixture::new();
        let mut request = fixture.request(&["sample-1.0-py3-none-any.whl"]);
        request.files = vec![fixture.wheels.path().join("absent.txt")];
        let err = assemble(&request, &FakeEffects::default()).unwrap_err();
        assert!(matches!(err, WagonError::MissingSource { .. }));
        assert!(dir_is_empty(fixture.scratch.path()));
        assert!(dir_is_empty(fixture.out.path()));
    }
}
