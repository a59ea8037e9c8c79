use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::naming::{archive_name, ArchiveFormat};
use crate::platform::ResolvedPlatform;

pub const METADATA_FILE_NAME: &str = "package.json";
pub const LEGACY_METADATA_FILE_NAME: &str = "module.json";
pub const WHEELS_DIR: &str = "wheels";
pub const FILES_DIR: &str = "files";

/// Linux distribution of the machine that built a platform-specific wagon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsProperties {
    pub distribution: String,
    #[serde(rename = "distribution_release")]
    pub release: String,
    #[serde(rename = "distribution_version")]
    pub version: String,
}

impl OsProperties {
    #[must_use]
    pub fn new(distribution: &str, release: &str, version: &str) -> Self {
        Self {
            distribution: distribution.trim().to_lowercase(),
            release: release.trim().to_lowercase(),
            version: version.trim().to_lowercase(),
        }
    }
}

/// Descriptor stored at the root of every wagon.
///
/// Fields are declared in key order so the persisted JSON is stable across builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub archive_name: String,
    /// Always written; `null` for `any` archives and non-linux builds.
    #[serde(deserialize_with = "required_nullable")]
    pub build_server_os_properties: Option<OsProperties>,
    #[serde(rename = "created_by_wagon_version")]
    pub created_by_version: String,
    pub excluded_wheels: Vec<String>,
    /// Extra files stored under `files/`.
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub package_build_tag: Option<String>,
    #[serde(alias = "module_name")]
    pub package_name: String,
    #[serde(alias = "module_source")]
    pub package_source: String,
    #[serde(alias = "module_version")]
    pub package_version: String,
    pub supported_platform: ResolvedPlatform,
    pub supported_python_versions: BTreeSet<String>,
    pub wheels: Vec<String>,
}

/// Inputs the assembler gathers before a metadata record can be built.
#[derive(Debug, Clone)]
pub struct MetadataParts {
    pub package_name: String,
    pub package_version: String,
    pub package_source: String,
    pub wheels: Vec<String>,
    pub excluded_wheels: Vec<String>,
    pub supported_platform: ResolvedPlatform,
    pub python_versions: BTreeSet<String>,
    pub os_properties: Option<OsProperties>,
    pub created_by_version: String,
    pub build_tag: Option<String>,
    pub files: Vec<String>,
}

impl PackageMetadata {
    /// Builds the record and derives its archive name for `format`.
    #[must_use]
    pub fn build(parts: MetadataParts, format: ArchiveFormat) -> Self {
        let MetadataParts {
            package_name,
            package_version,
            package_source,
            mut wheels,
            mut excluded_wheels,
            supported_platform,
            python_versions,
            os_properties,
            created_by_version,
            build_tag,
            mut files,
        } = parts;
        wheels.sort();
        wheels.dedup();
        excluded_wheels.sort();
        excluded_wheels.dedup();
        files.sort();
        files.dedup();
        let mut metadata = Self {
            archive_name: String::new(),
            build_server_os_properties: os_properties,
            created_by_version,
            excluded_wheels,
            files,
            package_build_tag: build_tag
                .map(|tag| tag.trim().to_string())
                .filter(|tag| !tag.is_empty()),
            package_name,
            package_source,
            package_version,
            supported_platform,
            supported_python_versions: python_versions,
            wheels,
        };
        metadata.archive_name = metadata.expected_archive_name(format);
        metadata
    }

    /// Canonical archive file name for this metadata in the given container format.
    #[must_use]
    pub fn expected_archive_name(&self, format: ArchiveFormat) -> String {
        archive_name(
            &self.package_name,
            &self.package_version,
            self.package_build_tag.as_deref(),
            &self.supported_python_versions,
            &self.supported_platform,
            format,
        )
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Reads a `module.json` record, which may predate the os properties key.
    pub fn from_legacy_json(raw: &str) -> serde_json::Result<Self> {
        let mut value: Value = serde_json::from_str(raw)?;
        if let Value::Object(map) = &mut value {
            map.entry("build_server_os_properties").or_insert(Value::Null);
        }
        serde_json::from_value(value)
    }
}

// `Option` fields are otherwise filled with `None` when the key is absent.
fn required_nullable<'de, D>(deserializer: D) -> Result<Option<OsProperties>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::deserialize(deserializer)
}

/// `3` and `3.10` become `py3` and `py310`; already-tagged values are kept.
#[must_use]
pub fn normalize_python_version(raw: &str) -> String {
    let lowered = raw.trim().to_ascii_lowercase();
    if lowered.starts_with(|c: char| c.is_ascii_digit()) {
        format!("py{}", lowered.replace('.', ""))
    } else {
        lowered
    }
}

#[must_use]
pub fn normalize_python_versions<I, S>(raw: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .map(|value| normalize_python_version(value.as_ref()))
        .filter(|value| !value.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts() -> MetadataParts {
        MetadataParts {
            package_name: "sample".into(),
            package_version: "1.0".into(),
            package_source: "sample==1.0".into(),
            wheels: vec![
                "sample-1.0-py3-none-any.whl".into(),
                "dep-2.0-py3-none-any.whl".into(),
            ],
            excluded_wheels: Vec::new(),
            supported_platform: "any".into(),
            python_versions: BTreeSet::from(["py3".to_string()]),
            os_properties: None,
            created_by_version: "0.1.0".into(),
            build_tag: None,
            files: Vec::new(),
        }
    }

    #[test]
    fn build_sorts_wheels_and_names_archive() {
        let metadata = PackageMetadata::build(parts(), ArchiveFormat::TarGz);
        assert_eq!(metadata.archive_name, "sample-1.0-py3-none-any.tar.gz");
        assert_eq!(
            metadata.wheels,
            vec![
                "dep-2.0-py3-none-any.whl".to_string(),
                "sample-1.0-py3-none-any.whl".to_string()
            ]
        );
    }

    #[test]
    fn json_round_trips_with_null_os_properties() {
        let metadata = PackageMetadata::build(parts(), ArchiveFormat::Zip);
        let json = metadata.to_json().unwrap();
        assert!(json.contains("\"build_server_os_properties\": null"));
        assert_eq!(PackageMetadata::from_json(&json).unwrap(), metadata);
    }

    #[test]
    fn json_round_trips_with_os_properties() {
        let mut parts = parts();
        parts.supported_platform = "linux_x86_64".into();
        parts.os_properties = Some(OsProperties::new("Ubuntu", "Jammy", "22.04"));
        parts.excluded_wheels = vec!["skipped-1.0-py3-none-any.whl".into()];
        let metadata = PackageMetadata::build(parts, ArchiveFormat::TarGz);
        let json = metadata.to_json().unwrap();
        assert!(json.contains("\"distribution_release\": \"jammy\""));
        assert_eq!(PackageMetadata::from_json(&json).unwrap(), metadata);
    }

    #[test]
    fn reading_tolerates_unknown_fields_and_rejects_missing_ones() {
        let metadata = PackageMetadata::build(parts(), ArchiveFormat::TarGz);
        let mut value = serde_json::to_value(&metadata).unwrap();
        value["python_requires"] = serde_json::json!(">=3.8");
        let parsed: PackageMetadata = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(parsed, metadata);

        value.as_object_mut().unwrap().remove("supported_platform");
        assert!(serde_json::from_value::<PackageMetadata>(value).is_err());
    }

    #[test]
    fn reads_legacy_module_keys() {
        let raw = r#"{
            "archive_name": "mod-1.0-py27-none-any.tar.gz",
            "created_by_wagon_version": "0.3.1",
            "excluded_wheels": [],
            "module_name": "mod",
            "module_source": "mod==1.0",
            "module_version": "1.0",
            "supported_platform": "any",
            "supported_python_versions": ["py27"],
            "wheels": ["mod-1.0-py2-none-any.whl"]
        }"#;
        assert!(PackageMetadata::from_json(raw).is_err());
        let parsed = PackageMetadata::from_legacy_json(raw).unwrap();
        assert_eq!(parsed.package_name, "mod");
        assert_eq!(parsed.build_server_os_properties, None);
        assert!(parsed.files.is_empty());
        assert_eq!(parsed.package_build_tag, None);
    }

    #[test]
    fn os_properties_key_is_required_but_nullable() {
        let metadata = PackageMetadata::build(parts(), ArchiveFormat::TarGz);
        let mut value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["build_server_os_properties"], Value::Null);
        let parsed: PackageMetadata = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(parsed.build_server_os_properties, None);

        value
            .as_object_mut()
            .unwrap()
            .remove("build_server_os_properties");
        let err = PackageMetadata::from_json(&value.to_string()).unwrap_err();
        assert!(err.to_string().contains("build_server_os_properties"));
    }

    #[test]
    fn build_tag_and_files_are_recorded() {
        let mut parts = parts();
        parts.build_tag = Some(" 7 ".into());
        parts.files = vec!["notes.txt".into(), "LICENSE".into(), "notes.txt".into()];
        let metadata = PackageMetadata::build(parts, ArchiveFormat::TarGz);
        assert_eq!(metadata.archive_name, "sample-1.0-7-py3-none-any.tar.gz");
        assert_eq!(metadata.package_build_tag.as_deref(), Some("7"));
        assert_eq!(metadata.files, ["LICENSE", "notes.txt"]);
        let json = metadata.to_json().unwrap();
        assert!(json.contains("\"package_build_tag\": \"7\""));
        assert_eq!(PackageMetadata::from_json(&json).unwrap(), metadata);

        let mut blank = self::parts();
        blank.build_tag = Some(String::new());
        let metadata = PackageMetadata::build(blank, ArchiveFormat::TarGz);
        assert_eq!(metadata.package_build_tag, None);
        assert_eq!(metadata.archive_name, "sample-1.0-py3-none-any.tar.gz");
    }

    #[test]
    fn python_versions_gain_py_prefix() {
        assert_eq!(normalize_python_version("3"), "py3");
        assert_eq!(normalize_python_version("3.10"), "py310");
        assert_eq!(normalize_python_version("py27"), "py27");
        assert_eq!(
            normalize_python_versions(["3", "py3", "2"]),
            BTreeSet::from(["py2".to_string(), "py3".to_string()])
        );
    }
}
