use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const NO_ABI_TAG: &str = "none";

/// Container format of a wagon archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ArchiveFormat {
    #[default]
    #[serde(rename = "tar.gz")]
    TarGz,
    #[serde(rename = "zip")]
    Zip,
}

impl ArchiveFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::TarGz => "tar.gz",
            Self::Zip => "zip",
        }
    }

    /// Guesses the format from a path's extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".zip") || name.ends_with(".wgn") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ArchiveFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tar.gz" | "tgz" => Ok(Self::TarGz),
            "zip" => Ok(Self::Zip),
            other => Err(format!(
                "unsupported archive format '{other}' (expected one of: zip, tar.gz)"
            )),
        }
    }
}

/// Makes a name or version safe to embed in a `-` delimited archive name.
#[must_use]
pub fn normalize_name_component(value: &str) -> String {
    value.trim().replace('-', "_")
}

/// `{name}-{version}[-{build}]-{pytags}-none-{platform}.{ext}`
///
/// Python tags are sorted and de-duplicated so equal inputs always name the same file.
#[must_use]
pub fn archive_name<I, S>(
    package_name: &str,
    package_version: &str,
    build_tag: Option<&str>,
    python_versions: I,
    platform: &str,
    format: ArchiveFormat,
) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let python_tags: BTreeSet<String> = python_versions
        .into_iter()
        .map(|tag| tag.as_ref().to_string())
        .collect();
    let mut components = vec![
        normalize_name_component(package_name),
        normalize_name_component(package_version),
    ];
    if let Some(tag) = build_tag.map(str::trim).filter(|tag| !tag.is_empty()) {
        components.push(normalize_name_component(tag));
    }
    components.push(python_tags.into_iter().collect::<Vec<_>>().join("."));
    components.push(NO_ABI_TAG.to_string());
    components.push(platform.to_string());
    format!("{}.{}", components.join("-"), format.extension())
}
