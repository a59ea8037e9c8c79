use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

const WHEEL_SUFFIX: &str = ".whl";

/// Tags carried by a wheel filename.
///
/// `{distribution}-{version}(-{build})?-{python}-{abi}-{platform}.whl`, where the last three
/// fields may each hold several `.`-joined tags that form an OR-set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WheelTag {
    pub filename: String,
    pub distribution: String,
    pub version: String,
    pub build_tag: Option<String>,
    pub python_tags: BTreeSet<String>,
    pub abi_tags: BTreeSet<String>,
    pub platform_tags: BTreeSet<String>,
}

impl WheelTag {
    /// Rebuilds the `python-abi-platform` triple from the parsed sets.
    #[must_use]
    pub fn tag_triple(&self) -> String {
        format!(
            "{}-{}-{}",
            join_tags(&self.python_tags),
            join_tags(&self.abi_tags),
            join_tags(&self.platform_tags)
        )
    }

    /// Distribution name in the form used for exclusion matching.
    #[must_use]
    pub fn normalized_distribution(&self) -> String {
        normalize_distribution(&self.distribution)
    }
}

impl FromStr for WheelTag {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_wheel_filename(s)
    }
}

impl fmt::Display for WheelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.filename)
    }
}

/// Parses a wheel filename (or a path ending in one).
///
/// # Errors
/// Returns [`DomainError::MalformedWheelName`] when the name does not follow the wheel
/// naming convention.
pub fn parse_wheel_filename(raw: &str) -> Result<WheelTag, DomainError> {
    let filename = Path::new(raw)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(raw)
        .to_string();
    let stem = strip_wheel_suffix(&filename)
        .ok_or_else(|| DomainError::malformed(&filename, "expected a .whl suffix"))?;

    let pieces: Vec<&str> = stem.split('-').collect();
    let (distribution, version, build_tag, python, abi, platform) = match pieces.as_slice() {
        [name, version, python, abi, platform] => (*name, *version, None, *python, *abi, *platform),
        [name, version, build, python, abi, platform] => {
            (*name, *version, Some(*build), *python, *abi, *platform)
        }
        _ => {
            return Err(DomainError::malformed(
                &filename,
                format!("expected 5 or 6 '-' separated fields, found {}", pieces.len()),
            ))
        }
    };
    if pieces.iter().any(|piece| piece.is_empty()) {
        return Err(DomainError::malformed(&filename, "empty field"));
    }
    if let Some(build) = build_tag {
        if !build.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(DomainError::malformed(
                &filename,
                format!("build tag '{build}' must start with a digit"),
            ));
        }
    }

    Ok(WheelTag {
        python_tags: split_tags(&filename, python)?,
        abi_tags: split_tags(&filename, abi)?,
        platform_tags: split_tags(&filename, platform)?,
        distribution: distribution.to_string(),
        version: version.to_string(),
        build_tag: build_tag.map(ToString::to_string),
        filename,
    })
}

fn strip_wheel_suffix(filename: &str) -> Option<&str> {
    let split = filename.len().checked_sub(WHEEL_SUFFIX.len())?;
    if !filename.is_char_boundary(split) {
        return None;
    }
    let (stem, suffix) = filename.split_at(split);
    suffix.eq_ignore_ascii_case(WHEEL_SUFFIX).then_some(stem)
}

fn split_tags(filename: &str, field: &str) -> Result<BTreeSet<String>, DomainError> {
    let mut tags = BTreeSet::new();
    for tag in field.split('.') {
        if tag.is_empty() {
            return Err(DomainError::malformed(
                filename,
                format!("empty tag in '{field}'"),
            ));
        }
        tags.insert(tag.to_ascii_lowercase());
    }
    Ok(tags)
}

fn join_tags(tags: &BTreeSet<String>) -> String {
    tags.iter().map(String::as_str).collect::<Vec<_>>().join(".")
}

/// Lowercases a distribution name and folds `-` and `.` into `_`.
#[must_use]
pub fn normalize_distribution(name: &str) -> String {
    name.to_ascii_lowercase().replace(['-', '.'], "_")
}
