use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use wagon_domain::OsProperties;

use super::OsFingerprint;

const OS_RELEASE_PATHS: [&str; 2] = ["/etc/os-release", "/usr/lib/os-release"];

/// Reads the distribution from `os-release`; `None` when no such file exists.
pub struct OsReleaseFingerprint {
    candidates: Vec<PathBuf>,
}

impl OsReleaseFingerprint {
    #[must_use]
    pub fn with_paths(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }
}

impl Default for OsReleaseFingerprint {
    fn default() -> Self {
        Self::with_paths(OS_RELEASE_PATHS.iter().map(PathBuf::from).collect())
    }
}

impl OsFingerprint for OsReleaseFingerprint {
    fn fingerprint(&self) -> Result<Option<OsProperties>> {
        for path in &self.candidates {
            if !path.is_file() {
                continue;
            }
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            return Ok(parse_os_release(&contents));
        }
        Ok(None)
    }
}

/// `ID`, `VERSION_CODENAME` and `VERSION_ID` become distribution, release and version.
#[must_use]
pub fn parse_os_release(contents: &str) -> Option<OsProperties> {
    let fields: HashMap<&str, String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), unquote(value.trim())))
        .collect();
    let distribution = fields.get("ID")?;
    let field = |key: &str| fields.get(key).map_or("", String::as_str);
    Some(OsProperties::new(
        distribution,
        field("VERSION_CODENAME"),
        field("VERSION_ID"),
    ))
}

fn unquote(value: &str) -> String {
    let stripped = value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .or_else(|| {
            value
                .strip_prefix('\'')
                .and_then(|rest| rest.strip_suffix('\''))
        })
        .unwrap_or(value);
    stripped.to_string()
}
