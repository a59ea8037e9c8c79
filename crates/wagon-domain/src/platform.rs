//! Reconciles the platform tags of a wheel set into a single package platform.
//!
//! A wagon is shipped as one coherent unit, so every compiled wheel inside it must target
//! the same platform. Pure-Python wheels (`any`) fit anywhere and never constrain the result.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::DomainError;
use crate::wheel::WheelTag;

pub const ALL_PLATFORMS_TAG: &str = "any";

const MANYLINUX_PREFIX: &str = "manylinux";
const MANYLINUX_REPLACEMENT: &str = "linux_x86_64";

/// Platform envelope of a whole package: `any` or exactly one concrete identifier.
pub type ResolvedPlatform = String;

/// Resolves one platform for the given wheels.
///
/// An explicit `override_platform` is returned verbatim without looking at the wheels.
///
/// # Errors
/// Returns [`DomainError::ConflictingPlatforms`] when the wheels target more than one
/// concrete platform after normalization.
pub fn resolve_platform(
    wheels: &[WheelTag],
    override_platform: Option<&str>,
) -> Result<ResolvedPlatform, DomainError> {
    if let Some(platform) = override_platform {
        debug!(platform, "using explicit platform override");
        return Ok(platform.to_string());
    }

    let mut ordered: Vec<&WheelTag> = wheels.iter().collect();
    ordered.sort_by(|a, b| a.filename.cmp(&b.filename));

    // normalized platform -> wheels contributing it
    let mut platforms: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
    for wheel in ordered {
        for tag in &wheel.platform_tags {
            if tag == ALL_PLATFORMS_TAG {
                continue;
            }
            platforms
                .entry(normalize_platform(tag))
                .or_default()
                .insert(wheel.filename.as_str());
        }
    }

    match platforms.len() {
        0 => Ok(ALL_PLATFORMS_TAG.to_string()),
        1 => {
            let platform = platforms.into_keys().next().unwrap_or_default();
            debug!(%platform, "resolved package platform");
            Ok(platform)
        }
        _ => {
            let wheels: BTreeSet<&str> = platforms.values().flatten().copied().collect();
            Err(DomainError::ConflictingPlatforms {
                platforms: platforms.keys().cloned().collect(),
                wheels: wheels.into_iter().map(ToString::to_string).collect(),
            })
        }
    }
}

/// Applies the compatibility rewrite shared by resolution and host checks.
///
/// Installers that predate `manylinux` still have to accept the package, so every
/// `manylinux*` tag is reported as `linux_x86_64`.
#[must_use]
pub fn normalize_platform(tag: &str) -> String {
    let lowered = tag.trim().to_ascii_lowercase();
    if lowered.starts_with(MANYLINUX_PREFIX) {
        MANYLINUX_REPLACEMENT.to_string()
    } else {
        lowered
    }
}

/// Platform identifier of the running host in wheel-tag vocabulary.
#[must_use]
pub fn host_platform() -> String {
    platform_identifier(std::env::consts::OS, std::env::consts::ARCH)
}

pub(crate) fn platform_identifier(os: &str, arch: &str) -> String {
    match os {
        "windows" => match arch {
            "x86_64" => "win_amd64".to_string(),
            "aarch64" => "win_arm64".to_string(),
            _ => "win32".to_string(),
        },
        "macos" => {
            let arch = if arch == "aarch64" { "arm64" } else { arch };
            format!("macosx_{arch}")
        }
        other => {
            let arch = if arch == "x86" { "i686" } else { arch };
            format!("{other}_{arch}")
        }
    }
}

/// Whether an archive built for `supported` may be installed on `host`.
#[must_use]
pub fn is_platform_supported(supported: &str, host: &str) -> bool {
    let supported = normalize_platform(supported);
    if supported == ALL_PLATFORMS_TAG {
        return true;
    }
    let host = normalize_platform(host);
    if supported == host {
        return true;
    }
    match (
        supported.strip_prefix("macosx_"),
        host.strip_prefix("macosx_"),
    ) {
        (Some(archive), Some(host_arch)) => {
            archive == host_arch
                || archive.ends_with(&format!("_{host_arch}"))
                || (archive.ends_with("universal2") && matches!(host_arch, "arm64" | "x86_64"))
        }
        _ => false,
    }
}
