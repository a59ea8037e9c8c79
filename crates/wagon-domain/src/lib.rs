#![deny(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod error;
pub mod metadata;
pub mod naming;
pub mod platform;
pub mod wheel;

pub use error::DomainError;
pub use metadata::{
    normalize_python_version, normalize_python_versions, MetadataParts, OsProperties, PackageMetadata,
    FILES_DIR, LEGACY_METADATA_FILE_NAME, METADATA_FILE_NAME, WHEELS_DIR,
};
pub use naming::{archive_name, normalize_name_component, ArchiveFormat};
pub use platform::{
    host_platform, is_platform_supported, normalize_platform, resolve_platform,
    ResolvedPlatform, ALL_PLATFORMS_TAG,
};
pub use wheel::{normalize_distribution, parse_wheel_filename, WheelTag};
