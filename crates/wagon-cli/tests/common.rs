#![allow(dead_code)]

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Value};
use tempfile::TempDir;

pub struct Fixture {
    pub package: &'static str,
    pub platform: &'static str,
    pub wheels: Vec<&'static str>,
    /// Wheels listed in metadata but left out of `wheels/`.
    pub missing: Vec<&'static str>,
    pub metadata_name: &'static str,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            package: "sample",
            platform: "any",
            wheels: vec!["sample-1.0-py3-none-any.whl"],
            missing: Vec::new(),
            metadata_name: "package.json",
        }
    }
}

impl Fixture {
    pub fn metadata(&self) -> Value {
        let mut listed: Vec<&str> = self.wheels.iter().chain(&self.missing).copied().collect();
        listed.sort_unstable();
        json!({
            "archive_name": format!("{}-1.0-py3-none-{}.tar.gz", self.package, self.platform),
            "build_server_os_properties": null,
            "created_by_wagon_version": "0.1.0",
            "excluded_wheels": [],
            "package_name": self.package,
            "package_source": format!("{}==1.0", self.package),
            "package_version": "1.0",
            "supported_platform": self.platform,
            "supported_python_versions": ["py3"],
            "wheels": listed,
        })
    }

    /// Writes the archive into `dir` with `tar` and `flate2` directly.
    pub fn write_tar_gz(&self, dir: &Path) -> PathBuf {
        let path = dir.join(format!("{}-1.0-py3-none-{}.tar.gz", self.package, self.platform));
        let file = File::create(&path).expect("create archive");
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

        let metadata = serde_json::to_vec_pretty(&self.metadata()).expect("metadata json");
        append(&mut builder, self.metadata_name, &metadata);
        for wheel in &self.wheels {
            append(&mut builder, &format!("wheels/{wheel}"), wheel.as_bytes());
        }
        builder
            .into_inner()
            .expect("finish tar")
            .finish()
            .expect("finish gzip");
        path
    }
}

fn append<W: std::io::Write>(builder: &mut tar::Builder<W>, name: &str, data: &[u8]) {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, name, data).expect("append entry");
}

/// A scratch parent handed to the binary through `WAGON_TMPDIR`.
pub fn scratch() -> TempDir {
    tempfile::Builder::new()
        .prefix("wagon-cli-scratch")
        .tempdir()
        .expect("tempdir")
}

pub fn is_empty(dir: &Path) -> bool {
    fs::read_dir(dir).map_or(true, |mut entries| entries.next().is_none())
}

pub fn parse_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("json envelope")
}
