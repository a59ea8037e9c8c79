use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use toml_edit::DocumentMut;
use tracing::debug;

use super::http::HttpDownloader;
use super::python::SystemPythonRuntime;
use super::{ArchiveCodec, Downloader, PythonRuntime, ResolvedSource, SourceResolver};
use crate::archive::SystemArchiveCodec;
use crate::process::run_command;

/// Resolves local projects, source archives, URLs and index names.
pub struct SystemSourceResolver {
    index_url: String,
    python: Arc<SystemPythonRuntime>,
    codec: Arc<SystemArchiveCodec>,
    downloader: Arc<HttpDownloader>,
}

impl SystemSourceResolver {
    #[must_use]
    pub fn new(
        index_url: String,
        python: Arc<SystemPythonRuntime>,
        codec: Arc<SystemArchiveCodec>,
        downloader: Arc<HttpDownloader>,
    ) -> Self {
        Self {
            index_url,
            python,
            codec,
            downloader,
        }
    }

    fn resolve_directory(&self, dir: &Path) -> Result<ResolvedSource> {
        let (name, version) = if dir.join("pyproject.toml").is_file() {
            match read_pyproject(&dir.join("pyproject.toml"))? {
                Some(found) => found,
                None if dir.join("setup.py").is_file() => self.read_setup_py(dir)?,
                None => bail!(
                    "{} declares no static [project].name and version",
                    dir.display()
                ),
            }
        } else if dir.join("setup.py").is_file() {
            self.read_setup_py(dir)?
        } else {
            bail!(
                "source directory {} must contain a setup.py or pyproject.toml file",
                dir.display()
            );
        };
        Ok(ResolvedSource {
            spec: dir.display().to_string(),
            name,
            version,
        })
    }

    fn read_setup_py(&self, dir: &Path) -> Result<(String, String)> {
        debug!(dir = %dir.display(), "querying setup.py for name and version");
        let python = self.python.detect_interpreter()?;
        let query = |flag: &str| -> Result<String> {
            let output = run_command(
                &python,
                &["setup.py".to_string(), flag.to_string()],
                &[],
                dir,
                self.python.capture_limit(),
            )?;
            if !output.succeeded() {
                bail!("`setup.py {flag}` failed: {}", output.combined());
            }
            output
                .stdout
                .lines()
                .rev()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(ToString::to_string)
                .ok_or_else(|| anyhow!("`setup.py {flag}` printed nothing"))
        };
        Ok((query("--name")?, query("--version")?))
    }

    fn extract_archive(&self, archive: &Path, scratch: &Path) -> Result<PathBuf> {
        let dest = scratch.join("source");
        fs::create_dir_all(&dest).with_context(|| format!("creating {}", dest.display()))?;
        self.codec
            .unpack(archive, &dest)
            .with_context(|| format!("failed to extract source archive {}", archive.display()))?;
        single_top_level_dir(&dest)
    }

    fn query_index(&self, name: &str) -> Result<(String, String)> {
        let url = format!("{}/{name}/json", self.index_url);
        let payload = self.downloader.fetch_json(&url)?;
        let info = payload
            .get("info")
            .ok_or_else(|| anyhow!("index response for {name} has no 'info'"))?;
        let field = |key: &str| {
            info.get(key)
                .and_then(Value::as_str)
                .map(ToString::to_string)
                .ok_or_else(|| anyhow!("index response for {name} has no info.{key}"))
        };
        Ok((field("name")?, field("version")?))
    }
}

impl SourceResolver for SystemSourceResolver {
    fn resolve(&self, source: &str, scratch: &Path) -> Result<ResolvedSource> {
        if let Some((scheme, _)) = source.split_once("://") {
            if !matches!(scheme, "file" | "http" | "https") {
                bail!("source url type {scheme} is not supported");
            }
            let download = scratch.join("source-download");
            self.downloader.download(source, &download)?;
            let dir = self.extract_archive(&download, scratch)?;
            return self.resolve_directory(&dir);
        }

        let path = Path::new(source);
        if path.is_file() {
            let dir = self.extract_archive(path, scratch)?;
            return self.resolve_directory(&dir);
        }
        if path.is_dir() {
            let dir = path
                .canonicalize()
                .with_context(|| format!("resolving {}", path.display()))?;
            return self.resolve_directory(&dir);
        }

        if let Some((name, version)) = source.split_once("==") {
            let (name, version) = (name.trim(), version.trim());
            if name.is_empty() || version.is_empty() {
                bail!("'{source}' must be NAME==VERSION");
            }
            return Ok(ResolvedSource {
                spec: format!("{name}=={version}"),
                name: name.to_string(),
                version: version.to_string(),
            });
        }

        let (name, version) = self.query_index(source.trim())?;
        Ok(ResolvedSource {
            spec: format!("{name}=={version}"),
            name,
            version,
        })
    }
}

/// Static `[project].name` and `[project].version`; `None` when either is dynamic.
fn read_pyproject(path: &Path) -> Result<Option<(String, String)>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let doc: DocumentMut = contents
        .parse()
        .with_context(|| format!("parsing {}", path.display()))?;
    let project = doc.get("project").and_then(toml_edit::Item::as_table_like);
    let field = |key: &str| {
        project
            .and_then(|table| table.get(key))
            .and_then(toml_edit::Item::as_str)
            .map(ToString::to_string)
    };
    Ok(field("name").zip(field("version")))
}

fn single_top_level_dir(dest: &Path) -> Result<PathBuf> {
    if dest.join("pyproject.toml").is_file() || dest.join("setup.py").is_file() {
        return Ok(dest.to_path_buf());
    }
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dest).with_context(|| format!("reading {}", dest.display()))? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    match dirs.as_slice() {
        [single] => Ok(single.clone()),
        [] => Ok(dest.to_path_buf()),
        _ => bail!(
            "source archive has {} top-level directories; expected one",
            dirs.len()
        ),
    }
}
