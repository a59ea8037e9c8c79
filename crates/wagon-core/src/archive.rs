use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use sha2::{Digest, Sha256};
use tar::{Archive, Builder};
use tracing::debug;
use walkdir::WalkDir;
use wagon_domain::ArchiveFormat;
use zip::{write::FileOptions, CompressionMethod, ZipArchive, ZipWriter};

use crate::effects::ArchiveCodec;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZIP_MAGIC: [u8; 4] = [b'P', b'K', 0x03, 0x04];

/// tar.gz and zip support backed by the `tar`, `flate2` and `zip` crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemArchiveCodec;

impl ArchiveCodec for SystemArchiveCodec {
    fn pack(&self, root: &Path, out: &mut File, format: ArchiveFormat) -> Result<()> {
        debug!(root = %root.display(), %format, "packing archive");
        match format {
            ArchiveFormat::TarGz => pack_tar_gz(root, out),
            ArchiveFormat::Zip => pack_zip(root, out),
        }
    }

    fn unpack(&self, archive: &Path, dest: &Path) -> Result<ArchiveFormat> {
        let format = detect_format(archive)?.ok_or_else(|| {
            anyhow!(
                "{} is neither a tar.gz nor a zip archive",
                archive.display()
            )
        })?;
        debug!(archive = %archive.display(), %format, "extracting archive");
        let file =
            File::open(archive).with_context(|| format!("opening {}", archive.display()))?;
        match format {
            ArchiveFormat::TarGz => {
                let mut tar = Archive::new(GzDecoder::new(file));
                tar.unpack(dest)
                    .with_context(|| format!("extracting archive into {}", dest.display()))?;
            }
            ArchiveFormat::Zip => {
                let mut zip = ZipArchive::new(file)
                    .with_context(|| format!("reading zip archive {}", archive.display()))?;
                zip.extract(dest)
                    .with_context(|| format!("extracting zip archive into {}", dest.display()))?;
            }
        }
        Ok(format)
    }
}

/// Sniffs the container format from magic bytes, falling back to the extension.
pub fn detect_format(path: &Path) -> Result<Option<ArchiveFormat>> {
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut magic = [0u8; 4];
    let mut filled = 0;
    while filled < magic.len() {
        let read = file.read(&mut magic[filled..])?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    if filled >= GZIP_MAGIC.len() && magic[..GZIP_MAGIC.len()] == GZIP_MAGIC {
        return Ok(Some(ArchiveFormat::TarGz));
    }
    if filled == ZIP_MAGIC.len() && magic == ZIP_MAGIC {
        return Ok(Some(ArchiveFormat::Zip));
    }
    if filled == 0 {
        return Ok(None);
    }
    Ok(ArchiveFormat::from_path(path))
}

pub(crate) fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

fn pack_tar_gz(root: &Path, out: &mut File) -> Result<()> {
    let encoder = GzEncoder::new(out, Compression::default());
    let mut tar = Builder::new(encoder);
    for (path, relative, is_dir) in archive_entries(root)? {
        if is_dir {
            tar.append_dir(&relative, &path)?;
        } else {
            tar.append_path_with_name(&path, &relative)
                .with_context(|| format!("adding {} to archive", path.display()))?;
        }
    }
    let encoder = tar.into_inner()?;
    encoder.finish()?;
    Ok(())
}

fn pack_zip(root: &Path, out: &mut File) -> Result<()> {
    let mut zip = ZipWriter::new(out);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (path, relative, is_dir) in archive_entries(root)? {
        if is_dir {
            zip.add_directory(relative, options)?;
        } else {
            zip.start_file(relative, options)?;
            let mut file =
                File::open(&path).with_context(|| format!("opening {}", path.display()))?;
            io::copy(&mut file, &mut zip)
                .with_context(|| format!("adding {} to archive", path.display()))?;
        }
    }
    zip.finish()?;
    Ok(())
}

// Sorted so equal trees produce archives with identical entry order.
fn archive_entries(root: &Path) -> Result<Vec<(std::path::PathBuf, String, bool)>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .with_context(|| format!("{} escapes {}", entry.path().display(), root.display()))?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        entries.push((
            entry.path().to_path_buf(),
            relative,
            entry.file_type().is_dir(),
        ));
    }
    Ok(entries)
}
