//! Archive extraction for fetched charts
//!
//! Chart archives (Helm `.tgz` packages, GitHub release tarballs and zipballs)
//! wrap their content in a single top-level directory. Extraction strips that
//! directory so the destination receives its content directly.

use flate2::read::GzDecoder;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use tar::Archive;

use crate::error::{CoreError, Result};

/// Supported archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Zip,
}

impl ArchiveFormat {
    /// Detect the format from a file name or URL path
    pub fn detect(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else if lower.ends_with(".tgz") || lower.ends_with(".tar.gz") {
            Some(Self::TarGz)
        } else {
            None
        }
    }
}

/// Extract an in-memory archive into `dest`, stripping the top-level directory
///
/// Returns the number of files written.
pub fn extract(data: &[u8], format: ArchiveFormat, dest: &Path) -> Result<usize> {
    std::fs::create_dir_all(dest)?;

    match format {
        ArchiveFormat::TarGz => extract_tar_gz(data, dest),
        ArchiveFormat::Zip => extract_zip(data, dest),
    }
}

/// Extract a gzipped tarball, stripping the first path component
pub fn extract_tar_gz(data: &[u8], dest: &Path) -> Result<usize> {
    let decoder = GzDecoder::new(Cursor::new(data));
    let mut archive = Archive::new(decoder);
    let mut written = 0;

    for entry in archive.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;
        let entry_type = entry.header().entry_type();

        if !entry_type.is_file() && !entry_type.is_dir() {
            tracing::debug!(
                entry = %entry.path().map_err(corrupt)?.display(),
                "skipping non-regular archive entry"
            );
            continue;
        }

        let path = entry.path().map_err(corrupt)?.into_owned();
        let Some(relative) = strip_first_component(&path)? else {
            continue;
        };
        let target = dest.join(relative);

        if entry_type.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut content = Vec::new();
        entry.read_to_end(&mut content).map_err(corrupt)?;
        std::fs::write(&target, content)?;
        written += 1;
    }

    Ok(written)
}

/// Extract a zip archive, stripping the first path component
pub fn extract_zip(data: &[u8], dest: &Path) -> Result<usize> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))?;
    let mut written = 0;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;

        let path = file
            .enclosed_name()
            .ok_or_else(|| CoreError::UnsafeArchivePath {
                entry: file.name().to_string(),
            })?;
        let Some(relative) = strip_first_component(&path)? else {
            continue;
        };
        let target = dest.join(relative);

        if file.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut content = Vec::new();
        file.read_to_end(&mut content).map_err(corrupt)?;
        std::fs::write(&target, content)?;
        written += 1;
    }

    Ok(written)
}

/// Read or decode failure inside the archive itself
fn corrupt(e: std::io::Error) -> CoreError {
    CoreError::Archive {
        message: e.to_string(),
    }
}

/// Drop the top-level directory of an archive entry path
///
/// Returns `None` for the top-level directory itself. Any component other
/// than a plain name (`..`, a root, a drive prefix) is rejected.
fn strip_first_component(path: &Path) -> Result<Option<PathBuf>> {
    let mut parts = Vec::new();

    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            _ => {
                return Err(CoreError::UnsafeArchivePath {
                    entry: path.display().to_string(),
                });
            }
        }
    }

    if parts.len() < 2 {
        return Ok(None);
    }

    Ok(Some(parts[1..].iter().collect()))
}
