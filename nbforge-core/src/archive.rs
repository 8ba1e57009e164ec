//! Re-packing of downloadable notebook archives after notebooks change.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Debug)]
pub enum ArchiveError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Zip {
        path: PathBuf,
        source: zip::result::ZipError,
    },
}

impl ArchiveError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn zip(path: &Path, source: zip::result::ZipError) -> Self {
        ArchiveError::Zip {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl std::fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveError::Io { path, source } => {
                write!(f, "IO error on archive {}: {}", path.display(), source)
            }
            ArchiveError::Zip { path, source } => {
                write!(f, "Invalid archive {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ArchiveError {}

/// Rewrites `path` so every entry whose file name is a key of `replacements`
/// holds the new bytes. Other entries are copied without recompression.
/// Returns the number of entries replaced.
pub fn repack_archive(
    path: &Path,
    replacements: &HashMap<String, Vec<u8>>,
) -> Result<usize, ArchiveError> {
    let file = File::open(path).map_err(|e| ArchiveError::io(path, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| ArchiveError::zip(path, e))?;

    let dir = path.parent().unwrap_or(Path::new("."));
    let tmp = NamedTempFile::new_in(dir).map_err(|e| ArchiveError::io(path, e))?;
    let mut writer = ZipWriter::new(tmp);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut replaced = 0;
    for index in 0..archive.len() {
        let entry = archive
            .by_index_raw(index)
            .map_err(|e| ArchiveError::zip(path, e))?;
        let name = entry.name().to_string();
        let file_name = name.rsplit('/').next().unwrap_or(&name);

        match replacements.get(file_name) {
            Some(bytes) if !entry.is_dir() => {
                drop(entry);
                writer
                    .start_file(name.as_str(), deflated)
                    .map_err(|e| ArchiveError::zip(path, e))?;
                writer
                    .write_all(bytes)
                    .map_err(|e| ArchiveError::io(path, e))?;
                log::debug!("Replaced {} in {}", name, path.display());
                replaced += 1;
            }
            _ => writer
                .raw_copy_file(entry)
                .map_err(|e| ArchiveError::zip(path, e))?,
        }
    }

    let tmp = writer.finish().map_err(|e| ArchiveError::zip(path, e))?;
    tmp.persist(path)
        .map_err(|e| ArchiveError::io(path, e.error))?;

    Ok(replaced)
}

/// Re-packs every `*.zip` directly inside `dir`, in name order. Returns the
/// archives that were rewritten.
pub fn repack_archives(
    dir: &Path,
    replacements: &HashMap<String, Vec<u8>>,
) -> Result<Vec<PathBuf>, ArchiveError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ArchiveError::io(dir, e))?;
    let mut archives = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ArchiveError::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "zip") {
            archives.push(path);
        }
    }
    archives.sort();

    for archive in &archives {
        let replaced = repack_archive(archive, replacements)?;
        log::info!(
            "Re-packed {} ({} notebooks replaced)",
            archive.display(),
            replaced
        );
    }

    Ok(archives)
}
