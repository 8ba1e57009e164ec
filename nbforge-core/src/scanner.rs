use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::site::Page;

#[derive(Debug)]
pub enum ScanError {
    IoError(std::io::Error),
    InvalidPath(PathBuf),
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        ScanError::IoError(err)
    }
}

impl From<walkdir::Error> for ScanError {
    fn from(err: walkdir::Error) -> Self {
        ScanError::IoError(err.into())
    }
}

impl std::fmt::Display for ScanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanError::IoError(e) => write!(f, "IO error: {}", e),
            ScanError::InvalidPath(p) => write!(f, "Invalid path: {}", p.display()),
        }
    }
}

impl std::error::Error for ScanError {}

/// Walks a directory tree and loads every page with a given extension.
pub struct SiteScanner {
    source_dir: PathBuf,
    extension: String,
}

impl SiteScanner {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            source_dir: path.as_ref().to_path_buf(),
            extension: "html".to_string(),
        }
    }

    pub fn extension<S: Into<String>>(mut self, ext: S) -> Self {
        self.extension = ext.into().trim_start_matches('.').to_string();
        self
    }

    /// Pages in sorted path order. Any unreadable entry aborts the scan.
    pub fn scan(&self) -> Result<Vec<Page>, ScanError> {
        log::debug!(
            "Scanning {} for .{} pages",
            self.source_dir.display(),
            self.extension
        );

        let mut pages = Vec::new();
        for path in self.page_paths()? {
            pages.push(self.scan_page(path)?);
        }

        Ok(pages)
    }

    fn page_paths(&self) -> Result<Vec<PathBuf>, ScanError> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(&self.source_dir).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() && has_extension(entry.path(), &self.extension) {
                paths.push(entry.into_path());
            }
        }

        Ok(paths)
    }

    fn scan_page(&self, path: PathBuf) -> Result<Page, ScanError> {
        let content = std::fs::read_to_string(&path)?;
        let relative_path = path
            .strip_prefix(&self.source_dir)
            .map_err(|_| ScanError::InvalidPath(path.clone()))?;

        Ok(Page::new(relative_path, content))
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}
