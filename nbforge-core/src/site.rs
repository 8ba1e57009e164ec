use std::path::{Component, Path, PathBuf};

/// A rendered document: its path relative to the directory it was scanned
/// from, and its raw text.
#[derive(Debug, Clone)]
pub struct Page {
    pub path: PathBuf,
    pub content: String,
}

impl Page {
    pub fn new<P: AsRef<Path>, S: Into<String>>(path: P, content: S) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            content: content.into(),
        }
    }

    /// Site-relative URL path, always with `/` separators.
    pub fn url(&self) -> String {
        url_path(&self.path)
    }

    /// Directory part of [`Page::url`] with a trailing `/`, or an empty
    /// string for pages at the site root.
    pub fn dir_prefix(&self) -> String {
        match self.path.parent() {
            Some(parent) if parent.as_os_str().is_empty() => String::new(),
            Some(parent) => format!("{}/", url_path(parent)),
            None => String::new(),
        }
    }
}

fn url_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
