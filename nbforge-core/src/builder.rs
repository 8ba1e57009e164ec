use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::codec::{self, CodecError, CodecOptions, Dialect, Format};
use crate::dialect;
use crate::notebook::KernelSpec;
use crate::region::{ExtractOptions, RegionError, extract_regions};
use crate::report::Report;
use crate::scanner::{ScanError, SiteScanner};
use crate::site::Page;

#[derive(Debug)]
pub enum BuildError {
    MissingNotebookDir,
    MissingSources,
    Io { path: PathBuf, source: std::io::Error },
    ScanError(ScanError),
    Region { page: PathBuf, source: RegionError },
    CodecError(CodecError),
}

impl From<ScanError> for BuildError {
    fn from(err: ScanError) -> Self {
        BuildError::ScanError(err)
    }
}

impl From<CodecError> for BuildError {
    fn from(err: CodecError) -> Self {
        BuildError::CodecError(err)
    }
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::MissingNotebookDir => write!(f, "Notebook directory not specified"),
            BuildError::MissingSources => write!(f, "No pages or pages directory specified"),
            BuildError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            BuildError::ScanError(e) => write!(f, "Scan error: {}", e),
            BuildError::Region { page, source } => write!(f, "{}: {}", page.display(), source),
            BuildError::CodecError(e) => write!(f, "Codec error: {}", e),
        }
    }
}

impl std::error::Error for BuildError {}

#[derive(Debug, Default)]
pub struct BuildSummary {
    /// Written notebook files, in the order they were written.
    pub notebooks: Vec<PathBuf>,
    pub report: Report,
}

/// Extracts the notebook regions of book pages and writes each one as a
/// notebook file.
pub struct NotebookBuilder {
    pages_dir: Option<PathBuf>,
    notebook_dir: Option<PathBuf>,
    pages: Vec<PathBuf>,
    dialect: Dialect,
    format: Format,
    kernel: Option<KernelSpec>,
    codec: CodecOptions,
    extract: ExtractOptions,
}

impl Default for NotebookBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NotebookBuilder {
    pub fn new() -> Self {
        Self {
            pages_dir: None,
            notebook_dir: None,
            pages: Vec::new(),
            dialect: Dialect::Markdown,
            format: Format::Ipynb,
            kernel: None,
            codec: CodecOptions::default(),
            extract: ExtractOptions::default(),
        }
    }

    // Required configuration
    pub fn notebook_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.notebook_dir = Some(path.as_ref().to_path_buf());
        self
    }

    // Sources: explicit pages win over the pages directory
    pub fn pages_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.pages_dir = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn add_page<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.pages.push(path.as_ref().to_path_buf());
        self
    }

    pub fn add_pages<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.pages
            .extend(paths.into_iter().map(|p| p.as_ref().to_path_buf()));
        self
    }

    // Conversion
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn kernel(mut self, kernel: KernelSpec) -> Self {
        self.kernel = Some(kernel);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.extract.strict = strict;
        self
    }

    pub fn build(self) -> Result<BuildSummary, BuildError> {
        let notebook_dir = self
            .notebook_dir
            .clone()
            .ok_or(BuildError::MissingNotebookDir)?;
        let pages = self.load_pages()?;

        std::fs::create_dir_all(&notebook_dir).map_err(|source| BuildError::Io {
            path: notebook_dir.clone(),
            source,
        })?;

        let mut summary = BuildSummary::default();
        let mut written = HashSet::new();
        for page in &pages {
            let source = page.path.display().to_string();
            let extraction =
                extract_regions(&page.content, &self.extract).map_err(|e| BuildError::Region {
                    page: page.path.clone(),
                    source: e,
                })?;
            for warning in extraction.warnings {
                summary.report.warn(&source, warning);
            }

            for region in extraction.regions {
                let (file_name, format) = match self.target(&region.name) {
                    Ok(target) => target,
                    Err(reason) => {
                        summary.report.warn(&source, reason);
                        continue;
                    }
                };
                if format != self.format {
                    summary.report.warn(
                        &source,
                        format!(
                            "notebook {} is written as .{} to match its name",
                            file_name,
                            format.extension()
                        ),
                    );
                }
                if !written.insert(file_name.clone()) {
                    summary.report.warn(
                        &source,
                        format!("notebook {} written by an earlier page is replaced", file_name),
                    );
                }

                let out_path = notebook_dir.join(&file_name);
                let text = self.render(&region.text, format)?;
                log::info!("Writing {}", out_path.display());
                std::fs::write(&out_path, text).map_err(|source| BuildError::Io {
                    path: out_path.clone(),
                    source,
                })?;
                summary.notebooks.push(out_path);
            }
        }

        log::info!(
            "Wrote {} notebooks from {} pages",
            summary.notebooks.len(),
            pages.len()
        );
        Ok(summary)
    }

    fn load_pages(&self) -> Result<Vec<Page>, BuildError> {
        if !self.pages.is_empty() {
            return self
                .pages
                .iter()
                .map(|path| {
                    std::fs::read_to_string(path)
                        .map(|content| Page::new(path, content))
                        .map_err(|source| BuildError::Io {
                            path: path.clone(),
                            source,
                        })
                })
                .collect();
        }
        match &self.pages_dir {
            Some(dir) => Ok(SiteScanner::new(dir).extension("md").scan()?),
            None => Err(BuildError::MissingSources),
        }
    }

    /// Region text to serialized notebook.
    fn render(&self, region: &str, format: Format) -> Result<String, CodecError> {
        let text = match self.dialect {
            Dialect::RMarkdown => dialect::normalize(region),
            Dialect::Markdown => dialect::strip_comments(region),
        };
        let mut notebook = codec::parse_text(&text, self.dialect, &self.codec);
        if let Some(kernel) = &self.kernel {
            notebook = notebook.with_kernelspec(kernel);
        }
        codec::write(&notebook, format)
    }

    /// File name and format for a region name. Names without an extension
    /// get the output format's one; a notebook extension picks its own
    /// format. Names that would leave the notebook directory, or that carry
    /// any other extension, are refused.
    fn target(&self, name: &str) -> Result<(String, Format), String> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(format!("unusable notebook name \"{}\"", name));
        }
        let path = Path::new(name);
        if path.extension().is_none() {
            return Ok((format!("{}.{}", name, self.format.extension()), self.format));
        }
        match Format::from_path(path) {
            Some(format) => Ok((name.to_string(), format)),
            None => Err(format!("unknown notebook extension in \"{}\"", name)),
        }
    }
}
