//! Turns the notebooks written during extraction into the two published
//! sets: downloadable notebooks that link back to the full site URL, and
//! in-browser notebooks with a different kernel and site-relative links.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::archive::{self, ArchiveError};
use crate::codec::{self, CodecError, Format};
use crate::datasource::{DataSourceRewriter, ReadCallFamily};
use crate::notebook::{KernelSpec, Notebook};
use crate::report::Report;
use crate::xref::{self, DEFAULT_XREF_CLASS, XrefTable};

pub const RUNTIME_CONFIG_FILE: &str = "jupyter-lite.json";

#[derive(Debug)]
pub enum PublishError {
    MissingInputDir,
    MissingOutputDir,
    MissingDownloadPrefix,
    UnknownSuffix(String),
    Io { path: PathBuf, source: std::io::Error },
    Walk(walkdir::Error),
    Codec { path: PathBuf, source: CodecError },
    Archive(ArchiveError),
}

impl PublishError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        PublishError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn codec(path: &Path, source: CodecError) -> Self {
        PublishError::Codec {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<ArchiveError> for PublishError {
    fn from(err: ArchiveError) -> Self {
        PublishError::Archive(err)
    }
}

impl From<walkdir::Error> for PublishError {
    fn from(err: walkdir::Error) -> Self {
        PublishError::Walk(err)
    }
}

impl std::fmt::Display for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishError::MissingInputDir => write!(f, "Notebook directory not specified"),
            PublishError::MissingOutputDir => write!(f, "Interactive output directory not specified"),
            PublishError::MissingDownloadPrefix => write!(f, "Download link prefix not specified"),
            PublishError::UnknownSuffix(s) => write!(f, "No notebook format for suffix {}", s),
            PublishError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            PublishError::Walk(e) => write!(f, "Copy error: {}", e),
            PublishError::Codec { path, source } => write!(f, "{}: {}", path.display(), source),
            PublishError::Archive(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for PublishError {}

#[derive(Debug, Default)]
pub struct PublishSummary {
    /// Download notebooks rewritten in place.
    pub notebooks: Vec<PathBuf>,
    /// Interactive notebooks written to the output root.
    pub interactive: Vec<PathBuf>,
    pub archives: Vec<PathBuf>,
    pub resolved_links: usize,
    pub data_rewrites: usize,
    pub report: Report,
}

pub struct PublisherBuilder {
    input_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    input_suffix: String,
    interact_suffix: String,
    download_prefix: Option<String>,
    interact_prefix: String,
    kernel: Option<KernelSpec>,
    data_root_url: Option<String>,
    read_family: ReadCallFamily,
    comment_token: String,
    storage_name: String,
    xref_class: String,
}

impl Default for PublisherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PublisherBuilder {
    pub fn new() -> Self {
        Self {
            input_dir: None,
            output_dir: None,
            input_suffix: ".ipynb".to_string(),
            interact_suffix: ".ipynb".to_string(),
            download_prefix: None,
            interact_prefix: String::new(),
            kernel: None,
            data_root_url: None,
            read_family: ReadCallFamily::Pandas,
            comment_token: "#".to_string(),
            storage_name: "nbforge".to_string(),
            xref_class: DEFAULT_XREF_CLASS.to_string(),
        }
    }

    // Required configuration
    pub fn input_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.input_dir = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn output_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.output_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Absolute site URL put in front of download notebook links.
    pub fn download_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.download_prefix = Some(prefix.into());
        self
    }

    // Optional
    pub fn input_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.input_suffix = suffix.into();
        self
    }

    pub fn interact_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.interact_suffix = suffix.into();
        self
    }

    /// Site-root-relative path put in front of interactive notebook links.
    pub fn interact_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.interact_prefix = prefix.into();
        self
    }

    pub fn kernel(mut self, kernel: KernelSpec) -> Self {
        self.kernel = Some(kernel);
        self
    }

    pub fn data_root_url<S: Into<String>>(mut self, url: S) -> Self {
        self.data_root_url = Some(url.into());
        self
    }

    pub fn read_family(mut self, family: ReadCallFamily) -> Self {
        self.read_family = family;
        self
    }

    pub fn comment_token<S: Into<String>>(mut self, token: S) -> Self {
        self.comment_token = token.into();
        self
    }

    pub fn storage_name<S: Into<String>>(mut self, name: S) -> Self {
        self.storage_name = name.into();
        self
    }

    pub fn xref_class<S: Into<String>>(mut self, class: S) -> Self {
        self.xref_class = class.into();
        self
    }

    pub fn build(self) -> Result<Publisher, PublishError> {
        let input_dir = self.input_dir.ok_or(PublishError::MissingInputDir)?;
        let output_dir = self.output_dir.ok_or(PublishError::MissingOutputDir)?;
        let download_prefix = self
            .download_prefix
            .ok_or(PublishError::MissingDownloadPrefix)?;
        let input_format = Format::from_suffix(&self.input_suffix)
            .ok_or_else(|| PublishError::UnknownSuffix(self.input_suffix.clone()))?;
        let interact_format = Format::from_suffix(&self.interact_suffix)
            .ok_or_else(|| PublishError::UnknownSuffix(self.interact_suffix.clone()))?;

        let rewriter = self.data_root_url.map(|root| {
            DataSourceRewriter::new(root, self.read_family).comment_token(self.comment_token)
        });

        Ok(Publisher {
            input_dir,
            output_dir,
            input_suffix: self.input_suffix,
            input_format,
            interact_suffix: self.interact_suffix,
            interact_format,
            download_prefix,
            interact_prefix: self.interact_prefix,
            kernel: self.kernel,
            rewriter,
            storage_name: self.storage_name,
            xref_class: self.xref_class,
        })
    }
}

struct SourceNotebook {
    path: PathBuf,
    file_name: String,
    stem: String,
    patched: Notebook,
}

pub struct Publisher {
    input_dir: PathBuf,
    output_dir: PathBuf,
    input_suffix: String,
    input_format: Format,
    interact_suffix: String,
    interact_format: Format,
    download_prefix: String,
    interact_prefix: String,
    kernel: Option<KernelSpec>,
    rewriter: Option<DataSourceRewriter>,
    storage_name: String,
    xref_class: String,
}

impl Publisher {
    pub fn builder() -> PublisherBuilder {
        PublisherBuilder::new()
    }

    pub fn publish(&self, table: &XrefTable) -> Result<PublishSummary, PublishError> {
        let mut summary = PublishSummary::default();
        for anchor in table.collisions() {
            let target = table.get(anchor).map_or("", |link| link.href.as_str());
            summary.report.warn(
                "cross-references",
                format!("anchor {} is defined on more than one page, using {}", anchor, target),
            );
        }

        let sources = self.load_and_patch(table, &mut summary)?;
        log::info!(
            "Patched {} notebooks ({} links resolved)",
            sources.len(),
            summary.resolved_links
        );

        self.publish_downloads(&sources, &mut summary)?;
        self.publish_interactive(&sources, &mut summary)?;

        Ok(summary)
    }

    fn notebook_paths(&self) -> Result<Vec<PathBuf>, PublishError> {
        let entries =
            std::fs::read_dir(&self.input_dir).map_err(|e| PublishError::io(&self.input_dir, e))?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| PublishError::io(&self.input_dir, e))?.path();
            if path.is_file() && self.is_notebook(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        Ok(paths)
    }

    fn is_notebook(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| {
                name.len() > self.input_suffix.len() && name.ends_with(&self.input_suffix)
            })
    }

    fn load_and_patch(
        &self,
        table: &XrefTable,
        summary: &mut PublishSummary,
    ) -> Result<Vec<SourceNotebook>, PublishError> {
        let mut sources = Vec::new();
        for path in self.notebook_paths()? {
            let text = std::fs::read_to_string(&path).map_err(|e| PublishError::io(&path, e))?;
            let notebook =
                codec::read(&text, self.input_format).map_err(|e| PublishError::codec(&path, e))?;
            let (patched, patch) = table.patch(&notebook);

            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            for anchor in &patch.unresolved {
                summary
                    .report
                    .warn(&file_name, format!("unresolved cross-reference {}", anchor));
            }
            summary.resolved_links += patch.resolved;

            let stem = file_name
                .strip_suffix(self.input_suffix.as_str())
                .unwrap_or(&file_name)
                .to_string();
            sources.push(SourceNotebook {
                path,
                file_name,
                stem,
                patched,
            });
        }

        Ok(sources)
    }

    fn publish_downloads(
        &self,
        sources: &[SourceNotebook],
        summary: &mut PublishSummary,
    ) -> Result<(), PublishError> {
        let mut replacements = HashMap::new();
        for source in sources {
            let notebook = xref::prefix_links(&source.patched, &self.download_prefix, &self.xref_class);
            let text = codec::write(&notebook, self.input_format)
                .map_err(|e| PublishError::codec(&source.path, e))?;
            std::fs::write(&source.path, &text).map_err(|e| PublishError::io(&source.path, e))?;
            replacements.insert(source.file_name.clone(), text.into_bytes());
            summary.notebooks.push(source.path.clone());
        }

        summary.archives = archive::repack_archives(&self.input_dir, &replacements)?;
        Ok(())
    }

    fn publish_interactive(
        &self,
        sources: &[SourceNotebook],
        summary: &mut PublishSummary,
    ) -> Result<(), PublishError> {
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| PublishError::io(&self.output_dir, e))?;
        self.copy_assets()?;

        for source in sources {
            let mut notebook = match &self.kernel {
                Some(kernel) => source.patched.with_kernelspec(kernel),
                None => source.patched.clone(),
            };
            if let Some(rewriter) = &self.rewriter {
                let (rewritten, count) = rewriter.rewrite(&notebook);
                summary.data_rewrites += count;
                notebook = rewritten;
            }
            let notebook = xref::prefix_links(&notebook, &self.interact_prefix, &self.xref_class);

            let out_path = self
                .output_dir
                .join(format!("{}{}", source.stem, self.interact_suffix));
            let text = codec::write(&notebook, self.interact_format)
                .map_err(|e| PublishError::codec(&out_path, e))?;
            log::info!("Writing {}", out_path.display());
            std::fs::write(&out_path, text).map_err(|e| PublishError::io(&out_path, e))?;
            summary.interactive.push(out_path);
        }

        self.write_runtime_config()
    }

    /// Copies everything in the input directory except the notebooks
    /// themselves, recursively.
    fn copy_assets(&self) -> Result<(), PublishError> {
        let walker = WalkDir::new(&self.input_dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.path() != self.output_dir);

        for entry in walker {
            let entry = entry?;
            let path = entry.path();
            if entry.depth() == 1 && entry.file_type().is_file() && self.is_notebook(path) {
                continue;
            }
            let Ok(relative) = path.strip_prefix(&self.input_dir) else {
                continue;
            };
            let target = self.output_dir.join(relative);
            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&target).map_err(|e| PublishError::io(&target, e))?;
            } else {
                log::debug!("Copying {} to {}", path.display(), target.display());
                std::fs::copy(path, &target).map_err(|e| PublishError::io(&target, e))?;
            }
        }

        Ok(())
    }

    fn write_runtime_config(&self) -> Result<(), PublishError> {
        let config = serde_json::json!({
            "jupyter-lite-schema-version": 0,
            "jupyter-config-data": {
                "contentsStorageName": self.storage_name,
            }
        });
        let path = self.output_dir.join(RUNTIME_CONFIG_FILE);
        let mut text = serde_json::to_string_pretty(&config)
            .map_err(|e| PublishError::codec(&path, CodecError::Json(e)))?;
        text.push('\n');
        std::fs::write(&path, text).map_err(|e| PublishError::io(&path, e))
    }
}
