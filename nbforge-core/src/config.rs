use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::{Dialect, Format, FormatTable};
use crate::datasource::ReadCallFamily;
use crate::notebook::KernelSpec;
use crate::xref::DEFAULT_XREF_CLASS;

#[derive(Debug)]
pub enum ConfigError {
    /// A required key is absent, named by its dotted path.
    Missing(&'static str),
    Invalid { key: &'static str, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "Missing required config key `{}`", key),
            ConfigError::Invalid { key, message } => {
                write!(f, "Invalid value for `{}`: {}", key, message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Book edition language.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Python,
    R,
}

impl Language {
    pub fn name(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::R => "r",
        }
    }

    /// Kernel written into extracted (downloadable) notebooks.
    pub fn kernel(&self) -> KernelSpec {
        match self {
            Language::Python => KernelSpec::new("python3", "Python 3", "python"),
            Language::R => KernelSpec::new("ir", "R", "r"),
        }
    }

    /// Kernel of the in-browser runtime.
    pub fn interactive_kernel(&self) -> KernelSpec {
        match self {
            Language::Python => KernelSpec::new("python", "Python (Pyodide)", "python"),
            Language::R => KernelSpec::new("webR", "R (webR)", "r"),
        }
    }

    pub fn read_family(&self) -> ReadCallFamily {
        match self {
            Language::Python => ReadCallFamily::Pandas,
            Language::R => ReadCallFamily::R,
        }
    }

    pub fn comment_token(&self) -> &'static str {
        "#"
    }

    /// Dialect the edition's page Markdown is written in.
    pub fn dialect(&self) -> Dialect {
        match self {
            Language::Python => Dialect::Markdown,
            Language::R => Dialect::RMarkdown,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProjectConfig {
    pub output_dir: Option<String>,
}

/// The `book:` or `website:` section; only the site URL matters here.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default, rename_all = "kebab-case")]
pub struct SiteSection {
    pub site_url: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default, rename_all = "kebab-case")]
pub struct NotebookConfig {
    pub lang: Language,
    pub pages_dir: String,
    pub nb_dir: String,
    /// Short format name; defaults to the edition language.
    pub nb_format: Option<String>,
    pub interact_dir: String,
    pub interact_suffix: String,
    pub kernel_name: Option<String>,
    pub kernel_display_name: Option<String>,
    pub data_root_url: Option<String>,
    pub storage_name: Option<String>,
    pub xref_class: String,
    pub strict_regions: bool,
}

impl Default for NotebookConfig {
    fn default() -> Self {
        Self {
            lang: Language::Python,
            pages_dir: "_notebook-pages".to_string(),
            nb_dir: "notebooks".to_string(),
            nb_format: None,
            interact_dir: "interact".to_string(),
            interact_suffix: ".ipynb".to_string(),
            kernel_name: None,
            kernel_display_name: None,
            data_root_url: None,
            storage_name: None,
            xref_class: DEFAULT_XREF_CLASS.to_string(),
            strict_regions: false,
        }
    }
}

/// The parts of the site configuration file this tool reads.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub project: ProjectConfig,
    pub book: Option<SiteSection>,
    pub website: Option<SiteSection>,
    pub nbforge: NotebookConfig,
}

impl Config {
    pub fn output_dir(&self) -> Result<&str, ConfigError> {
        self.project
            .output_dir
            .as_deref()
            .filter(|dir| !dir.trim().is_empty())
            .ok_or(ConfigError::Missing("project.output-dir"))
    }

    /// `book.site-url`, falling back to `website.site-url`.
    pub fn site_url(&self) -> Result<&str, ConfigError> {
        [&self.book, &self.website]
            .into_iter()
            .flatten()
            .find_map(|section| section.site_url.as_deref())
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("book.site-url"))
    }

    /// Path part of the site URL, used to link from the interactive
    /// notebooks back into the site. Never ends with `/`.
    pub fn site_root_path(&self) -> Result<String, ConfigError> {
        let url = url::Url::parse(self.site_url()?).map_err(|e| ConfigError::Invalid {
            key: "book.site-url",
            message: e.to_string(),
        })?;
        Ok(url.path().trim_end_matches('/').to_string())
    }

    pub fn format(&self) -> Result<Format, ConfigError> {
        let name = self
            .nbforge
            .nb_format
            .as_deref()
            .unwrap_or(self.nbforge.lang.name());
        FormatTable::default()
            .resolve(name)
            .map_err(|e| ConfigError::Invalid {
                key: "nbforge.nb-format",
                message: e.to_string(),
            })
    }

    pub fn interactive_format(&self) -> Result<Format, ConfigError> {
        let suffix = &self.nbforge.interact_suffix;
        Format::from_suffix(suffix).ok_or_else(|| ConfigError::Invalid {
            key: "nbforge.interact-suffix",
            message: format!("no notebook format for suffix {suffix}"),
        })
    }

    /// Interactive kernel, with the configured name overrides applied.
    pub fn interactive_kernel(&self) -> KernelSpec {
        let mut kernel = self.nbforge.lang.interactive_kernel();
        if let Some(name) = &self.nbforge.kernel_name {
            kernel.name = name.clone();
        }
        if let Some(display) = &self.nbforge.kernel_display_name {
            kernel.display_name = display.clone();
        }
        kernel
    }

    /// Browser storage namespace, unique per edition by default.
    pub fn storage_name(&self) -> String {
        self.nbforge
            .storage_name
            .clone()
            .unwrap_or_else(|| format!("nbforge-{}", self.nbforge.lang.name()))
    }

    /// Keys needed by extraction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.output_dir()?;
        self.format()?;
        Ok(())
    }

    /// Keys needed by publishing, on top of [`Config::validate`].
    pub fn validate_publish(&self) -> Result<(), ConfigError> {
        self.validate()?;
        self.site_root_path()?;
        self.interactive_format()?;
        if let Some(root) = &self.nbforge.data_root_url {
            url::Url::parse(root).map_err(|e| ConfigError::Invalid {
                key: "nbforge.data-root-url",
                message: e.to_string(),
            })?;
        }
        Ok(())
    }
}
