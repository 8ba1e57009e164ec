use anyhow::Result;
use clap::ArgMatches;
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete configuration that merges CLI args, env vars, the site config file, and defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NbforgeConfig {
    /// Invocation settings
    pub run: RunConfig,
    /// Site configuration (from nbforge-core)
    #[serde(flatten)]
    pub site: nbforge_core::Config,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RunConfig {
    /// Site configuration file path
    pub site_config: String,
    /// Notebook directory given on the command line
    pub output: Option<String>,
    /// Pages to extract from
    pub pages: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            site_config: "./_quarto.yml".to_string(),
            output: None,
            pages: Vec::new(),
        }
    }
}

impl NbforgeConfig {
    /// Load configuration with cascading precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables (NBFORGE_*)
    /// 3. Site configuration file (YAML or TOML, by extension)
    /// 4. Defaults (lowest priority)
    pub fn load(args: &ArgMatches) -> Result<Self> {
        let site_config = args
            .get_one::<String>("site_config")
            .cloned()
            .unwrap_or_else(|| RunConfig::default().site_config);

        let mut builder = ConfigBuilder::builder();

        // 1. Start with defaults
        let defaults = Self::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. The site configuration file must exist
        builder = builder.add_source(File::with_name(&site_config).required(true));

        // 3. Add environment variables with NBFORGE_ prefix
        builder = builder.add_source(
            Environment::with_prefix("NBFORGE")
                .prefix_separator("_")
                .separator("__"), // Use double underscore for nested keys
        );

        // 4. Override with CLI arguments (highest priority)
        builder = builder.set_override("run.site_config", site_config)?;
        if let Some(output) = args.try_get_one::<String>("output").unwrap_or(None) {
            builder = builder.set_override("run.output", output.clone())?;
        }
        // Only extract defines pages
        if let Some(pages) = args.try_get_many::<String>("pages").unwrap_or(None) {
            let pages: Vec<String> = pages.cloned().collect();
            builder = builder.set_override("run.pages", pages)?;
        }

        // Build and deserialize
        let config = builder.build()?;
        let nbforge_config: NbforgeConfig = config.try_deserialize()?;

        Ok(nbforge_config)
    }

    /// Directory holding the site configuration; site paths are relative to it.
    pub fn project_dir(&self) -> PathBuf {
        match Path::new(&self.run.site_config).parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Root of the built site (`project.output-dir`).
    pub fn site_root(&self) -> Result<PathBuf> {
        Ok(self.project_dir().join(self.site.output_dir()?))
    }

    /// Where extract writes notebooks and publish reads them: the OUTPUT_DIR
    /// argument, else the notebook directory inside the built site.
    pub fn notebook_dir(&self) -> Result<PathBuf> {
        match &self.run.output {
            Some(output) => Ok(PathBuf::from(output)),
            None => Ok(self.site_root()?.join(&self.site.nbforge.nb_dir)),
        }
    }

    /// Where interactive notebooks go, inside the built site.
    pub fn interact_dir(&self) -> Result<PathBuf> {
        Ok(self.site_root()?.join(&self.site.nbforge.interact_dir))
    }
}
