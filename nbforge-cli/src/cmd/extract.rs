use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use nbforge_core::NotebookBuilder;

use super::{add_site_args, print_warnings};
use crate::config::NbforgeConfig;

pub fn make_subcommand() -> Command {
    add_site_args(Command::new("extract"))
        .about("Extract notebook regions from book pages into notebooks")
        .arg(
            Arg::new("pages")
                .value_name("PAGES")
                .help("Pages to read; defaults to every .md page in the pages directory")
                .num_args(1..),
        )
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    let config = NbforgeConfig::load(args)?;
    let site = &config.site;
    site.validate()
        .with_context(|| format!("Invalid site configuration {}", config.run.site_config))?;

    let notebook_dir = config.notebook_dir()?;
    let lang = site.nbforge.lang;

    let mut builder = NotebookBuilder::new()
        .notebook_dir(&notebook_dir)
        .dialect(lang.dialect())
        .format(site.format()?)
        .kernel(lang.kernel())
        .strict(site.nbforge.strict_regions);
    builder = if config.run.pages.is_empty() {
        builder.pages_dir(config.project_dir().join(&site.nbforge.pages_dir))
    } else {
        builder.add_pages(&config.run.pages)
    };

    let summary = builder
        .build()
        .with_context(|| format!("Failed to extract notebooks into {}", notebook_dir.display()))?;

    print_warnings(&summary.report);
    println!(
        "Extracted {} notebooks into {}",
        summary.notebooks.len(),
        notebook_dir.display()
    );

    Ok(())
}
