use anyhow::{Context, Result};
use clap::{ArgMatches, Command};
use nbforge_core::{Publisher, XrefScanner};

use super::{add_site_args, print_warnings};
use crate::config::NbforgeConfig;

pub fn make_subcommand() -> Command {
    add_site_args(Command::new("publish"))
        .about("Resolve cross-references and publish download and interactive notebooks")
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    let config = NbforgeConfig::load(args)?;
    let site = &config.site;
    site.validate_publish()
        .with_context(|| format!("Invalid site configuration {}", config.run.site_config))?;

    let site_root = config.site_root()?;
    let notebook_dir = config.notebook_dir()?;
    let interact_dir = config.interact_dir()?;
    let lang = site.nbforge.lang;

    // The table must be complete before any notebook is patched.
    let table = XrefScanner::new(&site_root)
        .class(&site.nbforge.xref_class)
        .scan()
        .with_context(|| format!("Failed to index {}", site_root.display()))?;
    println!("Indexed {} cross-reference anchors", table.len());

    let mut builder = Publisher::builder()
        .input_dir(&notebook_dir)
        .output_dir(&interact_dir)
        .input_suffix(format!(".{}", site.format()?.extension()))
        .interact_suffix(&site.nbforge.interact_suffix)
        .download_prefix(site.site_url()?)
        .interact_prefix(site.site_root_path()?)
        .kernel(site.interactive_kernel())
        .read_family(lang.read_family())
        .comment_token(lang.comment_token())
        .storage_name(site.storage_name())
        .xref_class(&site.nbforge.xref_class);
    if let Some(root) = &site.nbforge.data_root_url {
        builder = builder.data_root_url(root);
    }

    let summary = builder
        .build()?
        .publish(&table)
        .with_context(|| format!("Failed to publish notebooks from {}", notebook_dir.display()))?;

    print_warnings(&summary.report);
    println!(
        "Published {} notebooks ({} links resolved, {} archives re-packed)",
        summary.notebooks.len(),
        summary.resolved_links,
        summary.archives.len()
    );
    println!(
        "Interactive notebooks in {} ({} data reads rewritten)",
        interact_dir.display(),
        summary.data_rewrites
    );

    Ok(())
}
