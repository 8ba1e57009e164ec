use clap::{Arg, Command};
use nbforge_core::Report;

pub mod extract;
pub mod publish;

pub fn add_site_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("site_config")
                .value_name("SITE_CONFIG")
                .help("Site configuration file (_quarto.yml)")
                .required(true),
        )
        .arg(
            Arg::new("output")
                .value_name("OUTPUT_DIR")
                .help(
                    "Notebook directory written by extract and read by publish; \
                     defaults to the notebook directory of the built site",
                ),
        )
}

pub fn print_warnings(report: &Report) {
    if report.is_empty() {
        return;
    }
    println!("{} warnings:", report.len());
    for warning in report.warnings() {
        println!("  - {}", warning);
    }
}
