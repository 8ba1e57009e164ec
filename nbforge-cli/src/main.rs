mod cmd;
mod config;

use clap::{Arg, ArgAction, Command};
use log::LevelFilter;

fn make_app() -> Command {
    Command::new("nbforge")
        .about("Extract, cross-link and publish the notebooks of a Quarto book")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log debug output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(cmd::extract::make_subcommand())
        .subcommand(cmd::publish::make_subcommand())
}

fn init_logger(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    // RUST_LOG wins over the flag
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .parse_default_env()
        .init();
}

fn main() -> anyhow::Result<()> {
    let matches = make_app().get_matches();
    init_logger(matches.get_flag("verbose"));

    match matches.subcommand() {
        Some(("extract", args)) => cmd::extract::execute(args),
        Some(("publish", args)) => cmd::publish::execute(args),
        _ => unreachable!("clap enforces a subcommand"),
    }
}
