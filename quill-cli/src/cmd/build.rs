use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::info;

use crate::config::QuillConfig;

/// Arguments shared by every command that builds the site. Defaults live in
/// [`QuillConfig`] so that unset flags don't mask the config file.
pub fn add_build_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("source")
                .short('s')
                .long("source")
                .value_name("DIR")
                .help("Site directory containing pages, static and templates"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Output directory for generated site"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file [default: ./quill.toml]"),
        )
        .arg(
            Arg::new("prod")
                .long("prod")
                .help("Production build: drop drafts and make URLs absolute")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("skip_feed")
                .long("skip-feed")
                .help("Don't write feed.xml")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("vanity")
                .long("vanity")
                .help("Build the vanity import site")
                .action(ArgAction::SetTrue),
        )
}

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("build")).about("Build the site")
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    // Load cascading configuration
    let config = QuillConfig::load(args)?;
    let site = config.site_config()?;

    let report = quill_core::build(&site)
        .with_context(|| format!("failed to build {}", site.src.display()))?;
    info!("Site built successfully in {} ({report})", site.dst.display());

    Ok(())
}
