use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::{info, warn};
use quill_dev_server::{DevServer, DevServerConfig};
use tokio_util::sync::CancellationToken;

use crate::cmd::build::add_build_args;
use crate::config::QuillConfig;

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("serve"))
        .about("Build the site, serve it and rebuild on changes")
        .arg(
            Arg::new("listen")
                .short('l')
                .long("listen")
                .value_name("ADDR")
                .help("Address to serve on [default: localhost:3000]"),
        )
        .arg(
            Arg::new("open")
                .long("open")
                .help("Open browser automatically")
                .action(ArgAction::SetTrue),
        )
}

pub async fn execute(args: &ArgMatches) -> Result<()> {
    // Load cascading configuration
    let config = QuillConfig::load(args)?;
    let site = config.site_config()?;
    let addr = config.listen_addr()?;

    let token = CancellationToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupted, shutting down");
                interrupt.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {e}"),
        }
    });

    DevServer::new(DevServerConfig {
        site,
        addr,
        open: config.build.open,
    })
    .run(token)
    .await
}
