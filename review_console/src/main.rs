#![forbid(unsafe_code)]
#![cfg_attr(feature = "strict", deny(warnings))]

mod client_main;
mod config;
mod network;
mod tui;

use clap::{Command, arg};
use goban_review::client::ConnectionMode;


fn main() -> anyhow::Result<()> {
    env_logger::Builder::new()
        .target(env_logger::Target::Stdout)
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let matches = Command::new("Goban review")
        .version(clap::crate_version!())
        .about("Terminal client for shared Go game reviews")
        .subcommand_required(true)
        .subcommand(
            Command::new("client")
                .about("Join a review room")
                .arg(arg!([url] "Room address, e.g. ws://localhost:8000/abc123"))
                .arg(arg!(--shared "Send moves to the server (default)").conflicts_with("local"))
                .arg(arg!(--local "Review offline: nothing is sent, moves apply immediately"))
                .arg(arg!(--config <config_file> "Path to the configuration file: yaml-serialized ClientConfig")),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("client", sub_matches)) => {
            let mut config = match sub_matches.get_one::<String>("config") {
                Some(path) => config::read_config_file(path)?,
                None => config::ClientConfig::default(),
            };
            if let Some(url) = sub_matches.get_one::<String>("url") {
                config.url = url.clone();
            }
            let mode = if sub_matches.get_flag("local") {
                ConnectionMode::Local
            } else {
                ConnectionMode::Shared
            };
            if mode == ConnectionMode::Shared && config.url.is_empty() {
                anyhow::bail!("Room address is required unless --local is given");
            }
            client_main::run(config, mode)
        }
        _ => unreachable!("Exhausted list of subcommands and subcommand_required prevents `None`"),
    }
}
