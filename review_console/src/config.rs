use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use goban_review::client::ClientOptions;
use goban_review::keepalive::{KEEPALIVE_INTERVAL, RECONNECT_BACKOFF};
use goban_review::pen::DEFAULT_PEN_COLOR;


#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub url: String,
    #[serde(with = "humantime_serde")]
    pub reconnect_backoff: Duration,
    #[serde(with = "humantime_serde")]
    pub keepalive_interval: Duration,
    pub pen_color: String,
    // Up/down arrows jump between explorer rows; shift switches to branch selection.
    pub branch_jump: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            url: String::new(),
            reconnect_backoff: RECONNECT_BACKOFF,
            keepalive_interval: KEEPALIVE_INTERVAL,
            pen_color: DEFAULT_PEN_COLOR.to_owned(),
            branch_jump: true,
        }
    }
}

impl ClientConfig {
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            branch_jump: self.branch_jump,
            pen_color: self.pen_color.clone(),
            keepalive_interval: self.keepalive_interval,
            reconnect_backoff: self.reconnect_backoff,
        }
    }
}

pub fn read_config_file(filename: &str) -> anyhow::Result<ClientConfig> {
    let contents =
        std::fs::read_to_string(filename).context(format!("Failed to read config file '{filename}'."))?;
    parse_config(&contents).context(format!("Failed to parse config file '{filename}'."))
}

pub fn parse_config(contents: &str) -> anyhow::Result<ClientConfig> { Ok(serde_yaml::from_str(contents)?) }
