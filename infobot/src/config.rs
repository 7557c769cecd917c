//! Command line and config file handling.
//!
//! The config file is TOML:
//!
//! ```toml
//! [irc]
//! server = "irc.libera.chat"
//! port = 6667
//! channels = "#bsd,#rust"        # or ["#bsd", "#rust"]
//! nick = "infobot"
//! password = "hunter2"
//!
//! [database]
//! path = "/var/db/infobot/factoids.db"
//! ```

use std::path::{Path, PathBuf};

use clap::Parser;
use infobot_sdk::client::ConnectConfig;
use serde::Deserialize;

use crate::session::SessionConfig;

#[derive(Parser, Debug)]
#[command(name = "infobot", about = "IRC factoid bot")]
pub struct Args {
    /// Config file (TOML)
    #[arg(short = 'c', long = "config")]
    pub config: PathBuf,

    /// Also append logs to <DIR>/infobot.log
    #[arg(short = 'l', long = "log-dir")]
    pub log_dir: Option<PathBuf>,

    /// IRC server address (host:port), overrides the config file
    #[arg(long)]
    pub server: Option<String>,

    /// Bot nick, overrides the config file
    #[arg(long)]
    pub nick: Option<String>,

    /// Services password, overrides the config file
    #[arg(long, env = "INFOBOT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("couldn't read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("couldn't parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("missing config value `{0}`")]
    Missing(&'static str),
}

/// On-disk layout of the config file.
#[derive(Debug, Deserialize)]
pub struct FileConfig {
    pub irc: IrcSection,
    pub database: DatabaseSection,
}

#[derive(Debug, Deserialize)]
pub struct IrcSection {
    pub server: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub channels: Channels,
    pub nick: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub realname: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSection {
    pub path: PathBuf,
}

/// Channel list, either comma-separated or a TOML array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Channels {
    List(Vec<String>),
    Csv(String),
}

impl Default for Channels {
    fn default() -> Self {
        Channels::List(Vec::new())
    }
}

impl Channels {
    pub fn to_vec(&self) -> Vec<String> {
        let names: Vec<&str> = match self {
            Channels::List(list) => list.iter().map(String::as_str).collect(),
            Channels::Csv(csv) => csv.split(',').collect(),
        };
        names
            .into_iter()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn default_port() -> u16 {
    6667
}

/// Everything the bot needs to start, after merging file and flags.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub connect: ConnectConfig,
    pub session: SessionConfig,
    pub database: PathBuf,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Apply command line overrides and check required values.
    pub fn resolve(self, args: &Args) -> Result<BotConfig, ConfigError> {
        let irc = self.irc;
        let nick = args.nick.clone().unwrap_or(irc.nick);
        if nick.trim().is_empty() {
            return Err(ConfigError::Missing("irc.nick"));
        }
        let password = args
            .password
            .clone()
            .or(irc.password)
            .filter(|p| !p.is_empty())
            .ok_or(ConfigError::Missing("irc.password"))?;
        let server_addr = match &args.server {
            Some(server) => server.clone(),
            None if irc.server.contains(':') => irc.server,
            None => format!("{}:{}", irc.server, irc.port),
        };

        Ok(BotConfig {
            connect: ConnectConfig {
                server_addr,
                nick: nick.clone(),
                user: nick.clone(),
                realname: irc.realname.unwrap_or_else(|| nick.clone()),
            },
            session: SessionConfig {
                nick,
                password,
                channels: irc.channels.to_vec(),
            },
            database: self.database.path,
        })
    }
}
