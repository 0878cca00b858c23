//! Runtime configuration read from command line flags and environment
//! variables.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use clap::Parser;

use crate::database_id::UserId;

/// The Telegram finance bot and its read API.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// The SQLite database file, optionally prefixed with `sqlite://`.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// The Telegram bot token.
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    pub bot_token: String,

    /// The address to serve the API from.
    #[arg(long, env = "HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// The port to serve the API from.
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// The user ID recorded on transactions created through the API when the
    /// request does not name one.
    #[arg(long, env = "API_USER_ID", default_value_t = 0)]
    pub api_user_id: UserId,

    /// Seconds before an unfinished transaction entry is forgotten. Zero keeps
    /// entries until they are completed or cancelled.
    #[arg(long, env = "CONVERSATION_TTL_SECS", default_value_t = 3600)]
    pub conversation_ttl_secs: u64,

    /// A file to write debug logs to, in addition to stdout.
    #[arg(long, env = "LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// The socket address the API listens on.
    pub fn api_address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// How long a pending entry lives, or `None` if entries never expire.
    pub fn conversation_ttl(&self) -> Option<Duration> {
        match self.conversation_ttl_secs {
            0 => None,
            seconds => Some(Duration::from_secs(seconds)),
        }
    }
}
