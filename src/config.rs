#![cfg(feature = "web")]

use clap::Args;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Command-line configuration of the dashboard server.
#[derive(Args, Clone, Debug)]
pub struct ServerConfig {
    /// Interface to bind
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Directory holding the dashboard front-end
    #[arg(long, default_value = "static")]
    pub static_dir: PathBuf,

    /// Survey CSV loaded into the store at startup
    #[arg(long)]
    pub seed: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            static_dir: PathBuf::from("static"),
            seed: None,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> anyhow::Result<SocketAddr> {
        let address = format!("{}:{}", self.host, self.port);
        address
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid bind address {}: {}", address, e))
    }
}

/// Shared `--log-level` flag.
#[derive(Args, Clone, Debug)]
pub struct LogArgs {
    /// trace, debug, info, warn or error
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

pub fn level_filter(level: &str) -> log::LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        "off" => log::LevelFilter::Off,
        _ => log::LevelFilter::Info,
    }
}

/// Install the process-wide logger. Call once, from a binary.
pub fn init_logging(args: &LogArgs) {
    env_logger::Builder::new()
        .filter_level(level_filter(&args.log_level))
        .format_timestamp(None)
        .init();
}
