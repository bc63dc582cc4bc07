use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, Context};
use clap::Parser;

use crate::{relay::RelayConfig, resolver::ytdlp::YtDlpConfig};

const DEFAULT_ADDRESS: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct ServerArgs {
    #[arg(short, long)]
    /// IP address to listen on [env: API_ADDRESS]
    pub addr: Option<String>,
    #[arg(short, long)]
    /// Port to listen on [env: API_PORT]
    pub port: Option<u16>,
    #[arg(long)]
    /// yt-dlp binary used to resolve and stream media [env: YTDLP_PATH]
    pub ytdlp_path: Option<String>,
    #[arg(long)]
    /// Proxy handed to yt-dlp [env: YTDLP_PROXY]
    pub proxy: Option<String>,
    #[arg(long)]
    /// Write logs to this file instead of the default target [env: LOG_FILE]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: String,
    pub port: u16,
    pub ytdlp: YtDlpConfig,
    pub relay: RelayConfig,
    pub log_file: Option<PathBuf>,
}

impl ServerConfig {
    /// Flags win over environment variables, which win over defaults.
    pub fn load(args: ServerArgs) -> anyhow::Result<Self> {
        Self::from_lookup(args, |key| dotenv::var(key).ok())
    }

    fn from_lookup(
        args: ServerArgs,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let port = match args.port {
            Some(port) => port,
            None => match lookup("API_PORT") {
                Some(port) => port
                    .parse()
                    .with_context(|| format!("'API_PORT' is not a valid port: {port}"))?,
                None => DEFAULT_PORT,
            },
        };

        let defaults = YtDlpConfig::default();
        let ytdlp = YtDlpConfig {
            path: args
                .ytdlp_path
                .or_else(|| lookup("YTDLP_PATH"))
                .unwrap_or(defaults.path),
            proxy: args
                .proxy
                .or_else(|| lookup("YTDLP_PROXY"))
                .filter(|proxy| !proxy.is_empty()),
            resolve_timeout: duration_var(&lookup, "RESOLVE_TIMEOUT", defaults.resolve_timeout)?,
        };

        let relay_defaults = RelayConfig::default();
        let relay = RelayConfig {
            probe_timeout: duration_var(
                &lookup,
                "RELAY_PROBE_TIMEOUT",
                relay_defaults.probe_timeout,
            )?,
            idle_timeout: duration_var(&lookup, "RELAY_IDLE_TIMEOUT", relay_defaults.idle_timeout)?,
        };

        Ok(Self {
            addr: args
                .addr
                .or_else(|| lookup("API_ADDRESS"))
                .unwrap_or_else(|| DEFAULT_ADDRESS.to_owned()),
            port,
            ytdlp,
            relay,
            log_file: args.log_file.or_else(|| lookup("LOG_FILE").map(PathBuf::from)),
        })
    }
}

fn duration_var(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> anyhow::Result<Duration> {
    let Some(value) = lookup(key) else {
        return Ok(default);
    };

    let duration = parse_duration::parse(&value)
        .map_err(|err| anyhow!("'{key}' is not a valid duration: {value}, ERROR: {err}"))?;

    if duration.is_zero() {
        return Err(anyhow!("'{key}' must be longer than zero"));
    }

    Ok(duration)
}
