//! Relay server binary.

use bridge_relay::{HttpWebhookSender, Relay, RelayConfig, RelayError, RelayServer};
use clap::Parser;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Deployment environment; `production` switches the default port to 5000
    #[arg(long, default_value = "development", env = "NODE_ENV")]
    env: String,

    /// Bind host, optionally with a port (`ip:port`)
    #[arg(long, default_value = "0.0.0.0", env = "HOST")]
    host: String,

    /// Bind port (default 5001, or 5000 in production)
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Comma separated webhook URLs accepted by `POST /subscribe`
    #[arg(long, env = "WHITELIST")]
    whitelist: Option<String>,

    /// Log filter (e.g. `info`, `debug`, `bridge_relay=trace`)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Append logs to this file instead of stdout
    #[arg(long, env = "LOG_FILE")]
    log_file: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> RelayConfig {
        let default_port = if self.env == "production" { 5000 } else { 5001 };
        RelayConfig {
            host: self.host.clone(),
            port: self.port.unwrap_or(default_port),
            webhook_whitelist: RelayConfig::parse_whitelist(self.whitelist.as_deref()),
            ..Default::default()
        }
    }
}

fn init_logging(args: &Args) -> Result<(), RelayError> {
    let filter = EnvFilter::try_new(&args.log_level)
        .map_err(|e| RelayError::InvalidConfig(format!("log level: {e}")))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match &args.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), RelayError> {
    let args = Args::parse();
    init_logging(&args)?;

    let config = args.config();
    let sender = Arc::new(HttpWebhookSender::new(tokio::runtime::Handle::current()));
    let relay = Arc::new(Relay::with_retention(sender, config.retention));

    RelayServer::new(config, relay).run().await
}
