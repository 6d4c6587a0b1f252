/// Server configuration from command-line flags or environment
use clap::Parser;
use collaboration::ServiceConfig;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "collab-server")]
#[command(about = "Meme collaboration REST server")]
#[command(version)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "COLLAB_BIND", default_value = "127.0.0.1:3000")]
    pub bind: String,

    /// Directory for collaboration snapshots
    #[arg(long, env = "COLLAB_DATA_DIR", default_value = "collab_data")]
    pub data_dir: PathBuf,

    /// JSON array of meme references used to resolve remixes
    #[arg(long, env = "COLLAB_MEMES_FILE")]
    pub memes_file: Option<PathBuf>,

    /// Days before a pending invite expires
    #[arg(long, env = "COLLAB_INVITE_TTL_DAYS", default_value_t = 7)]
    pub invite_ttl_days: i64,

    /// tracing filter directives
    #[arg(
        long,
        env = "RUST_LOG",
        default_value = "collab_server=debug,collaboration=debug,tower_http=info"
    )]
    pub log_filter: String,
}

impl Config {
    pub fn service_config(&self) -> anyhow::Result<ServiceConfig> {
        let invite_ttl = chrono::Duration::try_days(self.invite_ttl_days.max(0)).ok_or_else(|| {
            anyhow::anyhow!("--invite-ttl-days {} is out of range", self.invite_ttl_days)
        })?;
        Ok(ServiceConfig {
            invite_ttl,
            ..ServiceConfig::default()
        })
    }
}
