use clap::Parser;
use std::path::PathBuf;

use cloakgate_core::modules::config::CONFIG_FILE;

pub const DEFAULT_PORT: u16 = 8046;

#[derive(Parser, Debug)]
#[command(
    name = "cloakgate-server",
    about = "Cloakgate Server - session cloaking and masquerade trace daemon",
    version = env!("CARGO_PKG_VERSION"),
    author
)]
pub struct Cli {
    #[arg(short, long, env = "CLOAKGATE_CONFIG", default_value = CONFIG_FILE, help = "Path to cloakgate.json")]
    pub config: PathBuf,

    #[arg(short, long, env = "CLOAKGATE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    #[arg(long, env = "CLOAKGATE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}
