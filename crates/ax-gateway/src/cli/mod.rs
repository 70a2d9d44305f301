use clap::{Parser, Subcommand};

/// A security-hardened host for running an untrusted AI agent process.
#[derive(Debug, Parser)]
#[command(name = "ax-gateway", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Print version information.
    Version,
}

/// Load the configuration from the path named by `AX_CONFIG` (or
/// `config.toml` by default). A missing file falls back to defaults; an
/// existing file with malformed TOML is an error.
pub fn load_config() -> anyhow::Result<(ax_domain::config::Config, String)> {
    let config_path = std::env::var("AX_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = ax_domain::config::Config::load_or_default(std::path::Path::new(&config_path))?;
    Ok((config, config_path))
}
