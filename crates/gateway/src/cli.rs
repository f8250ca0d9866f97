use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use vg_domain::config::Config;

#[derive(Parser)]
#[command(name = "voicegate", about = "Multi-tenant voice-ordering gateway")]
pub struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = "voicegate.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the gateway server (default).
    Serve,
    /// Config inspection.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print the version.
    Version,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Validate the config file and report issues.
    Validate,
    /// Print the effective config (defaults applied).
    Show,
}

/// Load the config file; a missing file yields the defaults.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("parsing {}: {e}", path.display()))?;
        Ok(config)
    } else {
        tracing::debug!(path = %path.display(), "no config file; using defaults");
        Ok(Config::default())
    }
}
