pub mod ask;
pub mod config;
pub mod quota;
pub mod sweep;

use clap::{Parser, Subcommand};

/// Concierge, a quota-aware chat gateway that routes messages to
/// specialized agents.
#[derive(Debug, Parser)]
#[command(name = "concierge", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Run one message through quota admission and the supervisor.
    Ask {
        /// The message to send.
        message: String,
        /// User id the request is charged to (defaults to `auth.dev_user`).
        #[arg(long)]
        user: Option<String>,
        /// Skip classification and use this agent (calculator, weather).
        #[arg(long)]
        agent: Option<String>,
        /// Model override (defaults to `llm.default_model`).
        #[arg(long)]
        model: Option<String>,
        /// Output the full reply as JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Print quota status for a user.
    Quota {
        /// User id to inspect.
        user: String,
        /// Restrict to one model.
        #[arg(long)]
        model: Option<String>,
    },
    /// Delete usage events older than the retention horizon.
    Sweep {
        /// Retention in days (defaults to `quota.retention_days`).
        #[arg(long)]
        days: Option<u32>,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `CONCIERGE_CONFIG` (or
/// `config.toml` by default).  Returns the parsed [`Config`] and the path
/// that was used. A missing file yields the defaults.
///
/// [`Config`]: cg_domain::config::Config
pub fn load_config() -> anyhow::Result<(cg_domain::config::Config, String)> {
    let config_path =
        std::env::var("CONCIERGE_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = load_config_from(&config_path)?;
    Ok((config, config_path))
}

pub fn load_config_from(config_path: &str) -> anyhow::Result<cg_domain::config::Config> {
    if !std::path::Path::new(config_path).exists() {
        return Ok(cg_domain::config::Config::default());
    }
    let raw = std::fs::read_to_string(config_path)
        .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))
}
