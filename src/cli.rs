//! Argument parsing and command dispatch for the `moltguard` binary.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use moltguard_totp::totp::config::default_config_dir;
use moltguard_totp::totp::{TotpError, TotpService};
use tracing_subscriber::EnvFilter;

const RULE_WIDTH: usize = 30;

/// moltguard - TOTP codes from a machine-bound encrypted vault
#[derive(Debug, Parser)]
#[command(name = "moltguard", version, about)]
pub struct Cli {
    /// Directory holding the key, vault and optional config.json
    #[arg(long, global = true, value_name = "PATH")]
    pub config_dir: Option<PathBuf>,

    /// Verbose output on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store (or replace) the secret for a service
    Add {
        /// Service name (case-insensitive)
        name: String,

        /// Base32 secret; spaces between groups are allowed
        #[arg(required = true, num_args = 1..)]
        secret: Vec<String>,
    },

    /// Print the current code for a service
    Get {
        name: String,

        /// Generate for this unix timestamp instead of now
        #[arg(long, value_name = "UNIX_SECONDS")]
        at: Option<u64>,
    },

    /// Delete a service from the vault
    Remove { name: String },

    /// List configured services
    List,

    /// Move an unreadable vault aside and start over
    Reset {
        /// Required; the current vault is no longer used afterwards
        #[arg(long)]
        force: bool,
    },
}

/// Install the stderr subscriber. `RUST_LOG` wins over `--verbose`.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Execute `cli` and return the text to print on stdout.
pub fn run(cli: &Cli) -> Result<String> {
    let dir = cli.config_dir.clone().unwrap_or_else(default_config_dir);
    log::debug!("using configuration directory {}", dir.display());
    let svc = TotpService::open(&dir)
        .with_context(|| format!("cannot open vault in {}", dir.display()))?;

    match &cli.command {
        Command::Add { name, secret } => Ok(svc.add_secret(name, &secret.join(" "))?),
        Command::Remove { name } => Ok(svc.remove_secret(name)?),
        Command::Get { name, at } => {
            let res = match at {
                Some(ts) => svc.get_code_at(name, *ts)?,
                None => svc.get_code(name)?,
            };
            Ok(format!(
                "2FA CODE: {}\n{}\n  {}",
                name,
                "-".repeat(RULE_WIDTH),
                res
            ))
        }
        Command::List => {
            let services = svc.list_services()?;
            let mut out = format!("2FA SERVICES\n{}", "-".repeat(RULE_WIDTH));
            if services.is_empty() {
                out.push_str("\n  None configured");
            }
            for name in services {
                out.push_str("\n  ");
                out.push_str(&name);
            }
            Ok(out)
        }
        Command::Reset { force } => {
            if !force {
                bail!("reset discards the current vault; pass --force to confirm");
            }
            Ok(svc.reset_vault()?)
        }
    }
}

/// The user-facing text for `err`: the vault message when the root cause is
/// a [`TotpError`], the full context chain otherwise.
pub fn error_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<TotpError>() {
        Some(e) => match &e.detail {
            Some(detail) => format!("{} ({})", e.message, detail),
            None => e.message.clone(),
        },
        None => format!("{:#}", err),
    }
}
