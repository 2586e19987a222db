#![forbid(unsafe_code)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use scope_settings::constants::retention::{CORE_LOG_PREFIX, DELETE_OLD_LOGS, LIFETIME_DAYS, OWNER};
use scope_settings::{
    AppConfig, LegacyNode, LogRetentionPolicy, PendingEdits, ProfileManager, PurgeReport,
    RetentionSettings, SettingsResetController,
};

#[derive(Parser)]
#[command(name = "scope-settings", version, about = "Inspect and maintain persisted user settings")]
struct Cli {
    /// Config file to use instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Profile to operate on instead of the configured one
    #[arg(long, global = true)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a setting from the active profile
    Get {
        owner: String,
        name: String,
        /// Printed when the setting was never written
        #[arg(long)]
        default: Option<String>,
    },
    /// Write a setting to the active profile and save it
    Set {
        owner: String,
        name: String,
        value: String,
        #[arg(long, value_enum, default_value_t = ValueKind::Text)]
        kind: ValueKind,
    },
    /// Inspect or edit the legacy preference tree
    Legacy {
        #[command(subcommand)]
        command: LegacyCommand,
    },
    /// List saved profiles
    Profiles,
    /// Reset every setting, keeping only the registration flag
    Reset {
        #[arg(short, long)]
        yes: bool,
    },
    /// Delete log files from the current and legacy log directories
    PurgeLogs {
        /// Only delete files older than this many days (0 deletes all)
        #[arg(long, default_value_t = 0)]
        days: u64,
        /// Log file to keep regardless of age; defaults to `current_log_file` from the config
        #[arg(long)]
        current: Option<PathBuf>,
        #[arg(long)]
        prefix: Option<String>,
        #[arg(short, long)]
        yes: bool,
    },
    /// Show or change the log retention policy of the active profile
    Retention {
        #[arg(long)]
        delete_old_logs: Option<String>,
        #[arg(long)]
        lifetime_days: Option<String>,
    },
    /// Run the startup log sweep with the profile's retention policy
    Housekeeping {
        #[arg(long)]
        current: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum LegacyCommand {
    Get {
        node: String,
        key: String,
    },
    Put {
        node: String,
        key: String,
        value: String,
    },
    /// Remove the values stored directly on a node
    Clear {
        node: String,
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ValueKind {
    Bool,
    Int,
    Text,
}

fn parse_level(name: &str) -> TraceLevel {
    match name.to_lowercase().as_str() {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    }
}

/// Ask on the terminal unless the caller already agreed
fn confirm(prompt: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn print_purge(report: &PurgeReport) {
    println!("Deleted {} log file(s)", report.removed);
    for failure in &report.failures {
        println!("  could not delete {}: {}", failure.path.display(), failure.error);
    }
}

/// Log directories that exist; a directory never created has nothing to purge
fn existing_log_dirs(config: &AppConfig) -> Vec<PathBuf> {
    config
        .log_dirs()
        .into_iter()
        .filter(|dir| {
            let exists = dir.is_dir();
            if !exists {
                info!(dir = %dir.display(), "Log directory does not exist, skipping");
            }
            exists
        })
        .collect()
}

/// Log file a purge must keep: the explicit one, else the configured one
///
/// Deleting every file without knowing which one is in use is refused.
fn purge_current_file(
    explicit: Option<PathBuf>,
    config: &AppConfig,
    days: u64,
) -> Result<Option<PathBuf>> {
    let current = explicit.or_else(|| config.current_log_file.clone());
    if days == 0 && current.is_none() {
        bail!(
            "Deleting all log files needs the current log file; pass --current or set current_log_file in the config"
        );
    }
    Ok(current)
}

fn run(cli: Cli, config: &AppConfig) -> Result<()> {
    let mut manager = ProfileManager::from_config(config)
        .with_context(|| format!("Cannot use profile '{}'", config.profile))?;

    match cli.command {
        Command::Get { owner, name, default } => {
            let store = manager.current_store()?;
            match (store.value(&owner, &name), default) {
                (Some(value), _) => println!("{value}"),
                (None, Some(default)) => println!("{default}"),
                (None, None) => bail!("{owner}/{name} is not set in profile '{}'", store.profile()),
            }
        }

        Command::Set { owner, name, value, kind } => {
            let mut edits = PendingEdits::new();
            match kind {
                ValueKind::Bool => edits.push_bool(&owner, &name, &value),
                ValueKind::Int => edits.push_int(&owner, &name, &value),
                ValueKind::Text => edits.push_text(&owner, &name, &value),
            };
            edits.commit(manager.current_store()?)?;
            manager.save_profile().context("Failed to save profile")?;
            info!(owner = %owner, name = %name, "Setting saved");
        }

        Command::Legacy { command } => {
            let tree = manager.legacy_tree()?;
            match command {
                LegacyCommand::Get { node, key } => {
                    match tree.get_raw(&LegacyNode::parse(&node), &key) {
                        Some(value) => println!("{value}"),
                        None => bail!("{key} is not set at {}", LegacyNode::parse(&node)),
                    }
                }
                LegacyCommand::Put { node, key, value } => {
                    let node = tree.node(&node);
                    tree.put_string(&node, &key, &value)?;
                }
                LegacyCommand::Clear { node, yes } => {
                    let node = LegacyNode::parse(&node);
                    if !confirm(&format!("Clear all values at {node}?"), yes)? {
                        println!("Cancelled");
                        return Ok(());
                    }
                    tree.clear(&node)?;
                }
            }
        }

        Command::Profiles => {
            for name in manager.list_profiles()? {
                let marker = if name == manager.profile_name() { "*" } else { " " };
                println!("{marker} {name}");
            }
        }

        Command::Reset { yes } => {
            if !confirm(
                "Reset all settings to defaults? Every saved preference will be lost.",
                yes,
            )? {
                println!("Cancelled");
                return Ok(());
            }
            let report = manager
                .reset_settings(&SettingsResetController::new())
                .context("Settings reset failed")?;
            println!(
                "Settings reset; cleared {} (registration kept as {})",
                report.cleared_nodes.join(", "),
                report.registration
            );
        }

        Command::PurgeLogs { days, current, prefix, yes } => {
            let current = purge_current_file(current, config, days)?;
            let dirs = existing_log_dirs(config);
            let question = if days == 0 {
                "Delete all log files?".to_string()
            } else {
                format!("Delete log files older than {days} day(s)?")
            };
            if !confirm(&question, yes)? {
                println!("Cancelled");
                return Ok(());
            }

            let mut policy = LogRetentionPolicy::new();
            if let Some(prefix) = prefix {
                policy = policy.with_prefix(prefix);
            }
            let report = policy.purge_older_than(&dirs, days, current.as_deref())?;
            print_purge(&report);
        }

        Command::Retention { delete_old_logs, lifetime_days } => {
            let store = manager.current_store()?;
            let mut edits = PendingEdits::new();
            if let Some(text) = &delete_old_logs {
                edits.push_bool(OWNER, DELETE_OLD_LOGS, text);
            }
            if let Some(text) = &lifetime_days {
                edits.push_int_in(OWNER, LIFETIME_DAYS, text, 0..=i64::from(u32::MAX));
            }

            if !edits.is_empty() {
                edits.commit(store)?;
                manager.save_profile().context("Failed to save profile")?;
            }

            let settings = RetentionSettings::load(manager.current_store()?);
            println!("delete old logs: {}", settings.delete_old_logs);
            println!("lifetime days:   {}", settings.lifetime_days);
        }

        Command::Housekeeping { current } => {
            let current = current.or_else(|| config.current_log_file.clone());
            let dirs = existing_log_dirs(config);
            let report = LogRetentionPolicy::new()
                .with_prefix(CORE_LOG_PREFIX)
                .startup_sweep(manager.current_store()?, &dirs, current.as_deref())?;
            print_purge(&report);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(profile) = &cli.profile {
        config.profile = profile.clone();
    }

    // LOG_LEVEL wins over the config file
    let log_level = parse_level(
        &std::env::var("LOG_LEVEL").unwrap_or_else(|_| config.log_level.clone()),
    );

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!(profile = %config.profile, data_dir = %config.resolved_data_dir().display(), "Starting");

    if let Err(e) = run(cli, &config) {
        warn!(error = %e, "Command failed");
        return Err(e);
    }
    Ok(())
}
