// # xuim - x-ui Subscription Tool
//
// Thin command-line front end over xuim-core. No business logic lives
// here: every command maps onto one SubscriptionEngine operation and
// prints its structured outcome as JSON on stdout. Logs go to stderr.
//
// ## Configuration
//
// Flags fall back to environment variables:
// - `XUIM_DB_PATH`: Panel database (default `/etc/x-ui/x-ui.db`)
// - `XUIM_LOG_LEVEL`: trace, debug, info, warn, error (default info)
// - `XUIM_BUSY_TIMEOUT_SECS`: Wait on a locked database (default 5)
// - `XUIM_PORT_POLICY`: first_match or require_unique (default first_match)
//
// ## Confirmation
//
// Destructive commands print their targets and change nothing unless
// `--yes` is given.
//
// ## Example
//
// ```bash
// xuim expired --min-days
// xuim expired --min-days 60 --delete --yes
// xuim traffic --email alice@example.com --down-gb 5 --up-gb 1
// xuim adjust-days --days -3 --inbound 2
// ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use xuim_core::config::{DEFAULT_DB_PATH, EngineConfig, PortPolicy, StoreConfig, XuimConfig};
use xuim_core::model::NO_EMAIL;
use xuim_core::units::gib_to_bytes;
use xuim_core::{DeletionOutcome, EnableTarget, InboundScope, SubscriptionEngine};

/// Exit codes for different termination scenarios
///
/// - 0: Success (including dry runs)
/// - 1: Configuration error or the database cannot be opened
/// - 2: An operation failed and was rolled back
/// - 3: Invalid input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum XuimExitCode {
    /// Command completed
    Success = 0,
    /// Configuration error or connection failure
    ConfigError = 1,
    /// Operation failure
    OperationFailed = 2,
    /// Rejected arguments
    InvalidInput = 3,
}

impl From<XuimExitCode> for ExitCode {
    fn from(code: XuimExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl XuimExitCode {
    /// Exit code for a failed command
    fn for_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<xuim_core::Error>() {
            Some(e) if e.is_fatal() => XuimExitCode::ConfigError,
            Some(e) if e.is_invalid_input() => XuimExitCode::InvalidInput,
            _ => XuimExitCode::OperationFailed,
        }
    }
}

/// Manage x-ui panel subscriptions
#[derive(Debug, Parser)]
#[command(name = "xuim", version, about)]
struct Cli {
    /// Path to the panel database
    #[arg(long, global = true, env = "XUIM_DB_PATH", default_value = DEFAULT_DB_PATH)]
    db: PathBuf,

    /// Log level written to stderr
    #[arg(long, global = true, env = "XUIM_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Seconds to wait on a locked database
    #[arg(long, global = true, env = "XUIM_BUSY_TIMEOUT_SECS", default_value_t = 5)]
    busy_timeout_secs: u64,

    /// Inbound lookup for port-only enable targets
    #[arg(long, global = true, env = "XUIM_PORT_POLICY", default_value = "first_match")]
    port_policy: PortPolicy,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List inbounds
    Inbounds,

    /// List expired clients, optionally deleting them
    Expired {
        /// Only clients expired at least this many days (no value: configured default)
        #[arg(long, value_name = "DAYS", num_args = 0..=1)]
        min_days: Option<Option<u32>>,

        /// Case-insensitive substring of the client email
        #[arg(long)]
        name: Option<String>,

        /// Restrict to one inbound id
        #[arg(long)]
        inbound: Option<i64>,

        /// Delete the listed clients
        #[arg(long)]
        delete: bool,

        /// Confirm deletion
        #[arg(long, requires = "delete")]
        yes: bool,
    },

    /// List clients that have not connected yet, optionally deleting them
    NotStarted {
        /// Case-insensitive substring of the client email
        #[arg(long)]
        name: Option<String>,

        /// Restrict to one inbound id
        #[arg(long)]
        inbound: Option<i64>,

        /// Delete the listed clients
        #[arg(long)]
        delete: bool,

        /// Confirm deletion
        #[arg(long, requires = "delete")]
        yes: bool,
    },

    /// List clients without an expiry
    Unlimited {
        /// Restrict to one inbound id
        #[arg(long)]
        inbound: Option<i64>,
    },

    /// List disabled clients, optionally re-enabling them
    Inactive {
        /// Restrict to one inbound id
        #[arg(long)]
        inbound: Option<i64>,

        /// Re-enable the listed clients
        #[arg(long)]
        enable: bool,
    },

    /// Record a traffic reading for a client
    Traffic {
        /// Client email
        #[arg(long)]
        email: String,

        /// Download in GiB
        #[arg(long, default_value_t = 0.0)]
        down_gb: f64,

        /// Upload in GiB
        #[arg(long, default_value_t = 0.0)]
        up_gb: f64,
    },

    /// Add days to active clients' expiry (negative subtracts)
    AdjustDays {
        /// Day offset
        #[arg(long, allow_negative_numbers = true)]
        days: i64,

        /// Restrict to one inbound id
        #[arg(long)]
        inbound: Option<i64>,

        /// Case-insensitive substring of the client email
        #[arg(long)]
        name: Option<String>,
    },

    /// Delete clients from every inbound and from the traffic ledger
    Delete {
        /// Client email (repeatable)
        #[arg(long = "email", required = true, num_args = 1..)]
        emails: Vec<String>,

        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

impl Cli {
    /// Build the core configuration from flags and environment
    fn config(&self) -> XuimConfig {
        XuimConfig {
            store: StoreConfig::Sqlite {
                path: self.db.clone(),
                busy_timeout_secs: self.busy_timeout_secs,
                max_connections: 1,
                create_if_missing: false,
            },
            engine: EngineConfig {
                port_policy: self.port_policy,
                ..EngineConfig::default()
            },
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                XuimExitCode::InvalidInput.into()
            } else {
                XuimExitCode::Success.into()
            };
        }
    };

    let config = cli.config();
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return XuimExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return XuimExitCode::ConfigError.into();
    }

    // Operations run one after another on a single thread
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return XuimExitCode::OperationFailed.into();
        }
    };

    let result = rt.block_on(run(cli.command, config));

    match result {
        Ok(()) => XuimExitCode::Success.into(),
        Err(e) => {
            error!("{:#}", e);
            XuimExitCode::for_error(&e).into()
        }
    }
}

async fn run(command: Command, config: XuimConfig) -> Result<()> {
    let store = xuim_core::open_store(&config.store).await?;
    info!("Opened {} store", store.store_name());

    let engine = SubscriptionEngine::new(store, config.engine);
    let result = execute(&engine, command).await;
    engine.store().close().await;
    result
}

/// Run one command against the engine
async fn execute(engine: &SubscriptionEngine, command: Command) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    debug!("Reference time: {}", now);

    match command {
        Command::Inbounds => emit(&engine.list_inbounds().await?),

        Command::Expired {
            min_days,
            name,
            inbound,
            delete,
            yes,
        } => {
            let min_days = match min_days {
                None => 0,
                Some(None) => engine.config().default_min_days_expired,
                Some(Some(days)) => days,
            };
            let expired = engine
                .find_expired(now, min_days, name.as_deref(), InboundScope::from_id(inbound))
                .await?;

            if !delete {
                return emit(&expired);
            }
            let emails = addressable(expired.iter().map(|c| c.email.as_str()));
            delete_listed(engine, &expired, emails, yes).await
        }

        Command::NotStarted {
            name,
            inbound,
            delete,
            yes,
        } => {
            let pending = engine
                .find_not_started(InboundScope::from_id(inbound), name.as_deref())
                .await?;

            if !delete {
                return emit(&pending);
            }
            let emails = addressable(pending.iter().map(|c| c.email.as_str()));
            delete_listed(engine, &pending, emails, yes).await
        }

        Command::Unlimited { inbound } => {
            emit(&engine.find_unlimited(InboundScope::from_id(inbound)).await?)
        }

        Command::Inactive { inbound, enable } => {
            let inactive = engine.find_inactive(InboundScope::from_id(inbound)).await?;
            if !enable {
                return emit(&inactive);
            }

            let targets: Vec<EnableTarget> = inactive
                .iter()
                .map(|c| EnableTarget::in_inbound(c.inbound_id, c.port, c.email.clone()))
                .collect();
            emit(&engine.enable_clients(&targets).await?)
        }

        Command::Traffic {
            email,
            down_gb,
            up_gb,
        } => {
            let down = gib_to_bytes(down_gb).context("--down-gb")?;
            let up = gib_to_bytes(up_gb).context("--up-gb")?;
            emit(&engine.record_traffic(&email, down, up).await?)
        }

        Command::AdjustDays {
            days,
            inbound,
            name,
        } => emit(
            &engine
                .adjust_expiry(now, days, InboundScope::from_id(inbound), name.as_deref())
                .await?,
        ),

        Command::Delete { emails, yes } => {
            let targets = emails.clone();
            delete_listed(engine, &targets, emails, yes).await
        }
    }
}

/// Identities of listed clients that can be addressed for deletion
///
/// Clients without an email or id are listed as `<no-email>` and are
/// left in place.
fn addressable<'a>(emails: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut skipped = 0;
    let emails: Vec<String> = emails
        .filter(|email| {
            let keep = *email != NO_EMAIL;
            skipped += usize::from(!keep);
            keep
        })
        .map(str::to_string)
        .collect();
    if skipped > 0 {
        warn!("Skipping {} listed clients without an email or id", skipped);
    }
    emails
}

/// Delete `emails` when confirmed, otherwise print what would be deleted
async fn delete_listed<T: Serialize>(
    engine: &SubscriptionEngine,
    listed: &T,
    emails: Vec<String>,
    yes: bool,
) -> Result<()> {
    if !yes {
        info!("Dry run: {} clients would be deleted, pass --yes to confirm", emails.len());
        return emit(&json!({ "dry_run": true, "targets": listed }));
    }

    let outcome = if emails.is_empty() {
        DeletionOutcome::default()
    } else {
        engine.delete_clients(emails).await?
    };
    emit(&json!({ "deleted": listed, "outcome": outcome }))
}

/// Print a value as pretty JSON on stdout
fn emit<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
