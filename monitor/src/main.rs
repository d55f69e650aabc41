//! LockWatch Monitor - personal-safety lock monitor.
//!
//! This binary records device lock transitions and alerts emergency contacts
//! when the device stays without one for too long during the day.
//!
//! # Commands
//!
//! - `lockwatch-monitor run`: Start the monitor daemon, reading lock events from stdin
//! - `lockwatch-monitor event <locked|unlocked>`: Record one lock transition
//! - `lockwatch-monitor check`: Run one check cycle now
//! - `lockwatch-monitor enable` / `disable` / `status`: Manage the monitor
//! - `lockwatch-monitor contacts ...`: Manage emergency contacts
//! - `lockwatch-monitor template ...`: Show or change the alert text
//! - `lockwatch-monitor test-alert`: Send the alert text to every contact now
//! - `lockwatch-monitor logs`: Print or clear the activity journal
//!
//! # Environment Variables
//!
//! See the [`config`] module for available configuration options.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use lockwatch_monitor::app::{App, TransportMode};
use lockwatch_monitor::clock::{Clock, SystemClock};
use lockwatch_monitor::config::Config;
use lockwatch_monitor::evaluator::Evaluator;
use lockwatch_monitor::journal::ActivityJournal;
use lockwatch_monitor::monitor::CheckOutcome;
use lockwatch_monitor::recorder::LockRecorder;
use lockwatch_monitor::store::{
    alert_template, ContactStore, FileStore, MonitorState, SettingsStore,
};
use lockwatch_monitor::types::{keys, LockEvent, NewContact};

/// LockWatch Monitor - personal-safety lock monitor.
///
/// Records lock/unlock transitions and sends a text alert to emergency
/// contacts when the device has not been locked or unlocked for too long
/// during the active hours of the day.
#[derive(Parser, Debug)]
#[command(name = "lockwatch-monitor")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    LOCKWATCH_DATA_DIR               Data directory (default: ~/.lockwatch)
    LOCKWATCH_SMS_GATEWAY_URL        SMS gateway base URL (required to send alerts)
    LOCKWATCH_SMS_GATEWAY_TOKEN      Bearer token for the SMS gateway
    LOCKWATCH_SMS_SENDER             Sender number or ID
    LOCKWATCH_ACTIVE_START_HOUR      Active window start hour (default: 8)
    LOCKWATCH_ACTIVE_END_HOUR        Active window end hour, exclusive (default: 20)
    LOCKWATCH_UNLOCK_THRESHOLD_HOURS Hours without a transition before alerting (default: 5)
    LOCKWATCH_ALERT_COOLDOWN_MINS    Minutes between alerts (default: 30)
    LOCKWATCH_CHECK_INTERVAL_SECS    Seconds between checks (default: 3600)
    LOCKWATCH_SEND_TIMEOUT_SECS      Per-contact send timeout (default: 30)

EXAMPLES:
    # Add a contact and enable monitoring
    lockwatch-monitor contacts add \"Alice\" +15550100 --default
    lockwatch-monitor enable

    # Record a transition from a screen-locker hook
    lockwatch-monitor event locked

    # Start the daemon, fed by a lock-state event stream
    export LOCKWATCH_SMS_GATEWAY_URL=https://sms.example.com/v1
    my-lock-events | lockwatch-monitor run
")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Start the monitor daemon.
    ///
    /// Runs a check immediately and then every check interval. Lock events
    /// (`locked`/`unlocked`, one per line) are read from stdin.
    Run {
        /// Log alerts instead of sending them.
        #[arg(long)]
        dry_run: bool,

        /// Stop when stdin is closed instead of running until a signal.
        #[arg(long)]
        exit_on_eof: bool,
    },

    /// Record one lock transition.
    Event {
        /// `locked` or `unlocked`.
        event: LockEvent,
    },

    /// Run one check cycle now and print the outcome.
    Check {
        /// Log alerts instead of sending them.
        #[arg(long)]
        dry_run: bool,
    },

    /// Enable monitoring.
    Enable,

    /// Disable monitoring.
    Disable,

    /// Print the monitor state, contacts and policy.
    Status,

    /// Manage emergency contacts.
    Contacts {
        #[command(subcommand)]
        action: ContactsCommand,
    },

    /// Show or change the alert text.
    Template {
        #[command(subcommand)]
        action: TemplateCommand,
    },

    /// Send the alert text to every contact now.
    ///
    /// Does not affect the alert cooldown.
    TestAlert {
        /// Log messages instead of sending them.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print or clear the activity journal.
    Logs {
        /// Delete the journal.
        #[arg(long)]
        clear: bool,

        /// Print only the last N entries.
        #[arg(short = 'n', long)]
        lines: Option<usize>,
    },
}

#[derive(Subcommand, Debug)]
enum ContactsCommand {
    /// List all contacts.
    List,

    /// Add a contact.
    Add {
        name: String,
        phone: String,

        /// Mark as the default contact.
        #[arg(long)]
        default: bool,
    },

    /// Change an existing contact.
    Update {
        id: Uuid,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        default: Option<bool>,
    },

    /// Remove a contact.
    Remove { id: Uuid },
}

#[derive(Subcommand, Debug)]
enum TemplateCommand {
    /// Print the current alert text.
    Show,

    /// Replace the alert text.
    Set { text: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.command {
        Command::Run { .. } => "info",
        _ => "warn",
    };
    init_logging(default_level);

    let config = Config::from_env().context("Failed to load configuration")?;

    match cli.command {
        Command::Run {
            dry_run,
            exit_on_eof,
        } => {
            let app = open_app(config, dry_run)?;
            block_on(run_daemon(app, exit_on_eof))
        }
        Command::Check { dry_run } => {
            let app = open_app(config, dry_run)?;
            block_on(run_check(app))
        }
        Command::TestAlert { dry_run } => {
            let app = open_app(config, dry_run)?;
            block_on(run_test_alert(app))
        }
        Command::Event { event } => run_event(&config, event),
        Command::Enable => set_enabled(&config, true),
        Command::Disable => set_enabled(&config, false),
        Command::Status => print_status(&config),
        Command::Contacts { action } => run_contacts(&config, action),
        Command::Template { action } => run_template(&config, action),
        Command::Logs { clear, lines } => run_logs(&config, clear, lines),
    }
}

fn open_app(config: Config, dry_run: bool) -> Result<App> {
    let mode = if dry_run {
        TransportMode::DryRun
    } else {
        TransportMode::Live
    };
    App::open(config, mode).context("Failed to initialize monitor")
}

fn open_store(config: &Config) -> (FileStore, ActivityJournal) {
    (
        FileStore::new(config.data_dir.clone()),
        ActivityJournal::in_dir(&config.data_dir),
    )
}

fn block_on<F: std::future::Future<Output = Result<()>>>(future: F) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    runtime.block_on(future)
}

/// Runs the monitor daemon until a shutdown signal (or stdin EOF).
async fn run_daemon(app: App, exit_on_eof: bool) -> Result<()> {
    info!(
        data_dir = %app.config.data_dir.display(),
        interval_secs = app.config.check_interval.as_secs(),
        "Starting LockWatch Monitor"
    );

    let handle = app.monitor.clone().start(app.config.check_interval).await;

    info!("Monitor running. Press Ctrl+C to stop.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = wait_for_shutdown() => {
                info!("Shutdown signal received");
                break;
            }

            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => handle_event_line(&app.recorder, &line),
                Ok(None) => {
                    stdin_open = false;
                    if exit_on_eof {
                        info!("Event stream closed");
                        break;
                    }
                    info!("Event stream closed, monitor keeps running");
                }
                Err(e) => {
                    stdin_open = false;
                    warn!(error = %e, "Failed to read event stream");
                }
            }
        }
    }

    info!("Shutting down...");
    handle.stop().await;
    Ok(())
}

/// Records the lock event on one input line. Blank lines and `#` comments
/// are ignored.
fn handle_event_line(recorder: &LockRecorder, line: &str) {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return;
    }

    match line.parse::<LockEvent>() {
        Ok(event) => {
            if let Err(e) = recorder.record(event, SystemClock.now_millis()) {
                error!(error = %e, %event, "Failed to record lock transition");
            }
        }
        Err(e) => warn!(error = %e, "Ignoring unrecognized event"),
    }
}

async fn run_check(app: App) -> Result<()> {
    let outcome = app.monitor.run_check().await;
    println!("{outcome}");

    match outcome {
        CheckOutcome::Alerted(report) => {
            for failure in &report.failures {
                println!("  failed: {} ({}): {}", failure.name, failure.phone, failure.reason);
            }
            Ok(())
        }
        CheckOutcome::NotTriggered(_) => Ok(()),
        CheckOutcome::AlertFailed(e) => Err(e).context("Alert was due but not sent"),
        CheckOutcome::Skipped(e) => Err(e).context("Check skipped"),
    }
}

async fn run_test_alert(app: App) -> Result<()> {
    let report = app
        .monitor
        .send_test_alert()
        .await
        .context("Test alert failed")?;

    println!(
        "Test alert sent to {} of {} contacts",
        report.sent_count, report.attempted
    );
    for failure in &report.failures {
        println!("  failed: {} ({}): {}", failure.name, failure.phone, failure.reason);
    }
    Ok(())
}

fn run_event(config: &Config, event: LockEvent) -> Result<()> {
    let (store, journal) = open_store(config);
    let recorder = LockRecorder::new(Arc::new(store)).with_journal(Arc::new(journal));

    recorder
        .record(event, SystemClock.now_millis())
        .context("Failed to record lock transition")?;
    Ok(())
}

fn set_enabled(config: &Config, enabled: bool) -> Result<()> {
    let (store, journal) = open_store(config);
    store
        .set_bool(keys::SERVICE_ENABLED, enabled)
        .context("Failed to update monitoring state")?;

    let state = if enabled { "enabled" } else { "disabled" };
    journal.record("SERVICE", &format!("Monitoring {state}"));
    println!("Monitoring {state}");

    if enabled && !store.has_contacts()? {
        eprintln!("Warning: no contacts configured, alerts cannot be delivered.");
    }
    Ok(())
}

fn print_status(config: &Config) -> Result<()> {
    let (store, _) = open_store(config);
    let state = MonitorState::load(&store).context("Failed to read monitor state")?;
    let contacts = store.list_contacts().context("Failed to read contacts")?;
    let policy = config.policy();
    let decision = Evaluator::new(policy).evaluate(
        &state,
        SystemClock.now_millis(),
        SystemClock.current_hour(),
    );

    println!("Data directory:   {}", config.data_dir.display());
    println!(
        "Monitoring:       {}",
        if state.service_enabled { "enabled" } else { "disabled" }
    );
    println!("Last transition:  {}", format_millis(state.last_transition_time));
    println!("Last alert:       {}", format_millis(state.last_alert_time));
    println!("Contacts:         {}", contacts.len());
    println!(
        "SMS gateway:      {}",
        config
            .gateway
            .as_ref()
            .map_or("not configured", |g| g.url.as_str())
    );
    println!(
        "Active window:    {:02}:00-{:02}:00",
        policy.active_start_hour, policy.active_end_hour
    );
    println!("Threshold:        {}h", policy.unlock_threshold_hours);
    println!("Cooldown:         {}m", policy.alert_cooldown.as_secs() / 60);
    println!("Check interval:   {}s", config.check_interval.as_secs());
    println!("Current decision: {decision}");
    Ok(())
}

fn run_contacts(config: &Config, action: ContactsCommand) -> Result<()> {
    let (store, journal) = open_store(config);

    match action {
        ContactsCommand::List => {
            let contacts = store.list_contacts().context("Failed to read contacts")?;
            if contacts.is_empty() {
                println!("No contacts configured.");
            }
            for contact in contacts {
                let marker = if contact.is_default { " (default)" } else { "" };
                println!("{}  {}  {}{marker}", contact.id, contact.name, contact.phone);
            }
        }
        ContactsCommand::Add {
            name,
            phone,
            default,
        } => {
            let contact = NewContact::new(name, phone, default);
            let summary = format!("{} ({})", contact.name, contact.phone);
            let id = store.add_contact(contact).context("Failed to add contact")?;
            journal.record("CONTACT", &format!("Added {summary}"));
            println!("Added contact {id}");
        }
        ContactsCommand::Update {
            id,
            name,
            phone,
            default,
        } => {
            let Some(existing) = store.get_contact(id).context("Failed to read contacts")? else {
                bail!("No contact with id {id}");
            };
            let contact = NewContact::new(
                name.unwrap_or(existing.name),
                phone.unwrap_or(existing.phone),
                default.unwrap_or(existing.is_default),
            );
            let summary = format!("{} ({})", contact.name, contact.phone);
            if !store
                .update_contact(id, contact)
                .context("Failed to update contact")?
            {
                bail!("No contact with id {id}");
            }
            journal.record("CONTACT", &format!("Updated {summary}"));
            println!("Updated contact {id}");
        }
        ContactsCommand::Remove { id } => {
            if !store.remove_contact(id).context("Failed to remove contact")? {
                bail!("No contact with id {id}");
            }
            journal.record("CONTACT", &format!("Removed {id}"));
            println!("Removed contact {id}");
        }
    }
    Ok(())
}

fn run_template(config: &Config, action: TemplateCommand) -> Result<()> {
    let (store, journal) = open_store(config);

    match action {
        TemplateCommand::Show => {
            println!("{}", alert_template(&store).context("Failed to read template")?);
        }
        TemplateCommand::Set { text } => {
            let text = text.trim();
            if text.is_empty() {
                bail!("Alert text cannot be empty");
            }
            store
                .set(keys::SMS_TEMPLATE, text)
                .context("Failed to save template")?;
            journal.record("TEMPLATE_UPDATED", text);
            println!("Alert text updated");
        }
    }
    Ok(())
}

fn run_logs(config: &Config, clear: bool, lines: Option<usize>) -> Result<()> {
    let (_, journal) = open_store(config);

    if clear {
        journal.clear().context("Failed to clear journal")?;
        println!("Journal cleared");
        return Ok(());
    }

    let entries = journal.entries().context("Failed to read journal")?;
    let skip = lines.map_or(0, |n| entries.len().saturating_sub(n));
    for entry in entries.iter().skip(skip) {
        println!("{entry}");
    }
    Ok(())
}

/// Formats a stored timestamp in local time; 0 means never.
fn format_millis(millis: i64) -> String {
    if millis == 0 {
        return "never".to_string();
    }
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

/// Initializes the logging subsystem. Logs go to stderr so command output
/// on stdout stays clean.
fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
