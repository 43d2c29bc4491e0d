//! mailsyncd
//!
//! Daemon that keeps a mail platform's user directory converged to an
//! LDAP/Active Directory source of truth. Runs a reconciliation cycle on a
//! fixed interval until stopped.

mod config;
mod logging;

use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use config::AppConfig;
use mailsync_core::DirectorySource;
use mailsync_engine::{CycleScheduler, Reconciler, ReconcilerConfig, SchedulerConfig};
use mailsync_ldap::LdapDirectory;
use mailsync_remote::RemoteMailClient;
use mailsync_statedb::SqliteStateDb;

#[derive(Debug, Parser)]
#[command(name = "mailsyncd", about = "LDAP to mail platform directory synchronizer")]
struct Cli {
    /// Run a single cycle and exit instead of looping.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Fail fast on missing or invalid configuration.
    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.log_filter);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        ldap_host = %config.ldap.host,
        api_url = %config.remote.base_url,
        state_db = %config.state_db_path.display(),
        interval_secs = config.interval_secs,
        "Starting mailsyncd"
    );

    let statedb = match SqliteStateDb::open(&config.state_db_path).await {
        Ok(db) => db,
        Err(e) => {
            error!(error = %e, "Failed to open state database");
            std::process::exit(1);
        }
    };

    let source = match LdapDirectory::new(config.ldap.clone()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Invalid LDAP configuration");
            std::process::exit(1);
        }
    };

    let remote = match RemoteMailClient::new(config.remote.clone()) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Invalid mail platform configuration");
            std::process::exit(1);
        }
    };

    // A source that is down right now is a transient condition, not a
    // startup error; cycles will retry.
    if let Err(e) = source.test_connection().await {
        warn!(error = %e, "Directory source unreachable at startup");
    }

    let reconciler = Reconciler::new(
        Arc::new(source),
        Arc::new(statedb),
        Arc::new(remote),
        ReconcilerConfig {
            concurrency: config.concurrency,
            call_timeout_secs: config.call_timeout_secs,
        },
    );

    if cli.once {
        match reconciler.run_cycle().await {
            Ok(report) => {
                info!(clean = report.is_clean(), "Single cycle finished");
                if !report.is_clean() {
                    std::process::exit(1);
                }
            }
            Err(e) => {
                error!(error = %e, "Cycle failed");
                std::process::exit(1);
            }
        }
        return;
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        signal_token.cancel();
    });

    let scheduler = CycleScheduler::new(
        reconciler,
        SchedulerConfig {
            interval_secs: config.interval_secs,
        },
        shutdown,
    );
    scheduler.run().await;

    info!("mailsyncd stopped");
}

/// Wait for Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl-C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
