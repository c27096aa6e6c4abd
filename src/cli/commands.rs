use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::connector::TunnelConnector;
use crate::dashboard;
use crate::events::EventSink;
use crate::supervisor::Supervisor;
use crate::tls;
use crate::traffic::TrafficAccountant;
use crate::worker::{ExitReason, WorkerContext};

use super::config::{check_config, check_config_file_permissions, expand_path};
use super::template;

/// Execute CLI commands
pub async fn execute_command(cli: &super::Cli) -> Result<()> {
    use super::Commands;

    match &cli.command {
        Commands::Run {
            config,
            accounts,
            no_dashboard,
        } => {
            run_farm(config, accounts, !*no_dashboard).await?;
        }
        Commands::Check {
            config,
            accounts,
            format,
        } => {
            let config_path = expand_path(config)?;
            let accounts_path = accounts.as_deref().map(expand_path).transpose()?;
            check_config(&config_path, accounts_path.as_deref(), format)?;
        }
        Commands::Template { output } => {
            template::generate_config_template(output.as_deref())?;
        }
    }

    Ok(())
}

/// Run one worker per account until every worker has retired or shut down
async fn run_farm(config: &str, accounts: &str, with_dashboard: bool) -> Result<()> {
    let config_path = expand_path(config)?;
    let accounts_path = expand_path(accounts)?;

    // 账号文件包含访问令牌
    check_config_file_permissions(&accounts_path)?;

    info!("Loading configuration from: {}", config_path);
    let config = AppConfig::load_farm_config(&config_path)?;
    info!("Loading accounts from: {}", accounts_path);
    let accounts = AppConfig::load_accounts(&accounts_path)?;

    let tls_config =
        tls::load_client_config(config.tls.ca_cert_path.as_deref(), config.tls.skip_verify)?;
    let policy = config.policy.to_retry_policy();
    let connector = TunnelConnector::new(
        config.endpoint.clone(),
        TlsConnector::from(tls_config),
        policy.connect_timeout,
    );

    let events = EventSink::new();
    let traffic = TrafficAccountant::new();
    let supervisor = Arc::new(Supervisor::new(WorkerContext {
        connector: Arc::new(connector),
        events: events.clone(),
        traffic: traffic.clone(),
        policy,
        meter_direct: config.metering.meter_direct,
    }));

    let shutdown = supervisor.shutdown_token();
    let signal_supervisor = supervisor.clone();
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                break;
            }
            signal_supervisor.shutdown();
        }
    });

    let stopped = CancellationToken::new();
    let ui = if with_dashboard {
        let (events, traffic) = (events.clone(), traffic.clone());
        let (shutdown, stopped) = (shutdown.clone(), stopped.clone());
        Some(tokio::task::spawn_blocking(move || {
            dashboard::run_dashboard(events, traffic, shutdown, stopped)
        }))
    } else {
        None
    };

    let reports = supervisor.run(accounts).await;
    stopped.cancel();

    if let Some(ui) = ui {
        match ui.await.context("Dashboard thread panicked")? {
            Ok(()) => {}
            Err(e) => error!("Dashboard error: {:#}", e),
        }
    }

    let retired = reports
        .iter()
        .filter(|r| r.exit == ExitReason::RetriesExhausted)
        .count();
    let invalid = reports
        .iter()
        .filter(|r| r.exit == ExitReason::InvalidProxy)
        .count();
    if retired > 0 || invalid > 0 {
        warn!(
            "{} workers retired after exhausting retries, {} never started (invalid proxy)",
            retired, invalid
        );
    }
    info!(
        "All {} workers stopped, total traffic {}",
        reports.len(),
        traffic.snapshot()
    );

    Ok(())
}
