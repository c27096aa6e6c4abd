use anyhow::{Context, Result};
use clap::Parser;
use pulse_tunnel::cli::{execute_command, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    execute_command(&cli).await
}

/// Initialize logging; the dashboard owns the terminal, so logs only go to `--log-file` then
fn init_logging(cli: &Cli) -> Result<()> {
    let level = if cli.uses_dashboard() && cli.log_file.is_none() {
        "off"
    } else {
        cli.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match &cli.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path))?;
            builder
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => builder.init(),
    }

    tracing::info!("Pulse Tunnel v{}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
