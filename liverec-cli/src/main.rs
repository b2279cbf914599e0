use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use liverec_engine::{
    CancellationToken, DownloaderConfig, LogNotifier, Notifier, Recorder, RecorderConfig,
    TelegramNotifier, TwitchDirectory, create_client,
};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

mod cli;
mod error;

use cli::CliArgs;
use error::AppError;

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        error!(error = ?e, "Application failed");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    let args = CliArgs::parse();

    let channel = args.channel.trim().to_lowercase();
    if channel.is_empty() {
        return Err(AppError::InvalidInput("channel name is empty".to_string()));
    }

    std::fs::create_dir_all(&args.output_dir)?;
    let _log_guard = init_logging(args.verbose, args.log_file.as_deref(), &args.output_dir)?;

    info!("Liverec - records a live channel whenever it goes live");
    info!("==================================================================");

    let downloader = DownloaderConfig {
        timeout: Duration::from_secs(args.timeout),
        connect_timeout: Duration::from_secs(args.connect_timeout),
        use_system_proxy: !args.no_proxy,
        ..DownloaderConfig::default()
    };
    info!(
        "HTTP timeout configuration: overall={}s, connect={}s",
        args.timeout, args.connect_timeout
    );

    let config = RecorderConfig::builder()
        .with_channel(channel)
        .with_quality(args.quality)
        .with_output_dir(args.output_dir)
        .with_downloader_config(downloader)
        .build()?;

    let client = create_client(&config.downloader)?;

    let mut directory = TwitchDirectory::new(client.clone())?.with_oauth_token(args.oauth_token);
    if let Some(client_id) = args.client_id {
        directory = directory.with_client_id(client_id);
    }

    let notifier: Arc<dyn Notifier> = match args.telegram_token {
        Some(token) => Arc::new(TelegramNotifier::new(client.clone(), token, args.chat_id)?),
        None => {
            warn!("No Telegram token given, notifications will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let recorder = Recorder::new(config, client, Arc::new(directory), notifier);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl-C, finishing current session"),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
        }
        on_signal.cancel();
    });

    recorder.run(cancel).await?;
    Ok(())
}

/// Installs the global subscriber. The returned guard flushes the log file on drop and
/// must live as long as the program.
fn init_logging(
    verbose: bool,
    log_file: Option<&Path>,
    output_dir: &Path,
) -> Result<Option<WorkerGuard>, AppError> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                output_dir.join(path)
            };
            let file_name = path
                .file_name()
                .ok_or_else(|| AppError::InvalidInput(format!("bad log file {}", path.display())))?
                .to_owned();
            let dir = path.parent().unwrap_or(output_dir).to_path_buf();
            std::fs::create_dir_all(&dir)?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(verbose))
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Initialization(e.to_string()))?;

    Ok(guard)
}
