//! Binary entry point: resolve configuration, initialize logging, then
//! either run the `--download` fast path or serve the HTTP surface.

mod logging;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;
use whisper_server_lib::config::cli::CliArgs;
use whisper_server_lib::config::{self, EffectiveConfig};
use whisper_server_lib::http::{build_router, AppState};
use whisper_server_lib::models::ModelId;
use whisper_server_lib::provisioner::ModelProvisioner;

/// Writes to the rotating file sink and stderr, per §6's log filesystem
/// layout contract (rotated at `logMaxBytes`, keeping up to 10 files) and
/// `--download`'s stderr progress output.
fn init_logging(effective: &EffectiveConfig) -> tracing_appender::non_blocking::WorkerGuard {
    let log_path = PathBuf::from(&effective.log_file_path);
    let file_writer = logging::RotatingFileWriter::new(log_path, effective.log_max_bytes)
        .expect("failed to open log file");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_writer);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective.log_level.clone()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking.and(std::io::stderr))
        .init();

    guard
}

fn models_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.join("models")))
        .unwrap_or_else(|| PathBuf::from("models"))
}

#[tokio::main]
async fn main() {
    let cli = CliArgs::parse();

    let effective = match config::resolve(&cli) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("failed to resolve configuration: {err}");
            std::process::exit(1);
        }
    };

    let _log_guard = init_logging(&effective);

    if let Some(raw_model) = &cli.download {
        run_download(raw_model, &effective).await;
        return;
    }

    tracing::info!(host = %effective.host, port = effective.port, model = %effective.model_id, "starting whisper-server");

    if let Err(err) = whisper_server_lib::temp::ensure_scratch_dir().await {
        tracing::error!(error = %err, "failed to create scratch directory");
        std::process::exit(1);
    }

    let addr = format!("{}:{}", effective.host, effective.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(addr = %addr, error = %err, "failed to bind listener");
            std::process::exit(1);
        }
    };

    let state = AppState::new(effective, models_dir());

    tracing::info!(model = %state.config.model_id, "provisioning configured model at startup");
    if let Err(err) = state.provision_at_startup().await {
        tracing::error!(error = %err, "failed to provision or load the configured model at startup");
        std::process::exit(1);
    }

    let router = build_router(state);

    if let Err(err) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %err, "server exited with error");
        std::process::exit(1);
    }
}

async fn run_download(raw_model: &str, effective: &EffectiveConfig) {
    let model_id = match ModelId::normalize(raw_model) {
        Some(id) => id,
        None => {
            eprintln!("unknown model id: {raw_model}");
            std::process::exit(1);
        }
    };

    let provisioner = ModelProvisioner::new(models_dir());
    match provisioner.ensure(model_id).await {
        Ok(path) => {
            println!("model {} ready at {}", model_id, path.display());
            let _ = effective;
        }
        Err(err) => {
            eprintln!("failed to provision model {model_id}: {err}");
            std::process::exit(1);
        }
    }
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
