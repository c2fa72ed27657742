use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use voxrelay::backend::{RecognitionConfig, TcpBackend};
use voxrelay::cli::{Cli, Commands, ConfigAction};
use voxrelay::config::Config;
use voxrelay::decode::PcmPassthrough;
use voxrelay::pipeline::{PipelineConfig, PipelineError};
use voxrelay::session::{TrackContext, run_track};
use voxrelay::sink::StdoutSink;
use voxrelay::source::WavFrameSource;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbosity = cli.verbosity();

    match cli.command {
        Commands::Serve {
            listen,
            stun_server,
            backend,
            first_frame_timeout,
            frame_timeout,
            static_dir,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(listen) = listen {
                config.server.listen = listen;
            }
            if let Some(stun_server) = stun_server {
                config.server.stun_server = stun_server;
            }
            if let Some(backend) = backend {
                config.backend.address = backend;
            }
            if let Some(timeout) = first_frame_timeout {
                config.pipeline.first_frame_timeout_ms = u64::try_from(timeout.as_millis())
                    .context("--first-frame-timeout is too large")?;
            }
            if let Some(timeout) = frame_timeout {
                config.pipeline.frame_timeout_ms = u64::try_from(timeout.as_millis())
                    .context("--frame-timeout is too large")?;
            }
            if static_dir.is_some() {
                config.server.static_dir = static_dir;
            }
            config.validate()?;
            voxrelay::logging::init(&config.logging.filter, verbosity);
            run_serve(config).await?;
        }
        Commands::Replay {
            file,
            backend,
            frame_ms,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(backend) = backend {
                config.backend.address = backend;
            }
            config.validate()?;
            voxrelay::logging::init(&config.logging.filter, verbosity);
            run_replay(config, &file, frame_ms)
                .await
                .with_context(|| format!("Replay of {} failed", file.display()))?;
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/voxrelay/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path).with_context(|| format!("Failed to load {}", path.display()))?
    } else {
        match Config::default_path() {
            Ok(default_path) => Config::load_or_default(&default_path)?,
            Err(_) => Config::default(),
        }
    };

    // Apply environment variable overrides
    Ok(config.with_env_overrides())
}

fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => {
            let path = match custom_path {
                Some(path) => path.to_path_buf(),
                None => Config::default_path()?,
            };
            println!("{}", path.display());
        }
    }
    Ok(())
}

#[cfg(all(feature = "server", feature = "webrtc"))]
async fn run_serve(config: Config) -> voxrelay::Result<()> {
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use voxrelay::session::http;
    use voxrelay::session::webrtc::{WebRtcSessionManager, WebRtcSettings};

    let cancel = CancellationToken::new();
    let backend = Arc::new(TcpBackend::from_config(&config));
    let manager = Arc::new(WebRtcSessionManager::new(
        backend,
        WebRtcSettings::from_config(&config),
        cancel.clone(),
    )?);

    let listener = TcpListener::bind(&config.server.listen)
        .await
        .map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("Failed to bind {}: {}", config.server.listen, e),
            )
        })?;
    info!(
        version = %voxrelay::version_string(),
        backend = %config.backend.address,
        stun_server = %config.server.stun_server,
        "Relay starting"
    );

    let router = http::router(manager.clone(), config.server.static_dir.as_deref());
    tokio::spawn(cancel_on_shutdown_signal(cancel.clone()));

    http::serve(listener, router, cancel).await?;
    manager.close_all().await;
    info!("Relay stopped");
    Ok(())
}

#[cfg(not(all(feature = "server", feature = "webrtc")))]
async fn run_serve(_config: Config) -> Result<()> {
    anyhow::bail!("voxrelay was built without WebRTC support; rebuild with --features webrtc")
}

/// Replay a WAV file against the configured backend, one JSON line per result.
async fn run_replay(config: Config, file: &Path, frame_ms: u32) -> voxrelay::Result<()> {
    let source = WavFrameSource::open(file, frame_ms).map_err(PipelineError::from)?;
    info!(
        file = %file.display(),
        sample_rate = source.sample_rate(),
        samples = source.total_samples(),
        frame_ms,
        "Replaying WAV file"
    );

    let recognition = RecognitionConfig {
        sample_rate: source.sample_rate(),
        channels: 1,
        ..RecognitionConfig::from_config(&config)
    };
    let decoder = PcmPassthrough::new(recognition.sample_rate, recognition.channels)
        .with_max_frame_bytes(source.chunk_size() * 2);
    let backend = TcpBackend::from_config(&config);

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown_signal(cancel.clone()));

    let mut sink = StdoutSink::new();
    let track_id = file.display().to_string();
    let report = run_track(
        TrackContext {
            track_id: &track_id,
            backend: &backend,
            recognition: &recognition,
            pipeline: PipelineConfig::from_config(&config),
            cancel,
        },
        decoder,
        source,
        &mut sink,
    )
    .await;

    report.pipeline.into_result()?;
    Ok(())
}

/// Cancel `cancel` on Ctrl-C or SIGTERM.
async fn cancel_on_shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => return,
    }
    info!("Shutdown requested");
    cancel.cancel();
}
