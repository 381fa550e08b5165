mod cli;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Args, Commands};
use glint_rs::prelude::*;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "glint=info,glint_rs=info,glint_ocr=info";

#[tokio::main]
async fn main() -> ExitCode {
  let args = Args::parse();
  init_tracing(args.log_level.as_deref());

  match run(args).await {
    Ok(code) => code,
    Err(e) => {
      eprintln!("Error: {:#}", e);
      ExitCode::FAILURE
    }
  }
}

fn init_tracing(level: Option<&str>) {
  let filter = match level {
    Some(level) => EnvFilter::new(level),
    None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
  };
  tracing_subscriber::registry()
    .with(filter)
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .init();
}

async fn run(args: Args) -> Result<ExitCode> {
  match args.command {
    Commands::Version => {
      println!("glint {}", env!("CARGO_PKG_VERSION"));
      Ok(ExitCode::SUCCESS)
    }
    Commands::Serve { host, port, config } => {
      let mut config = load_or_default(config.as_deref())?;
      if let Some(host) = host {
        config.server.host = host;
      }
      if let Some(port) = port {
        config.server.port = port;
      }
      serve(config).await?;
      Ok(ExitCode::SUCCESS)
    }
    Commands::Batch {
      paths,
      input_dir,
      output_dir,
      no_visualization,
      config,
    } => {
      let mut config = load_or_default(config.as_deref())?;
      if let Some(output_dir) = output_dir {
        config.batch.output_dir = output_dir;
      }
      if no_visualization {
        config.batch.visualize = false;
      }
      let paths = collect_inputs(paths, input_dir.as_deref())?;
      batch(config, &paths).await
    }
  }
}

async fn start_pipeline(config: &GlintConfig) -> Result<Arc<OcrPipeline>> {
  let engine = EngineClient::initialize(config.engine.engine_config(), &config.engine.process_options())
    .await
    .context("Failed to initialize OCR engine")?;
  Ok(Arc::new(OcrPipeline::new(
    Arc::new(engine),
    config.visualization.clone(),
  )))
}

async fn serve(config: GlintConfig) -> Result<()> {
  tracing::info!("Starting glint server v{}", env!("CARGO_PKG_VERSION"));
  let pipeline = start_pipeline(&config).await?;

  let addr = format!("{}:{}", config.server.host, config.server.port);
  let listener = tokio::net::TcpListener::bind(&addr)
    .await
    .with_context(|| format!("Failed to bind {}", addr))?;

  let served = protocol_server::serve(listener, pipeline.clone(), shutdown_signal()).await;
  if let Err(e) = pipeline.engine().shutdown().await {
    tracing::warn!(error = %e, "engine did not shut down cleanly");
  }
  served
}

async fn batch(config: GlintConfig, paths: &[PathBuf]) -> Result<ExitCode> {
  if paths.is_empty() {
    bail!("No images to process: pass image paths or --input-dir");
  }
  let pipeline = start_pipeline(&config).await?;
  let processor = BatchProcessor::new(pipeline.clone(), config.batch.batch_options());
  let summary = processor.run(paths).await;
  if let Err(e) = pipeline.engine().shutdown().await {
    tracing::warn!(error = %e, "engine did not shut down cleanly");
  }
  let summary = summary?;

  print_summary(&summary, &config.batch.output_dir);
  if summary.batch_info.processed_images == 0 {
    return Ok(ExitCode::FAILURE);
  }
  Ok(ExitCode::SUCCESS)
}

fn collect_inputs(mut paths: Vec<PathBuf>, input_dir: Option<&std::path::Path>) -> Result<Vec<PathBuf>> {
  if let Some(dir) = input_dir {
    paths.extend(discover_images(dir)?);
  }
  Ok(paths)
}

fn print_summary(summary: &BatchSummary, output_dir: &std::path::Path) {
  let info = &summary.batch_info;
  println!("Batch processing summary:");
  println!("  Total images:           {}", info.total_images);
  println!("  Successfully processed: {}", info.processed_images);
  println!("  Failed:                 {}", info.failed_images);
  println!("  Model loading time:     {:.2}s (one-time cost)", info.model_loading_time);
  println!("  Total processing time:  {:.2}s", info.total_processing_time);
  println!("  Average per image:      {:.2}s", info.average_per_image);
  if let Some(efficiency) = summary.efficiency() {
    println!("  Start-up share:         {:.1}% paid once", efficiency * 100.0);
  }
  println!("  Summary:                {}", output_dir.join(SUMMARY_FILE).display());
}

async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = signal::ctrl_c().await {
      tracing::error!(error = %e, "failed to install Ctrl+C handler");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
      Ok(mut stream) => {
        stream.recv().await;
      }
      Err(e) => {
        tracing::error!(error = %e, "failed to install SIGTERM handler");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
    _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
  }
}
