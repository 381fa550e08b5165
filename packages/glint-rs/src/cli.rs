//! Command line arguments backing the `glint` binary.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
  name = "glint",
  about = "Extract text with word and character geometry from images, in batch or over WebSocket",
  version
)]
pub struct Args {
  /// Log filter, e.g. `debug` or `glint_rs=trace` (overrides RUST_LOG)
  #[arg(long, global = true)]
  pub log_level: Option<String>,

  #[command(subcommand)]
  pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
  /// Print version information
  Version,
  /// Run the WebSocket OCR server
  Serve {
    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(long, short = 'p')]
    port: Option<u16>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
  },
  /// Process image files and write JSON results plus a batch summary
  Batch {
    /// Image files to process, in order
    paths: Vec<PathBuf>,

    /// Also process every image found directly inside this directory
    #[arg(long, short = 'i')]
    input_dir: Option<PathBuf>,

    /// Directory for result files
    #[arg(long, short = 'o')]
    output_dir: Option<PathBuf>,

    /// Skip writing annotated images
    #[arg(long)]
    no_visualization: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
  },
}
