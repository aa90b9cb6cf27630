//! Command line interface definition

use std::path::PathBuf;

use avbuild_types::{ColorChoice, OutputFormat, Platform};
use clap::{Parser, Subcommand};

/// avbuild - build distributable bundles from avatar subjects
#[derive(Parser)]
#[command(name = "avbuild")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build distributable bundles from avatar subjects")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Write debug logs to the configured logs directory
    #[arg(long, global = true)]
    pub debug: bool,

    /// Color output control
    #[arg(long, global = true, value_enum)]
    pub color: Option<ColorChoice>,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl GlobalArgs {
    /// Output format after flags override the configured default
    pub fn output_format(&self, configured: OutputFormat) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            configured
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a subject into a bundle
    #[command(alias = "b")]
    Build {
        /// Workspace root directory
        #[arg(short, long, value_name = "DIR")]
        workspace: PathBuf,

        /// Scene document holding the subject
        #[arg(short, long)]
        scene: String,

        /// Slash separated node path of the subject (default: first root)
        #[arg(long)]
        subject: Option<String>,

        /// Target platform (default: the host platform)
        #[arg(short, long)]
        target: Option<Platform>,

        /// Output directory for the bundle
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Bundle file name (default: timestamped)
        #[arg(long)]
        filename: Option<String>,

        /// Scratch directory for intermediate artifacts
        #[arg(long, value_name = "DIR")]
        temp_dir: Option<PathBuf>,
    },

    /// Print the file name a build would produce right now
    Name {
        /// Scene document name
        #[arg(short, long)]
        scene: String,

        /// Target platform
        #[arg(short, long)]
        target: Platform,
    },

    /// Show a scene's node tree and unresolved attachments
    Inspect {
        /// Workspace root directory
        #[arg(short, long, value_name = "DIR")]
        workspace: PathBuf,

        /// Scene document name
        #[arg(short, long)]
        scene: String,
    },
}

impl Commands {
    /// Name of the command for logging
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Build { .. } => "build",
            Commands::Name { .. } => "name",
            Commands::Inspect { .. } => "inspect",
        }
    }
}
