//! avbuild - build distributable bundles from avatar subjects
//!
//! Thin command line glue over the builder crate: loads configuration,
//! wires events to the terminal and maps Ctrl-C onto build cancellation.

mod behaviors;
mod cli;
mod display;
mod error;
mod events;
mod logging;

use std::future::Future;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use avbuild_builder::{
    ArtifactNamer, BuildCoordinator, BuildRequest, BuildSettings, CancellationToken, StaticHost,
    SubjectRef,
};
use avbuild_config::Config;
use avbuild_events::EventReceiver;
use avbuild_types::{BuildResult, OutputFormat, Platform};
use avbuild_workspace::{Document, Workspace};
use chrono::Local;
use clap::Parser;
use tokio::select;
use tracing::{error, info, warn};

use crate::behaviors::builtin_registry;
use crate::cli::{Cli, Commands, GlobalArgs};
use crate::display::{BuildReport, CommandOutput, InspectReport, OutputRenderer};
use crate::error::CliError;
use crate::events::EventHandler;
use crate::logging::init_tracing;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    let config = match load_config(&cli.global).await {
        Ok(config) => config,
        Err(e) => {
            if !json_mode {
                eprintln!("Error: {e}");
            }
            process::exit(2);
        }
    };

    init_tracing(json_mode, cli.global.debug, &config.logs_dir());

    if let Err(e) = run(cli, config).await {
        error!("Application error: {}", e);
        if !json_mode {
            eprintln!("Error: {e}");
        }
        process::exit(1);
    }
}

/// File config (or defaults), then environment, then flags
async fn load_config(global: &GlobalArgs) -> Result<Config, CliError> {
    let mut config = Config::load_or_default(global.config.as_deref())
        .await
        .map_err(CliError::Config)?;
    config.merge_env().map_err(CliError::Config)?;

    if let Some(color) = global.color {
        config.general.color = color;
    }
    config.general.default_output = global.output_format(config.general.default_output);
    Ok(config)
}

async fn run(cli: Cli, config: Config) -> Result<(), CliError> {
    info!(command = cli.command.name(), "Starting avbuild v{}", env!("CARGO_PKG_VERSION"));

    let renderer = OutputRenderer::new(config.general.default_output, config.general.color);
    let output = match cli.command {
        Commands::Build {
            workspace,
            scene,
            subject,
            target,
            output_dir,
            filename,
            temp_dir,
        } => {
            let options = BuildOptions {
                workspace,
                scene,
                subject,
                target,
                output_dir,
                filename,
                temp_dir,
            };
            let quiet = config.general.default_output == OutputFormat::Json;
            let handler = EventHandler::new(renderer.colors_enabled(), quiet);
            build(options, &config, handler).await?
        }
        Commands::Name { scene, target } => CommandOutput::Name {
            file_name: ArtifactNamer::new(config.build.extension.as_str()).file_name(
                &scene,
                target,
                &Local::now(),
            ),
        },
        Commands::Inspect { workspace, scene } => inspect(workspace, &scene).await?,
    };

    renderer.render(&output)?;
    if let CommandOutput::Build(report) = &output {
        if report.output_path.is_none() {
            return Err(CliError::BuildFailed(report.status.clone()));
        }
    }
    info!("Command completed successfully");
    Ok(())
}

struct BuildOptions {
    workspace: PathBuf,
    scene: String,
    subject: Option<String>,
    target: Option<Platform>,
    output_dir: Option<PathBuf>,
    filename: Option<String>,
    temp_dir: Option<PathBuf>,
}

async fn build(
    options: BuildOptions,
    config: &Config,
    mut handler: EventHandler,
) -> Result<CommandOutput, CliError> {
    let root = options.workspace;
    let mut workspace = Workspace::load(root.clone(), builtin_registry()).await?;
    let handle = workspace.open_document(&options.scene, 0).await?;
    let subject = match options.subject {
        Some(subject) => subject,
        None => workspace
            .document(handle)
            .and_then(Document::graph)
            .and_then(|graph| graph.roots().first().map(|&id| graph.node_path(id)))
            .ok_or_else(|| {
                CliError::InvalidArguments(format!(
                    "scene '{}' has no root node; pass --subject",
                    options.scene
                ))
            })?,
    };

    let (sender, receiver) = avbuild_events::channel();
    let settings = BuildSettings::from_config(config, &root);
    let coordinator = BuildCoordinator::new(
        workspace.into_shared(),
        Arc::new(StaticHost::new()),
        settings,
    )?
    .with_events(sender);

    let mut request = BuildRequest::new(
        SubjectRef::new(options.scene, subject),
        options
            .output_dir
            .unwrap_or_else(|| config.output_dir_for(&root)),
    );
    request.target = options.target;
    request.filename = options.filename;
    request.temp_dir = options.temp_dir;

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling build");
                cancel.cancel();
            }
        })
    };

    let result = drive_with_events(coordinator.build(request, cancel), receiver, &mut handler).await;
    interrupt.abort();
    Ok(CommandOutput::Build(BuildReport::from(&result)))
}

/// Poll the build while forwarding its events to the handler
async fn drive_with_events(
    build: impl Future<Output = BuildResult>,
    mut receiver: EventReceiver,
    handler: &mut EventHandler,
) -> BuildResult {
    let mut build = Box::pin(build);
    loop {
        select! {
            result = &mut build => {
                while let Ok(message) = receiver.try_recv() {
                    handler.handle_event(message);
                }
                return result;
            }
            message = receiver.recv() => {
                if let Some(message) = message {
                    handler.handle_event(message);
                }
            }
        }
    }
}

async fn inspect(root: PathBuf, scene: &str) -> Result<CommandOutput, CliError> {
    let mut workspace = Workspace::load(root, builtin_registry()).await?;
    let handle = workspace.open_document(scene, 0).await?;
    let graph = workspace
        .document(handle)
        .and_then(Document::graph)
        .ok_or_else(|| CliError::InvalidArguments(format!("scene '{scene}' did not load")))?;
    Ok(CommandOutput::Inspect(InspectReport::from_graph(scene, graph)))
}
