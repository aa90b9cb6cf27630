//! Output rendering and formatting

use std::io;
use std::path::PathBuf;

use avbuild_scene::{Attachment, SceneGraph};
use avbuild_types::{BuildResult, ColorChoice, OutputFormat};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use console::{Style, Term};
use serde::Serialize;

/// What a command produced
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandOutput {
    Build(BuildReport),
    Name { file_name: String },
    Inspect(InspectReport),
}

#[derive(Debug, Serialize)]
pub struct BuildReport {
    pub status: String,
    pub output_path: Option<PathBuf>,
    pub message: Option<String>,
}

impl From<&BuildResult> for BuildReport {
    fn from(result: &BuildResult) -> Self {
        Self {
            status: result.status().to_string(),
            output_path: result.output_path().map(PathBuf::from),
            message: result.message().map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NodeRow {
    pub path: String,
    pub active: bool,
    pub locked: bool,
    pub attachments: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TombstoneRow {
    pub path: String,
    pub index: usize,
    pub type_name: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct InspectReport {
    pub document: String,
    pub nodes: Vec<NodeRow>,
    pub tombstones: Vec<TombstoneRow>,
}

impl InspectReport {
    /// Walk every root in document order
    pub fn from_graph(document: &str, graph: &SceneGraph) -> Self {
        let mut nodes = Vec::new();
        let mut tombstones = Vec::new();
        for &root in graph.roots() {
            for id in graph.descendants(root) {
                let Some(node) = graph.node(id) else {
                    continue;
                };
                let path = graph.node_path(id);
                for (index, attachment) in node.attachments().iter().enumerate() {
                    if let Attachment::Missing(missing) = attachment {
                        tombstones.push(TombstoneRow {
                            path: path.clone(),
                            index,
                            type_name: missing.type_name.clone(),
                            reason: missing.reason.clone(),
                        });
                    }
                }
                nodes.push(NodeRow {
                    path,
                    active: node.is_active(),
                    locked: node.is_locked(),
                    attachments: node
                        .attachments()
                        .iter()
                        .map(|a| a.type_name().to_string())
                        .collect(),
                });
            }
        }
        Self {
            document: document.to_string(),
            nodes,
            tombstones,
        }
    }
}

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    format: OutputFormat,
    color_choice: ColorChoice,
    term: Term,
}

impl OutputRenderer {
    pub fn new(format: OutputFormat, color_choice: ColorChoice) -> Self {
        Self {
            format,
            color_choice,
            term: Term::stdout(),
        }
    }

    pub fn colors_enabled(&self) -> bool {
        match self.color_choice {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => {
                self.format == OutputFormat::Tty && self.term.features().colors_supported()
            }
        }
    }

    pub fn render(&self, output: &CommandOutput) -> io::Result<()> {
        if self.format == OutputFormat::Json {
            let json = serde_json::to_string_pretty(output).map_err(io::Error::other)?;
            println!("{json}");
            return Ok(());
        }
        match output {
            CommandOutput::Build(report) => self.render_build(report),
            CommandOutput::Name { file_name } => {
                println!("{file_name}");
                Ok(())
            }
            CommandOutput::Inspect(report) => self.render_inspect(report),
        }
    }

    fn style(&self, style: Style) -> Style {
        if self.colors_enabled() {
            style
        } else {
            Style::new()
        }
    }

    fn render_build(&self, report: &BuildReport) -> io::Result<()> {
        match &report.output_path {
            Some(path) => {
                let ok = self.style(Style::new().green().bold());
                self.term
                    .write_line(&format!("{} {}", ok.apply_to("Built"), path.display()))
            }
            None => {
                let failed = self.style(Style::new().red().bold());
                self.term.write_line(&format!(
                    "{} [{}] {}",
                    failed.apply_to("Failed"),
                    report.status,
                    report.message.as_deref().unwrap_or_default()
                ))
            }
        }
    }

    fn render_inspect(&self, report: &InspectReport) -> io::Result<()> {
        if self.format == OutputFormat::Plain {
            for node in &report.nodes {
                println!(
                    "{}\t{}\t{}\t{}",
                    node.path,
                    node.active,
                    node.locked,
                    node.attachments.join(",")
                );
            }
            for tomb in &report.tombstones {
                println!("missing\t{}\t{}\t{}", tomb.path, tomb.index, tomb.type_name);
            }
            return Ok(());
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Node").add_attribute(Attribute::Bold),
                Cell::new("Active").add_attribute(Attribute::Bold),
                Cell::new("Locked").add_attribute(Attribute::Bold),
                Cell::new("Attachments").add_attribute(Attribute::Bold),
            ]);
        for node in &report.nodes {
            let depth = node.path.matches('/').count();
            let name = node.path.rsplit('/').next().unwrap_or(&node.path);
            let mut active = Cell::new(if node.active { "yes" } else { "no" });
            if !node.active && self.colors_enabled() {
                active = active.fg(Color::DarkGrey);
            }
            table.add_row(vec![
                Cell::new(format!("{}{name}", "  ".repeat(depth))),
                active,
                Cell::new(if node.locked { "yes" } else { "" }),
                Cell::new(node.attachments.join(", ")),
            ]);
        }
        println!("{}: {} nodes", report.document, report.nodes.len());
        println!("{table}");

        if report.tombstones.is_empty() {
            return Ok(());
        }
        let warn = self.style(Style::new().yellow());
        println!(
            "{}",
            warn.apply_to(format!("{} missing behaviours:", report.tombstones.len()))
        );
        for tomb in &report.tombstones {
            println!(
                "  GameObject '{}' at component index {}: {} ({})",
                tomb.path, tomb.index, tomb.type_name, tomb.reason
            );
        }
        Ok(())
    }
}
