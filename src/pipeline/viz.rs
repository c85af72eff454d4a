//! Graphviz export and text introspection.
//!
//! [`Pipeline::to_dot`] assembles a DOT document with a fixed style
//! vocabulary that tests and tooling may rely on:
//!
//! | role | shape | fill |
//! |------|-------|------|
//! | computation node | rounded box | `lightblue` |
//! | virtual input | ellipse | `gold` |
//! | highlighted | unchanged | `lightcoral` |
//! | metadata line | italic label | – |
//!
//! Rendering to PNG/SVG shells out to the Graphviz `dot` executable; a
//! missing or failing `dot` surfaces as a `render` error rather than a
//! hard dependency of the crate.

use crate::errors::{PipelineError, Result};
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;
use std::process::{Command, Stdio};

use super::Pipeline;

/// Options for DOT export and rendering.
#[derive(Debug, Clone, Default)]
pub struct DotOptions {
    highlight: Vec<String>,
    legend: bool,
}

impl DotOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render the named nodes with the highlight fill.
    pub fn highlight<I>(mut self, names: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.highlight = names.into_iter().map(Into::into).collect();
        self
    }

    /// Emit a legend subgraph explaining the node styles.
    pub fn legend(mut self, enabled: bool) -> Self {
        self.legend = enabled;
        self
    }
}

const VIRTUAL_ATTRS: &str = "shape=ellipse, style=filled";
const COMPUTATION_ATTRS: &str = "shape=box, style=\"rounded,filled\"";
const FILL_VIRTUAL: &str = "gold";
const FILL_COMPUTATION: &str = "lightblue";
const FILL_HIGHLIGHT: &str = "lightcoral";
const DESCRIPTION_WRAP_COLUMNS: usize = 30;

impl Pipeline {
    /// Produce the DOT text for the whole pipeline.
    pub fn to_dot(&self, options: &DotOptions) -> String {
        let mut out = String::new();
        out.push_str("digraph pipeline {\n");
        out.push_str("    rankdir=TB;\n");
        out.push_str("    fontname=\"Helvetica\";\n");
        out.push_str("    node [fontname=\"Helvetica\", fontsize=10];\n");
        out.push_str("    edge [fontname=\"Helvetica\", fontsize=9];\n\n");

        for name in self.dag.topo_order() {
            let highlighted = options.highlight.iter().any(|h| h == &name);
            if self.virtual_inputs.contains(&name) {
                let fill = if highlighted { FILL_HIGHLIGHT } else { FILL_VIRTUAL };
                let _ = writeln!(
                    out,
                    "    \"{}\" [{VIRTUAL_ATTRS}, fillcolor={fill}, label={}];",
                    escape_id(&name),
                    title_label(&name),
                );
            } else if let Some(node) = self.nodes.get(&name) {
                let fill = if highlighted {
                    FILL_HIGHLIGHT
                } else {
                    FILL_COMPUTATION
                };
                let _ = writeln!(
                    out,
                    "    \"{}\" [{COMPUTATION_ATTRS}, fillcolor={fill}, label={}];",
                    escape_id(&name),
                    node_label(node),
                );
            }
        }

        out.push('\n');
        for (from, to) in self.dag.edges() {
            let _ = writeln!(out, "    \"{}\" -> \"{}\";", escape_id(&from), escape_id(&to));
        }

        if options.legend {
            out.push_str("\n    subgraph cluster_legend {\n");
            out.push_str("        label=< <B>Legend</B> >;\n");
            out.push_str("        style=dashed;\n");
            out.push_str("        color=lightgrey;\n");
            let _ = writeln!(
                out,
                "        \"legend_virtual\" [{VIRTUAL_ATTRS}, fillcolor={FILL_VIRTUAL}, label=\"Virtual\\ninput\"];"
            );
            let _ = writeln!(
                out,
                "        \"legend_node\" [{COMPUTATION_ATTRS}, fillcolor={FILL_COMPUTATION}, label=\"Computation\\nnode\"];"
            );
            out.push_str("    }\n");
        }

        out.push_str("}\n");
        out
    }

    /// Write the DOT text to a file.
    pub fn write_dot(&self, path: impl AsRef<Path>, options: &DotOptions) -> Result<()> {
        std::fs::write(path, self.to_dot(options))?;
        Ok(())
    }

    /// Render the pipeline to a PNG file via Graphviz.
    pub fn write_png(&self, path: impl AsRef<Path>, options: &DotOptions) -> Result<()> {
        let bytes = self.render("png", options)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Render the pipeline to an SVG file via Graphviz.
    pub fn write_svg(&self, path: impl AsRef<Path>, options: &DotOptions) -> Result<()> {
        let bytes = self.render("svg", options)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Render the pipeline to an SVG string via Graphviz.
    ///
    /// This is the inline-display hook: interactive front-ends can call
    /// it to show a pipeline as a picture.
    pub fn render_svg(&self, options: &DotOptions) -> Result<String> {
        let bytes = self.render("svg", options)?;
        String::from_utf8(bytes).map_err(|err| PipelineError::Render {
            message: format!("dot produced invalid UTF-8: {err}"),
        })
    }

    fn render(&self, format: &str, options: &DotOptions) -> Result<Vec<u8>> {
        let dot = self.to_dot(options);
        let mut child = Command::new("dot")
            .arg(format!("-T{format}"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| PipelineError::Render {
                message: format!("failed to run 'dot': {err}; is Graphviz installed?"),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(dot.as_bytes())?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(PipelineError::Render {
                message: format!(
                    "dot exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(output.stdout)
    }

    /// Human-readable listing of the pipeline structure.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Pipeline Summary");
        let _ = writeln!(out, "{}", "=".repeat(50));
        let _ = writeln!(out, "Nodes: {}", self.nodes.len());
        let _ = writeln!(
            out,
            "Validation: {}",
            if self.validate { "Enabled" } else { "Disabled" }
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "Execution Order:");

        for (position, name) in self.dag.topo_order().into_iter().enumerate() {
            let index = position + 1;
            if self.virtual_inputs.contains(&name) {
                let _ = writeln!(out, "{index}. {name} [virtual input]");
                continue;
            }
            let Some(node) = self.nodes.get(&name) else {
                continue;
            };
            match node.description() {
                Some(description) => {
                    let _ = writeln!(out, "{index}. {name} - {description}");
                }
                None => {
                    let _ = writeln!(out, "{index}. {name}");
                }
            }
            if !node.dependencies.is_empty() {
                let _ = writeln!(out, "   Dependencies: {}", node.dependencies.join(", "));
            }
            if !node.metadata.is_empty() {
                let tags: Vec<String> = node
                    .metadata
                    .iter()
                    .map(|(key, value)| format!("{key}={value}"))
                    .collect();
                let _ = writeln!(out, "   Metadata: {}", tags.join(", "));
            }
            let hook_count = node.pre_hook_count() + node.post_hook_count();
            if hook_count > 0 {
                let _ = writeln!(out, "   Pre/post hooks: {hook_count}");
            }
        }
        out
    }

    /// Print [`summary`](Pipeline::summary) to stdout.
    pub fn print_summary(&self) {
        print!("{}", self.summary());
    }
}

/// Bold fixed-width title, the common first line of every label.
fn title_label(name: &str) -> String {
    format!(
        "< <FONT FACE=\"Courier\" POINT-SIZE=\"12\"><B>{}</B></FONT> >",
        escape_html(name)
    )
}

/// HTML-like label: title, wrapped description, italic metadata tags.
fn node_label(node: &crate::node::Node) -> String {
    let mut parts = vec![format!(
        "<FONT FACE=\"Courier\" POINT-SIZE=\"12\"><B>{}</B></FONT>",
        escape_html(&node.name)
    )];

    if let Some(description) = node.description() {
        parts.extend(
            wrap_words(description, DESCRIPTION_WRAP_COLUMNS)
                .into_iter()
                .map(|line| escape_html(&line)),
        );
    }

    if !node.metadata.is_empty() {
        let tags: Vec<String> = node
            .metadata
            .iter()
            .map(|(key, value)| format!("{key}: {value}"))
            .collect();
        parts.push(format!("<I>{{{}}}</I>", escape_html(&tags.join(", "))));
    }

    format!("< {} >", parts.join("<BR/>"))
}

fn escape_id(name: &str) -> String {
    name.replace('\\', "\\\\").replace('"', "\\\"")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Greedy word wrap at `width` columns; words longer than the width get
/// their own line.
fn wrap_words(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.len() + 1 + word.len() > width {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        } else {
            current.push(' ');
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
