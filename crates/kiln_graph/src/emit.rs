//! Renders a [`CommandGraph`] as a GNU make script and writes it atomically.
//!
//! Layout, top to bottom: banner and header comments, environment guards,
//! exports, special targets, the default goal, one rule per node in graph
//! order, auxiliary targets, footer. Generation-time placeholders are
//! substituted everywhere; execution-time placeholders pass through.

use crate::error::FlowError;
use crate::graph::{check_artifact, check_line, check_value, CommandGraph};
use crate::template::expand;
use kiln_common::ContentHash;
use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::Path;
use tempfile::NamedTempFile;

/// Make variable prefixed to every recipe line so the executor can wrap
/// commands (empty unless set).
pub const LAUNCHER_VAR: &str = "KILN_LAUNCHER";

const BANNER: &str = "# Generated by kiln. Manual edits will be overwritten.";

/// Result of [`write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The script was (re)written.
    Written,
    /// The destination already held identical content.
    Unchanged,
}

fn expand_all(
    words: &[String],
    vars: &BTreeMap<String, String>,
    referrer: &str,
) -> Result<Vec<String>, FlowError> {
    words
        .iter()
        .map(|w| {
            let name = expand(w, vars, referrer)?;
            check_artifact(&name, referrer)?;
            Ok(name)
        })
        .collect()
}

/// Renders the script text.
///
/// Node order is preserved. Rules with several targets use grouped targets
/// (`&:`) so the recipe runs once for all of them.
pub fn render(graph: &CommandGraph) -> Result<String, FlowError> {
    if graph.nodes().is_empty() {
        return Err(FlowError::EmptyGraph);
    }
    let vars = graph.gen_vars();
    let mut lines: Vec<String> = vec![BANNER.to_string()];

    for line in graph.header() {
        let text = expand(line, &vars, "the script header")?;
        check_line("comment", &text, "the script header")?;
        lines.push(format!("# {text}"));
    }
    lines.push(String::new());

    if !graph.guards().is_empty() {
        for guard in graph.guards() {
            let referrer = format!("guard {}", guard.name);
            let message = expand(&guard.message, &vars, &referrer)?;
            check_value(&message, &referrer)?;
            lines.push(format!("ifndef {}", guard.name));
            lines.push(format!("$(error {} is not set: {message})", guard.name));
            lines.push("endif".to_string());
        }
        lines.push(String::new());
    }

    if !graph.environment().is_empty() {
        for binding in graph.environment() {
            let referrer = format!("export {}", binding.name);
            let value = expand(&binding.value, &vars, &referrer)?;
            check_value(&value, &referrer)?;
            lines.push(format!("export {} = {value}", binding.name));
        }
        lines.push(String::new());
    }

    let aux_names: Vec<&str> = graph.aux_targets().iter().map(|a| a.name.as_str()).collect();
    let default = expand_all(graph.default_target(), &vars, "the default target")?.join(" ");

    lines.push(".DELETE_ON_ERROR:".to_string());
    lines.push(
        std::iter::once(".PHONY: all")
            .chain(aux_names.iter().copied())
            .collect::<Vec<_>>()
            .join(" "),
    );
    lines.push(String::new());
    lines.push(format!("all: {default}"));
    lines.push(String::new());

    for node in graph.nodes() {
        let referrer = node.id.to_string();
        let targets = expand_all(&node.targets, &vars, &referrer)?;
        let depends = expand_all(&node.depends, &vars, &referrer)?;
        let separator = if targets.len() > 1 { " &:" } else { ":" };
        lines.push(
            format!("{}{separator} {}", targets.join(" "), depends.join(" "))
                .trim_end()
                .to_string(),
        );
        for command in &node.commands {
            let text = expand(&command.to_string(), &vars, &referrer)?;
            check_line("command", &text, &referrer)?;
            lines.push(format!("\t$({LAUNCHER_VAR}) {text}"));
        }
        lines.push(String::new());
    }

    for aux in graph.aux_targets() {
        let referrer = format!("target '{}'", aux.name);
        lines.push(format!("{}: {default}", aux.name).trim_end().to_string());
        for command in &aux.commands {
            let text = expand(&command.to_string(), &vars, &referrer)?;
            check_line("command", &text, &referrer)?;
            lines.push(format!("\t$({LAUNCHER_VAR}) {text}"));
        }
        lines.push(String::new());
    }

    for line in graph.footer() {
        let text = expand(line, &vars, "the script footer")?;
        check_line("comment", &text, "the script footer")?;
        lines.push(text);
    }

    while lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    let mut text = lines.join("\n");
    text.push('\n');
    Ok(text)
}

/// Renders `graph` and writes it to `path`.
///
/// Nothing is touched if rendering fails. If `path` already holds the same
/// script the file is left alone; otherwise the script is written to a
/// temporary file next to `path` and renamed over it.
pub fn write(graph: &CommandGraph, path: &Path) -> Result<WriteOutcome, FlowError> {
    let text = render(graph)?;
    let hash = ContentHash::of_text(&text);

    if let Ok(existing) = std::fs::read_to_string(path) {
        if ContentHash::of_text(&existing) == hash {
            log::info!("{} is up to date ({})", path.display(), hash.short());
            return Ok(WriteOutcome::Unchanged);
        }
    }

    let io_err = |source: std::io::Error| FlowError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(text.as_bytes()).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    log::info!("wrote {} ({})", path.display(), hash.short());
    Ok(WriteOutcome::Written)
}
