//! Fixtures for the Kiln end-to-end tests.
//!
//! [`JobFile`] builds job files the way users write them (TOML, optionally on
//! disk) so the tests go through the real loader. [`Touch`] and [`TwoStage`]
//! are a minimal adapter and flow for checking the compiler itself without
//! any real tool semantics.

#![warn(missing_docs)]

use kiln_common::{option_map, OptionMap, OptionValue};
use kiln_config::{BoardDb, Job};
use kiln_graph::{
    compile, write, AdapterRegistry, ChainSpec, Command, CommandGraph, Flow, FlowError,
    StageContext, StageOutput, StageTemplate, Successors, ToolAdapter, ToolKind, WriteOutcome,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A job description assembled in code and serialized to TOML.
#[derive(Debug, Clone)]
pub struct JobFile {
    name: String,
    toplevel: String,
    flow: String,
    files: Vec<(String, String)>,
    flow_options: OptionMap,
    tool_options: BTreeMap<String, OptionMap>,
}

impl JobFile {
    /// Starts a job named `blinky` with top module `top`.
    pub fn new(flow: &str) -> Self {
        Self {
            name: "blinky".to_string(),
            toplevel: "top".to_string(),
            flow: flow.to_string(),
            files: Vec::new(),
            flow_options: OptionMap::new(),
            tool_options: BTreeMap::new(),
        }
    }

    /// Adds an input file.
    pub fn file(mut self, name: &str, file_type: &str) -> Self {
        self.files.push((name.to_string(), file_type.to_string()));
        self
    }

    /// Sets a flow option.
    pub fn option(mut self, key: &str, value: impl Into<OptionValue>) -> Self {
        self.flow_options.insert(key.to_string(), value.into());
        self
    }

    /// Sets an option for one tool.
    pub fn tool_option(mut self, tool: &str, key: &str, value: impl Into<OptionValue>) -> Self {
        self.tool_options
            .entry(tool.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
        self
    }

    /// Serializes the job as a TOML document.
    pub fn to_toml(&self) -> String {
        let mut doc = toml::Table::new();
        doc.insert("name".into(), self.name.clone().into());
        doc.insert("toplevel".into(), self.toplevel.clone().into());
        doc.insert("flow".into(), self.flow.clone().into());
        let files: Vec<toml::Value> = self
            .files
            .iter()
            .map(|(name, file_type)| {
                let mut entry = toml::Table::new();
                entry.insert("name".into(), name.clone().into());
                entry.insert("file_type".into(), file_type.clone().into());
                toml::Value::Table(entry)
            })
            .collect();
        doc.insert("files".into(), files.into());
        doc.insert("flow_options".into(), to_table(&self.flow_options));
        let tools: toml::Table = self
            .tool_options
            .iter()
            .map(|(tool, options)| (tool.clone(), to_table(options)))
            .collect();
        doc.insert("tool_options".into(), toml::Value::Table(tools));
        toml::to_string(&doc).unwrap_or_default()
    }

    /// Parses the serialized job with the real loader.
    pub fn load(&self) -> Job {
        kiln_config::load_job_from_str(&self.to_toml()).expect("fixture job should load")
    }

    /// Writes the job to `<dir>/job.toml` and loads it back from disk.
    pub fn load_from(&self, dir: &Path) -> Job {
        let path = dir.join("job.toml");
        std::fs::write(&path, self.to_toml()).expect("job file should be writable");
        kiln_config::load_job(&path).expect("fixture job should load from disk")
    }
}

fn to_table(options: &OptionMap) -> toml::Value {
    toml::Value::try_from(options).unwrap_or_else(|_| toml::Value::Table(toml::Table::new()))
}

/// An adapter that produces `<job>.<ext>` from its inputs with `touch`.
///
/// The stage option `env`, written `NAME=value`, becomes an exported
/// variable of the stage.
#[derive(Debug, Clone, Copy)]
pub struct Touch {
    /// The tool slot the adapter fills.
    pub tool: ToolKind,
    /// Extension of the produced file.
    pub ext: &'static str,
}

impl ToolAdapter for Touch {
    fn kind(&self) -> ToolKind {
        self.tool
    }

    fn configure(&self, ctx: &StageContext<'_>) -> Result<StageOutput, FlowError> {
        let target = format!("{}.{}", ctx.job.name, self.ext);
        let mut out = StageOutput::new();
        out.add(
            vec![Command::new("touch").arg(target.clone())],
            vec![target.clone()],
            ctx.inputs.to_vec(),
        );
        if let Some((name, value)) = ctx.get_str("env")?.and_then(|s| s.split_once('=')) {
            out.add_env_var(name, value);
        }
        out.set_exports([target]);
        Ok(out)
    }
}

/// Registry with [`Touch`] adapters for Yosys (`a`), VPR (`b`) and
/// nextpnr (`c`).
pub fn touch_registry() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    registry.register(Box::new(Touch { tool: ToolKind::Yosys, ext: "a" }));
    registry.register(Box::new(Touch { tool: ToolKind::Vpr, ext: "b" }));
    registry.register(Box::new(Touch { tool: ToolKind::Nextpnr, ext: "c" }));
    registry
}

/// A two-stage flow: Yosys, then VPR or nextpnr depending on `pnr`.
///
/// A `board` flow option pulls options from the board database, and the
/// resolved `part` (if any) is exported as `PART`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TwoStage;

impl Flow for TwoStage {
    fn name(&self) -> &'static str {
        "two_stage"
    }

    fn option_defaults(&self) -> OptionMap {
        option_map([("pnr", "vpr")])
    }

    fn external_options(&self, job: &Job, boards: &BoardDb) -> Result<OptionMap, FlowError> {
        match job.flow_options.get("board").and_then(OptionValue::as_str) {
            Some(board) => Ok(boards.lookup(board)?.clone()),
            None => Ok(OptionMap::new()),
        }
    }

    fn chain(
        &self,
        _options: &kiln_config::ResolvedOptions,
        _job: &Job,
    ) -> Result<ChainSpec, FlowError> {
        Ok(ChainSpec::new()
            .stage(StageTemplate::new(ToolKind::Yosys).branch(Successors::ByPnr {
                vpr: vec![ToolKind::Vpr],
                nextpnr: vec![ToolKind::Nextpnr],
            }))
            .stage(StageTemplate::new(ToolKind::Vpr))
            .stage(StageTemplate::new(ToolKind::Nextpnr)))
    }

    fn finish(
        &self,
        graph: &mut CommandGraph,
        options: &kiln_config::ResolvedOptions,
        _job: &Job,
    ) -> Result<(), FlowError> {
        if let Some(part) = options.get_str("part")? {
            graph.export("PART", part, self.name())?;
        }
        Ok(())
    }
}

/// Compiles `job` with `flow` and writes `<dir>/Makefile`.
pub fn configure_with(
    flow: &dyn Flow,
    job: &Job,
    boards: &BoardDb,
    registry: &AdapterRegistry,
    dir: &Path,
) -> Result<(PathBuf, WriteOutcome), FlowError> {
    let graph = compile(flow, job, boards, registry)?;
    let path = dir.join(kiln_tools::SCRIPT_NAME);
    let outcome = write(&graph, &path)?;
    Ok((path, outcome))
}

/// The `targets: deps` line of every rule in a rendered script, in order,
/// skipping the `all` rule.
pub fn rules(script: &str) -> Vec<&str> {
    script
        .lines()
        .filter(|l| !l.starts_with(['\t', '#', '.', '$']) && !l.starts_with("export"))
        .filter(|l| l.contains(':') && !l.starts_with("all:"))
        .collect()
}

/// Splits a rule line into its targets and dependencies.
pub fn split_rule(rule: &str) -> (Vec<&str>, Vec<&str>) {
    let (targets, deps) = match rule.split_once(" &:") {
        Some(parts) => parts,
        None => rule.split_once(':').unwrap_or((rule, "")),
    };
    (
        targets.split_whitespace().collect(),
        deps.split_whitespace().collect(),
    )
}

/// Dependencies of the script that are neither produced by an earlier rule
/// nor listed in `provided`.
pub fn dangling<'a>(script: &'a str, provided: &[&str]) -> Vec<&'a str> {
    let mut produced: Vec<&str> = Vec::new();
    let mut missing = Vec::new();
    for rule in rules(script) {
        let (targets, deps) = split_rule(rule);
        for dep in deps {
            if !produced.contains(&dep) && !provided.contains(&dep) {
                missing.push(dep);
            }
        }
        produced.extend(targets);
    }
    missing
}
