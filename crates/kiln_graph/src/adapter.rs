//! The contract every pluggable tool stage implements.
//!
//! A [`ToolAdapter`] receives a [`StageContext`] (the job, the stage's merged
//! options and the artifacts its predecessors export) and returns a
//! [`StageOutput`]: the build steps of the stage, the artifacts it hands on,
//! and any variable bindings or environment guards it needs. Adapters never
//! touch the filesystem and never run a tool.

use crate::error::FlowError;
use crate::variant::Variant;
use kiln_common::OptionMap;
use kiln_config::{Job, ResolvedOptions};
use std::collections::BTreeMap;
use std::fmt;

/// Every tool a chain can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToolKind {
    /// Yosys synthesis.
    Yosys,
    /// VPR pack, place and route.
    Vpr,
    /// nextpnr place and route.
    Nextpnr,
    /// Yosys JSON to FPGA interchange logical netlist.
    InterchangeNetlist,
    /// FPGA interchange physical netlist to FASM.
    InterchangeFasm,
    /// VPR's FASM writer.
    Genfasm,
    /// FASM to Xilinx bitstream.
    Xcfasm,
    /// Symbiflow pack, place, route and FASM wrapper scripts.
    SymbiflowPnr,
    /// Symbiflow bitstream writer.
    SymbiflowBitstream,
}

impl Variant for ToolKind {
    const WHAT: &'static str = "tool";
    const KEY: &'static str = "tool";
    const ALL: &'static [Self] = &[
        Self::Yosys,
        Self::Vpr,
        Self::Nextpnr,
        Self::InterchangeNetlist,
        Self::InterchangeFasm,
        Self::Genfasm,
        Self::Xcfasm,
        Self::SymbiflowPnr,
        Self::SymbiflowBitstream,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Yosys => "yosys",
            Self::Vpr => "vpr",
            Self::Nextpnr => "nextpnr",
            Self::InterchangeNetlist => "interchange_netlist",
            Self::InterchangeFasm => "interchange_fasm",
            Self::Genfasm => "genfasm",
            Self::Xcfasm => "xcfasm",
            Self::SymbiflowPnr => "symbiflow_pnr",
            Self::SymbiflowBitstream => "symbiflow_bitstream",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The identity of one stage instance: its tool and its position in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageId {
    /// The tool the stage runs.
    pub tool: ToolKind,
    /// The index of the stage's template in the chain.
    pub position: usize,
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tool, self.position)
    }
}

/// One shell command template.
///
/// Words may contain generation-time (`@NAME@`) and execution-time
/// (`${NAME}`) placeholders. Empty words are dropped when rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    words: Vec<String>,
}

impl Command {
    /// Starts a command with the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            words: vec![program.into()],
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.words.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.words.extend(args.into_iter().map(Into::into));
        self
    }

    /// Appends `flag value` when `value` is present.
    pub fn opt(self, flag: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.arg(flag).arg(v),
            None => self,
        }
    }

    /// Returns the words of the command.
    pub fn words(&self) -> &[String] {
        &self.words
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for word in self.words.iter().filter(|w| !w.is_empty()) {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(word)?;
            first = false;
        }
        Ok(())
    }
}

/// One build step: the files it produces, the files it reads, and the
/// commands that produce them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Step {
    /// Artifacts produced by the step.
    pub targets: Vec<String>,
    /// Artifacts the step reads.
    pub depends: Vec<String>,
    /// Commands run in order.
    pub commands: Vec<Command>,
}

/// Everything a stage contributes to the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageOutput {
    /// Build steps, in order.
    pub steps: Vec<Step>,
    /// Artifacts handed to successor stages, in order.
    pub exports: Vec<String>,
    /// Generation-time bindings (`@NAME@`).
    pub generation: Vec<(String, String)>,
    /// Execution-time bindings, emitted as exports.
    pub environment: Vec<(String, String)>,
    /// Environment variables that must be set before the build runs, with
    /// the message shown when they are not.
    pub guards: Vec<(String, String)>,
}

impl StageOutput {
    /// Creates an empty output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step.
    pub fn add(&mut self, commands: Vec<Command>, targets: Vec<String>, depends: Vec<String>) {
        self.steps.push(Step {
            targets,
            depends,
            commands,
        });
    }

    /// Binds a generation-time variable.
    pub fn add_gen_var(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.generation.push((name.into(), value.into()));
    }

    /// Binds an execution-time variable.
    pub fn add_env_var(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.environment.push((name.into(), value.into()));
    }

    /// Requires an environment variable to be set when the build runs.
    pub fn require_env(&mut self, name: impl Into<String>, message: impl Into<String>) {
        self.guards.push((name.into(), message.into()));
    }

    /// Sets the artifacts handed to successor stages.
    pub fn set_exports<I, S>(&mut self, exports: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exports = exports.into_iter().map(Into::into).collect();
    }

    /// Rejects a partially-formed output.
    pub fn check(&self, stage: StageId, inputs: &[String]) -> Result<(), FlowError> {
        let incomplete = |reason: String| FlowError::IncompleteStage {
            stage: stage.to_string(),
            reason,
        };
        if self.steps.is_empty() {
            return Err(incomplete("no build steps".to_string()));
        }
        for (index, step) in self.steps.iter().enumerate() {
            if step.targets.is_empty() {
                return Err(incomplete(format!("step {index} declares no targets")));
            }
            if step.commands.is_empty() {
                return Err(incomplete(format!("step {index} has no commands")));
            }
        }
        for export in &self.exports {
            let produced = self.steps.iter().any(|s| s.targets.contains(export));
            if !produced && !inputs.contains(export) {
                return Err(incomplete(format!(
                    "exports '{export}', which is neither a target nor an input"
                )));
            }
        }
        Ok(())
    }
}

/// What an adapter sees when configuring one stage.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    /// The job being compiled.
    pub job: &'a Job,
    /// The stage's merged options.
    pub options: &'a ResolvedOptions,
    /// Artifacts exported by the stage's predecessors, in order.
    pub inputs: &'a [String],
    /// The stage identity.
    pub stage: StageId,
}

impl<'a> StageContext<'a> {
    /// Returns a mandatory string option, attributing a miss to this stage.
    pub fn require_str(&self, key: &str) -> Result<&'a str, FlowError> {
        self.options
            .require_str(key)
            .map_err(|e| FlowError::from_config(e, self.stage.to_string()))
    }

    /// Returns an optional string option.
    pub fn get_str(&self, key: &str) -> Result<Option<&'a str>, FlowError> {
        self.options
            .get_str(key)
            .map_err(|e| FlowError::from_config(e, self.stage.to_string()))
    }

    /// Returns a boolean option, `false` when absent.
    pub fn flag(&self, key: &str) -> Result<bool, FlowError> {
        self.options
            .flag(key)
            .map_err(|e| FlowError::from_config(e, self.stage.to_string()))
    }

    /// Returns an option as command-line words.
    pub fn words(&self, key: &str) -> Vec<String> {
        self.options.words(key)
    }

    /// Parses a variant from this stage's options.
    pub fn variant<V: Variant>(&self) -> Result<V, FlowError> {
        V::parse(self.require_str(V::KEY)?)
    }

    /// Returns the first input with the given extension.
    pub fn input(&self, ext: &'static str) -> Result<&'a str, FlowError> {
        self.inputs
            .iter()
            .find(|name| name.rsplit_once('.').is_some_and(|(_, e)| e == ext))
            .map(String::as_str)
            .ok_or_else(|| FlowError::MissingInput {
                stage: self.stage.to_string(),
                kind: ext,
            })
    }
}

/// A pluggable tool stage.
pub trait ToolAdapter: Send + Sync {
    /// The tool this adapter implements.
    fn kind(&self) -> ToolKind;

    /// Option defaults, merged at the lowest scope.
    fn defaults(&self) -> OptionMap {
        OptionMap::new()
    }

    /// Options that must be set before [`configure`](Self::configure) runs.
    fn required_options(&self) -> &'static [&'static str] {
        &[]
    }

    /// Produces the stage's steps and bindings.
    fn configure(&self, ctx: &StageContext<'_>) -> Result<StageOutput, FlowError>;
}

/// The set of adapters available to the builder, keyed by tool.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<ToolKind, Box<dyn ToolAdapter>>,
}

impl AdapterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter, replacing any previous one for the same tool.
    pub fn register(&mut self, adapter: Box<dyn ToolAdapter>) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    /// Returns the adapter for `tool`.
    pub fn get(&self, tool: ToolKind) -> Result<&dyn ToolAdapter, FlowError> {
        self.adapters
            .get(&tool)
            .map(Box::as_ref)
            .ok_or_else(|| FlowError::UnsupportedVariant {
                what: "tool",
                value: tool.name().to_string(),
                expected: self
                    .adapters
                    .keys()
                    .map(|k| k.name())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// Returns the registered tools in order.
    pub fn kinds(&self) -> impl Iterator<Item = ToolKind> + '_ {
        self.adapters.keys().copied()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.adapters.keys()).finish()
    }
}
