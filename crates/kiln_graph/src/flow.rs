//! The [`Flow`] contract and the [`compile`] driver.
//!
//! A flow decides which options it needs, where external option values come
//! from, and which chain to run for a given set of options. [`compile`] runs
//! the whole pipeline: resolve, plan, build, validate. Nothing is written.

use crate::adapter::{AdapterRegistry, ToolKind};
use crate::builder::GraphBuilder;
use crate::chain::ChainSpec;
use crate::error::FlowError;
use crate::graph::CommandGraph;
use crate::variant::Variant;
use kiln_common::OptionMap;
use kiln_config::{resolve, BoardDb, Job, ResolvedOptions};

/// A complete tool flow.
pub trait Flow {
    /// The flow name, as written in job files.
    fn name(&self) -> &'static str;

    /// Flow-level option defaults.
    fn option_defaults(&self) -> OptionMap {
        OptionMap::new()
    }

    /// Options that must be set once all scopes are merged.
    fn required_options(&self) -> &'static [&'static str] {
        &[]
    }

    /// Options looked up from external data such as the board database.
    /// They rank above defaults and below the job.
    fn external_options(&self, _job: &Job, _boards: &BoardDb) -> Result<OptionMap, FlowError> {
        Ok(OptionMap::new())
    }

    /// Constructs the chain for these options. Called once per compilation.
    fn chain(&self, options: &ResolvedOptions, job: &Job) -> Result<ChainSpec, FlowError>;

    /// Adds flow-wide bindings before any stage is built.
    fn prepare(
        &self,
        _graph: &mut CommandGraph,
        _options: &ResolvedOptions,
        _job: &Job,
    ) -> Result<(), FlowError> {
        Ok(())
    }

    /// Adds flow-wide bindings and targets after every stage is built.
    fn finish(
        &self,
        _graph: &mut CommandGraph,
        _options: &ResolvedOptions,
        _job: &Job,
    ) -> Result<(), FlowError> {
        Ok(())
    }
}

/// Compiles `job` with `flow` into a validated command graph.
pub fn compile(
    flow: &dyn Flow,
    job: &Job,
    boards: &BoardDb,
    registry: &AdapterRegistry,
) -> Result<CommandGraph, FlowError> {
    for tool in job.tool_options.keys() {
        ToolKind::parse(tool)?;
    }

    let external = flow.external_options(job, boards)?;
    let options = resolve(
        &flow.option_defaults(),
        &external,
        &job.flow_options,
        flow.required_options(),
    )?;
    let chain = flow.chain(&options, job)?;

    let mut graph = CommandGraph::new();
    graph.add_header(format!("job '{}' (flow {})", job.name, flow.name()));
    flow.prepare(&mut graph, &options, job)?;
    GraphBuilder::new(registry).build_onto(&mut graph, &chain, &options, job)?;
    flow.finish(&mut graph, &options, job)?;
    graph.validate(job)?;

    log::info!(
        "compiled job '{}' with flow {}: {} rule(s)",
        job.name,
        flow.name(),
        graph.nodes().len()
    );
    Ok(graph)
}
