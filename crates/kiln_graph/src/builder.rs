//! Instantiates a chain into command graph nodes.

use crate::adapter::{AdapterRegistry, StageContext, StageId};
use crate::chain::ChainSpec;
use crate::error::FlowError;
use crate::graph::{CommandGraph, Node, NodeId};
use crate::variant::Variant;
use kiln_config::{Job, ResolvedOptions, Scope};
use std::collections::{BTreeMap, BTreeSet};

/// Walks a [`ChainSpec`] and asks each stage's adapter for its build steps.
#[derive(Debug, Clone, Copy)]
pub struct GraphBuilder<'r> {
    registry: &'r AdapterRegistry,
}

impl<'r> GraphBuilder<'r> {
    /// Creates a builder over a set of adapters.
    pub fn new(registry: &'r AdapterRegistry) -> Self {
        Self { registry }
    }

    /// Builds a fresh graph for `chain` and validates it.
    pub fn build(
        &self,
        chain: &ChainSpec,
        options: &ResolvedOptions,
        job: &Job,
    ) -> Result<CommandGraph, FlowError> {
        let mut graph = CommandGraph::new();
        self.build_onto(&mut graph, chain, options, job)?;
        graph.validate(job)?;
        Ok(graph)
    }

    /// Appends the nodes and bindings of `chain` to an existing graph.
    ///
    /// Stages run in dependency order. Each stage receives the exports of its
    /// predecessors as inputs. The exports of every terminal stage (one that
    /// no reachable stage follows) become the default target, in plan order.
    /// The caller validates the finished graph.
    pub fn build_onto(
        &self,
        graph: &mut CommandGraph,
        chain: &ChainSpec,
        options: &ResolvedOptions,
        job: &Job,
    ) -> Result<(), FlowError> {
        let plan = chain.plan(options)?;
        let mut exports: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        let followed: BTreeSet<usize> = plan
            .iter()
            .flat_map(|p| p.predecessors.iter().copied())
            .collect();
        let mut default_target: Vec<String> = Vec::new();

        for planned in &plan {
            let template = &chain.stages()[planned.position];
            let stage = StageId {
                tool: template.tool,
                position: planned.position,
            };
            let adapter = self.registry.get(template.tool)?;

            let mut local = options.clone();
            local.merge_scope(Scope::Default, &adapter.defaults());
            if let Some(tool_options) = job.tool_options(template.tool.name()) {
                local.merge_scope(Scope::Job, tool_options);
            }
            local.merge_scope(Scope::Node, &template.overrides);
            local
                .check_required(adapter.required_options())
                .map_err(|e| FlowError::from_config(e, stage.to_string()))?;

            let inputs: Vec<String> = planned
                .predecessors
                .iter()
                .flat_map(|p| exports.get(p).into_iter().flatten().cloned())
                .collect();

            let ctx = StageContext {
                job,
                options: &local,
                inputs: &inputs,
                stage,
            };
            let output = adapter.configure(&ctx)?;
            output.check(stage, &inputs)?;
            log::debug!(
                "configured {stage} with {} step(s) from {} input(s)",
                output.steps.len(),
                inputs.len()
            );

            let origin = stage.to_string();
            for (name, value) in &output.generation {
                graph.define(name.clone(), value.clone(), origin.clone())?;
            }
            for (name, value) in &output.environment {
                graph.export(name.clone(), value.clone(), origin.clone())?;
            }
            for (name, message) in &output.guards {
                graph.require_env(name.clone(), message.clone())?;
            }
            for (step, s) in output.steps.into_iter().enumerate() {
                graph.push_node(Node {
                    id: NodeId { stage, step },
                    options: local.clone(),
                    targets: s.targets,
                    depends: s.depends,
                    commands: s.commands,
                })?;
            }

            if !followed.contains(&planned.position) {
                for export in &output.exports {
                    if !default_target.contains(export) {
                        default_target.push(export.clone());
                    }
                }
            }
            exports.insert(planned.position, output.exports);
        }

        if !default_target.is_empty() {
            graph.set_default_target(default_target);
        }
        log::info!("built {} stage(s) into {} rule(s)", plan.len(), graph.nodes().len());
        Ok(())
    }
}
