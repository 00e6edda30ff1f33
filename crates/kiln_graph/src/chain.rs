//! Declarative stage chains and reachability planning.
//!
//! A [`ChainSpec`] is an ordered list of [`StageTemplate`]s. The first
//! template is the entry; each template names its successors, either
//! unconditionally or through an exhaustive branch on one variant option.
//! [`ChainSpec::plan`] resolves the branches for one set of options and
//! returns the reachable stages in dependency order.

use crate::adapter::ToolKind;
use crate::error::FlowError;
use crate::variant::{Arch, PnrEngine, Variant, Vendor};
use kiln_common::{OptionMap, OptionValue};
use kiln_config::{ResolvedOptions, Scope};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// The stages that follow a template.
///
/// Branches name every variant of their selector, so every combination of
/// options maps to exactly one successor list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Successors {
    /// The stage ends the chain.
    Terminal,
    /// Unconditional successors.
    Next(Vec<ToolKind>),
    /// Chosen by the `pnr` option.
    ByPnr {
        /// Successors when `pnr = vpr`.
        vpr: Vec<ToolKind>,
        /// Successors when `pnr = nextpnr`.
        nextpnr: Vec<ToolKind>,
    },
    /// Chosen by the `arch` option.
    ByArch {
        /// Successors when `arch = xilinx`.
        xilinx: Vec<ToolKind>,
        /// Successors when `arch = fpga_interchange`.
        fpga_interchange: Vec<ToolKind>,
    },
    /// Chosen by the `vendor` option.
    ByVendor {
        /// Successors when `vendor = xilinx`.
        xilinx: Vec<ToolKind>,
        /// Successors when `vendor = quicklogic`.
        quicklogic: Vec<ToolKind>,
    },
}

impl Successors {
    /// Selects the successor list for `options`.
    ///
    /// Only the selector of this branch is read.
    pub fn resolve(&self, options: &ResolvedOptions) -> Result<&[ToolKind], FlowError> {
        let next = match self {
            Self::Terminal => return Ok(&[]),
            Self::Next(next) => next,
            Self::ByPnr { vpr, nextpnr } => match PnrEngine::from_options(options)? {
                PnrEngine::Vpr => vpr,
                PnrEngine::Nextpnr => nextpnr,
            },
            Self::ByArch {
                xilinx,
                fpga_interchange,
            } => match Arch::from_options(options)? {
                Arch::Xilinx => xilinx,
                Arch::FpgaInterchange => fpga_interchange,
            },
            Self::ByVendor { xilinx, quicklogic } => match Vendor::from_options(options)? {
                Vendor::Xilinx => xilinx,
                Vendor::Quicklogic => quicklogic,
            },
        };
        Ok(next.as_slice())
    }

    /// Every tool named in any branch.
    fn all(&self) -> Vec<ToolKind> {
        match self {
            Self::Terminal => Vec::new(),
            Self::Next(next) => next.clone(),
            Self::ByPnr { vpr: a, nextpnr: b }
            | Self::ByArch {
                xilinx: a,
                fpga_interchange: b,
            }
            | Self::ByVendor {
                xilinx: a,
                quicklogic: b,
            } => a.iter().chain(b).copied().collect(),
        }
    }
}

/// One declared stage of a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTemplate {
    /// The tool the stage runs.
    pub tool: ToolKind,
    /// What follows the stage.
    pub successors: Successors,
    /// Options that apply to this stage only, merged at node scope.
    pub overrides: OptionMap,
}

impl StageTemplate {
    /// A terminal stage with no overrides.
    pub fn new(tool: ToolKind) -> Self {
        Self {
            tool,
            successors: Successors::Terminal,
            overrides: OptionMap::new(),
        }
    }

    /// Appends an unconditional successor.
    pub fn then(mut self, tool: ToolKind) -> Self {
        match &mut self.successors {
            Successors::Next(next) => next.push(tool),
            other => *other = Successors::Next(vec![tool]),
        }
        self
    }

    /// Replaces the successors with a branch.
    pub fn branch(mut self, successors: Successors) -> Self {
        self.successors = successors;
        self
    }

    /// Adds a stage-local option override.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }
}

/// A reachable stage, as returned by [`ChainSpec::plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStage {
    /// Index of the stage's template in the chain.
    pub position: usize,
    /// Positions of the stages feeding this one, in declared order.
    pub predecessors: Vec<usize>,
}

/// An ordered list of stage templates; the first one is the entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainSpec {
    stages: Vec<StageTemplate>,
}

impl ChainSpec {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a template.
    pub fn stage(mut self, template: StageTemplate) -> Self {
        self.stages.push(template);
        self
    }

    /// The templates in declared order.
    pub fn stages(&self) -> &[StageTemplate] {
        &self.stages
    }

    /// The position of the template running `tool`.
    pub fn position(&self, tool: ToolKind) -> Option<usize> {
        self.stages.iter().position(|s| s.tool == tool)
    }

    /// Checks that the chain is non-empty, names each tool once, and only
    /// refers to tools it declares.
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.stages.is_empty() {
            return Err(FlowError::EmptyGraph);
        }
        let mut seen = BTreeSet::new();
        for template in &self.stages {
            if !seen.insert(template.tool) {
                return Err(FlowError::InvalidChain(format!(
                    "tool '{}' appears more than once",
                    template.tool
                )));
            }
        }
        for template in &self.stages {
            if let Some(missing) = template.successors.all().into_iter().find(|t| !seen.contains(t)) {
                return Err(FlowError::InvalidChain(format!(
                    "'{}' is followed by '{missing}', which the chain does not declare",
                    template.tool
                )));
            }
        }
        Ok(())
    }

    /// Resolves branches against `options` and returns the reachable stages
    /// in dependency order.
    ///
    /// Branch selectors of unreachable stages are never read.
    pub fn plan(&self, options: &ResolvedOptions) -> Result<Vec<PlannedStage>, FlowError> {
        self.validate()?;

        let mut reachable = BTreeSet::from([0]);
        let mut queue = VecDeque::from([0]);
        let mut edges = BTreeSet::new();
        while let Some(pos) = queue.pop_front() {
            let template = &self.stages[pos];
            let local = options.layered(Scope::Node, &template.overrides);
            for &tool in template.successors.resolve(&local)? {
                let next = self.position(tool).ok_or_else(|| {
                    FlowError::InvalidChain(format!("unknown successor '{tool}'"))
                })?;
                edges.insert((pos, next));
                if reachable.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        for (pos, template) in self.stages.iter().enumerate() {
            if !reachable.contains(&pos) {
                log::debug!("stage '{}' is not reachable with these options", template.tool);
            }
        }

        let mut graph = DiGraph::<usize, ()>::new();
        let index: BTreeMap<usize, NodeIndex> =
            reachable.iter().map(|&pos| (pos, graph.add_node(pos))).collect();
        for (from, to) in &edges {
            graph.add_edge(index[from], index[to], ());
        }

        let order = toposort(&graph, None).map_err(|cycle| {
            FlowError::InvalidChain(format!(
                "cycle through '{}'",
                self.stages[graph[cycle.node_id()]].tool
            ))
        })?;

        Ok(order
            .into_iter()
            .map(|node| {
                let mut predecessors: Vec<usize> = graph
                    .neighbors_directed(node, Direction::Incoming)
                    .map(|p| graph[p])
                    .collect();
                predecessors.sort_unstable();
                PlannedStage {
                    position: graph[node],
                    predecessors,
                }
            })
            .collect())
    }
}
