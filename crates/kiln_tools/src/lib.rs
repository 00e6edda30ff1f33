//! Tool adapters and flows for open-source FPGA toolchains.
//!
//! Each adapter module turns one tool (Yosys, VPR, nextpnr, the FPGA
//! interchange converters, the FASM and bitstream writers) into build steps.
//! The [`flows`] module combines them into the F4PGA and Symbiflow flows.
//! [`configure`] is the one-call entry point: it compiles a job and writes
//! `<work_root>/Makefile`.

#![warn(missing_docs)]

pub mod fasm;
pub mod flows;
pub mod interchange;
pub mod nextpnr;
pub mod symbiflow;
pub mod vpr;
pub mod yosys;

use kiln_config::{BoardDb, Job};
use kiln_graph::{
    compile, write, AdapterRegistry, CommandGraph, Flow, FlowError, StageContext, Variant,
    WriteOutcome,
};
use std::path::{Path, PathBuf};

pub use flows::{F4pga, Symbiflow};

/// Name of the script written by [`configure`].
pub const SCRIPT_NAME: &str = "Makefile";

/// The flows a job can select with its `flow` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
    /// Yosys with VPR or nextpnr for Xilinx 7-series boards.
    F4pga,
    /// The Symbiflow wrapper scripts, for Xilinx and QuickLogic parts.
    Symbiflow,
}

impl Variant for FlowKind {
    const WHAT: &'static str = "flow";
    const KEY: &'static str = "flow";
    const ALL: &'static [Self] = &[Self::F4pga, Self::Symbiflow];

    fn name(self) -> &'static str {
        match self {
            Self::F4pga => "f4pga",
            Self::Symbiflow => "symbiflow",
        }
    }
}

/// Returns the flow implementation for `kind`.
pub fn flow_for(kind: FlowKind) -> Box<dyn Flow> {
    match kind {
        FlowKind::F4pga => Box::new(F4pga),
        FlowKind::Symbiflow => Box::new(Symbiflow),
    }
}

/// Returns a registry with every adapter in this crate.
pub fn default_registry() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    registry.register(Box::new(yosys::Yosys));
    registry.register(Box::new(vpr::Vpr));
    registry.register(Box::new(nextpnr::Nextpnr));
    registry.register(Box::new(interchange::InterchangeNetlist));
    registry.register(Box::new(interchange::InterchangeFasm));
    registry.register(Box::new(fasm::Genfasm));
    registry.register(Box::new(fasm::Xcfasm));
    registry.register(Box::new(symbiflow::SymbiflowPnr));
    registry.register(Box::new(symbiflow::SymbiflowBitstream));
    registry
}

/// Compiles `job` with the flow it names.
pub fn compile_job(job: &Job, boards: &BoardDb) -> Result<CommandGraph, FlowError> {
    let kind = FlowKind::parse(&job.flow)?;
    let flow = flow_for(kind);
    compile(flow.as_ref(), job, boards, &default_registry())
}

/// Compiles `job` and writes the script to `<work_root>/Makefile`.
///
/// On any error nothing is written.
pub fn configure(
    job: &Job,
    boards: &BoardDb,
    work_root: &Path,
) -> Result<(PathBuf, WriteOutcome), FlowError> {
    let graph = compile_job(job, boards)?;
    let path = work_root.join(SCRIPT_NAME);
    let outcome = write(&graph, &path)?;
    Ok((path, outcome))
}

/// The stem most artifacts of a stage are named after: the
/// `artifact_stem` option, or the job name.
pub(crate) fn stem<'a>(ctx: &StageContext<'a>) -> Result<&'a str, FlowError> {
    Ok(ctx.get_str("artifact_stem")?.unwrap_or(ctx.job.name.as_str()))
}
