//! The flow graph compiler.
//!
//! Turns a [`ChainSpec`] (a declarative, possibly branching sequence of tool
//! stages) plus resolved options into a [`CommandGraph`] of build rules, and
//! renders that graph as a GNU make script.
//!
//! The pieces, leaves first:
//!
//! - [`variant`]: closed enumerations for every option that selects a branch.
//! - [`adapter`]: the [`ToolAdapter`] contract each stage implements, and the
//!   [`AdapterRegistry`] the builder looks adapters up in.
//! - [`chain`]: stage templates and reachability planning.
//! - [`builder`]: instantiates stages into nodes and validates the result.
//! - [`graph`] and [`emit`]: the accumulated rules and bindings, and the
//!   script writer.
//! - [`flow`]: the [`Flow`] contract and the [`compile`] driver tying the
//!   stages together.
//!
//! Generation-time variables are written `@NAME@` and are substituted by the
//! emitter. Execution-time variables (`${NAME}`) are exported and never
//! expanded here.

#![warn(missing_docs)]

pub mod adapter;
pub mod builder;
pub mod chain;
pub mod emit;
pub mod error;
pub mod flow;
pub mod graph;
pub mod template;
pub mod variant;

pub use adapter::{AdapterRegistry, Command, StageContext, StageId, StageOutput, Step, ToolAdapter, ToolKind};
pub use builder::GraphBuilder;
pub use chain::{ChainSpec, PlannedStage, StageTemplate, Successors};
pub use emit::{render, write, WriteOutcome, LAUNCHER_VAR};
pub use error::FlowError;
pub use flow::{compile, Flow};
pub use graph::{AuxTarget, Binding, CommandGraph, EnvGuard, Node, NodeId};
pub use variant::{Arch, DeviceFamily, PnrEngine, Variant, Vendor};
