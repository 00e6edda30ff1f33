//! Complete flows built from the adapters in this crate.

pub mod f4pga;
pub mod symbiflow;

pub use f4pga::F4pga;
pub use symbiflow::Symbiflow;
