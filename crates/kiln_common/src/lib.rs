//! Shared foundational types used across the Kiln flow compiler.
//!
//! This crate provides the option value model shared by every configuration
//! scope and tool stage, and content hashing used to detect unchanged build
//! scripts.

#![warn(missing_docs)]

pub mod hash;
pub mod value;

pub use hash::ContentHash;
pub use value::{option_map, OptionMap, OptionValue};
