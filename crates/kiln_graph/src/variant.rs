//! Closed enumerations for option values that select a branch of a flow.
//!
//! Every selection goes through [`Variant::parse`], which either returns one
//! of the listed variants or fails with [`FlowError::UnsupportedVariant`].
//! There is no fallback value.

use crate::error::FlowError;
use kiln_config::ResolvedOptions;
use std::fmt;

/// A closed set of named choices selected by one option key.
pub trait Variant: Copy + Eq + fmt::Debug + 'static {
    /// Human-readable description used in error messages.
    const WHAT: &'static str;
    /// The option key holding the selection.
    const KEY: &'static str;
    /// Every variant, in the order they are listed to the user.
    const ALL: &'static [Self];

    /// The canonical name of this variant.
    fn name(self) -> &'static str;

    /// Alternative spellings accepted by [`parse`](Self::parse).
    fn aliases(self) -> &'static [&'static str] {
        &[]
    }

    /// Parses a value, failing on anything not listed.
    fn parse(value: &str) -> Result<Self, FlowError> {
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.name() == value || v.aliases().contains(&value))
            .ok_or_else(|| FlowError::UnsupportedVariant {
                what: Self::WHAT,
                value: value.to_string(),
                expected: Self::ALL
                    .iter()
                    .map(|v| v.name())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// Reads and parses the selection from resolved options.
    fn from_options(options: &ResolvedOptions) -> Result<Self, FlowError> {
        Self::parse(options.require_str(Self::KEY)?)
    }
}

/// Place-and-route engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PnrEngine {
    /// VPR (Verilog-to-Routing).
    Vpr,
    /// nextpnr.
    Nextpnr,
}

impl Variant for PnrEngine {
    const WHAT: &'static str = "place-and-route engine";
    const KEY: &'static str = "pnr";
    const ALL: &'static [Self] = &[Self::Vpr, Self::Nextpnr];

    fn name(self) -> &'static str {
        match self {
            Self::Vpr => "vpr",
            Self::Nextpnr => "nextpnr",
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Vpr => &["vtr"],
            Self::Nextpnr => &[],
        }
    }
}

/// Target architecture description used by the place-and-route stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    /// Native Xilinx 7-series database.
    Xilinx,
    /// The FPGA interchange format, which needs an extra netlist translation.
    FpgaInterchange,
}

impl Variant for Arch {
    const WHAT: &'static str = "architecture";
    const KEY: &'static str = "arch";
    const ALL: &'static [Self] = &[Self::Xilinx, Self::FpgaInterchange];

    fn name(self) -> &'static str {
        match self {
            Self::Xilinx => "xilinx",
            Self::FpgaInterchange => "fpga_interchange",
        }
    }
}

/// Device vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    /// Xilinx (AMD).
    Xilinx,
    /// QuickLogic.
    Quicklogic,
}

impl Variant for Vendor {
    const WHAT: &'static str = "vendor";
    const KEY: &'static str = "vendor";
    const ALL: &'static [Self] = &[Self::Xilinx, Self::Quicklogic];

    fn name(self) -> &'static str {
        match self {
            Self::Xilinx => "xilinx",
            Self::Quicklogic => "quicklogic",
        }
    }
}

/// Xilinx 7-series device family, derived from the part number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceFamily {
    /// Artix-7 (`xc7a…`).
    Artix7,
    /// Kintex-7 (`xc7k…`).
    Kintex7,
    /// Spartan-7 (`xc7s…`).
    Spartan7,
    /// Zynq-7000 (`xc7z…`).
    Zynq7,
}

impl DeviceFamily {
    const PREFIXES: &'static [(&'static str, DeviceFamily)] = &[
        ("xc7a", Self::Artix7),
        ("xc7k", Self::Kintex7),
        ("xc7s", Self::Spartan7),
        ("xc7z", Self::Zynq7),
    ];

    /// Determines the family from a part number such as `xc7a35tcpg236-1`.
    pub fn from_part(part: &str) -> Result<Self, FlowError> {
        let lower = part.to_ascii_lowercase();
        Self::PREFIXES
            .iter()
            .find(|(prefix, _)| lower.starts_with(prefix))
            .map(|(_, family)| *family)
            .ok_or_else(|| FlowError::UnsupportedVariant {
                what: "device family of part",
                value: part.to_string(),
                expected: Self::PREFIXES
                    .iter()
                    .map(|(p, _)| format!("{p}*"))
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// The device type name used by the bitstream tools.
    pub fn device_type(self) -> &'static str {
        match self {
            Self::Artix7 => "artix7",
            Self::Kintex7 => "kintex7",
            Self::Spartan7 => "spartan7",
            Self::Zynq7 => "zynq7",
        }
    }

    /// The family name used by the FPGA interchange tools. All supported
    /// families belong to the 7-series.
    pub fn interchange_family(self) -> &'static str {
        "xc7"
    }
}
