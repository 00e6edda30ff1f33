//! The Symbiflow flow.
//!
//! With `pnr = vpr` synthesis runs through the Symbiflow Tcl scripts and the
//! `symbiflow_*` wrappers do the rest, for Xilinx and QuickLogic parts.
//! With `pnr = nextpnr` (Xilinx only) nextpnr places and routes either
//! directly on the Xilinx database or through the FPGA interchange format.

use kiln_config::{FileKind, Job, ResolvedOptions};
use kiln_graph::{
    Arch, ChainSpec, CommandGraph, DeviceFamily, Flow, FlowError, PnrEngine, StageTemplate,
    Successors, ToolKind, Variant, Vendor,
};

/// Where the Symbiflow toolchain keeps its helper scripts.
const SCRIPTS: &str = "${INSTALL_DIR}/${FPGA_FAM}/install/share/symbiflow/scripts";

/// Device naming derived from `vendor`, `part` and `package`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Device {
    /// Passed to the bitstream writer with `-d`.
    device_type: String,
    /// Passed to the wrappers with `-P`/`-p`.
    partname: String,
    /// Architecture directory name, passed to the wrappers with `-d`.
    device_name: String,
}

impl Device {
    fn derive(vendor: Vendor, part: &str, package: &str) -> Result<Self, FlowError> {
        match vendor {
            Vendor::Xilinx => {
                let family = DeviceFamily::from_part(part)?;
                // The 35t parts share the 50t database.
                let db_part = if part == "xc7a35t" { "xc7a50t" } else { part };
                Ok(Self {
                    device_type: family.device_type().to_string(),
                    partname: format!("{part}{package}"),
                    device_name: format!("{db_part}_test"),
                })
            }
            Vendor::Quicklogic => {
                let device_name = format!("{part}_wlcsp");
                Ok(Self {
                    device_type: device_name.clone(),
                    partname: package.to_string(),
                    device_name,
                })
            }
        }
    }

    fn from_options(options: &ResolvedOptions) -> Result<Self, FlowError> {
        Self::derive(
            Vendor::from_options(options)?,
            options.require_str("part")?,
            options.require_str("package")?,
        )
    }
}

/// The Symbiflow flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct Symbiflow;

impl Symbiflow {
    fn vpr_chain(device: &Device, job: &Job) -> ChainSpec {
        let top = job.toplevel.as_str();
        ChainSpec::new()
            .stage(
                StageTemplate::new(ToolKind::Yosys)
                    .then(ToolKind::SymbiflowPnr)
                    .with_option("artifact_stem", top)
                    .with_option("output_format", "eblif")
                    .with_option("yosys_template", "@SYMBIFLOW_SCRIPTS@/${FPGA_FAM}/synth.tcl")
                    .with_option("split_io_script", "@SYMBIFLOW_SCRIPTS@/split_inouts.py")
                    .with_option("conv_template", "@SYMBIFLOW_SCRIPTS@/${FPGA_FAM}/conv.tcl"),
            )
            .stage(
                StageTemplate::new(ToolKind::SymbiflowPnr)
                    .then(ToolKind::SymbiflowBitstream)
                    .with_option("artifact_stem", top)
                    .with_option("device_name", device.device_name.as_str())
                    .with_option("partname", device.partname.as_str()),
            )
            .stage(
                StageTemplate::new(ToolKind::SymbiflowBitstream)
                    .with_option("device_type", device.device_type.as_str())
                    .with_option("partname", device.partname.as_str()),
            )
    }

    fn nextpnr_chain(options: &ResolvedOptions) -> Result<ChainSpec, FlowError> {
        let vendor = Vendor::from_options(options)?;
        if vendor != Vendor::Xilinx {
            return Err(FlowError::UnsupportedVariant {
                what: "vendor for nextpnr",
                value: vendor.name().to_string(),
                expected: Vendor::Xilinx.name().to_string(),
            });
        }
        Arch::from_options(options)?;
        let device = Device::from_options(options)?;

        Ok(ChainSpec::new()
            .stage(
                StageTemplate::new(ToolKind::Yosys)
                    .branch(Successors::ByArch {
                        xilinx: vec![ToolKind::Nextpnr],
                        fpga_interchange: vec![ToolKind::InterchangeNetlist],
                    })
                    .with_option("output_format", "json")
                    .with_option("synth_arch", vendor.name()),
            )
            .stage(StageTemplate::new(ToolKind::InterchangeNetlist).then(ToolKind::Nextpnr))
            .stage(StageTemplate::new(ToolKind::Nextpnr).branch(Successors::ByArch {
                xilinx: vec![ToolKind::SymbiflowBitstream],
                fpga_interchange: vec![ToolKind::InterchangeFasm],
            }))
            .stage(StageTemplate::new(ToolKind::InterchangeFasm).then(ToolKind::SymbiflowBitstream))
            .stage(
                StageTemplate::new(ToolKind::SymbiflowBitstream)
                    .with_option("device_type", device.device_type.as_str())
                    .with_option("partname", device.partname.as_str()),
            ))
    }

    /// Exports read by the Symbiflow synthesis scripts.
    fn environment(
        device: &Device,
        options: &ResolvedOptions,
        job: &Job,
    ) -> Result<Vec<(&'static str, String)>, FlowError> {
        let top = &job.toplevel;
        Ok(vec![
            ("EDALIZE_VENDOR", Vendor::from_options(options)?.name().to_string()),
            ("EDALIZE_PART", options.require_str("part")?.to_string()),
            ("USE_ROI", "FALSE".to_string()),
            (
                "TECHMAP_PATH",
                "${INSTALL_DIR}/${FPGA_FAM}/install/share/symbiflow/techmaps/xc7_vpr/techmap"
                    .to_string(),
            ),
            ("OUT_SDC", format!("{top}.sdc")),
            ("TOP", top.clone()),
            ("INPUT_XDC_FILES", job.file_names_of(&[FileKind::Xdc]).join(" ")),
            ("DATABASE_DIR", "$(shell prjxray-config)".to_string()),
            (
                "PART_JSON",
                format!(
                    "$(realpath ${{DATABASE_DIR}}/{}/{}/part.json)",
                    device.device_type, device.partname
                ),
            ),
            ("OUT_FASM_EXTRA", format!("{top}_fasm_extra.fasm")),
            ("OUT_SYNTH_V", format!("{top}_synth.v")),
            ("UTILS_PATH", "@SYMBIFLOW_SCRIPTS@".to_string()),
            ("OUT_JSON", format!("{top}.json")),
            ("OUT_EBLIF", format!("{top}.eblif")),
            ("PYTHON3", "python3".to_string()),
        ])
    }
}

impl Flow for Symbiflow {
    fn name(&self) -> &'static str {
        "symbiflow"
    }

    fn required_options(&self) -> &'static [&'static str] {
        &["part", "package", "vendor", "pnr"]
    }

    fn chain(&self, options: &ResolvedOptions, job: &Job) -> Result<ChainSpec, FlowError> {
        match PnrEngine::from_options(options)? {
            PnrEngine::Vpr => Ok(Self::vpr_chain(&Device::from_options(options)?, job)),
            PnrEngine::Nextpnr => Self::nextpnr_chain(options),
        }
    }

    fn prepare(
        &self,
        graph: &mut CommandGraph,
        options: &ResolvedOptions,
        job: &Job,
    ) -> Result<(), FlowError> {
        if PnrEngine::from_options(options)? != PnrEngine::Vpr {
            return Ok(());
        }
        let device = Device::from_options(options)?;
        graph.require_env("INSTALL_DIR", "It should point at the Symbiflow toolchain install")?;
        graph.require_env("FPGA_FAM", "It should name the device family, e.g. xc7")?;
        graph.define("SYMBIFLOW_SCRIPTS", SCRIPTS, self.name())?;
        for (name, value) in Self::environment(&device, options, job)? {
            graph.export(name, value, self.name())?;
        }
        Ok(())
    }
}
