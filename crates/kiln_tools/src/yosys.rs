//! Yosys synthesis.
//!
//! Two modes. Direct mode runs `synth_<arch>` and writes the netlist in
//! one call. Template mode sources a Tcl script, which reads its settings
//! from the environment, and can follow it with the split-inouts and
//! conversion passes the Xilinx VPR flow needs.

use crate::stem;
use kiln_common::{option_map, OptionMap};
use kiln_config::FileKind;
use kiln_graph::{Command, FlowError, StageContext, StageOutput, ToolAdapter, ToolKind, Variant};

/// Netlist format written by synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// Yosys JSON, read by nextpnr.
    Json,
    /// Extended BLIF, read by VPR.
    Eblif,
    /// Plain BLIF.
    Blif,
    /// EDIF.
    Edif,
    /// Structural Verilog.
    Verilog,
}

impl Variant for OutputFormat {
    const WHAT: &'static str = "synthesis output format";
    const KEY: &'static str = "output_format";
    const ALL: &'static [Self] = &[
        Self::Json,
        Self::Eblif,
        Self::Blif,
        Self::Edif,
        Self::Verilog,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Eblif => "eblif",
            Self::Blif => "blif",
            Self::Edif => "edif",
            Self::Verilog => "verilog",
        }
    }
}

impl OutputFormat {
    /// File extension of the netlist.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Verilog => "v",
            other => other.name(),
        }
    }

    /// The Yosys command writing this format.
    fn writer(self) -> &'static str {
        match self {
            Self::Json => "write_json",
            Self::Eblif => "write_blif -attr -cname -param",
            Self::Blif => "write_blif",
            Self::Edif => "write_edif",
            Self::Verilog => "write_verilog",
        }
    }
}

/// The Yosys adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Yosys;

impl ToolAdapter for Yosys {
    fn kind(&self) -> ToolKind {
        ToolKind::Yosys
    }

    fn defaults(&self) -> OptionMap {
        option_map([("output_format", "json"), ("python", "python3")])
    }

    fn configure(&self, ctx: &StageContext<'_>) -> Result<StageOutput, FlowError> {
        if let Some(vhdl) = ctx.job.files.iter().find(|f| f.file_type.is_vhdl()) {
            return Err(FlowError::UnsupportedVariant {
                what: "source language for Yosys",
                value: format!("VHDL ({})", vhdl.name),
                expected: "Verilog, SystemVerilog".to_string(),
            });
        }
        let sources = ctx
            .job
            .file_names_of(&[FileKind::Verilog, FileKind::SystemVerilog]);
        if sources.is_empty() {
            return Err(FlowError::MissingInput {
                stage: ctx.stage.to_string(),
                kind: "Verilog",
            });
        }

        let format: OutputFormat = ctx.variant()?;
        let stem = stem(ctx)?;
        let netlist = format!("{stem}.{}", format.extension());
        let mut out = StageOutput::new();

        match ctx.get_str("yosys_template")? {
            None => {
                let arch = ctx.require_str("synth_arch")?;
                let synth = std::iter::once(format!("synth_{arch} -top {}", ctx.job.toplevel))
                    .chain(ctx.words("yosys_synth_options"))
                    .collect::<Vec<_>>()
                    .join(" ");
                out.add(
                    vec![Command::new("yosys")
                        .args(["-l", "yosys.log", "-p"])
                        .arg(format!("\"{synth}; {} {netlist}\"", format.writer()))
                        .args(sources.iter().cloned())],
                    vec![netlist.clone()],
                    sources,
                );
            }
            Some(template) => {
                let json = format!("{stem}.json");
                let split = ctx.get_str("split_io_script")?;
                if split.is_some() && format == OutputFormat::Json {
                    return Err(FlowError::UnsupportedVariant {
                        what: "output format after split-inouts",
                        value: format.name().to_string(),
                        expected: "eblif, blif, edif, verilog".to_string(),
                    });
                }
                let first = if split.is_some() { json.clone() } else { netlist.clone() };
                out.add(
                    vec![Command::new("yosys")
                        .arg("-p")
                        .arg(format!("\"tcl {template}\""))
                        .args(["-l".to_string(), format!("{stem}_synth.log")])
                        .args(ctx.words("yosys_synth_options"))
                        .args(sources.iter().cloned())],
                    vec![first],
                    sources,
                );
                if let Some(script) = split {
                    let conv = ctx.require_str("conv_template")?;
                    let io_json = format!("{stem}_io.json");
                    out.add(
                        vec![Command::new(ctx.require_str("python")?)
                            .arg(script)
                            .args(["-i", json.as_str(), "-o", io_json.as_str()])],
                        vec![io_json.clone()],
                        vec![json],
                    );
                    out.add(
                        vec![Command::new("yosys")
                            .arg("-p")
                            .arg(format!("\"read_json {io_json}; tcl {conv}\""))],
                        vec![netlist.clone()],
                        vec![io_json],
                    );
                }
            }
        }

        out.set_exports([netlist]);
        Ok(out)
    }
}
