//! Converters between Yosys JSON, the FPGA interchange netlists and FASM.
//!
//! Both run the `fpga_interchange` Python package and need
//! `INTERCHANGE_SCHEMA_PATH` at build time.

use crate::stem;
use kiln_common::{option_map, OptionMap};
use kiln_config::FileKind;
use kiln_graph::{
    Command, DeviceFamily, FlowError, StageContext, StageOutput, ToolAdapter, ToolKind,
};

/// Environment variable pointing at the interchange schema directory.
pub const SCHEMA_VAR: &str = "INTERCHANGE_SCHEMA_PATH";

fn require_schema(out: &mut StageOutput) {
    out.require_env(
        SCHEMA_VAR,
        "It should be set to <fpga-interchange-schema path>/interchange",
    );
}

fn device_file(ctx: &StageContext<'_>) -> Result<String, FlowError> {
    ctx.job
        .file_names_of(&[FileKind::Device])
        .into_iter()
        .next()
        .ok_or_else(|| FlowError::MissingInput {
            stage: ctx.stage.to_string(),
            kind: "device",
        })
}

fn python_module(ctx: &StageContext<'_>, module: &str) -> Result<Command, FlowError> {
    Ok(Command::new(ctx.require_str("python")?)
        .args(["-m", module])
        .arg("--schema_dir")
        .arg(format!("$({SCHEMA_VAR})")))
}

/// Yosys JSON to interchange logical netlist.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterchangeNetlist;

impl ToolAdapter for InterchangeNetlist {
    fn kind(&self) -> ToolKind {
        ToolKind::InterchangeNetlist
    }

    fn defaults(&self) -> OptionMap {
        option_map([("python", "python")])
    }

    fn configure(&self, ctx: &StageContext<'_>) -> Result<StageOutput, FlowError> {
        let json = ctx.input("json")?;
        let device = device_file(ctx)?;
        let netlist = format!("{}.netlist", stem(ctx)?);

        let mut out = StageOutput::new();
        require_schema(&mut out);
        out.add(
            vec![python_module(ctx, "fpga_interchange.yosys_json")?
                .args(["--device", device.as_str()])
                .args(["--top", ctx.job.toplevel.as_str()])
                .args([json, netlist.as_str()])],
            vec![netlist.clone()],
            vec![json.to_string(), device],
        );
        out.set_exports([netlist]);
        Ok(out)
    }
}

/// Interchange physical netlist to FASM.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterchangeFasm;

impl ToolAdapter for InterchangeFasm {
    fn kind(&self) -> ToolKind {
        ToolKind::InterchangeFasm
    }

    fn defaults(&self) -> OptionMap {
        option_map([("python", "python")])
    }

    fn required_options(&self) -> &'static [&'static str] {
        &["part"]
    }

    fn configure(&self, ctx: &StageContext<'_>) -> Result<StageOutput, FlowError> {
        let phys = ctx.input("phys")?;
        let netlist = ctx.input("netlist")?;
        let family = DeviceFamily::from_part(ctx.require_str("part")?)?;
        let device = device_file(ctx)?;
        let fasm = format!("{}.fasm", stem(ctx)?);

        let mut out = StageOutput::new();
        require_schema(&mut out);
        out.add(
            vec![python_module(ctx, "fpga_interchange.fasm_generator")?
                .args(["--family", family.interchange_family()])
                .args([device.as_str(), netlist, phys, fasm.as_str()])],
            vec![fasm.clone()],
            vec![phys.to_string(), netlist.to_string(), device],
        );
        out.set_exports([fasm]);
        Ok(out)
    }
}
