//! nextpnr place and route, for the `xilinx` and `fpga_interchange` arches.

use crate::stem;
use kiln_config::FileKind;
use kiln_graph::{
    Arch, Command, FlowError, StageContext, StageOutput, ToolAdapter, ToolKind, Variant,
};

/// The nextpnr adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Nextpnr;

impl ToolAdapter for Nextpnr {
    fn kind(&self) -> ToolKind {
        ToolKind::Nextpnr
    }

    fn required_options(&self) -> &'static [&'static str] {
        &["arch"]
    }

    fn configure(&self, ctx: &StageContext<'_>) -> Result<StageOutput, FlowError> {
        let arch: Arch = ctx.variant()?;
        let stem = stem(ctx)?;
        let missing = |kind| FlowError::MissingInput {
            stage: ctx.stage.to_string(),
            kind,
        };

        let mut depends = Vec::new();
        let chipdb = match ctx.get_str("chipdb")? {
            Some(path) => path.to_string(),
            None => {
                let file = ctx
                    .job
                    .file_names_of(&[FileKind::Bba])
                    .into_iter()
                    .next()
                    .ok_or_else(|| missing("bba"))?;
                depends.push(file.clone());
                file
            }
        };
        let xdc = ctx.job.file_names_of(&[FileKind::Xdc]);
        if xdc.is_empty() {
            return Err(missing("xdc"));
        }
        depends.extend(xdc.iter().cloned());

        let routed = format!("{stem}.routed.json");
        let mut cmd =
            Command::new(format!("nextpnr-{}", arch.name())).args(["--chipdb", chipdb.as_str()]);
        let mut out = StageOutput::new();

        match arch {
            Arch::Xilinx => {
                let json = ctx.input("json")?;
                let fasm = format!("{stem}.fasm");
                cmd = cmd
                    .args(xdc.iter().flat_map(|x| ["--xdc", x.as_str()]))
                    .args(["--json", json, "--write", routed.as_str()])
                    .args(["--fasm", fasm.as_str(), "--log", "nextpnr.log"]);
                depends.insert(0, json.to_string());
                out.add(
                    vec![cmd.args(ctx.words("nextpnr_options"))],
                    vec![fasm.clone(), routed],
                    depends,
                );
                out.set_exports([fasm]);
            }
            Arch::FpgaInterchange => {
                let netlist = ctx.input("netlist")?;
                let package = ctx.require_str("package")?;
                let package = package.split('-').next().unwrap_or(package);
                let phys = format!("{stem}.phys");
                cmd = cmd
                    .args(["--package", package])
                    .args(xdc.iter().flat_map(|x| ["--xdc", x.as_str()]))
                    .args(["--netlist", netlist, "--write", routed.as_str()])
                    .args(["--phys", phys.as_str()]);
                depends.insert(0, netlist.to_string());
                out.add(
                    vec![cmd.args(ctx.words("nextpnr_options"))],
                    vec![phys.clone(), routed],
                    depends,
                );
                out.set_exports([phys, netlist.to_string()]);
            }
        }
        Ok(out)
    }
}
