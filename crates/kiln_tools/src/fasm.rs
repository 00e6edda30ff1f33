//! FASM generation from a routed VPR design, and FASM to bitstream conversion
//! with Project X-Ray's `xcfasm`.

use crate::stem;
use kiln_config::FileKind;
use kiln_graph::{Command, FlowError, StageContext, StageOutput, ToolAdapter, ToolKind};

/// VPR's `genfasm`.
///
/// The FASM file is always named after the top module, which is what
/// `genfasm` writes regardless of the netlist name.
#[derive(Debug, Clone, Copy, Default)]
pub struct Genfasm;

impl ToolAdapter for Genfasm {
    fn kind(&self) -> ToolKind {
        ToolKind::Genfasm
    }

    fn required_options(&self) -> &'static [&'static str] {
        &["arch_xml", "genfasm_device"]
    }

    fn configure(&self, ctx: &StageContext<'_>) -> Result<StageOutput, FlowError> {
        let analysis = ctx.input("analysis")?;
        let eblif = match ctx.input("eblif") {
            Ok(name) => name.to_string(),
            Err(missing) => ctx
                .job
                .file_names_of(&[FileKind::Eblif])
                .into_iter()
                .next()
                .ok_or(missing)?,
        };
        let fasm = format!("{}.fasm", ctx.job.toplevel);

        let mut out = StageOutput::new();
        out.add(
            vec![Command::new("genfasm")
                .arg(ctx.require_str("arch_xml")?)
                .arg(eblif.clone())
                .args(["--device", ctx.require_str("genfasm_device")?])
                .args(ctx.words("vpr_options"))],
            vec![fasm.clone()],
            vec![analysis.to_string(), eblif],
        );
        out.set_exports([fasm]);
        Ok(out)
    }
}

/// `xcfasm`, writing a Xilinx 7-series bitstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct Xcfasm;

impl ToolAdapter for Xcfasm {
    fn kind(&self) -> ToolKind {
        ToolKind::Xcfasm
    }

    fn required_options(&self) -> &'static [&'static str] {
        &["db_root", "part"]
    }

    fn configure(&self, ctx: &StageContext<'_>) -> Result<StageOutput, FlowError> {
        let fasm = ctx.input("fasm")?;
        let db_root = ctx.require_str("db_root")?;
        let part = ctx.require_str("part")?;
        let bit = format!("{}.bit", stem(ctx)?);

        let mut out = StageOutput::new();
        out.add(
            vec![Command::new("xcfasm")
                .args(["--db-root", db_root, "--part", part])
                .arg("--part_file")
                .arg(format!("{db_root}/{part}/part.yaml"))
                .args(["--sparse", "--emit_pudc_b_pullup"])
                .args(["--fn_in", fasm, "--bit_out", bit.as_str()])
                .args(ctx.words("xcfasm_options"))],
            vec![bit.clone()],
            vec![fasm.to_string()],
        );
        out.set_exports([bit]);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{commands, ctx, job, options, strings};
    use pretty_assertions::assert_eq;

    #[test]
    fn genfasm_names_output_after_top() {
        let job = job("");
        let opts = options(&[
            ("arch_xml", "${ARCH_DEF}".into()),
            ("genfasm_device", "${DEVICE_NAME_MODIFIED}".into()),
            ("vpr_options", ["${VPR_OPTIONS}", "--read_rr_graph ${RR_GRAPH}"].into()),
        ]);
        let inputs = strings(&["blinky.analysis", "blinky.eblif"]);
        let out = Genfasm
            .configure(&ctx(ToolKind::Genfasm, &job, &opts, &inputs))
            .unwrap();
        assert_eq!(
            commands(&out),
            vec![
                "genfasm ${ARCH_DEF} blinky.eblif --device ${DEVICE_NAME_MODIFIED} \
                 ${VPR_OPTIONS} --read_rr_graph ${RR_GRAPH}"
            ]
        );
        assert_eq!(out.steps[0].depends, vec!["blinky.analysis", "blinky.eblif"]);
        assert_eq!(out.exports, vec!["top.fasm"]);
    }

    #[test]
    fn genfasm_needs_analysis() {
        let job = job("");
        let opts = options(&[("arch_xml", "a".into()), ("genfasm_device", "d".into())]);
        let inputs = strings(&["blinky.eblif"]);
        let err = Genfasm
            .configure(&ctx(ToolKind::Genfasm, &job, &opts, &inputs))
            .unwrap_err();
        assert!(matches!(err, FlowError::MissingInput { kind: "analysis", .. }));
    }

    #[test]
    fn genfasm_takes_job_netlist() {
        let job = job("[[files]]\nname = \"pre.eblif\"\nfile_type = \"eblif\"\n");
        let opts = options(&[("arch_xml", "a".into()), ("genfasm_device", "d".into())]);
        let inputs = strings(&["blinky.analysis"]);
        let out = Genfasm
            .configure(&ctx(ToolKind::Genfasm, &job, &opts, &inputs))
            .unwrap();
        assert_eq!(commands(&out), vec!["genfasm a pre.eblif --device d"]);
    }

    #[test]
    fn xcfasm_command() {
        let job = job("");
        let opts = options(&[
            ("db_root", "${DBROOT}".into()),
            ("part", "${PART}".into()),
            ("xcfasm_options", ["${FRM2BIT}"].into()),
        ]);
        let inputs = strings(&["top.fasm"]);
        let out = Xcfasm
            .configure(&ctx(ToolKind::Xcfasm, &job, &opts, &inputs))
            .unwrap();
        assert_eq!(
            commands(&out),
            vec![
                "xcfasm --db-root ${DBROOT} --part ${PART} --part_file ${DBROOT}/${PART}/part.yaml \
                 --sparse --emit_pudc_b_pullup --fn_in top.fasm --bit_out blinky.bit ${FRM2BIT}"
            ]
        );
        assert_eq!(out.steps[0].depends, vec!["top.fasm"]);
        assert_eq!(out.exports, vec!["blinky.bit"]);
    }

    #[test]
    fn xcfasm_needs_fasm() {
        let job = job("");
        let opts = options(&[("db_root", "db".into()), ("part", "p".into())]);
        let err = Xcfasm
            .configure(&ctx(ToolKind::Xcfasm, &job, &opts, &[]))
            .unwrap_err();
        assert!(matches!(err, FlowError::MissingInput { kind: "fasm", .. }));
    }
}
