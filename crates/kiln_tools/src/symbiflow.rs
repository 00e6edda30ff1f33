//! The Symbiflow wrapper scripts: `symbiflow_pack`, `symbiflow_place`,
//! `symbiflow_route`, `symbiflow_write_fasm` and the bitstream writers.

use crate::stem;
use kiln_config::FileKind;
use kiln_graph::{Command, FlowError, StageContext, StageOutput, ToolAdapter, ToolKind, Vendor};

/// Pack, place, route and FASM generation through the wrapper scripts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbiflowPnr;

impl ToolAdapter for SymbiflowPnr {
    fn kind(&self) -> ToolKind {
        ToolKind::SymbiflowPnr
    }

    fn required_options(&self) -> &'static [&'static str] {
        &["device_name", "partname"]
    }

    fn configure(&self, ctx: &StageContext<'_>) -> Result<StageOutput, FlowError> {
        let eblif = ctx.input("eblif")?;
        let device = ctx.require_str("device_name")?;
        let partname = ctx.require_str("partname")?;
        let stem = stem(ctx)?;

        let sdc = ctx.job.file_names_of(&[FileKind::Sdc]);
        let pcf = ctx.job.file_names_of(&[FileKind::Pcf]);
        let flagged = |flag: &str, files: &[String]| -> Vec<String> {
            if files.is_empty() {
                Vec::new()
            } else {
                std::iter::once(flag.to_string()).chain(files.iter().cloned()).collect()
            }
        };
        let sdc_opts = flagged("-s", &sdc);
        let pcf_opts = flagged("-p", &pcf);
        let vpr = ctx.words("vpr_options");
        let vpr_opts = if vpr.is_empty() {
            Vec::new()
        } else {
            vec![
                "--additional_vpr_options".to_string(),
                format!("\"{}\"", vpr.join(" ")),
            ]
        };
        let script = |name: &str| Command::new(name).args(["-e", eblif, "-d", device]);

        let net = format!("{stem}.net");
        let place = format!("{stem}.place");
        let route = format!("{stem}.route");
        let fasm = format!("{stem}.fasm");
        let mut out = StageOutput::new();

        out.add(
            vec![script("symbiflow_pack")
                .args(sdc_opts.iter().cloned())
                .args(vpr_opts.iter().cloned())],
            vec![net.clone()],
            std::iter::once(eblif.to_string()).chain(sdc.iter().cloned()).collect(),
        );
        out.add(
            vec![script("symbiflow_place")
                .args(["-n", net.as_str(), "-P", partname])
                .args(sdc_opts.iter().cloned())
                .args(pcf_opts.iter().cloned())
                .args(vpr_opts.iter().cloned())],
            vec![place.clone()],
            std::iter::once(net).chain(pcf.iter().cloned()).collect(),
        );
        out.add(
            vec![script("symbiflow_route")
                .args(sdc_opts.iter().cloned())
                .args(vpr_opts.iter().cloned())],
            vec![route.clone()],
            vec![place],
        );
        out.add(
            vec![script("symbiflow_write_fasm")
                .args(sdc_opts.iter().cloned())
                .args(vpr_opts.iter().cloned())],
            vec![fasm.clone()],
            vec![route],
        );
        out.set_exports([fasm]);
        Ok(out)
    }
}

/// `symbiflow_write_bitstream`, plus the QuickLogic programming files.
///
/// The bitstream is named after the FASM file it is written from.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbiflowBitstream;

impl ToolAdapter for SymbiflowBitstream {
    fn kind(&self) -> ToolKind {
        ToolKind::SymbiflowBitstream
    }

    fn required_options(&self) -> &'static [&'static str] {
        &["vendor", "device_type", "partname"]
    }

    fn configure(&self, ctx: &StageContext<'_>) -> Result<StageOutput, FlowError> {
        let fasm = ctx.input("fasm")?;
        let vendor: Vendor = ctx.variant()?;
        let base = fasm.strip_suffix(".fasm").unwrap_or(fasm);
        let bit = format!("{base}.bit");
        let part_flag = match vendor {
            Vendor::Xilinx => "-p",
            Vendor::Quicklogic => "-P",
        };

        let mut out = StageOutput::new();
        out.add(
            vec![Command::new("symbiflow_write_bitstream")
                .args(["-d", ctx.require_str("device_type")?])
                .args(["-f", fasm])
                .args([part_flag, ctx.require_str("partname")?])
                .args(["-b", bit.as_str()])],
            vec![bit.clone()],
            vec![fasm.to_string()],
        );

        match vendor {
            Vendor::Xilinx => out.set_exports([bit]),
            Vendor::Quicklogic => {
                let programming = [
                    ("symbiflow_write_binary", "bin"),
                    ("symbiflow_write_bitheader", "h"),
                    ("symbiflow_write_openocd", "openocd.cfg"),
                    ("symbiflow_write_jlink", "jlink"),
                ];
                for (tool, ext) in programming {
                    let target = format!("{base}.{ext}");
                    out.add(
                        vec![Command::new(tool).args([bit.as_str(), target.as_str()])],
                        vec![target],
                        vec![bit.clone()],
                    );
                }
                out.set_exports(["bin", "h", "openocd.cfg"].map(|ext| format!("{base}.{ext}")));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{commands, ctx, job, options, strings};
    use pretty_assertions::assert_eq;

    const CONSTRAINTS: &str = r#"
[[files]]
name = "timing.sdc"
file_type = "SDC"

[[files]]
name = "pins.pcf"
file_type = "PCF"
"#;

    #[test]
    fn wrapper_scripts() {
        let job = job(CONSTRAINTS);
        let opts = options(&[
            ("device_name", "xc7a50t_test".into()),
            ("partname", "xc7a35tcpg236-1".into()),
            ("artifact_stem", "top".into()),
        ]);
        let inputs = strings(&["top.eblif"]);
        let out = SymbiflowPnr
            .configure(&ctx(ToolKind::SymbiflowPnr, &job, &opts, &inputs))
            .unwrap();
        assert_eq!(
            commands(&out),
            vec![
                "symbiflow_pack -e top.eblif -d xc7a50t_test -s timing.sdc",
                "symbiflow_place -e top.eblif -d xc7a50t_test -n top.net -P xc7a35tcpg236-1 \
                 -s timing.sdc -p pins.pcf",
                "symbiflow_route -e top.eblif -d xc7a50t_test -s timing.sdc",
                "symbiflow_write_fasm -e top.eblif -d xc7a50t_test -s timing.sdc",
            ]
        );
        assert_eq!(out.steps[0].depends, vec!["top.eblif", "timing.sdc"]);
        assert_eq!(out.steps[1].depends, vec!["top.net", "pins.pcf"]);
        assert_eq!(out.exports, vec!["top.fasm"]);
    }

    #[test]
    fn additional_vpr_options_are_quoted() {
        let job = job("");
        let opts = options(&[
            ("device_name", "d".into()),
            ("partname", "p".into()),
            ("vpr_options", ["--seed", "2"].into()),
        ]);
        let inputs = strings(&["blinky.eblif"]);
        let out = SymbiflowPnr
            .configure(&ctx(ToolKind::SymbiflowPnr, &job, &opts, &inputs))
            .unwrap();
        assert_eq!(
            commands(&out)[0],
            "symbiflow_pack -e blinky.eblif -d d --additional_vpr_options \"--seed 2\""
        );
    }

    #[test]
    fn xilinx_bitstream() {
        let job = job("");
        let opts = options(&[
            ("vendor", "xilinx".into()),
            ("device_type", "artix7".into()),
            ("partname", "xc7a35tcpg236-1".into()),
        ]);
        let inputs = strings(&["top.fasm"]);
        let out = SymbiflowBitstream
            .configure(&ctx(ToolKind::SymbiflowBitstream, &job, &opts, &inputs))
            .unwrap();
        assert_eq!(
            commands(&out),
            vec!["symbiflow_write_bitstream -d artix7 -f top.fasm -p xc7a35tcpg236-1 -b top.bit"]
        );
        assert_eq!(out.exports, vec!["top.bit"]);
    }

    #[test]
    fn quicklogic_programming_files() {
        let job = job("");
        let opts = options(&[
            ("vendor", "quicklogic".into()),
            ("device_type", "ql-eos-s3_wlcsp".into()),
            ("partname", "PD64".into()),
        ]);
        let inputs = strings(&["top.fasm"]);
        let out = SymbiflowBitstream
            .configure(&ctx(ToolKind::SymbiflowBitstream, &job, &opts, &inputs))
            .unwrap();
        assert_eq!(
            commands(&out),
            vec![
                "symbiflow_write_bitstream -d ql-eos-s3_wlcsp -f top.fasm -P PD64 -b top.bit",
                "symbiflow_write_binary top.bit top.bin",
                "symbiflow_write_bitheader top.bit top.h",
                "symbiflow_write_openocd top.bit top.openocd.cfg",
                "symbiflow_write_jlink top.bit top.jlink",
            ]
        );
        assert_eq!(out.exports, vec!["top.bin", "top.h", "top.openocd.cfg"]);
    }

    #[test]
    fn bitstream_rejects_unknown_vendor() {
        let job = job("");
        let opts = options(&[
            ("vendor", "lattice".into()),
            ("device_type", "x".into()),
            ("partname", "y".into()),
        ]);
        let inputs = strings(&["top.fasm"]);
        let err = SymbiflowBitstream
            .configure(&ctx(ToolKind::SymbiflowBitstream, &job, &opts, &inputs))
            .unwrap_err();
        assert!(matches!(err, FlowError::UnsupportedVariant { what: "vendor", .. }));
    }
}
