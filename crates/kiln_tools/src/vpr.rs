//! VPR pack, place, route and timing analysis.

use crate::stem;
use kiln_common::{option_map, OptionMap};
use kiln_config::FileKind;
use kiln_graph::{Command, FlowError, StageContext, StageOutput, ToolAdapter, ToolKind};

/// Name of the placement constraints file written before placement.
pub const CONSTRAINTS_FILE: &str = "constraints.place";

/// The VPR adapter.
///
/// Steps: pack, then optionally I/O placement and placement constraints,
/// then place, route and analysis. Every VPR call takes the architecture,
/// the netlist, the SDC files and the extra `vpr_options`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Vpr;

/// Netlists from the predecessors, falling back to the job's own.
/// The flag tells whether they came from predecessors.
fn netlists(ctx: &StageContext<'_>) -> Result<(Vec<String>, bool), FlowError> {
    let upstream: Vec<String> = ctx
        .inputs
        .iter()
        .filter(|name| name.ends_with(".eblif") || name.ends_with(".blif"))
        .cloned()
        .collect();
    if !upstream.is_empty() {
        return Ok((upstream, true));
    }
    let own = ctx.job.file_names_of(&[FileKind::Eblif, FileKind::Blif]);
    if own.is_empty() {
        return Err(FlowError::MissingInput {
            stage: ctx.stage.to_string(),
            kind: "eblif",
        });
    }
    Ok((own, false))
}

impl ToolAdapter for Vpr {
    fn kind(&self) -> ToolKind {
        ToolKind::Vpr
    }

    fn defaults(&self) -> OptionMap {
        option_map([("python", "python3")])
    }

    fn required_options(&self) -> &'static [&'static str] {
        &["arch_xml"]
    }

    fn configure(&self, ctx: &StageContext<'_>) -> Result<StageOutput, FlowError> {
        let arch = ctx.require_str("arch_xml")?;
        let (netlists, upstream) = netlists(ctx)?;
        let sdc = ctx.job.file_names_of(&[FileKind::Sdc]);
        let extra = ctx.words("vpr_options");
        let stem = stem(ctx)?;

        let vpr = |action: &str, fix: Option<(&str, &str)>| {
            let mut cmd = Command::new("vpr").arg(arch).args(netlists.iter().cloned());
            if let Some((flag, file)) = fix {
                cmd = cmd.arg(flag).arg(file);
            }
            cmd.arg(action)
                .args(sdc.iter().flat_map(|f| ["--sdc_file".to_string(), f.clone()]))
                .args(extra.iter().cloned())
        };

        let net = format!("{stem}.net");
        let place = format!("{stem}.place");
        let route = format!("{stem}.route");
        let analysis = format!("{stem}.analysis");
        let mut out = StageOutput::new();

        out.add(
            vec![vpr("--pack", None)],
            vec![net.clone()],
            netlists.iter().chain(&sdc).cloned().collect(),
        );

        let ioplace = match ctx.get_str("ioplace_script")? {
            Some(script) => {
                let pinmap = ctx.require_str("pinmap")?;
                let file = format!("{stem}.ioplace");
                out.add(
                    vec![Command::new(ctx.require_str("python")?)
                        .arg(script)
                        .args(["--blif", netlists[0].as_str()])
                        .args(["--map", pinmap, "--net", net.as_str()])
                        .args([">", file.as_str()])],
                    vec![file.clone()],
                    vec![net.clone()],
                );
                Some(file)
            }
            None => None,
        };

        let constraints = match ctx.get_str("place_constraints_script")? {
            Some(script) => {
                let ioplace = match &ioplace {
                    Some(file) => file.as_str(),
                    None => {
                        return Err(FlowError::MissingRequiredOption {
                            key: "ioplace_script".to_string(),
                            scope: ctx.stage.to_string(),
                        })
                    }
                };
                out.add(
                    vec![Command::new(ctx.require_str("python")?)
                        .arg(script)
                        .args(["--net", net.as_str(), "--arch", arch])
                        .args(["--blif", netlists[0].as_str()])
                        .args(["--vpr_grid_map", ctx.require_str("vpr_grid_map")?])
                        .args(["--input", ioplace])
                        .args(["--db_root", ctx.require_str("db_root")?])
                        .args(["--part", ctx.require_str("part")?])
                        .args([">", CONSTRAINTS_FILE])],
                    vec![CONSTRAINTS_FILE.to_string()],
                    vec![net.clone(), ioplace.to_string()],
                );
                true
            }
            None => false,
        };

        let (fix, place_dep) = match (&ioplace, constraints) {
            (_, true) => (Some(("--fix_clusters", CONSTRAINTS_FILE)), CONSTRAINTS_FILE.to_string()),
            (Some(file), false) => (Some(("--fix_pins", file.as_str())), file.clone()),
            (None, false) => (None, net.clone()),
        };
        out.add(vec![vpr("--place", fix)], vec![place.clone()], vec![place_dep]);
        out.add(vec![vpr("--route", None)], vec![route.clone()], vec![place]);
        out.add(vec![vpr("--analysis", None)], vec![analysis.clone()], vec![route]);

        let mut exports = vec![analysis];
        if upstream {
            exports.extend(netlists);
        }
        out.set_exports(exports);
        Ok(out)
    }
}
