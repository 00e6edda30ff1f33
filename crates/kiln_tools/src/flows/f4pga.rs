//! The F4PGA flow for Xilinx 7-series boards.
//!
//! Yosys synthesizes the design, VPR (through `genfasm`) or nextpnr places
//! and routes it, and `xcfasm` writes the bitstream. The board name selects
//! the device through the board database. The F4PGA Tcl and Python helpers
//! read their settings from the environment, so the flow exports the file
//! names and device paths they expect.

use kiln_common::{option_map, OptionMap};
use kiln_config::{BoardDb, FileKind, Job, ResolvedOptions};
use kiln_graph::{
    ChainSpec, Command, CommandGraph, Flow, FlowError, PnrEngine, StageTemplate, Successors,
    ToolKind, Variant,
};

/// Options every F4PGA build needs once the board is looked up.
const REQUIRED: &[&str] = &["board", "arch", "device_type", "device_name", "part"];

/// Default VPR settings for the Xilinx 7-series architecture definitions.
const VPR_OPTIONS: &[&str] = &[
    "--disp on",
    "--max_router_iterations 500",
    "--routing_failure_predictor off",
    "--router_high_fanout_threshold -1",
    "--constant_net_method route",
    "--route_chan_width 500",
    "--router_heap bucket",
    "--clock_modeling route",
    "--place_delta_delay_matrix_calculation_method dijkstra",
    "--place_delay_model delta",
    "--router_lookahead extended_map",
    "--check_route quick",
    "--strict_checks off",
    "--allow_dangling_combinational_nodes on",
    "--disable_errors check_unbuffered_edges:check_route",
    "--congested_routing_iteration_threshold 0.8",
    "--incremental_reroute_delay_ripup off",
    "--base_cost_type delay_normalized_length_bounded",
    "--bb_factor 10",
    "--acc_fac 0.7",
    "--astar_fac 1.8",
    "--initial_pres_fac 2.828",
    "--pres_fac_mult 1.2",
    "--check_rr_graph off",
    "--suppress_warnings ${OUT_NOISY_WARNINGS},sum_pin_class:check_unbuffered_edges:\
     load_rr_indexed_data_T_values:check_rr_node:trans_per_R:check_route:\
     set_rr_graph_tool_comment:calculate_average_switch",
];

/// The F4PGA flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct F4pga;

impl F4pga {
    fn synthesis(pnr: PnrEngine, options: &ResolvedOptions) -> Result<StageTemplate, FlowError> {
        let yosys = StageTemplate::new(ToolKind::Yosys).branch(Successors::ByPnr {
            vpr: vec![ToolKind::Vpr],
            nextpnr: vec![ToolKind::Nextpnr],
        });
        Ok(match pnr {
            PnrEngine::Vpr => yosys
                .with_option("output_format", "eblif")
                .with_option("yosys_template", "${F4PGA_ENV_SHARE}/scripts/xc7/synth.tcl")
                .with_option("split_io_script", "${F4PGA_ENV_SHARE}/scripts/split_inouts.py")
                .with_option("conv_template", "${F4PGA_ENV_SHARE}/scripts/xc7/conv.tcl")
                .with_option("python", "${PYTHON}"),
            PnrEngine::Nextpnr => yosys
                .with_option("output_format", "json")
                .with_option("synth_arch", options.require_str("arch")?),
        })
    }

    /// Exports read by the F4PGA helper scripts.
    fn environment(
        options: &ResolvedOptions,
        job: &Job,
    ) -> Result<Vec<(&'static str, String)>, FlowError> {
        let name = &job.name;
        let top = &job.toplevel;
        let fasm = match PnrEngine::from_options(options)? {
            PnrEngine::Vpr => format!("{top}.fasm"),
            PnrEngine::Nextpnr => format!("{name}.fasm"),
        };
        let xdc = job.file_names_of(&[FileKind::Xdc]).join(" ");
        let share = |path: &str| format!("${{F4PGA_ENV_SHARE}}/{path}");
        let arch_dir = |path: &str| format!("${{ARCH_DIR}}/{path}");

        Ok(vec![
            ("NET_FILE", format!("{name}.net")),
            ("ANALYSIS_FILE", format!("{name}.analysis")),
            ("FASM_FILE", fasm),
            ("BITSTREAM_FILE", format!("{name}.bit")),
            ("DEVICE_TYPE", options.require_str("device_type")?.to_string()),
            ("DEVICE_NAME", options.require_str("device_name")?.to_string()),
            (
                "DEVICE_NAME_MODIFIED",
                "$(shell echo ${DEVICE_NAME} | sed -n 's/_/-/p')".to_string(),
            ),
            ("PART", options.require_str("part")?.to_string()),
            ("BOARD", options.require_str("board")?.to_string()),
            ("TOP", top.clone()),
            ("INPUT_XDC_FILES", xdc),
            ("PYTHON", "python3".to_string()),
            ("USE_ROI", "\"FALSE\"".to_string()),
            ("TECHMAP_PATH", share("techmaps/xc7_vpr/techmap")),
            ("DATABASE_DIR", "$(shell prjxray-config)".to_string()),
            (
                "PART_JSON",
                "${DATABASE_DIR}/${DEVICE_TYPE}/${PART}/part.json".to_string(),
            ),
            ("OUT_FASM_EXTRA", format!("{name}_fasm_extra.fasm")),
            ("OUT_SDC", format!("{name}.sdc")),
            ("OUT_SYNTH_V", format!("{name}_synth.v")),
            ("OUT_JSON", format!("{name}.json")),
            ("PYTHON3", "$(shell which python3)".to_string()),
            ("UTILS_PATH", share("scripts")),
            ("SYNTH_JSON", format!("{name}_io.json")),
            ("OUT_EBLIF", format!("{name}.eblif")),
            ("ARCH_DIR", share("arch/${DEVICE_NAME}")),
            ("RR_GRAPH", arch_dir("rr_graph_${DEVICE_NAME}.rr_graph.real.bin")),
            ("LOOKAHEAD", arch_dir("rr_graph_${DEVICE_NAME}.lookahead.bin")),
            ("PLACE_DELAY", arch_dir("rr_graph_${DEVICE_NAME}.place_delay.bin")),
            ("ARCH_DEF", arch_dir("arch.timing.xml")),
            ("DBROOT", "${DATABASE_DIR}/${DEVICE_TYPE}".to_string()),
            ("IOGEN", share("scripts/prjxray_create_ioplace.py")),
            ("CONSTR_GEN", share("scripts/prjxray_create_place_constraints.py")),
            ("CONSTR_FILE", crate::vpr::CONSTRAINTS_FILE.to_string()),
            ("PINMAP_FILE", arch_dir("${PART}/pinmap.csv")),
            ("VPR_GRID_MAP", arch_dir("vpr_grid_map.csv")),
            ("IOPLACE_FILE", format!("{name}.ioplace")),
            (
                "OUT_NOISY_WARNINGS",
                "noisy_warnings-${DEVICE_NAME}_fasm.log".to_string(),
            ),
            ("VPR_OPTIONS", VPR_OPTIONS.join(" ")),
        ])
    }
}

impl Flow for F4pga {
    fn name(&self) -> &'static str {
        "f4pga"
    }

    fn option_defaults(&self) -> OptionMap {
        option_map([("pnr", "vpr")])
    }

    fn required_options(&self) -> &'static [&'static str] {
        REQUIRED
    }

    fn external_options(&self, job: &Job, boards: &BoardDb) -> Result<OptionMap, FlowError> {
        let Some(board) = job.flow_options.get("board").and_then(|v| v.as_str()) else {
            return Ok(OptionMap::new());
        };
        match boards.lookup(board) {
            Ok(options) => Ok(options.clone()),
            Err(_) => Err(FlowError::UnsupportedVariant {
                what: "board",
                value: board.to_string(),
                expected: boards.boards().collect::<Vec<_>>().join(", "),
            }),
        }
    }

    fn chain(&self, options: &ResolvedOptions, _job: &Job) -> Result<ChainSpec, FlowError> {
        let pnr = PnrEngine::from_options(options)?;
        Ok(ChainSpec::new()
            .stage(Self::synthesis(pnr, options)?)
            .stage(
                StageTemplate::new(ToolKind::Vpr)
                    .then(ToolKind::Genfasm)
                    .with_option("arch_xml", "${ARCH_DEF}")
                    .with_option(
                        "vpr_options",
                        [
                            "${VPR_OPTIONS}",
                            "--read_rr_graph ${RR_GRAPH}",
                            "--read_router_lookahead ${LOOKAHEAD}",
                            "--read_placement_delay_lookup ${PLACE_DELAY}",
                        ],
                    )
                    .with_option("python", "${PYTHON}")
                    .with_option("ioplace_script", "${IOGEN}")
                    .with_option("pinmap", "${PINMAP_FILE}")
                    .with_option("place_constraints_script", "${CONSTR_GEN}")
                    .with_option("vpr_grid_map", "${VPR_GRID_MAP}")
                    .with_option("db_root", "${DATABASE_DIR}"),
            )
            .stage(
                StageTemplate::new(ToolKind::Genfasm)
                    .then(ToolKind::Xcfasm)
                    .with_option("arch_xml", "${ARCH_DEF}")
                    .with_option("genfasm_device", "${DEVICE_NAME_MODIFIED}")
                    .with_option(
                        "vpr_options",
                        ["${VPR_OPTIONS}", "--read_rr_graph ${RR_GRAPH}"],
                    ),
            )
            .stage(StageTemplate::new(ToolKind::Nextpnr).then(ToolKind::Xcfasm))
            .stage(
                StageTemplate::new(ToolKind::Xcfasm)
                    .with_option("db_root", "${DBROOT}")
                    .with_option("xcfasm_options", ["${FRM2BIT}"]),
            ))
    }

    fn prepare(
        &self,
        graph: &mut CommandGraph,
        options: &ResolvedOptions,
        job: &Job,
    ) -> Result<(), FlowError> {
        graph.require_env(
            "F4PGA_ENV_SHARE",
            "It should point at the share/f4pga directory of the F4PGA install",
        )?;
        for (name, value) in Self::environment(options, job)? {
            graph.export(name, value, self.name())?;
        }
        Ok(())
    }

    fn finish(
        &self,
        graph: &mut CommandGraph,
        _options: &ResolvedOptions,
        job: &Job,
    ) -> Result<(), FlowError> {
        graph.add_aux_target(
            "run",
            vec![Command::new("openFPGALoader")
                .args(["-b", "${BOARD}"])
                .arg(format!("{}.bit", job.name))],
        );
        Ok(())
    }
}
