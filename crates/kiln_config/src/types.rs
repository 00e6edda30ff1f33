//! Job description types deserialized from a job file.

use kiln_common::OptionMap;
use serde::Deserialize;
use std::collections::BTreeMap;

/// A hardware build job: what to compile and with which options.
///
/// Immutable once compilation starts. The file list is ordered; stages see
/// sources in the order they were declared.
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    /// The job name, used as the stem of most generated artifacts.
    pub name: String,
    /// The top-level module identifier.
    pub toplevel: String,
    /// The flow to compile the job with (e.g. `"f4pga"`).
    pub flow: String,
    /// Input files, in declaration order.
    #[serde(default)]
    pub files: Vec<SourceFile>,
    /// Options applying to the whole flow.
    #[serde(default)]
    pub flow_options: OptionMap,
    /// Options applying to a single tool, keyed by tool name.
    #[serde(default)]
    pub tool_options: BTreeMap<String, OptionMap>,
}

impl Job {
    /// Returns the files whose kind is one of `kinds`, in declaration order.
    pub fn files_of<'a>(&'a self, kinds: &'a [FileKind]) -> impl Iterator<Item = &'a SourceFile> {
        self.files.iter().filter(move |f| kinds.contains(&f.file_type))
    }

    /// Returns the names of the files whose kind is one of `kinds`.
    pub fn file_names_of(&self, kinds: &[FileKind]) -> Vec<String> {
        self.files_of(kinds).map(|f| f.name.clone()).collect()
    }

    /// Returns `true` if `name` is one of the job's input files.
    pub fn provides(&self, name: &str) -> bool {
        self.files.iter().any(|f| f.name == name)
    }

    /// Returns the options supplied for a single tool, if any.
    pub fn tool_options(&self, tool: &str) -> Option<&OptionMap> {
        self.tool_options.get(tool)
    }
}

/// One input file of a job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceFile {
    /// The file path, exactly as it should appear in the build script.
    pub name: String,
    /// The kind of file.
    pub file_type: FileKind,
    /// Optional logical grouping (e.g. a VHDL library name).
    #[serde(default)]
    pub logical_name: Option<String>,
}

/// The kind of a job input file, using the conventional EDA type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum FileKind {
    /// Verilog source.
    #[serde(
        rename = "verilogSource",
        alias = "verilogSource-2001",
        alias = "verilogSource-2005"
    )]
    Verilog,
    /// SystemVerilog source.
    #[serde(rename = "systemVerilogSource")]
    SystemVerilog,
    /// VHDL source.
    #[serde(rename = "vhdlSource", alias = "vhdlSource-93")]
    Vhdl,
    /// VHDL-2008 source.
    #[serde(rename = "vhdlSource-2008")]
    Vhdl2008,
    /// Synopsys design constraints (timing).
    #[serde(rename = "SDC")]
    Sdc,
    /// Physical pin constraints.
    #[serde(rename = "PCF")]
    Pcf,
    /// Xilinx design constraints (placement).
    #[serde(rename = "xdc")]
    Xdc,
    /// A nextpnr chip database.
    #[serde(rename = "bba")]
    Bba,
    /// An FPGA interchange device description.
    #[serde(rename = "device")]
    Device,
    /// A BLIF netlist.
    #[serde(rename = "blif")]
    Blif,
    /// An extended BLIF netlist.
    #[serde(rename = "eblif")]
    Eblif,
    /// A Tcl script.
    #[serde(rename = "tclSource")]
    Tcl,
    /// A user file that no stage consumes directly.
    #[serde(rename = "user")]
    User,
    /// Any other file type.
    #[serde(other)]
    Other,
}

impl FileKind {
    /// Returns `true` for HDL source kinds.
    pub fn is_hdl(self) -> bool {
        matches!(
            self,
            Self::Verilog | Self::SystemVerilog | Self::Vhdl | Self::Vhdl2008
        )
    }

    /// Returns `true` for VHDL source kinds.
    pub fn is_vhdl(self) -> bool {
        matches!(self, Self::Vhdl | Self::Vhdl2008)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_job_from_str;

    const JOB: &str = r#"
name = "blinky"
toplevel = "top"
flow = "f4pga"

[[files]]
name = "rtl/top.v"
file_type = "verilogSource"

[[files]]
name = "rtl/pkg.sv"
file_type = "systemVerilogSource"

[[files]]
name = "rtl/uart.vhd"
file_type = "vhdlSource-2008"
logical_name = "uart_lib"

[[files]]
name = "top.xdc"
file_type = "xdc"

[[files]]
name = "notes.txt"
file_type = "text"
"#;

    #[test]
    fn file_kinds_from_conventional_names() {
        let job = load_job_from_str(JOB).unwrap();
        let kinds: Vec<_> = job.files.iter().map(|f| f.file_type).collect();
        assert_eq!(
            kinds,
            vec![
                FileKind::Verilog,
                FileKind::SystemVerilog,
                FileKind::Vhdl2008,
                FileKind::Xdc,
                FileKind::Other,
            ]
        );
        assert_eq!(job.files[2].logical_name.as_deref(), Some("uart_lib"));
    }

    #[test]
    fn verilog_aliases() {
        for alias in ["verilogSource", "verilogSource-2001", "verilogSource-2005"] {
            let text = format!(
                "name = \"a\"\ntoplevel = \"a\"\nflow = \"f4pga\"\n[[files]]\nname = \"a.v\"\nfile_type = \"{alias}\"\n"
            );
            let job = load_job_from_str(&text).unwrap();
            assert_eq!(job.files[0].file_type, FileKind::Verilog);
        }
    }

    #[test]
    fn files_of_keeps_declaration_order() {
        let job = load_job_from_str(JOB).unwrap();
        let hdl = job.file_names_of(&[FileKind::SystemVerilog, FileKind::Verilog]);
        assert_eq!(hdl, vec!["rtl/top.v", "rtl/pkg.sv"]);
    }

    #[test]
    fn provides_matches_exact_names() {
        let job = load_job_from_str(JOB).unwrap();
        assert!(job.provides("top.xdc"));
        assert!(!job.provides("top"));
    }

    #[test]
    fn kind_predicates() {
        assert!(FileKind::Vhdl2008.is_vhdl());
        assert!(FileKind::Vhdl2008.is_hdl());
        assert!(FileKind::SystemVerilog.is_hdl());
        assert!(!FileKind::Xdc.is_hdl());
    }
}
