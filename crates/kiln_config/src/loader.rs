//! Job file loading and validation.

use crate::error::ConfigError;
use crate::types::Job;
use std::path::Path;

/// Loads and validates a job description from a TOML file.
pub fn load_job(path: &Path) -> Result<Job, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_job_from_str(&content)
}

/// Parses and validates a job description from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_job_from_str(content: &str) -> Result<Job, ConfigError> {
    let job: Job = toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_job(&job)?;
    Ok(job)
}

/// Validates that the identifying fields are present.
fn validate_job(job: &Job) -> Result<(), ConfigError> {
    if job.name.trim().is_empty() {
        return Err(ConfigError::MissingField("name".to_string()));
    }
    if job.toplevel.trim().is_empty() {
        return Err(ConfigError::MissingField("toplevel".to_string()));
    }
    if job.flow.trim().is_empty() {
        return Err(ConfigError::MissingField("flow".to_string()));
    }
    if let Some(file) = job.files.iter().find(|f| f.name.trim().is_empty()) {
        return Err(ConfigError::MissingField(format!(
            "files.name (entry of type {:?})",
            file.file_type
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::OptionValue;

    #[test]
    fn parse_minimal_job() {
        let toml = r#"
name = "blinky"
toplevel = "top"
flow = "f4pga"
"#;
        let job = load_job_from_str(toml).unwrap();
        assert_eq!(job.name, "blinky");
        assert_eq!(job.toplevel, "top");
        assert_eq!(job.flow, "f4pga");
        assert!(job.files.is_empty());
        assert!(job.flow_options.is_empty());
        assert!(job.tool_options.is_empty());
    }

    #[test]
    fn parse_options() {
        let toml = r#"
name = "blinky"
toplevel = "top"
flow = "f4pga"

[flow_options]
board = "basys3"
pnr = "nextpnr"

[tool_options.vpr]
vpr_options = ["--route_chan_width", "100"]

[tool_options.yosys]
yosys_synth_options = "-flatten"
"#;
        let job = load_job_from_str(toml).unwrap();
        assert_eq!(job.flow_options["board"].as_str(), Some("basys3"));
        assert_eq!(
            job.tool_options("vpr").unwrap()["vpr_options"],
            OptionValue::from(["--route_chan_width", "100"])
        );
        assert!(job.tool_options("nextpnr").is_none());
    }

    #[test]
    fn missing_name_errors() {
        let toml = r#"
name = ""
toplevel = "top"
flow = "f4pga"
"#;
        let err = load_job_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "name"));
    }

    #[test]
    fn missing_toplevel_errors() {
        let toml = r#"
name = "blinky"
toplevel = "  "
flow = "f4pga"
"#;
        let err = load_job_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "toplevel"));
    }

    #[test]
    fn missing_flow_key_is_parse_error() {
        let toml = r#"
name = "blinky"
toplevel = "top"
"#;
        let err = load_job_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn blank_file_name_errors() {
        let toml = r#"
name = "blinky"
toplevel = "top"
flow = "f4pga"

[[files]]
name = ""
file_type = "xdc"
"#;
        let err = load_job_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_job_from_str("name = = \"x\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.toml");
        std::fs::write(&path, "name = \"a\"\ntoplevel = \"b\"\nflow = \"symbiflow\"\n").unwrap();
        let job = load_job(&path).unwrap();
        assert_eq!(job.flow, "symbiflow");
    }

    #[test]
    fn io_error_from_nonexistent_file() {
        let err = load_job(Path::new("/nonexistent/job.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
