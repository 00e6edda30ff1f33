//! Error types for job loading and option resolution.

use std::path::PathBuf;

/// Errors that can occur when loading a job, reading the board database, or
/// resolving options.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading a configuration file.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The file content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A required field of the job description is missing or empty.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A mandatory option is absent after all scopes were merged.
    #[error("missing required option '{key}'")]
    MissingRequiredOption {
        /// The option key.
        key: String,
    },

    /// An option is present but holds a value of the wrong type.
    #[error("option '{key}' must be a {expected}, found a {found}")]
    InvalidOption {
        /// The option key.
        key: String,
        /// The expected value type.
        expected: &'static str,
        /// The type actually found.
        found: &'static str,
    },

    /// The board database has no entry for the requested board.
    #[error("unknown board '{0}'")]
    UnknownBoard(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_missing_field() {
        let err = ConfigError::MissingField("toplevel".to_string());
        assert_eq!(format!("{err}"), "missing required field: toplevel");
    }

    #[test]
    fn display_missing_option() {
        let err = ConfigError::MissingRequiredOption {
            key: "part".to_string(),
        };
        assert_eq!(format!("{err}"), "missing required option 'part'");
    }

    #[test]
    fn display_invalid_option() {
        let err = ConfigError::InvalidOption {
            key: "pnr".to_string(),
            expected: "string",
            found: "boolean",
        };
        assert_eq!(format!("{err}"), "option 'pnr' must be a string, found a boolean");
    }

    #[test]
    fn display_unknown_board() {
        let err = ConfigError::UnknownBoard("de0".to_string());
        assert_eq!(format!("{err}"), "unknown board 'de0'");
    }

    #[test]
    fn display_io_error() {
        let err = ConfigError::Io {
            path: PathBuf::from("/jobs/blinky.toml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        };
        let display = format!("{err}");
        assert!(display.starts_with("failed to read /jobs/blinky.toml"));
    }
}
