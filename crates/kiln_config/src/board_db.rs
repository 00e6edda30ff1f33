//! Read-only board lookup database.
//!
//! Maps a board name to the device options (architecture, device type and
//! name, part) a flow needs. The data is external: it can be loaded from a
//! TOML or JSON file, and a built-in table covers the common boards.

use crate::error::ConfigError;
use kiln_common::OptionMap;
use std::collections::BTreeMap;
use std::path::Path;

const BUILTIN_BOARDS: &str = include_str!("../data/boards.toml");

/// A board name to option map lookup table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardDb {
    boards: BTreeMap<String, OptionMap>,
}

impl BoardDb {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the database bundled with Kiln.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_toml_str(BUILTIN_BOARDS)
    }

    /// Loads a database file, choosing the format by extension (`.json` is
    /// JSON, anything else TOML).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    /// Parses a database from TOML, one table per board.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let boards = toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        Ok(Self { boards })
    }

    /// Parses a database from JSON, one object per board.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let boards =
            serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        Ok(Self { boards })
    }

    /// Adds or replaces a board entry.
    pub fn insert(&mut self, board: impl Into<String>, options: OptionMap) {
        self.boards.insert(board.into(), options);
    }

    /// Looks up the options for a board.
    pub fn lookup(&self, board: &str) -> Result<&OptionMap, ConfigError> {
        self.boards
            .get(board)
            .ok_or_else(|| ConfigError::UnknownBoard(board.to_string()))
    }

    /// Returns the known board names in sorted order.
    pub fn boards(&self) -> impl Iterator<Item = &str> {
        self.boards.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::option_map;

    #[test]
    fn builtin_has_basys3() {
        let db = BoardDb::builtin().unwrap();
        let basys3 = db.lookup("basys3").unwrap();
        assert_eq!(basys3["part"].as_str(), Some("xc7a35tcpg236-1"));
        assert_eq!(basys3["device_name"].as_str(), Some("xc7a50t_test"));
        assert_eq!(basys3["device_type"].as_str(), Some("artix7"));
        assert_eq!(basys3["arch"].as_str(), Some("xilinx"));
    }

    #[test]
    fn builtin_entries_are_complete() {
        let db = BoardDb::builtin().unwrap();
        for board in db.boards() {
            let entry = db.lookup(board).unwrap();
            for key in ["arch", "device_type", "device_name", "part"] {
                assert!(entry.contains_key(key), "{board} lacks {key}");
            }
        }
    }

    #[test]
    fn unknown_board() {
        let db = BoardDb::builtin().unwrap();
        let err = db.lookup("de10_nano").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBoard(b) if b == "de10_nano"));
    }

    #[test]
    fn json_format() {
        let db = BoardDb::from_json_str(
            r#"{"custom": {"arch": "xilinx", "part": "xc7a100tcsg324-1"}}"#,
        )
        .unwrap();
        assert_eq!(db.lookup("custom").unwrap()["part"].as_str(), Some("xc7a100tcsg324-1"));
    }

    #[test]
    fn load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("boards.json");
        std::fs::write(&json, r#"{"a": {"part": "p"}}"#).unwrap();
        let toml = dir.path().join("boards.toml");
        std::fs::write(&toml, "[b]\npart = \"q\"\n").unwrap();

        assert!(BoardDb::load(&json).unwrap().lookup("a").is_ok());
        assert!(BoardDb::load(&toml).unwrap().lookup("b").is_ok());
    }

    #[test]
    fn malformed_database_is_parse_error() {
        let err = BoardDb::from_json_str("[1, 2]").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn insert_replaces_entry() {
        let mut db = BoardDb::new();
        db.insert("x", option_map([("part", "p0")]));
        db.insert("x", option_map([("part", "p1")]));
        assert_eq!(db.lookup("x").unwrap()["part"].as_str(), Some("p1"));
        assert_eq!(db.boards().count(), 1);
    }
}
