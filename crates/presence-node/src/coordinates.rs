//! Access point coordinates.
//!
//! Maps access point names to their position in the building, loaded from a
//! JSON object such as:
//!
//! ```text
//! {
//!   "garage":  { "x": 10.0, "y": 0.5,   "z": 2.0 },
//!   "kitchen": { "x": 46.0, "y": -24.0, "z": 2.0 }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use presence_fusion::{AccessPoint, Position};

use crate::error::Result;

/// Name to position lookup for self-identification.
#[derive(Debug, Clone, Default)]
pub struct CoordinateTable {
    positions: HashMap<String, Position>,
}

impl CoordinateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a table from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let positions = serde_json::from_str(json)?;
        Ok(Self { positions })
    }

    /// Load a table from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn insert(&mut self, client_id: impl Into<String>, position: Position) {
        self.positions.insert(client_id.into(), position);
    }

    /// Configured position, or [`Position::UNKNOWN`].
    pub fn position_of(&self, client_id: &str) -> Position {
        self.positions
            .get(client_id)
            .copied()
            .unwrap_or(Position::UNKNOWN)
    }

    /// The access point record this node broadcasts as.
    pub fn self_access_point(&self, client_id: &str) -> AccessPoint {
        AccessPoint::new(client_id, self.position_of(client_id))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn known_name_resolves() {
        let table = CoordinateTable::from_json_str(
            r#"{"garage": {"x": 10.0, "y": 0.5, "z": 2.0}, "tiger": {"x": 53.0, "y": 20.0, "z": -6.0}}"#,
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.position_of("tiger"), Position::new(53.0, 20.0, -6.0));

        let ap = table.self_access_point("garage");
        assert_eq!(ap.client_id, "garage");
        assert_eq!(ap.position, Position::new(10.0, 0.5, 2.0));
    }

    #[test]
    fn unknown_name_gets_sentinel() {
        let table = CoordinateTable::new();
        assert!(table.position_of("attic").is_unknown());
        assert!(table.self_access_point("attic").position.is_unknown());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"study": {{"x": 51.0, "y": 7.0, "z": 2.0}}}}"#).unwrap();

        let table = CoordinateTable::load(file.path()).unwrap();
        assert_eq!(table.position_of("study"), Position::new(51.0, 7.0, 2.0));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(CoordinateTable::from_json_str("[1, 2, 3]").is_err());
    }
}
