use serde::{Deserialize, Serialize};

/// The physical unit of a numeric or textual attribute column (spec §3.4).
/// Kept as a thin label rather than a unit-conversion system: the engine
/// never converts between units, only reports the one the column was
/// registered with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit(pub String);

impl Unit {
    pub const UNKNOWN: &'static str = "unknown";

    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Unit {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for Unit {
    fn default() -> Self {
        Self::unknown()
    }
}
