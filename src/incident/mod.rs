// Incident severity

use crate::grid::Coordinate;
use serde::{Deserialize, Serialize};

/// Severity attributes of a burning cell
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Severity {
    pub intensity: u32,
    pub casualties: u32,
}

impl Severity {
    pub fn new(intensity: u32, casualties: u32) -> Self {
        Self {
            intensity,
            casualties,
        }
    }

    /// An incident ends when both attributes reach zero.
    pub fn is_resolved(&self) -> bool {
        self.intensity == 0 && self.casualties == 0
    }
}

/// A fire at one grid location
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub coordinate: Coordinate,
    pub severity: Severity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_only_when_both_zero() {
        assert!(Severity::new(0, 0).is_resolved());
        assert!(!Severity::new(1, 0).is_resolved());
        assert!(!Severity::new(0, 2).is_resolved());
    }
}
