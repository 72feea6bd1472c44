//! Battery-electric classification of registration records.
//!
//! A record is BEV when its fuel descriptor carries a pure battery-electric
//! marker and neither the descriptor nor the model name carries a hybrid
//! marker. Anything else, including descriptors nothing matches, is not-BEV.

use crate::models::RegistrationRecord;
use regex::Regex;
use tracing::trace;

/// Markers of pure battery-electric propulsion. `BEV` may touch digits
/// (`1000BEV 123456`) but not other letters.
const BEV_PATTERNS: &[&str] = &[
    r"(?:^|[^A-Z])BEV(?:[^A-Z]|$)",
    r"BATTERY[\s-]*ELECTRIC",
    r"FULLY[\s-]*ELECTRIC",
    r"100\s*%\s*ELECTRIC",
];

/// Markers of any hybrid or range-extended drivetrain
const HYBRID_PATTERNS: &[&str] = &[
    r"(?:^|[^A-Z])(?:PHEV|MHEV|FHEV|HEV|REEV|EREV)(?:[^A-Z]|$)",
    r"HYBRID",
    r"HIBRID",
    r"PLUG[\s-]*IN",
    r"RANGE[\s-]*EXTENDER",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Bev,
    NotBev,
}

impl Classification {
    pub fn is_bev(self) -> bool {
        self == Classification::Bev
    }
}

/// Pattern-based BEV classifier with precompiled patterns
#[derive(Debug, Clone)]
pub struct BevClassifier {
    bev: Vec<Regex>,
    hybrid: Vec<Regex>,
}

impl Default for BevClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl BevClassifier {
    pub fn new() -> Self {
        Self {
            bev: compile(BEV_PATTERNS),
            hybrid: compile(HYBRID_PATTERNS),
        }
    }

    pub fn classify(&self, record: &RegistrationRecord) -> Classification {
        let classification = self.classify_descriptor(&record.fuel_code, &[&record.model]);
        trace!(
            make = %record.make,
            model = %record.model,
            fuel_code = %record.fuel_code,
            bev = classification.is_bev(),
            "classified"
        );
        classification
    }

    /// Classify a fuel descriptor. `free_text` fields are only checked for
    /// hybrid markers.
    pub fn classify_descriptor(&self, fuel_code: &str, free_text: &[&str]) -> Classification {
        let fuel = fuel_code.to_uppercase();

        let hybrid = matches_any(&self.hybrid, &fuel)
            || free_text
                .iter()
                .any(|text| matches_any(&self.hybrid, &text.to_uppercase()));
        if hybrid {
            return Classification::NotBev;
        }

        if matches_any(&self.bev, &fuel) {
            Classification::Bev
        } else {
            Classification::NotBev
        }
    }

    pub fn is_bev(&self, record: &RegistrationRecord) -> bool {
        self.classify(record).is_bev()
    }
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
}

fn matches_any(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|re| re.is_match(text))
}
