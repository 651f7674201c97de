use serde::Serialize;
use std::fmt;

/// Ordinal activity band reported for a structural activity ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ActivityLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl ActivityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLevel::Low => "Low",
            ActivityLevel::Moderate => "Moderate",
            ActivityLevel::High => "High",
            ActivityLevel::Critical => "Critical",
        }
    }
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Executive label replacing an exact change ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum StructuralLabel {
    Stable,
    ElevatedAdaptation,
    Unstable,
}

impl StructuralLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StructuralLabel::Stable => "Structurally Stable",
            StructuralLabel::ElevatedAdaptation => "Elevated Adaptation",
            StructuralLabel::Unstable => "Structurally Unstable",
        }
    }
}

impl fmt::Display for StructuralLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much detail the portal shows for the current run count
///
/// Gating is cosmetic: it throttles what the page renders, it does not
/// limit what the diagnostic API will answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExposureLevel {
    Full,
    Reduced,
    Minimal,
}

impl ExposureLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExposureLevel::Full => "full",
            ExposureLevel::Reduced => "reduced",
            ExposureLevel::Minimal => "minimal",
        }
    }

    /// The trajectory chart is only rendered at full exposure
    pub fn shows_chart(&self) -> bool {
        matches!(self, ExposureLevel::Full)
    }

    /// Free-text diagnostic scope is hidden once exposure is minimal
    pub fn shows_scope(&self) -> bool {
        !matches!(self, ExposureLevel::Minimal)
    }
}

impl fmt::Display for ExposureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify an activity ratio into an ordinal band
///
/// Band edges belong to the upper band, so exactly `0.05` is `Moderate`.
/// NaN fails every comparison and lands in `Critical`.
///
/// # Examples
/// ```
/// use aoc_portal::classify::{classify_activity, ActivityLevel};
///
/// assert_eq!(classify_activity(0.01), ActivityLevel::Low);
/// assert_eq!(classify_activity(0.15), ActivityLevel::High);
/// ```
pub fn classify_activity(x: f64) -> ActivityLevel {
    if x < 0.05 {
        ActivityLevel::Low
    } else if x < 0.15 {
        ActivityLevel::Moderate
    } else if x < 0.35 {
        ActivityLevel::High
    } else {
        ActivityLevel::Critical
    }
}

/// Label a trajectory by the share of steps that changed
///
/// The denominator floors at 1, so `total == 0` is well defined.
pub fn structural_label(changes: u64, total: u64) -> StructuralLabel {
    let ratio = changes as f64 / total.max(1) as f64;

    if ratio < 0.10 {
        StructuralLabel::Stable
    } else if ratio < 0.25 {
        StructuralLabel::ElevatedAdaptation
    } else {
        StructuralLabel::Unstable
    }
}

pub fn get_exposure_level(run_count: u32) -> ExposureLevel {
    if run_count <= 2 {
        ExposureLevel::Full
    } else if run_count <= 5 {
        ExposureLevel::Reduced
    } else {
        ExposureLevel::Minimal
    }
}

/// Count the steps where the trajectory value differs from the previous one
pub fn count_changes(values: &[f64]) -> u64 {
    values.windows(2).filter(|pair| pair[0] != pair[1]).count() as u64
}
