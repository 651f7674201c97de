use serde::{Deserialize, Serialize};

/// Result payload returned by the remote diagnostic API
///
/// The portal never computes these values; it deserializes and displays
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticResult {
    /// Ordinal activity label, e.g. "Moderate"
    pub structural_activity: String,

    /// System status label, e.g. "Stable"
    pub system_status: String,

    /// Efficiency percentage; the API sends integers or floats
    pub efficiency_band: f64,

    /// Free-text description of what the diagnostic covered
    #[serde(default)]
    pub diagnostic_scope: String,
}

impl DiagnosticResult {
    /// Efficiency as shown on the page: `82%`, `82.5%`
    pub fn efficiency_display(&self) -> String {
        format!("{}%", format_number(self.efficiency_band))
    }
}

/// A purchased audit listed under "My reports"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchasedReport {
    pub created_at: String,
    pub amount: f64,

    /// Download link; absent while the report is still being produced
    #[serde(default)]
    pub url: Option<String>,
}

impl PurchasedReport {
    pub fn amount_display(&self) -> String {
        format_number(self.amount)
    }
}

// Whole numbers print without a trailing ".0"
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
