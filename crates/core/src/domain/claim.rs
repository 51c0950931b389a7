use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClaimId(pub String);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub claim_number: String,
    #[serde(default)]
    pub insured_name: Option<String>,
    #[serde(default)]
    pub property_address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    /// Kept as entered on the first notice of loss.
    #[serde(default)]
    pub date_of_loss: Option<String>,
    #[serde(default)]
    pub peril_type: Option<String>,
    #[serde(default)]
    pub policy_number: Option<String>,
    #[serde(default = "default_claim_status")]
    pub status: String,
}

fn default_claim_status() -> String {
    "draft".to_string()
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageSnapshot {
    #[serde(default)]
    pub policy_number: Option<String>,
    #[serde(default)]
    pub deductible: Option<Decimal>,
}

/// Pre-inspection briefing; only the coverage snapshot feeds the export.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Briefing {
    pub claim_id: ClaimId,
    #[serde(default)]
    pub coverage_snapshot: Option<CoverageSnapshot>,
}

impl Briefing {
    pub fn deductible(&self) -> Decimal {
        self.coverage_snapshot.as_ref().and_then(|snapshot| snapshot.deductible).unwrap_or_default()
    }

    pub fn policy_number(&self) -> Option<&str> {
        self.coverage_snapshot.as_ref().and_then(|snapshot| snapshot.policy_number.as_deref())
    }
}
