use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Formula label meaning the quantity must be entered by the adjuster.
pub const MANUAL_FORMULA: &str = "MANUAL";

/// Construction discipline a catalog entry belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeCode {
    Mit,
    Dem,
    Dry,
    Pnt,
    Flr,
    Ins,
    Car,
    Cab,
    Ctr,
    Rfg,
    Win,
    Ext,
    Ele,
    Plm,
    Hvac,
    Gen,
}

impl TradeCode {
    pub const ALL: [TradeCode; 16] = [
        TradeCode::Mit,
        TradeCode::Dem,
        TradeCode::Dry,
        TradeCode::Pnt,
        TradeCode::Flr,
        TradeCode::Ins,
        TradeCode::Car,
        TradeCode::Cab,
        TradeCode::Ctr,
        TradeCode::Rfg,
        TradeCode::Win,
        TradeCode::Ext,
        TradeCode::Ele,
        TradeCode::Plm,
        TradeCode::Hvac,
        TradeCode::Gen,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mit => "MIT",
            Self::Dem => "DEM",
            Self::Dry => "DRY",
            Self::Pnt => "PNT",
            Self::Flr => "FLR",
            Self::Ins => "INS",
            Self::Car => "CAR",
            Self::Cab => "CAB",
            Self::Ctr => "CTR",
            Self::Rfg => "RFG",
            Self::Win => "WIN",
            Self::Ext => "EXT",
            Self::Ele => "ELE",
            Self::Plm => "PLM",
            Self::Hvac => "HVAC",
            Self::Gen => "GEN",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Mit => "Mitigation",
            Self::Dem => "Demolition",
            Self::Dry => "Drywall",
            Self::Pnt => "Painting",
            Self::Flr => "Flooring",
            Self::Ins => "Insulation",
            Self::Car => "Carpentry",
            Self::Cab => "Cabinetry",
            Self::Ctr => "Countertops",
            Self::Rfg => "Roofing",
            Self::Win => "Windows",
            Self::Ext => "Exterior",
            Self::Ele => "Electrical",
            Self::Plm => "Plumbing",
            Self::Hvac => "HVAC",
            Self::Gen => "General",
        }
    }
}

impl fmt::Display for TradeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeCode {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|trade| trade.as_str() == normalized)
            .ok_or_else(|| DomainError::UnknownTradeCode(value.to_string()))
    }
}

/// Optional filter narrowing when a curated catalog entry applies.
///
/// An empty list imposes no constraint on its dimension.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeConditions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub damage_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub severity: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub room_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zone_types: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanionRules {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auto_adds: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excludes: Vec<String>,
}

impl CompanionRules {
    pub fn excludes_code(&self, code: &str) -> bool {
        self.excludes.iter().any(|excluded| excluded == code)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub code: String,
    pub description: String,
    pub unit: String,
    pub trade_code: TradeCode,
    #[serde(default)]
    pub default_waste_factor: Option<Decimal>,
    #[serde(default)]
    pub activity_type: Option<String>,
    #[serde(default)]
    pub coverage_type: Option<String>,
    #[serde(default)]
    pub quantity_formula: Option<String>,
    #[serde(default)]
    pub scope_conditions: Option<ScopeConditions>,
    #[serde(default)]
    pub companion_rules: Option<CompanionRules>,
    #[serde(default)]
    pub xact_selector: Option<String>,
    #[serde(default)]
    pub xact_category_code: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl CatalogEntry {
    pub fn is_install(&self) -> bool {
        self.activity_type.as_deref() == Some("install")
    }

    pub fn auto_adds(&self) -> &[String] {
        self.companion_rules.as_ref().map(|rules| rules.auto_adds.as_slice()).unwrap_or(&[])
    }
}

/// Per-unit regional rates for one catalog code.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionalPrice {
    pub line_item_code: String,
    pub region_id: String,
    #[serde(default)]
    pub material_cost: Option<Decimal>,
    #[serde(default)]
    pub labor_cost: Option<Decimal>,
    #[serde(default)]
    pub equipment_cost: Option<Decimal>,
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
}
