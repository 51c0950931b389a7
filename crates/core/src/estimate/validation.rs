use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::TradeCode;

use super::pricing::PricedLineItem;

/// Outcome of the estimate sanity pass.
///
/// Warnings are advisory sequencing heuristics; only `errors` make the
/// estimate invalid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimateValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Default for EstimateValidation {
    fn default() -> Self {
        Self { valid: true, errors: Vec::new(), warnings: Vec::new() }
    }
}

pub fn validate_estimate(items: &[PricedLineItem]) -> EstimateValidation {
    let mut result = EstimateValidation::default();

    let mut seen_codes: HashSet<&str> = HashSet::new();
    for item in items {
        if !seen_codes.insert(item.code.as_str()) {
            result.warnings.push(format!("Duplicate item: {} appears multiple times", item.code));
        }
    }

    let trades: HashSet<TradeCode> = items.iter().map(|item| item.trade_code).collect();
    if trades.contains(&TradeCode::Dry) && !trades.contains(&TradeCode::Dem) {
        result.warnings.push(
            "Drywall work (DRY) present without Demolition (DEM), verify existing condition"
                .to_string(),
        );
    }
    if trades.contains(&TradeCode::Pnt) && !trades.contains(&TradeCode::Dry) {
        result
            .warnings
            .push("Painting (PNT) present without Drywall (DRY), verify surface prep".to_string());
    }

    for item in items {
        if item.quantity <= Decimal::ZERO {
            result.errors.push(format!("Item {} has invalid quantity", item.code));
        }
    }

    result.valid = result.errors.is_empty();
    result
}
