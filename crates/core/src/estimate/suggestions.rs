use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::catalog::TradeCode;

use super::pricing::PricedLineItem;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanionSuggestion {
    pub code: String,
    pub reason: String,
}

const FLOORING_PREFIXES: [&str; 4] = ["FLR-CAR", "FLR-VIN", "FLR-LAM", "FLR-HWD"];

/// Advisory companions missing from an estimate. Never alters scope.
pub fn get_companion_suggestions(items: &[PricedLineItem]) -> Vec<CompanionSuggestion> {
    let codes: HashSet<&str> = items.iter().map(|item| item.code.as_str()).collect();
    let trades: HashSet<TradeCode> = items.iter().map(|item| item.trade_code).collect();
    let mut suggestions = Vec::new();
    let mut suggest = |code: &str, reason: &str| {
        if !codes.contains(code) {
            suggestions
                .push(CompanionSuggestion { code: code.to_string(), reason: reason.to_string() });
        }
    };

    let has_roofing = items
        .iter()
        .any(|item| item.code.starts_with("RFG-SHIN") || item.trade_code == TradeCode::Rfg);
    if has_roofing {
        suggest("RFG-FELT-SQ", "Roofing felt underlayment required with shingle replacement");
        suggest("RFG-ICE-SQ", "Ice & water shield recommended at eaves and valleys");
        suggest("RFG-DRIP-LF", "Drip edge typically replaced with new shingles");
        suggest("RFG-RIDG-LF", "Ridge cap shingles needed for roof replacement");
    }

    let has_drywall = items.iter().any(|item| {
        item.code.starts_with("DRY-")
            && !item.code.starts_with("DRY-TAPE")
            && !item.code.starts_with("DRY-TEXT")
    });
    if has_drywall {
        suggest("DRY-TAPE-SF", "Tape and finish required for new drywall");
        suggest("DRY-TEXT-SF", "Texture match required after drywall replacement");
    }

    let has_flooring = items
        .iter()
        .any(|item| FLOORING_PREFIXES.iter().any(|prefix| item.code.starts_with(prefix)));
    if has_flooring {
        suggest("FLR-ULAY-SF", "Underlayment typically required with new flooring");
        suggest("FLR-BASE-LF", "Baseboard often replaced or reinstalled with new flooring");
    }

    if codes.contains("FLR-CAR-SF") {
        suggest("FLR-CAR-PAD", "Carpet pad required with carpet installation");
    }

    if has_drywall && !trades.contains(&TradeCode::Pnt) {
        suggest("PNT-WALL-SF", "Paint required after drywall replacement");
        suggest("PNT-PRIM-SF", "Primer/sealer recommended for new drywall");
    }

    if items.iter().any(|item| item.code.starts_with("DEM-")) {
        suggest("DEM-HAUL-EA", "Debris haul-off needed for demolished materials");
    }

    let code_prefixes: HashSet<&str> =
        items.iter().filter_map(|item| item.code.split('-').next()).collect();
    if code_prefixes.len() >= 3 {
        suggest("GEN-PROT-SF", "Floor protection recommended for multi-trade projects");
    }

    suggestions
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::get_companion_suggestions;
    use crate::domain::catalog::{CatalogEntry, TradeCode};
    use crate::estimate::pricing::calculate_line_item_price;

    fn item(code: &str, trade: TradeCode) -> crate::estimate::pricing::PricedLineItem {
        let entry = CatalogEntry {
            code: code.to_string(),
            description: code.to_string(),
            unit: "SF".to_string(),
            trade_code: trade,
            default_waste_factor: None,
            activity_type: None,
            coverage_type: None,
            quantity_formula: None,
            scope_conditions: None,
            companion_rules: None,
            xact_selector: None,
            xact_category_code: None,
            is_active: true,
        };
        calculate_line_item_price(&entry, None, Decimal::ONE, None)
    }

    fn codes(items: &[crate::estimate::pricing::PricedLineItem]) -> Vec<String> {
        get_companion_suggestions(items).into_iter().map(|suggestion| suggestion.code).collect()
    }

    #[test]
    fn drywall_without_paint_suggests_finish_and_paint() {
        assert_eq!(
            codes(&[item("DRY-12-SF", TradeCode::Dry), item("DRY-TAPE-SF", TradeCode::Dry)]),
            vec!["DRY-TEXT-SF", "PNT-WALL-SF", "PNT-PRIM-SF"]
        );
    }

    #[test]
    fn carpet_and_demolition_in_three_trades() {
        let suggested = codes(&[
            item("FLR-CAR-SF", TradeCode::Flr),
            item("DEM-FLR-SF", TradeCode::Dem),
            item("MIT-FAN-EA", TradeCode::Mit),
        ]);

        assert_eq!(
            suggested,
            vec!["FLR-ULAY-SF", "FLR-BASE-LF", "FLR-CAR-PAD", "DEM-HAUL-EA", "GEN-PROT-SF"]
        );
    }

    #[test]
    fn complete_roof_needs_nothing_further() {
        let roof: Vec<_> = ["RFG-SHIN-SQ", "RFG-FELT-SQ", "RFG-ICE-SQ", "RFG-DRIP-LF", "RFG-RIDG-LF"]
            .into_iter()
            .map(|code| item(code, TradeCode::Rfg))
            .collect();
        assert!(codes(&roof).is_empty());
    }
}
