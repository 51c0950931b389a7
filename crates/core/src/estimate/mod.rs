pub mod catalog;
pub mod pricing;
pub mod suggestions;
pub mod validation;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::inspection::RoomId;
use crate::domain::scope::{Provenance, ScopeItem, ScopeItemId};

use self::{
    catalog::{Catalog, PriceBook},
    pricing::{DeterministicPricingEngine, EstimateRates, EstimateTotals, PricedLineItem, PricingEngine},
    suggestions::{get_companion_suggestions, CompanionSuggestion},
    validation::{validate_estimate, EstimateValidation},
};

/// A priced line that remembers which scope item, room and action it came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopedLineItem {
    pub scope_item_id: ScopeItemId,
    pub room_id: RoomId,
    pub provenance: Provenance,
    pub activity_type: String,
    pub selector: Option<String>,
    pub category: Option<String>,
    pub line: PricedLineItem,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedScope {
    pub items: Vec<ScopedLineItem>,
    pub warnings: Vec<String>,
}

impl PricedScope {
    pub fn lines(&self) -> Vec<PricedLineItem> {
        self.items.iter().map(|item| item.line.clone()).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimateReport {
    pub region_id: String,
    pub line_items: Vec<ScopedLineItem>,
    pub totals: EstimateTotals,
    pub validation: EstimateValidation,
    pub suggestions: Vec<CompanionSuggestion>,
    pub warnings: Vec<String>,
}

/// Prices every active scope item against `region_id` rates.
///
/// The item's stored waste factor overrides the catalog default. Items whose
/// code is missing from the catalog are skipped with a warning; items
/// without a regional price are priced at zero.
pub fn price_scope_items<P: PricingEngine>(
    engine: &P,
    items: &[ScopeItem],
    catalog: &Catalog,
    price_book: &PriceBook,
    region_id: &str,
) -> PricedScope {
    let mut priced = PricedScope::default();

    for item in items.iter().filter(|item| item.is_active()) {
        let Some(entry) = catalog.find(&item.catalog_code) else {
            priced.warnings.push(format!(
                "Scope item \"{}\" references unknown catalog code \"{}\"; skipped.",
                item.id.0, item.catalog_code
            ));
            continue;
        };

        let regional_price = price_book.find(&item.catalog_code, region_id);
        if regional_price.is_none() {
            debug!(
                event_name = "estimate.pricing.missing_regional_price",
                session_id = %item.session_id.0,
                catalog_code = %item.catalog_code,
                region_id,
                "no regional price; pricing at zero"
            );
        }

        let line = engine.price_line_item(entry, regional_price, item.quantity, item.waste_factor);
        priced.items.push(ScopedLineItem {
            scope_item_id: item.id.clone(),
            room_id: item.room_id.clone(),
            provenance: item.provenance,
            activity_type: item.activity_type.clone(),
            selector: entry.xact_selector.clone(),
            category: entry.xact_category_code.clone(),
            line,
        });
    }

    priced
}

pub trait EstimateRuntime: Send + Sync {
    fn build_estimate(&self, items: &[ScopeItem], region_id: &str) -> EstimateReport;
}

/// Pricing, validation and suggestions over one catalog and price book.
pub struct DeterministicEstimateRuntime<P = DeterministicPricingEngine> {
    pricing_engine: P,
    catalog: Catalog,
    price_book: PriceBook,
    rates: EstimateRates,
}

impl DeterministicEstimateRuntime<DeterministicPricingEngine> {
    pub fn new(catalog: Catalog, price_book: PriceBook, rates: EstimateRates) -> Self {
        Self::with_engine(DeterministicPricingEngine, catalog, price_book, rates)
    }
}

impl<P> DeterministicEstimateRuntime<P> {
    pub fn with_engine(
        pricing_engine: P,
        catalog: Catalog,
        price_book: PriceBook,
        rates: EstimateRates,
    ) -> Self {
        Self { pricing_engine, catalog, price_book, rates }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

impl<P: PricingEngine> EstimateRuntime for DeterministicEstimateRuntime<P> {
    fn build_estimate(&self, items: &[ScopeItem], region_id: &str) -> EstimateReport {
        let priced =
            price_scope_items(&self.pricing_engine, items, &self.catalog, &self.price_book, region_id);
        let lines = priced.lines();
        let totals = self.pricing_engine.totals(&lines, &self.rates);
        let validation = validate_estimate(&lines);
        let suggestions = get_companion_suggestions(&lines);

        info!(
            event_name = "estimate.built",
            region_id,
            line_items = lines.len(),
            trades = totals.trades_involved.len(),
            qualifies_for_op = totals.qualifies_for_op,
            valid = validation.valid,
            "estimate built"
        );

        EstimateReport {
            region_id: region_id.to_string(),
            line_items: priced.items,
            totals,
            validation,
            suggestions,
            warnings: priced.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{
        catalog::{Catalog, PriceBook},
        pricing::{DeterministicPricingEngine, EstimateRates},
        price_scope_items, DeterministicEstimateRuntime, EstimateRuntime,
    };
    use crate::domain::catalog::{CatalogEntry, RegionalPrice, TradeCode};
    use crate::domain::inspection::{RoomId, SessionId};
    use crate::domain::scope::{NewScopeItem, Provenance, ScopeItem, ScopeItemId, ScopeStatus};

    fn entry(code: &str, trade: TradeCode) -> CatalogEntry {
        CatalogEntry {
            code: code.to_string(),
            description: format!("{code} description"),
            unit: "SF".to_string(),
            trade_code: trade,
            default_waste_factor: Some(Decimal::from(10)),
            activity_type: Some("install".to_string()),
            coverage_type: None,
            quantity_formula: None,
            scope_conditions: None,
            companion_rules: None,
            xact_selector: Some("1/2".to_string()),
            xact_category_code: Some(trade.as_str().to_string()),
            is_active: true,
        }
    }

    fn scope_item(id: &str, entry: &CatalogEntry, quantity: i64, waste: Option<i64>) -> ScopeItem {
        let mut staged = NewScopeItem::from_catalog(
            entry,
            &SessionId("s-1".to_string()),
            &RoomId("room-1".to_string()),
            None,
            Decimal::from(quantity),
            None,
            Provenance::Manual,
            None,
        );
        staged.waste_factor = waste.map(Decimal::from);
        staged.into_item(ScopeItemId(id.to_string()))
    }

    fn unit_rate(code: &str, region: &str, material: i64) -> RegionalPrice {
        RegionalPrice {
            line_item_code: code.to_string(),
            region_id: region.to_string(),
            material_cost: Some(Decimal::from(material)),
            labor_cost: None,
            equipment_cost: None,
            effective_date: None,
        }
    }

    #[test]
    fn prices_active_items_with_stored_waste_and_skips_unknown_codes() {
        let drywall = entry("DRY-12-SF", TradeCode::Dry);
        let paint = entry("PNT-WALL-SF", TradeCode::Pnt);
        let catalog = Catalog::new(vec![drywall.clone(), paint.clone()]);
        let prices = PriceBook::new(vec![
            unit_rate("DRY-12-SF", "US_NATIONAL", 2),
            unit_rate("DRY-12-SF", "US_TX", 100),
        ]);

        let mut removed = scope_item("si-3", &paint, 5, None);
        removed.status = ScopeStatus::Removed;
        let ghost = ScopeItem { catalog_code: "GHOST-EA".to_string(), ..scope_item("si-4", &paint, 1, None) };

        let items = vec![
            scope_item("si-1", &drywall, 100, Some(0)),
            scope_item("si-2", &paint, 10, None),
            removed,
            ghost,
        ];

        let priced = price_scope_items(&DeterministicPricingEngine, &items, &catalog, &prices, "US_NATIONAL");

        assert_eq!(priced.items.len(), 2);
        assert_eq!(priced.items[0].line.total_price, Decimal::from(200));
        assert_eq!(priced.items[0].selector.as_deref(), Some("1/2"));
        assert_eq!(priced.items[0].category.as_deref(), Some("DRY"));
        assert_eq!(priced.items[1].line.total_price, Decimal::ZERO);
        assert_eq!(priced.warnings.len(), 1);
        assert!(priced.warnings[0].contains("GHOST-EA"));
    }

    #[test]
    fn runtime_combines_totals_validation_and_suggestions() {
        let drywall = entry("DRY-12-SF", TradeCode::Dry);
        let runtime = DeterministicEstimateRuntime::new(
            Catalog::new(vec![drywall.clone()]),
            PriceBook::new(vec![unit_rate("DRY-12-SF", "US_NATIONAL", 1)]),
            EstimateRates::default(),
        );

        let report =
            runtime.build_estimate(&[scope_item("si-1", &drywall, 100, None)], "US_NATIONAL");

        assert_eq!(report.totals.subtotal, Decimal::from(110));
        assert!(report.validation.valid);
        assert_eq!(report.validation.warnings.len(), 1);
        assert!(report.suggestions.iter().any(|suggestion| suggestion.code == "DRY-TAPE-SF"));
        assert!(report.warnings.is_empty());
    }
}
