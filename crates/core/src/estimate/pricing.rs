use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{CatalogEntry, RegionalPrice, TradeCode};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPriceBreakdown {
    /// Component rates below are already scaled by the waste factor.
    pub material_cost: Decimal,
    pub labor_cost: Decimal,
    pub equipment_cost: Decimal,
    pub waste_factor: Decimal,
    pub base_unit_price: Decimal,
    pub unit_price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLineItem {
    pub code: String,
    pub description: String,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_price_breakdown: UnitPriceBreakdown,
    pub total_price: Decimal,
    pub trade_code: TradeCode,
}

impl PricedLineItem {
    /// Dollars added by the waste factor across the whole quantity.
    pub fn waste_amount(&self) -> Decimal {
        if self.unit_price_breakdown.waste_factor <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.total_price - self.unit_price_breakdown.base_unit_price * self.quantity
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimateRates {
    pub tax_rate: Decimal,
    pub overhead_pct: Decimal,
    pub profit_pct: Decimal,
}

impl Default for EstimateRates {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(8, 2),
            overhead_pct: Decimal::new(10, 2),
            profit_pct: Decimal::new(10, 2),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimateTotals {
    pub subtotal_material: Decimal,
    pub subtotal_labor: Decimal,
    pub subtotal_equipment: Decimal,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub waste_included: Decimal,
    /// Subtotal plus tax, without overhead and profit.
    pub grand_total: Decimal,
    pub trades_involved: Vec<TradeCode>,
    pub qualifies_for_op: bool,
    pub overhead_amount: Decimal,
    pub profit_amount: Decimal,
    pub total_with_op: Decimal,
}

/// Distinct trades needed before overhead and profit apply.
pub const OP_TRADE_THRESHOLD: usize = 3;

pub trait PricingEngine: Send + Sync {
    fn price_line_item(
        &self,
        entry: &CatalogEntry,
        regional_price: Option<&RegionalPrice>,
        quantity: Decimal,
        waste_override: Option<Decimal>,
    ) -> PricedLineItem;

    fn totals(&self, items: &[PricedLineItem], rates: &EstimateRates) -> EstimateTotals;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicPricingEngine;

impl PricingEngine for DeterministicPricingEngine {
    fn price_line_item(
        &self,
        entry: &CatalogEntry,
        regional_price: Option<&RegionalPrice>,
        quantity: Decimal,
        waste_override: Option<Decimal>,
    ) -> PricedLineItem {
        calculate_line_item_price(entry, regional_price, quantity, waste_override)
    }

    fn totals(&self, items: &[PricedLineItem], rates: &EstimateRates) -> EstimateTotals {
        calculate_estimate_totals(items, rates)
    }
}

pub fn calculate_line_item_price(
    entry: &CatalogEntry,
    regional_price: Option<&RegionalPrice>,
    quantity: Decimal,
    waste_override: Option<Decimal>,
) -> PricedLineItem {
    let waste_factor = waste_override.or(entry.default_waste_factor).unwrap_or_default();
    let multiplier = Decimal::ONE + waste_factor / Decimal::ONE_HUNDRED;

    let material = regional_price.and_then(|price| price.material_cost).unwrap_or_default();
    let labor = regional_price.and_then(|price| price.labor_cost).unwrap_or_default();
    let equipment = regional_price.and_then(|price| price.equipment_cost).unwrap_or_default();

    let base_unit_price = material + labor + equipment;
    let unit_price = base_unit_price * multiplier;

    PricedLineItem {
        code: entry.code.clone(),
        description: entry.description.clone(),
        unit: entry.unit.clone(),
        quantity,
        unit_price_breakdown: UnitPriceBreakdown {
            material_cost: material * multiplier,
            labor_cost: labor * multiplier,
            equipment_cost: equipment * multiplier,
            waste_factor,
            base_unit_price,
            unit_price,
        },
        total_price: unit_price * quantity,
        trade_code: entry.trade_code,
    }
}

pub fn calculate_estimate_totals(items: &[PricedLineItem], rates: &EstimateRates) -> EstimateTotals {
    let mut totals = EstimateTotals::default();
    let mut trades = BTreeSet::new();

    for item in items {
        let breakdown = &item.unit_price_breakdown;
        totals.subtotal_material += breakdown.material_cost * item.quantity;
        totals.subtotal_labor += breakdown.labor_cost * item.quantity;
        totals.subtotal_equipment += breakdown.equipment_cost * item.quantity;
        totals.waste_included += item.waste_amount();
        trades.insert(item.trade_code);
    }

    totals.subtotal = totals.subtotal_material + totals.subtotal_labor + totals.subtotal_equipment;
    totals.tax_amount = totals.subtotal * rates.tax_rate;
    totals.grand_total = totals.subtotal + totals.tax_amount;

    totals.qualifies_for_op = trades.len() >= OP_TRADE_THRESHOLD;
    if totals.qualifies_for_op {
        totals.overhead_amount = totals.subtotal * rates.overhead_pct;
        totals.profit_amount = totals.subtotal * rates.profit_pct;
    }
    totals.total_with_op =
        totals.subtotal + totals.tax_amount + totals.overhead_amount + totals.profit_amount;
    totals.trades_involved = trades.into_iter().collect();
    totals
}
