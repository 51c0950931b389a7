use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::claim::Briefing;
use crate::domain::inspection::{InspectionRoom, RoomId};
use crate::domain::scope::Provenance;
use crate::estimate::ScopedLineItem;

use super::ExportSettings;

pub const UNASSIGNED_ROOM: &str = "Unassigned";

/// One line of the detail document with its derived cost split.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemRecord {
    pub room_id: Option<RoomId>,
    pub room_name: String,
    pub code: String,
    pub category: String,
    pub selector: String,
    pub action: String,
    pub description: String,
    pub quantity: Decimal,
    pub unit: String,
    pub labor_total: Decimal,
    pub labor_hours: Decimal,
    pub material: Decimal,
    pub tax: Decimal,
    pub acv_total: Decimal,
    pub rcv_total: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub total_rcv: Decimal,
    pub total_acv: Decimal,
    pub total_depreciation: Decimal,
    pub deductible: Decimal,
    pub line_item_count: usize,
}

impl ExportSummary {
    pub fn from_records(records: &[LineItemRecord], briefing: Option<&Briefing>) -> Self {
        let total_rcv: Decimal = records.iter().map(|record| record.rcv_total).sum();
        let total_acv: Decimal = records.iter().map(|record| record.acv_total).sum();
        Self {
            total_rcv,
            total_acv,
            total_depreciation: total_rcv - total_acv,
            deductible: briefing.map(Briefing::deductible).unwrap_or_default(),
            line_item_count: records.len(),
        }
    }
}

/// Action code written for a line.
///
/// Supplemental exports flag new and modified lines; everything else maps
/// the stored activity, defaulting to replace.
pub fn action_code(provenance: Provenance, activity_type: &str, supplemental: bool) -> &'static str {
    match provenance {
        Provenance::SupplementalNew if supplemental => "ADD",
        Provenance::SupplementalModified if supplemental => "MOD",
        _ => match activity_type.trim().to_ascii_lowercase().as_str() {
            "remove" | "detach" => "-",
            "install" => "+",
            _ => "R",
        },
    }
}

pub fn build_records(
    line_items: &[ScopedLineItem],
    rooms: &[InspectionRoom],
    settings: &ExportSettings,
    supplemental: bool,
) -> Vec<LineItemRecord> {
    let room_names: HashMap<&RoomId, &str> =
        rooms.iter().map(|room| (&room.id, room.name.as_str())).collect();
    let labor_ratio = settings.effective_labor_ratio();
    let material_ratio = Decimal::ONE - labor_ratio;

    line_items
        .iter()
        .map(|item| {
            let line = &item.line;
            let total = line.total_price;
            let room_name = room_names.get(&item.room_id).copied();
            let labor = total * labor_ratio;
            let labor_hours = if settings.labor_rate_per_hour > Decimal::ZERO {
                labor / settings.labor_rate_per_hour
            } else {
                Decimal::ZERO
            };

            LineItemRecord {
                room_id: room_name.map(|_| item.room_id.clone()),
                room_name: room_name.unwrap_or(UNASSIGNED_ROOM).to_string(),
                code: line.code.clone(),
                category: item
                    .category
                    .clone()
                    .unwrap_or_else(|| line.trade_code.as_str().to_string())
                    .to_ascii_uppercase(),
                selector: item.selector.clone().unwrap_or_else(|| line.code.clone()),
                action: action_code(item.provenance, &item.activity_type, supplemental).to_string(),
                description: line.description.clone(),
                quantity: money(line.quantity),
                unit: if line.unit.trim().is_empty() { "EA".to_string() } else { line.unit.clone() },
                labor_total: money(labor),
                labor_hours: money(labor_hours),
                material: money(total * material_ratio),
                tax: money(total * settings.tax_rate),
                acv_total: money(total * settings.acv_ratio),
                rcv_total: money(total),
            }
        })
        .collect()
}

/// Half-away-from-zero to cents, as the interchange format prints it.
pub fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{action_code, build_records, ExportSummary, UNASSIGNED_ROOM};
    use crate::domain::catalog::TradeCode;
    use crate::domain::inspection::{InspectionRoom, RoomId, SessionId};
    use crate::domain::scope::{Provenance, ScopeItemId};
    use crate::estimate::pricing::{PricedLineItem, UnitPriceBreakdown};
    use crate::estimate::ScopedLineItem;
    use crate::export::ExportSettings;

    fn scoped(room: &str, code: &str, total: i64, provenance: Provenance) -> ScopedLineItem {
        ScopedLineItem {
            scope_item_id: ScopeItemId(format!("si-{code}")),
            room_id: RoomId(room.to_string()),
            provenance,
            activity_type: "replace".to_string(),
            selector: None,
            category: None,
            line: PricedLineItem {
                code: code.to_string(),
                description: format!("{code} description"),
                unit: "SF".to_string(),
                quantity: Decimal::from(10),
                unit_price_breakdown: UnitPriceBreakdown {
                    material_cost: Decimal::ZERO,
                    labor_cost: Decimal::ZERO,
                    equipment_cost: Decimal::ZERO,
                    waste_factor: Decimal::ZERO,
                    base_unit_price: Decimal::ZERO,
                    unit_price: Decimal::ZERO,
                },
                total_price: Decimal::from(total),
                trade_code: TradeCode::Dry,
            },
        }
    }

    fn room(id: &str, name: &str) -> InspectionRoom {
        InspectionRoom {
            id: RoomId(id.to_string()),
            session_id: SessionId("s-1".to_string()),
            name: name.to_string(),
            room_type: Some("interior_kitchen".to_string()),
            structure: None,
            dimensions: None,
            damage_count: 0,
            photo_count: 0,
            status: "complete".to_string(),
        }
    }

    #[test]
    fn cost_split_uses_clamped_ratios() {
        let records = build_records(
            &[scoped("room-1", "DRY-12-SF", 1000, Provenance::DamageTriggered)],
            &[room("room-1", "Kitchen")],
            &ExportSettings::default(),
            false,
        );

        let record = &records[0];
        assert_eq!(record.room_name, "Kitchen");
        assert_eq!(record.category, "DRY");
        assert_eq!(record.selector, "DRY-12-SF");
        assert_eq!(record.action, "R");
        assert_eq!(record.labor_total, Decimal::from(350));
        assert_eq!(record.labor_hours, Decimal::new(467, 2));
        assert_eq!(record.material, Decimal::from(650));
        assert_eq!(record.tax, Decimal::from(80));
        assert_eq!(record.acv_total, Decimal::from(700));
        assert_eq!(record.rcv_total, Decimal::from(1000));

        let settings = ExportSettings { labor_ratio: Decimal::new(9, 1), ..ExportSettings::default() };
        let clamped = build_records(
            &[scoped("room-1", "DRY-12-SF", 1000, Provenance::DamageTriggered)],
            &[room("room-1", "Kitchen")],
            &settings,
            false,
        );
        assert_eq!(clamped[0].labor_total, Decimal::from(400));
    }

    #[test]
    fn unknown_rooms_fall_into_unassigned_and_summary_adds_up() {
        let records = build_records(
            &[
                scoped("room-1", "DRY-12-SF", 100, Provenance::DamageTriggered),
                scoped("room-9", "PNT-WALL-SF", 50, Provenance::Manual),
            ],
            &[room("room-1", "Kitchen")],
            &ExportSettings::default(),
            false,
        );

        assert_eq!(records[1].room_name, UNASSIGNED_ROOM);
        assert_eq!(records[1].room_id, None);

        let summary = ExportSummary::from_records(&records, None);
        assert_eq!(summary.total_rcv, Decimal::from(150));
        assert_eq!(summary.total_acv, Decimal::from(105));
        assert_eq!(summary.total_depreciation, Decimal::from(45));
        assert_eq!(summary.deductible, Decimal::ZERO);
        assert_eq!(summary.line_item_count, 2);
    }

    #[test]
    fn supplemental_provenance_only_flags_in_supplemental_mode() {
        assert_eq!(action_code(Provenance::SupplementalNew, "replace", true), "ADD");
        assert_eq!(action_code(Provenance::SupplementalModified, "replace", true), "MOD");
        assert_eq!(action_code(Provenance::SupplementalNew, "replace", false), "R");
        assert_eq!(action_code(Provenance::DamageTriggered, "install", true), "+");
        assert_eq!(action_code(Provenance::Manual, "Remove", false), "-");
        assert_eq!(action_code(Provenance::CompanionAuto, "", false), "R");
    }
}
