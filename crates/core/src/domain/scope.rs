use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{CatalogEntry, TradeCode};
use crate::domain::inspection::{DamageId, RoomId, SessionId};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeItemId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    DamageTriggered,
    CompanionAuto,
    Manual,
    SupplementalNew,
    SupplementalModified,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DamageTriggered => "damage_triggered",
            Self::CompanionAuto => "companion_auto",
            Self::Manual => "manual",
            Self::SupplementalNew => "supplemental_new",
            Self::SupplementalModified => "supplemental_modified",
        }
    }
}

impl FromStr for Provenance {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "damage_triggered" => Ok(Self::DamageTriggered),
            "companion_auto" => Ok(Self::CompanionAuto),
            "manual" => Ok(Self::Manual),
            "supplemental_new" => Ok(Self::SupplementalNew),
            "supplemental_modified" => Ok(Self::SupplementalModified),
            other => {
                Err(DomainError::InvariantViolation(format!("unknown scope provenance `{other}`")))
            }
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeStatus {
    Active,
    Removed,
}

impl ScopeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Removed => "removed",
        }
    }
}

impl FromStr for ScopeStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "removed" => Ok(Self::Removed),
            other => {
                Err(DomainError::InvariantViolation(format!("unknown scope status `{other}`")))
            }
        }
    }
}

/// Scope item as staged by the assembler, before the store assigns an id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewScopeItem {
    pub session_id: SessionId,
    pub room_id: RoomId,
    pub damage_id: Option<DamageId>,
    pub catalog_code: String,
    pub description: String,
    pub trade_code: TradeCode,
    pub quantity: Decimal,
    pub unit: String,
    pub quantity_formula: Option<String>,
    pub provenance: Provenance,
    pub coverage_type: String,
    pub activity_type: String,
    pub waste_factor: Option<Decimal>,
    pub status: ScopeStatus,
    pub parent_scope_item_id: Option<ScopeItemId>,
}

impl NewScopeItem {
    /// Stages an active item for `entry`, copying its catalog defaults.
    #[allow(clippy::too_many_arguments)]
    pub fn from_catalog(
        entry: &CatalogEntry,
        session_id: &SessionId,
        room_id: &RoomId,
        damage_id: Option<&DamageId>,
        quantity: Decimal,
        quantity_formula: Option<String>,
        provenance: Provenance,
        parent_scope_item_id: Option<ScopeItemId>,
    ) -> Self {
        Self {
            session_id: session_id.clone(),
            room_id: room_id.clone(),
            damage_id: damage_id.cloned(),
            catalog_code: entry.code.clone(),
            description: entry.description.clone(),
            trade_code: entry.trade_code,
            quantity,
            unit: entry.unit.clone(),
            quantity_formula,
            provenance,
            coverage_type: entry.coverage_type.clone().unwrap_or_else(|| "A".to_string()),
            activity_type: entry.activity_type.clone().unwrap_or_else(|| "replace".to_string()),
            waste_factor: entry.default_waste_factor,
            status: ScopeStatus::Active,
            parent_scope_item_id,
        }
    }

    pub fn into_item(self, id: ScopeItemId) -> ScopeItem {
        ScopeItem {
            id,
            session_id: self.session_id,
            room_id: self.room_id,
            damage_id: self.damage_id,
            catalog_code: self.catalog_code,
            description: self.description,
            trade_code: self.trade_code,
            quantity: self.quantity,
            unit: self.unit,
            quantity_formula: self.quantity_formula,
            provenance: self.provenance,
            coverage_type: self.coverage_type,
            activity_type: self.activity_type,
            waste_factor: self.waste_factor,
            status: self.status,
            parent_scope_item_id: self.parent_scope_item_id,
        }
    }
}

/// A persisted unit of repair work.
///
/// `parent_scope_item_id` is a lookup key into the same store, never an owning
/// reference; removing a parent leaves its companions untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScopeItem {
    pub id: ScopeItemId,
    pub session_id: SessionId,
    pub room_id: RoomId,
    pub damage_id: Option<DamageId>,
    pub catalog_code: String,
    pub description: String,
    pub trade_code: TradeCode,
    pub quantity: Decimal,
    pub unit: String,
    pub quantity_formula: Option<String>,
    pub provenance: Provenance,
    pub coverage_type: String,
    pub activity_type: String,
    pub waste_factor: Option<Decimal>,
    pub status: ScopeStatus,
    pub parent_scope_item_id: Option<ScopeItemId>,
}

impl ScopeItem {
    pub fn is_active(&self) -> bool {
        self.status == ScopeStatus::Active
    }
}

/// Per-session aggregate refreshed after every assembly run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeSummary {
    pub session_id: Option<SessionId>,
    pub active_items: usize,
    pub removed_items: usize,
    pub rooms_with_scope: usize,
    pub trades: Vec<TradeQuantity>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradeQuantity {
    pub trade_code: TradeCode,
    pub item_count: usize,
    pub total_quantity: Decimal,
}

impl ScopeSummary {
    /// Rolls up `items` the way the session summary is persisted.
    pub fn from_items(session_id: &SessionId, items: &[ScopeItem]) -> Self {
        let mut summary =
            ScopeSummary { session_id: Some(session_id.clone()), ..ScopeSummary::default() };
        let mut rooms = std::collections::BTreeSet::new();
        let mut trades: std::collections::BTreeMap<TradeCode, TradeQuantity> =
            std::collections::BTreeMap::new();

        for item in items {
            if !item.is_active() {
                summary.removed_items += 1;
                continue;
            }
            summary.active_items += 1;
            rooms.insert(item.room_id.clone());
            let entry = trades.entry(item.trade_code).or_insert_with(|| TradeQuantity {
                trade_code: item.trade_code,
                item_count: 0,
                total_quantity: Decimal::ZERO,
            });
            entry.item_count += 1;
            entry.total_quantity += item.quantity;
        }

        summary.rooms_with_scope = rooms.len();
        summary.trades = trades.into_values().collect();
        summary
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{Provenance, ScopeItem, ScopeItemId, ScopeStatus, ScopeSummary};
    use crate::domain::catalog::TradeCode;
    use crate::domain::inspection::{RoomId, SessionId};

    fn item(id: &str, room: &str, trade: TradeCode, qty: i64, status: ScopeStatus) -> ScopeItem {
        ScopeItem {
            id: ScopeItemId(id.to_string()),
            session_id: SessionId("s-1".to_string()),
            room_id: RoomId(room.to_string()),
            damage_id: None,
            catalog_code: format!("{trade}-{id}"),
            description: "fixture".to_string(),
            trade_code: trade,
            quantity: Decimal::from(qty),
            unit: "SF".to_string(),
            quantity_formula: None,
            provenance: Provenance::Manual,
            coverage_type: "A".to_string(),
            activity_type: "replace".to_string(),
            waste_factor: None,
            status,
            parent_scope_item_id: None,
        }
    }

    #[test]
    fn summary_counts_only_active_items_toward_trades() {
        let items = vec![
            item("1", "kitchen", TradeCode::Dry, 100, ScopeStatus::Active),
            item("2", "kitchen", TradeCode::Dry, 20, ScopeStatus::Active),
            item("3", "bath", TradeCode::Pnt, 50, ScopeStatus::Active),
            item("4", "bath", TradeCode::Flr, 80, ScopeStatus::Removed),
        ];

        let summary = ScopeSummary::from_items(&SessionId("s-1".to_string()), &items);

        assert_eq!(summary.active_items, 3);
        assert_eq!(summary.removed_items, 1);
        assert_eq!(summary.rooms_with_scope, 2);
        assert_eq!(summary.trades.len(), 2);
        assert_eq!(summary.trades[0].trade_code, TradeCode::Dry);
        assert_eq!(summary.trades[0].total_quantity, Decimal::from(120));
    }

    #[test]
    fn provenance_parses_its_storage_form() {
        assert_eq!("companion_auto".parse::<Provenance>().ok(), Some(Provenance::CompanionAuto));
        assert!("bogus".parse::<Provenance>().is_err());
    }
}
