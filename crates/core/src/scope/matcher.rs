use std::collections::HashSet;

use crate::domain::catalog::{CatalogEntry, ScopeConditions, TradeCode};
use crate::domain::inspection::{DamageObservation, InspectionRoom};

use super::tables::MatchingTables;

/// Number of generic entries taken when a trade has no usable selectors.
const CONSERVATIVE_DEFAULT_COUNT: usize = 3;

/// Picks assembly candidates for a damage observation.
///
/// Each relevant trade is tried in two tiers: curated entries whose
/// `scope_conditions` accept the observation, and otherwise the generic
/// install entries chosen through the trade's default selectors.
#[derive(Clone, Debug, Default)]
pub struct CatalogMatcher {
    tables: MatchingTables,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct MatchContext<'a> {
    damage_type: &'a str,
    severity: &'a str,
    room_type: &'a str,
    zone_type: &'static str,
}

impl CatalogMatcher {
    pub fn new(tables: MatchingTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &MatchingTables {
        &self.tables
    }

    /// Trades considered for `damage` in `room`, in damage-table order.
    pub fn relevant_trades(
        &self,
        damage: &DamageObservation,
        room: &InspectionRoom,
    ) -> Vec<TradeCode> {
        let damage_trades = self.tables.trades_for_damage(damage.damage_type());
        match self.tables.trades_for_room(room.room_type()) {
            Some(room_trades) => damage_trades
                .iter()
                .copied()
                .filter(|trade| room_trades.contains(trade) || self.tables.is_always_retained(*trade))
                .collect(),
            None => damage_trades.to_vec(),
        }
    }

    /// Ordered candidates, unique by code, drawn from active `catalog` entries.
    pub fn find_candidates<'a>(
        &self,
        catalog: &'a [CatalogEntry],
        damage: &DamageObservation,
        room: &InspectionRoom,
    ) -> Vec<&'a CatalogEntry> {
        let context = MatchContext {
            damage_type: self.tables.canonical_damage_type(damage.damage_type()),
            severity: damage.severity(),
            room_type: room.room_type(),
            zone_type: zone_type(room.room_type()),
        };

        let mut matched = Vec::new();
        let mut seen_codes: HashSet<&str> = HashSet::new();

        for trade in self.relevant_trades(damage, room) {
            let trade_entries: Vec<&CatalogEntry> = catalog
                .iter()
                .filter(|entry| entry.is_active && entry.trade_code == trade)
                .collect();

            let conditioned: Vec<&CatalogEntry> = trade_entries
                .iter()
                .copied()
                .filter(|entry| {
                    entry
                        .scope_conditions
                        .as_ref()
                        .is_some_and(|conditions| conditions_accept(conditions, &context))
                })
                .collect();

            let selected = if conditioned.is_empty() {
                let generic: Vec<&CatalogEntry> = trade_entries
                    .iter()
                    .copied()
                    .filter(|entry| entry.scope_conditions.is_none() && entry.is_install())
                    .collect();
                select_by_default_selectors(&generic, self.tables.default_selectors(trade))
            } else {
                conditioned
            };

            for entry in selected {
                if seen_codes.insert(entry.code.as_str()) {
                    matched.push(entry);
                }
            }
        }

        matched
    }
}

fn zone_type(room_type: &str) -> &'static str {
    if room_type.starts_with("interior_") {
        "interior"
    } else if room_type.starts_with("exterior_") {
        "exterior"
    } else {
        "unknown"
    }
}

fn conditions_accept(conditions: &ScopeConditions, context: &MatchContext<'_>) -> bool {
    accepts(&conditions.damage_types, context.damage_type)
        && accepts(&conditions.severity, context.severity)
        && accepts(&conditions.room_types, context.room_type)
        && accepts(&conditions.zone_types, context.zone_type)
}

fn accepts(allowed: &[String], value: &str) -> bool {
    allowed.is_empty() || allowed.iter().any(|candidate| candidate == value)
}

fn select_by_default_selectors<'a>(
    entries: &[&'a CatalogEntry],
    selectors: &[String],
) -> Vec<&'a CatalogEntry> {
    if entries.is_empty() {
        return Vec::new();
    }

    let conservative = || entries.iter().copied().take(CONSERVATIVE_DEFAULT_COUNT).collect();
    if selectors.is_empty() {
        return conservative();
    }

    let mut selected: Vec<&CatalogEntry> = Vec::new();
    for selector in selectors {
        let selector = selector.to_ascii_lowercase();
        let found = entries.iter().copied().find(|entry| {
            let xact_selector =
                entry.xact_selector.as_deref().unwrap_or_default().to_ascii_lowercase();
            xact_selector.starts_with(&selector)
                || entry.code.to_ascii_lowercase().contains(&selector)
        });
        if let Some(entry) = found {
            if !selected.iter().any(|existing| existing.code == entry.code) {
                selected.push(entry);
            }
        }
    }

    if selected.is_empty() {
        conservative()
    } else {
        selected
    }
}
