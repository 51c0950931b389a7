use std::collections::HashMap;

use crate::domain::catalog::TradeCode;

use TradeCode::*;

const FALLBACK_DAMAGE_TYPE: &str = "other";

/// Read-only lookup tables driving catalog matching.
///
/// Built once and shared by reference; nothing mutates them after construction.
#[derive(Clone, Debug)]
pub struct MatchingTables {
    damage_trades: HashMap<String, Vec<TradeCode>>,
    /// Ordered: the first key found inside the room type wins.
    room_trades: Vec<(String, Vec<TradeCode>)>,
    default_selectors: HashMap<TradeCode, Vec<String>>,
    damage_aliases: HashMap<String, String>,
    always_retained: Vec<TradeCode>,
}

impl Default for MatchingTables {
    fn default() -> Self {
        Self::standard()
    }
}

impl MatchingTables {
    pub fn standard() -> Self {
        let damage_trades = [
            ("water_stain", vec![Dry, Pnt, Mit]),
            ("water_intrusion", vec![Dry, Pnt, Flr, Ins, Mit, Dem]),
            ("mold", vec![Dry, Pnt, Mit, Dem, Ins]),
            ("wind_damage", vec![Rfg, Ext, Win, Dry, Pnt]),
            ("hail_impact", vec![Rfg, Ext, Win, Pnt]),
            ("crack", vec![Dry, Pnt, Ext]),
            ("dent", vec![Ext, Win, Cab]),
            ("missing", vec![Rfg, Ext, Win, Dry]),
            ("rot", vec![Ext, Rfg, Dry, Flr, Dem]),
            ("mechanical", vec![Plm, Ele, Hvac]),
            ("wear_tear", vec![Flr, Car, Pnt, Dry]),
            (FALLBACK_DAMAGE_TYPE, vec![Dry, Pnt, Flr, Ext, Rfg]),
        ]
        .into_iter()
        .map(|(damage, trades)| (damage.to_string(), trades))
        .collect();

        let room_trades = [
            ("kitchen", vec![Cab, Ctr, Plm, Ele, Flr]),
            ("bathroom", vec![Plm, Ctr, Flr, Dry]),
            ("bedroom", vec![Dry, Pnt, Flr, Car]),
            ("living", vec![Dry, Pnt, Flr, Car]),
            ("garage", vec![Dry, Ele]),
            ("exterior", vec![Rfg, Ext, Win]),
            ("roof", vec![Rfg]),
            ("attic", vec![Ins, Dry]),
            ("basement", vec![Dry, Flr, Plm, Mit]),
            ("laundry", vec![Plm, Dry, Flr]),
        ]
        .into_iter()
        .map(|(room, trades)| (room.to_string(), trades))
        .collect();

        let default_selectors = [
            (Dry, vec!["1/2", "1/2+", "TAPE", "PRIM", "TEX"]),
            (Rfg, vec!["300", "FELT", "DRIP", "FLASH", "RIDGE"]),
            (Ext, vec!["FCLP", "HWRAP", "CORNER"]),
        ]
        .into_iter()
        .map(|(trade, selectors)| {
            (trade, selectors.into_iter().map(str::to_string).collect::<Vec<_>>())
        })
        .collect();

        let damage_aliases = [
            ("water_stain", "water"),
            ("water_intrusion", "water"),
            ("wind_damage", "wind"),
            ("hail_impact", "hail"),
            ("wear_tear", "general"),
        ]
        .into_iter()
        .map(|(raw, canonical)| (raw.to_string(), canonical.to_string()))
        .collect();

        Self {
            damage_trades,
            room_trades,
            default_selectors,
            damage_aliases,
            always_retained: vec![Dry, Pnt],
        }
    }

    /// Trades implicated by a damage type, falling back to the generic set.
    pub fn trades_for_damage(&self, damage_type: &str) -> &[TradeCode] {
        self.damage_trades
            .get(damage_type)
            .or_else(|| self.damage_trades.get(FALLBACK_DAMAGE_TYPE))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn trades_for_room(&self, room_type: &str) -> Option<&[TradeCode]> {
        let room_type = room_type.to_ascii_lowercase();
        self.room_trades
            .iter()
            .find(|(key, _)| room_type.contains(key.as_str()))
            .map(|(_, trades)| trades.as_slice())
    }

    pub fn default_selectors(&self, trade: TradeCode) -> &[String] {
        self.default_selectors.get(&trade).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn canonical_damage_type<'a>(&'a self, damage_type: &'a str) -> &'a str {
        self.damage_aliases.get(damage_type).map(String::as_str).unwrap_or(damage_type)
    }

    pub fn is_always_retained(&self, trade: TradeCode) -> bool {
        self.always_retained.contains(&trade)
    }
}
