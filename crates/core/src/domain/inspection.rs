use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::claim::ClaimId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DamageId(pub String);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InspectionSession {
    pub id: SessionId,
    pub claim_id: ClaimId,
    pub status: String,
    #[serde(default)]
    pub started_on: Option<NaiveDate>,
    #[serde(default)]
    pub completed_on: Option<NaiveDate>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomDimensions {
    #[serde(default)]
    pub length: Option<Decimal>,
    #[serde(default)]
    pub width: Option<Decimal>,
    #[serde(default)]
    pub height: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InspectionRoom {
    pub id: RoomId,
    pub session_id: SessionId,
    pub name: String,
    /// Free-form, prefixed `interior_` or `exterior_` by convention.
    #[serde(default)]
    pub room_type: Option<String>,
    #[serde(default)]
    pub structure: Option<String>,
    #[serde(default)]
    pub dimensions: Option<RoomDimensions>,
    #[serde(default)]
    pub damage_count: u32,
    #[serde(default)]
    pub photo_count: u32,
    #[serde(default = "default_room_status")]
    pub status: String,
}

fn default_room_status() -> String {
    "in_progress".to_string()
}

impl InspectionRoom {
    pub fn room_type(&self) -> &str {
        self.room_type.as_deref().unwrap_or_default()
    }

    pub fn is_exterior(&self) -> bool {
        self.room_type().starts_with("exterior_")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DamageObservation {
    pub id: DamageId,
    pub room_id: RoomId,
    pub session_id: SessionId,
    #[serde(default)]
    pub damage_type: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub description: String,
}

impl DamageObservation {
    pub fn damage_type(&self) -> &str {
        match self.damage_type.as_deref() {
            Some(value) if !value.trim().is_empty() => value,
            _ => "other",
        }
    }

    pub fn severity(&self) -> &str {
        match self.severity.as_deref() {
            Some(value) if !value.trim().is_empty() => value,
            _ => "moderate",
        }
    }
}

/// Door, window, or pass-through cut into a room's walls.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoomOpening {
    pub room_id: RoomId,
    pub opening_type: String,
    #[serde(default)]
    pub width_ft: Decimal,
    #[serde(default)]
    pub height_ft: Decimal,
    #[serde(default = "default_opening_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub opens_into: Option<String>,
    #[serde(default)]
    pub goes_to_floor: bool,
    #[serde(default)]
    pub goes_to_ceiling: bool,
}

fn default_opening_quantity() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::{DamageId, DamageObservation, RoomId, SessionId};

    #[test]
    fn blank_damage_fields_fall_back_to_generic_values() {
        let damage = DamageObservation {
            id: DamageId("dmg-1".to_string()),
            room_id: RoomId("room-1".to_string()),
            session_id: SessionId("s-1".to_string()),
            damage_type: Some("  ".to_string()),
            severity: None,
            location: None,
            description: "stain on ceiling".to_string(),
        };

        assert_eq!(damage.damage_type(), "other");
        assert_eq!(damage.severity(), "moderate");
    }
}
