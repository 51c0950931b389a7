use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::inspection::InspectionRoom;

/// Geometry formulas a catalog entry can name in `quantity_formula`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuantityFormula {
    FloorSf,
    CeilingSf,
    WallSf,
    WallSfNet,
    WallsCeilingSf,
    PerimeterLf,
    CeilingPerimeterLf,
    FloorSy,
    RoofSq,
    VolumeCf,
    Each,
}

impl QuantityFormula {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FloorSf => "FLOOR_SF",
            Self::CeilingSf => "CEILING_SF",
            Self::WallSf => "WALL_SF",
            Self::WallSfNet => "WALL_SF_NET",
            Self::WallsCeilingSf => "WALLS_CEILING_SF",
            Self::PerimeterLf => "PERIMETER_LF",
            Self::CeilingPerimeterLf => "CEILING_PERIMETER_LF",
            Self::FloorSy => "FLOOR_SY",
            Self::RoofSq => "ROOF_SQ",
            Self::VolumeCf => "VOLUME_CF",
            Self::Each => "EACH",
        }
    }

    fn needs_height(self) -> bool {
        matches!(self, Self::WallSf | Self::WallSfNet | Self::WallsCeilingSf | Self::VolumeCf)
    }
}

impl fmt::Display for QuantityFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuantityFormula {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "FLOOR_SF" => Ok(Self::FloorSf),
            "CEILING_SF" => Ok(Self::CeilingSf),
            "WALL_SF" => Ok(Self::WallSf),
            "WALL_SF_NET" => Ok(Self::WallSfNet),
            "WALLS_CEILING_SF" => Ok(Self::WallsCeilingSf),
            "PERIMETER_LF" => Ok(Self::PerimeterLf),
            "CEILING_PERIMETER_LF" => Ok(Self::CeilingPerimeterLf),
            "FLOOR_SY" => Ok(Self::FloorSy),
            "ROOF_SQ" => Ok(Self::RoofSq),
            "VOLUME_CF" => Ok(Self::VolumeCf),
            "EACH" => Ok(Self::Each),
            other => Err(format!("unknown quantity formula `{other}`")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedQuantity {
    pub quantity: Decimal,
    pub formula: String,
}

/// Derives a quantity from room geometry.
///
/// Implementations return `None` when the room does not carry the geometry the
/// formula needs, or when the formula is not one they understand. They never fail.
pub trait QuantityDeriver: Send + Sync {
    fn derive(
        &self,
        room: &InspectionRoom,
        formula: &str,
        net_deduction: Decimal,
    ) -> Option<DerivedQuantity>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct GeometryQuantityDeriver;

impl QuantityDeriver for GeometryQuantityDeriver {
    fn derive(
        &self,
        room: &InspectionRoom,
        formula: &str,
        net_deduction: Decimal,
    ) -> Option<DerivedQuantity> {
        let formula = formula.parse::<QuantityFormula>().ok()?;
        if formula == QuantityFormula::Each {
            return Some(DerivedQuantity { quantity: Decimal::ONE, formula: formula.to_string() });
        }

        let dimensions = room.dimensions?;
        let length = positive(dimensions.length)?;
        let width = positive(dimensions.width)?;
        let height = if formula.needs_height() { positive(dimensions.height)? } else { Decimal::ZERO };

        let floor = length * width;
        let perimeter = (length + width) * Decimal::TWO;
        let walls = (perimeter * height - net_deduction).max(Decimal::ZERO);

        let quantity = match formula {
            QuantityFormula::FloorSf | QuantityFormula::CeilingSf => floor,
            QuantityFormula::WallSf | QuantityFormula::WallSfNet => walls,
            QuantityFormula::WallsCeilingSf => walls + floor,
            QuantityFormula::PerimeterLf | QuantityFormula::CeilingPerimeterLf => perimeter,
            QuantityFormula::FloorSy => floor / Decimal::from(9),
            QuantityFormula::RoofSq => floor / Decimal::ONE_HUNDRED,
            QuantityFormula::VolumeCf => floor * height,
            QuantityFormula::Each => Decimal::ONE,
        };

        Some(DerivedQuantity { quantity: quantity.round_dp(2), formula: formula.to_string() })
    }
}

fn positive(value: Option<Decimal>) -> Option<Decimal> {
    value.filter(|value| *value > Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{GeometryQuantityDeriver, QuantityDeriver};
    use crate::domain::inspection::{InspectionRoom, RoomDimensions, RoomId, SessionId};

    fn room(length: Option<i64>, width: Option<i64>, height: Option<i64>) -> InspectionRoom {
        InspectionRoom {
            id: RoomId("room-1".to_string()),
            session_id: SessionId("s-1".to_string()),
            name: "Kitchen".to_string(),
            room_type: Some("interior_kitchen".to_string()),
            structure: None,
            dimensions: Some(RoomDimensions {
                length: length.map(Decimal::from),
                width: width.map(Decimal::from),
                height: height.map(Decimal::from),
            }),
            damage_count: 0,
            photo_count: 0,
            status: "in_progress".to_string(),
        }
    }

    fn derive(room: &InspectionRoom, formula: &str, deduction: i64) -> Option<Decimal> {
        GeometryQuantityDeriver
            .derive(room, formula, Decimal::from(deduction))
            .map(|derived| derived.quantity)
    }

    #[test]
    fn box_room_formulas_follow_room_geometry() {
        let kitchen = room(Some(12), Some(10), Some(8));

        assert_eq!(derive(&kitchen, "FLOOR_SF", 0), Some(Decimal::from(120)));
        assert_eq!(derive(&kitchen, "WALL_SF", 0), Some(Decimal::from(352)));
        assert_eq!(derive(&kitchen, "WALL_SF_NET", 40), Some(Decimal::from(312)));
        assert_eq!(derive(&kitchen, "WALLS_CEILING_SF", 0), Some(Decimal::from(472)));
        assert_eq!(derive(&kitchen, "PERIMETER_LF", 0), Some(Decimal::from(44)));
        assert_eq!(derive(&kitchen, "FLOOR_SY", 0), Some(Decimal::new(1333, 2)));
        assert_eq!(derive(&kitchen, "ROOF_SQ", 0), Some(Decimal::new(120, 2)));
        assert_eq!(derive(&kitchen, "VOLUME_CF", 0), Some(Decimal::from(960)));
    }

    #[test]
    fn missing_geometry_signals_no_quantity() {
        assert_eq!(derive(&room(Some(12), None, Some(8)), "FLOOR_SF", 0), None);
        assert_eq!(derive(&room(Some(12), Some(10), None), "WALL_SF", 0), None);
        assert_eq!(derive(&room(Some(12), Some(10), None), "FLOOR_SF", 0), Some(Decimal::from(120)));

        let mut no_dimensions = room(None, None, None);
        no_dimensions.dimensions = None;
        assert_eq!(derive(&no_dimensions, "PERIMETER_LF", 0), None);
        assert_eq!(derive(&no_dimensions, "EACH", 0), Some(Decimal::ONE));
    }

    #[test]
    fn unknown_formula_is_not_derivable() {
        assert_eq!(derive(&room(Some(12), Some(10), Some(8)), "STAIR_TREADS", 0), None);
    }

    #[test]
    fn deductions_never_drive_wall_area_negative() {
        assert_eq!(derive(&room(Some(2), Some(2), Some(2)), "WALL_SF", 500), Some(Decimal::ZERO));
    }
}
