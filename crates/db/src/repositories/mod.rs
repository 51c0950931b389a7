use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use claimscope_core::domain::catalog::{CatalogEntry, RegionalPrice};
use claimscope_core::domain::claim::{Briefing, Claim};
use claimscope_core::domain::inspection::{
    DamageId, DamageObservation, InspectionRoom, InspectionSession, RoomId, RoomOpening, SessionId,
};
use claimscope_core::domain::scope::ScopeSummary;
use claimscope_core::errors::StoreError;

pub mod memory;
pub mod sql;

pub use memory::InMemoryStore;
pub use sql::SqlStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("active scope item `{catalog_code}` already exists in room `{room_id}`")]
    Conflict { room_id: String, catalog_code: String },
}

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(error) => StoreError::Unavailable(error.to_string()),
            RepositoryError::Decode(message) => StoreError::Decode(message),
            RepositoryError::Conflict { room_id, catalog_code } => {
                StoreError::Conflict { room_id, catalog_code }
            }
        }
    }
}

impl From<StoreError> for RepositoryError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict { room_id, catalog_code } => {
                RepositoryError::Conflict { room_id, catalog_code }
            }
            other => RepositoryError::Decode(other.to_string()),
        }
    }
}

/// Write and lookup side of claims and their field inspections.
#[async_trait]
pub trait InspectionRepository: Send + Sync {
    async fn save_claim(&self, claim: Claim) -> Result<(), RepositoryError>;
    async fn save_briefing(&self, briefing: Briefing) -> Result<(), RepositoryError>;
    async fn save_session(&self, session: InspectionSession) -> Result<(), RepositoryError>;
    async fn save_room(&self, room: InspectionRoom) -> Result<(), RepositoryError>;
    async fn save_damage(&self, damage: DamageObservation) -> Result<(), RepositoryError>;
    async fn save_opening(&self, opening: RoomOpening) -> Result<(), RepositoryError>;

    async fn find_room(&self, id: &RoomId) -> Result<Option<InspectionRoom>, RepositoryError>;
    async fn find_damage(&self, id: &DamageId)
        -> Result<Option<DamageObservation>, RepositoryError>;
    async fn damages_for_room(
        &self,
        room_id: &RoomId,
    ) -> Result<Vec<DamageObservation>, RepositoryError>;
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Replaces any entry with the same code, keeping its original position.
    async fn save_catalog_entry(&self, entry: CatalogEntry) -> Result<(), RepositoryError>;
    /// Replaces any price for the same (code, region).
    async fn save_regional_price(&self, price: RegionalPrice) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ScopeSummaryRepository: Send + Sync {
    async fn find_scope_summary(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<ScopeSummary>, RepositoryError>;
}

/// Total wall area (sq ft) removed by the openings of `room_id`.
pub fn opening_wall_deduction(openings: &[RoomOpening], room_id: &RoomId) -> Decimal {
    openings
        .iter()
        .filter(|opening| &opening.room_id == room_id)
        .map(|opening| opening.width_ft * opening.height_ft * Decimal::from(opening.quantity.max(1)))
        .sum()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use claimscope_core::domain::inspection::{RoomId, RoomOpening};
    use claimscope_core::errors::StoreError;

    use super::{opening_wall_deduction, RepositoryError};

    #[test]
    fn conflict_maps_to_store_conflict() {
        let error = StoreError::from(RepositoryError::Conflict {
            room_id: "room-1".to_string(),
            catalog_code: "DRY-12-SF".to_string(),
        });
        assert_eq!(
            error,
            StoreError::Conflict {
                room_id: "room-1".to_string(),
                catalog_code: "DRY-12-SF".to_string()
            }
        );
        assert!(matches!(
            StoreError::from(RepositoryError::Decode("bad".to_string())),
            StoreError::Decode(_)
        ));
    }

    #[test]
    fn wall_deduction_sums_openings_of_one_room() {
        let opening = |room: &str, quantity: u32| RoomOpening {
            room_id: RoomId(room.to_string()),
            opening_type: "window".to_string(),
            width_ft: Decimal::from(3),
            height_ft: Decimal::from(4),
            quantity,
            opens_into: None,
            goes_to_floor: false,
            goes_to_ceiling: false,
        };
        let openings = vec![opening("room-1", 2), opening("room-1", 0), opening("room-2", 5)];

        assert_eq!(opening_wall_deduction(&openings, &RoomId("room-1".to_string())), Decimal::from(36));
    }
}
