use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use claimscope_core::domain::catalog::{CatalogEntry, RegionalPrice};
use claimscope_core::domain::claim::{Briefing, Claim};
use claimscope_core::domain::inspection::{
    DamageObservation, InspectionRoom, InspectionSession, RoomOpening,
};
use claimscope_core::export::ExportSource;

use crate::repositories::{CatalogRepository, InspectionRepository, RepositoryError};

/// Demo claim with one inspection session, two damaged rooms, and a priced catalog.
const DEMO_DATASET_JSON: &str = include_str!("../../../config/fixtures/demo_dataset.json");

/// Seed data for a store: catalog, regional prices, and inspection records.
///
/// Every record is upserted by its key on load, except openings, which are
/// appended.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedDataset {
    #[serde(default)]
    pub catalog: Vec<CatalogEntry>,
    #[serde(default)]
    pub regional_prices: Vec<RegionalPrice>,
    #[serde(default)]
    pub claims: Vec<Claim>,
    #[serde(default)]
    pub briefings: Vec<Briefing>,
    #[serde(default)]
    pub sessions: Vec<InspectionSession>,
    #[serde(default)]
    pub rooms: Vec<InspectionRoom>,
    #[serde(default)]
    pub damages: Vec<DamageObservation>,
    #[serde(default)]
    pub openings: Vec<RoomOpening>,
}

impl SeedDataset {
    pub fn demo() -> Result<Self, RepositoryError> {
        Self::from_json_str(DEMO_DATASET_JSON)
    }

    pub fn from_path(path: &Path) -> Result<Self, RepositoryError> {
        let raw = std::fs::read_to_string(path).map_err(|error| {
            RepositoryError::Decode(format!("could not read seed file {}: {error}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    /// Parses a dataset and rejects records pointing at ids the dataset lacks.
    pub fn from_json_str(raw: &str) -> Result<Self, RepositoryError> {
        let dataset: Self = serde_json::from_str(raw)
            .map_err(|error| RepositoryError::Decode(format!("invalid seed dataset: {error}")))?;
        dataset.check_references()?;
        Ok(dataset)
    }

    fn check_references(&self) -> Result<(), RepositoryError> {
        let codes: HashSet<&str> = self.catalog.iter().map(|entry| entry.code.as_str()).collect();
        let claims: HashSet<&str> = self.claims.iter().map(|claim| claim.id.0.as_str()).collect();
        let sessions: HashSet<&str> =
            self.sessions.iter().map(|session| session.id.0.as_str()).collect();
        let rooms: HashSet<&str> = self.rooms.iter().map(|room| room.id.0.as_str()).collect();

        let dangling = |kind: &str, owner: &str, target: &str| {
            RepositoryError::Decode(format!("{kind} `{owner}` references unknown `{target}`"))
        };

        for price in &self.regional_prices {
            if !codes.contains(price.line_item_code.as_str()) {
                return Err(dangling("price", &price.region_id, &price.line_item_code));
            }
        }
        for briefing in &self.briefings {
            if !claims.contains(briefing.claim_id.0.as_str()) {
                return Err(dangling("briefing", &briefing.claim_id.0, &briefing.claim_id.0));
            }
        }
        for session in &self.sessions {
            if !claims.contains(session.claim_id.0.as_str()) {
                return Err(dangling("session", &session.id.0, &session.claim_id.0));
            }
        }
        for room in &self.rooms {
            if !sessions.contains(room.session_id.0.as_str()) {
                return Err(dangling("room", &room.id.0, &room.session_id.0));
            }
        }
        for damage in &self.damages {
            if !rooms.contains(damage.room_id.0.as_str()) {
                return Err(dangling("damage", &damage.id.0, &damage.room_id.0));
            }
        }
        for opening in &self.openings {
            if !rooms.contains(opening.room_id.0.as_str()) {
                return Err(dangling("opening", &opening.opening_type, &opening.room_id.0));
            }
        }
        Ok(())
    }

    /// Writes the dataset into `store`, parents before children.
    pub async fn load_into<S>(&self, store: &S) -> Result<SeedResult, RepositoryError>
    where
        S: InspectionRepository + CatalogRepository + ?Sized,
    {
        for entry in &self.catalog {
            store.save_catalog_entry(entry.clone()).await?;
        }
        for price in &self.regional_prices {
            store.save_regional_price(price.clone()).await?;
        }
        for claim in &self.claims {
            store.save_claim(claim.clone()).await?;
        }
        for briefing in &self.briefings {
            store.save_briefing(briefing.clone()).await?;
        }
        for session in &self.sessions {
            store.save_session(session.clone()).await?;
        }
        for room in &self.rooms {
            store.save_room(room.clone()).await?;
        }
        for damage in &self.damages {
            store.save_damage(damage.clone()).await?;
        }
        for opening in &self.openings {
            store.save_opening(opening.clone()).await?;
        }

        let result = SeedResult {
            catalog_entries: self.catalog.len(),
            regional_prices: self.regional_prices.len(),
            claims: self.claims.len(),
            sessions: self.sessions.len(),
            rooms: self.rooms.len(),
            damages: self.damages.len(),
            openings: self.openings.len(),
        };
        info!(
            event_name = "db.seed.loaded",
            catalog_entries = result.catalog_entries,
            sessions = result.sessions,
            rooms = result.rooms,
            "seed dataset loaded"
        );
        Ok(result)
    }

    /// Checks that every seeded session, room, catalog code and price can be read back.
    pub async fn verify<S>(&self, store: &S) -> Result<VerificationResult, RepositoryError>
    where
        S: ExportSource + ?Sized,
    {
        let mut checks = Vec::new();

        let stored_codes: HashSet<String> =
            store.catalog_entries().await?.into_iter().map(|entry| entry.code).collect();
        for entry in &self.catalog {
            checks.push((format!("catalog:{}", entry.code), stored_codes.contains(&entry.code)));
        }

        let mut regions: Vec<&str> =
            self.regional_prices.iter().map(|price| price.region_id.as_str()).collect();
        regions.sort_unstable();
        regions.dedup();
        for region in regions {
            let stored: HashSet<String> = store
                .regional_prices(region)
                .await?
                .into_iter()
                .map(|price| price.line_item_code)
                .collect();
            for price in self.regional_prices.iter().filter(|price| price.region_id == region) {
                checks.push((
                    format!("price:{}:{}", region, price.line_item_code),
                    stored.contains(&price.line_item_code),
                ));
            }
        }

        for claim in &self.claims {
            let found = store.find_claim(&claim.id).await?.is_some();
            checks.push((format!("claim:{}", claim.id.0), found));
        }

        for session in &self.sessions {
            let found = store.find_session(&session.id).await?.is_some();
            checks.push((format!("session:{}", session.id.0), found));

            let stored_rooms: HashSet<String> = store
                .rooms_for_session(&session.id)
                .await?
                .into_iter()
                .map(|room| room.id.0)
                .collect();
            for room in self.rooms.iter().filter(|room| room.session_id == session.id) {
                checks.push((format!("room:{}", room.id.0), stored_rooms.contains(&room.id.0)));
            }
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SeedResult {
    pub catalog_entries: usize,
    pub regional_prices: usize,
    pub claims: usize,
    pub sessions: usize,
    pub rooms: usize,
    pub damages: usize,
    pub openings: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}
