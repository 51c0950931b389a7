use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use claimscope_core::domain::catalog::{CatalogEntry, RegionalPrice};
use claimscope_core::domain::claim::{Briefing, Claim, ClaimId};
use claimscope_core::domain::inspection::{
    DamageId, DamageObservation, InspectionRoom, InspectionSession, RoomId, RoomOpening, SessionId,
};
use claimscope_core::domain::scope::{
    NewScopeItem, ScopeItem, ScopeItemId, ScopeStatus, ScopeSummary,
};
use claimscope_core::errors::StoreError;
use claimscope_core::export::ExportSource;
use claimscope_core::scope::ScopeStore;

use super::{CatalogRepository, InspectionRepository, RepositoryError, ScopeSummaryRepository};

#[derive(Default)]
struct MemoryState {
    claims: HashMap<ClaimId, Claim>,
    briefings: HashMap<ClaimId, Briefing>,
    sessions: HashMap<SessionId, InspectionSession>,
    rooms: Vec<InspectionRoom>,
    damages: Vec<DamageObservation>,
    openings: Vec<RoomOpening>,
    catalog: Vec<CatalogEntry>,
    prices: Vec<RegionalPrice>,
    scope_items: Vec<ScopeItem>,
    summaries: HashMap<SessionId, ScopeSummary>,
}

/// Process-local store for dry runs and tests.
///
/// Keeps insertion order for rooms, catalog entries and scope items so
/// reads match what the SQLite store returns.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn upsert_by<T>(items: &mut Vec<T>, item: T, same: impl Fn(&T, &T) -> bool) {
    match items.iter_mut().find(|existing| same(existing, &item)) {
        Some(existing) => *existing = item,
        None => items.push(item),
    }
}

#[async_trait]
impl InspectionRepository for InMemoryStore {
    async fn save_claim(&self, claim: Claim) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.claims.insert(claim.id.clone(), claim);
        Ok(())
    }

    async fn save_briefing(&self, briefing: Briefing) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.briefings.insert(briefing.claim_id.clone(), briefing);
        Ok(())
    }

    async fn save_session(&self, session: InspectionSession) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn save_room(&self, room: InspectionRoom) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        upsert_by(&mut state.rooms, room, |left, right| left.id == right.id);
        Ok(())
    }

    async fn save_damage(&self, damage: DamageObservation) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        upsert_by(&mut state.damages, damage, |left, right| left.id == right.id);
        Ok(())
    }

    async fn save_opening(&self, opening: RoomOpening) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.openings.push(opening);
        Ok(())
    }

    async fn find_room(&self, id: &RoomId) -> Result<Option<InspectionRoom>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.rooms.iter().find(|room| &room.id == id).cloned())
    }

    async fn find_damage(
        &self,
        id: &DamageId,
    ) -> Result<Option<DamageObservation>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.damages.iter().find(|damage| &damage.id == id).cloned())
    }

    async fn damages_for_room(
        &self,
        room_id: &RoomId,
    ) -> Result<Vec<DamageObservation>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.damages.iter().filter(|damage| &damage.room_id == room_id).cloned().collect())
    }
}

#[async_trait]
impl CatalogRepository for InMemoryStore {
    async fn save_catalog_entry(&self, entry: CatalogEntry) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        upsert_by(&mut state.catalog, entry, |left, right| left.code == right.code);
        Ok(())
    }

    async fn save_regional_price(&self, price: RegionalPrice) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        upsert_by(&mut state.prices, price, |left, right| {
            left.line_item_code == right.line_item_code && left.region_id == right.region_id
        });
        Ok(())
    }
}

#[async_trait]
impl ScopeSummaryRepository for InMemoryStore {
    async fn find_scope_summary(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<ScopeSummary>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.summaries.get(session_id).cloned())
    }
}

#[async_trait]
impl ScopeStore for InMemoryStore {
    async fn active_catalog(&self) -> Result<Vec<CatalogEntry>, StoreError> {
        let state = self.state.read().await;
        Ok(state.catalog.iter().filter(|entry| entry.is_active).cloned().collect())
    }

    async fn scope_items_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<ScopeItem>, StoreError> {
        let state = self.state.read().await;
        Ok(state.scope_items.iter().filter(|item| &item.session_id == session_id).cloned().collect())
    }

    /// All-or-nothing: a conflicting item rejects the whole batch.
    async fn create_scope_items(
        &self,
        items: Vec<NewScopeItem>,
    ) -> Result<Vec<ScopeItem>, StoreError> {
        let mut state = self.state.write().await;

        let mut active: HashSet<(RoomId, String)> = state
            .scope_items
            .iter()
            .filter(|item| item.is_active())
            .map(|item| (item.room_id.clone(), item.catalog_code.clone()))
            .collect();

        let mut created = Vec::with_capacity(items.len());
        for item in items {
            let key = (item.room_id.clone(), item.catalog_code.clone());
            if item.status == ScopeStatus::Active && !active.insert(key) {
                return Err(RepositoryError::Conflict {
                    room_id: item.room_id.0.clone(),
                    catalog_code: item.catalog_code.clone(),
                }
                .into());
            }
            created.push(item.into_item(ScopeItemId(format!("si-{}", Uuid::new_v4().simple()))));
        }

        state.scope_items.extend(created.iter().cloned());
        Ok(created)
    }

    async fn recalculate_scope_summary(&self, session_id: &SessionId) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let items: Vec<ScopeItem> = state
            .scope_items
            .iter()
            .filter(|item| &item.session_id == session_id)
            .cloned()
            .collect();
        state.summaries.insert(session_id.clone(), ScopeSummary::from_items(session_id, &items));
        Ok(())
    }
}

#[async_trait]
impl ExportSource for InMemoryStore {
    async fn find_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<InspectionSession>, StoreError> {
        let state = self.state.read().await;
        Ok(state.sessions.get(session_id).cloned())
    }

    async fn find_claim(&self, claim_id: &ClaimId) -> Result<Option<Claim>, StoreError> {
        let state = self.state.read().await;
        Ok(state.claims.get(claim_id).cloned())
    }

    async fn rooms_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<InspectionRoom>, StoreError> {
        let state = self.state.read().await;
        Ok(state.rooms.iter().filter(|room| &room.session_id == session_id).cloned().collect())
    }

    async fn openings_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<RoomOpening>, StoreError> {
        let state = self.state.read().await;
        let room_ids: HashSet<&RoomId> = state
            .rooms
            .iter()
            .filter(|room| &room.session_id == session_id)
            .map(|room| &room.id)
            .collect();
        Ok(state
            .openings
            .iter()
            .filter(|opening| room_ids.contains(&opening.room_id))
            .cloned()
            .collect())
    }

    async fn find_briefing(&self, claim_id: &ClaimId) -> Result<Option<Briefing>, StoreError> {
        let state = self.state.read().await;
        Ok(state.briefings.get(claim_id).cloned())
    }

    async fn session_scope_items(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<ScopeItem>, StoreError> {
        self.scope_items_for_session(session_id).await
    }

    async fn catalog_entries(&self) -> Result<Vec<CatalogEntry>, StoreError> {
        let state = self.state.read().await;
        Ok(state.catalog.clone())
    }

    async fn regional_prices(&self, region_id: &str) -> Result<Vec<RegionalPrice>, StoreError> {
        let state = self.state.read().await;
        Ok(state.prices.iter().filter(|price| price.region_id == region_id).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use claimscope_core::domain::catalog::{CatalogEntry, TradeCode};
    use claimscope_core::domain::claim::{Claim, ClaimId};
    use claimscope_core::domain::inspection::{
        InspectionRoom, InspectionSession, RoomId, RoomOpening, SessionId,
    };
    use claimscope_core::domain::scope::{NewScopeItem, Provenance};
    use claimscope_core::errors::StoreError;
    use claimscope_core::export::ExportSource;
    use claimscope_core::scope::ScopeStore;

    use super::InMemoryStore;
    use crate::repositories::{CatalogRepository, InspectionRepository, ScopeSummaryRepository};

    fn entry(code: &str, active: bool) -> CatalogEntry {
        CatalogEntry {
            code: code.to_string(),
            description: format!("{code} work"),
            unit: "SF".to_string(),
            trade_code: TradeCode::Dry,
            default_waste_factor: None,
            activity_type: Some("install".to_string()),
            coverage_type: None,
            quantity_formula: None,
            scope_conditions: None,
            companion_rules: None,
            xact_selector: None,
            xact_category_code: None,
            is_active: active,
        }
    }

    fn room(id: &str, session: &str) -> InspectionRoom {
        InspectionRoom {
            id: RoomId(id.to_string()),
            session_id: SessionId(session.to_string()),
            name: id.to_string(),
            room_type: Some("interior_bedroom".to_string()),
            structure: None,
            dimensions: None,
            damage_count: 0,
            photo_count: 0,
            status: "in_progress".to_string(),
        }
    }

    fn staged(room: &str, code: &str) -> NewScopeItem {
        NewScopeItem::from_catalog(
            &entry(code, true),
            &SessionId("s-1".to_string()),
            &RoomId(room.to_string()),
            None,
            Decimal::from(10),
            None,
            Provenance::Manual,
            None,
        )
    }

    #[tokio::test]
    async fn catalog_keeps_insertion_order_and_filters_inactive() {
        let store = InMemoryStore::new();
        store.save_catalog_entry(entry("B", true)).await.expect("save B");
        store.save_catalog_entry(entry("A", false)).await.expect("save A");
        store.save_catalog_entry(entry("C", true)).await.expect("save C");
        store.save_catalog_entry(entry("B", true)).await.expect("replace B");

        let active: Vec<String> = store
            .active_catalog()
            .await
            .expect("active catalog")
            .into_iter()
            .map(|entry| entry.code)
            .collect();
        assert_eq!(active, vec!["B", "C"]);
        assert_eq!(store.catalog_entries().await.expect("all entries").len(), 3);
    }

    #[tokio::test]
    async fn duplicate_active_item_rejects_the_whole_batch() {
        let store = InMemoryStore::new();
        store.create_scope_items(vec![staged("room-1", "DRY-12-SF")]).await.expect("first");

        let result = store
            .create_scope_items(vec![staged("room-1", "PNT-WALL-SF"), staged("room-1", "DRY-12-SF")])
            .await;

        assert!(matches!(result, Err(StoreError::Conflict { ref catalog_code, .. }) if catalog_code == "DRY-12-SF"));
        let items =
            store.scope_items_for_session(&SessionId("s-1".to_string())).await.expect("items");
        assert_eq!(items.len(), 1);

        store.create_scope_item(staged("room-2", "DRY-12-SF")).await.expect("other room is fine");
    }

    #[tokio::test]
    async fn summary_is_recalculated_on_request() {
        let store = InMemoryStore::new();
        let session = SessionId("s-1".to_string());
        store
            .create_scope_items(vec![staged("room-1", "DRY-12-SF"), staged("room-2", "DRY-12-SF")])
            .await
            .expect("create");

        assert_eq!(store.find_scope_summary(&session).await.expect("summary"), None);
        store.recalculate_scope_summary(&session).await.expect("recalculate");

        let summary = store.find_scope_summary(&session).await.expect("summary").expect("present");
        assert_eq!(summary.active_items, 2);
        assert_eq!(summary.rooms_with_scope, 2);
        assert_eq!(summary.trades[0].total_quantity, Decimal::from(20));
    }

    #[tokio::test]
    async fn export_reads_are_scoped_to_the_session() {
        let store = InMemoryStore::new();
        let claim_id = ClaimId("claim-1".to_string());
        store
            .save_claim(Claim {
                id: claim_id.clone(),
                claim_number: "CLM-1".to_string(),
                insured_name: None,
                property_address: None,
                city: None,
                state: None,
                zip: None,
                date_of_loss: None,
                peril_type: None,
                policy_number: None,
                status: "open".to_string(),
            })
            .await
            .expect("claim");
        store
            .save_session(InspectionSession {
                id: SessionId("s-1".to_string()),
                claim_id,
                status: "in_progress".to_string(),
                started_on: None,
                completed_on: None,
            })
            .await
            .expect("session");
        store.save_room(room("kitchen", "s-1")).await.expect("kitchen");
        store.save_room(room("shed", "s-2")).await.expect("shed");
        for room_id in ["kitchen", "shed"] {
            store
                .save_opening(RoomOpening {
                    room_id: RoomId(room_id.to_string()),
                    opening_type: "door".to_string(),
                    width_ft: Decimal::from(3),
                    height_ft: Decimal::from(7),
                    quantity: 1,
                    opens_into: None,
                    goes_to_floor: true,
                    goes_to_ceiling: false,
                })
                .await
                .expect("opening");
        }

        let session = SessionId("s-1".to_string());
        let rooms = store.rooms_for_session(&session).await.expect("rooms");
        let openings = store.openings_for_session(&session).await.expect("openings");

        assert_eq!(rooms.len(), 1);
        assert_eq!(openings.len(), 1);
        assert_eq!(openings[0].room_id, RoomId("kitchen".to_string()));
        assert!(store.find_session(&session).await.expect("session").is_some());
        assert!(store.find_session(&SessionId("s-2".to_string())).await.expect("lookup").is_none());
    }
}
