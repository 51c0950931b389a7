use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::catalog::{CatalogEntry, MANUAL_FORMULA};
use crate::domain::inspection::{DamageObservation, InspectionRoom};
use crate::domain::scope::{NewScopeItem, Provenance, ScopeItem};
use crate::errors::StoreError;

use super::matcher::CatalogMatcher;
use super::quantity::{GeometryQuantityDeriver, QuantityDeriver};
use super::store::ScopeStore;

/// Hops allowed below a damage-triggered item when following `auto_adds`.
pub const MAX_COMPANION_DEPTH: usize = 3;

const EACH_FORMULA: &str = "EACH";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualQuantityNeeded {
    pub catalog_code: String,
    pub description: String,
    pub unit: String,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeAssemblyResult {
    pub created: Vec<ScopeItem>,
    pub companion_items: Vec<ScopeItem>,
    pub manual_quantity_needed: Vec<ManualQuantityNeeded>,
    pub warnings: Vec<String>,
}

impl ScopeAssemblyResult {
    pub fn total_created(&self) -> usize {
        self.created.len() + self.companion_items.len()
    }
}

enum QuantityResolution {
    Resolved { quantity: Decimal, formula: String },
    Manual { reason: String },
}

struct CompanionFrame {
    item: ScopeItem,
    depth: usize,
    next: usize,
}

/// Turns a damage observation into persisted scope items for its room.
///
/// Missing catalog data and missing geometry degrade into warnings or
/// manual-quantity entries; only store failures are returned as errors.
pub struct ScopeAssembler<S, Q = GeometryQuantityDeriver> {
    store: S,
    matcher: CatalogMatcher,
    deriver: Q,
}

impl<S: ScopeStore> ScopeAssembler<S, GeometryQuantityDeriver> {
    pub fn new(store: S) -> Self {
        Self { store, matcher: CatalogMatcher::default(), deriver: GeometryQuantityDeriver }
    }
}

impl<S, Q> ScopeAssembler<S, Q>
where
    S: ScopeStore,
    Q: QuantityDeriver,
{
    pub fn with_parts(store: S, matcher: CatalogMatcher, deriver: Q) -> Self {
        Self { store, matcher, deriver }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn assemble_scope(
        &self,
        room: &InspectionRoom,
        damage: &DamageObservation,
    ) -> Result<ScopeAssemblyResult, StoreError> {
        self.assemble_scope_with_deduction(room, damage, Decimal::ZERO).await
    }

    /// Same as [`Self::assemble_scope`], subtracting `net_wall_deduction` square
    /// feet (openings) from wall formulas.
    pub async fn assemble_scope_with_deduction(
        &self,
        room: &InspectionRoom,
        damage: &DamageObservation,
        net_wall_deduction: Decimal,
    ) -> Result<ScopeAssemblyResult, StoreError> {
        let session_id = &room.session_id;
        let mut result = ScopeAssemblyResult::default();

        let catalog = self.store.active_catalog().await?;
        let candidates = self.matcher.find_candidates(&catalog, damage, room);

        if candidates.is_empty() {
            let room_type = if room.room_type().is_empty() { "unknown" } else { room.room_type() };
            warn!(
                event_name = "scope.assembly.no_candidates",
                session_id = %session_id.0,
                room_id = %room.id.0,
                damage_type = damage.damage_type(),
                "no catalog entries matched damage observation"
            );
            result.warnings.push(format!(
                "No catalog items found for damage \"{}\" in \"{room_type}\" room. Items can be added manually.",
                damage.damage_type()
            ));
            return Ok(result);
        }

        let existing = self.store.active_scope_items_for_room(session_id, &room.id).await?;
        let active_codes: HashSet<String> =
            existing.iter().map(|item| item.catalog_code.clone()).collect();
        let mut pending_codes: HashSet<String> = HashSet::new();
        let mut to_create = Vec::new();

        for entry in &candidates {
            if active_codes.contains(&entry.code) {
                result
                    .warnings
                    .push(format!("Skipped \"{}\": already in scope for this room.", entry.code));
                continue;
            }

            if let Some(excluded_by) = excluding_code(&entry.code, &candidates, &active_codes) {
                result.warnings.push(format!(
                    "Skipped \"{}\": excluded by active scope item \"{excluded_by}\".",
                    entry.code
                ));
                continue;
            }

            match self.resolve_quantity(entry, room, net_wall_deduction, None) {
                QuantityResolution::Manual { reason } => {
                    result.manual_quantity_needed.push(manual_entry(entry, reason));
                }
                QuantityResolution::Resolved { quantity, .. } if quantity <= Decimal::ZERO => {}
                QuantityResolution::Resolved { quantity, formula } => {
                    pending_codes.insert(entry.code.clone());
                    to_create.push(NewScopeItem::from_catalog(
                        entry,
                        session_id,
                        &room.id,
                        Some(&damage.id),
                        quantity,
                        Some(formula),
                        Provenance::DamageTriggered,
                        None,
                    ));
                }
            }
        }

        if !to_create.is_empty() {
            let created = self.store.create_scope_items(to_create).await?;
            result.created.extend(created);

            let catalog_by_code: HashMap<&str, &CatalogEntry> =
                catalog.iter().map(|entry| (entry.code.as_str(), entry)).collect();
            let mut seen_codes: HashSet<String> =
                active_codes.union(&pending_codes).cloned().collect();

            for primary in result.created.clone() {
                self.expand_companions(
                    primary,
                    room,
                    damage,
                    net_wall_deduction,
                    &catalog_by_code,
                    &mut seen_codes,
                    &mut result,
                )
                .await?;
            }
        }

        self.store.recalculate_scope_summary(session_id).await?;

        info!(
            event_name = "scope.assembly.completed",
            session_id = %session_id.0,
            room_id = %room.id.0,
            damage_id = %damage.id.0,
            created = result.created.len(),
            companions = result.companion_items.len(),
            manual = result.manual_quantity_needed.len(),
            warnings = result.warnings.len(),
            "scope assembly completed"
        );

        Ok(result)
    }

    /// Depth-first walk of `auto_adds`, mirroring recursion with an explicit stack.
    #[allow(clippy::too_many_arguments)]
    async fn expand_companions(
        &self,
        primary: ScopeItem,
        room: &InspectionRoom,
        damage: &DamageObservation,
        net_wall_deduction: Decimal,
        catalog_by_code: &HashMap<&str, &CatalogEntry>,
        seen_codes: &mut HashSet<String>,
        result: &mut ScopeAssemblyResult,
    ) -> Result<(), StoreError> {
        let mut stack = vec![CompanionFrame { item: primary, depth: 0, next: 0 }];

        while let Some(frame) = stack.last_mut() {
            let auto_adds = catalog_by_code
                .get(frame.item.catalog_code.as_str())
                .map(|entry| entry.auto_adds())
                .unwrap_or_default();

            if frame.depth >= MAX_COMPANION_DEPTH || frame.next >= auto_adds.len() {
                stack.pop();
                continue;
            }

            let companion_code = auto_adds[frame.next].clone();
            frame.next += 1;
            let depth = frame.depth;
            let parent_id = frame.item.id.clone();
            let parent_code = frame.item.catalog_code.clone();

            if seen_codes.contains(&companion_code) {
                continue;
            }

            let Some(companion) = catalog_by_code.get(companion_code.as_str()).copied() else {
                warn!(
                    event_name = "scope.companion.missing_catalog",
                    session_id = %room.session_id.0,
                    parent_code = %parent_code,
                    companion_code = %companion_code,
                    "companion code not found in catalog"
                );
                result.warnings.push(format!("Companion \"{companion_code}\" not found in catalog."));
                continue;
            };

            let (quantity, formula) =
                match self.resolve_quantity(companion, room, net_wall_deduction, Some(&parent_code)) {
                    QuantityResolution::Manual { reason } => {
                        result.manual_quantity_needed.push(manual_entry(companion, reason));
                        continue;
                    }
                    QuantityResolution::Resolved { quantity, formula } => (quantity, formula),
                };

            if quantity <= Decimal::ZERO {
                continue;
            }

            seen_codes.insert(companion_code.clone());
            let created = self
                .store
                .create_scope_item(NewScopeItem::from_catalog(
                    companion,
                    &room.session_id,
                    &room.id,
                    Some(&damage.id),
                    quantity,
                    Some(formula),
                    Provenance::CompanionAuto,
                    Some(parent_id),
                ))
                .await?;

            debug!(
                event_name = "scope.companion.created",
                session_id = %room.session_id.0,
                parent_code = %parent_code,
                companion_code = %companion_code,
                depth = depth + 1,
                "companion scope item created"
            );

            result.companion_items.push(created.clone());
            stack.push(CompanionFrame { item: created, depth: depth + 1, next: 0 });
        }

        Ok(())
    }

    fn resolve_quantity(
        &self,
        entry: &CatalogEntry,
        room: &InspectionRoom,
        net_wall_deduction: Decimal,
        companion_of: Option<&str>,
    ) -> QuantityResolution {
        let formula = entry.quantity_formula.as_deref().map(str::trim).filter(|f| !f.is_empty());

        match formula {
            None => QuantityResolution::Resolved {
                quantity: Decimal::ONE,
                formula: EACH_FORMULA.to_string(),
            },
            Some(MANUAL_FORMULA) => QuantityResolution::Manual {
                reason: match companion_of {
                    Some(parent) => format!("Companion of \"{parent}\": manual quantity required"),
                    None => "Manual quantity required".to_string(),
                },
            },
            Some(formula) => match self.deriver.derive(room, formula, net_wall_deduction) {
                Some(derived) => QuantityResolution::Resolved {
                    quantity: derived.quantity,
                    formula: formula.to_string(),
                },
                None => QuantityResolution::Manual {
                    reason: match companion_of {
                        Some(parent) => {
                            format!("Companion of \"{parent}\": room dimensions needed for {formula}")
                        }
                        None => format!("Room dimensions required for {formula} formula"),
                    },
                },
            },
        }
    }
}

/// Code of an active candidate whose companion rules exclude `code`.
fn excluding_code<'a>(
    code: &str,
    candidates: &[&'a CatalogEntry],
    active_codes: &HashSet<String>,
) -> Option<&'a str> {
    candidates
        .iter()
        .filter(|candidate| candidate.code != code && active_codes.contains(&candidate.code))
        .find(|candidate| {
            candidate.companion_rules.as_ref().is_some_and(|rules| rules.excludes_code(code))
        })
        .map(|candidate| candidate.code.as_str())
}

fn manual_entry(entry: &CatalogEntry, reason: String) -> ManualQuantityNeeded {
    ManualQuantityNeeded {
        catalog_code: entry.code.clone(),
        description: entry.description.clone(),
        unit: entry.unit.clone(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use super::{ScopeAssembler, MAX_COMPANION_DEPTH};
    use crate::domain::catalog::{CatalogEntry, CompanionRules, ScopeConditions, TradeCode};
    use crate::domain::inspection::{
        DamageId, DamageObservation, InspectionRoom, RoomDimensions, RoomId, SessionId,
    };
    use crate::domain::scope::{NewScopeItem, Provenance, ScopeItem, ScopeItemId, ScopeStatus};
    use crate::errors::StoreError;
    use crate::scope::store::ScopeStore;

    #[derive(Default)]
    struct RecordingStore {
        catalog: Vec<CatalogEntry>,
        items: Mutex<Vec<ScopeItem>>,
        summary_refreshes: Mutex<usize>,
    }

    impl RecordingStore {
        fn with_catalog(catalog: Vec<CatalogEntry>) -> Self {
            Self { catalog, ..Self::default() }
        }

        fn seed(&self, item: NewScopeItem) {
            let mut items = self.items.lock().expect("items lock");
            let id = ScopeItemId(format!("seed-{}", items.len() + 1));
            items.push(item.into_item(id));
        }

        fn items(&self) -> Vec<ScopeItem> {
            self.items.lock().expect("items lock").clone()
        }

        fn refreshes(&self) -> usize {
            *self.summary_refreshes.lock().expect("summary lock")
        }
    }

    #[async_trait]
    impl ScopeStore for RecordingStore {
        async fn active_catalog(&self) -> Result<Vec<CatalogEntry>, StoreError> {
            Ok(self.catalog.iter().filter(|entry| entry.is_active).cloned().collect())
        }

        async fn scope_items_for_session(
            &self,
            session_id: &SessionId,
        ) -> Result<Vec<ScopeItem>, StoreError> {
            Ok(self.items().into_iter().filter(|item| &item.session_id == session_id).collect())
        }

        async fn create_scope_items(
            &self,
            new_items: Vec<NewScopeItem>,
        ) -> Result<Vec<ScopeItem>, StoreError> {
            let mut items = self.items.lock().expect("items lock");
            let mut created = Vec::new();
            for new_item in new_items {
                let duplicate = items.iter().any(|item| {
                    item.is_active()
                        && item.room_id == new_item.room_id
                        && item.catalog_code == new_item.catalog_code
                });
                if duplicate {
                    return Err(StoreError::Conflict {
                        room_id: new_item.room_id.0.clone(),
                        catalog_code: new_item.catalog_code.clone(),
                    });
                }
                let item = new_item.into_item(ScopeItemId(format!("si-{}", items.len() + 1)));
                items.push(item.clone());
                created.push(item);
            }
            Ok(created)
        }

        async fn recalculate_scope_summary(&self, _session_id: &SessionId) -> Result<(), StoreError> {
            *self.summary_refreshes.lock().expect("summary lock") += 1;
            Ok(())
        }
    }

    fn entry(code: &str, trade: TradeCode, formula: Option<&str>) -> CatalogEntry {
        CatalogEntry {
            code: code.to_string(),
            description: format!("{code} description"),
            unit: "SF".to_string(),
            trade_code: trade,
            default_waste_factor: Some(Decimal::from(10)),
            activity_type: Some("finish".to_string()),
            coverage_type: None,
            quantity_formula: formula.map(str::to_string),
            scope_conditions: None,
            companion_rules: None,
            xact_selector: None,
            xact_category_code: None,
            is_active: true,
        }
    }

    fn water_rule(mut entry: CatalogEntry) -> CatalogEntry {
        entry.scope_conditions = Some(ScopeConditions {
            damage_types: vec!["water".to_string()],
            ..ScopeConditions::default()
        });
        entry
    }

    fn any_damage_rule(mut entry: CatalogEntry) -> CatalogEntry {
        entry.scope_conditions = Some(ScopeConditions::default());
        entry
    }

    fn adds(mut entry: CatalogEntry, codes: &[&str]) -> CatalogEntry {
        let mut rules = entry.companion_rules.unwrap_or_default();
        rules.auto_adds = codes.iter().map(|code| code.to_string()).collect();
        entry.companion_rules = Some(rules);
        entry
    }

    fn excludes(mut entry: CatalogEntry, codes: &[&str]) -> CatalogEntry {
        let mut rules = entry.companion_rules.unwrap_or_default();
        rules.excludes = codes.iter().map(|code| code.to_string()).collect();
        entry.companion_rules = Some(rules);
        entry
    }

    fn kitchen(dimensions: Option<(i64, i64, i64)>) -> InspectionRoom {
        InspectionRoom {
            id: RoomId("room-kitchen".to_string()),
            session_id: SessionId("session-1".to_string()),
            name: "Kitchen".to_string(),
            room_type: Some("interior_kitchen".to_string()),
            structure: Some("Main Dwelling".to_string()),
            dimensions: dimensions.map(|(length, width, height)| RoomDimensions {
                length: Some(Decimal::from(length)),
                width: Some(Decimal::from(width)),
                height: Some(Decimal::from(height)),
            }),
            damage_count: 1,
            photo_count: 0,
            status: "in_progress".to_string(),
        }
    }

    fn damage(damage_type: &str) -> DamageObservation {
        DamageObservation {
            id: DamageId("dmg-1".to_string()),
            room_id: RoomId("room-kitchen".to_string()),
            session_id: SessionId("session-1".to_string()),
            damage_type: Some(damage_type.to_string()),
            severity: Some("moderate".to_string()),
            location: Some("north wall".to_string()),
            description: "water staining behind sink".to_string(),
        }
    }

    fn full_catalog() -> Vec<CatalogEntry> {
        vec![
            adds(
                water_rule(entry("DRY-12-SF", TradeCode::Dry, Some("WALL_SF"))),
                &["DRY-TAPE-SF", "DRY-GHOST"],
            ),
            adds(entry("DRY-TAPE-SF", TradeCode::Dry, Some("WALL_SF")), &["DRY-TEXT-SF"]),
            adds(
                entry("DRY-TEXT-SF", TradeCode::Dry, Some("WALL_SF")),
                &["PNT-PRIM-SF", "DRY-12-SF"],
            ),
            adds(entry("PNT-PRIM-SF", TradeCode::Pnt, Some("WALL_SF")), &["PNT-FINAL-SF"]),
            entry("PNT-FINAL-SF", TradeCode::Pnt, Some("WALL_SF")),
            water_rule(entry("PNT-WALL-SF", TradeCode::Pnt, Some("MANUAL"))),
            excludes(water_rule(entry("FLR-VIN-SF", TradeCode::Flr, Some("FLOOR_SF"))), &[
                "FLR-CAR-SF",
            ]),
            water_rule(entry("FLR-CAR-SF", TradeCode::Flr, Some("FLOOR_SF"))),
        ]
    }

    fn codes(items: &[ScopeItem]) -> Vec<&str> {
        items.iter().map(|item| item.catalog_code.as_str()).collect()
    }

    #[tokio::test]
    async fn assembles_primary_items_and_bounded_companion_chain() {
        let catalog = full_catalog();
        let store = RecordingStore::with_catalog(catalog.clone());
        let room = kitchen(Some((12, 10, 8)));
        let vinyl = catalog.iter().find(|entry| entry.code == "FLR-VIN-SF").expect("vinyl entry");
        store.seed(NewScopeItem::from_catalog(
            vinyl,
            &room.session_id,
            &room.id,
            None,
            Decimal::from(120),
            Some("FLOOR_SF".to_string()),
            Provenance::Manual,
            None,
        ));

        let assembler = ScopeAssembler::new(store);
        let result = assembler
            .assemble_scope(&room, &damage("water_intrusion"))
            .await
            .expect("assembly should succeed");

        assert_eq!(codes(&result.created), vec!["DRY-12-SF"]);
        assert_eq!(result.created[0].quantity, Decimal::from(352));
        assert_eq!(result.created[0].provenance, Provenance::DamageTriggered);
        assert_eq!(result.created[0].parent_scope_item_id, None);
        assert_eq!(result.created[0].quantity_formula.as_deref(), Some("WALL_SF"));

        assert_eq!(codes(&result.companion_items), vec!["DRY-TAPE-SF", "DRY-TEXT-SF", "PNT-PRIM-SF"]);
        assert!(result
            .companion_items
            .iter()
            .all(|item| item.provenance == Provenance::CompanionAuto));
        assert_eq!(
            result.companion_items[0].parent_scope_item_id.as_ref(),
            Some(&result.created[0].id)
        );
        assert_eq!(
            result.companion_items[2].parent_scope_item_id.as_ref(),
            Some(&result.companion_items[1].id)
        );

        assert_eq!(result.manual_quantity_needed.len(), 1);
        assert_eq!(result.manual_quantity_needed[0].catalog_code, "PNT-WALL-SF");
        assert_eq!(result.manual_quantity_needed[0].reason, "Manual quantity required");

        assert_eq!(result.warnings.len(), 3, "warnings: {:?}", result.warnings);
        assert!(result.warnings.iter().any(|w| w.contains("FLR-VIN-SF") && w.contains("already")));
        assert!(result.warnings.iter().any(|w| w.contains("FLR-CAR-SF") && w.contains("excluded")));
        assert!(result.warnings.iter().any(|w| w.contains("DRY-GHOST")));

        let store = assembler.store();
        assert_eq!(store.refreshes(), 1);
        let active = store.items();
        let mut active_codes: Vec<&str> = active
            .iter()
            .filter(|item| item.status == ScopeStatus::Active)
            .map(|item| item.catalog_code.as_str())
            .collect();
        let total = active_codes.len();
        active_codes.sort_unstable();
        active_codes.dedup();
        assert_eq!(active_codes.len(), total, "active codes must be unique per room");
        assert!(!active_codes.contains(&"PNT-FINAL-SF"), "depth bound of {MAX_COMPANION_DEPTH} exceeded");
    }

    #[tokio::test]
    async fn reassembly_skips_everything_already_in_scope() {
        let store = RecordingStore::with_catalog(full_catalog());
        let assembler = ScopeAssembler::new(store);
        let room = kitchen(Some((12, 10, 8)));

        let first = assembler.assemble_scope(&room, &damage("water_intrusion")).await.expect("first");
        let second = assembler.assemble_scope(&room, &damage("water_intrusion")).await.expect("second");

        assert_eq!(first.total_created(), 6, "three primaries and three companions");
        assert_eq!(second.total_created(), 0);
        assert!(second.warnings.iter().any(|w| w.contains("DRY-12-SF") && w.contains("already")));
        assert_eq!(assembler.store().refreshes(), 2);
    }

    #[tokio::test]
    async fn unmatched_damage_returns_single_warning_without_items() {
        let store = RecordingStore::with_catalog(vec![water_rule(entry(
            "HVAC-COIL-EA",
            TradeCode::Hvac,
            None,
        ))]);
        let assembler = ScopeAssembler::new(store);

        let result = assembler
            .assemble_scope(&kitchen(Some((12, 10, 8))), &damage("water_stain"))
            .await
            .expect("assembly should succeed");

        assert_eq!(result.total_created(), 0);
        assert!(result.manual_quantity_needed.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("water_stain"));
        assert!(result.warnings[0].contains("interior_kitchen"));
        assert_eq!(assembler.store().refreshes(), 0);
    }

    #[tokio::test]
    async fn missing_geometry_and_missing_formula_degrade_gracefully() {
        let catalog = vec![
            adds(any_damage_rule(entry("DRY-A-SF", TradeCode::Dry, Some("WALL_SF"))), &["DRY-B"]),
            adds(any_damage_rule(entry("PNT-EA", TradeCode::Pnt, None)), &["PNT-MANUAL", "PNT-WALLS"]),
            entry("PNT-MANUAL", TradeCode::Pnt, Some("MANUAL")),
            entry("PNT-WALLS", TradeCode::Pnt, Some("WALL_SF")),
        ];
        let assembler = ScopeAssembler::new(RecordingStore::with_catalog(catalog));

        let result = assembler
            .assemble_scope(&kitchen(None), &damage("crack"))
            .await
            .expect("assembly should succeed");

        assert_eq!(codes(&result.created), vec!["PNT-EA"]);
        assert_eq!(result.created[0].quantity, Decimal::ONE);
        assert_eq!(result.created[0].quantity_formula.as_deref(), Some("EACH"));
        assert!(result.companion_items.is_empty());

        let manual: Vec<(&str, &str)> = result
            .manual_quantity_needed
            .iter()
            .map(|entry| (entry.catalog_code.as_str(), entry.reason.as_str()))
            .collect();
        assert_eq!(
            manual,
            vec![
                ("DRY-A-SF", "Room dimensions required for WALL_SF formula"),
                ("PNT-MANUAL", "Companion of \"PNT-EA\": manual quantity required"),
                ("PNT-WALLS", "Companion of \"PNT-EA\": room dimensions needed for WALL_SF"),
            ]
        );
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn non_positive_quantities_are_dropped_silently() {
        let catalog = vec![any_damage_rule(entry("DRY-A-SF", TradeCode::Dry, Some("WALL_SF")))];
        let assembler = ScopeAssembler::new(RecordingStore::with_catalog(catalog));

        let result = assembler
            .assemble_scope_with_deduction(
                &kitchen(Some((2, 2, 2))),
                &damage("crack"),
                Decimal::from(500),
            )
            .await
            .expect("assembly should succeed");

        assert_eq!(result.total_created(), 0);
        assert!(result.manual_quantity_needed.is_empty());
        assert!(result.warnings.is_empty());
        assert_eq!(assembler.store().refreshes(), 1);
    }
}
