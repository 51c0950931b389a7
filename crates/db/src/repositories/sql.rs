use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row};
use tracing::debug;
use uuid::Uuid;

use claimscope_core::domain::catalog::{CatalogEntry, RegionalPrice, TradeCode};
use claimscope_core::domain::claim::{Briefing, Claim, ClaimId, CoverageSnapshot};
use claimscope_core::domain::inspection::{
    DamageId, DamageObservation, InspectionRoom, InspectionSession, RoomDimensions, RoomId,
    RoomOpening, SessionId,
};
use claimscope_core::domain::scope::{
    NewScopeItem, Provenance, ScopeItem, ScopeItemId, ScopeStatus, ScopeSummary, TradeQuantity,
};
use claimscope_core::errors::StoreError;
use claimscope_core::export::ExportSource;
use claimscope_core::scope::ScopeStore;

use super::{CatalogRepository, InspectionRepository, RepositoryError, ScopeSummaryRepository};
use crate::DbPool;

const DATE_FORMAT: &str = "%Y-%m-%d";

const ROOM_COLUMNS: &str = "id, session_id, name, room_type, structure, length_ft, width_ft, \
     height_ft, damage_count, photo_count, status";

const DAMAGE_COLUMNS: &str =
    "id, room_id, session_id, damage_type, severity, location, description";

const CATALOG_COLUMNS: &str = "code, description, unit, trade_code, default_waste_factor, \
     activity_type, coverage_type, quantity_formula, scope_conditions_json, companion_rules_json, \
     xact_selector, xact_category_code, is_active";

const SCOPE_ITEM_COLUMNS: &str = "id, session_id, room_id, damage_id, catalog_code, description, \
     trade_code, quantity, unit, quantity_formula, provenance, coverage_type, activity_type, \
     waste_factor, status, parent_scope_item_id";

/// SQLite-backed store. Decimals are stored as text to keep them exact.
pub struct SqlStore {
    pool: DbPool,
}

impl SqlStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl InspectionRepository for SqlStore {
    async fn save_claim(&self, claim: Claim) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO claims (
                id, claim_number, insured_name, property_address, city, state, zip,
                date_of_loss, peril_type, policy_number, status
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                claim_number = excluded.claim_number,
                insured_name = excluded.insured_name,
                property_address = excluded.property_address,
                city = excluded.city,
                state = excluded.state,
                zip = excluded.zip,
                date_of_loss = excluded.date_of_loss,
                peril_type = excluded.peril_type,
                policy_number = excluded.policy_number,
                status = excluded.status",
        )
        .bind(&claim.id.0)
        .bind(&claim.claim_number)
        .bind(&claim.insured_name)
        .bind(&claim.property_address)
        .bind(&claim.city)
        .bind(&claim.state)
        .bind(&claim.zip)
        .bind(&claim.date_of_loss)
        .bind(&claim.peril_type)
        .bind(&claim.policy_number)
        .bind(&claim.status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_briefing(&self, briefing: Briefing) -> Result<(), RepositoryError> {
        let snapshot = briefing.coverage_snapshot.unwrap_or_default();
        sqlx::query(
            "INSERT INTO briefings (claim_id, policy_number, deductible) VALUES (?, ?, ?)
             ON CONFLICT(claim_id) DO UPDATE SET
                policy_number = excluded.policy_number,
                deductible = excluded.deductible",
        )
        .bind(&briefing.claim_id.0)
        .bind(&snapshot.policy_number)
        .bind(decimal_text(snapshot.deductible))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_session(&self, session: InspectionSession) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO inspection_sessions (id, claim_id, status, started_on, completed_on)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                claim_id = excluded.claim_id,
                status = excluded.status,
                started_on = excluded.started_on,
                completed_on = excluded.completed_on",
        )
        .bind(&session.id.0)
        .bind(&session.claim_id.0)
        .bind(&session.status)
        .bind(date_text(session.started_on))
        .bind(date_text(session.completed_on))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_room(&self, room: InspectionRoom) -> Result<(), RepositoryError> {
        let dimensions = room.dimensions.unwrap_or_default();
        sqlx::query(
            "INSERT INTO inspection_rooms (
                id, session_id, name, room_type, structure, length_ft, width_ft, height_ft,
                damage_count, photo_count, status, position
             ) VALUES (
                ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                (SELECT COALESCE(MAX(position), 0) + 1 FROM inspection_rooms)
             )
             ON CONFLICT(id) DO UPDATE SET
                session_id = excluded.session_id,
                name = excluded.name,
                room_type = excluded.room_type,
                structure = excluded.structure,
                length_ft = excluded.length_ft,
                width_ft = excluded.width_ft,
                height_ft = excluded.height_ft,
                damage_count = excluded.damage_count,
                photo_count = excluded.photo_count,
                status = excluded.status",
        )
        .bind(&room.id.0)
        .bind(&room.session_id.0)
        .bind(&room.name)
        .bind(&room.room_type)
        .bind(&room.structure)
        .bind(decimal_text(dimensions.length))
        .bind(decimal_text(dimensions.width))
        .bind(decimal_text(dimensions.height))
        .bind(i64::from(room.damage_count))
        .bind(i64::from(room.photo_count))
        .bind(&room.status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_damage(&self, damage: DamageObservation) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO damage_observations (
                id, room_id, session_id, damage_type, severity, location, description
             ) VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                room_id = excluded.room_id,
                session_id = excluded.session_id,
                damage_type = excluded.damage_type,
                severity = excluded.severity,
                location = excluded.location,
                description = excluded.description",
        )
        .bind(&damage.id.0)
        .bind(&damage.room_id.0)
        .bind(&damage.session_id.0)
        .bind(&damage.damage_type)
        .bind(&damage.severity)
        .bind(&damage.location)
        .bind(&damage.description)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_opening(&self, opening: RoomOpening) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO room_openings (
                room_id, opening_type, width_ft, height_ft, quantity, opens_into,
                goes_to_floor, goes_to_ceiling
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&opening.room_id.0)
        .bind(&opening.opening_type)
        .bind(opening.width_ft.to_string())
        .bind(opening.height_ft.to_string())
        .bind(i64::from(opening.quantity))
        .bind(&opening.opens_into)
        .bind(opening.goes_to_floor)
        .bind(opening.goes_to_ceiling)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_room(&self, id: &RoomId) -> Result<Option<InspectionRoom>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {ROOM_COLUMNS} FROM inspection_rooms WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(room_from_row).transpose()
    }

    async fn find_damage(
        &self,
        id: &DamageId,
    ) -> Result<Option<DamageObservation>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {DAMAGE_COLUMNS} FROM damage_observations WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(damage_from_row).transpose()
    }

    async fn damages_for_room(
        &self,
        room_id: &RoomId,
    ) -> Result<Vec<DamageObservation>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {DAMAGE_COLUMNS} FROM damage_observations WHERE room_id = ? ORDER BY rowid"
        ))
        .bind(&room_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(damage_from_row).collect()
    }
}

#[async_trait]
impl CatalogRepository for SqlStore {
    async fn save_catalog_entry(&self, entry: CatalogEntry) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO catalog_entries (
                code, description, unit, trade_code, default_waste_factor, activity_type,
                coverage_type, quantity_formula, scope_conditions_json, companion_rules_json,
                xact_selector, xact_category_code, is_active, position
             ) VALUES (
                ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                (SELECT COALESCE(MAX(position), 0) + 1 FROM catalog_entries)
             )
             ON CONFLICT(code) DO UPDATE SET
                description = excluded.description,
                unit = excluded.unit,
                trade_code = excluded.trade_code,
                default_waste_factor = excluded.default_waste_factor,
                activity_type = excluded.activity_type,
                coverage_type = excluded.coverage_type,
                quantity_formula = excluded.quantity_formula,
                scope_conditions_json = excluded.scope_conditions_json,
                companion_rules_json = excluded.companion_rules_json,
                xact_selector = excluded.xact_selector,
                xact_category_code = excluded.xact_category_code,
                is_active = excluded.is_active",
        )
        .bind(&entry.code)
        .bind(&entry.description)
        .bind(&entry.unit)
        .bind(entry.trade_code.as_str())
        .bind(decimal_text(entry.default_waste_factor))
        .bind(&entry.activity_type)
        .bind(&entry.coverage_type)
        .bind(&entry.quantity_formula)
        .bind(json_text(entry.scope_conditions.as_ref())?)
        .bind(json_text(entry.companion_rules.as_ref())?)
        .bind(&entry.xact_selector)
        .bind(&entry.xact_category_code)
        .bind(entry.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_regional_price(&self, price: RegionalPrice) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO regional_prices (
                line_item_code, region_id, material_cost, labor_cost, equipment_cost,
                effective_date
             ) VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(line_item_code, region_id) DO UPDATE SET
                material_cost = excluded.material_cost,
                labor_cost = excluded.labor_cost,
                equipment_cost = excluded.equipment_cost,
                effective_date = excluded.effective_date",
        )
        .bind(&price.line_item_code)
        .bind(&price.region_id)
        .bind(decimal_text(price.material_cost))
        .bind(decimal_text(price.labor_cost))
        .bind(decimal_text(price.equipment_cost))
        .bind(date_text(price.effective_date))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ScopeSummaryRepository for SqlStore {
    async fn find_scope_summary(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<ScopeSummary>, RepositoryError> {
        let row = sqlx::query(
            "SELECT session_id, active_items, removed_items, rooms_with_scope, trades_json
             FROM scope_summaries WHERE session_id = ?",
        )
        .bind(&session_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(summary_from_row).transpose()
    }
}

impl SqlStore {
    async fn load_catalog(&self, active_only: bool) -> Result<Vec<CatalogEntry>, RepositoryError> {
        let filter = if active_only { "WHERE is_active = 1" } else { "" };
        let rows = sqlx::query(&format!(
            "SELECT {CATALOG_COLUMNS} FROM catalog_entries {filter} ORDER BY position, code"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(catalog_entry_from_row).collect()
    }

    async fn load_scope_items(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<ScopeItem>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SCOPE_ITEM_COLUMNS} FROM scope_items WHERE session_id = ? ORDER BY seq"
        ))
        .bind(&session_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(scope_item_from_row).collect()
    }

    async fn insert_scope_items(
        &self,
        items: Vec<NewScopeItem>,
    ) -> Result<Vec<ScopeItem>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut seq: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(seq), 0) FROM scope_items")
            .fetch_one(&mut *tx)
            .await?;

        let mut created = Vec::with_capacity(items.len());
        for item in items {
            seq += 1;
            let id = ScopeItemId(format!("si-{}", Uuid::new_v4().simple()));
            let result = sqlx::query(
                "INSERT INTO scope_items (
                    id, seq, session_id, room_id, damage_id, catalog_code, description,
                    trade_code, quantity, unit, quantity_formula, provenance, coverage_type,
                    activity_type, waste_factor, status, parent_scope_item_id
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&id.0)
            .bind(seq)
            .bind(&item.session_id.0)
            .bind(&item.room_id.0)
            .bind(item.damage_id.as_ref().map(|damage| damage.0.as_str()))
            .bind(&item.catalog_code)
            .bind(&item.description)
            .bind(item.trade_code.as_str())
            .bind(item.quantity.to_string())
            .bind(&item.unit)
            .bind(&item.quantity_formula)
            .bind(item.provenance.as_str())
            .bind(&item.coverage_type)
            .bind(&item.activity_type)
            .bind(decimal_text(item.waste_factor))
            .bind(item.status.as_str())
            .bind(item.parent_scope_item_id.as_ref().map(|parent| parent.0.as_str()))
            .execute(&mut *tx)
            .await;

            match result {
                Ok(_) => created.push(item.into_item(id)),
                Err(sqlx::Error::Database(error)) if error.is_unique_violation() => {
                    // dropping the transaction rolls back the whole batch
                    return Err(RepositoryError::Conflict {
                        room_id: item.room_id.0,
                        catalog_code: item.catalog_code,
                    });
                }
                Err(error) => return Err(error.into()),
            }
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn store_summary(&self, session_id: &SessionId) -> Result<(), RepositoryError> {
        let items = self.load_scope_items(session_id).await?;
        let summary = ScopeSummary::from_items(session_id, &items);

        sqlx::query(
            "INSERT INTO scope_summaries (
                session_id, active_items, removed_items, rooms_with_scope, trades_json, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET
                active_items = excluded.active_items,
                removed_items = excluded.removed_items,
                rooms_with_scope = excluded.rooms_with_scope,
                trades_json = excluded.trades_json,
                updated_at = excluded.updated_at",
        )
        .bind(&session_id.0)
        .bind(count(summary.active_items))
        .bind(count(summary.removed_items))
        .bind(count(summary.rooms_with_scope))
        .bind(json_text(Some(&summary.trades))?)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(
            event_name = "db.scope_summary.stored",
            session_id = %session_id.0,
            active_items = summary.active_items,
            trades = summary.trades.len(),
            "scope summary stored"
        );
        Ok(())
    }
}

#[async_trait]
impl ScopeStore for SqlStore {
    async fn active_catalog(&self) -> Result<Vec<CatalogEntry>, StoreError> {
        Ok(self.load_catalog(true).await?)
    }

    async fn scope_items_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<ScopeItem>, StoreError> {
        Ok(self.load_scope_items(session_id).await?)
    }

    async fn create_scope_items(
        &self,
        items: Vec<NewScopeItem>,
    ) -> Result<Vec<ScopeItem>, StoreError> {
        Ok(self.insert_scope_items(items).await?)
    }

    async fn recalculate_scope_summary(&self, session_id: &SessionId) -> Result<(), StoreError> {
        Ok(self.store_summary(session_id).await?)
    }
}

#[async_trait]
impl ExportSource for SqlStore {
    async fn find_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<InspectionSession>, StoreError> {
        let row = sqlx::query(
            "SELECT id, claim_id, status, started_on, completed_on
             FROM inspection_sessions WHERE id = ?",
        )
        .bind(&session_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(session_from_row).transpose()?)
    }

    async fn find_claim(&self, claim_id: &ClaimId) -> Result<Option<Claim>, StoreError> {
        let row = sqlx::query(
            "SELECT id, claim_number, insured_name, property_address, city, state, zip,
                    date_of_loss, peril_type, policy_number, status
             FROM claims WHERE id = ?",
        )
        .bind(&claim_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(claim_from_row).transpose()?)
    }

    async fn rooms_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<InspectionRoom>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ROOM_COLUMNS} FROM inspection_rooms WHERE session_id = ? ORDER BY position, id"
        ))
        .bind(&session_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(room_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn openings_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<RoomOpening>, StoreError> {
        let rows = sqlx::query(
            "SELECT o.room_id, o.opening_type, o.width_ft, o.height_ft, o.quantity, o.opens_into,
                    o.goes_to_floor, o.goes_to_ceiling
             FROM room_openings o
             JOIN inspection_rooms r ON r.id = o.room_id
             WHERE r.session_id = ?
             ORDER BY o.id",
        )
        .bind(&session_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(opening_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn find_briefing(&self, claim_id: &ClaimId) -> Result<Option<Briefing>, StoreError> {
        let row = sqlx::query(
            "SELECT claim_id, policy_number, deductible FROM briefings WHERE claim_id = ?",
        )
        .bind(&claim_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(briefing_from_row).transpose()?)
    }

    async fn session_scope_items(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<ScopeItem>, StoreError> {
        Ok(self.load_scope_items(session_id).await?)
    }

    async fn catalog_entries(&self) -> Result<Vec<CatalogEntry>, StoreError> {
        Ok(self.load_catalog(false).await?)
    }

    async fn regional_prices(&self, region_id: &str) -> Result<Vec<RegionalPrice>, StoreError> {
        let rows = sqlx::query(
            "SELECT line_item_code, region_id, material_cost, labor_cost, equipment_cost,
                    effective_date
             FROM regional_prices WHERE region_id = ?
             ORDER BY line_item_code",
        )
        .bind(region_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(price_from_row).collect::<Result<Vec<_>, _>>()?)
    }
}

fn claim_from_row(row: SqliteRow) -> Result<Claim, RepositoryError> {
    Ok(Claim {
        id: ClaimId(row.try_get("id")?),
        claim_number: row.try_get("claim_number")?,
        insured_name: row.try_get("insured_name")?,
        property_address: row.try_get("property_address")?,
        city: row.try_get("city")?,
        state: row.try_get("state")?,
        zip: row.try_get("zip")?,
        date_of_loss: row.try_get("date_of_loss")?,
        peril_type: row.try_get("peril_type")?,
        policy_number: row.try_get("policy_number")?,
        status: row.try_get("status")?,
    })
}

fn briefing_from_row(row: SqliteRow) -> Result<Briefing, RepositoryError> {
    let policy_number: Option<String> = row.try_get("policy_number")?;
    let deductible = parse_decimal("deductible", row.try_get("deductible")?)?;
    let coverage_snapshot = (policy_number.is_some() || deductible.is_some())
        .then_some(CoverageSnapshot { policy_number, deductible });

    Ok(Briefing { claim_id: ClaimId(row.try_get("claim_id")?), coverage_snapshot })
}

fn session_from_row(row: SqliteRow) -> Result<InspectionSession, RepositoryError> {
    Ok(InspectionSession {
        id: SessionId(row.try_get("id")?),
        claim_id: ClaimId(row.try_get("claim_id")?),
        status: row.try_get("status")?,
        started_on: parse_date("started_on", row.try_get("started_on")?)?,
        completed_on: parse_date("completed_on", row.try_get("completed_on")?)?,
    })
}

fn room_from_row(row: SqliteRow) -> Result<InspectionRoom, RepositoryError> {
    let dimensions = RoomDimensions {
        length: parse_decimal("length_ft", row.try_get("length_ft")?)?,
        width: parse_decimal("width_ft", row.try_get("width_ft")?)?,
        height: parse_decimal("height_ft", row.try_get("height_ft")?)?,
    };
    let has_dimensions =
        dimensions.length.is_some() || dimensions.width.is_some() || dimensions.height.is_some();

    Ok(InspectionRoom {
        id: RoomId(row.try_get("id")?),
        session_id: SessionId(row.try_get("session_id")?),
        name: row.try_get("name")?,
        room_type: row.try_get("room_type")?,
        structure: row.try_get("structure")?,
        dimensions: has_dimensions.then_some(dimensions),
        damage_count: parse_u32("damage_count", row.try_get("damage_count")?)?,
        photo_count: parse_u32("photo_count", row.try_get("photo_count")?)?,
        status: row.try_get("status")?,
    })
}

fn damage_from_row(row: SqliteRow) -> Result<DamageObservation, RepositoryError> {
    Ok(DamageObservation {
        id: DamageId(row.try_get("id")?),
        room_id: RoomId(row.try_get("room_id")?),
        session_id: SessionId(row.try_get("session_id")?),
        damage_type: row.try_get("damage_type")?,
        severity: row.try_get("severity")?,
        location: row.try_get("location")?,
        description: row.try_get("description")?,
    })
}

fn opening_from_row(row: SqliteRow) -> Result<RoomOpening, RepositoryError> {
    Ok(RoomOpening {
        room_id: RoomId(row.try_get("room_id")?),
        opening_type: row.try_get("opening_type")?,
        width_ft: parse_decimal("width_ft", row.try_get("width_ft")?)?.unwrap_or_default(),
        height_ft: parse_decimal("height_ft", row.try_get("height_ft")?)?.unwrap_or_default(),
        quantity: parse_u32("quantity", row.try_get("quantity")?)?,
        opens_into: row.try_get("opens_into")?,
        goes_to_floor: row.try_get("goes_to_floor")?,
        goes_to_ceiling: row.try_get("goes_to_ceiling")?,
    })
}

fn catalog_entry_from_row(row: SqliteRow) -> Result<CatalogEntry, RepositoryError> {
    let trade_raw: String = row.try_get("trade_code")?;
    let trade_code = trade_raw
        .parse::<TradeCode>()
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    Ok(CatalogEntry {
        code: row.try_get("code")?,
        description: row.try_get("description")?,
        unit: row.try_get("unit")?,
        trade_code,
        default_waste_factor: parse_decimal(
            "default_waste_factor",
            row.try_get("default_waste_factor")?,
        )?,
        activity_type: row.try_get("activity_type")?,
        coverage_type: row.try_get("coverage_type")?,
        quantity_formula: row.try_get("quantity_formula")?,
        scope_conditions: parse_json("scope_conditions_json", row.try_get("scope_conditions_json")?)?,
        companion_rules: parse_json("companion_rules_json", row.try_get("companion_rules_json")?)?,
        xact_selector: row.try_get("xact_selector")?,
        xact_category_code: row.try_get("xact_category_code")?,
        is_active: row.try_get("is_active")?,
    })
}

fn price_from_row(row: SqliteRow) -> Result<RegionalPrice, RepositoryError> {
    Ok(RegionalPrice {
        line_item_code: row.try_get("line_item_code")?,
        region_id: row.try_get("region_id")?,
        material_cost: parse_decimal("material_cost", row.try_get("material_cost")?)?,
        labor_cost: parse_decimal("labor_cost", row.try_get("labor_cost")?)?,
        equipment_cost: parse_decimal("equipment_cost", row.try_get("equipment_cost")?)?,
        effective_date: parse_date("effective_date", row.try_get("effective_date")?)?,
    })
}

fn scope_item_from_row(row: SqliteRow) -> Result<ScopeItem, RepositoryError> {
    let decode = |error: claimscope_core::errors::DomainError| {
        RepositoryError::Decode(error.to_string())
    };
    let trade_raw: String = row.try_get("trade_code")?;
    let provenance_raw: String = row.try_get("provenance")?;
    let status_raw: String = row.try_get("status")?;
    let quantity_raw: String = row.try_get("quantity")?;

    Ok(ScopeItem {
        id: ScopeItemId(row.try_get("id")?),
        session_id: SessionId(row.try_get("session_id")?),
        room_id: RoomId(row.try_get("room_id")?),
        damage_id: row.try_get::<Option<String>, _>("damage_id")?.map(DamageId),
        catalog_code: row.try_get("catalog_code")?,
        description: row.try_get("description")?,
        trade_code: trade_raw.parse::<TradeCode>().map_err(decode)?,
        quantity: parse_decimal("quantity", Some(quantity_raw))?.unwrap_or_default(),
        unit: row.try_get("unit")?,
        quantity_formula: row.try_get("quantity_formula")?,
        provenance: provenance_raw.parse::<Provenance>().map_err(decode)?,
        coverage_type: row.try_get("coverage_type")?,
        activity_type: row.try_get("activity_type")?,
        waste_factor: parse_decimal("waste_factor", row.try_get("waste_factor")?)?,
        status: status_raw.parse::<ScopeStatus>().map_err(decode)?,
        parent_scope_item_id: row
            .try_get::<Option<String>, _>("parent_scope_item_id")?
            .map(ScopeItemId),
    })
}

fn summary_from_row(row: SqliteRow) -> Result<ScopeSummary, RepositoryError> {
    let trades: Vec<TradeQuantity> =
        parse_json("trades_json", row.try_get("trades_json")?)?.unwrap_or_default();

    Ok(ScopeSummary {
        session_id: Some(SessionId(row.try_get("session_id")?)),
        active_items: parse_usize("active_items", row.try_get("active_items")?)?,
        removed_items: parse_usize("removed_items", row.try_get("removed_items")?)?,
        rooms_with_scope: parse_usize("rooms_with_scope", row.try_get("rooms_with_scope")?)?,
        trades,
    })
}

fn decimal_text(value: Option<Decimal>) -> Option<String> {
    value.map(|value| value.to_string())
}

fn date_text(value: Option<NaiveDate>) -> Option<String> {
    value.map(|value| value.format(DATE_FORMAT).to_string())
}

fn json_text<T: Serialize>(value: Option<&T>) -> Result<Option<String>, RepositoryError> {
    value
        .map(|value| {
            serde_json::to_string(value)
                .map_err(|error| RepositoryError::Decode(format!("could not encode json: {error}")))
        })
        .transpose()
}

fn count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn parse_decimal(column: &str, raw: Option<String>) -> Result<Option<Decimal>, RepositoryError> {
    raw.map(|raw| {
        raw.trim()
            .parse::<Decimal>()
            .map_err(|error| RepositoryError::Decode(format!("invalid decimal in `{column}`: {error}")))
    })
    .transpose()
}

fn parse_date(column: &str, raw: Option<String>) -> Result<Option<NaiveDate>, RepositoryError> {
    raw.map(|raw| {
        NaiveDate::parse_from_str(&raw, DATE_FORMAT)
            .map_err(|error| RepositoryError::Decode(format!("invalid date in `{column}`: {error}")))
    })
    .transpose()
}

fn parse_json<T: DeserializeOwned>(
    column: &str,
    raw: Option<String>,
) -> Result<Option<T>, RepositoryError> {
    raw.map(|raw| {
        serde_json::from_str(&raw)
            .map_err(|error| RepositoryError::Decode(format!("invalid json in `{column}`: {error}")))
    })
    .transpose()
}

fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::Decode(format!("`{column}` out of range: {value}")))
}

fn parse_usize(column: &str, value: i64) -> Result<usize, RepositoryError> {
    usize::try_from(value)
        .map_err(|_| RepositoryError::Decode(format!("`{column}` out of range: {value}")))
}
