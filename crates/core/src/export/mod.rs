pub mod archive;
pub mod records;
pub mod render;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::domain::catalog::{CatalogEntry, RegionalPrice};
use crate::domain::claim::{Briefing, Claim, ClaimId};
use crate::domain::inspection::{InspectionRoom, InspectionSession, RoomOpening, SessionId};
use crate::domain::scope::ScopeItem;
use crate::errors::{ApplicationError, DomainError, StoreError};
use crate::estimate::catalog::{Catalog, PriceBook};
use crate::estimate::pricing::DeterministicPricingEngine;
use crate::estimate::{price_scope_items, ScopedLineItem};

use self::archive::{write_archive, DETAIL_MEMBER, SUMMARY_MEMBER};
use self::records::{build_records, ExportSummary};
use self::render::{CarrierView, InsuredView, TemplateRenderer, XactdocView};

pub use self::archive::{read_detail_items, DetailItem};

const DEFAULT_SUPPLEMENTAL_NOTE: &str = "Supplemental claim";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("inspection session `{0}` not found")]
    SessionNotFound(String),
    #[error("claim `{0}` not found")]
    ClaimNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("template rendering failed: {0}")]
    Template(String),
    #[error("archive failure: {0}")]
    Archive(String),
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ExportError> for ApplicationError {
    fn from(value: ExportError) -> Self {
        match value {
            ExportError::Store(error) => error.into(),
            missing @ (ExportError::SessionNotFound(_) | ExportError::ClaimNotFound(_)) => {
                ApplicationError::Domain(DomainError::InvariantViolation(missing.to_string()))
            }
            other => ApplicationError::Integration(other.to_string()),
        }
    }
}

/// Heuristics and identity used when writing interchange archives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSettings {
    pub region_id: String,
    pub labor_ratio: Decimal,
    pub labor_ratio_floor: Decimal,
    pub labor_ratio_ceiling: Decimal,
    pub acv_ratio: Decimal,
    pub tax_rate: Decimal,
    pub labor_rate_per_hour: Decimal,
    pub carrier_id: String,
    pub carrier_name: String,
    pub price_list: String,
    pub adjuster_name: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            region_id: "US_NATIONAL".to_string(),
            labor_ratio: Decimal::new(35, 2),
            labor_ratio_floor: Decimal::new(20, 2),
            labor_ratio_ceiling: Decimal::new(40, 2),
            acv_ratio: Decimal::new(70, 2),
            tax_rate: Decimal::new(8, 2),
            labor_rate_per_hour: Decimal::from(75),
            carrier_id: "CLAIMSCOPE".to_string(),
            carrier_name: "Claimscope".to_string(),
            price_list: "USNATNL".to_string(),
            adjuster_name: "Field Adjuster".to_string(),
        }
    }
}

impl ExportSettings {
    pub fn effective_labor_ratio(&self) -> Decimal {
        self.labor_ratio.max(self.labor_ratio_floor).min(self.labor_ratio_ceiling)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    pub supplemental: bool,
    pub supplemental_reason: Option<String>,
    /// Defaults to a random id.
    pub transaction_id: Option<String>,
    /// Defaults to today (UTC).
    pub generated_on: Option<NaiveDate>,
}

impl ExportOptions {
    pub fn supplemental(reason: impl Into<String>) -> Self {
        Self { supplemental: true, supplemental_reason: Some(reason.into()), ..Self::default() }
    }
}

/// Everything one archive is rendered from.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportData {
    pub claim: Claim,
    pub session: InspectionSession,
    pub rooms: Vec<InspectionRoom>,
    pub line_items: Vec<ScopedLineItem>,
    pub briefing: Option<Briefing>,
    pub openings: Vec<RoomOpening>,
}

/// Read side the exporter gathers a session from.
#[async_trait]
pub trait ExportSource: Send + Sync {
    async fn find_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<InspectionSession>, StoreError>;

    async fn find_claim(&self, claim_id: &ClaimId) -> Result<Option<Claim>, StoreError>;

    async fn rooms_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<InspectionRoom>, StoreError>;

    async fn openings_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<RoomOpening>, StoreError>;

    async fn find_briefing(&self, claim_id: &ClaimId) -> Result<Option<Briefing>, StoreError>;

    async fn session_scope_items(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<ScopeItem>, StoreError>;

    async fn catalog_entries(&self) -> Result<Vec<CatalogEntry>, StoreError>;

    async fn regional_prices(&self, region_id: &str) -> Result<Vec<RegionalPrice>, StoreError>;
}

/// Gathers and prices a session, then renders its archive.
pub async fn generate_interchange_archive<S: ExportSource + ?Sized>(
    session_id: &SessionId,
    source: &S,
    settings: &ExportSettings,
    options: &ExportOptions,
) -> Result<Vec<u8>, ExportError> {
    let data = gather_export_data(session_id, source, settings).await?;
    generate_archive_from_data(&data, settings, options)
}

pub async fn gather_export_data<S: ExportSource + ?Sized>(
    session_id: &SessionId,
    source: &S,
    settings: &ExportSettings,
) -> Result<ExportData, ExportError> {
    let session = source
        .find_session(session_id)
        .await?
        .ok_or_else(|| ExportError::SessionNotFound(session_id.0.clone()))?;
    let claim = source
        .find_claim(&session.claim_id)
        .await?
        .ok_or_else(|| ExportError::ClaimNotFound(session.claim_id.0.clone()))?;

    let rooms = source.rooms_for_session(session_id).await?;
    let openings = source.openings_for_session(session_id).await?;
    let briefing = source.find_briefing(&claim.id).await?;
    let scope_items = source.session_scope_items(session_id).await?;
    let catalog = Catalog::new(source.catalog_entries().await?);
    let price_book = PriceBook::new(source.regional_prices(&settings.region_id).await?);

    let priced = price_scope_items(
        &DeterministicPricingEngine,
        &scope_items,
        &catalog,
        &price_book,
        &settings.region_id,
    );

    Ok(ExportData { claim, session, rooms, line_items: priced.items, briefing, openings })
}

/// Renders both documents and packs them; used for full and delta exports.
pub fn generate_archive_from_data(
    data: &ExportData,
    settings: &ExportSettings,
    options: &ExportOptions,
) -> Result<Vec<u8>, ExportError> {
    let renderer = TemplateRenderer::with_embedded_templates()?;
    let records = build_records(&data.line_items, &data.rooms, settings, options.supplemental);
    let summary = ExportSummary::from_records(&records, data.briefing.as_ref());

    let transaction_id = options
        .transaction_id
        .clone()
        .unwrap_or_else(|| format!("CLAIMSCOPE-{}", Uuid::new_v4().simple()));
    let generated_on = options.generated_on.unwrap_or_else(|| Utc::now().date_naive());

    let view = xactdoc_view(data, settings, options, &summary, transaction_id.clone(), generated_on);
    let xactdoc = renderer.render_xactdoc(&view)?;
    let roughdraft = renderer.render_roughdraft(&data.rooms, &data.openings, &records)?;

    let archive = write_archive(&[(SUMMARY_MEMBER, xactdoc.as_str()), (DETAIL_MEMBER, roughdraft.as_str())])?;

    info!(
        event_name = "export.archive.generated",
        session_id = %data.session.id.0,
        claim_number = %data.claim.claim_number,
        transaction_id = %transaction_id,
        supplemental = options.supplemental,
        line_items = summary.line_item_count,
        rooms = data.rooms.len(),
        bytes = archive.len(),
        "interchange archive generated"
    );

    Ok(archive)
}

fn xactdoc_view(
    data: &ExportData,
    settings: &ExportSettings,
    options: &ExportOptions,
    summary: &ExportSummary,
    transaction_id: String,
    generated_on: NaiveDate,
) -> XactdocView {
    let claim = &data.claim;
    let policy_number = data
        .briefing
        .as_ref()
        .and_then(Briefing::policy_number)
        .or(claim.policy_number.as_deref())
        .unwrap_or_default()
        .to_string();
    let water_peril =
        claim.peril_type.as_deref().is_some_and(|peril| peril.eq_ignore_ascii_case("water"));

    XactdocView {
        transaction_id,
        carrier: CarrierView { id: settings.carrier_id.clone(), name: settings.carrier_name.clone() },
        estimate_type: if options.supplemental { "SUPPLEMENT" } else { "ESTIMATE" },
        summary: summary.into(),
        insured: InsuredView {
            name: claim.insured_name.clone().unwrap_or_default(),
            address: claim.property_address.clone().unwrap_or_default(),
            city: claim.city.clone().unwrap_or_default(),
            state: claim.state.clone().unwrap_or_default(),
            zip: claim.zip.clone().unwrap_or_default(),
        },
        adjuster_name: settings.adjuster_name.clone(),
        date_of_loss: claim.date_of_loss.clone().unwrap_or_default(),
        date_inspected: generated_on.format("%Y-%m-%d").to_string(),
        claim_number: claim.claim_number.clone(),
        policy_number,
        price_list: settings.price_list.clone(),
        depreciation_type: if water_peril { "Recoverable" } else { "Standard" },
        supplemental_note: options.supplemental.then(|| {
            options
                .supplemental_reason
                .clone()
                .filter(|reason| !reason.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SUPPLEMENTAL_NOTE.to_string())
        }),
    }
}
