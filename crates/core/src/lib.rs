pub mod config;
pub mod domain;
pub mod errors;
pub mod estimate;
pub mod export;
pub mod scope;

pub use domain::catalog::{CatalogEntry, CompanionRules, RegionalPrice, ScopeConditions, TradeCode};
pub use domain::claim::{Briefing, Claim, ClaimId};
pub use domain::inspection::{
    DamageId, DamageObservation, InspectionRoom, InspectionSession, RoomDimensions, RoomId,
    RoomOpening, SessionId,
};
pub use domain::scope::{
    NewScopeItem, Provenance, ScopeItem, ScopeItemId, ScopeStatus, ScopeSummary,
};
pub use errors::{ApplicationError, DomainError, InterfaceError, StoreError};
pub use estimate::catalog::{Catalog, PriceBook};
pub use estimate::pricing::{
    DeterministicPricingEngine, EstimateRates, EstimateTotals, PricedLineItem, PricingEngine,
};
pub use estimate::{DeterministicEstimateRuntime, EstimateReport, EstimateRuntime};
pub use export::{
    generate_archive_from_data, generate_interchange_archive, ExportError, ExportOptions,
    ExportSettings, ExportSource,
};
pub use scope::{ScopeAssembler, ScopeAssemblyResult, ScopeStore};
