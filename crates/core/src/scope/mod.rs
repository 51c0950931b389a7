pub mod assembler;
pub mod matcher;
pub mod quantity;
pub mod store;
pub mod tables;

pub use assembler::{ManualQuantityNeeded, ScopeAssembler, ScopeAssemblyResult, MAX_COMPANION_DEPTH};
pub use matcher::CatalogMatcher;
pub use quantity::{DerivedQuantity, GeometryQuantityDeriver, QuantityDeriver, QuantityFormula};
pub use store::ScopeStore;
pub use tables::MatchingTables;
