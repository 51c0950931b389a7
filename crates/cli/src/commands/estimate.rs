use claimscope_core::config::LoadOptions;
use claimscope_core::domain::inspection::SessionId;
use claimscope_core::estimate::catalog::{Catalog, PriceBook};
use claimscope_core::export::ExportSource;
use claimscope_core::{DeterministicEstimateRuntime, EstimateRuntime};

use crate::commands::{run_with_store, CommandFailure, CommandResult};

pub fn run(options: &LoadOptions, session: &str) -> CommandResult {
    let session_id = SessionId(session.to_string());

    run_with_store("estimate", options, |config, store| async move {
        let read = |error: claimscope_core::errors::StoreError| {
            CommandFailure::application("lookup", 6, error)
        };

        if store.find_session(&session_id).await.map_err(read)?.is_none() {
            return Err(CommandFailure::reported(
                "not_found",
                format!("inspection session `{}` not found", session_id.0),
                8,
            ));
        }

        let region_id = config.pricing.region_id.clone();
        let items = store.session_scope_items(&session_id).await.map_err(read)?;
        let catalog = Catalog::new(store.catalog_entries().await.map_err(read)?);
        let price_book = PriceBook::new(store.regional_prices(&region_id).await.map_err(read)?);

        let runtime = DeterministicEstimateRuntime::new(catalog, price_book, config.estimate_rates());
        let report = runtime.build_estimate(&items, &region_id);

        let message = format!(
            "{} line items in {region_id}: total {} ({} with overhead and profit)",
            report.line_items.len(),
            report.totals.grand_total,
            report.totals.total_with_op
        );
        Ok(CommandResult::report("estimate", message, &report))
    })
}
