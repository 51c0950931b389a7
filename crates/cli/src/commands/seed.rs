use std::path::Path;

use claimscope_core::config::LoadOptions;
use claimscope_core::errors::StoreError;
use claimscope_db::SeedDataset;

use crate::commands::{run_with_store, CommandFailure, CommandResult};

pub fn run(options: &LoadOptions, file: Option<&Path>) -> CommandResult {
    let dataset = match file {
        Some(path) => SeedDataset::from_path(path),
        None => SeedDataset::demo(),
    };
    let dataset = match dataset {
        Ok(dataset) => dataset,
        Err(error) => {
            return CommandResult::failure("seed", "seed_dataset", error.to_string(), 2);
        }
    };
    let source = file.map(|path| path.display().to_string()).unwrap_or_else(|| "demo".to_string());

    run_with_store("seed", options, |_config, store| async move {
        let seeded = dataset
            .load_into(&store)
            .await
            .map_err(|error| {
                CommandFailure::application("seed_execution", 6, StoreError::from(error))
            })?;

        let verification = dataset
            .verify(&store)
            .await
            .map_err(|error| {
                CommandFailure::application("seed_verification", 7, StoreError::from(error))
            })?;
        if !verification.all_present {
            let failed_checks = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(check.as_str()))
                .collect::<Vec<_>>();
            return Err(CommandFailure::reported(
                "seed_verification",
                verification_message(&failed_checks),
                7,
            ));
        }

        let message = format!(
            "seeded {source}: {} catalog entries, {} prices, {} sessions, {} rooms, {} damages",
            seeded.catalog_entries,
            seeded.regional_prices,
            seeded.sessions,
            seeded.rooms,
            seeded.damages
        );
        Ok(CommandResult::report("seed", message, &seeded))
    })
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
