use std::path::Path;

use anyhow::Context;

use claimscope_core::config::LoadOptions;
use claimscope_core::domain::inspection::SessionId;
use claimscope_core::export::{generate_interchange_archive, ExportError, ExportOptions};

use crate::commands::{run_with_store, CommandFailure, CommandResult};

pub fn run(
    options: &LoadOptions,
    session: &str,
    out: &Path,
    supplemental_reason: Option<String>,
) -> CommandResult {
    let session_id = SessionId(session.to_string());
    let export_options = match supplemental_reason {
        Some(reason) => ExportOptions::supplemental(reason),
        None => ExportOptions::default(),
    };

    run_with_store("export", options, |config, store| async move {
        let settings = config.export_settings();
        let archive = generate_interchange_archive(&session_id, &store, &settings, &export_options)
            .await
            .map_err(|error| match error {
                ExportError::SessionNotFound(_) | ExportError::ClaimNotFound(_) => {
                    CommandFailure::application("not_found", 8, error)
                }
                other => CommandFailure::application("export", 7, other),
            })?;

        write_archive(out, &archive)
            .map_err(|error| CommandFailure::reported("io", format!("{error:#}"), 9))?;

        let kind = if export_options.supplemental { "supplemental" } else { "full" };
        Ok(CommandResult::success(
            "export",
            format!("wrote {kind} archive ({} bytes) to {}", archive.len(), out.display()),
        ))
    })
}

fn write_archive(out: &Path, archive: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = out.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("could not create {}", parent.display()))?;
    }
    std::fs::write(out, archive).with_context(|| format!("could not write {}", out.display()))
}
