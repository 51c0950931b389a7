use claimscope_core::config::LoadOptions;
use claimscope_core::domain::inspection::{DamageId, RoomId};
use claimscope_core::errors::StoreError;
use claimscope_core::export::ExportSource;
use claimscope_core::scope::ScopeAssembler;
use claimscope_db::repositories::{opening_wall_deduction, InspectionRepository};

use crate::commands::{run_with_store, CommandFailure, CommandResult};

pub fn run(options: &LoadOptions, session: &str, room: &str, damage: &str) -> CommandResult {
    let room_id = RoomId(room.to_string());
    let damage_id = DamageId(damage.to_string());
    let session = session.to_string();

    run_with_store("assemble", options, |_config, store| async move {
        let lookup = |error: claimscope_db::RepositoryError| {
            CommandFailure::application("lookup", 6, StoreError::from(error))
        };

        let room = store
            .find_room(&room_id)
            .await
            .map_err(lookup)?
            .ok_or_else(|| {
                CommandFailure::reported("not_found", format!("room `{}` not found", room_id.0), 8)
            })?;
        if room.session_id.0 != session {
            return Err(CommandFailure::reported(
                "not_found",
                format!("room `{}` does not belong to session `{session}`", room.id.0),
                8,
            ));
        }
        let damage = store
            .find_damage(&damage_id)
            .await
            .map_err(lookup)?
            .ok_or_else(|| {
                CommandFailure::reported(
                    "not_found",
                    format!("damage `{}` not found", damage_id.0),
                    8,
                )
            })?;

        let openings = store
            .openings_for_session(&room.session_id)
            .await
            .map_err(|error| CommandFailure::application("lookup", 6, error))?;
        let deduction = opening_wall_deduction(&openings, &room.id);

        let result = ScopeAssembler::new(store)
            .assemble_scope_with_deduction(&room, &damage, deduction)
            .await
            .map_err(|error| CommandFailure::application("scope_assembly", 7, error))?;

        let message = format!(
            "created {} items ({} companions) in room `{}`; {} need manual quantities, {} warnings",
            result.total_created(),
            result.companion_items.len(),
            room.name,
            result.manual_quantity_needed.len(),
            result.warnings.len()
        );
        Ok(CommandResult::report("assemble", message, &result))
    })
}
