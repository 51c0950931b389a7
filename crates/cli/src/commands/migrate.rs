use claimscope_core::config::LoadOptions;

use crate::commands::{run_with_store, CommandResult};

pub fn run(options: &LoadOptions) -> CommandResult {
    run_with_store("migrate", options, |_config, _store| async {
        Ok(CommandResult::success("migrate", "applied pending migrations"))
    })
}
