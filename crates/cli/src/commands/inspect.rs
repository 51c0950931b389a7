use std::path::Path;

use anyhow::Context;

use claimscope_core::export::read_detail_items;

use crate::commands::CommandResult;

pub fn run(file: &Path) -> CommandResult {
    let archive = match std::fs::read(file).with_context(|| format!("could not read {}", file.display()))
    {
        Ok(archive) => archive,
        Err(error) => return CommandResult::failure("inspect", "io", format!("{error:#}"), 9),
    };

    match read_detail_items(&archive) {
        Ok(rooms) => {
            let items: usize = rooms.values().map(Vec::len).sum();
            CommandResult::report(
                "inspect",
                format!("{} rooms, {items} items in {}", rooms.len(), file.display()),
                &rooms,
            )
        }
        Err(error) => CommandResult::failure("inspect", "archive", error.to_string(), 7),
    }
}
