use serde::Serialize;

use crate::commands::CommandResult;
use registrar_core::domain::actor::Role;
use registrar_core::domain::request::RequestType;

#[derive(Debug, Serialize)]
struct StageRow {
    index: u32,
    key: &'static str,
    name: &'static str,
    approver_role: Option<Role>,
    terminal: bool,
}

/// Prints the ordered stage list for one request type.
pub fn run(request_type: &str) -> CommandResult {
    let request_type = match request_type.parse::<RequestType>() {
        Ok(request_type) => request_type,
        Err(error) => return CommandResult::failure("stages", error.kind(), error.to_string(), 6),
    };

    let terminal_index = request_type.terminal_index();
    let rows: Vec<StageRow> = request_type
        .stages()
        .iter()
        .zip(0u32..)
        .map(|(stage, index)| StageRow {
            index,
            key: stage.key,
            name: stage.name,
            approver_role: stage.approver_role,
            terminal: index == terminal_index,
        })
        .collect();

    CommandResult::success_with_data(
        "stages",
        format!("{} stages for `{request_type}` requests", rows.len()),
        &rows,
    )
}
