//! Dump command implementation.

use super::{is_temporary, load_entities, open_dir, CliResult, OutputFormat};
use serde_json::Value;
use std::path::Path;

/// Loads the entities of snapshot `name`, optionally keeping only those
/// with a temporary id.
pub fn collect(dir: &Path, name: &str, temporary_only: bool) -> CliResult<Vec<Value>> {
    let store = open_dir(dir)?;
    let mut entities = load_entities(&store, name)?;
    if temporary_only {
        entities.retain(is_temporary);
    }
    Ok(entities)
}

/// Runs the dump command.
pub fn run(dir: &Path, name: &str, temporary_only: bool, format: OutputFormat) -> CliResult<()> {
    let entities = collect(dir, name, temporary_only)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entities)?),
        OutputFormat::Text => print_text_output(name, &entities),
    }

    Ok(())
}

fn print_text_output(name: &str, entities: &[Value]) {
    println!("{} ({} entities)", name, entities.len());
    for entity in entities {
        println!("  {}", describe(entity));
    }
}

fn describe(entity: &Value) -> String {
    let id = entity.get("id").and_then(Value::as_str).unwrap_or("<no id>");
    let marker = if is_temporary(entity) { " [unconfirmed]" } else { "" };
    match entity.get("title").and_then(Value::as_str) {
        Some(title) => format!("{id}  {title}{marker}"),
        None => format!("{id}{marker}"),
    }
}
