//! `callspec check` command.

use std::path::Path;

use crate::codec::RawValue;
use crate::specfile::{normalize, Specification};

/// Execute the `check` command.
///
/// Parses the file, then parses every value against the grammar. Prints a
/// summary, or the parsed structure as JSON when `json` is set.
///
/// # Errors
///
/// Returns an error string if the file cannot be read, fails parse-time
/// validation, or holds values outside the grammar.
pub fn run(file: &Path, json: bool) -> Result<(), String> {
    let text = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let spec = Specification::parse(&text).map_err(|e| format!("{}: {e}", file.display()))?;

    let problems = invalid_values(&spec);
    if !problems.is_empty() {
        return Err(format!("{}: invalid values\n  {}", file.display(), problems.join("\n  ")));
    }

    if json {
        let rendered = serde_json::to_string_pretty(&spec)
            .map_err(|e| format!("Failed to render {} as JSON: {e}", file.display()))?;
        println!("{rendered}");
        return Ok(());
    }

    let calls = spec.entries().count();
    let constructors = spec.constructors().count();
    println!(
        "{}: {} test inputs, {constructors} constructor calls, {calls} method calls",
        file.display(),
        spec.preamble.len()
    );
    if spec.serialize() != normalize(&text) {
        println!("  not in canonical form; run `callspec fmt --write {}`", file.display());
    }
    Ok(())
}

/// Every value that does not parse, as `location: error`.
fn invalid_values(spec: &Specification) -> Vec<String> {
    let preamble = spec.preamble.iter().map(|(name, value)| (format!("input {name}"), value));
    let blocks = spec.blocks.iter().enumerate().flat_map(|(index, block)| {
        let label = if block.is_method() {
            block.method.clone()
        } else {
            block.subject.clone().unwrap_or_default()
        };
        let arguments = block
            .arguments
            .iter()
            .chain(&block.outputs)
            .map(move |(name, value)| (format!("block {} ({label}) {name}", index + 1), value));
        let returns =
            block.return_value.iter().map(move |value| (format!("block {} returns", index + 1), value));
        arguments.chain(returns).collect::<Vec<_>>()
    });

    preamble
        .chain(blocks)
        .filter_map(|(location, value)| {
            RawValue::parse(value).err().map(|e| format!("{location}: {e}"))
        })
        .collect()
}
