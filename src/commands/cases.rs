//! `callspec cases` command.

use crate::config::CallspecConfig;

/// Execute the `cases` command: one line per discovered case with its
/// approval state.
///
/// # Errors
///
/// Returns an error string if the spec directory cannot be listed.
pub fn run(config: &CallspecConfig, class: &str, method: &str) -> Result<(), String> {
    let store = config.store();
    let cases = store.discover(class, method).map_err(|e| e.to_string())?;

    println!("Cases for {class}.{method} in {}:", store.root().display());
    for case in &cases {
        let approved = store.approved_path(case).exists();
        let received = store.received_path(case).exists();
        let state = match (approved, received) {
            (true, true) => "approved, received pending",
            (true, false) => "approved",
            (false, true) => "received pending",
            (false, false) => "new",
        };
        let name = case.case.as_deref().unwrap_or("(default)");
        println!("  {name:<20} {state}");
    }
    Ok(())
}
