//! `callspec approve` command.

use crate::config::CallspecConfig;
use crate::store::SpecCase;

/// Execute the `approve` command: move the received file over the
/// approved one.
///
/// # Errors
///
/// Returns an error string if there is no received file or it cannot be
/// moved.
pub fn run(
    config: &CallspecConfig,
    class: &str,
    method: &str,
    case: Option<&str>,
) -> Result<(), String> {
    let mut spec_case = SpecCase::new(class, method);
    if let Some(case) = case {
        spec_case = spec_case.with_case(case);
    }
    let approved = config.store().approve(&spec_case).map_err(|e| e.to_string())?;
    println!("Approved {spec_case} -> {}", approved.display());
    Ok(())
}
