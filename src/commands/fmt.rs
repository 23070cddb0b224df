//! `callspec fmt` command.

use std::path::Path;

use crate::specfile::Specification;

/// Execute the `fmt` command.
///
/// Prints the canonical form of the file, or rewrites it in place when
/// `write` is set.
///
/// # Errors
///
/// Returns an error string if the file cannot be read, parsed or written.
pub fn run(file: &Path, write: bool) -> Result<(), String> {
    let text = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let canonical = Specification::parse(&text)
        .map_err(|e| format!("{}: {e}", file.display()))?
        .serialize();

    if !write {
        print!("{canonical}");
        return Ok(());
    }
    if canonical == text {
        println!("{} already canonical", file.display());
        return Ok(());
    }
    std::fs::write(file, &canonical)
        .map_err(|e| format!("Failed to write {}: {e}", file.display()))?;
    println!("Formatted {}", file.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_rewrites_into_canonical_form() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A.b.approved.txt");
        std::fs::write(&path, "🔹 Ping:   \n  🔸 x: 1  \n\n\n\n🔹 Pong:\n").unwrap();
        run(&path, true).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "🔹 Ping:\n  🔸 x: 1\n\n🔹 Pong:\n");

        run(&path, true).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "🔹 Ping:\n  🔸 x: 1\n\n🔹 Pong:\n");
    }

    #[test]
    fn printing_leaves_the_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A.b.approved.txt");
        std::fs::write(&path, "🔹 Ping:  \n").unwrap();
        run(&path, false).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "🔹 Ping:  \n");
    }
}
