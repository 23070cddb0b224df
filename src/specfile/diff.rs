//! Line-level diff between the approved and the received text.

use similar::TextDiff;

/// Unified diff from `old` to `new` with `context` unchanged lines around
/// each hunk. Empty when the inputs are identical.
#[must_use]
pub fn render_diff(old: &str, new: &str, context: usize) -> String {
    TextDiff::from_lines(old, new).unified_diff().context_radius(context).to_string()
}
