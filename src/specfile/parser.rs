//! Line-oriented parser for specification text.

use std::sync::LazyLock;

use regex::Regex;

use super::format::{
    SpecEntry, Specification, INPUT_MARKER, NOTE_MARKER, OUTPUT_MARKER, PREAMBLE_TITLE, RETURNS,
};
use crate::codec::raw::check_sentinels;
use crate::error::Result;

static CONSTRUCTOR_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\S+ (\S+) constructor called with:$").expect("constructor pattern is valid")
});

static METHOD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\S+ ([A-Za-z_][A-Za-z0-9_.]*):$").expect("method pattern is valid")
});

impl Specification {
    /// Parses specification text.
    ///
    /// Unrecognised lines, including detail lines whose marker is not one of
    /// the input, output or exception glyphs, are skipped, so any text yields
    /// as many entries as can be recognised. Constructor blocks are kept for serialization but
    /// are not part of [`entries`](Self::entries).
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::UnknownObject`](crate::SpecError::UnknownObject)
    /// when a value contains an `<unknown...>` token and
    /// [`SpecError::Format`](crate::SpecError::Format) for a malformed
    /// `<id:>` reference. Exception notes are free text and are not
    /// checked.
    pub fn parse(text: &str) -> Result<Self> {
        let mut spec = Self::default();
        let mut current: Option<SpecEntry> = None;
        let mut in_preamble = false;

        for line in text.lines() {
            let line = line.trim_end();
            if line.is_empty() {
                spec.blocks.extend(current.take());
                continue;
            }

            if !line.starts_with(char::is_whitespace) {
                spec.blocks.extend(current.take());
                in_preamble = is_preamble_header(line);
                if in_preamble {
                    continue;
                }
                current = if let Some(caps) = CONSTRUCTOR_LINE.captures(line) {
                    Some(SpecEntry::constructor(&caps[1]))
                } else {
                    METHOD_LINE.captures(line).map(|caps| SpecEntry::method(&caps[1]))
                };
                if current.is_none() {
                    tracing::debug!(line, "skipping unrecognised line");
                }
                continue;
            }

            let Some((marker, name, value)) = split_detail(line) else {
                tracing::debug!(line, "skipping malformed detail line");
                continue;
            };
            if !matches!(marker, INPUT_MARKER | OUTPUT_MARKER | NOTE_MARKER) {
                tracing::debug!(line, "skipping detail line with unfamiliar marker");
                continue;
            }
            // Exception notes are free text from the failing collaborator.
            if marker != NOTE_MARKER {
                check_sentinels(value)?;
            }

            if let Some(entry) = current.as_mut() {
                apply_detail(entry, marker, name, value);
            } else if in_preamble {
                spec.preamble.insert(name.to_string(), value.to_string());
            }
        }
        spec.blocks.extend(current);

        tracing::debug!(
            blocks = spec.blocks.len(),
            inputs = spec.preamble.len(),
            "parsed specification"
        );
        Ok(spec)
    }
}

fn is_preamble_header(line: &str) -> bool {
    line.split_once(' ').is_some_and(|(_, title)| title == PREAMBLE_TITLE)
}

/// Splits `  <marker> <name>: <value>` into its three parts.
fn split_detail(line: &str) -> Option<(&str, &str, &str)> {
    let (marker, rest) = line.trim_start().split_once(' ')?;
    let (name, value) = rest.split_once(':')?;
    Some((marker, name.trim(), value.trim()))
}

fn apply_detail(entry: &mut SpecEntry, marker: &str, name: &str, value: &str) {
    let pair = (name.to_string(), value.to_string());
    match marker {
        NOTE_MARKER => entry.note = Some(value.to_string()),
        OUTPUT_MARKER if name == RETURNS => entry.return_value = Some(value.to_string()),
        OUTPUT_MARKER => entry.outputs.push(pair),
        _ => entry.arguments.push(pair),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SpecError;
    use crate::specfile::format::EntryKind;

    const SAMPLE: &str = "\
📋 <Test Inputs>
  🔸 customer: \"Ada\"
  🔸 quantity: 2

🔧 Inventory constructor called with:
  🔸 warehouse: \"W1\"

🔹 CheckStock:
  🔸 productId: \"P1\"
  🔸 quantity: 2
  🔹 Returns: True

🔹 Reserve:
  🔸 sku: \"P1\"
  🔸 ticket: null
  🔹 Returns: True
  🔹 ticket: \"T-9\"

🔹 Notify:
  🔸 message: \"done\"
  🔺 Exception: mailer offline
";

    #[test]
    fn parses_preamble_and_blocks() {
        let spec = Specification::parse(SAMPLE).unwrap();
        assert_eq!(spec.preamble.get("customer").map(String::as_str), Some("\"Ada\""));
        assert_eq!(spec.preamble.len(), 2);
        assert_eq!(spec.blocks.len(), 4);
        assert_eq!(spec.blocks[0].kind, EntryKind::Constructor);
        assert_eq!(spec.blocks[0].subject.as_deref(), Some("Inventory"));

        let entries: Vec<_> = spec.entries().collect();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].method, "CheckStock");
        assert_eq!(
            entries[0].arguments,
            vec![("productId".to_string(), "\"P1\"".to_string()), ("quantity".to_string(), "2".to_string())]
        );
        assert_eq!(entries[0].return_value.as_deref(), Some("True"));
        assert_eq!(entries[1].outputs, vec![("ticket".to_string(), "\"T-9\"".to_string())]);
        assert_eq!(entries[2].note.as_deref(), Some("mailer offline"));
        assert_eq!(entries[2].return_value, None);
    }

    #[test]
    fn serialize_is_stable_under_reparse() {
        let first = Specification::parse(SAMPLE).unwrap().serialize();
        let second = Specification::parse(&first).unwrap().serialize();
        assert_eq!(first, second);
        assert_eq!(first, SAMPLE);
    }

    #[test]
    fn unrecognised_lines_are_skipped() {
        let text = "some heading\n  stray detail: 1\n🔹 Ping:\n  🔹 Returns: 1\n# trailing note\n";
        let spec = Specification::parse(text).unwrap();
        assert_eq!(spec.entries().count(), 1);
        assert_eq!(spec.blocks[0].return_value.as_deref(), Some("1"));
    }

    #[test]
    fn preamble_ends_at_first_call_line() {
        let text = "📋 <Test Inputs>\n  🔸 a: 1\n🔹 Ping:\n  🔸 b: 2\n";
        let spec = Specification::parse(text).unwrap();
        assert_eq!(spec.preamble.len(), 1);
        assert_eq!(spec.blocks[0].arguments.len(), 1);
    }

    #[test]
    fn empty_values_parse_as_empty_text() {
        let spec = Specification::parse("🔹 Ping:\n  🔸 note:\n").unwrap();
        assert_eq!(spec.blocks[0].arguments[0].1, "");
    }

    #[test]
    fn unknown_objects_fail_at_parse_time() {
        let text = "🔹 Ship:\n  🔸 parcel: <unknown:Parcel>\n";
        assert!(matches!(Specification::parse(text), Err(SpecError::UnknownObject(_))));
        let text = "🔹 Ship:\n  🔹 Returns: [<unknown>]\n";
        assert!(matches!(Specification::parse(text), Err(SpecError::UnknownObject(_))));
    }

    #[test]
    fn malformed_references_fail_at_parse_time() {
        let text = "🔹 Ship:\n  🔸 parcel: <id:>\n";
        assert!(matches!(Specification::parse(text), Err(SpecError::Format(_))));
    }

    #[test]
    fn exception_notes_may_mention_grammar_tokens() {
        for note in ["nested failed: <unknown:Parcel>", "value <unknown-limit> exceeded", "bad token <id: here"] {
            let text = format!("🔹 Ship:\n  🔸 parcel: 1\n  🔺 Exception: {note}\n");
            let spec = Specification::parse(&text).unwrap();
            assert_eq!(spec.blocks[0].note.as_deref(), Some(note));
            assert_eq!(spec.serialize(), text);
        }
    }

    #[test]
    fn details_with_unfamiliar_markers_are_skipped() {
        let text = "📋 <Test Inputs>\n  ★ stray: 1\n  🔸 a: 2\n\n🔹 Ping:\n  ★ extra: <unknown:X>\n  🔸 b: 3\n";
        let spec = Specification::parse(text).unwrap();
        assert_eq!(spec.preamble.len(), 1);
        assert_eq!(spec.blocks[0].arguments, vec![("b".to_string(), "3".to_string())]);
    }

    #[test]
    fn quoted_sentinels_are_plain_data() {
        let text = "🔹 Echo:\n  🔸 text: \"<unknown>\"\n";
        assert!(Specification::parse(text).is_ok());
    }
}
