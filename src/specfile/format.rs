//! Specification data structures and their canonical rendering.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Opens the block of named test inputs.
pub const PREAMBLE_MARKER: &str = "📋";
/// Title that follows [`PREAMBLE_MARKER`].
pub const PREAMBLE_TITLE: &str = "<Test Inputs>";
/// Leads a constructor block.
pub const CONSTRUCTOR_MARKER: &str = "🔧";
/// Leads a method-call block.
pub const METHOD_MARKER: &str = "🔹";
/// Marks an input argument (or test input).
pub const INPUT_MARKER: &str = "🔸";
/// Marks the return value and post-call output parameters.
pub const OUTPUT_MARKER: &str = "🔹";
/// Marks an exception note.
pub const NOTE_MARKER: &str = "🔺";
/// Detail name of the return value line.
pub const RETURNS: &str = "Returns";
/// Detail name of the exception note line.
pub const EXCEPTION: &str = "Exception";
/// Suffix of a constructor header line.
pub const CONSTRUCTOR_SUFFIX: &str = "constructor called with:";

const INDENT: &str = "  ";

/// Kind of a recorded interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// A collaborator was constructed.
    Constructor,
    /// A method was invoked on a collaborator.
    Method,
}

/// One recorded interaction. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecEntry {
    /// Constructor or method call.
    pub kind: EntryKind,
    /// Role name of the constructed collaborator (constructor entries only).
    pub subject: Option<String>,
    /// Invoked method name (empty for constructor entries).
    pub method: String,
    /// Input arguments in call order, as raw value text.
    pub arguments: Vec<(String, String)>,
    /// Raw return value text, if the call produced one.
    pub return_value: Option<String>,
    /// Exception note, if the call failed.
    pub note: Option<String>,
    /// Post-call values of out/inout parameters.
    pub outputs: Vec<(String, String)>,
}

impl SpecEntry {
    /// Creates an empty method-call entry.
    #[must_use]
    pub fn method(name: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::Method,
            subject: None,
            method: name.into(),
            arguments: Vec::new(),
            return_value: None,
            note: None,
            outputs: Vec::new(),
        }
    }

    /// Creates an empty constructor entry for `subject`.
    #[must_use]
    pub fn constructor(subject: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::Constructor,
            subject: Some(subject.into()),
            method: String::new(),
            arguments: Vec::new(),
            return_value: None,
            note: None,
            outputs: Vec::new(),
        }
    }

    /// Returns `true` for method-call entries.
    #[must_use]
    pub fn is_method(&self) -> bool {
        self.kind == EntryKind::Method
    }

    /// Appends this entry as one block: header, inputs, note, return value,
    /// outputs, then a blank separator line.
    pub fn render(&self, out: &mut String) {
        match self.kind {
            EntryKind::Constructor => {
                let subject = self.subject.as_deref().unwrap_or_default();
                out.push_str(&format!("{CONSTRUCTOR_MARKER} {subject} {CONSTRUCTOR_SUFFIX}\n"));
            }
            EntryKind::Method => out.push_str(&format!("{METHOD_MARKER} {}:\n", self.method)),
        }
        for (name, value) in &self.arguments {
            push_detail(out, INPUT_MARKER, name, value);
        }
        if let Some(note) = &self.note {
            push_detail(out, NOTE_MARKER, EXCEPTION, note);
        }
        if let Some(value) = &self.return_value {
            push_detail(out, OUTPUT_MARKER, RETURNS, value);
        }
        for (name, value) in &self.outputs {
            push_detail(out, OUTPUT_MARKER, name, value);
        }
        out.push('\n');
    }
}

fn push_detail(out: &mut String, marker: &str, name: &str, value: &str) {
    out.push_str(&format!("{INDENT}{marker} {name}: {value}\n"));
}

/// Appends the test-input block, if there are any inputs.
pub fn render_preamble(preamble: &IndexMap<String, String>, out: &mut String) {
    if preamble.is_empty() {
        return;
    }
    out.push_str(&format!("{PREAMBLE_MARKER} {PREAMBLE_TITLE}\n"));
    for (name, value) in preamble {
        push_detail(out, INPUT_MARKER, name, value);
    }
    out.push('\n');
}

/// Canonical whitespace: trailing spaces stripped from every line, trailing
/// blank lines dropped, exactly one final newline (none for empty text).
#[must_use]
pub fn normalize(text: &str) -> String {
    let mut lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    if lines.is_empty() {
        return String::new();
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// A parsed specification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Specification {
    /// Named test inputs, in file order.
    pub preamble: IndexMap<String, String>,
    /// Every block in file order, constructors included.
    pub blocks: Vec<SpecEntry>,
}

impl Specification {
    /// Method-call entries in file order; this is the replay sequence.
    pub fn entries(&self) -> impl Iterator<Item = &SpecEntry> {
        self.blocks.iter().filter(|entry| entry.is_method())
    }

    /// Constructor entries in file order.
    pub fn constructors(&self) -> impl Iterator<Item = &SpecEntry> {
        self.blocks.iter().filter(|entry| !entry.is_method())
    }

    /// Renders the specification in canonical form.
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        render_preamble(&self.preamble, &mut out);
        for block in &self.blocks {
            block.render(&mut out);
        }
        normalize(&out)
    }
}
