//! Specification text: data model, parser, record and replay engines.
//!
//! A specification is a line-oriented log of the calls a unit under test made
//! against its collaborators. [`SpecRecorder`] appends blocks while a test
//! runs; [`SpecReplayer`] walks the parsed entries of a stored specification
//! to synthesize collaborator responses.

pub mod diff;
pub mod format;
mod parser;
pub mod recorder;
pub mod replayer;

pub use diff::render_diff;
pub use format::{normalize, EntryKind, SpecEntry, Specification};
pub use recorder::SpecRecorder;
pub use replayer::{resolve_return, SpecReplayer};
