//! Records interactions into the specification write buffer.

use super::format::SpecEntry;
use crate::codec::{Codec, ToRaw};
use crate::error::Result;

/// Append-only writer for call blocks. Never reads the parsed entries.
#[derive(Debug, Default)]
pub struct SpecRecorder {
    buffer: String,
    blocks: usize,
}

impl SpecRecorder {
    /// Creates a recorder with an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a fully-formatted entry.
    pub fn record(&mut self, entry: &SpecEntry) {
        entry.render(&mut self.buffer);
        self.blocks += 1;
    }

    /// Formats and appends a method call.
    ///
    /// # Errors
    ///
    /// Returns an error if any argument or the return value cannot be
    /// formatted; nothing is written in that case.
    pub fn log_call(
        &mut self,
        codec: &Codec<'_>,
        method: &str,
        arguments: &[(&str, &dyn ToRaw)],
        return_value: Option<&dyn ToRaw>,
    ) -> Result<()> {
        let mut entry = SpecEntry::method(method);
        entry.arguments = format_arguments(codec, arguments)?;
        entry.return_value = return_value.map(|value| value.to_raw(codec)).transpose()?;
        self.record(&entry);
        Ok(())
    }

    /// Formats and appends a constructor call.
    ///
    /// # Errors
    ///
    /// Returns an error if any argument cannot be formatted.
    pub fn log_constructor_call(
        &mut self,
        codec: &Codec<'_>,
        subject: &str,
        arguments: &[(&str, &dyn ToRaw)],
    ) -> Result<()> {
        let mut entry = SpecEntry::constructor(subject);
        entry.arguments = format_arguments(codec, arguments)?;
        self.record(&entry);
        Ok(())
    }

    /// Text written so far.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// Number of blocks written.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks
    }

    /// Returns `true` when nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks == 0
    }
}

/// Formats named values through the codec.
pub(crate) fn format_arguments(
    codec: &Codec<'_>,
    arguments: &[(&str, &dyn ToRaw)],
) -> Result<Vec<(String, String)>> {
    arguments.iter().map(|(name, value)| Ok(((*name).to_string(), value.to_raw(codec)?))).collect()
}
