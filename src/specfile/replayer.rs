//! Replays recorded interactions from a specification.

use super::format::{SpecEntry, Specification};
use crate::codec::{describe_arguments, Codec, FromRaw, RawValue, MISSING_VALUE};
use crate::error::{Result, SpecError};

/// Walks the method-call entries of a specification in strict order.
///
/// The cursor only moves forward. A call whose name does not match the next
/// entry fails without moving it; a matching call moves it even if its
/// return value later fails to convert.
#[derive(Debug, Clone, Default)]
pub struct SpecReplayer {
    entries: Vec<SpecEntry>,
    cursor: usize,
}

impl SpecReplayer {
    /// Creates a replayer over the method-call entries of `spec`.
    #[must_use]
    pub fn new(spec: &Specification) -> Self {
        Self::from_entries(spec.entries().cloned().collect())
    }

    /// Creates a replayer over the given entries.
    #[must_use]
    pub fn from_entries(entries: Vec<SpecEntry>) -> Self {
        Self { entries, cursor: 0 }
    }

    /// Current position in the entry list.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Total number of replayable entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` once every entry has been consumed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.entries.len()
    }

    /// The entry the next call will be matched against.
    #[must_use]
    pub fn peek(&self) -> Option<&SpecEntry> {
        self.entries.get(self.cursor)
    }

    /// Matches a call against the next entry and moves the cursor past it.
    ///
    /// Returns `Ok(None)` for a call without return value once the sequence
    /// is exhausted; such calls are allowed as extra observations.
    ///
    /// # Errors
    ///
    /// - [`SpecError::MissingValue`] if the sequence is exhausted and the
    ///   call expects a value.
    /// - [`SpecError::SequenceMismatch`] if the next entry names another
    ///   method; the cursor does not move.
    pub fn advance(
        &mut self,
        method: &str,
        arguments: &[(String, String)],
        has_return_value: bool,
    ) -> Result<Option<SpecEntry>> {
        let Some(entry) = self.entries.get(self.cursor) else {
            if has_return_value {
                return Err(missing_value(method, arguments));
            }
            tracing::debug!(method, "call without return value beyond the recorded sequence");
            return Ok(None);
        };

        if entry.method != method {
            return Err(SpecError::SequenceMismatch {
                position: self.cursor,
                expected: entry.method.clone(),
                actual: method.to_string(),
            });
        }

        let entry = entry.clone();
        self.cursor += 1;
        tracing::debug!(method, cursor = self.cursor, "advanced replay cursor");
        Ok(Some(entry))
    }

    /// Replays the next call and converts its recorded return value to `T`.
    ///
    /// # Errors
    ///
    /// Everything [`advance`](Self::advance) returns, plus the errors of
    /// [`resolve_return`].
    pub fn next_return_value<T: FromRaw>(
        &mut self,
        method: &str,
        arguments: &[(String, String)],
        codec: &Codec<'_>,
    ) -> Result<T> {
        match self.advance(method, arguments, !T::IS_VOID)? {
            Some(entry) => resolve_return(&entry, arguments, codec),
            None => T::from_raw(&RawValue::Null, codec),
        }
    }

    /// Moves the cursor past the next entry without checking it.
    ///
    /// Used by live calls so that recording and replay positions stay in
    /// step when both happen in one run.
    pub fn skip(&mut self, method: &str) {
        let Some(entry) = self.entries.get(self.cursor) else {
            return;
        };
        if entry.method != method {
            tracing::debug!(
                expected = %entry.method,
                actual = method,
                "live call does not match the recorded entry"
            );
        }
        self.cursor += 1;
    }
}

/// Converts the return value recorded in `entry` into `T`.
///
/// # Errors
///
/// - [`SpecError::RecordedFailure`] if the entry carries an exception note
///   and no return value.
/// - [`SpecError::MissingValue`] if a value is expected but the entry has
///   none or holds `<missing_value>`.
/// - Codec errors when the text does not convert to `T`.
pub fn resolve_return<T: FromRaw>(
    entry: &SpecEntry,
    arguments: &[(String, String)],
    codec: &Codec<'_>,
) -> Result<T> {
    if let (Some(note), None) = (&entry.note, &entry.return_value) {
        return Err(SpecError::RecordedFailure { method: entry.method.clone(), note: note.clone() });
    }
    if T::IS_VOID {
        return T::from_raw(&RawValue::Null, codec);
    }
    match entry.return_value.as_deref().map(str::trim) {
        None | Some(MISSING_VALUE) => Err(missing_value(&entry.method, arguments)),
        Some(text) => codec.parse(text),
    }
}

fn missing_value(method: &str, arguments: &[(String, String)]) -> SpecError {
    SpecError::MissingValue { method: method.to_string(), arguments: describe_arguments(arguments) }
}
