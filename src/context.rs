//! Per-test session context threaded through every proxy.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;

use crate::codec::{Codec, FromRaw, RawValue, StringMode, ToRaw};
use crate::error::{Result, SpecError};
use crate::registry::IdentityRegistry;
use crate::specfile::format::render_preamble;
use crate::specfile::{normalize, render_diff, SpecEntry, SpecRecorder, SpecReplayer, Specification};

/// Unchanged lines shown around each change in a divergence diff.
const DIFF_CONTEXT: usize = 3;

struct SessionState {
    replayer: SpecReplayer,
    recorder: SpecRecorder,
    inputs: IndexMap<String, String>,
}

/// Bundles everything one test run records into and replays from.
///
/// Holds the parsed stored specification with its replay cursor, the write
/// buffer of the current run, the test inputs and a shared
/// [`IdentityRegistry`]. Create one per test; sessions never share state
/// except through a registry passed to several of them.
pub struct SpecSession {
    registry: Arc<IdentityRegistry>,
    strings: StringMode,
    stored: Specification,
    stored_text: String,
    state: Mutex<SessionState>,
}

impl std::fmt::Debug for SpecSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecSession")
            .field("entries", &self.stored.entries().count())
            .field("cursor", &self.cursor())
            .field("strings", &self.strings)
            .finish_non_exhaustive()
    }
}

impl SpecSession {
    /// Creates a session replaying from `stored_text`.
    ///
    /// # Errors
    ///
    /// Fails if the stored text does not pass parse-time validation (see
    /// [`Specification::parse`]).
    pub fn new(stored_text: &str, registry: Arc<IdentityRegistry>) -> Result<Self> {
        let stored = Specification::parse(stored_text)?;
        Ok(Self::from_parts(stored, normalize(stored_text), registry))
    }

    /// Creates a session with no stored specification, for a first
    /// recording.
    #[must_use]
    pub fn empty(registry: Arc<IdentityRegistry>) -> Self {
        Self::from_parts(Specification::default(), String::new(), registry)
    }

    fn from_parts(stored: Specification, stored_text: String, registry: Arc<IdentityRegistry>) -> Self {
        let state = SessionState {
            replayer: SpecReplayer::new(&stored),
            recorder: SpecRecorder::new(),
            inputs: IndexMap::new(),
        };
        Self { registry, strings: StringMode::Strict, stored, stored_text, state: Mutex::new(state) }
    }

    /// Switches the string coercion mode used for every conversion.
    #[must_use]
    pub fn with_string_mode(mut self, strings: StringMode) -> Self {
        self.strings = strings;
        self
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The registry object references resolve against.
    #[must_use]
    pub fn registry(&self) -> &Arc<IdentityRegistry> {
        &self.registry
    }

    /// Codec bound to this session's registry and string mode.
    #[must_use]
    pub fn codec(&self) -> Codec<'_> {
        Codec::new(&self.registry).with_strings(self.strings)
    }

    /// The parsed stored specification.
    #[must_use]
    pub fn stored(&self) -> &Specification {
        &self.stored
    }

    /// The stored text, whitespace-normalized.
    #[must_use]
    pub fn stored_text(&self) -> &str {
        &self.stored_text
    }

    /// Replay position: number of stored entries consumed so far.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.lock().replayer.cursor()
    }

    /// Adds a named test input to the preamble of the produced text.
    ///
    /// # Errors
    ///
    /// Fails if the value cannot be formatted.
    pub fn record_input<T: ToRaw + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let text = self.codec().format(value)?;
        self.lock().inputs.insert(name.to_string(), text);
        Ok(())
    }

    /// Reads a test input from the stored preamble and echoes it into the
    /// produced preamble.
    ///
    /// # Errors
    ///
    /// - [`SpecError::MissingInput`] if the stored preamble lacks `name`.
    /// - Codec errors if the text does not convert to `T`.
    pub fn input<T: FromRaw>(&self, name: &str) -> Result<T> {
        let text = self
            .stored
            .preamble
            .get(name)
            .ok_or_else(|| SpecError::MissingInput(name.to_string()))?;
        let value = self.codec().parse(text)?;
        self.lock().inputs.insert(name.to_string(), text.clone());
        Ok(value)
    }

    /// Writes a constructor block for `subject`.
    ///
    /// # Errors
    ///
    /// Fails if an argument cannot be formatted.
    pub fn log_constructor(&self, subject: &str, arguments: &[(&str, &dyn ToRaw)]) -> Result<()> {
        let codec = self.codec();
        self.lock().recorder.log_constructor_call(&codec, subject, arguments)
    }

    /// Writes a method-call block from already-evaluated values.
    ///
    /// # Errors
    ///
    /// Fails if an argument or the return value cannot be formatted.
    pub fn log_call(
        &self,
        method: &str,
        arguments: &[(&str, &dyn ToRaw)],
        return_value: Option<&dyn ToRaw>,
    ) -> Result<()> {
        let codec = self.codec();
        self.lock().recorder.log_call(&codec, method, arguments, return_value)
    }

    /// Replays the next call directly, without a proxy.
    ///
    /// # Errors
    ///
    /// See [`SpecReplayer::next_return_value`].
    pub fn next_return_value<T: FromRaw>(&self, method: &str, arguments: &[(&str, &dyn ToRaw)]) -> Result<T> {
        let codec = self.codec();
        let arguments = crate::specfile::recorder::format_arguments(&codec, arguments)?;
        self.lock().replayer.next_return_value(method, &arguments, &codec)
    }

    /// The text produced by this run: preamble plus every recorded block.
    #[must_use]
    pub fn text(&self) -> String {
        let state = self.lock();
        let mut out = String::new();
        render_preamble(&state.inputs, &mut out);
        out.push_str(state.recorder.text());
        normalize(&out)
    }

    /// Compares the produced text with the stored text.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Diverged`] with a line diff when they differ.
    pub fn verify(&self) -> Result<()> {
        let received = self.text();
        if received == self.stored_text {
            return Ok(());
        }
        let diff = render_diff(&self.stored_text, &received, DIFF_CONTEXT);
        tracing::warn!(
            stored_lines = self.stored_text.lines().count(),
            received_lines = received.lines().count(),
            "specification diverged"
        );
        Err(SpecError::Diverged { diff })
    }

    pub(crate) fn advance(
        &self,
        method: &str,
        arguments: &[(String, String)],
        has_return_value: bool,
    ) -> Result<Option<SpecEntry>> {
        self.lock().replayer.advance(method, arguments, has_return_value)
    }

    pub(crate) fn skip(&self, method: &str) {
        self.lock().replayer.skip(method);
    }

    pub(crate) fn record(&self, entry: &SpecEntry) {
        self.lock().recorder.record(entry);
    }

    pub(crate) fn parse_raw<T: FromRaw>(&self, raw: &RawValue) -> Result<T> {
        T::from_raw(raw, &self.codec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORED: &str = "📋 <Test Inputs>\n  🔸 sku: \"P1\"\n\n🔹 CheckStock:\n  🔸 productId: \"P1\"\n  🔸 quantity: 2\n  🔹 Returns: True\n";

    fn session(text: &str) -> SpecSession {
        SpecSession::new(text, Arc::new(IdentityRegistry::new())).unwrap()
    }

    #[test]
    fn replaying_and_recording_reproduce_stored_text() {
        let session = session(STORED);
        let sku: String = session.input("sku").unwrap();
        assert_eq!(sku, "P1");

        let in_stock: bool =
            session.next_return_value("CheckStock", &[("productId", &sku), ("quantity", &2)]).unwrap();
        assert!(in_stock);
        session
            .log_call("CheckStock", &[("productId", &sku), ("quantity", &2)], Some(&in_stock))
            .unwrap();

        assert_eq!(session.cursor(), 1);
        assert_eq!(session.text(), STORED);
        session.verify().unwrap();
    }

    #[test]
    fn missing_inputs_are_reported() {
        let session = session(STORED);
        assert!(matches!(session.input::<String>("customer"), Err(SpecError::MissingInput(n)) if n == "customer"));
    }

    #[test]
    fn recorded_inputs_open_the_text() {
        let session = SpecSession::empty(Arc::new(IdentityRegistry::new()));
        session.record_input("count", &3).unwrap();
        session.log_call("Ping", &[], None).unwrap();
        assert_eq!(session.text(), "📋 <Test Inputs>\n  🔸 count: 3\n\n🔹 Ping:\n");
    }

    #[test]
    fn divergence_reports_a_line_diff() {
        let session = session("🔹 Ping:\n  🔹 Returns: 1\n");
        session.log_call("Ping", &[], Some(&2)).unwrap();
        let SpecError::Diverged { diff } = session.verify().unwrap_err() else {
            panic!("expected a divergence");
        };
        assert!(diff.contains("-  🔹 Returns: 1"));
        assert!(diff.contains("+  🔹 Returns: 2"));
    }

    #[test]
    fn empty_session_verifies_when_nothing_was_recorded() {
        let session = SpecSession::empty(Arc::new(IdentityRegistry::new()));
        session.verify().unwrap();
        assert_eq!(session.stored_text(), "");
    }

    #[test]
    fn permissive_sessions_accept_bare_strings() {
        let session = session("📋 <Test Inputs>\n  🔸 name: Ada\n").with_string_mode(StringMode::Permissive);
        assert_eq!(session.input::<String>("name").unwrap(), "Ada");
    }

    #[test]
    fn constructor_blocks_do_not_consume_replay_slots() {
        let session = SpecSession::empty(Arc::new(IdentityRegistry::new()));
        session.log_constructor("Inventory", &[("warehouse", &"W1")]).unwrap();
        assert_eq!(session.cursor(), 0);
        assert_eq!(session.text(), "🔧 Inventory constructor called with:\n  🔸 warehouse: \"W1\"\n");
    }
}
