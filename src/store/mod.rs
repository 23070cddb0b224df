//! Spec store: where approved and received specifications live on disk.
//!
//! One file per test case, named after the test class and method:
//!
//! ```text
//! <root>/
//!   ├── Checkout.places_order.approved.txt
//!   ├── Checkout.places_order.received.txt      (only after a mismatch)
//!   ├── Pricing.totals.small.approved.txt       (case "small")
//!   └── Pricing.totals.large.approved.txt       (case "large")
//! ```

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::context::SpecSession;
use crate::error::{Result, SpecError};
use crate::registry::IdentityRegistry;

const APPROVED_SUFFIX: &str = ".approved.txt";
const RECEIVED_SUFFIX: &str = ".received.txt";

/// Identifies one specification file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SpecCase {
    /// Test class (or module) name.
    pub class: String,
    /// Test method name.
    pub method: String,
    /// Case name for data-driven tests.
    pub case: Option<String>,
}

impl SpecCase {
    /// The single, unnamed case of a test.
    #[must_use]
    pub fn new(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self { class: class.into(), method: method.into(), case: None }
    }

    /// The same test with a named case.
    #[must_use]
    pub fn with_case(mut self, case: impl Into<String>) -> Self {
        self.case = Some(case.into());
        self
    }

    /// File name without the approved/received suffix.
    #[must_use]
    pub fn stem(&self) -> String {
        match &self.case {
            Some(case) => format!("{}.{}.{case}", self.class, self.method),
            None => format!("{}.{}", self.class, self.method),
        }
    }
}

impl fmt::Display for SpecCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stem())
    }
}

/// File-backed store of specifications under one root directory.
#[derive(Debug, Clone)]
pub struct SpecStore {
    root: PathBuf,
}

impl SpecStore {
    /// Creates a store rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the approved specification for `case`.
    #[must_use]
    pub fn approved_path(&self, case: &SpecCase) -> PathBuf {
        self.root.join(format!("{}{APPROVED_SUFFIX}", case.stem()))
    }

    /// Path of the received specification for `case`.
    #[must_use]
    pub fn received_path(&self, case: &SpecCase) -> PathBuf {
        self.root.join(format!("{}{RECEIVED_SUFFIX}", case.stem()))
    }

    /// Reads the approved text; a missing file reads as empty.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Io`] for anything but a missing file.
    pub fn load(&self, case: &SpecCase) -> Result<String> {
        match std::fs::read_to_string(self.approved_path(case)) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(%case, "no approved specification yet");
                Ok(String::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Opens a session replaying from the approved text of `case`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or does not parse.
    pub fn session(&self, case: &SpecCase, registry: Arc<IdentityRegistry>) -> Result<SpecSession> {
        SpecSession::new(&self.load(case)?, registry)
    }

    /// Lists the cases of a test, sorted by name.
    ///
    /// When no approved file exists yet, the unnamed default case is
    /// returned so the test still runs once and produces a received file.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Io`] if the root exists but cannot be listed.
    pub fn discover(&self, class: &str, method: &str) -> Result<Vec<SpecCase>> {
        let default = SpecCase::new(class, method);
        let prefix = format!("{}.", default.stem());
        let mut cases = Vec::new();

        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![default]),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(rest) = name.strip_prefix(&prefix) else { continue };
            if rest == &APPROVED_SUFFIX[1..] {
                cases.push(default.clone());
            } else if let Some(case) = rest.strip_suffix(APPROVED_SUFFIX) {
                cases.push(default.clone().with_case(case));
            }
        }

        if cases.is_empty() {
            cases.push(default);
        }
        cases.sort();
        tracing::debug!(class, method, count = cases.len(), "discovered cases");
        Ok(cases)
    }

    /// Compares a finished session with the approved text.
    ///
    /// On a mismatch the produced text is written to the received file; on
    /// a match any stale received file is removed.
    ///
    /// # Errors
    ///
    /// [`SpecError::Diverged`] on a mismatch, [`SpecError::Io`] if the
    /// received file cannot be written or removed.
    pub fn verify(&self, case: &SpecCase, session: &SpecSession) -> Result<()> {
        let received = self.received_path(case);
        match session.verify() {
            Ok(()) => match std::fs::remove_file(&received) {
                Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            },
            Err(err @ SpecError::Diverged { .. }) => {
                std::fs::create_dir_all(&self.root)?;
                std::fs::write(&received, session.text())?;
                tracing::warn!(%case, path = %received.display(), "wrote received specification");
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Promotes the received file of `case` to approved.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Io`] if there is no received file or it cannot
    /// be moved.
    pub fn approve(&self, case: &SpecCase) -> Result<PathBuf> {
        let received = self.received_path(case);
        let approved = self.approved_path(case);
        std::fs::rename(&received, &approved).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                SpecError::Io(std::io::Error::new(
                    ErrorKind::NotFound,
                    format!("no received specification at {}", received.display()),
                ))
            } else {
                e.into()
            }
        })?;
        tracing::debug!(%case, "approved specification");
        Ok(approved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<IdentityRegistry> {
        Arc::new(IdentityRegistry::new())
    }

    #[test]
    fn file_names_follow_class_method_case() {
        let store = SpecStore::new("/specs");
        let case = SpecCase::new("Checkout", "places_order");
        assert_eq!(store.approved_path(&case), Path::new("/specs/Checkout.places_order.approved.txt"));
        let case = case.with_case("bulk");
        assert_eq!(
            store.received_path(&case),
            Path::new("/specs/Checkout.places_order.bulk.received.txt")
        );
    }

    #[test]
    fn missing_files_load_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SpecStore::new(dir.path());
        assert_eq!(store.load(&SpecCase::new("A", "b")).unwrap(), "");
    }

    #[test]
    fn discover_synthesizes_a_default_case() {
        let dir = tempfile::tempdir().unwrap();
        let store = SpecStore::new(dir.path().join("absent"));
        assert_eq!(store.discover("A", "b").unwrap(), vec![SpecCase::new("A", "b")]);
    }

    #[test]
    fn discover_lists_named_cases_only_for_the_test() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "Pricing.totals.small.approved.txt",
            "Pricing.totals.large.approved.txt",
            "Pricing.totals.large.received.txt",
            "Pricing.discounts.approved.txt",
            "Pricing.totalsx.approved.txt",
        ] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let store = SpecStore::new(dir.path());
        let cases = store.discover("Pricing", "totals").unwrap();
        let names: Vec<_> = cases.iter().map(|c| c.case.as_deref()).collect();
        assert_eq!(names, [Some("large"), Some("small")]);
        assert_eq!(store.discover("Pricing", "discounts").unwrap(), vec![SpecCase::new("Pricing", "discounts")]);
    }

    #[test]
    fn verify_writes_received_then_approve_promotes_it() {
        let dir = tempfile::tempdir().unwrap();
        let store = SpecStore::new(dir.path());
        let case = SpecCase::new("Shop", "ping");

        let session = store.session(&case, registry()).unwrap();
        session.log_call("Ping", &[], Some(&1)).unwrap();
        assert!(matches!(store.verify(&case, &session), Err(SpecError::Diverged { .. })));
        assert_eq!(std::fs::read_to_string(store.received_path(&case)).unwrap(), "🔹 Ping:\n  🔹 Returns: 1\n");

        store.approve(&case).unwrap();
        assert!(!store.received_path(&case).exists());

        let session = store.session(&case, registry()).unwrap();
        session.log_call("Ping", &[], Some(&1)).unwrap();
        store.verify(&case, &session).unwrap();
    }

    #[test]
    fn approving_without_received_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = SpecStore::new(dir.path());
        let err = store.approve(&SpecCase::new("Shop", "ping")).unwrap_err();
        assert!(matches!(err, SpecError::Io(ref e) if e.kind() == ErrorKind::NotFound));
    }
}
