//! Recording and replaying proxies for capabilities.
//!
//! A [`Proxy`] stands in for a collaborator. In recording mode it forwards
//! each call to a live target and logs it; in replaying mode it answers from
//! the session's stored specification and logs the call the same way, so a
//! run that matches the stored text reproduces it byte for byte.
//!
//! Each capability method is implemented on `Proxy<dyn Trait>` through one
//! generic [`CallFrame`]:
//!
//! ```ignore
//! impl Inventory for Proxy<dyn Inventory> {
//!     fn reserve(&self, sku: &str, ticket: &mut Option<String>) -> callspec::Result<bool> {
//!         let mut call = self.call("Reserve")?.arg("sku", sku)?.arg("ticket", &*ticket)?;
//!         let reserved = call.execute(|live| live.reserve(sku, ticket))?;
//!         call.output("ticket", ticket)?;
//!         call.finish()?;
//!         Ok(reserved)
//!     }
//! }
//! ```

use std::fmt::Display;
use std::sync::Arc;

use crate::codec::{describe_arguments, FromRaw, RawValue, ToRaw, MISSING_VALUE};
use crate::context::SpecSession;
use crate::error::{Result, SpecError};
use crate::ports::{Capability, MethodDescriptor};
use crate::specfile::{resolve_return, SpecEntry};

/// Stand-in for a collaborator implementing capability `C`.
pub struct Proxy<C: ?Sized + Capability> {
    target: Option<Arc<C>>,
    session: Arc<SpecSession>,
}

impl<C: ?Sized + Capability> std::fmt::Debug for Proxy<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proxy")
            .field("capability", &C::NAME)
            .field("recording", &self.is_recording())
            .finish_non_exhaustive()
    }
}

impl<C: ?Sized + Capability> Proxy<C> {
    /// Forwards every call to `target` and records it.
    #[must_use]
    pub fn recording(target: Arc<C>, session: Arc<SpecSession>) -> Self {
        Self { target: Some(target), session }
    }

    /// Answers every call from the session's stored specification.
    #[must_use]
    pub fn replaying(session: Arc<SpecSession>) -> Self {
        Self { target: None, session }
    }

    /// Whether calls reach a live target.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.target.is_some()
    }

    /// The session this proxy logs into.
    #[must_use]
    pub fn session(&self) -> &Arc<SpecSession> {
        &self.session
    }

    /// Logs a constructor block under this capability's role name.
    ///
    /// # Errors
    ///
    /// Fails if an argument cannot be formatted.
    pub fn constructed(&self, arguments: &[(&str, &dyn ToRaw)]) -> Result<()> {
        self.session.log_constructor(&C::role_name(), arguments)
    }

    /// Starts intercepting a call to `method`.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Capability`] if `C` has no such method.
    pub fn call(&self, method: &str) -> Result<CallFrame<'_, C>> {
        let descriptor = C::method(method).ok_or_else(|| {
            SpecError::Capability(format!("{} has no method {method}", C::NAME))
        })?;
        Ok(CallFrame {
            proxy: self,
            descriptor,
            entry: SpecEntry::method(method),
            replayed: None,
            stage: Stage::Collecting,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Collecting,
    Executed,
    Logged,
}

/// One intercepted call: inputs, then execution, then outputs.
///
/// The block is written to the session on [`finish`](Self::finish), or
/// immediately when execution fails. A frame dropped after a successful
/// execution is written on drop.
pub struct CallFrame<'p, C: ?Sized + Capability> {
    proxy: &'p Proxy<C>,
    descriptor: &'static MethodDescriptor,
    entry: SpecEntry,
    replayed: Option<SpecEntry>,
    stage: Stage,
}

impl<C: ?Sized + Capability> CallFrame<'_, C> {
    /// Snapshots the pre-call value of an input parameter.
    ///
    /// # Errors
    ///
    /// - [`SpecError::Capability`] if the method has no such input
    ///   parameter or the call already executed.
    /// - Codec errors if the value cannot be formatted.
    pub fn arg<T: ToRaw + ?Sized>(mut self, name: &str, value: &T) -> Result<Self> {
        if self.stage != Stage::Collecting {
            return Err(self.misuse(format!("argument {name} supplied after the call")));
        }
        match self.descriptor.param(name) {
            Some(param) if param.direction.is_input() => {}
            Some(_) => return Err(self.misuse(format!("{name} is an output-only parameter"))),
            None => return Err(self.misuse(format!("unknown parameter {name}"))),
        }
        let text = self.proxy.session.codec().format(value)?;
        self.entry.arguments.push((name.to_string(), text));
        Ok(self)
    }

    /// Runs the call: `live` against the target when recording, the next
    /// stored entry when replaying.
    ///
    /// A failing call is logged before the error is returned. When replaying
    /// hits a missing value the block is logged with `<missing_value>` so the
    /// received text can be completed by hand.
    ///
    /// # Errors
    ///
    /// The live target's error, or any replay, codec or capability error
    /// converted into `E`.
    pub fn execute<R, E, F>(&mut self, live: F) -> std::result::Result<R, E>
    where
        R: ToRaw + FromRaw,
        E: From<SpecError> + Display,
        F: FnOnce(&C) -> std::result::Result<R, E>,
    {
        self.check_ready::<R>()?;
        self.stage = Stage::Executed;

        let proxy = self.proxy;
        let result = match &proxy.target {
            Some(target) => {
                let result = live(target.as_ref());
                proxy.session.skip(&self.entry.method);
                result
            }
            None => self.replay::<R>().map_err(E::from),
        };

        let value = match result {
            Ok(value) => value,
            Err(err) => return Err(self.fail(err)),
        };
        if self.descriptor.returns {
            match self.proxy.session.codec().format(&value) {
                Ok(text) => self.entry.return_value = Some(text),
                Err(err) => return Err(self.fail(E::from(err))),
            }
        }
        Ok(value)
    }

    /// Logs the block with `err` as its exception note and hands the error
    /// back for propagation.
    fn fail<E: Display>(&mut self, err: E) -> E {
        if self.entry.note.is_none() && self.entry.return_value.is_none() {
            self.entry.note = Some(flatten(&err.to_string()));
        }
        self.log();
        err
    }

    /// Captures the post-call value of an out or inout parameter. When
    /// replaying, `value` is first overwritten with the stored output.
    ///
    /// # Errors
    ///
    /// - [`SpecError::Capability`] if the parameter is not an output or the
    ///   call has not executed.
    /// - [`SpecError::Format`] if the stored entry lacks the output.
    /// - Codec errors on conversion.
    pub fn output<T: ToRaw + FromRaw>(&mut self, name: &str, value: &mut T) -> Result<()> {
        if self.stage != Stage::Executed {
            return Err(self.misuse(format!("output {name} captured outside a completed call")));
        }
        if !self.descriptor.param(name).is_some_and(|param| param.direction.is_output()) {
            return Err(self.misuse(format!("{name} is not an output parameter")));
        }

        if !self.proxy.is_recording() {
            let stored = self
                .replayed
                .as_ref()
                .and_then(|entry| entry.outputs.iter().find(|(n, _)| n == name))
                .map(|(_, text)| text.clone())
                .ok_or_else(|| {
                    SpecError::format(format!(
                        "{} has no recorded output {name}",
                        self.entry.method
                    ))
                })?;
            *value = self.proxy.session.codec().parse(&stored)?;
        }

        let text = self.proxy.session.codec().format(&*value)?;
        self.entry.outputs.push((name.to_string(), text));
        Ok(())
    }

    /// Writes the block to the session.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Capability`] if the call never executed.
    pub fn finish(mut self) -> Result<()> {
        match self.stage {
            Stage::Collecting => Err(self.misuse("finished before executing".to_string())),
            Stage::Executed => {
                self.log();
                Ok(())
            }
            Stage::Logged => Ok(()),
        }
    }

    fn check_ready<R: FromRaw>(&self) -> Result<()> {
        if self.stage != Stage::Collecting {
            return Err(self.misuse("executed twice".to_string()));
        }
        if self.descriptor.returns == R::IS_VOID {
            let expected = if self.descriptor.returns { "a return value" } else { "no return value" };
            return Err(self.misuse(format!("declared with {expected}")));
        }
        let supplied = self.entry.arguments.iter().map(|(name, _)| name.as_str());
        if !supplied.eq(self.descriptor.input_names()) {
            let expected: Vec<_> = self.descriptor.input_names().collect();
            return Err(self.misuse(format!("expects inputs [{}]", expected.join(", "))));
        }
        Ok(())
    }

    fn replay<R: FromRaw>(&mut self) -> Result<R> {
        let proxy = self.proxy;
        let session = &proxy.session;
        let value = match session.advance(&self.entry.method, &self.entry.arguments, !R::IS_VOID) {
            Ok(Some(replayed)) => {
                let value = resolve_return::<R>(&replayed, &self.entry.arguments, &session.codec());
                self.replayed = Some(replayed);
                value
            }
            Ok(None) => session.parse_raw(&RawValue::Null),
            Err(err) => Err(err),
        };
        match &value {
            Err(SpecError::MissingValue { .. }) => {
                self.entry.return_value = Some(MISSING_VALUE.to_string());
            }
            Err(SpecError::RecordedFailure { note, .. }) => self.entry.note = Some(note.clone()),
            _ => {}
        }
        value
    }

    fn log(&mut self) {
        if self.stage == Stage::Logged {
            return;
        }
        self.proxy.session.record(&self.entry);
        self.stage = Stage::Logged;
        tracing::debug!(method = %self.entry.method, recording = self.proxy.is_recording(), "logged call");
    }

    fn misuse(&self, message: String) -> SpecError {
        SpecError::Capability(format!(
            "{}.{}({}): {message}",
            C::NAME,
            self.entry.method,
            describe_arguments(&self.entry.arguments)
        ))
    }
}

impl<C: ?Sized + Capability> Drop for CallFrame<'_, C> {
    fn drop(&mut self) {
        if self.stage == Stage::Executed {
            self.log();
        }
    }
}

/// Exception notes stay on one line.
fn flatten(message: &str) -> String {
    message.split_whitespace().collect::<Vec<_>>().join(" ")
}
