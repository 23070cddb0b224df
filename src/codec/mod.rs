//! Typed value codec.
//!
//! Converts native values to the textual grammar ([`ToRaw`]) and back
//! ([`FromRaw`]). Object references go through the
//! [`IdentityRegistry`](crate::registry::IdentityRegistry) attached to the
//! [`Codec`].

mod convert;
pub mod raw;

pub use raw::{RawValue, MISSING_VALUE, NULL, TIMESTAMP_FORMAT};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpecError};
use crate::registry::IdentityRegistry;

/// How unquoted text is treated when the target type is a string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringMode {
    /// Strings must be quote-delimited.
    #[default]
    Strict,
    /// Legacy path: bare words and numbers also convert to strings.
    Permissive,
}

/// Conversion context: the registry used for object references and the
/// string coercion mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct Codec<'a> {
    registry: Option<&'a IdentityRegistry>,
    strings: StringMode,
}

impl<'a> Codec<'a> {
    /// Creates a strict codec backed by the given registry.
    #[must_use]
    pub fn new(registry: &'a IdentityRegistry) -> Self {
        Self { registry: Some(registry), strings: StringMode::Strict }
    }

    /// Creates a codec without a registry; object references never resolve.
    #[must_use]
    pub fn detached() -> Codec<'static> {
        Codec { registry: None, strings: StringMode::Strict }
    }

    /// Returns a copy of this codec using the given string mode.
    #[must_use]
    pub fn with_strings(self, strings: StringMode) -> Self {
        Self { strings, ..self }
    }

    /// The attached registry, if any.
    #[must_use]
    pub fn registry(&self) -> Option<&'a IdentityRegistry> {
        self.registry
    }

    /// The string coercion mode.
    #[must_use]
    pub fn strings(&self) -> StringMode {
        self.strings
    }

    /// Formats a value into its textual representation.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Format`] for values the grammar cannot represent.
    pub fn format<T: ToRaw + ?Sized>(&self, value: &T) -> Result<String> {
        value.to_raw(self)
    }

    /// Parses text into a value of type `T`.
    ///
    /// # Errors
    ///
    /// - [`SpecError::UnknownObject`] if the text contains `<unknown...>`.
    /// - [`SpecError::Resolution`] if an `<id:NAME>` is not registered.
    /// - [`SpecError::Format`] if the text does not fit `T`.
    pub fn parse<T: FromRaw>(&self, text: &str) -> Result<T> {
        let raw = RawValue::parse(text)?;
        if let Some(token) = raw.find_unknown() {
            return Err(SpecError::UnknownObject(token));
        }
        T::from_raw(&raw, self)
    }
}

/// Values that can be written into a specification.
pub trait ToRaw {
    /// Renders this value as specification text.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Format`] when the value cannot be represented.
    fn to_raw(&self, codec: &Codec<'_>) -> Result<String>;
}

/// Values that can be read back from a specification.
pub trait FromRaw: Sized {
    /// `true` only for `()`, the return type of calls without a value.
    const IS_VOID: bool = false;

    /// Converts a syntactic value into `Self`.
    ///
    /// # Errors
    ///
    /// Returns an error when `raw` does not fit this type.
    fn from_raw(raw: &RawValue, codec: &Codec<'_>) -> Result<Self>;
}

/// Formats `(name, value)` pairs as `name: value, ...` for error messages.
pub(crate) fn describe_arguments(arguments: &[(String, String)]) -> String {
    arguments.iter().map(|(name, value)| format!("{name}: {value}")).collect::<Vec<_>>().join(", ")
}
