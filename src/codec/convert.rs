//! [`ToRaw`] / [`FromRaw`] implementations for native types.

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use indexmap::IndexMap;

use super::raw::{RawValue, NULL, TIMESTAMP_FORMAT};
use super::{Codec, FromRaw, StringMode, ToRaw};
use crate::error::{Result, SpecError};
use crate::registry::short_type_name;

fn mismatch(expected: &str, raw: &RawValue) -> SpecError {
    SpecError::format(format!("expected {expected}, found `{raw}`"))
}

impl<T: ToRaw + ?Sized> ToRaw for &T {
    fn to_raw(&self, codec: &Codec<'_>) -> Result<String> {
        (**self).to_raw(codec)
    }
}

impl<T: ToRaw + ?Sized> ToRaw for &mut T {
    fn to_raw(&self, codec: &Codec<'_>) -> Result<String> {
        (**self).to_raw(codec)
    }
}

impl ToRaw for () {
    fn to_raw(&self, _codec: &Codec<'_>) -> Result<String> {
        Ok(NULL.to_string())
    }
}

impl FromRaw for () {
    const IS_VOID: bool = true;

    fn from_raw(_raw: &RawValue, _codec: &Codec<'_>) -> Result<Self> {
        Ok(())
    }
}

impl ToRaw for RawValue {
    fn to_raw(&self, _codec: &Codec<'_>) -> Result<String> {
        Ok(self.to_string())
    }
}

impl FromRaw for RawValue {
    fn from_raw(raw: &RawValue, _codec: &Codec<'_>) -> Result<Self> {
        Ok(raw.clone())
    }
}

// Strings are written between quotes without escaping, so embedded quotes
// and line breaks are rejected instead of producing unparseable text.
impl ToRaw for str {
    fn to_raw(&self, _codec: &Codec<'_>) -> Result<String> {
        if self.contains('"') {
            return Err(SpecError::format(format!(
                "strings containing '\"' are not supported: {self:?}"
            )));
        }
        if self.contains(['\n', '\r']) {
            return Err(SpecError::format(format!(
                "strings containing line breaks are not supported: {self:?}"
            )));
        }
        Ok(format!("\"{self}\""))
    }
}

impl ToRaw for String {
    fn to_raw(&self, codec: &Codec<'_>) -> Result<String> {
        self.as_str().to_raw(codec)
    }
}

impl FromRaw for String {
    fn from_raw(raw: &RawValue, codec: &Codec<'_>) -> Result<Self> {
        match (raw, codec.strings()) {
            (RawValue::Str(s), _) => Ok(s.clone()),
            (RawValue::Bare(s) | RawValue::Number(s), StringMode::Permissive) => Ok(s.clone()),
            (other, _) => Err(mismatch("quoted string", other)),
        }
    }
}

impl ToRaw for bool {
    fn to_raw(&self, _codec: &Codec<'_>) -> Result<String> {
        Ok(String::from(if *self { "True" } else { "False" }))
    }
}

impl FromRaw for bool {
    fn from_raw(raw: &RawValue, _codec: &Codec<'_>) -> Result<Self> {
        match raw {
            RawValue::Bool(b) => Ok(*b),
            other => Err(mismatch("True or False", other)),
        }
    }
}

macro_rules! integer_codec {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToRaw for $ty {
                fn to_raw(&self, _codec: &Codec<'_>) -> Result<String> {
                    Ok(self.to_string())
                }
            }

            impl FromRaw for $ty {
                fn from_raw(raw: &RawValue, _codec: &Codec<'_>) -> Result<Self> {
                    match raw {
                        RawValue::Number(text) => text.parse::<$ty>().map_err(|e| {
                            SpecError::format(format!(
                                "{text} is not a valid {}: {e}",
                                stringify!($ty)
                            ))
                        }),
                        other => Err(mismatch(stringify!($ty), other)),
                    }
                }
            }
        )*
    };
}

integer_codec!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

macro_rules! float_codec {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToRaw for $ty {
                fn to_raw(&self, _codec: &Codec<'_>) -> Result<String> {
                    let text = if self.is_nan() {
                        "NaN".to_string()
                    } else if self.is_infinite() && self.is_sign_positive() {
                        "Infinity".to_string()
                    } else if self.is_infinite() {
                        "-Infinity".to_string()
                    } else {
                        self.to_string()
                    };
                    Ok(text)
                }
            }

            impl FromRaw for $ty {
                fn from_raw(raw: &RawValue, _codec: &Codec<'_>) -> Result<Self> {
                    match raw {
                        RawValue::Number(text) => match text.as_str() {
                            "NaN" => Ok(<$ty>::NAN),
                            "Infinity" => Ok(<$ty>::INFINITY),
                            "-Infinity" => Ok(<$ty>::NEG_INFINITY),
                            _ => text.parse::<$ty>().map_err(|e| {
                                SpecError::format(format!(
                                    "{text} is not a valid {}: {e}",
                                    stringify!($ty)
                                ))
                            }),
                        },
                        other => Err(mismatch(stringify!($ty), other)),
                    }
                }
            }
        )*
    };
}

float_codec!(f32, f64);

impl ToRaw for NaiveDateTime {
    fn to_raw(&self, _codec: &Codec<'_>) -> Result<String> {
        Ok(self.format(TIMESTAMP_FORMAT).to_string())
    }
}

impl FromRaw for NaiveDateTime {
    fn from_raw(raw: &RawValue, _codec: &Codec<'_>) -> Result<Self> {
        match raw {
            RawValue::Timestamp(t) => Ok(*t),
            other => Err(mismatch("timestamp (yyyy-MM-dd HH:mm:ss)", other)),
        }
    }
}

impl ToRaw for DateTime<Utc> {
    fn to_raw(&self, codec: &Codec<'_>) -> Result<String> {
        self.naive_utc().to_raw(codec)
    }
}

impl FromRaw for DateTime<Utc> {
    fn from_raw(raw: &RawValue, codec: &Codec<'_>) -> Result<Self> {
        NaiveDateTime::from_raw(raw, codec).map(|t| t.and_utc())
    }
}

impl<T: ToRaw> ToRaw for Option<T> {
    fn to_raw(&self, codec: &Codec<'_>) -> Result<String> {
        match self {
            Some(value) => value.to_raw(codec),
            None => Ok(NULL.to_string()),
        }
    }
}

impl<T: FromRaw> FromRaw for Option<T> {
    fn from_raw(raw: &RawValue, codec: &Codec<'_>) -> Result<Self> {
        match raw {
            RawValue::Null => Ok(None),
            other => T::from_raw(other, codec).map(Some),
        }
    }
}

impl<T: ToRaw> ToRaw for [T] {
    fn to_raw(&self, codec: &Codec<'_>) -> Result<String> {
        let items = self.iter().map(|item| item.to_raw(codec)).collect::<Result<Vec<_>>>()?;
        Ok(format!("[{}]", items.join(",")))
    }
}

impl<T: ToRaw, const N: usize> ToRaw for [T; N] {
    fn to_raw(&self, codec: &Codec<'_>) -> Result<String> {
        self.as_slice().to_raw(codec)
    }
}

impl<T: ToRaw> ToRaw for Vec<T> {
    fn to_raw(&self, codec: &Codec<'_>) -> Result<String> {
        self.as_slice().to_raw(codec)
    }
}

impl<T: FromRaw> FromRaw for Vec<T> {
    fn from_raw(raw: &RawValue, codec: &Codec<'_>) -> Result<Self> {
        match raw {
            RawValue::List(items) => items.iter().map(|item| T::from_raw(item, codec)).collect(),
            other => Err(mismatch("bracket-delimited list", other)),
        }
    }
}

fn format_pairs<'v, K, V, I>(pairs: I, codec: &Codec<'_>) -> Result<Vec<(String, String)>>
where
    K: ToRaw + 'v,
    V: ToRaw + 'v,
    I: IntoIterator<Item = (&'v K, &'v V)>,
{
    pairs.into_iter().map(|(k, v)| Ok((k.to_raw(codec)?, v.to_raw(codec)?))).collect()
}

fn render_map(pairs: &[(String, String)]) -> String {
    let body = pairs.iter().map(|(k, v)| format!("{k}: {v}")).collect::<Vec<_>>().join(", ");
    format!("{{{body}}}")
}

fn parse_pairs<K: FromRaw, V: FromRaw>(raw: &RawValue, codec: &Codec<'_>) -> Result<Vec<(K, V)>> {
    match raw {
        RawValue::Map(pairs) => pairs
            .iter()
            .map(|(k, v)| Ok((K::from_raw(k, codec)?, V::from_raw(v, codec)?)))
            .collect(),
        other => Err(mismatch("brace-delimited map", other)),
    }
}

impl<K: ToRaw, V: ToRaw> ToRaw for BTreeMap<K, V> {
    fn to_raw(&self, codec: &Codec<'_>) -> Result<String> {
        Ok(render_map(&format_pairs(self, codec)?))
    }
}

impl<K: FromRaw + Ord, V: FromRaw> FromRaw for BTreeMap<K, V> {
    fn from_raw(raw: &RawValue, codec: &Codec<'_>) -> Result<Self> {
        Ok(parse_pairs(raw, codec)?.into_iter().collect())
    }
}

impl<K: ToRaw, V: ToRaw> ToRaw for IndexMap<K, V> {
    fn to_raw(&self, codec: &Codec<'_>) -> Result<String> {
        Ok(render_map(&format_pairs(self, codec)?))
    }
}

impl<K: FromRaw + Hash + Eq, V: FromRaw> FromRaw for IndexMap<K, V> {
    fn from_raw(raw: &RawValue, codec: &Codec<'_>) -> Result<Self> {
        Ok(parse_pairs(raw, codec)?.into_iter().collect())
    }
}

// Hash maps have no stable iteration order; sort by rendered key so the
// output stays diffable.
impl<K: ToRaw, V: ToRaw, S> ToRaw for HashMap<K, V, S> {
    fn to_raw(&self, codec: &Codec<'_>) -> Result<String> {
        let mut pairs = format_pairs(self, codec)?;
        pairs.sort();
        Ok(render_map(&pairs))
    }
}

impl<K: FromRaw + Hash + Eq, V: FromRaw, S: BuildHasher + Default> FromRaw for HashMap<K, V, S> {
    fn from_raw(raw: &RawValue, codec: &Codec<'_>) -> Result<Self> {
        Ok(parse_pairs(raw, codec)?.into_iter().collect())
    }
}

impl<T: ?Sized + Send + Sync + 'static> ToRaw for Arc<T> {
    fn to_raw(&self, codec: &Codec<'_>) -> Result<String> {
        if let Some(id) = codec.registry().and_then(|registry| registry.id_of(self)) {
            return Ok(format!("<id:{id}>"));
        }
        let type_name = short_type_name::<T>();
        tracing::warn!(object_type = %type_name, "object is not registered; writing it as unknown");
        Ok(format!("<unknown:{type_name}>"))
    }
}

impl<T: ?Sized + Send + Sync + 'static> FromRaw for Arc<T> {
    fn from_raw(raw: &RawValue, codec: &Codec<'_>) -> Result<Self> {
        match raw {
            RawValue::ObjectRef(id) => codec
                .registry()
                .ok_or_else(|| SpecError::resolution(id, "cannot be resolved without a registry"))?
                .resolve_checked::<T>(id),
            RawValue::Unknown(_) => Err(SpecError::UnknownObject(raw.to_string())),
            other => Err(mismatch("object reference <id:NAME>", other)),
        }
    }
}
