//! Type-to-encoder dispatch
//!
//! Lookup is two-phase: the value's exact key ([`Value::type_key`]) first, then
//! a scan of the table in insertion order for the first [`Capability`] the
//! value satisfies.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use tracing::trace;

use crate::encoder::{self, Encoder};
use crate::value::{CustomValue, Kind, Value};
use crate::{CborError, Result};

/// Encoder function: writes `value` through the encoder, recursing as needed
pub type EncodeFn = Arc<dyn Fn(&mut Encoder<'_>, &Value) -> Result<()> + Send + Sync>;

/// Behaviour a value can have regardless of its concrete type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Array-like
    Sequence,
    /// Key-value mapping
    Mapping,
}

impl Capability {
    pub fn matches(self, value: &Value) -> bool {
        match (self, value) {
            (Capability::Sequence, Value::Array(_)) => true,
            (Capability::Mapping, Value::Map(_)) => true,
            (Capability::Sequence, Value::Custom(c)) => c.get().as_sequence().is_some(),
            (Capability::Mapping, Value::Custom(c)) => c.get().as_mapping().is_some(),
            _ => false,
        }
    }
}

/// Key of a dispatch table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKey {
    /// A built-in value kind
    Kind(Kind),
    /// A concrete caller-defined type
    Type(TypeId),
    /// Any value with the given capability
    Capability(Capability),
}

impl TypeKey {
    pub fn of<T: CustomValue>() -> Self {
        TypeKey::Type(TypeId::of::<T>())
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            TypeKey::Capability(cap) => cap.matches(value),
            key => *key == value.type_key(),
        }
    }
}

impl From<Kind> for TypeKey {
    fn from(kind: Kind) -> Self {
        TypeKey::Kind(kind)
    }
}

impl From<Capability> for TypeKey {
    fn from(cap: Capability) -> Self {
        TypeKey::Capability(cap)
    }
}

static DEFAULT_ENCODERS: LazyLock<EncoderTable> = LazyLock::new(EncoderTable::builtin);

/// Ordered table of `TypeKey -> EncodeFn`, fixed once built
#[derive(Clone)]
pub struct EncoderTable {
    entries: Vec<(TypeKey, EncodeFn)>,
    index: HashMap<TypeKey, usize>,
}

impl EncoderTable {
    /// The built-in table, shared by every encoder without overrides
    pub fn defaults() -> &'static EncoderTable {
        &DEFAULT_ENCODERS
    }

    /// Copy of the built-in table with `overrides` applied in order. An override
    /// for an existing key replaces that entry in place, new keys are appended.
    pub fn merged(overrides: &[(TypeKey, EncodeFn)]) -> EncoderTable {
        let mut table = EncoderTable::defaults().clone();
        for (key, f) in overrides {
            table.insert(*key, Arc::clone(f));
        }
        table
    }

    fn builtin() -> EncoderTable {
        let builtin: [(TypeKey, fn(&mut Encoder<'_>, &Value) -> Result<()>); 21] = [
            (Kind::Text.into(), encoder::encode_text),
            (Kind::Bytes.into(), encoder::encode_bytes),
            (Kind::Integer.into(), encoder::encode_integer),
            (Kind::BigInt.into(), encoder::encode_bigint),
            (Kind::Float.into(), encoder::encode_float),
            (Kind::Decimal.into(), encoder::encode_decimal),
            (Kind::Bool.into(), encoder::encode_bool),
            (Kind::Null.into(), encoder::encode_null),
            (Kind::Undefined.into(), encoder::encode_undefined),
            (Kind::Array.into(), encoder::encode_sequence),
            (Kind::Map.into(), encoder::encode_mapping),
            (Capability::Mapping.into(), encoder::encode_mapping),
            (Capability::Sequence.into(), encoder::encode_sequence),
            (Kind::DateTime.into(), encoder::encode_datetime),
            (Kind::NaiveDateTime.into(), encoder::encode_datetime),
            (Kind::Date.into(), encoder::encode_date),
            (Kind::Regex.into(), encoder::encode_regex),
            (Kind::Rational.into(), encoder::encode_rational),
            (Kind::Mime.into(), encoder::encode_mime),
            (Kind::Uuid.into(), encoder::encode_uuid),
            (Kind::Tag.into(), encoder::encode_custom_tag),
        ];

        let mut table = EncoderTable {
            entries: Vec::with_capacity(builtin.len()),
            index: HashMap::with_capacity(builtin.len()),
        };
        for (key, f) in builtin {
            table.insert(key, Arc::new(f));
        }
        table
    }

    fn insert(&mut self, key: TypeKey, f: EncodeFn) {
        match self.index.get(&key) {
            Some(&pos) => self.entries[pos].1 = f,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push((key, f));
            }
        }
    }

    /// Finds the encoder for `value`
    pub fn resolve(&self, value: &Value) -> Result<&EncodeFn> {
        if let Some(&pos) = self.index.get(&value.type_key()) {
            return Ok(&self.entries[pos].1);
        }
        // Fall back to the first capability match, in table order
        self.entries
            .iter()
            .find(|(key, _)| key.matches(value))
            .map(|(key, f)| {
                trace!(type_name = value.type_name(), ?key, "dispatched by capability");
                f
            })
            .ok_or_else(|| CborError::UnsupportedType(value.type_name().to_string()))
    }

    pub fn keys(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.entries.iter().map(|(key, _)| *key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for EncoderTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}
