use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Write;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveTime};
use half::f16;
use tracing::{debug, trace};

use crate::registry::{EncodeFn, EncoderTable, TypeKey};
use crate::types::{BigInt, Decimal};
use crate::value::{ContainerId, Value};
use crate::*;

/// Encoder configuration
#[derive(Clone, Default)]
pub struct EncoderOptions {
    /// Encode datetimes as epoch timestamps (tag 1) instead of strings (tag 0)
    pub timestamp_mode: bool,
    /// Zone applied to naive datetimes; without it they fail to encode
    pub default_timezone: Option<FixedOffset>,
    /// Emit shared containers once and refer back to them, which also makes
    /// cyclic structures encodable. When off, a cycle is an error.
    ///
    /// Off by default, unlike Python's `cbor2` encoder which enables it; turn it
    /// on with [`with_value_sharing`](Self::with_value_sharing) to get the same
    /// tag 28/29 output as `cbor2.dumps` with default arguments.
    pub value_sharing: bool,
    overrides: Vec<(TypeKey, EncodeFn)>,
}

impl EncoderOptions {
    pub fn with_timestamp_mode(mut self, enabled: bool) -> Self {
        self.timestamp_mode = enabled;
        self
    }

    pub fn with_timezone(mut self, tz: FixedOffset) -> Self {
        self.default_timezone = Some(tz);
        self
    }

    pub fn with_value_sharing(mut self, enabled: bool) -> Self {
        self.value_sharing = enabled;
        self
    }

    /// Registers `f` for `key`, over the built-in encoder for that key if any
    pub fn with_encoder<F>(mut self, key: impl Into<TypeKey>, f: F) -> Self
    where
        F: Fn(&mut Encoder<'_>, &Value) -> Result<()> + Send + Sync + 'static,
    {
        self.overrides.push((key.into(), Arc::new(f)));
        self
    }
}

impl fmt::Debug for EncoderOptions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EncoderOptions")
            .field("timestamp_mode", &self.timestamp_mode)
            .field("default_timezone", &self.default_timezone)
            .field("value_sharing", &self.value_sharing)
            .field(
                "overrides",
                &self.overrides.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            )
            .finish()
    }
}

// Encoder
pub struct Encoder<'w> {
    writer: &'w mut dyn Write,
    timestamp_mode: bool,
    timezone: Option<FixedOffset>,
    value_sharing: bool,
    encoders: EncoderTable,
    container_indexes: HashMap<ContainerId, usize>,
    container_stack: HashSet<ContainerId>,
    depth: usize,
}

impl<'w> Encoder<'w> {
    pub fn new(writer: &'w mut dyn Write) -> Self {
        Self::with_options(writer, &EncoderOptions::default())
    }

    pub fn with_options(writer: &'w mut dyn Write, options: &EncoderOptions) -> Self {
        let encoders = if options.overrides.is_empty() {
            EncoderTable::defaults().clone()
        } else {
            EncoderTable::merged(&options.overrides)
        };
        Encoder {
            writer,
            timestamp_mode: options.timestamp_mode,
            timezone: options.default_timezone,
            value_sharing: options.value_sharing,
            encoders,
            container_indexes: HashMap::new(),
            container_stack: HashSet::new(),
            depth: 0,
        }
    }

    pub fn timestamp_mode(&self) -> bool {
        self.timestamp_mode
    }

    pub fn timezone(&self) -> Option<FixedOffset> {
        self.timezone
    }

    /// Whether value sharing is active (it is suspended inside
    /// [`encode_semantic`](Self::encode_semantic) calls that disable it)
    pub fn value_sharing(&self) -> bool {
        self.value_sharing
    }

    /// Encodes `value` with the encoder registered for its type.
    ///
    /// A call made while no other `encode` is in progress starts a new document:
    /// share indexes from earlier documents are forgotten. Encoder functions
    /// call this for nested values.
    pub fn encode(&mut self, value: &Value) -> Result<()> {
        if self.depth == 0 {
            debug_assert!(self.container_stack.is_empty());
            self.container_indexes.clear();
        }
        let encoder = Arc::clone(self.encoders.resolve(value)?);

        self.depth += 1;
        let result = (*encoder)(self, value);
        self.depth -= 1;

        if self.depth == 0 {
            if let Err(e) = &result {
                debug!(error = %e, type_name = value.type_name(), "encoding failed");
            }
        }
        result
    }

    /// Writes a major type header with its argument in the shortest form
    pub fn write_type_value(&mut self, major: u8, value: u64) -> Result<()> {
        if value < 24 {
            self.writer.write_all(&[(major << 5) | value as u8])?;
        } else if value < 256 {
            self.writer.write_all(&[(major << 5) | 24, value as u8])?;
        } else if value < 65536 {
            self.writer.write_all(&[(major << 5) | 25])?;
            self.writer.write_all(&(value as u16).to_be_bytes())?;
        } else if value < 4294967296 {
            self.writer.write_all(&[(major << 5) | 26])?;
            self.writer.write_all(&(value as u32).to_be_bytes())?;
        } else {
            self.writer.write_all(&[(major << 5) | 27])?;
            self.writer.write_all(&value.to_be_bytes())?;
        }
        Ok(())
    }

    pub fn write_tag(&mut self, tag: u64) -> Result<()> {
        self.write_type_value(MAJOR_TAG, tag)
    }

    /// Writes pre-encoded bytes as they are
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        Ok(())
    }

    pub fn encode_int(&mut self, value: i128) -> Result<()> {
        if value >= 0 {
            let arg = value as u128;
            match u64::try_from(arg) {
                Ok(v) => self.write_type_value(MAJOR_UNSIGNED, v),
                Err(_) => self.encode_bignum(TAG_POSITIVE_BIGNUM, &arg.to_be_bytes()),
            }
        } else {
            let arg = (-1 - value) as u128;
            match u64::try_from(arg) {
                Ok(v) => self.write_type_value(MAJOR_NEGATIVE, v),
                Err(_) => self.encode_bignum(TAG_NEGATIVE_BIGNUM, &arg.to_be_bytes()),
            }
        }
    }

    pub fn encode_bigint(&mut self, value: &BigInt) -> Result<()> {
        let arg = value.cbor_argument();
        let (major, tag) = if value.is_negative() {
            (MAJOR_NEGATIVE, TAG_NEGATIVE_BIGNUM)
        } else {
            (MAJOR_UNSIGNED, TAG_POSITIVE_BIGNUM)
        };
        if arg.len() <= 8 {
            let mut buf = [0u8; 8];
            buf[8 - arg.len()..].copy_from_slice(&arg);
            self.write_type_value(major, u64::from_be_bytes(buf))
        } else {
            self.encode_bignum(tag, &arg)
        }
    }

    // Tag 2/3 around the minimal big-endian argument
    fn encode_bignum(&mut self, tag: u64, arg: &[u8]) -> Result<()> {
        let start = arg.iter().position(|b| *b != 0).unwrap_or(arg.len());
        self.encode_semantic(tag, &Value::Bytes(arg[start..].to_vec()), false)
    }

    /// NaN and the infinities are written as half-precision floats,
    /// every other value as a double (or the shortest lossless width with
    /// the `compact_floats` feature)
    pub fn encode_float(&mut self, value: f64) -> Result<()> {
        if value.is_nan() {
            return self.write_half(f16::NAN);
        }
        if value.is_infinite() {
            return self.write_half(if value > 0.0 {
                f16::INFINITY
            } else {
                f16::NEG_INFINITY
            });
        }

        #[cfg(feature = "compact_floats")]
        {
            if let Some(h) = lossless_float_coerce::<f16>(value) {
                return self.write_half(h);
            }
            if let Some(s) = lossless_float_coerce::<f32>(value) {
                self.writer.write_all(&[(MAJOR_SIMPLE << 5) | 26])?;
                self.writer.write_all(&s.to_be_bytes())?;
                return Ok(());
            }
        }

        self.writer.write_all(&[(MAJOR_SIMPLE << 5) | 27])?;
        self.writer.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    fn write_half(&mut self, value: f16) -> Result<()> {
        self.writer.write_all(&[(MAJOR_SIMPLE << 5) | 25])?;
        self.writer.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    pub fn encode_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.write_type_value(MAJOR_BYTES, value.len() as u64)?;
        self.writer.write_all(value)?;
        Ok(())
    }

    pub fn encode_text(&mut self, value: &str) -> Result<()> {
        self.write_type_value(MAJOR_TEXT, value.len() as u64)?;
        self.writer.write_all(value.as_bytes())?;
        Ok(())
    }

    pub fn encode_bool(&mut self, value: bool) -> Result<()> {
        let val = if value { TRUE } else { FALSE };
        self.writer.write_all(&[(MAJOR_SIMPLE << 5) | val])?;
        Ok(())
    }

    pub fn encode_null(&mut self) -> Result<()> {
        self.writer.write_all(&[(MAJOR_SIMPLE << 5) | NULL])?;
        Ok(())
    }

    pub fn encode_undefined(&mut self) -> Result<()> {
        self.writer.write_all(&[(MAJOR_SIMPLE << 5) | UNDEFINED])?;
        Ok(())
    }

    pub fn encode_array_items(&mut self, items: &[Value]) -> Result<()> {
        for item in items {
            self.encode(item)?;
        }
        Ok(())
    }

    pub fn encode_map_entries(&mut self, entries: &[(Value, Value)]) -> Result<()> {
        for (key, value) in entries {
            self.encode(key)?;
            self.encode(value)?;
        }
        Ok(())
    }

    /// Writes a container header and body, handling value sharing and cycles.
    ///
    /// With value sharing, a container seen before in this document becomes a
    /// back-reference (tag 29) to the index it got on first sight; otherwise it
    /// is marked shareable (tag 28) and given the current stack depth as index.
    /// Without value sharing, re-entering a container that is still being
    /// encoded fails. Empty containers are written plainly in both modes.
    pub fn encode_container<F>(
        &mut self,
        id: ContainerId,
        major: u8,
        len: usize,
        body: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut Encoder<'w>) -> Result<()>,
    {
        if len == 0 {
            return self.write_type_value(major, 0);
        }
        if self.value_sharing {
            if let Some(&index) = self.container_indexes.get(&id) {
                debug!(?id, index, "emitting shared reference");
                self.write_tag(TAG_SHARED_REF)?;
                return self.write_type_value(MAJOR_UNSIGNED, index as u64);
            }
            let index = self.container_stack.len();
            trace!(?id, index, "marking container shareable");
            self.container_indexes.insert(id, index);
            self.write_tag(TAG_SHAREABLE)?;
        } else if self.container_stack.contains(&id) {
            return Err(CborError::CyclicStructure);
        }

        self.write_type_value(major, len as u64)?;
        let mut guard = StackGuard::enter(self, id);
        body(&mut *guard)
    }

    /// Encode the given value as a tagged value.
    ///
    /// `disable_sharing` suspends value sharing for `value` only; use it for
    /// payloads built on the fly that can never be referenced again.
    pub fn encode_semantic(&mut self, tag: u64, value: &Value, disable_sharing: bool) -> Result<()> {
        self.write_tag(tag)?;
        if !disable_sharing {
            return self.encode(value);
        }
        let sharing = std::mem::replace(&mut self.value_sharing, false);
        let result = self.encode(value);
        self.value_sharing = sharing;
        result
    }

    pub fn encode_datetime(&mut self, value: &DateTime<FixedOffset>) -> Result<()> {
        if self.timestamp_mode {
            let seconds = value.timestamp();
            let micros = value.timestamp_subsec_micros();
            let timestamp = if micros == 0 {
                Value::Integer(seconds.into())
            } else {
                Value::Float(seconds as f64 + f64::from(micros) / 1e6)
            };
            self.encode_semantic(TAG_EPOCH_DATETIME, &timestamp, false)
        } else {
            self.encode_semantic(TAG_DATETIME_STRING, &Value::Text(isoformat(value)), false)
        }
    }

    pub fn encode_decimal(&mut self, value: &Decimal) -> Result<()> {
        match value {
            Decimal::NaN => self.write_half(f16::NAN),
            Decimal::Infinity => self.write_half(f16::INFINITY),
            Decimal::NegInfinity => self.write_half(f16::NEG_INFINITY),
            Decimal::Finite { mantissa, exponent } => {
                let pair = Value::array([
                    Value::Integer((*exponent).into()),
                    Value::BigInt(mantissa.clone()),
                ]);
                self.encode_semantic(TAG_DECIMAL_FRACTION, &pair, true)
            }
        }
    }
}

#[cfg(feature = "compact_floats")]
fn lossless_float_coerce<T>(value: f64) -> Option<T>
where
    T: num_traits::FromPrimitive + Into<f64> + Copy,
{
    match <T as num_traits::FromPrimitive>::from_f64(value) {
        Some(f) if <T as Into<f64>>::into(f) == value => Some(f),
        _ => None,
    }
}

/// `YYYY-MM-DDTHH:MM:SS[.ffffff]+HH:MM`, with a zero offset written as `Z`.
/// Offsets that are not whole minutes keep their seconds (`+HH:MM:SS`).
fn isoformat(value: &DateTime<FixedOffset>) -> String {
    let mut out = value.format("%Y-%m-%dT%H:%M:%S").to_string();
    let micros = value.timestamp_subsec_micros();
    if micros != 0 {
        out.push_str(&format!(".{micros:06}"));
    }
    let offset = value.offset().local_minus_utc();
    if offset == 0 {
        out.push('Z');
    } else if offset % 60 != 0 {
        out.push_str(&value.format("%::z").to_string());
    } else {
        out.push_str(&value.format("%:z").to_string());
    }
    out
}

/// Keeps a container id on the active stack until dropped
struct StackGuard<'e, 'w> {
    encoder: &'e mut Encoder<'w>,
    id: ContainerId,
}

impl<'e, 'w> StackGuard<'e, 'w> {
    fn enter(encoder: &'e mut Encoder<'w>, id: ContainerId) -> Self {
        encoder.container_stack.insert(id);
        StackGuard { encoder, id }
    }
}

impl<'w> Deref for StackGuard<'_, 'w> {
    type Target = Encoder<'w>;

    fn deref(&self) -> &Self::Target {
        self.encoder
    }
}

impl DerefMut for StackGuard<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.encoder
    }
}

impl Drop for StackGuard<'_, '_> {
    fn drop(&mut self) {
        self.encoder.container_stack.remove(&self.id);
    }
}

fn mismatch(value: &Value) -> CborError {
    CborError::UnsupportedType(value.type_name().to_string())
}

// Built-in entries of the dispatch table. Each one only accepts the variants it
// is registered for; anything else means it was registered under a foreign key.

pub(crate) fn encode_text(enc: &mut Encoder<'_>, value: &Value) -> Result<()> {
    match value {
        Value::Text(s) => enc.encode_text(s),
        other => Err(mismatch(other)),
    }
}

pub(crate) fn encode_bytes(enc: &mut Encoder<'_>, value: &Value) -> Result<()> {
    match value {
        Value::Bytes(b) => enc.encode_bytes(b),
        other => Err(mismatch(other)),
    }
}

pub(crate) fn encode_integer(enc: &mut Encoder<'_>, value: &Value) -> Result<()> {
    match value {
        Value::Integer(i) => enc.encode_int(*i),
        other => Err(mismatch(other)),
    }
}

pub(crate) fn encode_bigint(enc: &mut Encoder<'_>, value: &Value) -> Result<()> {
    match value {
        Value::BigInt(b) => enc.encode_bigint(b),
        other => Err(mismatch(other)),
    }
}

pub(crate) fn encode_float(enc: &mut Encoder<'_>, value: &Value) -> Result<()> {
    match value {
        Value::Float(f) => enc.encode_float(*f),
        other => Err(mismatch(other)),
    }
}

pub(crate) fn encode_decimal(enc: &mut Encoder<'_>, value: &Value) -> Result<()> {
    match value {
        Value::Decimal(d) => enc.encode_decimal(d),
        other => Err(mismatch(other)),
    }
}

pub(crate) fn encode_bool(enc: &mut Encoder<'_>, value: &Value) -> Result<()> {
    match value {
        Value::Bool(b) => enc.encode_bool(*b),
        other => Err(mismatch(other)),
    }
}

pub(crate) fn encode_null(enc: &mut Encoder<'_>, value: &Value) -> Result<()> {
    match value {
        Value::Null => enc.encode_null(),
        other => Err(mismatch(other)),
    }
}

pub(crate) fn encode_undefined(enc: &mut Encoder<'_>, value: &Value) -> Result<()> {
    match value {
        Value::Undefined => enc.encode_undefined(),
        other => Err(mismatch(other)),
    }
}

/// Arrays and any custom value with a sequence view
pub(crate) fn encode_sequence(enc: &mut Encoder<'_>, value: &Value) -> Result<()> {
    match value {
        Value::Array(array) => {
            let items = array.borrow();
            enc.encode_container(array.id(), MAJOR_ARRAY, items.len(), |enc| {
                enc.encode_array_items(&items)
            })
        }
        Value::Custom(c) => match c.get().as_sequence() {
            Some(items) => enc.encode_container(c.id(), MAJOR_ARRAY, items.len(), |enc| {
                enc.encode_array_items(items)
            }),
            None => Err(mismatch(value)),
        },
        other => Err(mismatch(other)),
    }
}

/// Maps and any custom value with a mapping view
pub(crate) fn encode_mapping(enc: &mut Encoder<'_>, value: &Value) -> Result<()> {
    match value {
        Value::Map(map) => {
            let entries = map.borrow();
            enc.encode_container(map.id(), MAJOR_MAP, entries.len(), |enc| {
                enc.encode_map_entries(&entries)
            })
        }
        Value::Custom(c) => match c.get().as_mapping() {
            Some(entries) => enc.encode_container(c.id(), MAJOR_MAP, entries.len(), |enc| {
                enc.encode_map_entries(entries)
            }),
            None => Err(mismatch(value)),
        },
        other => Err(mismatch(other)),
    }
}

pub(crate) fn encode_datetime(enc: &mut Encoder<'_>, value: &Value) -> Result<()> {
    match value {
        Value::DateTime(dt) => enc.encode_datetime(dt),
        Value::NaiveDateTime(naive) => {
            let tz = enc.timezone().ok_or(CborError::NaiveDateTime)?;
            debug!(%naive, %tz, "applying default timezone to naive datetime");
            let dt = naive
                .and_local_timezone(tz)
                .single()
                .ok_or(CborError::NaiveDateTime)?;
            enc.encode_datetime(&dt)
        }
        other => Err(mismatch(other)),
    }
}

/// Dates are encoded as midnight UTC on that day
pub(crate) fn encode_date(enc: &mut Encoder<'_>, value: &Value) -> Result<()> {
    match value {
        Value::Date(date) => {
            let dt = date.and_time(NaiveTime::MIN).and_utc().fixed_offset();
            enc.encode_datetime(&dt)
        }
        other => Err(mismatch(other)),
    }
}

pub(crate) fn encode_rational(enc: &mut Encoder<'_>, value: &Value) -> Result<()> {
    match value {
        Value::Rational(r) => {
            let pair = Value::array([
                Value::Integer(r.numerator()),
                Value::Integer(r.denominator()),
            ]);
            enc.encode_semantic(TAG_RATIONAL, &pair, true)
        }
        other => Err(mismatch(other)),
    }
}

pub(crate) fn encode_regex(enc: &mut Encoder<'_>, value: &Value) -> Result<()> {
    match value {
        Value::Regex(re) => enc.encode_semantic(TAG_REGEX, &Value::from(re.as_str()), false),
        other => Err(mismatch(other)),
    }
}

pub(crate) fn encode_mime(enc: &mut Encoder<'_>, value: &Value) -> Result<()> {
    match value {
        Value::Mime(msg) => enc.encode_semantic(TAG_MIME, &Value::Text(msg.as_string()), false),
        other => Err(mismatch(other)),
    }
}

pub(crate) fn encode_uuid(enc: &mut Encoder<'_>, value: &Value) -> Result<()> {
    match value {
        Value::Uuid(uuid) => enc.encode_semantic(TAG_UUID, &Value::bytes(uuid.as_bytes()), false),
        other => Err(mismatch(other)),
    }
}

pub(crate) fn encode_custom_tag(enc: &mut Encoder<'_>, value: &Value) -> Result<()> {
    match value {
        Value::Tag(tagged) => enc.encode_semantic(tagged.tag, &tagged.value, false),
        other => Err(mismatch(other)),
    }
}
