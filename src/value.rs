use std::any::{Any, TypeId};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

use crate::registry::TypeKey;
use crate::tags::Tagged;
use crate::types::{BigInt, Decimal, MimeMessage, Rational};

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a container, assigned once when the container is created
///
/// Two structurally equal containers have different ids; clones of the same
/// handle share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(u64);

impl ContainerId {
    fn next() -> Self {
        ContainerId(NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Reference-counted, mutable container handle with a stable identity
///
/// Cloning the handle aliases the container, which is how shared and cyclic
/// structures are built.
pub struct Shared<T> {
    id: ContainerId,
    inner: Rc<RefCell<T>>,
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Shared {
            id: ContainerId::next(),
            inner: Rc::new(RefCell::new(value)),
        }
    }

    pub fn id(&self) -> ContainerId {
        self.id
    }

    pub fn borrow(&self) -> Ref<'_, T> {
        self.inner.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.inner.borrow_mut()
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Shared {
            id: self.id,
            inner: Rc::clone(&self.inner),
        }
    }
}

// Contents are not printed: a cyclic container would recurse forever.
impl<T> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Shared").field(&self.id.0).finish()
    }
}

pub type Array = Shared<Vec<Value>>;
pub type Map = Shared<Vec<(Value, Value)>>;

/// A caller-defined type that can be placed in a [`Value`] graph
///
/// Types with no registered encoder can still be encoded when they expose an
/// array-like or mapping-like view.
pub trait CustomValue: fmt::Debug + 'static {
    fn as_any(&self) -> &dyn Any;

    /// Array-like view of the value
    fn as_sequence(&self) -> Option<&[Value]> {
        None
    }

    /// Mapping-like view of the value, in iteration order
    fn as_mapping(&self) -> Option<&[(Value, Value)]> {
        None
    }
}

/// Handle to a [`CustomValue`], carrying its concrete type and identity
#[derive(Clone)]
pub struct CustomRef {
    id: ContainerId,
    type_id: TypeId,
    type_name: &'static str,
    inner: Rc<dyn CustomValue>,
}

impl CustomRef {
    pub fn new<T: CustomValue>(value: T) -> Self {
        CustomRef {
            id: ContainerId::next(),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            inner: Rc::new(value),
        }
    }

    pub fn id(&self) -> ContainerId {
        self.id
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn get(&self) -> &dyn CustomValue {
        &*self.inner
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref::<T>()
    }
}

impl fmt::Debug for CustomRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CustomRef")
            .field("id", &self.id.0)
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Built-in value kinds, the exact-match keys of the dispatch table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    Undefined,
    Bool,
    Integer,
    BigInt,
    Float,
    Bytes,
    Text,
    Array,
    Map,
    DateTime,
    NaiveDateTime,
    Date,
    Decimal,
    Rational,
    Regex,
    Mime,
    Uuid,
    Tag,
}

impl Kind {
    pub fn name(self) -> &'static str {
        match self {
            Kind::Null => "null",
            Kind::Undefined => "undefined",
            Kind::Bool => "bool",
            Kind::Integer => "integer",
            Kind::BigInt => "bigint",
            Kind::Float => "float",
            Kind::Bytes => "bytes",
            Kind::Text => "text",
            Kind::Array => "array",
            Kind::Map => "map",
            Kind::DateTime => "datetime",
            Kind::NaiveDateTime => "naive datetime",
            Kind::Date => "date",
            Kind::Decimal => "decimal",
            Kind::Rational => "rational",
            Kind::Regex => "regex",
            Kind::Mime => "mime message",
            Kind::Uuid => "uuid",
            Kind::Tag => "tag",
        }
    }
}

/// Dynamic value graph to be encoded
///
/// # Example
/// ```
/// use cbor_encoder::{Value, encode_to_vec, EncoderOptions};
///
/// let list = Value::array([Value::from(1), Value::from("two")]);
/// let bytes = encode_to_vec(&list, &EncoderOptions::default()).unwrap();
/// assert_eq!(bytes, [0x82, 0x01, 0x63, b't', b'w', b'o']);
/// ```
#[derive(Debug, Clone)]
pub enum Value {
    /// Null value
    Null,
    /// The "undefined" simple value
    Undefined,
    Bool(bool),
    Integer(i128),
    /// Integer of any size
    BigInt(BigInt),
    Float(f64),
    /// Byte string
    Bytes(Vec<u8>),
    /// Text string
    Text(String),
    Array(Array),
    Map(Map),
    /// Datetime with a UTC offset
    DateTime(DateTime<FixedOffset>),
    /// Datetime with no zone; needs a default timezone to be encoded
    NaiveDateTime(NaiveDateTime),
    Date(NaiveDate),
    Decimal(Decimal),
    Rational(Rational),
    Regex(regex::Regex),
    Mime(MimeMessage),
    Uuid(uuid::Uuid),
    /// Caller-defined semantic tag
    Tag(Tagged),
    Custom(CustomRef),
}

impl Value {
    /// New array container
    pub fn array<I: IntoIterator<Item = Value>>(items: I) -> Value {
        Value::Array(Shared::new(items.into_iter().collect()))
    }

    /// New map container, entries kept in the given order
    pub fn map<I: IntoIterator<Item = (Value, Value)>>(entries: I) -> Value {
        Value::Map(Shared::new(entries.into_iter().collect()))
    }

    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Value {
        Value::Bytes(bytes.into())
    }

    pub fn custom<T: CustomValue>(value: T) -> Value {
        Value::Custom(CustomRef::new(value))
    }

    pub fn kind(&self) -> Option<Kind> {
        Some(match self {
            Value::Null => Kind::Null,
            Value::Undefined => Kind::Undefined,
            Value::Bool(_) => Kind::Bool,
            Value::Integer(_) => Kind::Integer,
            Value::BigInt(_) => Kind::BigInt,
            Value::Float(_) => Kind::Float,
            Value::Bytes(_) => Kind::Bytes,
            Value::Text(_) => Kind::Text,
            Value::Array(_) => Kind::Array,
            Value::Map(_) => Kind::Map,
            Value::DateTime(_) => Kind::DateTime,
            Value::NaiveDateTime(_) => Kind::NaiveDateTime,
            Value::Date(_) => Kind::Date,
            Value::Decimal(_) => Kind::Decimal,
            Value::Rational(_) => Kind::Rational,
            Value::Regex(_) => Kind::Regex,
            Value::Mime(_) => Kind::Mime,
            Value::Uuid(_) => Kind::Uuid,
            Value::Tag(_) => Kind::Tag,
            Value::Custom(_) => return None,
        })
    }

    /// Exact-match dispatch key of this value
    pub fn type_key(&self) -> TypeKey {
        match self {
            Value::Custom(c) => TypeKey::Type(c.type_id()),
            other => match other.kind() {
                Some(kind) => TypeKey::Kind(kind),
                None => unreachable!("only custom values lack a kind"),
            },
        }
    }

    pub fn type_name(&self) -> &'static str {
        match (self, self.kind()) {
            (Value::Custom(c), _) => c.type_name(),
            (_, Some(kind)) => kind.name(),
            (_, None) => "unknown",
        }
    }

    /// Returns the value as an array handle, if it is one
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the value as a map handle, if it is one
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Identity of the container behind this value, if it has one
    pub fn container_id(&self) -> Option<ContainerId> {
        match self {
            Value::Array(a) => Some(a.id()),
            Value::Map(m) => Some(m.id()),
            Value::Custom(c) => Some(c.id()),
            _ => None,
        }
    }
}

macro_rules! impl_value_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::Integer(v as i128)
                }
            }
        )*
    };
}

impl_value_from_int!(u8, u16, u32, u64, usize, i8, i16, i32, i64, i128, isize);

impl From<u128> for Value {
    fn from(v: u128) -> Self {
        match i128::try_from(v) {
            Ok(v) => Value::Integer(v),
            Err(_) => Value::BigInt(BigInt::from(v)),
        }
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_value_from!(
    bool => Bool,
    f32 => Float,
    f64 => Float,
    String => Text,
    &str => Text,
    BigInt => BigInt,
    DateTime<FixedOffset> => DateTime,
    DateTime<chrono::Utc> => DateTime,
    NaiveDateTime => NaiveDateTime,
    NaiveDate => Date,
    Decimal => Decimal,
    rust_decimal::Decimal => Decimal,
    Rational => Rational,
    regex::Regex => Regex,
    MimeMessage => Mime,
    uuid::Uuid => Uuid,
    Tagged => Tag,
);

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
