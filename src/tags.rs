use crate::value::Value;

/// A tagged CBOR value for tags the encoder has no built-in type for
///
/// The payload is encoded unmodified after the tag header.
#[derive(Debug, Clone)]
pub struct Tagged {
    /// The CBOR tag number
    pub tag: u64,
    /// The tagged value
    pub value: Box<Value>,
}

impl Tagged {
    /// Create a new tagged value
    pub fn new(tag: u64, value: impl Into<Value>) -> Self {
        Tagged {
            tag,
            value: Box::new(value.into()),
        }
    }

    pub fn into_inner(self) -> Value {
        *self.value
    }
}
