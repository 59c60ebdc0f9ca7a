//! Foreign value representation

use super::Invokable;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::sync::Arc;

/// A value crossing the foreign boundary
#[derive(Clone)]
pub enum Value {
    /// Absence of a value; what a void completion delivers
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// String
    Str(String),
    /// Byte buffer
    Bytes(Vec<u8>),
    /// Ordered list
    List(Vec<Value>),
    /// String-keyed map with stable key order
    Map(BTreeMap<String, Value>),
    /// Marshalled host error
    Error {
        /// Error kind, e.g. `NotFound`
        kind: String,
        /// Host error message
        message: String,
    },
    /// Opaque bridge object handed to the foreign side
    Object(ForeignObject),
    /// Foreign callable
    Callable(Arc<dyn Invokable>),
}

impl Value {
    /// Foreign type name, used in diagnostics
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Error { .. } => "error",
            Self::Object(_) => "object",
            Self::Callable(_) => "function",
        }
    }

    /// Marshal a host I/O error
    #[must_use]
    pub fn from_io_error(error: &io::Error) -> Self {
        Self::Error {
            kind: format!("{:?}", error.kind()),
            message: error.to_string(),
        }
    }

    /// Whether this is a marshalled error
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Borrow as a string, if it is one
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as a map, if it is one
    #[must_use]
    pub const fn as_map(&self) -> Option<&BTreeMap<String, Self>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (
                Self::Error { kind: ka, message: ma },
                Self::Error { kind: kb, message: mb },
            ) => ka == kb && ma == mb,
            (Self::Object(a), Self::Object(b)) => a.same(b),
            (Self::Callable(a), Self::Callable(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Self::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Self::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Self::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Self::Error { kind, message } => f
                .debug_struct("Error")
                .field("kind", kind)
                .field("message", message)
                .finish(),
            Self::Object(object) => write!(f, "Object({})", object.type_name()),
            Self::Callable(callable) => write!(f, "Callable({})", callable.name()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
            Self::Error { kind, message } => write!(f, "error({kind}): {message}"),
            Self::Object(object) => write!(f, "<{}>", object.type_name()),
            Self::Callable(callable) => write!(f, "<function {}>", callable.name()),
        }
    }
}

/// Bridge object exposed to the foreign side as an opaque handle
#[derive(Clone)]
pub struct ForeignObject {
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl ForeignObject {
    /// Wrap `object`
    pub fn new<T: Any + Send + Sync>(type_name: &'static str, object: T) -> Self {
        Self {
            type_name,
            inner: Arc::new(object),
        }
    }

    /// Type name shown to the foreign side
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Borrow the wrapped object as `T`
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_marshalling() {
        let err = io::Error::new(io::ErrorKind::NotFound, "no such file: /x");
        let value = Value::from_io_error(&err);
        assert_eq!(
            value,
            Value::Error {
                kind: "NotFound".to_string(),
                message: "no such file: /x".to_string(),
            }
        );
        assert!(value.is_error());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Str("a".into())]).to_string(),
            "[1, a]"
        );
        let mut map = BTreeMap::new();
        map.insert("size".to_string(), Value::Int(5));
        assert_eq!(Value::Map(map).to_string(), "{size: 5}");
    }

    #[test]
    fn test_object_downcast() {
        let object = ForeignObject::new("Counter", 7u32);
        assert_eq!(object.downcast_ref::<u32>(), Some(&7));
        assert!(object.downcast_ref::<String>().is_none());
        let value = Value::Object(object.clone());
        assert_eq!(value, Value::Object(object));
        assert_eq!(value.type_name(), "object");
    }
}
