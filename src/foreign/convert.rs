//! Conversions between host types and foreign values

use super::Value;
use crate::error::{BridgeError, Result};
use compio_host_io::{FileProps, FileSystemProps};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Host type that can be marshalled to the foreign side
pub trait IntoForeign {
    /// Convert into a foreign value
    fn into_foreign(self) -> Value;
}

/// Foreign value that can be unmarshalled into a host type
pub trait FromForeign: Sized {
    /// Convert from a foreign value
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `value` has the wrong shape.
    fn from_foreign(value: Value) -> Result<Self>;
}

impl IntoForeign for Value {
    fn into_foreign(self) -> Value {
        self
    }
}

impl IntoForeign for () {
    fn into_foreign(self) -> Value {
        Value::Null
    }
}

impl IntoForeign for bool {
    fn into_foreign(self) -> Value {
        Value::Bool(self)
    }
}

impl IntoForeign for String {
    fn into_foreign(self) -> Value {
        Value::Str(self)
    }
}

impl IntoForeign for Vec<u8> {
    fn into_foreign(self) -> Value {
        Value::Bytes(self)
    }
}

impl IntoForeign for Vec<String> {
    fn into_foreign(self) -> Value {
        Value::List(self.into_iter().map(Value::Str).collect())
    }
}

impl IntoForeign for std::io::Error {
    fn into_foreign(self) -> Value {
        Value::from_io_error(&self)
    }
}

impl IntoForeign for FileProps {
    fn into_foreign(self) -> Value {
        let mut map = BTreeMap::new();
        if let Some(created) = self.creation_time {
            map.insert("creation_time".to_string(), millis(created));
        }
        map.insert("last_access_time".to_string(), millis(self.last_access_time));
        map.insert("last_modified_time".to_string(), millis(self.last_modified_time));
        map.insert("is_directory".to_string(), Value::Bool(self.is_directory));
        map.insert("is_other".to_string(), Value::Bool(self.is_other));
        map.insert("is_regular_file".to_string(), Value::Bool(self.is_regular_file));
        map.insert("is_symbolic_link".to_string(), Value::Bool(self.is_symbolic_link));
        map.insert("size".to_string(), size(self.size));
        Value::Map(map)
    }
}

impl IntoForeign for FileSystemProps {
    fn into_foreign(self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("total_space".to_string(), size(self.total_space));
        map.insert("unallocated_space".to_string(), size(self.unallocated_space));
        map.insert("usable_space".to_string(), size(self.usable_space));
        Value::Map(map)
    }
}

/// Milliseconds since the epoch
fn millis(time: SystemTime) -> Value {
    let ms = time
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX));
    Value::Int(ms)
}

fn size(bytes: u64) -> Value {
    Value::Int(i64::try_from(bytes).unwrap_or(i64::MAX))
}

impl FromForeign for Vec<u8> {
    fn from_foreign(value: Value) -> Result<Self> {
        match value {
            Value::Bytes(bytes) => Ok(bytes),
            Value::Str(s) => Ok(s.into_bytes()),
            other => Err(BridgeError::invalid_argument(format!(
                "expected bytes or string, found {}",
                other.type_name()
            ))),
        }
    }
}

impl FromForeign for String {
    fn from_foreign(value: Value) -> Result<Self> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(BridgeError::invalid_argument(format!(
                "expected string, found {}",
                other.type_name()
            ))),
        }
    }
}
