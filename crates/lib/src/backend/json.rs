//! JSON format backend.
//!
//! The default document format: one JSON object per file, pretty-printed.
//! Saves go through a sibling temp file and a rename so readers never see a
//! half-written document.
//!
//! Scalar pinning for this backend: booleans, integers, floats, text, maps,
//! and lists round-trip natively. Byte strings are stored as base64 text
//! and timestamps as RFC 3339 text; both reload as [`Value::Text`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64ct::{Base64, Encoding};

use super::{Backend, BackendError};
use crate::value::Value;

/// Backend storing documents as pretty-printed JSON.
#[derive(Debug, Default)]
pub struct JsonBackend;

impl Backend for JsonBackend {
    fn name(&self) -> &'static str {
        "json"
    }

    fn load(&self, path: &Path) -> Result<Value, BackendError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Value::Null),
            Err(err) => {
                return Err(BackendError::Load {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        let json: serde_json::Value =
            serde_json::from_str(&text).map_err(|err| BackendError::Parse {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;

        Ok(from_json(json))
    }

    fn save(&self, path: &Path, value: &Value) -> Result<(), BackendError> {
        let text =
            serde_json::to_string_pretty(&to_json(value)).map_err(|err| BackendError::Serialize {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;

        let save_err = |source| BackendError::Save {
            path: path.to_path_buf(),
            source,
        };

        let temp = temp_path(path);
        fs::write(&temp, text).map_err(save_err)?;
        fs::rename(&temp, path).map_err(save_err)?;
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Converts a parsed JSON document into a tree value.
pub fn from_json(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::Text(s),
        serde_json::Value::Array(items) => Value::List(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(map) => Value::Map(
            map.into_iter()
                .map(|(key, value)| (key, from_json(value)))
                .collect::<BTreeMap<_, _>>(),
        ),
    }
}

/// Converts a tree value into its JSON representation.
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(n) => serde_json::Value::from(*n),
        // Non-finite floats have no JSON form and degrade to null.
        Value::Float(x) => serde_json::Number::from_f64(*x)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Bytes(b) => serde_json::Value::String(Base64::encode_string(b)),
        Value::Timestamp(t) => serde_json::Value::String(t.to_rfc3339()),
        Value::Map(map) => serde_json::Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), to_json(value)))
                .collect(),
        ),
        Value::List(list) => serde_json::Value::Array(list.iter().map(to_json).collect()),
    }
}
