use hangar_duration::{WireDuration, WireTimestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// The type specifier a schema uses to describe one positional argument.
/// Carries the type distinction the JSON representation alone cannot: a
/// `Timestamp` and a bare `Int` both encode as JSON numbers, so the schema
/// (not the wire bytes) is what tells them apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Bool,
    Int,
    Str,
    Bytes,
    Timestamp,
    Duration,
    List(Box<FieldKind>),
}

/// A typed argument value, validated against a [`FieldKind`] at encode and
/// decode time.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
    Bytes(Vec<u8>),
    Timestamp(WireTimestamp),
    Duration(WireDuration),
    List(Vec<Value>),
}

impl Value {
    pub fn kind(&self) -> FieldKind {
        match self {
            Value::Bool(_) => FieldKind::Bool,
            Value::Int(_) => FieldKind::Int,
            Value::Str(_) => FieldKind::Str,
            Value::Bytes(_) => FieldKind::Bytes,
            Value::Timestamp(_) => FieldKind::Timestamp,
            Value::Duration(_) => FieldKind::Duration,
            Value::List(items) => FieldKind::List(Box::new(
                items.first().map(Value::kind).unwrap_or(FieldKind::Int),
            )),
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::Number((*i).into()),
            Value::Str(s) => Json::String(s.clone()),
            Value::Bytes(b) => Json::String(base64_encode(b)),
            Value::Timestamp(ts) => Json::Number(ts.epoch_nanos().into()),
            Value::Duration(d) => serde_json::to_value(d).expect("WireDuration always serializes"),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
        }
    }

    /// Decode and validate `json` against the expected `kind` in one step.
    pub fn from_json(json: &Json, kind: &FieldKind) -> Option<Value> {
        match kind {
            FieldKind::Bool => json.as_bool().map(Value::Bool),
            FieldKind::Int => json.as_i64().map(Value::Int),
            FieldKind::Str => json.as_str().map(|s| Value::Str(s.to_string())),
            FieldKind::Bytes => json.as_str().and_then(base64_decode).map(Value::Bytes),
            FieldKind::Timestamp => json
                .as_i64()
                .map(|n| Value::Timestamp(WireTimestamp::from_epoch_nanos(n))),
            FieldKind::Duration => {
                serde_json::from_value::<WireDuration>(json.clone())
                    .ok()
                    .map(Value::Duration)
            }
            FieldKind::List(inner) => json.as_array().and_then(|arr| {
                arr.iter()
                    .map(|item| Value::from_json(item, inner))
                    .collect::<Option<Vec<_>>>()
                    .map(Value::List)
            }),
        }
    }
}

/// Minimal base64 codec (standard alphabet, padded) so this crate does not
/// need to pull in a dedicated base64 dependency for the one place `Bytes`
/// values cross a JSON boundary.
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn base64_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() + 2) / 3 * 4);
    for chunk in data.chunks(3) {
        let b0 = chunk[0];
        let b1 = *chunk.get(1).unwrap_or(&0);
        let b2 = *chunk.get(2).unwrap_or(&0);
        out.push(ALPHABET[(b0 >> 2) as usize] as char);
        out.push(ALPHABET[(((b0 & 0x03) << 4) | (b1 >> 4)) as usize] as char);
        out.push(if chunk.len() > 1 {
            ALPHABET[(((b1 & 0x0f) << 2) | (b2 >> 6)) as usize] as char
        } else {
            '='
        });
        out.push(if chunk.len() > 2 {
            ALPHABET[(b2 & 0x3f) as usize] as char
        } else {
            '='
        });
    }
    out
}

fn base64_decode(s: &str) -> Option<Vec<u8>> {
    fn val(c: u8) -> Option<u8> {
        ALPHABET.iter().position(|&a| a == c).map(|p| p as u8)
    }
    let bytes: Vec<u8> = s.bytes().filter(|&b| b != b'=').collect();
    let mut out = Vec::with_capacity(bytes.len() * 3 / 4);
    for chunk in bytes.chunks(4) {
        let vals: Vec<u8> = chunk.iter().map(|&b| val(b)).collect::<Option<Vec<_>>>()?;
        out.push((vals[0] << 2) | (vals.get(1).copied().unwrap_or(0) >> 4));
        if vals.len() > 2 {
            out.push((vals[1] << 4) | (vals[2] >> 2));
        }
        if vals.len() > 3 {
            out.push((vals[2] << 6) | vals[3]);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_round_trip_through_base64() {
        let data = b"the quick brown fox jumps over the lazy dog, 0123456789";
        let encoded = base64_encode(data);
        let decoded = base64_decode(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn timestamp_and_int_are_distinguished_only_by_kind() {
        let json = serde_json::json!(42);
        assert_eq!(
            Value::from_json(&json, &FieldKind::Int),
            Some(Value::Int(42))
        );
        assert_eq!(
            Value::from_json(&json, &FieldKind::Timestamp),
            Some(Value::Timestamp(WireTimestamp::from_epoch_nanos(42)))
        );
    }

    #[test]
    fn list_round_trips_through_json() {
        let v = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let json = v.to_json();
        let back = Value::from_json(&json, &FieldKind::List(Box::new(FieldKind::Int))).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn wrong_kind_fails_to_decode() {
        let json = serde_json::json!("not a bool");
        assert_eq!(Value::from_json(&json, &FieldKind::Bool), None);
    }
}
