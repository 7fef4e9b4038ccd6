use serde_json::Value as Json;

use crate::error::TransportError;
use crate::schema::schema_for;
use crate::value::Value;

/// A decoded, schema-validated message: a tag plus its positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub tag: String,
    pub args: Vec<Value>,
}

impl Message {
    pub fn new(tag: impl Into<String>, args: Vec<Value>) -> Result<Message, TransportError> {
        let tag = tag.into();
        validate(&tag, &args)?;
        Ok(Message { tag, args })
    }

    /// Construct a zero-argument message (`SLEEP`, `DIE`, `BYE`, `CONT`,
    /// `DONE`, `SENT`) without callers needing an empty `Vec` at every call
    /// site.
    pub fn bare(tag: impl Into<String>) -> Result<Message, TransportError> {
        Message::new(tag, Vec::new())
    }

    pub(crate) fn to_json_body(&self) -> Json {
        serde_json::json!({
            "tag": self.tag,
            "args": self.args.iter().map(Value::to_json).collect::<Vec<_>>(),
        })
    }

    pub(crate) fn from_json_body(body: Json) -> Result<Message, TransportError> {
        let tag = body
            .get("tag")
            .and_then(Json::as_str)
            .ok_or_else(|| TransportError::Protocol("frame missing string tag".into()))?
            .to_string();
        let schema = schema_for(&tag).ok_or_else(|| TransportError::UnknownTag(tag.clone()))?;
        let raw_args = body
            .get("args")
            .and_then(Json::as_array)
            .ok_or_else(|| TransportError::Protocol("frame missing args array".into()))?;

        if raw_args.len() != schema.len() {
            return Err(TransportError::SchemaViolation {
                tag,
                expected: schema.len(),
                expected_kind: schema.to_vec(),
                got: raw_args.len(),
            });
        }

        let mut args = Vec::with_capacity(raw_args.len());
        for (index, (raw, kind)) in raw_args.iter().zip(schema.iter()).enumerate() {
            let value = Value::from_json(raw, kind).ok_or_else(|| TransportError::FieldKindMismatch {
                tag: tag.clone(),
                index,
                expected: kind.clone(),
            })?;
            args.push(value);
        }

        Ok(Message { tag, args })
    }
}

fn validate(tag: &str, args: &[Value]) -> Result<(), TransportError> {
    let schema = schema_for(tag).ok_or_else(|| TransportError::UnknownTag(tag.to_string()))?;
    if args.len() != schema.len() {
        return Err(TransportError::SchemaViolation {
            tag: tag.to_string(),
            expected: schema.len(),
            expected_kind: schema.to_vec(),
            got: args.len(),
        });
    }
    for (index, (arg, kind)) in args.iter().zip(schema.iter()).enumerate() {
        if &arg.kind() != kind && !matches!((kind, arg), (crate::value::FieldKind::List(_), Value::List(_))) {
            return Err(TransportError::FieldKindMismatch {
                tag: tag.to_string(),
                index,
                expected: kind.clone(),
            });
        }
    }
    Ok(())
}

/// Encode a `serde::Serialize` payload (a [`hangar_types::BuilderStats`] or a
/// `Vec<hangar_types::FileInfo>`) as the JSON-string `Str` arguments the
/// schema registry uses for structured sub-payloads, since [`crate::FieldKind`]
/// has no dedicated "nested object" variant.
pub fn encode_payload<T: serde::Serialize>(value: &T) -> Value {
    Value::Str(serde_json::to_string(value).expect("payload always serializes"))
}

pub fn decode_payload<T: serde::de::DeserializeOwned>(value: &Value) -> Result<T, TransportError> {
    match value {
        Value::Str(s) => serde_json::from_str(s).map_err(TransportError::Json),
        _ => Err(TransportError::Protocol("expected a string-encoded payload".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hangar_types::BuilderStats;

    #[test]
    fn bare_message_round_trips_through_json_body() {
        let msg = Message::bare("DIE").unwrap();
        let body = msg.to_json_body();
        let back = Message::from_json_body(body).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let err = Message::new("DIE", vec![Value::Int(1)]).unwrap_err();
        assert!(matches!(err, TransportError::SchemaViolation { .. }));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = Message::bare("NOT_A_TAG").unwrap_err();
        assert!(matches!(err, TransportError::UnknownTag(_)));
    }

    #[test]
    fn stats_payload_round_trips_through_str_encoding() {
        let stats = BuilderStats {
            disk_free_bytes: 1,
            mem_free_bytes: 2,
            load_average: 0.1,
            temperature_celsius: None,
        };
        let encoded = encode_payload(&stats);
        let msg = Message::new("IDLE", vec![encoded]).unwrap();
        let decoded: BuilderStats = decode_payload(&msg.args[0]).unwrap();
        assert_eq!(decoded, stats);
    }
}
