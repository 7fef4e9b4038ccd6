use crate::value::FieldKind;

/// The registered argument schema for one message tag.
pub type Schema = &'static [FieldKind];

macro_rules! schema {
    ($($kind:expr),* $(,)?) => {
        &[$($kind),*] as Schema
    };
}

/// Look up the registered schema for a message tag. `None` means the tag is
/// not part of the builder wire protocol catalogue.
pub fn schema_for(tag: &str) -> Option<Schema> {
    use FieldKind::*;
    Some(match tag {
        "HELLO" => schema![Str, Str, Str, Str, Str, Str, Str, Int, Duration],
        "ACK" => schema![Int, Str],
        "IDLE" => schema![Str],
        "SLEEP" => schema![],
        "DIE" => schema![],
        "BYE" => schema![],
        "BUILD" => schema![Str, Str],
        "BUSY" => schema![Str],
        "CONT" => schema![],
        "DONE" => schema![],
        "BUILT" => schema![Bool, Duration, Str, Str],
        "SEND" => schema![Str],
        "SENT" => schema![],
        "FETCH" => schema![Int, Int],
        // Carries the offset back alongside the bytes so JUGGLER can place
        // out-of-order arrivals correctly instead of assuming FIFO delivery.
        "CHUNK" => schema![Int, Bytes],
        // The file socket's own handshake, distinct from the builder
        // socket's HELLO: just the slave-id DRIVER already allocated.
        "FILE_HELLO" => schema![Int],

        // Internal-only tags: never cross the builder-facing socket, used on
        // in-process (or same-host) PUSH/PULL channels between master tasks.
        "QUEUE" => schema![Str],
        "PAUSE" => schema![],
        "RESUME" => schema![],
        "KILL" => schema![Str],
        "QUIT" => schema![],
        "FILE_VERIFIED" => schema![Int, Str],
        "FILE_REJECTED" => schema![Int, Str],
        "RENDER" => schema![Str, Str],
        "EXPECT_FILE" => schema![Int, Str, Str, Int],
        // BIG_BRO's in-process query of DRIVER's live session count.
        "STATS" => schema![],
        "STATS_REPLY" => schema![Int],
        // BIG_BRO's composite snapshot, pushed to SUPERVISOR's status channel.
        "STATUS" => schema![Str],
        // SUPERVISOR's control/status sockets: a monitor's subscribe handshake
        // (distinct from the builder socket's HELLO) and its own admin reply.
        "SUB_HELLO" => schema![],

        // CHASE's local admin protocol.
        "IMPORT" => schema![Str, Str, Str, Bool, Str, List(Box::new(Str))],
        "REMOVE" => schema![Str, Str, Bool],
        "REBUILD" => schema![Str, Str],
        "ERROR" => schema![Str],
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_schema_has_nine_fields() {
        assert_eq!(schema_for("HELLO").unwrap().len(), 9);
    }

    #[test]
    fn unknown_tag_has_no_schema() {
        assert!(schema_for("NONSENSE").is_none());
    }

    #[test]
    fn zero_arity_tags_have_empty_schemas() {
        for tag in ["SLEEP", "DIE", "BYE", "CONT", "DONE", "SENT"] {
            assert_eq!(schema_for(tag).unwrap().len(), 0);
        }
    }
}
