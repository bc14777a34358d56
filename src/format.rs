//! Helpers for the versioned sealed-token format.
//!
//! A token is the engine's raw seal followed by `~<version>`. Tokens minted before the suffix
//! existed carry no delimiter and are read as version 1, whose payload wrapped the session data
//! in a `persistent` envelope. Every save writes [`CURRENT_VERSION`].

use serde_json::{Map, Value};

pub const CURRENT_VERSION: u32 = 2;
pub const VERSION_DELIMITER: char = '~';

const LEGACY_ENVELOPE_KEY: &str = "persistent";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedToken<'a> {
    pub raw: &'a str,
    /// `None` for legacy tokens, and for suffixes that are not a number.
    pub version: Option<u32>,
}

/// Append the version suffix to a raw seal.
pub fn encode_token(raw: &str, version: u32) -> String {
    format!("{raw}{VERSION_DELIMITER}{version}")
}

/// Split a token into the raw seal and its version. The delimiter is only recognized at the
/// penultimate position.
pub fn decode_token(token: &str) -> DecodedToken<'_> {
    let bytes = token.as_bytes();
    if bytes.len() >= 2 && bytes[bytes.len() - 2] == VERSION_DELIMITER as u8 {
        let (raw, suffix) = token.split_at(bytes.len() - 2);
        return DecodedToken {
            raw,
            version: suffix[1..].parse().ok(),
        };
    }

    DecodedToken {
        raw: token,
        version: None,
    }
}

/// Turn an unsealed payload into session data according to the token version.
///
/// Version 2 payloads are the data itself. Anything else is treated as the legacy envelope and
/// only its `persistent` object survives.
pub fn interpret_payload(payload: Value, version: Option<u32>) -> Map<String, Value> {
    let data = match version {
        Some(CURRENT_VERSION) => payload,
        _ => match payload {
            Value::Object(mut envelope) => envelope
                .remove(LEGACY_ENVELOPE_KEY)
                .unwrap_or(Value::Null),
            _ => Value::Null,
        },
    };

    match data {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
