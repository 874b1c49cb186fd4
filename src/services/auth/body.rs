/*
 * Responsibility
 * - Interpret the body of a 200 answer from the validation resource
 * - Tolerate any JSON object shape: unknown fields are ignored, known fields are optional
 * - Coerce loosely typed known fields (numeric ids, numeric strings); drop the unusable ones
 * - Report "not structured data" as a value, not as an error
 */
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::time::Duration;

/// Wire shape of a validation answer. Every field is optional.
///
/// Known producers:
/// - user-info style resources: `{ "id": "...", "displayName": "...", "url": "..." }`
/// - token-info style resources: `{ "token": "...", "expires_in": 3600, "expiration": 1700000000000 }`
///
/// A known field of an unexpected type is coerced when that is unambiguous
/// (`"id": 123`, `"expires_in": "3600"`) and treated as absent otherwise.
#[derive(Debug, Default, Deserialize)]
struct RawDescriptor {
    #[serde(default, deserialize_with = "loose_string")]
    id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    sub: Option<String>,
    #[serde(default, rename = "displayName", deserialize_with = "loose_string")]
    display_name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    url: Option<String>,
    #[serde(default, deserialize_with = "loose_integer")]
    expires_in: Option<i64>,
    // absolute, epoch milliseconds
    #[serde(default, deserialize_with = "loose_integer")]
    expiration: Option<i64>,
}

fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn loose_integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => number_to_i64(&n),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(float_to_i64))
        }
        _ => None,
    })
}

fn number_to_i64(n: &serde_json::Number) -> Option<i64> {
    n.as_i64()
        .or_else(|| n.as_u64().map(|_| i64::MAX))
        .or_else(|| n.as_f64().and_then(float_to_i64))
}

// Truncates toward zero; `as` saturates at the i64 bounds.
fn float_to_i64(f: f64) -> Option<i64> {
    f.is_finite().then_some(f as i64)
}

/// Who the validation resource says the token belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteIdentity {
    pub subject: String,
    pub display_name: Option<String>,
    pub url: Option<String>,
}

/// How long the validation resource says the token stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryHint {
    /// Relative lifetime in seconds, from the moment the answer arrived.
    ExpiresIn(i64),
    /// Absolute instant.
    At(DateTime<Utc>),
}

impl ExpiryHint {
    /// Absolute expiration with `margin` taken off for clock and network lag.
    ///
    /// Lifetimes beyond what `DateTime` can hold saturate at its bounds.
    pub fn resolve(&self, now: DateTime<Utc>, margin: Duration) -> DateTime<Utc> {
        let margin = TimeDelta::from_std(margin).unwrap_or(TimeDelta::zero());
        let raw = match *self {
            ExpiryHint::ExpiresIn(secs) => TimeDelta::try_seconds(secs)
                .and_then(|lifetime| now.checked_add_signed(lifetime))
                .unwrap_or(if secs >= 0 {
                    DateTime::<Utc>::MAX_UTC
                } else {
                    DateTime::<Utc>::MIN_UTC
                }),
            ExpiryHint::At(at) => at,
        };
        raw.checked_sub_signed(margin).unwrap_or(raw)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenDescriptor {
    pub identity: Option<RemoteIdentity>,
    pub expiry: Option<ExpiryHint>,
}

impl TokenDescriptor {
    pub fn subject(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.subject.as_str())
    }

    /// No recognized field was present.
    pub fn is_blank(&self) -> bool {
        self.identity.is_none() && self.expiry.is_none()
    }
}

impl From<RawDescriptor> for TokenDescriptor {
    fn from(raw: RawDescriptor) -> Self {
        let identity = raw
            .id
            .or(raw.sub)
            .filter(|s| !s.trim().is_empty())
            .map(|subject| RemoteIdentity {
                subject,
                display_name: raw.display_name,
                url: raw.url,
            });

        // An absolute expiration is more precise than a relative one; prefer it.
        let expiry = raw
            .expiration
            .and_then(DateTime::from_timestamp_millis)
            .map(ExpiryHint::At)
            .or(raw.expires_in.map(ExpiryHint::ExpiresIn));

        Self { identity, expiry }
    }
}

/// Result of reading a 200 body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationBody {
    /// Nothing but whitespace.
    Empty,
    /// A JSON object; possibly without any recognized field.
    Descriptor(TokenDescriptor),
    /// Not JSON, or JSON that is not an object.
    Unparseable(String),
}

impl ValidationBody {
    pub fn parse(body: &[u8]) -> Self {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Self::Empty;
        }

        let value: serde_json::Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) => return Self::Unparseable(e.to_string()),
        };

        if !value.is_object() {
            return Self::Unparseable(format!("expected a JSON object, got {}", kind_of(&value)));
        }

        match serde_json::from_value::<RawDescriptor>(value) {
            Ok(raw) => Self::Descriptor(raw.into()),
            Err(e) => Self::Unparseable(e.to_string()),
        }
    }
}

fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
