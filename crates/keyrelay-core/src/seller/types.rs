use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

/// Ordered query parameters for a Seller API GET request.
///
/// `set` replaces an existing value in place so the parameter order stays stable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.pairs.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, name: &str) {
        self.pairs.retain(|(k, _)| k != name);
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut out = QueryParams::new();
        for (k, v) in iter {
            let k: String = k.into();
            out.set(&k, v);
        }
        out
    }
}

/// Raw HTTP reply as seen by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// Where a `RawApiResponse` came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseSource {
    /// Decoded JSON object returned by the backend.
    Backend,
    /// Backend answered with something that is not a JSON object.
    NonJson,
    /// No usable answer: timeout, DNS, connection refused, ...
    Transport,
}

/// A Seller API answer before normalization.
#[derive(Clone, Debug, PartialEq)]
pub struct RawApiResponse {
    pub success: bool,
    pub message: Option<String>,
    /// Full decoded object (empty unless `source` is `Backend`).
    pub payload: Map<String, Value>,
    pub source: ResponseSource,
}

impl RawApiResponse {
    pub fn failure(message: impl Into<String>, source: ResponseSource) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            payload: Map::new(),
            source,
        }
    }

    /// Decode an HTTP reply. Never fails: non-JSON bodies become `success:false`
    /// responses carrying the raw body as message.
    pub fn from_reply(reply: &HttpReply) -> Self {
        match serde_json::from_str::<Value>(&reply.body) {
            Ok(Value::Object(payload)) => Self::from_object(payload),
            _ => {
                let body = reply.body.trim();
                let message = if body.is_empty() {
                    format!("HTTP {}", reply.status)
                } else {
                    reply.body.clone()
                };
                Self::failure(message, ResponseSource::NonJson)
            }
        }
    }

    fn from_object(payload: Map<String, Value>) -> Self {
        let success = payload
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let message = payload
            .get("message")
            .filter(|v| !v.is_null())
            .map(value_to_display);
        Self {
            success,
            message,
            payload,
            source: ResponseSource::Backend,
        }
    }

    /// Payload field rendered for display (`None` when absent or null).
    pub fn field(&self, name: &str) -> Option<String> {
        self.payload
            .get(name)
            .filter(|v| !v.is_null())
            .map(value_to_display)
    }

    /// Whether the backend rejected the `type` identifier itself.
    pub fn is_type_missing(&self) -> bool {
        static TYPE_MISSING: OnceLock<Regex> = OnceLock::new();
        let re = TYPE_MISSING.get_or_init(|| {
            Regex::new(r"(?i)type (doesn't|does not|not) exist").expect("valid regex")
        });
        self.message.as_deref().is_some_and(|m| re.is_match(m))
    }

    /// Compact text form for logs and the audit trail.
    pub fn raw_text(&self) -> String {
        match self.source {
            ResponseSource::Backend => {
                serde_json::to_string(&self.payload).unwrap_or_else(|_| "<unprintable>".into())
            }
            ResponseSource::NonJson | ResponseSource::Transport => {
                self.message.clone().unwrap_or_default()
            }
        }
    }
}

pub fn value_to_display(v: &Value) -> String {
    match v {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.to_string(),
        other => serde_json::to_string(other).unwrap_or_else(|_| "<unprintable>".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(status: u16, body: &str) -> HttpReply {
        HttpReply {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn set_replaces_in_place() {
        let mut p: QueryParams = [("type", "add"), ("level", "1")].into_iter().collect();
        p.set("type", "create");
        assert_eq!(
            p.pairs(),
            &[
                ("type".to_string(), "create".to_string()),
                ("level".to_string(), "1".to_string())
            ]
        );
    }

    #[test]
    fn decodes_backend_object() {
        let r = RawApiResponse::from_reply(&reply(
            200,
            r#"{"success":true,"message":"Key created","key":"GZV-ABC-123"}"#,
        ));
        assert!(r.success);
        assert_eq!(r.message.as_deref(), Some("Key created"));
        assert_eq!(r.field("key").as_deref(), Some("GZV-ABC-123"));
        assert_eq!(r.source, ResponseSource::Backend);
    }

    #[test]
    fn non_json_body_becomes_failure_with_body_text() {
        let body = "<html><body>502 Bad Gateway</body></html>";
        let r = RawApiResponse::from_reply(&reply(502, body));
        assert!(!r.success);
        assert_eq!(r.message.as_deref(), Some(body));
        assert_eq!(r.source, ResponseSource::NonJson);
    }

    #[test]
    fn json_array_is_not_a_response_object() {
        let r = RawApiResponse::from_reply(&reply(200, "[1,2,3]"));
        assert!(!r.success);
        assert_eq!(r.message.as_deref(), Some("[1,2,3]"));
    }

    #[test]
    fn empty_error_body_reports_status() {
        let r = RawApiResponse::from_reply(&reply(503, ""));
        assert_eq!(r.message.as_deref(), Some("HTTP 503"));
    }

    #[test]
    fn missing_success_flag_means_failure() {
        let r = RawApiResponse::from_reply(&reply(200, r#"{"key":"A"}"#));
        assert!(!r.success);
        assert_eq!(r.message, None);
    }

    #[test]
    fn detects_type_missing_variants() {
        for msg in [
            "Type doesn't exist",
            "ERROR: TYPE DOES NOT EXIST",
            "type not exist for seller",
        ] {
            let r = RawApiResponse::failure(msg, ResponseSource::Backend);
            assert!(r.is_type_missing(), "{msg}");
        }
        let r = RawApiResponse::failure("Key not found", ResponseSource::Backend);
        assert!(!r.is_type_missing());
    }

    #[test]
    fn numeric_fields_are_displayed() {
        let r = RawApiResponse::from_reply(&reply(200, r#"{"success":true,"level":3}"#));
        assert_eq!(r.field("level").as_deref(), Some("3"));
    }
}
