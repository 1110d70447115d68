//! Seller API response normalization.
//!
//! The backend is not consistent about its success shapes (`key` vs `keys`,
//! free-text messages, human date strings), so everything is reduced here to a
//! `NormalizedResult`. Nothing in this module fails: malformed or missing data
//! degrades to raw strings or placeholders.

use std::{collections::BTreeMap, sync::OnceLock};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde_json::Value;

use crate::{
    domain::{KeyOperation, OperationKind},
    seller::types::{value_to_display, RawApiResponse, ResponseSource},
    utils::DisplayClock,
};

/// Info field names produced by the normalizer.
pub mod fields {
    pub const KEY: &str = "key";
    pub const REASON: &str = "reason";
    pub const USER: &str = "user";
    pub const CREATION_DATE: &str = "creationdate";
    pub const EXPIRY: &str = "expiry";
    pub const TIME_LEFT: &str = "timeleft";
    pub const LEVEL: &str = "level";
    pub const USED_BY: &str = "usedby";
    pub const STATUS: &str = "status";
}

pub const NOT_AVAILABLE: &str = "N/A";
pub const UNDETERMINED: &str = "Không xác định";
pub const EXPIRED: &str = "Đã hết hạn";
pub const UNKNOWN_ERROR: &str = "Lỗi không xác định";
pub const NO_KEYS_RETURNED: &str = "API báo thành công nhưng không trả về key nào";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// Network/timeout failure talking to the Seller API.
    Transport,
    /// Backend answered `success:false` (or a non-JSON page).
    Rejected,
    /// Backend claimed success but left out the fields the operation needs.
    ShapeMismatch,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedResult {
    pub outcome: Outcome,
    pub keys: Vec<String>,
    pub failure_message: Option<String>,
    pub failure_kind: Option<FailureKind>,
    pub info_fields: BTreeMap<String, String>,
}

impl NormalizedResult {
    fn ok() -> Self {
        Self {
            outcome: Outcome::Ok,
            keys: Vec::new(),
            failure_message: None,
            failure_kind: None,
            info_fields: BTreeMap::new(),
        }
    }

    fn failed(kind: FailureKind, message: Option<String>) -> Self {
        Self {
            outcome: Outcome::Failed,
            keys: Vec::new(),
            failure_message: Some(message.unwrap_or_else(|| UNKNOWN_ERROR.to_string())),
            failure_kind: Some(kind),
            info_fields: BTreeMap::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome == Outcome::Ok
    }

    pub fn info(&self, name: &str) -> Option<&str> {
        self.info_fields.get(name).map(String::as_str)
    }
}

/// Reduce a raw Seller API answer to a `NormalizedResult` for `op`.
pub fn normalize(raw: &RawApiResponse, op: &KeyOperation, clock: &DisplayClock) -> NormalizedResult {
    let mut result = if !raw.success {
        let kind = match raw.source {
            ResponseSource::Transport => FailureKind::Transport,
            ResponseSource::Backend | ResponseSource::NonJson => FailureKind::Rejected,
        };
        NormalizedResult::failed(kind, raw.message.clone())
    } else {
        match op.kind() {
            OperationKind::Add => normalize_issuance(raw),
            OperationKind::Info => normalize_info(raw, clock),
            OperationKind::Delete | OperationKind::Ban | OperationKind::ResetUser => {
                NormalizedResult::ok()
            }
        }
    };

    echo_request_fields(&mut result, op);
    result
}

fn normalize_issuance(raw: &RawApiResponse) -> NormalizedResult {
    let keys = issued_keys(raw);
    if keys.is_empty() {
        return NormalizedResult::failed(
            FailureKind::ShapeMismatch,
            Some(NO_KEYS_RETURNED.to_string()),
        );
    }
    NormalizedResult {
        keys,
        ..NormalizedResult::ok()
    }
}

/// `keys` (list) wins over `key` (single value).
fn issued_keys(raw: &RawApiResponse) -> Vec<String> {
    match raw.payload.get("keys") {
        Some(Value::Array(items)) => {
            return items
                .iter()
                .filter(|v| !v.is_null())
                .map(value_to_display)
                .filter(|k| !k.trim().is_empty())
                .collect();
        }
        Some(Value::String(s)) if !s.trim().is_empty() => return vec![s.clone()],
        _ => {}
    }

    raw.field("key")
        .filter(|k| !k.trim().is_empty())
        .map(|k| vec![k])
        .unwrap_or_default()
}

fn normalize_info(raw: &RawApiResponse, clock: &DisplayClock) -> NormalizedResult {
    let mut result = NormalizedResult::ok();
    let info = &mut result.info_fields;

    let creation_raw = raw
        .field(fields::CREATION_DATE)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    let creation = parse_backend_date(&creation_raw)
        .map(|dt| clock.format(dt))
        .unwrap_or(creation_raw);
    info.insert(fields::CREATION_DATE.to_string(), creation);

    let expiry_raw = raw
        .field(fields::EXPIRY)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    let (expiry, time_left) = match parse_backend_date(&expiry_raw) {
        Some(dt) => (clock.format(dt), format_time_left(dt, clock.now)),
        None => (expiry_raw, UNDETERMINED.to_string()),
    };
    info.insert(fields::EXPIRY.to_string(), expiry);
    info.insert(fields::TIME_LEFT.to_string(), time_left);

    for name in [fields::LEVEL, fields::USED_BY, fields::STATUS] {
        let value = raw
            .field(name)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        info.insert(name.to_string(), value);
    }

    result
}

fn echo_request_fields(result: &mut NormalizedResult, op: &KeyOperation) {
    let info = &mut result.info_fields;
    match op {
        KeyOperation::Add { .. } => {}
        KeyOperation::Delete { key, reason } => {
            info.insert(fields::KEY.to_string(), key.clone());
            info.insert(fields::REASON.to_string(), reason.clone());
        }
        KeyOperation::Info { key } | KeyOperation::Ban { key } => {
            info.insert(fields::KEY.to_string(), key.clone());
        }
        KeyOperation::ResetUser { user } => {
            info.insert(fields::USER.to_string(), user.clone());
        }
    }
}

/// Parse the backend's date text, e.g. `15th January 2025 03:04:05 PM (UTC)`.
///
/// The ordinal suffix is optional (`creationdate` carries one, `expiry` does not).
pub fn parse_backend_date(raw: &str) -> Option<DateTime<Utc>> {
    static ORDINAL: OnceLock<Regex> = OnceLock::new();
    let re = ORDINAL
        .get_or_init(|| Regex::new(r"(?i)^(\d{1,2})(st|nd|rd|th)\b").expect("valid regex"));

    let cleaned = re.replace(raw.trim(), "$1");
    let naive = NaiveDateTime::parse_from_str(&cleaned, "%d %B %Y %I:%M:%S %p (UTC)").ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Remaining time until `expiry`, e.g. `29 ngày 23:59:59`.
pub fn format_time_left(expiry: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = expiry.signed_duration_since(now).num_seconds();
    if secs <= 0 {
        return EXPIRED.to_string();
    }

    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let mins = (secs % 3600) / 60;
    let rem = secs % 60;
    if days > 0 {
        return format!("{days} ngày {hours:02}:{mins:02}:{rem:02}");
    }
    format!("{hours:02}:{mins:02}:{rem:02}")
}

#[cfg(test)]
mod tests {
    use chrono::FixedOffset;
    use serde_json::json;

    use super::*;

    fn backend(v: serde_json::Value) -> RawApiResponse {
        let serde_json::Value::Object(payload) = v else {
            panic!("test payload must be an object");
        };
        RawApiResponse {
            success: payload
                .get("success")
                .and_then(|s| s.as_bool())
                .unwrap_or(false),
            message: payload
                .get("message")
                .and_then(|m| m.as_str())
                .map(String::from),
            payload,
            source: ResponseSource::Backend,
        }
    }

    fn clock() -> DisplayClock {
        DisplayClock::new(
            Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap(),
            FixedOffset::east_opt(7 * 3600).unwrap(),
        )
    }

    fn add() -> KeyOperation {
        KeyOperation::Add {
            expiry_days: 30,
            level: 1,
            amount: 2,
        }
    }

    fn info() -> KeyOperation {
        KeyOperation::Info {
            key: "GZV-ABC-123".to_string(),
        }
    }

    #[test]
    fn key_list_is_collected_in_order() {
        let raw = backend(json!({"success": true, "keys": ["GZV-ABC-123", "GZV-DEF-456"]}));
        let r = normalize(&raw, &add(), &clock());
        assert_eq!(r.outcome, Outcome::Ok);
        assert_eq!(r.keys, vec!["GZV-ABC-123", "GZV-DEF-456"]);
        assert_eq!(r.failure_message, None);
    }

    #[test]
    fn single_key_is_wrapped() {
        let raw = backend(json!({"success": true, "key": "GZV-ABC-123"}));
        let r = normalize(&raw, &add(), &clock());
        assert!(r.is_ok());
        assert_eq!(r.keys, vec!["GZV-ABC-123"]);
    }

    #[test]
    fn success_without_keys_is_a_failure() {
        let raw = backend(json!({"success": true, "message": "Created"}));
        let r = normalize(&raw, &add(), &clock());
        assert_eq!(r.outcome, Outcome::Failed);
        assert_eq!(r.failure_kind, Some(FailureKind::ShapeMismatch));
        assert_eq!(r.failure_message.as_deref(), Some(NO_KEYS_RETURNED));
        assert!(r.keys.is_empty());
    }

    #[test]
    fn empty_key_list_is_a_failure() {
        let raw = backend(json!({"success": true, "keys": []}));
        let r = normalize(&raw, &add(), &clock());
        assert_eq!(r.outcome, Outcome::Failed);
    }

    #[test]
    fn rejection_keeps_backend_message() {
        let raw = backend(json!({"success": false, "message": "Seller key invalid"}));
        let r = normalize(&raw, &add(), &clock());
        assert_eq!(r.failure_kind, Some(FailureKind::Rejected));
        assert_eq!(r.failure_message.as_deref(), Some("Seller key invalid"));
    }

    #[test]
    fn rejection_without_message_gets_generic_text() {
        let raw = backend(json!({"success": false}));
        let r = normalize(&raw, &info(), &clock());
        assert_eq!(r.failure_message.as_deref(), Some(UNKNOWN_ERROR));
    }

    #[test]
    fn transport_failure_is_classified() {
        let raw = RawApiResponse::failure("connection refused", ResponseSource::Transport);
        let r = normalize(&raw, &add(), &clock());
        assert_eq!(r.failure_kind, Some(FailureKind::Transport));
    }

    #[test]
    fn parses_backend_dates_with_and_without_ordinal() {
        let a = parse_backend_date("15th January 2025 03:04:05 PM (UTC)").unwrap();
        let b = parse_backend_date("15 January 2025 03:04:05 PM (UTC)").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, Utc.with_ymd_and_hms(2025, 1, 15, 15, 4, 5).unwrap());
        assert!(parse_backend_date("1st March 2024 12:00:00 AM (UTC)").is_some());
        assert!(parse_backend_date("yesterday").is_none());
    }

    #[test]
    fn info_dates_are_converted_to_local_time() {
        let raw = backend(json!({
            "success": true,
            "creationdate": "9th January 2025 08:30:00 PM (UTC)",
            "expiry": "11 January 2025 06:00:00 AM (UTC)",
            "level": 2,
            "usedby": "player1",
            "status": "Used"
        }));
        let r = normalize(&raw, &info(), &clock());
        assert!(r.is_ok());
        assert_eq!(r.info(fields::CREATION_DATE), Some("10-01-2025 03:30:00"));
        assert_eq!(r.info(fields::EXPIRY), Some("11-01-2025 13:00:00"));
        assert_eq!(r.info(fields::TIME_LEFT), Some("1 ngày 06:00:00"));
        assert_eq!(r.info(fields::LEVEL), Some("2"));
        assert_eq!(r.info(fields::USED_BY), Some("player1"));
        assert_eq!(r.info(fields::STATUS), Some("Used"));
        assert_eq!(r.info(fields::KEY), Some("GZV-ABC-123"));
    }

    #[test]
    fn unparseable_dates_pass_through() {
        let raw = backend(json!({
            "success": true,
            "creationdate": "sometime last week",
            "expiry": "Lifetime"
        }));
        let r = normalize(&raw, &info(), &clock());
        assert!(r.is_ok());
        assert_eq!(r.info(fields::CREATION_DATE), Some("sometime last week"));
        assert_eq!(r.info(fields::EXPIRY), Some("Lifetime"));
        assert_eq!(r.info(fields::TIME_LEFT), Some(UNDETERMINED));
        assert_eq!(r.info(fields::USED_BY), Some(NOT_AVAILABLE));
    }

    #[test]
    fn expired_keys_report_expired() {
        let expiry = Utc.with_ymd_and_hms(2025, 1, 9, 0, 0, 0).unwrap();
        assert_eq!(format_time_left(expiry, clock().now), EXPIRED);
    }

    #[test]
    fn delete_echoes_key_and_reason() {
        let op = KeyOperation::Delete {
            key: "GZV-ABC-123".to_string(),
            reason: "refund".to_string(),
        };
        let raw = backend(json!({"success": true, "message": "Key deleted"}));
        let r = normalize(&raw, &op, &clock());
        assert!(r.is_ok());
        assert_eq!(r.info(fields::KEY), Some("GZV-ABC-123"));
        assert_eq!(r.info(fields::REASON), Some("refund"));
    }
}
