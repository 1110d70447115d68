use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use crate::{
    domain::{Actor, KeyOperation},
    normalize::NormalizedResult,
    seller::types::RawApiResponse,
    Result,
};

// ============== Timestamp Helpers ==============

/// RFC3339 timestamp in UTC (for logs/telemetry).
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

/// A fixed "now" plus the operators' local offset.
///
/// Reports and normalization take one of these instead of reading the clock so
/// that a single invocation renders consistent times.
#[derive(Clone, Copy, Debug)]
pub struct DisplayClock {
    pub now: DateTime<Utc>,
    pub offset: FixedOffset,
}

impl DisplayClock {
    pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self { now, offset }
    }

    pub fn system(offset: FixedOffset) -> Self {
        Self::new(Utc::now(), offset)
    }

    /// `DD-MM-YYYY HH:MM:SS` in the local offset.
    pub fn format(&self, dt: DateTime<Utc>) -> String {
        dt.with_timezone(&self.offset)
            .format("%d-%m-%Y %H:%M:%S")
            .to_string()
    }

    pub fn now_display(&self) -> String {
        self.format(self.now)
    }
}

// ============== Audit Logging ==============

const AUDIT_MAX_TEXT: usize = 500;

#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,

    pub user_id: i64,
    pub username: String,
    pub operation: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    pub outcome: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditEvent {
    /// One executed operator command: who, what, on which key, and what the backend said.
    pub fn command(
        actor: &Actor,
        op: &KeyOperation,
        raw: &RawApiResponse,
        result: &NormalizedResult,
    ) -> Self {
        let outcome = if result.is_ok() { "ok" } else { "failed" };
        let error = if result.is_ok() {
            None
        } else {
            result.failure_message.clone()
        };
        Self {
            timestamp: iso_timestamp_utc(),
            event: "command".to_string(),
            user_id: actor.user_id.0,
            username: actor.display_name.clone(),
            operation: op.kind().command_name().to_string(),
            target: op.target().map(|s| s.to_string()),
            outcome: outcome.to_string(),
            response: Some(raw.raw_text()).filter(|s| !s.is_empty()),
            error,
        }
    }

    /// Single-line plain text form.
    fn to_line(&self) -> String {
        let mut out = format!(
            "{} - {} ({}) executed /{}",
            self.timestamp, self.username, self.user_id, self.operation
        );
        if let Some(target) = &self.target {
            out.push_str(" on ");
            out.push_str(target);
        }
        out.push_str(": ");
        out.push_str(&self.outcome);
        if let Some(response) = &self.response {
            out.push(' ');
            out.push_str(response);
        } else if let Some(error) = &self.error {
            out.push(' ');
            out.push_str(error);
        }
        out.replace(['\r', '\n'], " ")
    }
}

#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append exactly one line for `event`.
    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        // Backend error pages can be large.
        if let Some(s) = &event.response {
            event.response = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }
        if let Some(s) = &event.error {
            event.error = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }

        let line = if self.json {
            serde_json::to_string(&event)?
        } else {
            event.to_line()
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(format!("{line}\n").as_bytes())?;
        Ok(())
    }
}

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}
