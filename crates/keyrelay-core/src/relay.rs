//! Operator command relay.
//!
//! One invocation = authorization check, at most one Seller API request
//! sequence, one report, one audit line. Nothing here is shared mutably between
//! invocations, so concurrent commands need no coordination.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    config::Config,
    domain::{Actor, ChatId, KeyOperation, OperationKind},
    formatting::{escape_html, report_to_html_messages},
    messaging::{port::MessagingPort, types::OutgoingDocument},
    normalize::normalize,
    ports::RoleDirectory,
    report::{render, DisplayReport, OperationContext},
    seller::SellerApi,
    utils::{AuditEvent, AuditLogger, DisplayClock},
    Result,
};

pub const DENIED_TEXT: &str = "Bạn không có quyền dùng lệnh này!";

/// What the invoking operator gets back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    /// Caller is not an operator. No request was made, nothing was audited.
    Denied(String),
    /// Arguments did not parse. No request was made.
    Usage(String),
    Report(DisplayReport),
}

pub struct CommandRelay {
    cfg: Arc<Config>,
    api: SellerApi,
    roles: Arc<dyn RoleDirectory>,
    audit: AuditLogger,
}

impl CommandRelay {
    pub fn new(
        cfg: Arc<Config>,
        api: SellerApi,
        roles: Arc<dyn RoleDirectory>,
        audit: AuditLogger,
    ) -> Self {
        Self {
            cfg,
            api,
            roles,
            audit,
        }
    }

    /// Membership lookup failures count as "not an operator".
    pub async fn is_operator(&self, actor: &Actor) -> bool {
        match self.roles.is_operator(actor.user_id).await {
            Ok(ok) => ok,
            Err(e) => {
                warn!(user_id = actor.user_id.0, error = %e, "operator lookup failed");
                false
            }
        }
    }

    /// Handle one operator command (`kind` + raw argument text).
    pub async fn handle(&self, actor: &Actor, kind: OperationKind, args: &str) -> Reply {
        if !self.is_operator(actor).await {
            info!(
                user_id = actor.user_id.0,
                user = actor.display_name.as_str(),
                command = kind.command_name(),
                "unauthorized command"
            );
            return Reply::Denied(DENIED_TEXT.to_string());
        }

        let op = match KeyOperation::parse(kind, args) {
            Ok(op) => op,
            Err(e) => return Reply::Usage(format!("⚠️ {e}")),
        };

        Reply::Report(self.execute(actor, op).await)
    }

    async fn execute(&self, actor: &Actor, op: KeyOperation) -> DisplayReport {
        let params = op.parameters(&self.cfg.key_mask);
        let candidates = match op.kind() {
            OperationKind::Add => Some(self.cfg.add_type_candidates.as_slice()),
            _ => None,
        };

        let raw = self.api.call(&params, candidates).await;

        let clock = DisplayClock::system(self.cfg.display_offset);
        let result = normalize(&raw, &op, &clock);

        info!(
            user = actor.display_name.as_str(),
            command = op.kind().command_name(),
            target = op.target().unwrap_or("-"),
            ok = result.is_ok(),
            "command executed"
        );
        if let Err(e) = self
            .audit
            .write(AuditEvent::command(actor, &op, &raw, &result))
        {
            warn!(path = %self.audit.path().display(), error = %e, "audit write failed");
        }

        let ctx = OperationContext {
            actor_name: actor.display_name.clone(),
            operation: op,
            color: self.cfg.report_color,
            footer: self.cfg.report_footer.clone(),
        };
        render(&result, &ctx, &clock)
    }
}

/// Send a `Reply` to `chat_id`: HTML message(s), then the attachment if any.
pub async fn deliver(messenger: &dyn MessagingPort, chat_id: ChatId, reply: &Reply) -> Result<()> {
    let report = match reply {
        Reply::Denied(text) | Reply::Usage(text) => {
            messenger.send_html(chat_id, &escape_html(text)).await?;
            return Ok(());
        }
        Reply::Report(report) => report,
    };

    let caps = messenger.capabilities();
    for html in report_to_html_messages(report, caps.max_message_len) {
        messenger.send_html(chat_id, &html).await?;
    }

    let Some(att) = &report.attachment else {
        return Ok(());
    };

    if caps.supports_documents {
        messenger
            .send_document(
                chat_id,
                OutgoingDocument {
                    file_name: att.filename.clone(),
                    bytes: att.content.clone().into_bytes(),
                    caption: Some(format!("🔑 {} key", att.content.lines().count())),
                },
            )
            .await?;
        return Ok(());
    }

    for chunk in chunk_lines(&att.content, caps.max_message_len.saturating_sub(16)) {
        messenger
            .send_html(chat_id, &format!("<pre>{}</pre>", escape_html(&chunk)))
            .await?;
    }
    Ok(())
}

/// Split on line boundaries so each chunk stays under `max_len` chars once escaped.
/// A line that alone is too long is cut into pieces.
fn chunk_lines(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(8);
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut cur_len = 0usize;
    for line in text.lines().flat_map(|l| split_long_line(l, max_len - 1)) {
        let len = escaped_len(&line) + 1;
        if cur_len > 0 && cur_len + len > max_len {
            out.push(std::mem::take(&mut cur));
            cur_len = 0;
        }
        if cur_len > 0 {
            cur.push('\n');
        }
        cur.push_str(&line);
        cur_len += len;
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

fn escaped_len(s: &str) -> usize {
    escape_html(s).chars().count()
}

/// Pieces of `line` whose escaped length is at most `max_len`.
fn split_long_line(line: &str, max_len: usize) -> Vec<String> {
    if escaped_len(line) <= max_len {
        return vec![line.to_string()];
    }
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut cur_len = 0usize;
    for c in line.chars() {
        let len = escaped_len(c.encode_utf8(&mut [0u8; 4]));
        if cur_len + len > max_len {
            out.push(std::mem::take(&mut cur));
            cur_len = 0;
        }
        cur.push(c);
        cur_len += len;
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}
