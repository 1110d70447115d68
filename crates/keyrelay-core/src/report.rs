//! Report rendering: `NormalizedResult` → platform-neutral `DisplayReport`.

use chrono::{DateTime, Utc};

use crate::{
    domain::KeyOperation,
    normalize::{fields, FailureKind, NormalizedResult, NOT_AVAILABLE, UNKNOWN_ERROR},
    utils::{truncate_text, DisplayClock},
};

/// Largest key-list code block rendered inline; longer lists go to an attachment.
pub const INLINE_BODY_LIMIT: usize = 4000;
pub const KEYS_ATTACHMENT_NAME: &str = "keys.txt";
/// Field values longer than this (backend error pages, mostly) are cut.
pub const FIELD_VALUE_LIMIT: usize = 1000;

const SEPARATOR_LABEL: &str = "\u{200b}";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportField {
    pub label: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content: String,
}

/// What gets shown to the operator.
///
/// `body_text` (markdown) and `attachment` are never both set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayReport {
    pub title: String,
    pub color: u32,
    pub timestamp: DateTime<Utc>,
    pub fields: Vec<ReportField>,
    pub body_text: Option<String>,
    pub attachment: Option<Attachment>,
    pub footer: Option<String>,
}

impl DisplayReport {
    fn new(title: &str, ctx: &OperationContext, clock: &DisplayClock) -> Self {
        Self {
            title: title.to_string(),
            color: ctx.color,
            timestamp: clock.now,
            fields: Vec::new(),
            body_text: None,
            attachment: None,
            footer: ctx.footer.clone(),
        }
    }

    fn field(&mut self, label: &str, value: impl Into<String>, inline: bool) {
        self.fields.push(ReportField {
            label: label.to_string(),
            value: truncate_text(&value.into(), FIELD_VALUE_LIMIT),
            inline,
        });
    }

    pub fn field_value(&self, label: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.label == label)
            .map(|f| f.value.as_str())
    }
}

/// Caller-supplied display parameters for one invocation.
#[derive(Clone, Debug)]
pub struct OperationContext {
    pub actor_name: String,
    pub operation: KeyOperation,
    pub color: u32,
    pub footer: Option<String>,
}

pub mod labels {
    pub const LICENSE_KEY: &str = "🔑 License Key";
    pub const DEVICES: &str = "🖥 Số thiết bị";
    pub const DURATION: &str = "⏳ Thời hạn";
    pub const LEVEL: &str = "🏷 Level";
    pub const CREATED_AT: &str = "📅 Ngày tạo";
    pub const EXPIRES_AT: &str = "⌛ Ngày hết hạn";
    pub const CREATOR: &str = "👤 Người tạo";
    pub const CHECKED_BY: &str = "👤 Người kiểm tra";
    pub const DELETED_BY: &str = "👤 Người xóa";
    pub const PERFORMED_BY: &str = "👤 Người thực hiện";
    pub const USED_BY: &str = "🙍 Người dùng";
    pub const TIME_LEFT: &str = "⏰ Thời gian còn lại";
    pub const STATUS: &str = "🚫 Trạng thái";
    pub const REASON: &str = "📝 Lý do";
    pub const ACTION: &str = "⚙️ Thao tác";
    pub const TIME: &str = "📅 Thời gian";
    pub const ATTACHMENT: &str = "📎 Tệp đính kèm";
    pub const ERROR_DETAIL: &str = "⚠️ Chi tiết";
}

struct Titles {
    ok: &'static str,
    failed: &'static str,
}

fn titles(op: &KeyOperation) -> Titles {
    match op {
        KeyOperation::Add { .. } => Titles {
            ok: "✅ Key đã được tạo thành công!",
            failed: "❌ Lỗi khi tạo key!",
        },
        KeyOperation::Delete { .. } => Titles {
            ok: "🗑️ Key đã bị xóa!",
            failed: "❌ Lỗi khi xóa key!",
        },
        KeyOperation::Info { .. } => Titles {
            ok: "ℹ️ Thông tin Key",
            failed: "❌ Lỗi khi lấy thông tin key!",
        },
        KeyOperation::Ban { .. } => Titles {
            ok: "✅ Key đã bị BAN thành công!",
            failed: "❌ Lỗi khi ban key!",
        },
        KeyOperation::ResetUser { .. } => Titles {
            ok: "✅ Key đã được reset thành công!",
            failed: "❌ Lỗi khi reset HWID!",
        },
    }
}

const TRANSPORT_FAILURE_TITLE: &str = "❌ Lỗi khi gọi API!";

/// Render `result` for display. Pure: no I/O, no clock reads.
pub fn render(
    result: &NormalizedResult,
    ctx: &OperationContext,
    clock: &DisplayClock,
) -> DisplayReport {
    let t = titles(&ctx.operation);

    if !result.is_ok() {
        let title = match result.failure_kind {
            Some(FailureKind::Transport) => TRANSPORT_FAILURE_TITLE,
            _ => t.failed,
        };
        let mut report = DisplayReport::new(title, ctx, clock);
        let message = result.failure_message.as_deref().unwrap_or(UNKNOWN_ERROR);
        report.field(labels::ERROR_DETAIL, message, false);
        return report;
    }

    let mut report = DisplayReport::new(t.ok, ctx, clock);
    let info = |name: &str| result.info(name).unwrap_or(NOT_AVAILABLE).to_string();

    match &ctx.operation {
        KeyOperation::Add {
            expiry_days, level, ..
        } => {
            report.field(labels::LICENSE_KEY, format!("{} key", result.keys.len()), false);
            report.field(labels::DEVICES, "1 thiết bị", true);
            report.field(labels::DURATION, format!("{expiry_days} ngày"), true);
            report.field(labels::LEVEL, format!("Level {level}"), true);
            report.field(labels::CREATED_AT, clock.now_display(), true);
            report.field(labels::CREATOR, ctx.actor_name.as_str(), true);
            report.field(labels::TIME_LEFT, format!("{expiry_days} ngày"), true);
            report.field(labels::STATUS, "Chưa Dùng", true);
            report.field(SEPARATOR_LABEL, "─".repeat(20), false);
            attach_keys(&mut report, &result.keys);
        }
        KeyOperation::Info { .. } => {
            report.field(labels::LICENSE_KEY, info(fields::KEY), true);
            report.field(labels::CREATED_AT, info(fields::CREATION_DATE), true);
            report.field(labels::EXPIRES_AT, info(fields::EXPIRY), true);
            report.field(labels::TIME_LEFT, info(fields::TIME_LEFT), true);
            report.field(labels::LEVEL, info(fields::LEVEL), true);
            report.field(labels::CHECKED_BY, ctx.actor_name.as_str(), true);
            report.field(labels::USED_BY, info(fields::USED_BY), true);
            report.field(labels::STATUS, info(fields::STATUS), true);
        }
        KeyOperation::Delete { .. } => {
            report.field(labels::LICENSE_KEY, info(fields::KEY), false);
            report.field(labels::REASON, info(fields::REASON), true);
            report.field(labels::DELETED_BY, ctx.actor_name.as_str(), true);
        }
        KeyOperation::Ban { .. } => {
            report.field(labels::LICENSE_KEY, info(fields::KEY), false);
            report.field(labels::STATUS, "Đã bị ban", true);
            report.field(labels::PERFORMED_BY, ctx.actor_name.as_str(), true);
            report.field(labels::TIME, clock.now_display(), true);
        }
        KeyOperation::ResetUser { .. } => {
            report.field(labels::LICENSE_KEY, info(fields::USER), false);
            report.field(labels::ACTION, "Reset Key", true);
            report.field(labels::PERFORMED_BY, ctx.actor_name.as_str(), true);
            report.field(labels::STATUS, "Resetkey thành công", true);
            report.field(labels::TIME, clock.now_display(), true);
        }
    }

    report
}

/// Inline code block when it fits, `keys.txt` attachment otherwise.
fn attach_keys(report: &mut DisplayReport, keys: &[String]) {
    let keys_text = keys.join("\n");
    let code_block = format!("```\n{keys_text}\n```");

    if code_block.chars().count() <= INLINE_BODY_LIMIT {
        report.body_text = Some(format!("**Danh sách keys:**\n{code_block}"));
        return;
    }

    report.field(
        labels::ATTACHMENT,
        format!("Danh sách key quá dài, xem file `{KEYS_ATTACHMENT_NAME}`."),
        false,
    );
    report.attachment = Some(Attachment {
        filename: KEYS_ATTACHMENT_NAME.to_string(),
        content: keys_text,
    });
}
