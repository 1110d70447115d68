use std::fmt;

use crate::seller::types::QueryParams;

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// The operator who invoked a command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    /// Human-readable identity (`@username` or full name) used in reports and the audit log.
    pub display_name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Add,
    Delete,
    Info,
    Ban,
    ResetUser,
}

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        OperationKind::Add,
        OperationKind::Delete,
        OperationKind::Info,
        OperationKind::Ban,
        OperationKind::ResetUser,
    ];

    /// Chat command name (without the leading `/`).
    pub fn command_name(self) -> &'static str {
        match self {
            OperationKind::Add => "add",
            OperationKind::Delete => "del",
            OperationKind::Info => "inf",
            OperationKind::Ban => "ban",
            OperationKind::ResetUser => "reset",
        }
    }

    /// Preferred Seller API `type` identifier.
    pub fn backend_type(self) -> &'static str {
        match self {
            OperationKind::Add => "add",
            OperationKind::Delete => "del",
            OperationKind::Info => "info",
            OperationKind::Ban => "ban",
            OperationKind::ResetUser => "resetuser",
        }
    }

    pub fn usage(self) -> &'static str {
        match self {
            OperationKind::Add => "/add <days> <level> <amount>",
            OperationKind::Delete => "/del <key> <reason>",
            OperationKind::Info => "/inf <key>",
            OperationKind::Ban => "/ban <key>",
            OperationKind::ResetUser => "/reset <key>",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            OperationKind::Add => "Thêm key mới",
            OperationKind::Delete => "Xóa key",
            OperationKind::Info => "Lấy thông tin key",
            OperationKind::Ban => "Ban key",
            OperationKind::ResetUser => "Reset key",
        }
    }

    pub fn from_command(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.command_name() == name.to_lowercase())
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command_name())
    }
}

/// A single operator request against the Seller API.
///
/// Built once per invocation from the command arguments and never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyOperation {
    Add {
        expiry_days: u32,
        level: u32,
        amount: u32,
    },
    Delete {
        key: String,
        reason: String,
    },
    Info {
        key: String,
    },
    Ban {
        key: String,
    },
    ResetUser {
        user: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    #[error("missing argument `{arg}`, usage: {usage}")]
    Missing { arg: &'static str, usage: &'static str },

    #[error("invalid value `{value}` for `{arg}`, usage: {usage}")]
    Invalid {
        arg: &'static str,
        value: String,
        usage: &'static str,
    },
}

impl KeyOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            KeyOperation::Add { .. } => OperationKind::Add,
            KeyOperation::Delete { .. } => OperationKind::Delete,
            KeyOperation::Info { .. } => OperationKind::Info,
            KeyOperation::Ban { .. } => OperationKind::Ban,
            KeyOperation::ResetUser { .. } => OperationKind::ResetUser,
        }
    }

    /// Parse the argument string of a chat command.
    pub fn parse(kind: OperationKind, args: &str) -> std::result::Result<Self, UsageError> {
        let usage = kind.usage();
        let mut words = args.split_whitespace();

        let mut next_word = |arg: &'static str| {
            words
                .next()
                .map(|w| w.to_string())
                .ok_or(UsageError::Missing { arg, usage })
        };

        match kind {
            OperationKind::Add => {
                let expiry_days = parse_positive("days", &next_word("days")?, usage)?;
                let level_raw = next_word("level")?;
                let level = level_raw
                    .parse::<u32>()
                    .map_err(|_| UsageError::Invalid {
                        arg: "level",
                        value: level_raw.clone(),
                        usage,
                    })?;
                let amount = parse_positive("amount", &next_word("amount")?, usage)?;
                Ok(KeyOperation::Add {
                    expiry_days,
                    level,
                    amount,
                })
            }
            OperationKind::Delete => {
                let key = next_word("key")?;
                let reason = args
                    .trim()
                    .strip_prefix(key.as_str())
                    .unwrap_or("")
                    .trim()
                    .to_string();
                if reason.is_empty() {
                    return Err(UsageError::Missing {
                        arg: "reason",
                        usage,
                    });
                }
                Ok(KeyOperation::Delete { key, reason })
            }
            OperationKind::Info => Ok(KeyOperation::Info {
                key: next_word("key")?,
            }),
            OperationKind::Ban => Ok(KeyOperation::Ban {
                key: next_word("key")?,
            }),
            OperationKind::ResetUser => Ok(KeyOperation::ResetUser {
                user: next_word("key")?,
            }),
        }
    }

    /// Key or user the operation targets, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            KeyOperation::Add { .. } => None,
            KeyOperation::Delete { key, .. }
            | KeyOperation::Info { key }
            | KeyOperation::Ban { key } => Some(key),
            KeyOperation::ResetUser { user } => Some(user),
        }
    }

    /// Operation-specific query parameters, including the preferred `type`.
    ///
    /// `sellerkey` and `format` are owned by the adapter and never set here.
    pub fn parameters(&self, mask: &str) -> QueryParams {
        let mut params = QueryParams::new();
        params.set("type", self.kind().backend_type());
        match self {
            KeyOperation::Add {
                expiry_days,
                level,
                amount,
            } => {
                params.set("expiry", expiry_days.to_string());
                params.set("mask", mask);
                params.set("level", level.to_string());
                params.set("amount", amount.to_string());
            }
            KeyOperation::Delete { key, reason } => {
                params.set("key", key.as_str());
                params.set("reason", reason.as_str());
            }
            KeyOperation::Info { key } | KeyOperation::Ban { key } => {
                params.set("key", key.as_str());
            }
            KeyOperation::ResetUser { user } => {
                params.set("user", user.as_str());
            }
        }
        params
    }
}

fn parse_positive(
    arg: &'static str,
    value: &str,
    usage: &'static str,
) -> std::result::Result<u32, UsageError> {
    match value.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(UsageError::Invalid {
            arg,
            value: value.to_string(),
            usage,
        }),
    }
}
