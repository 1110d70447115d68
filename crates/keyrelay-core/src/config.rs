use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::FixedOffset;
use reqwest::Url;

use crate::{errors::Error, Result};

/// Typed process configuration, read once at startup and shared read-only.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    /// Members of this chat are operators.
    pub operator_chat_id: i64,

    // Seller API
    pub seller_key: String,
    pub seller_link: Url,
    pub seller_timeout: Duration,
    pub key_mask: String,
    pub add_type_candidates: Vec<String>,

    // Reports
    pub report_color: u32,
    pub report_footer: Option<String>,
    pub display_offset: FixedOffset,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,
}

impl Config {
    /// Load from `.env` (if present) and the process environment.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Fails on missing required values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let vars = Vars(lookup);

        // Required
        let telegram_bot_token = vars.required("TELEGRAM_BOT_TOKEN")?;
        let operator_chat_id = vars
            .required("OPERATOR_CHAT_ID")?
            .trim()
            .parse::<i64>()
            .map_err(|_| Error::Config("OPERATOR_CHAT_ID must be a numeric chat id".to_string()))?;
        let seller_key = vars.required("SELLER_KEY")?;
        let seller_link_raw = vars.required("SELLER_LINK")?;
        let seller_link = Url::parse(seller_link_raw.trim())
            .map_err(|e| Error::Config(format!("SELLER_LINK is not a valid URL: {e}")))?;

        // Seller API behavior
        let seller_timeout = Duration::from_secs(vars.u64("SELLER_TIMEOUT_SECS").unwrap_or(15));
        let key_mask = vars
            .str("KEY_MASK")
            .and_then(non_empty)
            .unwrap_or_else(|| "GZV-XXX-XXX".to_string());
        let add_type_candidates = parse_csv(vars.str("ADD_TYPE_CANDIDATES"))
            .unwrap_or_else(|| vec!["add".to_string()]);

        // Report look
        let report_color = match vars.str("REPORT_COLOR") {
            Some(raw) => parse_color(&raw)
                .ok_or_else(|| Error::Config(format!("REPORT_COLOR is not a color: {raw}")))?,
            None => 0xff0000,
        };
        let report_footer = vars.str("REPORT_FOOTER").and_then(non_empty);
        let offset_hours = vars.i32("DISPLAY_UTC_OFFSET_HOURS").unwrap_or(7);
        let display_offset = FixedOffset::east_opt(offset_hours * 3600).ok_or_else(|| {
            Error::Config(format!(
                "DISPLAY_UTC_OFFSET_HOURS out of range: {offset_hours}"
            ))
        })?;

        // Audit logging
        let audit_log_path = PathBuf::from(
            vars.str("AUDIT_LOG_PATH")
                .and_then(non_empty)
                .unwrap_or_else(|| "bot.log".to_string()),
        );
        let audit_log_json = vars.bool("AUDIT_LOG_JSON").unwrap_or(false);

        Ok(Self {
            telegram_bot_token,
            operator_chat_id,
            seller_key,
            seller_link,
            seller_timeout,
            key_mask,
            add_type_candidates,
            report_color,
            report_footer,
            display_offset,
            audit_log_path,
            audit_log_json,
        })
    }
}

struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn str(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn required(&self, key: &str) -> Result<String> {
        self.str(key)
            .and_then(non_empty)
            .ok_or_else(|| Error::Config(format!("{key} environment variable is required")))
    }

    fn bool(&self, key: &str) -> Option<bool> {
        self.str(key).map(|s| {
            matches!(
                s.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
    }

    fn u64(&self, key: &str) -> Option<u64> {
        self.str(key).and_then(|s| s.trim().parse::<u64>().ok())
    }

    fn i32(&self, key: &str) -> Option<i32> {
        self.str(key).and_then(|s| s.trim().parse::<i32>().ok())
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn parse_csv(v: Option<String>) -> Option<Vec<String>> {
    let out = v?
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// `0xff0000`, `#ff0000` or a decimal value.
fn parse_color(raw: &str) -> Option<u32> {
    let s = raw.trim();
    let hex = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .or_else(|| s.strip_prefix('#'));
    let value = match hex {
        Some(h) => u32::from_str_radix(h, 16).ok()?,
        None => s.parse::<u32>().ok()?,
    };
    (value <= 0xff_ffff).then_some(value)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn base() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("OPERATOR_CHAT_ID", "-1001234567890"),
            ("SELLER_KEY", "seller-secret"),
            ("SELLER_LINK", "https://keyauth.win/api/seller/"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<Config> {
        Config::from_lookup(|k| vars.get(k).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_apply_when_optional_values_absent() {
        let cfg = load(&base()).unwrap();
        assert_eq!(cfg.operator_chat_id, -1001234567890);
        assert_eq!(cfg.seller_timeout, Duration::from_secs(15));
        assert_eq!(cfg.key_mask, "GZV-XXX-XXX");
        assert_eq!(cfg.add_type_candidates, vec!["add"]);
        assert_eq!(cfg.report_color, 0xff0000);
        assert_eq!(cfg.report_footer, None);
        assert_eq!(cfg.display_offset.local_minus_utc(), 7 * 3600);
        assert_eq!(cfg.audit_log_path, PathBuf::from("bot.log"));
        assert!(!cfg.audit_log_json);
    }

    #[test]
    fn missing_required_value_fails_fast() {
        for key in ["TELEGRAM_BOT_TOKEN", "OPERATOR_CHAT_ID", "SELLER_KEY", "SELLER_LINK"] {
            let mut vars = base();
            vars.remove(key);
            let err = load(&vars).unwrap_err();
            assert!(err.to_string().contains(key), "{err}");
        }
    }

    #[test]
    fn blank_required_value_counts_as_missing() {
        let mut vars = base();
        vars.insert("SELLER_KEY", "   ");
        assert!(load(&vars).is_err());
    }

    #[test]
    fn rejects_non_numeric_chat_id_and_bad_url() {
        let mut vars = base();
        vars.insert("OPERATOR_CHAT_ID", "admins");
        assert!(load(&vars).is_err());

        let mut vars = base();
        vars.insert("SELLER_LINK", "not a url");
        assert!(load(&vars).is_err());
    }

    #[test]
    fn parses_optional_values() {
        let mut vars = base();
        vars.insert("ADD_TYPE_CANDIDATES", "add, create ,,gen");
        vars.insert("REPORT_COLOR", "#00ff00");
        vars.insert("REPORT_FOOTER", "t.me/gazan");
        vars.insert("DISPLAY_UTC_OFFSET_HOURS", "-5");
        vars.insert("SELLER_TIMEOUT_SECS", "30");
        vars.insert("AUDIT_LOG_JSON", "yes");
        let cfg = load(&vars).unwrap();
        assert_eq!(cfg.add_type_candidates, vec!["add", "create", "gen"]);
        assert_eq!(cfg.report_color, 0x00ff00);
        assert_eq!(cfg.report_footer.as_deref(), Some("t.me/gazan"));
        assert_eq!(cfg.display_offset.local_minus_utc(), -5 * 3600);
        assert_eq!(cfg.seller_timeout, Duration::from_secs(30));
        assert!(cfg.audit_log_json);
    }

    #[test]
    fn color_parsing() {
        assert_eq!(parse_color("0xff0000"), Some(0xff0000));
        assert_eq!(parse_color("16711680"), Some(0xff0000));
        assert_eq!(parse_color("#gg0000"), None);
        assert_eq!(parse_color("0x1000000"), None);
    }

    #[test]
    fn quotes_are_stripped() {
        assert_eq!(strip_quotes("\"abc\""), "abc");
        assert_eq!(strip_quotes("'abc'"), "abc");
        assert_eq!(strip_quotes("abc"), "abc");
    }
}
