//! Formatting utilities (Markdown → Telegram HTML, report layout).

use crate::{report::DisplayReport, utils::truncate_text};

/// Smallest per-field value cap tried when a header does not fit a message.
const MIN_VALUE_CAP: usize = 16;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Convert the markdown subset used in reports to Telegram-compatible HTML.
///
/// Supported: fenced code blocks, inline code and `**bold**`. Everything else is escaped.
pub fn convert_markdown_to_html(input: &str) -> String {
    let (text, code_blocks) = extract_code_blocks(input);
    let (text, inline_codes) = extract_inline_codes(&text);

    let mut text = text
        .split('\n')
        .map(|line| replace_delimited(&escape_html(line), "**", "<b>", "</b>"))
        .collect::<Vec<_>>()
        .join("\n");

    for (i, code) in code_blocks.iter().enumerate() {
        let escaped = escape_html(code.trim_end_matches('\n'));
        text = text.replace(
            &format!("\0CODEBLOCK{i}\0"),
            &format!("<pre>{escaped}</pre>"),
        );
    }

    for (i, code) in inline_codes.iter().enumerate() {
        let escaped = escape_html(code);
        text = text.replace(
            &format!("\0INLINECODE{i}\0"),
            &format!("<code>{escaped}</code>"),
        );
    }

    text
}

/// Inline code only; used for field values, which are mostly backend data.
fn inline_code_to_html(input: &str) -> String {
    let (text, inline_codes) = extract_inline_codes(input);
    let mut text = escape_html(&text);
    for (i, code) in inline_codes.iter().enumerate() {
        text = text.replace(
            &format!("\0INLINECODE{i}\0"),
            &format!("<code>{}</code>", escape_html(code)),
        );
    }
    text
}

fn extract_code_blocks(input: &str) -> (String, Vec<String>) {
    let mut blocks = Vec::new();
    let mut out = String::new();

    let mut i = 0usize;
    while let Some(rel) = input[i..].find("```") {
        let start = i + rel;
        out.push_str(&input[i..start]);

        let mut p = start + 3;
        // Optional language identifier: [A-Za-z0-9_]+
        while p < input.len() {
            let b = input.as_bytes()[p];
            if b.is_ascii_alphanumeric() || b == b'_' {
                p += 1;
            } else {
                break;
            }
        }
        // Optional single newline
        if p < input.len() && input.as_bytes()[p] == b'\n' {
            p += 1;
        }

        if let Some(end_rel) = input[p..].find("```") {
            let end = p + end_rel;
            let idx = blocks.len();
            blocks.push(input[p..end].to_string());
            out.push_str(&format!("\0CODEBLOCK{idx}\0"));
            i = end + 3;
            continue;
        }

        // Unclosed fence: append the rest and stop.
        out.push_str(&input[start..]);
        return (out, blocks);
    }

    out.push_str(&input[i..]);
    (out, blocks)
}

fn extract_inline_codes(input: &str) -> (String, Vec<String>) {
    let mut codes = Vec::new();
    let mut out = String::new();

    let mut i = 0usize;
    while let Some(rel) = input[i..].find('`') {
        let start = i + rel;
        out.push_str(&input[i..start]);

        let content_start = start + 1;
        if let Some(end_rel) = input[content_start..].find('`') {
            let end = content_start + end_rel;
            let idx = codes.len();
            codes.push(input[content_start..end].to_string());
            out.push_str(&format!("\0INLINECODE{idx}\0"));
            i = end + 1;
            continue;
        }

        // Unclosed: append the rest and stop.
        out.push_str(&input[start..]);
        return (out, codes);
    }

    out.push_str(&input[i..]);
    (out, codes)
}

fn replace_delimited(text: &str, delim: &str, open: &str, close: &str) -> String {
    let mut out = String::new();
    let mut i = 0usize;
    while let Some(rel) = text[i..].find(delim) {
        let start = i + rel;
        out.push_str(&text[i..start]);
        let content_start = start + delim.len();
        if let Some(end_rel) = text[content_start..].find(delim) {
            let end = content_start + end_rel;
            out.push_str(open);
            out.push_str(&text[content_start..end]);
            out.push_str(close);
            i = end + delim.len();
            continue;
        }
        out.push_str(&text[start..]);
        return out;
    }
    out.push_str(&text[i..]);
    out
}

// ============== Report Layout ==============

/// `value_cap` bounds each field value (in chars, before escaping).
fn report_header_html(report: &DisplayReport, value_cap: Option<usize>) -> String {
    let mut out = format!("<b>{}</b>\n", escape_html(&report.title));
    for field in &report.fields {
        out.push('\n');
        let value = match value_cap {
            Some(cap) => inline_code_to_html(&truncate_text(&field.value, cap)),
            None => inline_code_to_html(&field.value),
        };
        // Zero-width labels are visual separators.
        if field.label.trim_matches('\u{200b}').is_empty() {
            out.push_str(&value);
        } else {
            out.push_str(&format!("<b>{}:</b> {value}", escape_html(&field.label)));
        }
    }
    out
}

fn report_footer_html(report: &DisplayReport) -> String {
    let ts = report.timestamp.format("%d-%m-%Y %H:%M:%S UTC");
    match &report.footer {
        Some(f) => format!("<i>{} • {ts}</i>", escape_html(f)),
        None => format!("<i>{ts}</i>"),
    }
}

/// Lay a report out as one or more Telegram HTML messages.
///
/// Everything goes into a single message when it fits in `max_len`; otherwise the
/// key list body is sent as its own message after the header. Field values are
/// shortened until the header and footer fit in one message.
pub fn report_to_html_messages(report: &DisplayReport, max_len: usize) -> Vec<String> {
    let footer = report_footer_html(report);
    let fits = |header: &str| header.chars().count() + 2 + footer.chars().count() <= max_len;

    let mut header = report_header_html(report, None);
    let mut cap = report
        .fields
        .iter()
        .map(|f| f.value.chars().count())
        .max()
        .unwrap_or(0);
    while !fits(&header) && cap > MIN_VALUE_CAP {
        cap = (cap / 2).max(MIN_VALUE_CAP);
        header = report_header_html(report, Some(cap));
    }
    let body = report.body_text.as_deref().map(convert_markdown_to_html);

    let single = match &body {
        Some(b) => format!("{header}\n\n{b}\n\n{footer}"),
        None => format!("{header}\n\n{footer}"),
    };
    if single.chars().count() <= max_len {
        return vec![single];
    }

    let mut out = vec![format!("{header}\n\n{footer}")];
    out.extend(body);
    out
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::report::{Attachment, ReportField};

    fn report(body: Option<&str>) -> DisplayReport {
        DisplayReport {
            title: "✅ Done <now>".to_string(),
            color: 0xff0000,
            timestamp: Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap(),
            fields: vec![
                ReportField {
                    label: "🔑 License Key".to_string(),
                    value: "GZV-ABC-123".to_string(),
                    inline: false,
                },
                ReportField {
                    label: "\u{200b}".to_string(),
                    value: "────".to_string(),
                    inline: false,
                },
                ReportField {
                    label: "📎 Tệp".to_string(),
                    value: "xem file `keys.txt`.".to_string(),
                    inline: false,
                },
            ],
            body_text: body.map(String::from),
            attachment: None::<Attachment>,
            footer: Some("t.me/gazan".to_string()),
        }
    }

    #[test]
    fn escapes_html() {
        let s = r#"<a href="x&y">"#;
        assert_eq!(escape_html(s), "&lt;a href=&quot;x&amp;y&quot;&gt;");
    }

    #[test]
    fn converts_code_blocks_without_touching_contents() {
        let md = "**Keys:**\n```\nA_B*C\n<x>\n```";
        let html = convert_markdown_to_html(md);
        assert_eq!(html, "<b>Keys:</b>\n<pre>A_B*C\n&lt;x&gt;</pre>");
    }

    #[test]
    fn converts_inline_code() {
        assert_eq!(
            convert_markdown_to_html("see `keys.txt`"),
            "see <code>keys.txt</code>"
        );
    }

    #[test]
    fn lays_out_header_fields_and_footer() {
        let msgs = report_to_html_messages(&report(None), 4096);
        assert_eq!(msgs.len(), 1);
        let m = &msgs[0];
        assert!(m.starts_with("<b>✅ Done &lt;now&gt;</b>\n"));
        assert!(m.contains("<b>🔑 License Key:</b> GZV-ABC-123"));
        assert!(m.contains("\n────\n"));
        assert!(m.contains("<code>keys.txt</code>"));
        assert!(m.ends_with("<i>t.me/gazan • 10-01-2025 00:00:00 UTC</i>"));
    }

    #[test]
    fn long_body_is_split_into_its_own_message() {
        let keys = vec!["GZV-AAA-AAA"; 330].join("\n");
        let body = format!("**Danh sách keys:**\n```\n{keys}\n```");
        let msgs = report_to_html_messages(&report(Some(&body)), 4096);
        assert_eq!(msgs.len(), 2);
        assert!(!msgs[0].contains("<pre>"));
        assert!(msgs[1].starts_with("<b>Danh sách keys:</b>\n<pre>GZV-AAA-AAA"));
    }

    #[test]
    fn oversized_field_values_are_shortened_to_fit() {
        let mut r = report(None);
        r.fields[0].value = "<p>Bad Gateway</p>".repeat(300);
        let msgs = report_to_html_messages(&r, 4096);
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].chars().count() <= 4096, "{}", msgs[0].chars().count());
        assert!(msgs[0].contains("<b>🔑 License Key:</b> &lt;p&gt;Bad Gateway"));
        assert!(msgs[0].ends_with("<i>t.me/gazan • 10-01-2025 00:00:00 UTC</i>"));
    }

    #[test]
    fn short_body_stays_inline() {
        let msgs = report_to_html_messages(&report(Some("```\nK1\nK2\n```")), 4096);
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].contains("<pre>K1\nK2</pre>"));
    }
}
