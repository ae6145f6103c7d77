//! Bot text cleanup and a small markdown subset for chat bubbles

use regex::Regex;
use std::sync::OnceLock;

fn is_box_char(c: char) -> bool {
    c.is_whitespace() || "╔╗╚╝╠╣║═─━│┌┐└┘├┤┬┴┼▀▄█▌▐░▒▓".contains(c)
}

/// Remove MOTD banners and box-drawing decoration from command output
pub fn strip_motd(text: &str) -> String {
    let mut keep: Vec<&str> = Vec::new();
    let mut in_box = false;
    for line in text.split('\n') {
        let t = line.trim();
        if !in_box && (t.starts_with('╔') || t.starts_with('┌')) {
            in_box = true;
            continue;
        }
        if in_box && (t.starts_with('╚') || t.starts_with('└')) {
            in_box = false;
            continue;
        }
        if in_box {
            continue;
        }
        if t.starts_with(['║', '╠', '╣', '│']) {
            continue;
        }
        if !t.is_empty() && t.chars().all(is_box_char) {
            continue;
        }
        keep.push(line);
    }
    collapse_blank_runs(&keep.join("\n")).trim().to_string()
}

fn collapse_blank_runs(text: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\n{3,}").expect("valid newline regex"));
    re.replace_all(text, "\n\n").into_owned()
}

/// Bot messages announcing a ticket change trigger a stats refresh
pub fn announces_ticket_change(text: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)Ticket (utworzony|zaktualizowany|zamknięty)").expect("valid ticket regex")
    })
    .is_match(text)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
    Plain(String),
    Bold(String),
    Italic(String),
    Code(String),
    Link { label: String, url: String },
    /// `[[label|value]]`: a button dispatching `value` with an empty form
    Action { label: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, spans: Vec<Span> },
    Rule,
    /// Fenced code, kept verbatim
    Code { lang: Option<String>, lines: Vec<String> },
    Line(Vec<Span>),
}

fn inline_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\[\[([^\]|]+)\|([^\]]+)\]\]|\*\*(.+?)\*\*|\*(.+?)\*|`([^`\n]+)`|\[([^\]]+)\]\(([^)]+)\)",
        )
        .expect("valid inline regex")
    })
}

/// Split one line into styled spans
pub fn parse_inline(line: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut last = 0;
    for caps in inline_pattern().captures_iter(line) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if whole.start() > last {
            spans.push(Span::Plain(line[last..whole.start()].to_string()));
        }
        let group = |i: usize| caps.get(i).map(|m| m.as_str().to_string());
        let span = if let (Some(label), Some(value)) = (group(1), group(2)) {
            Span::Action { label, value }
        } else if let Some(bold) = group(3) {
            Span::Bold(bold)
        } else if let Some(italic) = group(4) {
            Span::Italic(italic)
        } else if let Some(code) = group(5) {
            Span::Code(code)
        } else if let (Some(label), Some(url)) = (group(6), group(7)) {
            Span::Link { label, url }
        } else {
            Span::Plain(whole.as_str().to_string())
        };
        spans.push(span);
        last = whole.end();
    }
    if last < line.len() {
        spans.push(Span::Plain(line[last..].to_string()));
    }
    spans
}

/// Parse a bot message into blocks. Headings, rules and fenced code are
/// recognised; everything else is a line of inline spans.
pub fn parse_markdown(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut fence: Option<(Option<String>, Vec<String>)> = None;
    for line in text.lines() {
        if let Some(rest) = line.trim_start().strip_prefix("```") {
            match fence.take() {
                Some((lang, lines)) => blocks.push(Block::Code { lang, lines }),
                None => {
                    let lang = rest.trim();
                    fence = Some(((!lang.is_empty()).then(|| lang.to_string()), Vec::new()));
                }
            }
            continue;
        }
        if let Some((_, lines)) = fence.as_mut() {
            lines.push(line.to_string());
            continue;
        }
        if let Some(heading) = heading(line) {
            blocks.push(heading);
        } else if line.len() >= 3 && line.chars().all(|c| c == '-') {
            blocks.push(Block::Rule);
        } else {
            blocks.push(Block::Line(parse_inline(line)));
        }
    }
    // An unterminated fence still renders as code
    if let Some((lang, lines)) = fence {
        blocks.push(Block::Code { lang, lines });
    }
    blocks
}

fn heading(line: &str) -> Option<Block> {
    for (prefix, level) in [("### ", 3), ("## ", 2), ("# ", 1)] {
        if let Some(rest) = line.strip_prefix(prefix) {
            if !rest.is_empty() {
                return Some(Block::Heading {
                    level,
                    spans: parse_inline(rest),
                });
            }
        }
    }
    None
}

/// Every `[[label|value]]` action in a message, in order
pub fn inline_actions(text: &str) -> Vec<(String, String)> {
    parse_markdown(text)
        .into_iter()
        .flat_map(|block| match block {
            Block::Heading { spans, .. } | Block::Line(spans) => spans,
            _ => Vec::new(),
        })
        .filter_map(|span| match span {
            Span::Action { label, value } => Some((label, value)),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_motd_removes_banner() {
        let text = "╔══════╗\n║ Welcome ║\n╚══════╝\nreal output\n│ side\n═════\n\n\n\nnext";
        assert_eq!(strip_motd(text), "real output\n\nnext");
    }

    #[test]
    fn test_strip_motd_keeps_plain_text() {
        assert_eq!(strip_motd("  hello\nworld  "), "hello\nworld");
    }

    #[test]
    fn test_inline_spans() {
        let spans = parse_inline("Run **now** or `make` see [docs](http://x) [[Go|launch_all]]");
        assert_eq!(
            spans,
            vec![
                Span::Plain("Run ".to_string()),
                Span::Bold("now".to_string()),
                Span::Plain(" or ".to_string()),
                Span::Code("make".to_string()),
                Span::Plain(" see ".to_string()),
                Span::Link {
                    label: "docs".to_string(),
                    url: "http://x".to_string()
                },
                Span::Plain(" ".to_string()),
                Span::Action {
                    label: "Go".to_string(),
                    value: "launch_all".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_blocks() {
        let blocks = parse_markdown("## Status\n---\n```bash\nls *\n```\ntext");
        assert!(matches!(&blocks[0], Block::Heading { level: 2, .. }));
        assert_eq!(blocks[1], Block::Rule);
        assert_eq!(
            blocks[2],
            Block::Code {
                lang: Some("bash".to_string()),
                lines: vec!["ls *".to_string()]
            }
        );
        assert_eq!(blocks[3], Block::Line(vec![Span::Plain("text".to_string())]));
    }

    #[test]
    fn test_inline_actions_collected() {
        let actions = inline_actions("Pick one:\n[[Retry|retry_launch]] or [[Logs|logs::dockfra-web]]");
        assert_eq!(
            actions,
            vec![
                ("Retry".to_string(), "retry_launch".to_string()),
                ("Logs".to_string(), "logs::dockfra-web".to_string()),
            ]
        );
    }

    #[test]
    fn test_ticket_change_announcement() {
        assert!(announces_ticket_change("✅ Ticket utworzony: T-0005"));
        assert!(announces_ticket_change("ticket ZAMKNIĘTY"));
        assert!(!announces_ticket_change("Ticket list"));
    }
}
