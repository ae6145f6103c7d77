//! Log panel buffer fed by pushed `log_line` events and pulled tails

use regex::Regex;
use serde::Deserialize;
use std::collections::{HashSet, VecDeque};
use std::sync::OnceLock;

/// Lines kept for display; older lines are evicted first
pub const LOG_CAPACITY: usize = 800;
/// First tail request size, when nothing has been seen yet
pub const INITIAL_TAIL: usize = 200;
pub const FOLLOW_TAIL: usize = 50;
/// Clipboard exports keep only the last this-many characters
pub const COPY_LIMIT: usize = 45_000;

/// Tail line: either a bare string or `{text}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TailLine {
    Text(String),
    Entry {
        #[serde(default)]
        text: String,
    },
}

impl TailLine {
    pub fn text(&self) -> &str {
        match self {
            TailLine::Text(text) => text,
            TailLine::Entry { text } => text,
        }
    }
}

/// `/api/logs/tail?n=N` body
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LogTail {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub lines: Vec<TailLine>,
}

/// `log_line` event and `/api/history` log entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogLine {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogClass {
    Done,
    Err,
    Pull,
    Build,
    Restart,
    Warn,
    Ok,
    Dim,
    Plain,
}

struct Classifier {
    build_layer: Regex,
    done: Regex,
    build_err: Regex,
    build_pull: Regex,
    restart: Regex,
    stopped: Regex,
    err: Regex,
    warn: Regex,
    ok: Regex,
    pull: Regex,
    dim: Regex,
}

fn classifier() -> &'static Classifier {
    static CLASSIFIER: OnceLock<Classifier> = OnceLock::new();
    CLASSIFIER.get_or_init(|| {
        let re = |pattern: &str| Regex::new(pattern).expect("valid log pattern");
        Classifier {
            build_layer: re(r"^#\d+"),
            done: re(r"\bDONE\b"),
            build_err: re(r"(?i)error|failed"),
            build_pull: re(r"(?i)Downloading|Pulling|Fetching|Installing|COPY|RUN "),
            restart: re(r"(?i)Restart(ing)?\s*\(|\brestarting\b"),
            stopped: re(r"🔴|\bStopped\b"),
            err: re(r"(?i)\b(error|fatal|traceback|exception|failed|exit code [^0]|bind for|port is already|cannot|no such file|permission denied|connection refused|oci runtime|unhealthy)\b"),
            warn: re(r"(?i)\b(warning|warn|deprecated|notice)\b"),
            ok: re(r"(?i)\b(successfully|started|created|healthy|done|built|running|up \d+)\b|🟢|✅"),
            pull: re(r"(?i)\b(downloading|pulling|fetching)\b|━━"),
            dim: re(r"^\s*[#│]|\[notice\]|whl\.metadata|eta 0:00:00"),
        }
    })
}

impl LogClass {
    /// Advisory styling class for a log line
    pub fn classify(text: &str) -> Self {
        let c = classifier();
        if c.build_layer.is_match(text) {
            return if c.done.is_match(text) {
                LogClass::Done
            } else if c.build_err.is_match(text) {
                LogClass::Err
            } else if c.build_pull.is_match(text) {
                LogClass::Pull
            } else {
                LogClass::Build
            };
        }
        if c.restart.is_match(text) || c.stopped.is_match(text) {
            LogClass::Restart
        } else if c.err.is_match(text) {
            LogClass::Err
        } else if c.warn.is_match(text) {
            LogClass::Warn
        } else if c.ok.is_match(text) {
            LogClass::Ok
        } else if c.pull.is_match(text) {
            LogClass::Pull
        } else if c.dim.is_match(text) {
            LogClass::Dim
        } else {
            LogClass::Plain
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub text: String,
    pub class: LogClass,
}

/// Bounded display buffer plus the running count of lines the server has
/// produced, used to reconcile pulled tails with pushed lines
#[derive(Debug)]
pub struct LogBuffer {
    lines: VecDeque<LogEntry>,
    capacity: usize,
    seen_total: u64,
    seen_ids: HashSet<String>,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(LOG_CAPACITY)),
            capacity,
            seen_total: 0,
            seen_ids: HashSet::new(),
        }
    }

    pub fn seen_total(&self) -> u64 {
        self.seen_total
    }

    /// Size of the next tail request
    pub fn next_request_size(&self) -> usize {
        if self.seen_total == 0 {
            INITIAL_TAIL
        } else {
            FOLLOW_TAIL
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> impl DoubleEndedIterator<Item = &LogEntry> + ExactSizeIterator {
        self.lines.iter()
    }

    fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.lines.push_back(LogEntry {
            text: text.to_string(),
            class: LogClass::classify(text),
        });
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
    }

    /// Pushed `log_line`: appended and counted. A line whose id was already
    /// shown is dropped without touching the counter. Returns false then.
    pub fn push_line(&mut self, line: &LogLine) -> bool {
        if let Some(id) = &line.id {
            if !self.seen_ids.insert(id.clone()) {
                return false;
            }
        }
        self.append(&line.text);
        self.seen_total += 1;
        true
    }

    /// Reconcile a pulled tail. Only the last `total - seen` lines of the
    /// batch are new; the counter then follows the server's total.
    /// Returns the number of lines appended.
    pub fn apply_tail(&mut self, tail: &LogTail) -> usize {
        let mut appended = 0;
        if tail.total > self.seen_total {
            let new_count = usize::try_from(tail.total - self.seen_total).unwrap_or(usize::MAX);
            let start = tail.lines.len().saturating_sub(new_count);
            for line in &tail.lines[start..] {
                self.append(line.text());
                appended += 1;
            }
        }
        self.seen_total = tail.total;
        appended
    }

    /// Replay `/api/history` logs, skipping ids already shown
    pub fn apply_history(&mut self, logs: &[LogLine]) {
        for line in logs {
            if let Some(id) = &line.id {
                if !self.seen_ids.insert(id.clone()) {
                    continue;
                }
            }
            self.append(&line.text);
        }
    }

    /// Joined text for the clipboard, clipped to the last [`COPY_LIMIT`] chars
    pub fn export(&self) -> String {
        let text = self
            .lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        clip_tail(&text, COPY_LIMIT)
    }
}

/// Keep the last `limit` characters of `text`
pub fn clip_tail(text: &str, limit: usize) -> String {
    let count = text.chars().count();
    if count <= limit {
        return text.to_string();
    }
    text.chars().skip(count - limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tail(total: u64, lines: &[&str]) -> LogTail {
        LogTail {
            total,
            lines: lines.iter().map(|l| TailLine::Text(l.to_string())).collect(),
        }
    }

    fn texts(buffer: &LogBuffer) -> Vec<String> {
        buffer.lines().map(|l| l.text.clone()).collect()
    }

    #[test]
    fn test_tail_appends_only_unseen_suffix() {
        let mut buffer = LogBuffer::new();
        assert_eq!(buffer.next_request_size(), 200);
        assert_eq!(buffer.apply_tail(&tail(3, &["a", "b", "c"])), 3);
        assert_eq!(buffer.next_request_size(), 50);

        assert_eq!(buffer.apply_tail(&tail(5, &["b", "c", "d", "e"])), 2);
        assert_eq!(texts(&buffer), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(buffer.seen_total(), 5);

        assert_eq!(buffer.apply_tail(&tail(5, &["d", "e"])), 0);
        assert_eq!(buffer.len(), 5);
    }

    #[test]
    fn test_tail_gap_bounded_by_batch() {
        let mut buffer = LogBuffer::new();
        buffer.apply_tail(&tail(2, &["a", "b"]));
        assert_eq!(buffer.apply_tail(&tail(100, &["x", "y"])), 2);
        assert_eq!(buffer.seen_total(), 100);
    }

    #[test]
    fn test_pushed_lines_count_towards_total() {
        let mut buffer = LogBuffer::new();
        buffer.apply_tail(&tail(2, &["a", "b"]));
        buffer.push_line(&LogLine {
            id: None,
            text: "c".to_string(),
        });
        assert_eq!(buffer.seen_total(), 3);
        assert_eq!(buffer.apply_tail(&tail(3, &["a", "b", "c"])), 0);
        assert_eq!(texts(&buffer), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut buffer = LogBuffer::new();
        for i in 0..805 {
            buffer.push_line(&LogLine {
                id: None,
                text: format!("line {}", i),
            });
        }
        assert_eq!(buffer.len(), LOG_CAPACITY);
        assert_eq!(buffer.seen_total(), 805);
        let all = texts(&buffer);
        assert_eq!(all.first().map(String::as_str), Some("line 5"));
        assert_eq!(all.last().map(String::as_str), Some("line 804"));
    }

    #[test]
    fn test_history_skips_seen_ids() {
        let mut buffer = LogBuffer::new();
        let logs: Vec<LogLine> =
            serde_json::from_str(r#"[{"id":"log-1","text":"one"},{"id":"log-2","text":"two"}]"#)
                .unwrap();
        buffer.apply_history(&logs);
        buffer.apply_history(&logs);
        assert_eq!(texts(&buffer), vec!["one", "two"]);
    }

    #[test]
    fn test_pushed_ids_dropped_on_repeat() {
        let mut buffer = LogBuffer::new();
        let line = LogLine {
            id: Some("log-7".to_string()),
            text: "Pulling traefik".to_string(),
        };
        assert!(buffer.push_line(&line));
        assert!(!buffer.push_line(&line));
        assert_eq!(buffer.seen_total(), 1);

        buffer.apply_history(&[line.clone()]);
        assert_eq!(texts(&buffer), vec!["Pulling traefik"]);

        // lines without an id are never deduplicated
        let anonymous = LogLine {
            id: None,
            text: "tick".to_string(),
        };
        buffer.push_line(&anonymous);
        buffer.push_line(&anonymous);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.seen_total(), 3);
    }

    #[test]
    fn test_tail_lines_accept_both_shapes() {
        let tail: LogTail =
            serde_json::from_str(r#"{"total":2,"lines":["plain",{"text":"wrapped"}]}"#).unwrap();
        let mut buffer = LogBuffer::new();
        buffer.apply_tail(&tail);
        assert_eq!(texts(&buffer), vec!["plain", "wrapped"]);
    }

    #[test]
    fn test_classify() {
        assert_eq!(LogClass::classify("#5 DONE 0.3s"), LogClass::Done);
        assert_eq!(LogClass::classify("#7 [2/5] RUN pip install"), LogClass::Pull);
        assert_eq!(LogClass::classify("#8 exporting layers"), LogClass::Build);
        assert_eq!(LogClass::classify("Error: port is already allocated"), LogClass::Err);
        assert_eq!(LogClass::classify("dockfra-web Restarting (1)"), LogClass::Restart);
        assert_eq!(LogClass::classify("DeprecationWarning: warning here"), LogClass::Warn);
        assert_eq!(LogClass::classify("Container started"), LogClass::Ok);
        assert_eq!(LogClass::classify("[notice] A new release of pip"), LogClass::Warn);
        assert_eq!(LogClass::classify("│ some table"), LogClass::Dim);
        assert_eq!(LogClass::classify("plain text"), LogClass::Plain);
    }

    #[test]
    fn test_export_clips_to_tail() {
        assert_eq!(clip_tail("abcdef", 3), "def");
        assert_eq!(clip_tail("ab", 3), "ab");
        let mut buffer = LogBuffer::new();
        buffer.push_line(&LogLine {
            id: None,
            text: "x".repeat(50_000),
        });
        assert_eq!(buffer.export().chars().count(), COPY_LIMIT);
    }
}
