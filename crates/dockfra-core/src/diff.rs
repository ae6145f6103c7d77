//! Ticket diff view: open-or-notify decision, tabbed modal and notices

use serde::Deserialize;
use std::time::{Duration, Instant};

use crate::ticket::Ticket;

/// How long a "no changes" notice stays visible
pub const NOTICE_TTL: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Commit {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub repo: String,
}

/// `/api/ticket-diff/{id}` body
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct TicketDiff {
    #[serde(default)]
    pub ok: Option<bool>,
    #[serde(default)]
    pub diff: String,
    #[serde(default)]
    pub commits: Vec<Commit>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TicketDiff {
    pub fn has_diff(&self) -> bool {
        !self.diff.trim().is_empty()
    }

    pub fn has_commits(&self) -> bool {
        !self.commits.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffLineKind {
    File,
    Hunk,
    Added,
    Removed,
    Meta,
    Context,
}

impl DiffLineKind {
    pub fn classify(line: &str) -> Self {
        if line.starts_with("+++") || line.starts_with("---") {
            DiffLineKind::File
        } else if line.starts_with("@@") {
            DiffLineKind::Hunk
        } else if line.starts_with('+') {
            DiffLineKind::Added
        } else if line.starts_with('-') {
            DiffLineKind::Removed
        } else if line.starts_with("commit ")
            || line.starts_with("Author:")
            || line.starts_with("Date:")
        {
            DiffLineKind::Meta
        } else {
            DiffLineKind::Context
        }
    }
}

pub fn classify_diff(diff: &str) -> Vec<(DiffLineKind, &str)> {
    diff.lines()
        .map(|line| (DiffLineKind::classify(line), line))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiffTab {
    #[default]
    Diff,
    Commits,
    Ticket,
}

impl DiffTab {
    pub fn all() -> [DiffTab; 3] {
        [DiffTab::Diff, DiffTab::Commits, DiffTab::Ticket]
    }

    pub fn title(&self) -> &'static str {
        match self {
            DiffTab::Diff => "Diff",
            DiffTab::Commits => "Commity",
            DiffTab::Ticket => "Ticket",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            DiffTab::Diff => DiffTab::Commits,
            DiffTab::Commits => DiffTab::Ticket,
            DiffTab::Ticket => DiffTab::Diff,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            DiffTab::Diff => DiffTab::Ticket,
            DiffTab::Commits => DiffTab::Diff,
            DiffTab::Ticket => DiffTab::Commits,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffModal {
    pub ticket_id: String,
    pub data: TicketDiff,
    pub tab: DiffTab,
    /// Filled by the independent `/api/tickets/{id}` fetch
    pub detail: Option<Ticket>,
    pub scroll: u16,
}

impl DiffModal {
    pub fn next_tab(&mut self) {
        self.tab = self.tab.next();
        self.scroll = 0;
    }

    pub fn previous_tab(&mut self) {
        self.tab = self.tab.previous();
        self.scroll = 0;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines);
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
    }
}

/// Dismissible inline notice shown instead of an empty diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub ticket_id: String,
    pub title: String,
    pub expires_at: Instant,
}

impl Notice {
    pub fn new(ticket_id: &str, title: impl Into<String>, now: Instant) -> Self {
        Self {
            ticket_id: ticket_id.to_string(),
            title: title.into(),
            expires_at: now + NOTICE_TTL,
        }
    }

    pub fn hint(&self) -> String {
        format!(
            "Brak zmian w kodzie, commity muszą zawierać ID ticketu (np. feat({}): ...)",
            self.ticket_id
        )
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// What to show once the diff pre-flight fetch has answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
    Notice(Notice),
    Modal(DiffModal),
}

/// Decide between the notice and the modal.
///
/// Fetch failures always become a notice carrying the error in place of the
/// ticket title, even when the modal was forced.
pub fn resolve(
    ticket_id: &str,
    force_modal: bool,
    fetched: Result<TicketDiff, String>,
    now: Instant,
) -> DiffOutcome {
    let data = match fetched {
        Ok(data) => data,
        Err(e) => {
            return DiffOutcome::Notice(Notice::new(ticket_id, format!("❌ Błąd: {}", e), now))
        }
    };
    if !data.has_diff() && !data.has_commits() && !force_modal {
        let title = data.title.clone().unwrap_or_default();
        return DiffOutcome::Notice(Notice::new(ticket_id, title, now));
    }
    DiffOutcome::Modal(DiffModal {
        ticket_id: ticket_id.to_string(),
        data,
        tab: DiffTab::Diff,
        detail: None,
        scroll: 0,
    })
}

/// Owns the modal and the notice list on behalf of the session
#[derive(Debug, Default)]
pub struct DiffView {
    modal: Option<DiffModal>,
    notices: Vec<Notice>,
}

impl DiffView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modal(&self) -> Option<&DiffModal> {
        self.modal.as_ref()
    }

    pub fn modal_mut(&mut self) -> Option<&mut DiffModal> {
        self.modal.as_mut()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Apply a pre-flight result. Returns true when the modal opened, in
    /// which case the caller should fetch the ticket detail.
    pub fn apply(&mut self, outcome: DiffOutcome) -> bool {
        match outcome {
            DiffOutcome::Notice(notice) => {
                self.notices.push(notice);
                false
            }
            DiffOutcome::Modal(modal) => {
                self.modal = Some(modal);
                true
            }
        }
    }

    /// Attach ticket detail if the modal for `ticket_id` is still open.
    /// A failed detail fetch leaves the tab empty.
    pub fn apply_detail(&mut self, ticket_id: &str, detail: Option<Ticket>) {
        if let Some(modal) = self.modal.as_mut().filter(|m| m.ticket_id == ticket_id) {
            modal.detail = detail;
        }
    }

    pub fn close(&mut self) {
        self.modal = None;
    }

    pub fn dismiss_notice(&mut self, index: usize) {
        if index < self.notices.len() {
            self.notices.remove(index);
        }
    }

    pub fn expire_notices(&mut self, now: Instant) {
        self.notices.retain(|n| !n.is_expired(now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> TicketDiff {
        TicketDiff {
            title: Some("Login".to_string()),
            diff: "  \n".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_diff_becomes_notice() {
        let now = Instant::now();
        let outcome = resolve("T-0001", false, Ok(empty()), now);
        let DiffOutcome::Notice(notice) = outcome else {
            panic!("expected notice");
        };
        assert_eq!(notice.title, "Login");
        assert!(notice.hint().contains("feat(T-0001)"));
        assert!(!notice.is_expired(now + Duration::from_secs(7)));
        assert!(notice.is_expired(now + NOTICE_TTL));
    }

    #[test]
    fn test_forced_empty_diff_opens_modal() {
        let outcome = resolve("T-0001", true, Ok(empty()), Instant::now());
        let DiffOutcome::Modal(modal) = outcome else {
            panic!("expected modal");
        };
        assert_eq!(modal.tab, DiffTab::Diff);
        assert!(!modal.data.has_diff());
        assert!(!modal.data.has_commits());
    }

    #[test]
    fn test_commits_alone_open_modal() {
        let data = TicketDiff {
            commits: vec![Commit {
                hash: "abc1234".to_string(),
                subject: "feat(T-0001): login".to_string(),
                repo: "app".to_string(),
            }],
            ..empty()
        };
        assert!(matches!(
            resolve("T-0001", false, Ok(data), Instant::now()),
            DiffOutcome::Modal(_)
        ));
    }

    #[test]
    fn test_fetch_error_is_notice_even_when_forced() {
        let outcome = resolve("T-0009", true, Err("connection refused".to_string()), Instant::now());
        let DiffOutcome::Notice(notice) = outcome else {
            panic!("expected notice");
        };
        assert_eq!(notice.title, "❌ Błąd: connection refused");
    }

    #[test]
    fn test_classify_lines() {
        let diff = "commit abc\nAuthor: dev\nDate: today\n--- a/x\n+++ b/x\n@@ -1 +1 @@\n-old\n+new\n same";
        let kinds: Vec<DiffLineKind> = classify_diff(diff).into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            kinds,
            vec![
                DiffLineKind::Meta,
                DiffLineKind::Meta,
                DiffLineKind::Meta,
                DiffLineKind::File,
                DiffLineKind::File,
                DiffLineKind::Hunk,
                DiffLineKind::Removed,
                DiffLineKind::Added,
                DiffLineKind::Context,
            ]
        );
    }

    #[test]
    fn test_view_detail_and_expiry() {
        let now = Instant::now();
        let mut view = DiffView::new();
        assert!(!view.apply(resolve("T-1", false, Ok(empty()), now)));
        assert_eq!(view.notices().len(), 1);
        view.expire_notices(now + Duration::from_secs(9));
        assert!(view.notices().is_empty());

        assert!(view.apply(resolve("T-2", true, Ok(empty()), now)));
        view.apply_detail("T-3", Some(Ticket::default()));
        assert!(view.modal().unwrap().detail.is_none());
        view.apply_detail("T-2", Some(Ticket::default()));
        assert!(view.modal().unwrap().detail.is_some());

        view.modal_mut().unwrap().next_tab();
        assert_eq!(view.modal().unwrap().tab, DiffTab::Commits);
        view.close();
        assert!(view.modal().is_none());
    }
}
