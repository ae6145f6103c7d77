//! Ticket model, status actions and ticket-list parsing from bot text

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

/// Ticket lifecycle. `Done` is the storage alias of `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Review,
    Closed,
    Done,
    #[serde(other)]
    Unknown,
}

impl TicketStatus {
    /// Status for a list icon; missing or unknown icons mean open
    pub fn from_icon(icon: &str) -> Self {
        match icon {
            "◐" => TicketStatus::InProgress,
            "◑" => TicketStatus::Review,
            "●" => TicketStatus::Closed,
            _ => TicketStatus::Open,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            TicketStatus::Open | TicketStatus::Unknown => "○",
            TicketStatus::InProgress => "◐",
            TicketStatus::Review => "◑",
            TicketStatus::Closed | TicketStatus::Done => "●",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Review => "review",
            TicketStatus::Closed => "closed",
            TicketStatus::Done => "done",
            TicketStatus::Unknown => "unknown",
        }
    }

    pub fn display_name(&self) -> String {
        self.as_str().replace('_', " ")
    }

    pub fn is_open(&self) -> bool {
        matches!(self, TicketStatus::Open)
    }
}

pub fn priority_icon(priority: &str) -> &'static str {
    match priority {
        "critical" => "🔴",
        "high" => "🟠",
        "normal" => "🟡",
        "low" => "🟢",
        _ => "⚪",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TicketComment {
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl TicketComment {
    /// `YYYY-MM-DD HH:MM` from an ISO timestamp
    pub fn short_timestamp(&self) -> String {
        let ts = self.timestamp.as_deref().unwrap_or_default();
        ts.chars().take(16).collect::<String>().replace('T', " ")
    }
}

/// `/api/tickets` entry and `/api/tickets/{id}` body
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Ticket {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: TicketStatus,
    #[serde(default = "default_priority")]
    pub priority: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub github_issue_number: Option<u64>,
    #[serde(default)]
    pub github_repo: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub comments: Vec<TicketComment>,
}

fn default_priority() -> String {
    "normal".to_string()
}

/// Number of trailing comments shown in the ticket detail view
pub const DETAIL_COMMENTS: usize = 20;

impl Ticket {
    pub fn recent_comments(&self) -> &[TicketComment] {
        let start = self.comments.len().saturating_sub(DETAIL_COMMENTS);
        &self.comments[start..]
    }

    /// Description clipped for card display
    pub fn short_description(&self) -> Option<String> {
        let desc = self.description.as_deref().filter(|d| !d.is_empty())?;
        if desc.chars().count() > 80 {
            Some(format!("{}…", desc.chars().take(80).collect::<String>()))
        } else {
            Some(desc.to_string())
        }
    }

    pub fn github_url(&self) -> Option<String> {
        self.github_issue_number.map(|n| {
            format!(
                "https://github.com/{}/issues/{}",
                self.github_repo.as_deref().unwrap_or_default(),
                n
            )
        })
    }
}

/// A button on a ticket card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketButton {
    pub label: &'static str,
    pub value: String,
    /// The diff button carries the diff-count badge
    pub is_diff: bool,
}

impl TicketButton {
    fn new(label: &'static str, value: String) -> Self {
        Self {
            label,
            value,
            is_diff: false,
        }
    }

    fn diff(id: &str) -> Self {
        Self {
            label: "📄 Diff",
            value: format!("show_diff::{}", id),
            is_diff: true,
        }
    }
}

/// Buttons offered for a ticket in the given status
pub fn actions_for(status: TicketStatus, id: &str) -> Vec<TicketButton> {
    let work = || TicketButton::new("▶ Pracuj", format!("ssh_cmd::developer::ticket-work::{}", id));
    let details = || TicketButton::new("👁️", format!("show_ticket::{}", id));
    match status {
        TicketStatus::Open => vec![work(), details()],
        TicketStatus::InProgress => vec![
            work(),
            TicketButton::new("🤖", format!("ssh_cmd::developer::implement::{}", id)),
            TicketButton::diff(id),
            details(),
        ],
        TicketStatus::Review => vec![
            TicketButton::new("✅ Approve", format!("manager_approve::{}", id)),
            TicketButton::new("🔄 Reject", format!("manager_reject::{}", id)),
            TicketButton::diff(id),
            details(),
        ],
        TicketStatus::Closed | TicketStatus::Done | TicketStatus::Unknown => vec![
            details(),
            TicketButton::diff(id),
            TicketButton::new(
                "🔄 Reopen",
                format!("ssh_cmd::developer::ticket-work::{}", id),
            ),
        ],
    }
}

/// Stats-panel buttons: the status set plus push-to-GitHub when unlinked
pub fn stats_actions(ticket: &Ticket) -> Vec<TicketButton> {
    let mut buttons = actions_for(ticket.status, &ticket.id);
    if ticket.github_issue_number.is_none() {
        buttons.push(TicketButton::new(
            "🔗",
            format!("ticket_push_github::{}", ticket.id),
        ));
    }
    buttons
}

// ============================================================================
// Ticket list parsing
// ============================================================================

/// Which textual ticket-list format matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketGrammar {
    /// `○ T-0001   🟡 Title → developer`
    Current,
    /// `○ T-1 — Title` or dash separated
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTicket {
    pub icon: String,
    pub id: String,
    pub title: String,
}

impl ParsedTicket {
    pub fn status(&self) -> TicketStatus {
        TicketStatus::from_icon(&self.icon)
    }
}

fn current_grammar() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)([○◐◑●])\s+(T-\d{4,})\s+[🔴🟠🟡🟢⚪]?\s*(.+?)\s*(?:→\s*\w+)?$")
            .expect("valid ticket regex")
    })
}

fn legacy_grammar() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([○◐●]?)\s*(T-\d+)\s*[—\-]+\s*(.+)").expect("valid legacy ticket regex")
    })
}

fn trailing_assignee() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"→\s*\S+$").expect("valid assignee regex"))
}

fn parse_current(text: &str) -> Vec<ParsedTicket> {
    current_grammar()
        .captures_iter(text)
        .filter_map(|caps| {
            let title = trailing_assignee().replace(&caps[3], "").trim().to_string();
            (!title.is_empty()).then(|| ParsedTicket {
                icon: caps[1].to_string(),
                id: caps[2].to_string(),
                title,
            })
        })
        .collect()
}

fn parse_legacy(text: &str) -> Vec<ParsedTicket> {
    legacy_grammar()
        .captures_iter(text)
        .map(|caps| {
            let icon = match &caps[1] {
                "" => "○",
                icon => icon,
            };
            ParsedTicket {
                icon: icon.to_string(),
                id: caps[2].to_string(),
                title: caps[3].trim().to_string(),
            }
        })
        .collect()
}

/// Find ticket rows in bot text. `Legacy` is only tried when `Current`
/// yields nothing; `None` means the text holds no tickets.
pub fn parse_ticket_list(text: &str) -> Option<(TicketGrammar, Vec<ParsedTicket>)> {
    let current = parse_current(text);
    if !current.is_empty() {
        return Some((TicketGrammar::Current, current));
    }
    let legacy = parse_legacy(text);
    if !legacy.is_empty() {
        return Some((TicketGrammar::Legacy, legacy));
    }
    None
}

// ============================================================================
// Cards
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffBadge {
    /// Count not known (yet, or the fetch failed)
    Pending,
    Count(usize),
}

impl DiffBadge {
    pub fn label(&self) -> String {
        match self {
            DiffBadge::Pending => "📄 Diff".to_string(),
            DiffBadge::Count(n) => format!("📄 {}", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketCard {
    pub ticket: ParsedTicket,
    pub status: TicketStatus,
    pub buttons: Vec<TicketButton>,
    pub diff_badge: DiffBadge,
}

impl TicketCard {
    pub fn new(ticket: ParsedTicket) -> Self {
        let status = ticket.status();
        Self {
            buttons: actions_for(status, &ticket.id),
            status,
            ticket,
            diff_badge: DiffBadge::Pending,
        }
    }
}

/// Cards rendered below one bot message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketCardSet {
    pub message_index: usize,
    pub cards: Vec<TicketCard>,
}

impl TicketCardSet {
    pub fn from_text(message_index: usize, text: &str) -> Option<Self> {
        let (_, tickets) = parse_ticket_list(text)?;
        Some(Self {
            message_index,
            cards: tickets.into_iter().map(TicketCard::new).collect(),
        })
    }

    /// Ticket ids whose diff count should be fetched (non-open only)
    pub fn badge_requests(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for card in &self.cards {
            if !card.status.is_open() && !ids.contains(&card.ticket.id) {
                ids.push(card.ticket.id.clone());
            }
        }
        ids
    }

    /// Patch a fetched diff count into every card for `id`; a failed fetch
    /// (`None`) leaves the pending badge
    pub fn apply_diff_count(&mut self, id: &str, count: Option<usize>) {
        let Some(count) = count else {
            return;
        };
        for card in self.cards.iter_mut().filter(|c| c.ticket.id == id) {
            card.diff_badge = DiffBadge::Count(count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TicketStatus; 6] = [
        TicketStatus::Open,
        TicketStatus::InProgress,
        TicketStatus::Review,
        TicketStatus::Closed,
        TicketStatus::Done,
        TicketStatus::Unknown,
    ];

    fn values(status: TicketStatus) -> Vec<String> {
        actions_for(status, "T-0001")
            .into_iter()
            .map(|b| b.value)
            .collect()
    }

    #[test]
    fn test_status_action_sets() {
        assert_eq!(
            values(TicketStatus::Open),
            vec![
                "ssh_cmd::developer::ticket-work::T-0001",
                "show_ticket::T-0001"
            ]
        );
        assert_eq!(
            values(TicketStatus::InProgress),
            vec![
                "ssh_cmd::developer::ticket-work::T-0001",
                "ssh_cmd::developer::implement::T-0001",
                "show_diff::T-0001",
                "show_ticket::T-0001"
            ]
        );
        assert_eq!(
            values(TicketStatus::Review),
            vec![
                "manager_approve::T-0001",
                "manager_reject::T-0001",
                "show_diff::T-0001",
                "show_ticket::T-0001"
            ]
        );
        assert_eq!(values(TicketStatus::Closed), values(TicketStatus::Done));
    }

    #[test]
    fn test_every_status_has_distinct_actions() {
        for status in ALL {
            let vals = values(status);
            assert!(!vals.is_empty());
            let mut dedup = vals.clone();
            dedup.sort();
            dedup.dedup();
            assert_eq!(dedup.len(), vals.len(), "{:?}", status);
        }
        assert!(!values(TicketStatus::Open).iter().any(|v| v.starts_with("manager_")));
        assert!(!values(TicketStatus::Review).iter().any(|v| v.contains("ticket-work")));
    }

    #[test]
    fn test_stats_actions_offer_github_push() {
        let mut ticket = Ticket {
            id: "T-0002".to_string(),
            status: TicketStatus::Review,
            ..Default::default()
        };
        assert_eq!(
            stats_actions(&ticket).last().map(|b| b.value.as_str()),
            Some("ticket_push_github::T-0002")
        );
        ticket.github_issue_number = Some(12);
        assert!(!stats_actions(&ticket)
            .iter()
            .any(|b| b.value.starts_with("ticket_push_github")));
    }

    #[test]
    fn test_parse_current_format() {
        let text = "Tickety:\n  ○ T-0001   🟡 Fix login → developer\n  ◑ T-0002   🔴 Add metrics\n";
        let (grammar, tickets) = parse_ticket_list(text).unwrap();
        assert_eq!(grammar, TicketGrammar::Current);
        assert_eq!(tickets.len(), 2);
        assert_eq!(tickets[0].id, "T-0001");
        assert_eq!(tickets[0].title, "Fix login");
        assert_eq!(tickets[1].status(), TicketStatus::Review);
        assert_eq!(tickets[1].title, "Add metrics");
    }

    #[test]
    fn test_parse_legacy_only_when_current_is_empty() {
        let (grammar, tickets) = parse_ticket_list("T-12 — Old style ticket").unwrap();
        assert_eq!(grammar, TicketGrammar::Legacy);
        assert_eq!(tickets[0].icon, "○");
        assert_eq!(tickets[0].status(), TicketStatus::Open);
        assert_eq!(tickets[0].title, "Old style ticket");

        let (grammar, _) = parse_ticket_list("● T-0003   Done thing\nT-9 - other").unwrap();
        assert_eq!(grammar, TicketGrammar::Current);
    }

    #[test]
    fn test_parse_no_match() {
        assert!(parse_ticket_list("Wszystkie kontenery działają").is_none());
    }

    #[test]
    fn test_status_from_json() {
        let ticket: Ticket = serde_json::from_str(
            r#"{"id":"T-0004","title":"x","status":"in_progress","comments":[{"author":"dev","text":"hi","timestamp":"2024-05-01T10:20:30"}]}"#,
        )
        .unwrap();
        assert_eq!(ticket.status, TicketStatus::InProgress);
        assert_eq!(ticket.priority, "normal");
        assert_eq!(ticket.comments[0].short_timestamp(), "2024-05-01 10:20");

        let odd: Ticket = serde_json::from_str(r#"{"id":"T-5","status":"blocked"}"#).unwrap();
        assert_eq!(odd.status, TicketStatus::Unknown);
    }

    #[test]
    fn test_recent_comments_keeps_last_twenty() {
        let ticket = Ticket {
            comments: (0..25)
                .map(|i| TicketComment {
                    author: None,
                    text: i.to_string(),
                    timestamp: None,
                })
                .collect(),
            ..Default::default()
        };
        let recent = ticket.recent_comments();
        assert_eq!(recent.len(), 20);
        assert_eq!(recent[0].text, "5");
    }

    #[test]
    fn test_card_badges() {
        let mut set = TicketCardSet::from_text(
            3,
            "○ T-0001   🟡 New\n◐ T-0002   🟠 Busy\n● T-0003   ⚪ Finished",
        )
        .unwrap();
        assert_eq!(set.badge_requests(), vec!["T-0002", "T-0003"]);
        assert!(set.cards.iter().all(|c| c.diff_badge == DiffBadge::Pending));

        set.apply_diff_count("T-0002", Some(3));
        set.apply_diff_count("T-0003", None);
        assert_eq!(set.cards[1].diff_badge.label(), "📄 3");
        assert_eq!(set.cards[2].diff_badge, DiffBadge::Pending);
    }
}
