//! Typed user intents and the `action` wire message
//!
//! The wizard server speaks in `tag::arg::arg` strings. [`Action`] gives those
//! strings a closed shape on the client side; anything the client does not
//! interpret is carried through as [`Action::Raw`].

use serde::Serialize;
use std::collections::BTreeMap;

/// Form snapshot sent with every action (field name -> value)
pub type FormSnapshot = BTreeMap<String, String>;

/// Outbound `action` event payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundAction {
    pub value: String,
    pub form: FormSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Open the ticket detail view (client-side, never sent)
    ShowTicket(String),
    /// Open the ticket diff view regardless of emptiness (client-side)
    ShowDiff(String),
    /// Run a developer script inside an SSH role container
    SshCmd {
        role: String,
        command: String,
        /// Kept as given, `Some("")` included, so the value round-trips
        arg: Option<String>,
    },
    ManagerApprove(String),
    ManagerReject(String),
    TicketPushGithub(String),
    FixContainer(String),
    ContainerLogs(String),
    /// Create a ticket straight from the chat input
    TicketCreate { title: String },
    /// Any other server action value or free text
    Raw(String),
}

impl Action {
    pub fn parse(value: &str) -> Self {
        let Some((tag, rest)) = value.split_once("::") else {
            return Action::Raw(value.to_string());
        };
        match tag {
            "show_ticket" => Action::ShowTicket(rest.to_string()),
            "show_diff" => Action::ShowDiff(rest.to_string()),
            "manager_approve" => Action::ManagerApprove(rest.to_string()),
            "manager_reject" => Action::ManagerReject(rest.to_string()),
            "ticket_push_github" => Action::TicketPushGithub(rest.to_string()),
            "fix_container" => Action::FixContainer(rest.to_string()),
            "logs" => Action::ContainerLogs(rest.to_string()),
            "ssh_cmd" => {
                let mut parts = rest.splitn(3, "::");
                match (parts.next(), parts.next()) {
                    (Some(role), Some(command)) => Action::SshCmd {
                        role: role.to_string(),
                        command: command.to_string(),
                        arg: parts.next().map(str::to_string),
                    },
                    _ => Action::Raw(value.to_string()),
                }
            }
            _ => Action::Raw(value.to_string()),
        }
    }

    /// Wire value understood by the server
    pub fn to_value(&self) -> String {
        match self {
            Action::ShowTicket(id) => format!("show_ticket::{}", id),
            Action::ShowDiff(id) => format!("show_diff::{}", id),
            Action::SshCmd { role, command, arg } => match arg {
                Some(arg) => format!("ssh_cmd::{}::{}::{}", role, command, arg),
                None => format!("ssh_cmd::{}::{}", role, command),
            },
            Action::ManagerApprove(id) => format!("manager_approve::{}", id),
            Action::ManagerReject(id) => format!("manager_reject::{}", id),
            Action::TicketPushGithub(id) => format!("ticket_push_github::{}", id),
            Action::FixContainer(name) => format!("fix_container::{}", name),
            Action::ContainerLogs(name) => format!("logs::{}", name),
            Action::TicketCreate { .. } => "ticket_create_do".to_string(),
            Action::Raw(value) => value.clone(),
        }
    }

    /// Fields an action contributes on top of the live form snapshot
    pub fn extra_form(&self) -> FormSnapshot {
        let mut form = FormSnapshot::new();
        if let Action::TicketCreate { title } = self {
            form.insert("ticket_title".to_string(), title.clone());
            form.insert("ticket_priority".to_string(), "normal".to_string());
            form.insert("ticket_assigned".to_string(), "developer".to_string());
        }
        form
    }

    /// Default chat echo: the value with its leading `tag::` stripped. The
    /// tag must be non-empty and free of `:`.
    pub fn echo_label(&self) -> String {
        if let Action::TicketCreate { title } = self {
            return format!("📝 Nowy ticket: {}", title);
        }
        let value = self.to_value();
        match value.split_once("::") {
            Some((tag, rest)) if !tag.is_empty() && !tag.contains(':') => rest.to_string(),
            _ => value,
        }
    }
}

/// Interpret text typed into the chat input bar.
///
/// `nowy ticket <title>` (and its English/short variants) creates a ticket
/// directly; everything else goes to the server as free text.
pub fn parse_chat_input(text: &str) -> Option<Action> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    for prefix in ["nowy ticket", "create ticket", "dodaj ticket", "ticket"] {
        let head_matches = text
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
        if !head_matches {
            continue;
        }
        if let Some(rest) = text.get(prefix.len()..) {
            if rest.starts_with(char::is_whitespace) && !rest.trim().is_empty() {
                return Some(Action::TicketCreate {
                    title: rest.trim().to_string(),
                });
            }
        }
    }
    Some(Action::Raw(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_tags() {
        assert_eq!(
            Action::parse("show_diff::T-0001"),
            Action::ShowDiff("T-0001".to_string())
        );
        assert_eq!(
            Action::parse("ssh_cmd::developer::ticket-work::T-0002"),
            Action::SshCmd {
                role: "developer".to_string(),
                command: "ticket-work".to_string(),
                arg: Some("T-0002".to_string()),
            }
        );
        assert_eq!(
            Action::parse("launch_all"),
            Action::Raw("launch_all".to_string())
        );
        assert_eq!(
            Action::parse("ai_analyze::dockfra-traefik"),
            Action::Raw("ai_analyze::dockfra-traefik".to_string())
        );
    }

    #[test]
    fn test_value_survives_parse() {
        for value in [
            "manager_approve::T-0007",
            "ssh_cmd::developer::implement::T-0001",
            "ssh_cmd::monitor::status",
            "ssh_cmd::developer::ticket-work::",
            "ssh_cmd::developer::run::a::b",
            "show_diff::",
            "logs::dockfra-ssh-developer",
            "settings",
        ] {
            assert_eq!(Action::parse(value).to_value(), value);
        }
    }

    #[test]
    fn test_echo_label_strips_tag() {
        assert_eq!(Action::parse("fix_container::web").echo_label(), "web");
        assert_eq!(
            Action::parse("ssh_cmd::developer::ticket-work::T-1").echo_label(),
            "developer::ticket-work::T-1"
        );
        assert_eq!(Action::parse("settings").echo_label(), "settings");
        assert_eq!(Action::parse("a:b::c").echo_label(), "a:b::c");
        assert_eq!(Action::parse("::x").echo_label(), "::x");
        assert_eq!(Action::parse("a:::b").echo_label(), ":b");
    }

    #[test]
    fn test_chat_input_ticket_shortcut() {
        let action = parse_chat_input("nowy ticket Fix login page").unwrap();
        assert_eq!(
            action,
            Action::TicketCreate {
                title: "Fix login page".to_string()
            }
        );
        assert_eq!(action.to_value(), "ticket_create_do");
        let form = action.extra_form();
        assert_eq!(form["ticket_title"], "Fix login page");
        assert_eq!(form["ticket_priority"], "normal");
        assert_eq!(form["ticket_assigned"], "developer");
        assert_eq!(action.echo_label(), "📝 Nowy ticket: Fix login page");

        assert!(matches!(
            parse_chat_input("Create Ticket add metrics"),
            Some(Action::TicketCreate { .. })
        ));
    }

    #[test]
    fn test_chat_input_free_text() {
        assert_eq!(
            parse_chat_input("  why is traefik down? "),
            Some(Action::Raw("why is traefik down?".to_string()))
        );
        assert_eq!(parse_chat_input("tickets"), Some(Action::Raw("tickets".to_string())));
        assert_eq!(parse_chat_input("   "), None);
    }
}
