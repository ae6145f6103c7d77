//! Side panels: processes, services, stats, and the column layout

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::widget::ProgressWidget;

/// Data loaded by a poller. A failed load shows an inline error in place of
/// the panel content until the next successful poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelData<T> {
    Loading,
    Ready(T),
    Failed(String),
}

impl<T> Default for PanelData<T> {
    fn default() -> Self {
        PanelData::Loading
    }
}

impl<T> PanelData<T> {
    pub fn from_result<E: std::fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => PanelData::Ready(data),
            Err(e) => PanelData::Failed(e.to_string()),
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            PanelData::Ready(data) => Some(data),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanelTab {
    #[default]
    Processes,
    Services,
    Stats,
}

impl PanelTab {
    pub fn all() -> [PanelTab; 3] {
        [PanelTab::Processes, PanelTab::Services, PanelTab::Stats]
    }

    pub fn title(&self) -> &'static str {
        match self {
            PanelTab::Processes => "Procesy",
            PanelTab::Services => "Serwisy",
            PanelTab::Stats => "Statystyki",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            PanelTab::Processes => PanelTab::Services,
            PanelTab::Services => PanelTab::Stats,
            PanelTab::Stats => PanelTab::Processes,
        }
    }
}

// ============================================================================
// Processes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Running,
    Stopped,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ProcessStatus {
    pub fn export_label(&self) -> &'static str {
        match self {
            ProcessStatus::Running => "🟢 Running",
            ProcessStatus::Stopped => "🔴 Stopped",
            ProcessStatus::Unknown => "⚪ Unknown",
        }
    }
}

/// `/api/processes` entry
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ProcessEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: ProcessStatus,
    #[serde(default)]
    pub details: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub ports: Option<String>,
}

impl ProcessEntry {
    /// Only containers get stop/restart/port actions
    pub fn is_container(&self) -> bool {
        self.kind.as_deref() == Some("container")
    }

    /// Server action offered for a stopped container
    pub fn fix_action(&self) -> Option<String> {
        (self.status == ProcessStatus::Stopped).then(|| format!("fix_container::{}", self.name))
    }
}

/// `POST /api/process/{action}/{name}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessAction {
    Stop,
    Restart,
    ChangePort(String),
}

impl ProcessAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessAction::Stop => "stop",
            ProcessAction::Restart => "restart",
            ProcessAction::ChangePort(_) => "change_port",
        }
    }

    pub fn body(&self) -> serde_json::Value {
        match self {
            ProcessAction::ChangePort(port) => serde_json::json!({ "port": port }),
            _ => serde_json::json!({}),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ProcessActionResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressState {
    Running,
    Done,
    Failed,
}

impl ProgressState {
    pub fn icon(&self) -> &'static str {
        match self {
            ProgressState::Running => "⏳",
            ProgressState::Done => "✅",
            ProgressState::Failed => "❌",
        }
    }
}

/// A row created by a `progress` widget, keyed by its label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRow {
    pub key: String,
    pub label: String,
    pub state: ProgressState,
}

pub fn progress_key(label: &str) -> String {
    let sanitized: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("proc-{}", sanitized)
}

#[derive(Debug, Default)]
pub struct ProcessPanel {
    pub entries: PanelData<Vec<ProcessEntry>>,
    progress: Vec<ProgressRow>,
}

impl ProcessPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self) -> &[ProgressRow] {
        &self.progress
    }

    /// Insert or update the row for a progress widget
    pub fn upsert_progress(&mut self, widget: &ProgressWidget) {
        let key = progress_key(&widget.label);
        let state = if widget.done {
            ProgressState::Done
        } else if widget.error {
            ProgressState::Failed
        } else {
            ProgressState::Running
        };
        match self.progress.iter_mut().find(|row| row.key == key) {
            Some(row) => {
                row.label = widget.label.clone();
                row.state = state;
            }
            None => self.progress.push(ProgressRow {
                key,
                label: widget.label.clone(),
                state,
            }),
        }
    }

    /// `status | name | details` lines for the clipboard
    pub fn export(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        if let Some(entries) = self.entries.ready() {
            lines.extend(entries.iter().map(|p| {
                format!("{} | {} | {}", p.status.export_label(), p.name, p.details)
            }));
        }
        lines.extend(self.progress.iter().map(|row| {
            let status = match row.state {
                ProgressState::Done => ProcessStatus::Running,
                ProgressState::Failed => ProcessStatus::Stopped,
                ProgressState::Running => ProcessStatus::Unknown,
            };
            format!(
                "{} | {} {} | ",
                status.export_label(),
                row.state.icon(),
                row.label
            )
        }));
        lines.join("\n")
    }
}

// ============================================================================
// Services
// ============================================================================

/// `/api/containers` entry
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ContainerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub ports: String,
}

const MANAGEMENT_NAMES: [&str; 5] = ["manager", "monitor", "autopilot", "desktop", "wizard"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEntry {
    pub name: String,
    pub display_name: String,
    pub up: bool,
    pub ports: String,
}

impl ServiceEntry {
    pub fn logs_action(&self) -> String {
        format!("logs::{}", self.name)
    }

    pub fn fix_action(&self) -> Option<String> {
        (!self.up).then(|| format!("fix_container::{}", self.name))
    }
}

/// App-stack containers only, with cleaned names and ports
pub fn services_from(containers: &[ContainerInfo]) -> Vec<ServiceEntry> {
    containers
        .iter()
        .filter(|c| {
            let name = c.name.to_lowercase();
            !MANAGEMENT_NAMES.iter().any(|m| name.contains(m))
        })
        .map(|c| {
            let ports = c.ports.replace("0.0.0.0:", "").replace(":::", "");
            ServiceEntry {
                display_name: c
                    .name
                    .strip_prefix("dockfra-")
                    .unwrap_or(&c.name)
                    .to_string(),
                up: c.status.contains("Up") || c.status.contains("healthy"),
                ports: ports.chars().take(20).collect(),
                name: c.name.clone(),
            }
        })
        .collect()
}

// ============================================================================
// Stats
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct GitStats {
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub commits_today: u64,
    #[serde(default)]
    pub last_commit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ContainerStats {
    #[serde(default)]
    pub running: u64,
    #[serde(default)]
    pub failing: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Suggestion {
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub action: String,
}

/// `/api/stats` body
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub git: GitStats,
    #[serde(default)]
    pub containers: ContainerStats,
    #[serde(default)]
    pub integrations: BTreeMap<String, bool>,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
}

impl Stats {
    pub fn active_integrations(&self) -> Vec<&str> {
        self.integrations
            .iter()
            .filter(|(_, ok)| **ok)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct DevEngines {
    #[serde(default)]
    pub built_in: bool,
    #[serde(default)]
    pub aider: bool,
    #[serde(default)]
    pub claude_code: bool,
}

/// `/api/developer-health` body
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct DeveloperHealth {
    #[serde(default)]
    pub container: String,
    #[serde(default)]
    pub ssh: String,
    #[serde(default)]
    pub git: Option<String>,
    #[serde(default)]
    pub scripts: u64,
    #[serde(default)]
    pub engines: DevEngines,
}

impl DeveloperHealth {
    /// `(ok, label)` badges in display order
    pub fn badges(&self) -> Vec<(bool, String)> {
        let mut badges = vec![
            (self.container == "running", "kontener".to_string()),
            (self.ssh == "ok", "exec".to_string()),
            (true, format!("git: {}", self.git.as_deref().unwrap_or("?"))),
            (true, format!("{} skryptów", self.scripts)),
        ];
        for (on, name) in [
            (self.engines.built_in, "built-in"),
            (self.engines.aider, "aider"),
            (self.engines.claude_code, "claude"),
        ] {
            if on {
                badges.push((true, name.to_string()));
            }
        }
        badges
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// `/api/engine-status` body
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct EngineStatus {
    #[serde(default)]
    pub engines: Vec<EngineInfo>,
    #[serde(default)]
    pub preferred: Option<String>,
}

impl EngineStatus {
    pub fn is_preferred(&self, engine: &EngineInfo) -> bool {
        self.preferred.as_deref() == Some(engine.id.as_str())
    }
}

/// Everything the stats tab shows; the sections load independently
#[derive(Debug, Default)]
pub struct StatsPanel {
    pub stats: PanelData<Stats>,
    pub tickets: PanelData<Vec<crate::ticket::Ticket>>,
    pub developer: PanelData<DeveloperHealth>,
    pub engines: PanelData<EngineStatus>,
    /// Diff counts for non-open tickets, keyed by ticket id
    pub diff_counts: BTreeMap<String, usize>,
}

impl StatsPanel {
    /// Ticket ids whose diff count the tab should fetch
    pub fn badge_requests(&self) -> Vec<String> {
        self.tickets
            .ready()
            .map(|tickets| {
                tickets
                    .iter()
                    .filter(|t| !t.status.is_open())
                    .map(|t| t.id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ============================================================================
// Layout
// ============================================================================

/// Narrowest a column may be dragged to
pub const MIN_PANEL_WIDTH: u16 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Divider {
    /// Between chat and processes
    ChatProcesses,
    /// Between processes and logs
    ProcessesLogs,
}

/// Widths of the chat, processes and log columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelWidths {
    pub chat: u16,
    pub processes: u16,
    pub logs: u16,
}

impl PanelWidths {
    /// 25% / 20% / 55% split of `total`
    pub fn default_for(total: u16) -> Self {
        let chat = total / 4;
        let processes = total / 5;
        Self {
            chat,
            processes,
            logs: total.saturating_sub(chat + processes),
        }
    }

    pub fn total(&self) -> u16 {
        self.chat + self.processes + self.logs
    }

    /// Drag a divider by `delta` columns. The move is rejected when either
    /// neighbouring column would drop below [`MIN_PANEL_WIDTH`].
    pub fn drag(&mut self, divider: Divider, delta: i32) -> bool {
        let (left, right) = match divider {
            Divider::ChatProcesses => (self.chat, self.processes),
            Divider::ProcessesLogs => (self.processes, self.logs),
        };
        let new_left = i32::from(left) + delta;
        let new_right = i32::from(right) - delta;
        let min = i32::from(MIN_PANEL_WIDTH);
        if new_left < min || new_right < min {
            return false;
        }
        let (new_left, new_right) = (new_left as u16, new_right as u16);
        match divider {
            Divider::ChatProcesses => {
                self.chat = new_left;
                self.processes = new_right;
            }
            Divider::ProcessesLogs => {
                self.processes = new_left;
                self.logs = new_right;
            }
        }
        true
    }

    /// Rescale proportionally to a new terminal width
    pub fn fit(&self, total: u16) -> Self {
        let current = self.total();
        if current == 0 || total == 0 {
            return Self::default_for(total);
        }
        let scale = |w: u16| (u32::from(w) * u32::from(total) / u32::from(current)) as u16;
        let chat = scale(self.chat);
        let processes = scale(self.processes);
        Self {
            chat,
            processes,
            logs: total.saturating_sub(chat + processes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_upsert_by_label() {
        let mut panel = ProcessPanel::new();
        let widget = |done, error| ProgressWidget {
            label: "Building app".to_string(),
            done,
            error,
        };
        panel.upsert_progress(&widget(false, false));
        panel.upsert_progress(&widget(true, false));
        assert_eq!(panel.progress().len(), 1);
        assert_eq!(panel.progress()[0].key, "proc-Building_app");
        assert_eq!(panel.progress()[0].state, ProgressState::Done);

        panel.upsert_progress(&ProgressWidget {
            label: "Pull".to_string(),
            done: false,
            error: true,
        });
        assert_eq!(panel.progress()[1].state, ProgressState::Failed);
    }

    #[test]
    fn test_process_export_and_actions() {
        let entries: Vec<ProcessEntry> = serde_json::from_str(
            r#"[{"name":"dockfra-web","status":"running","details":"Up 2h","type":"container"},
                {"name":"dockfra-db","status":"stopped","details":"Exited (1)","type":"container"},
                {"name":"wizard","status":"weird","details":""}]"#,
        )
        .unwrap();
        assert_eq!(entries[2].status, ProcessStatus::Unknown);
        assert!(!entries[2].is_container());
        assert_eq!(entries[1].fix_action().as_deref(), Some("fix_container::dockfra-db"));
        assert!(entries[0].fix_action().is_none());

        let panel = ProcessPanel {
            entries: PanelData::Ready(entries),
            ..Default::default()
        };
        let text = panel.export();
        assert!(text.starts_with("🟢 Running | dockfra-web | Up 2h\n🔴 Stopped | dockfra-db"));

        assert_eq!(ProcessAction::ChangePort("8081".into()).body()["port"], "8081");
        assert_eq!(ProcessAction::Restart.as_str(), "restart");
    }

    #[test]
    fn test_services_filter_and_cleanup() {
        let containers = vec![
            ContainerInfo {
                name: "dockfra-web".to_string(),
                status: "Up 3 minutes (healthy)".to_string(),
                ports: "0.0.0.0:8080->80/tcp, :::8080->80/tcp".to_string(),
            },
            ContainerInfo {
                name: "dockfra-ssh-manager".to_string(),
                status: "Up".to_string(),
                ports: String::new(),
            },
            ContainerInfo {
                name: "Dockfra-Wizard".to_string(),
                status: "Up".to_string(),
                ports: String::new(),
            },
            ContainerInfo {
                name: "api".to_string(),
                status: "Exited (1)".to_string(),
                ports: String::new(),
            },
        ];
        let services = services_from(&containers);
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].display_name, "web");
        assert_eq!(services[0].ports, "8080->80/tcp, 8080->");
        assert!(services[0].up);
        assert_eq!(services[0].logs_action(), "logs::dockfra-web");
        assert_eq!(services[1].fix_action().as_deref(), Some("fix_container::api"));
    }

    #[test]
    fn test_panel_widths_respect_minimum() {
        let mut widths = PanelWidths::default_for(200);
        assert_eq!(widths, PanelWidths { chat: 50, processes: 40, logs: 110 });
        assert!(widths.drag(Divider::ChatProcesses, 10));
        assert_eq!((widths.chat, widths.processes), (60, 30));
        assert!(!widths.drag(Divider::ChatProcesses, 11));
        assert_eq!((widths.chat, widths.processes), (60, 30));
        assert!(widths.drag(Divider::ProcessesLogs, -10));
        assert_eq!((widths.processes, widths.logs), (20, 120));
        assert_eq!(widths.total(), 200);
    }

    #[test]
    fn test_panel_widths_fit() {
        let widths = PanelWidths { chat: 50, processes: 50, logs: 100 };
        assert_eq!(widths.fit(100), PanelWidths { chat: 25, processes: 25, logs: 50 });
    }

    #[test]
    fn test_stats_decode() {
        let stats: Stats = serde_json::from_str(
            r#"{"git":{"branch":"main","commits_today":3},"containers":{"running":5,"failing":1},
               "integrations":{"github":true,"jira":false},
               "suggestions":[{"icon":"💡","text":"Run tests","action":"run_tests"}]}"#,
        )
        .unwrap();
        assert_eq!(stats.active_integrations(), vec!["github"]);
        assert_eq!(stats.containers.failing, 1);

        let health: DeveloperHealth = serde_json::from_str(
            r#"{"container":"running","ssh":"fail","git":"main","scripts":4,"engines":{"aider":true}}"#,
        )
        .unwrap();
        let badges = health.badges();
        assert_eq!(badges[0], (true, "kontener".to_string()));
        assert_eq!(badges[1], (false, "exec".to_string()));
        assert_eq!(badges.last().unwrap().1, "aider");
    }
}
