use std::future::Future;
use std::time::{Duration, Instant};

use dockfra_core::api::History;
use dockfra_core::devices::DeviceIps;
use dockfra_core::diff::TicketDiff;
use dockfra_core::logstream::LogTail;
use dockfra_core::panels::{
    services_from, ContainerInfo, DeveloperHealth, Divider, EngineStatus, PanelData, PanelTab,
    PanelWidths, ProcessAction, ProcessActionResult, ProcessEntry, Stats,
};
use dockfra_core::text::inline_actions;
use dockfra_core::ticket::{stats_actions, Ticket};
use dockfra_core::widget::{
    DetectResult, FieldRef, FormField, SelectOption, WidgetBlock, WidgetTarget,
};
use dockfra_core::{
    BadgeTarget, ChatRole, Config, Request, SocketHandle, WizardClient, WizardSession,
};
use ratatui::layout::Rect;
use tokio::sync::mpsc::UnboundedSender;

use crate::tui::AppEvent;

const LOG_POLL: Duration = Duration::from_secs(2);
const PROCESS_POLL: Duration = Duration::from_secs(5);
const SERVICE_POLL: Duration = Duration::from_secs(8);
const STATS_POLL: Duration = Duration::from_secs(15);
/// Processes are re-read this long after a stop/restart/port change
const ACTION_REFRESH: Duration = Duration::from_secs(2);
/// Delay between a ticket announcement and the stats refresh it triggers
const ANNOUNCE_REFRESH: Duration = Duration::from_millis(800);
const COPY_FLASH: Duration = Duration::from_millis(1500);

pub const LANGUAGES: [&str; 10] = ["pl", "en", "de", "fr", "es", "it", "pt", "cs", "ro", "nl"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Chat,
    Widgets,
    Panel,
    Logs,
}

impl FocusPane {
    pub fn next(&self) -> Self {
        match self {
            FocusPane::Chat => FocusPane::Widgets,
            FocusPane::Widgets => FocusPane::Panel,
            FocusPane::Panel => FocusPane::Logs,
            FocusPane::Logs => FocusPane::Chat,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            FocusPane::Chat => FocusPane::Logs,
            FocusPane::Widgets => FocusPane::Chat,
            FocusPane::Panel => FocusPane::Widgets,
            FocusPane::Logs => FocusPane::Panel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// What the input bar is currently editing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditTarget {
    Chat,
    Field(String),
    GridArg { block: usize, card: usize },
    Port(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyTarget {
    Chat,
    Processes,
    Logs,
}

#[derive(Debug, Clone, Copy)]
pub struct CopyFlash {
    pub target: CopyTarget,
    pub ok: bool,
    pub until: Instant,
}

/// Something activatable inside the chat transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatTarget {
    Inline {
        message: usize,
        label: String,
        value: String,
    },
    TicketButton {
        set: usize,
        card: usize,
        button: usize,
    },
}

/// Something activatable on the stats tab
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsTarget {
    TicketButton { ticket: usize, button: usize },
    Suggestion(usize),
}

/// A finished background REST call
#[derive(Debug)]
pub enum Fetched {
    History(Result<History, String>),
    LogTail(Result<LogTail, String>),
    Processes(Result<Vec<ProcessEntry>, String>),
    Services(Result<Vec<ContainerInfo>, String>),
    Stats(Result<Stats, String>),
    StatsTickets(Result<Vec<Ticket>, String>),
    DeveloperHealth(Result<DeveloperHealth, String>),
    Engines(Result<EngineStatus, String>),
    Diff {
        ticket_id: String,
        force_modal: bool,
        result: Result<TicketDiff, String>,
    },
    TicketDetail {
        ticket_id: String,
        ticket: Option<Ticket>,
    },
    DiffCount {
        target: BadgeTarget,
        ticket_id: String,
        count: Option<usize>,
    },
    GridOptions {
        generation: u64,
        command: String,
        options: Option<Vec<SelectOption>>,
    },
    Detect {
        field: String,
        result: Option<DetectResult>,
    },
    Devices(Result<DeviceIps, String>),
    ProcessAction {
        name: String,
        result: Result<ProcessActionResult, String>,
    },
}

/// Screen regions from the last frame, for mouse hit-testing
#[derive(Debug, Default)]
pub struct Areas {
    pub chat: Rect,
    pub widgets: Rect,
    pub input: Rect,
    pub panel: Rect,
    pub logs: Rect,
    pub modal: Option<Rect>,
    /// Column of each divider: chat|processes and processes|logs
    pub dividers: [u16; 2],
    /// Screen row of each widget target line
    pub widget_rows: Vec<(u16, usize)>,
    /// Screen row of each selectable panel row
    pub panel_rows: Vec<(u16, usize)>,
}

/// Next due instant per poller
#[derive(Debug)]
struct Pollers {
    logs: Instant,
    processes: Instant,
    services: Instant,
    stats: Instant,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub session: WizardSession,
    pub client: WizardClient,
    socket: SocketHandle,
    tx: UnboundedSender<AppEvent>,
    pub config: Config,

    // Focus and input
    pub focus: FocusPane,
    pub input_mode: InputMode,
    pub edit_target: EditTarget,
    pub input: String,
    pub input_cursor: usize, // char index into input

    // Chat
    pub chat_scroll: u16,
    pub chat_follow: bool,
    pub chat_target: Option<usize>,

    // Widgets and panels
    pub widget_target: usize,
    pub panel_row: usize,
    pub log_back: usize, // lines scrolled up from the bottom; 0 follows
    pub status_message: Option<String>,
    pub log_error: Option<String>,

    // Layout
    pub widths: Option<PanelWidths>,
    pub areas: Areas,
    pub dragging: Option<(Divider, u16)>,

    pub copy_flash: Option<CopyFlash>,
    pub animation_frame: u8,
    polls: Pollers,
}

impl App {
    pub fn new(
        config: Config,
        client: WizardClient,
        socket: SocketHandle,
        tx: UnboundedSender<AppEvent>,
    ) -> Self {
        let now = Instant::now();
        Self {
            should_quit: false,
            session: WizardSession::new(),
            client,
            socket,
            tx,
            config,

            focus: FocusPane::Chat,
            input_mode: InputMode::Normal,
            edit_target: EditTarget::Chat,
            input: String::new(),
            input_cursor: 0,

            chat_scroll: 0,
            chat_follow: true,
            chat_target: None,

            widget_target: 0,
            panel_row: 0,
            log_back: 0,
            status_message: None,
            log_error: None,

            widths: None,
            areas: Areas::default(),
            dragging: None,

            copy_flash: None,
            animation_frame: 0,
            polls: Pollers {
                logs: now,
                processes: now,
                services: now,
                stats: now,
            },
        }
    }

    /// Kick off the startup fetches
    pub fn start(&mut self) {
        let client = self.client.clone();
        self.spawn(async move {
            Fetched::History(client.history().await.map_err(describe))
        });
        self.poll(Instant::now());
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = Fetched> + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let fetched = task.await;
            let _ = tx.send(AppEvent::Fetched(Box::new(fetched)));
        });
    }

    // ------------------------------------------------------------------
    // Polling
    // ------------------------------------------------------------------

    /// Start every poll whose interval elapsed. Services and stats only poll
    /// while their tab is showing.
    pub fn poll(&mut self, now: Instant) {
        if now >= self.polls.logs {
            self.polls.logs = now + LOG_POLL;
            let client = self.client.clone();
            let n = self.session.logs.next_request_size();
            self.spawn(async move { Fetched::LogTail(client.logs_tail(n).await.map_err(describe)) });
        }
        if now >= self.polls.processes {
            self.polls.processes = now + PROCESS_POLL;
            let client = self.client.clone();
            self.spawn(async move { Fetched::Processes(client.processes().await.map_err(describe)) });
        }
        match self.session.panel_tab {
            PanelTab::Services if now >= self.polls.services => {
                self.polls.services = now + SERVICE_POLL;
                let client = self.client.clone();
                self.spawn(async move {
                    Fetched::Services(client.containers().await.map_err(describe))
                });
            }
            PanelTab::Stats if now >= self.polls.stats => {
                self.polls.stats = now + STATS_POLL;
                self.refresh_stats();
            }
            _ => {}
        }
    }

    fn refresh_stats(&self) {
        let client = self.client.clone();
        self.spawn(async move { Fetched::Stats(client.stats().await.map_err(describe)) });
        let client = self.client.clone();
        self.spawn(async move { Fetched::StatsTickets(client.tickets().await.map_err(describe)) });
        let client = self.client.clone();
        self.spawn(async move {
            Fetched::DeveloperHealth(client.developer_health().await.map_err(describe))
        });
        let client = self.client.clone();
        self.spawn(async move { Fetched::Engines(client.engine_status().await.map_err(describe)) });
    }

    pub fn switch_tab(&mut self, tab: PanelTab) {
        self.session.panel_tab = tab;
        self.panel_row = 0;
        let now = Instant::now();
        match tab {
            PanelTab::Processes => self.polls.processes = now,
            PanelTab::Services => self.polls.services = now,
            PanelTab::Stats => self.polls.stats = now,
        }
        self.poll(now);
    }

    pub fn refresh_current_tab(&mut self) {
        self.switch_tab(self.session.panel_tab);
    }

    // ------------------------------------------------------------------
    // Requests and results
    // ------------------------------------------------------------------

    pub fn run(&mut self, request: Request) {
        let client = self.client.clone();
        match request {
            Request::OpenDiff {
                ticket_id,
                force_modal,
            } => self.spawn(async move {
                let result = client.ticket_diff(&ticket_id).await.map_err(describe);
                Fetched::Diff {
                    ticket_id,
                    force_modal,
                    result,
                }
            }),
            Request::TicketDetail(ticket_id) => self.spawn(async move {
                let ticket = match client.ticket(&ticket_id).await {
                    Ok(ticket) => Some(ticket),
                    Err(e) => {
                        tracing::warn!(%ticket_id, error = %e, "ticket detail unavailable");
                        None
                    }
                };
                Fetched::TicketDetail { ticket_id, ticket }
            }),
            Request::DiffCount { target, ticket_id } => self.spawn(async move {
                let count = client.ticket_diff(&ticket_id).await.ok().map(|d| d.commits.len());
                Fetched::DiffCount {
                    target,
                    ticket_id,
                    count,
                }
            }),
            Request::GridOptions {
                generation,
                command,
                endpoint,
            } => self.spawn(async move {
                let options = match client.options(&endpoint).await {
                    Ok(options) => Some(options),
                    Err(e) => {
                        tracing::debug!(%endpoint, error = %e, "grid options unavailable");
                        None
                    }
                };
                Fetched::GridOptions {
                    generation,
                    command,
                    options,
                }
            }),
            Request::RefreshStats => {
                if self.session.panel_tab == PanelTab::Stats {
                    self.polls.stats = Instant::now() + ANNOUNCE_REFRESH;
                }
            }
        }
    }

    pub fn run_all(&mut self, requests: Vec<Request>) {
        for request in requests {
            self.run(request);
        }
    }

    pub fn apply_fetched(&mut self, fetched: Fetched) {
        let now = Instant::now();
        match fetched {
            Fetched::History(Ok(history)) => {
                if let Some(step) = &history.current_step {
                    tracing::debug!(%step, "wizard step");
                }
                let requests = self.session.apply_history(history.conversation, &history.logs);
                self.run_all(requests);
            }
            Fetched::History(Err(e)) => tracing::warn!(error = %e, "history unavailable"),
            Fetched::LogTail(Ok(tail)) => {
                self.log_error = None;
                self.session.apply_log_tail(&tail);
            }
            Fetched::LogTail(Err(e)) => {
                tracing::debug!(error = %e, "log poll failed");
                self.log_error = Some(e);
            }
            Fetched::Processes(result) => {
                if let Err(e) = &result {
                    tracing::debug!(error = %e, "process poll failed");
                }
                self.session.processes.entries = PanelData::from_result(result);
            }
            Fetched::Services(result) => {
                self.session.services =
                    PanelData::from_result(result.map(|containers| services_from(&containers)));
            }
            Fetched::Stats(result) => self.session.stats.stats = PanelData::from_result(result),
            Fetched::StatsTickets(result) => {
                let requests = self.session.apply_stats_tickets(result);
                self.run_all(requests);
            }
            Fetched::DeveloperHealth(result) => {
                self.session.stats.developer = PanelData::from_result(result)
            }
            Fetched::Engines(result) => self.session.stats.engines = PanelData::from_result(result),
            Fetched::Diff {
                ticket_id,
                force_modal,
                result,
            } => {
                if let Some(request) = self.session.apply_diff(&ticket_id, force_modal, result, now) {
                    self.run(request);
                }
            }
            Fetched::TicketDetail { ticket_id, ticket } => {
                self.session.apply_ticket_detail(&ticket_id, ticket)
            }
            Fetched::DiffCount {
                target,
                ticket_id,
                count,
            } => self.session.apply_diff_count(target, &ticket_id, count),
            Fetched::GridOptions {
                generation,
                command,
                options,
            } => self.session.apply_grid_options(generation, &command, options),
            Fetched::Detect { field, result } => self.session.apply_detect(&field, result),
            Fetched::Devices(result) => self.session.apply_devices(result),
            Fetched::ProcessAction { name, result } => {
                self.status_message = Some(match result {
                    Ok(r) if r.success => format!("✅ {}: {}", name, r.message),
                    Ok(r) => format!("❌ {}: {}", name, r.message),
                    Err(e) => format!("❌ {}: {}", name, e),
                });
                self.polls.processes = now + ACTION_REFRESH;
            }
        }
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    pub fn dispatch_value(&mut self, value: &str, label: Option<&str>) {
        self.chat_follow = true;
        if let Some(request) = self.session.dispatch_value(&self.socket, value, label) {
            self.run(request);
        }
    }

    pub fn activate_chat_target(&mut self) {
        let Some(target) = self
            .chat_target
            .and_then(|i| chat_targets(&self.session).into_iter().nth(i))
        else {
            return;
        };
        self.chat_follow = true;
        match target {
            ChatTarget::Inline { label, value, .. } => {
                self.session.dispatch_inline(&self.socket, &label, &value)
            }
            ChatTarget::TicketButton { set, card, button } => {
                if let Some(request) =
                    self.session
                        .press_ticket_button(&self.socket, set, card, button)
                {
                    self.run(request);
                }
            }
        }
    }

    pub fn activate_widget_target(&mut self) {
        let targets = self.session.widgets.targets(&self.session.form);
        let Some(target) = targets.get(self.widget_target).copied() else {
            return;
        };
        match target {
            WidgetTarget::Button { block, item } => {
                let button = match self.session.widgets.blocks().get(block) {
                    Some(WidgetBlock::Buttons(buttons)) => {
                        buttons.items.get(item).cloned()
                    }
                    _ => None,
                };
                if let Some(button) = button {
                    self.dispatch_value(&button.value, Some(&button.label));
                }
            }
            WidgetTarget::Field(at) => self.edit_field(at),
            WidgetTarget::GridCard { block, card } => {
                let needs_text = self
                    .session
                    .widgets
                    .grid_card_mut(block, card)
                    .is_some_and(|(_, c)| c.needs_arg() && c.arg().is_empty() && c.text_mut().is_some());
                if needs_text {
                    self.begin_edit(EditTarget::GridArg { block, card }, String::new());
                } else {
                    self.chat_follow = true;
                    self.session.run_grid_card(&self.socket, block, card);
                }
            }
        }
    }

    /// Inputs open the editor; selects step to their next option
    pub fn edit_field(&mut self, at: FieldRef) {
        match self.session.widgets.field(at) {
            Some(FormField::Input(input)) => {
                let name = input.widget.name.clone();
                let current = self.session.field_value(&name);
                self.begin_edit(EditTarget::Field(name), current);
            }
            Some(FormField::Select(_)) => {
                self.session
                    .widgets
                    .cycle_select(at, 1, &mut self.session.form);
            }
            None => {}
        }
    }

    pub fn selected_field(&self) -> Option<FieldRef> {
        match self
            .session
            .widgets
            .targets(&self.session.form)
            .get(self.widget_target)
        {
            Some(WidgetTarget::Field(at)) => Some(*at),
            _ => None,
        }
    }

    pub fn selected_grid_card(&self) -> Option<(usize, usize)> {
        match self
            .session
            .widgets
            .targets(&self.session.form)
            .get(self.widget_target)
        {
            Some(WidgetTarget::GridCard { block, card }) => Some((*block, *card)),
            _ => None,
        }
    }

    pub fn request_detect(&mut self, at: FieldRef) {
        let Some(field) = self.session.request_detect(at) else {
            return;
        };
        let client = self.client.clone();
        self.spawn(async move {
            let result = client.detect(&field).await.ok();
            Fetched::Detect { field, result }
        });
    }

    pub fn open_picker(&mut self, at: FieldRef) {
        if self.session.open_picker(at) {
            self.load_devices(false);
        }
    }

    pub fn load_devices(&mut self, scan: bool) {
        if let Some(picker) = self.session.picker.as_mut() {
            picker.start_loading(scan);
        }
        let client = self.client.clone();
        self.spawn(async move {
            Fetched::Devices(client.device_ips(scan).await.map_err(describe))
        });
    }

    pub fn process_action(&mut self, action: ProcessAction, name: &str) {
        let client = self.client.clone();
        let name = name.to_string();
        self.status_message = Some(format!("⏳ {} {}", action.as_str(), name));
        self.spawn(async move {
            let result = client.process_action(&action, &name).await.map_err(describe);
            Fetched::ProcessAction { name, result }
        });
    }

    pub fn selected_process(&self) -> Option<&ProcessEntry> {
        self.session
            .processes
            .entries
            .ready()
            .and_then(|entries| entries.get(self.panel_row))
    }

    // ------------------------------------------------------------------
    // Input bar
    // ------------------------------------------------------------------

    pub fn begin_edit(&mut self, target: EditTarget, initial: String) {
        self.input_cursor = initial.chars().count();
        self.input = initial;
        self.edit_target = target;
        self.input_mode = InputMode::Editing;
    }

    pub fn cancel_edit(&mut self) {
        self.input_mode = InputMode::Normal;
        if self.edit_target != EditTarget::Chat {
            self.input.clear();
            self.input_cursor = 0;
            self.edit_target = EditTarget::Chat;
        }
    }

    /// Commit the input bar to whatever it is editing
    pub fn submit_input(&mut self) {
        let text = std::mem::take(&mut self.input);
        self.input_cursor = 0;
        match std::mem::replace(&mut self.edit_target, EditTarget::Chat) {
            EditTarget::Chat => {
                if text.trim().is_empty() {
                    return;
                }
                self.chat_follow = true;
                if let Some(request) = self.session.submit_chat(&self.socket, text.trim()) {
                    self.run(request);
                }
            }
            EditTarget::Field(name) => {
                self.session.set_field(&name, &text);
                self.input_mode = InputMode::Normal;
            }
            EditTarget::GridArg { block, card } => {
                if let Some(buffer) = self.session.grid_text_mut(block, card) {
                    *buffer = text;
                }
                self.chat_follow = true;
                self.session.run_grid_card(&self.socket, block, card);
                self.input_mode = InputMode::Normal;
            }
            EditTarget::Port(name) => {
                let port = text.trim();
                if !port.is_empty() {
                    self.process_action(ProcessAction::ChangePort(port.to_string()), &name);
                }
                self.input_mode = InputMode::Normal;
            }
        }
    }

    // ------------------------------------------------------------------
    // Layout and misc
    // ------------------------------------------------------------------

    /// Column widths for a terminal `total` columns wide
    pub fn widths_for(&mut self, total: u16) -> PanelWidths {
        let widths = match self.widths.or(self.config.panel_widths) {
            Some(w) if w.total() == total => w,
            Some(w) => w.fit(total),
            None => PanelWidths::default_for(total),
        };
        self.widths = Some(widths);
        widths
    }

    pub fn drag_divider(&mut self, divider: Divider, delta: i32) {
        if let Some(widths) = self.widths.as_mut() {
            widths.drag(divider, delta);
        }
    }

    pub fn save_widths(&mut self) {
        self.config.panel_widths = self.widths;
        if let Err(e) = self.config.save() {
            tracing::warn!(error = %e, "could not save panel widths");
        }
    }

    pub fn cycle_language(&mut self) {
        let index = LANGUAGES
            .iter()
            .position(|l| *l == self.config.language)
            .map(|i| (i + 1) % LANGUAGES.len())
            .unwrap_or(0);
        self.config.language = LANGUAGES[index].to_string();
        if let Err(e) = self.config.save() {
            tracing::warn!(error = %e, "could not save language");
        }
    }

    pub fn flash_copy(&mut self, target: CopyTarget, ok: bool) {
        self.copy_flash = Some(CopyFlash {
            target,
            ok,
            until: Instant::now() + COPY_FLASH,
        });
    }

    pub fn copy_text(&self, target: CopyTarget) -> String {
        match target {
            CopyTarget::Chat => self.session.transcript.export(),
            CopyTarget::Processes => self.session.processes.export(),
            CopyTarget::Logs => self.session.logs.export(),
        }
    }

    pub fn tick(&mut self, now: Instant) {
        self.animation_frame = (self.animation_frame + 1) % 3;
        if self.copy_flash.is_some_and(|f| now >= f.until) {
            self.copy_flash = None;
        }
        self.session.tick(now);
        self.poll(now);
    }

    pub fn chat_targets(&self) -> Vec<ChatTarget> {
        chat_targets(&self.session)
    }

    pub fn stats_targets(&self) -> Vec<StatsTarget> {
        stats_targets(&self.session)
    }

    pub fn activate_stats_target(&mut self) {
        let Some(target) = self.stats_targets().get(self.panel_row).copied() else {
            return;
        };
        let picked = match target {
            StatsTarget::TicketButton { ticket, button } => self
                .session
                .stats
                .tickets
                .ready()
                .and_then(|t| t.get(ticket))
                .and_then(|t| stats_actions(t).into_iter().nth(button))
                .map(|b| (b.value, b.label.to_string())),
            StatsTarget::Suggestion(index) => self
                .session
                .stats
                .stats
                .ready()
                .and_then(|s| s.suggestions.get(index))
                .map(|s| (s.action.clone(), format!("{} {}", s.icon, s.text))),
        };
        if let Some((value, label)) = picked {
            self.dispatch_value(&value, Some(&label));
        }
    }
}

fn describe(e: anyhow::Error) -> String {
    format!("{:#}", e)
}

/// Activatable items in transcript order: ticket card buttons for messages
/// rendered as cards, inline `[[label|value]]` actions otherwise
pub fn chat_targets(session: &WizardSession) -> Vec<ChatTarget> {
    let mut targets = Vec::new();
    for (index, message) in session.transcript.messages().iter().enumerate() {
        if message.role != ChatRole::Bot {
            continue;
        }
        if let Some((set, cards)) = session.cards_for_message(index) {
            for (card, c) in cards.cards.iter().enumerate() {
                targets.extend(
                    (0..c.buttons.len()).map(|button| ChatTarget::TicketButton { set, card, button }),
                );
            }
            continue;
        }
        targets.extend(
            inline_actions(&message.text)
                .into_iter()
                .map(|(label, value)| ChatTarget::Inline {
                    message: index,
                    label,
                    value,
                }),
        );
    }
    targets
}

pub fn stats_targets(session: &WizardSession) -> Vec<StatsTarget> {
    let mut targets = Vec::new();
    if let Some(tickets) = session.stats.tickets.ready() {
        for (ticket, t) in tickets.iter().enumerate() {
            targets.extend(
                (0..stats_actions(t).len()).map(|button| StatsTarget::TicketButton { ticket, button }),
            );
        }
    }
    if let Some(stats) = session.stats.stats.ready() {
        targets.extend(
            stats
                .suggestions
                .iter()
                .enumerate()
                .filter(|(_, s)| !s.action.is_empty())
                .map(|(i, _)| StatsTarget::Suggestion(i)),
        );
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockfra_core::ChatMessage;

    #[test]
    fn test_chat_targets_prefer_cards() {
        let mut session = WizardSession::new();
        session.push_message(ChatMessage::bot("Gotowe. [[Uruchom|launch_all]] [[Stop|stop_all]]"));
        session.push_message(ChatMessage::user("[[not|clickable]]"));
        session.push_message(ChatMessage::bot("○ T-0001   🟡 Fix login [[x|y]]"));

        let targets = chat_targets(&session);
        assert_eq!(
            targets[0],
            ChatTarget::Inline {
                message: 0,
                label: "Uruchom".to_string(),
                value: "launch_all".to_string()
            }
        );
        // open ticket: work + details
        assert_eq!(targets.len(), 4);
        assert!(matches!(
            targets[3],
            ChatTarget::TicketButton {
                set: 0,
                card: 0,
                button: 1
            }
        ));
    }

    #[test]
    fn test_stats_targets() {
        let mut session = WizardSession::new();
        let tickets: Vec<Ticket> = serde_json::from_value(serde_json::json!([
            {"id": "T-0001", "status": "open", "github_issue_number": 4},
            {"id": "T-0002", "status": "closed"}
        ]))
        .unwrap();
        session.apply_stats_tickets(Ok(tickets));
        session.stats.stats = PanelData::Ready(
            serde_json::from_value(serde_json::json!({
                "suggestions": [
                    {"icon": "💡", "text": "Start", "action": "launch_all"},
                    {"icon": "ℹ️", "text": "Info only"}
                ]
            }))
            .unwrap(),
        );

        let targets = stats_targets(&session);
        // 2 open buttons, 3 closed + push-to-github, 1 suggestion with an action
        assert_eq!(targets.len(), 7);
        assert_eq!(targets[6], StatsTarget::Suggestion(0));
    }

    #[test]
    fn test_focus_cycle() {
        let mut focus = FocusPane::Chat;
        for _ in 0..4 {
            focus = focus.next();
        }
        assert_eq!(focus, FocusPane::Chat);
        assert_eq!(FocusPane::Chat.previous(), FocusPane::Logs);
    }
}
