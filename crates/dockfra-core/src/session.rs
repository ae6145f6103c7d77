//! Client-side application context
//!
//! [`WizardSession`] owns every piece of view state. It is mutated only by
//! the UI task; network work is requested through [`Request`] values that
//! the caller runs and feeds back through the `apply_*` methods.

use std::time::Instant;

use crate::action::{parse_chat_input, Action, FormSnapshot, OutboundAction};
use crate::devices::{DeviceIps, IpPicker};
use crate::diff::{self, DiffView, TicketDiff};
use crate::form::FormStore;
use crate::logstream::{LogBuffer, LogLine, LogTail};
use crate::panels::{PanelData, PanelTab, ProcessPanel, ServiceEntry, StatsPanel};
use crate::socket::{ActionSink, ServerEvent, SocketEvent};
use crate::state::{ChatMessage, ChatRole, Transcript};
use crate::text::{announces_ticket_change, strip_motd};
use crate::ticket::{Ticket, TicketCardSet};
use crate::widget::{
    DetectResult, FieldRef, FormField, ParamInput, SelectOption, WidgetArea, WidgetEffect,
    SSH_ARG_FIELD,
};

/// Where a fetched diff count should be patched in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeTarget {
    /// Ticket cards under a chat message, by card set index
    Chat(usize),
    Stats,
}

/// Network work the session needs done
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    OpenDiff { ticket_id: String, force_modal: bool },
    TicketDetail(String),
    DiffCount { target: BadgeTarget, ticket_id: String },
    GridOptions { generation: u64, command: String, endpoint: String },
    RefreshStats,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FormSource {
    Live,
    Empty,
    Given(FormSnapshot),
}

pub const SEND_FAILED_NOTICE: &str = "⚠️ Brak połączenia z serwerem, akcja nie została wysłana";

#[derive(Debug, Default)]
pub struct WizardSession {
    pub transcript: Transcript,
    /// Ticket cards rendered under bot messages
    pub ticket_cards: Vec<TicketCardSet>,
    pub form: FormStore,
    pub widgets: WidgetArea,
    pub logs: LogBuffer,
    pub processes: ProcessPanel,
    pub services: PanelData<Vec<ServiceEntry>>,
    pub stats: StatsPanel,
    pub panel_tab: PanelTab,
    pub diff: DiffView,
    pub picker: Option<IpPicker>,
    pub connected: bool,
}

impl WizardSession {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    fn emit(&mut self, sink: &dyn ActionSink, value: String, form: FormSource, echo: String) {
        let form = match form {
            FormSource::Live => self.form.snapshot(),
            FormSource::Empty => FormSnapshot::new(),
            FormSource::Given(form) => form,
        };
        self.transcript.push(ChatMessage::user(echo));
        tracing::debug!(%value, fields = form.len(), "dispatching action");
        if let Err(e) = sink.send_action(OutboundAction { value, form }) {
            tracing::warn!(error = %e, "action not sent");
            self.transcript.push(ChatMessage::bot(SEND_FAILED_NOTICE));
        }
    }

    /// Send an action with the live form snapshot. `show_ticket`/`show_diff`
    /// are handled locally and come back as an [`Request::OpenDiff`].
    pub fn dispatch(
        &mut self,
        sink: &dyn ActionSink,
        action: Action,
        label: Option<&str>,
    ) -> Option<Request> {
        match action {
            Action::ShowTicket(ticket_id) => Some(Request::OpenDiff {
                ticket_id,
                force_modal: false,
            }),
            Action::ShowDiff(ticket_id) => Some(Request::OpenDiff {
                ticket_id,
                force_modal: true,
            }),
            Action::TicketCreate { .. } => {
                let echo = label.map(str::to_string).unwrap_or_else(|| action.echo_label());
                self.emit(sink, action.to_value(), FormSource::Given(action.extra_form()), echo);
                None
            }
            _ => {
                let echo = label.map(str::to_string).unwrap_or_else(|| action.echo_label());
                self.emit(sink, action.to_value(), FormSource::Live, echo);
                None
            }
        }
    }

    pub fn dispatch_value(
        &mut self,
        sink: &dyn ActionSink,
        value: &str,
        label: Option<&str>,
    ) -> Option<Request> {
        self.dispatch(sink, Action::parse(value), label)
    }

    /// `[[label|value]]` buttons in bot text send an empty form
    pub fn dispatch_inline(&mut self, sink: &dyn ActionSink, label: &str, value: &str) {
        self.emit(sink, value.to_string(), FormSource::Empty, label.to_string());
    }

    /// Text typed into the chat input bar
    pub fn submit_chat(&mut self, sink: &dyn ActionSink, text: &str) -> Option<Request> {
        let action = parse_chat_input(text)?;
        self.dispatch(sink, action, None)
    }

    /// Run an action-grid card. Returns false (and flags the card) when a
    /// required argument is missing.
    pub fn run_grid_card(&mut self, sink: &dyn ActionSink, block: usize, card: usize) -> bool {
        let Some((run_value, grid_card)) = self.widgets.grid_card_mut(block, card) else {
            return false;
        };
        let run_value = run_value.to_string();
        let arg = grid_card.arg();
        if grid_card.needs_arg() && arg.is_empty() {
            grid_card.required = true;
            return false;
        }
        grid_card.required = false;
        let cmd = grid_card.command.cmd.clone();
        let echo = if arg.is_empty() {
            cmd.clone()
        } else {
            format!("{} {}", cmd, arg)
        };
        let mut form = FormSnapshot::new();
        form.insert("ssh_cmd".to_string(), cmd);
        form.insert(SSH_ARG_FIELD.to_string(), arg);
        self.emit(sink, run_value, FormSource::Given(form), echo);
        true
    }

    /// A button on a chat ticket card; the echo names the ticket
    pub fn press_ticket_button(
        &mut self,
        sink: &dyn ActionSink,
        set: usize,
        card: usize,
        button: usize,
    ) -> Option<Request> {
        let card = self.ticket_cards.get(set)?.cards.get(card)?;
        let button = card.buttons.get(button)?;
        let label = format!("{} {} — {}", card.ticket.icon, card.ticket.id, button.label);
        let value = button.value.clone();
        self.dispatch_value(sink, &value, Some(&label))
    }

    // ------------------------------------------------------------------
    // Inbound events
    // ------------------------------------------------------------------

    pub fn apply_socket_event(&mut self, event: SocketEvent, now: Instant) -> Vec<Request> {
        match event {
            SocketEvent::Connected => {
                tracing::info!("connected to wizard");
                self.connected = true;
                Vec::new()
            }
            SocketEvent::Disconnected(reason) => {
                if self.connected {
                    tracing::info!(%reason, "lost connection to wizard");
                }
                self.connected = false;
                Vec::new()
            }
            SocketEvent::Server(event) => self.apply_server_event(event, now),
        }
    }

    pub fn apply_server_event(&mut self, event: ServerEvent, now: Instant) -> Vec<Request> {
        match event {
            ServerEvent::Message(message) => self.push_message(message),
            ServerEvent::Widget(widget) => self
                .widgets
                .apply(widget, now)
                .into_iter()
                .filter_map(|effect| match effect {
                    WidgetEffect::Progress(progress) => {
                        self.processes.upsert_progress(&progress);
                        None
                    }
                    WidgetEffect::LoadOptions {
                        generation,
                        command,
                        endpoint,
                    } => Some(Request::GridOptions {
                        generation,
                        command,
                        endpoint,
                    }),
                })
                .collect(),
            ServerEvent::ClearWidgets => {
                self.widgets.clear(&mut self.form);
                Vec::new()
            }
            ServerEvent::LogLine(line) => {
                if !self.logs.push_line(&line) {
                    tracing::trace!(id = ?line.id, "duplicate log line dropped");
                }
                Vec::new()
            }
        }
    }

    /// Append a chat message; bot text is cleaned of banners and checked for
    /// ticket lists
    pub fn push_message(&mut self, mut message: ChatMessage) -> Vec<Request> {
        if message.role == ChatRole::Bot {
            message.text = strip_motd(&message.text);
        }
        let is_bot = message.role == ChatRole::Bot;
        let text = message.text.clone();
        if !self.transcript.push(message) {
            return Vec::new();
        }
        let mut requests = Vec::new();
        if !is_bot {
            return requests;
        }
        let index = self.transcript.len() - 1;
        if let Some(set) = TicketCardSet::from_text(index, &text) {
            let target = BadgeTarget::Chat(self.ticket_cards.len());
            requests.extend(set.badge_requests().into_iter().map(|ticket_id| {
                Request::DiffCount { target, ticket_id }
            }));
            self.ticket_cards.push(set);
        }
        if announces_ticket_change(&text) {
            requests.push(Request::RefreshStats);
        }
        requests
    }

    /// Ticket cards attached to the transcript message at `index`
    pub fn cards_for_message(&self, index: usize) -> Option<(usize, &TicketCardSet)> {
        self.ticket_cards
            .iter()
            .enumerate()
            .find(|(_, set)| set.message_index == index)
    }

    /// Replay `/api/history` once at startup
    pub fn apply_history(&mut self, conversation: Vec<ChatMessage>, logs: &[LogLine]) -> Vec<Request> {
        let mut requests = Vec::new();
        for message in conversation {
            requests.extend(self.push_message(message));
        }
        self.logs.apply_history(logs);
        requests
    }

    pub fn apply_log_tail(&mut self, tail: &LogTail) {
        let appended = self.logs.apply_tail(tail);
        if appended > 0 {
            tracing::trace!(appended, total = tail.total, "log tail applied");
        }
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    /// Earliest instant at which [`WizardSession::tick`] has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        let notice = self.diff.notices().iter().map(|n| n.expires_at).min();
        match (self.widgets.form_deadline(), notice) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn tick(&mut self, now: Instant) {
        self.widgets.flush_due(now, &mut self.form);
        self.diff.expire_notices(now);
    }

    // ------------------------------------------------------------------
    // Fetch results
    // ------------------------------------------------------------------

    /// Diff pre-flight answered. Returns the detail request when the modal
    /// opened.
    pub fn apply_diff(
        &mut self,
        ticket_id: &str,
        force_modal: bool,
        fetched: Result<TicketDiff, String>,
        now: Instant,
    ) -> Option<Request> {
        let outcome = diff::resolve(ticket_id, force_modal, fetched, now);
        self.diff
            .apply(outcome)
            .then(|| Request::TicketDetail(ticket_id.to_string()))
    }

    pub fn apply_ticket_detail(&mut self, ticket_id: &str, detail: Option<Ticket>) {
        self.diff.apply_detail(ticket_id, detail);
    }

    pub fn apply_diff_count(&mut self, target: BadgeTarget, ticket_id: &str, count: Option<usize>) {
        match target {
            BadgeTarget::Chat(set) => {
                if let Some(set) = self.ticket_cards.get_mut(set) {
                    set.apply_diff_count(ticket_id, count);
                }
            }
            BadgeTarget::Stats => {
                if let Some(count) = count {
                    self.stats.diff_counts.insert(ticket_id.to_string(), count);
                }
            }
        }
    }

    /// Stats tickets loaded: request the diff badges for non-open tickets
    pub fn apply_stats_tickets(&mut self, tickets: Result<Vec<Ticket>, String>) -> Vec<Request> {
        self.stats.tickets = PanelData::from_result(tickets);
        self.stats.diff_counts.clear();
        self.stats
            .badge_requests()
            .into_iter()
            .map(|ticket_id| Request::DiffCount {
                target: BadgeTarget::Stats,
                ticket_id,
            })
            .collect()
    }

    pub fn apply_grid_options(
        &mut self,
        generation: u64,
        command: &str,
        options: Option<Vec<SelectOption>>,
    ) {
        self.widgets.apply_grid_options(generation, command, options);
    }

    pub fn apply_detect(&mut self, field: &str, result: Option<DetectResult>) {
        if let Some(error) = result.as_ref().and_then(|r| r.error.as_deref()) {
            tracing::debug!(%field, %error, "autodetect reported an error");
        }
        self.widgets.apply_detect(field, result, &mut self.form);
    }

    // ------------------------------------------------------------------
    // Form editing
    // ------------------------------------------------------------------

    pub fn field_value(&self, name: &str) -> String {
        self.form.get(name).unwrap_or_default().to_string()
    }

    pub fn set_field(&mut self, name: &str, value: &str) {
        self.form.set(name, value);
    }

    /// Start autodetection for a field; returns the field name to query
    pub fn request_detect(&mut self, at: FieldRef) -> Option<String> {
        let field = self.widgets.field(at)?;
        if !field.autodetect() {
            return None;
        }
        let name = field.name().to_string();
        self.widgets.mark_detecting(&name);
        Some(name)
    }

    /// Open the IP picker for an input declared with `modal_type: ip_picker`
    pub fn open_picker(&mut self, at: FieldRef) -> bool {
        let Some(FormField::Input(input)) = self.widgets.field(at) else {
            return false;
        };
        if input.widget.modal_type.as_deref() != Some("ip_picker") {
            return false;
        }
        let name = input.widget.name.clone();
        let current = self.field_value(&name);
        self.picker = Some(IpPicker::open(&name, &current));
        true
    }

    pub fn apply_devices(&mut self, result: Result<DeviceIps, String>) {
        if let Some(picker) = self.picker.as_mut() {
            picker.apply(result);
        }
    }

    /// Activate the picker cursor; choosing a row fills the field and closes
    /// the picker
    pub fn picker_activate(&mut self) {
        let Some(picker) = self.picker.as_mut() else {
            return;
        };
        if let Some(ip) = picker.activate() {
            let field = picker.field.clone();
            self.form.set(&field, &ip);
            self.picker = None;
        }
    }

    /// The grid card's typed argument, when it has a text input
    pub fn grid_text_mut(&mut self, block: usize, card: usize) -> Option<&mut String> {
        let (_, card) = self.widgets.grid_card_mut(block, card)?;
        if matches!(card.param, ParamInput::None) {
            return None;
        }
        card.required = false;
        card.text_mut()
    }
}
