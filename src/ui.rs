use dockfra_core::devices::{PickerBody, PickerItem};
use dockfra_core::diff::{classify_diff, DiffLineKind, DiffTab};
use dockfra_core::logstream::LogClass;
use dockfra_core::panels::{PanelData, PanelTab, ProcessStatus, ProgressState};
use dockfra_core::text::{self, Block as TextBlock, Span as TextSpan};
use dockfra_core::ticket::{priority_icon, stats_actions};
use dockfra_core::widget::{DetectState, FormField, GridCard, ParamInput, WidgetBlock};
use dockfra_core::{ChatRole, WizardSession};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, CopyTarget, EditTarget, FocusPane, InputMode};

/// Lines plus `(line index, target index)` pairs for mouse hit-testing
type Rows = (Vec<Line<'static>>, Vec<(usize, usize)>);

const SPINNER: [&str; 3] = ["⠋", "⠙", "⠹"];

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    app.areas.widget_rows.clear();
    app.areas.panel_rows.clear();
    app.areas.modal = None;

    render_header(app, frame, header_area);

    let widths = app.widths_for(body_area.width);
    let [chat_col, panel_col, logs_col] = Layout::horizontal([
        Constraint::Length(widths.chat),
        Constraint::Length(widths.processes),
        Constraint::Min(0),
    ])
    .areas(body_area);
    app.areas.dividers = [panel_col.x, logs_col.x];

    render_chat_column(app, frame, chat_col);
    render_panel(app, frame, panel_col);
    render_logs(app, frame, logs_col);
    render_footer(app, frame, footer_area);
    render_notices(app, frame, body_area);

    // Overlays, at most one at a time
    if app.session.diff.modal().is_some() {
        render_diff_modal(app, frame, area);
    } else if app.session.picker.is_some() {
        render_picker(app, frame, area);
    }
}

fn focus_border(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn button_span(label: String, selected: bool) -> Span<'static> {
    let style = if selected {
        Style::default()
            .bg(Color::Yellow)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().bg(Color::Blue).fg(Color::White)
    };
    Span::styled(format!(" {} ", label), style)
}

fn flash_suffix(app: &App, target: CopyTarget) -> Option<Span<'static>> {
    let flash = app.copy_flash.filter(|f| f.target == target)?;
    Some(if flash.ok {
        Span::styled(" ✓ skopiowano ", Style::default().fg(Color::Green))
    } else {
        Span::styled(" ✗ błąd kopiowania ", Style::default().fg(Color::Red))
    })
}

/// First line offset that keeps `selected` inside a window of `height` rows
fn scroll_to(selected: Option<usize>, height: usize) -> usize {
    match selected {
        Some(line) if height > 0 && line >= height => line + 1 - height,
        _ => 0,
    }
}

/// Record rows visible in `inner` after scrolling by `offset` lines
fn visible_rows(rows: &[(usize, usize)], inner: Rect, offset: usize) -> Vec<(u16, usize)> {
    rows.iter()
        .filter(|(line, _)| *line >= offset && line - offset < inner.height as usize)
        .map(|(line, target)| (inner.y + (line - offset) as u16, *target))
        .collect()
}

/// Rows a list of lines occupies once wrapped to `width`
fn wrapped_height(lines: &[Line], width: u16) -> u16 {
    let width = width.max(1) as usize;
    let rows: usize = lines
        .iter()
        .map(|line| line.width().max(1).div_ceil(width))
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}

fn centered(area: Rect, width_pct: u32, height_pct: u32) -> Rect {
    let width = (u32::from(area.width) * width_pct / 100) as u16;
    let height = (u32::from(area.height) * height_pct / 100) as u16;
    Rect::new(
        area.x + (area.width.saturating_sub(width)) / 2,
        area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    )
}

// ============================================================================
// Header and footer
// ============================================================================

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let (dot, color, state) = if app.session.connected {
        ("●", Color::Green, "połączono")
    } else {
        ("○", Color::Red, "rozłączono")
    };

    let title = Line::from(vec![
        Span::styled(" Dockfra ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!("{} {} ", dot, state), Style::default().fg(color)),
        Span::styled(
            app.client.base_url().to_string(),
            Style::default().fg(Color::White),
        ),
        Span::raw(" "),
        Span::styled(
            format!("[{}]", app.config.language.to_uppercase()),
            Style::default().fg(Color::Yellow),
        ),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn footer_hints(app: &App) -> Vec<(&'static str, &'static str)> {
    if app.session.diff.modal().is_some() {
        return vec![("Tab", "zakładka"), ("j/k", "przewiń"), ("Esc", "zamknij")];
    }
    if app.session.picker.is_some() {
        return vec![
            ("j/k", "nav"),
            ("Enter", "wybierz"),
            ("r", "odśwież"),
            ("s", "skanuj"),
            ("Esc", "zamknij"),
        ];
    }
    if app.input_mode == InputMode::Editing {
        return vec![("Enter", "wyślij"), ("Esc", "anuluj")];
    }

    let mut hints = match app.focus {
        FocusPane::Chat => vec![
            ("j/k", "przewiń"),
            ("n/p", "przycisk"),
            ("Enter", "akcja"),
            ("i", "pisz"),
            ("c", "kopiuj"),
        ],
        FocusPane::Widgets => vec![
            ("j/k", "nav"),
            ("Enter", "akcja"),
            ("h/l", "opcja"),
            ("e", "edytuj"),
            ("1-9", "chip"),
            ("d", "wykryj"),
            ("o", "IP"),
        ],
        FocusPane::Panel => {
            let mut hints = vec![("j/k", "nav"), ("]", "zakładka"), ("R", "odśwież")];
            match app.session.panel_tab {
                PanelTab::Processes => hints.extend([
                    ("s", "stop"),
                    ("r", "restart"),
                    ("p", "port"),
                    ("f", "napraw"),
                    ("c", "kopiuj"),
                ]),
                PanelTab::Services => hints.extend([("Enter", "logi"), ("f", "napraw")]),
                PanelTab::Stats => hints.push(("Enter", "akcja")),
            }
            hints
        }
        FocusPane::Logs => vec![("j/k", "przewiń"), ("G", "na dół"), ("c", "kopiuj")],
    };
    hints.extend([("Tab", "fokus"), ("</>", "szerokość"), ("F2", "język"), ("q", "wyjdź")]);
    hints
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " EDYCJA ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut spans = vec![
        Span::styled(mode_text, mode_style),
        Span::styled(" ", label_style),
    ];
    for (key, label) in footer_hints(app) {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }

    let footer = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

// ============================================================================
// Chat column: transcript, widgets, input bar
// ============================================================================

fn render_chat_column(app: &mut App, frame: &mut Frame, area: Rect) {
    let (widget_lines, widget_rows) = widget_lines(app);
    let widget_height = if app.session.widgets.blocks().is_empty() {
        0
    } else {
        (widget_lines.len() as u16 + 2).min(area.height / 2)
    };

    let [chat_area, widgets_area, input_area] = Layout::vertical([
        Constraint::Min(3),
        Constraint::Length(widget_height),
        Constraint::Length(3),
    ])
    .areas(area);

    app.areas.chat = chat_area;
    app.areas.widgets = widgets_area;
    app.areas.input = input_area;

    render_chat(app, frame, chat_area);
    if widget_height > 0 {
        render_widgets(app, frame, widgets_area, widget_lines, &widget_rows);
    }
    render_input(app, frame, input_area);
}

fn inline_span(span: TextSpan, target: &mut usize, selected: Option<usize>) -> Span<'static> {
    match span {
        TextSpan::Plain(t) => Span::raw(t),
        TextSpan::Bold(t) => Span::styled(t, Style::default().add_modifier(Modifier::BOLD)),
        TextSpan::Italic(t) => Span::styled(t, Style::default().add_modifier(Modifier::ITALIC)),
        TextSpan::Code(t) => Span::styled(t, Style::default().fg(Color::Yellow)),
        TextSpan::Link { label, url } => Span::styled(
            format!("{} <{}>", label, url),
            Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::UNDERLINED),
        ),
        TextSpan::Action { label, .. } => {
            let span = button_span(label, selected == Some(*target));
            *target += 1;
            span
        }
    }
}

fn chat_lines(app: &App, width: u16) -> Vec<Line<'static>> {
    let session = &app.session;
    // Target numbering must follow `app::chat_targets`
    let selected = app.chat_target;
    let mut target = 0usize;
    let mut lines: Vec<Line<'static>> = Vec::new();

    for (index, message) in session.transcript.messages().iter().enumerate() {
        match message.role {
            ChatRole::User => {
                lines.push(Line::from(Span::styled(
                    "Ty:",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
                lines.extend(message.text.lines().map(|l| Line::from(l.to_string())));
            }
            ChatRole::Bot => {
                let mut head = vec![Span::styled(
                    "Dockfra:",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )];
                if message.from_cli() {
                    head.push(Span::raw(" "));
                    head.push(Span::styled(
                        " CLI ",
                        Style::default().bg(Color::Magenta).fg(Color::White),
                    ));
                }
                lines.push(Line::from(head));

                if let Some((_, set)) = session.cards_for_message(index) {
                    for card in &set.cards {
                        lines.push(Line::from(vec![
                            Span::raw(format!("{} ", card.ticket.icon)),
                            Span::styled(card.ticket.id.clone(), Style::default().bold()),
                            Span::raw(format!(" {}", card.ticket.title)),
                        ]));
                        let mut buttons = vec![Span::raw("  ")];
                        for button in &card.buttons {
                            let label = if button.is_diff {
                                card.diff_badge.label()
                            } else {
                                button.label.to_string()
                            };
                            buttons.push(button_span(label, selected == Some(target)));
                            buttons.push(Span::raw(" "));
                            target += 1;
                        }
                        lines.push(Line::from(buttons));
                    }
                } else {
                    for block in text::parse_markdown(&message.text) {
                        match block {
                            TextBlock::Heading { spans, .. } => {
                                let heading = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
                                lines.push(Line::from(
                                    spans
                                        .into_iter()
                                        .map(|s| inline_span(s, &mut target, selected).patch_style(heading))
                                        .collect::<Vec<_>>(),
                                ));
                            }
                            TextBlock::Rule => lines.push(Line::styled(
                                "─".repeat(width as usize),
                                Style::default().fg(Color::DarkGray),
                            )),
                            TextBlock::Code { lines: code, .. } => {
                                lines.extend(code.into_iter().map(|l| {
                                    Line::styled(format!("  {}", l), Style::default().fg(Color::Yellow))
                                }));
                            }
                            TextBlock::Line(spans) => lines.push(Line::from(
                                spans
                                    .into_iter()
                                    .map(|s| inline_span(s, &mut target, selected))
                                    .collect::<Vec<_>>(),
                            )),
                        }
                    }
                }
            }
        }
        lines.push(Line::default());
    }
    lines
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Chat;
    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2);

    let mut title = vec![Span::raw(" Czat ")];
    title.extend(flash_suffix(app, CopyTarget::Chat));
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(focus_border(focused))
        .title(Line::from(title));

    if app.session.transcript.is_empty() {
        let placeholder = Paragraph::new(Text::from(Span::styled(
            "Czekam na wiadomości z kreatora...",
            Style::default().fg(Color::DarkGray),
        )))
        .block(chat_block);
        frame.render_widget(placeholder, area);
        return;
    }

    let lines = chat_lines(app, inner_width);
    let max_scroll = wrapped_height(&lines, inner_width).saturating_sub(inner_height);
    // Reaching the bottom re-enables following new messages
    if app.chat_follow || app.chat_scroll >= max_scroll {
        app.chat_scroll = max_scroll;
        app.chat_follow = true;
    }

    let chat = Paragraph::new(lines)
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, area);
}

fn widget_lines(app: &App) -> Rows {
    let session = &app.session;
    let selected = (app.focus == FocusPane::Widgets).then_some(app.widget_target);
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut rows = Vec::new();
    let mut target = 0usize;

    for block in session.widgets.blocks() {
        match block {
            WidgetBlock::Buttons(buttons) => {
                if let Some(label) = &buttons.label {
                    lines.push(Line::styled(label.clone(), Style::default().bold()));
                }
                for item in &buttons.items {
                    rows.push((lines.len(), target));
                    lines.push(Line::from(vec![
                        Span::raw(" "),
                        button_span(item.label.clone(), selected == Some(target)),
                    ]));
                    target += 1;
                }
            }
            WidgetBlock::Form(fields) => {
                for field in fields {
                    if !session.widgets.is_visible(field, &session.form) {
                        continue;
                    }
                    rows.push((lines.len(), target));
                    field_lines(session, field, selected == Some(target), &mut lines);
                    target += 1;
                }
            }
            WidgetBlock::Code(code) => {
                lines.extend(code.lines().map(|l| {
                    Line::styled(format!("  {}", l), Style::default().fg(Color::Yellow))
                }));
            }
            WidgetBlock::StatusRow(items) => {
                let mut spans = Vec::new();
                for item in items {
                    let (icon, color) = if item.ok {
                        ("✅", Color::Green)
                    } else {
                        ("❌", Color::Red)
                    };
                    spans.push(Span::styled(
                        format!("{} {}", icon, item.name),
                        Style::default().fg(color),
                    ));
                    if let Some(detail) = &item.detail {
                        spans.push(Span::styled(
                            format!(" ({})", detail),
                            Style::default().fg(Color::DarkGray),
                        ));
                    }
                    spans.push(Span::raw("  "));
                }
                lines.push(Line::from(spans));
            }
            WidgetBlock::ActionGrid(grid) => {
                if let Some(label) = &grid.label {
                    lines.push(Line::styled(label.clone(), Style::default().bold()));
                }
                for card in &grid.cards {
                    rows.push((lines.len(), target));
                    lines.push(grid_card_line(card, selected == Some(target)));
                    if !card.command.desc.is_empty() {
                        lines.push(Line::styled(
                            format!("    {}", card.command.desc),
                            Style::default().fg(Color::DarkGray),
                        ));
                    }
                    target += 1;
                }
            }
        }
    }
    (lines, rows)
}

fn field_lines(
    session: &WizardSession,
    field: &FormField,
    selected: bool,
    lines: &mut Vec<Line<'static>>,
) {
    let marker = if selected { "> " } else { "  " };
    let label_style = if selected {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };
    let value = session.field_value(field.name());
    let dim = Style::default().fg(Color::DarkGray);

    let mut spans = vec![Span::styled(format!("{}{}: ", marker, field.label()), label_style)];
    let (detect, desc_open, help_url) = match field {
        FormField::Input(input) => {
            if value.is_empty() {
                spans.push(Span::styled(input.placeholder.clone(), dim.italic()));
            } else if input.widget.secret && !input.revealed {
                spans.push(Span::raw("•".repeat(value.chars().count())));
            } else {
                spans.push(Span::styled(value.clone(), Style::default().fg(Color::Cyan)));
            }
            if input.widget.secret {
                spans.push(Span::styled(if input.revealed { " 🙈" } else { " 👁" }, dim));
            }
            if input.widget.modal_type.as_deref() == Some("ip_picker") {
                spans.push(Span::styled(" 🌐", dim));
            }
            (input.detect, input.desc_open, input.widget.help_url.as_ref())
        }
        FormField::Select(select) => {
            let shown = select
                .widget
                .options
                .iter()
                .find(|o| o.value == value)
                .map(|o| o.label.clone())
                .unwrap_or_else(|| value.clone());
            spans.push(Span::styled(
                format!("‹ {} ›", shown),
                Style::default().fg(Color::Cyan),
            ));
            (select.detect, select.desc_open, select.widget.help_url.as_ref())
        }
    };
    if field.autodetect() {
        let icon = match detect {
            DetectState::Ready => " 🔍",
            DetectState::Running => " ⏳",
            DetectState::Done => " ✓",
        };
        spans.push(Span::styled(icon, dim));
    }
    lines.push(Line::from(spans));

    if let FormField::Input(input) = field {
        let chips: Vec<_> = input
            .widget
            .chips
            .iter()
            .chain(&input.detected_chips)
            .take(9)
            .collect();
        if !chips.is_empty() {
            let mut spans = vec![Span::raw("    ")];
            for (i, chip) in chips.iter().enumerate() {
                let style = if input.active_chip == Some(i) {
                    Style::default().bg(Color::Green).fg(Color::Black)
                } else {
                    Style::default().bg(Color::DarkGray).fg(Color::White)
                };
                spans.push(Span::styled(format!(" {}:{} ", i + 1, chip.label), style));
                spans.push(Span::raw(" "));
            }
            lines.push(Line::from(spans));
        }
    }
    if let Some(hint) = field.hint(&value).filter(|h| !h.is_empty()) {
        lines.push(Line::styled(format!("    {}", hint), dim));
    }
    if desc_open {
        if let Some(desc) = field.desc() {
            lines.extend(desc.lines().map(|l| Line::styled(format!("    {}", l), dim.italic())));
        }
    }
    if let Some(url) = help_url {
        lines.push(Line::styled(
            format!("    ↗ {}", url),
            Style::default().fg(Color::Blue),
        ));
    }
}

fn grid_card_line(card: &GridCard, selected: bool) -> Line<'static> {
    let marker = if selected { "> " } else { "  " };
    let style = if selected {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };
    let dim = Style::default().fg(Color::DarkGray);
    let mut spans = vec![Span::styled(format!("{}▶ {}", marker, card.command.cmd), style)];

    match &card.param {
        ParamInput::None => {
            if card.command.tty {
                spans.push(Span::styled(" [tty]", dim));
            }
        }
        ParamInput::Text(text) if text.is_empty() => {
            spans.push(Span::styled(format!(" [{}]", card.placeholder()), dim.italic()));
        }
        ParamInput::Text(text) => {
            spans.push(Span::styled(format!(" [{}]", text), Style::default().fg(Color::Cyan)));
        }
        ParamInput::Loading { .. } => spans.push(Span::styled(" [⏳ ładowanie opcji]", dim)),
        ParamInput::Choice {
            options,
            selected: choice,
            custom,
        } => {
            let shown = match choice {
                Some(i) if *i < options.len() => options[*i].label.clone(),
                Some(_) if custom.is_empty() => format!("✏ {}", card.placeholder()),
                Some(_) => format!("✏ {}", custom),
                None => card.placeholder(),
            };
            spans.push(Span::styled(
                format!(" ‹ {} ›", shown),
                Style::default().fg(Color::Cyan),
            ));
        }
    }
    if card.required {
        spans.push(Span::styled(" ⚠ wymagany argument", Style::default().fg(Color::Red)));
    }
    Line::from(spans)
}

fn render_widgets(
    app: &mut App,
    frame: &mut Frame,
    area: Rect,
    lines: Vec<Line<'static>>,
    rows: &[(usize, usize)],
) {
    let focused = app.focus == FocusPane::Widgets;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(focus_border(focused))
        .title(" Widgety ");
    let inner = block.inner(area);

    let selected_line = rows
        .iter()
        .find(|(_, target)| *target == app.widget_target)
        .map(|(line, _)| *line);
    let offset = scroll_to(selected_line, inner.height as usize);
    app.areas.widget_rows = visible_rows(rows, inner, offset);

    let widgets = Paragraph::new(lines)
        .block(block)
        .scroll((offset as u16, 0));
    frame.render_widget(widgets, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };

    let title = match &app.edit_target {
        EditTarget::Chat => " Wiadomość (i) ".to_string(),
        EditTarget::Field(name) => format!(" Pole: {} ", name),
        EditTarget::GridArg { block, card } => {
            let cmd = match app.session.widgets.blocks().get(*block) {
                Some(WidgetBlock::ActionGrid(grid)) => grid
                    .cards
                    .get(*card)
                    .map(|c| c.command.cmd.clone())
                    .unwrap_or_default(),
                _ => String::new(),
            };
            format!(" Argument: {} ", cmd)
        }
        EditTarget::Port(name) => format!(" Nowy port: {} ", name),
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);
    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

// ============================================================================
// Side panel: processes, services, stats
// ============================================================================

fn placeholder<T>(data: &PanelData<T>, lines: &mut Vec<Line<'static>>) {
    match data {
        PanelData::Loading => lines.push(Line::styled(
            "Ładowanie...",
            Style::default().fg(Color::DarkGray),
        )),
        PanelData::Failed(e) => lines.push(Line::styled(
            format!("⚠ {}", e),
            Style::default().fg(Color::Red),
        )),
        PanelData::Ready(_) => {}
    }
}

fn row_marker(selected: bool) -> Span<'static> {
    if selected {
        Span::styled("> ", Style::default().fg(Color::Yellow))
    } else {
        Span::raw("  ")
    }
}

fn process_lines(app: &App) -> Rows {
    let focused = app.focus == FocusPane::Panel;
    let dim = Style::default().fg(Color::DarkGray);
    let mut lines = Vec::new();
    let mut rows = Vec::new();

    placeholder(&app.session.processes.entries, &mut lines);
    if let Some(entries) = app.session.processes.entries.ready() {
        if entries.is_empty() {
            lines.push(Line::styled("Brak procesów", dim));
        }
        for (i, process) in entries.iter().enumerate() {
            let (icon, color) = match process.status {
                ProcessStatus::Running => ("🟢", Color::Green),
                ProcessStatus::Stopped => ("🔴", Color::Red),
                ProcessStatus::Unknown => ("⚪", Color::DarkGray),
            };
            rows.push((lines.len(), i));
            let mut spans = vec![
                row_marker(focused && app.panel_row == i),
                Span::raw(format!("{} ", icon)),
                Span::styled(process.name.clone(), Style::default().fg(color).bold()),
            ];
            if let Some(ports) = process.ports.as_ref().filter(|p| !p.is_empty()) {
                spans.push(Span::styled(format!(" :{}", ports), dim));
            }
            lines.push(Line::from(spans));
            if !process.details.is_empty() {
                lines.push(Line::styled(format!("    {}", process.details), dim));
            }
        }
    }

    let progress = app.session.processes.progress();
    if !progress.is_empty() {
        lines.push(Line::default());
    }
    for row in progress {
        let (icon, color) = match row.state {
            ProgressState::Running => (SPINNER[app.animation_frame as usize % 3], Color::Yellow),
            ProgressState::Done => (row.state.icon(), Color::Green),
            ProgressState::Failed => (row.state.icon(), Color::Red),
        };
        lines.push(Line::styled(
            format!("  {} {}", icon, row.label),
            Style::default().fg(color),
        ));
    }

    if let Some(message) = &app.status_message {
        lines.push(Line::default());
        lines.push(Line::styled(message.clone(), Style::default().fg(Color::Yellow)));
    }
    (lines, rows)
}

fn service_lines(app: &App) -> Rows {
    let focused = app.focus == FocusPane::Panel;
    let dim = Style::default().fg(Color::DarkGray);
    let mut lines = Vec::new();
    let mut rows = Vec::new();

    placeholder(&app.session.services, &mut lines);
    if let Some(services) = app.session.services.ready() {
        if services.is_empty() {
            lines.push(Line::styled("Brak serwisów aplikacji", dim));
        }
        for (i, service) in services.iter().enumerate() {
            let (icon, color) = if service.up {
                ("🟢", Color::Green)
            } else {
                ("🔴", Color::Red)
            };
            rows.push((lines.len(), i));
            let mut spans = vec![
                row_marker(focused && app.panel_row == i),
                Span::raw(format!("{} ", icon)),
                Span::styled(service.display_name.clone(), Style::default().fg(color).bold()),
            ];
            if !service.ports.is_empty() {
                spans.push(Span::styled(format!(" {}", service.ports), dim));
            }
            lines.push(Line::from(spans));
        }
    }
    (lines, rows)
}

fn section_title(title: &str) -> Line<'static> {
    Line::styled(
        title.to_string(),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )
}

fn stats_lines(app: &App) -> Rows {
    let stats = &app.session.stats;
    let selected = (app.focus == FocusPane::Panel).then_some(app.panel_row);
    let dim = Style::default().fg(Color::DarkGray);
    let mut lines = Vec::new();
    let mut rows = Vec::new();
    // Target numbering must follow `app::stats_targets`
    let mut target = 0usize;

    lines.push(section_title("🎫 Tickety"));
    placeholder(&stats.tickets, &mut lines);
    if let Some(tickets) = stats.tickets.ready() {
        if tickets.is_empty() {
            lines.push(Line::styled("Brak ticketów", dim));
        }
        for ticket in tickets {
            lines.push(Line::from(vec![
                Span::raw(format!("{} {} ", ticket.status.icon(), priority_icon(&ticket.priority))),
                Span::styled(ticket.id.clone(), Style::default().bold()),
                Span::raw(format!(" {}", ticket.title)),
            ]));
            rows.push((lines.len(), target));
            let mut buttons = vec![Span::raw("  ")];
            for button in stats_actions(ticket) {
                let label = match stats.diff_counts.get(&ticket.id) {
                    Some(count) if button.is_diff => format!("📄 {}", count),
                    _ => button.label.to_string(),
                };
                buttons.push(button_span(label, selected == Some(target)));
                buttons.push(Span::raw(" "));
                target += 1;
            }
            lines.push(Line::from(buttons));
        }
    }

    lines.push(Line::default());
    placeholder(&stats.stats, &mut lines);
    let suggestions_start = target;
    if let Some(data) = stats.stats.ready() {
        lines.push(section_title("🌿 Git"));
        lines.push(Line::raw(format!(
            "  {} · dziś: {}",
            data.git.branch.as_deref().unwrap_or("?"),
            data.git.commits_today
        )));
        if let Some(last) = &data.git.last_commit {
            lines.push(Line::styled(format!("  {}", last), dim));
        }

        lines.push(section_title("🐳 Kontenery"));
        lines.push(Line::from(vec![
            Span::styled(
                format!("  {} działa", data.containers.running),
                Style::default().fg(Color::Green),
            ),
            Span::raw("  "),
            Span::styled(
                format!("{} błędów", data.containers.failing),
                Style::default().fg(if data.containers.failing > 0 {
                    Color::Red
                } else {
                    Color::DarkGray
                }),
            ),
        ]));

        let integrations = data.active_integrations();
        lines.push(section_title("🔌 Integracje"));
        lines.push(if integrations.is_empty() {
            Line::styled("  brak", dim)
        } else {
            Line::raw(format!("  {}", integrations.join(", ")))
        });

        if !data.suggestions.is_empty() {
            lines.push(section_title("💡 Sugestie"));
        }
        let mut suggestion_target = suggestions_start;
        for suggestion in &data.suggestions {
            if suggestion.action.is_empty() {
                lines.push(Line::styled(
                    format!("  {} {}", suggestion.icon, suggestion.text),
                    dim,
                ));
                continue;
            }
            rows.push((lines.len(), suggestion_target));
            lines.push(Line::from(vec![
                Span::raw("  "),
                button_span(
                    format!("{} {}", suggestion.icon, suggestion.text),
                    selected == Some(suggestion_target),
                ),
            ]));
            suggestion_target += 1;
        }
    }

    lines.push(section_title("👩‍💻 Developer"));
    placeholder(&stats.developer, &mut lines);
    if let Some(health) = stats.developer.ready() {
        let spans: Vec<Span> = health
            .badges()
            .into_iter()
            .flat_map(|(ok, label)| {
                let color = if ok { Color::Green } else { Color::Red };
                [
                    Span::styled(format!(" {} ", label), Style::default().fg(color)),
                    Span::raw(" "),
                ]
            })
            .collect();
        lines.push(Line::from(spans));
    }

    lines.push(section_title("⚙ Silniki"));
    placeholder(&stats.engines, &mut lines);
    if let Some(status) = stats.engines.ready() {
        for engine in &status.engines {
            let mut spans = vec![Span::styled(
                format!("  {} {}", if engine.ok { "✅" } else { "❌" }, engine.name),
                Style::default().fg(if engine.ok { Color::Green } else { Color::Red }),
            )];
            if status.is_preferred(engine) {
                spans.push(Span::styled(" ★", Style::default().fg(Color::Yellow)));
            }
            if let Some(message) = &engine.message {
                spans.push(Span::styled(format!(" {}", message), dim));
            }
            lines.push(Line::from(spans));
        }
    }
    (lines, rows)
}

fn render_panel(app: &mut App, frame: &mut Frame, area: Rect) {
    app.areas.panel = area;
    let focused = app.focus == FocusPane::Panel;

    let mut title = vec![Span::raw(" ")];
    for (i, tab) in PanelTab::all().into_iter().enumerate() {
        if i > 0 {
            title.push(Span::styled(" │ ", Style::default().fg(Color::DarkGray)));
        }
        let style = if tab == app.session.panel_tab {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        title.push(Span::styled(tab.title(), style));
    }
    title.push(Span::raw(" "));
    if app.session.panel_tab == PanelTab::Processes {
        title.extend(flash_suffix(app, CopyTarget::Processes));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(focus_border(focused))
        .title(Line::from(title));
    let inner = block.inner(area);

    let (lines, rows) = match app.session.panel_tab {
        PanelTab::Processes => process_lines(app),
        PanelTab::Services => service_lines(app),
        PanelTab::Stats => stats_lines(app),
    };

    // Stats rows start a run of button targets
    let selected_line = rows
        .iter()
        .rev()
        .find(|(_, row)| *row <= app.panel_row)
        .map(|(line, _)| *line);
    let offset = scroll_to(selected_line, inner.height as usize);
    app.areas.panel_rows = visible_rows(&rows, inner, offset);

    let panel = Paragraph::new(lines).block(block).scroll((offset as u16, 0));
    frame.render_widget(panel, area);
}

// ============================================================================
// Logs
// ============================================================================

fn log_style(class: LogClass) -> Style {
    match class {
        LogClass::Done => Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        LogClass::Err => Style::default().fg(Color::Red),
        LogClass::Pull => Style::default().fg(Color::Blue),
        LogClass::Build => Style::default().fg(Color::Magenta),
        LogClass::Restart | LogClass::Warn => Style::default().fg(Color::Yellow),
        LogClass::Ok => Style::default().fg(Color::Green),
        LogClass::Dim => Style::default().fg(Color::DarkGray),
        LogClass::Plain => Style::default(),
    }
}

fn render_logs(app: &mut App, frame: &mut Frame, area: Rect) {
    app.areas.logs = area;
    let focused = app.focus == FocusPane::Logs;

    let mut title = vec![Span::raw(" Logi ")];
    if app.log_back > 0 {
        title.push(Span::styled(
            format!("↑{} ", app.log_back),
            Style::default().fg(Color::Yellow),
        ));
    }
    if let Some(error) = &app.log_error {
        title.push(Span::styled(
            format!("⚠ {} ", error),
            Style::default().fg(Color::Red),
        ));
    }
    title.extend(flash_suffix(app, CopyTarget::Logs));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(focus_border(focused))
        .title(Line::from(title));

    let height = area.height.saturating_sub(2) as usize;
    let end = app.session.logs.len().saturating_sub(app.log_back);
    let start = end.saturating_sub(height);
    let lines: Vec<Line> = app
        .session
        .logs
        .lines()
        .skip(start)
        .take(end - start)
        .map(|entry| Line::styled(entry.text.clone(), log_style(entry.class)))
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

// ============================================================================
// Overlays
// ============================================================================

fn render_notices(app: &App, frame: &mut Frame, area: Rect) {
    let width = 60.min(area.width.saturating_sub(2));
    let mut bottom = area.y + area.height;
    for notice in app.session.diff.notices().iter().rev().take(3) {
        let height = 4;
        if bottom < area.y + height {
            break;
        }
        bottom -= height;
        let toast = Rect::new(area.x + area.width - width - 1, bottom, width, height);
        frame.render_widget(Clear, toast);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(format!(" 📄 {} (x zamyka) ", notice.ticket_id));
        let text = vec![
            Line::styled(notice.title.clone(), Style::default().bold()),
            Line::styled(notice.hint(), Style::default().fg(Color::DarkGray)),
        ];
        frame.render_widget(
            Paragraph::new(text).block(block).wrap(Wrap { trim: true }),
            toast,
        );
    }
}

fn diff_style(kind: DiffLineKind) -> Style {
    match kind {
        DiffLineKind::File => Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        DiffLineKind::Hunk => Style::default().fg(Color::Cyan),
        DiffLineKind::Added => Style::default().fg(Color::Green),
        DiffLineKind::Removed => Style::default().fg(Color::Red),
        DiffLineKind::Meta => Style::default().fg(Color::Yellow),
        DiffLineKind::Context => Style::default().fg(Color::Gray),
    }
}

fn render_diff_modal(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup = centered(area, 90, 85);
    app.areas.modal = Some(popup);
    let Some(modal) = app.session.diff.modal() else {
        return;
    };
    let dim = Style::default().fg(Color::DarkGray);

    frame.render_widget(Clear, popup);
    let title = match &modal.data.title {
        Some(title) => format!(" 📄 {}: {} ", modal.ticket_id, title),
        None => format!(" 📄 {} ", modal.ticket_id),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title);
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let [tabs_area, body_area] =
        Layout::vertical([Constraint::Length(2), Constraint::Min(0)]).areas(inner);

    let mut tabs = Vec::new();
    for tab in DiffTab::all() {
        let style = if tab == modal.tab {
            Style::default().bg(Color::Cyan).fg(Color::Black).bold()
        } else {
            Style::default().fg(Color::Gray)
        };
        tabs.push(Span::styled(format!(" {} ", tab.title()), style));
        tabs.push(Span::raw(" "));
    }
    if let Some(status) = &modal.data.status {
        tabs.push(Span::styled(format!(" [{}]", status), dim));
    }
    frame.render_widget(Paragraph::new(Line::from(tabs)), tabs_area);

    let mut lines: Vec<Line> = Vec::new();
    if let Some(error) = &modal.data.error {
        lines.push(Line::styled(format!("⚠ {}", error), Style::default().fg(Color::Red)));
    }
    match modal.tab {
        DiffTab::Diff => {
            if modal.data.has_diff() {
                lines.extend(
                    classify_diff(&modal.data.diff)
                        .into_iter()
                        .map(|(kind, line)| Line::styled(line.to_string(), diff_style(kind))),
                );
            } else {
                lines.push(Line::styled("(pusty diff)", dim));
            }
        }
        DiffTab::Commits => {
            if modal.data.has_commits() {
                for commit in &modal.data.commits {
                    lines.push(Line::from(vec![
                        Span::styled(commit.hash.clone(), Style::default().fg(Color::Yellow)),
                        Span::styled(format!(" [{}] ", commit.repo), dim),
                        Span::raw(commit.subject.clone()),
                    ]));
                }
            } else {
                lines.push(Line::styled("(brak commitów)", dim));
            }
        }
        DiffTab::Ticket => match &modal.detail {
            None => lines.push(Line::styled("(brak szczegółów)", dim)),
            Some(ticket) => {
                let mut meta = vec![
                    Span::raw(format!("{} {} ", ticket.status.icon(), ticket.status.display_name())),
                    Span::raw(format!("{} {} ", priority_icon(&ticket.priority), ticket.priority)),
                ];
                if let Some(assignee) = &ticket.assigned_to {
                    meta.push(Span::styled(format!("👤 {} ", assignee), dim));
                }
                if let Some(url) = ticket.github_url() {
                    meta.push(Span::styled(url, Style::default().fg(Color::Blue)));
                }
                lines.push(Line::from(meta));
                lines.push(Line::default());
                lines.push(Line::styled(ticket.title.clone(), Style::default().bold()));
                if let Some(description) = &ticket.description {
                    lines.extend(description.lines().map(|l| Line::raw(l.to_string())));
                }
                let comments = ticket.recent_comments();
                if !comments.is_empty() {
                    lines.push(Line::default());
                    lines.push(section_title(&format!("💬 Komentarze ({})", ticket.comments.len())));
                }
                for comment in comments {
                    lines.push(Line::from(vec![
                        Span::styled(format!("[{}] ", comment.short_timestamp()), dim),
                        Span::styled(
                            format!("{}: ", comment.author.as_deref().unwrap_or("?")),
                            Style::default().fg(Color::Cyan),
                        ),
                        Span::raw(comment.text.clone()),
                    ]));
                }
            }
        },
    }

    // Diff lines are kept unwrapped so indentation stays readable
    let mut body = Paragraph::new(lines).scroll((modal.scroll, 0));
    if modal.tab == DiffTab::Ticket {
        body = body.wrap(Wrap { trim: false });
    }
    frame.render_widget(body, body_area);
}

fn render_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup = centered(area, 70, 70);
    app.areas.modal = Some(popup);
    let Some(picker) = &app.session.picker else {
        return;
    };

    frame.render_widget(Clear, popup);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(
            " Wybierz IP: {} (Enter wybierz, r odśwież, s skanuj, Esc) ",
            picker.field
        ));

    let sections = match &picker.body {
        PickerBody::Loading { scan } => {
            let text = if *scan {
                "⏳ Skanowanie podsieci..."
            } else {
                "⏳ Ładowanie urządzeń..."
            };
            frame.render_widget(
                Paragraph::new(Line::styled(text, Style::default().fg(Color::Yellow))).block(block),
                popup,
            );
            return;
        }
        PickerBody::Failed(error) => {
            frame.render_widget(
                Paragraph::new(Line::styled(format!("⚠ {}", error), Style::default().fg(Color::Red)))
                    .block(block)
                    .wrap(Wrap { trim: true }),
                popup,
            );
            return;
        }
        PickerBody::Sections(sections) => sections,
    };

    let mut items: Vec<ListItem> = Vec::new();
    if picker.is_empty() {
        items.push(ListItem::new(Line::styled(
            "Nie znaleziono urządzeń, spróbuj skanowania (s)",
            Style::default().fg(Color::DarkGray),
        )));
    }
    // The note above is not a picker item
    let lead = items.len();

    for item in picker.items() {
        let line = match item {
            PickerItem::Header(s) => {
                let section = &sections[s];
                let arrow = match (section.collapsible(), section.collapsed) {
                    (false, _) => "",
                    (true, true) => "▸ ",
                    (true, false) => "▾ ",
                };
                Line::styled(
                    format!("{}{} ({})", arrow, section.kind.title(), section.rows.len()),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )
            }
            PickerItem::Row { section, row } => {
                let Some(device) = sections[section].visible_rows().get(row) else {
                    continue;
                };
                let ip_style = if device.ip == picker.current {
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().bold()
                };
                let mut spans = vec![
                    Span::raw(format!("  {} ", device.icon)),
                    Span::styled(device.ip.clone(), ip_style),
                    Span::raw(format!("  {}", device.primary)),
                ];
                if !device.secondary.is_empty() {
                    spans.push(Span::styled(
                        format!("  {}", device.secondary.join(" ")),
                        Style::default().fg(Color::DarkGray),
                    ));
                }
                if let Some(used) = &device.used_badge {
                    spans.push(Span::styled(
                        format!("  [użyte: {}]", used),
                        Style::default().fg(Color::Yellow),
                    ));
                }
                Line::from(spans)
            }
        };
        items.push(ListItem::new(line));
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    let mut state = ListState::default().with_selected(Some(lead + picker.cursor));
    frame.render_stateful_widget(list, popup, &mut state);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_to_keeps_selection_visible() {
        assert_eq!(scroll_to(None, 5), 0);
        assert_eq!(scroll_to(Some(3), 5), 0);
        assert_eq!(scroll_to(Some(7), 5), 3);
    }

    #[test]
    fn test_visible_rows_offsets_by_scroll() {
        let inner = Rect::new(0, 10, 20, 2);
        let rows = [(0, 0), (2, 1), (3, 2), (5, 3)];
        assert_eq!(visible_rows(&rows, inner, 2), vec![(10, 1), (11, 2)]);
    }

    #[test]
    fn test_wrapped_height() {
        let lines = vec![Line::raw("abcdefghij"), Line::default(), Line::raw("abc")];
        assert_eq!(wrapped_height(&lines, 4), 3 + 1 + 1);
    }

    #[test]
    fn test_centered_fits_inside() {
        let area = Rect::new(0, 0, 100, 40);
        let popup = centered(area, 50, 50);
        assert_eq!(popup, Rect::new(25, 10, 50, 20));
    }
}
