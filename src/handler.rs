use std::time::Instant;

use anyhow::{anyhow, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use dockfra_core::panels::{Divider, PanelTab, ProcessAction};
use dockfra_core::widget::{FormField, WidgetTarget};
use ratatui::layout::Rect;

use crate::app::{App, CopyTarget, EditTarget, FocusPane, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(Instant::now()),
        AppEvent::Socket(event) => {
            let requests = app.session.apply_socket_event(event, Instant::now());
            app.run_all(requests);
        }
        AppEvent::Fetched(fetched) => app.apply_fetched(*fetched),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.session.diff.modal().is_some() {
        handle_modal_key(app, key);
    } else if app.session.picker.is_some() {
        handle_picker_key(app, key);
    } else if app.input_mode == InputMode::Editing {
        handle_editing(app, key);
    } else {
        handle_normal(app, key);
    }
}

fn handle_modal_key(app: &mut App, key: KeyEvent) {
    if matches!(key.code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('x')) {
        app.session.diff.close();
        return;
    }
    let Some(modal) = app.session.diff.modal_mut() else {
        return;
    };
    match key.code {
        KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => modal.next_tab(),
        KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => modal.previous_tab(),
        KeyCode::Char('j') | KeyCode::Down => modal.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => modal.scroll_up(1),
        KeyCode::PageDown | KeyCode::Char(' ') => modal.scroll_down(10),
        KeyCode::PageUp => modal.scroll_up(10),
        KeyCode::Char('g') => modal.scroll = 0,
        _ => {}
    }
}

fn handle_picker_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => app.session.picker = None,
        KeyCode::Char('j') | KeyCode::Down => {
            if let Some(picker) = app.session.picker.as_mut() {
                picker.move_cursor(1);
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            if let Some(picker) = app.session.picker.as_mut() {
                picker.move_cursor(-1);
            }
        }
        KeyCode::Enter | KeyCode::Char(' ') => app.session.picker_activate(),
        KeyCode::Char('r') => app.load_devices(false),
        KeyCode::Char('s') => app.load_devices(true),
        _ => {}
    }
}

fn handle_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.submit_input(),
        KeyCode::Esc => app.cancel_edit(),
        KeyCode::Char(c) => {
            let byte_idx = char_to_byte_index(&app.input, app.input_cursor);
            app.input.insert(byte_idx, c);
            app.input_cursor += 1;
        }
        KeyCode::Backspace => {
            if app.input_cursor > 0 {
                app.input_cursor -= 1;
                let byte_idx = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_idx);
            }
        }
        KeyCode::Delete => {
            if app.input_cursor < app.input.chars().count() {
                let byte_idx = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_idx);
            }
        }
        KeyCode::Left => app.input_cursor = app.input_cursor.saturating_sub(1),
        KeyCode::Right => {
            app.input_cursor = (app.input_cursor + 1).min(app.input.chars().count());
        }
        KeyCode::Home => app.input_cursor = 0,
        KeyCode::End => app.input_cursor = app.input.chars().count(),
        _ => {}
    }
}

fn handle_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => {
            app.should_quit = true;
            return;
        }
        KeyCode::Tab => {
            app.focus = app.focus.next();
            return;
        }
        KeyCode::BackTab => {
            app.focus = app.focus.previous();
            return;
        }
        KeyCode::Char('i') | KeyCode::Char('/') => {
            app.focus = FocusPane::Chat;
            app.edit_target = EditTarget::Chat;
            app.input_mode = InputMode::Editing;
            return;
        }
        KeyCode::F(2) => {
            app.cycle_language();
            return;
        }
        KeyCode::Char('x') => {
            app.session.diff.dismiss_notice(0);
            return;
        }
        KeyCode::Char(']') => {
            app.switch_tab(app.session.panel_tab.next());
            return;
        }
        KeyCode::Char('<') | KeyCode::Char('>') | KeyCode::Char('{') | KeyCode::Char('}') => {
            let (divider, delta) = match key.code {
                KeyCode::Char('<') => (Divider::ChatProcesses, -2),
                KeyCode::Char('>') => (Divider::ChatProcesses, 2),
                KeyCode::Char('{') => (Divider::ProcessesLogs, -2),
                _ => (Divider::ProcessesLogs, 2),
            };
            app.drag_divider(divider, delta);
            app.save_widths();
            return;
        }
        _ => {}
    }

    match app.focus {
        FocusPane::Chat => handle_chat_key(app, key),
        FocusPane::Widgets => handle_widget_key(app, key),
        FocusPane::Panel => handle_panel_key(app, key),
        FocusPane::Logs => handle_log_key(app, key),
    }
}

fn handle_chat_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => {
            app.chat_scroll = app.chat_scroll.saturating_add(1);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.chat_follow = false;
            app.chat_scroll = app.chat_scroll.saturating_sub(1);
        }
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.chat_scroll = app.chat_scroll.saturating_add(10);
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.chat_follow = false;
            app.chat_scroll = app.chat_scroll.saturating_sub(10);
        }
        KeyCode::Char('g') => {
            app.chat_follow = false;
            app.chat_scroll = 0;
        }
        KeyCode::Char('G') => app.chat_follow = true,
        KeyCode::Char('n') | KeyCode::Char('p') => {
            let count = app.chat_targets().len();
            if count == 0 {
                app.chat_target = None;
                return;
            }
            // Nothing selected yet: start from the newest target
            app.chat_target = Some(match app.chat_target.map(|i| i.min(count - 1)) {
                None => count - 1,
                Some(i) if key.code == KeyCode::Char('n') => (i + 1) % count,
                Some(i) => (i + count - 1) % count,
            });
        }
        KeyCode::Enter => {
            if app.chat_target.is_some() {
                app.activate_chat_target();
            } else {
                app.edit_target = EditTarget::Chat;
                app.input_mode = InputMode::Editing;
            }
        }
        KeyCode::Esc => app.chat_target = None,
        KeyCode::Char('c') => copy(app, CopyTarget::Chat),
        _ => {}
    }
}

fn handle_widget_key(app: &mut App, key: KeyEvent) {
    let count = app.session.widgets.targets(&app.session.form).len();
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => {
            if count > 0 {
                app.widget_target = (app.widget_target + 1).min(count - 1);
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.widget_target = app.widget_target.saturating_sub(1);
        }
        KeyCode::Enter => app.activate_widget_target(),
        KeyCode::Left | KeyCode::Char('h') | KeyCode::Right | KeyCode::Char('l') => {
            let delta = if matches!(key.code, KeyCode::Left | KeyCode::Char('h')) {
                -1
            } else {
                1
            };
            if let Some(at) = app.selected_field() {
                app.session
                    .widgets
                    .cycle_select(at, delta, &mut app.session.form);
            } else if let Some((block, card)) = app.selected_grid_card() {
                if let Some((_, card)) = app.session.widgets.grid_card_mut(block, card) {
                    card.cycle_option(delta);
                    card.required = false;
                }
            }
        }
        KeyCode::Char('e') => {
            if let Some(at) = app.selected_field() {
                app.edit_field(at);
            } else if let Some((block, card)) = app.selected_grid_card() {
                let current = app
                    .session
                    .grid_text_mut(block, card)
                    .cloned();
                if let Some(current) = current {
                    app.begin_edit(EditTarget::GridArg { block, card }, current);
                }
            }
        }
        KeyCode::Char('r') => {
            if let Some(at) = app.selected_field() {
                if let Some(FormField::Input(input)) = app.session.widgets.field_mut(at) {
                    if input.widget.secret {
                        input.revealed = !input.revealed;
                    }
                }
            }
        }
        KeyCode::Char('?') => {
            if let Some(at) = app.selected_field() {
                match app.session.widgets.field_mut(at) {
                    Some(FormField::Input(input)) => input.desc_open = !input.desc_open,
                    Some(FormField::Select(select)) => select.desc_open = !select.desc_open,
                    None => {}
                }
            }
        }
        KeyCode::Char('d') => {
            if let Some(at) = app.selected_field() {
                app.request_detect(at);
            }
        }
        KeyCode::Char('o') => {
            if let Some(at) = app.selected_field() {
                app.open_picker(at);
            }
        }
        KeyCode::Char(c @ '1'..='9') => {
            if let Some(at) = app.selected_field() {
                let chip = c as usize - '1' as usize;
                app.session
                    .widgets
                    .choose_chip(at, chip, &mut app.session.form);
            }
        }
        _ => {}
    }
}

fn panel_len(app: &App) -> usize {
    match app.session.panel_tab {
        PanelTab::Processes => app
            .session
            .processes
            .entries
            .ready()
            .map_or(0, |entries| entries.len()),
        PanelTab::Services => app.session.services.ready().map_or(0, |s| s.len()),
        PanelTab::Stats => app.stats_targets().len(),
    }
}

fn handle_panel_key(app: &mut App, key: KeyEvent) {
    let count = panel_len(app);
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => {
            if count > 0 {
                app.panel_row = (app.panel_row + 1).min(count - 1);
            }
        }
        KeyCode::Char('k') | KeyCode::Up => app.panel_row = app.panel_row.saturating_sub(1),
        KeyCode::Char('R') => app.refresh_current_tab(),
        KeyCode::Char('c') => copy(app, CopyTarget::Processes),
        _ => match app.session.panel_tab {
            PanelTab::Processes => handle_process_key(app, key),
            PanelTab::Services => handle_service_key(app, key),
            PanelTab::Stats => {
                if key.code == KeyCode::Enter {
                    app.activate_stats_target();
                }
            }
        },
    }
}

fn handle_process_key(app: &mut App, key: KeyEvent) {
    let Some(process) = app.selected_process().cloned() else {
        return;
    };
    match key.code {
        KeyCode::Char('f') => {
            if let Some(value) = process.fix_action() {
                app.dispatch_value(&value, Some(&format!("🔧 Napraw: {}", process.name)));
            }
        }
        KeyCode::Char('s') if process.is_container() => {
            app.process_action(ProcessAction::Stop, &process.name)
        }
        KeyCode::Char('r') if process.is_container() => {
            app.process_action(ProcessAction::Restart, &process.name)
        }
        KeyCode::Char('p') if process.is_container() => {
            let current = process.ports.clone().unwrap_or_default();
            app.begin_edit(EditTarget::Port(process.name.clone()), current);
        }
        _ => {}
    }
}

fn handle_service_key(app: &mut App, key: KeyEvent) {
    let Some(service) = app
        .session
        .services
        .ready()
        .and_then(|s| s.get(app.panel_row))
        .cloned()
    else {
        return;
    };
    match key.code {
        KeyCode::Enter | KeyCode::Char('l') => app.dispatch_value(
            &service.logs_action(),
            Some(&format!("📋 Logi: {}", service.display_name)),
        ),
        KeyCode::Char('f') => {
            if let Some(value) = service.fix_action() {
                app.dispatch_value(&value, Some(&format!("🔧 Napraw: {}", service.display_name)));
            }
        }
        _ => {}
    }
}

fn handle_log_key(app: &mut App, key: KeyEvent) {
    let max = app.session.logs.len();
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.log_back = app.log_back.saturating_sub(1),
        KeyCode::Char('k') | KeyCode::Up => app.log_back = (app.log_back + 1).min(max),
        KeyCode::PageDown => app.log_back = app.log_back.saturating_sub(20),
        KeyCode::PageUp => app.log_back = (app.log_back + 20).min(max),
        KeyCode::Char('G') => app.log_back = 0,
        KeyCode::Char('g') => app.log_back = max,
        KeyCode::Char('c') => copy(app, CopyTarget::Logs),
        _ => {}
    }
}

fn copy(app: &mut App, target: CopyTarget) {
    let text = app.copy_text(target);
    let ok = match copy_to_clipboard(&text) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "clipboard copy failed");
            false
        }
    };
    app.flash_copy(target, ok);
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    // Modal overlays swallow the mouse; a click outside closes them
    if app.session.diff.modal().is_some() || app.session.picker.is_some() {
        let inside = app.areas.modal.is_some_and(|r| point_in_rect(x, y, r));
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) if !inside => {
                app.session.diff.close();
                app.session.picker = None;
            }
            MouseEventKind::ScrollDown => {
                if let Some(modal) = app.session.diff.modal_mut() {
                    modal.scroll_down(3);
                } else if let Some(picker) = app.session.picker.as_mut() {
                    picker.move_cursor(1);
                }
            }
            MouseEventKind::ScrollUp => {
                if let Some(modal) = app.session.diff.modal_mut() {
                    modal.scroll_up(3);
                } else if let Some(picker) = app.session.picker.as_mut() {
                    picker.move_cursor(-1);
                }
            }
            _ => {}
        }
        return;
    }

    let in_chat = point_in_rect(x, y, app.areas.chat);
    let in_widgets = point_in_rect(x, y, app.areas.widgets);
    let in_input = point_in_rect(x, y, app.areas.input);
    let in_panel = point_in_rect(x, y, app.areas.panel);
    let in_logs = point_in_rect(x, y, app.areas.logs);

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            let divider = if x == app.areas.dividers[0] {
                Some(Divider::ChatProcesses)
            } else if x == app.areas.dividers[1] {
                Some(Divider::ProcessesLogs)
            } else {
                None
            };
            if let Some(divider) = divider {
                app.dragging = Some((divider, x));
                return;
            }
            if in_input {
                app.focus = FocusPane::Chat;
                app.edit_target = EditTarget::Chat;
                app.input_mode = InputMode::Editing;
            } else if in_chat {
                app.focus = FocusPane::Chat;
            } else if in_widgets {
                app.focus = FocusPane::Widgets;
                let hit = app.areas.widget_rows.iter().find(|(row, _)| *row == y).map(|(_, t)| *t);
                if let Some(target) = hit {
                    app.widget_target = target;
                    click_widget(app);
                }
            } else if in_panel {
                app.focus = FocusPane::Panel;
                let hit = app.areas.panel_rows.iter().find(|(row, _)| *row == y).map(|(_, r)| *r);
                if let Some(row) = hit {
                    app.panel_row = row;
                }
            } else if in_logs {
                app.focus = FocusPane::Logs;
            }
        }
        MouseEventKind::Drag(MouseButton::Left) => {
            if let Some((divider, last_x)) = app.dragging {
                app.drag_divider(divider, i32::from(x) - i32::from(last_x));
                app.dragging = Some((divider, x));
            }
        }
        MouseEventKind::Up(MouseButton::Left) => {
            if app.dragging.take().is_some() {
                app.save_widths();
            }
        }
        MouseEventKind::ScrollDown => {
            if in_chat {
                app.chat_scroll = app.chat_scroll.saturating_add(3);
            } else if in_logs {
                app.log_back = app.log_back.saturating_sub(3);
            } else if in_widgets {
                let count = app.session.widgets.targets(&app.session.form).len();
                app.widget_target = (app.widget_target + 1).min(count.saturating_sub(1));
            } else if in_panel {
                let count = panel_len(app);
                app.panel_row = (app.panel_row + 1).min(count.saturating_sub(1));
            }
        }
        MouseEventKind::ScrollUp => {
            if in_chat {
                app.chat_follow = false;
                app.chat_scroll = app.chat_scroll.saturating_sub(3);
            } else if in_logs {
                app.log_back = (app.log_back + 3).min(app.session.logs.len());
            } else if in_widgets {
                app.widget_target = app.widget_target.saturating_sub(1);
            } else if in_panel {
                app.panel_row = app.panel_row.saturating_sub(1);
            }
        }
        _ => {}
    }
}

/// Clicks activate buttons and grid cards; fields only take focus
fn click_widget(app: &mut App) {
    let target = app
        .session
        .widgets
        .targets(&app.session.form)
        .get(app.widget_target)
        .copied();
    if matches!(
        target,
        Some(WidgetTarget::Button { .. } | WidgetTarget::GridCard { .. })
    ) {
        app.activate_widget_target();
    }
}

/// Copy to the system clipboard through whichever helper is installed
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    use std::io::Write;
    use std::process::{Command, Stdio};

    const HELPERS: [(&str, &[&str]); 4] = [
        ("pbcopy", &[]),
        ("wl-copy", &[]),
        ("xclip", &["-selection", "clipboard"]),
        ("xsel", &["--clipboard", "--input"]),
    ];

    for (program, args) in HELPERS {
        let Ok(mut child) = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        else {
            continue;
        };
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes())?;
        }
        if child.wait()?.success() {
            return Ok(());
        }
    }
    Err(anyhow!("no clipboard helper available"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_to_byte_index() {
        let s = "zażółć";
        assert_eq!(char_to_byte_index(s, 0), 0);
        assert_eq!(char_to_byte_index(s, 3), 4);
        assert_eq!(char_to_byte_index(s, 99), s.len());
    }

    #[test]
    fn test_point_in_rect() {
        let rect = Rect::new(10, 5, 4, 2);
        assert!(point_in_rect(10, 5, rect));
        assert!(point_in_rect(13, 6, rect));
        assert!(!point_in_rect(14, 6, rect));
        assert!(!point_in_rect(12, 7, rect));
    }
}
