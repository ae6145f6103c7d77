//! Server-pushed widget descriptors and the widget area view model
//!
//! The server describes widgets as JSON objects tagged by `type`. Every field
//! other than the tag is optional on the wire and defaults when absent.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Instant;

use crate::form::{FormBuffer, FormStore};

/// Field whose value drives the visibility of [`CUSTOM_MODEL_FIELD`]
pub const MODEL_FIELD: &str = "LLM_MODEL";
pub const CUSTOM_MODEL_FIELD: &str = "LLM_MODEL_CUSTOM";
/// Select value meaning "type your own"
pub const CUSTOM_VALUE: &str = "__custom__";
/// Input retargeted by a select's `arg_placeholder_map`
pub const SSH_ARG_FIELD: &str = "ssh_arg";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WidgetDescriptor {
    Buttons(ButtonsWidget),
    Input(InputWidget),
    Select(SelectWidget),
    Code(CodeWidget),
    StatusRow(StatusRowWidget),
    Progress(ProgressWidget),
    ActionGrid(ActionGridWidget),
}

impl WidgetDescriptor {
    /// Decode a `widget` event payload; unknown widget types yield `None`
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        match serde_json::from_value(value) {
            Ok(widget) => Some(widget),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring undecodable widget");
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ButtonItem {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ButtonsWidget {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub items: Vec<ButtonItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Chip {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct InputWidget {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub secret: bool,
    #[serde(default)]
    pub chips: Vec<Chip>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub modal_type: Option<String>,
    #[serde(default)]
    pub autodetect: bool,
    #[serde(default)]
    pub help_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SelectOption {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct SelectWidget {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub options: Vec<SelectOption>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub hint_map: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub arg_placeholder_map: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub autodetect: bool,
    #[serde(default)]
    pub help_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct CodeWidget {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct StatusRowWidget {
    #[serde(default)]
    pub items: Vec<StatusItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ProgressWidget {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct GridCommand {
    #[serde(default)]
    pub cmd: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub tty: bool,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub options_endpoint: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ActionGridWidget {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub run_value: String,
    #[serde(default)]
    pub commands: Vec<GridCommand>,
}

// ============================================================================
// View model
// ============================================================================

/// Result of an autodetect request (`/api/detect/{field}`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DetectResult {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub options: Vec<SelectOption>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectState {
    #[default]
    Ready,
    Running,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputField {
    pub widget: InputWidget,
    pub placeholder: String,
    pub revealed: bool,
    pub desc_open: bool,
    pub active_chip: Option<usize>,
    pub detected_chips: Vec<Chip>,
    pub detected_hint: Option<String>,
    pub detect: DetectState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectField {
    pub widget: SelectWidget,
    pub desc_open: bool,
    pub detected_hint: Option<String>,
    pub detect: DetectState,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormField {
    Input(InputField),
    Select(SelectField),
}

impl FormField {
    fn from_input(widget: InputWidget) -> Self {
        FormField::Input(InputField {
            placeholder: widget.placeholder.clone().unwrap_or_default(),
            widget,
            revealed: false,
            desc_open: false,
            active_chip: None,
            detected_chips: Vec::new(),
            detected_hint: None,
            detect: DetectState::Ready,
        })
    }

    fn from_select(widget: SelectWidget) -> Self {
        FormField::Select(SelectField {
            widget,
            desc_open: false,
            detected_hint: None,
            detect: DetectState::Ready,
        })
    }

    pub fn name(&self) -> &str {
        match self {
            FormField::Input(f) => &f.widget.name,
            FormField::Select(f) => &f.widget.name,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            FormField::Input(f) => &f.widget.label,
            FormField::Select(f) => &f.widget.label,
        }
    }

    pub fn desc(&self) -> Option<&str> {
        match self {
            FormField::Input(f) => f.widget.desc.as_deref(),
            FormField::Select(f) => f.widget.desc.as_deref(),
        }
    }

    pub fn autodetect(&self) -> bool {
        match self {
            FormField::Input(f) => f.widget.autodetect,
            FormField::Select(f) => f.widget.autodetect,
        }
    }

    fn initial_value(&self) -> String {
        match self {
            FormField::Input(f) => f.widget.value.clone().unwrap_or_default(),
            FormField::Select(f) => f
                .widget
                .value
                .clone()
                .filter(|v| f.widget.options.iter().any(|o| &o.value == v))
                .or_else(|| f.widget.options.first().map(|o| o.value.clone()))
                .unwrap_or_default(),
        }
    }

    /// Hint shown under the field for the given current value
    pub fn hint(&self, current: &str) -> Option<String> {
        match self {
            FormField::Input(f) => f
                .detected_hint
                .clone()
                .or_else(|| f.widget.hint.clone())
                .filter(|h| !h.is_empty()),
            FormField::Select(f) => {
                if let Some(map) = &f.widget.hint_map {
                    return Some(map.get(current).cloned().unwrap_or_default());
                }
                f.detected_hint.clone()
            }
        }
    }

    fn set_detect(&mut self, state: DetectState) {
        match self {
            FormField::Input(f) => f.detect = state,
            FormField::Select(f) => f.detect = state,
        }
    }
}

/// Input used to supply a grid command's argument
#[derive(Debug, Clone, PartialEq)]
pub enum ParamInput {
    /// Command takes no argument
    None,
    Text(String),
    /// Options are being fetched from `options_endpoint`
    Loading { custom: String },
    Choice {
        options: Vec<SelectOption>,
        selected: Option<usize>,
        custom: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridCard {
    pub command: GridCommand,
    pub param: ParamInput,
    /// Set when the user ran a command without its required argument
    pub required: bool,
}

impl GridCard {
    fn new(command: GridCommand) -> Self {
        let param = if command.tty || command.params.is_empty() {
            ParamInput::None
        } else if command.options_endpoint.is_some() {
            ParamInput::Loading {
                custom: String::new(),
            }
        } else {
            ParamInput::Text(String::new())
        };
        Self {
            command,
            param,
            required: false,
        }
    }

    pub fn needs_arg(&self) -> bool {
        !self.command.tty && !self.command.params.is_empty()
    }

    pub fn placeholder(&self) -> String {
        self.command
            .placeholder
            .clone()
            .unwrap_or_else(|| self.command.params.join(", "))
    }

    /// Whether the "type your own" entry of a choice list is active
    pub fn custom_selected(&self) -> bool {
        match &self.param {
            ParamInput::Choice {
                options, selected, ..
            } => selected.is_some_and(|i| i >= options.len()),
            ParamInput::Loading { .. } => false,
            _ => false,
        }
    }

    /// Current argument value, trimmed
    pub fn arg(&self) -> String {
        match &self.param {
            ParamInput::None => String::new(),
            ParamInput::Text(text) => text.trim().to_string(),
            ParamInput::Loading { .. } => String::new(),
            ParamInput::Choice {
                options,
                selected,
                custom,
            } => match selected {
                Some(i) if *i < options.len() => options[*i].value.clone(),
                Some(_) => custom.trim().to_string(),
                None => String::new(),
            },
        }
    }

    /// Text buffer the user is typing into, if the param accepts typing
    pub fn text_mut(&mut self) -> Option<&mut String> {
        let custom_selected = self.custom_selected();
        match &mut self.param {
            ParamInput::Text(text) => Some(text),
            ParamInput::Choice { custom, .. } if custom_selected => Some(custom),
            _ => None,
        }
    }

    /// Move through the option list; the slot past the last option is the
    /// custom entry
    pub fn cycle_option(&mut self, delta: isize) {
        if let ParamInput::Choice {
            options, selected, ..
        } = &mut self.param
        {
            let slots = options.len() as isize + 1;
            let current = selected.map(|i| i as isize).unwrap_or(-1);
            let next = (current + delta).rem_euclid(slots);
            *selected = Some(next as usize);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionGrid {
    pub generation: u64,
    pub label: Option<String>,
    pub run_value: String,
    pub cards: Vec<GridCard>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WidgetBlock {
    Buttons(ButtonsWidget),
    Form(Vec<FormField>),
    Code(String),
    StatusRow(Vec<StatusItem>),
    ActionGrid(ActionGrid),
}

/// Work the widget area cannot do itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetEffect {
    /// Upsert a row in the processes panel
    Progress(ProgressWidget),
    /// Fetch options for a grid command's argument
    LoadOptions {
        generation: u64,
        command: String,
        endpoint: String,
    },
}

/// Address of a field inside the widget area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRef {
    pub block: usize,
    pub field: usize,
}

/// Everything the user can focus and activate in the widget area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetTarget {
    Button { block: usize, item: usize },
    Field(FieldRef),
    GridCard { block: usize, card: usize },
}

/// Widget descriptors turned into renderable blocks
#[derive(Debug, Default)]
pub struct WidgetArea {
    blocks: Vec<WidgetBlock>,
    pending: FormBuffer<FormField>,
    grid_generation: u64,
}

impl WidgetArea {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocks(&self) -> &[WidgetBlock] {
        &self.blocks
    }

    /// Route one descriptor; input/select fields go through the form buffer
    pub fn apply(&mut self, widget: WidgetDescriptor, now: Instant) -> Vec<WidgetEffect> {
        let mut effects = Vec::new();
        match widget {
            WidgetDescriptor::Buttons(buttons) => {
                self.blocks.retain(|b| !matches!(b, WidgetBlock::Buttons(_)));
                self.blocks.push(WidgetBlock::Buttons(buttons));
            }
            WidgetDescriptor::Input(input) => self.pending.push(FormField::from_input(input), now),
            WidgetDescriptor::Select(select) => {
                self.pending.push(FormField::from_select(select), now)
            }
            WidgetDescriptor::Code(code) => self.blocks.push(WidgetBlock::Code(code.text)),
            WidgetDescriptor::StatusRow(row) => self.blocks.push(WidgetBlock::StatusRow(row.items)),
            WidgetDescriptor::Progress(progress) => effects.push(WidgetEffect::Progress(progress)),
            WidgetDescriptor::ActionGrid(grid) => {
                self.grid_generation += 1;
                let generation = self.grid_generation;
                let cards: Vec<GridCard> = grid.commands.into_iter().map(GridCard::new).collect();
                for card in &cards {
                    if let (ParamInput::Loading { .. }, Some(endpoint)) =
                        (&card.param, &card.command.options_endpoint)
                    {
                        effects.push(WidgetEffect::LoadOptions {
                            generation,
                            command: card.command.cmd.clone(),
                            endpoint: endpoint.clone(),
                        });
                    }
                }
                self.blocks.retain(|b| !matches!(b, WidgetBlock::ActionGrid(_)));
                self.blocks.push(WidgetBlock::ActionGrid(ActionGrid {
                    generation,
                    label: grid.label,
                    run_value: grid.run_value,
                    cards,
                }));
            }
        }
        effects
    }

    pub fn form_deadline(&self) -> Option<Instant> {
        self.pending.deadline()
    }

    /// Append the pending form once its quiet period is over. Returns true
    /// when a block was appended.
    pub fn flush_due(&mut self, now: Instant, store: &mut FormStore) -> bool {
        match self.pending.poll(now) {
            Some(fields) => {
                self.append_form(fields, store);
                true
            }
            None => false,
        }
    }

    /// Append the pending form immediately
    pub fn flush_now(&mut self, store: &mut FormStore) -> bool {
        match self.pending.flush() {
            Some(fields) => {
                self.append_form(fields, store);
                true
            }
            None => false,
        }
    }

    fn append_form(&mut self, fields: Vec<FormField>, store: &mut FormStore) {
        for field in &fields {
            store.register(field.name(), &field.initial_value());
        }
        self.blocks.push(WidgetBlock::Form(fields));
    }

    /// `clear_widgets`: drop every block and the values they held
    pub fn clear(&mut self, store: &mut FormStore) {
        self.blocks.clear();
        self.pending.discard();
        store.clear();
    }

    pub fn field(&self, at: FieldRef) -> Option<&FormField> {
        match self.blocks.get(at.block)? {
            WidgetBlock::Form(fields) => fields.get(at.field),
            _ => None,
        }
    }

    pub fn field_mut(&mut self, at: FieldRef) -> Option<&mut FormField> {
        match self.blocks.get_mut(at.block)? {
            WidgetBlock::Form(fields) => fields.get_mut(at.field),
            _ => None,
        }
    }

    pub fn find_field(&self, name: &str) -> Option<FieldRef> {
        self.blocks.iter().enumerate().find_map(|(block, b)| match b {
            WidgetBlock::Form(fields) => fields
                .iter()
                .position(|f| f.name() == name)
                .map(|field| FieldRef { block, field }),
            _ => None,
        })
    }

    pub fn grid_card_mut(&mut self, block: usize, card: usize) -> Option<(&str, &mut GridCard)> {
        match self.blocks.get_mut(block)? {
            WidgetBlock::ActionGrid(grid) => {
                let run_value = grid.run_value.as_str();
                grid.cards.get_mut(card).map(|c| (run_value, c))
            }
            _ => None,
        }
    }

    /// `LLM_MODEL_CUSTOM` only shows while `LLM_MODEL` is set to the custom entry
    pub fn is_visible(&self, field: &FormField, store: &FormStore) -> bool {
        if field.name() != CUSTOM_MODEL_FIELD {
            return true;
        }
        match store.get(MODEL_FIELD) {
            Some(model) => model == CUSTOM_VALUE,
            None => true,
        }
    }

    /// Focus order used by keyboard navigation
    pub fn targets(&self, store: &FormStore) -> Vec<WidgetTarget> {
        let mut targets = Vec::new();
        for (block, b) in self.blocks.iter().enumerate() {
            match b {
                WidgetBlock::Buttons(buttons) => targets.extend(
                    (0..buttons.items.len()).map(|item| WidgetTarget::Button { block, item }),
                ),
                WidgetBlock::Form(fields) => {
                    for (field, f) in fields.iter().enumerate() {
                        if self.is_visible(f, store) {
                            targets.push(WidgetTarget::Field(FieldRef { block, field }));
                        }
                    }
                }
                WidgetBlock::ActionGrid(grid) => targets.extend(
                    (0..grid.cards.len()).map(|card| WidgetTarget::GridCard { block, card }),
                ),
                WidgetBlock::Code(_) | WidgetBlock::StatusRow(_) => {}
            }
        }
        targets
    }

    /// Step a select field through its options and apply its side maps
    pub fn cycle_select(&mut self, at: FieldRef, delta: isize, store: &mut FormStore) {
        let Some(FormField::Select(select)) = self.field(at) else {
            return;
        };
        let options = &select.widget.options;
        if options.is_empty() {
            return;
        }
        let name = select.widget.name.clone();
        let current = store.get(&name).unwrap_or_default();
        let index = options.iter().position(|o| o.value == current).unwrap_or(0) as isize;
        let next = (index + delta).rem_euclid(options.len() as isize) as usize;
        let value = options[next].value.clone();
        self.select_value(&name, &value, store);
    }

    /// Set a select's value, retargeting the `ssh_arg` placeholder when the
    /// select carries an `arg_placeholder_map`
    pub fn select_value(&mut self, name: &str, value: &str, store: &mut FormStore) {
        store.set(name, value);
        let placeholder = match self.find_field(name).and_then(|at| self.field(at)) {
            Some(FormField::Select(select)) => select
                .widget
                .arg_placeholder_map
                .as_ref()
                .map(|map| map.get(value).cloned().unwrap_or_default()),
            _ => None,
        };
        if let Some(placeholder) = placeholder {
            if let Some(at) = self.find_field(SSH_ARG_FIELD) {
                if let Some(FormField::Input(input)) = self.field_mut(at) {
                    input.placeholder = placeholder;
                }
                store.set(SSH_ARG_FIELD, "");
            }
        }
    }

    /// Apply a chip to its input: sets the value and reveals secrets
    pub fn choose_chip(&mut self, at: FieldRef, chip: usize, store: &mut FormStore) {
        if let Some(FormField::Input(input)) = self.field_mut(at) {
            let chips: Vec<&Chip> = input
                .widget
                .chips
                .iter()
                .chain(input.detected_chips.iter())
                .collect();
            if let Some(chip_value) = chips.get(chip).map(|c| c.value.clone()) {
                if input.widget.secret {
                    input.revealed = true;
                }
                input.active_chip = Some(chip);
                store.set(&input.widget.name, &chip_value);
            }
        }
    }

    pub fn mark_detecting(&mut self, name: &str) {
        if let Some(at) = self.find_field(name) {
            if let Some(field) = self.field_mut(at) {
                field.set_detect(DetectState::Running);
            }
        }
    }

    /// Merge an autodetect result into the field it was requested for
    pub fn apply_detect(&mut self, name: &str, result: Option<DetectResult>, store: &mut FormStore) {
        let Some(at) = self.find_field(name) else {
            return;
        };
        let Some(field) = self.field_mut(at) else {
            return;
        };
        let Some(result) = result else {
            field.set_detect(DetectState::Ready);
            return;
        };
        field.set_detect(DetectState::Done);
        match field {
            FormField::Input(input) => {
                if !result.options.is_empty() {
                    input.detected_chips = result
                        .options
                        .iter()
                        .map(|o| Chip {
                            label: o.label.clone(),
                            value: o.value.clone(),
                        })
                        .collect();
                }
                if result.hint.is_some() {
                    input.detected_hint = result.hint.clone();
                }
            }
            FormField::Select(select) => {
                if result.hint.is_some() {
                    select.detected_hint = result.hint.clone();
                }
            }
        }
        if let Some(value) = result.value.filter(|v| !v.is_empty()) {
            store.set(name, &value);
        }
    }

    /// Fill a grid card's option list once `options_endpoint` answered.
    /// Results for a grid that has since been replaced are dropped.
    pub fn apply_grid_options(
        &mut self,
        generation: u64,
        command: &str,
        options: Option<Vec<SelectOption>>,
    ) {
        for block in &mut self.blocks {
            let WidgetBlock::ActionGrid(grid) = block else {
                continue;
            };
            if grid.generation != generation {
                continue;
            }
            for card in grid.cards.iter_mut().filter(|c| c.command.cmd == command) {
                let custom = match &card.param {
                    ParamInput::Loading { custom } => custom.clone(),
                    _ => continue,
                };
                card.param = match &options {
                    Some(opts) if !opts.is_empty() => ParamInput::Choice {
                        options: opts.clone(),
                        selected: None,
                        custom,
                    },
                    _ => ParamInput::Text(custom),
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn widget(value: serde_json::Value) -> WidgetDescriptor {
        WidgetDescriptor::from_value(value).expect("decodes")
    }

    fn input(name: &str) -> WidgetDescriptor {
        widget(json!({"type": "input", "name": name, "label": name}))
    }

    #[test]
    fn test_decode_defaults_missing_fields() {
        let select = widget(json!({"type": "select", "name": "x", "label": "X"}));
        let WidgetDescriptor::Select(select) = select else {
            panic!("expected select");
        };
        assert!(select.options.is_empty());
        assert!(select.hint_map.is_none());

        let grid = widget(json!({"type": "action_grid", "run_value": "ssh_run",
            "commands": [{"cmd": "ticket-work", "desc": "Work", "params": ["ticket"],
                          "options_endpoint": "/api/ssh-options/tickets"}]}));
        let WidgetDescriptor::ActionGrid(grid) = grid else {
            panic!("expected grid");
        };
        assert_eq!(grid.commands[0].params, vec!["ticket".to_string()]);
        assert!(!grid.commands[0].tty);

        assert!(WidgetDescriptor::from_value(json!({"type": "carousel"})).is_none());
    }

    #[test]
    fn test_fields_within_window_form_one_block() {
        let start = Instant::now();
        let mut area = WidgetArea::new();
        let mut store = FormStore::new();
        area.apply(input("F1"), start);
        area.apply(input("F2"), start + Duration::from_millis(20));
        area.apply(input("F3"), start + Duration::from_millis(60));
        assert!(!area.flush_due(start + Duration::from_millis(100), &mut store));
        assert!(area.flush_due(start + Duration::from_millis(140), &mut store));

        assert_eq!(area.blocks().len(), 1);
        let WidgetBlock::Form(fields) = &area.blocks()[0] else {
            panic!("expected form");
        };
        let names: Vec<&str> = fields.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["F1", "F2", "F3"]);

        area.apply(input("F4"), start + Duration::from_millis(400));
        assert!(area.flush_due(start + Duration::from_millis(480), &mut store));
        assert_eq!(area.blocks().len(), 2);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_buttons_and_grid_replace_previous() {
        let now = Instant::now();
        let mut area = WidgetArea::new();
        area.apply(widget(json!({"type": "buttons", "items": [{"label": "A", "value": "a"}]})), now);
        area.apply(widget(json!({"type": "code", "text": "docker ps"})), now);
        area.apply(widget(json!({"type": "buttons", "items": [{"label": "B", "value": "b"}]})), now);
        assert_eq!(area.blocks().len(), 2);
        assert!(matches!(&area.blocks()[1], WidgetBlock::Buttons(b) if b.items[0].value == "b"));

        let grid = json!({"type": "action_grid", "run_value": "run", "commands": [{"cmd": "a"}]});
        area.apply(widget(grid.clone()), now);
        area.apply(widget(grid), now);
        let grids = area
            .blocks()
            .iter()
            .filter(|b| matches!(b, WidgetBlock::ActionGrid(_)))
            .count();
        assert_eq!(grids, 1);
    }

    #[test]
    fn test_progress_becomes_effect() {
        let mut area = WidgetArea::new();
        let effects = area.apply(
            widget(json!({"type": "progress", "label": "Building", "done": true})),
            Instant::now(),
        );
        assert_eq!(
            effects,
            vec![WidgetEffect::Progress(ProgressWidget {
                label: "Building".to_string(),
                done: true,
                error: false,
            })]
        );
        assert!(area.blocks().is_empty());
    }

    #[test]
    fn test_select_defaults_and_maps() {
        let now = Instant::now();
        let mut area = WidgetArea::new();
        let mut store = FormStore::new();
        area.apply(
            widget(json!({"type": "select", "name": "ssh_cmd", "label": "Cmd",
                "options": [{"value": "logs", "label": "Logs"}, {"value": "deploy", "label": "Deploy"}],
                "hint_map": {"logs": "Show logs", "deploy": "Deploy app"},
                "arg_placeholder_map": {"logs": "lines", "deploy": "tag"}})),
            now,
        );
        area.apply(input("ssh_arg"), now);
        area.flush_now(&mut store);
        assert_eq!(store.get("ssh_cmd"), Some("logs"));

        store.set("ssh_arg", "50");
        let at = area.find_field("ssh_cmd").unwrap();
        area.cycle_select(at, 1, &mut store);
        assert_eq!(store.get("ssh_cmd"), Some("deploy"));
        assert_eq!(store.get("ssh_arg"), Some(""));
        let arg = area.find_field("ssh_arg").unwrap();
        let Some(FormField::Input(arg_input)) = area.field(arg) else {
            panic!("expected input");
        };
        assert_eq!(arg_input.placeholder, "tag");
        let field = area.field(at).unwrap();
        assert_eq!(field.hint("deploy"), Some("Deploy app".to_string()));
    }

    #[test]
    fn test_custom_model_visibility() {
        let now = Instant::now();
        let mut area = WidgetArea::new();
        let mut store = FormStore::new();
        area.apply(
            widget(json!({"type": "select", "name": "LLM_MODEL", "label": "Model",
                "options": [{"value": "gpt", "label": "GPT"}, {"value": "__custom__", "label": "Custom"}]})),
            now,
        );
        area.apply(input("LLM_MODEL_CUSTOM"), now);
        area.flush_now(&mut store);
        assert_eq!(area.targets(&store).len(), 1);
        store.set("LLM_MODEL", "__custom__");
        assert_eq!(area.targets(&store).len(), 2);
    }

    #[test]
    fn test_chip_sets_value_and_reveals_secret() {
        let now = Instant::now();
        let mut area = WidgetArea::new();
        let mut store = FormStore::new();
        area.apply(
            widget(json!({"type": "input", "name": "API_KEY", "label": "Key", "secret": true,
                "chips": [{"label": "env", "value": "sk-123"}]})),
            now,
        );
        area.flush_now(&mut store);
        let at = area.find_field("API_KEY").unwrap();
        area.choose_chip(at, 0, &mut store);
        assert_eq!(store.get("API_KEY"), Some("sk-123"));
        let Some(FormField::Input(field)) = area.field(at) else {
            panic!("expected input");
        };
        assert!(field.revealed);
        assert_eq!(field.active_chip, Some(0));
    }

    #[test]
    fn test_detect_result_merges_into_field() {
        let now = Instant::now();
        let mut area = WidgetArea::new();
        let mut store = FormStore::new();
        area.apply(
            widget(json!({"type": "input", "name": "GIT_BRANCH", "label": "Branch", "autodetect": true})),
            now,
        );
        area.flush_now(&mut store);
        area.mark_detecting("GIT_BRANCH");
        area.apply_detect(
            "GIT_BRANCH",
            Some(DetectResult {
                value: Some("main".to_string()),
                options: vec![SelectOption {
                    value: "dev".to_string(),
                    label: "dev".to_string(),
                }],
                hint: Some("current branch: main".to_string()),
                error: None,
            }),
            &mut store,
        );
        assert_eq!(store.get("GIT_BRANCH"), Some("main"));
        let at = area.find_field("GIT_BRANCH").unwrap();
        let Some(FormField::Input(field)) = area.field(at) else {
            panic!("expected input");
        };
        assert_eq!(field.detect, DetectState::Done);
        assert_eq!(field.detected_chips.len(), 1);
        assert_eq!(area.field(at).unwrap().hint(""), Some("current branch: main".to_string()));
    }

    #[test]
    fn test_grid_options_loading() {
        let now = Instant::now();
        let mut area = WidgetArea::new();
        let effects = area.apply(
            widget(json!({"type": "action_grid", "run_value": "ssh_run", "commands": [
                {"cmd": "ticket-work", "desc": "Work", "params": ["ticket"],
                 "options_endpoint": "/api/ssh-options/tickets"},
                {"cmd": "status", "desc": "Status"},
                {"cmd": "shell", "desc": "Shell", "tty": true, "params": ["x"]}
            ]})),
            now,
        );
        let [WidgetEffect::LoadOptions { generation, command, endpoint }] = effects.as_slice() else {
            panic!("expected one options request");
        };
        assert_eq!(command, "ticket-work");
        assert_eq!(endpoint, "/api/ssh-options/tickets");

        area.apply_grid_options(
            *generation,
            "ticket-work",
            Some(vec![SelectOption {
                value: "T-0001".to_string(),
                label: "○ T-0001 — Login".to_string(),
            }]),
        );
        let (_, card) = area.grid_card_mut(0, 0).unwrap();
        assert_eq!(card.arg(), "");
        card.cycle_option(1);
        assert_eq!(card.arg(), "T-0001");
        card.cycle_option(1);
        assert!(card.custom_selected());
        card.text_mut().unwrap().push_str(" T-0009 ");
        assert_eq!(card.arg(), "T-0009");

        let (_, tty) = area.grid_card_mut(0, 2).unwrap();
        assert!(!tty.needs_arg());
    }

    #[test]
    fn test_grid_options_failure_falls_back_to_text() {
        let mut area = WidgetArea::new();
        area.apply(
            widget(json!({"type": "action_grid", "run_value": "r", "commands": [
                {"cmd": "edit", "params": ["file"], "options_endpoint": "/api/ssh-options/files"}]})),
            Instant::now(),
        );
        area.apply_grid_options(1, "edit", None);
        let (_, card) = area.grid_card_mut(0, 0).unwrap();
        assert_eq!(card.param, ParamInput::Text(String::new()));
        assert_eq!(card.placeholder(), "file");
    }

    #[test]
    fn test_clear_drops_blocks_and_values() {
        let now = Instant::now();
        let mut area = WidgetArea::new();
        let mut store = FormStore::new();
        area.apply(input("A"), now);
        area.flush_now(&mut store);
        area.apply(input("B"), now);
        area.clear(&mut store);
        assert!(area.blocks().is_empty());
        assert!(area.form_deadline().is_none());
        assert!(store.is_empty());
    }
}
