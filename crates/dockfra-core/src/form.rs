//! Form state for server-pushed input/select widgets
//!
//! [`FormBuffer`] groups fields that arrive as a burst of independent widget
//! events into one form block. [`FormStore`] holds the live values the user
//! edits; the action dispatcher snapshots it.

use std::time::{Duration, Instant};

use crate::action::FormSnapshot;

/// Quiet period after the last field before a pending form is flushed
pub const FORM_DEBOUNCE: Duration = Duration::from_millis(80);

#[derive(Debug)]
enum BufferState<T> {
    Idle,
    Collecting { fields: Vec<T>, deadline: Instant },
}

/// Debounced grouping of consecutive form fields.
///
/// Time is passed in by the caller, so the buffer has no timers of its own:
/// the event loop asks for [`FormBuffer::deadline`] and calls
/// [`FormBuffer::poll`] once it has passed.
#[derive(Debug)]
pub struct FormBuffer<T> {
    window: Duration,
    state: BufferState<T>,
}

impl<T> Default for FormBuffer<T> {
    fn default() -> Self {
        Self::new(FORM_DEBOUNCE)
    }
}

impl<T> FormBuffer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: BufferState::Idle,
        }
    }

    /// Add a field and restart the quiet period
    pub fn push(&mut self, field: T, now: Instant) {
        let deadline = now + self.window;
        match &mut self.state {
            BufferState::Idle => {
                self.state = BufferState::Collecting {
                    fields: vec![field],
                    deadline,
                };
            }
            BufferState::Collecting {
                fields,
                deadline: current,
            } => {
                fields.push(field);
                *current = deadline;
            }
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        match &self.state {
            BufferState::Idle => None,
            BufferState::Collecting { deadline, .. } => Some(*deadline),
        }
    }

    pub fn is_collecting(&self) -> bool {
        matches!(self.state, BufferState::Collecting { .. })
    }

    /// Flush the pending block if its quiet period has elapsed
    pub fn poll(&mut self, now: Instant) -> Option<Vec<T>> {
        match self.deadline() {
            Some(deadline) if now >= deadline => self.flush(),
            _ => None,
        }
    }

    /// Flush the pending block unconditionally
    pub fn flush(&mut self) -> Option<Vec<T>> {
        match std::mem::replace(&mut self.state, BufferState::Idle) {
            BufferState::Idle => None,
            BufferState::Collecting { fields, .. } => Some(fields),
        }
    }

    /// Drop the pending block without emitting it
    pub fn discard(&mut self) {
        self.state = BufferState::Idle;
    }
}

/// Live values of every rendered input/select, in render order
#[derive(Debug, Default, Clone)]
pub struct FormStore {
    fields: Vec<(String, String)>,
}

impl FormStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a field, or reset its value if already present
    pub fn register(&mut self, name: &str, value: &str) {
        self.set(name, value);
    }

    pub fn set(&mut self, name: &str, value: &str) {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.fields.push((name.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn snapshot(&self) -> FormSnapshot {
        self.fields.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_burst_groups_into_one_block() {
        let start = Instant::now();
        let mut buffer = FormBuffer::new(ms(80));
        buffer.push("F1", start);
        buffer.push("F2", start + ms(30));
        assert_eq!(buffer.poll(start + ms(100)), None);
        buffer.push("F3", start + ms(90));
        assert_eq!(buffer.poll(start + ms(150)), None);
        assert_eq!(buffer.poll(start + ms(170)), Some(vec!["F1", "F2", "F3"]));
        assert!(!buffer.is_collecting());
    }

    #[test]
    fn test_field_after_window_starts_new_block() {
        let start = Instant::now();
        let mut buffer = FormBuffer::new(ms(80));
        buffer.push("F1", start);
        buffer.push("F2", start + ms(10));
        assert_eq!(buffer.poll(start + ms(90)), Some(vec!["F1", "F2"]));
        buffer.push("F3", start + ms(200));
        assert_eq!(buffer.deadline(), Some(start + ms(280)));
        assert_eq!(buffer.poll(start + ms(280)), Some(vec!["F3"]));
    }

    #[test]
    fn test_isolated_field_flushes_after_window() {
        let start = Instant::now();
        let mut buffer = FormBuffer::new(ms(80));
        buffer.push("only", start);
        assert_eq!(buffer.poll(start + ms(79)), None);
        assert_eq!(buffer.poll(start + ms(80)), Some(vec!["only"]));
        assert_eq!(buffer.poll(start + ms(500)), None);
    }

    #[test]
    fn test_explicit_flush_and_discard() {
        let start = Instant::now();
        let mut buffer = FormBuffer::new(ms(80));
        assert_eq!(buffer.flush(), None::<Vec<&str>>);
        buffer.push("a", start);
        assert_eq!(buffer.flush(), Some(vec!["a"]));
        buffer.push("b", start);
        buffer.discard();
        assert_eq!(buffer.deadline(), None);
    }

    #[test]
    fn test_store_keeps_render_order() {
        let mut store = FormStore::new();
        store.register("GIT_REPO_URL", "");
        store.register("GIT_BRANCH", "main");
        store.set("GIT_REPO_URL", "git@github.com:x/y.git");
        store.register("GIT_BRANCH", "dev");

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("GIT_BRANCH"), Some("dev"));
        let snapshot = store.snapshot();
        assert_eq!(snapshot["GIT_REPO_URL"], "git@github.com:x/y.git");
        store.clear();
        assert!(store.snapshot().is_empty());
    }
}
