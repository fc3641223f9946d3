//! State behind the keyboard and mouse panels
//!
//! These panels only turn raw input events into highlight sets and text
//! readouts. They share nothing with the microphone monitor.

use std::borrow::Cow;
use std::collections::{BTreeSet, VecDeque};

use serde::Serialize;

/// Entries kept in the key history
pub const KEY_HISTORY_LIMIT: usize = 50;

/// Readout shown before any key is pressed or after clearing
pub const KEY_READOUT_IDLE: &str = "Ready";

/// Display label for a mouse button index
pub fn mouse_button_label(index: u8) -> Cow<'static, str> {
    match index {
        0 => Cow::Borrowed("Left"),
        1 => Cow::Borrowed("Middle"),
        2 => Cow::Borrowed("Right"),
        3 => Cow::Borrowed("Back"),
        4 => Cow::Borrowed("Forward"),
        5..=7 => Cow::Owned(format!("Button {}", index)),
        _ => Cow::Owned(format!("Unknown ({})", index)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyHistoryEntry {
    pub label: String,
    pub code: String,
    pub key: String,
}

/// Keyboard panel: pressed keys, current readout and recent history
#[derive(Debug, Clone, Serialize)]
pub struct KeyHistory {
    pressed: BTreeSet<String>,
    readout: String,
    entries: VecDeque<KeyHistoryEntry>,
}

impl Default for KeyHistory {
    fn default() -> Self {
        Self {
            pressed: BTreeSet::new(),
            readout: KEY_READOUT_IDLE.to_string(),
            entries: VecDeque::with_capacity(KEY_HISTORY_LIMIT),
        }
    }
}

impl KeyHistory {
    /// `code` is the physical key code (e.g. "KeyA"), `key` the produced value
    pub fn key_down(&mut self, code: &str, key: &str) {
        self.readout = format!("{} ({})", code, key);
        self.pressed.insert(code.to_string());

        let label = if key == " " {
            "Space".to_string()
        } else if key.chars().count() == 1 {
            key.to_string()
        } else {
            code.to_string()
        };

        self.entries.push_front(KeyHistoryEntry {
            label,
            code: code.to_string(),
            key: key.to_string(),
        });
        self.entries.truncate(KEY_HISTORY_LIMIT);
    }

    pub fn key_up(&mut self, code: &str) {
        self.pressed.remove(code);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.readout = KEY_READOUT_IDLE.to_string();
    }

    pub fn is_pressed(&self, code: &str) -> bool {
        self.pressed.contains(code)
    }

    pub fn readout(&self) -> &str {
        &self.readout
    }

    /// Newest first
    pub fn entries(&self) -> impl Iterator<Item = &KeyHistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Mouse panel: pressed buttons, wheel total and pointer position
#[derive(Debug, Clone, Default, Serialize)]
pub struct MouseReadout {
    pressed: BTreeSet<u8>,
    last_button: Option<String>,
    scroll_total: i64,
    scroll_down: bool,
    position: Option<(i32, i32)>,
}

impl MouseReadout {
    pub fn button_down(&mut self, index: u8) {
        self.pressed.insert(index);
        self.last_button = Some(mouse_button_label(index).into_owned());
    }

    pub fn button_up(&mut self, index: u8) {
        self.pressed.remove(&index);
    }

    /// Accumulates only the sign of each wheel delta
    pub fn wheel(&mut self, delta_y: f64) {
        if delta_y > 0.0 {
            self.scroll_total += 1;
        } else if delta_y < 0.0 {
            self.scroll_total -= 1;
        }
        self.scroll_down = delta_y > 0.0;
    }

    pub fn moved(&mut self, x: i32, y: i32) {
        self.position = Some((x, y));
    }

    pub fn is_pressed(&self, index: u8) -> bool {
        self.pressed.contains(&index)
    }

    pub fn button_text(&self) -> Option<&str> {
        self.last_button.as_deref()
    }

    pub fn scroll_total(&self) -> i64 {
        self.scroll_total
    }

    pub fn scroll_text(&self) -> String {
        let arrow = if self.scroll_down { '↓' } else { '↑' };
        format!("{} {}", self.scroll_total, arrow)
    }

    pub fn position_text(&self) -> Option<String> {
        self.position.map(|(x, y)| format!("{}, {}", x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_labels() {
        assert_eq!(mouse_button_label(0), "Left");
        assert_eq!(mouse_button_label(1), "Middle");
        assert_eq!(mouse_button_label(2), "Right");
        assert_eq!(mouse_button_label(4), "Forward");
        assert_eq!(mouse_button_label(6), "Button 6");
        assert_eq!(mouse_button_label(9), "Unknown (9)");
    }

    #[test]
    fn test_key_labels() {
        let mut history = KeyHistory::default();
        history.key_down("Space", " ");
        history.key_down("KeyA", "a");
        history.key_down("ShiftLeft", "Shift");

        let labels: Vec<&str> = history.entries().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["ShiftLeft", "a", "Space"]);
        assert_eq!(history.readout(), "ShiftLeft (Shift)");
    }

    #[test]
    fn test_history_is_capped_newest_first() {
        let mut history = KeyHistory::default();
        for i in 0..60 {
            history.key_down(&format!("Key{}", i), "x");
        }
        assert_eq!(history.len(), KEY_HISTORY_LIMIT);
        assert_eq!(history.entries().next().map(|e| e.code.as_str()), Some("Key59"));
    }

    #[test]
    fn test_pressed_keys_and_clear() {
        let mut history = KeyHistory::default();
        history.key_down("KeyQ", "q");
        assert!(history.is_pressed("KeyQ"));
        history.key_up("KeyQ");
        assert!(!history.is_pressed("KeyQ"));

        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.readout(), KEY_READOUT_IDLE);
    }

    #[test]
    fn test_wheel_counts_signs() {
        let mut mouse = MouseReadout::default();
        mouse.wheel(120.0);
        mouse.wheel(3.5);
        mouse.wheel(-240.0);
        assert_eq!(mouse.scroll_total(), 1);
        assert_eq!(mouse.scroll_text(), "1 ↑");

        mouse.wheel(1.0);
        assert_eq!(mouse.scroll_text(), "2 ↓");
    }

    #[test]
    fn test_buttons_and_position() {
        let mut mouse = MouseReadout::default();
        mouse.button_down(2);
        assert!(mouse.is_pressed(2));
        assert_eq!(mouse.button_text(), Some("Right"));
        mouse.button_up(2);
        assert!(!mouse.is_pressed(2));

        assert_eq!(mouse.position_text(), None);
        mouse.moved(10, 20);
        assert_eq!(mouse.position_text().as_deref(), Some("10, 20"));
    }
}
