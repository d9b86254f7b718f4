use std::collections::BTreeMap;

use kitting_session::{Button, UiSink};

/// UI sink that remembers everything pushed to it.
#[derive(Debug, Clone, Default)]
pub struct RecordingUi {
    /// Every help line, oldest first.
    pub help_texts: Vec<String>,
    /// Latest enabled state per button.
    pub buttons: BTreeMap<Button, bool>,
    /// Currently highlighted dropdown references.
    pub highlights: Vec<String>,
    /// Latest fetch progress.
    pub progress: Option<(usize, usize)>,
    /// Whether the end-of-kit notice is up.
    pub end_of_kit: bool,
}

impl RecordingUi {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent help line, empty before any.
    pub fn last_help(&self) -> &str {
        self.help_texts.last().map_or("", String::as_str)
    }

    /// Whether `button` was last enabled.
    pub fn enabled(&self, button: Button) -> bool {
        self.buttons.get(&button).copied().unwrap_or(false)
    }
}

impl UiSink for RecordingUi {
    fn set_help_text(&mut self, text: &str) {
        self.help_texts.push(text.to_string());
    }

    fn set_button_enabled(&mut self, button: Button, enabled: bool) {
        self.buttons.insert(button, enabled);
    }

    fn set_dropdown_highlight(&mut self, highlighted: &str, cleared: &str) {
        if !cleared.is_empty() {
            self.highlights.retain(|r| r != cleared);
        }
        if !highlighted.is_empty() && !self.highlights.iter().any(|r| r == highlighted) {
            self.highlights.push(highlighted.to_string());
        }
    }

    fn set_fetch_progress(&mut self, fetched: usize, total: usize) {
        self.progress = Some((fetched, total));
    }

    fn set_end_of_kit(&mut self, visible: bool) {
        self.end_of_kit = visible;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highlight_moves_between_references() {
        let mut ui = RecordingUi::new();
        ui.set_dropdown_highlight("REF1", "");
        ui.set_dropdown_highlight("REF2", "REF1");
        assert_eq!(ui.highlights, vec!["REF2".to_string()]);
        ui.set_button_enabled(Button::Host, true);
        assert!(ui.enabled(Button::Host));
        assert!(!ui.enabled(Button::Place));
        assert_eq!(ui.last_help(), "");
    }
}
