//! Outbound UI surface.
//!
//! The session only ever pushes state to the UI; user input comes back as calls
//! on [`crate::SessionController`].

/// Shown when entering configuration.
pub const PLACE_ANCHOR_TEXT: &str =
    "Place the anchor on the intended surface by clicking the button or the screen.";
/// Shown while no surface is under the screen center.
pub const FIND_SURFACE_TEXT: &str =
    "Move around until the application recognizes the intended surface.";
/// Shown once the first object is instantiated.
pub const SELECT_OR_ADD_TEXT: &str =
    "Select or add a new box. Host the anchor and its associated boxes if the setup is finished.";
/// Shown while an object is selected.
pub const EDIT_SELECTED_TEXT: &str =
    "Move, rotate and scale the box to the intended position. Associate the corresponding piece.";
/// Shown after hosting or updating succeeded.
pub const HOST_SUCCEEDED_TEXT: &str = "Host succeeded. Add the next anchor.";
/// Shown while resolving the scenario's anchors.
pub const SEARCHING_TEXT: &str = "Searching for the cloud anchors in the scenario.";
/// Shown once resolved objects are visible.
pub const FETCH_GREEN_TEXT: &str = "Fetch the piece inside the green box. Select it when fetched.";

/// Buttons whose availability the session drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Button {
    /// Place an anchor at the indicator.
    Place,
    /// Start a new anchor.
    NewAnchor,
    /// Host (or update) the current anchor.
    Host,
    /// Add an object.
    AddObject,
    /// Remove the selected object.
    RemoveObject,
    /// Piece dropdown.
    PieceList,
}

/// Sink for state the session pushes to the UI.
pub trait UiSink {
    /// Replace the help line.
    fn set_help_text(&mut self, text: &str);

    /// Enable or disable a button.
    fn set_button_enabled(&mut self, button: Button, enabled: bool);

    /// Highlight `highlighted` in the piece dropdown and clear `cleared`.
    ///
    /// Either may be empty.
    fn set_dropdown_highlight(&mut self, highlighted: &str, cleared: &str);

    /// Fetch progress as `(completed, total)` pieces.
    fn set_fetch_progress(&mut self, fetched: usize, total: usize);

    /// Show or hide the end-of-kit notice.
    fn set_end_of_kit(&mut self, visible: bool);
}

impl<U: UiSink + ?Sized> UiSink for &mut U {
    fn set_help_text(&mut self, text: &str) {
        (**self).set_help_text(text)
    }

    fn set_button_enabled(&mut self, button: Button, enabled: bool) {
        (**self).set_button_enabled(button, enabled)
    }

    fn set_dropdown_highlight(&mut self, highlighted: &str, cleared: &str) {
        (**self).set_dropdown_highlight(highlighted, cleared)
    }

    fn set_fetch_progress(&mut self, fetched: usize, total: usize) {
        (**self).set_fetch_progress(fetched, total)
    }

    fn set_end_of_kit(&mut self, visible: bool) {
        (**self).set_end_of_kit(visible)
    }
}
