/// Screen state for the contact list and the contact detail flow
///
/// View models own the state the UI renders and translate adapter
/// failures into user-facing messages. They never touch widgets.
///
/// - contacts.rs: authorization, the contact snapshot, saving photos
/// - detail.rs: one contact, its dialogs and the selected candidate photo
/// - editor.rs: the crop editor for a selected photo

use std::fmt;

pub mod contacts;
pub mod detail;
pub mod editor;

/// The error alert of one screen
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorState {
    pub message: String,
    pub show: bool,
}

impl ErrorState {
    /// Log `error` (if any) and show `message` to the user
    pub fn handle(&mut self, error: Option<&dyn fmt::Display>, message: &str) {
        match error {
            Some(error) => tracing::warn!(%error, "{message}"),
            None => tracing::warn!("{message}"),
        }
        self.message = message.to_string();
        self.show = true;
    }

    /// The user dismissed the alert
    pub fn clear(&mut self) {
        self.message.clear();
        self.show = false;
    }

    /// Message to display, if the alert is up
    pub fn visible(&self) -> Option<&str> {
        self.show.then_some(self.message.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_and_clear() {
        let mut error = ErrorState::default();
        assert_eq!(error.visible(), None);

        let cause = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        error.handle(Some(&cause), "Failed to load contacts");
        assert!(error.show);
        assert_eq!(error.visible(), Some("Failed to load contacts"));

        error.clear();
        assert_eq!(error, ErrorState::default());
    }
}
