/// Contact detail view model
///
/// Owns one contact, the candidate photo the user picked, and the dialog
/// sequencer that hands off between the search, camera and editor flows.
/// Saving itself goes through `ContactsViewModel`; this side only tracks
/// `is_saving` and resets once the result is known.
///
/// Background results come back tagged with the `DetailKey` of the screen
/// that started them, and acquisitions with an `AcquisitionToken`. Anything
/// from a closed screen or a cancelled flow is dropped.

use image::DynamicImage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::editor::EditorViewModel;
use super::ErrorState;
use crate::config::AppConfig;
use crate::error::{AcquisitionError, DownloadError};
use crate::photo::search::{build_search_query, PastedLinkRenderer, SearchSession};
use crate::state::data::{ContactId, ContactRecord};
use crate::state::dialog::{DialogKind, DialogSequencer, SettleTicket};

pub const ACQUIRE_FAILED: &str = "Failed to load image";
pub const SEARCH_FAILED: &str = "Failed to load search results";

static NEXT_VISIT: AtomicU64 = AtomicU64::new(1);

/// One opening of the detail screen for one contact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailKey {
    pub contact: ContactId,
    visit: u64,
}

/// One running capture, download or library decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionToken {
    pub detail: DetailKey,
    flow: u64,
}

pub struct DetailViewModel {
    key: DetailKey,
    record: ContactRecord,
    /// Flow number of the acquisition whose result is still wanted
    acquisition: Option<u64>,
    next_flow: u64,
    selected_image: Option<DynamicImage>,
    is_saving: bool,
    sequencer: DialogSequencer,
    search: Option<SearchSession<PastedLinkRenderer>>,
    editor: Option<EditorViewModel>,
    search_base_url: String,
    output_size: u32,
    pub error: ErrorState,
}

impl DetailViewModel {
    pub fn new(record: ContactRecord, config: &AppConfig) -> Self {
        let key = DetailKey {
            contact: record.id,
            visit: NEXT_VISIT.fetch_add(1, Ordering::Relaxed),
        };
        Self {
            key,
            record,
            acquisition: None,
            next_flow: 0,
            selected_image: None,
            is_saving: false,
            sequencer: DialogSequencer::new(config.settle_delay()),
            search: None,
            editor: None,
            search_base_url: config.search_base_url.clone(),
            output_size: config.crop_output_size,
            error: ErrorState::default(),
        }
    }

    pub fn key(&self) -> DetailKey {
        self.key
    }

    pub fn record(&self) -> &ContactRecord {
        &self.record
    }

    /// Replace the shown record, e.g. with the patched one after a save
    pub fn set_record(&mut self, record: ContactRecord) {
        self.record = record;
    }

    pub fn selected_image(&self) -> Option<&DynamicImage> {
        self.selected_image.as_ref()
    }

    pub fn is_saving(&self) -> bool {
        self.is_saving
    }

    /// True while a capture, download or decode is running
    pub fn is_acquiring(&self) -> bool {
        self.acquisition.is_some()
    }

    pub fn sequencer(&self) -> &DialogSequencer {
        &self.sequencer
    }

    pub fn active_dialog(&self) -> Option<DialogKind> {
        self.sequencer.active()
    }

    pub fn search(&self) -> Option<&SearchSession<PastedLinkRenderer>> {
        self.search.as_ref()
    }

    pub fn search_mut(&mut self) -> Option<&mut SearchSession<PastedLinkRenderer>> {
        self.search.as_mut()
    }

    pub fn editor(&self) -> Option<&EditorViewModel> {
        self.editor.as_ref()
    }

    pub fn editor_mut(&mut self) -> Option<&mut EditorViewModel> {
        self.editor.as_mut()
    }

    // --- Dialogs ---

    /// Search the web for this contact's name, organization and city
    pub fn open_search(&mut self) {
        let location = self.record.location();
        let organization = Some(self.record.organization.as_str());
        let query = build_search_query(&self.record.display_name(), organization, location.as_deref());

        match SearchSession::new(PastedLinkRenderer::default(), &self.search_base_url, query) {
            Ok(mut session) => {
                session.start();
                // The pasted-link renderer shows its page as soon as it loads it
                session.on_page_loaded();
                self.search = Some(session);
                self.sequencer.present(DialogKind::Search);
            }
            Err(err) => self.error.handle(Some(&err), SEARCH_FAILED),
        }
    }

    pub fn open_camera(&mut self) {
        self.sequencer.present(DialogKind::Camera);
    }

    /// Start a capture, download or library decode. `None` while another one
    /// is running or a save is in progress.
    pub fn begin_acquisition(&mut self) -> Option<AcquisitionToken> {
        if self.acquisition.is_some() || self.is_saving {
            return None;
        }
        self.next_flow += 1;
        self.acquisition = Some(self.next_flow);
        Some(AcquisitionToken {
            detail: self.key,
            flow: self.next_flow,
        })
    }

    /// Claim the result for `token`; false if its flow was cancelled or
    /// belongs to another screen
    fn accept(&mut self, token: AcquisitionToken) -> bool {
        if token.detail != self.key || self.acquisition != Some(token.flow) {
            tracing::debug!(?token, contact = %self.record.id, "dropping result of a cancelled acquisition");
            return false;
        }
        self.acquisition = None;
        true
    }

    /// Result of any acquisition flow. A cancel changes nothing.
    pub fn handle_acquired(
        &mut self,
        token: AcquisitionToken,
        result: Result<Option<DynamicImage>, Arc<AcquisitionError>>,
    ) {
        if !self.accept(token) {
            return;
        }
        match result {
            Ok(Some(image)) => self.select(image),
            Ok(None) => tracing::debug!(contact = %self.record.id, "image selection cancelled"),
            Err(err) => self.error.handle(Some(&err), ACQUIRE_FAILED),
        }
    }

    /// Result of downloading an image picked in the search dialog
    pub fn handle_downloaded(&mut self, token: AcquisitionToken, result: Result<DynamicImage, Arc<DownloadError>>) {
        if !self.accept(token) {
            return;
        }
        match result {
            Ok(image) => self.select(image),
            Err(err) => {
                let message = err.user_message();
                if let Some(search) = self.search.as_mut() {
                    search.set_error(message);
                }
                self.error.handle(Some(&err), message);
            }
        }
    }

    fn select(&mut self, image: DynamicImage) {
        tracing::info!(
            contact = %self.record.id,
            width = image.width(),
            height = image.height(),
            "image selected"
        );
        self.editor = Some(EditorViewModel::new(image.clone(), self.output_size));
        self.selected_image = Some(image);

        if self.sequencer.active().is_some() {
            self.sequencer.transition_to(DialogKind::Editor);
        } else {
            self.sequencer.present(DialogKind::Editor);
        }
    }

    /// The user backed out of the current dialog. A running acquisition is
    /// abandoned.
    pub fn cancel_dialog(&mut self) {
        self.acquisition = None;
        self.sequencer.dismiss();
    }

    /// Host confirmation that the closing dialog is gone. Returns the ticket
    /// to sleep on when another dialog is queued.
    pub fn dialog_dismissed(&mut self) -> Option<SettleTicket> {
        let ticket = self.sequencer.on_dismissed();
        if ticket.map(|t| t.kind) != Some(DialogKind::Search) {
            self.search = None;
        }
        ticket
    }

    /// The settle delay elapsed; returns the dialog now on screen
    pub fn dialog_settled(&mut self, ticket: SettleTicket) -> Option<DialogKind> {
        self.sequencer.complete_settle(ticket)
    }

    // --- Saving ---

    /// Render the crop for saving. `None` without a selection or while a
    /// save is already running.
    pub fn begin_save(&mut self) -> Option<(ContactId, DynamicImage)> {
        if self.is_saving {
            return None;
        }
        let image = self.editor.as_ref()?.render();
        self.is_saving = true;
        Some((self.record.id, image))
    }

    /// The save finished. On success the selection is cleared and the
    /// editor closes; on failure it stays open for another try.
    pub fn saved(&mut self, success: bool) {
        self.is_saving = false;
        if success {
            self.selected_image = None;
            self.editor = None;
            self.sequencer.dismiss();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photo::search::MESSAGE_CHANNEL;
    use image::{GenericImageView, RgbaImage};

    fn record() -> ContactRecord {
        ContactRecord {
            id: ContactId(3),
            given_name: "Jane".to_string(),
            family_name: "Doe".to_string(),
            organization: "Acme".to_string(),
            city: "Springfield".to_string(),
            ..ContactRecord::default()
        }
    }

    fn detail() -> DetailViewModel {
        DetailViewModel::new(record(), &AppConfig::default())
    }

    fn image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::new(width, height))
    }

    fn acquired(vm: &mut DetailViewModel, result: Result<Option<DynamicImage>, Arc<AcquisitionError>>) {
        let token = vm.begin_acquisition().unwrap();
        vm.handle_acquired(token, result);
    }

    fn downloaded(vm: &mut DetailViewModel, result: Result<DynamicImage, Arc<DownloadError>>) {
        let token = vm.begin_acquisition().unwrap();
        vm.handle_downloaded(token, result);
    }

    /// Drive the host side of a hand-off without sleeping
    fn settle(vm: &mut DetailViewModel) -> Option<DialogKind> {
        let ticket = vm.dialog_dismissed()?;
        vm.dialog_settled(ticket)
    }

    #[test]
    fn test_open_search_builds_query() {
        let mut vm = detail();
        vm.open_search();

        assert_eq!(vm.active_dialog(), Some(DialogKind::Search));
        let search = vm.search().unwrap();
        assert_eq!(search.query(), "Jane Doe Acme Springfield");
        assert_eq!(search.renderer().loaded(), Some(search.url()));
        assert!(!search.is_loading());
    }

    #[test]
    fn test_camera_capture_hands_off_to_editor() {
        let mut vm = detail();
        vm.open_camera();

        acquired(&mut vm, Ok(Some(image(40, 30))));
        // Camera closes first; editor follows after the settle delay.
        assert_eq!(vm.active_dialog(), None);
        assert!(vm.sequencer().is_closing());
        assert_eq!(settle(&mut vm), Some(DialogKind::Editor));
        assert_eq!(vm.editor().unwrap().source().dimensions(), (40, 30));
    }

    #[test]
    fn test_library_pick_presents_editor_directly() {
        let mut vm = detail();
        acquired(&mut vm, Ok(Some(image(10, 10))));
        assert_eq!(vm.active_dialog(), Some(DialogKind::Editor));
        assert!(vm.editor().unwrap().transform().is_identity());
    }

    #[test]
    fn test_cancelled_acquisition_changes_nothing() {
        let mut vm = detail();
        acquired(&mut vm, Ok(Some(image(10, 10))));
        vm.cancel_dialog();
        assert_eq!(vm.dialog_dismissed(), None);

        vm.open_camera();
        acquired(&mut vm, Ok(None));

        assert_eq!(vm.active_dialog(), Some(DialogKind::Camera));
        assert_eq!(vm.sequencer().pending(), None);
        assert!(!vm.error.show);
        assert_eq!(vm.selected_image().unwrap().dimensions(), (10, 10));
    }

    #[test]
    fn test_acquisition_error_keeps_selection() {
        let mut vm = detail();
        vm.open_camera();
        let err = AcquisitionError::Capture("no device".to_string());

        acquired(&mut vm, Err(Arc::new(err)));

        assert_eq!(vm.error.visible(), Some(ACQUIRE_FAILED));
        assert!(vm.selected_image().is_none());
        assert_eq!(vm.active_dialog(), Some(DialogKind::Camera));
    }

    #[test]
    fn test_search_selection_and_download() {
        let mut vm = detail();
        vm.open_search();

        let url = vm
            .search_mut()
            .unwrap()
            .on_script_message(MESSAGE_CHANNEL, "https://img.example/jane.jpg");
        assert_eq!(url.as_deref(), Some("https://img.example/jane.jpg"));

        downloaded(&mut vm, Ok(image(64, 64)));
        assert_eq!(settle(&mut vm), Some(DialogKind::Editor));
        // Search session is dropped once its dialog is gone.
        assert!(vm.search().is_none());
    }

    #[test]
    fn test_download_failure_stays_in_search() {
        let mut vm = detail();
        vm.open_search();

        downloaded(&mut vm, Err(Arc::new(DownloadError::InvalidUrl("nope".to_string()))));

        assert_eq!(vm.active_dialog(), Some(DialogKind::Search));
        assert_eq!(vm.search().unwrap().error(), Some("Invalid image URL"));
        assert_eq!(vm.error.visible(), Some("Invalid image URL"));
    }

    #[test]
    fn test_download_after_cancel_is_dropped() {
        let mut vm = detail();
        vm.open_search();
        let token = vm.begin_acquisition().unwrap();
        assert!(vm.is_acquiring());

        vm.cancel_dialog();
        assert_eq!(vm.dialog_dismissed(), None);
        vm.handle_downloaded(token, Ok(image(64, 64)));

        assert_eq!(vm.active_dialog(), None);
        assert!(vm.sequencer().is_idle());
        assert!(vm.selected_image().is_none());
        assert!(vm.editor().is_none());
    }

    #[test]
    fn test_capture_after_cancel_is_dropped() {
        let mut vm = detail();
        vm.open_camera();
        let token = vm.begin_acquisition().unwrap();

        vm.cancel_dialog();
        vm.dialog_dismissed();
        vm.handle_acquired(token, Ok(Some(image(40, 30))));

        assert_eq!(vm.active_dialog(), None);
        assert!(vm.editor().is_none());
        assert!(!vm.is_acquiring());

        // A fresh capture in a reopened dialog still goes through
        vm.open_camera();
        acquired(&mut vm, Ok(Some(image(40, 30))));
        assert_eq!(settle(&mut vm), Some(DialogKind::Editor));
    }

    #[test]
    fn test_one_capture_at_a_time() {
        let mut vm = detail();
        vm.open_camera();
        let first = vm.begin_acquisition().unwrap();
        assert!(vm.begin_acquisition().is_none());

        vm.handle_acquired(first, Ok(None));
        assert!(!vm.is_acquiring());
        assert!(vm.begin_acquisition().is_some());
    }

    #[test]
    fn test_result_for_another_screen_is_dropped() {
        let mut first = detail();
        first.open_search();
        let token = first.begin_acquisition().unwrap();

        // Same contact reopened, and a different contact
        let mut reopened = detail();
        reopened.open_search();
        reopened.begin_acquisition().unwrap();
        let mut other = DetailViewModel::new(
            ContactRecord {
                id: ContactId(4),
                given_name: "John".to_string(),
                ..ContactRecord::default()
            },
            &AppConfig::default(),
        );
        other.open_search();
        other.begin_acquisition().unwrap();

        assert_eq!(token.detail, first.key());
        assert_ne!(token.detail, reopened.key());
        reopened.handle_downloaded(token, Ok(image(64, 64)));
        other.handle_downloaded(token, Ok(image(64, 64)));

        for vm in [&reopened, &other] {
            assert!(vm.selected_image().is_none());
            assert_eq!(vm.active_dialog(), Some(DialogKind::Search));
            assert!(vm.is_acquiring());
        }
    }

    #[test]
    fn test_save_lifecycle() {
        let mut vm = detail();
        assert!(vm.begin_save().is_none());

        acquired(&mut vm, Ok(Some(image(300, 200))));
        let (id, rendered) = vm.begin_save().unwrap();
        assert_eq!(id, ContactId(3));
        assert_eq!(rendered.dimensions(), (240, 240));
        assert!(vm.is_saving());
        assert!(vm.begin_save().is_none());

        // Failure keeps the editor open.
        vm.saved(false);
        assert!(!vm.is_saving());
        assert_eq!(vm.active_dialog(), Some(DialogKind::Editor));

        vm.begin_save().unwrap();
        vm.saved(true);
        assert!(vm.selected_image().is_none());
        assert!(vm.editor().is_none());
        assert_eq!(vm.active_dialog(), None);
        assert_eq!(vm.dialog_dismissed(), None);
        assert!(vm.sequencer().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_waits_before_showing_editor() {
        let mut vm = detail();
        vm.open_search();
        downloaded(&mut vm, Ok(image(20, 20)));

        let ticket = vm.dialog_dismissed().unwrap();
        let started = tokio::time::Instant::now();
        let ticket = crate::state::dialog::wait_settle(ticket).await;
        assert!(started.elapsed() >= std::time::Duration::from_millis(100));
        assert_eq!(vm.dialog_settled(ticket), Some(DialogKind::Editor));
    }
}
