use iced::widget::image::Handle;
use iced::{Element, Task, Theme};
use image::DynamicImage;
use rfd::FileDialog;
use std::path::PathBuf;
use std::sync::Arc;

mod config;
mod error;
mod logging;
mod photo;
mod state;
mod ui;
mod viewmodel;

use config::AppConfig;
use error::{AcquisitionError, ContactError, DownloadError};
use photo::acquire::{self, CommandCamera, ImageSource, LibraryPicker, WebImageClient};
use photo::search::MESSAGE_CHANNEL;
use state::data::ContactId;
use state::dialog::{self as dialog, DialogKind, SettleTicket};
use state::library::{DialogAccessPrompt, SqliteContactStore};
use state::list::{ContactList, ListScope};
use state::vcard::{self, ImportResult};
use viewmodel::contacts::{ContactsViewModel, LoadTicket, SharedError};
use viewmodel::detail::{AcquisitionToken, DetailKey, DetailViewModel};

/// Main application state
pub struct ContactPhotos {
    config: AppConfig,
    /// Concrete store, needed for vCard import
    store: Arc<SqliteContactStore>,
    contacts: ContactsViewModel,
    scope: ListScope,
    filter: String,
    /// Open contact, if the detail screen is showing
    detail: Option<DetailViewModel>,
    /// Rendered crop circle contents for the editor
    crop_preview: Option<Handle>,
    web: Option<WebImageClient>,
    /// Status line under the list
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    // Access and list
    RequestAccess,
    AccessResolved(Result<bool, SharedError>),
    ContactsLoaded(LoadTicket, Result<ContactList, SharedError>),
    Refresh,
    ContactsRefreshed(LoadTicket, Result<ContactList, SharedError>),
    ScopeChanged(ListScope),
    FilterChanged(String),
    ImportVCards,
    ImportComplete(Result<ImportResult, SharedError>),
    DismissError,

    // Detail
    OpenContact(ContactId),
    CloseDetail,
    OpenSearch,
    OpenCamera,
    PickFromLibrary,
    Capture,
    Acquired(AcquisitionToken, Result<Option<DynamicImage>, Arc<AcquisitionError>>),
    PastedLinkChanged(String),
    UsePastedLink,
    Downloaded(AcquisitionToken, Result<DynamicImage, Arc<DownloadError>>),
    CancelDialog,
    DialogSettled(DetailKey, SettleTicket),

    // Crop editor
    CropDragged(cgmath::Vector2<f32>),
    CropDragEnded(cgmath::Vector2<f32>),
    CropZoomed(f32),
    CropReset,
    Save,
    Saved(ContactId, Result<Vec<u8>, SharedError>),
}

impl ContactPhotos {
    /// Create a new instance of the application
    fn new(config: AppConfig, store: Arc<SqliteContactStore>) -> (Self, Task<Message>) {
        let contacts = ContactsViewModel::new(store.clone()).with_jpeg_quality(config.jpeg_quality);

        let web = match WebImageClient::new(config.download_timeout()) {
            Ok(client) => Some(client),
            Err(err) => {
                tracing::error!(error = %err, "web image search disabled");
                None
            }
        };

        let mut app = ContactPhotos {
            config,
            store,
            contacts,
            scope: ListScope::default(),
            filter: String::new(),
            detail: None,
            crop_preview: None,
            web,
            status: String::from("Ready."),
        };

        // Ask right away on first launch; otherwise load what we may read
        let task = match app.contacts.authorization() {
            state::data::AuthorizationStatus::NotDetermined => app.request_access(),
            _ => app.load(),
        };

        tracing::info!(
            store = %app.store.path().display(),
            authorization = ?app.contacts.authorization(),
            "contact photos started"
        );
        (app, task)
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::RequestAccess => self.request_access(),
            Message::AccessResolved(result) => {
                if self.contacts.finish_request_access(result) {
                    self.load()
                } else {
                    Task::none()
                }
            }
            Message::ContactsLoaded(ticket, result) => {
                self.contacts.finish_load(ticket, result);
                self.update_status();
                Task::none()
            }
            Message::Refresh => match self.contacts.begin_refresh() {
                Some((ticket, fetch)) => {
                    Task::perform(fetch, move |result| Message::ContactsRefreshed(ticket, result))
                }
                None => Task::none(),
            },
            Message::ContactsRefreshed(ticket, result) => {
                self.contacts.finish_refresh(ticket, result);
                self.update_status();
                Task::none()
            }
            Message::ScopeChanged(scope) => {
                self.scope = scope;
                Task::none()
            }
            Message::FilterChanged(filter) => {
                self.filter = filter;
                Task::none()
            }
            Message::ImportVCards => {
                // Show the native folder picker dialog
                let folder = FileDialog::new()
                    .set_title("Select Folder with vCards")
                    .pick_folder();

                if let Some(folder_path) = folder {
                    self.status = format!("Importing from {}...", folder_path.display());
                    return Task::perform(
                        import_folder_async(self.store.clone(), folder_path),
                        Message::ImportComplete,
                    );
                }

                Task::none()
            }
            Message::ImportComplete(result) => match result {
                Ok(result) => {
                    self.status = format!(
                        "Import complete. Added {} contacts, skipped {} duplicates.",
                        result.imported_count, result.skipped_count
                    );
                    self.load()
                }
                Err(err) => {
                    self.contacts.error.handle(Some(&err), "Failed to import contacts");
                    self.status = String::from("Import failed.");
                    Task::none()
                }
            },
            Message::DismissError => {
                self.contacts.error.clear();
                if let Some(detail) = self.detail.as_mut() {
                    detail.error.clear();
                }
                Task::none()
            }

            Message::OpenContact(id) => {
                if let Some(record) = self.contacts.list().get(id).cloned() {
                    self.detail = Some(DetailViewModel::new(record, &self.config));
                    self.crop_preview = None;
                }
                Task::none()
            }
            Message::CloseDetail => {
                if self.detail.as_ref().is_some_and(|detail| detail.is_saving()) {
                    return Task::none();
                }
                self.detail = None;
                self.crop_preview = None;
                Task::none()
            }
            Message::OpenSearch => {
                if self.web.is_none() {
                    self.contacts.error.handle(None, "Web image search is unavailable");
                    return Task::none();
                }
                self.with_detail(DetailViewModel::open_search)
            }
            Message::OpenCamera => {
                if CommandCamera::new(self.config.camera_command.clone(), self.config.capture_dir()).is_none() {
                    self.contacts
                        .error
                        .handle(None, "No camera command configured");
                    return Task::none();
                }
                self.with_detail(DetailViewModel::open_camera)
            }
            Message::Capture => {
                let Some(camera) = CommandCamera::new(self.config.camera_command.clone(), self.config.capture_dir())
                else {
                    return Task::none();
                };
                let Some(token) = self.detail.as_mut().and_then(|d| d.begin_acquisition()) else {
                    return Task::none();
                };
                let source: Arc<dyn ImageSource> = Arc::new(camera);
                Task::perform(acquire::acquire(source), move |result| {
                    Message::Acquired(token, result.map_err(Arc::new))
                })
            }
            Message::PickFromLibrary => {
                let Some(token) = self.detail.as_mut().and_then(|d| d.begin_acquisition()) else {
                    return Task::none();
                };
                // The native dialog runs here, like the folder picker
                match LibraryPicker::new().select() {
                    Ok(Some(bytes)) => Task::perform(acquire::decode_acquired(bytes), move |result| {
                        Message::Acquired(token, result.map(Some).map_err(Arc::new))
                    }),
                    Ok(None) => self.update(Message::Acquired(token, Ok(None))),
                    Err(err) => self.update(Message::Acquired(token, Err(Arc::new(err)))),
                }
            }
            Message::Acquired(token, result) => {
                self.with_detail_for(token.detail, move |detail| detail.handle_acquired(token, result))
            }
            Message::PastedLinkChanged(link) => {
                if let Some(search) = self.detail.as_mut().and_then(|d| d.search_mut()) {
                    search.renderer_mut().pasted = link;
                }
                Task::none()
            }
            Message::UsePastedLink => {
                let (Some(detail), Some(web)) = (self.detail.as_mut(), self.web.clone()) else {
                    return Task::none();
                };
                if detail.is_acquiring() {
                    return Task::none();
                }
                let Some(search) = detail.search_mut() else {
                    return Task::none();
                };
                let body = search.renderer_mut().take_pasted();
                let Some(url) = search.on_script_message(MESSAGE_CHANNEL, &body) else {
                    return Task::none();
                };
                let Some(token) = detail.begin_acquisition() else {
                    return Task::none();
                };

                tracing::info!(%url, "downloading selected image");
                Task::perform(async move { web.download(&url).await }, move |result| {
                    Message::Downloaded(token, result.map_err(Arc::new))
                })
            }
            Message::Downloaded(token, result) => {
                self.with_detail_for(token.detail, move |detail| detail.handle_downloaded(token, result))
            }
            Message::CancelDialog => self.with_detail(DetailViewModel::cancel_dialog),
            Message::DialogSettled(key, ticket) => {
                let Some(detail) = self.detail.as_mut().filter(|d| d.key() == key) else {
                    return Task::none();
                };
                if detail.dialog_settled(ticket) == Some(DialogKind::Editor) {
                    self.refresh_crop_preview();
                }
                Task::none()
            }

            Message::CropDragged(translation) => self.with_crop(|t| t.drag_changed(translation)),
            Message::CropDragEnded(translation) => self.with_crop(|t| t.drag_ended(translation)),
            Message::CropZoomed(factor) => self.with_crop(|t| t.zoom_by(factor)),
            Message::CropReset => self.with_crop(|t| t.reset()),
            Message::Save => {
                let Some((id, image)) = self.detail.as_mut().and_then(|d| d.begin_save()) else {
                    return Task::none();
                };
                Task::perform(self.contacts.begin_save(id, image), move |result| {
                    Message::Saved(id, result)
                })
            }
            Message::Saved(id, result) => {
                let success = self.contacts.finish_save(id, result);
                let patched = self.contacts.list().get(id).cloned();
                let task = self.with_detail(move |detail| {
                    detail.saved(success);
                    if let Some(record) = patched {
                        detail.set_record(record);
                    }
                });
                if success {
                    self.crop_preview = None;
                    self.update_status();
                }
                task
            }
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        ui::views::root(self)
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }

    /// The native prompt, if any, shows here on the UI thread
    fn request_access(&self) -> Task<Message> {
        Task::perform(
            self.contacts.begin_request_access(&DialogAccessPrompt),
            Message::AccessResolved,
        )
    }

    fn load(&mut self) -> Task<Message> {
        match self.contacts.begin_load() {
            Some((ticket, fetch)) => Task::perform(fetch, move |result| Message::ContactsLoaded(ticket, result)),
            None => Task::none(),
        }
    }

    /// Apply `f` to the open contact, then let any closing dialog finish and
    /// schedule the one queued behind it
    fn with_detail(&mut self, f: impl FnOnce(&mut DetailViewModel)) -> Task<Message> {
        let Some(detail) = self.detail.as_mut() else {
            return Task::none();
        };
        f(detail);

        let mut task = Task::none();
        // No close animations here, so a closing dialog is gone at once
        if detail.sequencer().is_closing() {
            if let Some(ticket) = detail.dialog_dismissed() {
                let key = detail.key();
                task = Task::perform(dialog::wait_settle(ticket), move |ticket| {
                    Message::DialogSettled(key, ticket)
                });
            }
        }

        if detail.active_dialog() == Some(DialogKind::Editor) {
            self.refresh_crop_preview();
        }
        task
    }

    /// Like `with_detail`, but only for the screen that started the work
    fn with_detail_for(&mut self, key: DetailKey, f: impl FnOnce(&mut DetailViewModel)) -> Task<Message> {
        if self.detail.as_ref().map(|d| d.key()) != Some(key) {
            tracing::debug!(contact = %key.contact, "dropping result for a closed contact");
            return Task::none();
        }
        self.with_detail(f)
    }

    fn with_crop(&mut self, f: impl FnOnce(&mut state::crop::CropTransform)) -> Task<Message> {
        if let Some(editor) = self.detail.as_mut().and_then(|d| d.editor_mut()) {
            f(editor.transform_mut());
            self.refresh_crop_preview();
        }
        Task::none()
    }

    fn refresh_crop_preview(&mut self) {
        self.crop_preview = self
            .detail
            .as_ref()
            .and_then(|d| d.editor())
            .map(|editor| to_handle(&editor.preview_image()));
    }

    fn update_status(&mut self) {
        let list = self.contacts.list();
        self.status = format!(
            "{} contacts, {} without a photo.",
            list.all().len(),
            list.missing_photo().len()
        );
    }
}

/// Convert a decoded image into an iced image handle
fn to_handle(image: &DynamicImage) -> Handle {
    let rgba = image.to_rgba8();
    Handle::from_rgba(rgba.width(), rgba.height(), rgba.into_raw())
}

/// Import every vCard under `folder_path` on a blocking worker
async fn import_folder_async(store: Arc<SqliteContactStore>, folder_path: PathBuf) -> Result<ImportResult, SharedError> {
    tokio::task::spawn_blocking(move || vcard::import_folder(&store, &folder_path))
        .await
        .map_err(|e| ContactError::Task(e.to_string()))
        .and_then(|result| result)
        .map_err(Arc::new)
}

fn main() -> iced::Result {
    logging::init(&config::data_dir());
    let config = AppConfig::load();

    let store = match SqliteContactStore::open(&config.database_path) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            tracing::error!(path = %config.database_path.display(), error = %err, "cannot open contact store");
            eprintln!("Cannot open contact store at {}: {}", config.database_path.display(), err);
            std::process::exit(1);
        }
    };

    iced::application("Contact Photos", ContactPhotos::update, ContactPhotos::view)
        .theme(ContactPhotos::theme)
        .centered()
        .run_with(move || ContactPhotos::new(config, store))
}
