/// Contact list view model
///
/// Every store call runs on a blocking worker. Each operation comes as a
/// `begin_*` half that returns a `'static` future (it only holds a clone of
/// the store handle, never `&self`) and a `finish_*` half that applies the
/// result. The UI runs the future as a task and feeds the output back; tests
/// use the `async fn` wrappers that do both.

use image::DynamicImage;
use std::future::Future;
use std::sync::Arc;

use super::ErrorState;
use crate::error::ContactError;
use crate::photo::transform::{compress_jpeg, JPEG_QUALITY};
use crate::state::data::{AuthorizationStatus, ContactId, ContactRecord};
use crate::state::library::{AccessPrompt, ContactStore};
use crate::state::list::ContactList;

/// Errors travel through UI messages, which must be cloneable
pub type SharedError = Arc<ContactError>;

pub const REQUEST_ACCESS_FAILED: &str = "Failed to request contacts access";
pub const LOAD_FAILED: &str = "Failed to load contacts";
pub const REFRESH_FAILED: &str = "Failed to refresh contacts";
pub const COMPRESS_FAILED: &str = "Failed to compress image";
pub const SAVE_FAILED: &str = "Failed to save contact image";

/// Identifies one started load or refresh. Only the most recently started
/// one may publish its snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    refresh: bool,
}

pub struct ContactsViewModel {
    store: Arc<dyn ContactStore>,
    list: ContactList,
    authorization: AuthorizationStatus,
    is_loading: bool,
    is_refreshing: bool,
    load_generation: u64,
    jpeg_quality: u8,
    pub error: ErrorState,
}

/// Run one blocking store call off the UI thread
async fn run_blocking<T, F>(f: F) -> Result<T, SharedError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ContactError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ContactError::Task(e.to_string()))
        .and_then(|result| result)
        .map_err(Arc::new)
}

impl ContactsViewModel {
    /// Reads the current authorization without prompting
    pub fn new(store: Arc<dyn ContactStore>) -> Self {
        let authorization = store.authorization_status();
        Self {
            store,
            list: ContactList::default(),
            authorization,
            is_loading: false,
            is_refreshing: false,
            load_generation: 0,
            jpeg_quality: JPEG_QUALITY,
            error: ErrorState::default(),
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn list(&self) -> &ContactList {
        &self.list
    }

    pub fn authorization(&self) -> AuthorizationStatus {
        self.authorization
    }

    pub fn is_authorized(&self) -> bool {
        self.authorization == AuthorizationStatus::Authorized
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_refreshing(&self) -> bool {
        self.is_refreshing
    }

    // --- Access ---

    /// Ask through `prompt` on the calling thread when no decision exists
    /// yet; the answer is persisted on a worker.
    pub fn begin_request_access(
        &self,
        prompt: &dyn AccessPrompt,
    ) -> impl Future<Output = Result<bool, SharedError>> + Send + 'static {
        let granted = match self.authorization {
            AuthorizationStatus::NotDetermined => prompt.ask(),
            status => status == AuthorizationStatus::Authorized,
        };
        let store = Arc::clone(&self.store);
        run_blocking(move || store.request_access(granted))
    }

    /// Apply the user's decision. Returns true when contacts should be
    /// loaded next.
    pub fn finish_request_access(&mut self, result: Result<bool, SharedError>) -> bool {
        match result {
            Ok(true) => {
                self.authorization = AuthorizationStatus::Authorized;
                true
            }
            Ok(false) => {
                tracing::info!("contacts access denied");
                self.authorization = AuthorizationStatus::Denied;
                self.list = ContactList::default();
                false
            }
            Err(err) => {
                self.error.handle(Some(&err), REQUEST_ACCESS_FAILED);
                false
            }
        }
    }

    pub async fn request_access(&mut self, prompt: &dyn AccessPrompt) {
        let result = self.begin_request_access(prompt).await;
        if self.finish_request_access(result) {
            self.load_contacts().await;
        }
    }

    // --- Loading ---

    /// Start a load. `None` unless access was granted.
    pub fn begin_load(
        &mut self,
    ) -> Option<(LoadTicket, impl Future<Output = Result<ContactList, SharedError>> + Send + 'static)> {
        if !self.is_authorized() {
            tracing::debug!(authorization = ?self.authorization, "not loading contacts without access");
            return None;
        }
        self.is_loading = true;
        Some((self.next_ticket(false), self.fetch()))
    }

    pub fn finish_load(&mut self, ticket: LoadTicket, result: Result<ContactList, SharedError>) {
        self.publish(ticket, result, LOAD_FAILED);
    }

    pub async fn load_contacts(&mut self) {
        if let Some((ticket, fetch)) = self.begin_load() {
            let result = fetch.await;
            self.finish_load(ticket, result);
        }
    }

    /// Start a refresh. `None` while one is already running or without access.
    pub fn begin_refresh(
        &mut self,
    ) -> Option<(LoadTicket, impl Future<Output = Result<ContactList, SharedError>> + Send + 'static)> {
        if self.is_refreshing {
            tracing::debug!("refresh already in flight");
            return None;
        }
        if !self.is_authorized() {
            return None;
        }
        self.is_refreshing = true;
        Some((self.next_ticket(true), self.fetch()))
    }

    pub fn finish_refresh(&mut self, ticket: LoadTicket, result: Result<ContactList, SharedError>) {
        self.publish(ticket, result, REFRESH_FAILED);
    }

    pub async fn refresh_contacts(&mut self) {
        if let Some((ticket, fetch)) = self.begin_refresh() {
            let result = fetch.await;
            self.finish_refresh(ticket, result);
        }
    }

    fn next_ticket(&mut self, refresh: bool) -> LoadTicket {
        self.load_generation += 1;
        LoadTicket {
            generation: self.load_generation,
            refresh,
        }
    }

    fn fetch(&self) -> impl Future<Output = Result<ContactList, SharedError>> + Send + 'static {
        let store = Arc::clone(&self.store);
        run_blocking(move || store.fetch_all().map(ContactList::from_records))
    }

    fn publish(&mut self, ticket: LoadTicket, result: Result<ContactList, SharedError>, failure: &str) {
        if ticket.refresh {
            self.is_refreshing = false;
        }
        if ticket.generation != self.load_generation {
            tracing::debug!(?ticket, latest = self.load_generation, "dropping superseded contact snapshot");
            return;
        }
        self.is_loading = false;

        match result {
            Ok(list) => {
                tracing::info!(
                    total = list.all().len(),
                    missing_photo = list.missing_photo().len(),
                    "contacts loaded"
                );
                self.list = list;
            }
            Err(err) => self.error.handle(Some(&err), failure),
        }
    }

    // --- Saving ---

    /// Compress `image` and write it to contact `id`. Resolves to the stored
    /// bytes. The store is not called if compression fails.
    pub fn begin_save(
        &self,
        id: ContactId,
        image: DynamicImage,
    ) -> impl Future<Output = Result<Vec<u8>, SharedError>> + Send + 'static {
        let store = Arc::clone(&self.store);
        let quality = self.jpeg_quality;
        async move {
            let bytes = run_blocking(move || compress_jpeg(&image, quality).map_err(ContactError::Compression)).await?;
            run_blocking(move || store.update_image(id, &bytes).map(|()| bytes)).await
        }
    }

    /// Returns whether the photo was saved
    pub fn finish_save(&mut self, id: ContactId, result: Result<Vec<u8>, SharedError>) -> bool {
        match result {
            Ok(bytes) => {
                tracing::info!(contact = %id, size = bytes.len(), "contact photo saved");
                if !self.list.patch_image(id, bytes) {
                    tracing::debug!(contact = %id, "saved contact is not in the current snapshot");
                }
                true
            }
            Err(err) => {
                let message = match err.as_ref() {
                    ContactError::Compression(_) => COMPRESS_FAILED,
                    _ => SAVE_FAILED,
                };
                self.error.handle(Some(&err), message);
                false
            }
        }
    }

    pub async fn save_image_to_contact(&mut self, record: &ContactRecord, image: &DynamicImage) -> bool {
        let result = self.begin_save(record.id, image.clone()).await;
        self.finish_save(record.id, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory store that records how it was used
    #[derive(Default)]
    struct FakeStore {
        authorization: Mutex<AuthorizationStatus>,
        fail_access: bool,
        fail_fetch: bool,
        records: Mutex<Vec<ContactRecord>>,
        fetch_calls: AtomicUsize,
        update_calls: AtomicUsize,
    }

    impl FakeStore {
        fn authorized(records: Vec<ContactRecord>) -> Self {
            Self {
                authorization: Mutex::new(AuthorizationStatus::Authorized),
                records: Mutex::new(records),
                ..Self::default()
            }
        }
    }

    impl ContactStore for FakeStore {
        fn authorization_status(&self) -> AuthorizationStatus {
            *self.authorization.lock().unwrap()
        }

        fn request_access(&self, granted: bool) -> Result<bool, ContactError> {
            if self.fail_access {
                return Err(ContactError::Task("store offline".to_string()));
            }
            *self.authorization.lock().unwrap() = if granted {
                AuthorizationStatus::Authorized
            } else {
                AuthorizationStatus::Denied
            };
            Ok(granted)
        }

        fn fetch_all(&self) -> Result<Vec<ContactRecord>, ContactError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_fetch {
                return Err(ContactError::Read(rusqlite::Error::QueryReturnedNoRows));
            }
            Ok(self.records.lock().unwrap().clone())
        }

        fn update_image(&self, id: ContactId, image: &[u8]) -> Result<(), ContactError> {
            self.update_calls.fetch_add(1, Ordering::SeqCst);
            let mut records = self.records.lock().unwrap();
            let record = records
                .iter_mut()
                .find(|record| record.id == id)
                .ok_or(ContactError::NotFound(id))?;
            record.image = Some(image.to_vec());
            Ok(())
        }
    }

    fn contact(id: i64, given: &str, image: Option<Vec<u8>>) -> ContactRecord {
        ContactRecord {
            id: ContactId(id),
            given_name: given.to_string(),
            image,
            ..ContactRecord::default()
        }
    }

    fn photo() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, image::Rgba([10, 20, 30, 255])))
    }

    #[tokio::test]
    async fn test_request_access_granted_loads() {
        let store = Arc::new(FakeStore {
            records: Mutex::new(vec![contact(1, "Bo", None), contact(2, "Al", Some(vec![1]))]),
            ..FakeStore::default()
        });
        let mut vm = ContactsViewModel::new(store.clone());
        assert_eq!(vm.authorization(), AuthorizationStatus::NotDetermined);

        vm.request_access(&|| true).await;

        assert!(vm.is_authorized());
        assert!(!vm.is_loading());
        assert_eq!(vm.list().all().len(), 2);
        assert_eq!(vm.list().missing_photo().len(), 1);
        assert_eq!(store.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_request_access_denied_leaves_list_empty() {
        let store = Arc::new(FakeStore::default());
        let mut vm = ContactsViewModel::new(store.clone());

        vm.request_access(&|| false).await;

        assert_eq!(vm.authorization(), AuthorizationStatus::Denied);
        assert!(vm.list().is_empty());
        assert!(!vm.error.show);
        assert_eq!(store.fetch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_request_access_failure_is_surfaced() {
        let store = Arc::new(FakeStore {
            fail_access: true,
            ..FakeStore::default()
        });
        let mut vm = ContactsViewModel::new(store);

        vm.request_access(&|| true).await;
        assert_eq!(vm.error.visible(), Some(REQUEST_ACCESS_FAILED));
    }

    #[tokio::test]
    async fn test_decided_access_does_not_prompt_again() {
        let store = Arc::new(FakeStore::authorized(vec![contact(1, "Ann", None)]));
        let mut vm = ContactsViewModel::new(store.clone());
        let asked = AtomicUsize::new(0);
        let prompt = || {
            asked.fetch_add(1, Ordering::SeqCst);
            false
        };

        vm.request_access(&prompt).await;

        assert_eq!(asked.load(Ordering::SeqCst), 0);
        assert!(vm.is_authorized());
        assert_eq!(vm.list().all().len(), 1);
    }

    #[tokio::test]
    async fn test_load_without_access_is_a_no_op() {
        let store = Arc::new(FakeStore::default());
        let mut vm = ContactsViewModel::new(store.clone());

        vm.load_contacts().await;
        assert!(vm.begin_load().is_none());
        assert_eq!(store.fetch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_load_failure_is_surfaced() {
        let store = Arc::new(FakeStore {
            fail_fetch: true,
            ..FakeStore::authorized(Vec::new())
        });
        let mut vm = ContactsViewModel::new(store);

        vm.load_contacts().await;
        assert!(!vm.is_loading());
        assert_eq!(vm.error.visible(), Some(LOAD_FAILED));
    }

    #[tokio::test]
    async fn test_only_latest_load_publishes() {
        let store = Arc::new(FakeStore::authorized(vec![contact(1, "Ann", None)]));
        let mut vm = ContactsViewModel::new(store.clone());

        let (first, first_fetch) = vm.begin_load().unwrap();
        let first_result = first_fetch.await;
        store.records.lock().unwrap().push(contact(2, "Ben", None));
        let (second, second_fetch) = vm.begin_load().unwrap();
        let second_result = second_fetch.await;

        // Newer result lands first, then the stale one.
        vm.finish_load(second, second_result);
        vm.finish_load(first, first_result);

        assert_eq!(vm.list().all().len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_is_guarded() {
        let store = Arc::new(FakeStore::authorized(vec![contact(1, "Ann", None)]));
        let mut vm = ContactsViewModel::new(store.clone());

        let (ticket, fetch) = vm.begin_refresh().unwrap();
        assert!(vm.is_refreshing());
        assert!(vm.begin_refresh().is_none());

        vm.finish_refresh(ticket, fetch.await);
        assert!(!vm.is_refreshing());
        assert_eq!(store.fetch_calls.load(Ordering::SeqCst), 1);

        vm.refresh_contacts().await;
        assert_eq!(store.fetch_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_save_patches_list() {
        let store = Arc::new(FakeStore::authorized(vec![contact(7, "Cy", None)]));
        let mut vm = ContactsViewModel::new(store.clone());
        vm.load_contacts().await;
        let record = vm.list().get(ContactId(7)).cloned().unwrap();

        assert!(vm.save_image_to_contact(&record, &photo()).await);

        assert_eq!(store.update_calls.load(Ordering::SeqCst), 1);
        assert!(vm.list().get(ContactId(7)).unwrap().has_image());
        assert!(vm.list().missing_photo().is_empty());
        let stored = store.records.lock().unwrap()[0].image.clone().unwrap();
        assert_eq!(&stored[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn test_compression_failure_never_writes() {
        let store = Arc::new(FakeStore::authorized(vec![contact(7, "Cy", None)]));
        let mut vm = ContactsViewModel::new(store.clone());
        let record = contact(7, "Cy", None);
        let empty = DynamicImage::ImageRgba8(RgbaImage::new(0, 0));

        assert!(!vm.save_image_to_contact(&record, &empty).await);

        assert_eq!(store.update_calls.load(Ordering::SeqCst), 0);
        assert_eq!(vm.error.visible(), Some(COMPRESS_FAILED));
    }

    #[tokio::test]
    async fn test_write_failure_is_surfaced() {
        let store = Arc::new(FakeStore::authorized(Vec::new()));
        let mut vm = ContactsViewModel::new(store.clone());

        assert!(!vm.save_image_to_contact(&contact(99, "Ghost", None), &photo()).await);

        assert_eq!(store.update_calls.load(Ordering::SeqCst), 1);
        assert_eq!(vm.error.visible(), Some(SAVE_FAILED));
    }
}
