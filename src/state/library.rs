use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

use super::data::{AuthorizationStatus, ContactId, ContactRecord};
use crate::error::ContactError;

/// Access to the contact store.
///
/// Calls block; view models run them on a blocking worker. Implementations
/// must be shareable across those workers.
pub trait ContactStore: Send + Sync {
    /// Current permission decision, without prompting
    fn authorization_status(&self) -> AuthorizationStatus;

    /// Record the user's answer unless a decision already exists. Returns
    /// the decision in force.
    fn request_access(&self, granted: bool) -> Result<bool, ContactError>;

    /// Snapshot of every contact
    fn fetch_all(&self) -> Result<Vec<ContactRecord>, ContactError>;

    /// Replace the profile photo of one contact
    fn update_image(&self, id: ContactId, image: &[u8]) -> Result<(), ContactError>;
}

/// Asks the user whether the app may use their contacts.
///
/// Native dialogs must run on the UI thread, so callers ask before handing
/// the answer to a store worker.
pub trait AccessPrompt: Send + Sync {
    fn ask(&self) -> bool;
}

impl<F> AccessPrompt for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn ask(&self) -> bool {
        self()
    }
}

/// Native yes/no dialog
pub struct DialogAccessPrompt;

impl AccessPrompt for DialogAccessPrompt {
    fn ask(&self) -> bool {
        let answer = rfd::MessageDialog::new()
            .set_title("Contacts access")
            .set_description(
                "Contact Photos needs access to your contacts to find the ones without a photo and update them.",
            )
            .set_buttons(rfd::MessageButtons::YesNo)
            .show();
        matches!(answer, rfd::MessageDialogResult::Yes)
    }
}

/// A new contact to insert, as produced by the vCard importer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewContact {
    /// Stable key used to skip duplicates on re-import
    pub uid: String,
    pub given_name: String,
    pub family_name: String,
    pub organization: String,
    pub city: String,
    pub region: String,
    pub image: Option<Vec<u8>>,
}

/// The SQLite contact store.
///
/// Opens a fresh connection per call: the store is shared across blocking
/// workers and rusqlite::Connection is not Sync.
#[derive(Debug)]
pub struct SqliteContactStore {
    db_path: PathBuf,
}

const AUTHORIZATION_KEY: &str = "authorization";

impl SqliteContactStore {
    /// Open (or create) the store at `db_path` and make sure the schema exists
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, ContactError> {
        let db_path = db_path.into();

        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let store = SqliteContactStore { db_path };
        let conn = store.connect().map_err(ContactError::Write)?;
        init_schema(&conn).map_err(ContactError::Write)?;

        tracing::info!(path = %store.db_path.display(), "contact store ready");
        Ok(store)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        Connection::open(&self.db_path)
    }

    fn ensure_authorized(&self) -> Result<(), ContactError> {
        match self.authorization_status() {
            AuthorizationStatus::Authorized => Ok(()),
            _ => Err(ContactError::PermissionDenied),
        }
    }

    fn stored_authorization(&self) -> rusqlite::Result<AuthorizationStatus> {
        let conn = self.connect()?;
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                [AUTHORIZATION_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value
            .map(|value| AuthorizationStatus::parse(&value))
            .unwrap_or_default())
    }

    fn store_authorization(&self, status: AuthorizationStatus) -> rusqlite::Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![AUTHORIZATION_KEY, status.as_str()],
        )?;
        Ok(())
    }

    /// Insert contacts, skipping any whose uid is already present.
    /// Returns (inserted, skipped).
    pub fn insert_contacts(&self, contacts: &[NewContact]) -> Result<(usize, usize), ContactError> {
        let mut conn = self.connect().map_err(ContactError::Write)?;
        let tx = conn.transaction().map_err(ContactError::Write)?;
        let now = chrono::Utc::now().timestamp();

        let mut inserted = 0;
        let mut skipped = 0;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO contacts
                        (uid, given_name, family_name, organization, city, region, image, imported_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .map_err(ContactError::Write)?;

            for contact in contacts {
                let changed = stmt
                    .execute(params![
                        contact.uid,
                        contact.given_name,
                        contact.family_name,
                        contact.organization,
                        contact.city,
                        contact.region,
                        contact.image,
                        now,
                    ])
                    .map_err(ContactError::Write)?;
                if changed == 0 {
                    skipped += 1;
                } else {
                    inserted += 1;
                }
            }
        }
        tx.commit().map_err(ContactError::Write)?;

        Ok((inserted, skipped))
    }
}

impl ContactStore for SqliteContactStore {
    fn authorization_status(&self) -> AuthorizationStatus {
        match self.stored_authorization() {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(error = %err, "could not read contacts authorization");
                AuthorizationStatus::NotDetermined
            }
        }
    }

    fn request_access(&self, granted: bool) -> Result<bool, ContactError> {
        match self.stored_authorization().map_err(ContactError::Read)? {
            AuthorizationStatus::Authorized => Ok(true),
            AuthorizationStatus::Denied => Ok(false),
            AuthorizationStatus::NotDetermined => {
                let status = if granted {
                    AuthorizationStatus::Authorized
                } else {
                    AuthorizationStatus::Denied
                };
                self.store_authorization(status).map_err(ContactError::Write)?;
                tracing::info!(granted, "contacts access decided");
                Ok(granted)
            }
        }
    }

    fn fetch_all(&self) -> Result<Vec<ContactRecord>, ContactError> {
        self.ensure_authorized()?;

        let conn = self.connect().map_err(ContactError::Read)?;
        let mut stmt = conn
            .prepare(
                "SELECT id, given_name, family_name, organization, city, region, image
                 FROM contacts",
            )
            .map_err(ContactError::Read)?;

        let contact_iter = stmt
            .query_map([], |row| {
                Ok(ContactRecord {
                    id: ContactId(row.get(0)?),
                    given_name: row.get(1)?,
                    family_name: row.get(2)?,
                    organization: row.get(3)?,
                    city: row.get(4)?,
                    region: row.get(5)?,
                    image: row.get(6)?,
                })
            })
            .map_err(ContactError::Read)?;

        let mut contacts = Vec::new();
        for contact in contact_iter {
            contacts.push(contact.map_err(ContactError::Read)?);
        }

        Ok(contacts)
    }

    fn update_image(&self, id: ContactId, image: &[u8]) -> Result<(), ContactError> {
        self.ensure_authorized()?;

        let conn = self.connect().map_err(ContactError::Write)?;
        let changed = conn
            .execute(
                "UPDATE contacts SET image = ?1 WHERE id = ?2",
                params![image, id.0],
            )
            .map_err(ContactError::Write)?;

        if changed == 0 {
            return Err(ContactError::NotFound(id));
        }
        Ok(())
    }
}

/// Create all tables if they don't exist
fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS contacts (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            uid             TEXT NOT NULL UNIQUE,
            given_name      TEXT NOT NULL DEFAULT '',
            family_name     TEXT NOT NULL DEFAULT '',
            organization    TEXT NOT NULL DEFAULT '',
            city            TEXT NOT NULL DEFAULT '',
            region          TEXT NOT NULL DEFAULT '',
            image           BLOB,
            imported_at     INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS meta (
            key             TEXT PRIMARY KEY,
            value           TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}
