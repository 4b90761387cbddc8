/// Sorted, filterable views over the contact snapshot

use super::data::{ContactId, ContactRecord};

/// Which view of the snapshot the list screen shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListScope {
    /// Only contacts without a profile photo
    #[default]
    MissingPhoto,
    /// Every contact
    All,
}

/// The "all" and "missing photo" views of one contact snapshot.
///
/// Both views are sorted by display name using ordinal (byte-wise,
/// case-sensitive) comparison, so "Zed" sorts before "adam".
#[derive(Debug, Clone, Default)]
pub struct ContactList {
    all: Vec<ContactRecord>,
    missing: Vec<ContactRecord>,
}

impl ContactList {
    /// Build both views from a freshly fetched snapshot
    pub fn from_records(records: Vec<ContactRecord>) -> Self {
        // Sort once on the cached display name, then split.
        let mut keyed: Vec<(String, ContactRecord)> = records
            .into_iter()
            .map(|record| (record.display_name(), record))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));

        let all: Vec<ContactRecord> = keyed.into_iter().map(|(_, record)| record).collect();
        let missing = all.iter().filter(|record| !record.has_image()).cloned().collect();

        Self { all, missing }
    }

    pub fn all(&self) -> &[ContactRecord] {
        &self.all
    }

    pub fn missing_photo(&self) -> &[ContactRecord] {
        &self.missing
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    pub fn get(&self, id: ContactId) -> Option<&ContactRecord> {
        self.all.iter().find(|record| record.id == id)
    }

    /// Records in `scope` whose display name contains `query`, ignoring case.
    /// An empty query keeps everything.
    pub fn filtered(&self, scope: ListScope, query: &str) -> Vec<&ContactRecord> {
        let base = match scope {
            ListScope::MissingPhoto => &self.missing,
            ListScope::All => &self.all,
        };

        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return base.iter().collect();
        }

        base.iter()
            .filter(|record| record.display_name().to_lowercase().contains(&needle))
            .collect()
    }

    /// Apply a successful photo save to the snapshot without refetching.
    /// Returns false if the contact is not part of this snapshot.
    pub fn patch_image(&mut self, id: ContactId, image: Vec<u8>) -> bool {
        let Some(record) = self.all.iter_mut().find(|record| record.id == id) else {
            return false;
        };
        record.image = Some(image);
        let has_image = record.has_image();

        if has_image {
            self.missing.retain(|record| record.id != id);
        }
        true
    }
}
