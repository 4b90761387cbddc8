/// Shared data structures for the application state
///
/// These structs represent the data model that flows between
/// the contact store and the UI layer.

use std::fmt;

/// Display name used when a contact has no name or organization
pub const UNKNOWN_CONTACT: &str = "Unknown Contact";

/// Opaque, stable identifier handed out by the contact store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ContactId(pub i64);

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Read-only snapshot of one contact
///
/// Only `image` is ever written back, through `ContactStore::update_image`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContactRecord {
    pub id: ContactId,
    pub given_name: String,
    pub family_name: String,
    pub organization: String,
    /// City from the first postal address (may be empty)
    pub city: String,
    /// State/region from the first postal address (may be empty)
    pub region: String,
    /// Encoded profile photo, if any
    pub image: Option<Vec<u8>>,
}

impl ContactRecord {
    /// True iff the record carries non-empty image bytes
    pub fn has_image(&self) -> bool {
        self.image.as_ref().is_some_and(|bytes| !bytes.is_empty())
    }

    /// Name shown everywhere in the UI. Never empty.
    pub fn display_name(&self) -> String {
        let given = self.given_name.as_str();
        let family = self.family_name.as_str();

        match (given.is_empty(), family.is_empty()) {
            (false, false) => format!("{} {}", given, family),
            (false, true) => given.to_string(),
            (true, false) => family.to_string(),
            (true, true) if !self.organization.is_empty() => self.organization.clone(),
            (true, true) => UNKNOWN_CONTACT.to_string(),
        }
    }

    /// Up to two uppercase initials for the avatar placeholder
    pub fn initials(&self) -> String {
        let initials: String = self
            .display_name()
            .split_whitespace()
            .take(2)
            .filter_map(|word| word.chars().next())
            .flat_map(char::to_uppercase)
            .collect();

        if initials.is_empty() {
            "?".to_string()
        } else {
            initials
        }
    }

    /// "City, Region" style location used to narrow the image search
    pub fn location(&self) -> Option<String> {
        match (self.city.is_empty(), self.region.is_empty()) {
            (false, false) => Some(format!("{}, {}", self.city, self.region)),
            (false, true) => Some(self.city.clone()),
            (true, false) => Some(self.region.clone()),
            (true, true) => None,
        }
    }
}

/// Whether the user allowed this app to read and update contacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthorizationStatus {
    #[default]
    NotDetermined,
    Denied,
    Authorized,
}

impl AuthorizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationStatus::NotDetermined => "not_determined",
            AuthorizationStatus::Denied => "denied",
            AuthorizationStatus::Authorized => "authorized",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "authorized" => AuthorizationStatus::Authorized,
            "denied" => AuthorizationStatus::Denied,
            _ => AuthorizationStatus::NotDetermined,
        }
    }
}
