/// Error types for the contact store, image acquisition and downloads
///
/// Adapters return these typed errors. They are only turned into
/// user-facing text at the view-model boundary (see `viewmodel::ErrorState`).

use thiserror::Error;

use crate::state::data::ContactId;

/// Failures of the contact store adapter
#[derive(Debug, Error)]
pub enum ContactError {
    #[error("access to contacts was denied")]
    PermissionDenied,

    #[error("failed to read contacts: {0}")]
    Read(#[source] rusqlite::Error),

    #[error("failed to write contact: {0}")]
    Write(#[source] rusqlite::Error),

    #[error("contact {0} no longer exists")]
    NotFound(ContactId),

    /// Encoding the photo failed; counts as a write failure
    #[error("failed to compress image: {0}")]
    Compression(#[source] image::ImageError),

    #[error("contact store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

/// Failures while obtaining a candidate image (camera, photo library)
///
/// A user cancelling is not an error; adapters report it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("camera capture failed: {0}")]
    Capture(String),

    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("background task failed: {0}")]
    Task(String),
}

/// Failures of the web image download
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid image URL: {0}")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server answered {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed data URL: {0}")]
    DataUrl(String),

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("background task failed: {0}")]
    Task(String),
}

impl DownloadError {
    /// Message shown to the user for this failure
    pub fn user_message(&self) -> &'static str {
        match self {
            DownloadError::InvalidUrl(_) => "Invalid image URL",
            _ => "Failed to download image",
        }
    }
}

/// Failures setting up the web image search
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid search URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}
