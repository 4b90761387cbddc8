/// State management module
///
/// This module handles all application state, including:
/// - The contact store and its permission decision (library.rs)
/// - Shared data structures (data.rs)
/// - Sorted/filtered contact views (list.rs)
/// - Modal dialog sequencing (dialog.rs)
/// - Crop editor pan/zoom state (crop.rs)
/// - vCard folder import (vcard.rs)

pub mod crop;
pub mod data;
pub mod dialog;
pub mod library;
pub mod list;
pub mod vcard;
