/// User interface module
///
/// This module handles:
/// - The crop circle overlay and its pan/zoom input (canvas.rs)
/// - Screens and modal dialogs (views.rs)

pub mod canvas;
pub mod views;
