/// Crop editor state for one selected photo

use image::imageops::FilterType;
use image::DynamicImage;

use crate::photo::transform::{fit_within, square_crop, transform_crop};
use crate::state::crop::CropTransform;

/// Longest side of the copy the editor renders from while the user drags
const PREVIEW_MAX_SIZE: u32 = 1024;

#[derive(Debug, Clone)]
pub struct EditorViewModel {
    /// Oriented, full-resolution source
    source: DynamicImage,
    /// Downscaled copy for interactive rendering
    preview: DynamicImage,
    transform: CropTransform,
    output_size: u32,
}

impl EditorViewModel {
    pub fn new(source: DynamicImage, output_size: u32) -> Self {
        let preview = fit_within(&source, PREVIEW_MAX_SIZE);
        Self {
            source,
            preview,
            transform: CropTransform::new(),
            output_size,
        }
    }

    pub fn source(&self) -> &DynamicImage {
        &self.source
    }

    pub fn transform(&self) -> &CropTransform {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut CropTransform {
        &mut self.transform
    }

    pub fn output_size(&self) -> u32 {
        self.output_size
    }

    /// What the crop circle currently shows, rendered from the preview copy.
    /// Until the user pans or zooms this is the centered square crop.
    pub fn preview_image(&self) -> DynamicImage {
        if self.transform.is_identity() {
            return square_crop(&self.preview).resize_exact(self.output_size, self.output_size, FilterType::Triangle);
        }
        transform_crop(&self.preview, self.transform.scale(), self.transform.offset(), self.output_size)
    }

    /// Full-resolution crop to save
    pub fn render(&self) -> DynamicImage {
        transform_crop(&self.source, self.transform.scale(), self.transform.offset(), self.output_size)
    }
}
