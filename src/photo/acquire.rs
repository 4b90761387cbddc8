/// Image acquisition adapters
///
/// Each adapter produces the raw bytes of one candidate image or nothing
/// when the user backs out. Decoding is shared so every source gets the same
/// orientation handling and the same error surface.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use image::DynamicImage;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use super::transform::decode_oriented;
use crate::error::{AcquisitionError, DownloadError};

/// Image file extensions offered by the library picker
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff"];

/// Placeholder in the camera command replaced by the output file path
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// A host component that lets the user produce one image.
///
/// `Ok(None)` means the user cancelled, which callers treat as a no-op.
pub trait ImageSource: Send + Sync {
    fn select(&self) -> Result<Option<Vec<u8>>, AcquisitionError>;
}

/// Decode acquired bytes on a blocking worker
pub async fn decode_acquired(bytes: Vec<u8>) -> Result<DynamicImage, AcquisitionError> {
    tokio::task::spawn_blocking(move || decode_oriented(&bytes))
        .await
        .map_err(|e| AcquisitionError::Task(e.to_string()))?
        .map_err(AcquisitionError::Decode)
}

/// Run `source` on a blocking worker and decode what it produced
pub async fn acquire(source: std::sync::Arc<dyn ImageSource>) -> Result<Option<DynamicImage>, AcquisitionError> {
    let selected = tokio::task::spawn_blocking(move || source.select())
        .await
        .map_err(|e| AcquisitionError::Task(e.to_string()))??;

    match selected {
        Some(bytes) => decode_acquired(bytes).await.map(Some),
        None => Ok(None),
    }
}

/// Camera capture through an external command (e.g. `fswebcam`).
///
/// The command gets the path of a temporary file in place of `{output}` and
/// is expected to write one image there. A non-zero exit or a missing file
/// counts as the user backing out.
#[derive(Debug, Clone)]
pub struct CommandCamera {
    argv: Vec<String>,
    output_dir: PathBuf,
}

impl CommandCamera {
    /// `None` when no capture command is configured
    pub fn new(argv: Vec<String>, output_dir: PathBuf) -> Option<Self> {
        if argv.is_empty() {
            return None;
        }
        Some(Self { argv, output_dir })
    }
}

impl ImageSource for CommandCamera {
    fn select(&self) -> Result<Option<Vec<u8>>, AcquisitionError> {
        std::fs::create_dir_all(&self.output_dir)?;
        let output = self
            .output_dir
            .join(format!("capture-{}.jpg", chrono::Utc::now().timestamp_millis()));
        let output_arg = output.to_string_lossy();

        let args: Vec<String> = self.argv[1..]
            .iter()
            .map(|arg| arg.replace(OUTPUT_PLACEHOLDER, &output_arg))
            .collect();

        tracing::info!(program = %self.argv[0], "starting camera capture");
        let status = Command::new(&self.argv[0])
            .args(&args)
            .status()
            .map_err(|e| AcquisitionError::Capture(format!("{}: {}", self.argv[0], e)))?;

        if !status.success() || !output.exists() {
            tracing::info!(%status, "camera capture produced no image");
            let _ = std::fs::remove_file(&output);
            return Ok(None);
        }

        let bytes = std::fs::read(&output)?;
        let _ = std::fs::remove_file(&output);
        Ok(Some(bytes))
    }
}

/// Native "open image" dialog over the user's photos
#[derive(Debug, Clone, Default)]
pub struct LibraryPicker {
    start_dir: Option<PathBuf>,
}

impl LibraryPicker {
    pub fn new() -> Self {
        Self {
            start_dir: dirs::picture_dir(),
        }
    }
}

impl ImageSource for LibraryPicker {
    fn select(&self) -> Result<Option<Vec<u8>>, AcquisitionError> {
        let mut dialog = rfd::FileDialog::new()
            .set_title("Choose a Photo")
            .add_filter("Images", IMAGE_EXTENSIONS);
        if let Some(dir) = &self.start_dir {
            dialog = dialog.set_directory(dir);
        }

        match dialog.pick_file() {
            Some(path) => {
                tracing::info!(path = %path.display(), "photo picked from library");
                Ok(Some(std::fs::read(path)?))
            }
            None => Ok(None),
        }
    }
}

/// Downloads the image selected in the web search
#[derive(Debug, Clone)]
pub struct WebImageClient {
    client: reqwest::Client,
}

impl WebImageClient {
    pub fn new(timeout: Duration) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("contact-photos/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Fetch and decode the image at `url`: one GET, or an inline `data:` URL
    pub async fn download(&self, url: &str) -> Result<DynamicImage, DownloadError> {
        let url = url.trim();
        let bytes = if url.get(..5).is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:")) {
            decode_data_url(url)?
        } else {
            let parsed = reqwest::Url::parse(url).map_err(|_| DownloadError::InvalidUrl(url.to_string()))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(DownloadError::InvalidUrl(url.to_string()));
            }

            let response = self.client.get(parsed).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(DownloadError::Status(status));
            }
            response.bytes().await?.to_vec()
        };

        tokio::task::spawn_blocking(move || decode_oriented(&bytes))
            .await
            .map_err(|e| DownloadError::Task(e.to_string()))?
            .map_err(DownloadError::Decode)
    }
}

/// Payload of a base64 `data:` URL
pub fn decode_data_url(url: &str) -> Result<Vec<u8>, DownloadError> {
    let rest = url
        .get(5..)
        .filter(|_| url[..5].eq_ignore_ascii_case("data:"))
        .ok_or_else(|| DownloadError::DataUrl("missing data: scheme".to_string()))?;
    let (meta, data) = rest
        .split_once(',')
        .ok_or_else(|| DownloadError::DataUrl("missing payload".to_string()))?;

    let is_base64 = meta
        .split(';')
        .any(|segment| segment.eq_ignore_ascii_case("base64"));
    if !is_base64 {
        return Err(DownloadError::DataUrl("payload is not base64 encoded".to_string()));
    }

    let filtered: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64_STANDARD
        .decode(filtered)
        .map_err(|e| DownloadError::DataUrl(e.to_string()))
}
