/// File-based tracing setup
///
/// Logs go to `<data dir>/contact-photos/contact-photos.log`. The filter is
/// read from `CONTACT_PHOTOS_LOG` (e.g. `debug`, `contact_photos=trace`) and
/// defaults to `info`.

use std::path::Path;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "CONTACT_PHOTOS_LOG";
const LOG_FILE: &str = "contact-photos.log";

/// Install the global subscriber. Falls back to stderr if the log file
/// cannot be created.
pub fn init(log_dir: &Path) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    let log_file = std::fs::create_dir_all(log_dir)
        .and_then(|_| std::fs::File::create(log_dir.join(LOG_FILE)));

    match log_file {
        Ok(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init(),
        Err(err) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            tracing::warn!(dir = %log_dir.display(), error = %err, "cannot create log file, logging to stderr");
        }
    }
}
