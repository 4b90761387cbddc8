/// Web image search
///
/// The search page is rendered by a host component. After each page load we
/// inject a script that turns a click on any image into a message on
/// `MESSAGE_CHANNEL` carrying the image URL; the session relays that URL to
/// the download adapter.

use reqwest::Url;

use crate::error::SearchError;

/// Name of the channel the injected script posts selected image URLs on
pub const MESSAGE_CHANNEL: &str = "imageSelected";

/// Default image search endpoint; the query goes into the `q` parameter
pub const DEFAULT_SEARCH_BASE_URL: &str = "https://www.google.com/search?tbm=isch";

/// Click interception script.
///
/// Listens in the capture phase and walks from the clicked element up
/// through its ancestors. For each element, first match wins: the element is
/// an `<img>`, it has a CSS background image, or it contains an `<img>`. The
/// previous listener is removed first so injecting again after another page
/// load does not stack handlers.
pub const SELECTION_SCRIPT: &str = r#"
if (window.imageSelectionHandler) {
    document.removeEventListener('click', window.imageSelectionHandler, true);
}

window.imageSelectionHandler = function(e) {
    var imageUrl = null;
    var current = e.target;

    while (current && !imageUrl) {
        if (current.tagName === 'IMG') {
            imageUrl = current.src;
            break;
        }

        var background = window.getComputedStyle(current).backgroundImage;
        if (background && background !== 'none') {
            var match = background.match(/url\("(.+?)"\)/);
            if (match) {
                imageUrl = match[1];
                break;
            }
        }

        var child = current.querySelector('img');
        if (child) {
            imageUrl = child.src;
            break;
        }

        current = current.parentElement;
    }

    if (imageUrl) {
        e.preventDefault();
        e.stopPropagation();
        window.webkit.messageHandlers.imageSelected.postMessage(imageUrl);
    }
};

document.addEventListener('click', window.imageSelectionHandler, true);
"#;

/// Join the non-empty search terms with single spaces
pub fn build_search_query(name: &str, organization: Option<&str>, location: Option<&str>) -> String {
    std::iter::once(name)
        .chain(organization)
        .chain(location)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Search page URL with `query` percent-encoded as the `q` parameter
pub fn search_url(base: &str, query: &str) -> Result<Url, SearchError> {
    let mut url = Url::parse(base).map_err(|e| SearchError::InvalidBaseUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })?;
    url.query_pairs_mut().append_pair("q", query);
    Ok(url)
}

/// The host component that renders the search page
pub trait SearchRenderer {
    fn load(&mut self, url: &Url);
    fn evaluate_script(&mut self, script: &str) -> Result<(), String>;
}

/// One search dialog: owns its renderer and relays selections.
#[derive(Debug)]
pub struct SearchSession<R> {
    renderer: R,
    url: Url,
    query: String,
    is_loading: bool,
    error: Option<String>,
}

impl<R: SearchRenderer> SearchSession<R> {
    pub fn new(renderer: R, base_url: &str, query: String) -> Result<Self, SearchError> {
        let url = search_url(base_url, &query)?;
        Ok(Self {
            renderer,
            url,
            query,
            is_loading: true,
            error: None,
        })
    }

    /// Begin loading the search page
    pub fn start(&mut self) {
        self.is_loading = true;
        self.error = None;
        tracing::info!(url = %self.url, "loading image search");
        self.renderer.load(&self.url);
    }

    /// The page finished loading (possibly again): (re)inject the script
    pub fn on_page_loaded(&mut self) {
        self.is_loading = false;
        if let Err(err) = self.renderer.evaluate_script(SELECTION_SCRIPT) {
            tracing::warn!(error = %err, "failed to inject image selection script");
        }
    }

    pub fn on_load_failed(&mut self, reason: &str) {
        self.is_loading = false;
        tracing::warn!(reason, "image search failed to load");
        self.error = Some("Failed to load search results".to_string());
    }

    /// A message from the page. Returns the image URL to download when it
    /// arrives on the selection channel; anything else is ignored.
    pub fn on_script_message(&mut self, channel: &str, body: &str) -> Option<String> {
        if channel != MESSAGE_CHANNEL {
            tracing::debug!(channel, "ignoring message on unknown channel");
            return None;
        }
        let body = body.trim();
        if body.is_empty() {
            return None;
        }
        self.error = None;
        Some(body.to_string())
    }

    /// Show a failure (e.g. the download) inside the search dialog
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }
}

/// Desktop renderer without an embedded browser.
///
/// The search page is opened by the user in their own browser (the URL is
/// shown); a copied image address is pasted back into the dialog and relayed
/// on `MESSAGE_CHANNEL`, just like a click caught by the injected script.
#[derive(Debug, Clone, Default)]
pub struct PastedLinkRenderer {
    loaded: Option<Url>,
    /// Text currently in the paste field
    pub pasted: String,
}

impl PastedLinkRenderer {
    pub fn loaded(&self) -> Option<&Url> {
        self.loaded.as_ref()
    }

    /// Take the pasted link as a script message body
    pub fn take_pasted(&mut self) -> String {
        std::mem::take(&mut self.pasted)
    }
}

impl SearchRenderer for PastedLinkRenderer {
    fn load(&mut self, url: &Url) {
        self.loaded = Some(url.clone());
    }

    fn evaluate_script(&mut self, _script: &str) -> Result<(), String> {
        // Nothing to run the script in; pasted links arrive on the channel directly.
        Ok(())
    }
}
