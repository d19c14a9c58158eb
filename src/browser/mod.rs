#[cfg(feature = "browser")]
pub mod chrome;
#[cfg(test)]
pub mod fake;

use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;

/// Default upper bound for a DOM stability wait.
pub const STABLE_WAIT: Duration = Duration::from_secs(5);

/// Opaque element handle. Valid until the session navigates away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef(pub usize);

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub dev_tools: bool,
    /// Delay inserted before every UI action.
    pub slow_motion: Duration,
    pub download_dir: PathBuf,
    pub download_timeout: Duration,
}

impl BrowserOptions {
    pub fn new(download_dir: PathBuf) -> Self {
        Self {
            headless: true,
            dev_tools: false,
            slow_motion: Duration::ZERO,
            download_dir,
            download_timeout: Duration::from_secs(300),
        }
    }
}

/// Every call blocks until the browser has answered, so UI actions never overlap.
pub trait Browser {
    /// Open a new tab at `url`, make it current, and wait for it to settle.
    fn open_page(&mut self, url: &str) -> Result<()>;
    /// Navigate the current tab.
    fn goto(&mut self, url: &str) -> Result<()>;
    fn current_url(&mut self) -> Result<String>;
    /// Make the first tab whose URL contains `url_fragment` current.
    fn switch_to_page(&mut self, url_fragment: &str) -> Result<()>;
    /// Wait until the DOM stops changing, or `max` elapses.
    fn wait_stable(&mut self, max: Duration) -> Result<()>;
    fn pause(&mut self, duration: Duration);

    fn find(&mut self, selector: &str) -> Result<ElementRef>;
    fn find_all(&mut self, selector: &str) -> Result<Vec<ElementRef>>;
    fn find_in(&mut self, parent: ElementRef, selector: &str) -> Result<ElementRef>;
    fn find_all_in(&mut self, parent: ElementRef, selector: &str) -> Result<Vec<ElementRef>>;

    fn text(&mut self, el: ElementRef) -> Result<String>;
    fn attribute(&mut self, el: ElementRef, name: &str) -> Result<Option<String>>;
    /// A DOM property rendered as a string (`true`/`false` for booleans).
    fn property(&mut self, el: ElementRef, name: &str) -> Result<Option<String>>;

    /// Fails with `NotClickable` when the element ignores pointer events.
    fn click(&mut self, el: ElementRef) -> Result<()>;
    fn type_text(&mut self, el: ElementRef, text: &str) -> Result<()>;
    /// Send `keystrokes` backspaces followed by as many deletes.
    fn clear_text(&mut self, el: ElementRef, keystrokes: usize) -> Result<()>;
    /// Select the `<option>` whose label equals `label`.
    fn select_option(&mut self, el: ElementRef, label: &str) -> Result<()>;
    fn scroll_into_view(&mut self, el: ElementRef) -> Result<()>;

    /// Start watching for a download; call before the action that triggers it.
    fn arm_download(&mut self) -> Result<()>;
    /// Block until the armed download has finished and return its bytes.
    fn await_download(&mut self) -> Result<Vec<u8>>;
}

/// Trimmed text of `el`.
pub fn trimmed_text<B: Browser + ?Sized>(browser: &mut B, el: ElementRef) -> Result<String> {
    Ok(browser.text(el)?.trim().to_string())
}

/// Whether a checkbox input is currently checked.
pub fn is_checked<B: Browser + ?Sized>(browser: &mut B, el: ElementRef) -> Result<bool> {
    Ok(browser.property(el, "checked")?.as_deref() == Some("true"))
}

/// Compare two URLs ignoring a trailing slash.
pub fn same_url(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}
