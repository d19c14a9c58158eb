use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Browser, BrowserOptions, ElementRef};
use crate::error::{CbocError, Result};

const POLL: Duration = Duration::from_millis(250);

/// Element handles of the current document. Navigation retires them; a
/// retired handle reads as stale instead of aliasing a newer element.
struct Handles<T> {
    base: usize,
    items: Vec<T>,
}

impl<T> Handles<T> {
    fn new() -> Self {
        Self {
            base: 0,
            items: Vec::new(),
        }
    }

    fn remember(&mut self, item: T) -> ElementRef {
        self.items.push(item);
        ElementRef(self.base + self.items.len() - 1)
    }

    fn get(&self, el: ElementRef) -> Option<&T> {
        el.0.checked_sub(self.base).and_then(|i| self.items.get(i))
    }

    fn retire(&mut self) {
        self.base += self.items.len();
        self.items.clear();
    }
}

/// Chrome over the DevTools protocol. Owns a tokio runtime and blocks on
/// every call.
pub struct ChromeBrowser {
    runtime: Runtime,
    browser: CdpBrowser,
    handler: JoinHandle<()>,
    page: Option<Page>,
    elements: Handles<Element>,
    options: BrowserOptions,
    armed: Option<HashSet<PathBuf>>,
}

impl ChromeBrowser {
    pub fn launch(options: BrowserOptions) -> Result<Self> {
        std::fs::create_dir_all(&options.download_dir)?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;

        info!("Launching Chrome (headless: {})", options.headless);
        let mut builder = BrowserConfig::builder()
            .arg("--disable-web-security")
            .arg("--start-maximized");
        if !options.headless {
            builder = builder.with_head();
        }
        if options.dev_tools {
            builder = builder.arg("--auto-open-devtools-for-tabs");
        }
        let config = builder
            .build()
            .map_err(|e| CbocError::Browser(format!("Failed to build browser config: {e}")))?;

        let (browser, mut handler) = runtime.block_on(CdpBrowser::launch(config))?;
        let handler = runtime.spawn(async move {
            while let Some(result) = handler.next().await {
                if result.is_err() {
                    break;
                }
            }
        });

        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(options.download_dir.to_string_lossy().to_string())
            .build()
            .map_err(CbocError::Browser)?;
        runtime.block_on(browser.execute(params))?;

        Ok(Self {
            runtime,
            browser,
            handler,
            page: None,
            elements: Handles::new(),
            options,
            armed: None,
        })
    }

    pub fn close(mut self) -> Result<()> {
        self.runtime.block_on(self.browser.close())?;
        self.handler.abort();
        Ok(())
    }

    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| CbocError::Browser("no page is open".to_string()))
    }

    fn element(&self, el: ElementRef) -> Result<&Element> {
        self.elements
            .get(el)
            .ok_or_else(|| CbocError::Browser(format!("stale element handle {}", el.0)))
    }

    fn remember(&mut self, element: Element) -> ElementRef {
        self.elements.remember(element)
    }

    fn slow(&self) {
        if !self.options.slow_motion.is_zero() {
            std::thread::sleep(self.options.slow_motion);
        }
    }

    fn call(&self, el: ElementRef, function: &str) -> Result<Option<serde_json::Value>> {
        let element = self.element(el)?;
        let returns = self
            .runtime
            .block_on(element.call_js_fn(function, false))?;
        Ok(returns.result.value)
    }

    fn dom_size(&self) -> Option<i64> {
        let page = self.page.as_ref()?;
        self.runtime
            .block_on(page.evaluate("document.documentElement.outerHTML.length"))
            .ok()
            .and_then(|r| r.into_value::<i64>().ok())
    }
}

fn list_files(dir: &Path) -> Result<HashSet<PathBuf>> {
    let mut files = HashSet::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.insert(entry.path());
        }
    }
    Ok(files)
}

fn is_partial(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("crdownload") || e.eq_ignore_ascii_case("tmp"))
}

fn value_to_string(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

impl Browser for ChromeBrowser {
    fn open_page(&mut self, url: &str) -> Result<()> {
        debug!("open_page: {url}");
        self.slow();
        let page = self.runtime.block_on(self.browser.new_page(url))?;
        if let Err(e) = self.runtime.block_on(page.wait_for_navigation()) {
            warn!("navigation to {url} did not complete cleanly: {e}");
        }
        self.page = Some(page);
        self.elements.retire();
        self.wait_stable(super::STABLE_WAIT)
    }

    fn goto(&mut self, url: &str) -> Result<()> {
        debug!("goto: {url}");
        self.slow();
        let page = self.page()?;
        self.runtime.block_on(page.goto(url))?;
        self.elements.retire();
        self.wait_stable(super::STABLE_WAIT)
    }

    fn current_url(&mut self) -> Result<String> {
        let page = self.page()?;
        Ok(self.runtime.block_on(page.url())?.unwrap_or_default())
    }

    fn switch_to_page(&mut self, url_fragment: &str) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let pages = self.runtime.block_on(self.browser.pages())?;
            for page in pages {
                let url = self.runtime.block_on(page.url())?.unwrap_or_default();
                debug!("page: {url}");
                if url.contains(url_fragment) {
                    self.page = Some(page);
                    self.elements.retire();
                    return Ok(());
                }
            }
            if Instant::now() > deadline {
                return Err(CbocError::Browser(format!(
                    "no open page matches {url_fragment:?}"
                )));
            }
            std::thread::sleep(POLL);
        }
    }

    fn wait_stable(&mut self, max: Duration) -> Result<()> {
        let deadline = Instant::now() + max;
        let mut previous = self.dom_size();
        loop {
            std::thread::sleep(POLL);
            let current = self.dom_size();
            if current.is_some() && current == previous {
                return Ok(());
            }
            if Instant::now() > deadline {
                debug!("DOM still changing after {max:?}");
                return Ok(());
            }
            previous = current;
        }
    }

    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn find(&mut self, selector: &str) -> Result<ElementRef> {
        let page = self.page()?;
        let found = self
            .runtime
            .block_on(page.find_element(selector))
            .map_err(|e| {
                debug!("find {selector}: {e}");
                CbocError::ElementNotFound(selector.to_string())
            })?;
        Ok(self.remember(found))
    }

    fn find_all(&mut self, selector: &str) -> Result<Vec<ElementRef>> {
        let page = self.page()?;
        let found = self
            .runtime
            .block_on(page.find_elements(selector))?;
        Ok(found.into_iter().map(|e| self.remember(e)).collect())
    }

    fn find_in(&mut self, parent: ElementRef, selector: &str) -> Result<ElementRef> {
        let element = self.element(parent)?;
        let found = self
            .runtime
            .block_on(element.find_element(selector))
            .map_err(|_| CbocError::ElementNotFound(selector.to_string()))?;
        Ok(self.remember(found))
    }

    fn find_all_in(&mut self, parent: ElementRef, selector: &str) -> Result<Vec<ElementRef>> {
        let element = self.element(parent)?;
        let found = self
            .runtime
            .block_on(element.find_elements(selector))?;
        Ok(found.into_iter().map(|e| self.remember(e)).collect())
    }

    fn text(&mut self, el: ElementRef) -> Result<String> {
        let element = self.element(el)?;
        Ok(self.runtime.block_on(element.inner_text())?.unwrap_or_default())
    }

    fn attribute(&mut self, el: ElementRef, name: &str) -> Result<Option<String>> {
        let element = self.element(el)?;
        Ok(self.runtime.block_on(element.attribute(name))?)
    }

    fn property(&mut self, el: ElementRef, name: &str) -> Result<Option<String>> {
        let element = self.element(el)?;
        let value = self.runtime.block_on(element.property(name))?;
        Ok(value.and_then(value_to_string))
    }

    fn click(&mut self, el: ElementRef) -> Result<()> {
        self.slow();
        let blocked = self
            .call(
                el,
                "function() { return getComputedStyle(this).pointerEvents === 'none'; }",
            )?
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if blocked {
            return Err(CbocError::NotClickable(format!("element {}", el.0)));
        }
        let element = self.element(el)?;
        self.runtime.block_on(element.click())?;
        Ok(())
    }

    fn type_text(&mut self, el: ElementRef, text: &str) -> Result<()> {
        self.slow();
        let element = self.element(el)?;
        self.runtime.block_on(element.focus())?;
        self.runtime.block_on(element.type_str(text))?;
        Ok(())
    }

    fn clear_text(&mut self, el: ElementRef, keystrokes: usize) -> Result<()> {
        self.slow();
        let element = self.element(el)?;
        self.runtime.block_on(element.focus())?;
        for key in ["Backspace", "Delete"] {
            for _ in 0..keystrokes {
                self.runtime.block_on(element.press_key(key))?;
            }
        }
        Ok(())
    }

    fn select_option(&mut self, el: ElementRef, label: &str) -> Result<()> {
        self.slow();
        let label_json = serde_json::to_string(label)
            .map_err(|e| CbocError::Browser(e.to_string()))?;
        let function = format!(
            "function() {{
                const label = {label_json};
                for (const option of this.options) {{
                    if (option.text.trim() === label) {{
                        this.value = option.value;
                        this.dispatchEvent(new Event('input', {{ bubbles: true }}));
                        this.dispatchEvent(new Event('change', {{ bubbles: true }}));
                        return true;
                    }}
                }}
                return false;
            }}"
        );
        let selected = self
            .call(el, &function)?
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if !selected {
            return Err(CbocError::ElementNotFound(format!("option {label:?}")));
        }
        Ok(())
    }

    fn scroll_into_view(&mut self, el: ElementRef) -> Result<()> {
        let element = self.element(el)?;
        self.runtime.block_on(element.scroll_into_view())?;
        Ok(())
    }

    fn arm_download(&mut self) -> Result<()> {
        self.armed = Some(list_files(&self.options.download_dir)?);
        Ok(())
    }

    fn await_download(&mut self) -> Result<Vec<u8>> {
        let before = self
            .armed
            .take()
            .ok_or_else(|| CbocError::Browser("download was not armed".to_string()))?;
        let dir = self.options.download_dir.clone();
        let deadline = Instant::now() + self.options.download_timeout;
        let mut last_seen: Option<(PathBuf, u64)> = None;

        loop {
            if Instant::now() > deadline {
                return Err(CbocError::DownloadTimeout);
            }
            let candidate = list_files(&dir)?
                .into_iter()
                .filter(|p| !before.contains(p))
                .find(|p| !is_partial(p));
            if let Some(path) = candidate {
                let size = std::fs::metadata(&path)?.len();
                if size > 0 && last_seen.as_ref() == Some(&(path.clone(), size)) {
                    let bytes = std::fs::read(&path)?;
                    if let Err(e) = std::fs::remove_file(&path) {
                        warn!("could not remove {}: {e}", path.display());
                    }
                    return Ok(bytes);
                }
                last_seen = Some((path, size));
            }
            std::thread::sleep(POLL);
        }
    }
}
