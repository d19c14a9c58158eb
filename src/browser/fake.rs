use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use super::{Browser, ElementRef};
use crate::error::{CbocError, Result};

#[derive(Debug, Clone)]
pub enum Effect {
    SetUrl(String),
    ToggleChecked,
    ToggleClass(ElementRef, String),
    NotClickable,
}

#[derive(Debug, Default, Clone)]
struct FakeElement {
    text: String,
    attributes: HashMap<String, String>,
    properties: HashMap<String, String>,
    effects: Vec<Effect>,
}

/// Scripted in-memory browser. Selectors match verbatim against what the
/// test registered; clicks run the element's effects and are recorded.
#[derive(Debug, Default)]
pub struct FakeBrowser {
    elements: Vec<FakeElement>,
    queries: HashMap<String, Vec<ElementRef>>,
    scoped: HashMap<(ElementRef, String), Vec<ElementRef>>,
    page_urls: HashMap<String, String>,
    broken: HashSet<String>,
    url: String,
    downloads: VecDeque<Vec<u8>>,
    armed: bool,
    pub clicks: Vec<ElementRef>,
    pub typed: Vec<(ElementRef, String)>,
    pub selected: Vec<(ElementRef, String)>,
    pub opened: Vec<String>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(&mut self, text: &str) -> ElementRef {
        self.elements.push(FakeElement {
            text: text.to_string(),
            ..FakeElement::default()
        });
        ElementRef(self.elements.len() - 1)
    }

    pub fn set_attr(&mut self, el: ElementRef, name: &str, value: &str) {
        self.elements[el.0]
            .attributes
            .insert(name.to_string(), value.to_string());
    }

    pub fn set_prop(&mut self, el: ElementRef, name: &str, value: &str) {
        self.elements[el.0]
            .properties
            .insert(name.to_string(), value.to_string());
    }

    pub fn checkbox(&mut self, checked: bool) -> ElementRef {
        let el = self.element("");
        self.set_prop(el, "checked", if checked { "true" } else { "false" });
        self.on_click(el, Effect::ToggleChecked);
        el
    }

    pub fn on_click(&mut self, el: ElementRef, effect: Effect) {
        self.elements[el.0].effects.push(effect);
    }

    pub fn on_page(&mut self, selector: &str, els: &[ElementRef]) {
        self.queries.insert(selector.to_string(), els.to_vec());
    }

    pub fn within(&mut self, parent: ElementRef, selector: &str, els: &[ElementRef]) {
        self.scoped.insert((parent, selector.to_string()), els.to_vec());
    }

    /// Make lookups of `selector` fail as a dropped DevTools connection would.
    pub fn break_query(&mut self, selector: &str) {
        self.broken.insert(selector.to_string());
    }

    /// A `<select>` with one `<option>` per label.
    pub fn select(&mut self, labels: &[&str]) -> ElementRef {
        let select = self.element("");
        let options: Vec<ElementRef> = labels.iter().map(|l| self.element(l)).collect();
        self.within(select, "option", &options);
        select
    }

    /// Register a tab that `open_page`/`switch_to_page` can land on.
    pub fn page(&mut self, url: &str, landing_url: &str) {
        self.page_urls.insert(url.to_string(), landing_url.to_string());
    }

    pub fn queue_download(&mut self, bytes: &[u8]) {
        self.downloads.push_back(bytes.to_vec());
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_checked(&self, el: ElementRef) -> bool {
        self.elements[el.0].properties.get("checked").map(String::as_str) == Some("true")
    }

    pub fn has_class(&self, el: ElementRef, class: &str) -> bool {
        self.elements[el.0]
            .attributes
            .get("class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }

    pub fn clicks_on(&self, el: ElementRef) -> usize {
        self.clicks.iter().filter(|c| **c == el).count()
    }
}

impl Browser for FakeBrowser {
    fn open_page(&mut self, url: &str) -> Result<()> {
        self.opened.push(url.to_string());
        self.url = self
            .page_urls
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_string());
        Ok(())
    }

    fn goto(&mut self, url: &str) -> Result<()> {
        self.opened.push(url.to_string());
        self.url = url.to_string();
        Ok(())
    }

    fn current_url(&mut self) -> Result<String> {
        Ok(self.url.clone())
    }

    fn switch_to_page(&mut self, url_fragment: &str) -> Result<()> {
        let found = self
            .page_urls
            .values()
            .find(|u| u.contains(url_fragment))
            .cloned()
            .ok_or_else(|| CbocError::Browser(format!("no page matching {url_fragment}")))?;
        self.url = found;
        Ok(())
    }

    fn wait_stable(&mut self, _max: Duration) -> Result<()> {
        Ok(())
    }

    fn pause(&mut self, _duration: Duration) {}

    fn find(&mut self, selector: &str) -> Result<ElementRef> {
        self.find_all(selector)?
            .first()
            .copied()
            .ok_or_else(|| CbocError::ElementNotFound(selector.to_string()))
    }

    fn find_all(&mut self, selector: &str) -> Result<Vec<ElementRef>> {
        if self.broken.contains(selector) {
            return Err(CbocError::Browser(format!("lookup of {selector} failed")));
        }
        Ok(self.queries.get(selector).cloned().unwrap_or_default())
    }

    fn find_in(&mut self, parent: ElementRef, selector: &str) -> Result<ElementRef> {
        self.find_all_in(parent, selector)?
            .first()
            .copied()
            .ok_or_else(|| CbocError::ElementNotFound(selector.to_string()))
    }

    fn find_all_in(&mut self, parent: ElementRef, selector: &str) -> Result<Vec<ElementRef>> {
        if self.broken.contains(selector) {
            return Err(CbocError::Browser(format!("lookup of {selector} failed")));
        }
        Ok(self
            .scoped
            .get(&(parent, selector.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn text(&mut self, el: ElementRef) -> Result<String> {
        Ok(self.elements[el.0].text.clone())
    }

    fn attribute(&mut self, el: ElementRef, name: &str) -> Result<Option<String>> {
        Ok(self.elements[el.0].attributes.get(name).cloned())
    }

    fn property(&mut self, el: ElementRef, name: &str) -> Result<Option<String>> {
        Ok(self.elements[el.0].properties.get(name).cloned())
    }

    fn click(&mut self, el: ElementRef) -> Result<()> {
        let effects = self.elements[el.0].effects.clone();
        if effects.iter().any(|e| matches!(e, Effect::NotClickable)) {
            return Err(CbocError::NotClickable(format!("element {}", el.0)));
        }
        self.clicks.push(el);
        for effect in effects {
            match effect {
                Effect::SetUrl(url) => self.url = url,
                Effect::ToggleChecked => {
                    let next = if self.is_checked(el) { "false" } else { "true" };
                    self.set_prop(el, "checked", next);
                }
                Effect::ToggleClass(target, class) => {
                    let classes = self.elements[target.0]
                        .attributes
                        .get("class")
                        .cloned()
                        .unwrap_or_default();
                    let mut parts: Vec<&str> = classes.split_whitespace().collect();
                    if parts.contains(&class.as_str()) {
                        parts.retain(|c| *c != class);
                    } else {
                        parts.push(&class);
                    }
                    let joined = parts.join(" ");
                    self.set_attr(target, "class", &joined);
                }
                Effect::NotClickable => {}
            }
        }
        Ok(())
    }

    fn type_text(&mut self, el: ElementRef, text: &str) -> Result<()> {
        self.typed.push((el, text.to_string()));
        Ok(())
    }

    fn clear_text(&mut self, el: ElementRef, _keystrokes: usize) -> Result<()> {
        self.typed.retain(|(e, _)| *e != el);
        Ok(())
    }

    fn select_option(&mut self, el: ElementRef, label: &str) -> Result<()> {
        let options = self.find_all_in(el, "option")?;
        if !options.is_empty() && !options.iter().any(|o| self.elements[o.0].text == label) {
            return Err(CbocError::ElementNotFound(format!("option {label:?}")));
        }
        self.selected.push((el, label.to_string()));
        Ok(())
    }

    fn scroll_into_view(&mut self, _el: ElementRef) -> Result<()> {
        Ok(())
    }

    fn arm_download(&mut self) -> Result<()> {
        self.armed = true;
        Ok(())
    }

    fn await_download(&mut self) -> Result<Vec<u8>> {
        if !self.armed {
            return Err(CbocError::Browser("download was not armed".to_string()));
        }
        self.armed = false;
        self.downloads.pop_front().ok_or(CbocError::DownloadTimeout)
    }
}
