use std::time::Duration;

use tracing::debug;

use crate::browser::{trimmed_text, Browser, ElementRef, STABLE_WAIT};
use crate::error::{CbocError, Result};

const BREADCRUMB_BAR: &str = "mobius-ui-content-breadcrumb";
const BREADCRUMB_ITEM: &str = "a.breadcrumb-item";
const ITEM_LABELS: &str =
    "app-mobius-view-content-list mobius-content-list mobius-content-item .content-item-label";
const FILTER_INPUT: &str =
    "app-mobius-view-content-list mobius-content-list mobius-content-filter input";
const EXTRACT_BUTTON: &str = r#"app-mobius-view-docviewer mobius-toolbar div[title="Extract"]"#;
const EXPORT_BUTTON: &str = r#"app-mobius-view-extract-results mobius-toolbar div[title="Export"]"#;
const DONT_ZIP: &str = "ngb-modal-window mobius-ui-checkbox#dontZipDownloadFile";
const SUBMIT_EXPORT: &str = "ngb-modal-window button.btn-submit";
const CLOSE_PREVIEW: &str = "app-mobius-view-extract-results mobius-ui-dv-close";

/// Outcome of clicking a breadcrumb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clicked {
    Moved,
    /// The breadcrumb ignores clicks, which it does when it is already the open level.
    NotClickable,
}

pub trait ArchiveView {
    /// Names of the breadcrumb trail, outermost first.
    fn breadcrumbs(&mut self) -> Result<Vec<String>>;
    fn click_breadcrumb(&mut self, index: usize) -> Result<Clicked>;
    /// Labels of the currently rendered list items, in display order.
    fn visible_items(&mut self) -> Result<Vec<String>>;
    /// Click the item labelled exactly `label`. Returns false when no such item is shown.
    fn open_item(&mut self, label: &str) -> Result<bool>;
    /// Replace the list filter text.
    fn filter(&mut self, text: &str) -> Result<()>;
    /// Scroll the item list so more entries render.
    fn scroll_items(&mut self) -> Result<()>;

    fn open_extract(&mut self) -> Result<()>;
    fn open_export(&mut self) -> Result<()>;
    fn dont_zip_checked(&mut self) -> Result<bool>;
    fn toggle_dont_zip(&mut self) -> Result<()>;
    fn arm_download(&mut self) -> Result<()>;
    fn submit_export(&mut self) -> Result<()>;
    fn take_download(&mut self) -> Result<Vec<u8>>;
    fn close_preview(&mut self) -> Result<()>;
    fn settle(&mut self) -> Result<()>;
}

/// [`ArchiveView`] backed by the live Mobius page.
pub struct DomArchiveView<'b, B: Browser> {
    browser: &'b mut B,
}

impl<'b, B: Browser> DomArchiveView<'b, B> {
    pub fn new(browser: &'b mut B) -> Self {
        Self { browser }
    }

    fn crumb_elements(&mut self) -> Result<Vec<ElementRef>> {
        // Only the first breadcrumb bar belongs to the content list.
        let bar = self.browser.find(BREADCRUMB_BAR)?;
        self.browser.find_all_in(bar, BREADCRUMB_ITEM)
    }

    fn labelled_items(&mut self) -> Result<Vec<(ElementRef, String)>> {
        let mut out = Vec::new();
        for el in self.browser.find_all(ITEM_LABELS)? {
            let text = trimmed_text(self.browser, el)?;
            out.push((el, text));
        }
        Ok(out)
    }

    fn click_and_settle(&mut self, selector: &str) -> Result<()> {
        let el = self.browser.find(selector)?;
        self.browser.click(el)?;
        self.settle()
    }
}

impl<B: Browser> ArchiveView for DomArchiveView<'_, B> {
    fn breadcrumbs(&mut self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for el in self.crumb_elements()? {
            names.push(trimmed_text(self.browser, el)?);
        }
        Ok(names)
    }

    fn click_breadcrumb(&mut self, index: usize) -> Result<Clicked> {
        let crumbs = self.crumb_elements()?;
        let el = *crumbs
            .get(index)
            .ok_or_else(|| CbocError::ElementNotFound(format!("breadcrumb #{index}")))?;
        match self.browser.click(el) {
            Ok(()) => {
                self.settle()?;
                Ok(Clicked::Moved)
            }
            Err(CbocError::NotClickable(_)) => Ok(Clicked::NotClickable),
            Err(e) => Err(e),
        }
    }

    fn visible_items(&mut self) -> Result<Vec<String>> {
        Ok(self
            .labelled_items()?
            .into_iter()
            .map(|(_, text)| text)
            .collect())
    }

    fn open_item(&mut self, label: &str) -> Result<bool> {
        let Some((el, _)) = self
            .labelled_items()?
            .into_iter()
            .find(|(_, text)| text == label)
        else {
            return Ok(false);
        };
        self.browser.click(el)?;
        self.settle()?;
        Ok(true)
    }

    fn filter(&mut self, text: &str) -> Result<()> {
        let input = self.browser.find(FILTER_INPUT)?;
        self.browser.clear_text(input, 30)?;
        self.browser.type_text(input, text)?;
        self.settle()
    }

    fn scroll_items(&mut self) -> Result<()> {
        let items = self.browser.find_all(ITEM_LABELS)?;
        if let Some(last) = items.last() {
            self.browser.scroll_into_view(*last)?;
        }
        self.browser.wait_stable(Duration::from_secs(1))
    }

    fn open_extract(&mut self) -> Result<()> {
        self.click_and_settle(EXTRACT_BUTTON)?;
        // The extract results take a few render passes to fill in.
        self.settle()?;
        self.settle()
    }

    fn open_export(&mut self) -> Result<()> {
        self.click_and_settle(EXPORT_BUTTON)
    }

    fn dont_zip_checked(&mut self) -> Result<bool> {
        let wrapper = self.browser.find(DONT_ZIP)?;
        let checkbox = self.browser.find_in(wrapper, ".basicCheckbox")?;
        let classes = self.browser.attribute(checkbox, "class")?.unwrap_or_default();
        Ok(classes.split_whitespace().any(|c| c == "checked"))
    }

    fn toggle_dont_zip(&mut self) -> Result<()> {
        let wrapper = self.browser.find(DONT_ZIP)?;
        let link = self.browser.find_in(wrapper, "a")?;
        self.browser.click(link)?;
        self.settle()
    }

    fn arm_download(&mut self) -> Result<()> {
        self.browser.arm_download()
    }

    fn submit_export(&mut self) -> Result<()> {
        self.click_and_settle(SUBMIT_EXPORT)
    }

    fn take_download(&mut self) -> Result<Vec<u8>> {
        self.browser.await_download()
    }

    fn close_preview(&mut self) -> Result<()> {
        debug!("closing the extract preview");
        self.click_and_settle(CLOSE_PREVIEW)
    }

    fn settle(&mut self) -> Result<()> {
        self.browser.wait_stable(STABLE_WAIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{Effect, FakeBrowser};

    fn mobius_page(fake: &mut FakeBrowser) -> (Vec<ElementRef>, Vec<ElementRef>) {
        let bar = fake.element("");
        let root = fake.element(" Repositories ");
        let current = fake.element("DGL060");
        fake.on_click(current, Effect::NotClickable);
        fake.within(bar, BREADCRUMB_ITEM, &[root, current]);
        fake.on_page(BREADCRUMB_BAR, &[bar]);

        let a = fake.element("Jan 31, 2025 11:43:10 PM");
        let b = fake.element(" 953300 ");
        fake.on_page(ITEM_LABELS, &[a, b]);
        (vec![root, current], vec![a, b])
    }

    #[test]
    fn test_breadcrumbs_and_items_are_trimmed() {
        let mut fake = FakeBrowser::new();
        mobius_page(&mut fake);
        let mut view = DomArchiveView::new(&mut fake);
        assert_eq!(view.breadcrumbs().unwrap(), vec!["Repositories", "DGL060"]);
        assert_eq!(
            view.visible_items().unwrap(),
            vec!["Jan 31, 2025 11:43:10 PM", "953300"]
        );
    }

    #[test]
    fn test_click_breadcrumb_reports_unclickable() {
        let mut fake = FakeBrowser::new();
        let (crumbs, _) = mobius_page(&mut fake);
        let mut view = DomArchiveView::new(&mut fake);
        assert_eq!(view.click_breadcrumb(1).unwrap(), Clicked::NotClickable);
        assert_eq!(view.click_breadcrumb(0).unwrap(), Clicked::Moved);
        assert!(view.click_breadcrumb(2).is_err());
        drop(view);
        assert_eq!(fake.clicks, vec![crumbs[0]]);
    }

    #[test]
    fn test_open_item_matches_exact_label() {
        let mut fake = FakeBrowser::new();
        let (_, items) = mobius_page(&mut fake);
        let mut view = DomArchiveView::new(&mut fake);
        assert!(!view.open_item("95330").unwrap());
        assert!(view.open_item("953300").unwrap());
        drop(view);
        assert_eq!(fake.clicks, vec![items[1]]);
    }

    #[test]
    fn test_dont_zip_state_from_class() {
        let mut fake = FakeBrowser::new();
        let wrapper = fake.element("");
        let checkbox = fake.element("");
        fake.set_attr(checkbox, "class", "basicCheckbox");
        let link = fake.element("");
        fake.on_click(link, Effect::ToggleClass(checkbox, "checked".to_string()));
        fake.within(wrapper, ".basicCheckbox", &[checkbox]);
        fake.within(wrapper, "a", &[link]);
        fake.on_page(DONT_ZIP, &[wrapper]);

        let mut view = DomArchiveView::new(&mut fake);
        assert!(!view.dont_zip_checked().unwrap());
        view.toggle_dont_zip().unwrap();
        assert!(view.dont_zip_checked().unwrap());
        drop(view);
        assert!(fake.has_class(checkbox, "basicCheckbox"));
    }

    #[test]
    fn test_filter_replaces_text() {
        let mut fake = FakeBrowser::new();
        let input = fake.element("");
        fake.on_page(FILTER_INPUT, &[input]);
        let mut view = DomArchiveView::new(&mut fake);
        view.filter("DGL060").unwrap();
        view.filter("20250131234310").unwrap();
        drop(view);
        assert_eq!(fake.typed, vec![(input, "20250131234310".to_string())]);
    }
}
