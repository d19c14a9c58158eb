pub mod snapshot;
pub mod view;

#[cfg(test)]
pub mod fake;

use tracing::{debug, info};

use crate::error::{CbocError, Result};
pub use view::{ArchiveView, Clicked, DomArchiveView};

/// Where the navigator believes it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Position {
    /// Breadcrumb names down to the level last reset to, followed by every item opened since.
    pub path: Vec<String>,
    /// Text currently typed into the list filter.
    pub filter: Option<String>,
}

/// Walks the archive tree (repositories, reports, dated snapshots, division
/// documents) one level at a time, tracking what it has opened in [`Position`].
pub struct Mobius<V: ArchiveView> {
    view: V,
    position: Position,
}

/// Exact label first, then a case-insensitive match.
fn match_label<'a>(items: &'a [String], name: &str) -> Option<&'a String> {
    items
        .iter()
        .find(|i| *i == name)
        .or_else(|| items.iter().find(|i| i.eq_ignore_ascii_case(name)))
}

impl<V: ArchiveView> Mobius<V> {
    pub fn new(view: V) -> Self {
        Self {
            view,
            position: Position::default(),
        }
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    /// Visible item labels in display order, without duplicates.
    pub fn items(&mut self) -> Result<Vec<String>> {
        let mut out: Vec<String> = Vec::new();
        for item in self.view.visible_items()? {
            if !out.contains(&item) {
                out.push(item);
            }
        }
        Ok(out)
    }

    /// Collect items, scrolling the list until nothing new appears or `limit` is reached.
    pub fn items_up_to(&mut self, limit: usize) -> Result<Vec<String>> {
        let mut out: Vec<String> = Vec::new();
        loop {
            let before = out.len();
            for item in self.view.visible_items()? {
                if !out.contains(&item) {
                    out.push(item);
                }
            }
            if out.len() == before || out.len() >= limit {
                break;
            }
            self.view.scroll_items()?;
        }
        debug!("collected {} items", out.len());
        Ok(out)
    }

    /// Narrow the list with the filter box. Snapshot labels are typed in their compact form.
    pub fn search_items(&mut self, text: &str) -> Result<()> {
        let query = snapshot::compact_search_text(text);
        info!("Searching for {query}");
        self.view.filter(&query)?;
        self.position.filter = Some(query);
        Ok(())
    }

    /// Open the item called `name`. The archive sometimes swallows the first click,
    /// so a second one is sent if the item is still listed afterwards.
    pub fn click_item(&mut self, name: &str) -> Result<()> {
        debug!("click item {name}");
        let items = self.view.visible_items()?;
        let label = match_label(&items, name)
            .cloned()
            .ok_or_else(|| CbocError::ItemNotFound(name.to_string()))?;
        if !self.view.open_item(&label)? {
            return Err(CbocError::ItemNotFound(name.to_string()));
        }

        let items = self.view.visible_items()?;
        if items.contains(&label) {
            debug!("No dice; trying again.");
            self.view.open_item(&label)?;
        }
        self.position.path.push(label);
        self.position.filter = None;
        Ok(())
    }

    /// Click `name`, filtering the list for it first when it is not on screen.
    fn open_segment(&mut self, name: &str) -> Result<()> {
        let items = self.view.visible_items()?;
        if match_label(&items, name).is_none() {
            self.search_items(name)?;
        }
        self.click_item(name)
    }

    /// Navigate to `path`, reusing as much of the current breadcrumb trail as possible.
    pub fn go_to_report<S: AsRef<str>>(&mut self, path: &[S]) -> Result<()> {
        let path: Vec<&str> = path.iter().map(AsRef::as_ref).collect();
        info!("Going to {}", path.join(" / "));

        let crumbs = self.view.breadcrumbs()?;
        let mut anchor = None;
        let mut consumed = 0;
        for (i, crumb) in crumbs.iter().enumerate() {
            if let Some(offset) = path[consumed..]
                .iter()
                .position(|segment| segment.eq_ignore_ascii_case(crumb))
            {
                anchor = Some(i);
                consumed += offset + 1;
            }
        }
        let anchor = anchor.ok_or_else(|| CbocError::ReportPathNotFound(path.join(" / ")))?;

        match self.view.click_breadcrumb(anchor)? {
            Clicked::Moved => self.position.filter = None,
            Clicked::NotClickable => debug!("already at {}", crumbs[anchor]),
        }
        self.position.path = crumbs[..=anchor].to_vec();

        for segment in &path[consumed..] {
            self.open_segment(segment)?;
        }
        Ok(())
    }

    /// Export the extract `report_name` of the document `file_token` in the open level.
    pub fn extract_report(&mut self, report_name: &str, file_token: &str) -> Result<Vec<u8>> {
        info!("Extracting {report_name} from {file_token}");
        self.open_segment(file_token)?;

        self.view.open_extract()?;
        self.click_item(report_name)?;
        self.view.open_export()?;
        if !self.view.dont_zip_checked()? {
            self.view.toggle_dont_zip()?;
        }

        info!("Waiting for download.");
        self.view.arm_download()?;
        self.view.submit_export()?;
        let contents = self.view.take_download()?;
        info!("Downloaded {} bytes.", contents.len());

        self.view.close_preview()?;
        Ok(contents)
    }
}
