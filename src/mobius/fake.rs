use super::snapshot::compact_search_text;
use super::view::{ArchiveView, Clicked};
use crate::error::{CbocError, Result};

#[derive(Debug, Clone)]
struct Node {
    label: String,
    key: String,
    document: bool,
    children: Vec<Node>,
}

impl Node {
    fn new(label: &str, document: bool) -> Self {
        Self {
            label: label.to_string(),
            key: compact_search_text(label),
            document,
            children: Vec::new(),
        }
    }

    fn child_mut(&mut self, label: &str, document: bool) -> &mut Node {
        let index = match self.children.iter().position(|c| c.label == label) {
            Some(i) => i,
            None => {
                self.children.push(Node::new(label, document));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Mode {
    Browse,
    Viewer(String),
    Extract(String),
    Results(String, String),
    Export(String, String),
}

/// Archive tree that pages, filters and exports like the Mobius list UI.
#[derive(Debug)]
pub struct FakeArchive {
    root: Node,
    path: Vec<String>,
    filter: Option<String>,
    shown: usize,
    mode: Mode,
    dont_zip: bool,
    armed: bool,
    pending: Option<Vec<u8>>,
    pub page_size: usize,
    pub extracts: Vec<String>,
    /// Number of upcoming item clicks that do nothing.
    pub swallow_clicks: usize,
    /// Indices of breadcrumbs that were clicked and moved the view.
    pub breadcrumb_clicks: Vec<usize>,
    pub filters: Vec<String>,
    pub dont_zip_toggles: usize,
    pub exports: Vec<(String, String)>,
}

impl FakeArchive {
    pub fn new(root: &str) -> Self {
        Self {
            root: Node::new(root, false),
            path: vec![root.to_string()],
            filter: None,
            shown: 5,
            mode: Mode::Browse,
            dont_zip: false,
            armed: false,
            pending: None,
            page_size: 5,
            extracts: vec!["DGL060".into(), "DGL114".into(), "DGL115".into()],
            swallow_clicks: 0,
            breadcrumb_clicks: Vec::new(),
            filters: Vec::new(),
            dont_zip_toggles: 0,
            exports: Vec::new(),
        }
    }

    /// Create the folders along `path`, relative to the root.
    pub fn folder(&mut self, path: &[&str]) {
        let mut node = &mut self.root;
        for label in path {
            node = node.child_mut(label, false);
        }
    }

    pub fn document(&mut self, folder: &[&str], label: &str) {
        let mut node = &mut self.root;
        for part in folder {
            node = node.child_mut(part, false);
        }
        node.child_mut(label, true);
    }

    pub fn breadcrumbs_now(&self) -> Vec<String> {
        self.path.clone()
    }

    fn current(&self) -> &Node {
        let mut node = &self.root;
        for label in &self.path[1..] {
            match node.children.iter().find(|c| &c.label == label) {
                Some(child) => node = child,
                None => break,
            }
        }
        node
    }

    fn listed(&self) -> Vec<&Node> {
        let filter = self.filter.as_deref().map(str::to_lowercase);
        self.current()
            .children
            .iter()
            .filter(|c| match &filter {
                Some(f) => c.label.to_lowercase().contains(f) || c.key.contains(f.as_str()),
                None => true,
            })
            .take(self.shown)
            .collect()
    }

    fn enter_folder(&mut self, label: String) {
        self.path.push(label);
        self.filter = None;
        self.shown = self.page_size;
    }

    fn wrong_mode(&self, action: &str) -> CbocError {
        CbocError::ElementNotFound(format!("{action} in {:?}", self.mode))
    }
}

impl ArchiveView for FakeArchive {
    fn breadcrumbs(&mut self) -> Result<Vec<String>> {
        Ok(self.path.clone())
    }

    fn click_breadcrumb(&mut self, index: usize) -> Result<Clicked> {
        if index >= self.path.len() {
            return Err(CbocError::ElementNotFound(format!("breadcrumb #{index}")));
        }
        if index + 1 == self.path.len() && self.mode == Mode::Browse {
            return Ok(Clicked::NotClickable);
        }
        self.path.truncate(index + 1);
        self.filter = None;
        self.shown = self.page_size;
        self.mode = Mode::Browse;
        self.breadcrumb_clicks.push(index);
        Ok(Clicked::Moved)
    }

    fn visible_items(&mut self) -> Result<Vec<String>> {
        Ok(match &self.mode {
            Mode::Browse => self.listed().iter().map(|n| n.label.clone()).collect(),
            Mode::Extract(_) => self.extracts.clone(),
            _ => Vec::new(),
        })
    }

    fn open_item(&mut self, label: &str) -> Result<bool> {
        match self.mode.clone() {
            Mode::Browse => {
                let Some(document) = self
                    .listed()
                    .iter()
                    .find(|n| n.label == label)
                    .map(|n| n.document)
                else {
                    return Ok(false);
                };
                if self.swallow_clicks > 0 {
                    self.swallow_clicks -= 1;
                    return Ok(true);
                }
                if document {
                    self.mode = Mode::Viewer(label.to_string());
                } else {
                    self.enter_folder(label.to_string());
                }
                Ok(true)
            }
            Mode::Extract(doc) => {
                if !self.extracts.iter().any(|e| e == label) {
                    return Ok(false);
                }
                self.mode = Mode::Results(doc, label.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn filter(&mut self, text: &str) -> Result<()> {
        self.filters.push(text.to_string());
        self.filter = Some(text.to_string());
        self.shown = self.page_size;
        Ok(())
    }

    fn scroll_items(&mut self) -> Result<()> {
        self.shown += self.page_size;
        Ok(())
    }

    fn open_extract(&mut self) -> Result<()> {
        let Mode::Viewer(doc) = self.mode.clone() else {
            return Err(self.wrong_mode("extract"));
        };
        self.mode = Mode::Extract(doc);
        Ok(())
    }

    fn open_export(&mut self) -> Result<()> {
        let Mode::Results(doc, report) = self.mode.clone() else {
            return Err(self.wrong_mode("export"));
        };
        self.mode = Mode::Export(doc, report);
        Ok(())
    }

    fn dont_zip_checked(&mut self) -> Result<bool> {
        Ok(self.dont_zip)
    }

    fn toggle_dont_zip(&mut self) -> Result<()> {
        self.dont_zip = !self.dont_zip;
        self.dont_zip_toggles += 1;
        Ok(())
    }

    fn arm_download(&mut self) -> Result<()> {
        self.armed = true;
        Ok(())
    }

    fn submit_export(&mut self) -> Result<()> {
        let Mode::Export(doc, report) = self.mode.clone() else {
            return Err(self.wrong_mode("submit"));
        };
        if self.armed {
            let zip = if self.dont_zip { "unzipped" } else { "zipped" };
            self.pending = Some(format!("{doc}/{report} {zip}").into_bytes());
            self.armed = false;
        }
        self.exports.push((doc.clone(), report.clone()));
        self.mode = Mode::Results(doc, report);
        Ok(())
    }

    fn take_download(&mut self) -> Result<Vec<u8>> {
        self.pending.take().ok_or(CbocError::DownloadTimeout)
    }

    fn close_preview(&mut self) -> Result<()> {
        if !matches!(self.mode, Mode::Results(..)) {
            return Err(self.wrong_mode("close"));
        }
        self.mode = Mode::Browse;
        Ok(())
    }

    fn settle(&mut self) -> Result<()> {
        Ok(())
    }
}
