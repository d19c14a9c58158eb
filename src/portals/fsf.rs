use chrono::NaiveDate;
use tracing::{debug, info};

use super::forms::{ensure_checked, select_format, set_divisions};
use crate::browser::{trimmed_text, Browser, STABLE_WAIT};
use crate::config::TargetPeriod;
use crate::error::{CbocError, Result};

pub const PROGRAM_SUMMARY: &str = "Operating Unit/Program Expenditure Summary";
pub const EXPENDITURE_SUMMARY: &str = "Operating Unit Expenditure Summary";
pub const DETAILED_ACTIVITY: &str = "Detailed Activity List";

const FISCAL_YEAR: &str = r#"select[name="ddlFiscalYear"]"#;
const FISCAL_MONTH: &str = r#"select[name="ddlFiscalMonth"]"#;
const FORMAT: &str = r#"select[name="ddlFormat"]"#;
const SUBMIT: &str = r#"input[type="submit"]"#;
const TOTALS_ONLY: &str = r#"input[name="chkOperatingUnitTotals"]"#;
const DATE_START: &str = r#"input[name="dbxAccountingDateStart"]"#;
const DATE_END: &str = r#"input[name="dbxAccountingDateEnd"]"#;
const ALL_BUDGET_REFS: &str = "input#cbBudgetRefAll";

#[derive(Debug, Clone, PartialEq)]
pub struct FsfItem {
    pub name: String,
    pub url: String,
}

pub struct Fsf<'b, B: Browser> {
    browser: &'b mut B,
    items: Vec<FsfItem>,
}

impl<'b, B: Browser> Fsf<'b, B> {
    /// Read the report links from the FSF landing page the browser is on.
    pub fn open(browser: &'b mut B) -> Result<Self> {
        let mut items = Vec::new();
        for list in browser.find_all("td ol")? {
            for link in browser.find_all_in(list, "li a")? {
                let name = trimmed_text(browser, link)?;
                let url = browser.property(link, "href")?.unwrap_or_default();
                items.push(FsfItem { name, url });
            }
        }
        debug!("FSF items: {items:?}");
        Ok(Self { browser, items })
    }

    pub fn items(&self) -> &[FsfItem] {
        &self.items
    }

    pub fn item(&self, name: &str) -> Result<&FsfItem> {
        self.items
            .iter()
            .find(|i| i.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| CbocError::ItemNotFound(name.to_string()))
    }

    fn open_report(&mut self, name: &str) -> Result<()> {
        let url = self.item(name)?.url.clone();
        self.browser.goto(&url)?;
        self.browser.wait_stable(STABLE_WAIT)
    }

    fn select_period(&mut self, period: TargetPeriod) -> Result<()> {
        let year = self.browser.find(FISCAL_YEAR)?;
        self.browser.select_option(year, &period.year.to_string())?;
        let month = self.browser.find(FISCAL_MONTH)?;
        self.browser.select_option(month, period.month_name())
    }

    fn submit_and_download(&mut self, format: &str) -> Result<Vec<u8>> {
        let select = self.browser.find(FORMAT)?;
        select_format(&mut *self.browser, select, format)?;

        info!("Waiting for download.");
        self.browser.arm_download()?;
        let submit = self.browser.find(SUBMIT)?;
        self.browser.click(submit)?;

        info!("Downloading...");
        let contents = self.browser.await_download()?;
        info!("Downloaded {} bytes.", contents.len());
        Ok(contents)
    }

    pub fn download_program_summary(
        &mut self,
        period: TargetPeriod,
        totals_only: bool,
        format: &str,
    ) -> Result<Vec<u8>> {
        self.open_report(PROGRAM_SUMMARY)?;
        self.select_period(period)?;
        let totals = self.browser.find(TOTALS_ONLY)?;
        ensure_checked(&mut *self.browser, totals, totals_only)?;
        self.submit_and_download(format)
    }

    pub fn download_expenditure_summary(
        &mut self,
        period: TargetPeriod,
        divisions: Option<&[String]>,
        format: &str,
    ) -> Result<Vec<u8>> {
        self.open_report(EXPENDITURE_SUMMARY)?;
        self.select_period(period)?;
        if let Some(divisions) = divisions {
            set_divisions(&mut *self.browser, divisions)?;
        }
        self.submit_and_download(format)
    }

    pub fn download_detailed_activity(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
        divisions: Option<&[String]>,
        format: &str,
    ) -> Result<Vec<u8>> {
        self.open_report(DETAILED_ACTIVITY)?;
        if let Some(divisions) = divisions {
            set_divisions(&mut *self.browser, divisions)?;
        }
        debug!("Start date: {start}, end date: {end}");

        // These inputs auto-select and shift their caret, so wipe them fully first.
        for (selector, date) in [(DATE_START, start), (DATE_END, end)] {
            let input = self.browser.find(selector)?;
            self.browser.click(input)?;
            self.browser.clear_text(input, 30)?;
            self.browser.type_text(input, &date.format("%-m/%-d/%Y").to_string())?;
        }

        let all_refs = self.browser.find(ALL_BUDGET_REFS)?;
        ensure_checked(&mut *self.browser, all_refs, true)?;
        self.submit_and_download(format)
    }
}
