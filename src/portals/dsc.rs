use tracing::{debug, info};

use super::fsf::Fsf;
use crate::browser::{same_url, trimmed_text, Browser, STABLE_WAIT};
use crate::error::{CbocError, Result};

pub const LOGIN_URL: &str = "https://secure.dataservice.org/Logon/";
pub const FSF_APPLICATION: &str = "Finance Reporting (FSF)";
const PORTAL: &str = "Data Service Center";

#[derive(Debug, Clone, PartialEq)]
pub struct Application {
    pub name: String,
    pub url: String,
}

pub struct DataServiceCenter<'b, B: Browser> {
    browser: &'b mut B,
    logged_in: bool,
    applications: Vec<Application>,
}

impl<'b, B: Browser> DataServiceCenter<'b, B> {
    pub fn new(browser: &'b mut B) -> Self {
        Self {
            browser,
            logged_in: false,
            applications: Vec::new(),
        }
    }

    pub fn login(&mut self, district: &str, username: &str, password: &str) -> Result<()> {
        info!("Logging in to the Data Service Center...");
        let b = &mut *self.browser;
        b.open_page(LOGIN_URL)?;

        let form = b.find("form#loginForm")?;
        let district_select = b.find_in(form, r#"select[name="Input.District"]"#)?;
        b.select_option(district_select, district)?;
        let username_input = b.find_in(form, r#"input[name="Input.Username"]"#)?;
        b.type_text(username_input, username)?;
        let password_input = b.find_in(form, r#"input[name="Input.Password"]"#)?;
        b.type_text(password_input, password)?;
        let submit = b.find_in(form, r#"button[type="submit"]"#)?;
        b.click(submit)?;
        b.wait_stable(STABLE_WAIT)?;

        if same_url(&b.current_url()?, LOGIN_URL) {
            return Err(CbocError::LoginFailed { portal: PORTAL });
        }
        self.logged_in = true;
        self.load_applications()
    }

    fn load_applications(&mut self) -> Result<()> {
        let b = &mut *self.browser;
        self.applications.clear();
        for card in b.find_all(".card")? {
            let Ok(header) = b.find_in(card, ".card-header") else {
                continue;
            };
            if !trimmed_text(b, header)?.eq_ignore_ascii_case("applications") {
                continue;
            }
            for link in b.find_all_in(card, ".list-group a.list-group-item")? {
                let name = trimmed_text(b, link)?;
                let url = b.property(link, "href")?.unwrap_or_default();
                self.applications.push(Application { name, url });
            }
        }
        debug!("Applications: {:?}", self.applications);
        Ok(())
    }

    pub fn applications(&self) -> &[Application] {
        &self.applications
    }

    pub fn application(&self, name: &str) -> Result<&Application> {
        if !self.logged_in {
            return Err(CbocError::NotLoggedIn(PORTAL));
        }
        self.applications
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| CbocError::ApplicationNotFound(name.to_string()))
    }

    /// Open the Finance Reporting application on the authenticated page.
    pub fn fsf(self) -> Result<Fsf<'b, B>> {
        let url = self.application(FSF_APPLICATION)?.url.clone();
        self.browser.goto(&url)?;
        Fsf::open(self.browser)
    }
}
