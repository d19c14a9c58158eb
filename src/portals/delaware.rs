use tracing::info;

use super::erp::Erp;
use crate::browser::{same_url, Browser, STABLE_WAIT};
use crate::error::{CbocError, Result};

pub const LOGIN_URL: &str = "https://id.delaware.gov";
const PORTAL: &str = "Delaware.gov";

pub struct DelawareGov<'b, B: Browser> {
    browser: &'b mut B,
    logged_in: bool,
}

impl<'b, B: Browser> DelawareGov<'b, B> {
    pub fn new(browser: &'b mut B) -> Self {
        Self {
            browser,
            logged_in: false,
        }
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<()> {
        info!("Logging in to Delaware.gov...");
        let b = &mut *self.browser;
        b.open_page(LOGIN_URL)?;
        b.wait_stable(STABLE_WAIT)?;

        let form = b.find("form")?;
        let username_input = b.find_in(form, r#"input[autocomplete="username"]"#)?;
        b.type_text(username_input, username)?;
        let password_input = b.find_in(form, r#"input[type="password"]"#)?;
        b.type_text(password_input, password)?;
        let submit = b.find_in(form, r#"input[type="submit"]"#)?;
        b.click(submit)?;
        b.wait_stable(STABLE_WAIT)?;

        if same_url(&b.current_url()?, LOGIN_URL) {
            return Err(CbocError::LoginFailed { portal: PORTAL });
        }
        self.logged_in = true;
        Ok(())
    }

    /// Hand the signed-in session over to the ERP portal.
    pub fn erp(self) -> Result<Erp<'b, B>> {
        if !self.logged_in {
            return Err(CbocError::NotLoggedIn(PORTAL));
        }
        Ok(Erp::new(self.browser))
    }
}
