use std::time::Duration;

use tracing::{debug, info};

use super::forms::ensure_checked;
use crate::browser::{same_url, trimmed_text, Browser, STABLE_WAIT};
use crate::error::{CbocError, Result};
use crate::mobius::{DomArchiveView, Mobius};

pub const LOGIN_URL: &str = "https://portal.erp.state.de.us";
pub const MOBIUS_LINK: &str = "Mobius View";
pub const MOBIUS_PAGE: &str = "viewerpreports.dti";
const PORTAL: &str = "ERP";

pub struct Erp<'b, B: Browser> {
    browser: &'b mut B,
    logged_in: bool,
}

impl<'b, B: Browser> Erp<'b, B> {
    pub fn new(browser: &'b mut B) -> Self {
        Self {
            browser,
            logged_in: false,
        }
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<()> {
        info!("Logging in to the ERP portal...");
        let b = &mut *self.browser;
        b.open_page(LOGIN_URL)?;
        // The sign-in form is injected after load and never looks stable.
        b.pause(Duration::from_secs(2));

        let form = b.find(r#"form[name="login"]"#)?;
        let username_input = b.find_in(form, r#"input[name="userid"]"#)?;
        b.type_text(username_input, username)?;
        let password_input = b.find_in(form, r#"input[type="password"]"#)?;
        b.type_text(password_input, password)?;
        let agree = b.find_in(form, r#"input[name="agree"]"#)?;
        ensure_checked(b, agree, true)?;
        let submit = b.find_in(form, r#"input[type="submit"]"#)?;
        b.click(submit)?;
        b.wait_stable(STABLE_WAIT)?;

        if same_url(&b.current_url()?, LOGIN_URL) {
            return Err(CbocError::LoginFailed { portal: PORTAL });
        }
        self.logged_in = true;
        Ok(())
    }

    /// Open the Mobius viewer, which the portal launches in its own tab.
    pub fn mobius(self) -> Result<Mobius<DomArchiveView<'b, B>>> {
        if !self.logged_in {
            return Err(CbocError::NotLoggedIn(PORTAL));
        }
        let b = self.browser;

        let mut link = None;
        for el in b.find_all(".ps_groupleth")? {
            if trimmed_text(b, el)? == MOBIUS_LINK {
                link = Some(el);
                break;
            }
        }
        let link = link.ok_or_else(|| CbocError::ElementNotFound(MOBIUS_LINK.to_string()))?;
        b.click(link)?;
        b.pause(Duration::from_secs(2));

        b.switch_to_page(MOBIUS_PAGE)?;
        debug!("Mobius page: {}", b.current_url()?);
        let proceed = b.find("button#continue")?;
        b.click(proceed)?;
        b.wait_stable(STABLE_WAIT)?;

        Ok(Mobius::new(DomArchiveView::new(b)))
    }
}
