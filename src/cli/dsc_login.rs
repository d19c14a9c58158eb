use comfy_table::{Cell, Table};

use crate::browser::BrowserOptions;
use crate::cli::{BrowserArgs, CredentialArgs};
use crate::config::PortalLogin;
use crate::error::{CbocError, Result};
use crate::portals::dsc::Application;
use crate::settings::load_settings;

pub fn run(credentials: CredentialArgs, browser: BrowserArgs) -> Result<()> {
    let settings = load_settings();
    let creds = credentials.resolve(&settings)?;
    let login = creds.dsc.ok_or_else(|| {
        CbocError::Config("no DSC credentials; pass --dsc-username or --delaware-username".to_string())
    })?;

    let options = browser.options(settings.data_path().join(".downloads"));
    let applications = drive(options, &creds.district, &login)?;

    let mut table = Table::new();
    table.set_header(vec!["Application", "URL"]);
    for app in applications {
        table.add_row(vec![Cell::new(app.name), Cell::new(app.url)]);
    }
    println!("Logged in to the Data Service Center as {}", login.username);
    println!("{table}");
    Ok(())
}

#[cfg(feature = "browser")]
fn drive(options: BrowserOptions, district: &str, login: &PortalLogin) -> Result<Vec<Application>> {
    crate::cli::with_browser(options, None, |browser| {
        let mut dsc = crate::portals::dsc::DataServiceCenter::new(browser);
        dsc.login(district, &login.username, &login.password)?;
        Ok(dsc.applications().to_vec())
    })
}

#[cfg(not(feature = "browser"))]
fn drive(_options: BrowserOptions, _district: &str, _login: &PortalLogin) -> Result<Vec<Application>> {
    Err(crate::cli::browser_unavailable())
}
