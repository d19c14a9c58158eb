use colored::Colorize;
use tracing::info;

use crate::browser::BrowserOptions;
use crate::cli::{divisions_or_default, dir_or_data_dir, BrowserArgs, CredentialArgs, PeriodArgs};
use crate::config::Credentials;
use crate::error::{CbocError, Result};
use crate::fetch::{FetchPlan, FetchSummary};
use crate::settings::load_settings;

pub struct FetchArgs {
    pub credentials: CredentialArgs,
    pub period: PeriodArgs,
    pub browser: BrowserArgs,
    pub base_dir: Option<String>,
    pub divisions: Vec<String>,
    pub detailed_activity: bool,
    pub linger: Option<u64>,
}

pub fn run(args: FetchArgs) -> Result<()> {
    let settings = load_settings();
    let creds = args.credentials.resolve(&settings)?;
    if creds.dsc.is_none() && creds.delaware.is_none() {
        return Err(CbocError::Config(
            "no portal credentials; pass --delaware-username or --dsc-username".to_string(),
        ));
    }
    let plan = FetchPlan {
        base_dir: dir_or_data_dir(args.base_dir, &settings),
        period: args.period.resolve()?,
        divisions: divisions_or_default(args.divisions, &settings)?,
        detailed_activity: args.detailed_activity,
    };
    info!("Fetching reports for {} into {}", plan.period, plan.base_dir.display());

    let options = args.browser.options(plan.base_dir.join(".downloads"));
    let summary = drive(options, args.linger, &creds, &plan)?;

    for name in &summary.skipped {
        println!("{} {name}", "exists ".dimmed());
    }
    for name in &summary.written {
        println!("{} {name}", "fetched".green());
    }
    println!(
        "{} file(s) fetched, {} already present",
        summary.written.len(),
        summary.skipped.len()
    );
    Ok(())
}

#[cfg(feature = "browser")]
fn drive(
    options: BrowserOptions,
    linger: Option<u64>,
    creds: &Credentials,
    plan: &FetchPlan,
) -> Result<FetchSummary> {
    crate::cli::with_browser(options, linger, |browser| {
        crate::fetch::run(browser, creds, plan)
    })
}

#[cfg(not(feature = "browser"))]
fn drive(
    _options: BrowserOptions,
    _linger: Option<u64>,
    _creds: &Credentials,
    _plan: &FetchPlan,
) -> Result<FetchSummary> {
    Err(crate::cli::browser_unavailable())
}
