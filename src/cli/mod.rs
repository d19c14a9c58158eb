pub mod dsc_login;
pub mod fetch;
pub mod init;
pub mod load;
pub mod render;
pub mod status;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand};
use clap_complete::Shell;

use crate::browser::BrowserOptions;
use crate::config::{CredentialInput, Credentials, TargetPeriod};
use crate::error::{CbocError, Result};
use crate::settings::{shellexpand_path, Settings};

#[derive(Parser)]
#[command(
    name = "cboc",
    version,
    about = "Fetch, load and report the monthly budget numbers of a school district."
)]
pub struct Cli {
    /// Log debug output (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save settings and create the data directory and database.
    Init {
        /// Path for downloaded reports and the database (default: ~/Documents/cboc)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// School district name, as the Data Service Center lists it
        #[arg(long)]
        district: Option<String>,
        /// Division code to fetch; repeat for several
        #[arg(long = "division")]
        divisions: Vec<String>,
    },
    /// Download the month's reports from the state portals.
    Fetch {
        #[command(flatten)]
        credentials: CredentialArgs,
        #[command(flatten)]
        period: PeriodArgs,
        #[command(flatten)]
        browser: BrowserArgs,
        /// Directory to save reports in (default: the data directory)
        #[arg(long = "base-dir")]
        base_dir: Option<String>,
        /// Division code to fetch; repeat for several (default: from settings)
        #[arg(long = "division")]
        divisions: Vec<String>,
        /// Also download the FSF detailed activity list for the month
        #[arg(long = "detailed-activity")]
        detailed_activity: bool,
        /// Keep the browser open this many seconds after the run
        #[arg(long, value_name = "SECS")]
        linger: Option<u64>,
    },
    /// Log in to the Data Service Center and list its applications.
    DscLogin {
        #[command(flatten)]
        credentials: CredentialArgs,
        #[command(flatten)]
        browser: BrowserArgs,
    },
    /// Load downloaded CSV reports into the database.
    Load {
        /// Directory holding the downloaded reports (default: the data directory)
        #[arg(long = "base-dir")]
        base_dir: Option<String>,
        /// Database file (default: <data dir>/cboc.db)
        #[arg(long)]
        database: Option<String>,
        /// Clear each table before loading its files
        #[arg(long)]
        replace: bool,
    },
    /// Render the HTML budget report from the database.
    Render {
        /// Database file (default: <data dir>/cboc.db)
        #[arg(long)]
        database: Option<String>,
        /// Directory to write report.html into (default: the data directory)
        #[arg(long = "output-dir")]
        output_dir: Option<String>,
    },
    /// Show settings and table row counts.
    Status,
    /// Print shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct CredentialArgs {
    /// School district name (default: from settings)
    #[arg(long, env = "CBOC_DISTRICT")]
    pub district: Option<String>,
    /// Delaware.gov username (an email address)
    #[arg(long = "delaware-username", env = "CBOC_DELAWARE_USERNAME")]
    pub delaware_username: Option<String>,
    #[arg(long = "delaware-password", env = "CBOC_DELAWARE_PASSWORD", hide_env_values = true)]
    pub delaware_password: Option<String>,
    /// Data Service Center username (default: the Delaware.gov username without its domain)
    #[arg(long = "dsc-username", env = "CBOC_DSC_USERNAME")]
    pub dsc_username: Option<String>,
    /// Data Service Center password (default: the Delaware.gov password)
    #[arg(long = "dsc-password", env = "CBOC_DSC_PASSWORD", hide_env_values = true)]
    pub dsc_password: Option<String>,
    /// ERP username
    #[arg(long = "erp-username", env = "CBOC_ERP_USERNAME")]
    pub erp_username: Option<String>,
    #[arg(long = "erp-password", env = "CBOC_ERP_PASSWORD", hide_env_values = true)]
    pub erp_password: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PeriodArgs {
    /// Target year (default: the previous month's)
    #[arg(long)]
    pub year: Option<i32>,
    /// Target month, 1-12 (default: the previous month)
    #[arg(long)]
    pub month: Option<u32>,
}

#[derive(Args, Debug, Clone)]
pub struct BrowserArgs {
    /// Run the browser without a window
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    pub headless: bool,
    /// Open the developer tools
    #[arg(long = "dev-tools")]
    pub dev_tools: bool,
    /// Delay before every browser action, in milliseconds
    #[arg(long = "slow-motion", default_value_t = 0, value_name = "MS")]
    pub slow_motion: u64,
    /// Give up on a download after this many seconds
    #[arg(long = "download-timeout", default_value_t = 300, value_name = "SECS")]
    pub download_timeout: u64,
}

impl BrowserArgs {
    pub fn options(&self, download_dir: PathBuf) -> BrowserOptions {
        BrowserOptions {
            headless: self.headless,
            dev_tools: self.dev_tools,
            slow_motion: Duration::from_millis(self.slow_motion),
            download_dir,
            download_timeout: Duration::from_secs(self.download_timeout),
        }
    }
}

impl PeriodArgs {
    pub fn resolve(&self) -> Result<TargetPeriod> {
        TargetPeriod::resolve(self.year, self.month, chrono::Local::now().date_naive())
    }
}

fn prompt_password(portal: &str, username: &str) -> Result<String> {
    Ok(rpassword::prompt_password(format!(
        "{portal} password for {username}: "
    ))?)
}

impl CredentialArgs {
    /// Merge flags with settings, prompting for a missing password when a
    /// username is known and stdin is a terminal.
    pub fn resolve(self, settings: &Settings) -> Result<Credentials> {
        let mut input = CredentialInput {
            district: self.district.unwrap_or_else(|| settings.district.clone()),
            delaware_username: self
                .delaware_username
                .or_else(|| settings.delaware_username.clone()),
            delaware_password: self.delaware_password,
            dsc_username: self.dsc_username.or_else(|| settings.dsc_username.clone()),
            dsc_password: self.dsc_password,
            erp_username: self.erp_username.or_else(|| settings.erp_username.clone()),
            erp_password: self.erp_password,
        };

        if std::io::stdin().is_terminal() {
            if input.delaware_password.is_none() {
                if let Some(user) = &input.delaware_username {
                    input.delaware_password = Some(prompt_password("Delaware.gov", user)?);
                }
            }
            // A DSC password falls back to the Delaware.gov one.
            if input.dsc_password.is_none() && input.delaware_password.is_none() {
                if let Some(user) = &input.dsc_username {
                    input.dsc_password = Some(prompt_password("DSC", user)?);
                }
            }
            if input.erp_password.is_none() {
                if let Some(user) = &input.erp_username {
                    input.erp_password = Some(prompt_password("ERP", user)?);
                }
            }
        }

        Credentials::resolve(input)
    }
}

/// `~` expansion for a directory flag, falling back to the settings data directory.
pub(crate) fn dir_or_data_dir(flag: Option<String>, settings: &Settings) -> PathBuf {
    match flag {
        Some(path) => PathBuf::from(shellexpand_path(&path)),
        None => settings.data_path(),
    }
}

pub(crate) fn database_or_default(flag: Option<String>, settings: &Settings) -> PathBuf {
    match flag {
        Some(path) => PathBuf::from(shellexpand_path(&path)),
        None => settings.database_path(),
    }
}

/// Launch Chrome, run `f` against it, then close it. With `linger`, the
/// window stays up that many seconds first, whether or not `f` failed.
#[cfg(feature = "browser")]
pub(crate) fn with_browser<T>(
    options: BrowserOptions,
    linger: Option<u64>,
    f: impl FnOnce(&mut crate::browser::chrome::ChromeBrowser) -> Result<T>,
) -> Result<T> {
    let mut chrome = crate::browser::chrome::ChromeBrowser::launch(options)?;
    let result = f(&mut chrome);
    if let Some(secs) = linger {
        tracing::info!("Keeping the browser open for {secs}s");
        std::thread::sleep(Duration::from_secs(secs));
    }
    if let Err(e) = chrome.close() {
        tracing::warn!("Could not close the browser: {e}");
    }
    result
}

#[cfg(not(feature = "browser"))]
pub(crate) fn browser_unavailable() -> CbocError {
    CbocError::Config("this build has no browser support; rebuild with --features browser".to_string())
}

pub(crate) fn divisions_or_default(flags: Vec<String>, settings: &Settings) -> Result<Vec<String>> {
    let divisions = if flags.is_empty() {
        settings.divisions.clone()
    } else {
        flags
    };
    if divisions.is_empty() {
        return Err(CbocError::Config("no divisions to fetch".to_string()));
    }
    Ok(divisions)
}
