use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime};
use zeroize::Zeroizing;

use crate::error::{CbocError, Result};

/// A username/password pair for one portal.
#[derive(Clone)]
pub struct PortalLogin {
    pub username: String,
    pub password: Zeroizing<String>,
}

impl std::fmt::Debug for PortalLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalLogin")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Raw credential inputs, as collected from flags, environment and settings.
#[derive(Debug, Default, Clone)]
pub struct CredentialInput {
    pub district: String,
    pub delaware_username: Option<String>,
    pub delaware_password: Option<String>,
    pub dsc_username: Option<String>,
    pub dsc_password: Option<String>,
    pub erp_username: Option<String>,
    pub erp_password: Option<String>,
}

/// Fully resolved credentials. A portal is `None` when it should be skipped.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub district: String,
    pub dsc: Option<PortalLogin>,
    pub delaware: Option<PortalLogin>,
    pub erp: Option<PortalLogin>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// The DSC account name is the Delaware account name without its domain.
pub fn strip_domain(username: &str) -> &str {
    match username.find('@') {
        Some(i) if i > 0 => &username[..i],
        _ => username,
    }
}

fn pair(
    portal: &str,
    username: Option<String>,
    password: Option<String>,
) -> Result<Option<PortalLogin>> {
    match (username, password) {
        (Some(username), Some(password)) => Ok(Some(PortalLogin {
            username,
            password: Zeroizing::new(password),
        })),
        (Some(_), None) => Err(CbocError::Config(format!(
            "a {portal} password is required when a {portal} username is given"
        ))),
        (None, Some(_)) => Err(CbocError::Config(format!(
            "a {portal} username is required when a {portal} password is given"
        ))),
        (None, None) => Ok(None),
    }
}

impl Credentials {
    pub fn resolve(input: CredentialInput) -> Result<Self> {
        let district = input.district.trim().to_string();
        let delaware_username = non_empty(input.delaware_username);
        let delaware_password = non_empty(input.delaware_password);

        let dsc_username = non_empty(input.dsc_username).or_else(|| {
            delaware_username
                .as_deref()
                .map(|u| strip_domain(u).to_string())
        });
        let dsc_password = non_empty(input.dsc_password).or_else(|| delaware_password.clone());

        let delaware = pair("Delaware.gov", delaware_username, delaware_password)?;
        let dsc = pair("DSC", dsc_username, dsc_password)?;
        let erp = pair(
            "ERP",
            non_empty(input.erp_username),
            non_empty(input.erp_password),
        )?;

        if dsc.is_some() && district.is_empty() {
            return Err(CbocError::Config(
                "a district is required to log in to the Data Service Center".to_string(),
            ));
        }
        if erp.is_some() && delaware.is_none() {
            return Err(CbocError::Config(
                "ERP credentials need Delaware.gov credentials; the ERP portal is reached through it"
                    .to_string(),
            ));
        }

        Ok(Self {
            district,
            dsc,
            delaware,
            erp,
        })
    }
}

/// The fiscal month a run targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetPeriod {
    pub year: i32,
    pub month: u32,
}

impl TargetPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(CbocError::Config(format!("month must be 1-12, got {month}")));
        }
        Ok(Self { year, month })
    }

    /// Fill in whichever of year/month is missing from the month before `today`.
    pub fn resolve(year: Option<i32>, month: Option<u32>, today: NaiveDate) -> Result<Self> {
        let previous = today
            .with_day(1)
            .and_then(|d| d.checked_sub_months(Months::new(1)))
            .ok_or_else(|| CbocError::Config(format!("no month precedes {today}")))?;
        Self::new(
            year.unwrap_or(previous.year()),
            month.unwrap_or(previous.month()),
        )
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    pub fn last_day(&self) -> NaiveDate {
        self.first_day()
            .checked_add_months(Months::new(1))
            .and_then(|d| d.pred_opt())
            .unwrap_or_default()
    }

    /// The final second of the month; anything strictly later is "after the month".
    pub fn end_instant(&self) -> NaiveDateTime {
        self.last_day()
            .and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// English month name as shown in the portal's month selector.
    pub fn month_name(&self) -> &'static str {
        const NAMES: [&str; 12] = [
            "January", "February", "March", "April", "May", "June", "July", "August",
            "September", "October", "November", "December",
        ];
        NAMES[(self.month as usize).saturating_sub(1) % 12]
    }
}

impl std::fmt::Display for TargetPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
