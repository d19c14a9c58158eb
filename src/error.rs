use thiserror::Error;

#[derive(Error, Debug)]
pub enum CbocError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Could not log in to {portal}")]
    LoginFailed { portal: &'static str },

    #[error("Not logged in to {0}")]
    NotLoggedIn(&'static str),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Element is not clickable: {0}")]
    NotClickable(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Application not found: {0}")]
    ApplicationNotFound(String),

    #[error("Could not find a breadcrumb for the path: {0}")]
    ReportPathNotFound(String),

    #[error("Could not find a dated snapshot for {year}-{month:02}")]
    DateFileNotFound { year: i32, month: u32 },

    #[error("Format not found: {0}")]
    FormatNotFound(String),

    #[error("Timed out waiting for a download")]
    DownloadTimeout,

    #[error("{file}: missing column {column:?}")]
    MissingColumn { file: String, column: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Settings error: {0}")]
    Settings(String),
}

#[cfg(feature = "browser")]
impl From<chromiumoxide::error::CdpError> for CbocError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        CbocError::Browser(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CbocError>;
