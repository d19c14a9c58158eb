use colored::Colorize;

use crate::cli::{database_or_default, dir_or_data_dir};
use crate::db::{get_connection, init_db};
use crate::error::{CbocError, Result};
use crate::render::write_report;
use crate::settings::load_settings;

pub fn run(database: Option<String>, output_dir: Option<String>) -> Result<()> {
    let settings = load_settings();
    let db_path = database_or_default(database, &settings);
    if !db_path.exists() {
        return Err(CbocError::Config(format!(
            "no database at {}; run `cboc load` first",
            db_path.display()
        )));
    }
    let conn = get_connection(&db_path)?;
    init_db(&conn)?;

    let output_dir = dir_or_data_dir(output_dir, &settings);
    let path = write_report(&conn, &output_dir, chrono::Local::now().date_naive())?;
    println!("{} {}", "Report written to".green(), path.display());
    Ok(())
}
