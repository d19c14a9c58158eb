use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::{database_or_default, dir_or_data_dir};
use crate::db::{get_connection, init_db};
use crate::error::{CbocError, Result};
use crate::loader::load_directory;
use crate::settings::load_settings;

pub fn run(base_dir: Option<String>, database: Option<String>, replace: bool) -> Result<()> {
    let settings = load_settings();
    let dir = dir_or_data_dir(base_dir, &settings);
    if !dir.is_dir() {
        return Err(CbocError::Config(format!(
            "report directory {} does not exist",
            dir.display()
        )));
    }
    let db_path = database_or_default(database, &settings);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = get_connection(&db_path)?;
    init_db(&conn)?;
    let summary = load_directory(&conn, &dir, replace)?;

    let mut table = Table::new();
    table.set_header(vec!["Table", "Files", "Inserted", "Skipped"]);
    for t in &summary.tables {
        table.add_row(vec![
            Cell::new(t.table),
            Cell::new(t.files),
            Cell::new(t.inserted),
            Cell::new(t.skipped),
        ]);
    }
    println!("{table}");

    let line = format!(
        "Loaded {} rows into {}",
        summary.inserted(),
        db_path.display()
    );
    println!("{}", line.green());
    if summary.skipped() > 0 {
        println!(
            "{}",
            format!("{} rows skipped; see the warnings above", summary.skipped()).yellow()
        );
    }
    Ok(())
}
