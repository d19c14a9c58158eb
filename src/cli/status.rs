use comfy_table::{Cell, Table};

use crate::db::{get_connection, init_db, table_counts};
use crate::error::Result;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = settings.database_path();

    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());
    println!("District:   {}", settings.district);
    println!("Divisions:  {}", settings.divisions.join(", "));

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `cboc init` to set up.");
        return Ok(());
    }

    let conn = get_connection(&db_path)?;
    init_db(&conn)?;
    let mut table = Table::new();
    table.set_header(vec!["Table", "Rows"]);
    for (name, count) in table_counts(&conn)? {
        table.add_row(vec![Cell::new(name), Cell::new(count)]);
    }
    println!();
    println!("{table}");
    Ok(())
}
