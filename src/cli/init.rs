use std::path::PathBuf;

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::settings::{load_settings, save_settings, shellexpand_path};

pub fn run(data_dir: Option<String>, district: Option<String>, divisions: Vec<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    if let Some(district) = district {
        settings.district = district;
    }
    if !divisions.is_empty() {
        settings.divisions = divisions;
    }

    let data_dir = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&data_dir)?;
    let conn = get_connection(&settings.database_path())?;
    init_db(&conn)?;
    save_settings(&settings)?;

    println!("Data directory: {}", data_dir.display());
    println!("Database:       {}", settings.database_path().display());
    println!("District:       {}", settings.district);
    println!("Divisions:      {}", settings.divisions.join(", "));
    Ok(())
}
