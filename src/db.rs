use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

/// Connection settings applied to every database, whatever the caller asks for.
const PRAGMAS: &str = "PRAGMA foreign_keys=ON; PRAGMA encoding='UTF-8'; PRAGMA journal_mode=MEMORY;";

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS fsf_operating_unit_expenditure_summaries (
    id INTEGER PRIMARY KEY,
    district TEXT NOT NULL,
    division TEXT NOT NULL,
    record_type TEXT,
    sub_type TEXT,
    operating_unit TEXT NOT NULL,
    operating_unit_description TEXT,
    budget_amount REAL NOT NULL DEFAULT 0,
    encumbered_amount REAL NOT NULL DEFAULT 0,
    expended_amount REAL NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS fsf_operating_unit_program_summaries (
    id INTEGER PRIMARY KEY,
    district TEXT NOT NULL,
    division TEXT NOT NULL,
    record_type TEXT,
    operating_unit TEXT NOT NULL,
    operating_unit_description TEXT,
    program_code TEXT NOT NULL,
    program_code_description TEXT,
    budget_amount REAL NOT NULL DEFAULT 0,
    encumbered_amount REAL NOT NULL DEFAULT 0,
    expended_amount REAL NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS mobius_dgl060 (
    id INTEGER PRIMARY KEY,
    division TEXT NOT NULL,
    as_of_date TEXT,
    department_id TEXT,
    department_description TEXT,
    fiscal_year INTEGER,
    fund TEXT,
    appropriation TEXT,
    appropriation_type TEXT,
    appropriation_description TEXT,
    end_date TEXT,
    available_amount REAL NOT NULL DEFAULT 0,
    encumbered_amount REAL NOT NULL DEFAULT 0,
    current_year_expenses REAL NOT NULL DEFAULT 0,
    prior_year_expenses REAL NOT NULL DEFAULT 0,
    remaining_spend_authorized REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS mobius_dgl114 (
    id INTEGER PRIMARY KEY,
    division TEXT NOT NULL,
    as_of_date TEXT,
    department_id TEXT,
    department_description TEXT,
    budget_year INTEGER,
    fund TEXT,
    appropriation TEXT,
    appropriation_type TEXT,
    revenue_account TEXT,
    revenue_account_description TEXT,
    local_funds_current REAL NOT NULL DEFAULT 0,
    local_funds_year_to_date REAL NOT NULL DEFAULT 0,
    state_funds_current REAL NOT NULL DEFAULT 0,
    state_funds_year_to_date REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS mobius_dgl115 (
    id INTEGER PRIMARY KEY,
    division TEXT NOT NULL,
    department_id TEXT,
    department_description TEXT,
    fiscal_year INTEGER,
    account_period INTEGER,
    account TEXT,
    account_description TEXT,
    local_funds_month_to_date REAL NOT NULL DEFAULT 0,
    state_funds_month_to_date REAL NOT NULL DEFAULT 0,
    total_funds_month_to_date REAL NOT NULL DEFAULT 0,
    local_funds_year_to_date REAL NOT NULL DEFAULT 0,
    state_funds_year_to_date REAL NOT NULL DEFAULT 0,
    total_funds_year_to_date REAL NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_expenditure_division
    ON fsf_operating_unit_expenditure_summaries(division);
CREATE INDEX IF NOT EXISTS idx_program_division
    ON fsf_operating_unit_program_summaries(division, operating_unit, program_code);
CREATE INDEX IF NOT EXISTS idx_dgl115_division ON mobius_dgl115(division);
";

pub const TABLES: [&str; 5] = [
    "fsf_operating_unit_expenditure_summaries",
    "fsf_operating_unit_program_summaries",
    "mobius_dgl060",
    "mobius_dgl114",
    "mobius_dgl115",
];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch(PRAGMAS)?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Row count of every table, in schema order.
pub fn table_counts(conn: &Connection) -> Result<Vec<(&'static str, i64)>> {
    let mut counts = Vec::with_capacity(TABLES.len());
    for table in TABLES {
        let n: i64 = conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |r| r.get(0))?;
        counts.push((table, n));
    }
    Ok(counts)
}
