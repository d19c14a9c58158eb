use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{CbocError, Result};
use crate::models::{Dgl060Row, Dgl114Row, Dgl115Row, ExpenditureSummaryRow, ProgramSummaryRow};

/// Rows per INSERT statement.
pub const BATCH_SIZE: usize = 100;

// ---------------------------------------------------------------------------
// Cell helpers
// ---------------------------------------------------------------------------

/// Undo spreadsheet export artifacts: `="0033"` becomes `0033` and `(12.50)` becomes `-12.50`.
pub fn unwrap_formula(raw: &str) -> String {
    let mut s = raw.trim();
    while let Some(rest) = s.strip_prefix('=') {
        s = rest
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(rest)
            .trim();
    }
    match s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        Some(inner) => format!("-{}", inner.trim()),
        None => s.to_string(),
    }
}

/// Parse an amount with thousands separators. Empty cells are zero; anything
/// else unparseable, or not finite, is `None`.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = raw.trim().replace(',', "");
    if s.is_empty() {
        return Some(0.0);
    }
    let value = match s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        Some(inner) => inner.trim().parse::<f64>().ok().map(|v| -v),
        None => s.parse::<f64>().ok(),
    };
    value.filter(|v| v.is_finite())
}

/// Two-digit years are in the 2000s.
pub fn parse_fiscal_year(raw: &str) -> Option<i32> {
    let year: i32 = raw.trim().parse().ok()?;
    Some(if year < 100 { year + 2000 } else { year })
}

/// Parse a date in `format` and return it as ISO `YYYY-MM-DD`.
pub fn parse_date(raw: &str, format: &str) -> Option<String> {
    NaiveDate::parse_from_str(raw.trim(), format)
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}

#[derive(Debug)]
struct CellError {
    column: &'static str,
    value: String,
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error parsing {}: {:?}", self.column, self.value)
    }
}

type CellResult<T> = std::result::Result<T, CellError>;

/// Lower-cased, trimmed header name to column index.
struct HeaderMap(HashMap<String, usize>);

impl HeaderMap {
    fn new<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        let map = headers
            .into_iter()
            .enumerate()
            .map(|(i, h)| (h.trim_start_matches('\u{feff}').trim().to_lowercase(), i))
            .collect();
        Self(map)
    }

    fn require(&self, file: &Path, columns: &[&str]) -> Result<()> {
        match columns.iter().find(|c| !self.0.contains_key(**c)) {
            Some(missing) => Err(CbocError::MissingColumn {
                file: file.display().to_string(),
                column: missing.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// One data row, already unwrapped, addressed by header name.
struct Cells<'a> {
    headers: &'a HeaderMap,
    values: Vec<String>,
}

impl Cells<'_> {
    /// Short rows read missing cells as empty.
    fn text(&self, column: &'static str) -> String {
        self.headers
            .0
            .get(column)
            .and_then(|i| self.values.get(*i))
            .cloned()
            .unwrap_or_default()
    }

    fn fail(&self, column: &'static str) -> CellError {
        CellError {
            column,
            value: self.text(column),
        }
    }

    fn amount(&self, column: &'static str) -> CellResult<f64> {
        parse_amount(&self.text(column)).ok_or_else(|| self.fail(column))
    }

    fn year(&self, column: &'static str) -> CellResult<i32> {
        parse_fiscal_year(&self.text(column)).ok_or_else(|| self.fail(column))
    }

    fn integer(&self, column: &'static str) -> CellResult<i32> {
        self.text(column).parse().map_err(|_| self.fail(column))
    }

    fn date(&self, column: &'static str, format: &str) -> CellResult<String> {
        parse_date(&self.text(column), format).ok_or_else(|| self.fail(column))
    }
}

/// Parse every data row of a CSV file. Returns the rows and the number skipped.
fn read_rows<R>(
    path: &Path,
    required: &[&str],
    parse: impl Fn(&Cells) -> CellResult<R>,
) -> Result<(Vec<R>, usize)> {
    let file = std::fs::File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));
    // Exports are not always UTF-8; stray bytes decode as U+FFFD.
    let mut records = rdr.byte_records();
    let decode = |record: &csv::ByteRecord| -> Vec<String> {
        record
            .iter()
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect()
    };

    let Some(header) = records.next() else {
        warn!("No rows found in {}", path.display());
        return Ok((Vec::new(), 0));
    };
    let header = decode(&header?);
    let headers = HeaderMap::new(header.iter().map(String::as_str));
    headers.require(path, required)?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for (i, record) in records.enumerate() {
        let values = decode(&record?);
        if values.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let cells = Cells {
            headers: &headers,
            values: values.iter().map(|v| unwrap_formula(v)).collect(),
        };
        match parse(&cells) {
            Ok(row) => rows.push(row),
            Err(e) => {
                warn!("{}: row {}: {e}", path.display(), i + 1);
                skipped += 1;
            }
        }
    }
    debug!("{}: {} rows, {} skipped", path.display(), rows.len(), skipped);
    Ok((rows, skipped))
}

// ---------------------------------------------------------------------------
// Table records
// ---------------------------------------------------------------------------

trait Record {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];
    fn values(&self) -> Vec<Value>;
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

impl Record for ExpenditureSummaryRow {
    const TABLE: &'static str = "fsf_operating_unit_expenditure_summaries";
    const COLUMNS: &'static [&'static str] = &[
        "district", "division", "record_type", "sub_type", "operating_unit",
        "operating_unit_description", "budget_amount", "encumbered_amount", "expended_amount",
    ];
    fn values(&self) -> Vec<Value> {
        vec![
            text(&self.district),
            text(&self.division),
            text(&self.record_type),
            text(&self.sub_type),
            text(&self.operating_unit),
            text(&self.operating_unit_description),
            Value::Real(self.budget_amount),
            Value::Real(self.encumbered_amount),
            Value::Real(self.expended_amount),
        ]
    }
}

impl Record for ProgramSummaryRow {
    const TABLE: &'static str = "fsf_operating_unit_program_summaries";
    const COLUMNS: &'static [&'static str] = &[
        "district", "division", "record_type", "operating_unit", "operating_unit_description",
        "program_code", "program_code_description", "budget_amount", "encumbered_amount",
        "expended_amount",
    ];
    fn values(&self) -> Vec<Value> {
        vec![
            text(&self.district),
            text(&self.division),
            text(&self.record_type),
            text(&self.operating_unit),
            text(&self.operating_unit_description),
            text(&self.program_code),
            text(&self.program_code_description),
            Value::Real(self.budget_amount),
            Value::Real(self.encumbered_amount),
            Value::Real(self.expended_amount),
        ]
    }
}

impl Record for Dgl060Row {
    const TABLE: &'static str = "mobius_dgl060";
    const COLUMNS: &'static [&'static str] = &[
        "division", "as_of_date", "department_id", "department_description", "fiscal_year",
        "fund", "appropriation", "appropriation_type", "appropriation_description", "end_date",
        "available_amount", "encumbered_amount", "current_year_expenses", "prior_year_expenses",
        "remaining_spend_authorized",
    ];
    fn values(&self) -> Vec<Value> {
        vec![
            text(&self.division),
            text(&self.as_of_date),
            text(&self.department_id),
            text(&self.department_description),
            Value::Integer(self.fiscal_year.into()),
            text(&self.fund),
            text(&self.appropriation),
            text(&self.appropriation_type),
            text(&self.appropriation_description),
            text(&self.end_date),
            Value::Real(self.available_amount),
            Value::Real(self.encumbered_amount),
            Value::Real(self.current_year_expenses),
            Value::Real(self.prior_year_expenses),
            Value::Real(self.remaining_spend_authorized),
        ]
    }
}

impl Record for Dgl114Row {
    const TABLE: &'static str = "mobius_dgl114";
    const COLUMNS: &'static [&'static str] = &[
        "division", "as_of_date", "department_id", "department_description", "budget_year",
        "fund", "appropriation", "appropriation_type", "revenue_account",
        "revenue_account_description", "local_funds_current", "local_funds_year_to_date",
        "state_funds_current", "state_funds_year_to_date",
    ];
    fn values(&self) -> Vec<Value> {
        vec![
            text(&self.division),
            text(&self.as_of_date),
            text(&self.department_id),
            text(&self.department_description),
            Value::Integer(self.budget_year.into()),
            text(&self.fund),
            text(&self.appropriation),
            text(&self.appropriation_type),
            text(&self.revenue_account),
            text(&self.revenue_account_description),
            Value::Real(self.local_funds_current),
            Value::Real(self.local_funds_year_to_date),
            Value::Real(self.state_funds_current),
            Value::Real(self.state_funds_year_to_date),
        ]
    }
}

impl Record for Dgl115Row {
    const TABLE: &'static str = "mobius_dgl115";
    const COLUMNS: &'static [&'static str] = &[
        "division", "department_id", "department_description", "fiscal_year", "account_period",
        "account", "account_description", "local_funds_month_to_date",
        "state_funds_month_to_date", "total_funds_month_to_date", "local_funds_year_to_date",
        "state_funds_year_to_date", "total_funds_year_to_date",
    ];
    fn values(&self) -> Vec<Value> {
        vec![
            text(&self.division),
            text(&self.department_id),
            text(&self.department_description),
            Value::Integer(self.fiscal_year.into()),
            Value::Integer(self.account_period.into()),
            text(&self.account),
            text(&self.account_description),
            Value::Real(self.local_funds_month_to_date),
            Value::Real(self.state_funds_month_to_date),
            Value::Real(self.total_funds_month_to_date),
            Value::Real(self.local_funds_year_to_date),
            Value::Real(self.state_funds_year_to_date),
            Value::Real(self.total_funds_year_to_date),
        ]
    }
}

fn insert_batches<R: Record>(conn: &Connection, rows: &[R]) -> Result<usize> {
    let placeholders = format!("({})", vec!["?"; R::COLUMNS.len()].join(", "));
    for chunk in rows.chunks(BATCH_SIZE) {
        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            R::TABLE,
            R::COLUMNS.join(", "),
            vec![placeholders.as_str(); chunk.len()].join(", ")
        );
        let params: Vec<Value> = chunk.iter().flat_map(Record::values).collect();
        conn.execute(&sql, rusqlite::params_from_iter(params))?;
    }
    Ok(rows.len())
}

fn load_rows<R: Record>(
    conn: &Connection,
    path: &Path,
    required: &[&str],
    parse: impl Fn(&Cells) -> CellResult<R>,
) -> Result<FileLoad> {
    let (rows, skipped) = read_rows(path, required, parse)?;
    let inserted = insert_batches(conn, &rows)?;
    Ok(FileLoad { inserted, skipped })
}

// ---------------------------------------------------------------------------
// Report shapes
// ---------------------------------------------------------------------------

const EXPENDITURE_COLUMNS: &[&str] = &[
    "district", "div", "recordtype", "subtype", "operatingunit", "descr", "budgetamt",
    "encumberedamt", "expendedamt",
];
const PROGRAM_COLUMNS: &[&str] = &[
    "district", "div", "recordtype", "operatingunit", "operatingunitdesc", "programcode",
    "programcodedesc", "budgetamt", "encumberedamt", "expendedamt",
];
const DGL060_COLUMNS: &[&str] = &[
    "rpt_asof_date", "dept_id", "dept_desc", "fy", "fund", "appr", "type", "appr_descr",
    "end_date", "available_funds", "encumbrances", "curr_yr_expen", "prior_yr_expen",
    "remain_spend_auth",
];
const DGL114_COLUMNS: &[&str] = &[
    "rptasofdate", "deptid", "deptdesc", "budref", "fund", "apprcode", "apprtype",
    "revaccount", "revdescr", "gf_current", "gf_ytd", "sf_current", "sf_ytd",
];
const DGL115_COLUMNS: &[&str] = &[
    "deptid", "dept_descr", "fy", "acct_period", "account", "acct_descr", "gf_mtd", "sf_mtd",
    "totl_mtd", "gf_ytd", "sf_ytd", "totl_ytd",
];

fn parse_expenditure(c: &Cells) -> CellResult<ExpenditureSummaryRow> {
    Ok(ExpenditureSummaryRow {
        district: c.text("district"),
        division: c.text("div"),
        record_type: c.text("recordtype"),
        sub_type: c.text("subtype"),
        operating_unit: c.text("operatingunit"),
        operating_unit_description: c.text("descr"),
        budget_amount: c.amount("budgetamt")?,
        encumbered_amount: c.amount("encumberedamt")?,
        expended_amount: c.amount("expendedamt")?,
    })
}

fn parse_program(c: &Cells) -> CellResult<ProgramSummaryRow> {
    Ok(ProgramSummaryRow {
        district: c.text("district"),
        division: c.text("div"),
        record_type: c.text("recordtype"),
        operating_unit: c.text("operatingunit"),
        operating_unit_description: c.text("operatingunitdesc"),
        program_code: c.text("programcode"),
        program_code_description: c.text("programcodedesc"),
        budget_amount: c.amount("budgetamt")?,
        encumbered_amount: c.amount("encumberedamt")?,
        expended_amount: c.amount("expendedamt")?,
    })
}

fn parse_dgl060(c: &Cells, division: &str) -> CellResult<Dgl060Row> {
    Ok(Dgl060Row {
        division: division.to_string(),
        as_of_date: c.date("rpt_asof_date", "%m/%d/%y")?,
        department_id: c.text("dept_id"),
        department_description: c.text("dept_desc"),
        fiscal_year: c.year("fy")?,
        fund: c.text("fund"),
        appropriation: c.text("appr"),
        appropriation_type: c.text("type"),
        appropriation_description: c.text("appr_descr"),
        end_date: c.date("end_date", "%m/%d/%y")?,
        available_amount: c.amount("available_funds")?,
        encumbered_amount: c.amount("encumbrances")?,
        current_year_expenses: c.amount("curr_yr_expen")?,
        prior_year_expenses: c.amount("prior_yr_expen")?,
        remaining_spend_authorized: c.amount("remain_spend_auth")?,
    })
}

fn parse_dgl114(c: &Cells, division: &str) -> CellResult<Dgl114Row> {
    Ok(Dgl114Row {
        division: division.to_string(),
        as_of_date: c.date("rptasofdate", "%m/%d/%Y")?,
        department_id: c.text("deptid"),
        department_description: c.text("deptdesc"),
        budget_year: c.year("budref")?,
        fund: c.text("fund"),
        appropriation: c.text("apprcode"),
        appropriation_type: c.text("apprtype"),
        revenue_account: c.text("revaccount"),
        revenue_account_description: c.text("revdescr"),
        local_funds_current: c.amount("gf_current")?,
        local_funds_year_to_date: c.amount("gf_ytd")?,
        state_funds_current: c.amount("sf_current")?,
        state_funds_year_to_date: c.amount("sf_ytd")?,
    })
}

fn parse_dgl115(c: &Cells, division: &str) -> CellResult<Dgl115Row> {
    Ok(Dgl115Row {
        division: division.to_string(),
        department_id: c.text("deptid"),
        department_description: c.text("dept_descr"),
        fiscal_year: c.year("fy")?,
        account_period: c.integer("acct_period")?,
        account: c.text("account"),
        account_description: c.text("acct_descr"),
        local_funds_month_to_date: c.amount("gf_mtd")?,
        state_funds_month_to_date: c.amount("sf_mtd")?,
        total_funds_month_to_date: c.amount("totl_mtd")?,
        local_funds_year_to_date: c.amount("gf_ytd")?,
        state_funds_year_to_date: c.amount("sf_ytd")?,
        total_funds_year_to_date: c.amount("totl_ytd")?,
    })
}

// ---------------------------------------------------------------------------
// Loader kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoaderKind {
    ExpenditureSummary,
    ProgramSummary,
    Dgl060,
    Dgl114,
    Dgl115,
}

pub const ALL_LOADERS: &[LoaderKind] = &[
    LoaderKind::ExpenditureSummary,
    LoaderKind::ProgramSummary,
    LoaderKind::Dgl060,
    LoaderKind::Dgl114,
    LoaderKind::Dgl115,
];

/// A downloaded file and the division its name carries, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub division: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FileLoad {
    pub inserted: usize,
    pub skipped: usize,
}

impl LoaderKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::ExpenditureSummary => "fsf.operating-unit-expenditure-summary",
            Self::ProgramSummary => "fsf.operating-unit-program-summary",
            Self::Dgl060 => "DGL060",
            Self::Dgl114 => "DGL114",
            Self::Dgl115 => "DGL115",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            Self::ExpenditureSummary => ExpenditureSummaryRow::TABLE,
            Self::ProgramSummary => ProgramSummaryRow::TABLE,
            Self::Dgl060 => Dgl060Row::TABLE,
            Self::Dgl114 => Dgl114Row::TABLE,
            Self::Dgl115 => Dgl115Row::TABLE,
        }
    }

    fn is_mobius(&self) -> bool {
        matches!(self, Self::Dgl060 | Self::Dgl114 | Self::Dgl115)
    }

    /// The files of this shape in `dir`, sorted by name.
    pub fn files(&self, dir: &Path) -> Result<Vec<SourceFile>> {
        if !self.is_mobius() {
            let path = dir.join(format!("{}.csv", self.key()));
            if !path.exists() {
                warn!("File not found: {}", path.display());
                return Ok(Vec::new());
            }
            return Ok(vec![SourceFile {
                path,
                division: None,
            }]);
        }

        let prefix = format!("mobius.{}.", self.key());
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let division = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".csv"))
                .filter(|d| !d.is_empty())
                .map(str::to_string);
            if let Some(division) = division {
                files.push(SourceFile {
                    path,
                    division: Some(division),
                });
            }
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    pub fn load_file(&self, conn: &Connection, file: &SourceFile) -> Result<FileLoad> {
        let path = file.path.as_path();
        let division = file.division.as_deref().unwrap_or_default();
        match self {
            Self::ExpenditureSummary => load_rows(conn, path, EXPENDITURE_COLUMNS, parse_expenditure),
            Self::ProgramSummary => load_rows(conn, path, PROGRAM_COLUMNS, parse_program),
            Self::Dgl060 => load_rows(conn, path, DGL060_COLUMNS, |c| parse_dgl060(c, division)),
            Self::Dgl114 => load_rows(conn, path, DGL114_COLUMNS, |c| parse_dgl114(c, division)),
            Self::Dgl115 => load_rows(conn, path, DGL115_COLUMNS, |c| parse_dgl115(c, division)),
        }
    }
}

// ---------------------------------------------------------------------------
// load_directory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct TableLoad {
    pub table: &'static str,
    pub files: usize,
    pub inserted: usize,
    pub skipped: usize,
}

#[derive(Debug, Default)]
pub struct LoadSummary {
    pub tables: Vec<TableLoad>,
}

impl LoadSummary {
    pub fn inserted(&self) -> usize {
        self.tables.iter().map(|t| t.inserted).sum()
    }

    pub fn skipped(&self) -> usize {
        self.tables.iter().map(|t| t.skipped).sum()
    }
}

/// Load every known report file in `dir`. With `replace`, a table's rows are
/// deleted before its files are loaded; tables with no files are left alone.
pub fn load_directory(conn: &Connection, dir: &Path, replace: bool) -> Result<LoadSummary> {
    let tx = conn.unchecked_transaction()?;
    let mut summary = LoadSummary::default();

    for kind in ALL_LOADERS {
        let files = kind.files(dir)?;
        let mut table = TableLoad {
            table: kind.table(),
            files: files.len(),
            inserted: 0,
            skipped: 0,
        };
        if replace && !files.is_empty() {
            let removed = tx.execute(&format!("DELETE FROM {}", kind.table()), [])?;
            info!("Cleared {removed} rows from {}", kind.table());
        }
        for file in &files {
            info!("Loading {}", file.path.display());
            let load = kind.load_file(&tx, file)?;
            table.inserted += load.inserted;
            table.skipped += load.skipped;
        }
        summary.tables.push(table);
    }

    tx.commit()?;
    Ok(summary)
}
