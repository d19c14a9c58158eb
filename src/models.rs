#[derive(Debug, Clone, PartialEq)]
pub struct ExpenditureSummaryRow {
    pub district: String,
    pub division: String,
    pub record_type: String,
    pub sub_type: String,
    pub operating_unit: String,
    pub operating_unit_description: String,
    pub budget_amount: f64,
    pub encumbered_amount: f64,
    pub expended_amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgramSummaryRow {
    pub district: String,
    pub division: String,
    pub record_type: String,
    pub operating_unit: String,
    pub operating_unit_description: String,
    pub program_code: String,
    pub program_code_description: String,
    pub budget_amount: f64,
    pub encumbered_amount: f64,
    pub expended_amount: f64,
}

/// DGL060: appropriation balances.
#[derive(Debug, Clone, PartialEq)]
pub struct Dgl060Row {
    pub division: String,
    /// ISO `YYYY-MM-DD`.
    pub as_of_date: String,
    pub department_id: String,
    pub department_description: String,
    pub fiscal_year: i32,
    pub fund: String,
    pub appropriation: String,
    pub appropriation_type: String,
    pub appropriation_description: String,
    pub end_date: String,
    pub available_amount: f64,
    pub encumbered_amount: f64,
    pub current_year_expenses: f64,
    pub prior_year_expenses: f64,
    pub remaining_spend_authorized: f64,
}

/// DGL114: revenue by account.
#[derive(Debug, Clone, PartialEq)]
pub struct Dgl114Row {
    pub division: String,
    pub as_of_date: String,
    pub department_id: String,
    pub department_description: String,
    pub budget_year: i32,
    pub fund: String,
    pub appropriation: String,
    pub appropriation_type: String,
    pub revenue_account: String,
    pub revenue_account_description: String,
    pub local_funds_current: f64,
    pub local_funds_year_to_date: f64,
    pub state_funds_current: f64,
    pub state_funds_year_to_date: f64,
}

/// DGL115: monthly and year-to-date account balances.
#[derive(Debug, Clone, PartialEq)]
pub struct Dgl115Row {
    pub division: String,
    pub department_id: String,
    pub department_description: String,
    pub fiscal_year: i32,
    pub account_period: i32,
    pub account: String,
    pub account_description: String,
    pub local_funds_month_to_date: f64,
    pub state_funds_month_to_date: f64,
    pub total_funds_month_to_date: f64,
    pub local_funds_year_to_date: f64,
    pub state_funds_year_to_date: f64,
    pub total_funds_year_to_date: f64,
}
