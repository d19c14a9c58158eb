use std::collections::HashMap;

use rusqlite::Connection;
use serde::Serialize;

use crate::error::Result;

// ---------------------------------------------------------------------------
// Amounts and budget bars
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Amounts {
    pub budget: f64,
    pub encumbered: f64,
    pub expended: f64,
}

impl Amounts {
    pub fn available(&self) -> f64 {
        self.budget - self.expended - self.encumbered
    }

    pub fn add(&mut self, other: &Amounts) {
        self.budget += other.budget;
        self.encumbered += other.encumbered;
        self.expended += other.expended;
    }
}

/// Segment widths of a budget bar, in percent of the budget. The available
/// segment fills whatever is left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetBar {
    pub expended: f64,
    pub encumbered: f64,
}

impl BudgetBar {
    /// `None` when there is no positive budget to measure against.
    pub fn new(amounts: &Amounts) -> Option<Self> {
        if amounts.budget <= 0.0 {
            return None;
        }
        let width = |part: f64| (100.0 * part / amounts.budget).clamp(0.0, 100.0);
        let expended = width(amounts.expended);
        Some(Self {
            expended,
            encumbered: width(amounts.encumbered).min(100.0 - expended),
        })
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// One description per division, taken from the ledger snapshot.
const DIVISION_DESCRIPTIONS: &str = "SELECT division, MIN(department_description) AS department_description \
     FROM mobius_dgl115 GROUP BY division";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DivisionTotal {
    pub division: String,
    pub description: String,
    pub amounts: Amounts,
    pub available: f64,
    pub bar: Option<BudgetBar>,
}

/// Expenditure summary totals per division, for divisions with a positive budget.
pub fn budget_overview(conn: &Connection) -> Result<Vec<DivisionTotal>> {
    let sql = format!(
        "SELECT r.division, COALESCE(d.department_description, ''), \
         SUM(r.budget_amount), SUM(r.encumbered_amount), SUM(r.expended_amount) \
         FROM fsf_operating_unit_expenditure_summaries r \
         LEFT JOIN ({DIVISION_DESCRIPTIONS}) d ON r.division = d.division \
         GROUP BY r.division \
         HAVING SUM(r.budget_amount) > 0 \
         ORDER BY r.division"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        let amounts = Amounts {
            budget: row.get(2)?,
            encumbered: row.get(3)?,
            expended: row.get(4)?,
        };
        Ok(DivisionTotal {
            division: row.get(0)?,
            description: row.get(1)?,
            available: amounts.available(),
            bar: BudgetBar::new(&amounts),
            amounts,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// A division/unit/program group of the program summary.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetLine {
    pub division: String,
    pub division_description: String,
    pub unit: String,
    pub unit_description: String,
    pub program: String,
    pub program_description: String,
    pub amounts: Amounts,
}

pub fn budget_lines(conn: &Connection) -> Result<Vec<BudgetLine>> {
    let sql = format!(
        "SELECT p.division, COALESCE(d.department_description, ''), \
         p.operating_unit, COALESCE(MIN(p.operating_unit_description), ''), \
         p.program_code, COALESCE(MIN(p.program_code_description), ''), \
         SUM(p.budget_amount), SUM(p.encumbered_amount), SUM(p.expended_amount) \
         FROM fsf_operating_unit_program_summaries p \
         LEFT JOIN ({DIVISION_DESCRIPTIONS}) d ON p.division = d.division \
         GROUP BY p.division, p.operating_unit, p.program_code \
         HAVING SUM(p.budget_amount) > 0 \
         ORDER BY p.division, p.operating_unit, p.program_code"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        Ok(BudgetLine {
            division: row.get(0)?,
            division_description: row.get(1)?,
            unit: row.get(2)?,
            unit_description: row.get(3)?,
            program: row.get(4)?,
            program_description: row.get(5)?,
            amounts: Amounts {
                budget: row.get(6)?,
                encumbered: row.get(7)?,
                expended: row.get(8)?,
            },
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

// ---------------------------------------------------------------------------
// Rollup trees
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum View {
    /// division → operating unit → program
    ByUnit,
    /// division → program → operating unit
    ByProgram,
}

#[derive(Debug, Clone, Default)]
pub struct Node {
    pub key: String,
    pub label: String,
    pub amounts: Amounts,
    pub children: Vec<Node>,
    index: HashMap<String, usize>,
}

impl Node {
    fn new(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            ..Default::default()
        }
    }

    fn child(&mut self, key: &str, label: &str) -> &mut Node {
        let i = match self.index.get(key) {
            Some(i) => *i,
            None => {
                self.children.push(Node::new(key, label));
                self.index.insert(key.to_string(), self.children.len() - 1);
                self.children.len() - 1
            }
        };
        &mut self.children[i]
    }

    pub fn available(&self) -> f64 {
        self.amounts.available()
    }

    pub fn bar(&self) -> Option<BudgetBar> {
        BudgetBar::new(&self.amounts)
    }
}

/// Fold budget lines into a three-level tree, in line order. Lines land on
/// the leaves; every parent's amounts are then the sum of its children's,
/// added in child order.
pub fn build_tree(lines: &[BudgetLine], view: View) -> Vec<Node> {
    let mut root = Node::default();
    for line in lines {
        let (middle, leaf) = match view {
            View::ByUnit => (
                (&line.unit, &line.unit_description),
                (&line.program, &line.program_description),
            ),
            View::ByProgram => (
                (&line.program, &line.program_description),
                (&line.unit, &line.unit_description),
            ),
        };
        root.child(&line.division, &line.division_description)
            .child(middle.0, middle.1)
            .child(leaf.0, leaf.1)
            .amounts
            .add(&line.amounts);
    }
    for division in &mut root.children {
        roll_up(division);
    }
    root.children
}

fn roll_up(node: &mut Node) {
    if node.children.is_empty() {
        return;
    }
    let mut sum = Amounts::default();
    for child in &mut node.children {
        roll_up(child);
        sum.add(&child.amounts);
    }
    node.amounts = sum;
}
