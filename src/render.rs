use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use minijinja::{context, Environment};
use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::fmt::{money, pct};
use crate::reports::{self, Amounts, BudgetBar, Node, View};

pub const REPORT_TITLE: &str = "CBOC Report";
pub const REPORT_FILE: &str = "report.html";
const TEMPLATE: &str = include_str!("templates/report.html");

#[derive(Serialize)]
struct NodeView {
    key: String,
    label: String,
    amounts: Amounts,
    available: f64,
    bar: Option<BudgetBar>,
    children: Vec<NodeView>,
}

impl From<&Node> for NodeView {
    fn from(node: &Node) -> Self {
        Self {
            key: node.key.clone(),
            label: node.label.clone(),
            amounts: node.amounts,
            available: node.available(),
            bar: node.bar(),
            children: node.children.iter().map(NodeView::from).collect(),
        }
    }
}

#[derive(Serialize)]
struct Section {
    title: &'static str,
    middle: &'static str,
    leaf: &'static str,
    tree: Vec<NodeView>,
}

fn environment() -> Result<Environment<'static>> {
    let mut env = Environment::new();
    env.add_filter("money", money);
    env.add_filter("pct", pct);
    env.add_template("report.html", TEMPLATE)?;
    Ok(env)
}

/// Render the report from whatever is loaded in the database.
pub fn render_report(conn: &Connection, generated: NaiveDate) -> Result<String> {
    let overview = reports::budget_overview(conn)?;
    let lines = reports::budget_lines(conn)?;
    let tree = |view: View| -> Vec<NodeView> {
        reports::build_tree(&lines, view).iter().map(NodeView::from).collect()
    };
    let sections = vec![
        Section {
            title: "By Operating Unit",
            middle: "Operating unit",
            leaf: "Program",
            tree: tree(View::ByUnit),
        },
        Section {
            title: "By Program",
            middle: "Program",
            leaf: "Operating unit",
            tree: tree(View::ByProgram),
        },
    ];

    let env = environment()?;
    let html = env.get_template("report.html")?.render(context! {
        title => REPORT_TITLE,
        generated => generated.format("%B %-d, %Y").to_string(),
        overview => overview,
        sections => sections,
    })?;
    Ok(html)
}

/// Write `report.html` into `output_dir` and return its path.
pub fn write_report(conn: &Connection, output_dir: &Path, generated: NaiveDate) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let html = render_report(conn, generated)?;
    let path = output_dir.join(REPORT_FILE);
    std::fs::write(&path, html)?;
    info!("Wrote {}", path.display());
    Ok(path)
}
