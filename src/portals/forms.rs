use std::collections::HashSet;

use tracing::{debug, info};

use crate::browser::{is_checked, trimmed_text, Browser, ElementRef};
use crate::error::{CbocError, Result};

pub const DIVISION_CHECKBOXES: &str = r#"#cblDivision input[type="checkbox"]"#;

/// Indices of the checkboxes whose state disagrees with `wanted` membership.
///
/// Clicking exactly these brings every box in line with the target set, and a
/// second pass over the result yields nothing.
pub fn reconcile_checkboxes(current: &[(String, bool)], wanted: &HashSet<&str>) -> Vec<usize> {
    current
        .iter()
        .enumerate()
        .filter(|(_, (key, checked))| wanted.contains(key.as_str()) != *checked)
        .map(|(i, _)| i)
        .collect()
}

/// Click `el` only if its checked state differs from `want`. Returns whether it clicked.
pub fn ensure_checked<B: Browser + ?Sized>(browser: &mut B, el: ElementRef, want: bool) -> Result<bool> {
    if is_checked(browser, el)? == want {
        return Ok(false);
    }
    browser.click(el)?;
    Ok(true)
}

/// Division code shown on a checkbox label such as "33 - Christina".
pub fn division_code(label: &str) -> &str {
    label.split_whitespace().next().unwrap_or("")
}

/// Bring the division checkbox list in line with `divisions`. Returns the number of clicks.
pub fn set_divisions<B: Browser + ?Sized>(browser: &mut B, divisions: &[String]) -> Result<usize> {
    let inputs = browser.find_all(DIVISION_CHECKBOXES)?;
    let mut current = Vec::with_capacity(inputs.len());
    for input in &inputs {
        let id = browser.attribute(*input, "id")?.unwrap_or_default();
        let label = browser.find(&format!(r#"label[for="{id}"]"#))?;
        let text = trimmed_text(browser, label)?;
        current.push((division_code(&text).to_string(), is_checked(browser, *input)?));
    }

    let wanted: HashSet<&str> = divisions.iter().map(String::as_str).collect();
    let mismatched = reconcile_checkboxes(&current, &wanted);
    for i in &mismatched {
        debug!("toggling division {}", current[*i].0);
        browser.click(inputs[*i])?;
    }
    Ok(mismatched.len())
}

/// Select the first option of `select` whose label contains `format`, case-insensitively.
pub fn select_format<B: Browser + ?Sized>(browser: &mut B, select: ElementRef, format: &str) -> Result<String> {
    let token = format.to_lowercase();
    for option in browser.find_all_in(select, "option")? {
        let label = trimmed_text(browser, option)?;
        if label.to_lowercase().contains(&token) {
            info!("Found the format: {label}");
            browser.select_option(select, &label)?;
            return Ok(label);
        }
    }
    Err(CbocError::FormatNotFound(format.to_string()))
}
