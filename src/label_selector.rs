//! Label selector evaluation for the mock server's CRUD mode
//!
//! Parses the selector string a list request carries into a
//! `kube::core::Selector` and matches it against stored labels. Supports
//! `key=value`, `key==value`, `key!=value`, `key in (a,b)`, `key notin (a,b)`,
//! `key` and `!key`, combined with commas.

use kube::core::{Expression, Selector, SelectorExt};
use std::collections::{BTreeMap, BTreeSet};

/// Split on commas that are not inside a `( ... )` value list
fn split_requirements(selector: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;

    for (i, ch) in selector.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&selector[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&selector[start..]);

    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

fn parse_value_list(requirement: &str, values: &str) -> Result<BTreeSet<String>, String> {
    let inner = values
        .trim()
        .strip_prefix('(')
        .and_then(|v| v.strip_suffix(')'))
        .ok_or_else(|| format!("expected a parenthesized value list in '{}'", requirement))?;
    Ok(inner.split(',').map(|v| v.trim().to_string()).collect())
}

fn parse_requirement(requirement: &str) -> Result<Expression, String> {
    if let Some((key, values)) = requirement.split_once(" notin ") {
        return Ok(Expression::NotIn(
            key.trim().to_string(),
            parse_value_list(requirement, values)?,
        ));
    }
    if let Some((key, values)) = requirement.split_once(" in ") {
        return Ok(Expression::In(
            key.trim().to_string(),
            parse_value_list(requirement, values)?,
        ));
    }
    if let Some((key, value)) = requirement.split_once("!=") {
        return Ok(Expression::NotEqual(
            key.trim().to_string(),
            value.trim().to_string(),
        ));
    }
    if let Some((key, value)) = requirement
        .split_once("==")
        .or_else(|| requirement.split_once('='))
    {
        return Ok(Expression::Equal(
            key.trim().to_string(),
            value.trim().to_string(),
        ));
    }
    if let Some(key) = requirement.strip_prefix('!') {
        return Ok(Expression::DoesNotExist(key.trim().to_string()));
    }
    if requirement.contains(char::is_whitespace) {
        return Err(format!("invalid requirement '{}'", requirement));
    }
    Ok(Expression::Exists(requirement.to_string()))
}

/// Parse a label selector string; an empty selector matches everything
pub fn parse_label_selector(selector: &str) -> Result<Selector, String> {
    let expressions = split_requirements(selector)
        .into_iter()
        .map(parse_requirement)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Selector::from_iter(expressions))
}

/// Match labels against a label selector string
///
/// ```
/// use std::collections::BTreeMap;
/// use kube_resource_client::label_selector::matches_label_selector;
///
/// let labels = BTreeMap::from([("app".to_string(), "web".to_string())]);
/// assert!(matches_label_selector(&labels, "app=web").unwrap());
/// assert!(!matches_label_selector(&labels, "app in (api,worker)").unwrap());
/// ```
pub fn matches_label_selector(
    labels: &BTreeMap<String, String>,
    selector: &str,
) -> Result<bool, String> {
    Ok(parse_label_selector(selector)?.matches(labels))
}
