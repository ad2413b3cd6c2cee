//! `KEY.PATH=VALUE` edits for workflows.
//!
//! Paths address the node map directly, e.g. `3.inputs.seed=42` or
//! `6.inputs.text="a red fox"`. Values are parsed as JSON where possible and
//! fall back to a plain string.
use serde_json::{json, Value};

use super::{Workflow, WorkflowError};

#[derive(Debug, Clone, PartialEq)]
pub struct Override {
    pub path: Vec<String>,
    pub value: Value,
}

pub fn parse_set_pairs(items: &[String]) -> Result<Vec<Override>, WorkflowError> {
    let mut out = Vec::with_capacity(items.len());
    for s in items {
        let Some((k, val)) = s.split_once('=') else {
            return Err(WorkflowError::Override(format!(
                "Invalid override '{}', expected KEY=VALUE",
                s
            )));
        };
        let path: Vec<String> = k.split('.').map(|p| p.trim().to_string()).collect();
        if path.iter().any(|p| p.is_empty()) {
            return Err(WorkflowError::Override(format!("Invalid override path '{}'", k)));
        }
        out.push(Override {
            path,
            value: parse_value(val),
        });
    }
    Ok(out)
}

pub fn parse_value(src: &str) -> Value {
    if let Ok(v) = serde_json::from_str::<Value>(src) {
        return v;
    }
    if src.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if src.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if src.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(i) = src.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = src.parse::<f64>() {
        return json!(f);
    }
    Value::String(src.to_string())
}

/// Set `path` inside `root`. Intermediate keys must already exist; the last
/// key is inserted or replaced.
pub fn apply_set_path(root: &mut Value, path: &[String], new_val: Value) -> bool {
    let Some((last, parents)) = path.split_last() else {
        return false;
    };
    let mut cur = root;
    for key in parents {
        match cur.get_mut(key.as_str()) {
            Some(next) => cur = next,
            None => return false,
        }
    }
    match cur {
        Value::Object(map) => {
            map.insert(last.clone(), new_val);
            true
        }
        _ => false,
    }
}

impl Workflow {
    /// Apply every override, re-validating the typed inputs afterwards.
    pub fn apply_overrides(&mut self, overrides: &[Override]) -> Result<(), WorkflowError> {
        if overrides.is_empty() {
            return Ok(());
        }
        let mut graph = self.to_value();
        for o in overrides {
            if !apply_set_path(&mut graph, &o.path, o.value.clone()) {
                return Err(WorkflowError::Override(format!(
                    "Could not apply override to path: {}",
                    o.path.join(".")
                )));
            }
        }
        *self = Workflow::from_value(graph)?;
        Ok(())
    }
}
