//! Environment handling
//!
//! - `${VAR}` / `${VAR:-default}` expansion in every string value
//! - `EDGE_TWIN_*` overrides applied after expansion
//!
//! Unresolved `${VAR}` references without a default are left untouched.

use contracts::TwinError;
use serde_json::{Map, Value};
use tracing::debug;

/// Environment override variables and the config path they target
pub const ENV_OVERRIDES: [(&str, &str, &str); 6] = [
    ("EDGE_TWIN_BROKER_HOST", "broker", "host"),
    ("EDGE_TWIN_BROKER_PORT", "broker", "port"),
    ("EDGE_TWIN_BROKER_USERNAME", "broker", "username"),
    ("EDGE_TWIN_BROKER_PASSWORD", "broker", "password"),
    ("EDGE_TWIN_TWIN_ID", "runtime", "twin_id"),
    ("EDGE_TWIN_ASSET_ID", "runtime", "asset_id"),
];

/// Expand `${...}` references in a single string
pub fn expand_str<F>(input: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };

        let expr = &after[..end];
        let resolved = match expr.split_once(":-") {
            Some((name, default)) => Some(lookup(name).unwrap_or_else(|| default.to_string())),
            None => lookup(expr),
        };
        match resolved {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

/// Recursively expand every string in the tree
pub fn expand_tree<F>(tree: &mut Value, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    match tree {
        Value::String(s) if s.contains("${") => *s = expand_str(s, lookup),
        Value::Array(items) => items.iter_mut().for_each(|item| expand_tree(item, lookup)),
        Value::Object(map) => map.values_mut().for_each(|v| expand_tree(v, lookup)),
        _ => {}
    }
}

/// Apply `EDGE_TWIN_*` overrides; empty values are ignored
pub fn apply_overrides<F>(tree: &mut Value, lookup: &F) -> Result<(), TwinError>
where
    F: Fn(&str) -> Option<String>,
{
    let Value::Object(root) = tree else {
        return Err(TwinError::configuration("configuration root must be a table"));
    };

    for (var, section, key) in ENV_OVERRIDES {
        let Some(raw) = lookup(var).filter(|v| !v.is_empty()) else {
            continue;
        };

        let value = if key == "port" {
            let port: u16 = raw.parse().map_err(|_| {
                TwinError::config_field(
                    format!("{section}.{key}"),
                    format!("{var}='{raw}' is not a valid port"),
                )
            })?;
            Value::from(port)
        } else {
            Value::String(raw)
        };

        debug!(var, field = %format!("{section}.{key}"), "Applying environment override");
        let entry = root
            .entry(section.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        match entry {
            Value::Object(table) => {
                table.insert(key.to_string(), value);
            }
            _ => {
                return Err(TwinError::config_field(section, "expected a table"));
            }
        }
    }
    Ok(())
}

/// Lookup backed by the process environment
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
