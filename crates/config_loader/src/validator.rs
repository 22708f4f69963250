//! Configuration validation
//!
//! Rules:
//! - field ranges and required strings (derive, see `contracts::TwinBlueprint`)
//! - reconnect_delay_min_ms <= reconnect_delay_max_ms
//! - every broker topic is a valid pattern
//! - sink names unique

use std::collections::HashSet;

use contracts::{topic, TwinBlueprint, TwinError};
use ::validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

/// Validate a TwinBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &TwinBlueprint) -> Result<(), TwinError> {
    validate_fields(blueprint)?;
    validate_reconnect_delays(blueprint)?;
    validate_topics(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

/// Declarative field rules
fn validate_fields(blueprint: &TwinBlueprint) -> Result<(), TwinError> {
    blueprint.validate().map_err(|errors| {
        let mut flat = Vec::new();
        flatten_errors("", &errors, &mut flat);
        flat.sort();
        match flat.into_iter().next() {
            Some((field, message)) => TwinError::config_field(field, message),
            None => TwinError::configuration(errors.to_string()),
        }
    })
}

fn flatten_errors(prefix: &str, errors: &ValidationErrors, out: &mut Vec<(String, String)>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for e in field_errors {
                    let message = match &e.message {
                        Some(m) => m.to_string(),
                        None => describe_code(e),
                    };
                    out.push((path.clone(), message));
                }
            }
            ValidationErrorsKind::Struct(nested) => flatten_errors(&path, nested, out),
            ValidationErrorsKind::List(items) => {
                for (idx, nested) in items {
                    flatten_errors(&format!("{path}[{idx}]"), nested, out);
                }
            }
        }
    }
}

fn describe_code(error: &ValidationError) -> String {
    let bound = |key: &str| error.params.get(key).map(|v| v.to_string());
    match (error.code.as_ref(), bound("min"), bound("max")) {
        ("range", Some(min), Some(max)) => format!("must be between {min} and {max}"),
        ("range", Some(min), None) => format!("must be >= {min}"),
        ("range", None, Some(max)) => format!("must be <= {max}"),
        ("length", Some(min), _) => format!("length must be >= {min}"),
        (code, _, _) => format!("failed '{code}' check"),
    }
}

/// Backoff bounds
fn validate_reconnect_delays(blueprint: &TwinBlueprint) -> Result<(), TwinError> {
    let broker = &blueprint.broker;
    if broker.reconnect_delay_min_ms > broker.reconnect_delay_max_ms {
        return Err(TwinError::config_field(
            "broker.reconnect_delay_min_ms / broker.reconnect_delay_max_ms",
            format!(
                "reconnect_delay_min_ms ({}) must be <= reconnect_delay_max_ms ({})",
                broker.reconnect_delay_min_ms, broker.reconnect_delay_max_ms
            ),
        ));
    }
    Ok(())
}

/// Topic pattern syntax
fn validate_topics(blueprint: &TwinBlueprint) -> Result<(), TwinError> {
    for (idx, pattern) in blueprint.broker.topics.iter().enumerate() {
        topic::validate_pattern(pattern).map_err(|e| {
            TwinError::config_field(format!("broker.topics[{idx}]"), e.to_string())
        })?;
    }
    Ok(())
}

/// Sink names
fn validate_sinks(blueprint: &TwinBlueprint) -> Result<(), TwinError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if !seen.insert(sink.name.as_str()) {
            return Err(TwinError::config_field(
                format!("sinks[{}].name", idx),
                format!("duplicate sink name '{}'", sink.name),
            ));
        }
    }
    Ok(())
}
