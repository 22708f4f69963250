//! Topic pattern syntax
//!
//! Levels are separated by `/`. `+` matches exactly one level, `#` matches the
//! remainder of the topic and is only valid as the final level.

use crate::TwinError;

pub const SINGLE_LEVEL_WILDCARD: &str = "+";
pub const MULTI_LEVEL_WILDCARD: &str = "#";

/// True when the pattern contains `+` or `#`
pub fn is_wildcard(pattern: &str) -> bool {
    pattern
        .split('/')
        .any(|level| level == SINGLE_LEVEL_WILDCARD || level == MULTI_LEVEL_WILDCARD)
}

/// Reject empty patterns, misplaced `#` and wildcards mixed into a level
pub fn validate_pattern(pattern: &str) -> Result<(), TwinError> {
    let invalid = |message: &str| {
        Err(TwinError::validation(format!("invalid topic pattern '{pattern}': {message}"))
            .with_detail("pattern", pattern))
    };

    if pattern.is_empty() {
        return invalid("pattern cannot be empty");
    }

    let levels: Vec<&str> = pattern.split('/').collect();
    for (idx, level) in levels.iter().enumerate() {
        if *level == MULTI_LEVEL_WILDCARD {
            if idx != levels.len() - 1 {
                return invalid("'#' must be the last level");
            }
        } else if *level != SINGLE_LEVEL_WILDCARD
            && (level.contains('+') || level.contains('#'))
        {
            return invalid("wildcards must occupy a whole level");
        }
    }
    Ok(())
}

/// Match a concrete topic against a pattern
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let mut pattern_levels = pattern.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (pattern_levels.next(), topic_levels.next()) {
            (Some(MULTI_LEVEL_WILDCARD), _) => return true,
            (Some(SINGLE_LEVEL_WILDCARD), Some(_)) => continue,
            (Some(p), Some(t)) if p == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_level_wildcard() {
        assert!(topic_matches("sensors/+/temperature", "sensors/motor-001/temperature"));
        assert!(!topic_matches(
            "sensors/+/temperature",
            "sensors/motor-001/vibration/extra"
        ));
        assert!(!topic_matches("sensors/+/temperature", "sensors/temperature"));
        assert!(!topic_matches("sensors/+", "sensors/a/b"));
    }

    #[test]
    fn test_multi_level_wildcard() {
        assert!(topic_matches("sensors/#", "sensors/motor-001/temperature"));
        assert!(topic_matches("sensors/#", "sensors/motor-001/vibration/extra"));
        assert!(topic_matches("#", "anything/at/all"));
        assert!(!topic_matches("sensors/#", "actuators/valve"));
    }

    #[test]
    fn test_exact_match() {
        assert!(topic_matches("a/b/c", "a/b/c"));
        assert!(!topic_matches("a/b/c", "a/b"));
        assert!(!topic_matches("a/b", "a/b/c"));
    }

    #[test]
    fn test_validate_pattern() {
        assert!(validate_pattern("sensors/+/temperature").is_ok());
        assert!(validate_pattern("sensors/#").is_ok());
        assert!(validate_pattern("#").is_ok());
        assert!(validate_pattern("").is_err());
        assert!(validate_pattern("sensors/#/temperature").is_err());
        assert!(validate_pattern("sensors/motor+/temperature").is_err());
        assert!(validate_pattern("sensors/a#").is_err());
    }

    #[test]
    fn test_is_wildcard() {
        assert!(is_wildcard("a/+/c"));
        assert!(is_wildcard("a/#"));
        assert!(!is_wildcard("a/b/c"));
    }
}
