//! Topic route table
//!
//! Resolution order: an exact pattern equal to the topic wins, otherwise the
//! first registered wildcard pattern that matches.

use contracts::topic::{is_wildcard, topic_matches, MULTI_LEVEL_WILDCARD, SINGLE_LEVEL_WILDCARD};

#[derive(Debug, Clone)]
pub struct RouteTable<R> {
    entries: Vec<(String, R)>,
}

impl<R> Default for RouteTable<R> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<R> RouteTable<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route; an existing pattern keeps its position and gets the
    /// new route. Returns true when the pattern was already present.
    pub fn insert(&mut self, pattern: impl Into<String>, route: R) -> bool {
        let pattern = pattern.into();
        if let Some(entry) = self.entries.iter_mut().find(|(p, _)| *p == pattern) {
            entry.1 = route;
            return true;
        }
        self.entries.push((pattern, route));
        false
    }

    pub fn remove(&mut self, pattern: &str) -> Option<R> {
        let idx = self.entries.iter().position(|(p, _)| p == pattern)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn resolve(&self, topic: &str) -> Option<&R> {
        self.entries
            .iter()
            .find(|(p, _)| !is_wildcard(p) && p == topic)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|(p, _)| is_wildcard(p) && topic_matches(p, topic))
            })
            .map(|(_, route)| route)
    }

    /// Registered patterns that could match a topic `pattern` also matches
    pub fn overlapping(&self, pattern: &str) -> Vec<&str> {
        self.entries
            .iter()
            .map(|(p, _)| p.as_str())
            .filter(|p| *p != pattern && patterns_overlap(p, pattern))
            .collect()
    }

    /// Patterns in registration order
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(p, _)| p.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// True when some concrete topic matches both patterns
pub fn patterns_overlap(a: &str, b: &str) -> bool {
    let mut left = a.split('/');
    let mut right = b.split('/');

    loop {
        match (left.next(), right.next()) {
            (Some(MULTI_LEVEL_WILDCARD), _) | (_, Some(MULTI_LEVEL_WILDCARD)) => return true,
            (Some(l), Some(r)) if l == SINGLE_LEVEL_WILDCARD || r == SINGLE_LEVEL_WILDCARD || l == r => {
                continue
            }
            (None, None) => return true,
            _ => return false,
        }
    }
}
