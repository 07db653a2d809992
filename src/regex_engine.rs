//! Regex adapter backed by the `regex` crate.
//!
//! The registry ships with a stub adapter that never matches. Calling
//! [`install`] replaces it with a real engine that compiles patterns through
//! a process-wide cache, so repeated matches against the same pattern reuse
//! the compiled form.

use crate::registry::{set_regex_match, set_regex_stringify};
use crate::value::{Value, ValueView};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

static PATTERN_CACHE: OnceLock<RwLock<HashMap<String, Option<Regex>>>> = OnceLock::new();

fn cache() -> &'static RwLock<HashMap<String, Option<Regex>>> {
    PATTERN_CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// The pattern text of a string or regex value.
fn pattern_source(pattern: &Value) -> Option<String> {
    match pattern.view() {
        ValueView::Str(s) => Some(s.to_string()),
        ValueView::Regex(s) => Some(s.to_string()),
        _ => None,
    }
}

/// Compiles `source` through the cache. A pattern that fails to compile is
/// cached as a permanent miss so it is not retried per match.
fn compiled(source: &str) -> Option<Regex> {
    if let Ok(patterns) = cache().read() {
        if let Some(entry) = patterns.get(source) {
            return entry.clone();
        }
    }
    let fresh = Regex::new(source).ok();
    if let Ok(mut patterns) = cache().write() {
        patterns.insert(source.to_string(), fresh.clone());
    }
    fresh
}

/// Wires the `regex` crate into the registry's regex adapter.
pub fn install() {
    set_regex_match(Arc::new(|_arena, pattern, value| {
        let Some(source) = pattern_source(pattern) else {
            return false;
        };
        let ValueView::Str(input) = value.view() else {
            return false;
        };
        compiled(&source).is_some_and(|re| re.is_match(&input))
    }));
    set_regex_stringify(Arc::new(|_arena, pattern| match pattern_source(pattern) {
        Some(source) => format!("/{source}/"),
        None => "//".to_string(),
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::registry;

    #[test]
    fn test_install_matches_and_stringifies() {
        install();
        let arena = Arena::new();
        let pattern = arena.regex("^a+b$");
        let hit = arena.string("aaab");
        let miss = arena.string("bbb");

        assert!(registry::registry().regex_match(&arena, &pattern, &hit));
        assert!(!registry::registry().regex_match(&arena, &pattern, &miss));
        assert_eq!(
            registry::registry().regex_stringify(&arena, &pattern),
            "/^a+b$/"
        );
    }

    #[test]
    fn test_string_patterns_and_invalid_patterns() {
        install();
        let arena = Arena::new();
        let pattern = arena.string("colou?r");
        let value = arena.string("color");
        assert!(registry::registry().regex_match(&arena, &pattern, &value));

        let broken = arena.string("(unclosed");
        assert!(!registry::registry().regex_match(&arena, &broken, &value));
        // Non-string inputs never match.
        assert!(!registry::registry().regex_match(&arena, &pattern, &arena.int(1)));
    }
}
