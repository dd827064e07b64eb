//! LIKE pattern evaluation (`%` any run, `_` one char, `\` escapes).

use crate::core::{MapError, Result};
use lru::LruCache;
use regex::{Regex, RegexBuilder};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

pub const DEFAULT_PATTERN_CACHE_CAPACITY: usize = 200;

lazy_static::lazy_static! {
    static ref SHARED_PATTERNS: PatternCache = PatternCache::new(DEFAULT_PATTERN_CACHE_CAPACITY);
}

/// LRU cache of compiled LIKE patterns.
pub struct PatternCache {
    compiled: Mutex<LruCache<String, Arc<Regex>>>,
}

impl PatternCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            compiled: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Process-wide cache used when no template-specific one is given.
    pub fn shared() -> &'static PatternCache {
        &SHARED_PATTERNS
    }

    pub fn is_match(&self, text: &str, pattern: &str, case_sensitive: bool) -> Result<bool> {
        if let Some(result) = fast_path_like(text, pattern, case_sensitive) {
            return Ok(result);
        }
        let regex = self.get_or_compile(pattern, case_sensitive)?;
        Ok(regex.is_match(text))
    }

    pub fn len(&self) -> usize {
        self.compiled.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_or_compile(&self, pattern: &str, case_sensitive: bool) -> Result<Arc<Regex>> {
        let cache_key = if case_sensitive {
            format!("s:{}", pattern)
        } else {
            format!("i:{}", pattern)
        };

        if let Some(regex) = self.compiled.lock()?.get(&cache_key) {
            return Ok(Arc::clone(regex));
        }

        let compiled = RegexBuilder::new(&like_to_regex(pattern))
            .case_insensitive(!case_sensitive)
            .build()
            .map_err(|e| MapError::TypeMismatch(format!("Invalid LIKE pattern '{}': {}", pattern, e)))?;
        let compiled = Arc::new(compiled);

        self.compiled.lock()?.put(cache_key, Arc::clone(&compiled));
        Ok(compiled)
    }
}

/// Evaluates a LIKE pattern through the shared cache.
pub fn eval_like(text: &str, pattern: &str, case_sensitive: bool) -> Result<bool> {
    PatternCache::shared().is_match(text, pattern, case_sensitive)
}

fn like_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 2);
    regex.push('^');

    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            '\\' => match chars.next() {
                Some(escaped) => regex.push_str(&regex::escape(&escaped.to_string())),
                None => regex.push_str(r"\\"),
            },
            c => regex.push_str(&regex::escape(&c.to_string())),
        }
    }

    regex.push('$');
    regex
}

/// Prefix, suffix, substring and exact patterns without touching regex.
fn fast_path_like(text: &str, pattern: &str, case_sensitive: bool) -> Option<bool> {
    if pattern.contains('_') || pattern.contains('\\') {
        return None;
    }

    let (text, pattern) = if case_sensitive {
        (text.to_string(), pattern.to_string())
    } else {
        (text.to_lowercase(), pattern.to_lowercase())
    };

    match pattern.matches('%').count() {
        0 => Some(text == pattern),
        1 if pattern.ends_with('%') => Some(text.starts_with(&pattern[..pattern.len() - 1])),
        1 if pattern.starts_with('%') => Some(text.ends_with(&pattern[1..])),
        2 if pattern.len() >= 2 && pattern.starts_with('%') && pattern.ends_with('%') => {
            Some(text.contains(&pattern[1..pattern.len() - 1]))
        }
        _ => None,
    }
}
