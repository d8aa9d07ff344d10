//! Key pattern matching
//!
//! Patterns support a single wildcard, `*`, matching zero or more characters.
//! Every other character, including Redis' own `?` and `[...]` metacharacters,
//! matches itself.

use crate::error::{CacheError, CacheResult};

/// A validated key pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPattern {
    raw: String,
}

impl KeyPattern {
    /// Parse a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidArgument`] for an empty pattern.
    pub fn parse(pattern: &str) -> CacheResult<Self> {
        if pattern.is_empty() {
            return Err(CacheError::InvalidArgument(
                "key pattern must not be empty".to_string(),
            ));
        }
        Ok(Self {
            raw: pattern.to_string(),
        })
    }

    /// The pattern as given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether `key` matches this pattern.
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        wildcard_match(self.raw.as_bytes(), key.as_bytes())
    }

    /// The pattern rewritten for Redis `SCAN MATCH`, with every glob
    /// metacharacter except `*` escaped.
    #[must_use]
    pub fn to_redis_glob(&self) -> String {
        let mut out = String::with_capacity(self.raw.len());
        for ch in self.raw.chars() {
            if matches!(ch, '?' | '[' | ']' | '\\') {
                out.push('\\');
            }
            out.push(ch);
        }
        out
    }
}

/// Greedy `*` matcher with single-point backtracking.
///
/// Operates on bytes: `*` is ASCII, so it can never split a multi-byte
/// character of the key in a way that changes the result.
fn wildcard_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut resume = 0usize;

    while t < text.len() {
        match pattern.get(p) {
            Some(b'*') => {
                star = Some(p);
                resume = t;
                p += 1;
            }
            Some(c) if Some(c) == text.get(t) => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some(s) => {
                    p = s + 1;
                    resume += 1;
                    t = resume;
                }
                None => return false,
            },
        }
    }

    pattern.get(p..).is_some_and(|rest| rest.iter().all(|&c| c == b'*'))
}
