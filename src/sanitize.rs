//! Best-effort sanitizer for values embedded directly into SQL literals.
//!
//! This is a blacklist, not a parser. It reduces the blast radius of string
//! interpolation when a value genuinely cannot be parameterized; it is NOT a
//! substitute for the named-parameter execution on
//! [`Session`](crate::Session), which is the primary defense.

use std::sync::LazyLock;

use regex::Regex;

/// How thoroughly a value is rewritten before interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SanitizeLevel {
    /// No transformation.
    Off,
    /// Escape quoting and wildcard characters. This level alone counters
    /// most literal-injection attempts.
    Basic,
    /// Basic, plus neutralize common SQL keywords. The output stays safe to
    /// print back into HTML. Do not use for usernames or passwords, where
    /// the inserted marker would corrupt the value.
    Thorough,
}

impl From<u8> for SanitizeLevel {
    fn from(level: u8) -> Self {
        match level {
            0 => SanitizeLevel::Off,
            1 => SanitizeLevel::Basic,
            _ => SanitizeLevel::Thorough,
        }
    }
}

// Each keyword is only dangerous as SQL syntax when a space follows it;
// the replacement swaps that space for an HTML non-breaking space.
static KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(xp_|update|insert|select|drop|alter|create|rename|delete|replace) ")
        .expect("keyword pattern is valid")
});

/// Rewrite `value` so it can be interpolated into a SQL string literal.
///
/// Pure text transformation: no I/O, no session state, and it never fails.
/// Empty and whitespace-only input is returned unchanged at every level.
///
/// ```rust
/// use sql_session::{SanitizeLevel, safe_sql_literal};
///
/// assert_eq!(safe_sql_literal("O'Brien", SanitizeLevel::Basic), "O''Brien");
/// assert_eq!(
///     safe_sql_literal("drop table users", SanitizeLevel::Thorough),
///     "drop&nbsp;table users"
/// );
/// ```
#[must_use]
pub fn safe_sql_literal(value: &str, level: SanitizeLevel) -> String {
    if level == SanitizeLevel::Off || value.trim().is_empty() {
        return value.to_string();
    }

    // Quote doubling first, then comment stripping, then wildcard
    // bracketing; `%` after `[` so inserted brackets are not re-escaped.
    let mut out = value.replace('\'', "''");
    out = out.replace("--", "");
    out = out.replace('[', "[[]");
    out = out.replace('%', "[%]");

    if level >= SanitizeLevel::Thorough {
        out = KEYWORD_RE.replace_all(&out, "${1}&nbsp;").into_owned();
    }

    out
}
