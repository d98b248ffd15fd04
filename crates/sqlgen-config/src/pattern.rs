//! Glob-style matchers for override specifiers
//!
//! Each dotted part of an override specifier compiles to one matcher: `*`
//! matches any run of characters, `?` any single character, everything else
//! is literal. Matchers are anchored to the whole identifier.

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid pattern {raw:?}: {source}")]
    Invalid {
        raw: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Clone)]
pub struct Match {
    raw: String,
    re: Regex,
}

impl Match {
    pub fn compile(spec: &str) -> Result<Match, PatternError> {
        let mut expr = String::with_capacity(spec.len() + 2);
        expr.push('^');
        for ch in spec.chars() {
            match ch {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                _ => expr.push_str(&regex::escape(ch.encode_utf8(&mut [0; 4]))),
            }
        }
        expr.push('$');
        let re = Regex::new(&expr).map_err(|source| PatternError::Invalid {
            raw: spec.to_string(),
            source,
        })?;
        Ok(Match {
            raw: spec.to_string(),
            re,
        })
    }

    pub fn matches(&self, s: &str) -> bool {
        self.re.is_match(s)
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}
