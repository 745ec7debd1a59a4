//! Path template matching.
//!
//! # Responsibilities
//! - Parse templates such as `/v1/api/items-by-types/{item_types}`
//! - Match a request path segment by segment, capturing variables
//! - Rank templates so the most specific one is tried first
//!
//! # Design Decisions
//! - Literal segments are compared before percent-decoding, captures after
//! - No wildcards or regex: a template matches paths of exactly its depth
//! - Specificity is the literal/variable shape read left to right, so
//!   `/orders/latest` outranks `/orders/{id}`

use percent_encoding::percent_decode_str;

use crate::routing::registry::RegistrationError;

/// Captured path variables, in template order.
pub type PathParams = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A compiled path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile a template, rejecting malformed ones.
    pub fn parse(raw: &str) -> Result<Self, RegistrationError> {
        let malformed = |reason: &'static str| RegistrationError::MalformedPattern {
            pattern: raw.to_string(),
            reason,
        };

        let rest = raw
            .strip_prefix('/')
            .ok_or_else(|| malformed("must start with '/'"))?;

        let mut segments = Vec::new();
        if !rest.is_empty() {
            for part in rest.split('/') {
                if part.is_empty() {
                    return Err(malformed("empty path segment"));
                }

                if let Some(inner) = part.strip_prefix('{') {
                    let name = inner
                        .strip_suffix('}')
                        .ok_or_else(|| malformed("unterminated variable"))?;
                    if name.is_empty()
                        || !name
                            .chars()
                            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
                    {
                        return Err(malformed("invalid variable name"));
                    }
                    if segments
                        .iter()
                        .any(|s| matches!(s, Segment::Variable(existing) if existing == name))
                    {
                        return Err(malformed("variable bound twice"));
                    }
                    segments.push(Segment::Variable(name.to_string()));
                } else if part.contains('{') || part.contains('}') {
                    return Err(malformed("braces inside a literal segment"));
                } else {
                    segments.push(Segment::Literal(part.to_string()));
                }
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The template as registered.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match a request path, returning captured variables on success.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let rest = path.strip_prefix('/')?;
        let parts: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('/').collect()
        };

        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = Vec::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                Segment::Variable(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    let value = percent_decode_str(part).decode_utf8_lossy().into_owned();
                    params.push((name.clone(), value));
                }
            }
        }
        Some(params)
    }

    /// Literal/variable shape used for ranking; greater is more specific.
    pub(crate) fn specificity(&self) -> Vec<bool> {
        self.segments
            .iter()
            .map(|s| matches!(s, Segment::Literal(_)))
            .collect()
    }

    /// Whether both templates match exactly the same set of paths.
    pub(crate) fn overlaps(&self, other: &PathPattern) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| match (a, b) {
                    (Segment::Literal(x), Segment::Literal(y)) => x == y,
                    (Segment::Variable(_), Segment::Variable(_)) => true,
                    _ => false,
                })
    }
}

impl std::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}
