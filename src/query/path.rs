//! Path expressions over the registry tree.
//!
//! A path expression is a dotted sequence of segments:
//!
//! - `architecture.complexity` — literal identifiers, matched exactly
//! - `*.accuracy` — `*` matches any one identifier at that level
//! - `*<trainer>.architecture.complexity` — `*<tag>` matches identifiers
//!   whose child registry carries the tag
//! - `mnist*<trainer>.loss` — a literal prefix combined with a tag filter
//!
//! Compilation is pure and deterministic: identical inputs compile to
//! structurally identical expressions, which makes per-string caching in the
//! resolver safe.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors raised when compiling a path expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// Expression was empty or whitespace
    #[error("path expression is empty")]
    Empty,

    /// A dot-delimited token was empty (leading, trailing, or doubled dot)
    #[error("empty segment at position {index}")]
    EmptySegment {
        /// Zero-based segment position
        index: usize,
    },

    /// More than one `*` in a single token
    #[error("segment '{token}' contains more than one wildcard")]
    MultipleWildcards {
        /// Offending token
        token: String,
    },

    /// `*` combined with other characters but no `<tag>` following it
    #[error("wildcard in segment '{token}' must be alone or followed by <tag>")]
    MissingTag {
        /// Offending token
        token: String,
    },

    /// `<` opened a tag that never closes
    #[error("segment '{token}' has an unclosed tag")]
    UnclosedTag {
        /// Offending token
        token: String,
    },

    /// `*<>` — a tag filter with no tag
    #[error("segment '{token}' has an empty tag")]
    EmptyTag {
        /// Offending token
        token: String,
    },

    /// Characters after the closing `>` of a tag
    #[error("segment '{token}' has trailing characters after the tag")]
    TrailingCharacters {
        /// Offending token
        token: String,
    },

    /// `<` or `>` outside a `*<tag>` construct
    #[error("segment '{token}' contains a stray tag delimiter")]
    StrayTagDelimiter {
        /// Offending token
        token: String,
    },
}

/// One compiled segment of a path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Exact identifier match
    Literal(String),
    /// `*`: any one identifier
    Wildcard,
    /// `*<tag>` or `prefix*<tag>`: identifier must start with `prefix`
    /// (empty for the bare form) and its registry must carry `tag`
    TaggedWildcard {
        /// Literal identifier prefix, possibly empty
        prefix: String,
        /// Tag the matched registry node must carry
        tag: String,
    },
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(name) => write!(f, "{}", name),
            Self::Wildcard => write!(f, "*"),
            Self::TaggedWildcard { prefix, tag } => write!(f, "{}*<{}>", prefix, tag),
        }
    }
}

/// A compiled, immutable path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    raw: String,
    segments: Vec<Segment>,
}

impl PathExpr {
    /// Compile a raw dotted expression.
    ///
    /// Pure: no side effects, and malformed syntax fails with a
    /// [`PathError`] naming the offending token.
    pub fn parse(raw: &str) -> Result<PathExpr, PathError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PathError::Empty);
        }

        let mut segments = Vec::new();
        for (index, token) in trimmed.split('.').enumerate() {
            if token.is_empty() {
                return Err(PathError::EmptySegment { index });
            }
            segments.push(parse_segment(token)?);
        }

        Ok(PathExpr {
            raw: trimmed.to_string(),
            segments,
        })
    }

    /// The source string this expression was compiled from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The compiled segments, in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// A compiled expression always has at least one segment.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl FromStr for PathExpr {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PathExpr::parse(s)
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

fn parse_segment(token: &str) -> Result<Segment, PathError> {
    let stars = token.matches('*').count();
    if stars == 0 {
        if token.contains('<') || token.contains('>') {
            return Err(PathError::StrayTagDelimiter {
                token: token.to_string(),
            });
        }
        return Ok(Segment::Literal(token.to_string()));
    }
    if stars > 1 {
        return Err(PathError::MultipleWildcards {
            token: token.to_string(),
        });
    }

    // Exactly one star: "prefix*rest" where rest must be empty or "<tag>".
    let (prefix, rest) = token.split_once('*').unwrap();
    if prefix.contains('<') || prefix.contains('>') {
        return Err(PathError::StrayTagDelimiter {
            token: token.to_string(),
        });
    }

    if rest.is_empty() {
        if prefix.is_empty() {
            return Ok(Segment::Wildcard);
        }
        // "mnist*" — a prefix wildcard without a tag is not in the grammar.
        return Err(PathError::MissingTag {
            token: token.to_string(),
        });
    }

    let Some(inner) = rest.strip_prefix('<') else {
        return Err(PathError::MissingTag {
            token: token.to_string(),
        });
    };
    let Some(close) = inner.find('>') else {
        return Err(PathError::UnclosedTag {
            token: token.to_string(),
        });
    };

    let tag = &inner[..close];
    let trailing = &inner[close + 1..];
    if !trailing.is_empty() {
        return Err(PathError::TrailingCharacters {
            token: token.to_string(),
        });
    }
    if tag.is_empty() {
        return Err(PathError::EmptyTag {
            token: token.to_string(),
        });
    }
    if tag.contains('<') {
        return Err(PathError::StrayTagDelimiter {
            token: token.to_string(),
        });
    }

    Ok(Segment::TaggedWildcard {
        prefix: prefix.to_string(),
        tag: tag.to_string(),
    })
}
