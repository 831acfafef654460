//! Error types for the block parsing pipeline.
//!
//! Only session-aborting failures live here. Recoverable anomalies
//! (deprecated codes, assumed defaults, unrecognized blocks) are reported
//! through the session's warning channel instead.

use thiserror::Error;

/// Fatal errors raised while decoding Gerber or drill blocks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A numeric field could not be interpreted.
    #[error("invalid {label} `{raw}`")]
    InvalidNumber {
        /// What the field was supposed to hold.
        label: &'static str,
        /// The offending text.
        raw: String,
    },

    /// A macro arithmetic expression could not be parsed.
    #[error("malformed macro expression `{expression}`: {reason}")]
    MalformedExpression {
        /// The expression text.
        expression: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A macro expression referenced a modifier with no binding.
    #[error("macro variable ${0} is not bound")]
    UnboundVariable(u32),

    /// Raw input handed to the binding surface was unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A fatal error tagged with the source line of the offending block.
    #[error("line {line}: {source}")]
    Located {
        /// 1-based line number of the block.
        line: usize,
        /// The underlying failure.
        #[source]
        source: Box<ParseError>,
    },

    /// The session already failed and refuses further blocks.
    #[error("session aborted after a fatal error on line {line}")]
    Aborted {
        /// Line of the block that aborted the session.
        line: usize,
    },
}

impl ParseError {
    pub(crate) fn invalid_number(label: &'static str, raw: &str) -> Self {
        Self::InvalidNumber {
            label,
            raw: raw.to_string(),
        }
    }

    pub(crate) fn malformed(expression: &str, reason: impl Into<String>) -> Self {
        Self::MalformedExpression {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }

    /// Attach a line number, leaving already-located errors untouched.
    #[must_use]
    pub fn at_line(self, line: usize) -> Self {
        match self {
            Self::Located { .. } | Self::Aborted { .. } => self,
            other => Self::Located {
                line,
                source: Box::new(other),
            },
        }
    }

    /// Line number carried by this error, if any.
    pub const fn line(&self) -> Option<usize> {
        match self {
            Self::Located { line, .. } | Self::Aborted { line } => Some(*line),
            _ => None,
        }
    }
}
