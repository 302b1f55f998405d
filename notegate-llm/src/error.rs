//! Gateway error types.

use thiserror::Error;

/// Failure of a single upstream call.
///
/// The orchestrator only ever inspects [`UpstreamError::is_quota`]; every
/// other detail is carried through to the caller untouched.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// Provider answered with a non-success HTTP status.
    #[error("upstream returned HTTP {status}{}: {message}", code_suffix(.code))]
    Http {
        /// HTTP status code.
        status: u16,
        /// Provider status string, e.g. `RESOURCE_EXHAUSTED`.
        code: Option<String>,
        /// Provider error message.
        message: String,
    },

    /// Request timed out on the client side.
    #[error("upstream request timed out")]
    Timeout,

    /// Connection or transport failure before a response arrived.
    #[error("upstream transport error: {0}")]
    Transport(String),

    /// Response body could not be decoded.
    #[error("failed to parse upstream response: {0}")]
    Parse(String),
}

const QUOTA_MARKERS: &[&str] = &[
    "quota",
    "rate limit",
    "resource exhausted",
    "resource_exhausted",
    "too many requests",
];

impl UpstreamError {
    /// Whether the provider signalled that the calling credential is out of quota.
    ///
    /// Authentication failures (401/403) are deliberately not quota errors.
    #[must_use]
    pub fn is_quota(&self) -> bool {
        match self {
            Self::Http {
                status,
                code,
                message,
            } => {
                *status == 429
                    || code
                        .as_deref()
                        .is_some_and(|c| c.eq_ignore_ascii_case("RESOURCE_EXHAUSTED"))
                    || mentions_quota(message)
            }
            Self::Transport(message) => mentions_quota(message),
            Self::Timeout | Self::Parse(_) => false,
        }
    }
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default()
}

fn mentions_quota(message: &str) -> bool {
    let lower = message.to_lowercase();
    QUOTA_MARKERS.iter().any(|marker| lower.contains(marker))
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout
        } else if err.is_decode() {
            UpstreamError::Parse(err.to_string())
        } else {
            UpstreamError::Transport(err.to_string())
        }
    }
}

/// Errors surfaced by the gateway to its callers.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Startup configuration is unusable (e.g. no credentials).
    #[error("gateway configuration error: {0}")]
    Config(String),

    /// Prompt templates could not be loaded.
    #[error("prompt template error: {0}")]
    Prompt(String),

    /// Caller input was rejected before any upstream call.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Non-quota upstream failure, propagated as-is.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Every attempt in the retry budget hit a quota error.
    #[error("service unavailable: system overloaded after {attempts} attempts (last error: {last_error})")]
    Overloaded {
        /// Attempts made before giving up.
        attempts: u32,
        /// The quota error seen on the final attempt.
        last_error: UpstreamError,
    },
}

impl GatewayError {
    /// Whether this is pool exhaustion rather than a fatal upstream error.
    #[must_use]
    pub fn is_overloaded(&self) -> bool {
        matches!(self, Self::Overloaded { .. })
    }

    /// Message safe to show an end user.
    ///
    /// Never mentions credentials, indices, or model identifiers.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Overloaded { .. } => {
                "The assistant is busy right now. Please try again in a few minutes."
            }
            Self::InvalidRequest(_) => "The request could not be processed. Please check your input.",
            Self::Config(_) | Self::Prompt(_) | Self::Upstream(_) => {
                "The assistant is unavailable right now. Please try again later."
            }
        }
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, GatewayError>;
