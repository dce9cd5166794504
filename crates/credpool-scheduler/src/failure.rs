//! Classification of failed external calls made with a pool credential.

use serde::Serialize;

/// Broad cause of a failed request, from the caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The credential itself was refused (invalid, revoked, no permission).
    Authentication,
    /// Quota or rate limit hit; another credential may still work.
    Quota,
    Other,
}

impl FailureKind {
    /// Whether trying the next credential in the pool is worthwhile.
    pub fn should_rotate(&self) -> bool {
        matches!(self, Self::Quota)
    }

    /// User-facing hint for this failure.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Authentication => "The credential was rejected; check that it is correct.",
            Self::Quota => "The credential's quota is used up; wait or add another credential.",
            Self::Other => "The request failed; please try again later.",
        }
    }
}

const AUTHENTICATION_PATTERNS: &[&str] = &[
    "API key",
    "API_KEY_INVALID",
    "PERMISSION_DENIED",
    "UNAUTHENTICATED",
];

const QUOTA_PATTERNS: &[&str] = &[
    "quota",
    "RESOURCE_EXHAUSTED",
    "Resource exhausted",
    "429",
    "rate limit",
    "Too Many Requests",
];

/// Classify an error message returned by the external API.
///
/// Authentication phrases are checked first, so a message naming both
/// (e.g. "quota exceeded for API key") counts as an authentication issue.
pub fn classify_failure(message: &str) -> FailureKind {
    if AUTHENTICATION_PATTERNS.iter().any(|p| message.contains(p)) {
        return FailureKind::Authentication;
    }
    if QUOTA_PATTERNS.iter().any(|p| message.contains(p)) {
        return FailureKind::Quota;
    }
    FailureKind::Other
}
