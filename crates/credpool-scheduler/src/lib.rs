//! Credential selection: pool management, sliding-window rate limiting,
//! round-robin rotation and failure classification.

pub mod failure;
pub mod pool;
pub mod rate_limit;
pub mod rotation;
pub mod service;

pub use failure::{FailureKind, classify_failure};
pub use pool::{FormatPolicy, KeyPoolManager, mask};
pub use rate_limit::{
    Clock, ManualClock, RateLimitPolicy, RateLimitTracker, SystemClock, ThrottleSnapshot,
};
pub use rotation::Rotator;
pub use service::CredentialService;
