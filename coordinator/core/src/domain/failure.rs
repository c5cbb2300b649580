// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Failure Classifier
//!
//! Maps a [`TransportError`] raised by a response attempt onto exactly one
//! [`FailureOutcome`]. Classification is a pure function; the corrective
//! action for each outcome is applied by the response dispatcher.
//!
//! ## Classification Table
//! | Transport error | Membership | Outcome |
//! |-----------------|------------|---------|
//! | `RateLimited { wait }` | – | `RateLimited { wait }` |
//! | `WriteForbidden` | `Restricted { until: None }` | `PermanentRestriction` |
//! | `WriteForbidden` | `Restricted { until }`, `until - now >= permanent_after` | `PermanentRestriction` |
//! | `WriteForbidden` | `Restricted { until }` otherwise | `TemporaryRestriction { until }` |
//! | `WriteForbidden` | anything else | `Unclassified` |
//! | `AccessDenied` | – | `AccessRevoked` |
//! | `SessionInvalid` / `Auth` | – | `FatalSession` |
//! | `Disconnected` / `Other` | – | `Unclassified` |

use crate::domain::transport::{MembershipStatus, TransportError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest error detail carried into notifications.
pub const MAX_DETAIL_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FailureOutcome {
    RateLimited { wait: Duration },
    TemporaryRestriction { until: DateTime<Utc> },
    PermanentRestriction,
    AccessRevoked,
    FatalSession { reason: String },
    Unclassified { detail: String },
}

impl FailureOutcome {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FailureOutcome::RateLimited { .. } => "rate_limited",
            FailureOutcome::TemporaryRestriction { .. } => "temporary_restriction",
            FailureOutcome::PermanentRestriction => "permanent_restriction",
            FailureOutcome::AccessRevoked => "access_revoked",
            FailureOutcome::FatalSession { .. } => "fatal_session",
            FailureOutcome::Unclassified { .. } => "unclassified",
        }
    }
}

/// Classify a failed write.
///
/// `membership` is only consulted for `WriteForbidden`; callers look it up
/// after the failure and pass `None` when the lookup itself failed.
pub fn classify(
    error: &TransportError,
    membership: Option<&MembershipStatus>,
    now: DateTime<Utc>,
    permanent_after: chrono::Duration,
) -> FailureOutcome {
    match error {
        TransportError::RateLimited { wait } => FailureOutcome::RateLimited { wait: *wait },
        TransportError::WriteForbidden => match membership {
            Some(MembershipStatus::Restricted { until: None }) => FailureOutcome::PermanentRestriction,
            Some(MembershipStatus::Restricted { until: Some(until) }) => {
                if *until - now >= permanent_after {
                    FailureOutcome::PermanentRestriction
                } else {
                    FailureOutcome::TemporaryRestriction { until: *until }
                }
            }
            Some(_) => FailureOutcome::Unclassified {
                detail: "write forbidden without a recorded restriction".to_string(),
            },
            None => FailureOutcome::Unclassified {
                detail: "write forbidden, membership unavailable".to_string(),
            },
        },
        TransportError::AccessDenied => FailureOutcome::AccessRevoked,
        TransportError::SessionInvalid(reason) => FailureOutcome::FatalSession {
            reason: reason.to_string(),
        },
        TransportError::Auth(message) => FailureOutcome::FatalSession {
            reason: truncate_detail(message),
        },
        TransportError::Disconnected => FailureOutcome::Unclassified {
            detail: "transport disconnected during write".to_string(),
        },
        TransportError::Other(message) => FailureOutcome::Unclassified {
            detail: truncate_detail(message),
        },
    }
}

/// First [`MAX_DETAIL_CHARS`] characters of `detail`.
pub fn truncate_detail(detail: &str) -> String {
    detail.chars().take(MAX_DETAIL_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transport::SessionInvalidReason;
    use chrono::Duration as ChronoDuration;

    fn horizon() -> ChronoDuration {
        ChronoDuration::days(366)
    }

    #[test]
    fn test_rate_limit_passes_wait_through() {
        let outcome = classify(
            &TransportError::RateLimited {
                wait: Duration::from_secs(17),
            },
            None,
            Utc::now(),
            horizon(),
        );
        assert_eq!(
            outcome,
            FailureOutcome::RateLimited {
                wait: Duration::from_secs(17)
            }
        );
    }

    #[test]
    fn test_write_forbidden_time_bounded_is_temporary() {
        let now = Utc::now();
        let until = now + ChronoDuration::minutes(10);
        let outcome = classify(
            &TransportError::WriteForbidden,
            Some(&MembershipStatus::Restricted { until: Some(until) }),
            now,
            horizon(),
        );
        assert_eq!(outcome, FailureOutcome::TemporaryRestriction { until });
    }

    #[test]
    fn test_write_forbidden_without_expiry_is_permanent() {
        let outcome = classify(
            &TransportError::WriteForbidden,
            Some(&MembershipStatus::Restricted { until: None }),
            Utc::now(),
            horizon(),
        );
        assert_eq!(outcome, FailureOutcome::PermanentRestriction);
    }

    #[test]
    fn test_write_forbidden_far_future_is_permanent() {
        let now = Utc::now();
        let outcome = classify(
            &TransportError::WriteForbidden,
            Some(&MembershipStatus::Restricted {
                until: Some(now + ChronoDuration::days(3650)),
            }),
            now,
            horizon(),
        );
        assert_eq!(outcome, FailureOutcome::PermanentRestriction);
    }

    #[test]
    fn test_write_forbidden_without_restriction_is_unclassified() {
        let now = Utc::now();
        for membership in [Some(&MembershipStatus::Member), None] {
            let outcome = classify(&TransportError::WriteForbidden, membership, now, horizon());
            assert_eq!(outcome.kind(), "unclassified");
        }
    }

    #[test]
    fn test_session_errors_are_fatal() {
        let outcome = classify(
            &TransportError::SessionInvalid(SessionInvalidReason::Duplicated),
            None,
            Utc::now(),
            horizon(),
        );
        assert_eq!(
            outcome,
            FailureOutcome::FatalSession {
                reason: "session duplicated elsewhere".to_string()
            }
        );
    }

    #[test]
    fn test_access_denied() {
        let outcome = classify(&TransportError::AccessDenied, None, Utc::now(), horizon());
        assert_eq!(outcome, FailureOutcome::AccessRevoked);
    }

    #[test]
    fn test_unclassified_detail_is_truncated() {
        let long = "x".repeat(500);
        let outcome = classify(&TransportError::Other(long), None, Utc::now(), horizon());
        match outcome {
            FailureOutcome::Unclassified { detail } => assert_eq!(detail.len(), MAX_DETAIL_CHARS),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
