use time::Duration;

use crate::error::CertMillError;

/// The two lifetime classes an operator configures, plus the backdate
/// switch. Immutable for the duration of a run.
#[derive(Debug, Clone, Copy)]
pub struct LifetimePolicy {
    short: Duration,
    long: Duration,
    backdate: bool,
}

/// Outcome of a policy decision: how long the next certificate lives and
/// whether its start may be backdated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssueDecision {
    pub duration: Duration,
    pub backdate: bool,
}

impl LifetimePolicy {
    /// Builds a policy, refusing a short class that outlasts the long one.
    ///
    /// # Errors
    /// `PolicyMisconfigured` when `short > long`; checked here so every
    /// mutating operation can rely on it.
    pub fn new(short: Duration, long: Duration, backdate: bool) -> Result<Self, CertMillError> {
        if short > long {
            return Err(CertMillError::PolicyMisconfigured { short, long });
        }
        Ok(Self {
            short,
            long,
            backdate,
        })
    }

    /// Convenience constructor from whole hours, the unit operators
    /// configure in.
    pub fn from_hours(short: u64, long: u64, backdate: bool) -> Result<Self, CertMillError> {
        Self::new(
            Duration::hours(short as i64),
            Duration::hours(long as i64),
            backdate,
        )
    }

    pub fn short(&self) -> Duration {
        self.short
    }

    pub fn long(&self) -> Duration {
        self.long
    }

    pub fn backdate_enabled(&self) -> bool {
        self.backdate
    }

    /// Decision for an explicit single-item sign.
    ///
    /// The caller picks the class; short-lived certificates are never
    /// backdated so a broken short-cert rotation cannot hide behind a
    /// shifted start.
    pub fn issuance(&self, long_requested: bool) -> IssueDecision {
        if long_requested {
            IssueDecision {
                duration: self.long,
                backdate: self.backdate,
            }
        } else {
            IssueDecision {
                duration: self.short,
                backdate: false,
            }
        }
    }

    /// Decision for the bulk refresh pass.
    ///
    /// A CSR that already earned a long-lived certificate keeps receiving
    /// the long class; everyone else is renewed short, which bounds the
    /// blast radius of a key that has not yet proven itself.
    pub fn refresh(&self, existing_lifetime: Duration) -> IssueDecision {
        if existing_lifetime >= self.long {
            IssueDecision {
                duration: self.long,
                backdate: self.backdate,
            }
        } else {
            // Never backdate short-lived certs.
            IssueDecision {
                duration: self.short,
                backdate: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(backdate: bool) -> LifetimePolicy {
        LifetimePolicy::from_hours(48, 168, backdate).unwrap()
    }

    #[test]
    fn rejects_short_longer_than_long() {
        let err = LifetimePolicy::from_hours(169, 168, false).unwrap_err();
        assert!(matches!(
            err,
            CertMillError::PolicyMisconfigured { .. }
        ));
    }

    #[test]
    fn equal_classes_are_allowed() {
        assert!(LifetimePolicy::from_hours(48, 48, false).is_ok());
    }

    #[test]
    fn issuance_short_is_never_backdated() {
        let decision = policy(true).issuance(false);
        assert_eq!(decision.duration, Duration::hours(48));
        assert!(!decision.backdate);
    }

    #[test]
    fn issuance_long_follows_operator_backdate() {
        assert!(policy(true).issuance(true).backdate);
        assert!(!policy(false).issuance(true).backdate);
    }

    #[test]
    fn refresh_keeps_long_tier() {
        let decision = policy(true).refresh(Duration::hours(168));
        assert_eq!(decision.duration, Duration::hours(168));
        assert!(decision.backdate);
    }

    #[test]
    fn refresh_demotes_below_long_to_short_unbackdated() {
        // 72h existing < 168h long: renew short, backdate forced off.
        let decision = policy(true).refresh(Duration::hours(72));
        assert_eq!(decision.duration, Duration::hours(48));
        assert!(!decision.backdate);
    }

    #[test]
    fn refresh_treats_over_long_as_long() {
        let decision = policy(false).refresh(Duration::hours(720));
        assert_eq!(decision.duration, Duration::hours(168));
        assert!(!decision.backdate);
    }
}
