//! Retry/backoff controller: a pure decision function over an attempt
//! outcome, so retry behavior is testable without running any automation.

use std::time::Duration;

use rand::Rng;

use crate::adapters::AutomationOutcome;
use crate::config::Config;
use crate::models::FailureKind;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub captcha_delay: Duration,
    pub max_attempts: i32,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base: config.backoff_base,
            cap: config.backoff_cap,
            captcha_delay: config.captcha_retry_delay,
            max_attempts: config.max_attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Succeed,
    Retry { delay: Duration, kind: FailureKind },
    GiveUp { kind: FailureKind },
}

/// Decide what happens to a task after one attempt.
///
/// `attempt_count` is the number of failed attempts recorded before this one;
/// `last_error_kind` is the failure kind of the previous attempt, if any.
pub fn decide(
    policy: &RetryPolicy,
    attempt_count: i32,
    last_error_kind: Option<FailureKind>,
    outcome: &AutomationOutcome,
) -> Decision {
    match outcome {
        AutomationOutcome::Submitted => Decision::Succeed,

        // Surfaced for a human; retrying cannot help and no attempt slot is
        // consumed.
        AutomationOutcome::RequiresManualReview { .. } => Decision::GiveUp {
            kind: FailureKind::ManualReview,
        },

        AutomationOutcome::PermanentFailure { .. } => Decision::GiveUp {
            kind: FailureKind::Permanent,
        },

        // Captchas are rarely solved by blind retrying: one retry after a
        // longer fixed delay, then give up.
        AutomationOutcome::RequiresCaptcha { .. } => {
            if last_error_kind == Some(FailureKind::Captcha)
                || attempt_count + 1 >= policy.max_attempts
            {
                Decision::GiveUp {
                    kind: FailureKind::Captcha,
                }
            } else {
                Decision::Retry {
                    delay: policy.captcha_delay,
                    kind: FailureKind::Captcha,
                }
            }
        }

        AutomationOutcome::TransientFailure { .. } => {
            if attempt_count + 1 >= policy.max_attempts {
                Decision::GiveUp {
                    kind: FailureKind::Transient,
                }
            } else {
                Decision::Retry {
                    delay: backoff_delay(policy, attempt_count + 1, jitter_fraction()),
                    kind: FailureKind::Transient,
                }
            }
        }
    }
}

/// `base * 2^attempts`, capped, plus a jitter share of the capped delay.
/// Jitter desynchronizes retry storms when many users hit the same platform.
pub fn backoff_delay(policy: &RetryPolicy, attempts: i32, jitter: f64) -> Duration {
    let exp = attempts.clamp(0, 30) as u32;
    let raw = policy.base.saturating_mul(2u32.saturating_pow(exp));
    let capped = raw.min(policy.cap);
    capped + capped.mul_f64(jitter.clamp(0.0, 1.0))
}

fn jitter_fraction() -> f64 {
    rand::rng().random_range(0.0..0.25)
}
