//! Shared plan runner: drives an `AutomationPlan` through a session and
//! classifies every session-level error into an `AutomationOutcome`. A
//! screenshot is captured for every non-submitted outcome; diagnosing ATS
//! layout drift without one is impractical.

use crate::session::{AutomationSession, SessionError};

use super::{AutomationOutcome, AutomationPlan, PlanStep};

pub async fn run_plan(plan: &AutomationPlan, session: &dyn AutomationSession) -> AutomationOutcome {
    if let Err(e) = session.navigate(&plan.apply_url).await {
        return classify(e, session).await;
    }

    if let Some(reason) = &plan.manual_review_reason {
        return AutomationOutcome::RequiresManualReview {
            reason: reason.clone(),
            screenshot: snap(session).await,
        };
    }

    match session.detect_captcha().await {
        Ok(true) => {
            return AutomationOutcome::RequiresCaptcha {
                screenshot: snap(session).await,
            };
        }
        Ok(false) => {}
        Err(e) => return classify(e, session).await,
    }

    for step in &plan.steps {
        let result = match step {
            PlanStep::Navigate(url) => session.navigate(url).await,
            PlanStep::Fill { selector, value } => session.fill_field(selector, value).await,
            PlanStep::Submit => session.submit().await,
        };
        if let Err(e) = result {
            return classify(e, session).await;
        }
    }

    AutomationOutcome::Submitted
}

async fn classify(err: SessionError, session: &dyn AutomationSession) -> AutomationOutcome {
    let screenshot = snap(session).await;
    match err {
        SessionError::PostingClosed | SessionError::DuplicateApplication => {
            AutomationOutcome::PermanentFailure {
                reason: err.to_string(),
                screenshot,
            }
        }
        SessionError::AccountRequired => AutomationOutcome::RequiresManualReview {
            reason: err.to_string(),
            screenshot,
        },
        SessionError::Timeout(_)
        | SessionError::Network(_)
        | SessionError::StaleElement(_)
        | SessionError::Protocol(_) => AutomationOutcome::TransientFailure {
            reason: err.to_string(),
            screenshot,
        },
    }
}

async fn snap(session: &dyn AutomationSession) -> Option<String> {
    match session.screenshot().await {
        Ok(blob_ref) => Some(blob_ref),
        Err(e) => {
            tracing::warn!("Failed to capture failure screenshot: {e}");
            None
        }
    }
}
