//! Platform adapters: stateless strategies that translate a generic
//! application package into platform-specific automation steps. All mutable
//! progress lives on the task row, so a retry always restarts from `prepare`.

pub mod generic;
pub mod greenhouse;
pub mod icims;
pub mod lever;
pub mod runner;
pub mod smartrecruiters;
pub mod taleo;
pub mod workday;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{ApplicationTask, FailureKind, Platform};
use crate::session::AutomationSession;

/// Ordered automation steps for one application, built by `prepare`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationPlan {
    pub apply_url: String,
    pub steps: Vec<PlanStep>,
    /// Set when the adapter already knows a human has to take over
    /// (e.g. the platform demands an applicant account).
    pub manual_review_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlanStep {
    Navigate(String),
    Fill { selector: String, value: String },
    Submit,
}

/// Result of driving one plan through an automation session.
#[derive(Debug, Clone)]
pub enum AutomationOutcome {
    Submitted,
    RequiresCaptcha {
        screenshot: Option<String>,
    },
    RequiresManualReview {
        reason: String,
        screenshot: Option<String>,
    },
    TransientFailure {
        reason: String,
        screenshot: Option<String>,
    },
    PermanentFailure {
        reason: String,
        screenshot: Option<String>,
    },
}

impl AutomationOutcome {
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            AutomationOutcome::Submitted => None,
            AutomationOutcome::RequiresCaptcha { .. } => Some(FailureKind::Captcha),
            AutomationOutcome::RequiresManualReview { .. } => Some(FailureKind::ManualReview),
            AutomationOutcome::TransientFailure { .. } => Some(FailureKind::Transient),
            AutomationOutcome::PermanentFailure { .. } => Some(FailureKind::Permanent),
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            AutomationOutcome::Submitted => None,
            AutomationOutcome::RequiresCaptcha { .. } => Some("captcha challenge detected"),
            AutomationOutcome::RequiresManualReview { reason, .. }
            | AutomationOutcome::TransientFailure { reason, .. }
            | AutomationOutcome::PermanentFailure { reason, .. } => Some(reason),
        }
    }

    pub fn screenshot(&self) -> Option<&str> {
        match self {
            AutomationOutcome::Submitted => None,
            AutomationOutcome::RequiresCaptcha { screenshot }
            | AutomationOutcome::RequiresManualReview { screenshot, .. }
            | AutomationOutcome::TransientFailure { screenshot, .. }
            | AutomationOutcome::PermanentFailure { screenshot, .. } => screenshot.as_deref(),
        }
    }
}

#[derive(Debug)]
pub struct PrepareError {
    pub message: String,
}

impl PrepareError {
    pub fn missing(field: &str) -> Self {
        Self {
            message: format!("snapshot is missing required field '{field}'"),
        }
    }
}

impl std::fmt::Display for PrepareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// URL signature match against the job posting's apply URL.
    fn matches(&self, url: &str) -> bool;

    fn prepare(&self, task: &ApplicationTask) -> Result<AutomationPlan, PrepareError>;

    async fn execute(
        &self,
        plan: &AutomationPlan,
        session: &dyn AutomationSession,
    ) -> AutomationOutcome {
        runner::run_plan(plan, session).await
    }
}

/// Applicant fields shared by every adapter, pulled from the resume snapshot
/// captured at task creation.
pub struct ApplicantProfile {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub resume_url: Option<String>,
    pub cover_letter: Option<String>,
}

impl ApplicantProfile {
    pub fn from_task(task: &ApplicationTask) -> Result<Self, PrepareError> {
        let snap = &task.resume_snapshot;
        let full_name = snap
            .get("full_name")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PrepareError::missing("full_name"))?
            .to_string();
        let email = snap
            .get("email")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PrepareError::missing("email"))?
            .to_string();
        Ok(Self {
            full_name,
            email,
            phone: str_field(snap, "phone"),
            resume_url: str_field(snap, "resume_url"),
            cover_letter: str_field(snap, "cover_letter"),
        })
    }

    /// ("First", "Last") split for platforms with separate name inputs.
    pub fn split_name(&self) -> (&str, &str) {
        match self.full_name.split_once(' ') {
            Some((first, last)) => (first, last),
            None => (self.full_name.as_str(), ""),
        }
    }
}

pub fn apply_url(task: &ApplicationTask) -> Result<String, PrepareError> {
    task.job_snapshot
        .get("apply_url")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| PrepareError::missing("apply_url"))
}

fn str_field(snap: &serde_json::Value, key: &str) -> Option<String> {
    snap.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Resolves the correct adapter for a job posting. Resolution never fails:
/// postings with no recognized signature fall back to the generic adapter.
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn PlatformAdapter>>,
    generic: Arc<dyn PlatformAdapter>,
}

impl AdapterRegistry {
    pub fn standard() -> Self {
        Self {
            adapters: vec![
                Arc::new(workday::WorkdayAdapter),
                Arc::new(greenhouse::GreenhouseAdapter),
                Arc::new(lever::LeverAdapter),
                Arc::new(icims::IcimsAdapter),
                Arc::new(taleo::TaleoAdapter),
                Arc::new(smartrecruiters::SmartRecruitersAdapter),
            ],
            generic: Arc::new(generic::GenericAdapter),
        }
    }

    pub fn resolve(&self, job_snapshot: &serde_json::Value) -> Arc<dyn PlatformAdapter> {
        let url = job_snapshot
            .get("apply_url")
            .or_else(|| job_snapshot.get("ats_url"))
            .and_then(|v| v.as_str())
            .unwrap_or("");
        self.resolve_url(url)
    }

    pub fn resolve_url(&self, url: &str) -> Arc<dyn PlatformAdapter> {
        self.adapters
            .iter()
            .find(|a| a.matches(url))
            .cloned()
            .unwrap_or_else(|| self.generic.clone())
    }

    pub fn by_platform(&self, platform: Platform) -> Arc<dyn PlatformAdapter> {
        self.adapters
            .iter()
            .find(|a| a.platform() == platform)
            .cloned()
            .unwrap_or_else(|| self.generic.clone())
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use chrono::Utc;
    use uuid::Uuid;

    use crate::models::ApplicationTask;

    pub fn task_with(
        job_snapshot: serde_json::Value,
        resume_snapshot: serde_json::Value,
    ) -> ApplicationTask {
        let now = Utc::now();
        ApplicationTask {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            job_id: "J123".to_string(),
            resume_id: "R9".to_string(),
            platform: "generic".to_string(),
            status: "queued".to_string(),
            attempt_count: 0,
            max_attempts: 5,
            next_eligible_at: now,
            lease_expires_at: None,
            last_error_kind: None,
            last_error_message: None,
            last_error_screenshot: None,
            job_snapshot,
            resume_snapshot,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_known_signatures() {
        let registry = AdapterRegistry::standard();
        let cases = [
            ("https://acme.wd5.myworkdayjobs.com/en-US/careers/job/123", Platform::Workday),
            ("https://boards.greenhouse.io/acme/jobs/4567", Platform::Greenhouse),
            ("https://jobs.lever.co/acme/abc-def", Platform::Lever),
            ("https://careers-acme.icims.com/jobs/1020/login", Platform::Icims),
            ("https://acme.taleo.net/careersection/2/jobdetail.ftl", Platform::Taleo),
            ("https://jobs.smartrecruiters.com/Acme/99-engineer", Platform::SmartRecruiters),
        ];
        for (url, platform) in cases {
            assert_eq!(registry.resolve_url(url).platform(), platform, "{url}");
        }
    }

    #[test]
    fn unknown_signature_falls_back_to_generic() {
        let registry = AdapterRegistry::standard();
        assert_eq!(
            registry.resolve_url("https://careers.example.com/apply/42").platform(),
            Platform::Generic
        );
        assert_eq!(registry.resolve_url("").platform(), Platform::Generic);
    }

    #[test]
    fn resolve_reads_snapshot_urls() {
        let registry = AdapterRegistry::standard();
        let snap = json!({ "apply_url": "https://jobs.lever.co/acme/1" });
        assert_eq!(registry.resolve(&snap).platform(), Platform::Lever);

        let snap = json!({ "title": "Engineer" });
        assert_eq!(registry.resolve(&snap).platform(), Platform::Generic);
    }

    #[test]
    fn split_name_handles_single_token() {
        let profile = ApplicantProfile {
            full_name: "Plato".to_string(),
            email: "p@example.com".to_string(),
            phone: None,
            resume_url: None,
            cover_letter: None,
        };
        assert_eq!(profile.split_name(), ("Plato", ""));
    }
}
