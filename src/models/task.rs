use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One attempt to submit one job application for one user.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ApplicationTask {
    pub id: Uuid,
    pub user_id: Uuid,
    pub job_id: String,
    pub resume_id: String,
    pub platform: String,
    pub status: String,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub next_eligible_at: DateTime<Utc>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub last_error_kind: Option<String>,
    pub last_error_message: Option<String>,
    pub last_error_screenshot: Option<String>,
    pub job_snapshot: serde_json::Value,
    pub resume_snapshot: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApplicationTask {
    pub fn platform(&self) -> Platform {
        Platform::parse(&self.platform).unwrap_or(Platform::Generic)
    }

    pub fn status(&self) -> Option<TaskStatus> {
        TaskStatus::parse(&self.status)
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub seq: i64,
    pub task_id: Uuid,
    pub status: String,
    pub detail: Option<serde_json::Value>,
    pub recorded_at: DateTime<Utc>,
}

/// ATS family a job posting belongs to. Stored as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Workday,
    Greenhouse,
    Lever,
    Icims,
    Taleo,
    SmartRecruiters,
    Generic,
}

impl Platform {
    pub const ALL: [Platform; 7] = [
        Platform::Workday,
        Platform::Greenhouse,
        Platform::Lever,
        Platform::Icims,
        Platform::Taleo,
        Platform::SmartRecruiters,
        Platform::Generic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Workday => "workday",
            Platform::Greenhouse => "greenhouse",
            Platform::Lever => "lever",
            Platform::Icims => "icims",
            Platform::Taleo => "taleo",
            Platform::SmartRecruiters => "smartrecruiters",
            Platform::Generic => "generic",
        }
    }

    pub fn parse(s: &str) -> Option<Platform> {
        match s {
            "workday" => Some(Platform::Workday),
            "greenhouse" => Some(Platform::Greenhouse),
            "lever" => Some(Platform::Lever),
            "icims" => Some(Platform::Icims),
            "taleo" => Some(Platform::Taleo),
            "smartrecruiters" => Some(Platform::SmartRecruiters),
            "generic" => Some(Platform::Generic),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task lifecycle state. Stored as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    InProgress,
    Submitted,
    Retrying,
    FailedPermanent,
    Withdrawn,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Submitted => "submitted",
            TaskStatus::Retrying => "retrying",
            TaskStatus::FailedPermanent => "failed_permanent",
            TaskStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn parse(s: &str) -> Option<TaskStatus> {
        match s {
            "queued" => Some(TaskStatus::Queued),
            "in_progress" => Some(TaskStatus::InProgress),
            "submitted" => Some(TaskStatus::Submitted),
            "retrying" => Some(TaskStatus::Retrying),
            "failed_permanent" => Some(TaskStatus::FailedPermanent),
            "withdrawn" => Some(TaskStatus::Withdrawn),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Submitted | TaskStatus::FailedPermanent | TaskStatus::Withdrawn
        )
    }

    /// Legal state-machine transitions. `InProgress -> Queued` covers the
    /// rate-limit release and lease-reclaim paths: the task was claimed but
    /// never executed, or its worker died.
    pub fn can_transition(&self, to: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, to),
            (Queued, InProgress)
                | (Queued, Withdrawn)
                | (InProgress, Submitted)
                | (InProgress, Retrying)
                | (InProgress, FailedPermanent)
                | (InProgress, Queued)
                | (Retrying, Queued)
                | (Retrying, Withdrawn)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified failure attached to a task's last error and timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transient,
    Captcha,
    ManualReview,
    Permanent,
    WorkerCrash,
}

impl FailureKind {
    pub fn parse(s: &str) -> Option<FailureKind> {
        match s {
            "transient" => Some(FailureKind::Transient),
            "captcha" => Some(FailureKind::Captcha),
            "manual_review" => Some(FailureKind::ManualReview),
            "permanent" => Some(FailureKind::Permanent),
            "worker_crash" => Some(FailureKind::WorkerCrash),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Transient => "transient",
            FailureKind::Captcha => "captcha",
            FailureKind::ManualReview => "manual_review",
            FailureKind::Permanent => "permanent",
            FailureKind::WorkerCrash => "worker_crash",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_round_trips() {
        for p in Platform::ALL {
            assert_eq!(Platform::parse(p.as_str()), Some(p));
        }
        assert_eq!(Platform::parse("bamboohr"), None);
    }

    #[test]
    fn terminal_states_have_no_outgoing_transitions() {
        use TaskStatus::*;
        for from in [Submitted, FailedPermanent, Withdrawn] {
            for to in [Queued, InProgress, Submitted, Retrying, FailedPermanent, Withdrawn] {
                assert!(!from.can_transition(to), "{from} -> {to} must be illegal");
            }
        }
    }

    #[test]
    fn withdrawal_only_from_pending_states() {
        use TaskStatus::*;
        assert!(Queued.can_transition(Withdrawn));
        assert!(Retrying.can_transition(Withdrawn));
        assert!(!InProgress.can_transition(Withdrawn));
    }

    #[test]
    fn claimed_task_can_be_released() {
        assert!(TaskStatus::InProgress.can_transition(TaskStatus::Queued));
        assert!(TaskStatus::Queued.can_transition(TaskStatus::InProgress));
    }
}
