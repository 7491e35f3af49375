use crate::models::{ApplicationTask, Platform};

use super::{apply_url, ApplicantProfile, AutomationPlan, PlanStep, PlatformAdapter, PrepareError};

/// iCIMS portals: most tenants force applicants through an account wall.
/// When the job snapshot carries that marker the plan is flagged for manual
/// review up front instead of burning an automation attempt on a login page.
pub struct IcimsAdapter;

impl PlatformAdapter for IcimsAdapter {
    fn platform(&self) -> Platform {
        Platform::Icims
    }

    fn matches(&self, url: &str) -> bool {
        url.contains("icims.com")
    }

    fn prepare(&self, task: &ApplicationTask) -> Result<AutomationPlan, PrepareError> {
        let profile = ApplicantProfile::from_task(task)?;
        let url = apply_url(task)?;

        let manual_review_reason = task
            .job_snapshot
            .get("requires_account")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
            .then(|| "iCIMS tenant requires an applicant account".to_string());

        let (first, last) = profile.split_name();
        let mut steps = vec![
            PlanStep::Fill {
                selector: "#FirstName".to_string(),
                value: first.to_string(),
            },
            PlanStep::Fill {
                selector: "#LastName".to_string(),
                value: last.to_string(),
            },
            PlanStep::Fill {
                selector: "#Email".to_string(),
                value: profile.email.clone(),
            },
        ];
        if let Some(phone) = &profile.phone {
            steps.push(PlanStep::Fill {
                selector: "#Phone".to_string(),
                value: phone.clone(),
            });
        }
        steps.push(PlanStep::Submit);

        Ok(AutomationPlan {
            apply_url: url,
            steps,
            manual_review_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::tests_support::task_with;
    use serde_json::json;

    #[test]
    fn account_wall_marks_plan_for_manual_review() {
        let task = task_with(
            json!({
                "apply_url": "https://careers-acme.icims.com/jobs/1",
                "requires_account": true
            }),
            json!({ "full_name": "Ada Lovelace", "email": "ada@example.com" }),
        );
        let plan = IcimsAdapter.prepare(&task).unwrap();
        assert!(plan.manual_review_reason.is_some());
    }

    #[test]
    fn guest_flow_has_no_review_flag() {
        let task = task_with(
            json!({ "apply_url": "https://careers-acme.icims.com/jobs/1" }),
            json!({ "full_name": "Ada Lovelace", "email": "ada@example.com" }),
        );
        let plan = IcimsAdapter.prepare(&task).unwrap();
        assert!(plan.manual_review_reason.is_none());
    }
}
