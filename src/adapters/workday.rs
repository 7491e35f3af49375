use crate::models::{ApplicationTask, Platform};

use super::{apply_url, ApplicantProfile, AutomationPlan, PlanStep, PlatformAdapter, PrepareError};

/// Workday tenants: a guest "quick apply" flow spread over two pages. Contact
/// details are submitted first, then the review page is confirmed with a
/// second submit. Selectors use Workday's data-automation-id attributes.
pub struct WorkdayAdapter;

impl PlatformAdapter for WorkdayAdapter {
    fn platform(&self) -> Platform {
        Platform::Workday
    }

    fn matches(&self, url: &str) -> bool {
        url.contains("myworkday") || url.contains("workday.com")
    }

    fn prepare(&self, task: &ApplicationTask) -> Result<AutomationPlan, PrepareError> {
        let profile = ApplicantProfile::from_task(task)?;
        let url = apply_url(task)?;
        let (first, last) = profile.split_name();

        let mut steps = vec![
            PlanStep::Fill {
                selector: "[data-automation-id='legalNameSection_firstName']".to_string(),
                value: first.to_string(),
            },
            PlanStep::Fill {
                selector: "[data-automation-id='legalNameSection_lastName']".to_string(),
                value: last.to_string(),
            },
            PlanStep::Fill {
                selector: "[data-automation-id='email']".to_string(),
                value: profile.email.clone(),
            },
        ];
        if let Some(phone) = &profile.phone {
            steps.push(PlanStep::Fill {
                selector: "[data-automation-id='phone-number']".to_string(),
                value: phone.clone(),
            });
        }
        if let Some(resume_url) = &profile.resume_url {
            steps.push(PlanStep::Fill {
                selector: "[data-automation-id='resumeUpload']".to_string(),
                value: resume_url.clone(),
            });
        }
        // Contact page, then the review page confirmation.
        steps.push(PlanStep::Submit);
        steps.push(PlanStep::Submit);

        Ok(AutomationPlan {
            apply_url: url,
            steps,
            manual_review_reason: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::tests_support::task_with;
    use serde_json::json;

    #[test]
    fn plan_has_two_submits_for_two_pages() {
        let task = task_with(
            json!({ "apply_url": "https://acme.wd5.myworkdayjobs.com/careers/job/1" }),
            json!({ "full_name": "Ada Lovelace", "email": "ada@example.com" }),
        );
        let plan = WorkdayAdapter.prepare(&task).unwrap();
        let submits = plan
            .steps
            .iter()
            .filter(|s| matches!(s, PlanStep::Submit))
            .count();
        assert_eq!(submits, 2);
    }
}
