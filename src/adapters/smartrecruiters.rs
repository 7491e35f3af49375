use crate::models::{ApplicationTask, Platform};

use super::{apply_url, ApplicantProfile, AutomationPlan, PlanStep, PlatformAdapter, PrepareError};

/// SmartRecruiters postings: modern single-page form with camelCase field
/// names and an explicit apply dialog.
pub struct SmartRecruitersAdapter;

impl PlatformAdapter for SmartRecruitersAdapter {
    fn platform(&self) -> Platform {
        Platform::SmartRecruiters
    }

    fn matches(&self, url: &str) -> bool {
        url.contains("smartrecruiters.com")
    }

    fn prepare(&self, task: &ApplicationTask) -> Result<AutomationPlan, PrepareError> {
        let profile = ApplicantProfile::from_task(task)?;
        let url = apply_url(task)?;
        let (first, last) = profile.split_name();

        let mut steps = vec![
            PlanStep::Fill {
                selector: "input[name='firstName']".to_string(),
                value: first.to_string(),
            },
            PlanStep::Fill {
                selector: "input[name='lastName']".to_string(),
                value: last.to_string(),
            },
            PlanStep::Fill {
                selector: "input[name='email']".to_string(),
                value: profile.email.clone(),
            },
        ];
        if let Some(phone) = &profile.phone {
            steps.push(PlanStep::Fill {
                selector: "input[name='phoneNumber']".to_string(),
                value: phone.clone(),
            });
        }
        if let Some(resume_url) = &profile.resume_url {
            steps.push(PlanStep::Fill {
                selector: "input[name='resumeUrl']".to_string(),
                value: resume_url.clone(),
            });
        }
        steps.push(PlanStep::Submit);

        Ok(AutomationPlan {
            apply_url: url,
            steps,
            manual_review_reason: None,
        })
    }
}
