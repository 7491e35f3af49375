use crate::models::{ApplicationTask, Platform};

use super::{apply_url, ApplicantProfile, AutomationPlan, PlanStep, PlatformAdapter, PrepareError};

/// Lever postings: the application form lives at `<posting>/apply` and uses
/// a single full-name input.
pub struct LeverAdapter;

impl PlatformAdapter for LeverAdapter {
    fn platform(&self) -> Platform {
        Platform::Lever
    }

    fn matches(&self, url: &str) -> bool {
        url.contains("lever.co")
    }

    fn prepare(&self, task: &ApplicationTask) -> Result<AutomationPlan, PrepareError> {
        let profile = ApplicantProfile::from_task(task)?;
        let mut url = apply_url(task)?;
        if !url.trim_end_matches('/').ends_with("/apply") {
            url = format!("{}/apply", url.trim_end_matches('/'));
        }

        let mut steps = vec![
            PlanStep::Fill {
                selector: "input[name='name']".to_string(),
                value: profile.full_name.clone(),
            },
            PlanStep::Fill {
                selector: "input[name='email']".to_string(),
                value: profile.email.clone(),
            },
        ];
        if let Some(phone) = &profile.phone {
            steps.push(PlanStep::Fill {
                selector: "input[name='phone']".to_string(),
                value: phone.clone(),
            });
        }
        if let Some(resume_url) = &profile.resume_url {
            steps.push(PlanStep::Fill {
                selector: "input[name='urls[Resume]']".to_string(),
                value: resume_url.clone(),
            });
        }
        if let Some(cover) = &profile.cover_letter {
            steps.push(PlanStep::Fill {
                selector: "textarea[name='comments']".to_string(),
                value: cover.clone(),
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
